//! Smithy Prelude
//!
//! Shapes every model can target without defining them, plus the ids of
//! the traits this generator interprets.

use serde_json::json;
use std::collections::BTreeMap;

use super::{Shape, ShapeId, ShapeType, Traits};

/// Simple prelude shapes and their types
const PRELUDE_SIMPLE_SHAPES: &[(&str, ShapeType)] = &[
    ("Blob", ShapeType::Blob),
    ("Boolean", ShapeType::Boolean),
    ("String", ShapeType::String),
    ("Byte", ShapeType::Byte),
    ("Short", ShapeType::Short),
    ("Integer", ShapeType::Integer),
    ("Long", ShapeType::Long),
    ("Float", ShapeType::Float),
    ("Double", ShapeType::Double),
    ("BigInteger", ShapeType::BigInteger),
    ("BigDecimal", ShapeType::BigDecimal),
    ("Timestamp", ShapeType::Timestamp),
    ("Document", ShapeType::Document),
    ("PrimitiveBoolean", ShapeType::Boolean),
    ("PrimitiveByte", ShapeType::Byte),
    ("PrimitiveShort", ShapeType::Short),
    ("PrimitiveInteger", ShapeType::Integer),
    ("PrimitiveLong", ShapeType::Long),
    ("PrimitiveFloat", ShapeType::Float),
    ("PrimitiveDouble", ShapeType::Double),
];

/// Build all prelude shapes
pub fn prelude_shapes() -> BTreeMap<ShapeId, Shape> {
    let mut shapes = BTreeMap::new();
    for (name, shape_type) in PRELUDE_SIMPLE_SHAPES {
        let id = ShapeId::prelude(name);
        let mut applied = Traits::default();
        if name.starts_with("Primitive") {
            let default = if *shape_type == ShapeType::Boolean { json!(false) } else { json!(0) };
            applied.insert(traits::DEFAULT, default);
        }
        shapes.insert(id.clone(), Shape::new(id, *shape_type, applied));
    }

    let unit = ShapeId::prelude("Unit");
    let mut unit_traits = Traits::default();
    unit_traits.insert(traits::UNIT_TYPE, json!({}));
    shapes.insert(unit.clone(), Shape::new(unit, ShapeType::Structure, unit_traits));

    shapes
}

/// Absolute ids of interpreted traits
pub mod traits {
    // smithy.api
    pub const REQUIRED: &str = "smithy.api#required";
    pub const DEFAULT: &str = "smithy.api#default";
    pub const DOCUMENTATION: &str = "smithy.api#documentation";
    pub const DEPRECATED: &str = "smithy.api#deprecated";
    pub const SENSITIVE: &str = "smithy.api#sensitive";
    pub const ERROR: &str = "smithy.api#error";
    pub const HTTP_ERROR: &str = "smithy.api#httpError";
    pub const RETRYABLE: &str = "smithy.api#retryable";
    pub const HTTP: &str = "smithy.api#http";
    pub const HTTP_LABEL: &str = "smithy.api#httpLabel";
    pub const HTTP_QUERY: &str = "smithy.api#httpQuery";
    pub const HTTP_QUERY_PARAMS: &str = "smithy.api#httpQueryParams";
    pub const HTTP_HEADER: &str = "smithy.api#httpHeader";
    pub const HTTP_PREFIX_HEADERS: &str = "smithy.api#httpPrefixHeaders";
    pub const HTTP_PAYLOAD: &str = "smithy.api#httpPayload";
    pub const HTTP_RESPONSE_CODE: &str = "smithy.api#httpResponseCode";
    pub const JSON_NAME: &str = "smithy.api#jsonName";
    pub const TIMESTAMP_FORMAT: &str = "smithy.api#timestampFormat";
    pub const ENUM: &str = "smithy.api#enum";
    pub const ENUM_VALUE: &str = "smithy.api#enumValue";
    pub const PAGINATED: &str = "smithy.api#paginated";
    pub const IDEMPOTENCY_TOKEN: &str = "smithy.api#idempotencyToken";
    pub const STREAMING: &str = "smithy.api#streaming";
    pub const UNIT_TYPE: &str = "smithy.api#unitType";
    pub const INPUT: &str = "smithy.api#input";
    pub const OUTPUT: &str = "smithy.api#output";
    pub const TITLE: &str = "smithy.api#title";

    // protocols
    pub const REST_JSON_1: &str = "aws.protocols#restJson1";
    pub const AWS_JSON_1_0: &str = "aws.protocols#awsJson1_0";
    pub const AWS_JSON_1_1: &str = "aws.protocols#awsJson1_1";
    pub const REST_XML: &str = "aws.protocols#restXml";
    pub const AWS_QUERY: &str = "aws.protocols#awsQuery";
    pub const EC2_QUERY: &str = "aws.protocols#ec2Query";

    // aws
    pub const AWS_SERVICE: &str = "aws.api#service";
    pub const SIGV4: &str = "aws.auth#sigv4";

    // smithy.test
    pub const HTTP_REQUEST_TESTS: &str = "smithy.test#httpRequestTests";
    pub const HTTP_RESPONSE_TESTS: &str = "smithy.test#httpResponseTests";

    // smithy.waiters
    pub const WAITABLE: &str = "smithy.waiters#waitable";

    // smithy.rules
    pub const ENDPOINT_RULE_SET: &str = "smithy.rules#endpointRuleSet";
    pub const ENDPOINT_TESTS: &str = "smithy.rules#endpointTests";
    pub const CONTEXT_PARAM: &str = "smithy.rules#contextParam";
    pub const STATIC_CONTEXT_PARAMS: &str = "smithy.rules#staticContextParams";
    pub const CLIENT_CONTEXT_PARAMS: &str = "smithy.rules#clientContextParams";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_contains_simple_shapes_and_unit() {
        let shapes = prelude_shapes();
        assert!(shapes.contains_key(&ShapeId::prelude("String")));
        assert!(shapes.contains_key(&ShapeId::prelude("Timestamp")));

        let unit = &shapes[&ShapeId::prelude("Unit")];
        assert_eq!(unit.shape_type, ShapeType::Structure);
        assert!(unit.traits.has(traits::UNIT_TYPE));
    }

    #[test]
    fn test_primitive_shapes_carry_defaults() {
        let shapes = prelude_shapes();
        let boolean = &shapes[&ShapeId::prelude("PrimitiveBoolean")];
        assert_eq!(boolean.traits.get(traits::DEFAULT), Some(&json!(false)));
    }
}
