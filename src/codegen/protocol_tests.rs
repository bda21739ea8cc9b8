//! Protocol Test Harness
//!
//! `tests/protocol_tests.rs`: one module per `httpRequestTests` or
//! `httpResponseTests` trait instance and one `#[test]` per case. Request
//! cases serialize the typed input and compare method, path, query, headers,
//! and body. Response cases parse a canned response and compare it with the
//! typed value built from the case params.

use serde_json::{json, Value};

use crate::error::{CodegenError, Result};
use crate::model::{traits, ShapeId, ShapeType};
use crate::symbols::{naming, NameAllocator, Symbol};
use crate::traits::protocol_tests::{is_json_body, HttpRequestTestCase, HttpResponseTestCase};
use crate::traits::{ProtocolTestSet, TestCases};

use super::{lit, CodeWriter, CodegenContext, GeneratedFile};

const DEFAULT_ENDPOINT: &str = "https://example.com";

// =============================================================================
// Params
// =============================================================================

/// Renders case params as Rust expressions of the generated types
struct ValueRenderer<'c, 'a> {
    ctx: &'c CodegenContext<'a>,
    crate_ident: String,
    /// NaN never compares equal, so such cases are ignored
    saw_nan: bool,
}

impl<'c, 'a> ValueRenderer<'c, 'a> {
    fn new(ctx: &'c CodegenContext<'a>) -> Self {
        Self {
            ctx,
            crate_ident: ctx.crate_ident(),
            saw_nan: false,
        }
    }

    /// `crate::model::City` seen from outside the generated crate
    fn external(&self, symbol: &Symbol) -> String {
        format!("{}::{}::{}", self.crate_ident, symbol.namespace.module(), symbol.name)
    }

    fn mismatch(&self, target: &ShapeId, value: &Value) -> CodegenError {
        CodegenError::validation(format!("protocol test value {} does not fit {}", value, target))
    }

    /// A value of the structure `symbol`, members read from `params`
    fn structure(&mut self, symbol: &Symbol, shape: Option<&ShapeId>, params: &Value) -> Result<String> {
        let mut out = format!("{}::builder()", self.external(symbol));
        if let Some(id) = shape {
            let shape = self.ctx.shape(id)?;
            let object = match params {
                Value::Object(map) => map.clone(),
                Value::Null => serde_json::Map::new(),
                other => return Err(self.mismatch(id, other)),
            };
            for member in &shape.members {
                let Some(value) = object.get(&member.name).filter(|v| !v.is_null()) else {
                    continue;
                };
                let names = self.ctx.symbols.member(id, &member.name)?;
                let rendered = self.value(&member.target, value)?;
                let rendered = if names.boxed {
                    format!("Box::new({})", rendered)
                } else {
                    rendered
                };
                out.push_str(&format!(".{}(Some({}))", names.setter, rendered));
            }
            for key in object.keys() {
                if shape.member(key).is_none() {
                    return Err(CodegenError::validation(format!(
                        "protocol test sets unknown member {}${}",
                        id, key
                    )));
                }
            }
        }
        out.push_str(".build()");
        Ok(out)
    }

    fn float(&mut self, rust: &str, value: &Value, target: &ShapeId) -> Result<String> {
        match value {
            Value::Number(n) => {
                let f = n.as_f64().ok_or_else(|| self.mismatch(target, value))?;
                Ok(format!("{:?}_{}", f, rust))
            }
            Value::String(s) if s == "Infinity" => Ok(format!("{}::INFINITY", rust)),
            Value::String(s) if s == "-Infinity" => Ok(format!("{}::NEG_INFINITY", rust)),
            Value::String(s) if s == "NaN" => {
                self.saw_nan = true;
                Ok(format!("{}::NAN", rust))
            }
            other => Err(self.mismatch(target, other)),
        }
    }

    fn value(&mut self, target: &ShapeId, value: &Value) -> Result<String> {
        let ctx = self.ctx;
        let shape = ctx.shape(target)?;
        let rendered = match (shape.shape_type, value) {
            (ShapeType::String, Value::String(s)) if shape.is_string_enum() => {
                format!("{}::from({})", self.external(ctx.symbols.symbol(target)?), lit(s))
            }
            (ShapeType::Enum, Value::String(s)) => {
                format!("{}::from({})", self.external(ctx.symbols.symbol(target)?), lit(s))
            }
            (ShapeType::IntEnum, Value::Number(n)) => {
                format!("{}::from({}_i32)", self.external(ctx.symbols.symbol(target)?), n)
            }
            (ShapeType::String, Value::String(s)) => format!("{}.to_string()", lit(s)),
            (ShapeType::Boolean, Value::Bool(b)) => b.to_string(),
            (ShapeType::Byte, Value::Number(n)) => format!("{}_i8", n),
            (ShapeType::Short, Value::Number(n)) => format!("{}_i16", n),
            (ShapeType::Integer, Value::Number(n)) => format!("{}_i32", n),
            (ShapeType::Long, Value::Number(n)) => format!("{}_i64", n),
            (ShapeType::Float, v) => self.float("f32", v, target)?,
            (ShapeType::Double, v) => self.float("f64", v, target)?,
            (ShapeType::BigInteger, Value::Number(n)) => {
                format!("{}::primitives::BigInteger::from({})", self.crate_ident, lit(&n.to_string()))
            }
            (ShapeType::BigDecimal, Value::Number(n)) => {
                format!("{}::primitives::BigDecimal::from({})", self.crate_ident, lit(&n.to_string()))
            }
            (ShapeType::Timestamp, Value::Number(n)) => match n.as_i64() {
                Some(secs) => format!("{}::primitives::DateTime::from_secs({})", self.crate_ident, secs),
                None => format!(
                    "{}::primitives::DateTime::from_secs_f64({:?})",
                    self.crate_ident,
                    n.as_f64().unwrap_or_default()
                ),
            },
            (ShapeType::Blob, Value::String(s)) => {
                format!("{}::primitives::Blob::from({})", self.crate_ident, lit(s))
            }
            (ShapeType::Document, v) => format!(
                "{}::primitives::Document::new(serde_json::json!({}))",
                self.crate_ident, v
            ),
            (ShapeType::List | ShapeType::Set, Value::Array(items)) => {
                let member = shape.list_member().ok_or_else(|| self.mismatch(target, value))?;
                let mut rendered = Vec::with_capacity(items.len());
                for item in items.iter().filter(|v| !v.is_null()) {
                    rendered.push(self.value(&member.target, item)?);
                }
                format!("vec![{}]", rendered.join(", "))
            }
            (ShapeType::Map, Value::Object(entries)) => {
                let member = shape.map_value().ok_or_else(|| self.mismatch(target, value))?;
                let mut rendered = Vec::with_capacity(entries.len());
                for (key, item) in entries.iter().filter(|(_, v)| !v.is_null()) {
                    rendered.push(format!("({}.to_string(), {})", lit(key), self.value(&member.target, item)?));
                }
                format!("std::collections::HashMap::from([{}])", rendered.join(", "))
            }
            (ShapeType::Structure, _) if shape.is_unit() => "()".to_string(),
            (ShapeType::Structure, v) => self.structure(ctx.symbols.symbol(target)?, Some(target), v)?,
            (ShapeType::Union, Value::Object(entries)) => {
                let mut set_members = entries.iter();
                let (Some((name, item)), None) = (set_members.next(), set_members.next()) else {
                    return Err(CodegenError::validation(format!(
                        "protocol test value for union {} must set exactly one member",
                        target
                    )));
                };
                let member = shape.member(name).ok_or_else(|| self.mismatch(target, value))?;
                let names = ctx.symbols.member(target, name)?;
                let inner = if ctx.shape(&member.target)?.is_unit() {
                    format!("{}::primitives::Unit {{}}", self.crate_ident)
                } else {
                    self.value(&member.target, item)?
                };
                let inner = if names.boxed { format!("Box::new({})", inner) } else { inner };
                format!("{}::{}({})", self.external(ctx.symbols.symbol(target)?), names.variant, inner)
            }
            _ => return Err(self.mismatch(target, value)),
        };
        Ok(rendered)
    }
}

// =============================================================================
// Cases
// =============================================================================

fn ignore_nan(w: &mut CodeWriter, renderer: &ValueRenderer) {
    if renderer.saw_nan {
        w.line("#[ignore = \"NaN never compares equal\"]");
    }
}

fn emit_request_case(
    ctx: &CodegenContext,
    w: &mut CodeWriter,
    set: &ProtocolTestSet,
    case: &HttpRequestTestCase,
    name: &str,
) -> Result<()> {
    let op = ctx
        .index
        .operation(&set.operation)
        .ok_or_else(|| CodegenError::validation(format!("{} is not an operation of the service", set.operation)))?;
    let symbols = ctx.symbols.operation(&op.id)?;
    let mut renderer = ValueRenderer::new(ctx);
    let input = renderer.structure(&symbols.input, op.input.as_ref(), &case.params)?;
    let endpoint = match &case.host {
        Some(host) => format!("https://{}", host),
        None => DEFAULT_ENDPOINT.to_string(),
    };

    w.doc(case.documentation.as_deref());
    w.line("#[test]");
    ignore_nan(w, &renderer);
    w.open(format!("fn {}() {{", name));
    w.line(format!("let input = {};", input));
    w.line(format!(
        "let request = {}::serialize_request(&input, {}).expect(\"request serializes\");",
        renderer.external(&symbols.operation),
        lit(&endpoint)
    ));
    w.line(format!("assert_eq!(request.method, {});", lit(&case.method)));
    let path = case.uri.split('?').next().unwrap_or(&case.uri);
    w.line(format!("assert_eq!(request.path(), {});", lit(path)));

    let list = |items: &[String]| items.iter().map(|i| lit(i)).collect::<Vec<_>>().join(", ");
    if !case.query_params.is_empty() {
        w.line(format!("support::assert_query(&request, &[{}]);", list(&case.query_params)));
    }
    if !case.forbid_query_params.is_empty() {
        w.line(format!(
            "support::assert_forbidden_query(&request, &[{}]);",
            list(&case.forbid_query_params)
        ));
    }
    if !case.require_query_params.is_empty() {
        w.line(format!(
            "support::assert_required_query(&request, &[{}]);",
            list(&case.require_query_params)
        ));
    }
    if !case.headers.is_empty() {
        let pairs: Vec<String> = case
            .headers
            .iter()
            .map(|(k, v)| format!("({}, {})", lit(k), lit(v)))
            .collect();
        w.line(format!("support::assert_headers(&request, &[{}]);", pairs.join(", ")));
    }
    if !case.forbid_headers.is_empty() {
        w.line(format!(
            "support::assert_forbidden_headers(&request, &[{}]);",
            list(&case.forbid_headers)
        ));
    }
    if !case.require_headers.is_empty() {
        w.line(format!(
            "support::assert_required_headers(&request, &[{}]);",
            list(&case.require_headers)
        ));
    }
    if let Some(body) = &case.body {
        if is_json_body(case.body_media_type.as_deref(), ctx.index.protocol) {
            w.line(format!("support::assert_json_body(&request.body, {});", lit(body)));
        } else {
            w.line(format!("assert_eq!(String::from_utf8_lossy(&request.body), {});", lit(body)));
        }
    }
    w.close("}");
    Ok(())
}

fn emit_response_case(
    ctx: &CodegenContext,
    w: &mut CodeWriter,
    set: &ProtocolTestSet,
    case: &HttpResponseTestCase,
    name: &str,
) -> Result<()> {
    let op = ctx
        .index
        .operation(&set.operation)
        .ok_or_else(|| CodegenError::validation(format!("{} is not an operation of the service", set.operation)))?;
    let symbols = ctx.symbols.operation(&op.id)?;
    let mut renderer = ValueRenderer::new(ctx);
    let expected = match &set.error {
        Some(error) => renderer.structure(ctx.symbols.symbol(error)?, Some(error), &case.params)?,
        None => renderer.structure(&symbols.output, op.output.as_ref(), &case.params)?,
    };

    w.doc(case.documentation.as_deref());
    w.line("#[test]");
    ignore_nan(w, &renderer);
    w.open(format!("fn {}() {{", name));
    w.line(format!(
        "let response = {}::primitives::HttpResponse::new({})",
        renderer.crate_ident, case.code
    ));
    for (header, value) in &case.headers {
        w.line(format!("    .with_header({}, {})", lit(header), lit(value)));
    }
    w.line(format!("    .with_body({});", lit(case.body.as_deref().unwrap_or(""))));
    w.line(format!("let expected = {};", expected));
    let operation = renderer.external(&symbols.operation);
    match &set.error {
        None => {
            w.line(format!(
                "let output = {}::parse_response(&response).expect(\"response parses\");",
                operation
            ));
            w.line("assert_eq!(output, expected);");
        }
        Some(error) => {
            let variant = &ctx.symbols.symbol(error)?.name;
            w.line(format!(
                "let error = {}::parse_response(&response).expect_err(\"response is an error\");",
                operation
            ));
            w.open("match error {");
            w.line(format!(
                "{}::{}(actual) => assert_eq!(actual, expected),",
                renderer.external(&symbols.error),
                variant
            ));
            w.line("other => panic!(\"unexpected error: {:?}\", other),");
            w.close("}");
        }
    }
    w.close("}");
    Ok(())
}

fn set_module(set: &ProtocolTestSet) -> String {
    let kind = if set.trait_id == traits::HTTP_REQUEST_TESTS {
        "request"
    } else {
        "response"
    };
    format!("{}_{}", naming::to_snake_case(set.shape.name()), kind)
}

/// `tests/protocol_tests.rs`, or `None` when the service declares no cases
pub fn emit(ctx: &CodegenContext) -> Result<Option<GeneratedFile>> {
    if ctx.index.protocol_tests.is_empty() {
        return Ok(None);
    }
    let mut w = ctx.writer();
    w.raw(&ctx.render("protocol_test_support.rs", &json!({ "crate_ident": ctx.crate_ident() }))?);

    let mut modules = NameAllocator::for_fields();
    for set in &ctx.index.protocol_tests {
        let (module, _) = modules.allocate(&set_module(set));
        w.blank();
        w.line(format!("/// `{}` on `{}`", set.trait_id, set.shape));
        w.open(format!("mod {} {{", naming::unescaped(&module)));
        w.line("#[allow(unused_imports)]");
        w.line("use super::support;");

        let mut names = NameAllocator::for_fields();
        names.reserve("support");
        match &set.cases {
            TestCases::Request(cases) => {
                for case in cases {
                    let (name, _) = names.allocate(&naming::to_snake_case(&case.id));
                    w.blank();
                    emit_request_case(ctx, &mut w, set, case, naming::unescaped(&name))?;
                }
            }
            TestCases::Response(cases) => {
                for case in cases {
                    let (name, _) = names.allocate(&naming::to_snake_case(&case.id));
                    w.blank();
                    emit_response_case(ctx, &mut w, set, case, naming::unescaped(&name))?;
                }
            }
        }
        w.close("}");
    }
    Ok(Some(w.into_file("tests/protocol_tests.rs")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CodegenSettings;
    use crate::model::load_from_str;
    use crate::{symbols, traits as interpreter};

    fn render() -> String {
        let model = load_from_str(
            &json!({
                "smithy": "2.0",
                "shapes": {
                    "example#Weather": {
                        "type": "service",
                        "operations": [ { "target": "example#GetCity" } ],
                        "traits": { "aws.protocols#restJson1": {} }
                    },
                    "example#GetCity": {
                        "type": "operation",
                        "input": { "target": "example#GetCityInput" },
                        "output": { "target": "example#GetCityOutput" },
                        "errors": [ { "target": "example#NoSuchCity" } ],
                        "traits": {
                            "smithy.api#http": { "method": "GET", "uri": "/cities/{cityId}" },
                            "smithy.test#httpRequestTests": [
                                {
                                    "id": "GetCityRequest",
                                    "protocol": "aws.protocols#restJson1",
                                    "method": "GET",
                                    "uri": "/cities/123",
                                    "params": { "cityId": "123" }
                                }
                            ],
                            "smithy.test#httpResponseTests": [
                                {
                                    "id": "GetCityResponse",
                                    "protocol": "aws.protocols#restJson1",
                                    "code": 200,
                                    "body": "{\"name\":\"Seattle\",\"population\":750000,\"tags\":[\"rain\"]}",
                                    "params": { "name": "Seattle", "population": 750000, "tags": ["rain"] }
                                }
                            ]
                        }
                    },
                    "example#GetCityInput": {
                        "type": "structure",
                        "members": {
                            "cityId": { "target": "smithy.api#String", "traits": { "smithy.api#required": {}, "smithy.api#httpLabel": {} } }
                        }
                    },
                    "example#GetCityOutput": {
                        "type": "structure",
                        "members": {
                            "name": { "target": "smithy.api#String" },
                            "population": { "target": "smithy.api#Long" },
                            "tags": { "target": "example#TagList" }
                        }
                    },
                    "example#TagList": { "type": "list", "member": { "target": "smithy.api#String" } },
                    "example#NoSuchCity": {
                        "type": "structure",
                        "members": { "message": { "target": "smithy.api#String" } },
                        "traits": {
                            "smithy.api#error": "client",
                            "smithy.api#httpError": 404,
                            "smithy.test#httpResponseTests": [
                                {
                                    "id": "NoSuchCityError",
                                    "protocol": "aws.protocols#restJson1",
                                    "code": 404,
                                    "headers": { "X-Amzn-Errortype": "NoSuchCity" },
                                    "body": "{\"message\":\"gone\"}",
                                    "params": { "message": "gone" }
                                }
                            ]
                        }
                    }
                }
            })
            .to_string(),
        )
        .unwrap();
        let mut settings = CodegenSettings::default();
        settings.module.name = "weather-client".to_string();
        let index = interpreter::interpret(&model, &settings).unwrap();
        let table = symbols::build(&model, &index, &settings).unwrap();
        let ctx = CodegenContext::new(&model, &index, &table, &settings).unwrap();
        emit(&ctx).unwrap().unwrap().render()
    }

    #[test]
    fn test_one_module_per_trait_instance() {
        let out = render();
        assert!(out.contains("mod get_city_request {"));
        assert!(out.contains("mod get_city_response {"));
        assert!(out.contains("mod no_such_city_response {"));
        assert!(out.contains("use weather_client::primitives::HttpRequest;"));
    }

    #[test]
    fn test_request_case() {
        let out = render();
        assert!(out.contains("let input = weather_client::input::GetCityInput::builder().set_city_id(Some(\"123\".to_string())).build();"));
        assert!(out.contains("weather_client::operation::GetCity::serialize_request(&input, \"https://example.com\")"));
        assert!(out.contains("assert_eq!(request.path(), \"/cities/123\");"));
    }

    #[test]
    fn test_response_cases() {
        let out = render();
        assert!(out.contains(".set_population(Some(750000_i64))"));
        assert!(out.contains(".set_tags(Some(vec![\"rain\".to_string()]))"));
        assert!(out.contains("weather_client::error::GetCityError::NoSuchCityError(actual) => assert_eq!(actual, expected),"));
    }
}
