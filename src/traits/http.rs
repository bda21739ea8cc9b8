//! HTTP Bindings
//!
//! Parses the `http` trait of an operation and the member location traits
//! (`httpLabel`, `httpQuery`, `httpHeader`, ...) of its input, output, and
//! error structures.

use serde::Serialize;
use serde_json::Value;

use super::protocol::Protocol;
use crate::error::{CodegenError, Result};
use crate::model::{traits, Member, Model, Shape, ShapeId, ShapeType};

// =============================================================================
// Operation `http` Trait
// =============================================================================

/// One path segment of a URI pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum UriSegment {
    Literal(String),
    Label(String),
    /// `{name+}`: may span several segments
    GreedyLabel(String),
}

/// Parsed `uri` of an `http` trait
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UriPattern {
    pub segments: Vec<UriSegment>,
    /// Constant query string pairs (`/things?type=list`); empty value for bare keys
    pub query: Vec<(String, String)>,
}

impl UriPattern {
    pub fn parse(uri: &str) -> std::result::Result<Self, String> {
        if !uri.starts_with('/') {
            return Err(format!("uri `{}` must start with `/`", uri));
        }
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (uri, None),
        };

        let mut segments = Vec::new();
        let mut saw_greedy = false;
        for raw in path.split('/').skip(1) {
            if raw.is_empty() {
                continue;
            }
            let segment = match raw.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(label) => {
                    if let Some(name) = label.strip_suffix('+') {
                        if saw_greedy {
                            return Err(format!("uri `{}` has more than one greedy label", uri));
                        }
                        saw_greedy = true;
                        UriSegment::GreedyLabel(name.to_string())
                    } else {
                        UriSegment::Label(label.to_string())
                    }
                }
                None if raw.contains('{') || raw.contains('}') => {
                    return Err(format!("label in uri `{}` must span a whole segment", uri));
                }
                None => UriSegment::Literal(raw.to_string()),
            };
            segments.push(segment);
        }

        let mut pairs = Vec::new();
        for pair in query.into_iter().flat_map(|q| q.split('&')).filter(|p| !p.is_empty()) {
            if pair.contains('{') {
                return Err(format!("query labels are not allowed in uri `{}`", uri));
            }
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            pairs.push((key.to_string(), value.to_string()));
        }

        Ok(Self {
            segments,
            query: pairs,
        })
    }

    /// Label names in path order
    pub fn labels(&self) -> impl Iterator<Item = (&str, bool)> {
        self.segments.iter().filter_map(|s| match s {
            UriSegment::Label(name) => Some((name.as_str(), false)),
            UriSegment::GreedyLabel(name) => Some((name.as_str(), true)),
            UriSegment::Literal(_) => None,
        })
    }
}

/// The `http` trait of an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpTrait {
    pub method: String,
    pub uri: UriPattern,
    pub code: u16,
}

pub fn parse_http_trait(operation: &Shape) -> Result<Option<HttpTrait>> {
    let Some(value) = operation.traits.get(traits::HTTP) else {
        return Ok(None);
    };
    let invalid = |reason: String| CodegenError::validation(format!("{}: invalid http trait: {}", operation.id, reason));

    let method = value
        .get("method")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("missing `method`".to_string()))?;
    let uri = value
        .get("uri")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("missing `uri`".to_string()))?;
    let code = match value.get("code") {
        None => 200,
        Some(code) => code
            .as_u64()
            .filter(|c| (100..600).contains(c))
            .ok_or_else(|| invalid(format!("`code` {} is not an HTTP status", code)))? as u16,
    };

    Ok(Some(HttpTrait {
        method: method.to_ascii_uppercase(),
        uri: UriPattern::parse(uri).map_err(invalid)?,
        code,
    }))
}

// =============================================================================
// Member Bindings
// =============================================================================

/// Wire format of a timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimestampFormat {
    DateTime,
    HttpDate,
    EpochSeconds,
}

impl TimestampFormat {
    pub fn from_trait(value: &str) -> Option<Self> {
        match value {
            "date-time" => Some(Self::DateTime),
            "http-date" => Some(Self::HttpDate),
            "epoch-seconds" => Some(Self::EpochSeconds),
            _ => None,
        }
    }

    /// Variant name of the generated runtime's `TimestampFormat`
    pub fn variant(&self) -> &'static str {
        match self {
            Self::DateTime => "DateTime",
            Self::HttpDate => "HttpDate",
            Self::EpochSeconds => "EpochSeconds",
        }
    }
}

/// How an `httpPayload` member is carried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PayloadKind {
    /// Structure or union serialized as the JSON document
    Json,
    Document,
    Blob { streaming: bool },
    Text,
}

/// Where a member lives in an HTTP message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum HttpLocation {
    Label { greedy: bool },
    Query(String),
    QueryParams,
    Header(String),
    PrefixHeaders(String),
    Payload(PayloadKind),
    ResponseCode,
    /// Unbound members go into the JSON document
    Body,
}

/// A member with its resolved location
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberBinding {
    pub member: String,
    pub target: ShapeId,
    pub location: HttpLocation,
    /// JSON key for body members (`jsonName` or the member name)
    pub wire_name: String,
    pub timestamp_format: Option<TimestampFormat>,
    pub required: bool,
}

/// Which message a structure is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingRole {
    Input,
    Output,
    Error,
}

const LOCATION_TRAITS: &[&str] = &[
    traits::HTTP_LABEL,
    traits::HTTP_QUERY,
    traits::HTTP_QUERY_PARAMS,
    traits::HTTP_HEADER,
    traits::HTTP_PREFIX_HEADERS,
    traits::HTTP_PAYLOAD,
    traits::HTTP_RESPONSE_CODE,
];

/// Resolve the location of every member of `structure`.
///
/// Non-REST protocols put every member in the body.
pub fn member_bindings(
    model: &Model,
    structure: &Shape,
    role: BindingRole,
    protocol: Protocol,
) -> Result<Vec<MemberBinding>> {
    let mut bindings = Vec::with_capacity(structure.members.len());

    for member in &structure.members {
        let member_id = structure.id.with_member(&member.name);
        let target = model.target(member)?;
        let applied: Vec<&str> = LOCATION_TRAITS
            .iter()
            .copied()
            .filter(|t| member.traits.has(t))
            .collect();
        if protocol.is_rest() && applied.len() > 1 {
            return Err(CodegenError::unsupported(
                &member_id,
                applied[1],
                format!("member is also bound with {}", applied[0]),
            ));
        }

        let location = match applied.first().copied().filter(|_| protocol.is_rest()) {
            None => HttpLocation::Body,
            Some(traits::HTTP_LABEL) => HttpLocation::Label { greedy: false },
            Some(traits::HTTP_QUERY) => HttpLocation::Query(string_trait(&member.traits, traits::HTTP_QUERY, &member_id)?),
            Some(traits::HTTP_QUERY_PARAMS) => HttpLocation::QueryParams,
            Some(traits::HTTP_HEADER) => HttpLocation::Header(string_trait(&member.traits, traits::HTTP_HEADER, &member_id)?),
            Some(traits::HTTP_PREFIX_HEADERS) => {
                HttpLocation::PrefixHeaders(string_trait(&member.traits, traits::HTTP_PREFIX_HEADERS, &member_id)?)
            }
            Some(traits::HTTP_PAYLOAD) => HttpLocation::Payload(payload_kind(target, &member_id)?),
            Some(_) => HttpLocation::ResponseCode,
        };

        let input_only = matches!(
            location,
            HttpLocation::Label { .. } | HttpLocation::Query(_) | HttpLocation::QueryParams
        );
        if input_only && role != BindingRole::Input {
            return Err(CodegenError::validation(format!(
                "{}: label and query bindings are only allowed on operation input",
                member_id
            )));
        }
        if location == HttpLocation::ResponseCode && role == BindingRole::Input {
            return Err(CodegenError::validation(format!(
                "{}: httpResponseCode is only allowed on output and error structures",
                member_id
            )));
        }

        if target.traits.has(traits::STREAMING) {
            if target.shape_type == ShapeType::Union {
                return Err(CodegenError::unsupported(
                    &member_id,
                    traits::STREAMING,
                    "event streams are not supported",
                ));
            }
            if !matches!(location, HttpLocation::Payload(PayloadKind::Blob { .. })) {
                return Err(CodegenError::unsupported(
                    &member_id,
                    traits::STREAMING,
                    "streaming blobs must be bound with httpPayload",
                ));
            }
        }

        let wire_name = wire_name(member, protocol);
        let timestamp_format = timestamp_format(member, target)?;

        bindings.push(MemberBinding {
            member: member.name.clone(),
            target: member.target.clone(),
            location,
            wire_name,
            timestamp_format,
            required: member.is_required(),
        });
    }

    let payloads = bindings
        .iter()
        .filter(|b| matches!(b.location, HttpLocation::Payload(_)))
        .count();
    if payloads > 1 {
        return Err(CodegenError::validation(format!(
            "{} has more than one httpPayload member",
            structure.id
        )));
    }
    if payloads == 1 && bindings.iter().any(|b| b.location == HttpLocation::Body) {
        return Err(CodegenError::unsupported(
            &structure.id,
            traits::HTTP_PAYLOAD,
            "httpPayload cannot be combined with unbound body members",
        ));
    }

    Ok(bindings)
}

/// JSON key of a member (`jsonName` when the protocol honors it)
pub fn wire_name(member: &Member, protocol: Protocol) -> String {
    match member.traits.string(traits::JSON_NAME) {
        Some(json_name) if protocol.honors_json_name() => json_name.to_string(),
        _ => member.name.clone(),
    }
}

/// `timestampFormat` of the member, falling back to its target
pub fn timestamp_format(member: &Member, target: &Shape) -> Result<Option<TimestampFormat>> {
    member
        .traits
        .string(traits::TIMESTAMP_FORMAT)
        .or_else(|| target.traits.string(traits::TIMESTAMP_FORMAT))
        .map(|f| {
            TimestampFormat::from_trait(f).ok_or_else(|| {
                CodegenError::validation(format!("{}: unknown timestamp format `{}`", target.id, f))
            })
        })
        .transpose()
}

fn string_trait(applied: &crate::model::Traits, trait_id: &str, member: &ShapeId) -> Result<String> {
    applied
        .string(trait_id)
        .filter(|s| !s.is_empty() || trait_id == traits::HTTP_PREFIX_HEADERS)
        .map(str::to_string)
        .ok_or_else(|| CodegenError::validation(format!("{}: {} needs a non-empty string value", member, trait_id)))
}

fn payload_kind(target: &Shape, member: &ShapeId) -> Result<PayloadKind> {
    match target.shape_type {
        ShapeType::Structure | ShapeType::Union => Ok(PayloadKind::Json),
        ShapeType::Document => Ok(PayloadKind::Document),
        ShapeType::Blob => Ok(PayloadKind::Blob {
            streaming: target.traits.has(traits::STREAMING),
        }),
        ShapeType::String | ShapeType::Enum => Ok(PayloadKind::Text),
        other => Err(CodegenError::unsupported(
            member,
            traits::HTTP_PAYLOAD,
            format!("payloads targeting {} shapes are not supported", other),
        )),
    }
}

/// Every uri label needs a required `httpLabel` member and every `httpLabel`
/// member needs a label.
pub fn validate_labels(operation: &ShapeId, http: &HttpTrait, input: &mut [MemberBinding]) -> Result<()> {
    for (label, greedy) in http.uri.labels() {
        let Some(binding) = input
            .iter_mut()
            .find(|b| b.member == label && matches!(b.location, HttpLocation::Label { .. }))
        else {
            return Err(CodegenError::validation(format!(
                "{}: uri label `{}` has no matching httpLabel member",
                operation, label
            )));
        };
        if !binding.required {
            return Err(CodegenError::validation(format!(
                "{}: httpLabel member `{}` must be required",
                operation, label
            )));
        }
        binding.location = HttpLocation::Label { greedy };
    }

    for binding in input.iter() {
        if matches!(binding.location, HttpLocation::Label { .. })
            && !http.uri.labels().any(|(label, _)| label == binding.member)
        {
            return Err(CodegenError::validation(format!(
                "{}: httpLabel member `{}` does not appear in the uri",
                operation, binding.member
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::load_from_str;
    use serde_json::json;

    #[test]
    fn test_uri_pattern_parsing() {
        let uri = UriPattern::parse("/cities/{cityId}/files/{key+}?type=list&flag").unwrap();
        assert_eq!(
            uri.segments,
            vec![
                UriSegment::Literal("cities".to_string()),
                UriSegment::Label("cityId".to_string()),
                UriSegment::Literal("files".to_string()),
                UriSegment::GreedyLabel("key".to_string()),
            ]
        );
        assert_eq!(
            uri.query,
            vec![("type".to_string(), "list".to_string()), ("flag".to_string(), String::new())]
        );
    }

    #[test]
    fn test_uri_pattern_rejects_partial_labels() {
        assert!(UriPattern::parse("/cities/id-{cityId}").is_err());
        assert!(UriPattern::parse("cities").is_err());
    }

    fn model() -> Model {
        load_from_str(
            &json!({
                "smithy": "2.0",
                "shapes": {
                    "example#Op": {
                        "type": "operation",
                        "input": { "target": "example#OpInput" },
                        "traits": { "smithy.api#http": { "method": "get", "uri": "/things/{id}" } }
                    },
                    "example#OpInput": {
                        "type": "structure",
                        "members": {
                            "id": { "target": "smithy.api#String", "traits": { "smithy.api#httpLabel": {}, "smithy.api#required": {} } },
                            "token": { "target": "smithy.api#String", "traits": { "smithy.api#httpHeader": "X-Token" } },
                            "name": { "target": "smithy.api#String", "traits": { "smithy.api#jsonName": "Name" } }
                        }
                    },
                    "example#Both": {
                        "type": "structure",
                        "members": {
                            "x": { "target": "smithy.api#String", "traits": { "smithy.api#httpHeader": "X", "smithy.api#httpQuery": "x" } }
                        }
                    }
                }
            })
            .to_string(),
        )
        .unwrap()
    }

    #[test]
    fn test_member_bindings_and_labels() {
        let model = model();
        let op = model.get(&ShapeId::parse("example#Op").unwrap()).unwrap();
        let http = parse_http_trait(op).unwrap().unwrap();
        assert_eq!(http.method, "GET");
        assert_eq!(http.code, 200);

        let input = model.get(&ShapeId::parse("example#OpInput").unwrap()).unwrap();
        let mut bindings = member_bindings(&model, input, BindingRole::Input, Protocol::RestJson1).unwrap();
        validate_labels(&op.id, &http, &mut bindings).unwrap();

        assert_eq!(bindings[0].location, HttpLocation::Label { greedy: false });
        assert_eq!(bindings[1].location, HttpLocation::Header("X-Token".to_string()));
        assert_eq!(bindings[2].location, HttpLocation::Body);
        assert_eq!(bindings[2].wire_name, "Name");
    }

    #[test]
    fn test_aws_json_ignores_http_bindings() {
        let model = model();
        let input = model.get(&ShapeId::parse("example#OpInput").unwrap()).unwrap();
        let bindings = member_bindings(&model, input, BindingRole::Input, Protocol::AwsJson1_0).unwrap();
        assert!(bindings.iter().all(|b| b.location == HttpLocation::Body));
        assert_eq!(bindings[2].wire_name, "name");
    }

    #[test]
    fn test_two_locations_is_unsupported() {
        let model = model();
        let both = model.get(&ShapeId::parse("example#Both").unwrap()).unwrap();
        let err = member_bindings(&model, both, BindingRole::Input, Protocol::RestJson1).unwrap_err();
        assert_eq!(err.category(), "unsupported-trait");
    }

    #[test]
    fn test_missing_label_member_is_validation_error() {
        let http = HttpTrait {
            method: "GET".to_string(),
            uri: UriPattern::parse("/things/{other}").unwrap(),
            code: 200,
        };
        let err = validate_labels(&ShapeId::parse("example#Op").unwrap(), &http, &mut []).unwrap_err();
        assert_eq!(err.category(), "validation");
    }
}
