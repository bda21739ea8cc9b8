//! Waiters from `smithy.waiters#waitable`
//!
//! Path expressions support a subset of JMESPath:
//! - dotted field access (`Table.Status`)
//! - list projections (`Items[].Status`, `Items[*].Status`)
//! - `length(path)`
//!
//! Filters, comparisons, slices, and other functions are rejected.

use serde::Serialize;
use serde_json::Value;

use crate::error::{CodegenError, Result};
use crate::model::{traits, Shape};

const DEFAULT_MIN_DELAY: u64 = 2;
const DEFAULT_MAX_DELAY: u64 = 120;

/// One step of a path expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PathStep {
    Field(String),
    /// Apply the rest of the path to every element of a list
    Project,
}

/// A parsed waiter path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathExpr {
    pub source: String,
    pub steps: Vec<PathStep>,
    /// Wrapped in `length(...)`
    pub length: bool,
}

impl PathExpr {
    pub fn parse(source: &str) -> std::result::Result<Self, String> {
        let trimmed = source.trim();
        let (inner, length) = match trimmed.strip_prefix("length(").and_then(|s| s.strip_suffix(')')) {
            Some(inner) => (inner.trim(), true),
            None => (trimmed, false),
        };
        if inner.is_empty() {
            return Err("empty path".to_string());
        }

        let mut steps = Vec::new();
        for segment in inner.split('.') {
            let (name, projected) = match segment
                .strip_suffix("[]")
                .or_else(|| segment.strip_suffix("[*]"))
            {
                Some(name) => (name, true),
                None => (segment, false),
            };
            let valid = name
                .chars()
                .enumerate()
                .all(|(i, c)| c == '_' || c.is_ascii_alphabetic() || (i > 0 && c.is_ascii_digit()));
            if name.is_empty() || !valid {
                return Err(format!("`{}` is outside the supported path subset", segment));
            }
            steps.push(PathStep::Field(name.to_string()));
            if projected {
                steps.push(PathStep::Project);
            }
        }

        Ok(Self {
            source: source.to_string(),
            steps,
            length,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Comparator {
    StringEquals,
    BooleanEquals,
    AllStringEquals,
    AnyStringEquals,
}

impl Comparator {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "stringEquals" => Some(Self::StringEquals),
            "booleanEquals" => Some(Self::BooleanEquals),
            "allStringEquals" => Some(Self::AllStringEquals),
            "anyStringEquals" => Some(Self::AnyStringEquals),
            _ => None,
        }
    }

    /// Variant name of the generated runtime's `Comparator`
    pub fn variant(&self) -> &'static str {
        match self {
            Self::StringEquals => "StringEquals",
            Self::BooleanEquals => "BooleanEquals",
            Self::AllStringEquals => "AllStringEquals",
            Self::AnyStringEquals => "AnyStringEquals",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathMatcher {
    pub path: PathExpr,
    pub expected: String,
    pub comparator: Comparator,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Matcher {
    /// `true` matches a successful response, `false` any error
    Success(bool),
    /// Matches a modeled or unmodeled error code
    ErrorType(String),
    Output(PathMatcher),
    /// Path over `{"input": ..., "output": ...}`
    InputOutput(PathMatcher),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AcceptorState {
    Success,
    Failure,
    Retry,
}

impl AcceptorState {
    pub fn variant(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Failure => "Failure",
            Self::Retry => "Retry",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Acceptor {
    pub state: AcceptorState,
    pub matcher: Matcher,
}

/// A named waiter of one operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Waiter {
    pub name: String,
    pub documentation: Option<String>,
    pub acceptors: Vec<Acceptor>,
    /// Seconds
    pub min_delay: u64,
    pub max_delay: u64,
    pub deprecated: bool,
}

/// Parse every waiter declared on `operation`, sorted by name
pub fn resolve(operation: &Shape) -> Result<Vec<Waiter>> {
    let Some(value) = operation.traits.get(traits::WAITABLE) else {
        return Ok(Vec::new());
    };
    let Some(declared) = value.as_object() else {
        return Err(CodegenError::validation(format!(
            "{}: waitable trait must be an object",
            operation.id
        )));
    };

    let mut waiters = Vec::with_capacity(declared.len());
    for (name, definition) in declared {
        waiters.push(parse_waiter(operation, name, definition)?);
    }
    waiters.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(waiters)
}

fn parse_waiter(operation: &Shape, name: &str, definition: &Value) -> Result<Waiter> {
    let invalid = |message: String| {
        CodegenError::validation(format!("{}: waiter {}: {}", operation.id, name, message))
    };
    let unsupported = |message: String| {
        CodegenError::unsupported(&operation.id, traits::WAITABLE, format!("waiter {}: {}", name, message))
    };

    let delay = |key: &str, default: u64| match definition.get(key) {
        None => Ok(default),
        Some(v) => v
            .as_u64()
            .filter(|d| *d >= 1)
            .ok_or_else(|| invalid(format!("{} must be a positive integer", key))),
    };
    let min_delay = delay("minDelay", DEFAULT_MIN_DELAY)?;
    let max_delay = delay("maxDelay", DEFAULT_MAX_DELAY)?;
    if min_delay > max_delay {
        return Err(invalid(format!(
            "minDelay {} is greater than maxDelay {}",
            min_delay, max_delay
        )));
    }

    let raw_acceptors = definition
        .get("acceptors")
        .and_then(Value::as_array)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| invalid("needs at least one acceptor".to_string()))?;

    let mut acceptors = Vec::with_capacity(raw_acceptors.len());
    for raw in raw_acceptors {
        let state = match raw.get("state").and_then(Value::as_str) {
            Some("success") => AcceptorState::Success,
            Some("failure") => AcceptorState::Failure,
            Some("retry") => AcceptorState::Retry,
            other => return Err(invalid(format!("unknown acceptor state {:?}", other))),
        };
        let matcher = raw
            .get("matcher")
            .and_then(Value::as_object)
            .ok_or_else(|| invalid("acceptor without matcher".to_string()))?;
        let Some((kind, body)) = matcher.iter().next() else {
            return Err(invalid("empty matcher".to_string()));
        };

        let matcher = match kind.as_str() {
            "success" => Matcher::Success(body.as_bool().ok_or_else(|| invalid("success matcher must be a boolean".to_string()))?),
            "errorType" => Matcher::ErrorType(
                body.as_str()
                    .ok_or_else(|| invalid("errorType matcher must be a string".to_string()))?
                    .to_string(),
            ),
            "output" | "inputOutput" => {
                let path = body.get("path").and_then(Value::as_str).unwrap_or_default();
                let path = PathExpr::parse(path).map_err(&unsupported)?;
                let expected = body
                    .get("expected")
                    .and_then(Value::as_str)
                    .ok_or_else(|| invalid("path matcher needs `expected`".to_string()))?
                    .to_string();
                let comparator_name = body.get("comparator").and_then(Value::as_str).unwrap_or_default();
                let comparator = Comparator::parse(comparator_name)
                    .ok_or_else(|| unsupported(format!("comparator `{}` is not supported", comparator_name)))?;
                if comparator == Comparator::BooleanEquals && expected != "true" && expected != "false" {
                    return Err(invalid(format!("booleanEquals expects true or false, got `{}`", expected)));
                }
                let path_matcher = PathMatcher {
                    path,
                    expected,
                    comparator,
                };
                if kind == "output" {
                    Matcher::Output(path_matcher)
                } else {
                    Matcher::InputOutput(path_matcher)
                }
            }
            other => return Err(unsupported(format!("matcher `{}` is not supported", other))),
        };
        acceptors.push(Acceptor { state, matcher });
    }

    Ok(Waiter {
        name: name.to_string(),
        documentation: definition
            .get("documentation")
            .and_then(Value::as_str)
            .map(str::to_string),
        acceptors,
        min_delay,
        max_delay,
        deprecated: definition.get("deprecated").and_then(Value::as_bool).unwrap_or(false),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ShapeId, ShapeType, Traits};
    use serde_json::json;

    fn operation(waitable: Value) -> Shape {
        let mut applied = Traits::default();
        applied.insert(traits::WAITABLE, waitable);
        Shape::new(ShapeId::parse("example#GetCity").unwrap(), ShapeType::Operation, applied)
    }

    #[test]
    fn test_path_subset() {
        let path = PathExpr::parse("length(Items[].Status)").unwrap();
        assert!(path.length);
        assert_eq!(
            path.steps,
            vec![
                PathStep::Field("Items".to_string()),
                PathStep::Project,
                PathStep::Field("Status".to_string()),
            ]
        );
        assert!(PathExpr::parse("Items[?Status == 'x']").is_err());
        assert!(PathExpr::parse("a | b").is_err());
    }

    #[test]
    fn test_waiter_defaults_and_acceptors() {
        let waiters = resolve(&operation(json!({
            "CityExists": {
                "acceptors": [
                    { "state": "success", "matcher": { "output": { "path": "city.name", "expected": "x", "comparator": "stringEquals" } } },
                    { "state": "retry", "matcher": { "errorType": "NoSuchCity" } }
                ]
            }
        })))
        .unwrap();

        assert_eq!(waiters.len(), 1);
        assert_eq!(waiters[0].min_delay, 2);
        assert_eq!(waiters[0].max_delay, 120);
        assert_eq!(waiters[0].acceptors[1].matcher, Matcher::ErrorType("NoSuchCity".to_string()));
    }

    #[test]
    fn test_min_delay_above_max_is_validation_error() {
        let err = resolve(&operation(json!({
            "Slow": { "minDelay": 30, "maxDelay": 10, "acceptors": [ { "state": "success", "matcher": { "success": true } } ] }
        })))
        .unwrap_err();
        assert_eq!(err.category(), "validation");
    }

    #[test]
    fn test_unsupported_comparator() {
        let err = resolve(&operation(json!({
            "W": { "acceptors": [ { "state": "success", "matcher": { "output": { "path": "a", "expected": "1", "comparator": "numberEquals" } } } ] }
        })))
        .unwrap_err();
        assert_eq!(err.category(), "unsupported-trait");
    }
}
