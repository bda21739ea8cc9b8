//! Shape Identifiers
//!
//! `namespace#Name` with an optional `$member` suffix.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::{CodegenError, Result};

/// Namespace of the Smithy prelude
pub const PRELUDE_NAMESPACE: &str = "smithy.api";

fn shape_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)#([A-Za-z_][A-Za-z0-9_]*)(?:\$([A-Za-z_][A-Za-z0-9_]*))?$",
        )
        .expect("shape id pattern is a valid regex")
    })
}

/// An absolute shape identifier.
///
/// Ordering is namespace, then name, then member. Every map keyed by
/// `ShapeId` in this crate is a `BTreeMap`, so iteration order over a model
/// never depends on hashing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShapeId {
    namespace: String,
    name: String,
    member: Option<String>,
}

impl ShapeId {
    /// Parse an absolute shape id
    pub fn parse(value: &str) -> Result<Self> {
        let caps = shape_id_pattern().captures(value).ok_or_else(|| {
            CodegenError::parse("shape id", format!("`{}` is not a valid absolute shape id", value))
        })?;
        Ok(Self {
            namespace: caps[1].to_string(),
            name: caps[2].to_string(),
            member: caps.get(3).map(|m| m.as_str().to_string()),
        })
    }

    /// Parse a possibly-relative id, resolving bare names against `default_namespace`
    pub fn parse_relative(value: &str, default_namespace: &str) -> Result<Self> {
        if value.contains('#') {
            Self::parse(value)
        } else {
            Self::parse(&format!("{}#{}", default_namespace, value))
        }
    }

    /// Build a prelude id (`smithy.api#Name`)
    pub fn prelude(name: &str) -> Self {
        Self {
            namespace: PRELUDE_NAMESPACE.to_string(),
            name: name.to_string(),
            member: None,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn member(&self) -> Option<&str> {
        self.member.as_deref()
    }

    pub fn is_prelude(&self) -> bool {
        self.namespace == PRELUDE_NAMESPACE
    }

    /// The id of the containing shape (drops `$member`)
    pub fn root(&self) -> ShapeId {
        Self {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            member: None,
        }
    }

    /// Id of a member of this shape
    pub fn with_member(&self, member: &str) -> ShapeId {
        Self {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            member: Some(member.to_string()),
        }
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.namespace, self.name)?;
        if let Some(member) = &self.member {
            write!(f, "${}", member)?;
        }
        Ok(())
    }
}

impl FromStr for ShapeId {
    type Err = CodegenError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ShapeId {
    type Error = CodegenError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ShapeId> for String {
    fn from(id: ShapeId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_absolute() {
        let id = ShapeId::parse("example.weather#GetForecast").unwrap();
        assert_eq!(id.namespace(), "example.weather");
        assert_eq!(id.name(), "GetForecast");
        assert_eq!(id.member(), None);
        assert_eq!(id.to_string(), "example.weather#GetForecast");
    }

    #[test]
    fn test_parse_member() {
        let id = ShapeId::parse("example.weather#GetForecastInput$cityId").unwrap();
        assert_eq!(id.member(), Some("cityId"));
        assert_eq!(id.root().to_string(), "example.weather#GetForecastInput");
    }

    #[test]
    fn test_parse_relative_trait_id() {
        let id = ShapeId::parse_relative("required", PRELUDE_NAMESPACE).unwrap();
        assert_eq!(id.to_string(), "smithy.api#required");
        assert!(id.is_prelude());
    }

    #[test]
    fn test_rejects_malformed_ids() {
        assert!(ShapeId::parse("NoNamespace").is_err());
        assert!(ShapeId::parse("bad ns#Name").is_err());
        assert!(ShapeId::parse("ns#1Name").is_err());
        assert!(ShapeId::parse("ns#Name$").is_err());
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        let mut ids = vec![
            ShapeId::parse("b#A").unwrap(),
            ShapeId::parse("a#Z").unwrap(),
            ShapeId::parse("a#B").unwrap(),
        ];
        ids.sort();
        let rendered: Vec<String> = ids.iter().map(|i| i.to_string()).collect();
        assert_eq!(rendered, vec!["a#B", "a#Z", "b#A"]);
    }
}
