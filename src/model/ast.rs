//! Smithy JSON AST
//!
//! Raw serde view of a model document, before ids are parsed and references
//! checked. The loader converts these into [`Shape`](super::Shape)s.

use jsonschema::{Draft, JSONSchema};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{CodegenError, Result};

/// JSON Schema describing the AST grammar
const AST_SCHEMA: &str = include_str!("../../schemas/smithy-ast.schema.json");

/// Top-level model document
#[derive(Debug, Clone, Deserialize)]
pub struct AstModel {
    pub smithy: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default)]
    pub shapes: Map<String, Value>,
}

/// `{ "target": "ns#Shape" }`
#[derive(Debug, Clone, Deserialize)]
pub struct AstReference {
    pub target: String,
}

/// A member definition
#[derive(Debug, Clone, Deserialize)]
pub struct AstMember {
    pub target: String,
    #[serde(default)]
    pub traits: Map<String, Value>,
}

/// A shape definition. Members stay a JSON map so their declaration order
/// survives (serde_json is built with `preserve_order`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AstShape {
    #[serde(rename = "type")]
    pub shape_type: String,
    #[serde(default)]
    pub traits: Map<String, Value>,
    #[serde(default)]
    pub members: Map<String, Value>,
    pub member: Option<AstMember>,
    pub key: Option<AstMember>,
    pub value: Option<AstMember>,
    pub input: Option<AstReference>,
    pub output: Option<AstReference>,
    #[serde(default)]
    pub errors: Vec<AstReference>,
    pub version: Option<String>,
    #[serde(default)]
    pub operations: Vec<AstReference>,
    #[serde(default)]
    pub resources: Vec<AstReference>,
    #[serde(default)]
    pub collection_operations: Vec<AstReference>,
    #[serde(default)]
    pub rename: BTreeMap<String, String>,
    #[serde(default)]
    pub identifiers: BTreeMap<String, AstReference>,
    pub create: Option<AstReference>,
    pub put: Option<AstReference>,
    pub read: Option<AstReference>,
    pub update: Option<AstReference>,
    pub delete: Option<AstReference>,
    pub list: Option<AstReference>,
}

impl AstShape {
    /// Members in declaration order
    pub fn ordered_members(&self) -> Result<Vec<(String, AstMember)>> {
        let mut members = Vec::with_capacity(self.members.len() + 2);
        for (name, value) in &self.members {
            let member: AstMember = serde_json::from_value(value.clone())
                .map_err(|e| CodegenError::parse("member", format!("member `{}`: {}", name, e)))?;
            members.push((name.clone(), member));
        }
        for (name, member) in [("member", &self.member), ("key", &self.key), ("value", &self.value)] {
            if let Some(member) = member {
                members.push((name.to_string(), member.clone()));
            }
        }
        Ok(members)
    }

    /// Resource lifecycle bindings that are present
    pub fn lifecycle(&self) -> Vec<(&'static str, &AstReference)> {
        [
            ("create", &self.create),
            ("put", &self.put),
            ("read", &self.read),
            ("update", &self.update),
            ("delete", &self.delete),
            ("list", &self.list),
        ]
        .into_iter()
        .filter_map(|(name, r)| r.as_ref().map(|r| (name, r)))
        .collect()
    }
}

/// Check a parsed document against the AST grammar.
///
/// Returns every violation found, formatted as `<pointer>: <message>`.
pub fn check_grammar(document: &Value) -> std::result::Result<(), Vec<String>> {
    let schema: Value = match serde_json::from_str(AST_SCHEMA) {
        Ok(schema) => schema,
        Err(e) => return Err(vec![format!("embedded AST schema is invalid: {}", e)]),
    };
    let compiled = match JSONSchema::options().with_draft(Draft::Draft7).compile(&schema) {
        Ok(compiled) => compiled,
        Err(e) => return Err(vec![format!("embedded AST schema failed to compile: {}", e)]),
    };

    let result = compiled.validate(document);
    if let Err(errors) = result {
        let mut messages: Vec<String> = errors
            .map(|e| {
                let pointer = e.instance_path.to_string();
                let pointer = if pointer.is_empty() { "/".to_string() } else { pointer };
                format!("{}: {}", pointer, e)
            })
            .collect();
        messages.sort();
        return Err(messages);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_grammar_accepts_minimal_model() {
        let doc = json!({
            "smithy": "2.0",
            "shapes": {
                "ns#Foo": { "type": "structure", "members": { "a": { "target": "smithy.api#String" } } }
            }
        });
        assert!(check_grammar(&doc).is_ok());
    }

    #[test]
    fn test_grammar_rejects_unknown_shape_type() {
        let doc = json!({
            "smithy": "2.0",
            "shapes": { "ns#Foo": { "type": "struct" } }
        });
        let errors = check_grammar(&doc).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("/shapes/ns#Foo/type")));
    }

    #[test]
    fn test_grammar_rejects_member_without_target() {
        let doc = json!({
            "smithy": "2.0",
            "shapes": { "ns#Foo": { "type": "structure", "members": { "a": {} } } }
        });
        assert!(check_grammar(&doc).is_err());
    }

    #[test]
    fn test_members_keep_declaration_order() {
        let shape: AstShape = serde_json::from_value(json!({
            "type": "structure",
            "members": {
                "zeta": { "target": "smithy.api#String" },
                "alpha": { "target": "smithy.api#String" }
            }
        }))
        .unwrap();
        let names: Vec<String> = shape.ordered_members().unwrap().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }
}
