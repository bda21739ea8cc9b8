//! Model Loading
//!
//! Loads Smithy JSON AST documents from bytes, a file, or a directory of
//! `.json` files, and assembles them into a validated [`Model`].
//!
//! Every malformed input is rejected here. Later stages may assume that all
//! ids parse, every reference resolves, and the prelude is present.

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::ast::{self, AstModel, AstReference, AstShape};
use super::prelude::prelude_shapes;
use super::{EdgeKind, Member, Model, Shape, ShapeId, ShapeType, Traits, PRELUDE_NAMESPACE};
use crate::error::{CodegenError, Result};

/// Smithy major versions this loader understands
const SUPPORTED_MAJOR_VERSIONS: std::ops::RangeInclusive<u64> = 1..=2;

/// One parsed input document
struct Document {
    origin: String,
    version: semver::Version,
    metadata: BTreeMap<String, Value>,
    shapes: Map<String, Value>,
}

/// Trait applications collected from `apply` statements
struct Application {
    origin: String,
    target: ShapeId,
    traits: Traits,
}

// =============================================================================
// Entry Points
// =============================================================================

/// Load a model from JSON AST text
pub fn load_from_str(text: &str) -> Result<Model> {
    load_from_slice(text.as_bytes(), "<string>")
}

/// Load a model from raw JSON AST bytes. `origin` names the input in errors.
pub fn load_from_slice(bytes: &[u8], origin: &str) -> Result<Model> {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let document = parse_document(bytes, origin)?;
    assemble(vec![document], format!("{:x}", hasher.finalize()))
}

/// Load a model from a file, or from every `.json` file below a directory
pub fn load_from_path(path: &Path) -> Result<Model> {
    if path.is_dir() {
        return load_from_directory(path);
    }
    let bytes = fs::read(path).map_err(CodegenError::io(path))?;
    load_from_slice(&bytes, &path.display().to_string())
}

/// Load and merge every `.json` model file below `dir`.
///
/// Files are visited in sorted path order so the digest and any error
/// reporting are stable.
pub fn load_from_directory(dir: &Path) -> Result<Model> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "directory walk failed"));
            CodegenError::Io { path, source }
        })?;
        let path = entry.path();
        if path.is_file() && path.extension().map(|ext| ext == "json").unwrap_or(false) {
            paths.push(path.to_path_buf());
        }
    }

    if paths.is_empty() {
        return Err(CodegenError::parse(
            dir.display().to_string(),
            "directory contains no .json model files",
        ));
    }

    let mut hasher = Sha256::new();
    let mut documents = Vec::with_capacity(paths.len());
    for path in &paths {
        let bytes = fs::read(path).map_err(CodegenError::io(path))?;
        hasher.update(&bytes);
        let relative = path.strip_prefix(dir).unwrap_or(path);
        documents.push(parse_document(&bytes, &relative.display().to_string())?);
    }

    info!(files = documents.len(), dir = %dir.display(), "Loading model directory");
    assemble(documents, format!("{:x}", hasher.finalize()))
}

// =============================================================================
// Document Parsing
// =============================================================================

/// JSON syntax, AST grammar, and version checks for one document
fn parse_document(bytes: &[u8], origin: &str) -> Result<Document> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| {
        CodegenError::parse(
            origin,
            format!("invalid JSON at line {} column {}: {}", e.line(), e.column(), e),
        )
    })?;

    if let Err(violations) = ast::check_grammar(&value) {
        return Err(CodegenError::parse(
            origin,
            format!("not a Smithy JSON AST document: {}", violations.join("; ")),
        ));
    }

    let model: AstModel = serde_json::from_value(value)
        .map_err(|e| CodegenError::parse(origin, e.to_string()))?;
    let version = parse_smithy_version(&model.smithy)
        .map_err(|message| CodegenError::parse(origin, message))?;

    debug!(origin, version = %version, shapes = model.shapes.len(), "Parsed model document");

    Ok(Document {
        origin: origin.to_string(),
        version,
        metadata: model.metadata,
        shapes: model.shapes,
    })
}

/// Parse the `smithy` version field. `"2.0"` and `"2"` are accepted as `2.0.0`.
fn parse_smithy_version(raw: &str) -> std::result::Result<semver::Version, String> {
    let normalized = match raw.matches('.').count() {
        0 => format!("{}.0.0", raw),
        1 => format!("{}.0", raw),
        _ => raw.to_string(),
    };
    let version = semver::Version::parse(&normalized)
        .map_err(|e| format!("invalid smithy version `{}`: {}", raw, e))?;
    if !SUPPORTED_MAJOR_VERSIONS.contains(&version.major) {
        return Err(format!(
            "unsupported smithy version `{}` (expected 1.x or 2.x)",
            raw
        ));
    }
    Ok(version)
}

// =============================================================================
// Assembly
// =============================================================================

fn assemble(documents: Vec<Document>, digest: String) -> Result<Model> {
    let mut shapes: BTreeMap<ShapeId, Shape> = BTreeMap::new();
    let mut metadata: BTreeMap<String, Value> = BTreeMap::new();
    let mut applications = Vec::new();
    let mut version = None;

    for document in documents {
        version = match version {
            Some(current) if current >= document.version => Some(current),
            _ => Some(document.version.clone()),
        };
        merge_metadata(&mut metadata, document.metadata, &document.origin)?;

        for (key, value) in document.shapes {
            let id = ShapeId::parse(&key).map_err(|e| CodegenError::parse(&document.origin, e.to_string()))?;
            let raw: AstShape = serde_json::from_value(value)
                .map_err(|e| CodegenError::parse(&document.origin, format!("shape {}: {}", id, e)))?;

            if raw.shape_type == "apply" {
                applications.push(Application {
                    origin: document.origin.clone(),
                    target: id,
                    traits: convert_traits(&raw.traits, &document.origin)?,
                });
                continue;
            }
            if id.member().is_some() {
                return Err(CodegenError::parse(
                    &document.origin,
                    format!("shape definitions cannot use a member id: {}", id),
                ));
            }

            let shape = convert_shape(id, &raw, &document.origin)?;
            match shapes.entry(shape.id.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(shape);
                }
                Entry::Occupied(existing) if existing.get() == &shape => {}
                Entry::Occupied(existing) => {
                    return Err(CodegenError::validation(format!(
                        "shape {} is defined more than once with conflicting definitions ({})",
                        existing.key(),
                        document.origin
                    )));
                }
            }
        }
    }

    for (id, shape) in prelude_shapes() {
        shapes.entry(id).or_insert(shape);
    }

    for application in applications {
        apply_traits(&mut shapes, application)?;
    }

    validate_references(&shapes)?;

    let smithy_version = version
        .map(|v| format!("{}.{}", v.major, v.minor))
        .unwrap_or_else(|| "2.0".to_string());
    let model = Model::new(smithy_version, metadata, shapes, digest);

    info!(
        shapes = model.user_shape_count(),
        services = model.services().count(),
        recursive_groups = model.graph().recursive_groups().len(),
        "Loaded model"
    );
    Ok(model)
}

/// Metadata keys from several documents: arrays concatenate, equal values
/// are kept once, anything else conflicts.
fn merge_metadata(
    into: &mut BTreeMap<String, Value>,
    from: BTreeMap<String, Value>,
    origin: &str,
) -> Result<()> {
    for (key, value) in from {
        match into.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(mut slot) => {
                let key = slot.key().clone();
                match (slot.get_mut(), value) {
                    (Value::Array(existing), Value::Array(more)) => existing.extend(more),
                    (existing, value) if *existing == value => {}
                    _ => {
                        return Err(CodegenError::validation(format!(
                            "metadata key `{}` in {} conflicts with an earlier document",
                            key, origin
                        )))
                    }
                }
            }
        }
    }
    Ok(())
}

/// Trait keys may be relative (`required`); they resolve against the prelude
fn convert_traits(raw: &Map<String, Value>, origin: &str) -> Result<Traits> {
    let mut converted = Traits::default();
    for (key, value) in raw {
        let id = ShapeId::parse_relative(key, PRELUDE_NAMESPACE)
            .map_err(|e| CodegenError::parse(origin, format!("trait id: {}", e)))?;
        converted.insert(id.to_string(), value.clone());
    }
    Ok(converted)
}

fn reference(r: &AstReference, origin: &str) -> Result<ShapeId> {
    ShapeId::parse(&r.target).map_err(|e| CodegenError::parse(origin, e.to_string()))
}

fn references(refs: &[AstReference], origin: &str) -> Result<Vec<ShapeId>> {
    refs.iter().map(|r| reference(r, origin)).collect()
}

fn convert_shape(id: ShapeId, raw: &AstShape, origin: &str) -> Result<Shape> {
    let shape_type = ShapeType::from_ast(&raw.shape_type).ok_or_else(|| {
        CodegenError::parse(origin, format!("shape {} has unknown type `{}`", id, raw.shape_type))
    })?;
    let mut shape = Shape::new(id, shape_type, convert_traits(&raw.traits, origin)?);

    let members = raw.ordered_members()?;
    if !members.is_empty() && !shape_type.has_members() {
        return Err(CodegenError::parse(
            origin,
            format!("{} shape {} cannot have members", shape_type, shape.id),
        ));
    }
    for (name, member) in members {
        let target = ShapeId::parse(&member.target)
            .map_err(|e| CodegenError::parse(origin, format!("member {}${}: {}", shape.id, name, e)))?;
        shape.members.push(Member {
            name,
            target,
            traits: convert_traits(&member.traits, origin)?,
        });
    }
    match shape_type {
        ShapeType::List | ShapeType::Set if shape.list_member().is_none() => {
            return Err(CodegenError::parse(origin, format!("{} {} has no `member`", shape_type, shape.id)));
        }
        ShapeType::Map if shape.member("key").is_none() || shape.map_value().is_none() => {
            return Err(CodegenError::parse(origin, format!("map {} needs `key` and `value`", shape.id)));
        }
        _ => {}
    }

    shape.input = raw.input.as_ref().map(|r| reference(r, origin)).transpose()?;
    shape.output = raw.output.as_ref().map(|r| reference(r, origin)).transpose()?;
    shape.errors = references(&raw.errors, origin)?;
    shape.version = raw.version.clone();
    shape.operations = references(&raw.operations, origin)?;
    shape.resources = references(&raw.resources, origin)?;
    shape.collection_operations = references(&raw.collection_operations, origin)?;
    for (from, to) in &raw.rename {
        let from = ShapeId::parse(from).map_err(|e| CodegenError::parse(origin, e.to_string()))?;
        shape.rename.insert(from, to.clone());
    }
    for (name, target) in &raw.identifiers {
        shape.identifiers.insert(name.clone(), reference(target, origin)?);
    }
    for (name, target) in raw.lifecycle() {
        shape.lifecycle.insert(name.to_string(), reference(target, origin)?);
    }

    Ok(shape)
}

fn apply_traits(shapes: &mut BTreeMap<ShapeId, Shape>, application: Application) -> Result<()> {
    let root = application.target.root();
    let unknown = |shapes: &BTreeMap<ShapeId, Shape>| {
        CodegenError::validation(format!(
            "apply statement in {} targets unknown shape {}{}",
            application.origin,
            application.target,
            suggestion(shapes, &application.target)
        ))
    };

    let Some(shape) = shapes.get_mut(&root) else {
        return Err(unknown(shapes));
    };
    match application.target.member() {
        None => shape.traits.merge(application.traits),
        Some(member_name) => match shape.members.iter_mut().find(|m| m.name == member_name) {
            Some(member) => member.traits.merge(application.traits),
            None => {
                return Err(CodegenError::validation(format!(
                    "apply statement in {} targets unknown member {}",
                    application.origin, application.target
                )))
            }
        },
    }
    debug!(target = %application.target, "Applied traits");
    Ok(())
}

// =============================================================================
// Reference Validation
// =============================================================================

/// Every reference must resolve. All failures are reported together.
fn validate_references(shapes: &BTreeMap<ShapeId, Shape>) -> Result<()> {
    let mut problems = Vec::new();
    for shape in shapes.values() {
        for (kind, target) in shape.references() {
            if !shapes.contains_key(target) {
                problems.push(format!(
                    "{} has a {:?} reference to undefined shape {}{}",
                    shape.id,
                    kind,
                    target,
                    suggestion(shapes, target)
                ));
            } else if let Some(expected) = misdirected(kind, &shapes[target]) {
                problems.push(format!(
                    "{} has a {:?} reference to {} ({}), expected {}",
                    shape.id, kind, target, shapes[target].shape_type, expected
                ));
            }
        }
        for renamed in shape.rename.keys() {
            if !shapes.contains_key(renamed) {
                problems.push(format!("{} renames undefined shape {}", shape.id, renamed));
            }
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(CodegenError::validation(problems.join("; ")))
    }
}

/// What a reference of `kind` should point at, when `target` is not that
fn misdirected(kind: EdgeKind, target: &Shape) -> Option<&'static str> {
    let ty = target.shape_type;
    match kind {
        EdgeKind::Member | EdgeKind::Identifier
            if matches!(ty, ShapeType::Operation | ShapeType::Service | ShapeType::Resource) =>
        {
            Some("a data shape")
        }
        EdgeKind::Input | EdgeKind::Output if ty != ShapeType::Structure => Some("a structure"),
        EdgeKind::Error if ty != ShapeType::Structure || !target.is_error() => {
            Some("a structure with the error trait")
        }
        EdgeKind::Operation if ty != ShapeType::Operation => Some("an operation"),
        EdgeKind::Resource if ty != ShapeType::Resource => Some("a resource"),
        _ => None,
    }
}

/// ` (did you mean ns#Name?)` for the closest defined shape name, if any
fn suggestion(shapes: &BTreeMap<ShapeId, Shape>, missing: &ShapeId) -> String {
    let matcher = SkimMatcherV2::default();
    let mut best: Option<(i64, &ShapeId)> = None;
    for id in shapes.keys().filter(|id| !id.is_prelude() || missing.is_prelude()) {
        if let Some(score) = matcher.fuzzy_match(id.name(), missing.name()) {
            // strictly greater keeps the first id in sort order on ties
            if best.map(|(s, _)| score > s).unwrap_or(true) {
                best = Some((score, id));
            }
        }
    }
    best.map(|(_, id)| format!(" (did you mean {}?)", id)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::traits;
    use serde_json::json;

    fn load(doc: Value) -> Result<Model> {
        load_from_str(&doc.to_string())
    }

    #[test]
    fn test_loads_shapes_and_merges_prelude() {
        let model = load(json!({
            "smithy": "2.0",
            "shapes": {
                "example#City": {
                    "type": "structure",
                    "members": {
                        "name": { "target": "smithy.api#String", "traits": { "required": {} } }
                    }
                }
            }
        }))
        .unwrap();

        let city = model.get(&ShapeId::parse("example#City").unwrap()).unwrap();
        assert!(city.member("name").unwrap().is_required());
        assert!(model.get(&ShapeId::prelude("String")).is_some());
        assert_eq!(model.user_shape_count(), 1);
        assert_eq!(model.smithy_version(), "2.0");
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let err = load_from_str("{ \"smithy\": ").unwrap_err();
        assert_eq!(err.category(), "parse");
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_unsupported_version_is_parse_error() {
        let err = load(json!({ "smithy": "3.0", "shapes": {} })).unwrap_err();
        assert_eq!(err.category(), "parse");
        assert!(err.to_string().contains("unsupported smithy version"));
    }

    #[test]
    fn test_version_normalization() {
        assert_eq!(parse_smithy_version("2").unwrap(), semver::Version::new(2, 0, 0));
        assert_eq!(parse_smithy_version("1.0").unwrap(), semver::Version::new(1, 0, 0));
        assert!(parse_smithy_version("0.9").is_err());
    }

    #[test]
    fn test_malformed_shape_id_is_parse_error() {
        let err = load(json!({
            "smithy": "2.0",
            "shapes": { "NoNamespace": { "type": "string" } }
        }))
        .unwrap_err();
        assert_eq!(err.category(), "parse");
    }

    #[test]
    fn test_unknown_target_suggests_closest_name() {
        let err = load(json!({
            "smithy": "2.0",
            "shapes": {
                "example#Forecast": { "type": "structure" },
                "example#Holder": {
                    "type": "structure",
                    "members": { "f": { "target": "example#Forcast" } }
                }
            }
        }))
        .unwrap_err();
        assert_eq!(err.category(), "validation");
        assert!(err.to_string().contains("did you mean example#Forecast?"));
    }

    #[test]
    fn test_member_targeting_operation_is_validation_error() {
        let err = load(json!({
            "smithy": "2.0",
            "shapes": {
                "example#GetCity": { "type": "operation" },
                "example#Holder": {
                    "type": "structure",
                    "members": { "op": { "target": "example#GetCity" } }
                }
            }
        }))
        .unwrap_err();
        assert_eq!(err.category(), "validation");
        assert!(err.to_string().contains("example#Holder has a Member reference to example#GetCity (operation)"));
    }

    #[test]
    fn test_service_operations_must_be_operations() {
        let err = load(json!({
            "smithy": "2.0",
            "shapes": {
                "example#City": { "type": "structure" },
                "example#Weather": {
                    "type": "service",
                    "version": "2006-03-01",
                    "operations": [ { "target": "example#City" } ]
                }
            }
        }))
        .unwrap_err();
        assert_eq!(err.category(), "validation");
        assert!(err.to_string().contains("expected an operation"));
    }

    #[test]
    fn test_operation_errors_need_the_error_trait() {
        let err = load(json!({
            "smithy": "2.0",
            "shapes": {
                "example#NotAnError": { "type": "structure" },
                "example#GetCity": {
                    "type": "operation",
                    "errors": [ { "target": "example#NotAnError" } ]
                }
            }
        }))
        .unwrap_err();
        assert_eq!(err.category(), "validation");
        assert!(err.to_string().contains("expected a structure with the error trait"));
    }

    #[test]
    fn test_apply_adds_traits_to_members() {
        let model = load(json!({
            "smithy": "2.0",
            "shapes": {
                "example#City": {
                    "type": "structure",
                    "members": { "name": { "target": "smithy.api#String" } }
                },
                "example#City$name": {
                    "type": "apply",
                    "traits": { "smithy.api#documentation": "City name" }
                }
            }
        }))
        .unwrap();
        let city = model.get(&ShapeId::parse("example#City").unwrap()).unwrap();
        assert_eq!(city.member("name").unwrap().documentation(), Some("City name"));
    }

    #[test]
    fn test_apply_to_unknown_shape_fails() {
        let err = load(json!({
            "smithy": "2.0",
            "shapes": {
                "example#Missing": { "type": "apply", "traits": { "documentation": "x" } }
            }
        }))
        .unwrap_err();
        assert_eq!(err.category(), "validation");
    }

    #[test]
    fn test_list_without_member_is_parse_error() {
        let err = load(json!({
            "smithy": "2.0",
            "shapes": { "example#Names": { "type": "list" } }
        }))
        .unwrap_err();
        assert_eq!(err.category(), "parse");
    }

    #[test]
    fn test_directory_merge_rejects_conflicting_definitions() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("a.json"),
            json!({ "smithy": "2.0", "shapes": { "example#Name": { "type": "string" } } }).to_string(),
        )
        .unwrap();
        fs::write(
            dir.path().join("b.json"),
            json!({ "smithy": "2.0", "shapes": { "example#Name": { "type": "integer" } } }).to_string(),
        )
        .unwrap();

        let err = load_from_directory(dir.path()).unwrap_err();
        assert_eq!(err.category(), "validation");
        assert!(err.to_string().contains("example#Name"));
    }

    #[test]
    fn test_directory_merge_accepts_identical_definitions() {
        let dir = tempfile::tempdir().unwrap();
        let doc = json!({
            "smithy": "2.0",
            "metadata": { "suppressions": [ { "id": "A" } ] },
            "shapes": { "example#Name": { "type": "string", "traits": { "sensitive": {} } } }
        })
        .to_string();
        fs::write(dir.path().join("a.json"), &doc).unwrap();
        fs::write(dir.path().join("b.json"), &doc).unwrap();

        let model = load_from_directory(dir.path()).unwrap();
        let name = model.get(&ShapeId::parse("example#Name").unwrap()).unwrap();
        assert!(name.traits.has(traits::SENSITIVE));
        assert_eq!(model.metadata()["suppressions"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_digest_is_stable() {
        let doc = json!({ "smithy": "2.0", "shapes": {} }).to_string();
        let a = load_from_str(&doc).unwrap();
        let b = load_from_str(&doc).unwrap();
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 64);
    }
}
