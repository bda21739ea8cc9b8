//! Smithy Model
//!
//! In-memory form of a loaded Smithy model. Built once by the loader and never
//! mutated afterwards: every later stage borrows shapes from here.
//!
//! ```text
//! Model
//! ├── shapes: BTreeMap<ShapeId, Shape>   (prelude included)
//! ├── metadata
//! └── graph: ShapeGraph                  (member / operation / service edges)
//! ```

pub mod ast;
pub mod graph;
pub mod loader;
pub mod prelude;
pub mod shape_id;

pub use graph::{EdgeKind, ShapeGraph};
pub use loader::{load_from_directory, load_from_path, load_from_slice, load_from_str};
pub use prelude::traits;
pub use shape_id::{ShapeId, PRELUDE_NAMESPACE};

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{CodegenError, Result};

// =============================================================================
// Shape Type
// =============================================================================

/// The Smithy shape types
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ShapeType {
    Blob,
    Boolean,
    String,
    Byte,
    Short,
    Integer,
    IntEnum,
    Long,
    Float,
    Double,
    BigInteger,
    BigDecimal,
    Timestamp,
    Document,
    Enum,
    List,
    Set,
    Map,
    Structure,
    Union,
    Operation,
    Service,
    Resource,
}

impl ShapeType {
    pub fn from_ast(name: &str) -> Option<Self> {
        let ty = match name {
            "blob" => Self::Blob,
            "boolean" => Self::Boolean,
            "string" => Self::String,
            "byte" => Self::Byte,
            "short" => Self::Short,
            "integer" => Self::Integer,
            "intEnum" => Self::IntEnum,
            "long" => Self::Long,
            "float" => Self::Float,
            "double" => Self::Double,
            "bigInteger" => Self::BigInteger,
            "bigDecimal" => Self::BigDecimal,
            "timestamp" => Self::Timestamp,
            "document" => Self::Document,
            "enum" => Self::Enum,
            "list" => Self::List,
            "set" => Self::Set,
            "map" => Self::Map,
            "structure" => Self::Structure,
            "union" => Self::Union,
            "operation" => Self::Operation,
            "service" => Self::Service,
            "resource" => Self::Resource,
            _ => return None,
        };
        Some(ty)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Byte => "byte",
            Self::Short => "short",
            Self::Integer => "integer",
            Self::IntEnum => "intEnum",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::BigInteger => "bigInteger",
            Self::BigDecimal => "bigDecimal",
            Self::Timestamp => "timestamp",
            Self::Document => "document",
            Self::Enum => "enum",
            Self::List => "list",
            Self::Set => "set",
            Self::Map => "map",
            Self::Structure => "structure",
            Self::Union => "union",
            Self::Operation => "operation",
            Self::Service => "service",
            Self::Resource => "resource",
        }
    }

    /// Scalar shapes that map directly onto a Rust primitive or runtime type
    pub fn is_simple(&self) -> bool {
        matches!(
            self,
            Self::Blob
                | Self::Boolean
                | Self::String
                | Self::Byte
                | Self::Short
                | Self::Integer
                | Self::Long
                | Self::Float
                | Self::Double
                | Self::BigInteger
                | Self::BigDecimal
                | Self::Timestamp
                | Self::Document
        )
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Self::List | Self::Set | Self::Map)
    }

    /// Shapes that get a named Rust type of their own
    pub fn is_named_type(&self) -> bool {
        matches!(self, Self::Structure | Self::Union | Self::Enum | Self::IntEnum)
    }

    /// Shapes that may own members
    pub fn has_members(&self) -> bool {
        matches!(
            self,
            Self::Structure
                | Self::Union
                | Self::Enum
                | Self::IntEnum
                | Self::List
                | Self::Set
                | Self::Map
        )
    }
}

impl fmt::Display for ShapeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Traits
// =============================================================================

/// Traits applied to a shape or member, keyed by absolute trait id
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Traits(BTreeMap<String, Value>);

impl Traits {
    pub fn get(&self, trait_id: &str) -> Option<&Value> {
        self.0.get(trait_id)
    }

    pub fn has(&self, trait_id: &str) -> bool {
        self.0.contains_key(trait_id)
    }

    /// String value of a trait (`documentation`, `jsonName`, ...)
    pub fn string(&self, trait_id: &str) -> Option<&str> {
        self.0.get(trait_id).and_then(Value::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn insert(&mut self, trait_id: impl Into<String>, value: Value) {
        self.0.insert(trait_id.into(), value);
    }

    /// Merge `other` into self. Array values are concatenated, others replaced.
    pub(crate) fn merge(&mut self, other: Traits) {
        for (key, value) in other.0 {
            if let Value::Array(more) = &value {
                if let Some(Value::Array(existing)) = self.0.get_mut(&key) {
                    existing.extend(more.iter().cloned());
                    continue;
                }
            }
            self.0.insert(key, value);
        }
    }
}

// =============================================================================
// Member
// =============================================================================

/// A member of an aggregate shape
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Member {
    pub name: String,
    pub target: ShapeId,
    pub traits: Traits,
}

impl Member {
    pub fn is_required(&self) -> bool {
        self.traits.has(traits::REQUIRED)
    }

    pub fn documentation(&self) -> Option<&str> {
        self.traits.string(traits::DOCUMENTATION)
    }
}

// =============================================================================
// Shape
// =============================================================================

/// A named element of the model.
///
/// Fields that only apply to some shape types are empty for the others.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Shape {
    pub id: ShapeId,
    pub shape_type: ShapeType,
    pub traits: Traits,

    /// Members in declaration order (structure, union, enum, intEnum, list, set, map)
    pub members: Vec<Member>,

    /// Operation input/output/errors
    pub input: Option<ShapeId>,
    pub output: Option<ShapeId>,
    pub errors: Vec<ShapeId>,

    /// Service and resource bindings
    pub version: Option<String>,
    pub operations: Vec<ShapeId>,
    pub resources: Vec<ShapeId>,
    pub rename: BTreeMap<ShapeId, String>,

    /// Resource identifiers and lifecycle operations (create, read, ...)
    pub identifiers: BTreeMap<String, ShapeId>,
    pub lifecycle: BTreeMap<String, ShapeId>,
    pub collection_operations: Vec<ShapeId>,
}

impl Shape {
    pub fn new(id: ShapeId, shape_type: ShapeType, traits: Traits) -> Self {
        Self {
            id,
            shape_type,
            traits,
            members: Vec::new(),
            input: None,
            output: None,
            errors: Vec::new(),
            version: None,
            operations: Vec::new(),
            resources: Vec::new(),
            rename: BTreeMap::new(),
            identifiers: BTreeMap::new(),
            lifecycle: BTreeMap::new(),
            collection_operations: Vec::new(),
        }
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }

    /// The element member of a list or set
    pub fn list_member(&self) -> Option<&Member> {
        match self.shape_type {
            ShapeType::List | ShapeType::Set => self.member("member"),
            _ => None,
        }
    }

    /// The value member of a map
    pub fn map_value(&self) -> Option<&Member> {
        match self.shape_type {
            ShapeType::Map => self.member("value"),
            _ => None,
        }
    }

    pub fn is_unit(&self) -> bool {
        self.traits.has(traits::UNIT_TYPE)
    }

    pub fn is_error(&self) -> bool {
        self.traits.has(traits::ERROR)
    }

    /// A `string` carrying the legacy `enum` trait is emitted like an `enum` shape
    pub fn is_string_enum(&self) -> bool {
        self.shape_type == ShapeType::Enum
            || (self.shape_type == ShapeType::String && self.traits.has(traits::ENUM))
    }

    pub fn documentation(&self) -> Option<&str> {
        self.traits.string(traits::DOCUMENTATION)
    }

    /// Every shape id this shape refers to, in a stable order
    pub fn references(&self) -> Vec<(EdgeKind, &ShapeId)> {
        let mut refs = Vec::new();
        for member in &self.members {
            refs.push((EdgeKind::Member, &member.target));
        }
        if let Some(input) = &self.input {
            refs.push((EdgeKind::Input, input));
        }
        if let Some(output) = &self.output {
            refs.push((EdgeKind::Output, output));
        }
        for error in &self.errors {
            refs.push((EdgeKind::Error, error));
        }
        for op in &self.operations {
            refs.push((EdgeKind::Operation, op));
        }
        for op in self.lifecycle.values() {
            refs.push((EdgeKind::Operation, op));
        }
        for op in &self.collection_operations {
            refs.push((EdgeKind::Operation, op));
        }
        for resource in &self.resources {
            refs.push((EdgeKind::Resource, resource));
        }
        for target in self.identifiers.values() {
            refs.push((EdgeKind::Identifier, target));
        }
        refs
    }
}

// =============================================================================
// Model
// =============================================================================

/// A loaded, validated Smithy model. Immutable after load.
#[derive(Debug, Clone)]
pub struct Model {
    smithy_version: String,
    metadata: BTreeMap<String, Value>,
    shapes: BTreeMap<ShapeId, Shape>,
    digest: String,
    graph: ShapeGraph,
}

impl Model {
    pub(crate) fn new(
        smithy_version: String,
        metadata: BTreeMap<String, Value>,
        shapes: BTreeMap<ShapeId, Shape>,
        digest: String,
    ) -> Self {
        let graph = ShapeGraph::build(&shapes);
        Self {
            smithy_version,
            metadata,
            shapes,
            digest,
            graph,
        }
    }

    pub fn smithy_version(&self) -> &str {
        &self.smithy_version
    }

    pub fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.metadata
    }

    /// SHA-256 of the raw input documents, hex encoded
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn graph(&self) -> &ShapeGraph {
        &self.graph
    }

    pub fn get(&self, id: &ShapeId) -> Option<&Shape> {
        self.shapes.get(id)
    }

    /// Look up a shape that must exist
    pub fn expect_shape(&self, id: &ShapeId) -> Result<&Shape> {
        self.shapes
            .get(id)
            .ok_or_else(|| CodegenError::validation(format!("shape {} is not defined in the model", id)))
    }

    /// Resolve a member's target shape
    pub fn target(&self, member: &Member) -> Result<&Shape> {
        self.expect_shape(&member.target)
    }

    pub fn shapes(&self) -> impl Iterator<Item = &Shape> {
        self.shapes.values()
    }

    pub fn shapes_of_type(&self, shape_type: ShapeType) -> impl Iterator<Item = &Shape> {
        self.shapes.values().filter(move |s| s.shape_type == shape_type)
    }

    pub fn services(&self) -> impl Iterator<Item = &Shape> {
        self.shapes_of_type(ShapeType::Service)
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Number of non-prelude shapes
    pub fn user_shape_count(&self) -> usize {
        self.shapes.keys().filter(|id| !id.is_prelude()).count()
    }
}
