//! Symbol Mapper
//!
//! Binds every generated shape to a Rust name in one of the generated
//! crate's modules, and every member to a field/variant name. Names are
//! assigned once per run, visiting shapes in ascending `ShapeId` order, so
//! identical models always produce identical symbols.
//!
//! ```text
//! SymbolTable
//! ├── types:      ShapeId → Symbol            (model / input / output / error)
//! ├── members:    (ShapeId, member) → MemberSymbol
//! ├── enums:      ShapeId → [EnumVariant]
//! └── operations: ShapeId → OperationSymbols  (operation, input, output, error enum)
//! ```

pub mod naming;

pub use naming::{CaseConverter, NameAllocator};

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, info};

use crate::config::{CodegenSettings, NamingSettings};
use crate::error::{CodegenError, Result};
use crate::model::{traits, Model, Shape, ShapeId, ShapeType};
use crate::traits::ServiceIndex;

// =============================================================================
// Symbols
// =============================================================================

/// Module of the generated crate a type lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Namespace {
    Model,
    Input,
    Output,
    Error,
    Operation,
}

impl Namespace {
    pub const ALL: [Namespace; 5] = [
        Namespace::Model,
        Namespace::Input,
        Namespace::Output,
        Namespace::Error,
        Namespace::Operation,
    ];

    pub fn module(&self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Input => "input",
            Self::Output => "output",
            Self::Error => "error",
            Self::Operation => "operation",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.module())
    }
}

/// Rust name of a generated type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Symbol {
    /// Shape the type is generated from. For synthesized operation inputs and
    /// outputs this is the operation.
    pub shape: ShapeId,
    pub name: String,
    pub namespace: Namespace,
    /// The base name was taken and a counter was appended
    pub disambiguated: bool,
}

impl Symbol {
    /// Absolute path inside the generated crate
    pub fn path(&self) -> String {
        format!("crate::{}::{}", self.namespace.module(), self.name)
    }

    /// Module holding the builder of this type
    pub fn builder_module(&self) -> String {
        naming::escape_keyword(&naming::to_snake_case(&self.name))
    }
}

/// Rust names of one member
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberSymbol {
    pub member: String,
    /// snake_case field or accessor name, keyword-escaped
    pub field: String,
    /// Builder method taking an `Option` (`set_city_id`), unique among the
    /// builder's methods
    pub setter: String,
    /// PascalCase variant name (unions)
    pub variant: String,
    /// The member closes a recursive cycle and is stored as `Box<T>`
    pub boxed: bool,
}

/// A variant of a generated enum
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumVariant {
    pub variant: String,
    pub value: EnumValue,
    pub documentation: Option<String>,
    pub deprecated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EnumValue {
    String(String),
    Int(i64),
}

/// Names generated for one operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationSymbols {
    /// Unit struct carrying the serializer and deserializer
    pub operation: Symbol,
    pub input: Symbol,
    pub output: Symbol,
    /// Per-operation error enum
    pub error: Symbol,
    /// Method on the generated client
    pub method: String,
    /// Fluent builder type in `client::fluent_builders`
    pub fluent_builder: String,
}

/// Every name the emitters use
#[derive(Debug, Clone, Serialize)]
pub struct SymbolTable {
    types: BTreeMap<ShapeId, Symbol>,
    members: BTreeMap<ShapeId, Vec<MemberSymbol>>,
    enums: BTreeMap<ShapeId, Vec<EnumVariant>>,
    operations: BTreeMap<ShapeId, OperationSymbols>,
}

impl SymbolTable {
    /// Symbol of a generated type
    pub fn symbol(&self, id: &ShapeId) -> Result<&Symbol> {
        self.types
            .get(id)
            .ok_or_else(|| CodegenError::validation(format!("no symbol was assigned to {}", id)))
    }

    pub fn member(&self, container: &ShapeId, member: &str) -> Result<&MemberSymbol> {
        self.members
            .get(container)
            .and_then(|ms| ms.iter().find(|m| m.member == member))
            .ok_or_else(|| CodegenError::validation(format!("no symbol was assigned to {}${}", container, member)))
    }

    /// Member symbols of a container in declaration order
    pub fn members(&self, container: &ShapeId) -> &[MemberSymbol] {
        self.members.get(container).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn enum_variants(&self, id: &ShapeId) -> Result<&[EnumVariant]> {
        self.enums
            .get(id)
            .map(Vec::as_slice)
            .ok_or_else(|| CodegenError::validation(format!("{} is not a generated enum", id)))
    }

    pub fn operation(&self, id: &ShapeId) -> Result<&OperationSymbols> {
        self.operations
            .get(id)
            .ok_or_else(|| CodegenError::validation(format!("no symbols were assigned to operation {}", id)))
    }

    /// Generated types of one module, ordered by name
    pub fn in_namespace(&self, namespace: Namespace) -> Vec<&Symbol> {
        let mut symbols: Vec<&Symbol> = self
            .types
            .values()
            .chain(self.operations.values().flat_map(|o| {
                [&o.operation, &o.error]
                    .into_iter()
                    .chain(Some(&o.input).filter(|s| s.shape == o.operation.shape))
                    .chain(Some(&o.output).filter(|s| s.shape == o.operation.shape))
            }))
            .filter(|s| s.namespace == namespace)
            .collect();
        symbols.sort_by(|a, b| a.name.cmp(&b.name));
        symbols
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Render the Rust type of a member's target.
    ///
    /// Simple shapes map onto primitives and runtime types; aggregates must
    /// have a symbol.
    pub fn rust_type(&self, model: &Model, target: &ShapeId) -> Result<String> {
        let shape = model.expect_shape(target)?;
        let rendered = match shape.shape_type {
            ShapeType::Blob => "crate::primitives::Blob".to_string(),
            ShapeType::Boolean => "bool".to_string(),
            ShapeType::String if shape.is_string_enum() => self.symbol(target)?.path(),
            ShapeType::String => "String".to_string(),
            ShapeType::Byte => "i8".to_string(),
            ShapeType::Short => "i16".to_string(),
            ShapeType::Integer => "i32".to_string(),
            ShapeType::Long => "i64".to_string(),
            ShapeType::Float => "f32".to_string(),
            ShapeType::Double => "f64".to_string(),
            ShapeType::BigInteger => "crate::primitives::BigInteger".to_string(),
            ShapeType::BigDecimal => "crate::primitives::BigDecimal".to_string(),
            ShapeType::Timestamp => "crate::primitives::DateTime".to_string(),
            ShapeType::Document => "crate::primitives::Document".to_string(),
            ShapeType::Structure if shape.is_unit() => "()".to_string(),
            ShapeType::Enum | ShapeType::IntEnum | ShapeType::Structure | ShapeType::Union => {
                self.symbol(target)?.path()
            }
            ShapeType::List | ShapeType::Set => {
                let member = shape
                    .list_member()
                    .ok_or_else(|| CodegenError::validation(format!("{} has no member", target)))?;
                format!("Vec<{}>", self.rust_type(model, &member.target)?)
            }
            ShapeType::Map => {
                let value = shape
                    .map_value()
                    .ok_or_else(|| CodegenError::validation(format!("{} has no value", target)))?;
                format!("std::collections::HashMap<String, {}>", self.rust_type(model, &value.target)?)
            }
            ShapeType::Operation | ShapeType::Service | ShapeType::Resource => {
                return Err(CodegenError::validation(format!(
                    "{} cannot be used as a member target",
                    target
                )))
            }
        };
        Ok(rendered)
    }

    /// Type of a member field, boxed when it closes a cycle (without the
    /// surrounding `Option`)
    pub fn member_type(&self, model: &Model, container: &ShapeId, member: &str, target: &ShapeId) -> Result<String> {
        let rendered = self.rust_type(model, target)?;
        Ok(if self.member(container, member)?.boxed {
            format!("Box<{}>", rendered)
        } else {
            rendered
        })
    }
}

// =============================================================================
// Mapping
// =============================================================================

/// Strip a trailing `Exception` and end error names in `Error`
fn error_base_name(name: &str) -> String {
    let stem = name.strip_suffix("Exception").unwrap_or(name);
    if stem.is_empty() {
        return name.to_string();
    }
    if stem.ends_with("Error") {
        stem.to_string()
    } else {
        format!("{}Error", stem)
    }
}

struct Mapper<'a> {
    model: &'a Model,
    index: &'a ServiceIndex,
    case: CaseConverter,
    reserved_types: BTreeSet<String>,
    rename_exceptions: bool,
    allocators: BTreeMap<Namespace, NameAllocator>,
    table: SymbolTable,
}

impl<'a> Mapper<'a> {
    fn new(model: &'a Model, index: &'a ServiceIndex, naming: &NamingSettings, rename_exceptions: bool) -> Self {
        let reserved_types: BTreeSet<String> = naming::RESERVED_TYPE_NAMES
            .iter()
            .map(|s| s.to_string())
            .chain(naming.reserved_type_names.iter().cloned())
            .collect();
        let mut allocators: BTreeMap<Namespace, NameAllocator> = Namespace::ALL
            .iter()
            .map(|ns| (*ns, NameAllocator::for_types()))
            .collect();
        if let Some(errors) = allocators.get_mut(&Namespace::Error) {
            for runtime in naming::ERROR_RUNTIME_NAMES {
                errors.reserve(runtime);
            }
        }

        Self {
            model,
            index,
            case: CaseConverter::new(&naming.acronyms),
            reserved_types,
            rename_exceptions,
            allocators,
            table: SymbolTable {
                types: BTreeMap::new(),
                members: BTreeMap::new(),
                enums: BTreeMap::new(),
                operations: BTreeMap::new(),
            },
        }
    }

    /// PascalCase base name with reserved names suffixed
    fn base_name(&self, raw: &str) -> String {
        let pascal = self.case.pascal(raw);
        if self.reserved_types.contains(&pascal) || naming::is_rust_keyword(&pascal) {
            format!("{}Value", pascal)
        } else {
            pascal
        }
    }

    fn allocate(&mut self, namespace: Namespace, shape: &ShapeId, base: &str) -> Symbol {
        let allocator = self.allocators.entry(namespace).or_insert_with(NameAllocator::for_types);
        let (name, disambiguated) = allocator.allocate(base);
        if disambiguated {
            debug!(shape = %shape, base, name = %name, "Disambiguated type name");
        }
        Symbol {
            shape: shape.clone(),
            name,
            namespace,
            disambiguated,
        }
    }

    /// Shape name after the service `rename` map
    fn shape_name(&self, id: &ShapeId) -> String {
        self.index
            .rename
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.name().to_string())
    }

    fn run(mut self) -> Result<SymbolTable> {
        self.map_operations()?;
        self.map_errors()?;
        self.map_model_types()?;
        self.map_members()?;
        Ok(self.table)
    }

    /// Operation unit structs, inputs, outputs, and error enums
    fn map_operations(&mut self) -> Result<()> {
        let mut methods = NameAllocator::for_fields();
        for reserved in ["new", "config", "from_conf", "with_connector"] {
            methods.reserve(reserved);
        }

        let index = self.index;
        for op in &index.operations {
            let name = self.shape_name(&op.id);
            let base = self.base_name(&name);
            let operation = self.allocate(Namespace::Operation, &op.id, &base);

            let input = match &op.input {
                Some(id) if self.table.types.contains_key(id) => self.table.types[id].clone(),
                Some(id) => {
                    let symbol = self.allocate(Namespace::Input, id, &format!("{}Input", operation.name));
                    self.table.types.insert(id.clone(), symbol.clone());
                    symbol
                }
                None => self.allocate(Namespace::Input, &op.id, &format!("{}Input", operation.name)),
            };
            let output = match &op.output {
                Some(id) if self.table.types.contains_key(id) => self.table.types[id].clone(),
                Some(id) => {
                    let symbol = self.allocate(Namespace::Output, id, &format!("{}Output", operation.name));
                    self.table.types.insert(id.clone(), symbol.clone());
                    symbol
                }
                None => self.allocate(Namespace::Output, &op.id, &format!("{}Output", operation.name)),
            };

            let (method, _) = methods.allocate(&naming::field_name(&name));
            let error = self.allocate(Namespace::Error, &op.id, &format!("{}Error", operation.name));
            let fluent_builder = operation.name.clone();
            debug!(operation = %op.id, name = %operation.name, method = %method, "Mapped operation");
            self.table.operations.insert(
                op.id.clone(),
                OperationSymbols {
                    operation,
                    input,
                    output,
                    error,
                    method,
                    fluent_builder,
                },
            );
        }
        Ok(())
    }

    /// Modeled error structures live next to the operation error enums
    fn map_errors(&mut self) -> Result<()> {
        let index = self.index;
        for id in index.errors.keys() {
            let raw = self.shape_name(id);
            let base = if self.rename_exceptions {
                self.base_name(&error_base_name(&raw))
            } else {
                self.base_name(&raw)
            };
            let symbol = self.allocate(Namespace::Error, id, &base);
            self.table.types.insert(id.clone(), symbol);
        }
        Ok(())
    }

    /// Structures, unions, and enums of the service closure
    fn map_model_types(&mut self) -> Result<()> {
        let (index, model) = (self.index, self.model);
        for id in &index.shapes {
            if self.table.types.contains_key(id) {
                continue;
            }
            let shape = model.expect_shape(id)?;
            let generated = match shape.shape_type {
                ShapeType::Structure => !shape.is_unit(),
                ShapeType::Union | ShapeType::Enum | ShapeType::IntEnum => true,
                ShapeType::String => shape.is_string_enum(),
                _ => false,
            };
            if !generated {
                continue;
            }
            let base = self.base_name(&self.shape_name(id));
            let symbol = self.allocate(Namespace::Model, id, &base);
            self.table.types.insert(id.clone(), symbol);
        }
        Ok(())
    }

    fn map_members(&mut self) -> Result<()> {
        let model = self.model;
        let ids: Vec<ShapeId> = self.table.types.keys().cloned().collect();
        for id in ids {
            let shape = model.expect_shape(&id)?;
            match shape.shape_type {
                ShapeType::Structure | ShapeType::Union => {
                    let members = self.member_symbols(shape);
                    self.table.members.insert(id, members);
                }
                ShapeType::Enum | ShapeType::IntEnum | ShapeType::String => {
                    let variants = self.enum_variants(shape)?;
                    self.table.enums.insert(id, variants);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn member_symbols(&self, shape: &Shape) -> Vec<MemberSymbol> {
        let mut fields = NameAllocator::for_fields();
        let mut variants = NameAllocator::for_types();
        let named: Vec<(String, String)> = shape
            .members
            .iter()
            .map(|member| {
                let (field, _) = fields.allocate(&naming::field_name(&member.name));
                let (variant, _) = variants.allocate(&naming::variant_name(self.case.pascal(&member.name)));
                (field, variant)
            })
            .collect();

        // builder methods share one namespace: fields, setters, and `build`
        let mut methods = NameAllocator::for_fields();
        methods.reserve("build");
        for (field, _) in &named {
            methods.reserve(field);
        }
        shape
            .members
            .iter()
            .zip(named)
            .map(|(member, (field, variant))| {
                let (setter, _) = methods.allocate(&format!("set_{}", naming::unescaped(&field)));
                MemberSymbol {
                    member: member.name.clone(),
                    field,
                    setter,
                    variant,
                    boxed: self.model.graph().needs_boxing(&shape.id, &member.name),
                }
            })
            .collect()
    }

    fn enum_variants(&self, shape: &Shape) -> Result<Vec<EnumVariant>> {
        let mut names = NameAllocator::for_types();
        names.reserve("Unknown");
        let mut variants = Vec::new();

        if shape.shape_type == ShapeType::String {
            // legacy `enum` trait: [{ value, name?, documentation?, deprecated? }]
            let entries = shape
                .traits
                .get(traits::ENUM)
                .and_then(Value::as_array)
                .ok_or_else(|| CodegenError::validation(format!("{}: enum trait must be a list", shape.id)))?;
            for entry in entries {
                let value = entry
                    .get("value")
                    .and_then(Value::as_str)
                    .ok_or_else(|| CodegenError::validation(format!("{}: enum entry without value", shape.id)))?;
                let raw = entry.get("name").and_then(Value::as_str).unwrap_or(value);
                let (variant, _) = names.allocate(&naming::variant_name(self.case.pascal(raw)));
                variants.push(EnumVariant {
                    variant,
                    value: EnumValue::String(value.to_string()),
                    documentation: entry.get("documentation").and_then(Value::as_str).map(str::to_string),
                    deprecated: entry.get("deprecated").and_then(Value::as_bool).unwrap_or(false),
                });
            }
            return Ok(variants);
        }

        for member in &shape.members {
            let declared = member.traits.get(traits::ENUM_VALUE);
            let value = match (shape.shape_type, declared) {
                (ShapeType::IntEnum, Some(v)) => EnumValue::Int(v.as_i64().ok_or_else(|| {
                    CodegenError::validation(format!("{}${}: intEnum value must be an integer", shape.id, member.name))
                })?),
                (ShapeType::IntEnum, None) => {
                    return Err(CodegenError::validation(format!(
                        "{}${}: intEnum members need an enumValue",
                        shape.id, member.name
                    )))
                }
                (_, Some(v)) => EnumValue::String(
                    v.as_str()
                        .ok_or_else(|| {
                            CodegenError::validation(format!("{}${}: enum value must be a string", shape.id, member.name))
                        })?
                        .to_string(),
                ),
                (_, None) => EnumValue::String(member.name.clone()),
            };
            let (variant, _) = names.allocate(&naming::variant_name(self.case.pascal(&member.name)));
            variants.push(EnumVariant {
                variant,
                value,
                documentation: member.documentation().map(str::to_string),
                deprecated: member.traits.has(traits::DEPRECATED),
            });
        }
        Ok(variants)
    }
}

/// Assign symbols for every generated shape of the service
pub fn build(model: &Model, index: &ServiceIndex, settings: &CodegenSettings) -> Result<SymbolTable> {
    let table = Mapper::new(model, index, &settings.naming, settings.codegen.rename_exceptions).run()?;
    info!(
        types = table.type_count(),
        operations = table.operations.len(),
        "Mapped symbols"
    );
    Ok(table)
}
