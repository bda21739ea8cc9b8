//! Structure, union, and enum emission
//!
//! Every structure member becomes an `Option` field with a serde rename to
//! its wire name. Each structure gets a builder in a sibling module named
//! after the type (`city_summary::Builder`).

use crate::error::{CodegenError, Result};
use crate::model::{traits, Member, Shape, ShapeType};
use crate::symbols::{naming, EnumValue, Namespace, Symbol};
use crate::traits::http::{self, TimestampFormat};

use super::{lit, CodeWriter, CodegenContext, GeneratedFile};

const REDACTED: &str = "*** Sensitive Data Redacted ***";

// =============================================================================
// Public API
// =============================================================================

/// `src/model.rs`, `src/input.rs`, and `src/output.rs`
pub fn emit(ctx: &CodegenContext) -> Result<Vec<GeneratedFile>> {
    let mut files = Vec::new();
    for (namespace, path) in [
        (Namespace::Model, "src/model.rs"),
        (Namespace::Input, "src/input.rs"),
        (Namespace::Output, "src/output.rs"),
    ] {
        let mut w = ctx.writer();
        for symbol in ctx.symbols.in_namespace(namespace) {
            emit_type(ctx, &mut w, symbol)?;
            w.blank();
        }
        files.push(w.into_file(path));
    }
    Ok(files)
}

/// Emit the type a symbol names
pub(crate) fn emit_type(ctx: &CodegenContext, w: &mut CodeWriter, symbol: &Symbol) -> Result<()> {
    let shape = ctx.shape(&symbol.shape)?;
    match shape.shape_type {
        // synthesized input/output of an operation without one
        ShapeType::Operation => emit_structure(ctx, w, symbol, None, false),
        ShapeType::Structure => emit_structure(ctx, w, symbol, Some(shape), false),
        ShapeType::Union => emit_union(ctx, w, symbol, shape),
        ShapeType::Enum | ShapeType::String => emit_string_enum(ctx, w, symbol, shape),
        ShapeType::IntEnum => emit_int_enum(ctx, w, symbol, shape),
        other => Err(CodegenError::validation(format!(
            "{} is a {} and cannot be emitted as a type",
            symbol.shape, other
        ))),
    }
}

fn is_sensitive(ctx: &CodegenContext, member: &Member) -> Result<bool> {
    Ok(member.traits.has(traits::SENSITIVE) || ctx.shape(&member.target)?.traits.has(traits::SENSITIVE))
}

fn deprecated(w: &mut CodeWriter, shape_traits: &crate::model::Traits) {
    if shape_traits.has(traits::DEPRECATED) {
        w.line("#[deprecated]");
    }
}

// =============================================================================
// Structures
// =============================================================================

/// A generated field
struct Field {
    name: String,
    setter: String,
    wire: String,
    ty: String,
    sensitive: bool,
}

/// `serde` attribute of a structure field
fn serde_attr(ctx: &CodegenContext, member: &Member, wire: &str, message_alias: bool) -> Result<String> {
    let target = ctx.shape(&member.target)?;
    let mut parts = vec![
        format!("rename = {}", lit(wire)),
        "default".to_string(),
        "skip_serializing_if = \"Option::is_none\"".to_string(),
    ];
    if message_alias {
        let alias = if wire == "message" { "Message" } else { "message" };
        parts.push(format!("alias = {}", lit(alias)));
    }
    if target.shape_type == ShapeType::Timestamp {
        match http::timestamp_format(member, target)? {
            Some(TimestampFormat::DateTime) => parts.push("with = \"crate::primitives::serde_date_time\"".to_string()),
            Some(TimestampFormat::HttpDate) => parts.push("with = \"crate::primitives::serde_http_date\"".to_string()),
            Some(TimestampFormat::EpochSeconds) | None => {}
        }
    }
    Ok(format!("#[serde({})]", parts.join(", ")))
}

/// The member carrying an error message, if any
pub(crate) fn message_member<'s>(ctx: &CodegenContext, shape: &'s Shape) -> Result<Option<&'s Member>> {
    for member in &shape.members {
        if member.name.eq_ignore_ascii_case("message") {
            let target = ctx.shape(&member.target)?;
            if target.shape_type == ShapeType::String && !target.is_string_enum() {
                return Ok(Some(member));
            }
        }
    }
    Ok(None)
}

/// Emit a structure, its builder module, and a redacting `Debug` when a
/// member is sensitive. `is_error` adds the `Message` alias to the message
/// member.
pub(crate) fn emit_structure(
    ctx: &CodegenContext,
    w: &mut CodeWriter,
    symbol: &Symbol,
    shape: Option<&Shape>,
    is_error: bool,
) -> Result<()> {
    let message = match (shape, is_error) {
        (Some(shape), true) => message_member(ctx, shape)?.map(|m| m.name.clone()),
        _ => None,
    };

    let mut fields = Vec::new();
    if let Some(shape) = shape {
        for member in &shape.members {
            let names = ctx.symbols.member(&shape.id, &member.name)?;
            fields.push(Field {
                name: names.field.clone(),
                setter: names.setter.clone(),
                wire: http::wire_name(member, ctx.index.protocol),
                ty: ctx.field_type(&shape.id, member)?,
                sensitive: is_sensitive(ctx, member)?,
            });
        }
    }
    let redact = fields.iter().any(|f| f.sensitive);

    match shape {
        Some(shape) => {
            w.doc(shape.documentation());
            deprecated(w, &shape.traits);
        }
        None => {
            w.line(format!("/// `{}` takes no members", symbol.shape.name()));
        }
    }
    if redact {
        w.line("#[derive(Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]");
    } else {
        w.line("#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]");
    }
    w.open(format!("pub struct {} {{", symbol.name));
    if let Some(shape) = shape {
        for (member, field) in shape.members.iter().zip(&fields) {
            w.doc(member.documentation());
            deprecated(w, &member.traits);
            let alias = message.as_deref() == Some(member.name.as_str());
            w.line(serde_attr(ctx, member, &field.wire, alias)?);
            w.line(format!("pub {}: Option<{}>,", field.name, field.ty));
        }
    }
    w.close("}");
    w.blank();

    let module = symbol.builder_module();
    w.open(format!("impl {} {{", symbol.name));
    w.line(format!("/// Creates a new builder for [`{}`]", symbol.name));
    w.open(format!("pub fn builder() -> {}::Builder {{", module));
    w.line(format!("{}::Builder::default()", module));
    w.close("}");
    w.close("}");
    if redact {
        w.blank();
        emit_redacting_debug(w, &symbol.name, &fields);
    }
    w.blank();

    w.line(format!("/// Builder for [`{}`](super::{})", symbol.name, symbol.name));
    w.open(format!("pub mod {} {{", module));
    if redact {
        w.line("#[derive(Clone, Default, PartialEq)]");
    } else {
        w.line("#[derive(Debug, Clone, Default, PartialEq)]");
    }
    w.open("pub struct Builder {");
    for field in &fields {
        w.line(format!("pub(crate) {}: Option<{}>,", field.name, field.ty));
    }
    w.close("}");
    w.blank();
    w.open("impl Builder {");
    for field in &fields {
        w.open(format!(
            "pub fn {}(mut self, input: impl Into<{}>) -> Self {{",
            field.name, field.ty
        ));
        w.line(format!("self.{} = Some(input.into());", field.name));
        w.line("self");
        w.close("}");
        w.blank();
        w.open(format!(
            "pub fn {}(mut self, input: Option<{}>) -> Self {{",
            field.setter, field.ty
        ));
        w.line(format!("self.{} = input;", field.name));
        w.line("self");
        w.close("}");
        w.blank();
    }
    w.line(format!("/// Consumes the builder and constructs a [`{}`](super::{})", symbol.name, symbol.name));
    w.open(format!("pub fn build(self) -> super::{} {{", symbol.name));
    if fields.is_empty() {
        w.line(format!("super::{} {{}}", symbol.name));
    } else {
        w.open(format!("super::{} {{", symbol.name));
        for field in &fields {
            w.line(format!("{}: self.{},", field.name, field.name));
        }
        w.close("}");
    }
    w.close("}");
    w.close("}");
    if redact {
        w.blank();
        emit_redacting_debug(w, "Builder", &fields);
    }
    w.close("}");
    Ok(())
}

fn emit_redacting_debug(w: &mut CodeWriter, type_name: &str, fields: &[Field]) {
    w.open(format!("impl std::fmt::Debug for {} {{", type_name));
    w.open("fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {");
    w.line(format!("let mut formatter = f.debug_struct({});", lit(type_name)));
    for field in fields {
        if field.sensitive {
            w.line(format!(
                "formatter.field({}, &{});",
                lit(naming::unescaped(&field.name)),
                lit(REDACTED)
            ));
        } else {
            w.line(format!("formatter.field({}, &self.{});", lit(naming::unescaped(&field.name)), field.name));
        }
    }
    w.line("formatter.finish()");
    w.close("}");
    w.close("}");
}

// =============================================================================
// Unions
// =============================================================================

fn emit_union(ctx: &CodegenContext, w: &mut CodeWriter, symbol: &Symbol, shape: &Shape) -> Result<()> {
    let mut variants = Vec::new();
    for member in &shape.members {
        let member_symbol = ctx.symbols.member(&shape.id, &member.name)?;
        let ty = if ctx.shape(&member.target)?.is_unit() {
            "crate::primitives::Unit".to_string()
        } else {
            ctx.field_type(&shape.id, member)?
        };
        variants.push((member, member_symbol, ty));
    }

    w.doc(shape.documentation());
    deprecated(w, &shape.traits);
    w.line("#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]");
    w.open(format!("pub enum {} {{", symbol.name));
    for (member, member_symbol, ty) in &variants {
        w.doc(member.documentation());
        deprecated(w, &member.traits);
        w.line(format!("#[serde(rename = {})]", lit(&http::wire_name(member, ctx.index.protocol))));
        w.line(format!("{}({}),", member_symbol.variant, ty));
    }
    w.close("}");
    w.blank();

    w.open(format!("impl {} {{", symbol.name));
    for (i, (_, member_symbol, ty)) in variants.iter().enumerate() {
        if i > 0 {
            w.blank();
        }
        let stem = naming::unescaped(&member_symbol.field);
        w.open(format!("pub fn as_{}(&self) -> Option<&{}> {{", stem, ty));
        w.open("match self {");
        w.line(format!("Self::{}(value) => Some(value),", member_symbol.variant));
        w.line("#[allow(unreachable_patterns)]");
        w.line("_ => None,");
        w.close("}");
        w.close("}");
        w.blank();
        w.open(format!("pub fn is_{}(&self) -> bool {{", stem));
        w.line(format!("self.as_{}().is_some()", stem));
        w.close("}");
    }
    w.close("}");
    Ok(())
}

// =============================================================================
// Enums
// =============================================================================

fn emit_string_enum(ctx: &CodegenContext, w: &mut CodeWriter, symbol: &Symbol, shape: &Shape) -> Result<()> {
    let name = &symbol.name;
    let mut variants = Vec::new();
    for variant in ctx.symbols.enum_variants(&shape.id)? {
        match &variant.value {
            EnumValue::String(value) => variants.push((variant, value.as_str())),
            EnumValue::Int(_) => {
                return Err(CodegenError::validation(format!("{}: string enum with an integer value", shape.id)))
            }
        }
    }

    w.doc(shape.documentation());
    deprecated(w, &shape.traits);
    w.line("#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]");
    w.open(format!("pub enum {} {{", name));
    for (variant, _) in &variants {
        w.doc(variant.documentation.as_deref());
        if variant.deprecated {
            w.line("#[deprecated]");
        }
        w.line(format!("{},", variant.variant));
    }
    w.line("/// A value this version of the client does not know about");
    w.line("Unknown(String),");
    w.close("}");
    w.blank();

    w.open(format!("impl {} {{", name));
    w.open("pub fn as_str(&self) -> &str {");
    w.open("match self {");
    for (variant, value) in &variants {
        w.line(format!("Self::{} => {},", variant.variant, lit(value)));
    }
    w.line("Self::Unknown(value) => value.as_str(),");
    w.close("}");
    w.close("}");
    w.blank();
    w.line("/// Every value known to this client");
    w.open("pub fn values() -> &'static [&'static str] {");
    let values: Vec<String> = variants.iter().map(|(_, v)| lit(v)).collect();
    w.line(format!("&[{}]", values.join(", ")));
    w.close("}");
    w.close("}");
    w.blank();

    w.open(format!("impl From<&str> for {} {{", name));
    w.open("fn from(value: &str) -> Self {");
    w.open("match value {");
    for (variant, value) in &variants {
        w.line(format!("{} => Self::{},", lit(value), variant.variant));
    }
    w.line("other => Self::Unknown(other.to_string()),");
    w.close("}");
    w.close("}");
    w.close("}");
    w.blank();

    w.open(format!("impl std::str::FromStr for {} {{", name));
    w.line("type Err = std::convert::Infallible;");
    w.blank();
    w.open("fn from_str(value: &str) -> Result<Self, Self::Err> {");
    w.line("Ok(Self::from(value))");
    w.close("}");
    w.close("}");
    w.blank();

    w.open(format!("impl std::fmt::Display for {} {{", name));
    w.open("fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {");
    w.line("f.write_str(self.as_str())");
    w.close("}");
    w.close("}");
    w.blank();

    w.open(format!("impl serde::Serialize for {} {{", name));
    w.open("fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {");
    w.line("serializer.serialize_str(self.as_str())");
    w.close("}");
    w.close("}");
    w.blank();

    w.open(format!("impl<'de> serde::Deserialize<'de> for {} {{", name));
    w.open("fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {");
    w.line("let value = <String as serde::Deserialize>::deserialize(deserializer)?;");
    w.line("Ok(Self::from(value.as_str()))");
    w.close("}");
    w.close("}");
    w.blank();

    emit_http_value(
        w,
        name,
        "self.as_str().to_string()",
        "Ok(Self::from(value))",
    );
    Ok(())
}

fn emit_int_enum(ctx: &CodegenContext, w: &mut CodeWriter, symbol: &Symbol, shape: &Shape) -> Result<()> {
    let name = &symbol.name;
    let mut variants = Vec::new();
    for variant in ctx.symbols.enum_variants(&shape.id)? {
        match variant.value {
            EnumValue::Int(value) => variants.push((variant, value)),
            EnumValue::String(_) => {
                return Err(CodegenError::validation(format!("{}: intEnum with a string value", shape.id)))
            }
        }
    }

    w.doc(shape.documentation());
    deprecated(w, &shape.traits);
    w.line("#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]");
    w.open(format!("pub enum {} {{", name));
    for (variant, _) in &variants {
        w.doc(variant.documentation.as_deref());
        if variant.deprecated {
            w.line("#[deprecated]");
        }
        w.line(format!("{},", variant.variant));
    }
    w.line("/// A value this version of the client does not know about");
    w.line("Unknown(i32),");
    w.close("}");
    w.blank();

    w.open(format!("impl {} {{", name));
    w.open("pub fn as_i32(&self) -> i32 {");
    w.open("match self {");
    for (variant, value) in &variants {
        w.line(format!("Self::{} => {},", variant.variant, value));
    }
    w.line("Self::Unknown(value) => *value,");
    w.close("}");
    w.close("}");
    w.close("}");
    w.blank();

    w.open(format!("impl From<i32> for {} {{", name));
    w.open("fn from(value: i32) -> Self {");
    w.open("match value {");
    for (variant, value) in &variants {
        w.line(format!("{} => Self::{},", value, variant.variant));
    }
    w.line("other => Self::Unknown(other),");
    w.close("}");
    w.close("}");
    w.close("}");
    w.blank();

    w.open(format!("impl serde::Serialize for {} {{", name));
    w.open("fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {");
    w.line("serializer.serialize_i32(self.as_i32())");
    w.close("}");
    w.close("}");
    w.blank();

    w.open(format!("impl<'de> serde::Deserialize<'de> for {} {{", name));
    w.open("fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {");
    w.line("Ok(Self::from(<i32 as serde::Deserialize>::deserialize(deserializer)?))");
    w.close("}");
    w.close("}");
    w.blank();

    emit_http_value(
        w,
        name,
        "self.as_i32().to_string()",
        "value.trim().parse::<i32>().map(Self::from).map_err(|e| e.to_string())",
    );
    Ok(())
}

fn emit_http_value(w: &mut CodeWriter, name: &str, to_http: &str, from_http: &str) {
    w.open(format!("impl crate::primitives::HttpValue for {} {{", name));
    w.open("fn to_http(&self, _: crate::primitives::TimestampFormat) -> String {");
    w.line(to_http);
    w.close("}");
    w.blank();
    w.open("fn from_http(value: &str, _: crate::primitives::TimestampFormat) -> Result<Self, String> {");
    w.line(from_http);
    w.close("}");
    w.close("}");
}
