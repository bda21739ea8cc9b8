//! Client
//!
//! `src/client.rs`: the client runtime, the `Config` it carries, one
//! `send_*` dispatcher per operation on the shared handle, and one fluent
//! builder per operation.

use serde_json::{json, Value};

use crate::error::{CodegenError, Result};
use crate::model::ShapeType;
use crate::symbols::{naming, NameAllocator};
use crate::traits::endpoint::ParamType;
use crate::traits::{OperationIndex, ParamSource};

use super::endpoint::{param_fields, ParamField};
use super::{lit, CodeWriter, CodegenContext, GeneratedFile};

// =============================================================================
// Config
// =============================================================================

/// A client context parameter as a `Config` field
struct ConfigField {
    param: String,
    field: String,
    ty: &'static str,
    documentation: Option<String>,
}

fn config_fields(ctx: &CodegenContext) -> Vec<ConfigField> {
    let mut names = NameAllocator::for_fields();
    for reserved in ["region", "endpoint_url", "use_fips", "use_dual_stack", "builder", "build"] {
        names.reserve(reserved);
    }
    ctx.index
        .client_context_params
        .iter()
        .map(|p| ConfigField {
            param: p.name.clone(),
            field: names.allocate(&naming::field_name(&p.name)).0,
            ty: match p.param_type {
                ParamType::String => "String",
                ParamType::Boolean => "bool",
            },
            documentation: p.documentation.clone(),
        })
        .collect()
}

fn emit_config(ctx: &CodegenContext, w: &mut CodeWriter, fields: &[ConfigField]) {
    w.line("/// Configuration for [`Client`]");
    w.line("#[derive(Debug, Clone, Default)]");
    w.open("pub struct Config {");
    w.line("pub(crate) region: Option<String>,");
    w.line("pub(crate) endpoint_url: Option<String>,");
    w.line("pub(crate) use_fips: bool,");
    w.line("pub(crate) use_dual_stack: bool,");
    for f in fields {
        w.line(format!("pub(crate) {}: Option<{}>,", f.field, f.ty));
    }
    w.close("}");
    w.blank();

    w.open("impl Config {");
    w.open("pub fn builder() -> ConfigBuilder {");
    w.line("ConfigBuilder::default()");
    w.close("}");
    w.blank();
    w.open("pub fn region(&self) -> Option<&str> {");
    w.line("self.region.as_deref()");
    w.close("}");
    w.blank();
    w.open("pub fn endpoint_url(&self) -> Option<&str> {");
    w.line("self.endpoint_url.as_deref()");
    w.close("}");
    w.blank();
    w.open("pub fn use_fips(&self) -> bool {");
    w.line("self.use_fips");
    w.close("}");
    w.blank();
    w.open("pub fn use_dual_stack(&self) -> bool {");
    w.line("self.use_dual_stack");
    w.close("}");
    for f in fields {
        w.blank();
        w.doc(f.documentation.as_deref());
        if f.ty == "bool" {
            w.open(format!("pub fn {}(&self) -> Option<bool> {{", f.field));
            w.line(format!("self.{}", f.field));
        } else {
            w.open(format!("pub fn {}(&self) -> Option<&str> {{", f.field));
            w.line(format!("self.{}.as_deref()", f.field));
        }
        w.close("}");
    }
    w.close("}");
    w.blank();

    w.line("#[derive(Debug, Clone, Default)]");
    w.open("pub struct ConfigBuilder {");
    w.line("conf: Config,");
    w.close("}");
    w.blank();
    w.open("impl ConfigBuilder {");
    let setters: Vec<(String, &str, bool)> = [
        ("region".to_string(), "String", true),
        ("endpoint_url".to_string(), "String", true),
        ("use_fips".to_string(), "bool", false),
        ("use_dual_stack".to_string(), "bool", false),
    ]
    .into_iter()
    .chain(fields.iter().map(|f| (f.field.clone(), f.ty, true)))
    .collect();
    for (field, ty, optional) in &setters {
        w.open(format!("pub fn {}(mut self, value: impl Into<{}>) -> Self {{", field, ty));
        if *optional {
            w.line(format!("self.conf.{} = Some(value.into());", field));
        } else {
            w.line(format!("self.conf.{} = value.into();", field));
        }
        w.line("self");
        w.close("}");
        w.blank();
    }
    w.open("pub fn build(self) -> Config {");
    w.line("self.conf");
    w.close("}");
    w.close("}");

    if let Some(sigv4) = &ctx.index.sigv4 {
        w.blank();
        w.line("/// SigV4 signing name of the service");
        w.line(format!("pub const SIGNING_NAME: &str = {};", lit(&sigv4.name)));
    }
}

// =============================================================================
// Dispatch
// =============================================================================

/// Statement feeding one endpoint parameter from its source
fn param_statement(
    ctx: &CodegenContext,
    op: &OperationIndex,
    param: &ParamField,
    config: &[ConfigField],
) -> Result<Option<String>> {
    if let Some(source) = op.context_params.get(&param.param.name) {
        return match source {
            ParamSource::Static(value) => {
                let rendered = match value {
                    Value::String(s) => lit(s),
                    Value::Bool(b) => b.to_string(),
                    other => {
                        return Err(CodegenError::validation(format!(
                            "{}: static context param {} has unsupported value {}",
                            op.id, param.param.name, other
                        )))
                    }
                };
                Ok(Some(format!("params = params.{}({});", param.field, rendered)))
            }
            ParamSource::InputMember(member) => {
                let input = op.input.as_ref().ok_or_else(|| {
                    CodegenError::validation(format!("{}: contextParam {} without input", op.id, member))
                })?;
                let shape = ctx.shape(input)?;
                let member_shape = shape.member(member).ok_or_else(|| {
                    CodegenError::validation(format!("{}: contextParam member {} does not exist", op.id, member))
                })?;
                let target = ctx.model.target(member_shape)?;
                let field = &ctx.symbols.member(input, member)?.field;
                let value = if target.is_string_enum() {
                    "value.as_str().to_string()"
                } else if target.shape_type == ShapeType::Boolean {
                    "*value"
                } else {
                    "value.clone()"
                };
                Ok(Some(format!(
                    "if let Some(value) = &input.{} {{ params = params.{}({}); }}",
                    field, param.field, value
                )))
            }
        };
    }

    if let Some(f) = config.iter().find(|f| f.param == param.param.name) {
        let value = if f.ty == "bool" { "*value" } else { "value.clone()" };
        return Ok(Some(format!(
            "if let Some(value) = &self.conf.{} {{ params = params.{}({}); }}",
            f.field, param.field, value
        )));
    }

    let statement = match param.param.built_in.as_deref() {
        Some("AWS::Region") => format!(
            "if let Some(value) = &self.conf.region {{ params = params.{}(value.clone()); }}",
            param.field
        ),
        Some("SDK::Endpoint") => format!(
            "if let Some(value) = &self.conf.endpoint_url {{ params = params.{}(value.clone()); }}",
            param.field
        ),
        Some("AWS::UseFIPS") => format!("params = params.{}(self.conf.use_fips);", param.field),
        Some("AWS::UseDualStack") => format!("params = params.{}(self.conf.use_dual_stack);", param.field),
        _ => return Ok(None),
    };
    Ok(Some(statement))
}

fn emit_dispatch(ctx: &CodegenContext, w: &mut CodeWriter, config: &[ConfigField]) -> Result<()> {
    let params = param_fields(&ctx.index.rule_set);
    w.open("impl Handle {");
    for (i, op) in ctx.index.operations.iter().enumerate() {
        let symbols = ctx.symbols.operation(&op.id)?;
        if i > 0 {
            w.blank();
        }
        w.line("#[allow(unused_mut)]");
        w.open(format!(
            "pub(crate) async fn send_{}(&self, input: {}) -> Result<{}, SdkError<{}>> {{",
            naming::unescaped(&symbols.method),
            symbols.input.path(),
            symbols.output.path(),
            symbols.error.path()
        ));
        w.line("let mut params = crate::endpoint::Params::builder();");
        // builtIns and client config first so operation context wins
        let mut ordered: Vec<(u8, String)> = Vec::new();
        for param in &params {
            if let Some(statement) = param_statement(ctx, op, param, config)? {
                let rank = match op.context_params.get(&param.param.name) {
                    Some(ParamSource::Static(_)) => 1,
                    Some(ParamSource::InputMember(_)) => 2,
                    None => 0,
                };
                ordered.push((rank, statement));
            }
        }
        ordered.sort_by_key(|(rank, _)| *rank);
        for (_, statement) in ordered {
            w.line(statement);
        }
        w.line("self.call(");
        w.line("    params.build(),");
        w.line(format!(
            "    |endpoint| {}::serialize_request(&input, endpoint),",
            symbols.operation.path()
        ));
        w.line(format!("    {}::parse_response,", symbols.operation.path()));
        w.line(")");
        w.line(".await");
        w.close("}");
    }
    w.close("}");
    Ok(())
}

// =============================================================================
// Fluent Builders
// =============================================================================

fn emit_client_methods(ctx: &CodegenContext, w: &mut CodeWriter) -> Result<()> {
    w.open("impl Client {");
    for (i, op) in ctx.index.operations.iter().enumerate() {
        let symbols = ctx.symbols.operation(&op.id)?;
        if i > 0 {
            w.blank();
        }
        w.doc(op.documentation.as_deref());
        if op.deprecated {
            w.line("#[deprecated]");
        }
        w.open(format!(
            "pub fn {}(&self) -> fluent_builders::{} {{",
            symbols.method, symbols.fluent_builder
        ));
        w.line(format!("fluent_builders::{}::new(self.handle.clone())", symbols.fluent_builder));
        w.close("}");
    }
    w.close("}");
    Ok(())
}

fn emit_fluent_builder(ctx: &CodegenContext, w: &mut CodeWriter, op: &OperationIndex) -> Result<()> {
    let symbols = ctx.symbols.operation(&op.id)?;
    let name = &symbols.fluent_builder;
    let builder = format!("crate::input::{}::Builder", symbols.input.builder_module());
    let paginated = ctx.emit_paginators() && op.paginator.is_some();

    w.line(format!("/// Fluent builder for [`Client::{}`](super::Client::{})", symbols.method, symbols.method));
    w.line("#[derive(Debug, Clone)]");
    w.open(format!("pub struct {} {{", name));
    w.line("handle: Arc<Handle>,");
    w.line(format!("inner: {},", builder));
    w.close("}");
    w.blank();

    w.open(format!("impl {} {{", name));
    w.open("pub(crate) fn new(handle: Arc<Handle>) -> Self {");
    w.open("Self {");
    w.line("handle,");
    w.line("inner: Default::default(),");
    w.close("}");
    w.close("}");
    w.blank();
    w.line("/// Sends the request");
    w.open(format!(
        "pub async fn send(self) -> Result<{}, SdkError<{}>> {{",
        symbols.output.path(),
        symbols.error.path()
    ));
    w.line("let input = self.inner.build();");
    w.line(format!("self.handle.send_{}(input).await", naming::unescaped(&symbols.method)));
    w.close("}");
    if paginated {
        w.blank();
        w.line("/// Pages through every result");
        w.open(format!(
            "pub fn into_paginator(self) -> crate::paginator::{}Paginator {{",
            symbols.operation.name
        ));
        w.line(format!(
            "crate::paginator::{}Paginator::new(self.handle, self.inner)",
            symbols.operation.name
        ));
        w.close("}");
    }

    if let Some(input) = &op.input {
        let shape = ctx.shape(input)?;
        let mut names = NameAllocator::for_fields();
        for reserved in ["new", "send", "into_paginator"] {
            names.reserve(reserved);
        }
        for symbol in ctx.symbols.members(input) {
            names.reserve(&symbol.setter);
        }
        for member in &shape.members {
            let symbol = ctx.symbols.member(input, &member.name)?;
            let ty = ctx.field_type(input, member)?;
            let (method, _) = names.allocate(&symbol.field);
            w.blank();
            w.doc(member.documentation());
            w.open(format!("pub fn {}(mut self, input: impl Into<{}>) -> Self {{", method, ty));
            w.line(format!("self.inner = self.inner.{}(input);", symbol.field));
            w.line("self");
            w.close("}");
            w.blank();
            w.open(format!("pub fn {}(mut self, input: Option<{}>) -> Self {{", symbol.setter, ty));
            w.line(format!("self.inner = self.inner.{}(input);", symbol.setter));
            w.line("self");
            w.close("}");
        }
    }
    w.close("}");
    Ok(())
}

/// `src/client.rs`
pub fn emit(ctx: &CodegenContext) -> Result<GeneratedFile> {
    let config = config_fields(ctx);
    let mut w = ctx.writer();
    w.raw(&ctx.render(
        "client_runtime.rs",
        &json!({ "service_name": ctx.index.title.as_deref().unwrap_or_else(|| ctx.index.service_name()) }),
    )?);
    w.blank();
    emit_config(ctx, &mut w, &config);
    w.blank();
    emit_dispatch(ctx, &mut w, &config)?;
    w.blank();
    emit_client_methods(ctx, &mut w)?;
    w.blank();

    w.line("/// Per-operation request builders");
    w.open("pub mod fluent_builders {");
    w.line("use std::sync::Arc;");
    w.blank();
    w.line("use super::Handle;");
    w.line("use crate::error::SdkError;");
    for op in &ctx.index.operations {
        w.blank();
        emit_fluent_builder(ctx, &mut w, op)?;
    }
    w.close("}");
    Ok(w.into_file("src/client.rs"))
}
