//! Code Emitter
//!
//! Turns the interpreted service and its symbol table into the files of a
//! client crate.
//!
//! Architecture:
//! - CodegenContext: read-only view over the model, the service index, the
//!   symbols, and the settings. Built once per run.
//! - Emitters: one module per generated file, each consuming the context
//!   and producing a [`GeneratedFile`].
//!
//! ```text
//! Cargo.toml, README.md        templates
//! src/lib.rs                   module tree
//! src/primitives.rs            runtime template
//! src/model.rs                 shapes
//! src/input.rs, output.rs      shapes
//! src/error.rs                 errors
//! src/operation.rs             operations
//! src/endpoint.rs              endpoint
//! src/client.rs                client
//! src/paginator.rs             paginators
//! src/waiters.rs               waiters
//! tests/protocol_tests.rs      protocol_tests
//! tests/endpoint_tests.rs      endpoint
//! ```
//!
//! Emitters never read the clock or the environment, and iterate only over
//! ordered collections, so identical inputs give byte-identical output.

pub mod client;
pub mod endpoint;
pub mod errors;
pub mod operations;
pub mod paginators;
pub mod protocol_tests;
pub mod shapes;
pub mod templates;
pub mod waiters;
pub mod writer;

pub use templates::Templates;
pub use writer::{CodeWriter, Drift, GeneratedCrate, GeneratedFile};

use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use crate::config::CodegenSettings;
use crate::error::Result;
use crate::model::{Member, Model, Shape, ShapeId};
use crate::symbols::SymbolTable;
use crate::traits::ServiceIndex;

// =============================================================================
// CodegenContext
// =============================================================================

/// Everything an emitter may read
pub struct CodegenContext<'a> {
    pub model: &'a Model,
    pub index: &'a ServiceIndex,
    pub symbols: &'a SymbolTable,
    pub settings: &'a CodegenSettings,
    templates: Templates,
}

impl<'a> CodegenContext<'a> {
    pub fn new(
        model: &'a Model,
        index: &'a ServiceIndex,
        symbols: &'a SymbolTable,
        settings: &'a CodegenSettings,
    ) -> Result<Self> {
        Ok(Self {
            model,
            index,
            symbols,
            settings,
            templates: Templates::load()?,
        })
    }

    pub fn emit_paginators(&self) -> bool {
        self.settings.codegen.include_paginators && self.index.has_paginators()
    }

    pub fn emit_waiters(&self) -> bool {
        self.settings.codegen.include_waiters && self.index.has_waiters()
    }

    /// Name of the generated crate as written in `use` paths
    pub fn crate_ident(&self) -> String {
        self.settings.crate_ident()
    }

    pub fn shape(&self, id: &ShapeId) -> Result<&'a Shape> {
        self.model.expect_shape(id)
    }

    /// A writer that starts with the generated-file banner
    pub(crate) fn writer(&self) -> CodeWriter {
        let mut w = CodeWriter::new();
        w.line(format!(
            "// Code generated by smithy-codegen from {}. DO NOT EDIT.",
            self.index.service
        ));
        w.blank();
        w
    }

    /// Rust type of a member without the surrounding `Option`
    pub(crate) fn field_type(&self, container: &ShapeId, member: &Member) -> Result<String> {
        self.symbols.member_type(self.model, container, &member.name, &member.target)
    }

    pub(crate) fn render(&self, template: &str, data: &impl Serialize) -> Result<String> {
        self.templates.render(template, data)
    }
}

/// A Rust string literal
pub(crate) fn lit(value: &str) -> String {
    format!("{:?}", value)
}

// =============================================================================
// Crate Files
// =============================================================================

#[derive(Serialize)]
struct ManifestData<'a> {
    service: String,
    name: &'a str,
    version: &'a str,
    edition: &'a str,
    /// TOML-quoted
    description: String,
    authors: String,
    license: Option<String>,
    waiters: bool,
}

fn description(ctx: &CodegenContext) -> String {
    ctx.settings.module.description.clone().unwrap_or_else(|| {
        let title = ctx.index.title.as_deref().unwrap_or_else(|| ctx.index.service_name());
        format!("Client for {}", title)
    })
}

fn manifest(ctx: &CodegenContext) -> Result<GeneratedFile> {
    let module = &ctx.settings.module;
    let data = ManifestData {
        service: ctx.index.service.to_string(),
        name: &module.name,
        version: &module.version,
        edition: &module.edition,
        description: toml::Value::String(description(ctx)).to_string(),
        authors: toml::Value::Array(module.authors.iter().cloned().map(toml::Value::String).collect()).to_string(),
        license: module.license.clone().map(|l| toml::Value::String(l).to_string()),
        waiters: ctx.emit_waiters(),
    };
    Ok(GeneratedFile::from_text("Cargo.toml", &ctx.render("Cargo.toml", &data)?))
}

fn readme(ctx: &CodegenContext) -> Result<GeneratedFile> {
    let mut operations = Vec::new();
    for op in &ctx.index.operations {
        let symbols = ctx.symbols.operation(&op.id)?;
        operations.push(json!({ "method": symbols.method, "name": symbols.operation.name }));
    }
    let data = json!({
        "name": ctx.settings.module.name,
        "description_text": description(ctx),
        "service": ctx.index.service.to_string(),
        "protocol": ctx.index.protocol.to_string(),
        "version": ctx.index.version,
        "crate_ident": ctx.crate_ident(),
        "operations": operations,
    });
    Ok(GeneratedFile::from_text("README.md", &ctx.render("README.md", &data)?))
}

fn lib_rs(ctx: &CodegenContext) -> GeneratedFile {
    let mut w = ctx.writer();
    match ctx.index.documentation.as_deref() {
        Some(docs) => w.inner_doc(Some(docs)),
        None => w.inner_doc(Some(&format!("Client for {}", ctx.index.service_name()))),
    };
    w.blank();
    w.line("#![allow(deprecated)]");
    w.line("#![allow(clippy::all)]");
    w.blank();

    let mut modules = vec!["client", "endpoint", "error", "input", "model", "operation", "output"];
    if ctx.emit_paginators() {
        modules.push("paginator");
    }
    modules.push("primitives");
    if ctx.emit_waiters() {
        modules.push("waiters");
    }
    for module in modules {
        w.line(format!("pub mod {};", module));
    }
    w.blank();
    w.line("pub use client::{Client, Config};");
    w.line("pub use error::SdkError;");
    w.into_file("src/lib.rs")
}

fn primitives_rs(ctx: &CodegenContext) -> Result<GeneratedFile> {
    let mut w = ctx.writer();
    w.raw(&ctx.render("primitives.rs", &json!({}))?);
    Ok(w.into_file("src/primitives.rs"))
}

/// Emit the whole client crate
pub fn generate(
    model: &Model,
    index: &ServiceIndex,
    symbols: &SymbolTable,
    settings: &CodegenSettings,
) -> Result<GeneratedCrate> {
    let ctx = CodegenContext::new(model, index, symbols, settings)?;
    let mut out = GeneratedCrate::new();

    out.add(manifest(&ctx)?)?;
    out.add(readme(&ctx)?)?;
    out.add(lib_rs(&ctx))?;
    out.add(primitives_rs(&ctx)?)?;
    for file in shapes::emit(&ctx)? {
        out.add(file)?;
    }
    out.add(errors::emit(&ctx)?)?;
    out.add(operations::emit(&ctx)?)?;
    out.add(endpoint::emit(&ctx)?)?;
    out.add(client::emit(&ctx)?)?;
    if ctx.emit_paginators() {
        out.add(paginators::emit(&ctx)?)?;
    }
    if ctx.emit_waiters() {
        out.add(waiters::emit(&ctx)?)?;
    }
    if settings.codegen.include_protocol_tests {
        if let Some(file) = protocol_tests::emit(&ctx)? {
            out.add(file)?;
        }
    }
    if settings.codegen.include_endpoint_tests {
        if let Some(file) = endpoint::emit_tests(&ctx)? {
            out.add(file)?;
        }
    }

    for file in out.files() {
        debug!(path = %file.path().display(), lines = file.lines.len(), "Emitted file");
    }
    info!(service = %index.service, files = out.len(), "Emitted client crate");
    Ok(out)
}
