//! Paginators
//!
//! `src/paginator.rs`: one paginator per paginated operation. Each one feeds
//! the output token back as the input token until the service returns no
//! token, an empty token, or a token it has already returned.

use crate::error::{CodegenError, Result};
use crate::model::{ShapeId, ShapeType};
use crate::symbols::naming;
use crate::traits::{OperationIndex, Paginator};

use super::{CodeWriter, CodegenContext, GeneratedFile};

/// Expression reading a member path out of `root` as an owned `Option`
pub(crate) fn path_access(ctx: &CodegenContext, start: &ShapeId, root: &str, path: &[String]) -> Result<String> {
    let mut container = start.clone();
    let mut fields = Vec::with_capacity(path.len());
    for name in path {
        let shape = ctx.shape(&container)?;
        let member = shape
            .member(name)
            .ok_or_else(|| CodegenError::validation(format!("{} has no member `{}`", container, name)))?;
        fields.push(ctx.symbols.member(&container, name)?.field.clone());
        container = member.target.clone();
    }
    let Some((last, init)) = fields.split_last() else {
        return Err(CodegenError::validation("empty member path"));
    };
    let mut expr = String::new();
    for (i, field) in init.iter().enumerate() {
        if i == 0 {
            expr = format!("{}.{}.as_ref()", root, field);
        } else {
            expr = format!("{}.and_then(|v| v.{}.as_ref())", expr, field);
        }
    }
    Ok(if init.is_empty() {
        format!("{}.{}.clone()", root, last)
    } else {
        format!("{}.and_then(|v| v.{}.clone())", expr, last)
    })
}

/// Element type yielded by `collect_items`
fn item_type(ctx: &CodegenContext, target: &ShapeId) -> Result<String> {
    let shape = ctx.shape(target)?;
    match shape.shape_type {
        ShapeType::Map => {
            let value = shape
                .map_value()
                .ok_or_else(|| CodegenError::validation(format!("{} has no value", target)))?;
            Ok(format!("(String, {})", ctx.symbols.rust_type(ctx.model, &value.target)?))
        }
        _ => {
            let member = shape
                .list_member()
                .ok_or_else(|| CodegenError::validation(format!("{} has no member", target)))?;
            ctx.symbols.rust_type(ctx.model, &member.target)
        }
    }
}

fn emit_paginator(ctx: &CodegenContext, w: &mut CodeWriter, op: &OperationIndex, paginator: &Paginator) -> Result<()> {
    let symbols = ctx.symbols.operation(&op.id)?;
    let (Some(input), Some(output)) = (&op.input, &op.output) else {
        return Err(CodegenError::validation(format!("{}: paginated operations need input and output", op.id)));
    };
    let name = format!("{}Paginator", symbols.operation.name);
    let builder = format!("crate::input::{}::Builder", symbols.input.builder_module());
    let result = format!(
        "Result<{}, SdkError<{}>>",
        symbols.output.path(),
        symbols.error.path()
    );
    let input_token = ctx.symbols.member(input, &paginator.input_token)?.field.clone();
    let send = format!("send_{}", naming::unescaped(&symbols.method));

    w.line(format!("/// Pages through [`Client::{}`](crate::Client::{})", symbols.method, symbols.method));
    w.line("#[derive(Debug)]");
    w.open(format!("pub struct {} {{", name));
    w.line("handle: Arc<Handle>,");
    w.line(format!("builder: {},", builder));
    w.line("next_token: Option<String>,");
    w.line("seen: HashSet<String>,");
    w.line("done: bool,");
    w.close("}");
    w.blank();

    w.open(format!("impl {} {{", name));
    w.open(format!("pub(crate) fn new(handle: Arc<Handle>, builder: {}) -> Self {{", builder));
    w.open("Self {");
    w.line("handle,");
    w.line(format!("next_token: builder.{}.clone(),", input_token));
    w.line("builder,");
    w.line("seen: HashSet::new(),");
    w.line("done: false,");
    w.close("}");
    w.close("}");

    if let Some(page_size) = &paginator.page_size {
        let member = ctx
            .shape(input)?
            .member(page_size)
            .ok_or_else(|| CodegenError::validation(format!("{} has no member `{}`", input, page_size)))?;
        let field = &ctx.symbols.member(input, page_size)?.field;
        let ty = ctx.field_type(input, member)?;
        w.blank();
        w.line("/// Maximum number of items per page");
        w.open(format!("pub fn page_size(mut self, size: {}) -> Self {{", ty));
        w.line(format!("self.builder.{} = Some(size);", field));
        w.line("self");
        w.close("}");
    }

    w.blank();
    w.line("/// Fetch the next page, or `None` once pagination has finished");
    w.open(format!("pub async fn next_page(&mut self) -> Option<{}> {{", result));
    w.open("if self.done {");
    w.line("return None;");
    w.close("}");
    w.line("let mut builder = self.builder.clone();");
    w.line(format!("builder.{} = self.next_token.clone();", input_token));
    w.open(format!("match self.handle.{}(builder.build()).await {{", send));
    w.open("Ok(output) => {");
    w.open(format!(
        "match {} {{",
        path_access(ctx, output, "output", &paginator.output_token)?
    ));
    w.open("Some(token) if !token.is_empty() && self.seen.insert(token.clone()) => {");
    w.line("self.next_token = Some(token);");
    w.close("}");
    w.line("_ => self.done = true,");
    w.close("}");
    w.line("Some(Ok(output))");
    w.close("}");
    w.open("Err(error) => {");
    w.line("self.done = true;");
    w.line("Some(Err(error))");
    w.close("}");
    w.close("}");
    w.close("}");

    w.blank();
    w.line("/// Fetch every remaining page");
    w.open(format!(
        "pub async fn all_pages(mut self) -> Result<Vec<{}>, SdkError<{}>> {{",
        symbols.output.path(),
        symbols.error.path()
    ));
    w.line("let mut pages = Vec::new();");
    w.open("while let Some(page) = self.next_page().await {");
    w.line("pages.push(page?);");
    w.close("}");
    w.line("Ok(pages)");
    w.close("}");

    if let (Some(items), Some(target)) = (&paginator.items, &paginator.items_target) {
        w.blank();
        w.line("/// Fetch every remaining page and flatten the paged items");
        w.open(format!(
            "pub async fn collect_items(mut self) -> Result<Vec<{}>, SdkError<{}>> {{",
            item_type(ctx, target)?,
            symbols.error.path()
        ));
        w.line("let mut items = Vec::new();");
        w.open("while let Some(page) = self.next_page().await {");
        w.line("let output = page?;");
        w.line(format!(
            "items.extend({}.unwrap_or_default());",
            path_access(ctx, output, "output", items)?
        ));
        w.close("}");
        w.line("Ok(items)");
        w.close("}");
    }
    w.close("}");
    Ok(())
}

/// `src/paginator.rs`
pub fn emit(ctx: &CodegenContext) -> Result<GeneratedFile> {
    let mut w = ctx.writer();
    w.line("use std::collections::HashSet;");
    w.line("use std::sync::Arc;");
    w.blank();
    w.line("use crate::client::Handle;");
    w.line("use crate::error::SdkError;");
    for op in &ctx.index.operations {
        if let Some(paginator) = &op.paginator {
            w.blank();
            emit_paginator(ctx, &mut w, op, paginator)?;
        }
    }
    Ok(w.into_file("src/paginator.rs"))
}
