//! Error types
//!
//! `src/error.rs` holds the runtime error types, one struct per modeled
//! error, and one enum per operation listing the errors it can return plus
//! an `Unhandled` fallback. Responses are dispatched on the sanitized error
//! code, which is the Smithy shape name of the error.

use serde_json::json;

use crate::error::Result;
use crate::symbols::{naming, Namespace, Symbol};
use crate::traits::ErrorInfo;

use super::operations::{emit_deserializer, error_fn, error_struct_fn};
use super::shapes::{emit_structure, message_member};
use super::{lit, CodeWriter, CodegenContext, GeneratedFile};

/// `src/error.rs`
pub fn emit(ctx: &CodegenContext) -> Result<GeneratedFile> {
    let mut w = ctx.writer();
    w.raw(&ctx.render("error_runtime.rs", &json!({}))?);
    w.blank();

    for symbol in ctx.symbols.in_namespace(Namespace::Error) {
        match ctx.index.errors.get(&symbol.shape) {
            Some(info) => emit_error_struct(ctx, &mut w, symbol, info)?,
            None => emit_operation_error(ctx, &mut w, symbol)?,
        }
        w.blank();
    }
    Ok(w.into_file("src/error.rs"))
}

fn emit_error_struct(ctx: &CodegenContext, w: &mut CodeWriter, symbol: &Symbol, info: &ErrorInfo) -> Result<()> {
    let shape = ctx.shape(&info.id)?;
    emit_structure(ctx, w, symbol, Some(shape), true)?;
    w.blank();

    let message = match message_member(ctx, shape)? {
        Some(member) => Some(ctx.symbols.member(&shape.id, &member.name)?.field.clone()),
        None => None,
    };

    w.open(format!("impl {} {{", symbol.name));
    w.line(format!("pub const HTTP_STATUS: u16 = {};", info.http_status));
    w.blank();
    w.open("pub fn is_retryable(&self) -> bool {");
    w.line(info.retryable.to_string());
    w.close("}");
    w.blank();
    w.open("pub fn message(&self) -> Option<&str> {");
    match &message {
        Some(field) => w.line(format!("self.{}.as_deref()", field)),
        None => w.line("None"),
    };
    w.close("}");
    w.close("}");
    w.blank();

    w.open(format!("impl fmt::Display for {} {{", symbol.name));
    w.open("fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {");
    w.line(format!("f.write_str({})?;", lit(info.id.name())));
    w.open("if let Some(message) = self.message() {");
    w.line("write!(f, \": {}\", message)?;");
    w.close("}");
    w.line("Ok(())");
    w.close("}");
    w.close("}");
    w.blank();
    w.line(format!("impl std::error::Error for {} {{}}", symbol.name));
    w.blank();

    emit_deserializer(ctx, w, &error_struct_fn(symbol), symbol, Some(shape), &info.bindings)
}

fn emit_operation_error(ctx: &CodegenContext, w: &mut CodeWriter, symbol: &Symbol) -> Result<()> {
    let op = ctx.index.operation(&symbol.shape).ok_or_else(|| {
        crate::error::CodegenError::validation(format!("{} is neither an error nor an operation", symbol.shape))
    })?;
    let op_symbols = ctx.symbols.operation(&op.id)?;
    let name = &symbol.name;

    let mut errors = Vec::with_capacity(op.errors.len());
    for id in &op.errors {
        errors.push((ctx.symbols.symbol(id)?, id.name()));
    }

    w.line(format!("/// Errors returned by `{}`", op.id.name()));
    w.line("#[derive(Debug)]");
    w.open(format!("pub enum {} {{", name));
    for (error, _) in &errors {
        w.line(format!("{}({}),", error.name, error.name));
    }
    w.line("/// An error the model does not describe");
    w.line("Unhandled(Unhandled),");
    w.close("}");
    w.blank();

    w.open(format!("impl {} {{", name));
    w.line("/// Error code as sent by the service");
    w.open("pub fn code(&self) -> Option<&str> {");
    w.open("match self {");
    for (error, code) in &errors {
        w.line(format!("Self::{}(_) => Some({}),", error.name, lit(code)));
    }
    w.line("Self::Unhandled(e) => e.meta.code.as_deref(),");
    w.close("}");
    w.close("}");
    w.blank();
    w.open("pub fn message(&self) -> Option<&str> {");
    w.open("match self {");
    for (error, _) in &errors {
        w.line(format!("Self::{}(e) => e.message(),", error.name));
    }
    w.line("Self::Unhandled(e) => e.meta.message.as_deref(),");
    w.close("}");
    w.close("}");
    w.blank();
    w.open("pub fn is_retryable(&self) -> bool {");
    w.open("match self {");
    for (error, _) in &errors {
        w.line(format!("Self::{}(e) => e.is_retryable(),", error.name));
    }
    w.line("Self::Unhandled(_) => false,");
    w.close("}");
    w.close("}");
    for (error, _) in &errors {
        w.blank();
        w.open(format!(
            "pub fn is_{}(&self) -> bool {{",
            naming::to_snake_case(&error.name)
        ));
        w.line(format!("matches!(self, Self::{}(_))", error.name));
        w.close("}");
    }
    w.close("}");
    w.blank();

    w.open(format!("impl fmt::Display for {} {{", name));
    w.open("fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {");
    w.open("match self {");
    for (error, _) in &errors {
        w.line(format!("Self::{}(e) => fmt::Display::fmt(e, f),", error.name));
    }
    w.line("Self::Unhandled(e) => fmt::Display::fmt(e, f),");
    w.close("}");
    w.close("}");
    w.close("}");
    w.blank();

    w.open(format!("impl std::error::Error for {} {{", name));
    w.open("fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {");
    w.open("match self {");
    for (error, _) in &errors {
        w.line(format!("Self::{}(e) => Some(e),", error.name));
    }
    w.line("Self::Unhandled(e) => Some(e),");
    w.close("}");
    w.close("}");
    w.close("}");
    w.blank();

    w.open(format!("impl ProvideErrorCode for {} {{", name));
    w.open("fn code(&self) -> Option<&str> {");
    w.line(format!("{}::code(self)", name));
    w.close("}");
    w.blank();
    w.open("fn message(&self) -> Option<&str> {");
    w.line(format!("{}::message(self)", name));
    w.close("}");
    w.close("}");
    w.blank();

    w.open(format!(
        "pub(crate) fn {}(response: &HttpResponse) -> {} {{",
        error_fn(op_symbols),
        name
    ));
    w.line("let meta = ErrorMetadata::from_response(response);");
    if errors.is_empty() {
        w.line(format!("{}::Unhandled(Unhandled::new(meta))", name));
    } else {
        w.line("let code = meta.code.clone();");
        w.open("match code.as_deref() {");
        for (error, code) in &errors {
            w.open(format!("Some({}) => match {}(response) {{", lit(code), error_struct_fn(error)));
            w.line(format!("Ok(error) => {}::{}(error),", name, error.name));
            w.line(format!(
                "Err(reason) => {}::Unhandled(Unhandled::new(meta).with_reason(reason)),",
                name
            ));
            w.close("},");
        }
        w.line(format!("_ => {}::Unhandled(Unhandled::new(meta)),", name));
        w.close("}");
    }
    w.close("}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CodegenSettings;
    use crate::model::load_from_str;
    use crate::{symbols, traits};

    fn render() -> String {
        let model = load_from_str(
            &json!({
                "smithy": "2.0",
                "shapes": {
                    "example#Weather": {
                        "type": "service",
                        "operations": [ { "target": "example#GetCity" } ],
                        "errors": [ { "target": "example#ServiceUnavailable" } ],
                        "traits": { "aws.protocols#restJson1": {} }
                    },
                    "example#GetCity": {
                        "type": "operation",
                        "errors": [ { "target": "example#NoSuchCityException" } ],
                        "traits": { "smithy.api#http": { "method": "GET", "uri": "/city" } }
                    },
                    "example#NoSuchCityException": {
                        "type": "structure",
                        "members": { "message": { "target": "smithy.api#String" } },
                        "traits": { "smithy.api#error": "client", "smithy.api#httpError": 404 }
                    },
                    "example#ServiceUnavailable": {
                        "type": "structure",
                        "members": {},
                        "traits": { "smithy.api#error": "server", "smithy.api#retryable": {} }
                    }
                }
            })
            .to_string(),
        )
        .unwrap();
        let settings = CodegenSettings::default();
        let index = traits::interpret(&model, &settings).unwrap();
        let table = symbols::build(&model, &index, &settings).unwrap();
        let ctx = CodegenContext::new(&model, &index, &table, &settings).unwrap();
        emit(&ctx).unwrap().render()
    }

    #[test]
    fn test_operation_error_enum() {
        let out = render();
        assert!(out.contains("pub enum GetCityError {"));
        assert!(out.contains("NoSuchCityError(NoSuchCityError),"));
        assert!(out.contains("Self::NoSuchCityError(_) => Some(\"NoSuchCityException\"),"));
        assert!(out.contains("pub fn is_no_such_city_error(&self) -> bool {"));
        assert!(out.contains("Some(\"ServiceUnavailable\") => match de_service_unavailable_error_response(response) {"));
    }

    #[test]
    fn test_error_struct_metadata() {
        let out = render();
        assert!(out.contains("pub const HTTP_STATUS: u16 = 404;"));
        assert!(out.contains("self.message.as_deref()"));
        assert!(out.contains("body.get(\"message\").or_else(|| body.get(\"Message\"))"));
        assert!(out.contains("alias = \"Message\""));
    }
}
