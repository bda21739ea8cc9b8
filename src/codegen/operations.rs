//! Operation serializers and deserializers
//!
//! Each operation becomes a unit struct in `src/operation.rs` with
//! `serialize_request` and `parse_response`. REST operations follow the
//! member bindings; awsJson operations POST every member as one JSON object
//! to `/` with an `X-Amz-Target` header.

use crate::error::{CodegenError, Result};
use crate::model::{Shape, ShapeId, ShapeType};
use crate::symbols::{naming, OperationSymbols, Symbol};
use crate::traits::http::UriSegment;
use crate::traits::{HttpLocation, MemberBinding, OperationIndex, PayloadKind, TimestampFormat};

use super::{lit, CodeWriter, CodegenContext, GeneratedFile};

// =============================================================================
// Public API
// =============================================================================

/// `src/operation.rs`
pub fn emit(ctx: &CodegenContext) -> Result<GeneratedFile> {
    let mut w = ctx.writer();
    w.line("use crate::error::BuildError;");
    w.line("use crate::primitives::{HttpRequest, HttpResponse};");
    w.line("#[allow(unused_imports)]");
    w.line("use crate::primitives::{HttpValue, TimestampFormat};");
    w.blank();
    for op in &ctx.index.operations {
        emit_operation(ctx, &mut w, op)?;
        w.blank();
    }
    Ok(w.into_file("src/operation.rs"))
}

/// Rust path of a runtime `TimestampFormat` variant
fn format_path(format: TimestampFormat) -> String {
    format!("TimestampFormat::{}", format.variant())
}

fn format_in(format: Option<TimestampFormat>, default: TimestampFormat) -> String {
    format!(
        "crate::primitives::TimestampFormat::{}",
        format.unwrap_or(default).variant()
    )
}

/// Name of the output deserializer of an operation
fn output_fn(symbols: &OperationSymbols) -> String {
    format!("de_{}_output", naming::unescaped(&symbols.method))
}

/// Name of the error dispatcher of an operation
pub(crate) fn error_fn(symbols: &OperationSymbols) -> String {
    format!("de_{}_error", naming::unescaped(&symbols.method))
}

/// Name of the response deserializer of an error structure
pub(crate) fn error_struct_fn(symbol: &Symbol) -> String {
    format!("de_{}_response", naming::to_snake_case(&symbol.name))
}

/// A member binding with its field name and target shape
struct Bound<'b, 'a> {
    binding: &'b MemberBinding,
    field: String,
    setter: String,
    target: &'a Shape,
}

fn bind<'b, 'a>(
    ctx: &CodegenContext<'a>,
    container: &ShapeId,
    bindings: &'b [MemberBinding],
) -> Result<Vec<Bound<'b, 'a>>> {
    bindings
        .iter()
        .map(|binding| {
            let names = ctx.symbols.member(container, &binding.member)?;
            Ok(Bound {
                binding,
                field: names.field.clone(),
                setter: names.setter.clone(),
                target: ctx.shape(&binding.target)?,
            })
        })
        .collect()
}

/// Element type of a list target, rendered as a Rust type
fn element_type(ctx: &CodegenContext, list: &Shape) -> Result<(String, ShapeType)> {
    let member = list
        .list_member()
        .ok_or_else(|| CodegenError::validation(format!("{} has no member", list.id)))?;
    let target = ctx.shape(&member.target)?;
    Ok((ctx.symbols.rust_type(ctx.model, &member.target)?, target.shape_type))
}

fn is_list(shape: &Shape) -> bool {
    matches!(shape.shape_type, ShapeType::List | ShapeType::Set)
}

fn is_text(shape_type: ShapeType) -> bool {
    matches!(shape_type, ShapeType::String | ShapeType::Enum)
}

// =============================================================================
// Operations
// =============================================================================

fn emit_operation(ctx: &CodegenContext, w: &mut CodeWriter, op: &OperationIndex) -> Result<()> {
    let symbols = ctx.symbols.operation(&op.id)?;
    let name = &symbols.operation.name;
    let input = symbols.input.path();
    let output = symbols.output.path();
    let error = symbols.error.path();

    match &op.documentation {
        Some(docs) => w.doc(Some(docs)),
        None => w.line(format!("/// The `{}` operation", op.id.name())),
    };
    if op.deprecated {
        w.line("#[deprecated]");
    }
    w.line("#[derive(Debug, Clone, Copy, Default)]");
    w.line(format!("pub struct {};", name));
    w.blank();

    w.open(format!("impl {} {{", name));
    w.line("/// Serialize `input` into a request against `endpoint`");
    w.open(format!(
        "pub fn serialize_request(input: &{}, endpoint: &str) -> Result<HttpRequest, BuildError> {{",
        input
    ));
    if ctx.index.protocol.is_rest() {
        emit_rest_serializer(ctx, w, op)?;
    } else {
        emit_aws_json_serializer(ctx, w, op)?;
    }
    w.close("}");
    w.blank();

    w.open(format!(
        "pub fn parse_response(response: &HttpResponse) -> Result<{}, {}> {{",
        output, error
    ));
    w.open("if !response.is_success() {");
    w.line(format!("return Err(crate::error::{}(response));", error_fn(symbols)));
    w.close("}");
    w.open(format!("{}(response).map_err(|reason| {{", output_fn(symbols)));
    w.line(format!(
        "{}::Unhandled(crate::error::Unhandled::new(crate::error::ErrorMetadata::from_response(response)).with_reason(reason))",
        error
    ));
    w.close("})");
    w.close("}");
    w.close("}");
    w.blank();

    let output_shape = match &op.output {
        Some(id) => Some(ctx.shape(id)?),
        None => None,
    };
    emit_deserializer(
        ctx,
        w,
        &output_fn(symbols),
        &symbols.output,
        output_shape,
        &op.output_bindings,
    )
}

/// Fill an unset idempotency token on a copy of the input
fn emit_idempotency_token(ctx: &CodegenContext, w: &mut CodeWriter, op: &OperationIndex) -> Result<()> {
    if let (Some(member), Some(input)) = (&op.idempotency_token, &op.input) {
        let field = &ctx.symbols.member(input, member)?.field;
        w.line("let mut owned = input.clone();");
        w.open(format!("if owned.{}.is_none() {{", field));
        w.line(format!("owned.{} = Some(crate::primitives::idempotency_token());", field));
        w.close("}");
        w.line("let input = &owned;");
    }
    Ok(())
}

fn emit_body_object(w: &mut CodeWriter, body: &[&Bound]) {
    w.line("let mut body = serde_json::Map::new();");
    for bound in body {
        w.open(format!("if let Some(value) = &input.{} {{", bound.field));
        let value = if bound.target.shape_type == ShapeType::Timestamp {
            format!(
                "crate::primitives::timestamp_to_json(value, {})",
                format_in(bound.binding.timestamp_format, TimestampFormat::EpochSeconds)
            )
        } else {
            "crate::primitives::to_json(value).map_err(BuildError::serialization)?".to_string()
        };
        w.line(format!("body.insert({}.to_string(), {});", lit(&bound.binding.wire_name), value));
        w.close("}");
    }
    w.line("request.body = serde_json::to_vec(&serde_json::Value::Object(body))");
    w.line("    .map_err(|e| BuildError::serialization(e.to_string()))?;");
}

fn emit_aws_json_serializer(ctx: &CodegenContext, w: &mut CodeWriter, op: &OperationIndex) -> Result<()> {
    emit_idempotency_token(ctx, w, op)?;
    let bound = match &op.input {
        Some(id) => bind(ctx, id, &op.input_bindings)?,
        None => Vec::new(),
    };
    if bound.is_empty() {
        w.line("let _ = input;");
    }
    w.line("let mut request = HttpRequest::new(\"POST\", format!(\"{}/\", endpoint.trim_end_matches('/')));");
    w.line(format!(
        "request.set_header(\"Content-Type\", {});",
        lit(ctx.index.protocol.content_type())
    ));
    w.line(format!(
        "request.set_header(\"X-Amz-Target\", {});",
        lit(&format!("{}.{}", ctx.index.service_name(), op.id.name()))
    ));
    let body: Vec<&Bound> = bound.iter().collect();
    emit_body_object(w, &body);
    w.line("Ok(request)");
    Ok(())
}

fn emit_rest_serializer(ctx: &CodegenContext, w: &mut CodeWriter, op: &OperationIndex) -> Result<()> {
    let http = op
        .http
        .as_ref()
        .ok_or_else(|| CodegenError::validation(format!("{} has no http trait", op.id)))?;
    emit_idempotency_token(ctx, w, op)?;
    let bound = match &op.input {
        Some(id) => bind(ctx, id, &op.input_bindings)?,
        None => Vec::new(),
    };
    if bound.is_empty() {
        w.line("let _ = input;");
    }
    let find = |name: &str| bound.iter().find(|b| b.binding.member == name);

    // path
    w.line("let mut uri = endpoint.trim_end_matches('/').to_string();");
    if http.uri.segments.is_empty() {
        w.line("uri.push('/');");
    }
    for segment in &http.uri.segments {
        match segment {
            UriSegment::Literal(text) => {
                w.line(format!("uri.push_str({});", lit(&format!("/{}", text))));
            }
            UriSegment::Label(name) | UriSegment::GreedyLabel(name) => {
                let greedy = matches!(segment, UriSegment::GreedyLabel(_));
                let label = find(name)
                    .ok_or_else(|| CodegenError::validation(format!("{}: unbound label `{}`", op.id, name)))?;
                w.open("{");
                w.line(format!("let value = input.{}.as_ref()", label.field));
                w.line(format!(
                    "    .map(|v| v.to_http({}))",
                    format_path(label.binding.timestamp_format.unwrap_or(TimestampFormat::DateTime))
                ));
                w.line("    .filter(|v| !v.is_empty())");
                w.line(format!(
                    "    .ok_or_else(|| BuildError::missing_field({}, \"cannot be empty or unset\"))?;",
                    lit(naming::unescaped(&label.field))
                ));
                w.line("uri.push('/');");
                w.line(format!("uri.push_str(&crate::primitives::percent_encode(&value, {}));", greedy));
                w.close("}");
            }
        }
    }

    // query
    let queries: Vec<&Bound> = bound
        .iter()
        .filter(|b| matches!(b.binding.location, HttpLocation::Query(_)))
        .collect();
    let query_params = bound.iter().find(|b| b.binding.location == HttpLocation::QueryParams);
    if !http.uri.query.is_empty() || !queries.is_empty() || query_params.is_some() {
        w.line("let mut query: Vec<String> = Vec::new();");
        for (key, value) in &http.uri.query {
            let pair = if value.is_empty() {
                key.clone()
            } else {
                format!("{}={}", key, value)
            };
            w.line(format!("query.push({}.to_string());", lit(&pair)));
        }
        for q in &queries {
            let HttpLocation::Query(key) = &q.binding.location else {
                continue;
            };
            let format = format_path(q.binding.timestamp_format.unwrap_or(TimestampFormat::DateTime));
            let push = format!(
                "query.push(format!(\"{{}}={{}}\", {}, crate::primitives::percent_encode(&item.to_http({}), false)));",
                lit(&percent_encode_key(key)),
                format
            );
            w.open(format!("if let Some(value) = &input.{} {{", q.field));
            if is_list(q.target) {
                w.open("for item in value {");
                w.line(push);
                w.close("}");
            } else {
                w.line("let item = value;");
                w.line(push);
            }
            w.close("}");
        }
        if let Some(params) = query_params {
            let value_shape = params
                .target
                .map_value()
                .map(|m| ctx.shape(&m.target))
                .transpose()?;
            let multi = value_shape.map(is_list).unwrap_or(false);
            w.open(format!("if let Some(params) = &input.{} {{", params.field));
            w.line("let mut keys: Vec<&String> = params.keys().collect();");
            w.line("keys.sort();");
            w.open("for key in keys {");
            w.line("let encoded = crate::primitives::percent_encode(key, false);");
            w.open("if query.iter().any(|p| p.split('=').next() == Some(encoded.as_str())) {");
            w.line("continue;");
            w.close("}");
            if multi {
                w.open("for value in &params[key] {");
            } else {
                w.open("{");
                w.line("let value = &params[key];");
            }
            w.line("query.push(format!(\"{}={}\", encoded, crate::primitives::percent_encode(value, false)));");
            w.close("}");
            w.close("}");
            w.close("}");
        }
        w.open("if !query.is_empty() {");
        w.line("uri.push('?');");
        w.line("uri.push_str(&query.join(\"&\"));");
        w.close("}");
    }

    w.line(format!("let mut request = HttpRequest::new({}, uri);", lit(&http.method)));

    // headers
    for b in &bound {
        match &b.binding.location {
            HttpLocation::Header(name) => {
                w.open(format!("if let Some(value) = &input.{} {{", b.field));
                if is_list(b.target) {
                    let (_, element) = element_type(ctx, b.target)?;
                    let format = format_path(b.binding.timestamp_format.unwrap_or(TimestampFormat::HttpDate));
                    let item = if is_text(element) {
                        format!("crate::primitives::quote_header_value(&item.to_http({}))", format)
                    } else {
                        format!("item.to_http({})", format)
                    };
                    w.open("if !value.is_empty() {");
                    w.line(format!(
                        "let joined: Vec<String> = value.iter().map(|item| {}).collect();",
                        item
                    ));
                    w.line(format!("request.headers.push(({}.to_string(), joined.join(\", \")));", lit(name)));
                    w.close("}");
                } else {
                    w.line(format!(
                        "request.headers.push(({}.to_string(), value.to_http({})));",
                        lit(name),
                        format_path(b.binding.timestamp_format.unwrap_or(TimestampFormat::HttpDate))
                    ));
                }
                w.close("}");
            }
            HttpLocation::PrefixHeaders(prefix) => {
                w.open(format!("if let Some(value) = &input.{} {{", b.field));
                w.line("let mut keys: Vec<&String> = value.keys().collect();");
                w.line("keys.sort();");
                w.open("for key in keys {");
                w.line(format!(
                    "request.headers.push((format!(\"{{}}{{}}\", {}, key), value[key].to_http(TimestampFormat::HttpDate)));",
                    lit(prefix)
                ));
                w.close("}");
                w.close("}");
            }
            _ => {}
        }
    }

    // body
    let body: Vec<&Bound> = bound.iter().filter(|b| b.binding.location == HttpLocation::Body).collect();
    let payload = bound.iter().find(|b| matches!(b.binding.location, HttpLocation::Payload(_)));
    if let Some(p) = payload {
        let HttpLocation::Payload(kind) = p.binding.location else {
            return Err(CodegenError::validation(format!("{}: payload binding expected", op.id)));
        };
        let (bytes, content_type) = match kind {
            PayloadKind::Json | PayloadKind::Document => (
                "serde_json::to_vec(value).map_err(|e| BuildError::serialization(e.to_string()))?",
                "application/json",
            ),
            PayloadKind::Blob { .. } => ("value.as_bytes().to_vec()", "application/octet-stream"),
            PayloadKind::Text => ("value.as_str().as_bytes().to_vec()", "text/plain"),
        };
        w.open(format!("if let Some(value) = &input.{} {{", p.field));
        w.line(format!("request.body = {};", bytes));
        w.open("if request.header(\"Content-Type\").is_none() {");
        w.line(format!("request.set_header(\"Content-Type\", {});", lit(content_type)));
        w.close("}");
        w.close("}");
    } else if !body.is_empty() {
        emit_body_object(w, &body);
        w.open("if request.header(\"Content-Type\").is_none() {");
        w.line(format!(
            "request.set_header(\"Content-Type\", {});",
            lit(ctx.index.protocol.content_type())
        ));
        w.close("}");
    }
    w.line("Ok(request)");
    Ok(())
}

/// Query keys are constants of the model; encode them at generation time
fn percent_encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for b in key.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

// =============================================================================
// Deserializers
// =============================================================================

/// Emit `fn <name>(response) -> Result<T, String>` that builds `symbol`
/// from the bound parts of a response
pub(crate) fn emit_deserializer(
    ctx: &CodegenContext,
    w: &mut CodeWriter,
    fn_name: &str,
    symbol: &Symbol,
    container: Option<&Shape>,
    bindings: &[MemberBinding],
) -> Result<()> {
    let bound = match container {
        Some(shape) => bind(ctx, &shape.id, bindings)?,
        None => Vec::new(),
    };
    let message = match container {
        Some(shape) if shape.is_error() => super::shapes::message_member(ctx, shape)?.map(|m| m.name.clone()),
        _ => None,
    };

    w.open(format!(
        "pub(crate) fn {}(response: &crate::primitives::HttpResponse) -> Result<{}, String> {{",
        fn_name,
        symbol.path()
    ));
    if bound.is_empty() {
        w.line("let _ = response;");
        w.line(format!("Ok({}::builder().build())", symbol.path()));
        w.close("}");
        return Ok(());
    }
    w.line(format!("let mut builder = {}::builder();", symbol.path()));

    let body: Vec<&Bound> = bound.iter().filter(|b| b.binding.location == HttpLocation::Body).collect();
    if !body.is_empty() {
        w.line("let body = crate::primitives::parse_json_object(&response.body)?;");
        for b in &body {
            let setter = &b.setter;
            let wire = &b.binding.wire_name;
            let lookup = if message.as_deref() == Some(b.binding.member.as_str()) {
                let alias = if wire == "message" { "Message" } else { "message" };
                format!("body.get({}).or_else(|| body.get({}))", lit(wire), lit(alias))
            } else {
                format!("body.get({})", lit(wire))
            };
            let parse = if b.target.shape_type == ShapeType::Timestamp {
                format!(
                    "crate::primitives::timestamp_from_json(value, {})?",
                    format_in(b.binding.timestamp_format, TimestampFormat::EpochSeconds)
                )
            } else {
                "crate::primitives::from_json(value)?".to_string()
            };
            w.open(format!("if let Some(value) = {}.filter(|v| !v.is_null()) {{", lookup));
            w.line(format!("builder = builder.{}(Some({}));", setter, parse));
            w.close("}");
        }
    }

    for b in &bound {
        let setter = &b.setter;
        match &b.binding.location {
            HttpLocation::Header(name) => {
                let format = format_in(b.binding.timestamp_format, TimestampFormat::HttpDate);
                w.open(format!("if let Some(value) = response.header({}) {{", lit(name)));
                if is_list(b.target) {
                    let (element, _) = element_type(ctx, b.target)?;
                    let split = if b.binding.timestamp_format == Some(TimestampFormat::HttpDate)
                        || (b.binding.timestamp_format.is_none() && element == "crate::primitives::DateTime")
                    {
                        "split_http_date_list"
                    } else {
                        "split_header_list"
                    };
                    w.line(format!("let items = crate::primitives::{}(value)", split));
                    w.line("    .iter()");
                    w.line(format!(
                        "    .map(|item| <{} as crate::primitives::HttpValue>::from_http(item, {}))",
                        element, format
                    ));
                    w.line("    .collect::<Result<Vec<_>, _>>()?;");
                    w.line(format!("builder = builder.{}(Some(items));", setter));
                } else {
                    let ty = ctx.symbols.rust_type(ctx.model, &b.binding.target)?;
                    w.line(format!(
                        "builder = builder.{}(Some(<{} as crate::primitives::HttpValue>::from_http(value, {})?));",
                        setter, ty, format
                    ));
                }
                w.close("}");
            }
            HttpLocation::PrefixHeaders(prefix) => {
                let value_ty = match b.target.map_value() {
                    Some(member) => ctx.symbols.rust_type(ctx.model, &member.target)?,
                    None => "String".to_string(),
                };
                w.line(format!("let prefixed = response.headers_with_prefix({});", lit(prefix)));
                w.open("if !prefixed.is_empty() {");
                w.line("let map = prefixed");
                w.line("    .into_iter()");
                w.line(format!(
                    "    .map(|(k, v)| <{} as crate::primitives::HttpValue>::from_http(v, crate::primitives::TimestampFormat::HttpDate).map(|v| (k, v)))",
                    value_ty
                ));
                w.line("    .collect::<Result<std::collections::HashMap<_, _>, _>>()?;");
                w.line(format!("builder = builder.{}(Some(map));", setter));
                w.close("}");
            }
            HttpLocation::ResponseCode => {
                w.line(format!("builder = builder.{}(Some(response.status as i32));", setter));
            }
            HttpLocation::Payload(kind) => match kind {
                PayloadKind::Json | PayloadKind::Document => {
                    w.open("if !response.body.is_empty() {");
                    w.line(format!(
                        "builder = builder.{}(Some(serde_json::from_slice(&response.body).map_err(|e| e.to_string())?));",
                        setter
                    ));
                    w.close("}");
                }
                PayloadKind::Blob { .. } => {
                    w.open("if !response.body.is_empty() {");
                    w.line(format!(
                        "builder = builder.{}(Some(crate::primitives::Blob::new(response.body.clone())));",
                        setter
                    ));
                    w.close("}");
                }
                PayloadKind::Text => {
                    let ty = ctx.symbols.rust_type(ctx.model, &b.binding.target)?;
                    w.line("let text = String::from_utf8_lossy(&response.body).into_owned();");
                    w.open("if !text.is_empty() {");
                    w.line(format!("builder = builder.{}(Some({}::from(text.as_str())));", setter, ty));
                    w.close("}");
                }
            },
            HttpLocation::Body
            | HttpLocation::Label { .. }
            | HttpLocation::Query(_)
            | HttpLocation::QueryParams => {}
        }
    }
    w.line("Ok(builder.build())");
    w.close("}");
    Ok(())
}
