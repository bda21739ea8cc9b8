//! Waiters
//!
//! `src/waiters.rs`: the waiter runtime plus one `Client::wait_until_*`
//! method per waiter. Acceptors are checked in declaration order after every
//! attempt and the first match decides the state. Path matchers run over the
//! serde JSON view of the output, so member names are translated to their
//! wire names here.

use serde_json::json;

use crate::error::{CodegenError, Result};
use crate::model::{ShapeId, ShapeType};
use crate::symbols::{naming, NameAllocator};
use crate::traits::http;
use crate::traits::waiters::{Acceptor, Matcher, PathMatcher, PathStep};
use crate::traits::{OperationIndex, Waiter};

use super::{lit, CodeWriter, CodegenContext, GeneratedFile};

/// Rust rendering of a path over the JSON view, with member names mapped to
/// wire names
fn runtime_steps(ctx: &CodegenContext, start: Option<&ShapeId>, steps: &[PathStep]) -> Result<Vec<String>> {
    let mut current = start.cloned();
    let mut out = Vec::with_capacity(steps.len());
    for step in steps {
        let shape = match &current {
            Some(id) => ctx.shape(id)?,
            None => return Err(CodegenError::validation("waiter path walks past a value with no members")),
        };
        match step {
            PathStep::Field(name) => {
                if !matches!(shape.shape_type, ShapeType::Structure | ShapeType::Union) {
                    return Err(CodegenError::validation(format!(
                        "waiter path selects `{}` from {}, which is not a structure",
                        name, shape.id
                    )));
                }
                let member = shape
                    .member(name)
                    .ok_or_else(|| CodegenError::validation(format!("{} has no member `{}`", shape.id, name)))?;
                out.push(format!("PathStep::Field({})", lit(&http::wire_name(member, ctx.index.protocol))));
                current = Some(member.target.clone());
            }
            PathStep::Project => {
                let member = shape.list_member().ok_or_else(|| {
                    CodegenError::validation(format!("waiter path projects over {}, which is not a list", shape.id))
                })?;
                out.push("PathStep::Project".to_string());
                current = Some(member.target.clone());
            }
        }
    }
    Ok(out)
}

fn emit_path_check(
    ctx: &CodegenContext,
    w: &mut CodeWriter,
    op: &OperationIndex,
    matcher: &PathMatcher,
    with_input: bool,
    state: &str,
) -> Result<()> {
    let steps = &matcher.path.steps;
    let rendered = if with_input {
        let (root, rest) = match steps.split_first() {
            Some((PathStep::Field(root), rest)) if root == "input" => (root.as_str(), rest),
            Some((PathStep::Field(root), rest)) if root == "output" => (root.as_str(), rest),
            _ => {
                return Err(CodegenError::validation(format!(
                    "{}: inputOutput path `{}` must start with input or output",
                    op.id, matcher.path.source
                )))
            }
        };
        let start = if root == "input" { op.input.as_ref() } else { op.output.as_ref() };
        let mut rendered = vec![format!("PathStep::Field({})", lit(root))];
        rendered.extend(runtime_steps(ctx, start, rest)?);
        rendered
    } else {
        runtime_steps(ctx, op.output.as_ref(), steps)?
    };
    let projected = steps.contains(&PathStep::Project);

    w.open("if let Ok(output) = result {");
    if with_input {
        w.line("let view = serde_json::json!({ \"input\": input, \"output\": output });");
    } else {
        w.line("let view = serde_json::to_value(output).unwrap_or(serde_json::Value::Null);");
    }
    w.line(format!("let values = select_path(&view, &[{}]);", rendered.join(", ")));
    if matcher.path.length {
        w.line(format!("let values = length(values, {});", projected));
    }
    w.open(format!(
        "if compare(&values, {}, Comparator::{}, {}) {{",
        lit(&matcher.expected),
        matcher.comparator.variant(),
        projected && !matcher.path.length
    ));
    w.line(format!("return Some(AcceptorState::{});", state));
    w.close("}");
    w.close("}");
    Ok(())
}

fn emit_acceptor(ctx: &CodegenContext, w: &mut CodeWriter, op: &OperationIndex, acceptor: &Acceptor) -> Result<()> {
    let state = acceptor.state.variant();
    match &acceptor.matcher {
        Matcher::Success(true) => {
            w.open("if result.is_ok() {");
            w.line(format!("return Some(AcceptorState::{});", state));
            w.close("}");
        }
        Matcher::Success(false) => {
            w.open("if result.is_err() {");
            w.line(format!("return Some(AcceptorState::{});", state));
            w.close("}");
        }
        Matcher::ErrorType(code) => {
            w.open("if let Err(error) = result {");
            w.open(format!("if error.code() == Some({}) {{", lit(code)));
            w.line(format!("return Some(AcceptorState::{});", state));
            w.close("}");
            w.close("}");
        }
        Matcher::Output(matcher) => emit_path_check(ctx, w, op, matcher, false, state)?,
        Matcher::InputOutput(matcher) => emit_path_check(ctx, w, op, matcher, true, state)?,
    }
    Ok(())
}

fn emit_waiter(ctx: &CodegenContext, w: &mut CodeWriter, op: &OperationIndex, waiter: &Waiter, method: &str) -> Result<()> {
    let symbols = ctx.symbols.operation(&op.id)?;
    let input = symbols.input.path();
    let error = symbols.error.path();
    let acceptor_fn = format!("{}_state", naming::unescaped(method));

    w.open("impl Client {");
    w.doc(waiter.documentation.as_deref());
    if waiter.deprecated {
        w.line("#[deprecated]");
    }
    w.open(format!(
        "pub async fn {}(&self, input: {}, max_wait: Duration) -> Result<(), WaiterError<{}>> {{",
        method, input, error
    ));
    w.line(format!("let min_delay = Duration::from_secs({});", waiter.min_delay));
    w.line(format!("let max_delay = Duration::from_secs({});", waiter.max_delay));
    w.open("if max_wait <= min_delay {");
    w.line("return Err(WaiterError::InvalidConfig(format!(\"max_wait {:?} must exceed the minimum delay {:?}\", max_wait, min_delay)));");
    w.close("}");
    w.line("let started = Instant::now();");
    w.line("let mut attempts: u32 = 0;");
    w.open("loop {");
    w.line("attempts += 1;");
    w.line(format!(
        "let result = self.handle.send_{}(input.clone()).await;",
        naming::unescaped(&symbols.method)
    ));
    w.open(format!("match {}(&input, &result) {{", acceptor_fn));
    w.line("Some(AcceptorState::Success) => return Ok(()),");
    w.line("Some(AcceptorState::Failure) => return Err(WaiterError::FailureState),");
    w.line("Some(AcceptorState::Retry) => {}");
    w.open("None => {");
    w.open("if let Err(error) = result {");
    w.line("return Err(WaiterError::OperationFailed(error));");
    w.close("}");
    w.close("}");
    w.close("}");
    w.line("let elapsed = started.elapsed();");
    w.open("if elapsed >= max_wait {");
    w.line("return Err(WaiterError::ExceededMaxWait { max_wait, elapsed, attempts });");
    w.close("}");
    w.line("tokio::time::sleep(delay(attempts, min_delay, max_delay, max_wait - elapsed)).await;");
    w.close("}");
    w.close("}");
    w.close("}");
    w.blank();

    w.line("#[allow(unused_variables)]");
    w.open(format!(
        "fn {}(input: &{}, result: &Result<{}, SdkError<{}>>) -> Option<AcceptorState> {{",
        acceptor_fn,
        input,
        symbols.output.path(),
        error
    ));
    for acceptor in &waiter.acceptors {
        emit_acceptor(ctx, w, op, acceptor)?;
    }
    w.line("None");
    w.close("}");
    Ok(())
}

/// `src/waiters.rs`
pub fn emit(ctx: &CodegenContext) -> Result<GeneratedFile> {
    let mut w = ctx.writer();
    w.raw(&ctx.render("waiter_runtime.rs", &json!({}))?);
    w.blank();
    w.line("use std::time::Instant;");
    w.blank();
    w.line("use crate::client::Client;");

    let mut methods = NameAllocator::for_fields();
    for op in &ctx.index.operations {
        for waiter in &op.waiters {
            let (method, _) = methods.allocate(&format!("wait_until_{}", naming::to_snake_case(&waiter.name)));
            w.blank();
            emit_waiter(ctx, &mut w, op, waiter, &method)?;
        }
    }
    Ok(w.into_file("src/waiters.rs"))
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
                        "traits": { "aws.protocols#restJson1": {} }
                    },
                    "example#GetCity": {
                        "type": "operation",
                        "input": { "target": "example#GetCityInput" },
                        "output": { "target": "example#GetCityOutput" },
                        "errors": [ { "target": "example#NoSuchCity" } ],
                        "traits": {
                            "smithy.api#http": { "method": "GET", "uri": "/cities/{cityId}" },
                            "smithy.waiters#waitable": {
                                "CityExists": {
                                    "documentation": "Wait until the city is listed",
                                    "minDelay": 5,
                                    "acceptors": [
                                        {
                                            "state": "success",
                                            "matcher": {
                                                "output": { "path": "cityStatus", "expected": "ACTIVE", "comparator": "stringEquals" }
                                            }
                                        },
                                        {
                                            "state": "retry",
                                            "matcher": {
                                                "output": { "path": "length(neighbors[].name)", "expected": "0", "comparator": "stringEquals" }
                                            }
                                        },
                                        { "state": "retry", "matcher": { "errorType": "NoSuchCity" } }
                                    ]
                                }
                            }
                        }
                    },
                    "example#GetCityInput": {
                        "type": "structure",
                        "members": {
                            "cityId": { "target": "smithy.api#String", "traits": { "smithy.api#required": {}, "smithy.api#httpLabel": {} } }
                        }
                    },
                    "example#GetCityOutput": {
                        "type": "structure",
                        "members": {
                            "cityStatus": { "target": "smithy.api#String", "traits": { "smithy.api#jsonName": "status" } },
                            "neighbors": { "target": "example#CityList" }
                        }
                    },
                    "example#CityList": { "type": "list", "member": { "target": "example#CitySummary" } },
                    "example#CitySummary": {
                        "type": "structure",
                        "members": { "name": { "target": "smithy.api#String" } }
                    },
                    "example#NoSuchCity": {
                        "type": "structure",
                        "members": {},
                        "traits": { "smithy.api#error": "client" }
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
    fn test_waiter_method() {
        let out = render();
        assert!(out.contains("pub async fn wait_until_city_exists(&self, input: crate::input::GetCityInput, max_wait: Duration)"));
        assert!(out.contains("let min_delay = Duration::from_secs(5);"));
        assert!(out.contains("let max_delay = Duration::from_secs(120);"));
    }

    #[test]
    fn test_paths_use_wire_names() {
        let out = render();
        assert!(out.contains("let values = select_path(&view, &[PathStep::Field(\"status\")]);"));
        assert!(out.contains(
            "let values = select_path(&view, &[PathStep::Field(\"neighbors\"), PathStep::Project, PathStep::Field(\"name\")]);"
        ));
        assert!(out.contains("let values = length(values, true);"));
        assert!(out.contains("if compare(&values, \"0\", Comparator::StringEquals, false) {"));
    }

    #[test]
    fn test_error_type_acceptor() {
        let out = render();
        assert!(out.contains("if error.code() == Some(\"NoSuchCity\") {"));
        assert!(out.contains("return Some(AcceptorState::Retry);"));
    }
}
