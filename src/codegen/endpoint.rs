//! Endpoint resolver
//!
//! Compiles the rule set into straight-line Rust: every rule is a block,
//! every condition an `if` (or `if let` when it narrows an optional value),
//! and every leaf returns. Expressions are typed while compiling, so a rule
//! set that reads an optional parameter without an `isSet` guard is rejected
//! here instead of producing code that does not build.

use serde_json::Value;

use crate::error::{CodegenError, Result};
use crate::model::traits;
use crate::symbols::{naming, NameAllocator};
use crate::traits::endpoint::{
    AttrStep, Condition, EndpointExpectation, EndpointValue, Expr, Function, FunctionCall, ParamType,
    Parameter, Rule, RuleSet, TemplatePart,
};

use super::{lit, CodeWriter, CodegenContext, GeneratedFile};

const NO_MATCH: &str = "No rules matched the endpoint parameters";

// =============================================================================
// Parameters
// =============================================================================

/// A rule set parameter with its Rust field name
pub(crate) struct ParamField<'a> {
    pub param: &'a Parameter,
    pub field: String,
}

impl ParamField<'_> {
    /// Stored without `Option` once the builder has run
    pub fn is_plain(&self) -> bool {
        self.param.default.is_some() || self.param.required
    }

    pub fn value_type(&self) -> &'static str {
        match self.param.param_type {
            ParamType::String => "String",
            ParamType::Boolean => "bool",
        }
    }
}

pub(crate) fn param_fields(rule_set: &RuleSet) -> Vec<ParamField<'_>> {
    let mut names = NameAllocator::for_fields();
    for reserved in ["builder", "build"] {
        names.reserve(reserved);
    }
    rule_set
        .parameters
        .iter()
        .map(|param| ParamField {
            param,
            field: names.allocate(&naming::field_name(&param.name)).0,
        })
        .collect()
}

fn default_literal(value: &Value) -> String {
    match value {
        Value::String(s) => format!("{}.to_string()", lit(s)),
        other => other.to_string(),
    }
}

fn emit_params(w: &mut CodeWriter, fields: &[ParamField]) {
    w.line("/// Parameters of the endpoint rule set");
    w.line("#[derive(Debug, Clone, PartialEq, Eq)]");
    w.open("pub struct Params {");
    for f in fields {
        if f.is_plain() {
            w.line(format!("pub(crate) {}: {},", f.field, f.value_type()));
        } else {
            w.line(format!("pub(crate) {}: Option<{}>,", f.field, f.value_type()));
        }
    }
    w.close("}");
    w.blank();

    w.open("impl Params {");
    w.open("pub fn builder() -> ParamsBuilder {");
    w.line("ParamsBuilder::default()");
    w.close("}");
    for f in fields {
        w.blank();
        w.doc(f.param.documentation.as_deref());
        let accessor = match (f.param.param_type, f.is_plain()) {
            (ParamType::String, true) => ("&str", format!("&self.{}", f.field)),
            (ParamType::String, false) => ("Option<&str>", format!("self.{}.as_deref()", f.field)),
            (ParamType::Boolean, true) => ("bool", format!("self.{}", f.field)),
            (ParamType::Boolean, false) => ("Option<bool>", format!("self.{}", f.field)),
        };
        w.open(format!("pub fn {}(&self) -> {} {{", f.field, accessor.0));
        w.line(accessor.1);
        w.close("}");
    }
    w.close("}");
    w.blank();

    w.line("#[derive(Debug, Clone, Default)]");
    w.open("pub struct ParamsBuilder {");
    for f in fields {
        w.line(format!("{}: Option<{}>,", f.field, f.value_type()));
    }
    w.close("}");
    w.blank();

    w.open("impl ParamsBuilder {");
    for f in fields {
        w.open(format!(
            "pub fn {}(mut self, value: impl Into<{}>) -> Self {{",
            f.field,
            f.value_type()
        ));
        w.line(format!("self.{} = Some(value.into());", f.field));
        w.line("self");
        w.close("}");
        w.blank();
        w.open(format!(
            "pub fn set_{}(mut self, value: Option<{}>) -> Self {{",
            naming::unescaped(&f.field),
            f.value_type()
        ));
        w.line(format!("self.{} = value;", f.field));
        w.line("self");
        w.close("}");
        w.blank();
    }
    w.line("/// Apply defaults and check required parameters");
    w.open("pub fn build(self) -> Result<Params, ResolveEndpointError> {");
    w.open("Ok(Params {");
    for f in fields {
        match (&f.param.default, f.param.required) {
            (Some(default), _) => {
                w.line(format!(
                    "{}: self.{}.unwrap_or_else(|| {}),",
                    f.field,
                    f.field,
                    default_literal(default)
                ));
            }
            (None, true) => {
                w.line(format!(
                    "{}: self.{}.ok_or_else(|| ResolveEndpointError::message({}))?,",
                    f.field,
                    f.field,
                    lit(&format!("Missing required parameter: {}", f.param.name))
                ));
            }
            (None, false) => {
                w.line(format!("{}: self.{},", f.field, f.field));
            }
        }
    }
    w.close("})");
    w.close("}");
    w.close("}");
}

// =============================================================================
// Rule Compilation
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ty {
    Str,
    OptStr,
    Bool,
    OptBool,
    Int,
    Url,
    OptUrl,
    Partition,
    OptPartition,
}

impl Ty {
    fn narrowed(self) -> Option<Ty> {
        match self {
            Ty::OptStr => Some(Ty::Str),
            Ty::OptBool => Some(Ty::Bool),
            Ty::OptUrl => Some(Ty::Url),
            Ty::OptPartition => Some(Ty::Partition),
            _ => None,
        }
    }

    fn is_copy(self) -> bool {
        matches!(self, Ty::Bool | Ty::OptBool | Ty::Int)
    }
}

#[derive(Clone)]
struct Binding {
    name: String,
    ident: String,
    ty: Ty,
}

/// Names visible to a rule, innermost last
#[derive(Clone, Default)]
struct Scope(Vec<Binding>);

impl Scope {
    fn lookup(&self, name: &str) -> Option<&Binding> {
        self.0.iter().rev().find(|b| b.name == name)
    }

    fn bind(&mut self, name: &str, ident: String, ty: Ty) {
        self.0.push(Binding {
            name: name.to_string(),
            ident,
            ty,
        });
    }
}

/// Rust local for a rule set name
fn local(name: &str) -> String {
    let ident = naming::field_name(name);
    if ident == "params" {
        "params_value".to_string()
    } else {
        ident
    }
}

struct Compiler<'a> {
    service: &'a crate::model::ShapeId,
}

impl<'a> Compiler<'a> {
    fn type_error(&self, message: impl std::fmt::Display) -> CodegenError {
        CodegenError::validation(format!("{}: endpoint rule set: {}", self.service, message))
    }

    fn unsupported(&self, message: impl Into<String>) -> CodegenError {
        CodegenError::unsupported(self.service, traits::ENDPOINT_RULE_SET, message)
    }

    /// An expression that must be a non-optional string
    fn string_arg(&self, expr: &Expr, scope: &Scope) -> Result<String> {
        match self.expr(expr, scope)? {
            (code, Ty::Str) => Ok(code),
            (_, Ty::OptStr) => Err(self.type_error(format!(
                "{} may be unset where a string is required; guard it with isSet",
                describe(expr)
            ))),
            (_, other) => Err(self.type_error(format!("{} is a {:?}, expected a string", describe(expr), other))),
        }
    }

    fn bool_arg(&self, expr: &Expr, scope: &Scope) -> Result<(String, Ty)> {
        match self.expr(expr, scope)? {
            (code, ty @ (Ty::Bool | Ty::OptBool)) => Ok((code, ty)),
            (_, other) => Err(self.type_error(format!("{} is a {:?}, expected a boolean", describe(expr), other))),
        }
    }

    fn int_arg(&self, expr: &Expr) -> Result<String> {
        match expr {
            Expr::Int(i) if *i >= 0 => Ok(i.to_string()),
            other => Err(self.type_error(format!("{} must be a non-negative integer literal", describe(other)))),
        }
    }

    fn expr(&self, expr: &Expr, scope: &Scope) -> Result<(String, Ty)> {
        match expr {
            Expr::Bool(b) => Ok((b.to_string(), Ty::Bool)),
            Expr::Int(i) => Ok((i.to_string(), Ty::Int)),
            Expr::Ref(name) => {
                let binding = scope
                    .lookup(name)
                    .ok_or_else(|| self.type_error(format!("reference to unbound name `{}`", name)))?;
                if binding.ty.is_copy() {
                    Ok((binding.ident.clone(), binding.ty))
                } else {
                    Ok((format!("{}.clone()", binding.ident), binding.ty))
                }
            }
            Expr::String(template) => self.template(&template.parts, scope),
            Expr::Call(call) => self.call(call, scope),
        }
    }

    fn template(&self, parts: &[TemplatePart], scope: &Scope) -> Result<(String, Ty)> {
        if let [TemplatePart::Literal(text)] = parts {
            return Ok((format!("{}.to_string()", lit(text)), Ty::Str));
        }
        if parts.is_empty() {
            return Ok(("String::new()".to_string(), Ty::Str));
        }
        let mut pattern = String::new();
        let mut args = Vec::new();
        for part in parts {
            match part {
                TemplatePart::Literal(text) => pattern.push_str(&text.replace('{', "{{").replace('}', "}}")),
                TemplatePart::Ref(name) => {
                    pattern.push_str("{}");
                    args.push(self.display_arg(&Expr::Ref(name.clone()), scope)?);
                }
                TemplatePart::Attr(name, path) => {
                    pattern.push_str("{}");
                    let (code, ty) = self.expr(&Expr::Ref(name.clone()), scope)?;
                    let (code, ty) = self.attr(&format!("({})", code), ty, path)?;
                    args.push(self.displayable(code, ty, &format!("{}#{:?}", name, path))?);
                }
            }
        }
        Ok((format!("format!({}, {})", lit(&pattern), args.join(", ")), Ty::Str))
    }

    fn display_arg(&self, expr: &Expr, scope: &Scope) -> Result<String> {
        let (code, ty) = self.expr(expr, scope)?;
        self.displayable(code, ty, &describe(expr))
    }

    fn displayable(&self, code: String, ty: Ty, what: &str) -> Result<String> {
        match ty {
            Ty::Str | Ty::Bool | Ty::Int => Ok(code),
            Ty::OptStr | Ty::OptBool => Err(self.type_error(format!(
                "{} may be unset inside a template; guard it with isSet",
                what
            ))),
            other => Err(self.type_error(format!("{} is a {:?} and cannot be interpolated", what, other))),
        }
    }

    fn attr(&self, code: &str, ty: Ty, path: &[AttrStep]) -> Result<(String, Ty)> {
        let [AttrStep::Field(field)] = path else {
            return Err(self.unsupported(format!("getAttr path {:?} is not supported", path)));
        };
        let (rust_field, field_ty) = match (ty, field.as_str()) {
            (Ty::Url, "scheme") => ("scheme", Ty::Str),
            (Ty::Url, "authority") => ("authority", Ty::Str),
            (Ty::Url, "path") => ("path", Ty::Str),
            (Ty::Url, "normalizedPath") => ("normalized_path", Ty::Str),
            (Ty::Url, "isIp") => ("is_ip", Ty::Bool),
            (Ty::Partition, "name") => ("name", Ty::Str),
            (Ty::Partition, "dnsSuffix") => ("dns_suffix", Ty::Str),
            (Ty::Partition, "dualStackDnsSuffix") => ("dual_stack_dns_suffix", Ty::Str),
            (Ty::Partition, "supportsFIPS") => ("supports_fips", Ty::Bool),
            (Ty::Partition, "supportsDualStack") => ("supports_dual_stack", Ty::Bool),
            (Ty::Partition, "implicitGlobalRegion") => ("implicit_global_region", Ty::Str),
            (Ty::OptUrl | Ty::OptPartition, _) => {
                return Err(self.type_error(format!("getAttr `{}` on a value that may be unset", field)))
            }
            _ => return Err(self.unsupported(format!("getAttr field `{}` on {:?} is not supported", field, ty))),
        };
        if field_ty.is_copy() {
            Ok((format!("{}.{}", code, rust_field), field_ty))
        } else {
            Ok((format!("{}.{}.clone()", code, rust_field), field_ty))
        }
    }

    fn call(&self, call: &FunctionCall, scope: &Scope) -> Result<(String, Ty)> {
        let args = &call.args;
        match call.function {
            Function::IsSet => {
                let (code, ty) = self.expr(&args[0], scope)?;
                match ty.narrowed() {
                    Some(_) => Ok((format!("{}.is_some()", code), Ty::Bool)),
                    None => Ok(("true".to_string(), Ty::Bool)),
                }
            }
            Function::Not => {
                let (code, ty) = self.bool_arg(&args[0], scope)?;
                if ty == Ty::OptBool {
                    return Err(self.type_error("not() of a value that may be unset"));
                }
                Ok((format!("!({})", code), Ty::Bool))
            }
            Function::BooleanEquals => {
                let (a, a_ty) = self.bool_arg(&args[0], scope)?;
                let (b, b_ty) = self.bool_arg(&args[1], scope)?;
                let code = match (a_ty, b_ty) {
                    (Ty::OptBool, Ty::Bool) => format!("({} == Some({}))", a, b),
                    (Ty::Bool, Ty::OptBool) => format!("(Some({}) == {})", a, b),
                    _ => format!("({} == {})", a, b),
                };
                Ok((code, Ty::Bool))
            }
            Function::StringEquals => {
                let (a, a_ty) = self.expr(&args[0], scope)?;
                let (b, b_ty) = self.expr(&args[1], scope)?;
                let code = match (a_ty, b_ty) {
                    (Ty::Str, Ty::Str) | (Ty::OptStr, Ty::OptStr) => format!("({} == {})", a, b),
                    (Ty::OptStr, Ty::Str) => format!("({} == Some({}))", a, b),
                    (Ty::Str, Ty::OptStr) => format!("(Some({}) == {})", a, b),
                    _ => {
                        return Err(self.type_error(format!(
                            "stringEquals compares {:?} with {:?}",
                            a_ty, b_ty
                        )))
                    }
                };
                Ok((code, Ty::Bool))
            }
            Function::GetAttr => {
                let (code, ty) = self.expr(&args[0], scope)?;
                let path = match &args[1] {
                    Expr::String(template) => match template.parts.as_slice() {
                        [TemplatePart::Literal(path)] => path.clone(),
                        _ => return Err(self.type_error("getAttr path must be a string literal")),
                    },
                    _ => return Err(self.type_error("getAttr path must be a string literal")),
                };
                let steps = crate::traits::endpoint::parse_attr_path(&path).map_err(|e| self.type_error(e))?;
                self.attr(&format!("({})", code), ty, &steps)
            }
            Function::Substring => {
                let input = self.string_arg(&args[0], scope)?;
                let start = self.int_arg(&args[1])?;
                let stop = self.int_arg(&args[2])?;
                let (reverse, reverse_ty) = self.bool_arg(&args[3], scope)?;
                if reverse_ty == Ty::OptBool {
                    return Err(self.type_error("substring reverse flag may be unset"));
                }
                Ok((
                    format!("substring(&{}, {}, {}, {})", input, start, stop, reverse),
                    Ty::OptStr,
                ))
            }
            Function::IsValidHostLabel => {
                let value = self.string_arg(&args[0], scope)?;
                let (allow, allow_ty) = self.bool_arg(&args[1], scope)?;
                if allow_ty == Ty::OptBool {
                    return Err(self.type_error("isValidHostLabel flag may be unset"));
                }
                Ok((format!("is_valid_host_label(&{}, {})", value, allow), Ty::Bool))
            }
            Function::UriEncode => {
                let value = self.string_arg(&args[0], scope)?;
                Ok((format!("uri_encode(&{})", value), Ty::Str))
            }
            Function::ParseUrl => {
                let value = self.string_arg(&args[0], scope)?;
                Ok((format!("parse_url(&{})", value), Ty::OptUrl))
            }
            Function::AwsPartition => {
                let value = self.string_arg(&args[0], scope)?;
                Ok((format!("partition(&{})", value), Ty::OptPartition))
            }
        }
    }

    /// Emit the condition and return how many blocks it opened
    fn condition(&self, w: &mut CodeWriter, condition: &Condition, scope: &mut Scope) -> Result<usize> {
        // isSet(ref) narrows the reference for the rest of the rule
        if condition.call.function == Function::IsSet {
            if let Expr::Ref(name) = &condition.call.args[0] {
                let binding = scope
                    .lookup(name)
                    .cloned()
                    .ok_or_else(|| self.type_error(format!("reference to unbound name `{}`", name)))?;
                let opened = match binding.ty.narrowed() {
                    Some(narrowed) => {
                        let source = if binding.ty.is_copy() {
                            binding.ident.clone()
                        } else {
                            format!("{}.clone()", binding.ident)
                        };
                        w.open(format!("if let Some({}) = {} {{", binding.ident, source));
                        scope.bind(name, binding.ident.clone(), narrowed);
                        1
                    }
                    None => 0,
                };
                if let Some(assign) = &condition.assign {
                    let ident = local(assign);
                    w.line(format!("let {} = true;", ident));
                    scope.bind(assign, ident, Ty::Bool);
                }
                return Ok(opened);
            }
        }

        let (code, ty) = self.call(&condition.call, scope)?;
        match (&condition.assign, ty.narrowed()) {
            (Some(assign), Some(narrowed)) => {
                let ident = local(assign);
                w.open(format!("if let Some({}) = {} {{", ident, code));
                scope.bind(assign, ident, narrowed);
                Ok(1)
            }
            (None, Some(_)) => {
                w.open(format!("if {}.is_some() {{", code));
                Ok(1)
            }
            (Some(assign), None) if ty == Ty::Bool => {
                let ident = local(assign);
                w.line(format!("let {} = {};", ident, code));
                w.open(format!("if {} {{", ident));
                scope.bind(assign, ident, Ty::Bool);
                Ok(1)
            }
            (None, None) if ty == Ty::Bool => {
                w.open(format!("if {} {{", code));
                Ok(1)
            }
            (Some(assign), None) => {
                let ident = local(assign);
                w.line(format!("let {} = {};", ident, code));
                scope.bind(assign, ident, ty);
                Ok(0)
            }
            (None, None) => Ok(0),
        }
    }

    fn rule(&self, w: &mut CodeWriter, rule: &Rule, mut scope: Scope) -> Result<()> {
        w.open("{");
        let mut opened = 0;
        for condition in rule.conditions() {
            opened += self.condition(w, condition, &mut scope)?;
        }
        match rule {
            Rule::Endpoint { endpoint, .. } => self.endpoint(w, endpoint, &scope)?,
            Rule::Error { message, .. } => {
                let message = self.string_arg(message, &scope)?;
                w.line(format!("return Err(ResolveEndpointError::message({}));", message));
            }
            Rule::Tree { rules, .. } => {
                for child in rules {
                    self.rule(w, child, scope.clone())?;
                }
                w.line(format!("return Err(ResolveEndpointError::message({}));", lit(NO_MATCH)));
            }
        }
        for _ in 0..opened {
            w.close("}");
        }
        w.close("}");
        Ok(())
    }

    fn endpoint(&self, w: &mut CodeWriter, endpoint: &EndpointValue, scope: &Scope) -> Result<()> {
        let url = self.string_arg(&endpoint.url, scope)?;
        w.line(format!("let url = {};", url));
        w.line("return Ok(Endpoint::builder()");
        w.line("    .url(url)");
        for (name, values) in &endpoint.headers {
            for value in values {
                let value = self.string_arg(value, scope)?;
                w.line(format!("    .header({}, {})", lit(name), value));
            }
        }
        for (name, value) in &endpoint.properties {
            w.line(format!("    .property({}, serde_json::json!({}))", lit(name), value));
        }
        w.line("    .build());");
        Ok(())
    }
}

/// Short rendering of an expression for error messages
fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Ref(name) => format!("`{}`", name),
        Expr::Call(call) => format!("{}(...)", call.function.name()),
        Expr::String(_) => "string template".to_string(),
        Expr::Bool(b) => b.to_string(),
        Expr::Int(i) => i.to_string(),
    }
}

fn emit_resolver(ctx: &CodegenContext, w: &mut CodeWriter, fields: &[ParamField]) -> Result<()> {
    let compiler = Compiler {
        service: &ctx.index.service,
    };
    let mut scope = Scope::default();

    w.line("/// Resolve the endpoint for `params`");
    w.line("#[allow(unreachable_code, unused_variables)]");
    w.open("pub fn resolve_endpoint(params: &Params) -> Result<Endpoint, ResolveEndpointError> {");
    for f in fields {
        let ident = local(&f.param.name);
        let ty = match (f.param.param_type, f.is_plain()) {
            (ParamType::String, true) => Ty::Str,
            (ParamType::String, false) => Ty::OptStr,
            (ParamType::Boolean, true) => Ty::Bool,
            (ParamType::Boolean, false) => Ty::OptBool,
        };
        if ty.is_copy() {
            w.line(format!("let {} = params.{};", ident, f.field));
        } else {
            w.line(format!("let {} = params.{}.clone();", ident, f.field));
        }
        scope.bind(&f.param.name, ident, ty);
    }
    for rule in &ctx.index.rule_set.rules {
        compiler.rule(w, rule, scope.clone())?;
    }
    w.line(format!("Err(ResolveEndpointError::message({}))", lit(NO_MATCH)));
    w.close("}");
    Ok(())
}

// =============================================================================
// Public API
// =============================================================================

/// `src/endpoint.rs`
pub fn emit(ctx: &CodegenContext) -> Result<GeneratedFile> {
    let fields = param_fields(&ctx.index.rule_set);
    let mut w = ctx.writer();
    w.raw(&ctx.render("endpoint_runtime.rs", &serde_json::json!({}))?);
    w.blank();
    emit_params(&mut w, &fields);
    w.blank();
    emit_resolver(ctx, &mut w, &fields)?;
    Ok(w.into_file("src/endpoint.rs"))
}

/// `tests/endpoint_tests.rs`, one test per `endpointTests` case
pub fn emit_tests(ctx: &CodegenContext) -> Result<Option<GeneratedFile>> {
    if ctx.index.endpoint_tests.is_empty() {
        return Ok(None);
    }
    let fields = param_fields(&ctx.index.rule_set);
    let mut names = NameAllocator::for_fields();
    let mut w = ctx.writer();
    w.line(format!("use {}::endpoint::{{resolve_endpoint, Params}};", ctx.crate_ident()));

    for (i, case) in ctx.index.endpoint_tests.iter().enumerate() {
        let base = match &case.documentation {
            Some(docs) if !docs.trim().is_empty() => naming::to_snake_case(docs),
            _ => format!("case_{}", i),
        };
        let (name, _) = names.allocate(&base);

        w.blank();
        w.doc(case.documentation.as_deref());
        w.line("#[test]");
        w.open(format!("fn {}() {{", naming::unescaped(&name)));
        w.line("let params = Params::builder()");
        for (param, value) in &case.params {
            let field = fields
                .iter()
                .find(|f| &f.param.name == param)
                .ok_or_else(|| CodegenError::validation(format!("endpoint test sets unknown parameter {}", param)))?;
            let rendered = match value {
                Value::String(s) => lit(s),
                Value::Bool(b) => b.to_string(),
                other => {
                    return Err(CodegenError::validation(format!(
                        "endpoint test value {} for {} is not a string or boolean",
                        other, param
                    )))
                }
            };
            w.line(format!("    .{}({})", field.field, rendered));
        }
        w.line("    .build();");
        match &case.expect {
            EndpointExpectation::Endpoint { url, headers } => {
                w.line("let endpoint = resolve_endpoint(&params.expect(\"valid parameters\")).expect(\"endpoint resolves\");");
                w.line(format!("assert_eq!(endpoint.url(), {});", lit(url)));
                for (header, values) in headers {
                    let expected: Vec<String> = values.iter().map(|v| format!("{}.to_string()", lit(v))).collect();
                    w.line(format!(
                        "assert_eq!(endpoint.headers().find(|(name, _)| name.as_str() == {}).map(|(_, values)| values.clone()), Some(vec![{}]));",
                        lit(header),
                        expected.join(", ")
                    ));
                }
            }
            EndpointExpectation::Error(message) => {
                // parameter validation failing is also an error outcome
                w.open("if let Ok(params) = params {");
                w.line("let error = resolve_endpoint(&params).expect_err(\"resolution fails\");");
                w.line(format!("assert_eq!(error.to_string(), {});", lit(message)));
                w.close("}");
            }
        }
        w.close("}");
    }
    Ok(Some(w.into_file("tests/endpoint_tests.rs")))
}
