//! Endpoint Rules
//!
//! Compiles `smithy.rules#endpointRuleSet` into a typed rule tree and parses
//! `smithy.rules#endpointTests`. Services without a rule set get a synthesized
//! one: an explicit endpoint wins, otherwise `aws.api#service.endpointPrefix`
//! gives `https://{prefix}.{Region}.amazonaws.com`.
//!
//! Supported functions: `isSet`, `not`, `booleanEquals`, `stringEquals`,
//! `getAttr`, `substring`, `isValidHostLabel`, `uriEncode`, `parseURL`,
//! `aws.partition`.

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{CodegenError, Result};
use crate::model::{traits, Model, Shape, ShapeId, ShapeType};

// =============================================================================
// Rule Set Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParamType {
    String,
    Boolean,
}

/// A rule set parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub param_type: ParamType,
    /// `AWS::Region`, `SDK::Endpoint`, ...
    pub built_in: Option<String>,
    pub required: bool,
    pub default: Option<Value>,
    pub documentation: Option<String>,
    pub deprecated: bool,
}

impl Parameter {
    /// Value is always present once defaults are applied
    pub fn is_always_set(&self) -> bool {
        self.default.is_some()
    }
}

/// Built-in rules-engine functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Function {
    IsSet,
    Not,
    BooleanEquals,
    StringEquals,
    GetAttr,
    Substring,
    IsValidHostLabel,
    UriEncode,
    ParseUrl,
    AwsPartition,
}

impl Function {
    fn parse(name: &str) -> Option<Self> {
        let function = match name {
            "isSet" => Self::IsSet,
            "not" => Self::Not,
            "booleanEquals" => Self::BooleanEquals,
            "stringEquals" => Self::StringEquals,
            "getAttr" => Self::GetAttr,
            "substring" => Self::Substring,
            "isValidHostLabel" => Self::IsValidHostLabel,
            "uriEncode" => Self::UriEncode,
            "parseURL" => Self::ParseUrl,
            "aws.partition" => Self::AwsPartition,
            _ => return None,
        };
        Some(function)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::IsSet => "isSet",
            Self::Not => "not",
            Self::BooleanEquals => "booleanEquals",
            Self::StringEquals => "stringEquals",
            Self::GetAttr => "getAttr",
            Self::Substring => "substring",
            Self::IsValidHostLabel => "isValidHostLabel",
            Self::UriEncode => "uriEncode",
            Self::ParseUrl => "parseURL",
            Self::AwsPartition => "aws.partition",
        }
    }

    fn arity(&self) -> usize {
        match self {
            Self::IsSet | Self::Not | Self::UriEncode | Self::ParseUrl | Self::AwsPartition => 1,
            Self::BooleanEquals | Self::StringEquals | Self::GetAttr | Self::IsValidHostLabel => 2,
            Self::Substring => 4,
        }
    }
}

/// Step of a `getAttr` path or a `{name#path}` template reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AttrStep {
    Field(String),
    Index(usize),
}

pub fn parse_attr_path(path: &str) -> std::result::Result<Vec<AttrStep>, String> {
    let mut steps = Vec::new();
    for part in path.split('.') {
        let (field, index) = match part.split_once('[') {
            Some((field, rest)) => {
                let index = rest
                    .strip_suffix(']')
                    .and_then(|i| i.parse::<usize>().ok())
                    .ok_or_else(|| format!("invalid index in attribute path `{}`", path))?;
                (field, Some(index))
            }
            None => (part, None),
        };
        if !field.is_empty() {
            steps.push(AttrStep::Field(field.to_string()));
        }
        if let Some(index) = index {
            steps.push(AttrStep::Index(index));
        }
    }
    if steps.is_empty() {
        return Err(format!("empty attribute path `{}`", path));
    }
    Ok(steps)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TemplatePart {
    Literal(String),
    Ref(String),
    Attr(String, Vec<AttrStep>),
}

/// A string literal with `{name}` / `{name#path}` interpolation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Template {
    pub parts: Vec<TemplatePart>,
}

impl Template {
    pub fn parse(source: &str) -> std::result::Result<Self, String> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) => name.push(c),
                            None => return Err(format!("unterminated template in `{}`", source)),
                        }
                    }
                    if !literal.is_empty() {
                        parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
                    }
                    match name.split_once('#') {
                        Some((name, path)) => parts.push(TemplatePart::Attr(name.to_string(), parse_attr_path(path)?)),
                        None => parts.push(TemplatePart::Ref(name.clone())),
                    }
                }
                '}' => return Err(format!("unbalanced `}}` in `{}`", source)),
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            parts.push(TemplatePart::Literal(literal));
        }
        Ok(Self { parts })
    }

    fn refs(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|p| match p {
            TemplatePart::Ref(name) | TemplatePart::Attr(name, _) => Some(name.as_str()),
            TemplatePart::Literal(_) => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionCall {
    pub function: Function,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Expr {
    String(Template),
    Bool(bool),
    Int(i64),
    Ref(String),
    Call(Box<FunctionCall>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Condition {
    pub call: FunctionCall,
    pub assign: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointValue {
    pub url: Expr,
    pub headers: BTreeMap<String, Vec<Expr>>,
    /// Carried through verbatim (`authSchemes`, ...)
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Rule {
    Endpoint {
        conditions: Vec<Condition>,
        endpoint: EndpointValue,
    },
    Error {
        conditions: Vec<Condition>,
        message: Expr,
    },
    Tree {
        conditions: Vec<Condition>,
        rules: Vec<Rule>,
    },
}

impl Rule {
    pub fn conditions(&self) -> &[Condition] {
        match self {
            Self::Endpoint { conditions, .. } | Self::Error { conditions, .. } | Self::Tree { conditions, .. } => {
                conditions
            }
        }
    }
}

/// A compiled endpoint rule set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleSet {
    pub version: String,
    /// Parameters in declaration order
    pub parameters: Vec<Parameter>,
    pub rules: Vec<Rule>,
    /// Built by the generator rather than read from the model
    pub synthesized: bool,
}

impl RuleSet {
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

// =============================================================================
// Rule Set Parsing
// =============================================================================

struct Parser<'a> {
    service: &'a ShapeId,
}

impl<'a> Parser<'a> {
    fn invalid(&self, message: impl std::fmt::Display) -> CodegenError {
        CodegenError::validation(format!("{}: endpoint rule set: {}", self.service, message))
    }

    fn rule_set(&self, value: &Value) -> Result<RuleSet> {
        let version = value
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or("1.0")
            .to_string();

        let mut parameters = Vec::new();
        if let Some(params) = value.get("parameters").and_then(Value::as_object) {
            for (name, param) in params {
                parameters.push(self.parameter(name, param)?);
            }
        }

        let rules = self.rules(value.get("rules"))?;
        let rule_set = RuleSet {
            version,
            parameters,
            rules,
            synthesized: false,
        };
        self.check_scopes(&rule_set)?;
        Ok(rule_set)
    }

    fn parameter(&self, name: &str, value: &Value) -> Result<Parameter> {
        let param_type = match value.get("type").and_then(Value::as_str).map(str::to_ascii_lowercase).as_deref() {
            Some("string") => ParamType::String,
            Some("boolean") => ParamType::Boolean,
            other => {
                return Err(CodegenError::unsupported(
                    self.service,
                    traits::ENDPOINT_RULE_SET,
                    format!("parameter {} has unsupported type {:?}", name, other),
                ))
            }
        };
        let default = value.get("default").cloned();
        match (&default, param_type) {
            (Some(Value::String(_)), ParamType::String) | (Some(Value::Bool(_)), ParamType::Boolean) | (None, _) => {}
            _ => return Err(self.invalid(format!("default of parameter {} does not match its type", name))),
        }
        Ok(Parameter {
            name: name.to_string(),
            param_type,
            built_in: value.get("builtIn").and_then(Value::as_str).map(str::to_string),
            required: value.get("required").and_then(Value::as_bool).unwrap_or(false),
            default,
            documentation: value.get("documentation").and_then(Value::as_str).map(str::to_string),
            deprecated: value.get("deprecated").is_some(),
        })
    }

    fn rules(&self, value: Option<&Value>) -> Result<Vec<Rule>> {
        let Some(raw) = value.and_then(Value::as_array) else {
            return Err(self.invalid("`rules` must be an array"));
        };
        raw.iter().map(|r| self.rule(r)).collect()
    }

    fn rule(&self, value: &Value) -> Result<Rule> {
        let conditions = match value.get("conditions").and_then(Value::as_array) {
            Some(conditions) => conditions.iter().map(|c| self.condition(c)).collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        match value.get("type").and_then(Value::as_str) {
            Some("endpoint") => {
                let endpoint = value.get("endpoint").ok_or_else(|| self.invalid("endpoint rule without `endpoint`"))?;
                Ok(Rule::Endpoint {
                    conditions,
                    endpoint: self.endpoint(endpoint)?,
                })
            }
            Some("error") => {
                let message = value.get("error").ok_or_else(|| self.invalid("error rule without `error`"))?;
                Ok(Rule::Error {
                    conditions,
                    message: self.expr(message)?,
                })
            }
            Some("tree") => Ok(Rule::Tree {
                conditions,
                rules: self.rules(value.get("rules"))?,
            }),
            other => Err(self.invalid(format!("unknown rule type {:?}", other))),
        }
    }

    fn endpoint(&self, value: &Value) -> Result<EndpointValue> {
        let url = value.get("url").ok_or_else(|| self.invalid("endpoint without `url`"))?;
        let mut headers = BTreeMap::new();
        if let Some(raw) = value.get("headers").and_then(Value::as_object) {
            for (name, values) in raw {
                let values = values
                    .as_array()
                    .ok_or_else(|| self.invalid(format!("header {} must be a list", name)))?;
                headers.insert(name.clone(), values.iter().map(|v| self.expr(v)).collect::<Result<Vec<_>>>()?);
            }
        }
        Ok(EndpointValue {
            url: self.expr(url)?,
            headers,
            properties: value
                .get("properties")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        })
    }

    fn condition(&self, value: &Value) -> Result<Condition> {
        let Expr::Call(call) = self.expr(value)? else {
            return Err(self.invalid("conditions must be function calls"));
        };
        Ok(Condition {
            call: *call,
            assign: value.get("assign").and_then(Value::as_str).map(str::to_string),
        })
    }

    fn expr(&self, value: &Value) -> Result<Expr> {
        match value {
            Value::String(s) => Ok(Expr::String(Template::parse(s).map_err(|e| self.invalid(e))?)),
            Value::Bool(b) => Ok(Expr::Bool(*b)),
            Value::Number(n) => n.as_i64().map(Expr::Int).ok_or_else(|| self.invalid("numbers must be integers")),
            Value::Object(object) => {
                if let Some(name) = object.get("ref").and_then(Value::as_str) {
                    return Ok(Expr::Ref(name.to_string()));
                }
                let Some(name) = object.get("fn").and_then(Value::as_str) else {
                    return Err(self.invalid(format!("expected a reference or function call, got {}", value)));
                };
                let function = Function::parse(name).ok_or_else(|| {
                    CodegenError::unsupported(
                        self.service,
                        traits::ENDPOINT_RULE_SET,
                        format!("function `{}` is not supported", name),
                    )
                })?;
                let argv = object.get("argv").and_then(Value::as_array).cloned().unwrap_or_default();
                if argv.len() != function.arity() {
                    return Err(self.invalid(format!(
                        "{} takes {} arguments, got {}",
                        function.name(),
                        function.arity(),
                        argv.len()
                    )));
                }
                let args = argv.iter().map(|a| self.expr(a)).collect::<Result<Vec<_>>>()?;
                if function == Function::GetAttr {
                    match &args[1] {
                        Expr::String(t) if matches!(t.parts.as_slice(), [TemplatePart::Literal(_)] ) => {}
                        _ => return Err(self.invalid("getAttr path must be a string literal")),
                    }
                }
                Ok(Expr::Call(Box::new(FunctionCall { function, args })))
            }
            other => Err(self.invalid(format!("unexpected value {}", other))),
        }
    }

    // =========================================================================
    // Scope Checking
    // =========================================================================

    fn check_scopes(&self, rule_set: &RuleSet) -> Result<()> {
        let scope: BTreeSet<String> = rule_set.parameters.iter().map(|p| p.name.clone()).collect();
        for rule in &rule_set.rules {
            self.check_rule(rule, scope.clone())?;
        }
        Ok(())
    }

    fn check_rule(&self, rule: &Rule, mut scope: BTreeSet<String>) -> Result<()> {
        for condition in rule.conditions() {
            for arg in &condition.call.args {
                self.check_expr(arg, &scope)?;
            }
            if let Some(name) = &condition.assign {
                if !scope.insert(name.clone()) {
                    return Err(self.invalid(format!("`{}` is assigned twice in one scope", name)));
                }
            }
        }
        match rule {
            Rule::Endpoint { endpoint, .. } => {
                self.check_expr(&endpoint.url, &scope)?;
                for values in endpoint.headers.values() {
                    for value in values {
                        self.check_expr(value, &scope)?;
                    }
                }
                Ok(())
            }
            Rule::Error { message, .. } => self.check_expr(message, &scope),
            Rule::Tree { rules, .. } => {
                for child in rules {
                    self.check_rule(child, scope.clone())?;
                }
                Ok(())
            }
        }
    }

    fn check_expr(&self, expr: &Expr, scope: &BTreeSet<String>) -> Result<()> {
        let check = |name: &str| {
            if scope.contains(name) {
                Ok(())
            } else {
                Err(self.invalid(format!("reference to unbound name `{}`", name)))
            }
        };
        match expr {
            Expr::Ref(name) => check(name.as_str()),
            Expr::String(template) => template.refs().try_for_each(check),
            Expr::Call(call) => call.args.iter().try_for_each(|a| self.check_expr(a, scope)),
            Expr::Bool(_) | Expr::Int(_) => Ok(()),
        }
    }
}

/// Parse and scope-check an `endpointRuleSet` trait value
pub fn parse_rule_set(service: &ShapeId, value: &Value) -> Result<RuleSet> {
    Parser { service }.rule_set(value)
}

/// Rule set used when the model has none
pub fn synthesize_rule_set(service: &ShapeId, endpoint_prefix: Option<&str>) -> Result<RuleSet> {
    let mut rules = vec![json!({
        "conditions": [ { "fn": "isSet", "argv": [ { "ref": "Endpoint" } ] } ],
        "type": "endpoint",
        "endpoint": { "url": { "ref": "Endpoint" } }
    })];
    let mut parameters = json!({
        "Endpoint": { "type": "String", "builtIn": "SDK::Endpoint", "required": false,
                      "documentation": "Override the endpoint used to send this request" }
    });
    match endpoint_prefix {
        Some(prefix) => {
            parameters["Region"] = json!({ "type": "String", "builtIn": "AWS::Region", "required": false,
                                           "documentation": "The AWS region used to dispatch the request." });
            rules.push(json!({
                "conditions": [ { "fn": "isSet", "argv": [ { "ref": "Region" } ] } ],
                "type": "endpoint",
                "endpoint": { "url": format!("https://{}.{{Region}}.amazonaws.com", prefix) }
            }));
            rules.push(json!({ "conditions": [], "type": "error",
                               "error": "Invalid Configuration: Missing Region" }));
        }
        None => rules.push(json!({ "conditions": [], "type": "error",
                                   "error": "Invalid Configuration: an endpoint URL must be configured" })),
    }

    let mut rule_set = parse_rule_set(service, &json!({ "version": "1.0", "parameters": parameters, "rules": rules }))?;
    rule_set.synthesized = true;
    Ok(rule_set)
}

// =============================================================================
// Context Parameters
// =============================================================================

/// Where an operation takes a rule set parameter value from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ParamSource {
    /// `contextParam` on an input member
    InputMember(String),
    /// `staticContextParams` on the operation
    Static(Value),
}

/// A `clientContextParams` entry, exposed as a client config setting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientContextParam {
    pub name: String,
    pub param_type: ParamType,
    pub documentation: Option<String>,
}

pub fn client_context_params(service: &Shape, rule_set: &RuleSet) -> Result<Vec<ClientContextParam>> {
    let Some(declared) = service.traits.get(traits::CLIENT_CONTEXT_PARAMS).and_then(Value::as_object) else {
        return Ok(Vec::new());
    };
    let mut params = Vec::with_capacity(declared.len());
    for (name, definition) in declared {
        let param = rule_set.parameter(name).ok_or_else(|| {
            CodegenError::validation(format!(
                "{}: client context param {} is not a rule set parameter",
                service.id, name
            ))
        })?;
        params.push(ClientContextParam {
            name: name.clone(),
            param_type: param.param_type,
            documentation: definition.get("documentation").and_then(Value::as_str).map(str::to_string),
        });
    }
    Ok(params)
}

/// Rule set parameters an operation binds, keyed by parameter name
pub fn operation_context_params(
    model: &Model,
    operation: &Shape,
    input: Option<&Shape>,
    rule_set: &RuleSet,
) -> Result<BTreeMap<String, ParamSource>> {
    let mut bound = BTreeMap::new();
    let unknown = |name: &str| {
        CodegenError::validation(format!(
            "{}: context parameter {} is not a rule set parameter",
            operation.id, name
        ))
    };

    if let Some(statics) = operation.traits.get(traits::STATIC_CONTEXT_PARAMS).and_then(Value::as_object) {
        for (name, definition) in statics {
            rule_set.parameter(name).ok_or_else(|| unknown(name.as_str()))?;
            let value = definition.get("value").cloned().unwrap_or(Value::Null);
            bound.insert(name.clone(), ParamSource::Static(value));
        }
    }

    if let Some(input) = input {
        for member in &input.members {
            let Some(name) = member
                .traits
                .get(traits::CONTEXT_PARAM)
                .and_then(|v| v.get("name"))
                .and_then(Value::as_str)
            else {
                continue;
            };
            let param = rule_set.parameter(name).ok_or_else(|| unknown(name))?;
            let target = model.target(member)?;
            let compatible = match param.param_type {
                ParamType::String => target.shape_type == ShapeType::String,
                ParamType::Boolean => target.shape_type == ShapeType::Boolean,
            };
            if !compatible {
                return Err(CodegenError::validation(format!(
                    "{}${}: contextParam {} needs a {:?} member",
                    input.id, member.name, name, param.param_type
                )));
            }
            bound.insert(name.to_string(), ParamSource::InputMember(member.name.clone()));
        }
    }
    Ok(bound)
}

// =============================================================================
// Endpoint Tests
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum EndpointExpectation {
    Endpoint {
        url: String,
        headers: BTreeMap<String, Vec<String>>,
    },
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointTestCase {
    pub documentation: Option<String>,
    pub params: BTreeMap<String, Value>,
    pub expect: EndpointExpectation,
}

pub fn parse_endpoint_tests(service: &Shape, rule_set: &RuleSet) -> Result<Vec<EndpointTestCase>> {
    let Some(value) = service.traits.get(traits::ENDPOINT_TESTS) else {
        return Ok(Vec::new());
    };
    let invalid = |message: String| CodegenError::validation(format!("{}: endpointTests: {}", service.id, message));
    let cases = value
        .get("testCases")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("`testCases` must be an array".to_string()))?;

    let mut parsed = Vec::with_capacity(cases.len());
    for (i, case) in cases.iter().enumerate() {
        let mut params = BTreeMap::new();
        if let Some(raw) = case.get("params").and_then(Value::as_object) {
            for (name, value) in raw {
                if rule_set.parameter(name).is_none() {
                    return Err(invalid(format!("case {} sets unknown parameter {}", i, name)));
                }
                params.insert(name.clone(), value.clone());
            }
        }

        let expect = case.get("expect").ok_or_else(|| invalid(format!("case {} has no `expect`", i)))?;
        let expect = if let Some(message) = expect.get("error").and_then(Value::as_str) {
            EndpointExpectation::Error(message.to_string())
        } else {
            let endpoint = expect
                .get("endpoint")
                .ok_or_else(|| invalid(format!("case {} expects neither endpoint nor error", i)))?;
            let url = endpoint
                .get("url")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid(format!("case {} endpoint has no url", i)))?;
            let mut headers = BTreeMap::new();
            if let Some(raw) = endpoint.get("headers").and_then(Value::as_object) {
                for (name, values) in raw {
                    let values = values
                        .as_array()
                        .map(|vs| vs.iter().filter_map(Value::as_str).map(str::to_string).collect())
                        .unwrap_or_default();
                    headers.insert(name.clone(), values);
                }
            }
            EndpointExpectation::Endpoint {
                url: url.to_string(),
                headers,
            }
        };

        parsed.push(EndpointTestCase {
            documentation: case.get("documentation").and_then(Value::as_str).map(str::to_string),
            params,
            expect,
        });
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_id() -> ShapeId {
        ShapeId::parse("example#Service").unwrap()
    }

    #[test]
    fn test_template_parsing() {
        let t = Template::parse("https://{Region}.{PartitionResult#dnsSuffix}/{{x}}").unwrap();
        assert_eq!(
            t.parts,
            vec![
                TemplatePart::Literal("https://".to_string()),
                TemplatePart::Ref("Region".to_string()),
                TemplatePart::Literal(".".to_string()),
                TemplatePart::Attr("PartitionResult".to_string(), vec![AttrStep::Field("dnsSuffix".to_string())]),
                TemplatePart::Literal("/{x}".to_string()),
            ]
        );
        assert!(Template::parse("https://{Region").is_err());
    }

    #[test]
    fn test_attr_path_with_index() {
        assert_eq!(
            parse_attr_path("resourceId[1]").unwrap(),
            vec![AttrStep::Field("resourceId".to_string()), AttrStep::Index(1)]
        );
    }

    #[test]
    fn test_rule_set_with_assignments() {
        let rule_set = parse_rule_set(
            &service_id(),
            &json!({
                "version": "1.0",
                "parameters": { "Region": { "type": "String", "builtIn": "AWS::Region" } },
                "rules": [
                    {
                        "type": "tree",
                        "conditions": [
                            { "fn": "isSet", "argv": [ { "ref": "Region" } ] },
                            { "fn": "aws.partition", "argv": [ { "ref": "Region" } ], "assign": "PartitionResult" }
                        ],
                        "rules": [
                            { "type": "endpoint", "conditions": [],
                              "endpoint": { "url": "https://svc.{Region}.{PartitionResult#dnsSuffix}" } }
                        ]
                    },
                    { "type": "error", "conditions": [], "error": "Missing Region" }
                ]
            }),
        )
        .unwrap();
        assert_eq!(rule_set.parameters.len(), 1);
        assert_eq!(rule_set.rules.len(), 2);
    }

    #[test]
    fn test_unbound_reference_is_validation_error() {
        let err = parse_rule_set(
            &service_id(),
            &json!({
                "version": "1.0",
                "parameters": {},
                "rules": [ { "type": "endpoint", "conditions": [], "endpoint": { "url": "https://{Missing}" } } ]
            }),
        )
        .unwrap_err();
        assert_eq!(err.category(), "validation");
        assert!(err.to_string().contains("Missing"));
    }

    #[test]
    fn test_unknown_function_is_unsupported() {
        let err = parse_rule_set(
            &service_id(),
            &json!({
                "version": "1.0",
                "parameters": { "Bucket": { "type": "String" } },
                "rules": [ { "type": "error",
                             "conditions": [ { "fn": "aws.parseArn", "argv": [ { "ref": "Bucket" } ] } ],
                             "error": "arn" } ]
            }),
        )
        .unwrap_err();
        assert_eq!(err.category(), "unsupported-trait");
    }

    #[test]
    fn test_synthesized_rule_set_from_prefix() {
        let rule_set = synthesize_rule_set(&service_id(), Some("weather")).unwrap();
        assert!(rule_set.synthesized);
        assert!(rule_set.parameter("Region").is_some());
        match &rule_set.rules[1] {
            Rule::Endpoint { endpoint, .. } => assert_eq!(
                endpoint.url,
                Expr::String(Template::parse("https://weather.{Region}.amazonaws.com").unwrap())
            ),
            other => panic!("unexpected rule {:?}", other),
        }
    }
}
