//! Trait Interpreter
//!
//! Selects the service to generate and resolves the semantics of the traits
//! in its closure into a [`ServiceIndex`]:
//!
//! ```text
//! ServiceIndex
//! ├── protocol                 (restJson1 / awsJson1_0 / awsJson1_1)
//! ├── operations[]             (http bindings, paginator, waiters, context params)
//! ├── errors{}                 (fault, status, bindings)
//! ├── rule_set                 (endpoint rules, declared or synthesized)
//! └── protocol_tests[]         (one set per test trait instance)
//! ```
//!
//! The model itself is never modified.

pub mod aws;
pub mod endpoint;
pub mod http;
pub mod paginated;
pub mod protocol;
pub mod waiters;

pub use aws::{AwsService, SigV4};
pub use endpoint::{ClientContextParam, EndpointTestCase, ParamSource, RuleSet};
pub use http::{BindingRole, HttpLocation, HttpTrait, MemberBinding, PayloadKind, TimestampFormat};
pub use paginated::Paginator;
pub use protocol::Protocol;
pub use protocol_tests::{ProtocolTestSet, TestCases};
pub use waiters::Waiter;

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use crate::config::CodegenSettings;
use crate::error::{CodegenError, Result};
use crate::model::{traits, Model, Shape, ShapeId, ShapeType};

// =============================================================================
// Index Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorFault {
    Client,
    Server,
}

/// A structure with the `error` trait
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorInfo {
    pub id: ShapeId,
    pub fault: ErrorFault,
    pub http_status: u16,
    pub retryable: bool,
    pub bindings: Vec<MemberBinding>,
}

/// Resolved semantics of one operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationIndex {
    pub id: ShapeId,
    /// `None` when the operation takes `smithy.api#Unit`
    pub input: Option<ShapeId>,
    pub output: Option<ShapeId>,
    /// Operation errors followed by service errors, deduplicated
    pub errors: Vec<ShapeId>,
    /// Present under restJson1
    pub http: Option<HttpTrait>,
    pub input_bindings: Vec<MemberBinding>,
    pub output_bindings: Vec<MemberBinding>,
    pub paginator: Option<Paginator>,
    pub waiters: Vec<Waiter>,
    pub context_params: BTreeMap<String, ParamSource>,
    pub idempotency_token: Option<String>,
    pub documentation: Option<String>,
    pub deprecated: bool,
}

impl OperationIndex {
    /// Status code of a successful response
    pub fn success_code(&self) -> u16 {
        self.http.as_ref().map(|h| h.code).unwrap_or(200)
    }
}

/// The selected service with every trait interpreted
#[derive(Debug, Clone, Serialize)]
pub struct ServiceIndex {
    pub service: ShapeId,
    pub version: Option<String>,
    pub title: Option<String>,
    pub documentation: Option<String>,
    pub protocol: Protocol,
    pub aws: Option<AwsService>,
    pub sigv4: Option<SigV4>,
    /// Sorted by shape id
    pub operations: Vec<OperationIndex>,
    pub errors: BTreeMap<ShapeId, ErrorInfo>,
    /// Non-prelude shapes reachable from the service
    pub shapes: BTreeSet<ShapeId>,
    pub rename: BTreeMap<ShapeId, String>,
    pub rule_set: RuleSet,
    pub endpoint_tests: Vec<EndpointTestCase>,
    pub client_context_params: Vec<ClientContextParam>,
    pub protocol_tests: Vec<ProtocolTestSet>,
}

impl ServiceIndex {
    pub fn operation(&self, id: &ShapeId) -> Option<&OperationIndex> {
        self.operations.iter().find(|op| &op.id == id)
    }

    pub fn error(&self, id: &ShapeId) -> Result<&ErrorInfo> {
        self.errors
            .get(id)
            .ok_or_else(|| CodegenError::validation(format!("{} is not an error of {}", id, self.service)))
    }

    pub fn has_paginators(&self) -> bool {
        self.operations.iter().any(|op| op.paginator.is_some())
    }

    pub fn has_waiters(&self) -> bool {
        self.operations.iter().any(|op| !op.waiters.is_empty())
    }

    /// Name used in `X-Amz-Target` and error codes
    pub fn service_name(&self) -> &str {
        self.service.name()
    }
}

// =============================================================================
// Interpretation
// =============================================================================

/// Pick the service: the configured one, or the only one in the model
pub fn select_service<'m>(model: &'m Model, settings: &CodegenSettings) -> Result<&'m Shape> {
    if let Some(id) = settings.service_id()? {
        let shape = model.expect_shape(&id)?;
        if shape.shape_type != ShapeType::Service {
            return Err(CodegenError::validation(format!("{} is a {}, not a service", id, shape.shape_type)));
        }
        return Ok(shape);
    }

    let services: Vec<&Shape> = model.services().collect();
    match services.as_slice() {
        [] => Err(CodegenError::validation("the model defines no service")),
        [only] => Ok(only),
        several => Err(CodegenError::validation(format!(
            "the model defines {} services ({}); set `service` in the configuration",
            several.len(),
            several.iter().map(|s| s.id.to_string()).collect::<Vec<_>>().join(", ")
        ))),
    }
}

/// Resolve trait semantics for the selected service
pub fn interpret(model: &Model, settings: &CodegenSettings) -> Result<ServiceIndex> {
    let service = select_service(model, settings)?;
    let protocol = protocol::resolve(service, settings.protocol_id()?.as_ref())?;
    let closure = model.graph().closure(&service.id);
    info!(service = %service.id, protocol = %protocol, shapes = closure.len(), "Interpreting service");

    let aws = aws::service_metadata(service)?;
    let sigv4 = aws::sigv4(service)?;

    let rule_set = match service.traits.get(traits::ENDPOINT_RULE_SET) {
        Some(value) => endpoint::parse_rule_set(&service.id, value)?,
        None => endpoint::synthesize_rule_set(
            &service.id,
            aws.as_ref().and_then(|a| a.endpoint_prefix.as_deref()),
        )?,
    };
    let endpoint_tests = endpoint::parse_endpoint_tests(service, &rule_set)?;
    let client_context_params = endpoint::client_context_params(service, &rule_set)?;

    let mut operations = Vec::new();
    let mut error_ids = BTreeSet::new();
    for id in closure.iter() {
        let shape = model.expect_shape(id)?;
        if shape.shape_type != ShapeType::Operation {
            continue;
        }
        let operation = interpret_operation(model, service, shape, protocol, &rule_set)?;
        error_ids.extend(operation.errors.iter().cloned());
        operations.push(operation);
    }

    let mut errors = BTreeMap::new();
    for id in &error_ids {
        errors.insert(id.clone(), interpret_error(model, model.expect_shape(id)?, protocol)?);
    }

    let mut protocol_tests = Vec::new();
    for operation in &operations {
        protocol_tests.extend(protocol_tests::operation_tests(model.expect_shape(&operation.id)?, protocol)?);
    }
    for id in &error_ids {
        let error = model.expect_shape(id)?;
        if !error.traits.has(traits::HTTP_RESPONSE_TESTS) {
            continue;
        }
        match operations.iter().find(|op| op.errors.contains(id)) {
            Some(op) => protocol_tests.extend(protocol_tests::error_tests(error, &op.id, protocol)?),
            None => warn!(error = %id, "Error has response tests but no operation returns it"),
        }
    }

    let shapes: BTreeSet<ShapeId> = closure.into_iter().filter(|id| !id.is_prelude()).collect();
    for renamed in service.rename.keys() {
        if !shapes.contains(renamed) {
            return Err(CodegenError::validation(format!(
                "{} renames {}, which is not in the service closure",
                service.id, renamed
            )));
        }
    }

    info!(
        operations = operations.len(),
        errors = errors.len(),
        protocol_test_sets = protocol_tests.len(),
        "Interpreted service"
    );

    Ok(ServiceIndex {
        service: service.id.clone(),
        version: service.version.clone(),
        title: service.traits.string(traits::TITLE).map(str::to_string),
        documentation: service.documentation().map(str::to_string),
        protocol,
        aws,
        sigv4,
        operations,
        errors,
        shapes,
        rename: service.rename.clone(),
        rule_set,
        endpoint_tests,
        client_context_params,
        protocol_tests,
    })
}

/// `None` for a missing or `Unit` input/output
fn io_shape<'m>(model: &'m Model, id: Option<&ShapeId>) -> Result<Option<&'m Shape>> {
    match id {
        None => Ok(None),
        Some(id) => {
            let shape = model.expect_shape(id)?;
            if shape.is_unit() {
                return Ok(None);
            }
            if shape.shape_type != ShapeType::Structure {
                return Err(CodegenError::validation(format!(
                    "operation input/output {} must be a structure",
                    id
                )));
            }
            Ok(Some(shape))
        }
    }
}

fn interpret_operation(
    model: &Model,
    service: &Shape,
    operation: &Shape,
    protocol: Protocol,
    rule_set: &RuleSet,
) -> Result<OperationIndex> {
    let input = io_shape(model, operation.input.as_ref())?;
    let output = io_shape(model, operation.output.as_ref())?;

    let http = if protocol.is_rest() {
        let http = http::parse_http_trait(operation)?.ok_or_else(|| {
            CodegenError::validation(format!("{}: {} requires an http trait on every operation", operation.id, protocol))
        })?;
        Some(http)
    } else {
        None
    };

    let mut input_bindings = match input {
        Some(shape) => http::member_bindings(model, shape, BindingRole::Input, protocol)?,
        None => Vec::new(),
    };
    if let Some(http) = &http {
        http::validate_labels(&operation.id, http, &mut input_bindings)?;
    }
    let output_bindings = match output {
        Some(shape) => http::member_bindings(model, shape, BindingRole::Output, protocol)?,
        None => Vec::new(),
    };

    let mut errors: Vec<ShapeId> = operation.errors.clone();
    for error in &service.errors {
        if !errors.contains(error) {
            errors.push(error.clone());
        }
    }

    let idempotency_token = input.and_then(|shape| {
        shape
            .members
            .iter()
            .find(|m| m.traits.has(traits::IDEMPOTENCY_TOKEN))
            .map(|m| m.name.clone())
    });

    let index = OperationIndex {
        id: operation.id.clone(),
        input: input.map(|s| s.id.clone()),
        output: output.map(|s| s.id.clone()),
        errors,
        http,
        input_bindings,
        output_bindings,
        paginator: paginated::resolve(model, service, operation)?,
        waiters: waiters::resolve(operation)?,
        context_params: endpoint::operation_context_params(model, operation, input, rule_set)?,
        idempotency_token,
        documentation: operation.documentation().map(str::to_string),
        deprecated: operation.traits.has(traits::DEPRECATED),
    };
    debug!(
        operation = %index.id,
        paginated = index.paginator.is_some(),
        waiters = index.waiters.len(),
        "Interpreted operation"
    );
    Ok(index)
}

fn interpret_error(model: &Model, shape: &Shape, protocol: Protocol) -> Result<ErrorInfo> {
    let fault = match shape.traits.get(traits::ERROR).and_then(Value::as_str) {
        Some("client") => ErrorFault::Client,
        Some("server") => ErrorFault::Server,
        Some(other) => {
            return Err(CodegenError::validation(format!(
                "{}: error trait must be `client` or `server`, got `{}`",
                shape.id, other
            )))
        }
        None => {
            return Err(CodegenError::validation(format!(
                "{} is bound as an error but has no error trait",
                shape.id
            )))
        }
    };
    if shape.shape_type != ShapeType::Structure {
        return Err(CodegenError::validation(format!("error {} must be a structure", shape.id)));
    }

    let http_status = match shape.traits.get(traits::HTTP_ERROR) {
        Some(code) => code
            .as_u64()
            .filter(|c| (400..600).contains(c))
            .ok_or_else(|| CodegenError::validation(format!("{}: httpError {} is not 4xx/5xx", shape.id, code)))?
            as u16,
        None => match fault {
            ErrorFault::Client => 400,
            ErrorFault::Server => 500,
        },
    };

    Ok(ErrorInfo {
        id: shape.id.clone(),
        fault,
        http_status,
        retryable: shape.traits.has(traits::RETRYABLE),
        bindings: http::member_bindings(model, shape, BindingRole::Error, protocol)?,
    })
}
