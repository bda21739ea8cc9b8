//! Protocol selection

use serde::Serialize;
use std::fmt;

use crate::error::{CodegenError, Result};
use crate::model::{traits, Shape, ShapeId};

/// Wire protocols the emitter can serialize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Protocol {
    RestJson1,
    AwsJson1_0,
    AwsJson1_1,
}

/// Supported protocols in preference order
const PREFERENCE: &[(&str, Protocol)] = &[
    (traits::REST_JSON_1, Protocol::RestJson1),
    (traits::AWS_JSON_1_0, Protocol::AwsJson1_0),
    (traits::AWS_JSON_1_1, Protocol::AwsJson1_1),
];

/// Protocols that are recognized but have no serializer
const UNSUPPORTED: &[&str] = &[traits::REST_XML, traits::AWS_QUERY, traits::EC2_QUERY];

impl Protocol {
    pub fn trait_id(&self) -> &'static str {
        match self {
            Self::RestJson1 => traits::REST_JSON_1,
            Self::AwsJson1_0 => traits::AWS_JSON_1_0,
            Self::AwsJson1_1 => traits::AWS_JSON_1_1,
        }
    }

    /// HTTP bindings (`http`, `httpLabel`, ...) are honored
    pub fn is_rest(&self) -> bool {
        matches!(self, Self::RestJson1)
    }

    /// `Content-Type` of a JSON request body
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::RestJson1 => "application/json",
            Self::AwsJson1_0 => "application/x-amz-json-1.0",
            Self::AwsJson1_1 => "application/x-amz-json-1.1",
        }
    }

    /// `jsonName` only changes wire names under restJson1
    pub fn honors_json_name(&self) -> bool {
        self.is_rest()
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.trait_id())
    }
}

/// Pick the protocol for a service.
///
/// With an override, the service must carry that protocol trait. Otherwise
/// the first supported protocol in preference order wins.
pub fn resolve(service: &Shape, requested: Option<&ShapeId>) -> Result<Protocol> {
    if let Some(requested) = requested {
        let requested = requested.to_string();
        if !service.traits.has(&requested) {
            return Err(CodegenError::validation(format!(
                "service {} does not carry the requested protocol trait {}",
                service.id, requested
            )));
        }
        return match PREFERENCE.iter().find(|(id, _)| *id == requested) {
            Some((_, protocol)) => Ok(*protocol),
            None => Err(unsupported(service, &requested)),
        };
    }

    if let Some((_, protocol)) = PREFERENCE.iter().find(|(id, _)| service.traits.has(id)) {
        return Ok(*protocol);
    }
    match UNSUPPORTED.iter().find(|id| service.traits.has(id)) {
        Some(id) => Err(unsupported(service, id)),
        None => Err(CodegenError::unsupported(
            &service.id,
            "aws.protocols",
            "service has no protocol trait",
        )),
    }
}

fn unsupported(service: &Shape, trait_id: &str) -> CodegenError {
    CodegenError::unsupported(&service.id, trait_id, "no serializer exists for this protocol")
}
