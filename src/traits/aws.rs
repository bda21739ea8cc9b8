//! AWS service metadata (`aws.api#service`, `aws.auth#sigv4`)

use serde::Serialize;
use serde_json::Value;

use crate::error::{CodegenError, Result};
use crate::model::{traits, Shape};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AwsService {
    pub sdk_id: String,
    /// Falls back to `arnNamespace` when not declared
    pub endpoint_prefix: Option<String>,
    pub arn_namespace: Option<String>,
    pub cloud_formation_name: Option<String>,
    pub cloud_trail_event_source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SigV4 {
    /// Signing name
    pub name: String,
}

pub fn service_metadata(service: &Shape) -> Result<Option<AwsService>> {
    let Some(value) = service.traits.get(traits::AWS_SERVICE) else {
        return Ok(None);
    };
    let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);

    let sdk_id = text("sdkId").ok_or_else(|| {
        CodegenError::validation(format!("{}: aws.api#service requires `sdkId`", service.id))
    })?;
    let arn_namespace = text("arnNamespace");
    Ok(Some(AwsService {
        sdk_id,
        endpoint_prefix: text("endpointPrefix").or_else(|| arn_namespace.clone()),
        arn_namespace,
        cloud_formation_name: text("cloudFormationName"),
        cloud_trail_event_source: text("cloudTrailEventSource"),
    }))
}

pub fn sigv4(service: &Shape) -> Result<Option<SigV4>> {
    let Some(value) = service.traits.get(traits::SIGV4) else {
        return Ok(None);
    };
    let name = value
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| CodegenError::validation(format!("{}: aws.auth#sigv4 requires `name`", service.id)))?;
    Ok(Some(SigV4 { name: name.to_string() }))
}
