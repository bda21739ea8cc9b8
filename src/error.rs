//! Error types for the code generator
//!
//! Every stage of the pipeline reports through [`CodegenError`]. All variants
//! are fatal: a partially generated client is never written.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type for codegen operations
pub type Result<T> = std::result::Result<T, CodegenError>;

/// Code generator errors
#[derive(Error, Debug)]
pub enum CodegenError {
    /// The input is not a well-formed Smithy JSON AST document
    #[error("Parse error in {origin}: {message}")]
    Parse { origin: String, message: String },

    /// The model is well-formed but structurally inconsistent
    #[error("Validation error: {0}")]
    Validation(String),

    /// A trait (or trait combination) has no interpretation in this generator
    #[error("Unsupported trait {trait_id} on {shape}: {reason}")]
    UnsupportedTrait {
        shape: String,
        trait_id: String,
        reason: String,
    },

    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Template error: {0}")]
    Template(String),
}

impl CodegenError {
    pub fn parse(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            origin: origin.into(),
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unsupported(
        shape: impl ToString,
        trait_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::UnsupportedTrait {
            shape: shape.to_string(),
            trait_id: trait_id.into(),
            reason: reason.into(),
        }
    }

    /// Build a closure that wraps an `io::Error` with the path it happened at
    pub fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Short category name, used by the CLI and in reports
    pub fn category(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "parse",
            Self::Validation(_) => "validation",
            Self::UnsupportedTrait { .. } => "unsupported-trait",
            Self::Io { .. } => "io",
            Self::Config(_) => "config",
            Self::Template(_) => "template",
        }
    }
}

impl From<config_crate::ConfigError> for CodegenError {
    fn from(err: config_crate::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<handlebars::RenderError> for CodegenError {
    fn from(err: handlebars::RenderError) -> Self {
        Self::Template(err.to_string())
    }
}

impl From<handlebars::TemplateError> for CodegenError {
    fn from(err: handlebars::TemplateError) -> Self {
        Self::Template(err.to_string())
    }
}
