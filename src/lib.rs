//! Smithy Client Generator
//!
//! Generates an idiomatic Rust client crate from a Smithy model in its JSON
//! AST form.
//!
//! ## Features
//!
//! - **Model Loading**: JSON AST files or directories, merged and checked
//!   against the AST grammar before anything else runs
//! - **Trait Interpretation**: protocols, HTTP bindings, errors, pagination,
//!   waiters, endpoint rules, and protocol tests
//! - **Stable Naming**: collision-free Rust names, deterministic across runs
//! - **Emission**: model types with builders, serializers, a fluent client,
//!   an endpoint resolver, paginators, and waiters
//! - **Protocol Tests**: one generated test module per test trait instance
//!
//! ## Architecture
//!
//! ```text
//! model/     Model Loader        JSON AST → Model
//! traits/    Trait Interpreter   Model → ServiceIndex
//! symbols/   Symbol Mapper       Model + ServiceIndex → SymbolTable
//! codegen/   Code Emitter        → GeneratedCrate (+ tests/protocol_tests.rs)
//! pipeline   stage wiring, write and drift check
//! ```

pub mod codegen;
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod symbols;
pub mod traits;

pub use codegen::{Drift, GeneratedCrate, GeneratedFile};
pub use config::CodegenSettings;
pub use error::{CodegenError, Result};
pub use model::{Model, ShapeId};
pub use pipeline::Generation;
pub use symbols::SymbolTable;
pub use traits::ServiceIndex;
