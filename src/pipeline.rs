//! Generation pipeline
//!
//! ```text
//! model file ──load──▶ Model ──interpret──▶ ServiceIndex ──map──▶ SymbolTable
//!                                                                   │
//!                         output dir ◀──write/check── GeneratedCrate ◀──emit
//! ```
//!
//! A run is sequential. [`generate_all`] runs independent jobs side by side,
//! one per settings value, each loading its own model.

use std::path::Path;
use std::time::Instant;

use tracing::{info, info_span};

use crate::codegen::{self, Drift, GeneratedCrate};
use crate::config::CodegenSettings;
use crate::error::{CodegenError, Result};
use crate::model::{self, Model};
use crate::symbols::{self, SymbolTable};
use crate::traits::{self, ServiceIndex};

/// Output of every stage of one run
#[derive(Debug)]
pub struct Generation {
    pub model: Model,
    pub index: ServiceIndex,
    pub symbols: SymbolTable,
    pub output: GeneratedCrate,
}

/// Load the model named by `settings.model`
pub fn load_model(settings: &CodegenSettings) -> Result<Model> {
    let path = settings.model.as_deref().ok_or_else(|| {
        CodegenError::Config("no model path configured (set `model` or pass --model)".to_string())
    })?;
    let started = Instant::now();
    let model = model::load_from_path(path)?;
    info!(
        path = %path.display(),
        shapes = model.user_shape_count(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Loaded model"
    );
    Ok(model)
}

/// Interpret traits and map symbols without emitting anything
pub fn analyze(model: &Model, settings: &CodegenSettings) -> Result<(ServiceIndex, SymbolTable)> {
    let index = traits::interpret(model, settings)?;
    info!(
        service = %index.service,
        protocol = %index.protocol,
        operations = index.operations.len(),
        errors = index.errors.len(),
        "Interpreted service"
    );
    let symbols = symbols::build(model, &index, settings)?;
    info!(types = symbols.type_count(), "Mapped symbols");
    Ok((index, symbols))
}

/// Run every stage on an already loaded model
pub fn generate_model(model: Model, settings: &CodegenSettings) -> Result<Generation> {
    let (index, symbols) = analyze(&model, settings)?;
    let output = codegen::generate(&model, &index, &symbols, settings)?;
    Ok(Generation {
        model,
        index,
        symbols,
        output,
    })
}

/// Load the configured model and run every stage, writing nothing
pub fn generate(settings: &CodegenSettings) -> Result<Generation> {
    let _span = info_span!("generate", module = %settings.module.name).entered();
    generate_model(load_model(settings)?, settings)
}

/// Generate and write the crate to `settings.output.dir`
pub fn run(settings: &CodegenSettings) -> Result<Generation> {
    let generation = generate(settings)?;
    write(&generation.output, &settings.output.dir)?;
    Ok(generation)
}

pub fn write(output: &GeneratedCrate, dir: &Path) -> Result<()> {
    output.write_to(dir)?;
    info!(dir = %dir.display(), files = output.len(), "Wrote client crate");
    Ok(())
}

/// Generate and compare with `settings.output.dir` without writing
pub fn check(settings: &CodegenSettings) -> Result<Vec<Drift>> {
    let generation = generate(settings)?;
    let drift = generation.output.check_against(&settings.output.dir)?;
    info!(dir = %settings.output.dir.display(), drifted = drift.len(), "Checked client crate");
    Ok(drift)
}

/// Run independent jobs in parallel. Results come back in job order.
pub fn generate_all(jobs: &[CodegenSettings]) -> Vec<Result<Generation>> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = jobs
            .iter()
            .map(|settings| scope.spawn(move || generate(settings)))
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(CodegenError::validation("generation job panicked")))
            })
            .collect()
    })
}
