//! Smithy Client Generator CLI
//!
//! Usage:
//!   smithy-codegen generate --model model/weather.json --out out/weather
//!   smithy-codegen generate services/a.toml services/b.toml
//!   smithy-codegen check --config codegen.toml
//!   smithy-codegen symbols --format json
//!   smithy-codegen validate --model model/
//!   smithy-codegen init-config --model model/weather.json --name weather-client

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use smithy_codegen_client::config::CONFIG_FILE_NAME;
use smithy_codegen_client::symbols::Namespace;
use smithy_codegen_client::{pipeline, CodegenError, CodegenSettings, Drift};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "smithy-codegen")]
#[command(about = "Generate Rust clients from Smithy JSON AST models")]
#[command(version)]
struct Cli {
    /// Config file (default: codegen.toml in the working directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Model file or directory, overriding the config
    #[arg(short, long, global = true)]
    model: Option<PathBuf>,

    /// Service shape id, overriding the config
    #[arg(short, long, global = true)]
    service: Option<String>,

    /// Debug logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the client crate
    Generate {
        /// Output directory, overriding the config
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Settings files to generate side by side (each one is a job)
        jobs: Vec<PathBuf>,
    },

    /// Compare a previous output directory with a fresh generation
    Check {
        /// Output directory, overriding the config
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Print a unified diff for each changed file
        #[arg(long)]
        diff: bool,
    },

    /// Print the Rust name of every generated type
    Symbols {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Load the model and interpret its traits without emitting
    Validate,

    /// Write a starter config file
    InitConfig {
        /// Where to write it
        #[arg(default_value = CONFIG_FILE_NAME)]
        path: PathBuf,

        /// Crate name of the generated client
        #[arg(short, long)]
        name: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        match e.downcast_ref::<CodegenError>() {
            Some(codegen) => eprintln!("❌ Error [{}]: {:#}", codegen.category(), e),
            None => eprintln!("❌ Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

/// Settings from the config layers plus command line overrides
fn settings(cli: &Cli, config: Option<&Path>) -> anyhow::Result<CodegenSettings> {
    let mut settings = CodegenSettings::load_from(config)?;
    if let Some(model) = &cli.model {
        settings.model = Some(model.clone());
    }
    if let Some(service) = &cli.service {
        settings.service = Some(service.clone());
    }
    settings.validate()?;
    Ok(settings)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Generate { out, jobs } if !jobs.is_empty() => {
            if out.is_some() {
                bail!("--out cannot be combined with job files; set output.dir in each file");
            }
            let mut all = Vec::with_capacity(jobs.len());
            for job in jobs {
                all.push(settings(&cli, Some(job)).with_context(|| format!("loading {}", job.display()))?);
            }
            let mut failed = 0;
            for ((job, result), job_settings) in jobs.iter().zip(pipeline::generate_all(&all)).zip(&all) {
                match result.and_then(|generation| pipeline::write(&generation.output, &job_settings.output.dir)) {
                    Ok(()) => println!("✅ {} → {}", job.display(), job_settings.output.dir.display()),
                    Err(e) => {
                        failed += 1;
                        eprintln!("❌ {}: {}", job.display(), e);
                    }
                }
            }
            if failed > 0 {
                bail!("{} of {} jobs failed", failed, jobs.len());
            }
            Ok(())
        }

        Commands::Generate { out, .. } => {
            let mut settings = settings(&cli, cli.config.as_deref())?;
            if let Some(out) = out {
                settings.output.dir = out.clone();
            }
            let generation = pipeline::run(&settings)?;
            println!(
                "✅ Generated {} ({} files) for {} in {}",
                settings.module.name,
                generation.output.len(),
                generation.index.service,
                settings.output.dir.display()
            );
            Ok(())
        }

        Commands::Check { out, diff } => {
            let mut settings = settings(&cli, cli.config.as_deref())?;
            if let Some(out) = out {
                settings.output.dir = out.clone();
            }
            let drift = pipeline::check(&settings)?;
            if drift.is_empty() {
                println!("✅ {} is up to date", settings.output.dir.display());
                return Ok(());
            }
            for entry in &drift {
                match entry {
                    Drift::Missing(path) => println!("  missing  {}", path.display()),
                    Drift::Unexpected(path) => println!("  stale    {}", path.display()),
                    Drift::Changed { path, diff: text } => {
                        println!("  changed  {}", path.display());
                        if *diff {
                            println!("{}", text);
                        }
                    }
                }
            }
            bail!("{} generated files differ from {}", drift.len(), settings.output.dir.display())
        }

        Commands::Symbols { format } => {
            let settings = settings(&cli, cli.config.as_deref())?;
            let model = pipeline::load_model(&settings)?;
            let (_, symbols) = pipeline::analyze(&model, &settings)?;
            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&symbols)?),
                "text" => {
                    for namespace in Namespace::ALL {
                        let in_namespace = symbols.in_namespace(namespace);
                        if in_namespace.is_empty() {
                            continue;
                        }
                        println!("{}:", namespace);
                        for symbol in in_namespace {
                            let marker = if symbol.disambiguated { " (renamed)" } else { "" };
                            println!("  {:<40} {}{}", symbol.name, symbol.shape, marker);
                        }
                    }
                }
                other => bail!("unknown format `{}` (expected text or json)", other),
            }
            Ok(())
        }

        Commands::Validate => {
            let settings = settings(&cli, cli.config.as_deref())?;
            let model = pipeline::load_model(&settings)?;
            let (index, symbols) = pipeline::analyze(&model, &settings)?;
            let test_cases: usize = index.protocol_tests.iter().map(|set| set.cases.len()).sum();
            println!("✅ {} ({})", index.service, index.protocol);
            println!("   shapes:          {}", model.user_shape_count());
            println!("   operations:      {}", index.operations.len());
            println!("   errors:          {}", index.errors.len());
            println!("   generated types: {}", symbols.type_count());
            println!("   protocol tests:  {} sets, {} cases", index.protocol_tests.len(), test_cases);
            println!("   endpoint tests:  {}", index.endpoint_tests.len());
            Ok(())
        }

        Commands::InitConfig { path, name, force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            let settings = CodegenSettings::starter(cli.model.clone(), name.clone());
            settings.validate()?;
            settings.save(path)?;
            println!("📝 Wrote {}", path.display());
            Ok(())
        }
    }
}
