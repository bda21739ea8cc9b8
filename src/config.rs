//! Configuration for a generation run
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file: the one passed explicitly, otherwise codegen.toml in the
//!   working directory (or `.codegen.toml`, `config/codegen.toml`) and the
//!   user config directory
//! - Environment variables (SMITHY_CODEGEN__*)
//!
//! ## Example config file (codegen.toml):
//! ```toml
//! model = "model/weather.json"
//! service = "example.weather#Weather"
//!
//! [module]
//! name = "weather-client"
//! version = "0.1.0"
//! authors = ["Example <dev@example.com>"]
//!
//! [output]
//! dir = "out/weather"
//!
//! [codegen]
//! include_protocol_tests = true
//!
//! [naming]
//! acronyms = ["ID", "URL", "API"]
//! ```

use config_crate::{Config, Environment, File, FileFormat};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::error::{CodegenError, Result};
use crate::model::ShapeId;

/// Environment variable prefix (`SMITHY_CODEGEN__MODULE__NAME=...`)
pub const ENV_PREFIX: &str = "SMITHY_CODEGEN";

/// Default config file name
pub const CONFIG_FILE_NAME: &str = "codegen.toml";

/// Config files read, in order, when no explicit file is given
const DEFAULT_LOCATIONS: [&str; 3] = ["codegen.toml", ".codegen.toml", "config/codegen.toml"];

/// Settings for one generation run
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CodegenSettings {
    /// Smithy JSON AST file or directory
    #[serde(default)]
    pub model: Option<PathBuf>,

    /// Service shape to generate; optional when the model has one service
    #[serde(default)]
    pub service: Option<String>,

    /// Protocol trait id overriding the default preference order
    #[serde(default)]
    pub protocol: Option<String>,

    /// Package metadata of the generated crate
    #[serde(default)]
    pub module: ModuleSettings,

    /// Output location
    #[serde(default)]
    pub output: OutputSettings,

    /// Optional parts of the generated crate
    #[serde(default)]
    pub codegen: FeatureSettings,

    /// Naming conventions
    #[serde(default)]
    pub naming: NamingSettings,
}

/// Package metadata for the generated `Cargo.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleSettings {
    #[serde(default = "default_module_name")]
    pub name: String,

    #[serde(default = "default_module_version")]
    pub version: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub authors: Vec<String>,

    #[serde(default)]
    pub license: Option<String>,

    #[serde(default = "default_edition")]
    pub edition: String,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Directory the generated crate is written to
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

/// Feature switches for the generated crate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSettings {
    /// Emit `tests/protocol_tests.rs` from `smithy.test` traits
    #[serde(default = "default_true")]
    pub include_protocol_tests: bool,

    /// Emit `tests/endpoint_tests.rs` from `smithy.rules#endpointTests`
    #[serde(default = "default_true")]
    pub include_endpoint_tests: bool,

    #[serde(default = "default_true")]
    pub include_paginators: bool,

    #[serde(default = "default_true")]
    pub include_waiters: bool,

    /// Rename `FooException` error shapes to `FooError`
    #[serde(default = "default_true")]
    pub rename_exceptions: bool,
}

/// Naming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamingSettings {
    /// Acronyms kept upper-case inside PascalCase names (e.g., ID, URL, API)
    #[serde(default = "default_acronyms")]
    pub acronyms: BTreeSet<String>,

    /// Extra type names the generated crate must not use
    #[serde(default)]
    pub reserved_type_names: BTreeSet<String>,
}

// Default value functions
fn default_module_name() -> String {
    "smithy-client".to_string()
}

fn default_module_version() -> String {
    "0.1.0".to_string()
}

fn default_edition() -> String {
    "2021".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("out")
}

fn default_true() -> bool {
    true
}

fn default_acronyms() -> BTreeSet<String> {
    Default::default()
}

impl Default for ModuleSettings {
    fn default() -> Self {
        Self {
            name: default_module_name(),
            version: default_module_version(),
            description: None,
            authors: Vec::new(),
            license: None,
            edition: default_edition(),
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self {
            include_protocol_tests: true,
            include_endpoint_tests: true,
            include_paginators: true,
            include_waiters: true,
            rename_exceptions: true,
        }
    }
}

impl Default for NamingSettings {
    fn default() -> Self {
        Self {
            acronyms: default_acronyms(),
            reserved_type_names: BTreeSet::new(),
        }
    }
}

fn crate_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("crate name pattern is a valid regex"))
}

impl CodegenSettings {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration from an explicit file, or from the default
    /// locations when none is given, with environment variables over either.
    ///
    /// An explicit file replaces the working-directory and user config files
    /// entirely. Relative `model` and `output.dir` paths in it resolve against
    /// its own directory.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        match config_path {
            Some(path) => {
                if !path.is_file() {
                    return Err(CodegenError::Config(format!(
                        "config file {} does not exist",
                        path.display()
                    )));
                }
                builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
            }
            None => {
                for location in DEFAULT_LOCATIONS {
                    builder = builder.add_source(File::with_name(location).required(false));
                }
                if let Some(dirs) = directories::ProjectDirs::from("software", "smithy", "smithy-codegen") {
                    let xdg_config = dirs.config_dir().join(CONFIG_FILE_NAME);
                    if xdg_config.exists() {
                        builder = builder.add_source(File::from(xdg_config).required(false));
                    }
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let mut settings: Self = builder.build()?.try_deserialize()?;
        if let Some(base) = config_path.and_then(Path::parent) {
            settings.resolve_paths(base);
        }
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from TOML text alone (no files, no environment)
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings: Self = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Make relative paths absolute against `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        if let Some(model) = &self.model {
            if model.is_relative() {
                self.model = Some(base.join(model));
            }
        }
        if self.output.dir.is_relative() {
            self.output.dir = base.join(&self.output.dir);
        }
    }

    /// Check values the deserializer cannot
    pub fn validate(&self) -> Result<()> {
        if !crate_name_pattern().is_match(&self.module.name) {
            return Err(CodegenError::Config(format!(
                "module.name `{}` is not a valid crate name",
                self.module.name
            )));
        }
        semver::Version::parse(&self.module.version).map_err(|e| {
            CodegenError::Config(format!("module.version `{}`: {}", self.module.version, e))
        })?;
        if !["2015", "2018", "2021"].contains(&self.module.edition.as_str()) {
            return Err(CodegenError::Config(format!(
                "module.edition `{}` is not a Rust edition",
                self.module.edition
            )));
        }
        for (field, value) in [("service", &self.service), ("protocol", &self.protocol)] {
            if let Some(value) = value {
                ShapeId::parse(value).map_err(|_| {
                    CodegenError::Config(format!("{} `{}` is not an absolute shape id", field, value))
                })?;
            }
        }
        Ok(())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CodegenError::Config(format!("cannot serialize settings: {}", e)))?;
        std::fs::write(path, content).map_err(CodegenError::io(path))
    }

    /// Settings for a new project, as written by `init-config`
    pub fn starter(model: Option<PathBuf>, module_name: Option<String>) -> Self {
        let mut settings = Self {
            model,
            ..Self::default()
        };
        if let Some(name) = module_name {
            settings.module.name = name;
        }
        settings.naming.acronyms = ["API", "ID", "URL"].iter().map(|s| s.to_string()).collect();
        settings
    }

    /// Rust identifier of the generated crate (`weather-client` → `weather_client`)
    pub fn crate_ident(&self) -> String {
        self.module.name.replace('-', "_")
    }

    /// The configured service as a shape id
    pub fn service_id(&self) -> Result<Option<ShapeId>> {
        self.service
            .as_deref()
            .map(ShapeId::parse)
            .transpose()
    }

    /// The configured protocol override as a shape id
    pub fn protocol_id(&self) -> Result<Option<ShapeId>> {
        self.protocol
            .as_deref()
            .map(ShapeId::parse)
            .transpose()
    }
}
