//! Embedded Templates
//!
//! Static parts of the generated crate (manifest, README, runtime support
//! code) are Handlebars templates compiled into the binary with
//! `include_dir!`. Each `templates/<name>.hbs` is registered as `<name>`.

use handlebars::{no_escape, Handlebars};
use include_dir::{include_dir, Dir};
use serde::Serialize;
use tracing::debug;

use crate::error::{CodegenError, Result};

static TEMPLATES: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/templates");

/// Registry of the embedded templates
pub struct Templates {
    registry: Handlebars<'static>,
}

impl Templates {
    pub fn load() -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        // generated sources are not HTML
        registry.register_escape_fn(no_escape);

        for file in TEMPLATES.files() {
            let path = file.path();
            if path.extension().map(|e| e != "hbs").unwrap_or(true) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let source = file
                .contents_utf8()
                .ok_or_else(|| CodegenError::Template(format!("{} is not UTF-8", path.display())))?;
            registry.register_template_string(name, source)?;
            debug!(template = name, "Registered template");
        }
        Ok(Self { registry })
    }

    pub fn render(&self, name: &str, data: &impl Serialize) -> Result<String> {
        if !self.registry.has_template(name) {
            return Err(CodegenError::Template(format!("no template named `{}`", name)));
        }
        Ok(self.registry.render(name, data)?)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.registry.get_templates().keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_all_templates_register() {
        let templates = Templates::load().unwrap();
        for name in ["Cargo.toml", "README.md", "primitives.rs", "client_runtime.rs", "endpoint_runtime.rs"] {
            assert!(templates.names().contains(&name), "missing template {}", name);
        }
    }

    #[test]
    fn test_strict_mode_reports_missing_fields() {
        let templates = Templates::load().unwrap();
        let err = templates.render("Cargo.toml", &json!({})).unwrap_err();
        assert_eq!(err.category(), "template");
    }

    #[test]
    fn test_unknown_template() {
        let templates = Templates::load().unwrap();
        assert!(templates.render("nope", &json!({})).is_err());
    }
}
