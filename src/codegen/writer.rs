//! Generated Output
//!
//! [`CodeWriter`] accumulates indented lines for one file; [`GeneratedCrate`]
//! holds every file of a run, ordered by path, and knows how to write them
//! or diff them against an existing directory.

use serde::Serialize;
use similar::TextDiff;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{CodegenError, Result};

const INDENT: &str = "    ";

// =============================================================================
// Code Writer
// =============================================================================

/// Line-oriented writer with block indentation
#[derive(Debug, Default)]
pub struct CodeWriter {
    lines: Vec<String>,
    depth: usize,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one line at the current indentation. Embedded newlines start
    /// new lines at the same indentation.
    pub fn line(&mut self, text: impl AsRef<str>) -> &mut Self {
        for part in text.as_ref().split('\n') {
            if part.is_empty() {
                self.lines.push(String::new());
            } else {
                self.lines.push(format!("{}{}", INDENT.repeat(self.depth), part));
            }
        }
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        if self.lines.last().map(|l| !l.is_empty()).unwrap_or(false) {
            self.lines.push(String::new());
        }
        self
    }

    /// Write `header` and indent until the matching [`close`](Self::close)
    pub fn open(&mut self, header: impl AsRef<str>) -> &mut Self {
        self.line(header);
        self.depth += 1;
        self
    }

    pub fn close(&mut self, footer: impl AsRef<str>) -> &mut Self {
        self.depth = self.depth.saturating_sub(1);
        self.line(footer)
    }

    /// `///` doc comment, one line per source line
    pub fn doc(&mut self, text: Option<&str>) -> &mut Self {
        if let Some(text) = text {
            for line in doc_lines(text) {
                if line.is_empty() {
                    self.line("///");
                } else {
                    self.line(format!("/// {}", line));
                }
            }
        }
        self
    }

    /// `//!` module documentation
    pub fn inner_doc(&mut self, text: Option<&str>) -> &mut Self {
        if let Some(text) = text {
            for line in doc_lines(text) {
                if line.is_empty() {
                    self.line("//!");
                } else {
                    self.line(format!("//! {}", line));
                }
            }
        }
        self
    }

    /// Append pre-rendered text (a template) verbatim, line by line
    pub fn raw(&mut self, text: &str) -> &mut Self {
        for line in text.lines() {
            self.lines.push(line.to_string());
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn into_file(self, path: impl Into<PathBuf>) -> GeneratedFile {
        GeneratedFile::new(path, self.lines)
    }
}

/// Strip HTML tags from Smithy documentation and split it into lines.
///
/// Code fences are kept verbatim but re-tagged as `text`, since rustdoc
/// compiles untagged fences as doctests.
fn doc_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut in_tag = false;
    let mut in_fence = false;
    for raw in text.lines() {
        if let Some(info) = raw.trim_start().strip_prefix("```") {
            if in_fence {
                lines.push("```".to_string());
            } else {
                if !info.trim().is_empty() {
                    debug!(info = info.trim(), "Re-tagging documentation code fence as text");
                }
                lines.push("```text".to_string());
            }
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            lines.push(raw.trim_end().to_string());
            continue;
        }
        let mut plain = String::with_capacity(raw.len());
        for c in raw.chars() {
            match c {
                '<' => in_tag = true,
                '>' if in_tag => in_tag = false,
                c if !in_tag => plain.push(c),
                _ => {}
            }
        }
        lines.push(plain.trim_end().to_string());
    }
    if in_fence {
        lines.push("```".to_string());
    }
    let start = lines.iter().position(|l| !l.trim().is_empty()).unwrap_or(lines.len());
    let end = lines.iter().rposition(|l| !l.trim().is_empty()).map(|i| i + 1).unwrap_or(start);
    lines[start..end].to_vec()
}

// =============================================================================
// Generated Files
// =============================================================================

/// One output file: a path relative to the crate root plus its lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub lines: Vec<String>,
}

impl GeneratedFile {
    pub fn new(path: impl Into<PathBuf>, lines: Vec<String>) -> Self {
        Self {
            path: path.into(),
            lines,
        }
    }

    pub fn from_text(path: impl Into<PathBuf>, text: &str) -> Self {
        Self::new(path, text.lines().map(str::to_string).collect())
    }

    /// Path relative to the crate root
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `\n` line endings, trailing newline, no trailing blank lines
    pub fn render(&self) -> String {
        let mut end = self.lines.len();
        while end > 0 && self.lines[end - 1].trim().is_empty() {
            end -= 1;
        }
        let mut text = self.lines[..end].join("\n");
        text.push('\n');
        text
    }
}

/// How an existing file differs from the generated one
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Drift {
    Missing(PathBuf),
    Changed { path: PathBuf, diff: String },
    /// A Rust source under `src/` or `tests/` the model no longer produces
    Unexpected(PathBuf),
}

impl Drift {
    pub fn path(&self) -> &Path {
        match self {
            Self::Missing(path) | Self::Changed { path, .. } | Self::Unexpected(path) => path,
        }
    }
}

/// Directories whose Rust sources belong to the generator
const OWNED_DIRS: &[&str] = &["src", "tests"];

/// Every file of a generated client, sorted by path
#[derive(Debug, Clone, Default, Serialize)]
pub struct GeneratedCrate {
    files: BTreeMap<PathBuf, GeneratedFile>,
}

impl GeneratedCrate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file. Two files at the same path are a generator bug and
    /// reported as a validation error.
    pub fn add(&mut self, file: GeneratedFile) -> Result<()> {
        if self.files.contains_key(&file.path) {
            return Err(CodegenError::validation(format!(
                "{} was generated twice",
                file.path.display()
            )));
        }
        debug!(path = %file.path.display(), lines = file.lines.len(), "Generated file");
        self.files.insert(file.path.clone(), file);
        Ok(())
    }

    pub fn file(&self, path: impl AsRef<Path>) -> Option<&GeneratedFile> {
        self.files.get(path.as_ref())
    }

    pub fn files(&self) -> impl Iterator<Item = &GeneratedFile> {
        self.files.values()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Write every file under `dir`, creating directories as needed
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        for file in self.files.values() {
            let target = dir.join(&file.path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(CodegenError::io(parent))?;
            }
            fs::write(&target, file.render()).map_err(CodegenError::io(&target))?;
        }
        info!(dir = %dir.display(), files = self.files.len(), "Wrote generated crate");
        Ok(())
    }

    /// Compare against a previously written crate without touching it
    pub fn check_against(&self, dir: &Path) -> Result<Vec<Drift>> {
        let mut drift = Vec::new();
        for file in self.files.values() {
            let target = dir.join(&file.path);
            if !target.exists() {
                drift.push(Drift::Missing(file.path.clone()));
                continue;
            }
            let existing = fs::read_to_string(&target).map_err(CodegenError::io(&target))?;
            let expected = file.render();
            if existing != expected {
                let diff = TextDiff::from_lines(&existing, &expected)
                    .unified_diff()
                    .header(
                        &format!("a/{}", file.path.display()),
                        &format!("b/{}", file.path.display()),
                    )
                    .to_string();
                drift.push(Drift::Changed {
                    path: file.path.clone(),
                    diff,
                });
            }
        }
        drift.extend(self.unexpected_files(dir)?.into_iter().map(Drift::Unexpected));
        Ok(drift)
    }

    /// `.rs` files under the generator's directories that this crate does
    /// not contain, relative to `dir` and sorted
    fn unexpected_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut extra = Vec::new();
        for owned in OWNED_DIRS {
            let root = dir.join(owned);
            if !root.is_dir() {
                continue;
            }
            for entry in WalkDir::new(&root).sort_by_file_name() {
                let entry = entry.map_err(|e| {
                    let path = e.path().unwrap_or(&root).to_path_buf();
                    match e.into_io_error() {
                        Some(source) => CodegenError::Io { path, source },
                        None => CodegenError::validation(format!("cannot walk {}", path.display())),
                    }
                })?;
                let path = entry.path();
                if !entry.file_type().is_file() || path.extension().map_or(true, |ext| ext != "rs") {
                    continue;
                }
                let relative = path.strip_prefix(dir).unwrap_or(path).to_path_buf();
                if !self.files.contains_key(&relative) {
                    debug!(path = %relative.display(), "Unexpected file in output");
                    extra.push(relative);
                }
            }
        }
        Ok(extra)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_indents_blocks() {
        let mut w = CodeWriter::new();
        w.open("pub struct A {");
        w.line("pub b: i32,");
        w.close("}");
        let file = w.into_file("src/a.rs");
        assert_eq!(file.render(), "pub struct A {\n    pub b: i32,\n}\n");
    }

    #[test]
    fn test_doc_strips_html() {
        let mut w = CodeWriter::new();
        w.doc(Some("<p>Gets a city.</p>\n\n<p>Second.</p>\n"));
        let file = w.into_file("x.rs");
        assert_eq!(file.lines, vec!["/// Gets a city.", "///", "/// Second."]);
    }

    #[test]
    fn test_doc_code_fences_become_text() {
        let mut w = CodeWriter::new();
        w.doc(Some("<p>Run:</p>\n```\naws svc op --flag <value>\n```\n```json\n{\"a\": 1}\n```"));
        let file = w.into_file("x.rs");
        assert_eq!(
            file.lines,
            vec![
                "/// Run:",
                "/// ```text",
                "/// aws svc op --flag <value>",
                "/// ```",
                "/// ```text",
                "/// {\"a\": 1}",
                "/// ```",
            ]
        );
    }

    #[test]
    fn test_unclosed_doc_fence_is_closed() {
        let mut w = CodeWriter::new();
        w.inner_doc(Some("```\nexample"));
        let file = w.into_file("x.rs");
        assert_eq!(file.lines, vec!["//! ```text", "//! example", "//! ```"]);
    }

    #[test]
    fn test_file_path_accessor() {
        let file = GeneratedFile::from_text("src/model.rs", "pub struct A;");
        assert_eq!(file.path(), Path::new("src/model.rs"));
    }

    #[test]
    fn test_check_reports_unexpected_sources() {
        let dir = tempfile::tempdir().unwrap();
        let mut krate = GeneratedCrate::new();
        krate.add(GeneratedFile::from_text("src/lib.rs", "pub mod model;")).unwrap();
        krate.write_to(dir.path()).unwrap();

        fs::create_dir_all(dir.path().join("tests")).unwrap();
        fs::write(dir.path().join("tests/protocol_tests.rs"), "// stale\n").unwrap();
        fs::write(dir.path().join("Cargo.lock"), "# not generated\n").unwrap();
        fs::create_dir_all(dir.path().join("target/debug")).unwrap();
        fs::write(dir.path().join("target/debug/build.rs"), "\n").unwrap();

        let drift = krate.check_against(dir.path()).unwrap();
        assert_eq!(drift, vec![Drift::Unexpected(PathBuf::from("tests/protocol_tests.rs"))]);
    }

    #[test]
    fn test_duplicate_paths_are_rejected() {
        let mut krate = GeneratedCrate::new();
        krate.add(GeneratedFile::from_text("src/lib.rs", "")).unwrap();
        assert!(krate.add(GeneratedFile::from_text("src/lib.rs", "")).is_err());
    }

    #[test]
    fn test_write_then_check_reports_no_drift() {
        let dir = tempfile::tempdir().unwrap();
        let mut krate = GeneratedCrate::new();
        krate.add(GeneratedFile::from_text("src/lib.rs", "pub mod model;")).unwrap();
        krate.write_to(dir.path()).unwrap();
        assert!(krate.check_against(dir.path()).unwrap().is_empty());

        fs::write(dir.path().join("src/lib.rs"), "changed\n").unwrap();
        let drift = krate.check_against(dir.path()).unwrap();
        assert_eq!(drift.len(), 1);
        match &drift[0] {
            Drift::Changed { diff, .. } => assert!(diff.contains("+pub mod model;")),
            other => panic!("unexpected drift {:?}", other),
        }
    }
}
