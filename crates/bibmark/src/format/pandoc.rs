//! CSL formatting through an external `pandoc --citeproc`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::model::Entry;
use crate::format::ReferenceFormatter;

static LEFT_MARGIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(?:\\.|[^\]\\])*\]\{\.csl-left-margin\}").expect("valid left margin regex")
});
static RIGHT_INLINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(.*)\]\{\.csl-right-inline\}").expect("valid right inline regex")
});

/// Renders entries with a CSL style by shelling out to pandoc.
#[derive(Debug, Clone)]
pub struct PandocFormatter {
    csl_file: PathBuf,
    program: PathBuf,
}

impl PandocFormatter {
    pub fn new(csl_file: impl Into<PathBuf>) -> Self {
        Self {
            csl_file: csl_file.into(),
            program: PathBuf::from("pandoc"),
        }
    }

    /// Use a specific pandoc executable.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn csl_file(&self) -> &Path {
        &self.csl_file
    }

    fn render_entry(&self, workdir: &Path, entry: &Entry) -> Result<String> {
        let bib_path = workdir.join("entry.bib");
        let input_path = workdir.join("input.md");
        fs::write(&bib_path, entry.to_bibtex())
            .with_context(|| format!("failed to write {}", bib_path.display()))?;
        fs::write(&input_path, citation_document(&entry.key))
            .with_context(|| format!("failed to write {}", input_path.display()))?;

        let output = Command::new(&self.program)
            .arg("--citeproc")
            .arg("--csl")
            .arg(&self.csl_file)
            .arg("--bibliography")
            .arg(&bib_path)
            .args(["--from", "markdown", "--to", "markdown-citations", "--wrap", "none"])
            .arg(&input_path)
            .output()
            .with_context(|| format!("failed to run {}", self.program.display()))?;

        if !output.status.success() {
            bail!(
                "pandoc failed for '{}': {}",
                entry.key,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let reference = parse_pandoc_reference(&stdout);
        if reference.is_empty() {
            tracing::warn!(key = %entry.key, "pandoc produced no reference text");
        }
        Ok(reference)
    }
}

impl ReferenceFormatter for PandocFormatter {
    fn format(&self, entries: &[&Entry]) -> Result<Vec<(String, String)>> {
        let workdir = tempfile::tempdir().context("failed to create pandoc work directory")?;
        entries
            .iter()
            .map(|entry| Ok((entry.key.clone(), self.render_entry(workdir.path(), entry)?)))
            .collect()
    }
}

/// Minimal document that makes citeproc emit a single reference.
pub fn citation_document(key: &str) -> String {
    format!("---\nlink-citations: false\nnocite: |\n  @{key}\n---\n")
}

/// Extract reference text from pandoc's Markdown output.
///
/// Div fences (`:::`) are dropped and numeric-style margin spans are unwrapped.
pub fn parse_pandoc_reference(output: &str) -> String {
    let body = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(":::"))
        .collect::<Vec<_>>()
        .join(" ");
    let body = LEFT_MARGIN.replace_all(&body, "");
    let body = RIGHT_INLINE.replace_all(&body, "$1");
    body.trim().to_string()
}
