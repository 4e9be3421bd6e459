//! Documentation tree scanning.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;

const PAGE_EXTENSIONS: [&str; 2] = ["md", "markdown"];

/// A Markdown page discovered under the docs directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub path: PathBuf,
    /// Path relative to the docs root, using `/` separators.
    pub display_path: String,
}

/// Walks a docs directory for Markdown pages, honouring ignore globs.
#[derive(Debug, Clone)]
pub struct DocsScanner {
    root: PathBuf,
    ignore: Vec<String>,
}

impl DocsScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ignore: Vec::new(),
        }
    }

    pub fn with_ignore(mut self, globs: impl IntoIterator<Item = String>) -> Self {
        self.ignore.extend(globs);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Pages sorted by relative path.
    pub fn scan(&self) -> Result<Vec<Page>> {
        if !self.root.is_dir() {
            anyhow::bail!("docs directory does not exist: {}", self.root.display());
        }
        let matcher = build_ignore_matcher(&self.ignore)?;

        let mut builder = WalkBuilder::new(&self.root);
        builder
            .standard_filters(false)
            .hidden(true)
            .follow_links(false);

        let mut pages = Vec::new();
        for result in builder.build() {
            let entry = match result {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(error = %err, "scanner error");
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_some_and(|kind| kind.is_file()) || !is_page(path) {
                continue;
            }
            let rel = path.strip_prefix(&self.root).unwrap_or(path);
            if matcher.is_match(rel) {
                tracing::debug!(path = %rel.display(), "ignored page");
                continue;
            }
            pages.push(Page {
                path: path.to_path_buf(),
                display_path: to_display_path(rel),
            });
        }
        pages.sort_by(|a, b| a.display_path.cmp(&b.display_path));
        Ok(pages)
    }
}

fn is_page(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| PAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

fn to_display_path(rel: &Path) -> String {
    rel.components()
        .map(|part| part.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn build_ignore_matcher(globs: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for glob in globs {
        let trimmed = glob.trim();
        if trimmed.is_empty() {
            continue;
        }
        builder.add(Glob::new(trimmed).with_context(|| format!("invalid ignore glob '{trimmed}'"))?);
    }
    builder.build().context("failed to build ignore matcher")
}
