//! BibTeX loading: parsing, name handling, and TeX-to-text conversion.

pub mod latex;
pub mod names;
pub mod parser;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::domain::errors::CiteError;
use crate::domain::model::Bibliography;

/// Load the bibliography from a single file, or every `*.bib` directly inside a directory.
///
/// `bib_file` takes precedence over `bib_dir`. Files are parsed in parallel and
/// merged in sorted path order so later files win on duplicate keys.
pub fn load_sources(bib_file: Option<&Path>, bib_dir: Option<&Path>) -> Result<Bibliography> {
    let files = match (bib_file, bib_dir) {
        (Some(file), _) => vec![file.to_path_buf()],
        (None, Some(dir)) => bib_files_in(dir)?,
        (None, None) => return Err(CiteError::NoSource.into()),
    };

    let parsed: Vec<Bibliography> = files
        .par_iter()
        .map(|path| parser::parse_file(path))
        .collect::<Result<_>>()?;

    let mut bibliography = Bibliography::new();
    for (path, part) in files.iter().zip(parsed) {
        for entry in part.iter() {
            if bibliography.contains(&entry.key) {
                tracing::warn!(key = %entry.key, path = %path.display(), "entry overrides an earlier definition");
            }
        }
        bibliography.extend(part);
    }
    tracing::info!(files = files.len(), entries = bibliography.len(), "loaded bibliography");
    Ok(bibliography)
}

/// `*.bib` files directly inside `dir`, sorted by path.
pub fn bib_files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let listing = fs::read_dir(dir)
        .with_context(|| format!("failed to read bibtex directory: {}", dir.display()))?;
    for item in listing {
        let path = item?.path();
        let is_bib = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("bib"));
        if is_bib && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
