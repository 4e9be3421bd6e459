//! Whole-site processing.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::app::scan::DocsScanner;
use crate::cite;
use crate::processor::Processor;

/// Summary of a build run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub pages: usize,
    pub citations: usize,
    pub references: usize,
    pub output_dir: PathBuf,
}

/// Runs every page of a docs tree through one [`Processor`].
///
/// Pages are processed in sorted path order, so the full bibliography on a
/// page lists references cited on that page and every page before it.
pub struct SiteBuilder {
    scanner: DocsScanner,
    output_dir: PathBuf,
}

impl SiteBuilder {
    pub fn new(scanner: DocsScanner, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            scanner,
            output_dir: output_dir.into(),
        }
    }

    pub fn build(&self, processor: &mut Processor) -> Result<BuildReport> {
        let pages = self.scanner.scan()?;
        let mut report = BuildReport {
            output_dir: self.output_dir.clone(),
            ..BuildReport::default()
        };

        for page in &pages {
            let source = fs::read_to_string(&page.path)
                .with_context(|| format!("failed to read page {}", page.path.display()))?;
            report.citations += cite::find_cite_blocks(&source)
                .iter()
                .map(|block| block.keys.len())
                .sum::<usize>();

            let rendered = processor
                .process_page(&source)
                .with_context(|| format!("failed to process page {}", page.display_path))?;

            let target = self.output_dir.join(&page.display_path);
            write_output(&target, &rendered)?;
            tracing::info!(page = %page.display_path, "wrote page");
            report.pages += 1;
        }

        report.references = processor.references().count();
        Ok(report)
    }
}

/// Write a rendered page, creating parent directories as needed.
pub fn write_output(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory: {}", parent.display()))?;
    }
    fs::write(path, contents)
        .with_context(|| format!("failed to write output to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bib::parser::parse_str;
    use crate::format::PlainStyle;
    use crate::infra::config::Bibtex;

    #[test]
    fn builds_tree_and_accumulates_references() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let docs = temp.path().join("docs");
        let out = temp.path().join("out");
        fs::create_dir_all(docs.join("part"))?;
        fs::write(docs.join("a.md"), "First [@one].\n\n\\bibliography\n")?;
        fs::write(docs.join("part/b.md"), "Second [@two].\n")?;
        fs::write(docs.join("part/c.md"), "All references:\n\n\\full_bibliography\n")?;

        let bibliography = parse_str("@misc{one, title={One}}\n@misc{two, title={Two}}")?;
        let mut processor = Processor::with_formatter(
            bibliography,
            Box::new(PlainStyle::new()),
            &Bibtex::default(),
        )?;

        let report = SiteBuilder::new(DocsScanner::new(&docs), &out).build(&mut processor)?;
        assert_eq!(report.pages, 3);
        assert_eq!(report.citations, 2);
        assert_eq!(report.references, 2);

        let first = fs::read_to_string(out.join("a.md"))?;
        assert_eq!(first, "First [^1].\n\n[^1]: One.\n");
        let second = fs::read_to_string(out.join("part/b.md"))?;
        assert_eq!(second, "Second [^1].\n");
        let all = fs::read_to_string(out.join("part/c.md"))?;
        assert_eq!(all, "All references:\n\n[^1]: One.\n[^2]: Two.\n");
        Ok(())
    }
}
