//! Citation key validation across a docs tree.

use std::fs;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::app::scan::DocsScanner;
use crate::processor::Processor;

/// An unresolved citation and where it was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingKey {
    pub page: String,
    pub line: usize,
    pub key: String,
}

/// Collect every citation key used in the docs tree that the bibliography lacks.
pub fn check_docs(scanner: &DocsScanner, processor: &Processor) -> Result<Vec<MissingKey>> {
    let mut missing = Vec::new();
    for page in scanner.scan()? {
        let source = fs::read_to_string(&page.path)
            .with_context(|| format!("failed to read page {}", page.path.display()))?;
        for unknown in processor.unknown_citations(&source) {
            missing.push(MissingKey {
                page: page.display_path.clone(),
                line: line_of(&source, unknown.offset),
                key: unknown.key,
            });
        }
    }
    Ok(missing)
}

fn line_of(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())].matches('\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bib::parser::parse_str;
    use crate::format::PlainStyle;
    use crate::infra::config::Bibtex;

    #[test]
    fn reports_missing_keys_with_lines() -> Result<()> {
        let temp = tempfile::tempdir()?;
        fs::write(temp.path().join("a.md"), "ok [@known]\n\nbad [@gone]\n")?;
        fs::write(temp.path().join("b.md"), "```\n[@incode]\n```\n")?;

        let processor = Processor::with_formatter(
            parse_str("@misc{known, title={Known}}")?,
            Box::new(PlainStyle::new()),
            &Bibtex::default(),
        )?;
        let missing = check_docs(&DocsScanner::new(temp.path()), &processor)?;
        assert_eq!(
            missing,
            [MissingKey {
                page: "a.md".into(),
                line: 3,
                key: "gone".into(),
            }]
        );
        Ok(())
    }
}
