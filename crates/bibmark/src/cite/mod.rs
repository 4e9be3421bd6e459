//! Finding citation blocks in Markdown and substituting footnotes for them.

use std::collections::{HashMap, HashSet};
use std::ops::Range;

use once_cell::sync::Lazy;
use pulldown_cmark::{Event, Parser, Tag};
use regex::Regex;

use crate::domain::errors::CiteError;
use crate::domain::model::{CiteBlock, Citation};

static CITE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(?:@[\w:.+/-]+;?\s*)+\]").expect("valid citation regex"));

const NUMBER_PLACEHOLDER: &str = "{number}";

/// Find every citation block outside of code spans and code blocks.
pub fn find_cite_blocks(markdown: &str) -> Vec<CiteBlock> {
    let code = code_ranges(markdown);
    CITE_BLOCK
        .find_iter(markdown)
        .filter(|found| !code.iter().any(|range| overlaps(range, &found.range())))
        .map(|found| CiteBlock {
            text: found.as_str().to_string(),
            span: found.range(),
            keys: split_keys(found.as_str()),
        })
        .collect()
}

/// Individual keys of a block such as `[@a; @b]`.
pub fn split_keys(block: &str) -> Vec<String> {
    block
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(';')
        .map(|key| key.trim().trim_matches('@').to_string())
        .filter(|key| !key.is_empty())
        .collect()
}

/// Replace each block with the footnote references of its resolved keys.
///
/// Blocks whose keys were all left unresolved keep their original text.
pub fn insert_citation_keys(markdown: &str, blocks: &[CiteBlock], citations: &[Citation]) -> String {
    let labels: HashMap<String, &str> = citations
        .iter()
        .map(|citation| (citation.key.to_lowercase(), citation.number.as_str()))
        .collect();

    let mut output = markdown.to_string();
    let mut ordered: Vec<&CiteBlock> = blocks.iter().collect();
    ordered.sort_by_key(|block| std::cmp::Reverse(block.span.start));
    for block in ordered {
        let replacement: String = block
            .keys
            .iter()
            .filter_map(|key| labels.get(&key.to_lowercase()))
            .map(|label| format!("[^{label}]"))
            .collect();
        if replacement.is_empty() {
            continue;
        }
        output.replace_range(block.span.clone(), &replacement);
    }
    output
}

/// One `[^label]: text` line per distinct label, in citation order.
pub fn format_bibliography(citations: &[Citation]) -> String {
    let mut seen = HashSet::new();
    citations
        .iter()
        .filter(|citation| seen.insert(citation.number.as_str()))
        .map(|citation| format!("[^{}]: {}", citation.number, citation.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Footnote label format; must contain `{number}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FootnoteFormat(String);

impl FootnoteFormat {
    pub fn new(format: impl Into<String>) -> Result<Self, CiteError> {
        let format = format.into();
        if !format.contains(NUMBER_PLACEHOLDER) {
            return Err(CiteError::InvalidFootnoteFormat(format));
        }
        Ok(Self(format))
    }

    pub fn label(&self, number: usize) -> String {
        self.0.replace(NUMBER_PLACEHOLDER, &number.to_string())
    }
}

impl Default for FootnoteFormat {
    fn default() -> Self {
        Self(NUMBER_PLACEHOLDER.to_string())
    }
}

fn code_ranges(markdown: &str) -> Vec<Range<usize>> {
    Parser::new(markdown)
        .into_offset_iter()
        .filter_map(|(event, range)| match event {
            Event::Code(_) | Event::Start(Tag::CodeBlock(_)) => Some(range),
            _ => None,
        })
        .collect()
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn citation(block: &str, key: &str, number: &str, text: &str) -> Citation {
        Citation {
            block: block.into(),
            key: key.into(),
            number: number.into(),
            text: text.into(),
        }
    }

    #[test]
    fn finds_single_and_compound_blocks() {
        let md = "Book of Why [@PM18] and both [@PM18; @Hamilton] here.";
        let blocks = find_cite_blocks(md);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].text, "[@PM18]");
        assert_eq!(blocks[0].keys, ["PM18"]);
        assert_eq!(blocks[1].keys, ["PM18", "Hamilton"]);
        assert_eq!(&md[blocks[1].span.clone()], "[@PM18; @Hamilton]");
    }

    #[test]
    fn ignores_code_and_footnotes() {
        let md = "Use `[@inline]` or\n\n```\n[@fenced]\n```\n\nbut [@real] and [^1].\n\n    [@indented]\n";
        let blocks = find_cite_blocks(md);
        let keys: Vec<_> = blocks.iter().flat_map(|b| b.keys.clone()).collect();
        assert_eq!(keys, ["real"]);
    }

    #[test]
    fn keys_allow_punctuation() {
        assert_eq!(split_keys("[@doe:2020-a; @smith.b]"), ["doe:2020-a", "smith.b"]);
    }

    #[test]
    fn inserts_footnote_references() {
        let md = "A [@a] then [@a; @b] and [@zzz].";
        let blocks = find_cite_blocks(md);
        let citations = vec![
            citation("[@a]", "a", "1", "Alpha."),
            citation("[@a; @b]", "a", "1", "Alpha."),
            citation("[@a; @b]", "b", "2", "Beta."),
        ];
        assert_eq!(
            insert_citation_keys(md, &blocks, &citations),
            "A [^1] then [^1][^2] and [@zzz]."
        );
    }

    #[test]
    fn bibliography_lists_each_label_once() {
        let citations = vec![
            citation("[@a]", "a", "1", "Alpha."),
            citation("[@a; @b]", "a", "1", "Alpha."),
            citation("[@a; @b]", "b", "2", "Beta."),
        ];
        assert_eq!(format_bibliography(&citations), "[^1]: Alpha.\n[^2]: Beta.");
    }

    #[test]
    fn footnote_format_requires_placeholder() {
        assert_eq!(
            FootnoteFormat::new("ref"),
            Err(CiteError::InvalidFootnoteFormat("ref".into()))
        );
        let format = FootnoteFormat::new("cite-{number}").unwrap();
        assert_eq!(format.label(3), "cite-3");
        assert_eq!(FootnoteFormat::default().label(7), "7");
    }
}
