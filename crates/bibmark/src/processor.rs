//! Page processing: citation resolution, footnote insertion, and bibliography expansion.
//!
//! A [`Processor`] owns the loaded bibliography and a registry of every
//! reference formatted so far. The registry survives across pages so the
//! full-bibliography command can list everything cited in earlier pages.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};

use crate::bib;
use crate::cite::{self, FootnoteFormat};
use crate::domain::errors::CiteError;
use crate::domain::model::{Bibliography, CiteBlock, Citation, Entry};
use crate::format::{PandocFormatter, PlainStyle, ReferenceFormatter, TemplateFormatter};
use crate::infra::config::Bibtex;

/// A citation key that is not present in the bibliography.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCitation {
    pub key: String,
    /// Byte offset of the enclosing block in the page.
    pub offset: usize,
}

pub struct Processor {
    bibliography: Bibliography,
    formatter: Box<dyn ReferenceFormatter>,
    footnotes: FootnoteFormat,
    bib_command: String,
    full_bib_command: String,
    bib_by_default: bool,
    strict: bool,
    references: Vec<(String, String)>,
    registered: HashMap<String, usize>,
}

impl Processor {
    /// Load the bibliography and pick a formatter from the settings.
    ///
    /// A CSL file selects pandoc, an entry template selects the template
    /// formatter, otherwise the built-in plain style is used.
    pub fn new(settings: &Bibtex) -> Result<Self> {
        settings.validate()?;
        let bibliography =
            bib::load_sources(settings.bib_file.as_deref(), settings.bib_dir.as_deref())
                .context("failed to load bibliography")?;

        let formatter: Box<dyn ReferenceFormatter> = match (&settings.csl_file, &settings.entry_template) {
            (Some(csl), _) => Box::new(PandocFormatter::new(csl)),
            (None, Some(template)) => Box::new(TemplateFormatter::from_path(template)?),
            (None, None) => Box::new(PlainStyle::new()),
        };
        Self::with_formatter(bibliography, formatter, settings)
    }

    /// Build a processor around an already loaded bibliography.
    pub fn with_formatter(
        bibliography: Bibliography,
        formatter: Box<dyn ReferenceFormatter>,
        settings: &Bibtex,
    ) -> Result<Self> {
        Ok(Self {
            bibliography,
            formatter,
            footnotes: FootnoteFormat::new(settings.footnote_format())?,
            bib_command: settings.bib_command().to_string(),
            full_bib_command: settings.full_bib_command().to_string(),
            bib_by_default: settings.bib_by_default(),
            strict: settings.strict(),
            references: Vec::new(),
            registered: HashMap::new(),
        })
    }

    pub fn bibliography(&self) -> &Bibliography {
        &self.bibliography
    }

    /// Formatted references in registration order.
    pub fn references(&self) -> impl Iterator<Item = (&str, &str)> {
        self.references
            .iter()
            .map(|(key, text)| (key.as_str(), text.as_str()))
    }

    /// Rewrite one page of Markdown.
    pub fn process_page(&mut self, markdown: &str) -> Result<String> {
        let blocks = cite::find_cite_blocks(markdown);
        let lists_everything = markdown.contains(&self.full_bib_command);
        let citations = self.register_citations(&blocks, lists_everything)?;

        let mut output = cite::insert_citation_keys(markdown, &blocks, &citations);

        // The full bibliography already defines every label used on this page.
        let bibliography = if lists_everything {
            String::new()
        } else {
            cite::format_bibliography(&citations)
        };
        if output.contains(&self.bib_command) {
            output = output.replace(&self.bib_command, &bibliography);
        } else if self.bib_by_default && !lists_everything && !citations.is_empty() {
            output.push_str("\n\n");
            output.push_str(&bibliography);
        }

        if output.contains(&self.full_bib_command) {
            output = output.replace(&self.full_bib_command, &self.full_bibliography());
        }

        tracing::debug!(
            blocks = blocks.len(),
            citations = citations.len(),
            registered = self.references.len(),
            "processed page"
        );
        Ok(output)
    }

    /// Format any newly cited entries and build the page's citations.
    ///
    /// Footnote numbers are local to the page: they start at 1 and follow the
    /// first appearance of each key.
    pub fn format_citations(&mut self, blocks: &[CiteBlock]) -> Result<Vec<Citation>> {
        self.register_citations(blocks, false)
    }

    /// Like [`Processor::format_citations`], but with `global` set each key is
    /// labelled by its position in [`Processor::full_bibliography`].
    fn register_citations(&mut self, blocks: &[CiteBlock], global: bool) -> Result<Vec<Citation>> {
        let mut pending: Vec<&Entry> = Vec::new();
        let mut pending_keys = HashSet::new();
        let mut warned = HashSet::new();

        for key in blocks.iter().flat_map(|block| block.keys.iter()) {
            match self.bibliography.get(key) {
                Some(entry) => {
                    let folded = entry.key.to_lowercase();
                    if !self.registered.contains_key(&folded) && pending_keys.insert(folded) {
                        pending.push(entry);
                    }
                }
                None if self.strict => return Err(CiteError::UnknownKey(key.clone()).into()),
                None => {
                    if warned.insert(key.to_lowercase()) {
                        tracing::warn!(key = %key, "citation key not found in bibliography");
                    }
                }
            }
        }

        if !pending.is_empty() {
            let formatted = self
                .formatter
                .format(&pending)
                .context("failed to format references")?;
            for (key, text) in formatted {
                self.registered
                    .insert(key.to_lowercase(), self.references.len());
                self.references.push((key, text));
            }
        }

        let mut numbers: HashMap<String, usize> = HashMap::new();
        let mut citations = Vec::new();
        for block in blocks {
            for key in &block.keys {
                let folded = key.to_lowercase();
                let Some(&index) = self.registered.get(&folded) else {
                    continue;
                };
                let number = if global {
                    index + 1
                } else {
                    let next = numbers.len() + 1;
                    *numbers.entry(folded).or_insert(next)
                };
                citations.push(Citation {
                    block: block.text.clone(),
                    key: key.clone(),
                    number: self.footnotes.label(number),
                    text: self.references[index].1.clone(),
                });
            }
        }
        Ok(citations)
    }

    /// Footnote definitions for every reference registered so far, numbered from 1.
    pub fn full_bibliography(&self) -> String {
        self.references
            .iter()
            .enumerate()
            .map(|(index, (_, text))| format!("[^{}]: {}", self.footnotes.label(index + 1), text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Citation keys in `markdown` that the bibliography does not define.
    pub fn unknown_citations(&self, markdown: &str) -> Vec<UnknownCitation> {
        cite::find_cite_blocks(markdown)
            .into_iter()
            .flat_map(|block| {
                let offset = block.span.start;
                block
                    .keys
                    .into_iter()
                    .map(move |key| UnknownCitation { key, offset })
            })
            .filter(|citation| !self.bibliography.contains(&citation.key))
            .collect()
    }
}
