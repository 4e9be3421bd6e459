//! User-supplied minijinja templates for reference text.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use minijinja::Environment;
use serde::Serialize;

use crate::bib::latex::to_text;
use crate::domain::model::{Entry, Person};
use crate::format::ReferenceFormatter;

const TEMPLATE_NAME: &str = "entry";

/// Formats entries with a custom template.
///
/// Templates see `key`, `type`, `title`, `authors`, `editors`, `year` and a
/// `fields` map; all values are already converted from TeX to text.
pub struct TemplateFormatter {
    env: Environment<'static>,
}

impl TemplateFormatter {
    /// Compile a template from source.
    pub fn from_source(source: impl Into<String>) -> Result<Self> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_template_owned(TEMPLATE_NAME, source.into())
            .map_err(|err| anyhow!("invalid entry template: {err}"))?;
        Ok(Self { env })
    }

    /// Load a template file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)
            .with_context(|| format!("failed to load entry template from {}", path.display()))?;
        Self::from_source(source)
    }

    pub fn format_entry(&self, entry: &Entry) -> Result<String> {
        let template = self
            .env
            .get_template(TEMPLATE_NAME)
            .map_err(|err| anyhow!("entry template missing: {err}"))?;
        let rendered = template
            .render(EntryContext::from_entry(entry))
            .map_err(|err| anyhow!("failed to render entry '{}': {err}", entry.key))?;
        Ok(rendered.trim().replace('\n', " "))
    }
}

impl ReferenceFormatter for TemplateFormatter {
    fn format(&self, entries: &[&Entry]) -> Result<Vec<(String, String)>> {
        entries
            .iter()
            .map(|entry| Ok((entry.key.clone(), self.format_entry(entry)?)))
            .collect()
    }
}

#[derive(Serialize)]
struct EntryContext {
    key: String,
    #[serde(rename = "type")]
    kind: String,
    title: Option<String>,
    year: Option<String>,
    authors: Vec<String>,
    editors: Vec<String>,
    fields: BTreeMap<String, String>,
}

impl EntryContext {
    fn from_entry(entry: &Entry) -> Self {
        let people = |role: &str| -> Vec<String> {
            entry
                .persons(role)
                .iter()
                .map(|person: &Person| to_text(&person.full_name()))
                .collect()
        };
        Self {
            key: entry.key.clone(),
            kind: entry.kind.clone(),
            title: entry.field("title").map(to_text),
            year: entry.field("year").map(to_text),
            authors: people("author"),
            editors: people("editor"),
            fields: entry
                .fields
                .iter()
                .map(|(name, value)| (name.clone(), to_text(value)))
                .collect(),
        }
    }
}
