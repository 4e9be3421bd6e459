//! Domain models for bibliography entries, citation blocks, and rendered citations.

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

use serde::Serialize;

/// A single name parsed from a BibTeX `author` or `editor` field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Person {
    pub first: Vec<String>,
    pub middle: Vec<String>,
    pub prelast: Vec<String>,
    pub last: Vec<String>,
    pub lineage: Vec<String>,
}

impl Person {
    /// Render as `First Middle von Last, Jr`.
    pub fn full_name(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        parts.extend(self.first.iter().map(String::as_str));
        parts.extend(self.middle.iter().map(String::as_str));
        parts.extend(self.prelast.iter().map(String::as_str));
        parts.extend(self.last.iter().map(String::as_str));
        let mut name = parts.join(" ");
        if !self.lineage.is_empty() {
            name.push_str(", ");
            name.push_str(&self.lineage.join(" "));
        }
        name
    }

    /// Surname including any `von` particle.
    pub fn surname(&self) -> String {
        self.prelast
            .iter()
            .chain(self.last.iter())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A bibliography entry such as `@article{key, ...}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    /// Lowercased entry type (`article`, `book`, ...).
    pub kind: String,
    /// Lowercased field names mapped to their raw (macro-expanded) values.
    pub fields: BTreeMap<String, String>,
    /// Parsed person lists keyed by role (`author`, `editor`).
    pub persons: BTreeMap<String, Vec<Person>>,
}

impl Entry {
    pub fn new(key: impl Into<String>, kind: impl Into<String>) -> Self {
        let kind: String = kind.into();
        Self {
            key: key.into(),
            kind: kind.to_ascii_lowercase(),
            fields: BTreeMap::new(),
            persons: BTreeMap::new(),
        }
    }

    /// Raw value of a field, looked up case-insensitively.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    pub fn persons(&self, role: &str) -> &[Person] {
        self.persons.get(role).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Serialize the entry back into BibTeX source.
    pub fn to_bibtex(&self) -> String {
        let mut out = format!("@{}{{{}", self.kind, self.key);
        for (name, value) in &self.fields {
            out.push_str(&format!(",\n    {name} = {{{value}}}"));
        }
        out.push_str("\n}\n");
        out
    }
}

/// Ordered collection of entries with case-insensitive key lookup.
#[derive(Debug, Clone, Default)]
pub struct Bibliography {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl Bibliography {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert an entry, replacing any existing entry with the same key in place.
    ///
    /// Returns the replaced entry, if any.
    pub fn insert(&mut self, entry: Entry) -> Option<Entry> {
        let folded = fold_key(&entry.key);
        match self.index.get(&folded) {
            Some(&position) => Some(std::mem::replace(&mut self.entries[position], entry)),
            None => {
                self.index.insert(folded, self.entries.len());
                self.entries.push(entry);
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.index
            .get(&fold_key(key))
            .and_then(|&position| self.entries.get(position))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(&fold_key(key))
    }

    /// Entries in source order.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    /// Merge another bibliography; its entries win on key collisions.
    pub fn extend(&mut self, other: Bibliography) {
        for entry in other.entries {
            self.insert(entry);
        }
    }
}

fn fold_key(key: &str) -> String {
    key.to_lowercase()
}

/// A bracketed citation such as `[@PM18; @Hamilton]` found in a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiteBlock {
    /// Full matched text including brackets.
    pub text: String,
    /// Byte range of the block within the page.
    pub span: Range<usize>,
    /// Individual keys, without `@` and in order of appearance.
    pub keys: Vec<String>,
}

/// One key of a citation block resolved to a footnote label and reference text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    pub block: String,
    pub key: String,
    pub number: String,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str) -> Entry {
        Entry::new(key, "misc")
    }

    #[test]
    fn lookup_ignores_key_case() {
        let mut bib = Bibliography::new();
        bib.insert(entry("PM18"));
        assert!(bib.contains("pm18"));
        assert_eq!(bib.get("Pm18").map(|e| e.key.as_str()), Some("PM18"));
    }

    #[test]
    fn extend_replaces_in_place() {
        let mut first = Bibliography::new();
        first.insert(entry("a"));
        first.insert(entry("b"));

        let mut second = Bibliography::new();
        let mut replacement = Entry::new("A", "book");
        replacement.fields.insert("title".into(), "New".into());
        second.insert(replacement);
        second.insert(entry("c"));

        first.extend(second);
        let keys: Vec<_> = first.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, ["A", "b", "c"]);
        assert_eq!(first.get("a").map(|e| e.kind.as_str()), Some("book"));
    }

    #[test]
    fn full_name_includes_particles_and_lineage() {
        let person = Person {
            first: vec!["Ludwig".into()],
            prelast: vec!["van".into()],
            last: vec!["Beethoven".into()],
            lineage: vec!["Jr".into()],
            ..Person::default()
        };
        assert_eq!(person.full_name(), "Ludwig van Beethoven, Jr");
        assert_eq!(person.surname(), "van Beethoven");
    }

    #[test]
    fn to_bibtex_writes_fields() {
        let mut e = Entry::new("key1", "Article");
        e.fields.insert("title".into(), "A {GPU} study".into());
        e.fields.insert("year".into(), "2020".into());
        let source = e.to_bibtex();
        assert!(source.starts_with("@article{key1,"));
        assert!(source.contains("title = {A {GPU} study}"));
        assert!(source.contains("year = {2020}"));
    }
}
