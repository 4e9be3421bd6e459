//! BibTeX database reader.
//!
//! Handles `@string` macros (with the predefined month abbreviations),
//! `@comment` and `@preamble` commands, `{}` or `()` entry delimiters, braced
//! and quoted values, bare numbers and `#` concatenation.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::bib::names::parse_names;
use crate::domain::errors::BibError;
use crate::domain::model::{Bibliography, Entry};

const MONTHS: [(&str, &str); 12] = [
    ("jan", "January"),
    ("feb", "February"),
    ("mar", "March"),
    ("apr", "April"),
    ("may", "May"),
    ("jun", "June"),
    ("jul", "July"),
    ("aug", "August"),
    ("sep", "September"),
    ("oct", "October"),
    ("nov", "November"),
    ("dec", "December"),
];

const PERSON_FIELDS: [&str; 2] = ["author", "editor"];

/// Read and parse a `.bib` file.
pub fn parse_file(path: &Path) -> Result<Bibliography> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read bibtex file: {}", path.display()))?;
    let bibliography =
        parse_str(&source).with_context(|| format!("invalid bibtex in {}", path.display()))?;
    tracing::debug!(path = %path.display(), entries = bibliography.len(), "parsed bibtex file");
    Ok(bibliography)
}

/// Parse BibTeX source text.
pub fn parse_str(source: &str) -> Result<Bibliography, BibError> {
    Reader::new(source).read()
}

struct Reader<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    macros: HashMap<String, String>,
}

impl<'a> Reader<'a> {
    fn new(src: &'a str) -> Self {
        let macros = MONTHS
            .iter()
            .map(|(abbr, name)| ((*abbr).to_string(), (*name).to_string()))
            .collect();
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            macros,
        }
    }

    fn read(mut self) -> Result<Bibliography, BibError> {
        let mut bibliography = Bibliography::new();
        while self.seek_command() {
            let line = self.line();
            let command = self.identifier().to_ascii_lowercase();
            if command.is_empty() {
                continue;
            }
            self.skip_ws();
            match command.as_str() {
                "comment" => self.skip_group(),
                "preamble" => {
                    let close = self.open()?;
                    self.value()?;
                    self.close(close)?;
                }
                "string" => {
                    let close = self.open()?;
                    self.skip_ws();
                    let name = self.identifier().to_ascii_lowercase();
                    if name.is_empty() {
                        return Err(self.syntax("expected string macro name"));
                    }
                    self.expect(b'=')?;
                    let value = self.value()?;
                    self.macros.insert(name, value);
                    self.close(close)?;
                }
                _ => {
                    let entry = self.entry(&command)?;
                    if bibliography.contains(&entry.key) {
                        return Err(BibError::DuplicateKey {
                            key: entry.key,
                            line,
                        });
                    }
                    bibliography.insert(entry);
                }
            }
        }
        Ok(bibliography)
    }

    fn entry(&mut self, kind: &str) -> Result<Entry, BibError> {
        let close = self.open()?;
        self.skip_ws();
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == b',' || b == close || b.is_ascii_whitespace() {
                break;
            }
            self.pos += 1;
        }
        let key = self.src[start..self.pos].to_string();
        if key.is_empty() {
            return Err(self.syntax("expected entry key"));
        }

        let mut entry = Entry::new(key, kind);
        loop {
            self.skip_ws();
            match self.peek() {
                Some(b) if b == close => {
                    self.pos += 1;
                    break;
                }
                Some(b',') => {
                    self.pos += 1;
                    self.skip_ws();
                    if self.peek() == Some(close) {
                        self.pos += 1;
                        break;
                    }
                    let name = self.identifier().to_ascii_lowercase();
                    if name.is_empty() {
                        return Err(self.syntax("expected field name"));
                    }
                    self.expect(b'=')?;
                    let value = self.value()?;
                    entry.fields.insert(name, value);
                }
                Some(other) => {
                    return Err(self.syntax(&format!(
                        "unexpected '{}' in entry '{}'",
                        other as char, entry.key
                    )));
                }
                None => {
                    return Err(self.syntax(&format!("unterminated entry '{}'", entry.key)));
                }
            }
        }

        for role in PERSON_FIELDS {
            if let Some(raw) = entry.fields.get(role) {
                let people = parse_names(raw);
                entry.persons.insert(role.to_string(), people);
            }
        }
        Ok(entry)
    }

    /// Parse `piece # piece # ...` and normalise whitespace.
    fn value(&mut self) -> Result<String, BibError> {
        let mut value = String::new();
        loop {
            self.skip_ws();
            value.push_str(&self.piece()?);
            self.skip_ws();
            if self.peek() == Some(b'#') {
                self.pos += 1;
            } else {
                break;
            }
        }
        Ok(value.split_whitespace().collect::<Vec<_>>().join(" "))
    }

    fn piece(&mut self) -> Result<String, BibError> {
        match self.peek() {
            Some(b'{') => {
                self.pos += 1;
                let start = self.pos;
                let mut depth = 1usize;
                while let Some(b) = self.peek() {
                    match b {
                        b'{' => depth += 1,
                        b'}' => {
                            depth -= 1;
                            if depth == 0 {
                                let text = self.src[start..self.pos].to_string();
                                self.pos += 1;
                                return Ok(text);
                            }
                        }
                        _ => {}
                    }
                    self.pos += 1;
                }
                Err(self.syntax("unterminated braced value"))
            }
            Some(b'"') => {
                self.pos += 1;
                let start = self.pos;
                let mut depth = 0usize;
                while let Some(b) = self.peek() {
                    match b {
                        b'{' => depth += 1,
                        b'}' => depth = depth.saturating_sub(1),
                        b'"' if depth == 0 => {
                            let text = self.src[start..self.pos].to_string();
                            self.pos += 1;
                            return Ok(text);
                        }
                        _ => {}
                    }
                    self.pos += 1;
                }
                Err(self.syntax("unterminated quoted value"))
            }
            Some(b) if b.is_ascii_digit() => {
                let start = self.pos;
                while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                    self.pos += 1;
                }
                Ok(self.src[start..self.pos].to_string())
            }
            Some(_) => {
                let line = self.line();
                let name = self.identifier();
                if name.is_empty() {
                    return Err(self.syntax("expected value"));
                }
                self.macros
                    .get(&name.to_ascii_lowercase())
                    .cloned()
                    .ok_or(BibError::UndefinedMacro { name, line })
            }
            None => Err(self.syntax("unexpected end of input")),
        }
    }

    /// Advance past the next `@`. Everything before it is comment text.
    fn seek_command(&mut self) -> bool {
        match self.src[self.pos..].find('@') {
            Some(offset) => {
                self.pos += offset + 1;
                true
            }
            None => {
                self.pos = self.bytes.len();
                false
            }
        }
    }

    fn identifier(&mut self) -> String {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace()
                || matches!(b, b'{' | b'}' | b'(' | b')' | b',' | b'=' | b'"' | b'#' | b'%')
            {
                break;
            }
            self.pos += 1;
        }
        self.src[start..self.pos].to_string()
    }

    fn open(&mut self) -> Result<u8, BibError> {
        self.skip_ws();
        match self.peek() {
            Some(b'{') => {
                self.pos += 1;
                Ok(b'}')
            }
            Some(b'(') => {
                self.pos += 1;
                Ok(b')')
            }
            _ => Err(self.syntax("expected '{' or '('")),
        }
    }

    fn close(&mut self, close: u8) -> Result<(), BibError> {
        self.skip_ws();
        if self.peek() == Some(close) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.syntax(&format!("expected '{}'", close as char)))
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), BibError> {
        self.skip_ws();
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.syntax(&format!("expected '{}'", byte as char)))
        }
    }

    /// Skip a balanced `{...}` or `(...)` group if one follows.
    fn skip_group(&mut self) {
        let (open, close) = match self.peek() {
            Some(b'{') => (b'{', b'}'),
            Some(b'(') => (b'(', b')'),
            _ => return,
        };
        let mut depth = 0usize;
        while let Some(b) = self.peek() {
            self.pos += 1;
            if b == open {
                depth += 1;
            } else if b == close {
                depth -= 1;
                if depth == 0 {
                    return;
                }
            }
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn line(&self) -> usize {
        self.bytes[..self.pos.min(self.bytes.len())]
            .iter()
            .filter(|&&b| b == b'\n')
            .count()
            + 1
    }

    fn syntax(&self, message: &str) -> BibError {
        BibError::Syntax {
            line: self.line(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
This text is ignored.

@string{ basic = "Basic Books" }

@book{PM18,
    author    = {Pearl, Judea and Mackenzie, Dana},
    title     = {The Book of Why: The New Science of Cause and Effect},
    publisher = basic,
    year      = 2018,
    month     = may,
}

@Article(Hamilton,
  Author = "James D. Hamilton",
  Title = "A New Approach to the {Economic} Analysis",
  journal = "Econometrica" # { } # "Journal",
  pages = {357--384}
)
"#;

    #[test]
    fn parses_entries_in_order() {
        let bib = parse_str(SAMPLE).expect("parse sample");
        let keys: Vec<_> = bib.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, ["PM18", "Hamilton"]);
    }

    #[test]
    fn expands_macros_and_months() {
        let bib = parse_str(SAMPLE).unwrap();
        let book = bib.get("PM18").unwrap();
        assert_eq!(book.kind, "book");
        assert_eq!(book.field("publisher"), Some("Basic Books"));
        assert_eq!(book.field("year"), Some("2018"));
        assert_eq!(book.field("month"), Some("May"));
        assert_eq!(book.persons("author").len(), 2);
    }

    #[test]
    fn handles_parens_quotes_and_concatenation() {
        let bib = parse_str(SAMPLE).unwrap();
        let article = bib.get("hamilton").unwrap();
        assert_eq!(article.kind, "article");
        assert_eq!(article.field("TITLE"), Some("A New Approach to the {Economic} Analysis"));
        assert_eq!(article.field("journal"), Some("Econometrica Journal"));
        assert_eq!(article.persons("author")[0].last, ["Hamilton"]);
    }

    #[test]
    fn skips_comments_and_preamble() {
        let source = r#"
@comment{ @book{hidden, title = {Nope}} }
@preamble{ "\newcommand{\noop}[1]{}" }
@misc{visible, title = {Yes}}
"#;
        let bib = parse_str(source).unwrap();
        assert_eq!(bib.len(), 1);
        assert!(bib.contains("visible"));
    }

    #[test]
    fn collapses_whitespace_in_values() {
        let bib = parse_str("@misc{k, title = {Spread\n      over   lines}}").unwrap();
        assert_eq!(bib.get("k").unwrap().field("title"), Some("Spread over lines"));
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let err = parse_str("@misc{a, title={x}}\n@misc{A, title={y}}").unwrap_err();
        assert_eq!(
            err,
            BibError::DuplicateKey {
                key: "A".into(),
                line: 2
            }
        );
    }

    #[test]
    fn undefined_macro_is_reported() {
        let err = parse_str("@misc{a, publisher = nowhere}").unwrap_err();
        assert!(matches!(err, BibError::UndefinedMacro { ref name, .. } if name == "nowhere"));
    }

    #[test]
    fn unterminated_entry_is_a_syntax_error() {
        let err = parse_str("@misc{a, title = {x}").unwrap_err();
        assert!(matches!(err, BibError::Syntax { .. }));
    }
}
