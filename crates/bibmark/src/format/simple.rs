//! Built-in "plain" reference style rendered as Markdown.

use anyhow::Result;

use crate::bib::latex::{dashify, sentence_case, to_text};
use crate::bib::names::is_others;
use crate::domain::model::{Entry, Person};
use crate::format::ReferenceFormatter;

/// Formats entries in the classic BibTeX plain style.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainStyle;

impl PlainStyle {
    pub fn new() -> Self {
        Self
    }

    /// Render a single entry.
    pub fn format_entry(&self, entry: &Entry) -> String {
        let blocks = match entry.kind.as_str() {
            "article" => article(entry),
            "book" | "booklet" | "manual" | "proceedings" => book(entry),
            "inproceedings" | "conference" | "incollection" | "inbook" => in_collection(entry),
            "phdthesis" | "mastersthesis" => thesis(entry),
            "techreport" => techreport(entry),
            "unpublished" => unpublished(entry),
            _ => misc(entry),
        };
        blocks
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
            .replace('\n', " ")
    }
}

impl ReferenceFormatter for PlainStyle {
    fn format(&self, entries: &[&Entry]) -> Result<Vec<(String, String)>> {
        Ok(entries
            .iter()
            .map(|entry| (entry.key.clone(), self.format_entry(entry)))
            .collect())
    }
}

type Blocks = Vec<Option<String>>;

fn article(entry: &Entry) -> Blocks {
    let mut blocks = vec![
        sentence([names(entry.persons("author"))]),
        sentence([plain_title(entry)]),
        sentence([
            text(entry, "journal").map(emph),
            volume_number_pages(entry),
            date(entry),
        ]),
    ];
    blocks.extend(trailer(entry));
    blocks
}

fn book(entry: &Entry) -> Blocks {
    let edition = text(entry, "edition").map(|edition| format!("{edition} edition"));
    let publisher = text(entry, "publisher")
        .or_else(|| text(entry, "organization"))
        .or_else(|| text(entry, "howpublished"));
    let mut blocks = vec![
        sentence([author_or_editor(entry)]),
        sentence([emph_title(entry)]),
        sentence([volume_series(entry)]),
        sentence([publisher, text(entry, "address"), edition, date(entry)]),
    ];
    blocks.extend(trailer(entry));
    blocks
}

fn in_collection(entry: &Entry) -> Blocks {
    let editors = entry.persons("editor");
    let mut container = Vec::new();
    if let Some(names) = names(editors) {
        let role = if editors.len() > 1 { "editors" } else { "editor" };
        container.push(format!("{names}, {role}"));
    }
    if let Some(booktitle) = text(entry, "booktitle") {
        container.push(emph(booktitle));
    }
    if let Some(series) = volume_series(entry) {
        container.push(series);
    }
    if let Some(pages) = text(entry, "pages") {
        container.push(format!("pages {}", dashify(&pages)));
    }
    let container = (!container.is_empty()).then(|| format!("In {}", container.join(", ")));

    let mut blocks = vec![
        sentence([names(entry.persons("author"))]),
        sentence([plain_title(entry)]),
        sentence([container]),
        sentence([
            text(entry, "organization"),
            text(entry, "publisher"),
            text(entry, "address"),
            date(entry),
        ]),
    ];
    blocks.extend(trailer(entry));
    blocks
}

fn thesis(entry: &Entry) -> Blocks {
    let kind = match entry.kind.as_str() {
        "phdthesis" => "PhD thesis",
        _ => "Master's thesis",
    };
    let kind = text(entry, "type").unwrap_or_else(|| kind.to_string());
    let mut blocks = vec![
        sentence([names(entry.persons("author"))]),
        sentence([emph_title(entry)]),
        sentence([
            Some(kind),
            text(entry, "school"),
            text(entry, "address"),
            date(entry),
        ]),
    ];
    blocks.extend(trailer(entry));
    blocks
}

fn techreport(entry: &Entry) -> Blocks {
    let kind = text(entry, "type").unwrap_or_else(|| "Technical Report".to_string());
    let report = match text(entry, "number") {
        Some(number) => format!("{kind} {number}"),
        None => kind,
    };
    let mut blocks = vec![
        sentence([names(entry.persons("author"))]),
        sentence([plain_title(entry)]),
        sentence([
            Some(report),
            text(entry, "institution"),
            text(entry, "address"),
            date(entry),
        ]),
    ];
    blocks.extend(web_refs(entry));
    blocks
}

fn unpublished(entry: &Entry) -> Blocks {
    let mut blocks = vec![
        sentence([names(entry.persons("author"))]),
        sentence([plain_title(entry)]),
        sentence([text(entry, "note"), date(entry)]),
    ];
    blocks.extend(web_refs(entry));
    blocks
}

fn misc(entry: &Entry) -> Blocks {
    let mut blocks = vec![
        sentence([names(entry.persons("author"))]),
        sentence([plain_title(entry)]),
        sentence([text(entry, "howpublished")]),
        sentence([date(entry)]),
    ];
    blocks.extend(trailer(entry));
    blocks
}

/// Note followed by web references.
fn trailer(entry: &Entry) -> Blocks {
    let mut blocks = vec![sentence([text(entry, "note")])];
    blocks.extend(web_refs(entry));
    blocks
}

fn web_refs(entry: &Entry) -> Blocks {
    vec![
        entry.field("url").map(|url| format!("URL: <{}>.", url.trim())),
        entry.field("doi").map(|doi| format!("doi:{}.", doi.trim())),
    ]
}

/// Join present parts with `, ` and terminate with a period.
fn sentence<const N: usize>(parts: [Option<String>; N]) -> Option<String> {
    let parts: Vec<String> = parts
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect();
    if parts.is_empty() {
        return None;
    }
    let mut joined = parts.join(", ");
    if !joined.ends_with(['.', '?', '!']) {
        joined.push('.');
    }
    Some(joined)
}

fn text(entry: &Entry, field: &str) -> Option<String> {
    entry.field(field).map(to_text).filter(|value| !value.is_empty())
}

fn plain_title(entry: &Entry) -> Option<String> {
    entry
        .field("title")
        .map(|title| to_text(&sentence_case(title)))
}

fn emph_title(entry: &Entry) -> Option<String> {
    text(entry, "title").map(emph)
}

fn emph(value: String) -> String {
    format!("*{value}*")
}

fn date(entry: &Entry) -> Option<String> {
    let year = text(entry, "year")?;
    Some(match text(entry, "month") {
        Some(month) => format!("{month} {year}"),
        None => year,
    })
}

fn volume_number_pages(entry: &Entry) -> Option<String> {
    let pages = text(entry, "pages").map(|pages| dashify(&pages));
    match text(entry, "volume") {
        Some(volume) => {
            let mut out = volume;
            if let Some(number) = text(entry, "number") {
                out.push_str(&format!("({number})"));
            }
            if let Some(pages) = pages {
                out.push(':');
                out.push_str(&pages);
            }
            Some(out)
        }
        None => pages.map(|pages| format!("pages {pages}")),
    }
}

fn volume_series(entry: &Entry) -> Option<String> {
    let volume = text(entry, "volume");
    let series = text(entry, "series");
    match (volume, series) {
        (Some(volume), Some(series)) => Some(format!("Volume {volume} of {}", emph(series))),
        (Some(volume), None) => Some(format!("Volume {volume}")),
        (None, Some(series)) => Some(series),
        (None, None) => None,
    }
}

fn author_or_editor(entry: &Entry) -> Option<String> {
    if let Some(authors) = names(entry.persons("author")) {
        return Some(authors);
    }
    let editors = entry.persons("editor");
    names(editors).map(|names| {
        let role = if editors.len() > 1 { "editors" } else { "editor" };
        format!("{names}, {role}")
    })
}

/// `A`, `A and B`, `A, B, and C`; a trailing `others` becomes `et al.`.
fn names(people: &[Person]) -> Option<String> {
    let (people, et_al) = match people.split_last() {
        Some((last, rest)) if is_others(last) => (rest, true),
        _ => (people, false),
    };
    let rendered: Vec<String> = people
        .iter()
        .map(|person| to_text(&person.full_name()))
        .collect();

    let joined = match rendered.as_slice() {
        [] => return None,
        [only] if et_al => format!("{only} et al."),
        _ if et_al => format!("{}, et al.", rendered.join(", ")),
        [only] => only.clone(),
        [first, second] => format!("{first} and {second}"),
        [init @ .., last] => format!("{}, and {last}", init.join(", ")),
    };
    Some(joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bib::parser::parse_str;

    fn render(source: &str, key: &str) -> String {
        let bib = parse_str(source).expect("valid bibtex");
        PlainStyle::new().format_entry(bib.get(key).expect("entry present"))
    }

    #[test]
    fn book_with_two_authors() {
        let source = r#"@book{PM18,
            author = {Pearl, Judea and Mackenzie, Dana},
            title = {The Book of Why: The New Science of Cause and Effect},
            publisher = {Basic Books},
            year = {2018}}"#;
        assert_eq!(
            render(source, "PM18"),
            "Judea Pearl and Dana Mackenzie. *The Book of Why: The New Science of Cause and Effect*. Basic Books, 2018."
        );
    }

    #[test]
    fn article_sentence_cases_title_and_joins_volume() {
        let source = r#"@article{Hamilton,
            author = {James D. Hamilton},
            title = {A New Approach to the {Economic} Analysis of Nonstationary Time Series},
            journal = {Econometrica},
            volume = {57}, number = {2}, pages = {357--384},
            year = {1989}}"#;
        assert_eq!(
            render(source, "Hamilton"),
            "James D. Hamilton. A new approach to the Economic analysis of nonstationary time series. *Econometrica*, 57(2):357\u{2013}384, 1989."
        );
    }

    #[test]
    fn three_authors_use_serial_comma() {
        let source = r#"@misc{three,
            author = {Alpha, Ann and Beta, Bob and Gamma, Gil},
            title = {Notes},
            year = {2001}}"#;
        assert_eq!(render(source, "three"), "Ann Alpha, Bob Beta, and Gil Gamma. Notes. 2001.");
    }

    #[test]
    fn misc_puts_year_between_howpublished_and_note() {
        let source = r#"@misc{talk,
            author = {Doe, Jane},
            title = {On Footnotes},
            howpublished = {Invited talk},
            note = {Slides available on request},
            month = may,
            year = {2019}}"#;
        assert_eq!(
            render(source, "talk"),
            "Jane Doe. On footnotes. Invited talk. May 2019. Slides available on request."
        );
    }

    #[test]
    fn others_renders_et_al() {
        let source = r#"@misc{etal, author = {Doe, Jane and others}, title = {Many hands}}"#;
        assert_eq!(render(source, "etal"), "Jane Doe et al. Many hands.");
    }

    #[test]
    fn inproceedings_with_editors_and_pages() {
        let source = r#"@inproceedings{conf,
            author = {Smith, Sam},
            title = {Fast Things},
            booktitle = {Proceedings of Speed},
            editor = {Editor, Ed},
            pages = {1--10},
            publisher = {ACM},
            year = {2020}}"#;
        assert_eq!(
            render(source, "conf"),
            "Sam Smith. Fast things. In Ed Editor, editor, *Proceedings of Speed*, pages 1\u{2013}10. ACM, 2020."
        );
    }

    #[test]
    fn thesis_and_web_refs() {
        let source = r#"@phdthesis{thesis,
            author = {G{\"o}del, Kurt},
            title = {On Completeness},
            school = {Universit{\"a}t Wien},
            year = {1929},
            url = {https://example.org/thesis}}"#;
        assert_eq!(
            render(source, "thesis"),
            "Kurt Gödel. *On Completeness*. PhD thesis, Universität Wien, 1929. URL: <https://example.org/thesis>."
        );
    }

    #[test]
    fn editor_only_book_and_month() {
        let source = r#"@book{ed,
            editor = {Ada Lovelace and Charles Babbage},
            title = {Engines},
            publisher = {Self},
            month = jun,
            year = {1843}}"#;
        assert_eq!(
            render(source, "ed"),
            "Ada Lovelace and Charles Babbage, editors. *Engines*. Self, June 1843."
        );
    }

    #[test]
    fn formatter_trait_preserves_order() -> Result<()> {
        let bib = parse_str("@misc{b, title={B}}\n@misc{a, title={A}}").unwrap();
        let entries: Vec<&Entry> = bib.iter().collect();
        let formatted = PlainStyle::new().format(&entries)?;
        let keys: Vec<_> = formatted.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, ["b", "a"]);
        Ok(())
    }
}
