//! Reference formatting backends.

pub mod pandoc;
pub mod simple;
pub mod template;

use anyhow::Result;

use crate::domain::model::Entry;

/// Renders bibliography entries into Markdown reference text.
pub trait ReferenceFormatter: Send + Sync {
    /// Format each entry, returning `(key, text)` pairs in input order.
    fn format(&self, entries: &[&Entry]) -> Result<Vec<(String, String)>>;
}

pub use pandoc::PandocFormatter;
pub use simple::PlainStyle;
pub use template::TemplateFormatter;
