//! Core domain types shared by the parser, formatters, and processor.

pub mod errors;
pub mod model;
