//! Application services used by the CLI: scanning, building, and checking docs trees.

pub mod build;
pub mod check;
pub mod scan;
