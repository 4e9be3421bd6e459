pub mod app;
pub mod bib;
pub mod cite;
pub mod domain;
pub mod format;
pub mod infra;
pub mod processor;

pub use processor::Processor;

/// Install logging for the given `-v` count.
pub fn init(verbosity: u8) {
    infra::logging::init(verbosity);
}
