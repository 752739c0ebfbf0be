//! Trace export functionality
//!
//! Writes finished profiles to files other tools can open: Chrome Trace
//! Event Format for Perfetto or chrome://tracing, and a plain JSON dump of
//! the records in their tuple wire shape.

pub mod chrome_trace;
pub mod records;

pub use chrome_trace::ChromeTraceExporter;
pub use records::write_records_json;
