//! Export of the finished sample.
//!
//! Export happens once per run, after traversal halts.

mod writer;

pub use writer::{CsvExporter, ExportSummary, HeaderPolicy};
