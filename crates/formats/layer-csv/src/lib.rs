//! CSV export for vector layers.
//!
//! Geometries are written as Well-Known Text in a single column, followed by one column
//! per attribute in sorted order.

pub mod writer;

pub use writer::{CsvWriterOptions, write_csv, write_csv_file};
