//! CSV writer implementation for converting vector layers to CSV format

use std::fs::File;
use std::io::Write as IoWrite;
use std::path::Path;

use geozero::ToWkt;
use layer_shared::VectorLayer;

/// Options for CSV writing
#[derive(Debug, Clone)]
pub struct CsvWriterOptions {
    /// Column delimiter (default: b',')
    pub delimiter: u8,
    /// Whether to write header row (default: true)
    pub has_header: bool,
    /// Name of the WKT geometry column (default: "geometry")
    pub geometry_column_name: String,
    /// Representation of missing and non-finite values (default: empty string)
    pub null_value: String,
}

impl Default for CsvWriterOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_header: true,
            geometry_column_name: "geometry".to_string(),
            null_value: String::new(),
        }
    }
}

impl CsvWriterOptions {
    /// Create new writer options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set column delimiter
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set whether to write header row
    #[must_use]
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Set the geometry column name
    #[must_use]
    pub fn with_geometry_column(mut self, name: impl Into<String>) -> Self {
        self.geometry_column_name = name.into();
        self
    }

    /// Set null value representation
    #[must_use]
    pub fn with_null_value(mut self, null_value: impl Into<String>) -> Self {
        self.null_value = null_value.into();
        self
    }
}

/// Write a layer to CSV format
///
/// # Errors
///
/// Returns an error if writing to the output fails or if a geometry cannot be encoded
/// as WKT.
pub fn write_csv<W: IoWrite>(
    writer: W,
    layer: &VectorLayer,
    options: &CsvWriterOptions,
) -> csv::Result<()> {
    let columns = layer.column_names();
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(options.delimiter)
        .from_writer(writer);

    if options.has_header {
        let mut header = Vec::with_capacity(columns.len() + 1);
        header.push(options.geometry_column_name.as_str());
        header.extend(columns.iter().map(String::as_str));
        csv_writer.write_record(&header)?;
    }

    for (idx, feature) in layer.features.iter().enumerate() {
        let wkt = feature.geometry.to_wkt().map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("feature {} could not be written as WKT: {e}", idx + 1),
            )
        })?;

        let mut record = Vec::with_capacity(columns.len() + 1);
        record.push(wkt);
        for column in &columns {
            let value = match feature.property(column) {
                Some(v) if v.is_finite() => v.to_string(),
                _ => options.null_value.clone(),
            };
            record.push(value);
        }
        csv_writer.write_record(&record)?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Write a layer to a new CSV file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_csv_file(
    path: impl AsRef<Path>,
    layer: &VectorLayer,
    options: &CsvWriterOptions,
) -> csv::Result<()> {
    let file = File::create(path)?;
    write_csv(file, layer, options)
}
