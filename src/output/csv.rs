//! CSV output of classification rows.
//!
//! One row is generated for each classified file.
//!
//! # Columns
//!
//! - `path`: Path as given on the command line
//! - `original_name`, `suggested_name`
//! - `category`, `franchise`, `creator`, `version`
//! - `tags`: Sorted tags joined with `;`
//! - `nsfw`, `status`
//! - `quick_fingerprint`, `full_fingerprint`: Hexadecimal, empty when absent
//!
//! # Example
//!
//! ```no_run
//! use model_archivist::output::csv::CsvOutput;
//!
//! let output = CsvOutput::new(&[]);
//! output.write_to(std::io::stdout()).unwrap();
//! ```

use std::io;

use serde::Serialize;
use thiserror::Error;

use super::ClassificationRow;

/// Errors that can occur during CSV output generation.
#[derive(Debug, Error)]
pub enum CsvOutputError {
    /// I/O error during writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error during CSV serialization.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    path: &'a str,
    original_name: &'a str,
    suggested_name: &'a str,
    category: &'a str,
    franchise: &'a str,
    creator: &'a str,
    version: &'a str,
    tags: String,
    nsfw: bool,
    status: &'static str,
    quick_fingerprint: &'a str,
    full_fingerprint: &'a str,
}

impl<'a> From<&'a ClassificationRow> for CsvRow<'a> {
    fn from(row: &'a ClassificationRow) -> Self {
        Self {
            path: &row.path,
            original_name: &row.original_name,
            suggested_name: &row.suggested_name,
            category: &row.category,
            franchise: row.franchise.as_deref().unwrap_or(""),
            creator: row.creator.as_deref().unwrap_or(""),
            version: row.version.as_deref().unwrap_or(""),
            tags: row.tags.join(";"),
            nsfw: row.is_nsfw,
            status: row.status.as_str(),
            quick_fingerprint: row.quick_fingerprint.as_deref().unwrap_or(""),
            full_fingerprint: row.full_fingerprint.as_deref().unwrap_or(""),
        }
    }
}

/// CSV output formatter.
pub struct CsvOutput<'a> {
    rows: &'a [ClassificationRow],
}

impl<'a> CsvOutput<'a> {
    #[must_use]
    pub fn new(rows: &'a [ClassificationRow]) -> Self {
        Self { rows }
    }

    /// Write the CSV output to the given writer.
    ///
    /// The header is written even when there are no rows.
    ///
    /// # Errors
    ///
    /// Returns `CsvOutputError` if writing or serialization fails.
    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<(), CsvOutputError> {
        let mut csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);

        csv_writer.write_record([
            "path",
            "original_name",
            "suggested_name",
            "category",
            "franchise",
            "creator",
            "version",
            "tags",
            "nsfw",
            "status",
            "quick_fingerprint",
            "full_fingerprint",
        ])?;
        for row in self.rows {
            csv_writer.serialize(CsvRow::from(row))?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Generate CSV output as a string.
    ///
    /// # Errors
    ///
    /// Returns `CsvOutputError` if serialization fails.
    pub fn to_string(&self) -> Result<String, CsvOutputError> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).to_string())
    }
}
