#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Accident record import.
//!
//! Reads accident CSV files into validated [`AccidentRecord`]s. Bad rows
//! never abort an import: each is counted by reason in the
//! [`ImportSummary`] and skipped.

pub mod row;

use std::io::Read;
use std::path::Path;

use saferoute_accident_models::{AccidentRecord, RecordError};
use serde::Serialize;
use thiserror::Error;

use crate::row::CsvRow;

/// Errors that stop an import entirely.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The file could not be opened.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The header row is unreadable.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A required column is absent.
    #[error("CSV is missing required column {column:?}")]
    MissingColumn {
        /// The missing header.
        column: &'static str,
    },
}

/// Columns every accident CSV must have.
pub const REQUIRED_COLUMNS: &[&str] = &["lat", "lng", "severity", "reported_at"];

/// Per-reason counts from one import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    /// Data rows read.
    pub rows: u64,
    /// Rows accepted.
    pub imported: u64,
    /// Rows with unparsable fields (numbers, timestamps, column count).
    pub malformed: u64,
    /// Rows with out-of-range or non-finite coordinates.
    pub invalid_coordinates: u64,
    /// Rows with an unrecognised severity label.
    pub unknown_severities: u64,
}

impl ImportSummary {
    /// Rows skipped for any reason.
    #[must_use]
    pub const fn skipped(&self) -> u64 {
        self.malformed + self.invalid_coordinates + self.unknown_severities
    }
}

/// Records and counts from one import.
#[derive(Debug, Clone, Default)]
pub struct Import {
    /// Accepted records in file order.
    pub records: Vec<AccidentRecord>,
    /// What happened to every row.
    pub summary: ImportSummary,
}

/// Imports the accident CSV at `path`.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be opened or its header is
/// unusable. Bad data rows are counted, not returned as errors.
pub fn load_csv_path(path: &Path) -> Result<Import, IngestError> {
    let file = std::fs::File::open(path).map_err(|e| IngestError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let import = read_csv(file)?;
    log::info!(
        "Imported {} of {} accident rows from {}",
        import.summary.imported,
        import.summary.rows,
        path.display()
    );
    Ok(import)
}

/// Imports accident CSV data from any reader.
///
/// # Errors
///
/// Returns [`IngestError`] if the header row is unreadable or lacks a
/// required column.
pub fn read_csv(reader: impl Read) -> Result<Import, IngestError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    for &column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(IngestError::MissingColumn { column });
        }
    }

    let mut import = Import::default();
    for result in csv_reader.deserialize::<CsvRow>() {
        import.summary.rows += 1;

        let raw = match result {
            Ok(row) => row.into_raw(),
            Err(e) => {
                log::trace!("  skipping malformed row: {e}");
                None
            }
        };
        let Some(raw) = raw else {
            import.summary.malformed += 1;
            continue;
        };

        match AccidentRecord::try_from(raw) {
            Ok(record) => {
                import.records.push(record);
                import.summary.imported += 1;
            }
            Err(RecordError::Coordinate(e)) => {
                log::trace!("  skipping row with invalid coordinate: {e}");
                import.summary.invalid_coordinates += 1;
            }
            Err(RecordError::UnknownSeverity { label }) => {
                log::trace!("  skipping row with unknown severity {label:?}");
                import.summary.unknown_severities += 1;
            }
        }
    }

    if import.summary.skipped() > 0 {
        log::warn!(
            "Skipped {} accident rows ({} malformed, {} invalid coordinates, {} unknown severities)",
            import.summary.skipped(),
            import.summary.malformed,
            import.summary.invalid_coordinates,
            import.summary.unknown_severities
        );
    }

    Ok(import)
}
