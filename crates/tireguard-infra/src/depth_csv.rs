//! Historical tread depth readings from CSV
//!
//! Expected header: `date,depth_mm[,position]`. Dates are `YYYY-MM-DD`.
//! When a position column is present, rows for other positions are skipped.

use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;

use tireguard_domain::service::DepthReading;
use tireguard_types::{Error, Position};

#[derive(Error, Debug)]
pub enum DepthCsvError {
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse CSV: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Invalid date format in row {row}: {value}")]
    InvalidDate { row: usize, value: String },

    #[error("Invalid depth in row {row}: {value}")]
    InvalidDepth { row: usize, value: f64 },
}

impl From<DepthCsvError> for Error {
    fn from(e: DepthCsvError) -> Self {
        match e {
            DepthCsvError::IoError(io) => Error::Io(io),
            other => Error::InvalidInput(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DepthRow {
    date: String,
    depth_mm: f64,
    #[serde(default)]
    position: Option<Position>,
}

pub fn load_depth_readings<P: AsRef<Path>>(
    path: P,
    position: Option<Position>,
) -> Result<Vec<DepthReading>, DepthCsvError> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?;
    parse_rows(reader, position)
}

fn parse_rows<R: std::io::Read>(
    mut reader: csv::Reader<R>,
    position: Option<Position>,
) -> Result<Vec<DepthReading>, DepthCsvError> {
    let mut readings = Vec::new();
    for (row_idx, result) in reader.deserialize::<DepthRow>().enumerate() {
        let row = result?;
        let row_num = row_idx + 2;

        if let (Some(wanted), Some(actual)) = (position, row.position) {
            if wanted != actual {
                continue;
            }
        }

        let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d").map_err(|_| {
            DepthCsvError::InvalidDate {
                row: row_num,
                value: row.date.clone(),
            }
        })?;
        if !row.depth_mm.is_finite() || row.depth_mm < 0.0 {
            return Err(DepthCsvError::InvalidDepth {
                row: row_num,
                value: row.depth_mm,
            });
        }

        readings.push(DepthReading {
            date,
            depth_mm: row.depth_mm,
        });
    }
    Ok(readings)
}
