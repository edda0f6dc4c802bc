//! Writing storm windows and shock lists to disk or stdout.
//!
//! CSV has one row per sample with a header; missing values are empty
//! fields. JSON is the serde form of the value being written.

use serde::Serialize;
use std::io::{Read, Write};
use thiserror::Error;

use crate::types::{CanonicalSeries, ShockCandidate, SolarWindSample};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

/// Write `series` as CSV with a `timestamp,bt,bx,...` header.
pub fn write_csv<W: Write>(series: &CanonicalSeries, writer: W) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for sample in series.samples() {
        wtr.serialize(sample)?;
    }
    if series.is_empty() {
        wtr.write_record(["timestamp", "bt", "bx", "by", "bz", "density", "speed", "temperature"])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write shock candidates as `timestamp,difference,pct_change` rows.
pub fn write_shocks_csv<W: Write>(shocks: &[ShockCandidate], writer: W) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    if shocks.is_empty() {
        wtr.write_record(["timestamp", "difference", "pct_change"])?;
    }
    for shock in shocks {
        wtr.serialize(shock)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Read a series previously written by [`write_csv`].
pub fn read_csv<R: Read>(reader: R) -> Result<CanonicalSeries, ExportError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let samples = rdr
        .deserialize::<SolarWindSample>()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CanonicalSeries::from_samples(samples))
}

/// Pretty-printed JSON.
pub fn write_json<T: Serialize + ?Sized, W: Write>(value: &T, mut writer: W) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    Ok(())
}
