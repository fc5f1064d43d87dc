#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Hand-off artifacts between pipeline stages.
//!
//! Every stage fully writes its output before the next one reads it. Writes
//! go to a `.tmp` sibling that is renamed into place, so a failed stage
//! never leaves a truncated artifact behind. Reads fail with
//! [`ArtifactError::MissingInput`] when the upstream stage has not run.

pub mod paths;
pub mod risk_table;

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use uli_map_ingest_models::{RawRecord, TimeSeriesPoint, UnitAggregate};
use uli_map_optimizer_models::ClusterSnapshot;
use uli_map_risk_models::RiskRow;

pub use paths::ArtifactPaths;
pub use risk_table::RiskTableRecord;

/// Errors reading or writing artifacts.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// A required upstream artifact does not exist.
    #[error("Missing input artifact {}; run the stage that produces it first", .path.display())]
    MissingInput {
        /// Expected location.
        path: PathBuf,
    },
    /// A row parsed but does not describe a valid record.
    #[error("Invalid row {line} in {}: {message}", .path.display())]
    InvalidRow {
        path: PathBuf,
        /// 1-based data row number.
        line: u64,
        message: String,
    },
    /// File system failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// CSV encoding or decoding failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    /// JSON encoding or decoding failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn open_input(path: &Path) -> Result<std::fs::File, ArtifactError> {
    if !path.is_file() {
        return Err(ArtifactError::MissingInput {
            path: path.to_path_buf(),
        });
    }
    Ok(std::fs::File::open(path)?)
}

/// Runs `write` against a temp file, then renames it over
/// `path`.
fn write_atomic<F>(path: &Path, write: F) -> Result<(), ArtifactError>
where
    F: FnOnce(std::fs::File) -> Result<(), ArtifactError>,
{
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        paths::ensure_dir(parent)?;
    }

    let tmp = paths::tmp_path(path);
    let result = std::fs::File::create(&tmp)
        .map_err(ArtifactError::from)
        .and_then(write);

    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }

    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Serialises `rows` as CSV with a header row.
///
/// # Errors
///
/// Returns [`ArtifactError`] if a row fails to serialise or the writer
/// fails.
pub fn write_csv_to<W: Write, T: Serialize>(
    writer: W,
    rows: impl IntoIterator<Item = T>,
) -> Result<usize, ArtifactError> {
    let mut writer = csv::Writer::from_writer(writer);
    let mut count = 0;
    for row in rows {
        writer.serialize(row)?;
        count += 1;
    }
    writer.flush()?;
    Ok(count)
}

/// Deserialises every CSV row of `reader`.
///
/// # Errors
///
/// Returns [`ArtifactError::Csv`] on the first row that does not parse.
pub fn read_csv_from<R: Read, T: DeserializeOwned>(reader: R) -> Result<Vec<T>, ArtifactError> {
    csv::Reader::from_reader(reader)
        .deserialize()
        .map(|row| row.map_err(ArtifactError::from))
        .collect()
}

/// Atomically writes `rows` to `path` as CSV.
///
/// # Errors
///
/// Returns [`ArtifactError`] if the file cannot be written.
pub fn write_csv<T: Serialize>(
    path: &Path,
    rows: impl IntoIterator<Item = T>,
) -> Result<usize, ArtifactError> {
    let mut written = 0;
    write_atomic(path, |file| {
        written = write_csv_to(std::io::BufWriter::new(file), rows)?;
        Ok(())
    })?;
    log::info!("Wrote {written} rows to {}", path.display());
    Ok(written)
}

/// Reads a CSV artifact.
///
/// # Errors
///
/// Returns [`ArtifactError::MissingInput`] if `path` does not exist, or
/// another [`ArtifactError`] if it does not parse.
pub fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, ArtifactError> {
    let rows = read_csv_from(std::io::BufReader::new(open_input(path)?))?;
    log::debug!("Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Writes `master_pincode_risk.csv`.
///
/// # Errors
///
/// Returns [`ArtifactError`] if the file cannot be written.
pub fn write_unit_table(
    paths: &ArtifactPaths,
    units: &[UnitAggregate],
) -> Result<(), ArtifactError> {
    write_csv(&paths.unit_table(), units).map(|_| ())
}

/// Reads `master_pincode_risk.csv`.
///
/// # Errors
///
/// Returns [`ArtifactError`] if the file is missing or malformed.
pub fn read_unit_table(paths: &ArtifactPaths) -> Result<Vec<UnitAggregate>, ArtifactError> {
    read_csv(&paths.unit_table())
}

/// Writes `master_time_series.csv`.
///
/// # Errors
///
/// Returns [`ArtifactError`] if the file cannot be written.
pub fn write_time_series(
    paths: &ArtifactPaths,
    series: &[TimeSeriesPoint],
) -> Result<(), ArtifactError> {
    write_csv(&paths.time_series(), series).map(|_| ())
}

/// Writes `raw_merged_data.csv`.
///
/// # Errors
///
/// Returns [`ArtifactError`] if the file cannot be written.
pub fn write_merged_records(
    paths: &ArtifactPaths,
    records: &[RawRecord],
) -> Result<(), ArtifactError> {
    write_csv(&paths.merged_records(), records).map(|_| ())
}

/// Reads `raw_merged_data.csv`.
///
/// # Errors
///
/// Returns [`ArtifactError`] if the file is missing or malformed.
pub fn read_merged_records(paths: &ArtifactPaths) -> Result<Vec<RawRecord>, ArtifactError> {
    read_csv(&paths.merged_records())
}

/// Writes `master_table.csv`.
///
/// # Errors
///
/// Returns [`ArtifactError`] if the file cannot be written.
pub fn write_risk_table(paths: &ArtifactPaths, rows: &[RiskRow]) -> Result<(), ArtifactError> {
    write_csv(&paths.risk_table(), rows.iter().map(RiskTableRecord::from)).map(|_| ())
}

/// Reads `master_table.csv` back into typed rows.
///
/// # Errors
///
/// Returns [`ArtifactError::InvalidRow`] for a row that fills neither
/// mode's columns, or another [`ArtifactError`] if the file is missing or
/// malformed.
pub fn read_risk_table(paths: &ArtifactPaths) -> Result<Vec<RiskRow>, ArtifactError> {
    let path = paths.risk_table();
    let records: Vec<RiskTableRecord> = read_csv(&path)?;

    records
        .into_iter()
        .zip(1_u64..)
        .map(|(record, line)| {
            record.into_row().ok_or_else(|| ArtifactError::InvalidRow {
                path: path.clone(),
                line,
                message: "neither aggregate nor record columns are filled".to_string(),
            })
        })
        .collect()
}

/// Writes `route_clusters.json`.
///
/// # Errors
///
/// Returns [`ArtifactError`] if the file cannot be written.
pub fn write_snapshot(
    paths: &ArtifactPaths,
    snapshot: &ClusterSnapshot,
) -> Result<(), ArtifactError> {
    let path = paths.cluster_snapshot();
    write_atomic(&path, |mut file| {
        file.write_all(serde_json::to_string_pretty(snapshot)?.as_bytes())?;
        Ok(())
    })?;
    log::info!(
        "Wrote {} clusters to {}",
        snapshot.deployed_vans,
        path.display()
    );
    Ok(())
}

/// Reads `route_clusters.json`.
///
/// # Errors
///
/// Returns [`ArtifactError`] if the file is missing or malformed.
pub fn read_snapshot(paths: &ArtifactPaths) -> Result<ClusterSnapshot, ArtifactError> {
    let file = open_input(&paths.cluster_snapshot())?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}
