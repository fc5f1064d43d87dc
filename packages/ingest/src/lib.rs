#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Ingestion and aggregation of raw enrolment/update extracts.
//!
//! Reads any number of CSV extracts, discovers their column roles at
//! runtime ([`schema`]), reduces each to a partial aggregate
//! ([`aggregate`]), and folds the partials into the canonical per-postal-code
//! table and per-month series. Also provides the record-level left outer
//! join ([`merge`]) for individual-level inputs.

pub mod aggregate;
pub mod merge;
pub mod parsing;
pub mod progress;
pub mod schema;
pub mod sources;

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use uli_map_ingest_models::IngestSummary;

use crate::aggregate::{Aggregates, aggregate_source};
use crate::progress::ProgressCallback;
use crate::sources::SourceFile;

/// Errors that can occur while reading a single source.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The file could not be opened or read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The CSV could not be parsed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The headers do not describe a recognisable table.
    #[error("Schema mismatch: {0}")]
    Schema(#[from] schema::SchemaError),
}

/// Result of an ingestion run.
#[derive(Debug, Clone, Default)]
pub struct IngestOutcome {
    /// Folded per-unit and per-month totals.
    pub aggregates: Aggregates,
    /// Run bookkeeping.
    pub summary: IngestSummary,
}

/// Reads and aggregates a single source file.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be opened, parsed, or
/// recognised.
pub fn ingest_file(
    source: &SourceFile,
) -> Result<(Aggregates, aggregate::SourceStats), IngestError> {
    let file = File::open(&source.path)?;
    aggregate_source(BufReader::new(file), source.kind)
}

/// Aggregates every source, skipping those that fail.
///
/// A source that cannot be read or whose headers are unrecognisable is
/// logged at `warn` and contributes nothing; the run continues. Each source
/// is reduced on its own and the partials are folded in path order, so the
/// result is identical across repeated runs over the same files.
#[must_use]
pub fn ingest(sources: &[SourceFile], progress: &Arc<dyn ProgressCallback>) -> IngestOutcome {
    progress.set_total(sources.len() as u64);

    let mut summary = IngestSummary::default();
    let mut partials = Vec::with_capacity(sources.len());

    for source in sources {
        progress.set_message(source.path.display().to_string());

        match ingest_file(source) {
            Ok((partial, stats)) => {
                log::debug!(
                    "{}: {} rows ({} undated, {} without postal code)",
                    source.path.display(),
                    stats.rows,
                    stats.undated_rows,
                    stats.unkeyed_rows
                );
                if stats.malformed_cells > 0 {
                    log::warn!(
                        "{}: {} unusable count cells counted as zero",
                        source.path.display(),
                        stats.malformed_cells
                    );
                }
                summary.files_read += 1;
                summary.rows_read += stats.rows;
                summary.malformed_cells += stats.malformed_cells;
                partials.push(partial);
            }
            Err(e) => {
                log::warn!("Skipping {}: {e}", source.path.display());
                summary.files_skipped += 1;
            }
        }

        progress.inc(1);
    }

    let aggregates = partials
        .into_iter()
        .fold(Aggregates::default(), Aggregates::merge);

    let totals = aggregates.unit_totals();
    summary.enrolment_total = totals.enrolment_count;
    summary.update_total = totals.update_count;

    log::info!(
        "Ingested {} files ({} skipped): {} postal codes, {} months, {} enrolments, {} updates",
        summary.files_read,
        summary.files_skipped,
        aggregates.units.len(),
        aggregates.series.len(),
        summary.enrolment_total,
        summary.update_total
    );
    progress.finish(format!("Ingested {} files", summary.files_read));

    IngestOutcome {
        aggregates,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::null_progress;
    use uli_map_ingest_models::EventKind;

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "uli_map_ingest_{name}_{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn source(dir: &std::path::Path, name: &str, body: &str, kind: EventKind) -> SourceFile {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        SourceFile { path, kind }
    }

    #[test]
    fn bad_sources_are_skipped_without_aborting() {
        let dir = scratch_dir("skip");
        let sources = vec![
            source(
                &dir,
                "enrol.csv",
                "date,pincode,age_0_5\n01-01-2025,110001,5\n",
                EventKind::Enrolment,
            ),
            source(&dir, "junk.csv", "foo,bar\n1,2\n", EventKind::Update),
            SourceFile {
                path: dir.join("missing.csv"),
                kind: EventKind::Update,
            },
        ];

        let outcome = ingest(&sources, &null_progress());
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(outcome.summary.files_read, 1);
        assert_eq!(outcome.summary.files_skipped, 2);
        assert_eq!(outcome.summary.enrolment_total, 5);
        assert_eq!(outcome.aggregates.units.len(), 1);
    }

    #[test]
    fn ingestion_is_partition_invariant_and_repeatable() {
        let dir = scratch_dir("partition");
        let a = source(
            &dir,
            "a.csv",
            "date,pincode,age_0_5,age_5_17\n01-01-2025,110001,5,5\n02-02-2025,110002,1,0\n",
            EventKind::Enrolment,
        );
        let b = source(
            &dir,
            "b.csv",
            "date,pincode,bio_age_5_17\n03-01-2025,110001,4\n",
            EventKind::Update,
        );
        let c = source(
            &dir,
            "c.csv",
            "pincode,demo_age_17_\n110002,2\n110003,8\n",
            EventKind::Update,
        );

        let all = ingest(&[a.clone(), b.clone(), c.clone()], &null_progress());
        let again = ingest(&[a.clone(), b.clone(), c.clone()], &null_progress());
        let left = ingest(&[a, c], &null_progress());
        let right = ingest(&[b], &null_progress());
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(all.aggregates, again.aggregates);
        assert_eq!(all.aggregates, left.aggregates.merge(right.aggregates));
        assert_eq!(all.summary.enrolment_total, 11);
        assert_eq!(all.summary.update_total, 14);
    }
}
