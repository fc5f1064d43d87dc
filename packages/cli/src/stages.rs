//! Pipeline stages.
//!
//! Each stage reads the artifacts of the previous one from the output
//! directory and fully writes its own before returning.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Instant;

use uli_map_artifacts::ArtifactPaths;
use uli_map_cli_utils::{IndicatifProgress, MultiProgress};
use uli_map_geocoder::GeoProvider;
use uli_map_ingest::merge;
use uli_map_ingest::sources::{self, SourceFile};
use uli_map_ingest_models::{EventKind, IngestSummary};
use uli_map_optimizer_models::DeploymentProfile;
use uli_map_risk::{RiskEngine, ScoringInput};
use uli_map_risk_models::{RiskRow, ScoringMode, ScoringStats};

use crate::config::Config;

type StageResult<T> = Result<T, Box<dyn std::error::Error>>;

fn artifact_paths(config: &Config) -> ArtifactPaths {
    ArtifactPaths::new(&config.output_dir)
}

fn discover(config: &Config) -> Vec<SourceFile> {
    sources::discover(&config.source_dirs())
}

/// Prints discovered source files grouped by event kind.
pub fn list_sources(config: &Config) {
    let files = discover(config);

    println!("{:<10} PATH", "EVENT");
    println!("{}", "-".repeat(60));
    for kind in [EventKind::Enrolment, EventKind::Update] {
        for file in files.iter().filter(|f| f.kind == kind) {
            println!("{:<10} {}", kind.to_string(), file.path.display());
        }
    }
    println!();
    println!("{} files", files.len());
}

/// Aggregates every raw extract into the unit table and time series.
///
/// # Errors
///
/// Returns an error if an artifact cannot be written.
pub fn ingest(config: &Config, multi: &MultiProgress) -> StageResult<IngestSummary> {
    let start = Instant::now();
    let files = discover(config);
    if files.is_empty() {
        log::warn!("No source files found under {}", config.data_dir.display());
    }

    let progress = IndicatifProgress::files_bar(multi, "Aggregating sources");
    let outcome = uli_map_ingest::ingest(&files, &progress);

    let paths = artifact_paths(config);
    uli_map_artifacts::write_unit_table(&paths, &outcome.aggregates.unit_table())?;
    uli_map_artifacts::write_time_series(&paths, &outcome.aggregates.time_series())?;

    log::info!("Ingest finished in {:.1}s", start.elapsed().as_secs_f64());
    Ok(outcome.summary)
}

/// Joins an enrolment extract with an update extract per individual.
///
/// # Errors
///
/// Returns an error if either input cannot be read or the output cannot be
/// written.
pub fn merge_records(config: &Config, enrolments: &Path, updates: &Path) -> StageResult<()> {
    let enrolment_rows = merge::read_enrolments(BufReader::new(open_input(enrolments)?))?;
    let update_rows = merge::read_updates(BufReader::new(open_input(updates)?))?;

    log::info!(
        "Joining {} enrolments with {} updates",
        enrolment_rows.len(),
        update_rows.len()
    );
    let records = merge::left_join(enrolment_rows, &update_rows);
    let never_updated = records
        .iter()
        .filter(|r| r.last_update_date.is_none())
        .count();
    log::info!(
        "{} individuals, {never_updated} with no update on record",
        records.len()
    );

    uli_map_artifacts::write_merged_records(&artifact_paths(config), &records)?;
    Ok(())
}

fn open_input(path: &Path) -> StageResult<File> {
    if !path.is_file() {
        return Err(uli_map_artifacts::ArtifactError::MissingInput {
            path: path.to_path_buf(),
        }
        .into());
    }
    Ok(File::open(path)?)
}

/// Scores the upstream table and writes the risk table.
///
/// # Errors
///
/// Returns an error if the input artifact is missing, the geocoder cannot
/// be built or fails the batch, or the risk table cannot be written.
#[allow(clippy::future_not_send)]
pub async fn score(config: &Config, mode: ScoringMode) -> StageResult<ScoringStats> {
    let paths = artifact_paths(config);

    // Inputs first so a missing artifact is reported before the geocoder
    // loads.
    let units;
    let records;
    let input = match mode {
        ScoringMode::Aggregate => {
            units = uli_map_artifacts::read_unit_table(&paths)?;
            ScoringInput::Units(&units)
        }
        ScoringMode::Record => {
            records = uli_map_artifacts::read_merged_records(&paths)?;
            ScoringInput::Records {
                records: &records,
                today: chrono::Local::now().date_naive(),
            }
        }
    };

    let provider = GeoProvider::from_config(&config.geocoder())?;
    let report = RiskEngine::new(&provider).score(input).await?;

    uli_map_artifacts::write_risk_table(&paths, &report.rows)?;
    Ok(report.stats)
}

/// Profile matching the granularity of `rows`.
fn default_profile<'a>(config: &'a Config, rows: &[RiskRow]) -> &'a DeploymentProfile {
    match rows.first().map(RiskRow::mode) {
        Some(ScoringMode::Record) => &config.optimizer.count,
        Some(ScoringMode::Aggregate) | None => &config.optimizer.weighted,
    }
}

/// Clusters the risk table into deployment points.
///
/// `profile` defaults to the weighted profile for aggregate tables and the
/// count-driven profile for record-level tables.
///
/// # Errors
///
/// Returns an error if the risk table is missing, nothing can be
/// clustered, or the snapshot cannot be written.
pub fn optimize(config: &Config, profile: Option<&DeploymentProfile>) -> StageResult<()> {
    let paths = artifact_paths(config);
    let rows = uli_map_artifacts::read_risk_table(&paths)?;

    let profile = profile.unwrap_or_else(|| default_profile(config, &rows));
    let plan = uli_map_optimizer::optimize(&rows, &config.optimizer.options(profile))?;

    if plan.fallback {
        log::warn!("Deployment demand uses uniform weights; see earlier warning");
    }

    uli_map_artifacts::write_snapshot(&paths, &plan.snapshot)?;
    Ok(())
}

/// Ingest, aggregate-mode scoring, and optimization in sequence.
///
/// # Errors
///
/// Returns the first stage error.
#[allow(clippy::future_not_send)]
pub async fn run(config: &Config, multi: &MultiProgress) -> StageResult<()> {
    let start = Instant::now();

    let summary = ingest(config, multi)?;
    if summary.files_read == 0 {
        return Err("no source files could be ingested".into());
    }

    let stats = score(config, ScoringMode::Aggregate).await?;
    log::info!(
        "Risk table: {} postal codes ({} CRITICAL)",
        stats.output_rows,
        stats.critical
    );

    optimize(config, None)?;

    log::info!("Pipeline finished in {:.1}s", start.elapsed().as_secs_f64());
    Ok(())
}

#[cfg(test)]
mod tests {
    use uli_map_risk_models::{RiskCategory, RowDetail};

    use super::*;

    fn record_row() -> RiskRow {
        RiskRow {
            postal_code: "560034".to_string(),
            uli: 1.2,
            risk_category: RiskCategory::Critical,
            latitude: Some(12.9),
            longitude: Some(77.6),
            district: None,
            detail: RowDetail::Record {
                individual_id: "A1".to_string(),
                current_age: 6.0,
                update_gap_days: 2190,
                urgency_factor: 2.0,
            },
        }
    }

    #[test]
    fn profile_follows_table_granularity() {
        let config = Config::parse(include_str!("../config/default.toml")).unwrap();
        assert_eq!(
            default_profile(&config, &[record_row()]),
            &config.optimizer.count
        );
        assert_eq!(default_profile(&config, &[]), &config.optimizer.weighted);
    }
}
