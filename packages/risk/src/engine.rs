//! Scoring run: formula, then one batched geocode, then fan-out.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use uli_map_geocoder::{GeoCache, GeoLookup};
use uli_map_ingest_models::{RawRecord, UnitAggregate};
use uli_map_risk_models::{RiskRow, RowDetail, ScoringMode, ScoringStats};

use crate::{RiskError, aggregate, record};

/// Rows to score, tagged by granularity.
#[derive(Debug, Clone, Copy)]
pub enum ScoringInput<'a> {
    /// Per-individual records scored as of `today`.
    Records {
        /// Merged record table.
        records: &'a [RawRecord],
        /// Reference date for ages and gaps.
        today: NaiveDate,
    },
    /// Per-postal-code aggregates.
    Units(&'a [UnitAggregate]),
}

impl ScoringInput<'_> {
    /// The scoring mode this input selects.
    #[must_use]
    pub const fn mode(&self) -> ScoringMode {
        match self {
            Self::Records { .. } => ScoringMode::Record,
            Self::Units(_) => ScoringMode::Aggregate,
        }
    }
}

/// The emitted risk table and its bookkeeping.
#[derive(Debug, Clone)]
pub struct RiskReport {
    /// Scored, geocoded rows.
    pub rows: Vec<RiskRow>,
    /// Run statistics.
    pub stats: ScoringStats,
}

/// Scores rows and attaches geocoded centroids.
///
/// Holds a [`GeoCache`] for the lifetime of the engine, so reusing one
/// engine across several scoring calls in the same run never re-queries a
/// postal code.
pub struct RiskEngine<'a, L: GeoLookup> {
    lookup: &'a L,
    cache: GeoCache,
}

impl<'a, L: GeoLookup> RiskEngine<'a, L> {
    /// Creates an engine with an empty cache.
    #[must_use]
    pub fn new(lookup: &'a L) -> Self {
        Self {
            lookup,
            cache: GeoCache::new(),
        }
    }

    /// Scores `input` with the formula for its mode.
    ///
    /// # Errors
    ///
    /// Returns [`RiskError`] if the geocoding provider fails the batch.
    pub async fn score(&mut self, input: ScoringInput<'_>) -> Result<RiskReport, RiskError> {
        match input {
            ScoringInput::Records { records, today } => self.score_records(records, today).await,
            ScoringInput::Units(units) => self.score_units(units).await,
        }
    }

    /// Aggregate mode. Units with zero enrolments and units whose postal
    /// code does not geocode are left out of the report.
    ///
    /// # Errors
    ///
    /// Returns [`RiskError`] if the geocoding provider fails the batch.
    pub async fn score_units(&mut self, units: &[UnitAggregate]) -> Result<RiskReport, RiskError> {
        let mut stats = ScoringStats::new(ScoringMode::Aggregate);
        stats.input_rows = units.len() as u64;

        let mut scored = Vec::with_capacity(units.len());
        for unit in units {
            let Some((uli, risk_category)) =
                aggregate::score(unit.enrolment_count, unit.update_count)
            else {
                stats.dropped_zero_enrolment += 1;
                continue;
            };
            scored.push(RiskRow {
                postal_code: unit.postal_code.clone(),
                uli,
                risk_category,
                latitude: None,
                longitude: None,
                district: None,
                detail: RowDetail::Unit {
                    enrolment_count: unit.enrolment_count,
                    update_count: unit.update_count,
                },
            });
        }
        stats.scored_rows = scored.len() as u64;

        if stats.dropped_zero_enrolment > 0 {
            log::warn!(
                "Dropped {} postal codes with zero enrolments",
                stats.dropped_zero_enrolment
            );
        }

        self.geocode(&scored, &mut stats).await?;

        let mut rows = Vec::with_capacity(scored.len());
        for mut row in scored {
            if self.attach_geo(&mut row) {
                stats.count_tier(row.risk_category);
                rows.push(row);
            } else {
                stats.ungeocoded_rows += 1;
            }
        }

        if stats.ungeocoded_rows > 0 {
            log::warn!(
                "Dropped {} postal codes that could not be geocoded",
                stats.ungeocoded_rows
            );
        }
        log_summary(&stats);

        Ok(RiskReport { rows, stats })
    }

    /// Record-level mode. Records without a usable date of birth are
    /// dropped; records whose postal code does not geocode are kept with
    /// null coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`RiskError`] if the geocoding provider fails the batch.
    pub async fn score_records(
        &mut self,
        records: &[RawRecord],
        today: NaiveDate,
    ) -> Result<RiskReport, RiskError> {
        let mut stats = ScoringStats::new(ScoringMode::Record);
        stats.input_rows = records.len() as u64;

        let mut rows = Vec::with_capacity(records.len());
        for raw in records {
            let Some(score) = raw
                .date_of_birth
                .and_then(|dob| record::score(dob, raw.last_update_date, today))
            else {
                stats.dropped_missing_dob += 1;
                continue;
            };
            rows.push(RiskRow {
                postal_code: raw.postal_code.clone(),
                uli: score.uli,
                risk_category: score.risk_category,
                latitude: None,
                longitude: None,
                district: None,
                detail: RowDetail::Record {
                    individual_id: raw.individual_id.clone(),
                    current_age: score.current_age,
                    update_gap_days: score.update_gap_days,
                    urgency_factor: score.urgency_factor,
                },
            });
        }
        stats.scored_rows = rows.len() as u64;

        if stats.dropped_missing_dob > 0 {
            log::warn!(
                "Dropped {} records without a usable date of birth",
                stats.dropped_missing_dob
            );
        }

        self.geocode(&rows, &mut stats).await?;

        for row in &mut rows {
            if !self.attach_geo(row) {
                stats.ungeocoded_rows += 1;
            }
            stats.count_tier(row.risk_category);
        }

        if stats.ungeocoded_rows > 0 {
            log::warn!(
                "{} records kept without coordinates (excluded from clustering)",
                stats.ungeocoded_rows
            );
        }
        log_summary(&stats);

        Ok(RiskReport { rows, stats })
    }

    async fn geocode(
        &mut self,
        rows: &[RiskRow],
        stats: &mut ScoringStats,
    ) -> Result<(), RiskError> {
        let codes: BTreeSet<String> = rows
            .iter()
            .filter(|r| !r.postal_code.is_empty())
            .map(|r| r.postal_code.clone())
            .collect();

        self.cache.resolve_missing(self.lookup, &codes).await?;

        stats.distinct_postal_codes = codes.len() as u64;
        stats.unresolved_postal_codes = codes
            .iter()
            .filter(|code| self.cache.get(code).is_none())
            .count() as u64;

        Ok(())
    }

    fn attach_geo(&self, row: &mut RiskRow) -> bool {
        let Some(geo) = self.cache.get(&row.postal_code) else {
            return false;
        };
        let Some((lat, lng)) = geo.coordinates() else {
            return false;
        };
        row.latitude = Some(lat);
        row.longitude = Some(lng);
        row.district.clone_from(&geo.district);
        true
    }
}

fn log_summary(stats: &ScoringStats) {
    log::info!(
        "Scored {} of {} {} rows: {} emitted ({} CRITICAL, {} WARNING, {} SAFE), {}/{} postal codes unresolved",
        stats.scored_rows,
        stats.input_rows,
        stats.mode,
        stats.output_rows,
        stats.critical,
        stats.warning,
        stats.safe,
        stats.unresolved_postal_codes,
        stats.distinct_postal_codes
    );
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use uli_map_geocoder::{GeoResult, GeocodeError};
    use uli_map_risk_models::RiskCategory;

    use super::*;

    struct StubLookup {
        known: BTreeMap<String, GeoResult>,
        calls: AtomicUsize,
    }

    impl StubLookup {
        fn new(entries: &[(&str, f64, f64, &str)]) -> Self {
            Self {
                known: entries
                    .iter()
                    .map(|(code, lat, lng, district)| {
                        (
                            (*code).to_string(),
                            GeoResult {
                                latitude: Some(*lat),
                                longitude: Some(*lng),
                                district: Some((*district).to_string()),
                            },
                        )
                    })
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl GeoLookup for StubLookup {
        async fn resolve(
            &self,
            codes: &BTreeSet<String>,
        ) -> Result<BTreeMap<String, GeoResult>, GeocodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(codes
                .iter()
                .filter_map(|c| self.known.get(c).map(|g| (c.clone(), g.clone())))
                .collect())
        }

        fn name(&self) -> &'static str {
            "stub"
        }
    }

    fn unit(code: &str, enrolment_count: u64, update_count: u64) -> UnitAggregate {
        UnitAggregate {
            postal_code: code.to_string(),
            enrolment_count,
            update_count,
        }
    }

    #[tokio::test]
    async fn scores_and_geocodes_units() {
        let lookup = StubLookup::new(&[
            ("110001", 28.63, 77.22, "New Delhi"),
            ("110002", 28.64, 77.24, "Central Delhi"),
        ]);
        let mut engine = RiskEngine::new(&lookup);

        let report = engine
            .score(ScoringInput::Units(&[
                unit("110001", 1000, 200),
                unit("110002", 1000, 700),
            ]))
            .await
            .unwrap();

        assert_eq!(report.rows.len(), 2);
        let first = &report.rows[0];
        assert!((first.uli - 0.8).abs() < f64::EPSILON);
        assert_eq!(first.risk_category, RiskCategory::Critical);
        assert_eq!(first.district.as_deref(), Some("New Delhi"));
        assert_eq!(first.coordinates(), Some((28.63, 77.22)));
        assert_eq!(report.rows[1].risk_category, RiskCategory::Safe);
        assert_eq!(report.stats.critical, 1);
        assert_eq!(report.stats.safe, 1);
    }

    #[tokio::test]
    async fn unresolved_unit_is_dropped_but_counted() {
        let lookup = StubLookup::new(&[("110001", 28.63, 77.22, "New Delhi")]);
        let mut engine = RiskEngine::new(&lookup);

        let report = engine
            .score_units(&[
                unit("110001", 1000, 200),
                unit("999999", 500, 0),
                unit("110003", 0, 40),
            ])
            .await
            .unwrap();

        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].postal_code, "110001");
        assert_eq!(report.stats.input_rows, 3);
        assert_eq!(report.stats.dropped_zero_enrolment, 1);
        assert_eq!(report.stats.scored_rows, 2);
        assert_eq!(report.stats.unresolved_postal_codes, 1);
        assert_eq!(report.stats.ungeocoded_rows, 1);
        assert_eq!(report.stats.output_rows, 1);
        assert!(report.rows.iter().all(|r| (0.0..=1.0).contains(&r.uli)));
    }

    #[tokio::test]
    async fn records_keep_unresolved_rows_and_share_lookups() {
        let lookup = StubLookup::new(&[("560034", 12.93, 77.62, "Bangalore")]);
        let mut engine = RiskEngine::new(&lookup);
        let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let dob = today - chrono::Duration::days(365 * 6);

        let records: Vec<RawRecord> = [
            ("A1", Some(dob), "560034"),
            ("A2", Some(dob), "560034"),
            ("A3", Some(dob), "000000"),
            ("A4", None, "560034"),
        ]
        .into_iter()
        .map(|(id, dob, code)| RawRecord {
            individual_id: id.to_string(),
            enrolment_date: None,
            date_of_birth: dob,
            last_update_date: None,
            postal_code: code.to_string(),
        })
        .collect();

        let report = engine
            .score(ScoringInput::Records {
                records: &records,
                today,
            })
            .await
            .unwrap();

        assert_eq!(report.rows.len(), 3);
        assert_eq!(report.stats.dropped_missing_dob, 1);
        assert_eq!(report.stats.distinct_postal_codes, 2);
        assert_eq!(report.stats.ungeocoded_rows, 1);
        assert!(report.rows[2].coordinates().is_none());
        assert!(report.rows[0].uli > 1.0);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);

        // A second pass in the same run is served from the cache.
        engine.score_records(&records, today).await.unwrap();
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }
}
