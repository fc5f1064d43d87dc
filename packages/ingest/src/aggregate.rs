//! Per-source partial aggregation and the merge that folds partials together.
//!
//! Each source is reduced independently into an [`Aggregates`] value; the
//! run result is the [`Aggregates::merge`] fold of those partials. Merge is
//! an element-wise sum over ordered maps, so it is commutative and
//! associative and the output ordering never depends on input order.

use std::collections::BTreeMap;
use std::io::Read;

use uli_map_ingest_models::{EventKind, Period, TimeSeriesPoint, UnitAggregate, UnitCounts};

use crate::IngestError;
use crate::parsing::{CountCell, normalize_postal_code, parse_count, parse_date};
use crate::schema::SourceSchema;

/// Partial or complete per-unit and per-period sums.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregates {
    /// Postal code -> totals.
    pub units: BTreeMap<String, UnitCounts>,
    /// Month -> totals.
    pub series: BTreeMap<Period, UnitCounts>,
}

impl Aggregates {
    /// Element-wise sum of two partial aggregates.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        for (code, counts) in other.units {
            let entry = self.units.entry(code).or_default();
            *entry = entry.merge(counts);
        }
        for (period, counts) in other.series {
            let entry = self.series.entry(period).or_default();
            *entry = entry.merge(counts);
        }
        self
    }

    /// The unit table in postal-code order.
    #[must_use]
    pub fn unit_table(&self) -> Vec<UnitAggregate> {
        self.units
            .iter()
            .map(|(code, counts)| UnitAggregate::new(code.clone(), *counts))
            .collect()
    }

    /// The time series in chronological order.
    #[must_use]
    pub fn time_series(&self) -> Vec<TimeSeriesPoint> {
        self.series
            .iter()
            .map(|(period, counts)| TimeSeriesPoint {
                period: *period,
                enrolment_count: counts.enrolment_count,
                update_count: counts.update_count,
            })
            .collect()
    }

    /// Sum of all per-unit totals.
    #[must_use]
    pub fn unit_totals(&self) -> UnitCounts {
        self.units
            .values()
            .fold(UnitCounts::default(), |acc, c| acc.merge(*c))
    }
}

/// Row-level bookkeeping for a single source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    /// Data rows read.
    pub rows: u64,
    /// Count cells that contributed zero because they were unusable.
    pub malformed_cells: u64,
    /// Rows with a date column whose date could not be parsed.
    pub undated_rows: u64,
    /// Rows with a postal-code column whose code was blank.
    pub unkeyed_rows: u64,
}

/// Reduces one CSV source into a partial aggregate.
///
/// Every count column of a row is summed to a single row total which is
/// then credited to the row's postal code (when the schema has one) and to
/// the row's month (when the schema has a date column and the date parses).
///
/// # Errors
///
/// Returns [`IngestError`] if the CSV is unreadable or its headers do not
/// describe a count extract.
pub fn aggregate_source<R: Read>(
    reader: R,
    kind: EventKind,
) -> Result<(Aggregates, SourceStats), IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let schema = SourceSchema::discover(reader.headers()?.iter())?;

    let mut aggregates = Aggregates::default();
    let mut stats = SourceStats::default();

    for result in reader.records() {
        let record = result?;
        stats.rows += 1;

        let mut total: u64 = 0;
        for &idx in &schema.counts {
            match parse_count(record.get(idx).unwrap_or("")) {
                CountCell::Value(n) => total = total.saturating_add(n),
                CountCell::Malformed => stats.malformed_cells += 1,
            }
        }
        let counts = UnitCounts::of(kind, total);

        if let Some(idx) = schema.postal_code {
            match normalize_postal_code(record.get(idx).unwrap_or("")) {
                Some(code) => {
                    let entry = aggregates.units.entry(code).or_default();
                    *entry = entry.merge(counts);
                }
                None => stats.unkeyed_rows += 1,
            }
        }

        if let Some(idx) = schema.date {
            match parse_date(record.get(idx).unwrap_or("")) {
                Some(date) => {
                    let entry = aggregates.series.entry(Period::of(date)).or_default();
                    *entry = entry.merge(counts);
                }
                None => stats.undated_rows += 1,
            }
        }
    }

    Ok((aggregates, stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENROLMENT_A: &str = "\
date,state,district,pincode,age_0_5,age_5_17,age_18_greater
01-03-2025,Delhi,New Delhi,110001,10,5,1
15-03-2025,Delhi,New Delhi,110001,2,0,0
02-04-2025,Delhi,Central,110002,7,,3
";

    const BIOMETRIC_B: &str = "\
Date,State,District,Pincode,bio_age_5_17,bio_age_17_
03-03-2025,Delhi,New Delhi,110001.0,4,6
09-04-2025,Delhi,Central,110002,1,1
";

    fn run(src: &str, kind: EventKind) -> Aggregates {
        aggregate_source(src.as_bytes(), kind).unwrap().0
    }

    #[test]
    fn sums_count_columns_per_postal_code() {
        let agg = run(ENROLMENT_A, EventKind::Enrolment);
        assert_eq!(agg.units["110001"].enrolment_count, 18);
        assert_eq!(agg.units["110002"].enrolment_count, 10);
        assert_eq!(agg.units["110002"].update_count, 0);
    }

    #[test]
    fn buckets_time_series_by_month() {
        let agg = run(ENROLMENT_A, EventKind::Enrolment);
        let series = agg.time_series();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].period.to_string(), "2025-03");
        assert_eq!(series[0].enrolment_count, 18);
        assert_eq!(series[1].period.to_string(), "2025-04");
        assert_eq!(series[1].enrolment_count, 10);
    }

    #[test]
    fn update_sources_credit_update_counts() {
        let agg = run(BIOMETRIC_B, EventKind::Update);
        assert_eq!(agg.units["110001"].update_count, 10);
        assert_eq!(agg.units["110001"].enrolment_count, 0);
    }

    #[test]
    fn merging_partials_equals_single_pass() {
        let a = run(ENROLMENT_A, EventKind::Enrolment);
        let b = run(BIOMETRIC_B, EventKind::Update);

        let ab = a.clone().merge(b.clone());
        let ba = b.clone().merge(a.clone());
        assert_eq!(ab, ba);

        let combined = Aggregates::default().merge(a.clone()).merge(b.clone());
        for (code, counts) in &combined.units {
            let left = a.units.get(code).copied().unwrap_or_default();
            let right = b.units.get(code).copied().unwrap_or_default();
            assert_eq!(*counts, left.merge(right));
        }
        assert_eq!(combined.unit_table(), ab.unit_table());
    }

    #[test]
    fn source_without_date_still_feeds_unit_table() {
        let src = "pincode,count\n400001,9\n";
        let (agg, stats) = aggregate_source(src.as_bytes(), EventKind::Enrolment).unwrap();
        assert!(agg.series.is_empty());
        assert_eq!(agg.units["400001"].enrolment_count, 9);
        assert_eq!(stats.rows, 1);
    }

    #[test]
    fn columns_named_update_are_summed() {
        let agg = run("date,pincode,update_count\n01-01-2025,110001,7\n", EventKind::Update);
        assert_eq!(agg.units["110001"].update_count, 7);
        assert_eq!(agg.time_series()[0].update_count, 7);

        let src = "pincode,enrolment_count,update_count\n110001,1000,200\n";
        let (agg, stats) = aggregate_source(src.as_bytes(), EventKind::Enrolment).unwrap();
        assert_eq!(agg.units["110001"].enrolment_count, 1200);
        assert_eq!(stats.undated_rows, 0);
    }

    #[test]
    fn source_without_pincode_still_feeds_time_series() {
        let src = "date,age_0_5\n2025-01-10,3\n2025-01-11,4\n";
        let agg = run(src, EventKind::Update);
        assert!(agg.units.is_empty());
        assert_eq!(agg.series.values().next().unwrap().update_count, 7);
    }

    #[test]
    fn malformed_cells_and_dates_are_tallied() {
        let src = "date,pincode,age_0_5\nnot-a-date,500001,abc\n01-01-2025,,2\n";
        let (agg, stats) = aggregate_source(src.as_bytes(), EventKind::Enrolment).unwrap();
        assert_eq!(stats.malformed_cells, 1);
        assert_eq!(stats.undated_rows, 1);
        assert_eq!(stats.unkeyed_rows, 1);
        assert_eq!(agg.units["500001"].enrolment_count, 0);
    }

    #[test]
    fn rejects_unrecognised_source() {
        let src = "name,value\nfoo,1\n";
        let err = aggregate_source(src.as_bytes(), EventKind::Enrolment).unwrap_err();
        assert!(matches!(err, IngestError::Schema(_)));
    }
}
