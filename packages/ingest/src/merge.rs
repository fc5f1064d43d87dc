//! Record-level merge of enrolment and update tables.
//!
//! Produces one [`RawRecord`] per enrolment via a left outer join on the
//! individual identifier: enrolments with no matching update keep a null
//! `last_update_date`, and several updates for one individual collapse to
//! the most recent.

use std::collections::BTreeMap;
use std::io::Read;

use chrono::NaiveDate;
use uli_map_ingest_models::RawRecord;

use crate::IngestError;
use crate::parsing::{normalize_postal_code, parse_date};
use crate::schema::SchemaError;

/// One row of an enrolment table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrolmentRecord {
    /// Individual identifier.
    pub individual_id: String,
    /// Date of birth, when parseable.
    pub date_of_birth: Option<NaiveDate>,
    /// Enrolment date, when present and parseable.
    pub enrolment_date: Option<NaiveDate>,
    /// Normalised postal code (empty when blank).
    pub postal_code: String,
}

/// One row of an update table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRecord {
    /// Individual identifier.
    pub individual_id: String,
    /// Update date, when parseable.
    pub update_date: Option<NaiveDate>,
}

fn find_column(headers: &[String], pred: impl Fn(&str) -> bool) -> Option<usize> {
    headers.iter().position(|h| pred(&h.to_lowercase()))
}

fn is_id_column(name: &str) -> bool {
    name == "id" || name.ends_with("_id") || name.contains("uid")
}

fn require(
    idx: Option<usize>,
    role: &'static str,
    headers: &[String],
) -> Result<usize, SchemaError> {
    idx.ok_or_else(|| SchemaError::MissingColumn {
        role,
        headers: headers.join(", "),
    })
}

fn read_headers<R: Read>(reader: &mut csv::Reader<R>) -> Result<Vec<String>, IngestError> {
    Ok(reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect())
}

/// Reads an enrolment table.
///
/// Columns are matched by name: an identifier (`id`, `*_id`, `*uid*`), a
/// date of birth (`*dob*` or `*birth*`), an optional enrolment date
/// (`*enrol*date*`), and a postal code (`*pincode*` or `*postal*`). Rows
/// without an identifier are skipped.
///
/// # Errors
///
/// Returns [`IngestError`] if the CSV is unreadable or a required column is
/// missing.
pub fn read_enrolments<R: Read>(reader: R) -> Result<Vec<EnrolmentRecord>, IngestError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = read_headers(&mut reader)?;

    let id = require(find_column(&headers, is_id_column), "identifier", &headers)?;
    let dob = require(
        find_column(&headers, |h| h.contains("dob") || h.contains("birth")),
        "date-of-birth",
        &headers,
    )?;
    let postal = require(
        find_column(&headers, |h| h.contains("pincode") || h.contains("postal")),
        "postal-code",
        &headers,
    )?;
    let enrolled = find_column(&headers, |h| h.contains("enrol") && h.contains("date"));

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result?;
        let individual_id = row.get(id).unwrap_or("").trim();
        if individual_id.is_empty() {
            continue;
        }
        records.push(EnrolmentRecord {
            individual_id: individual_id.to_string(),
            date_of_birth: row.get(dob).and_then(parse_date),
            enrolment_date: enrolled.and_then(|i| row.get(i)).and_then(parse_date),
            postal_code: row
                .get(postal)
                .and_then(normalize_postal_code)
                .unwrap_or_default(),
        });
    }

    log::info!("Read {} enrolment records", records.len());
    Ok(records)
}

/// Reads an update table.
///
/// Columns are matched by name: an identifier and an update date (a column
/// containing both `update` and `date`, else the first `*date*` column).
///
/// # Errors
///
/// Returns [`IngestError`] if the CSV is unreadable or a required column is
/// missing.
pub fn read_updates<R: Read>(reader: R) -> Result<Vec<UpdateRecord>, IngestError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = read_headers(&mut reader)?;

    let id = require(find_column(&headers, is_id_column), "identifier", &headers)?;
    let date = require(
        find_column(&headers, |h| h.contains("update") && h.contains("date"))
            .or_else(|| find_column(&headers, |h| h.contains("date"))),
        "update-date",
        &headers,
    )?;

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result?;
        let individual_id = row.get(id).unwrap_or("").trim();
        if individual_id.is_empty() {
            continue;
        }
        records.push(UpdateRecord {
            individual_id: individual_id.to_string(),
            update_date: row.get(date).and_then(parse_date),
        });
    }

    log::info!("Read {} update records", records.len());
    Ok(records)
}

/// Left outer join of enrolments to updates on the individual identifier.
///
/// Output preserves enrolment order and contains exactly one record per
/// enrolment.
#[must_use]
pub fn left_join(enrolments: Vec<EnrolmentRecord>, updates: &[UpdateRecord]) -> Vec<RawRecord> {
    let mut latest: BTreeMap<&str, NaiveDate> = BTreeMap::new();
    for update in updates {
        let Some(date) = update.update_date else {
            continue;
        };
        latest
            .entry(update.individual_id.as_str())
            .and_modify(|d| *d = (*d).max(date))
            .or_insert(date);
    }

    let records: Vec<RawRecord> = enrolments
        .into_iter()
        .map(|e| {
            let last_update_date = latest.get(e.individual_id.as_str()).copied();
            RawRecord {
                individual_id: e.individual_id,
                enrolment_date: e.enrolment_date,
                date_of_birth: e.date_of_birth,
                last_update_date,
                postal_code: e.postal_code,
            }
        })
        .collect();

    let matched = records
        .iter()
        .filter(|r| r.last_update_date.is_some())
        .count();
    log::info!(
        "Merged {} enrolments ({matched} with updates, {} without)",
        records.len(),
        records.len() - matched
    );

    records
}
