//! Runtime column-role discovery for raw count extracts.
//!
//! Extract files from different releases name their columns differently
//! (`Pincode`, `pincode`, `age_0_5`, `bio_age_5_17`, `demo_age_17_`, ...),
//! so nothing downstream assumes fixed positions. [`SourceSchema::discover`]
//! maps each semantic role to the header index that carries it.

use thiserror::Error;

/// Semantic role of a column in a raw count extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    /// Event date bucket.
    Date,
    /// Postal code (geographic unit key).
    PostalCode,
    /// Administrative state name; never summed.
    State,
    /// Administrative district name; never summed.
    District,
    /// An age-bracket or total count to be summed.
    Count,
    /// Anything else; ignored.
    Ignored,
}

impl ColumnRole {
    /// Classifies a header by case-insensitive match.
    ///
    /// Count patterns are checked before the date role, and `date` must be
    /// a whole `_`/space-delimited token, so `update_count` is a count.
    #[must_use]
    pub fn classify(header: &str) -> Self {
        let name = header.trim().to_lowercase();

        if name.contains("pincode") || name.contains("postal") {
            Self::PostalCode
        } else if name == "state" {
            Self::State
        } else if name == "district" {
            Self::District
        } else if name.contains("count") || name.contains("age") {
            Self::Count
        } else if name
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|token| token == "date")
        {
            Self::Date
        } else {
            Self::Ignored
        }
    }
}

/// A source was not recognisable as a count extract.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// Neither a date nor a postal-code column is present.
    #[error("no date or postal-code column among headers [{headers}]")]
    NoKeyColumn {
        /// Comma-joined header names, for diagnostics.
        headers: String,
    },

    /// No column looks like a count.
    #[error("no count columns among headers [{headers}]")]
    NoCountColumns {
        /// Comma-joined header names, for diagnostics.
        headers: String,
    },

    /// A record-level table lacks a column it cannot be joined without.
    #[error("no {role} column among headers [{headers}]")]
    MissingColumn {
        /// The role that could not be matched.
        role: &'static str,
        /// Comma-joined header names, for diagnostics.
        headers: String,
    },
}

/// Role-to-index mapping discovered from a header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSchema {
    /// Index of the date column, if any. Sources without one are skipped for
    /// the time-series aggregate.
    pub date: Option<usize>,
    /// Index of the postal-code column, if any. Sources without one are
    /// skipped for the unit aggregate.
    pub postal_code: Option<usize>,
    /// Indices of all count columns, in header order.
    pub counts: Vec<usize>,
}

impl SourceSchema {
    /// Discovers column roles from a header row.
    ///
    /// The first matching column wins for the date and postal-code roles.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] if no key column or no count column exists.
    pub fn discover<'a, I>(headers: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let headers: Vec<&str> = headers.into_iter().collect();
        let mut date = None;
        let mut postal_code = None;
        let mut counts = Vec::new();

        for (idx, header) in headers.iter().enumerate() {
            match ColumnRole::classify(header) {
                ColumnRole::Date => {
                    date.get_or_insert(idx);
                }
                ColumnRole::PostalCode => {
                    postal_code.get_or_insert(idx);
                }
                ColumnRole::Count => counts.push(idx),
                ColumnRole::State | ColumnRole::District | ColumnRole::Ignored => {}
            }
        }

        if date.is_none() && postal_code.is_none() {
            return Err(SchemaError::NoKeyColumn {
                headers: headers.join(", "),
            });
        }
        if counts.is_empty() {
            return Err(SchemaError::NoCountColumns {
                headers: headers.join(", "),
            });
        }

        Ok(Self {
            date,
            postal_code,
            counts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovers_enrolment_extract_columns() {
        let schema = SourceSchema::discover([
            "date",
            "state",
            "district",
            "pincode",
            "age_0_5",
            "age_5_17",
            "age_18_greater",
        ])
        .unwrap();
        assert_eq!(schema.date, Some(0));
        assert_eq!(schema.postal_code, Some(3));
        assert_eq!(schema.counts, vec![4, 5, 6]);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let schema =
            SourceSchema::discover(["Pincode", "Bio_Age_5_17", "Total_Count", "Remarks"]).unwrap();
        assert_eq!(schema.date, None);
        assert_eq!(schema.postal_code, Some(0));
        assert_eq!(schema.counts, vec![1, 2]);
    }

    #[test]
    fn state_and_district_are_never_counts() {
        assert_eq!(ColumnRole::classify(" State "), ColumnRole::State);
        assert_eq!(ColumnRole::classify("DISTRICT"), ColumnRole::District);
        assert_eq!(ColumnRole::classify("demo_age_17_"), ColumnRole::Count);
        assert_eq!(ColumnRole::classify("Postal_Code"), ColumnRole::PostalCode);
    }

    #[test]
    fn update_count_is_a_count_not_a_date() {
        assert_eq!(ColumnRole::classify("update_count"), ColumnRole::Count);
        assert_eq!(ColumnRole::classify("Update Date"), ColumnRole::Date);
        assert_eq!(ColumnRole::classify("updated"), ColumnRole::Ignored);

        let schema = SourceSchema::discover(["date", "pincode", "update_count"]).unwrap();
        assert_eq!(schema.date, Some(0));
        assert_eq!(schema.counts, vec![2]);
    }

    #[test]
    fn rejects_source_without_keys() {
        let err = SourceSchema::discover(["state", "age_0_5"]).unwrap_err();
        assert!(matches!(err, SchemaError::NoKeyColumn { .. }));
    }

    #[test]
    fn rejects_source_without_counts() {
        let err = SourceSchema::discover(["date", "pincode", "state"]).unwrap_err();
        assert!(matches!(err, SchemaError::NoCountColumns { .. }));
    }
}
