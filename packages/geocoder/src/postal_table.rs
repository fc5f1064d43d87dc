//! Offline lookup against a GeoNames postal-code dump.
//!
//! The dump is tab-separated with no header row:
//!
//! ```text
//! country  postal  place  state  state_code  district  district_code
//!     community  community_code  lat  lng  accuracy
//! ```
//!
//! One postal code usually covers several places (post offices). Their
//! coordinates are averaged into a single centroid and the first non-empty
//! district is kept.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;

use crate::{GeoLookup, GeoResult, GeocodeError};

const COL_COUNTRY: usize = 0;
const COL_POSTAL: usize = 1;
const COL_DISTRICT: usize = 5;
const COL_LAT: usize = 9;
const COL_LNG: usize = 10;

#[derive(Debug, Default)]
struct Accumulator {
    lat_sum: f64,
    lng_sum: f64,
    points: u32,
    district: Option<String>,
}

impl Accumulator {
    fn finish(self) -> GeoResult {
        let (latitude, longitude) = if self.points > 0 {
            let n = f64::from(self.points);
            (Some(self.lat_sum / n), Some(self.lng_sum / n))
        } else {
            (None, None)
        };
        GeoResult {
            latitude,
            longitude,
            district: self.district,
        }
    }
}

/// In-memory postal-code index built from a GeoNames dump.
#[derive(Debug, Clone, Default)]
pub struct PostalTable {
    entries: BTreeMap<String, GeoResult>,
}

impl PostalTable {
    /// Loads a dump from disk.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the file cannot be opened or parsed.
    pub fn open(path: &Path, country_code: Option<&str>) -> Result<Self, GeocodeError> {
        let file = std::fs::File::open(path)?;
        let table = Self::from_reader(std::io::BufReader::new(file), country_code)?;
        log::info!(
            "Loaded {} postal codes from {}",
            table.len(),
            path.display()
        );
        Ok(table)
    }

    /// Parses a dump, keeping only rows for `country_code` when given.
    ///
    /// Rows with unparseable coordinates still contribute a district.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Csv`] if the stream is not valid
    /// tab-separated text.
    pub fn from_reader<R: Read>(
        reader: R,
        country_code: Option<&str>,
    ) -> Result<Self, GeocodeError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .from_reader(reader);

        let mut acc: BTreeMap<String, Accumulator> = BTreeMap::new();

        for result in reader.records() {
            let row = result?;

            if let Some(country) = country_code
                && !row
                    .get(COL_COUNTRY)
                    .is_some_and(|c| c.trim().eq_ignore_ascii_case(country))
            {
                continue;
            }

            let Some(code) = row.get(COL_POSTAL).map(str::trim).filter(|c| !c.is_empty()) else {
                continue;
            };

            let entry = acc.entry(code.to_string()).or_default();

            let lat = row.get(COL_LAT).and_then(|s| s.trim().parse::<f64>().ok());
            let lng = row.get(COL_LNG).and_then(|s| s.trim().parse::<f64>().ok());
            if let (Some(lat), Some(lng)) = (lat, lng) {
                entry.lat_sum += lat;
                entry.lng_sum += lng;
                entry.points += 1;
            }

            if entry.district.is_none() {
                entry.district = row
                    .get(COL_DISTRICT)
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .map(String::from);
            }
        }

        Ok(Self {
            entries: acc
                .into_iter()
                .map(|(code, acc)| (code, acc.finish()))
                .collect(),
        })
    }

    /// Number of distinct postal codes indexed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table indexes no codes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up a single code.
    #[must_use]
    pub fn get(&self, code: &str) -> Option<&GeoResult> {
        self.entries.get(code)
    }
}

impl GeoLookup for PostalTable {
    async fn resolve(
        &self,
        codes: &BTreeSet<String>,
    ) -> Result<BTreeMap<String, GeoResult>, GeocodeError> {
        Ok(codes
            .iter()
            .filter_map(|code| self.get(code).map(|r| (code.clone(), r.clone())))
            .collect())
    }

    fn name(&self) -> &'static str {
        "postal_table"
    }
}
