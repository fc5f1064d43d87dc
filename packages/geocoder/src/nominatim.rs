//! Nominatim / OpenStreetMap postal-code lookup.
//!
//! Uses the structured search endpoint with `postalcode` and
//! `countrycodes`. The public instance allows **1 request per second**, so
//! requests are spaced by the configured rate limit.
//!
//! See <https://nominatim.org/release-docs/develop/api/Search/>

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crate::{GeoLookup, GeoResult, GeocodeError};

/// Rate-limited Nominatim client.
pub struct NominatimLookup {
    client: reqwest::Client,
    base_url: String,
    country_code: String,
    rate_limit: Duration,
}

impl NominatimLookup {
    /// Creates a client for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        country_code: &str,
        rate_limit: Duration,
    ) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("uli_map/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            country_code: country_code.to_string(),
            rate_limit,
        })
    }
}

/// Geocodes a single postal code.
///
/// The caller is responsible for rate limiting.
///
/// # Errors
///
/// Returns [`GeocodeError`] if the HTTP request or response parsing fails.
pub async fn geocode_postal_code(
    client: &reqwest::Client,
    base_url: &str,
    postal_code: &str,
    country_code: &str,
) -> Result<Option<GeoResult>, GeocodeError> {
    let resp = client
        .get(base_url)
        .query(&[
            ("postalcode", postal_code),
            ("countrycodes", country_code),
            ("format", "jsonv2"),
            ("addressdetails", "1"),
            ("limit", "1"),
        ])
        .send()
        .await?;

    if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(GeocodeError::RateLimited);
    }

    let body: serde_json::Value = resp.error_for_status()?.json().await?;
    parse_response(&body)
}

/// Parses Nominatim JSON response.
fn parse_response(body: &serde_json::Value) -> Result<Option<GeoResult>, GeocodeError> {
    let results = body.as_array().ok_or_else(|| GeocodeError::Parse {
        message: "Nominatim response is not an array".to_string(),
    })?;

    let Some(first) = results.first() else {
        return Ok(None);
    };

    let lat = first["lat"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| GeocodeError::Parse {
            message: "Missing lat in Nominatim response".to_string(),
        })?;

    let lon = first["lon"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| GeocodeError::Parse {
            message: "Missing lon in Nominatim response".to_string(),
        })?;

    let address = &first["address"];
    let district = ["state_district", "county", "city"]
        .iter()
        .find_map(|key| address[*key].as_str())
        .map(String::from);

    Ok(Some(GeoResult {
        latitude: Some(lat),
        longitude: Some(lon),
        district,
    }))
}

impl GeoLookup for NominatimLookup {
    async fn resolve(
        &self,
        codes: &BTreeSet<String>,
    ) -> Result<BTreeMap<String, GeoResult>, GeocodeError> {
        let mut resolved = BTreeMap::new();

        for (i, code) in codes.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.rate_limit).await;
            }

            match geocode_postal_code(&self.client, &self.base_url, code, &self.country_code).await
            {
                Ok(Some(result)) => {
                    resolved.insert(code.clone(), result);
                }
                Ok(None) => log::debug!("Nominatim: no match for {code}"),
                Err(GeocodeError::RateLimited) => {
                    log::warn!("Nominatim rate limited after {i} of {} codes", codes.len());
                    return Err(GeocodeError::RateLimited);
                }
                Err(e) => log::warn!("Nominatim lookup failed for {code}: {e}"),
            }
        }

        Ok(resolved)
    }

    fn name(&self) -> &'static str {
        "nominatim"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nominatim_result_with_district() {
        let body = serde_json::json!([{
            "lat": "28.6328",
            "lon": "77.2197",
            "display_name": "Connaught Place, New Delhi, Delhi, 110001, India",
            "address": {
                "state_district": "New Delhi",
                "state": "Delhi",
                "postcode": "110001"
            }
        }]);
        let result = parse_response(&body).unwrap().unwrap();
        let (lat, lng) = result.coordinates().unwrap();
        assert!((lat - 28.6328).abs() < 1e-4);
        assert!((lng - 77.2197).abs() < 1e-4);
        assert_eq!(result.district.as_deref(), Some("New Delhi"));
    }

    #[test]
    fn falls_back_to_county_for_district() {
        let body = serde_json::json!([{
            "lat": "12.93",
            "lon": "77.62",
            "address": { "county": "Bangalore South" }
        }]);
        let result = parse_response(&body).unwrap().unwrap();
        assert_eq!(result.district.as_deref(), Some("Bangalore South"));
    }

    #[test]
    fn parses_nominatim_empty() {
        let body = serde_json::json!([]);
        assert!(parse_response(&body).unwrap().is_none());
    }

    #[test]
    fn rejects_non_array_body() {
        let body = serde_json::json!({ "error": "bad request" });
        assert!(parse_response(&body).is_err());
    }
}
