//! Run-scoped geocoding cache.
//!
//! Records both hits and misses so a code is queried at most once per run.
//! A cache is owned by one pipeline run and dropped with it; nothing is
//! persisted.

use std::collections::{BTreeMap, BTreeSet};

use crate::{GeoLookup, GeoResult, GeocodeError};

/// Postal code -> lookup outcome (`None` = tried, unresolved).
#[derive(Debug, Clone, Default)]
pub struct GeoCache {
    entries: BTreeMap<String, Option<GeoResult>>,
}

impl GeoCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves every code not yet in the cache with a single batched call.
    ///
    /// Codes the provider does not return, or returns without coordinates,
    /// are cached as unresolved. Returns the number of codes that were sent
    /// to the provider.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the provider fails the whole batch. The
    /// cache is left unchanged in that case.
    pub async fn resolve_missing<L: GeoLookup>(
        &mut self,
        lookup: &L,
        codes: &BTreeSet<String>,
    ) -> Result<usize, GeocodeError> {
        let missing: BTreeSet<String> = codes
            .iter()
            .filter(|code| !self.entries.contains_key(*code))
            .cloned()
            .collect();

        if missing.is_empty() {
            return Ok(0);
        }

        log::info!(
            "Geocoding {} postal codes via {}",
            missing.len(),
            lookup.name()
        );
        let mut resolved = lookup.resolve(&missing).await?;

        for code in &missing {
            let result = resolved
                .remove(code)
                .filter(|r| r.coordinates().is_some());
            if result.is_none() {
                log::warn!("Postal code {code} did not resolve to coordinates");
            }
            self.entries.insert(code.clone(), result);
        }

        Ok(missing.len())
    }

    /// Returns the cached result for a resolved code.
    #[must_use]
    pub fn get(&self, code: &str) -> Option<&GeoResult> {
        self.entries.get(code).and_then(Option::as_ref)
    }

    /// Codes that were tried and did not resolve.
    #[must_use]
    pub fn unresolved(&self) -> BTreeSet<&str> {
        self.entries
            .iter()
            .filter(|(_, r)| r.is_none())
            .map(|(code, _)| code.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLookup {
        calls: AtomicUsize,
        codes_seen: AtomicUsize,
    }

    impl GeoLookup for CountingLookup {
        async fn resolve(
            &self,
            codes: &BTreeSet<String>,
        ) -> Result<BTreeMap<String, GeoResult>, GeocodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.codes_seen.fetch_add(codes.len(), Ordering::SeqCst);
            Ok(codes
                .iter()
                .filter(|c| c.starts_with('1'))
                .map(|c| {
                    (
                        c.clone(),
                        GeoResult {
                            latitude: Some(28.6),
                            longitude: Some(77.2),
                            district: Some("New Delhi".to_string()),
                        },
                    )
                })
                .collect())
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn codes(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn queries_each_code_once() {
        let lookup = CountingLookup {
            calls: AtomicUsize::new(0),
            codes_seen: AtomicUsize::new(0),
        };
        let mut cache = GeoCache::new();

        let sent = cache
            .resolve_missing(&lookup, &codes(&["110001", "999999"]))
            .await
            .unwrap();
        assert_eq!(sent, 2);

        let sent = cache
            .resolve_missing(&lookup, &codes(&["110001", "999999", "110002"]))
            .await
            .unwrap();
        assert_eq!(sent, 1);

        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);
        assert_eq!(lookup.codes_seen.load(Ordering::SeqCst), 3);
        assert!(cache.get("110002").is_some());
        assert!(cache.get("999999").is_none());
        assert_eq!(cache.unresolved(), ["999999"].into_iter().collect());
    }

    #[tokio::test]
    async fn fully_cached_batch_skips_provider() {
        let lookup = CountingLookup {
            calls: AtomicUsize::new(0),
            codes_seen: AtomicUsize::new(0),
        };
        let mut cache = GeoCache::new();
        cache
            .resolve_missing(&lookup, &codes(&["110001"]))
            .await
            .unwrap();
        cache
            .resolve_missing(&lookup, &codes(&["110001"]))
            .await
            .unwrap();
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }
}
