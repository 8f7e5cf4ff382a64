use std::sync::Arc;

use tracing::{debug, warn};

use crate::approximate::RegionApproximator;
use crate::cache::{CacheEntry, CacheStore};
use crate::fallback::FallbackTable;
use crate::geo::{BoundingBox, LocationKey, Provenance, Resolution};
use crate::resolver::{RateLimitedResolver, ResolverOutcome};

const DEFAULT_REGION: &str = "unknown";

/// Cache → fallback table → live lookup → approximation. Never fails.
pub struct LocationResolver {
    cache: Arc<CacheStore>,
    fallback: FallbackTable,
    live: RateLimitedResolver,
    approximator: RegionApproximator,
    bounds: BoundingBox,
    retry_approximations: bool,
}

impl LocationResolver {
    pub fn new(
        cache: Arc<CacheStore>,
        fallback: FallbackTable,
        live: RateLimitedResolver,
        approximator: RegionApproximator,
        bounds: BoundingBox,
    ) -> Self {
        Self {
            cache,
            fallback,
            live,
            approximator,
            bounds,
            retry_approximations: false,
        }
    }

    /// Treat cached approximations as misses so the live service gets another
    /// chance at them.
    pub fn with_retry_approximations(mut self, retry: bool) -> Self {
        self.retry_approximations = retry;
        self
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub async fn resolve(&self, city: &str, region: &str) -> Resolution {
        let key = LocationKey::new(city, region);
        if !key.is_complete() {
            warn!(city, region, "missing city or region; approximating");
            let region = if key.region().is_empty() {
                DEFAULT_REGION
            } else {
                key.region()
            };
            return self.approximated(region);
        }

        match self.cache.get(&key) {
            Some(CacheEntry::Resolved(coordinate)) => {
                return Resolution::new(coordinate, Provenance::Cache);
            }
            Some(CacheEntry::Approximate(coordinate)) if !self.retry_approximations => {
                return Resolution::new(coordinate, Provenance::Approximate);
            }
            Some(CacheEntry::Unresolvable(Some(coordinate))) => {
                return Resolution::new(coordinate, Provenance::Approximate);
            }
            Some(CacheEntry::Unresolvable(None)) => {
                debug!(key = %key, "remembered failure; approximating");
                return self.remembered_failure(&key);
            }
            Some(CacheEntry::Approximate(_)) | None => {}
        }

        if let Some(coordinate) = self.fallback.lookup(&key) {
            if self.bounds.contains(&coordinate) {
                self.remember(&key, CacheEntry::Resolved(coordinate));
                return Resolution::new(coordinate, Provenance::Fallback);
            }
            warn!(key = %key, "fallback coordinate outside bounds; ignoring");
        }

        let outcome = match self.live.resolve(city, region).await {
            ResolverOutcome::Found(coordinate) if !self.bounds.contains(&coordinate) => {
                warn!(
                    key = %key,
                    lat = coordinate.lat,
                    lon = coordinate.lon,
                    "geocoder result outside bounds; discarding"
                );
                ResolverOutcome::NotFound
            }
            outcome => outcome,
        };

        match outcome {
            ResolverOutcome::Found(coordinate) => {
                self.remember(&key, CacheEntry::Resolved(coordinate));
                Resolution::new(coordinate, Provenance::Live)
            }
            ResolverOutcome::NotFound => self.remembered_failure(&key),
            ResolverOutcome::Unavailable => {
                let resolution = self.approximated(key.region());
                self.remember(&key, CacheEntry::Approximate(resolution.coordinate));
                resolution
            }
        }
    }

    fn approximated(&self, region: &str) -> Resolution {
        Resolution::new(self.approximator.approximate(region), Provenance::Approximate)
    }

    /// Approximates a definitive miss and pins the point to the marker.
    fn remembered_failure(&self, key: &LocationKey) -> Resolution {
        let resolution = self.approximated(key.region());
        self.remember(key, CacheEntry::Unresolvable(Some(resolution.coordinate)));
        resolution
    }

    fn remember(&self, key: &LocationKey, entry: CacheEntry) {
        if let Err(err) = self.cache.put(key, entry) {
            warn!(?err, key = %key, "failed to persist geocode cache entry");
        }
    }
}
