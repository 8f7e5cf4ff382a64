use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

use crate::approximate::RegionApproximator;
use crate::cache::{CacheStats, CacheStore};
use crate::config::AppConfig;
use crate::errors::AppResult;
use crate::fallback::FallbackTable;
use crate::features::{Feature, FeatureCollection, RunMetadata, StratumDistribution};
use crate::limiter::PacingGate;
use crate::orchestrator::LocationResolver;
use crate::records::ConcentrationRecord;
use crate::resolver::{GeocodeLookup, NominatimClient, RateLimitedResolver};
use crate::sampler::StratifiedSampler;

const PROGRESS_EVERY: usize = 20;
const JITTER_SEED_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

/// One batch run: sample, resolve each record in order, emit features.
pub struct ResolutionPipeline {
    resolver: LocationResolver,
    sampler: StratifiedSampler,
    sample_rng: Mutex<StdRng>,
}

impl ResolutionPipeline {
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let lookup = Arc::new(NominatimClient::new(config)?);
        Self::with_lookup(config, lookup)
    }

    pub fn with_lookup(config: &AppConfig, lookup: Arc<dyn GeocodeLookup>) -> AppResult<Self> {
        let bounds = config.bounds.validated()?;
        let cache = Arc::new(CacheStore::open(
            &config.cache_path,
            bounds,
            config.cache_write_policy,
        ));

        let mut fallback = FallbackTable::default();
        if let Some(path) = &config.fallback_table_path {
            let merged = fallback.extend_from_file(path)?;
            info!(path = %path.display(), merged, "fallback table overrides loaded");
        }

        let gate = Arc::new(PacingGate::new(Duration::from_millis(
            config.pacing_interval_ms,
        )));
        let live = RateLimitedResolver::new(lookup, gate, config.country_suffix.clone());

        let (sample_rng, jitter_rng) = match config.sample_seed {
            Some(seed) => (
                StdRng::seed_from_u64(seed),
                StdRng::seed_from_u64(seed ^ JITTER_SEED_SALT),
            ),
            None => (StdRng::from_entropy(), StdRng::from_entropy()),
        };

        let resolver = LocationResolver::new(
            cache,
            fallback,
            live,
            RegionApproximator::new(bounds, jitter_rng),
            bounds,
        )
        .with_retry_approximations(config.retry_approximations);

        Ok(Self {
            resolver,
            sampler: StratifiedSampler::new(config.sample_target_size, config.sample_hard_cap),
            sample_rng: Mutex::new(sample_rng),
        })
    }

    pub fn resolver(&self) -> &LocationResolver {
        &self.resolver
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.resolver.cache().stats()
    }

    pub async fn run(&self, records: &[ConcentrationRecord]) -> FeatureCollection {
        let sample = {
            let mut rng = self.sample_rng.lock();
            self.sampler.sample(records, &mut *rng)
        };

        let mut metadata = RunMetadata {
            total_records: sample.total_available,
            sampled_records: sample.len(),
            concentration_distribution: sample
                .strata
                .iter()
                .map(StratumDistribution::from)
                .collect(),
            ..RunMetadata::default()
        };

        let total = sample.len();
        let mut features = Vec::with_capacity(total);
        for record in &sample.records {
            let resolution = self.resolver.resolve(&record.city, &record.region).await;
            metadata.tally(resolution.provenance);
            features.push(Feature::point(record, &resolution));

            if metadata.processed % PROGRESS_EVERY == 0 {
                info!(processed = metadata.processed, total, "resolution progress");
            }
        }

        if let Err(err) = self.resolver.cache().flush() {
            warn!(?err, "failed to flush geocode cache");
        }

        let stats = self.cache_stats();
        info!(
            processed = metadata.processed,
            cache_hits = metadata.cache_hits,
            fallback_hits = metadata.fallback_hits,
            live_lookups = metadata.live_lookups,
            approximated = metadata.approximated,
            cache_total = stats.total,
            cache_unresolvable = stats.unresolvable,
            "resolution run complete"
        );

        FeatureCollection::new(features, metadata)
    }
}
