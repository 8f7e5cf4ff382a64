mod approximate;
mod cache;
mod config;
mod errors;
mod fallback;
mod features;
mod geo;
mod limiter;
mod orchestrator;
mod pipeline;
mod records;
mod resolver;
mod sampler;

use once_cell::sync::OnceCell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use approximate::RegionApproximator;
pub use cache::{CacheEntry, CacheStats, CacheStore, WritePolicy};
pub use config::AppConfig;
pub use errors::{AppError, AppResult};
pub use fallback::FallbackTable;
pub use features::{Feature, FeatureCollection, FeatureProperties, RunMetadata};
pub use geo::{BoundingBox, Coordinate, LocationKey, Provenance, Resolution};
pub use limiter::PacingGate;
pub use orchestrator::LocationResolver;
pub use pipeline::ResolutionPipeline;
pub use records::{load_csv, parse_csv, ConcentrationRecord, ConcentrationType};
pub use resolver::{
    GeocodeLookup, LookupError, NominatimClient, RateLimitedResolver, ResolverOutcome,
};
pub use sampler::{StratifiedSample, StratifiedSampler, StratumSummary};

pub fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    let _ = INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,heatmap_geocoder=debug"));
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    });
}
