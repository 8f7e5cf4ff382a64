use std::path::PathBuf;
use std::{env, io};

use serde::Serialize;
use tracing::debug;

use crate::cache::WritePolicy;
use crate::geo::BoundingBox;

const DEFAULT_PACING_INTERVAL_MS: u64 = 1_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_SAMPLE_TARGET_SIZE: usize = 1_000;
const DEFAULT_SAMPLE_HARD_CAP: usize = 200;
const DEFAULT_ENDPOINT: &str = "https://nominatim.openstreetmap.org/search";
const DEFAULT_USER_AGENT: &str = "Vehicle-Heatmap-App/1.0";

#[derive(Clone, Debug, Serialize)]
pub struct AppConfig {
    pub pacing_interval_ms: u64,
    pub cache_path: PathBuf,
    pub cache_write_policy: WritePolicy,
    pub retry_approximations: bool,
    pub fallback_table_path: Option<PathBuf>,
    pub geocode_endpoint: String,
    pub user_agent: String,
    pub country_codes: String,
    pub country_suffix: String,
    pub request_timeout_ms: u64,
    pub sample_target_size: usize,
    pub sample_hard_cap: usize,
    pub sample_seed: Option<u64>,
    pub bounds: BoundingBox,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pacing_interval_ms: DEFAULT_PACING_INTERVAL_MS,
            cache_path: PathBuf::from("geocache.json"),
            cache_write_policy: WritePolicy::WriteThrough,
            retry_approximations: false,
            fallback_table_path: None,
            geocode_endpoint: DEFAULT_ENDPOINT.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            country_codes: "us".to_string(),
            country_suffix: "USA".to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            sample_target_size: DEFAULT_SAMPLE_TARGET_SIZE,
            sample_hard_cap: DEFAULT_SAMPLE_HARD_CAP,
            sample_seed: None,
            bounds: BoundingBox::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        load_dotenv_if_applicable();
        let defaults = Self::default();
        Self {
            pacing_interval_ms: parse_u64(
                "GEOCODE_PACING_INTERVAL_MS",
                defaults.pacing_interval_ms,
            ),
            cache_path: non_empty("GEOCODE_CACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_path),
            cache_write_policy: non_empty("GEOCODE_CACHE_WRITE_POLICY")
                .and_then(|v| WritePolicy::parse(&v))
                .unwrap_or(defaults.cache_write_policy),
            retry_approximations: parse_bool(
                "GEOCODE_RETRY_APPROXIMATIONS",
                defaults.retry_approximations,
            ),
            fallback_table_path: non_empty("GEOCODE_FALLBACK_TABLE_PATH").map(PathBuf::from),
            geocode_endpoint: non_empty("GEOCODE_ENDPOINT").unwrap_or(defaults.geocode_endpoint),
            user_agent: non_empty("GEOCODE_USER_AGENT").unwrap_or(defaults.user_agent),
            country_codes: non_empty("GEOCODE_COUNTRY_CODES").unwrap_or(defaults.country_codes),
            country_suffix: non_empty("GEOCODE_COUNTRY_SUFFIX").unwrap_or(defaults.country_suffix),
            request_timeout_ms: parse_u64("GEOCODE_REQUEST_TIMEOUT_MS", defaults.request_timeout_ms)
                .max(1),
            sample_target_size: parse_usize("SAMPLE_TARGET_SIZE", defaults.sample_target_size),
            sample_hard_cap: parse_usize("SAMPLE_HARD_CAP", defaults.sample_hard_cap),
            sample_seed: non_empty("SAMPLE_SEED").and_then(|v| v.trim().parse::<u64>().ok()),
            bounds: BoundingBox {
                min_lat: parse_f64("BOUNDS_MIN_LAT", defaults.bounds.min_lat),
                max_lat: parse_f64("BOUNDS_MAX_LAT", defaults.bounds.max_lat),
                min_lon: parse_f64("BOUNDS_MIN_LON", defaults.bounds.min_lon),
                max_lon: parse_f64("BOUNDS_MAX_LON", defaults.bounds.max_lon),
            },
        }
    }
}

fn load_dotenv_if_applicable() {
    if !should_load_dotenv() {
        debug!("skipping .env load outside dev mode");
        return;
    }

    if let Err(err) = dotenvy::dotenv() {
        match &err {
            dotenvy::Error::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => {}
            _ => debug!(?err, "unable to load .env file"),
        }
    }
}

fn should_load_dotenv() -> bool {
    cfg!(debug_assertions) || parse_bool("ALLOW_DOTENV", false)
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(default)
}

fn parse_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn parse_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}
