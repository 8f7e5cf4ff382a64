use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::errors::AppResult;
use crate::geo::Coordinate;
use crate::limiter::PacingGate;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("geocoder throttled the request (HTTP {0})")]
    Throttled(StatusCode),
    #[error("geocoder returned HTTP {0}")]
    Status(StatusCode),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("malformed geocoder response: {0}")]
    Malformed(String),
}

impl LookupError {
    pub fn is_throttle(&self) -> bool {
        matches!(self, LookupError::Throttled(_))
    }
}

/// One free-text query against the external service. `Ok(None)` means the
/// service answered and found nothing.
#[async_trait]
pub trait GeocodeLookup: Send + Sync {
    async fn search(&self, query: &str) -> Result<Option<Coordinate>, LookupError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResolverOutcome {
    Found(Coordinate),
    /// Every query variant was answered with no match.
    NotFound,
    /// Throttled, or at least one variant failed in transport.
    Unavailable,
}

pub struct RateLimitedResolver {
    lookup: Arc<dyn GeocodeLookup>,
    gate: Arc<PacingGate>,
    country_suffix: String,
}

impl RateLimitedResolver {
    pub fn new(
        lookup: Arc<dyn GeocodeLookup>,
        gate: Arc<PacingGate>,
        country_suffix: impl Into<String>,
    ) -> Self {
        Self {
            lookup,
            gate,
            country_suffix: country_suffix.into(),
        }
    }

    pub fn query_variants(&self, city: &str, region: &str) -> Vec<String> {
        let (city, region) = (city.trim(), region.trim());
        let suffix = self.country_suffix.trim();
        let primary = if suffix.is_empty() {
            format!("{city}, {region}")
        } else {
            format!("{city}, {region}, {suffix}")
        };
        vec![primary, format!("{city} {region}")]
    }

    pub async fn resolve(&self, city: &str, region: &str) -> ResolverOutcome {
        let mut definitive = true;
        for query in self.query_variants(city, region) {
            self.gate.acquire().await;
            debug!(query = %query, "geocoding");
            match self.lookup.search(&query).await {
                Ok(Some(coordinate)) => return ResolverOutcome::Found(coordinate),
                Ok(None) => {
                    debug!(query = %query, "no geocoder match");
                }
                Err(err) if err.is_throttle() => {
                    warn!(error = %err, city, region, "geocoder throttled; abandoning lookup");
                    return ResolverOutcome::Unavailable;
                }
                Err(err) => {
                    warn!(error = %err, query = %query, "geocoder query failed");
                    definitive = false;
                }
            }
        }

        if definitive {
            ResolverOutcome::NotFound
        } else {
            ResolverOutcome::Unavailable
        }
    }
}

/// OpenStreetMap Nominatim search client.
pub struct NominatimClient {
    http: reqwest::Client,
    endpoint: String,
    country_codes: String,
}

impl NominatimClient {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            http,
            endpoint: config.geocode_endpoint.clone(),
            country_codes: config.country_codes.clone(),
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Degrees {
    Number(f64),
    Text(String),
}

impl Degrees {
    fn value(&self) -> Option<f64> {
        match self {
            Degrees::Number(v) => Some(*v),
            Degrees::Text(text) => text.trim().parse().ok(),
        }
    }
}

#[derive(Deserialize)]
struct SearchHit {
    lat: Degrees,
    lon: Degrees,
}

#[async_trait]
impl GeocodeLookup for NominatimClient {
    async fn search(&self, query: &str) -> Result<Option<Coordinate>, LookupError> {
        let mut params = vec![("format", "json"), ("q", query), ("limit", "1")];
        if !self.country_codes.trim().is_empty() {
            params.push(("countrycodes", self.country_codes.as_str()));
        }

        let response = self
            .http
            .get(&self.endpoint)
            .header("Accept", "application/json")
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(LookupError::Throttled(status));
        }
        if !status.is_success() {
            return Err(LookupError::Status(status));
        }

        let body = response.text().await?;
        let hits: Vec<SearchHit> =
            serde_json::from_str(&body).map_err(|err| LookupError::Malformed(err.to_string()))?;
        let Some(hit) = hits.into_iter().next() else {
            return Ok(None);
        };

        match (hit.lat.value(), hit.lon.value()) {
            (Some(lat), Some(lon)) => Ok(Some(Coordinate::new(lat, lon))),
            _ => Err(LookupError::Malformed(
                "search hit has unparseable lat/lon".into(),
            )),
        }
    }
}
