use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};

/// Normalized `(city, region)` pair used for every cache and fallback lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationKey {
    city: String,
    region: String,
}

impl LocationKey {
    pub fn new(city: &str, region: &str) -> Self {
        Self {
            city: normalize(city),
            region: normalize(region),
        }
    }

    /// Both fields must be non-empty after normalization for the key to be
    /// cacheable.
    pub fn is_complete(&self) -> bool {
        !self.city.is_empty() && !self.region.is_empty()
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn as_cache_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.city, self.region)
    }
}

pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            min_lat: 20.0,
            max_lat: 71.0,
            min_lon: -180.0,
            max_lon: -60.0,
        }
    }
}

impl BoundingBox {
    pub fn validated(self) -> AppResult<Self> {
        let finite = [self.min_lat, self.max_lat, self.min_lon, self.max_lon]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.min_lat > self.max_lat || self.min_lon > self.max_lon {
            return Err(AppError::Config(format!(
                "invalid bounding box: lat {}..{}, lon {}..{}",
                self.min_lat, self.max_lat, self.min_lon, self.max_lon
            )));
        }
        Ok(self)
    }

    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        coordinate.is_finite()
            && (self.min_lat..=self.max_lat).contains(&coordinate.lat)
            && (self.min_lon..=self.max_lon).contains(&coordinate.lon)
    }

    pub fn clamp(&self, coordinate: Coordinate) -> Coordinate {
        let center_lat = (self.min_lat + self.max_lat) / 2.0;
        let center_lon = (self.min_lon + self.max_lon) / 2.0;
        let lat = if coordinate.lat.is_finite() {
            coordinate.lat.clamp(self.min_lat, self.max_lat)
        } else {
            center_lat
        };
        let lon = if coordinate.lon.is_finite() {
            coordinate.lon.clamp(self.min_lon, self.max_lon)
        } else {
            center_lon
        };
        Coordinate { lat, lon }
    }
}

/// Which tier of the resolution chain produced a coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Cache,
    Fallback,
    Live,
    Approximate,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub coordinate: Coordinate,
    pub provenance: Provenance,
}

impl Resolution {
    pub fn new(coordinate: Coordinate, provenance: Provenance) -> Self {
        Self {
            coordinate,
            provenance,
        }
    }

    pub fn is_approximate(&self) -> bool {
        self.provenance == Provenance::Approximate
    }
}
