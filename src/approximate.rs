use std::collections::HashMap;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::Rng;
use tracing::warn;

use crate::geo::{normalize, BoundingBox, Coordinate};

const STATE_JITTER_DEGREES: (f64, f64) = (1.0, 1.0);
const COUNTRY_JITTER_DEGREES: (f64, f64) = (5.0, 10.0);
const COUNTRY_CENTROID: Coordinate = Coordinate::new(39.8, -98.5);

static STATE_CENTROIDS: Lazy<HashMap<&'static str, Coordinate>> = Lazy::new(|| {
    [
        ("alabama", 32.7, -86.8),
        ("alaska", 64.0, -153.0),
        ("arizona", 34.0, -111.0),
        ("arkansas", 35.0, -92.0),
        ("california", 36.8, -119.4),
        ("colorado", 39.0, -105.5),
        ("connecticut", 41.6, -72.7),
        ("delaware", 38.9, -75.5),
        ("florida", 27.8, -81.7),
        ("georgia", 33.0, -83.5),
        ("hawaii", 21.1, -157.5),
        ("idaho", 44.2, -114.5),
        ("illinois", 40.3, -89.0),
        ("indiana", 39.8, -86.3),
        ("iowa", 42.0, -93.2),
        ("kansas", 38.5, -96.7),
        ("kentucky", 37.7, -84.9),
        ("louisiana", 31.0, -91.8),
        ("maine", 44.3, -69.8),
        ("maryland", 39.0, -76.8),
        ("massachusetts", 42.2, -71.5),
        ("michigan", 43.3, -84.5),
        ("minnesota", 45.7, -93.9),
        ("mississippi", 32.7, -89.7),
        ("missouri", 38.4, -92.2),
        ("montana", 47.0, -110.0),
        ("nebraska", 41.1, -98.0),
        ("nevada", 38.3, -117.0),
        ("new hampshire", 43.4, -71.5),
        ("new jersey", 40.3, -74.5),
        ("new mexico", 34.8, -106.2),
        ("new york", 42.2, -74.9),
        ("north carolina", 35.6, -79.8),
        ("north dakota", 47.5, -99.8),
        ("ohio", 40.3, -82.8),
        ("oklahoma", 35.6, -96.9),
        ("oregon", 44.6, -122.1),
        ("pennsylvania", 40.5, -77.2),
        ("rhode island", 41.7, -71.5),
        ("south carolina", 33.8, -80.9),
        ("south dakota", 44.3, -99.4),
        ("tennessee", 35.7, -86.0),
        ("texas", 31.1, -97.6),
        ("utah", 40.2, -111.5),
        ("vermont", 44.0, -72.7),
        ("virginia", 37.8, -78.2),
        ("washington", 47.4, -121.5),
        ("west virginia", 38.5, -80.9),
        ("wisconsin", 44.3, -89.6),
        ("wyoming", 42.8, -107.3),
    ]
    .into_iter()
    .map(|(name, lat, lon)| (name, Coordinate::new(lat, lon)))
    .collect()
});

/// Terminal fallback: a jittered state (or country) centroid. Always answers.
pub struct RegionApproximator {
    bounds: BoundingBox,
    rng: Mutex<StdRng>,
}

impl RegionApproximator {
    pub fn new(bounds: BoundingBox, rng: StdRng) -> Self {
        Self {
            bounds,
            rng: Mutex::new(rng),
        }
    }

    pub fn centroid(region: &str) -> Option<Coordinate> {
        STATE_CENTROIDS.get(normalize(region).as_str()).copied()
    }

    pub fn approximate(&self, region: &str) -> Coordinate {
        let (base, (lat_jitter, lon_jitter)) = match Self::centroid(region) {
            Some(centroid) => (centroid, STATE_JITTER_DEGREES),
            None => {
                warn!(region, "unknown region; approximating from country centroid");
                (COUNTRY_CENTROID, COUNTRY_JITTER_DEGREES)
            }
        };

        let mut rng = self.rng.lock();
        let jittered = Coordinate::new(
            base.lat + rng.gen_range(-lat_jitter..=lat_jitter),
            base.lon + rng.gen_range(-lon_jitter..=lon_jitter),
        );
        self.bounds.clamp(jittered)
    }
}
