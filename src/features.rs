use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::{Provenance, Resolution};
use crate::records::ConcentrationRecord;
use crate::sampler::StratumSummary;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<Feature>,
    pub metadata: RunMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: String,
    pub geometry: PointGeometry,
    pub properties: FeatureProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointGeometry {
    #[serde(rename = "type")]
    pub kind: String,
    /// `[longitude, latitude]`
    pub coordinates: [f64; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureProperties {
    pub city: String,
    pub state: String,
    pub vehicle_count: u64,
    pub vehicle_class: u32,
    pub vehicle_type: String,
    pub fuel_type: String,
    pub concentration_type: u8,
    pub concentration_description: String,
    pub provenance: Provenance,
    pub approximate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StratumDistribution {
    pub concentration_type: u8,
    pub label: String,
    pub available: usize,
    pub sampled: usize,
}

impl From<&StratumSummary> for StratumDistribution {
    fn from(summary: &StratumSummary) -> Self {
        Self {
            concentration_type: summary.concentration_type.code(),
            label: summary.concentration_type.label().to_string(),
            available: summary.available,
            sampled: summary.sampled,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMetadata {
    pub total_records: usize,
    pub sampled_records: usize,
    pub processed: usize,
    pub cache_hits: usize,
    pub fallback_hits: usize,
    pub live_lookups: usize,
    pub approximated: usize,
    pub concentration_distribution: Vec<StratumDistribution>,
    pub generated_at: Option<DateTime<Utc>>,
}

impl RunMetadata {
    pub fn tally(&mut self, provenance: Provenance) {
        self.processed += 1;
        match provenance {
            Provenance::Cache => self.cache_hits += 1,
            Provenance::Fallback => self.fallback_hits += 1,
            Provenance::Live => self.live_lookups += 1,
            Provenance::Approximate => self.approximated += 1,
        }
    }
}

impl Feature {
    pub fn point(record: &ConcentrationRecord, resolution: &Resolution) -> Self {
        Self {
            kind: "Feature".to_string(),
            geometry: PointGeometry {
                kind: "Point".to_string(),
                coordinates: [resolution.coordinate.lon, resolution.coordinate.lat],
            },
            properties: FeatureProperties {
                city: record.city.clone(),
                state: record.region.clone(),
                vehicle_count: record.vehicle_count,
                vehicle_class: record.vehicle_class,
                vehicle_type: record.vehicle_type.clone(),
                fuel_type: record.fuel_type.clone(),
                concentration_type: record.concentration_type.code(),
                concentration_description: record.concentration_description.clone(),
                provenance: resolution.provenance,
                approximate: resolution.is_approximate(),
            },
        }
    }
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>, mut metadata: RunMetadata) -> Self {
        metadata.generated_at.get_or_insert_with(Utc::now);
        Self {
            kind: "FeatureCollection".to_string(),
            features,
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::geo::Coordinate;
    use crate::records::ConcentrationType;

    #[test]
    fn serializes_as_geojson_point_with_lon_first() {
        let record = ConcentrationRecord::new("Akron", "Ohio", ConcentrationType::National, 4);
        let resolution = Resolution::new(Coordinate::new(41.08, -81.52), Provenance::Live);
        let mut metadata = RunMetadata::default();
        metadata.tally(resolution.provenance);

        let collection =
            FeatureCollection::new(vec![Feature::point(&record, &resolution)], metadata);
        let value = serde_json::to_value(&collection).unwrap();

        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["features"][0]["type"], "Feature");
        assert_eq!(
            value["features"][0]["geometry"],
            json!({ "type": "Point", "coordinates": [-81.52, 41.08] })
        );
        assert_eq!(value["features"][0]["properties"]["provenance"], "live");
        assert_eq!(value["features"][0]["properties"]["approximate"], false);
        assert_eq!(value["features"][0]["properties"]["concentration_type"], 2);
        assert_eq!(value["metadata"]["live_lookups"], 1);
        assert!(value["metadata"]["generated_at"].is_string());
    }

    #[test]
    fn tally_counts_by_provenance() {
        let mut metadata = RunMetadata::default();
        for provenance in [
            Provenance::Cache,
            Provenance::Cache,
            Provenance::Fallback,
            Provenance::Approximate,
        ] {
            metadata.tally(provenance);
        }
        assert_eq!(metadata.processed, 4);
        assert_eq!(metadata.cache_hits, 2);
        assert_eq!(metadata.fallback_hits, 1);
        assert_eq!(metadata.approximated, 1);
        assert_eq!(metadata.live_lookups, 0);
    }
}
