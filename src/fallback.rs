use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use tracing::warn;

use crate::errors::AppResult;
use crate::geo::{Coordinate, LocationKey};

const CURATED: [(&str, &str, Coordinate); 12] = [
    ("hilton head island", "south carolina", Coordinate::new(32.2163, -80.7526)),
    ("o'fallon", "missouri", Coordinate::new(38.8106, -90.7001)),
    ("beulah", "north dakota", Coordinate::new(47.2625, -101.7782)),
    ("edmonds", "washington", Coordinate::new(47.8107, -122.3774)),
    ("dickinson", "north dakota", Coordinate::new(46.8783, -102.7895)),
    ("south kingstown", "rhode island", Coordinate::new(41.4732, -71.5226)),
    ("dagsboro", "delaware", Coordinate::new(38.5493, -75.2477)),
    ("miramar", "florida", Coordinate::new(25.9860, -80.2320)),
    ("springfield", "illinois", Coordinate::new(39.7817, -89.6501)),
    ("rochester", "new york", Coordinate::new(43.1566, -77.6088)),
    ("cleveland", "ohio", Coordinate::new(41.4993, -81.6944)),
    ("athens", "georgia", Coordinate::new(33.9519, -83.3576)),
];

/// Curated coordinates for places the live service gets wrong or that are
/// requested often enough to skip the network.
#[derive(Debug, Clone)]
pub struct FallbackTable {
    entries: HashMap<LocationKey, Coordinate>,
}

impl Default for FallbackTable {
    fn default() -> Self {
        Self::from_entries(
            CURATED
                .iter()
                .map(|(city, region, coordinate)| (LocationKey::new(city, region), *coordinate)),
        )
    }
}

impl FallbackTable {
    pub fn from_entries(entries: impl IntoIterator<Item = (LocationKey, Coordinate)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Merges a JSON object of `"city, state" -> {lat, lon}` over the table.
    /// Keys without both parts are skipped. Returns how many were merged.
    pub fn extend_from_file(&mut self, path: &Path) -> AppResult<usize> {
        let contents = fs::read_to_string(path)?;
        let overrides: BTreeMap<String, Coordinate> = serde_json::from_str(&contents)?;
        let mut merged = 0;
        for (raw_key, coordinate) in overrides {
            let key = raw_key
                .rsplit_once(',')
                .map(|(city, region)| LocationKey::new(city, region))
                .filter(LocationKey::is_complete);
            let Some(key) = key else {
                warn!(
                    path = %path.display(),
                    key = %raw_key,
                    "fallback override key is not \"city, state\"; skipping"
                );
                continue;
            };
            self.entries.insert(key, coordinate);
            merged += 1;
        }
        Ok(merged)
    }

    pub fn lookup(&self, key: &LocationKey) -> Option<Coordinate> {
        self.entries.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn curated_entries_match_case_insensitively() {
        let table = FallbackTable::default();
        assert_eq!(table.len(), 12);
        assert_eq!(
            table.lookup(&LocationKey::new("O'Fallon", "MISSOURI")),
            Some(Coordinate::new(38.8106, -90.7001))
        );
        assert!(table
            .lookup(&LocationKey::new("Springfield", "Missouri"))
            .is_none());
    }

    #[test]
    fn overrides_merge_over_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fallbacks.json");
        fs::write(
            &path,
            r#"{
  "Cleveland, Ohio": { "lat": 41.5, "lon": -81.7 },
  "Fargo, North Dakota": { "lat": 46.8772, "lon": -96.7898 }
}"#,
        )
        .unwrap();

        let mut table = FallbackTable::default();
        let merged = table.extend_from_file(&path).unwrap();
        assert_eq!(merged, 2);
        assert_eq!(table.len(), 13);
        assert_eq!(
            table.lookup(&LocationKey::new("cleveland", "ohio")),
            Some(Coordinate::new(41.5, -81.7))
        );
        assert!(table
            .lookup(&LocationKey::new("fargo", "north dakota"))
            .is_some());
    }

    #[test]
    fn skips_override_keys_without_a_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fallbacks.json");
        fs::write(
            &path,
            r#"{
  "Fargo": { "lat": 46.8772, "lon": -96.7898 },
  "Bismarck, ": { "lat": 46.8083, "lon": -100.7837 },
  "Minot, North Dakota": { "lat": 48.2325, "lon": -101.2963 }
}"#,
        )
        .unwrap();

        let mut table = FallbackTable::default();
        assert_eq!(table.extend_from_file(&path).unwrap(), 1);
        assert_eq!(table.len(), 13);
        assert!(table
            .lookup(&LocationKey::new("minot", "north dakota"))
            .is_some());
    }
}
