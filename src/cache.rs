use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::{AppError, AppResult};
use crate::geo::{normalize, BoundingBox, Coordinate, LocationKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WritePolicy {
    /// Rewrite the whole store on every new entry.
    WriteThrough,
    /// Only persist on [`CacheStore::flush`].
    Deferred,
}

impl WritePolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "write-through" | "write_through" | "writethrough" => Some(Self::WriteThrough),
            "deferred" | "checkpoint" => Some(Self::Deferred),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CacheEntry {
    Resolved(Coordinate),
    Approximate(Coordinate),
    /// Definitive miss. Carries the approximation handed out for it so the key
    /// keeps answering with the same point; `None` for bare `null` markers.
    Unresolvable(Option<Coordinate>),
}

impl CacheEntry {
    fn coordinate(&self) -> Option<Coordinate> {
        match self {
            CacheEntry::Resolved(c) | CacheEntry::Approximate(c) => Some(*c),
            CacheEntry::Unresolvable(c) => *c,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total: usize,
    pub resolved: usize,
    pub approximate: usize,
    pub unresolvable: usize,
}

/// On-disk value. `null` in the JSON file is a bare unresolvable marker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct StoredCoordinate {
    lat: f64,
    lon: f64,
    #[serde(default, skip_serializing_if = "is_false")]
    approximate: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    unresolvable: bool,
}

impl StoredCoordinate {
    fn new(c: Coordinate, approximate: bool, unresolvable: bool) -> Self {
        Self {
            lat: c.lat,
            lon: c.lon,
            approximate,
            unresolvable,
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

type StoredMap = BTreeMap<String, Option<StoredCoordinate>>;

impl From<CacheEntry> for Option<StoredCoordinate> {
    fn from(entry: CacheEntry) -> Self {
        match entry {
            CacheEntry::Resolved(c) => Some(StoredCoordinate::new(c, false, false)),
            CacheEntry::Approximate(c) => Some(StoredCoordinate::new(c, true, false)),
            CacheEntry::Unresolvable(c) => c.map(|c| StoredCoordinate::new(c, true, true)),
        }
    }
}

impl From<Option<StoredCoordinate>> for CacheEntry {
    fn from(stored: Option<StoredCoordinate>) -> Self {
        match stored {
            Some(s) if s.unresolvable => {
                CacheEntry::Unresolvable(Some(Coordinate::new(s.lat, s.lon)))
            }
            Some(s) if s.approximate => CacheEntry::Approximate(Coordinate::new(s.lat, s.lon)),
            Some(s) => CacheEntry::Resolved(Coordinate::new(s.lat, s.lon)),
            None => CacheEntry::Unresolvable(None),
        }
    }
}

struct CacheState {
    entries: BTreeMap<String, CacheEntry>,
    dirty: bool,
}

/// Flat JSON file of location keys to coordinates, held fully in memory.
pub struct CacheStore {
    path: Option<PathBuf>,
    bounds: BoundingBox,
    policy: WritePolicy,
    state: Mutex<CacheState>,
}

impl CacheStore {
    /// Loads the store at `path`. A missing or unreadable file yields an empty
    /// store; this never fails.
    pub fn open(path: impl Into<PathBuf>, bounds: BoundingBox, policy: WritePolicy) -> Self {
        let path = path.into();
        let entries = load_entries(&path, &bounds);
        info!(
            target: "geocache",
            path = %path.display(),
            entries = entries.len(),
            "geocode cache loaded"
        );
        Self {
            path: Some(path),
            bounds,
            policy,
            state: Mutex::new(CacheState {
                entries,
                dirty: false,
            }),
        }
    }

    /// Store with no backing file; `flush` is a no-op.
    pub fn in_memory(bounds: BoundingBox) -> Self {
        Self {
            path: None,
            bounds,
            policy: WritePolicy::Deferred,
            state: Mutex::new(CacheState {
                entries: BTreeMap::new(),
                dirty: false,
            }),
        }
    }

    pub fn get(&self, key: &LocationKey) -> Option<CacheEntry> {
        self.state.lock().entries.get(&key.as_cache_key()).copied()
    }

    pub fn put(&self, key: &LocationKey, entry: CacheEntry) -> AppResult<()> {
        if let Some(c) = entry.coordinate() {
            if !self.bounds.contains(&c) {
                return Err(AppError::OutOfBounds {
                    key: key.as_cache_key(),
                    lat: c.lat,
                    lon: c.lon,
                });
            }
        }

        let mut state = self.state.lock();
        let cache_key = key.as_cache_key();
        if state.entries.get(&cache_key) == Some(&entry) {
            return Ok(());
        }
        state.entries.insert(cache_key, entry);
        state.dirty = true;

        if self.policy == WritePolicy::WriteThrough {
            self.persist_locked(&mut state)?;
        }
        Ok(())
    }

    pub fn flush(&self) -> AppResult<()> {
        let mut state = self.state.lock();
        self.persist_locked(&mut state)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        let mut stats = CacheStats {
            total: state.entries.len(),
            ..CacheStats::default()
        };
        for entry in state.entries.values() {
            match entry {
                CacheEntry::Resolved(_) => stats.resolved += 1,
                CacheEntry::Approximate(_) => stats.approximate += 1,
                CacheEntry::Unresolvable(_) => stats.unresolvable += 1,
            }
        }
        stats
    }

    fn persist_locked(&self, state: &mut CacheState) -> AppResult<()> {
        let Some(path) = &self.path else {
            state.dirty = false;
            return Ok(());
        };
        if !state.dirty {
            return Ok(());
        }

        let stored: StoredMap = state
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), Option::<StoredCoordinate>::from(*entry)))
            .collect();
        let serialized = serde_json::to_string_pretty(&stored)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let staging = staging_path(path);
        fs::write(&staging, serialized)?;
        fs::rename(&staging, path)?;
        state.dirty = false;

        debug!(
            target: "geocache",
            path = %path.display(),
            entries = stored.len(),
            "geocode cache persisted"
        );
        Ok(())
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "geocache.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}

fn load_entries(path: &Path, bounds: &BoundingBox) -> BTreeMap<String, CacheEntry> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(err) => {
            warn!(
                target: "geocache",
                path = %path.display(),
                error = ?err,
                "failed to read geocode cache; starting empty"
            );
            return BTreeMap::new();
        }
    };

    let stored = match serde_json::from_str::<StoredMap>(&contents) {
        Ok(stored) => stored,
        Err(err) => {
            warn!(
                target: "geocache",
                path = %path.display(),
                error = ?err,
                "failed to parse geocode cache; starting empty"
            );
            return BTreeMap::new();
        }
    };

    let mut entries = BTreeMap::new();
    for (key, value) in stored {
        let mut entry = CacheEntry::from(value);
        if let Some(c) = entry.coordinate().filter(|c| !bounds.contains(c)) {
            warn!(
                target: "geocache",
                key = %key,
                lat = c.lat,
                lon = c.lon,
                "dropping out-of-bounds cache entry"
            );
            match entry {
                CacheEntry::Unresolvable(_) => entry = CacheEntry::Unresolvable(None),
                _ => continue,
            }
        }
        entries.insert(normalize(&key), entry);
    }
    entries
}
