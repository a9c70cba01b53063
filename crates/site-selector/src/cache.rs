//! Local cache of reference layers
//!
//! Each data type is one GeoJSON file, `<dir>/<region>_<data_type>.geojson`,
//! plus a row in `<dir>/cache_metadata.json`. A cached layer is served only
//! while it passes every check:
//!
//! | Check     | Rule                                     |
//! |-----------|------------------------------------------|
//! | present   | file exists                              |
//! | parses    | GeoJSON FeatureCollection                |
//! | sanity    | cities ≥ 5, water sources ≤ 1000, any > 0 |
//! | metadata  | row exists                               |
//! | freshness | age ≤ max age (30 days by default)       |
//!
//! # State Machine
//!
//! ```text
//! Missing → Fetching → Valid | Invalid
//! Valid → (max age elapses) → Stale → Fetching
//! ```

use crate::reference::{DataType, Dataset};
use crate::sources::AcquisitionChain;
use crate::{Result, SelectorError};
use chrono::{DateTime, Duration, Utc};
use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const METADATA_FILE: &str = "cache_metadata.json";
pub const MIN_CITIES: usize = 5;
pub const MAX_WATER_SOURCES: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheState {
    Missing,
    Fetching,
    Valid,
    Invalid,
    Stale,
}

/// Metadata row for one cached layer; overwritten on every refresh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data_type: DataType,
    pub last_updated: DateTime<Utc>,
    pub source: String,
    pub file_path: PathBuf,
}

/// Per-layer status report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStatus {
    pub data_type: DataType,
    pub present: bool,
    pub size_bytes: u64,
    pub feature_count: Option<usize>,
    pub last_updated: Option<DateTime<Utc>>,
    pub source: Option<String>,
    pub state: CacheState,
    pub warnings: Vec<String>,
}

pub struct GeoDataCache {
    dir: PathBuf,
    region: String,
    max_age: Duration,
    states: HashMap<DataType, CacheState>,
}

impl GeoDataCache {
    pub fn new(dir: impl Into<PathBuf>, region: &str, max_age_days: u32) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            region: region.to_string(),
            max_age: Duration::days(i64::from(max_age_days)),
            states: HashMap::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_path(&self, data_type: DataType) -> PathBuf {
        self.dir.join(format!("{}_{}.geojson", self.region, data_type))
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    fn read_metadata(&self) -> Result<BTreeMap<String, CacheEntry>> {
        let path = self.metadata_path();
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| SelectorError::Corrupt(format!("{}: {}", path.display(), e)))
    }

    fn write_metadata(&self, metadata: &BTreeMap<String, CacheEntry>) -> Result<()> {
        let file = File::create(self.metadata_path())?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, metadata)?;
        writer.flush()?;
        Ok(())
    }

    /// Metadata row for a layer; an unreadable metadata file counts as no row
    pub fn entry(&self, data_type: DataType) -> Option<CacheEntry> {
        match self.read_metadata() {
            Ok(mut metadata) => metadata.remove(data_type.as_str()),
            Err(e) => {
                warn!("Cache metadata unreadable: {}", e);
                None
            }
        }
    }

    /// Parse the cached file; any parse failure is `Corrupt`
    pub fn read_collection(&self, data_type: DataType) -> Result<FeatureCollection> {
        let path = self.file_path(data_type);
        let file = File::open(&path)?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| SelectorError::Corrupt(format!("{}: {}", path.display(), e)))
    }

    /// Problems with a layer's feature count, empty when the count is sane
    pub fn sanity_warnings(data_type: DataType, count: usize) -> Vec<String> {
        let mut warnings = Vec::new();
        if count == 0 {
            warnings.push(format!("{data_type} cache is empty"));
        } else if data_type == DataType::Cities && count < MIN_CITIES {
            warnings.push(format!("{data_type} cache has too few entries ({count})"));
        } else if data_type == DataType::WaterSources && count > MAX_WATER_SOURCES {
            warnings.push(format!("{data_type} cache has too many entries ({count})"));
        }
        warnings
    }

    /// Run every check against `now` and return the resulting state
    pub fn assess_at(&self, data_type: DataType, now: DateTime<Utc>) -> CacheState {
        self.inspect_at(data_type, now).0
    }

    /// State plus the parsed collection, when the file parsed
    fn inspect_at(&self, data_type: DataType, now: DateTime<Utc>) -> (CacheState, Option<FeatureCollection>) {
        if !self.file_path(data_type).exists() {
            return (CacheState::Missing, None);
        }

        let collection = match self.read_collection(data_type) {
            Ok(c) => c,
            Err(e) => {
                warn!("{} cache is corrupted: {}", data_type, e);
                return (CacheState::Invalid, None);
            }
        };

        let warnings = Self::sanity_warnings(data_type, collection.features.len());
        if !warnings.is_empty() {
            for w in &warnings {
                warn!("{}, refreshing", w);
            }
            return (CacheState::Invalid, Some(collection));
        }

        let state = match self.entry(data_type) {
            None => {
                debug!("No metadata for {}", data_type);
                CacheState::Invalid
            }
            Some(entry) if now - entry.last_updated > self.max_age => CacheState::Stale,
            Some(_) => CacheState::Valid,
        };
        (state, Some(collection))
    }

    pub fn is_valid(&mut self, data_type: DataType) -> bool {
        self.is_valid_at(data_type, Utc::now())
    }

    /// Time-injected validity check; records the observed state
    pub fn is_valid_at(&mut self, data_type: DataType, now: DateTime<Utc>) -> bool {
        let state = self.assess_at(data_type, now);
        self.states.insert(data_type, state);
        state == CacheState::Valid
    }

    /// Last observed state, assessing now if the layer was never checked
    pub fn state(&self, data_type: DataType) -> CacheState {
        match self.states.get(&data_type) {
            Some(state) => *state,
            None => self.assess_at(data_type, Utc::now()),
        }
    }

    /// Write a layer and upsert its metadata row
    pub fn store(&mut self, data_type: DataType, collection: &FeatureCollection, source: &str) -> Result<CacheEntry> {
        self.store_at(data_type, collection, source, Utc::now())
    }

    pub fn store_at(
        &mut self,
        data_type: DataType,
        collection: &FeatureCollection,
        source: &str,
        now: DateTime<Utc>,
    ) -> Result<CacheEntry> {
        let path = self.file_path(data_type);
        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, collection)?;
        writer.flush()?;

        let entry = CacheEntry {
            data_type,
            last_updated: now,
            source: source.to_string(),
            file_path: path,
        };
        let mut metadata = self.read_metadata().unwrap_or_default();
        metadata.insert(data_type.as_str().to_string(), entry.clone());
        self.write_metadata(&metadata)?;

        let state = if Self::sanity_warnings(data_type, collection.features.len()).is_empty() {
            CacheState::Valid
        } else {
            CacheState::Invalid
        };
        self.states.insert(data_type, state);

        info!(
            "Cached {} {} features from {} at {:?}",
            collection.features.len(),
            data_type,
            source,
            entry.file_path
        );
        Ok(entry)
    }

    /// Resolve a layer through the cache, then the acquisition chain.
    ///
    /// Cacheable chain results are written back; a failed write is logged
    /// and the freshly acquired data is still returned.
    pub fn load(&mut self, data_type: DataType, chain: &AcquisitionChain) -> Result<Dataset> {
        self.load_at(data_type, chain, Utc::now())
    }

    pub fn load_at(
        &mut self,
        data_type: DataType,
        chain: &AcquisitionChain,
        now: DateTime<Utc>,
    ) -> Result<Dataset> {
        let (state, cached) = self.inspect_at(data_type, now);
        self.states.insert(data_type, state);
        if let (CacheState::Valid, Some(collection)) = (state, cached) {
            let dataset = Dataset::from_feature_collection(data_type, &collection);
            if !dataset.is_empty() {
                info!("Using cached {} ({} records)", data_type, dataset.len());
                return Ok(dataset);
            }
            warn!("Cached {} has no usable records, refreshing", data_type);
        } else if state == CacheState::Stale {
            info!("{} cache is older than {} days, refreshing", data_type, self.max_age.num_days());
        }

        self.states.insert(data_type, CacheState::Fetching);
        let acquired = match chain.acquire(data_type) {
            Ok(acquired) => acquired,
            Err(e) => {
                self.states.insert(data_type, CacheState::Invalid);
                return Err(e);
            }
        };

        let dataset = Dataset::from_feature_collection(data_type, &acquired.collection);

        if acquired.cacheable {
            if let Err(e) = self.store_at(data_type, &acquired.collection, &acquired.source, now) {
                warn!("Failed to cache {}: {}", data_type, e);
                self.states.insert(data_type, CacheState::Invalid);
            }
        } else {
            debug!("{} from {} is not cached", data_type, acquired.source);
            self.states.insert(data_type, CacheState::Invalid);
        }

        Ok(dataset)
    }

    /// Delete cached files and metadata rows for one layer or all of them.
    /// Returns the number of files removed.
    pub fn clear(&mut self, data_type: Option<DataType>) -> Result<usize> {
        let targets: Vec<DataType> = match data_type {
            Some(dt) => vec![dt],
            None => DataType::ALL.to_vec(),
        };

        let mut removed = 0;
        for dt in &targets {
            let path = self.file_path(*dt);
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            self.states.insert(*dt, CacheState::Missing);
        }

        let mut metadata = self.read_metadata().unwrap_or_default();
        for dt in &targets {
            metadata.remove(dt.as_str());
        }
        self.write_metadata(&metadata)?;

        match data_type {
            Some(dt) => info!("Cleared {} cache", dt),
            None => info!("Cleared all cache"),
        }
        Ok(removed)
    }

    pub fn status(&self) -> Vec<CacheStatus> {
        self.status_at(Utc::now())
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> Vec<CacheStatus> {
        DataType::ALL
            .into_iter()
            .map(|data_type| {
                let path = self.file_path(data_type);
                let size_bytes = fs::metadata(&path).map(|m| m.len()).ok();
                let feature_count = self.read_collection(data_type).ok().map(|c| c.features.len());
                let entry = self.entry(data_type);

                let mut warnings = Vec::new();
                match feature_count {
                    Some(count) => warnings.extend(Self::sanity_warnings(data_type, count)),
                    None if size_bytes.is_some() => warnings.push("file does not parse".to_string()),
                    None => {}
                }

                CacheStatus {
                    data_type,
                    present: size_bytes.is_some(),
                    size_bytes: size_bytes.unwrap_or(0),
                    feature_count,
                    last_updated: entry.as_ref().map(|e| e.last_updated),
                    source: entry.map(|e| e.source),
                    state: self.assess_at(data_type, now),
                    warnings,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::{curated_cities, minimal_cities, to_collection};
    use crate::sources::{AcquisitionChain, AcquisitionStrategy};
    use std::cell::Cell;
    use std::rc::Rc;
    use tempfile::TempDir;

    fn cache(dir: &TempDir) -> GeoDataCache {
        GeoDataCache::new(dir.path(), "kazakhstan", 30).unwrap()
    }

    #[test]
    fn test_file_naming() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        assert_eq!(
            cache.file_path(DataType::WaterSources),
            dir.path().join("kazakhstan_water_sources.geojson")
        );
    }

    #[test]
    fn test_missing_then_valid_then_stale() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache(&dir);
        let now = Utc::now();
        assert_eq!(cache.assess_at(DataType::Cities, now), CacheState::Missing);

        cache.store_at(DataType::Cities, &to_collection(&curated_cities()), "curated", now).unwrap();
        assert!(cache.is_valid_at(DataType::Cities, now));
        assert!(cache.is_valid_at(DataType::Cities, now + Duration::days(30)));
        assert!(!cache.is_valid_at(DataType::Cities, now + Duration::days(31)));
        assert_eq!(cache.state(DataType::Cities), CacheState::Stale);
    }

    #[test]
    fn test_too_few_cities_invalid() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache(&dir);
        cache.store(DataType::Cities, &to_collection(&minimal_cities()), "test").unwrap();
        assert!(!cache.is_valid(DataType::Cities));
        assert_eq!(cache.state(DataType::Cities), CacheState::Invalid);
    }

    #[test]
    fn test_corrupt_file_invalid() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache(&dir);
        cache.store(DataType::Cities, &to_collection(&curated_cities()), "curated").unwrap();
        fs::write(cache.file_path(DataType::Cities), "{\"type\": \"Feature").unwrap();
        assert!(!cache.is_valid(DataType::Cities));
    }

    #[test]
    fn test_missing_metadata_invalid() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache(&dir);
        cache.store(DataType::Cities, &to_collection(&curated_cities()), "curated").unwrap();
        fs::remove_file(cache.metadata_path()).unwrap();
        assert!(!cache.is_valid(DataType::Cities));
    }

    #[test]
    fn test_clear_single_and_all() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache(&dir);
        let chain = AcquisitionChain::standard(None);
        cache.load(DataType::Cities, &chain).unwrap();
        cache.load(DataType::WaterSources, &chain).unwrap();

        assert_eq!(cache.clear(Some(DataType::Cities)).unwrap(), 1);
        assert!(!cache.is_valid(DataType::Cities));
        assert!(cache.entry(DataType::Cities).is_none());
        assert!(cache.entry(DataType::WaterSources).is_some());

        assert_eq!(cache.clear(None).unwrap(), 1);
        assert!(cache.entry(DataType::WaterSources).is_none());
    }

    #[test]
    fn test_default_tier_not_cached() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache(&dir);
        let chain = AcquisitionChain::standard(None);
        let dataset = cache.load(DataType::Transportation, &chain).unwrap();
        assert_eq!(dataset.len(), 3);
        assert!(!cache.file_path(DataType::Transportation).exists());
    }

    struct Counting(Rc<Cell<usize>>);

    impl AcquisitionStrategy for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn acquire(&self, data_type: DataType) -> Result<FeatureCollection> {
            self.0.set(self.0.get() + 1);
            crate::sources::CuratedStatic.acquire(data_type)
        }
    }

    #[test]
    fn test_valid_cache_skips_chain() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache(&dir);
        let calls = Rc::new(Cell::new(0));
        let chain = AcquisitionChain::new(vec![Box::new(Counting(Rc::clone(&calls)))]);

        cache.load(DataType::Cities, &chain).unwrap();
        let second = cache.load(DataType::Cities, &chain).unwrap();
        assert_eq!(second.len(), 10);
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.entry(DataType::Cities).unwrap().source, "counting");
    }

    #[test]
    fn test_stale_cache_refetches_and_overwrites_metadata() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache(&dir);
        let calls = Rc::new(Cell::new(0));
        let chain = AcquisitionChain::new(vec![Box::new(Counting(Rc::clone(&calls)))]);
        let t0 = Utc::now();
        let later = t0 + Duration::days(45);

        cache.load_at(DataType::Cities, &chain, t0).unwrap();
        assert_eq!(cache.state(DataType::Cities), CacheState::Valid);
        assert!(!cache.is_valid_at(DataType::Cities, later));
        assert_eq!(cache.state(DataType::Cities), CacheState::Stale);

        let reloaded = cache.load_at(DataType::Cities, &chain, later).unwrap();
        assert_eq!(reloaded.len(), 10);
        assert_eq!(calls.get(), 2);
        assert_eq!(cache.state(DataType::Cities), CacheState::Valid);
        assert_eq!(cache.entry(DataType::Cities).unwrap().last_updated, later);

        let metadata = cache.read_metadata().unwrap();
        assert_eq!(metadata.len(), 1);
        assert!(metadata.contains_key("cities"));
    }

    #[test]
    fn test_status_report() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache(&dir);
        cache.store(DataType::Cities, &to_collection(&minimal_cities()), "test").unwrap();

        let status = cache.status();
        assert_eq!(status.len(), 4);
        let cities = &status[0];
        assert!(cities.present);
        assert_eq!(cities.feature_count, Some(2));
        assert_eq!(cities.warnings.len(), 1);
        assert!(!status[1].present);
        assert_eq!(status[1].state, CacheState::Missing);
    }
}
