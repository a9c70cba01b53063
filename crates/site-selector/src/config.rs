//! Configuration loading with override support
//!
//! Three layers, later layers win:
//! 1. TOML file (or built-in defaults when no file is given)
//! 2. Environment variables
//! 3. CLI arguments, applied by the binary

use crate::{Result, SelectorError};
use geo_kernel::BoundingBox;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_OVERPASS_URL: &str = "http://overpass-api.de/api/interpreter";
pub const DEFAULT_ELEVATION_URL: &str = "https://api.open-elevation.com/api/v1/lookup";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub region: RegionConfig,
    pub cache: CacheConfig,
    pub remote: RemoteConfig,
    pub storage: StorageConfig,
    pub exclusion: ExclusionConfig,
    /// Seed for polygon synthesis; entropy-seeded when absent
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    /// Prefix of cache file names
    pub name: String,
    pub bounds: BoundingBox,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            name: "kazakhstan".to_string(),
            bounds: BoundingBox::KAZAKHSTAN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: PathBuf,
    pub max_age_days: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data_cache"),
            max_age_days: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// When false, the Overpass tier is skipped entirely
    pub enabled: bool,
    pub overpass_url: String,
    pub timeout_secs: u64,
    pub live_elevation: bool,
    pub elevation_url: String,
    pub elevation_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            overpass_url: DEFAULT_OVERPASS_URL.to_string(),
            timeout_secs: 120,
            live_elevation: false,
            elevation_url: DEFAULT_ELEVATION_URL.to_string(),
            elevation_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub evaluations_path: PathBuf,
    pub weights_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            evaluations_path: PathBuf::from("data/site_evaluations.jsonl"),
            weights_path: PathBuf::from("data/criteria_weights.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExclusionConfig {
    /// GeoJSON FeatureCollection of Polygon / MultiPolygon zones
    pub geojson_path: Option<PathBuf>,
    /// JSON array of protected-area records without geometry
    pub protected_areas_path: Option<PathBuf>,
}

impl Default for ExclusionConfig {
    fn default() -> Self {
        Self {
            geojson_path: Some(PathBuf::from("exclusion_zones.geojson")),
            protected_areas_path: Some(PathBuf::from("protected_areas.json")),
        }
    }
}

impl SelectorConfig {
    /// Load from an optional TOML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                debug!("Loading configuration from {:?}", path);
                let content = fs::read_to_string(path).map_err(|e| {
                    SelectorError::Config(format!("cannot read {}: {}", path.display(), e))
                })?;
                Self::from_toml_str(&content)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SelectorError::Config(e.to_string()))
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - `SITE_SELECTOR_CACHE_DIR` -> `cache.dir`
    /// - `SITE_SELECTOR_MAX_AGE_DAYS` -> `cache.max_age_days`
    /// - `SITE_SELECTOR_OVERPASS_URL` -> `remote.overpass_url`
    /// - `SITE_SELECTOR_OFFLINE` -> `remote.enabled = false`
    /// - `SITE_SELECTOR_SEED` -> `seed`
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// Same as [`SelectorConfig::apply_env_overrides`] with an injected lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup("SITE_SELECTOR_CACHE_DIR") {
            self.cache.dir = PathBuf::from(value);
        }
        if let Some(value) = lookup("SITE_SELECTOR_MAX_AGE_DAYS") {
            match value.parse::<u32>() {
                Ok(days) => self.cache.max_age_days = days,
                Err(_) => warn!("Ignoring SITE_SELECTOR_MAX_AGE_DAYS={}", value),
            }
        }
        if let Some(value) = lookup("SITE_SELECTOR_OVERPASS_URL") {
            self.remote.overpass_url = value;
        }
        if let Some(value) = lookup("SITE_SELECTOR_OFFLINE") {
            let value = value.to_lowercase();
            if value == "true" || value == "1" || value == "yes" {
                self.remote.enabled = false;
            }
        }
        if let Some(value) = lookup("SITE_SELECTOR_SEED") {
            match value.parse::<u64>() {
                Ok(seed) => self.seed = Some(seed),
                Err(_) => warn!("Ignoring SITE_SELECTOR_SEED={}", value),
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let b = &self.region.bounds;
        if !(b.min_lat < b.max_lat && b.min_lng < b.max_lng) {
            return Err(SelectorError::Config(format!("degenerate region bounds {:?}", b)));
        }
        if self.region.name.trim().is_empty() {
            return Err(SelectorError::Config("region name is empty".to_string()));
        }
        Ok(())
    }
}
