//! Acquisition tiers behind the cache
//!
//! Strategies are tried in order; the first one that returns a non-empty
//! collection wins. Errors never escape a tier: they are logged and the
//! next tier is tried.

use crate::reference::{
    self, curated_cities, curated_water_sources, detailed_seismic_zones, major_airports,
    minimal_cities, minimal_water_sources, regional_seismic_zones, DataType,
};
use crate::{Result, SelectorError};
use geojson::FeatureCollection;
use tracing::{debug, info, warn};

/// One way of producing a reference layer
pub trait AcquisitionStrategy {
    /// Short identifier recorded as the cache source
    fn name(&self) -> &str;

    /// Whether results from this tier are written back to the cache
    fn cacheable(&self) -> bool {
        true
    }

    /// Produce the layer; an empty collection means "nothing here, try the
    /// next tier"
    fn acquire(&self, data_type: DataType) -> Result<FeatureCollection>;
}

/// Result of a successful chain run
#[derive(Debug, Clone)]
pub struct Acquired {
    pub collection: FeatureCollection,
    pub source: String,
    pub cacheable: bool,
}

/// Ordered fallback chain
pub struct AcquisitionChain {
    strategies: Vec<Box<dyn AcquisitionStrategy>>,
}

impl AcquisitionChain {
    pub fn new(strategies: Vec<Box<dyn AcquisitionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Remote tier (when given), then curated tables, then minimal defaults
    pub fn standard(remote: Option<Box<dyn AcquisitionStrategy>>) -> Self {
        let mut strategies: Vec<Box<dyn AcquisitionStrategy>> = Vec::new();
        strategies.extend(remote);
        strategies.push(Box::new(CuratedStatic));
        strategies.push(Box::new(MinimalDefault));
        Self::new(strategies)
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn acquire(&self, data_type: DataType) -> Result<Acquired> {
        for strategy in &self.strategies {
            match strategy.acquire(data_type) {
                Ok(collection) if !collection.features.is_empty() => {
                    info!(
                        "Acquired {} {} features from {}",
                        collection.features.len(),
                        data_type,
                        strategy.name()
                    );
                    return Ok(Acquired {
                        collection,
                        source: strategy.name().to_string(),
                        cacheable: strategy.cacheable(),
                    });
                }
                Ok(_) => debug!("{} returned no {} features", strategy.name(), data_type),
                Err(e) => warn!("{} failed for {}: {}", strategy.name(), data_type, e),
            }
        }
        Err(SelectorError::Acquisition(data_type.to_string()))
    }
}

/// Curated, detailed static tables
#[derive(Debug, Clone, Copy, Default)]
pub struct CuratedStatic;

impl AcquisitionStrategy for CuratedStatic {
    fn name(&self) -> &str {
        "curated"
    }

    fn acquire(&self, data_type: DataType) -> Result<FeatureCollection> {
        Ok(match data_type {
            DataType::Cities => reference::to_collection(&curated_cities()),
            DataType::WaterSources => reference::to_collection(&curated_water_sources()),
            DataType::SeismicZones => reference::to_collection(detailed_seismic_zones().as_slice()),
            DataType::Transportation => reference::to_collection::<reference::TransportFeature>(&[]),
        })
    }
}

/// Smallest usable set; never cached so the next run retries better tiers
#[derive(Debug, Clone, Copy, Default)]
pub struct MinimalDefault;

impl AcquisitionStrategy for MinimalDefault {
    fn name(&self) -> &str {
        "default"
    }

    fn cacheable(&self) -> bool {
        false
    }

    fn acquire(&self, data_type: DataType) -> Result<FeatureCollection> {
        Ok(match data_type {
            DataType::Cities => reference::to_collection(&minimal_cities()),
            DataType::WaterSources => reference::to_collection(&minimal_water_sources()),
            DataType::SeismicZones => reference::to_collection(regional_seismic_zones().as_slice()),
            DataType::Transportation => reference::to_collection(&major_airports()),
        })
    }
}
