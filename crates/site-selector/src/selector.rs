//! Site selection service
//!
//! Owns every collaborator an evaluation needs: the reference-data cache and
//! its acquisition chain, the exclusion zones, the seismic table, the
//! elevation lookup and both persistence stores.

use crate::cache::{CacheStatus, GeoDataCache};
use crate::config::SelectorConfig;
use crate::elevation::{ElevationLookup, FixedElevation, OpenElevation};
use crate::exclusion::ExclusionZoneRepository;
use crate::overpass::OverpassClient;
use crate::reference::{
    minimal_cities, minimal_water_sources, regional_seismic_zones, City, DataType, Dataset, WaterSource,
};
use crate::scorer::{self, CriteriaWeights, Criterion, NearestCity, NearestWater, SiteContext, SiteEvaluation};
use crate::sources::{AcquisitionChain, AcquisitionStrategy};
use crate::store::{
    with_retry, EvaluationLog, EvaluationRecord, EvaluationSummary, JsonWeightStore, JsonlEvaluationLog,
    WeightStore,
};
use crate::{Result, SelectorError};
use chrono::Utc;
use geo_kernel::{nearest_entity, ConstraintEvaluator, ExclusionZone, GeoPoint, SeismicZones};
use geojson::FeatureCollection;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct SiteSelector {
    config: SelectorConfig,
    cache: GeoDataCache,
    chain: AcquisitionChain,
    exclusion: ExclusionZoneRepository,
    seismic: SeismicZones,
    cities: Vec<City>,
    water_sources: Vec<WaterSource>,
    elevation: Box<dyn ElevationLookup>,
    log: Box<dyn EvaluationLog>,
    weights: Box<dyn WeightStore>,
}

impl SiteSelector {
    /// Wire up the file-backed stores and the remote tier described by `config`.
    /// Exclusion zones load here, once; reference layers load on first use.
    pub fn from_config(config: SelectorConfig) -> Result<Self> {
        config.validate()?;

        let cache = GeoDataCache::new(&config.cache.dir, &config.region.name, config.cache.max_age_days)?;

        let remote: Option<Box<dyn AcquisitionStrategy>> = if config.remote.enabled {
            Some(Box::new(OverpassClient::new(
                &config.remote.overpass_url,
                Duration::from_secs(config.remote.timeout_secs),
                config.region.bounds,
            )?))
        } else {
            info!("Remote acquisition disabled");
            None
        };

        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let exclusion = ExclusionZoneRepository::load(
            config.exclusion.geojson_path.as_deref(),
            config.exclusion.protected_areas_path.as_deref(),
            rng,
        );

        let elevation: Box<dyn ElevationLookup> = if config.remote.live_elevation {
            Box::new(OpenElevation::new(
                &config.remote.elevation_url,
                Duration::from_secs(config.remote.elevation_timeout_secs),
            )?)
        } else {
            Box::new(FixedElevation::default())
        };

        let log = Box::new(JsonlEvaluationLog::new(config.storage.evaluations_path.clone()));
        let weights = Box::new(JsonWeightStore::new(config.storage.weights_path.clone()));

        Ok(Self {
            cache,
            chain: AcquisitionChain::standard(remote),
            exclusion,
            seismic: regional_seismic_zones(),
            cities: Vec::new(),
            water_sources: Vec::new(),
            elevation,
            log,
            weights,
            config,
        })
    }

    pub fn with_chain(mut self, chain: AcquisitionChain) -> Self {
        self.chain = chain;
        self.cities.clear();
        self.water_sources.clear();
        self
    }

    pub fn with_exclusion_zones(mut self, exclusion: ExclusionZoneRepository) -> Self {
        self.exclusion = exclusion;
        self
    }

    pub fn with_seismic_zones(mut self, seismic: SeismicZones) -> Self {
        self.seismic = seismic;
        self
    }

    pub fn with_elevation(mut self, elevation: Box<dyn ElevationLookup>) -> Self {
        self.elevation = elevation;
        self
    }

    pub fn with_evaluation_log(mut self, log: Box<dyn EvaluationLog>) -> Self {
        self.log = log;
        self
    }

    pub fn with_weight_store(mut self, weights: Box<dyn WeightStore>) -> Self {
        self.weights = weights;
        self
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    pub fn cache(&self) -> &GeoDataCache {
        &self.cache
    }

    fn validate_site(&self, site: GeoPoint) -> Result<()> {
        let bounds = &self.config.region.bounds;
        if !site.is_valid() || !bounds.contains(site) {
            return Err(SelectorError::OutOfBounds {
                lat: site.lat,
                lng: site.lng,
                region: self.config.region.name.clone(),
            });
        }
        Ok(())
    }

    /// Resolve a layer through the cache and acquisition chain
    pub fn load_dataset(&mut self, data_type: DataType) -> Result<Dataset> {
        let dataset = self.cache.load(data_type, &self.chain)?;
        match &dataset {
            Dataset::Cities(cities) if !cities.is_empty() => self.cities = cities.clone(),
            Dataset::WaterSources(sources) if !sources.is_empty() => self.water_sources = sources.clone(),
            _ => {}
        }
        Ok(dataset)
    }

    /// Load the point layers used by scoring. A layer that cannot be resolved
    /// degrades to the minimal built-in set.
    fn ensure_reference_data(&mut self) {
        if self.cities.is_empty() {
            match self.load_dataset(DataType::Cities) {
                Ok(dataset) if !dataset.is_empty() => {}
                Ok(_) => warn!("City layer is empty, using minimal set"),
                Err(e) => warn!("City layer unavailable ({}), using minimal set", e),
            }
            if self.cities.is_empty() {
                self.cities = minimal_cities();
            }
        }
        if self.water_sources.is_empty() {
            match self.load_dataset(DataType::WaterSources) {
                Ok(dataset) if !dataset.is_empty() => {}
                Ok(_) => warn!("Water layer is empty, using minimal set"),
                Err(e) => warn!("Water layer unavailable ({}), using minimal set", e),
            }
            if self.water_sources.is_empty() {
                self.water_sources = minimal_water_sources();
            }
        }
    }

    /// Evaluate with the stored weights and append the result to the log
    pub fn evaluate(&mut self, site: GeoPoint) -> Result<SiteEvaluation> {
        self.validate_site(site)?;
        let weights = self.weights.load()?;
        self.evaluate_validated(site, &weights)
    }

    /// Evaluate with explicit weights and append the result to the log
    pub fn evaluate_with_weights(&mut self, site: GeoPoint, weights: &CriteriaWeights) -> Result<SiteEvaluation> {
        self.validate_site(site)?;
        self.evaluate_validated(site, weights)
    }

    fn evaluate_validated(&mut self, site: GeoPoint, weights: &CriteriaWeights) -> Result<SiteEvaluation> {
        self.ensure_reference_data();

        let city = nearest_entity(site, &self.cities)?;
        let water = nearest_entity(site, &self.water_sources)?;
        let constraints = ConstraintEvaluator::new(&self.seismic, self.exclusion.zones());

        let ctx = SiteContext {
            site,
            nearest_city: NearestCity {
                city: city.entity.clone(),
                distance_km: city.distance_km,
            },
            nearest_water: NearestWater {
                source: water.entity.clone(),
                distance_km: water.distance_km,
            },
            seismic: constraints.seismic_risk(site),
            exclusion: constraints.check_exclusion(site),
            elevation_m: self.elevation.elevation_m(site),
        };

        let evaluation = scorer::evaluate_site(ctx, weights, Utc::now());

        let log = &mut self.log;
        let id = with_retry("append evaluation", || log.append(&evaluation))?;
        info!(
            "Evaluation {} at ({:.4}, {:.4}): score {}",
            id, site.lat, site.lng, evaluation.overall_score
        );
        Ok(evaluation)
    }

    pub fn list_exclusion_zones(&self) -> &[ExclusionZone] {
        self.exclusion.as_slice()
    }

    pub fn exclusion_zones_geojson(&self) -> FeatureCollection {
        self.exclusion.to_feature_collection()
    }

    /// Returns the number of cache files removed
    pub fn clear_cache(&mut self, data_type: Option<DataType>) -> Result<usize> {
        let removed = self.cache.clear(data_type)?;
        if matches!(data_type, None | Some(DataType::Cities)) {
            self.cities.clear();
        }
        if matches!(data_type, None | Some(DataType::WaterSources)) {
            self.water_sources.clear();
        }
        Ok(removed)
    }

    pub fn cache_status(&self) -> Vec<CacheStatus> {
        self.cache.status()
    }

    /// Newest first
    pub fn historical_evaluations(&self, limit: usize) -> Result<Vec<EvaluationSummary>> {
        self.log.recent(limit)
    }

    pub fn weights(&self) -> Result<CriteriaWeights> {
        self.weights.load()
    }

    /// Apply a partial weight map and persist it; returns the applied criteria
    pub fn update_weights(&mut self, partial: &BTreeMap<String, f64>) -> Result<Vec<Criterion>> {
        let mut weights = self.weights.load()?;
        let applied = weights.update(partial);
        if applied.is_empty() {
            debug!("No known criteria in weight update");
            return Ok(applied);
        }

        let store = &mut self.weights;
        with_retry("save weights", || store.save(&weights))?;
        info!("Updated {} criteria weights", applied.len());
        Ok(applied)
    }

    pub fn export_evaluation(&self, id: u64) -> Result<EvaluationRecord> {
        self.log.get(id)?.ok_or(SelectorError::NotFound(id))
    }
}
