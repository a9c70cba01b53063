//! Infrastructure Site Selector
//!
//! Scores candidate sites for critical infrastructure (the reference
//! deployment screens nuclear power plant sites in Kazakhstan) and keeps a
//! local cache of the geographic reference layers the scoring depends on.
//!
//! # Scoring Model (10 criteria, weighted mean)
//!
//! ```text
//! overall = round( Σ scoreᵢ·wᵢ / Σ wᵢ )
//! ```
//!
//! | Criterion              | Weight | Driven by                          |
//! |------------------------|--------|------------------------------------|
//! | population_access      | 0.15   | distance to nearest city           |
//! | water_supply           | 0.12   | distance × reliability of water    |
//! | seismic_safety         | 0.10   | seismic zone score                 |
//! | environmental          | 0.08   | exclusion-zone restriction level   |
//! | grid_integration       | 0.10   | city distance, size, capital bonus |
//! | transportation         | 0.08   | city distance + hub bonus          |
//! | industrial_demand      | 0.12   | industrial factor, city distance   |
//! | economic_viability     | 0.10   | distances, seismic, industry       |
//! | public_acceptance      | 0.05   | referendum support (constant)      |
//! | emergency_preparedness | 0.10   | distance to nearest city           |
//!
//! Weights are editable and need not sum to 1.
//!
//! # Reference Data Precedence
//!
//! Each dataset resolves through an ordered chain, first non-empty wins:
//! 1. Valid cached GeoJSON file
//! 2. Live Overpass query
//! 3. Curated static tables
//! 4. Minimal built-in defaults (never cached)

use geo_kernel::GeoError;
use thiserror::Error;

pub mod cache;
pub mod config;
pub mod elevation;
pub mod exclusion;
pub mod overpass;
pub mod reference;
pub mod scorer;
pub mod selector;
pub mod sources;
pub mod store;

pub use cache::{CacheEntry, CacheState, CacheStatus, GeoDataCache};
pub use config::SelectorConfig;
pub use exclusion::ExclusionZoneRepository;
pub use reference::{City, DataType, Dataset, TransportFeature, TransportKind, WaterSource};
pub use scorer::{CriteriaWeights, Criterion, CriterionResult, SiteEvaluation};
pub use selector::SiteSelector;
pub use sources::{AcquisitionChain, AcquisitionStrategy};
pub use store::{EvaluationLog, EvaluationRecord, EvaluationSummary, WeightStore};

#[derive(Error, Debug)]
pub enum SelectorError {
    #[error("Coordinates ({lat}, {lng}) are outside the {region} bounding box")]
    OutOfBounds { lat: f64, lng: f64, region: String },
    #[error("Every acquisition tier failed for {0}")]
    Acquisition(String),
    #[error("Corrupt data: {0}")]
    Corrupt(String),
    #[error("Persistence failed: {0}")]
    Persistence(String),
    #[error("Evaluation {0} not found")]
    NotFound(u64),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Remote request failed: {0}")]
    Remote(String),
    #[error("Geometry error: {0}")]
    Geo(#[from] GeoError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SelectorError>;
