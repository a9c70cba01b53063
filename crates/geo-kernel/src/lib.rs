//! Geo Kernel
//!
//! Pure geometry for infrastructure site screening: great-circle distance,
//! nearest-entity search, closed-ring containment, synthetic polygons for
//! areas that only have a name and an area, and the ordered seismic /
//! exclusion zone constraints built on top of them.
//!
//! Nothing in this crate performs I/O. Datasets are handed in by the caller.
//!
//! # Coordinate Conventions
//!
//! | Type        | Order        | Units          |
//! |-------------|--------------|----------------|
//! | `GeoPoint`  | `lat`, `lng` | WGS84 degrees  |
//! | ring vertex | `[lng, lat]` | WGS84 degrees  |
//!
//! Ring vertices follow GeoJSON position order so rings can be moved across
//! the feature-collection boundary without swapping axes.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use thiserror::Error;

pub mod constraints;
pub mod ring;
pub mod synth;

pub use constraints::{
    ConstraintEvaluator, ExclusionCheck, ExclusionZone, ExclusionZones, GeometrySource,
    RestrictionLevel, RiskLevel, SeismicAssessment, SeismicFootprint, SeismicZone, SeismicZones,
};
pub use ring::Ring;
pub use synth::{PolygonSynthesizer, ShapeFamily, SyntheticPolygon};

/// Mean Earth radius in km
pub const EARTH_RADIUS_KM: f64 = 6371.000000000;

/// Approximate km per degree, valid for small-scale work only
pub const KM_PER_DEGREE: f64 = 111.000000000;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeoError {
    #[error("Empty input: nearest-entity search needs at least one entity")]
    EmptyInput,
    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),
    #[error("Ring is not closed or has fewer than 4 vertices ({0} given)")]
    OpenRing(usize),
}

pub type Result<T> = std::result::Result<T, GeoError>;

/// A WGS84 position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Build a point, rejecting non-finite or out-of-globe values
    pub fn checked(lat: f64, lng: f64) -> Result<Self> {
        let point = Self { lat, lng };
        if point.is_valid() {
            Ok(point)
        } else {
            Err(GeoError::InvalidCoordinates(format!("lat={lat}, lng={lng}")))
        }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// GeoJSON position (`[lng, lat]`)
    pub fn position(&self) -> [f64; 2] {
        [self.lng, self.lat]
    }

    /// Inverse of [`GeoPoint::position`]; `None` if fewer than two ordinates
    pub fn from_position(position: &[f64]) -> Option<Self> {
        match position {
            [lng, lat, ..] => Some(Self::new(*lat, *lng)),
            _ => None,
        }
    }
}

/// Inclusive lat/lng rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    /// National extent used to validate site queries
    pub const KAZAKHSTAN: BoundingBox = BoundingBox {
        min_lat: 40.5,
        max_lat: 55.5,
        min_lng: 46.5,
        max_lng: 87.5,
    };

    /// Interior box used when a synthetic polygon has no better center
    pub const KAZAKHSTAN_INTERIOR: BoundingBox = BoundingBox {
        min_lat: 41.0,
        max_lat: 55.0,
        min_lng: 47.0,
        max_lng: 87.0,
    };

    pub const fn new(min_lat: f64, max_lat: f64, min_lng: f64, max_lng: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        }
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        self.min_lat <= point.lat
            && point.lat <= self.max_lat
            && self.min_lng <= point.lng
            && point.lng <= self.max_lng
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }

    /// Closed 5-vertex ring tracing the box counter-clockwise
    pub fn to_ring(&self) -> Ring {
        Ring::closed(vec![
            [self.min_lng, self.min_lat],
            [self.max_lng, self.min_lat],
            [self.max_lng, self.max_lat],
            [self.min_lng, self.max_lat],
        ])
    }
}

/// Anything with a position that nearest-entity search can rank
pub trait Located {
    fn location(&self) -> GeoPoint;
}

impl Located for GeoPoint {
    fn location(&self) -> GeoPoint {
        *self
    }
}

/// Result of a nearest-entity search
#[derive(Debug, Clone, Copy)]
pub struct Nearest<'a, T> {
    pub entity: &'a T,
    pub index: usize,
    pub distance_km: f64,
}

/// Haversine distance between two points in km (9 decimal precision)
pub fn haversine_km(p1: GeoPoint, p2: GeoPoint) -> f64 {
    let lat1_rad = p1.lat * PI / 180.000000000;
    let lat2_rad = p2.lat * PI / 180.000000000;
    let dlat = (p2.lat - p1.lat) * PI / 180.000000000;
    let dlng = (p2.lng - p1.lng) * PI / 180.000000000;

    let a = (dlat / 2.000000000).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (dlng / 2.000000000).sin().powi(2);
    let c = 2.000000000 * a.sqrt().atan2((1.000000000 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Linear scan for the entity closest to `point`.
///
/// Ties keep the first entity in input order.
pub fn nearest_entity<T: Located>(point: GeoPoint, entities: &[T]) -> Result<Nearest<'_, T>> {
    let mut best: Option<Nearest<'_, T>> = None;

    for (index, entity) in entities.iter().enumerate() {
        let distance_km = haversine_km(point, entity.location());
        match best {
            Some(ref b) if distance_km >= b.distance_km => {}
            _ => {
                best = Some(Nearest {
                    entity,
                    index,
                    distance_km,
                })
            }
        }
    }

    best.ok_or(GeoError::EmptyInput)
}

/// Fixed-ratio km → degree conversion (1° ≈ 111 km).
///
/// Good enough for sizing synthetic shapes over a single country; not a
/// projection.
pub fn km_to_degrees(km: f64) -> f64 {
    km / KM_PER_DEGREE
}
