//! Synthetic polygons for areas known only by name and area
//!
//! Protected-area registries often list a site's name and its area in km²
//! without any boundary. The synthesizer turns that into a plausible closed
//! ring so the area can still take part in containment checks and be drawn
//! on a map.
//!
//! **These rings are lossy visual approximations, not survey boundaries.**
//!
//! # Center Resolution
//!
//! 1. Known named location (name contains the keyword) → exact center
//! 2. Regional keyword → regional center + jitter (±0.5° lat, ±1.0° lng)
//! 3. Uniform random point inside the configured bounds
//!
//! # Shape Family
//!
//! | Area (km²)     | Shape                                        |
//! |----------------|----------------------------------------------|
//! | > 5000         | 10-vertex irregular, radius jitter 0.6–1.4×  |
//! | 500 < a ≤ 5000 | elongated quadrilateral, random orientation  |
//! | ≤ 500          | regular 8-vertex circle                      |
//!
//! Randomness comes from the injected generator, so a seeded
//! `ChaCha8Rng` reproduces every ring exactly.

use crate::{km_to_degrees, BoundingBox, GeoPoint, Ring};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;

/// Radius clamp in degrees
pub const MIN_RADIUS_DEG: f64 = 0.02;
pub const MAX_RADIUS_DEG: f64 = 1.5;

/// Area thresholds in km²
pub const IRREGULAR_AREA_KM2: f64 = 5000.0;
pub const ELONGATED_AREA_KM2: f64 = 500.0;

const IRREGULAR_VERTICES: usize = 10;
const CIRCULAR_VERTICES: usize = 8;

/// Known protected areas and their centers (lat, lng)
const KNOWN_LOCATIONS: &[(&str, f64, f64)] = &[
    ("altyn-emel", 43.8, 78.5),
    ("charyn", 43.4, 79.0),
    ("katon-karagay", 49.2, 85.9),
    ("kokshetau", 53.3, 69.4),
    ("aksu-zhabagly", 42.5, 70.6),
    ("naurzum", 51.1, 64.6),
    ("tengiz", 50.5, 69.2),
    ("markakol", 49.0, 85.5),
    ("usturt", 43.5, 54.0),
    ("almaty", 43.2, 76.8),
    ("ile-alatau", 43.0, 77.0),
    ("burabay", 53.4, 70.3),
];

/// Regional keywords and the center they map to (lat, lng)
const REGIONAL_CENTERS: &[(&[&str], f64, f64)] = &[
    (&["south", "syr", "darya", "shymkent"], 42.5, 69.0),
    (&["east", "altai", "katon"], 49.0, 84.0),
    (&["north", "kostanay", "kokshe"], 53.0, 68.0),
    (&["west", "atyrau", "caspian", "mangystau"], 46.0, 52.0),
    (&["central", "karaganda", "ulytau"], 48.0, 68.0),
    (&["almaty", "southeast", "tien"], 43.5, 77.0),
];

/// How the center of a synthetic polygon was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CenterSource {
    Known,
    Regional,
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeFamily {
    Irregular,
    Elongated { vertical: bool },
    Circular,
}

impl ShapeFamily {
    pub fn for_area(area_km2: f64) -> Self {
        if area_km2 > IRREGULAR_AREA_KM2 {
            ShapeFamily::Irregular
        } else if area_km2 > ELONGATED_AREA_KM2 {
            // Orientation is filled in by the synthesizer
            ShapeFamily::Elongated { vertical: false }
        } else {
            ShapeFamily::Circular
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticPolygon {
    pub center: GeoPoint,
    pub center_source: CenterSource,
    pub radius_deg: f64,
    pub shape: ShapeFamily,
    pub ring: Ring,
}

/// Generates approximate boundaries from (name, area) pairs
pub struct PolygonSynthesizer<R: Rng> {
    rng: R,
    bounds: BoundingBox,
}

impl<R: Rng> PolygonSynthesizer<R> {
    /// Synthesizer whose last-resort centers fall inside the national interior
    pub fn new(rng: R) -> Self {
        Self::with_bounds(rng, BoundingBox::KAZAKHSTAN_INTERIOR)
    }

    pub fn with_bounds(rng: R, bounds: BoundingBox) -> Self {
        Self { rng, bounds }
    }

    /// Radius in degrees of a circle with the given area, clamped to
    /// [`MIN_RADIUS_DEG`, `MAX_RADIUS_DEG`]
    pub fn radius_deg(area_km2: f64) -> f64 {
        let area = if area_km2.is_finite() { area_km2.max(0.0) } else { 0.0 };
        km_to_degrees((area / PI).sqrt()).clamp(MIN_RADIUS_DEG, MAX_RADIUS_DEG)
    }

    /// Resolve a center for `name` using known, regional, then random lookup
    pub fn resolve_center(&mut self, name: &str) -> (GeoPoint, CenterSource) {
        let name_lower = name.to_lowercase();

        if let Some((_, lat, lng)) = KNOWN_LOCATIONS
            .iter()
            .find(|(keyword, _, _)| name_lower.contains(keyword))
        {
            return (GeoPoint::new(*lat, *lng), CenterSource::Known);
        }

        if let Some((_, lat, lng)) = REGIONAL_CENTERS
            .iter()
            .find(|(keywords, _, _)| keywords.iter().any(|k| name_lower.contains(k)))
        {
            let jitter_lat = self.rng.gen_range(-0.5..=0.5);
            let jitter_lng = self.rng.gen_range(-1.0..=1.0);
            return (
                GeoPoint::new(lat + jitter_lat, lng + jitter_lng),
                CenterSource::Regional,
            );
        }

        let lat = self.rng.gen_range(self.bounds.min_lat..=self.bounds.max_lat);
        let lng = self.rng.gen_range(self.bounds.min_lng..=self.bounds.max_lng);
        (GeoPoint::new(lat, lng), CenterSource::Random)
    }

    /// Synthesize a closed ring for a named area
    pub fn synthesize(&mut self, name: &str, area_km2: f64) -> SyntheticPolygon {
        let (center, center_source) = self.resolve_center(name);
        let radius_deg = Self::radius_deg(area_km2);

        let (shape, ring) = match ShapeFamily::for_area(area_km2) {
            ShapeFamily::Irregular => (
                ShapeFamily::Irregular,
                self.irregular(center, radius_deg, IRREGULAR_VERTICES),
            ),
            ShapeFamily::Elongated { .. } => {
                let vertical = !self.rng.gen_bool(0.5);
                (
                    ShapeFamily::Elongated { vertical },
                    elongated(center, radius_deg, vertical),
                )
            }
            ShapeFamily::Circular => (
                ShapeFamily::Circular,
                circular(center, radius_deg, CIRCULAR_VERTICES),
            ),
        };

        debug!(
            "Synthesized {:?} polygon for {} ({:.1} km², r={:.3}°, center {:?})",
            shape, name, area_km2, radius_deg, center_source
        );

        SyntheticPolygon {
            center,
            center_source,
            radius_deg,
            shape,
            ring,
        }
    }

    fn irregular(&mut self, center: GeoPoint, radius_deg: f64, points: usize) -> Ring {
        let vertices = (0..points)
            .map(|i| {
                let angle = 2.0 * PI * i as f64 / points as f64;
                let r = radius_deg * self.rng.gen_range(0.6..=1.4);
                [center.lng + r * angle.cos(), center.lat + r * angle.sin()]
            })
            .collect();
        Ring::closed(vertices)
    }
}

fn elongated(center: GeoPoint, r: f64, vertical: bool) -> Ring {
    let (c_lng, c_lat) = (center.lng, center.lat);
    let vertices = if vertical {
        vec![
            [c_lng - r * 0.6, c_lat - r * 1.5],
            [c_lng + r * 0.6, c_lat - r * 1.5],
            [c_lng + r * 0.6, c_lat + r * 1.3],
            [c_lng - r * 0.6, c_lat + r * 1.3],
        ]
    } else {
        vec![
            [c_lng - r * 1.5, c_lat - r * 0.6],
            [c_lng + r * 1.5, c_lat - r * 0.6],
            [c_lng + r * 1.3, c_lat + r * 0.6],
            [c_lng - r * 1.3, c_lat + r * 0.6],
        ]
    };
    Ring::closed(vertices)
}

fn circular(center: GeoPoint, r: f64, points: usize) -> Ring {
    let vertices = (0..points)
        .map(|i| {
            let angle = 2.0 * PI * i as f64 / points as f64;
            [center.lng + r * angle.cos(), center.lat + r * angle.sin()]
        })
        .collect();
    Ring::closed(vertices)
}
