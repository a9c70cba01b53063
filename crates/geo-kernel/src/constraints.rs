//! Seismic and exclusion-zone constraints
//!
//! Both checks scan an **ordered** zone sequence and stop at the first zone
//! that contains the query point. Where zones overlap, the one listed first
//! wins; no nearest-center or severity tie-break is applied. Callers that
//! care about precedence must order their configuration accordingly.

use crate::{BoundingBox, GeoPoint, Ring};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Seismic hazard classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    #[serde(rename = "Medium-High")]
    MediumHigh,
    High,
}

impl RiskLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "medium-high" | "medium_high" | "mediumhigh" => Some(Self::MediumHigh),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::MediumHigh => "Medium-High",
            Self::High => "High",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Area a seismic zone covers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeismicFootprint {
    Bounds(BoundingBox),
    Polygon(Ring),
}

impl SeismicFootprint {
    pub fn contains(&self, point: GeoPoint) -> bool {
        match self {
            Self::Bounds(bbox) => bbox.contains(point),
            Self::Polygon(ring) => ring.contains(point),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeismicZone {
    pub region: String,
    pub footprint: SeismicFootprint,
    pub risk_level: RiskLevel,
    /// Safety score 0-100, higher = safer
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Outcome of a seismic lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeismicAssessment {
    pub region: String,
    pub level: RiskLevel,
    pub score: f64,
}

impl SeismicAssessment {
    pub const DEFAULT_SCORE: f64 = 60.0;

    /// Used when no configured zone contains the point
    pub fn unknown() -> Self {
        Self {
            region: "Unknown".to_string(),
            level: RiskLevel::Medium,
            score: Self::DEFAULT_SCORE,
        }
    }
}

impl From<&SeismicZone> for SeismicAssessment {
    fn from(zone: &SeismicZone) -> Self {
        Self {
            region: zone.region.clone(),
            level: zone.risk_level,
            score: zone.score,
        }
    }
}

/// Ordered seismic zones; lookup is first-match-wins in this order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeismicZones(Vec<SeismicZone>);

impl SeismicZones {
    pub fn new(zones: Vec<SeismicZone>) -> Self {
        Self(zones)
    }

    pub fn first_containing(&self, point: GeoPoint) -> Option<&SeismicZone> {
        self.0.iter().find(|z| z.footprint.contains(point))
    }

    pub fn as_slice(&self) -> &[SeismicZone] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &SeismicZone> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<SeismicZone> for SeismicZones {
    fn from_iter<I: IntoIterator<Item = SeismicZone>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Severity of a protected area's impact on siting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestrictionLevel {
    Low,
    Medium,
    High,
}

impl RestrictionLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for RestrictionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an exclusion zone's geometry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometrySource {
    /// Surveyed boundary, tagged `geojson` or `shapefile`
    #[serde(rename = "geojson")]
    GeoJson,
    Synthesized,
    /// Operator-supplied file with no source tag
    Custom,
    Default,
}

impl GeometrySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GeoJson => "geojson",
            Self::Synthesized => "synthesized",
            Self::Custom => "custom",
            Self::Default => "default",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "geojson" | "shapefile" => Some(Self::GeoJson),
            "synthesized" | "approximated" => Some(Self::Synthesized),
            "custom" => Some(Self::Custom),
            "default" => Some(Self::Default),
            _ => None,
        }
    }
}

/// A protected or otherwise excluded area, outer rings only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExclusionZone {
    pub name: String,
    pub zone_type: String,
    pub restriction_level: RestrictionLevel,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub designation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iucn_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_km2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub geometry_source: GeometrySource,
    /// One outer ring per polygon (a MultiPolygon contributes several)
    pub polygons: Vec<Ring>,
}

impl ExclusionZone {
    pub fn contains(&self, point: GeoPoint) -> bool {
        self.polygons.iter().any(|ring| ring.contains(point))
    }
}

/// Ordered exclusion zones; containment is first-match-wins in this order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExclusionZones(Vec<ExclusionZone>);

impl ExclusionZones {
    pub fn new(zones: Vec<ExclusionZone>) -> Self {
        Self(zones)
    }

    pub fn first_containing(&self, point: GeoPoint) -> Option<&ExclusionZone> {
        self.0.iter().find(|z| z.contains(point))
    }

    pub fn as_slice(&self) -> &[ExclusionZone] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExclusionZone> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<ExclusionZone> for ExclusionZones {
    fn from_iter<I: IntoIterator<Item = ExclusionZone>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Outcome of an exclusion-zone containment check.
///
/// `distance` is `Some(0.0)` inside a zone by convention and `None` outside;
/// it is never computed geometrically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExclusionCheck {
    pub in_zone: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restriction_level: Option<RestrictionLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub distance: Option<f64>,
}

impl ExclusionCheck {
    pub fn clear() -> Self {
        Self {
            in_zone: false,
            zone_name: None,
            zone_type: None,
            restriction_level: None,
            description: None,
            distance: None,
        }
    }

    pub fn inside(zone: &ExclusionZone) -> Self {
        Self {
            in_zone: true,
            zone_name: Some(zone.name.clone()),
            zone_type: Some(zone.zone_type.clone()),
            restriction_level: Some(zone.restriction_level),
            description: Some(zone.description.clone()),
            distance: Some(0.0),
        }
    }
}

/// Applies the seismic and exclusion checks against injected zone sets
#[derive(Debug, Clone, Copy)]
pub struct ConstraintEvaluator<'a> {
    seismic: &'a SeismicZones,
    exclusion: &'a ExclusionZones,
}

impl<'a> ConstraintEvaluator<'a> {
    pub fn new(seismic: &'a SeismicZones, exclusion: &'a ExclusionZones) -> Self {
        Self { seismic, exclusion }
    }

    /// First seismic zone containing the point, or the Unknown/Medium/60 default
    pub fn seismic_risk(&self, point: GeoPoint) -> SeismicAssessment {
        match self.seismic.first_containing(point) {
            Some(zone) => SeismicAssessment::from(zone),
            None => {
                debug!("No seismic zone contains {:?}, using default", point);
                SeismicAssessment::unknown()
            }
        }
    }

    /// First exclusion zone containing the point
    pub fn check_exclusion(&self, point: GeoPoint) -> ExclusionCheck {
        match self.exclusion.first_containing(point) {
            Some(zone) => {
                debug!("{:?} falls inside exclusion zone {}", point, zone.name);
                ExclusionCheck::inside(zone)
            }
            None => ExclusionCheck::clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect_zone(region: &str, lat: (f64, f64), lng: (f64, f64), level: RiskLevel, score: f64) -> SeismicZone {
        SeismicZone {
            region: region.to_string(),
            footprint: SeismicFootprint::Bounds(BoundingBox::new(lat.0, lat.1, lng.0, lng.1)),
            risk_level: level,
            score,
            description: None,
        }
    }

    fn square_zone(name: &str, level: RestrictionLevel, min: (f64, f64), max: (f64, f64)) -> ExclusionZone {
        ExclusionZone {
            name: name.to_string(),
            zone_type: "environmental".to_string(),
            restriction_level: level,
            description: String::new(),
            designation: None,
            iucn_category: None,
            area_km2: None,
            status: None,
            geometry_source: GeometrySource::Custom,
            polygons: vec![BoundingBox::new(min.0, max.0, min.1, max.1).to_ring()],
        }
    }

    #[test]
    fn test_seismic_first_match_wins() {
        let zones = SeismicZones::new(vec![
            rect_zone("East", (49.0, 51.0), (80.0, 87.0), RiskLevel::High, 30.0),
            rect_zone("North", (50.0, 55.0), (60.0, 80.0), RiskLevel::Low, 85.0),
        ]);
        let exclusion = ExclusionZones::default();
        let eval = ConstraintEvaluator::new(&zones, &exclusion);

        // lng 80.0 sits on the shared edge of both boxes; East is listed first
        let result = eval.seismic_risk(GeoPoint::new(50.5, 80.0));
        assert_eq!(result.region, "East");
        assert_eq!(result.level, RiskLevel::High);
    }

    #[test]
    fn test_seismic_default_when_unmatched() {
        let zones = SeismicZones::new(vec![rect_zone("East", (49.0, 51.0), (80.0, 87.0), RiskLevel::High, 30.0)]);
        let exclusion = ExclusionZones::default();
        let eval = ConstraintEvaluator::new(&zones, &exclusion);
        assert_eq!(eval.seismic_risk(GeoPoint::new(41.0, 50.0)), SeismicAssessment::unknown());
    }

    #[test]
    fn test_seismic_polygon_footprint() {
        let zones = SeismicZones::new(vec![SeismicZone {
            region: "Tien Shan".to_string(),
            footprint: SeismicFootprint::Polygon(Ring::closed(vec![
                [75.0, 42.5],
                [79.2, 43.8],
                [78.2, 44.5],
                [75.2, 43.2],
            ])),
            risk_level: RiskLevel::High,
            score: 25.0,
            description: None,
        }]);
        let exclusion = ExclusionZones::default();
        let eval = ConstraintEvaluator::new(&zones, &exclusion);
        assert_eq!(eval.seismic_risk(GeoPoint::new(43.5, 77.0)).score, 25.0);
    }

    #[test]
    fn test_exclusion_first_containing_zone() {
        let seismic = SeismicZones::default();
        let zones = ExclusionZones::new(vec![
            square_zone("Outer", RestrictionLevel::Low, (42.0, 75.0), (45.0, 79.0)),
            square_zone("Inner", RestrictionLevel::High, (43.0, 76.6), (43.4, 77.2)),
        ]);
        let eval = ConstraintEvaluator::new(&seismic, &zones);

        let check = eval.check_exclusion(GeoPoint::new(43.2, 76.9));
        assert!(check.in_zone);
        assert_eq!(check.zone_name.as_deref(), Some("Outer"));
        assert_eq!(check.restriction_level, Some(RestrictionLevel::Low));
        assert_eq!(check.distance, Some(0.0));
    }

    #[test]
    fn test_exclusion_multipolygon() {
        let seismic = SeismicZones::default();
        let mut zone = square_zone("Split", RestrictionLevel::Medium, (40.0, 50.0), (41.0, 51.0));
        zone.polygons.push(BoundingBox::new(44.0, 45.0, 60.0, 61.0).to_ring());
        let zones = ExclusionZones::new(vec![zone]);
        let eval = ConstraintEvaluator::new(&seismic, &zones);

        assert!(eval.check_exclusion(GeoPoint::new(44.5, 60.5)).in_zone);
        assert!(!eval.check_exclusion(GeoPoint::new(42.5, 55.0)).in_zone);
    }

    #[test]
    fn test_exclusion_clear() {
        let seismic = SeismicZones::default();
        let zones = ExclusionZones::default();
        let eval = ConstraintEvaluator::new(&seismic, &zones);
        let check = eval.check_exclusion(GeoPoint::new(45.0, 70.0));
        assert!(!check.in_zone);
        assert_eq!(check.distance, None);
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!(RiskLevel::parse("Medium-High"), Some(RiskLevel::MediumHigh));
        assert_eq!(RestrictionLevel::parse("HIGH"), Some(RestrictionLevel::High));
        assert_eq!(RestrictionLevel::parse("severe"), None);
    }
}
