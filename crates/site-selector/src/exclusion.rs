//! Exclusion zone repository
//!
//! Zones are loaded once, in order, from the first source that yields any:
//!
//! 1. GeoJSON FeatureCollection (Polygon / MultiPolygon features)
//! 2. Protected-area index: JSON records without geometry, rings synthesized
//!    from name and area
//! 3. Built-in metropolitan-area defaults
//!
//! The loaded order is the containment order.

use crate::reference::{feature, prop_f64, prop_str};
use crate::{Result, SelectorError};
use geo_kernel::{
    BoundingBox, ExclusionZone, ExclusionZones, GeometrySource, PolygonSynthesizer, RestrictionLevel, Ring,
};
use geojson::{Feature, FeatureCollection, JsonObject, JsonValue, Value};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// One row of a protected-area registry export
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectedArea {
    pub name: String,
    pub orig_name: Option<String>,
    pub designation: Option<String>,
    pub iucn_category: Option<String>,
    pub area_km2: f64,
    pub status: Option<String>,
    pub wdpa_id: Option<u64>,
}

/// Restriction implied by a protected area's designation, IUCN category and size
pub fn restriction_level(designation: &str, iucn_category: &str, area_km2: f64) -> RestrictionLevel {
    let designation = designation.to_lowercase();
    let iucn = iucn_category.trim();

    if ["nature reserve", "world heritage", "ramsar"]
        .iter()
        .any(|term| designation.contains(term))
    {
        return RestrictionLevel::High;
    }
    if matches!(iucn, "Ia" | "Ib" | "II") {
        return RestrictionLevel::High;
    }
    if area_km2 > 1000.0 {
        return RestrictionLevel::Medium;
    }
    if matches!(iucn, "III" | "IV") {
        return RestrictionLevel::Medium;
    }
    if matches!(iucn, "V" | "VI") {
        return RestrictionLevel::Low;
    }
    // zakaznik and everything else
    RestrictionLevel::Medium
}

impl ProtectedArea {
    fn description(&self) -> String {
        format!(
            "{} | IUCN: {} | Area: {:.1} km² | Status: {} | Approximated boundary",
            self.designation.as_deref().unwrap_or(""),
            self.iucn_category.as_deref().unwrap_or(""),
            self.area_km2,
            self.status.as_deref().unwrap_or(""),
        )
    }

    /// Zone with a synthesized ring; `None` for unnamed records
    pub fn to_zone<R: Rng>(&self, synthesizer: &mut PolygonSynthesizer<R>) -> Option<ExclusionZone> {
        let name = self.name.trim();
        if name.is_empty() {
            return None;
        }
        let polygon = synthesizer.synthesize(name, self.area_km2);
        Some(ExclusionZone {
            name: name.to_string(),
            zone_type: "environmental".to_string(),
            restriction_level: restriction_level(
                self.designation.as_deref().unwrap_or(""),
                self.iucn_category.as_deref().unwrap_or(""),
                self.area_km2,
            ),
            description: self.description(),
            designation: self.designation.clone(),
            iucn_category: self.iucn_category.clone(),
            area_km2: Some(self.area_km2),
            status: self.status.clone(),
            geometry_source: GeometrySource::Synthesized,
            polygons: vec![polygon.ring],
        })
    }
}

/// Outer rings of a Polygon or MultiPolygon; holes are ignored
fn outer_rings(value: &Value) -> Vec<Ring> {
    let polygons: Vec<&Vec<Vec<f64>>> = match value {
        Value::Polygon(rings) => rings.first().into_iter().collect(),
        Value::MultiPolygon(polygons) => polygons.iter().filter_map(|rings| rings.first()).collect(),
        _ => Vec::new(),
    };
    polygons
        .into_iter()
        .filter_map(|positions| match Ring::from_positions(positions) {
            Ok(ring) => Some(ring),
            Err(e) => {
                debug!("Skipping ring: {}", e);
                None
            }
        })
        .collect()
}

/// Parse one GeoJSON feature; features without a usable polygon are skipped
pub fn zone_from_feature(feature: &Feature) -> Option<ExclusionZone> {
    let polygons = outer_rings(&feature.geometry.as_ref()?.value);
    if polygons.is_empty() {
        return None;
    }
    let owned = |key: &str| prop_str(feature, key).map(str::to_string);

    Some(ExclusionZone {
        name: owned("name").unwrap_or_else(|| "Unknown Zone".to_string()),
        zone_type: owned("type").unwrap_or_else(|| "environmental".to_string()),
        restriction_level: prop_str(feature, "restriction_level")
            .and_then(RestrictionLevel::parse)
            .unwrap_or(RestrictionLevel::High),
        description: owned("description").unwrap_or_default(),
        designation: owned("designation"),
        iucn_category: owned("iucn_category"),
        area_km2: prop_f64(feature, "area_km2"),
        status: owned("status"),
        geometry_source: prop_str(feature, "geometry_source")
            .and_then(GeometrySource::parse)
            .unwrap_or(GeometrySource::Custom),
        polygons,
    })
}

pub fn zone_to_feature(zone: &ExclusionZone) -> Feature {
    let geometry = match zone.polygons.as_slice() {
        [ring] => Value::Polygon(vec![ring.to_positions()]),
        rings => Value::MultiPolygon(rings.iter().map(|r| vec![r.to_positions()]).collect()),
    };

    let mut props = JsonObject::new();
    props.insert("name".to_string(), zone.name.clone().into());
    props.insert("type".to_string(), zone.zone_type.clone().into());
    props.insert("restriction_level".to_string(), zone.restriction_level.as_str().into());
    props.insert("description".to_string(), zone.description.clone().into());
    props.insert("geometry_source".to_string(), zone.geometry_source.as_str().into());
    let optional = [
        ("designation", &zone.designation),
        ("iucn_category", &zone.iucn_category),
        ("status", &zone.status),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            props.insert(key.to_string(), value.clone().into());
        }
    }
    if let Some(area) = zone.area_km2 {
        props.insert("area_km2".to_string(), JsonValue::from(area));
    }
    feature(geometry, props)
}

fn metro_zone(name: &str, description: &str, bounds: BoundingBox) -> ExclusionZone {
    ExclusionZone {
        name: name.to_string(),
        zone_type: "population".to_string(),
        restriction_level: RestrictionLevel::High,
        description: description.to_string(),
        designation: None,
        iucn_category: None,
        area_km2: None,
        status: None,
        geometry_source: GeometrySource::Default,
        polygons: vec![bounds.to_ring()],
    }
}

pub fn default_exclusion_zones() -> ExclusionZones {
    ExclusionZones::new(vec![
        metro_zone(
            "Almaty Metropolitan Area",
            "High population density exclusion zone",
            BoundingBox::new(43.0, 43.4, 76.6, 77.2),
        ),
        metro_zone(
            "Nur-Sultan Metropolitan Area",
            "Capital city exclusion zone",
            BoundingBox::new(50.9, 51.4, 71.2, 71.8),
        ),
    ])
}

/// Zone counts by restriction level and by geometry source
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ZoneStatistics {
    pub total: usize,
    pub by_restriction: BTreeMap<String, usize>,
    pub by_geometry_source: BTreeMap<String, usize>,
}

/// Ordered exclusion zones, owned by the selector for its whole lifetime
#[derive(Debug, Clone, PartialEq)]
pub struct ExclusionZoneRepository {
    zones: ExclusionZones,
}

impl ExclusionZoneRepository {
    pub fn from_zones(zones: ExclusionZones) -> Self {
        Self { zones }
    }

    pub fn defaults() -> Self {
        Self::from_zones(default_exclusion_zones())
    }

    /// Run the loading chain; sources that are absent, unreadable or empty
    /// fall through to the next one
    pub fn load<R: Rng>(
        geojson_path: Option<&Path>,
        protected_areas_path: Option<&Path>,
        rng: R,
    ) -> Self {
        let repository = Self::load_chain(geojson_path, protected_areas_path, rng);
        repository.log_statistics();
        repository
    }

    fn load_chain<R: Rng>(
        geojson_path: Option<&Path>,
        protected_areas_path: Option<&Path>,
        rng: R,
    ) -> Self {
        if let Some(path) = geojson_path.filter(|p| p.exists()) {
            match Self::from_geojson_file(path) {
                Ok(repo) if !repo.zones.is_empty() => {
                    info!("Loaded {} exclusion zones from {:?}", repo.zones.len(), path);
                    return repo;
                }
                Ok(_) => warn!("{:?} has no polygon zones", path),
                Err(e) => warn!("Error loading exclusion zones from {:?}: {}", path, e),
            }
        }

        if let Some(path) = protected_areas_path.filter(|p| p.exists()) {
            let mut synthesizer = PolygonSynthesizer::new(rng);
            match Self::from_protected_areas_file(path, &mut synthesizer) {
                Ok(repo) if !repo.zones.is_empty() => {
                    warn!(
                        "Loaded {} protected areas from {:?} with approximated boundaries",
                        repo.zones.len(),
                        path
                    );
                    return repo;
                }
                Ok(_) => warn!("{:?} has no named protected areas", path),
                Err(e) => warn!("Error loading protected areas from {:?}: {}", path, e),
            }
        }

        let repo = Self::defaults();
        warn!("Using {} default exclusion zones", repo.zones.len());
        repo
    }

    pub fn from_geojson_str(content: &str) -> Result<Self> {
        let collection: FeatureCollection = serde_json::from_str(content)?;
        let zones: ExclusionZones = collection.features.iter().filter_map(zone_from_feature).collect();
        let skipped = collection.features.len() - zones.len();
        if skipped > 0 {
            debug!("Skipped {} features without polygon geometry", skipped);
        }
        Ok(Self::from_zones(zones))
    }

    pub fn from_geojson_file(path: &Path) -> Result<Self> {
        Self::from_geojson_str(&fs::read_to_string(path)?)
    }

    pub fn from_protected_areas<R: Rng>(
        areas: &[ProtectedArea],
        synthesizer: &mut PolygonSynthesizer<R>,
    ) -> Self {
        Self::from_zones(areas.iter().filter_map(|a| a.to_zone(synthesizer)).collect())
    }

    pub fn from_protected_areas_file<R: Rng>(
        path: &Path,
        synthesizer: &mut PolygonSynthesizer<R>,
    ) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let areas: Vec<ProtectedArea> = serde_json::from_str(&content)
            .map_err(|e| SelectorError::Corrupt(format!("{}: {}", path.display(), e)))?;
        Ok(Self::from_protected_areas(&areas, synthesizer))
    }

    pub fn zones(&self) -> &ExclusionZones {
        &self.zones
    }

    pub fn as_slice(&self) -> &[ExclusionZone] {
        self.zones.as_slice()
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn to_feature_collection(&self) -> FeatureCollection {
        FeatureCollection {
            bbox: None,
            features: self.zones.iter().map(zone_to_feature).collect(),
            foreign_members: None,
        }
    }

    pub fn statistics(&self) -> ZoneStatistics {
        let mut stats = ZoneStatistics {
            total: self.zones.len(),
            ..Default::default()
        };
        for level in [RestrictionLevel::High, RestrictionLevel::Medium, RestrictionLevel::Low] {
            stats.by_restriction.insert(level.as_str().to_string(), 0);
        }
        for zone in self.zones.iter() {
            *stats
                .by_restriction
                .entry(zone.restriction_level.as_str().to_string())
                .or_default() += 1;
            *stats
                .by_geometry_source
                .entry(zone.geometry_source.as_str().to_string())
                .or_default() += 1;
        }
        stats
    }

    pub fn log_statistics(&self) {
        let stats = self.statistics();
        info!(
            total = stats.total,
            high = stats.by_restriction.get("high").copied().unwrap_or(0),
            medium = stats.by_restriction.get("medium").copied().unwrap_or(0),
            low = stats.by_restriction.get("low").copied().unwrap_or(0),
            "Exclusion zones loaded"
        );
        for (source, count) in &stats.by_geometry_source {
            info!("  {}: {} zones", source, count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_kernel::GeoPoint;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    const ZONES_GEOJSON: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature",
             "properties": {"name": "Test Reserve", "type": "environmental", "restriction_level": "MEDIUM"},
             "geometry": {"type": "Polygon", "coordinates": [[[70.0, 45.0], [71.0, 45.0], [71.0, 46.0], [70.0, 46.0], [70.0, 45.0]]]}},
            {"type": "Feature",
             "properties": {"name": "Twin Lakes"},
             "geometry": {"type": "MultiPolygon", "coordinates": [
                [[[60.0, 45.0], [61.0, 45.0], [61.0, 46.0], [60.0, 45.0]]],
                [[[62.0, 45.0], [63.0, 45.0], [63.0, 46.0], [62.0, 45.0]]]
             ]}},
            {"type": "Feature",
             "properties": {"name": "A Point"},
             "geometry": {"type": "Point", "coordinates": [70.5, 45.5]}}
        ]
    }"#;

    #[test]
    fn test_restriction_rules() {
        assert_eq!(restriction_level("State Nature Reserve", "", 10.0), RestrictionLevel::High);
        assert_eq!(restriction_level("Ramsar Site, Wetland", "", 10.0), RestrictionLevel::High);
        assert_eq!(restriction_level("National Park", "II", 10.0), RestrictionLevel::High);
        assert_eq!(restriction_level("", "Ia", 10.0), RestrictionLevel::High);
        assert_eq!(restriction_level("Zakaznik", "VI", 5000.0), RestrictionLevel::Medium);
        assert_eq!(restriction_level("Natural Monument", "III", 10.0), RestrictionLevel::Medium);
        assert_eq!(restriction_level("Landscape", "V", 10.0), RestrictionLevel::Low);
        assert_eq!(restriction_level("Zakaznik", "", 10.0), RestrictionLevel::Medium);
        assert_eq!(restriction_level("Something", "Not Reported", 10.0), RestrictionLevel::Medium);
    }

    #[test]
    fn test_tagged_geometry_source_is_kept() {
        let feature: Feature = serde_json::from_str(
            r#"{"type": "Feature",
                "properties": {"name": "Altyn-Emel", "geometry_source": "shapefile"},
                "geometry": {"type": "Polygon", "coordinates": [[[78.0, 43.8], [79.0, 43.8], [79.0, 44.4], [78.0, 43.8]]]}}"#,
        )
        .unwrap();
        let zone = zone_from_feature(&feature).unwrap();
        assert_eq!(zone.geometry_source, GeometrySource::GeoJson);
    }

    #[test]
    fn test_geojson_zones() {
        let repo = ExclusionZoneRepository::from_geojson_str(ZONES_GEOJSON).unwrap();
        assert_eq!(repo.len(), 2);

        let reserve = &repo.as_slice()[0];
        assert_eq!(reserve.restriction_level, RestrictionLevel::Medium);
        assert_eq!(reserve.geometry_source, GeometrySource::Custom);

        let twins = &repo.as_slice()[1];
        assert_eq!(twins.polygons.len(), 2);
        assert_eq!(twins.restriction_level, RestrictionLevel::High);
        assert_eq!(twins.zone_type, "environmental");
        assert!(twins.contains(GeoPoint::new(45.2, 62.7)));
    }

    #[test]
    fn test_feature_round_trip_keeps_order() {
        let repo = ExclusionZoneRepository::from_geojson_str(ZONES_GEOJSON).unwrap();
        let json = serde_json::to_string(&repo.to_feature_collection()).unwrap();
        let reloaded = ExclusionZoneRepository::from_geojson_str(&json).unwrap();
        assert_eq!(reloaded, repo);
    }

    #[test]
    fn test_protected_areas_synthesized() {
        let areas = vec![
            ProtectedArea {
                name: "Altyn-Emel National Park".to_string(),
                designation: Some("National Park".to_string()),
                iucn_category: Some("II".to_string()),
                area_km2: 4600.0,
                status: Some("Designated".to_string()),
                ..Default::default()
            },
            ProtectedArea::default(),
        ];
        let mut synth = PolygonSynthesizer::new(ChaCha8Rng::seed_from_u64(7));
        let repo = ExclusionZoneRepository::from_protected_areas(&areas, &mut synth);

        assert_eq!(repo.len(), 1);
        let zone = &repo.as_slice()[0];
        assert_eq!(zone.restriction_level, RestrictionLevel::High);
        assert_eq!(zone.geometry_source, GeometrySource::Synthesized);
        assert_eq!(
            zone.description,
            "National Park | IUCN: II | Area: 4600.0 km² | Status: Designated | Approximated boundary"
        );
        assert!(zone.contains(GeoPoint::new(43.8, 78.5)));
    }

    #[test]
    fn test_load_chain_prefers_geojson() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(ZONES_GEOJSON.as_bytes()).unwrap();
        let repo = ExclusionZoneRepository::load(Some(file.path()), None, ChaCha8Rng::seed_from_u64(1));
        assert_eq!(repo.as_slice()[0].name, "Test Reserve");
    }

    #[test]
    fn test_load_chain_skips_broken_sources() {
        let dir = TempDir::new().unwrap();
        let geojson = dir.path().join("zones.geojson");
        fs::write(&geojson, "not json").unwrap();
        let areas = dir.path().join("areas.json");
        fs::write(&areas, r#"[{"name": "Naurzum State Nature Reserve", "designation": "State Nature Reserve", "area_km2": 1919.0}]"#).unwrap();

        let repo = ExclusionZoneRepository::load(Some(geojson.as_path()), Some(areas.as_path()), ChaCha8Rng::seed_from_u64(1));
        assert_eq!(repo.len(), 1);
        assert_eq!(repo.as_slice()[0].geometry_source, GeometrySource::Synthesized);

        let missing = dir.path().join("missing.json");
        let repo = ExclusionZoneRepository::load(Some(missing.as_path()), Some(missing.as_path()), ChaCha8Rng::seed_from_u64(1));
        assert_eq!(repo, ExclusionZoneRepository::defaults());
    }

    #[test]
    fn test_statistics() {
        let stats = ExclusionZoneRepository::defaults().statistics();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_restriction["high"], 2);
        assert_eq!(stats.by_restriction["low"], 0);
        assert_eq!(stats.by_geometry_source["default"], 2);
    }
}
