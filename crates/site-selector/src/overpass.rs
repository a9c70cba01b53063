//! OpenStreetMap remote tier via the Overpass API
//!
//! Every layer is a handful of `out geom` queries restricted to the region
//! bounding box. Raw elements are enriched (population parsing, industrial
//! factor, water reliability and flow estimates), filtered to the box and
//! truncated to per-query limits before becoming GeoJSON features.

use crate::reference::{
    self, City, DataType, TransportFeature, TransportGeometry, TransportKind, WaterSource,
};
use crate::sources::AcquisitionStrategy;
use crate::{Result, SelectorError};
use geo_kernel::{BoundingBox, GeoPoint};
use geojson::FeatureCollection;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const CITY_LIMIT: usize = 15;
pub const WATER_BODY_LIMIT: usize = 25;
pub const RIVER_LIMIT: usize = 15;
pub const HIGHWAY_LIMIT: usize = 15;
pub const RAILWAY_LIMIT: usize = 10;

const INDUSTRIAL_KEYWORDS: [&str; 5] = ["industrial", "mining", "factory", "plant", "port"];

/// (name fragment, flow m³/s) for the large rivers
const MAJOR_RIVERS: [(&str, f64); 6] = [
    ("irtysh", 1000.0),
    ("ob", 800.0),
    ("ishim", 200.0),
    ("ili", 400.0),
    ("syr darya", 600.0),
    ("ural", 300.0),
];

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    fn point(self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }
}

/// One element of an Overpass JSON response
#[derive(Debug, Clone, Deserialize)]
pub struct Element {
    #[serde(rename = "type")]
    pub kind: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub center: Option<LatLon>,
    #[serde(default)]
    pub geometry: Vec<Option<LatLon>>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<Element>,
}

impl Element {
    pub fn name(&self) -> Option<&str> {
        self.tags.get("name").map(String::as_str)
    }

    fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    fn vertices(&self) -> Vec<GeoPoint> {
        self.geometry.iter().flatten().map(|p| p.point()).collect()
    }

    /// Node position or server-side center; nothing else
    pub fn node_or_center(&self) -> Option<GeoPoint> {
        match (self.kind.as_str(), self.lat, self.lon) {
            ("node", Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
            _ => self.center.map(LatLon::point),
        }
    }

    /// Node position, center, or the mean of the geometry vertices
    pub fn centroid(&self) -> Option<GeoPoint> {
        self.node_or_center().or_else(|| {
            let vertices = self.vertices();
            if vertices.is_empty() {
                return None;
            }
            let n = vertices.len() as f64;
            let lat = vertices.iter().map(|p| p.lat).sum::<f64>() / n;
            let lng = vertices.iter().map(|p| p.lng).sum::<f64>() / n;
            Some(GeoPoint::new(lat, lng))
        })
    }

    /// Middle vertex of the geometry, for linear features such as rivers
    pub fn midpoint(&self) -> Option<GeoPoint> {
        let vertices = self.vertices();
        vertices.get(vertices.len() / 2).copied()
    }
}

/// Parse an OSM `population` tag: `"1,916,822"`, `"1.2 million"`, `"350k"`.
/// Unparseable values count as zero.
pub fn parse_population(raw: &str) -> u64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    if cleaned.is_empty() {
        return 0;
    }

    let (number, multiplier) = if let Some(n) = cleaned.strip_suffix("million") {
        (n, 1_000_000.0)
    } else if let Some(n) = cleaned.strip_suffix('k') {
        (n, 1_000.0)
    } else {
        (cleaned.as_str(), 1.0)
    };

    match number.parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => (value * multiplier).round() as u64,
        _ => 0,
    }
}

/// min(population / 1e6, 0.8), plus 0.2 per tag mentioning industry, capped at 1
pub fn industrial_factor(tags: &BTreeMap<String, String>, population: u64) -> f64 {
    let mut factor = (population as f64 / 1_000_000.0).min(0.8);
    for value in tags.values() {
        let value = value.to_lowercase();
        if INDUSTRIAL_KEYWORDS.iter().any(|k| value.contains(k)) {
            factor += 0.2;
        }
    }
    factor.min(1.0)
}

pub fn classify_water_type(tags: &BTreeMap<String, String>) -> &'static str {
    if tags.get("landuse").map(String::as_str) == Some("reservoir") {
        "Reservoir"
    } else if tags.get("water").is_some_and(|w| w.contains("lake")) {
        "Lake"
    } else if tags.get("natural").map(String::as_str) == Some("water") {
        "Lake"
    } else {
        "Water Body"
    }
}

pub fn water_reliability(water_type: &str) -> f64 {
    match water_type {
        "Reservoir" => 95.0,
        "Lake" => 85.0,
        _ => 75.0,
    }
}

pub const WATER_BODY_FLOW: f64 = 500.0;

pub fn river_reliability(name: &str) -> f64 {
    let name = name.to_lowercase();
    if MAJOR_RIVERS.iter().any(|(river, _)| name.contains(river)) {
        90.0
    } else {
        70.0
    }
}

pub fn river_flow(name: &str) -> f64 {
    let name = name.to_lowercase();
    MAJOR_RIVERS
        .iter()
        .find(|(river, _)| name.contains(river))
        .map(|(_, flow)| *flow)
        .unwrap_or(150.0)
}

/// Named cities inside `bounds`, most populous first
pub fn cities_from_elements(elements: &[Element], bounds: &BoundingBox) -> Vec<City> {
    let mut cities: Vec<City> = elements
        .iter()
        .filter_map(|e| {
            let name = e.name()?;
            let location = e.node_or_center()?;
            let population = parse_population(e.tag("population").unwrap_or("0"));
            Some(City {
                name: name.to_string(),
                location,
                population,
                industrial_factor: industrial_factor(&e.tags, population),
            })
        })
        .collect();
    cities.sort_by(|a, b| b.population.cmp(&a.population));
    cities.retain(|c| bounds.contains(c.location));
    cities.truncate(CITY_LIMIT);
    cities
}

pub fn water_bodies_from_elements(elements: &[Element], bounds: &BoundingBox) -> Vec<WaterSource> {
    elements
        .iter()
        .filter_map(|e| {
            let name = e.name()?;
            let location = e.centroid()?;
            let kind = classify_water_type(&e.tags);
            Some(WaterSource {
                name: name.to_string(),
                location,
                kind: kind.to_string(),
                reliability: water_reliability(kind),
                flow_rate: WATER_BODY_FLOW,
            })
        })
        .filter(|w| bounds.contains(w.location))
        .take(WATER_BODY_LIMIT)
        .collect()
}

pub fn rivers_from_elements(elements: &[Element], bounds: &BoundingBox) -> Vec<WaterSource> {
    elements
        .iter()
        .filter_map(|e| {
            let name = e.name()?;
            let location = e.midpoint()?;
            Some(WaterSource {
                name: name.to_string(),
                location,
                kind: "River".to_string(),
                reliability: river_reliability(name),
                flow_rate: river_flow(name),
            })
        })
        .filter(|w| bounds.contains(w.location))
        .take(RIVER_LIMIT)
        .collect()
}

fn lines_from_elements(
    elements: &[Element],
    kind: TransportKind,
    class_tag: &str,
    default_class: Option<&str>,
    limit: usize,
) -> Vec<TransportFeature> {
    elements
        .iter()
        .filter_map(|e| {
            let name = e.name()?;
            let vertices = e.vertices();
            if vertices.len() < 2 {
                return None;
            }
            Some(TransportFeature {
                name: name.to_string(),
                kind,
                class: e.tag(class_tag).or(default_class).map(str::to_string),
                geometry: TransportGeometry::Line(vertices),
                iata: None,
                icao: None,
            })
        })
        .take(limit)
        .collect()
}

pub fn highways_from_elements(elements: &[Element]) -> Vec<TransportFeature> {
    lines_from_elements(elements, TransportKind::Highway, "highway", None, HIGHWAY_LIMIT)
}

pub fn railways_from_elements(elements: &[Element]) -> Vec<TransportFeature> {
    lines_from_elements(elements, TransportKind::Railway, "railway", Some("rail"), RAILWAY_LIMIT)
}

pub fn airports_from_elements(elements: &[Element]) -> Vec<TransportFeature> {
    elements
        .iter()
        .filter_map(|e| {
            let name = e.name()?;
            let location = e.centroid()?;
            let non_empty = |key: &str| e.tag(key).filter(|v| !v.is_empty()).map(str::to_string);
            Some(TransportFeature {
                name: name.to_string(),
                kind: TransportKind::Airport,
                class: Some(e.tag("aeroway").unwrap_or("aerodrome").to_string()),
                geometry: TransportGeometry::Point(location),
                iata: non_empty("iata"),
                icao: non_empty("icao"),
            })
        })
        .collect()
}

/// Overpass QL for named elements matching any of `selectors` inside `bounds`
pub fn build_query(selectors: &[&str], bounds: &BoundingBox) -> String {
    let bbox = format!(
        "({},{},{},{})",
        bounds.min_lat, bounds.min_lng, bounds.max_lat, bounds.max_lng
    );
    let body: String = selectors
        .iter()
        .map(|s| format!("  {s}[\"name\"]{bbox};\n"))
        .collect();
    format!("[out:json][timeout:60];\n(\n{body});\nout geom;\n")
}

const CITY_SELECTORS: [&str; 3] = [
    "node[\"place\"=\"city\"]",
    "way[\"place\"=\"city\"]",
    "relation[\"place\"=\"city\"]",
];
const WATER_BODY_SELECTORS: [&str; 3] = [
    "way[\"natural\"=\"water\"]",
    "relation[\"natural\"=\"water\"]",
    "way[\"landuse\"=\"reservoir\"]",
];
const RIVER_SELECTORS: [&str; 2] = ["way[\"waterway\"=\"river\"]", "relation[\"waterway\"=\"river\"]"];
const HIGHWAY_SELECTORS: [&str; 1] = ["way[\"highway\"~\"^(motorway|trunk|primary)$\"]"];
const RAILWAY_SELECTORS: [&str; 1] = ["way[\"railway\"=\"rail\"]"];
const AIRPORT_SELECTORS: [&str; 2] = ["way[\"aeroway\"=\"aerodrome\"]", "node[\"aeroway\"=\"aerodrome\"]"];

/// Blocking Overpass client bound to one region
pub struct OverpassClient {
    url: String,
    client: reqwest::blocking::Client,
    bounds: BoundingBox,
}

impl OverpassClient {
    pub fn new(url: &str, timeout: Duration, bounds: BoundingBox) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SelectorError::Remote(format!("HTTP client init failed: {e}")))?;
        Ok(Self {
            url: url.to_string(),
            client,
            bounds,
        })
    }

    fn query(&self, selectors: &[&str]) -> Result<Vec<Element>> {
        let query = build_query(selectors, &self.bounds);
        debug!("Overpass query to {}:\n{}", self.url, query);
        let response = self
            .client
            .post(&self.url)
            .body(query)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| SelectorError::Remote(format!("Overpass request failed: {e}")))?;
        let parsed = response
            .json::<OverpassResponse>()
            .map_err(|e| SelectorError::Remote(format!("Overpass response parse failed: {e}")))?;
        Ok(parsed.elements)
    }

    /// Sub-queries of a composite layer degrade to empty on failure
    fn query_or_empty(&self, label: &str, selectors: &[&str]) -> Vec<Element> {
        match self.query(selectors) {
            Ok(elements) => elements,
            Err(e) => {
                warn!("{} query failed: {}", label, e);
                Vec::new()
            }
        }
    }

    pub fn cities(&self) -> Result<Vec<City>> {
        let elements = self.query(&CITY_SELECTORS)?;
        Ok(cities_from_elements(&elements, &self.bounds))
    }

    pub fn water_sources(&self) -> Vec<WaterSource> {
        let mut sources =
            water_bodies_from_elements(&self.query_or_empty("Water bodies", &WATER_BODY_SELECTORS), &self.bounds);
        sources.extend(rivers_from_elements(
            &self.query_or_empty("Rivers", &RIVER_SELECTORS),
            &self.bounds,
        ));
        sources
    }

    pub fn transportation(&self) -> Vec<TransportFeature> {
        let mut features = highways_from_elements(&self.query_or_empty("Highways", &HIGHWAY_SELECTORS));
        features.extend(railways_from_elements(&self.query_or_empty("Railways", &RAILWAY_SELECTORS)));
        features.extend(airports_from_elements(&self.query_or_empty("Airports", &AIRPORT_SELECTORS)));
        features
    }
}

impl AcquisitionStrategy for OverpassClient {
    fn name(&self) -> &str {
        "overpass"
    }

    fn acquire(&self, data_type: DataType) -> Result<FeatureCollection> {
        info!("Querying OpenStreetMap for {}", data_type);
        Ok(match data_type {
            DataType::Cities => reference::to_collection(&self.cities()?),
            DataType::WaterSources => reference::to_collection(&self.water_sources()),
            // OSM carries no usable seismic hazard data
            DataType::SeismicZones => reference::to_collection::<geo_kernel::SeismicZone>(&[]),
            DataType::Transportation => reference::to_collection(&self.transportation()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elements(json: &str) -> Vec<Element> {
        serde_json::from_str::<OverpassResponse>(json).unwrap().elements
    }

    fn tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_parse_population() {
        assert_eq!(parse_population("1,916,822"), 1_916_822);
        assert_eq!(parse_population("1.2 million"), 1_200_000);
        assert_eq!(parse_population("350k"), 350_000);
        assert_eq!(parse_population("about many"), 0);
        assert_eq!(parse_population(""), 0);
        assert_eq!(parse_population("0"), 0);
    }

    #[test]
    fn test_industrial_factor() {
        assert!((industrial_factor(&tags(&[]), 500_000) - 0.5).abs() < 1e-9);
        assert!((industrial_factor(&tags(&[]), 3_000_000) - 0.8).abs() < 1e-9);
        let industrial = tags(&[("description", "Mining town"), ("economy", "steel plant")]);
        assert!((industrial_factor(&industrial, 100_000) - 0.5).abs() < 1e-9);
        assert!((industrial_factor(&industrial, 2_000_000) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_water_classification() {
        assert_eq!(classify_water_type(&tags(&[("landuse", "reservoir")])), "Reservoir");
        assert_eq!(classify_water_type(&tags(&[("water", "oxbow_lake")])), "Lake");
        assert_eq!(classify_water_type(&tags(&[("natural", "water")])), "Lake");
        assert_eq!(classify_water_type(&tags(&[("natural", "wetland")])), "Water Body");
        assert_eq!(water_reliability("Reservoir"), 95.0);
        assert_eq!(river_reliability("Irtysh River"), 90.0);
        assert_eq!(river_flow("Syr Darya"), 600.0);
        assert_eq!(river_flow("Talas"), 150.0);
    }

    #[test]
    fn test_cities_sorted_and_filtered() {
        let json = r#"{"elements": [
            {"type": "node", "lat": 43.25, "lon": 76.95, "tags": {"name": "Almaty", "population": "1,916,822"}},
            {"type": "way", "center": {"lat": 51.17, "lon": 71.45}, "tags": {"name": "Astana", "population": "1.35 million"}},
            {"type": "node", "lat": 41.31, "lon": 69.24, "tags": {"name": "Tashkent", "population": "2,500,000"}},
            {"type": "relation", "tags": {"name": "Nowhere"}},
            {"type": "node", "lat": 50.0, "lon": 60.0, "tags": {"population": "100"}}
        ]}"#;
        let bounds = BoundingBox::new(42.0, 55.5, 46.5, 87.5);
        let cities = cities_from_elements(&elements(json), &bounds);
        let names: Vec<_> = cities.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Almaty", "Astana"]);
        assert!((cities[0].industrial_factor - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_water_locations() {
        let json = r#"{"elements": [
            {"type": "way", "tags": {"name": "Kapshagay", "landuse": "reservoir"},
             "geometry": [{"lat": 43.8, "lon": 77.0}, {"lat": 44.0, "lon": 77.4}]},
            {"type": "way", "tags": {"name": "Irtysh"},
             "geometry": [{"lat": 50.0, "lon": 80.0}, {"lat": 51.0, "lon": 79.0}, null, {"lat": 52.0, "lon": 77.0}]}
        ]}"#;
        let elements = elements(json);
        let bounds = BoundingBox::KAZAKHSTAN;

        let bodies = water_bodies_from_elements(&elements[..1], &bounds);
        assert_eq!(bodies[0].kind, "Reservoir");
        assert!((bodies[0].location.lat - 43.9).abs() < 1e-9);
        assert!((bodies[0].location.lng - 77.2).abs() < 1e-9);

        let rivers = rivers_from_elements(&elements[1..], &bounds);
        assert_eq!(rivers[0].location, GeoPoint::new(51.0, 79.0));
        assert_eq!(rivers[0].flow_rate, 1000.0);
    }

    #[test]
    fn test_transport_features() {
        let json = r#"{"elements": [
            {"type": "way", "tags": {"name": "M-36", "highway": "trunk"},
             "geometry": [{"lat": 43.2, "lon": 76.9}, {"lat": 44.0, "lon": 76.0}]},
            {"type": "way", "tags": {"name": "Stub", "highway": "primary"},
             "geometry": [{"lat": 43.2, "lon": 76.9}]},
            {"type": "node", "lat": 43.35, "lon": 77.04, "tags": {"name": "Almaty Airport", "iata": "ALA", "icao": ""}}
        ]}"#;
        let elements = elements(json);
        let highways = highways_from_elements(&elements);
        assert_eq!(highways.len(), 1);
        assert_eq!(highways[0].type_label(), "Highway (trunk)");

        let airports = airports_from_elements(&elements[2..]);
        assert_eq!(airports[0].iata.as_deref(), Some("ALA"));
        assert_eq!(airports[0].icao, None);
        assert_eq!(airports[0].class.as_deref(), Some("aerodrome"));
    }

    #[test]
    fn test_build_query() {
        let query = build_query(&RAILWAY_SELECTORS, &BoundingBox::KAZAKHSTAN);
        assert!(query.starts_with("[out:json][timeout:60];"));
        assert!(query.contains("way[\"railway\"=\"rail\"][\"name\"](40.5,46.5,55.5,87.5);"));
        assert!(query.ends_with("out geom;\n"));
    }

    #[test]
    fn test_seismic_layer_needs_no_request() {
        let client = OverpassClient::new(
            crate::config::DEFAULT_OVERPASS_URL,
            Duration::from_secs(120),
            BoundingBox::KAZAKHSTAN,
        )
        .unwrap();
        assert_eq!(client.name(), "overpass");
        assert!(client.acquire(DataType::SeismicZones).unwrap().features.is_empty());
    }
}
