//! Reference entities and their GeoJSON representation
//!
//! Cities, water sources, seismic zones and transportation features travel
//! between the cache, the remote tier and the scorer as GeoJSON features.
//! This module owns the typed records, the curated static tables and the
//! conversions in both directions.

use crate::{Result, SelectorError};
use geo_kernel::{
    BoundingBox, GeoPoint, Located, RiskLevel, Ring, SeismicFootprint, SeismicZone, SeismicZones,
};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Cached reference layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Cities,
    WaterSources,
    SeismicZones,
    Transportation,
}

impl DataType {
    pub const ALL: [DataType; 4] = [
        DataType::Cities,
        DataType::WaterSources,
        DataType::SeismicZones,
        DataType::Transportation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cities => "cities",
            Self::WaterSources => "water_sources",
            Self::SeismicZones => "seismic_zones",
            Self::Transportation => "transportation",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|dt| dt.as_str() == s.trim())
            .ok_or_else(|| SelectorError::Config(format!("unknown data type '{s}'")))
    }
}

/// A population center
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub name: String,
    pub location: GeoPoint,
    pub population: u64,
    /// 0-1, share of demand that is industrial
    pub industrial_factor: f64,
}

impl City {
    pub fn new(name: &str, lat: f64, lng: f64, population: u64, industrial_factor: f64) -> Self {
        Self {
            name: name.to_string(),
            location: GeoPoint::new(lat, lng),
            population,
            industrial_factor,
        }
    }
}

impl Located for City {
    fn location(&self) -> GeoPoint {
        self.location
    }
}

/// A cooling-water source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterSource {
    pub name: String,
    pub location: GeoPoint,
    pub kind: String,
    /// 0-100
    pub reliability: f64,
    /// m³/s
    pub flow_rate: f64,
}

impl WaterSource {
    pub fn new(name: &str, lat: f64, lng: f64, kind: &str, reliability: f64, flow_rate: f64) -> Self {
        Self {
            name: name.to_string(),
            location: GeoPoint::new(lat, lng),
            kind: kind.to_string(),
            reliability,
            flow_rate,
        }
    }
}

impl Located for WaterSource {
    fn location(&self) -> GeoPoint {
        self.location
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportKind {
    Highway,
    Railway,
    Airport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportGeometry {
    Point(GeoPoint),
    Line(Vec<GeoPoint>),
}

impl TransportGeometry {
    /// Point itself, or the middle vertex of a line
    pub fn representative_point(&self) -> Option<GeoPoint> {
        match self {
            Self::Point(p) => Some(*p),
            Self::Line(points) => points.get(points.len() / 2).copied(),
        }
    }
}

/// Road, rail or air infrastructure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportFeature {
    pub name: String,
    pub kind: TransportKind,
    /// OSM class, e.g. `trunk` for a highway or `aerodrome` for an airport
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    pub geometry: TransportGeometry,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iata: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icao: Option<String>,
}

impl TransportFeature {
    /// Display type, e.g. `Highway (trunk)`
    pub fn type_label(&self) -> String {
        match (self.kind, &self.class) {
            (TransportKind::Highway, Some(class)) => format!("Highway ({class})"),
            (TransportKind::Highway, None) => "Highway".to_string(),
            (TransportKind::Railway, _) => "Railway".to_string(),
            (TransportKind::Airport, _) => "Airport".to_string(),
        }
    }

    fn airport(name: &str, lat: f64, lng: f64, iata: &str, icao: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: TransportKind::Airport,
            class: Some("aerodrome".to_string()),
            geometry: TransportGeometry::Point(GeoPoint::new(lat, lng)),
            iata: Some(iata.to_string()),
            icao: Some(icao.to_string()),
        }
    }
}

/// A resolved reference layer
#[derive(Debug, Clone, PartialEq)]
pub enum Dataset {
    Cities(Vec<City>),
    WaterSources(Vec<WaterSource>),
    SeismicZones(SeismicZones),
    Transportation(Vec<TransportFeature>),
}

impl Dataset {
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Cities(_) => DataType::Cities,
            Self::WaterSources(_) => DataType::WaterSources,
            Self::SeismicZones(_) => DataType::SeismicZones,
            Self::Transportation(_) => DataType::Transportation,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Cities(v) => v.len(),
            Self::WaterSources(v) => v.len(),
            Self::SeismicZones(v) => v.len(),
            Self::Transportation(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_feature_collection(&self) -> FeatureCollection {
        match self {
            Self::Cities(v) => to_collection(v),
            Self::WaterSources(v) => to_collection(v),
            Self::SeismicZones(v) => to_collection(v.as_slice()),
            Self::Transportation(v) => to_collection(v),
        }
    }

    /// Convert a collection, skipping features that do not describe a
    /// record of the requested type
    pub fn from_feature_collection(data_type: DataType, collection: &FeatureCollection) -> Self {
        match data_type {
            DataType::Cities => Self::Cities(from_collection(collection)),
            DataType::WaterSources => Self::WaterSources(from_collection(collection)),
            DataType::SeismicZones => {
                Self::SeismicZones(from_collection::<SeismicZone>(collection).into_iter().collect())
            }
            DataType::Transportation => Self::Transportation(from_collection(collection)),
        }
    }
}

/// Two-way mapping between a record and a GeoJSON feature
pub trait FeatureRecord: Sized {
    fn to_feature(&self) -> Feature;
    fn from_feature(feature: &Feature) -> Option<Self>;
}

pub fn to_collection<T: FeatureRecord>(records: &[T]) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: records.iter().map(FeatureRecord::to_feature).collect(),
        foreign_members: None,
    }
}

pub fn from_collection<T: FeatureRecord>(collection: &FeatureCollection) -> Vec<T> {
    let records: Vec<T> = collection.features.iter().filter_map(T::from_feature).collect();
    let skipped = collection.features.len() - records.len();
    if skipped > 0 {
        debug!("Skipped {} features that did not convert", skipped);
    }
    records
}

pub(crate) fn feature(geometry: Value, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geometry)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

pub(crate) fn prop<'a>(feature: &'a Feature, key: &str) -> Option<&'a JsonValue> {
    feature.properties.as_ref().and_then(|p| p.get(key))
}

pub(crate) fn prop_str<'a>(feature: &'a Feature, key: &str) -> Option<&'a str> {
    prop(feature, key).and_then(JsonValue::as_str)
}

/// Numeric property; numeric strings are accepted
pub(crate) fn prop_f64(feature: &Feature, key: &str) -> Option<f64> {
    match prop(feature, key)? {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn point_of(feature: &Feature) -> Option<GeoPoint> {
    match &feature.geometry.as_ref()?.value {
        Value::Point(position) => GeoPoint::from_position(position),
        _ => None,
    }
}

fn point_value(point: GeoPoint) -> Value {
    Value::Point(point.position().to_vec())
}

fn object(pairs: Vec<(&str, JsonValue)>) -> JsonObject {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

impl FeatureRecord for City {
    fn to_feature(&self) -> Feature {
        feature(
            point_value(self.location),
            object(vec![
                ("name", self.name.clone().into()),
                ("population", self.population.into()),
                ("industrial_factor", self.industrial_factor.into()),
            ]),
        )
    }

    fn from_feature(feature: &Feature) -> Option<Self> {
        Some(Self {
            name: prop_str(feature, "name")?.to_string(),
            location: point_of(feature)?,
            population: prop_f64(feature, "population").unwrap_or(0.0).max(0.0) as u64,
            industrial_factor: prop_f64(feature, "industrial_factor").unwrap_or(0.0).clamp(0.0, 1.0),
        })
    }
}

impl FeatureRecord for WaterSource {
    fn to_feature(&self) -> Feature {
        feature(
            point_value(self.location),
            object(vec![
                ("name", self.name.clone().into()),
                ("type", self.kind.clone().into()),
                ("reliability", self.reliability.into()),
                ("flow_rate", self.flow_rate.into()),
            ]),
        )
    }

    fn from_feature(feature: &Feature) -> Option<Self> {
        Some(Self {
            name: prop_str(feature, "name")?.to_string(),
            location: point_of(feature)?,
            kind: prop_str(feature, "type").unwrap_or("Water Body").to_string(),
            reliability: prop_f64(feature, "reliability").unwrap_or(75.0),
            flow_rate: prop_f64(feature, "flow_rate").unwrap_or(500.0),
        })
    }
}

impl FeatureRecord for TransportFeature {
    fn to_feature(&self) -> Feature {
        let geometry = match &self.geometry {
            TransportGeometry::Point(p) => point_value(*p),
            TransportGeometry::Line(points) => {
                Value::LineString(points.iter().map(|p| p.position().to_vec()).collect())
            }
        };
        let mut props = object(vec![
            ("name", self.name.clone().into()),
            ("type", self.type_label().into()),
        ]);
        let class_key = match self.kind {
            TransportKind::Highway => "highway_type",
            TransportKind::Railway => "railway_type",
            TransportKind::Airport => "aeroway_type",
        };
        if let Some(class) = &self.class {
            props.insert(class_key.to_string(), class.clone().into());
        }
        if let Some(iata) = &self.iata {
            props.insert("iata".to_string(), iata.clone().into());
        }
        if let Some(icao) = &self.icao {
            props.insert("icao".to_string(), icao.clone().into());
        }
        feature(geometry, props)
    }

    fn from_feature(feature: &Feature) -> Option<Self> {
        let type_label = prop_str(feature, "type")?;
        let (kind, class_key) = if type_label.starts_with("Highway") {
            (TransportKind::Highway, "highway_type")
        } else if type_label.starts_with("Railway") {
            (TransportKind::Railway, "railway_type")
        } else if type_label.starts_with("Airport") {
            (TransportKind::Airport, "aeroway_type")
        } else {
            return None;
        };

        let geometry = match &feature.geometry.as_ref()?.value {
            Value::Point(position) => TransportGeometry::Point(GeoPoint::from_position(position)?),
            Value::LineString(positions) => TransportGeometry::Line(
                positions
                    .iter()
                    .map(|p| GeoPoint::from_position(p))
                    .collect::<Option<Vec<_>>>()?,
            ),
            _ => return None,
        };

        let non_empty = |key: &str| {
            prop_str(feature, key)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Some(Self {
            name: prop_str(feature, "name")?.to_string(),
            kind,
            class: non_empty(class_key),
            geometry,
            iata: non_empty("iata"),
            icao: non_empty("icao"),
        })
    }
}

impl FeatureRecord for SeismicZone {
    fn to_feature(&self) -> Feature {
        let ring = match &self.footprint {
            SeismicFootprint::Bounds(bbox) => bbox.to_ring(),
            SeismicFootprint::Polygon(ring) => ring.clone(),
        };
        let mut props = object(vec![
            ("region", self.region.clone().into()),
            ("risk_level", self.risk_level.as_str().into()),
            ("score", self.score.into()),
        ]);
        if let Some(description) = &self.description {
            props.insert("description".to_string(), description.clone().into());
        }
        feature(Value::Polygon(vec![ring.to_positions()]), props)
    }

    fn from_feature(feature: &Feature) -> Option<Self> {
        let ring = match &feature.geometry.as_ref()?.value {
            Value::Polygon(rings) => Ring::from_positions(rings.first()?).ok()?,
            _ => return None,
        };
        Some(Self {
            region: prop_str(feature, "region")?.to_string(),
            footprint: SeismicFootprint::Polygon(ring),
            risk_level: prop_str(feature, "risk_level").and_then(RiskLevel::parse)?,
            score: prop_f64(feature, "score")?.clamp(0.0, 100.0),
            description: prop_str(feature, "description").map(str::to_string),
        })
    }
}

/// Curated population centers
pub fn curated_cities() -> Vec<City> {
    vec![
        City::new("Almaty", 43.2220, 76.8512, 2_000_000, 0.8),
        City::new("Nur-Sultan", 51.1694, 71.4491, 1_200_000, 0.6),
        City::new("Shymkent", 42.3417, 69.5901, 1_000_000, 0.7),
        City::new("Aktobe", 50.2839, 57.1670, 500_000, 0.5),
        City::new("Taraz", 42.9000, 71.3667, 400_000, 0.4),
        City::new("Pavlodar", 52.2856, 76.9749, 350_000, 0.6),
        City::new("Ust-Kamenogorsk", 49.9483, 82.6283, 300_000, 0.5),
        City::new("Karaganda", 49.8047, 73.1094, 500_000, 0.9),
        City::new("Aktau", 43.6500, 51.2000, 200_000, 0.8),
        City::new("Atyrau", 47.1164, 51.8830, 300_000, 0.7),
    ]
}

/// Last-resort cities
pub fn minimal_cities() -> Vec<City> {
    curated_cities().into_iter().take(2).collect()
}

/// Curated water sources
pub fn curated_water_sources() -> Vec<WaterSource> {
    vec![
        WaterSource::new("Lake Balkhash", 46.8, 74.5, "Large Lake", 95.0, 1000.0),
        WaterSource::new("Caspian Sea", 44.0, 51.0, "Sea", 100.0, 10000.0),
        WaterSource::new("Lake Alakol", 46.2, 81.5, "Lake", 80.0, 200.0),
        WaterSource::new("Irtysh River", 50.0, 82.0, "River", 85.0, 500.0),
        WaterSource::new("Ishim River", 51.5, 71.0, "River", 70.0, 150.0),
        WaterSource::new("Ili River", 43.5, 77.0, "River", 85.0, 300.0),
    ]
}

/// Last-resort water sources
pub fn minimal_water_sources() -> Vec<WaterSource> {
    curated_water_sources().into_iter().take(1).collect()
}

/// Coarse rectangular seismic regions, checked in this order
pub fn regional_seismic_zones() -> SeismicZones {
    let zone = |region: &str, lat: (f64, f64), lng: (f64, f64), risk_level, score| SeismicZone {
        region: region.to_string(),
        footprint: SeismicFootprint::Bounds(BoundingBox::new(lat.0, lat.1, lng.0, lng.1)),
        risk_level,
        score,
        description: None,
    };
    SeismicZones::new(vec![
        zone("East Kazakhstan", (49.0, 51.0), (80.0, 87.0), RiskLevel::High, 30.0),
        zone("Southeast", (42.0, 45.0), (75.0, 80.0), RiskLevel::MediumHigh, 50.0),
        zone("West Kazakhstan", (46.0, 52.0), (46.0, 60.0), RiskLevel::Low, 85.0),
        zone("North Kazakhstan", (50.0, 55.0), (60.0, 80.0), RiskLevel::Low, 85.0),
        zone("Central Kazakhstan", (45.0, 50.0), (65.0, 75.0), RiskLevel::Medium, 70.0),
    ])
}

/// Seismic zones traced along mapped fault systems and platforms
pub fn detailed_seismic_zones() -> SeismicZones {
    let zone = |region: &str, risk_level, score, description: &str, vertices: &[[f64; 2]]| SeismicZone {
        region: region.to_string(),
        footprint: SeismicFootprint::Polygon(Ring::closed(vertices.to_vec())),
        risk_level,
        score,
        description: Some(description.to_string()),
    };
    SeismicZones::new(vec![
        zone(
            "Almaty-Tien Shan Seismic Zone",
            RiskLevel::High,
            25.0,
            "Active fault systems along Tien Shan mountain range",
            &[
                [75.0, 42.5], [76.5, 42.8], [77.8, 43.0], [78.5, 43.3], [79.2, 43.8],
                [79.0, 44.3], [78.2, 44.5], [77.0, 44.2], [76.0, 43.8], [75.2, 43.2],
            ],
        ),
        zone(
            "East Kazakhstan-Altai Seismic Zone",
            RiskLevel::High,
            30.0,
            "Altai mountain region with complex fault networks",
            &[
                [82.0, 48.2], [84.5, 48.0], [86.2, 49.0], [86.8, 49.8],
                [86.5, 50.5], [85.0, 50.8], [83.5, 50.3], [82.5, 49.5],
            ],
        ),
        zone(
            "Balkhash-Alakol Moderate Zone",
            RiskLevel::Medium,
            65.0,
            "Transitional zone between stable platform and active margins",
            &[
                [74.0, 45.5], [78.0, 45.0], [81.0, 46.0], [82.5, 47.5],
                [82.0, 48.0], [79.0, 48.2], [76.5, 47.8], [74.5, 47.0],
            ],
        ),
        zone(
            "Central Kazakhstan Stable Platform",
            RiskLevel::Low,
            85.0,
            "Ancient crystalline basement with minimal seismic activity",
            &[
                [65.0, 46.5], [72.0, 46.8], [74.0, 48.0], [73.5, 50.5],
                [71.0, 52.0], [68.0, 52.5], [66.0, 51.0], [65.5, 48.5],
            ],
        ),
        zone(
            "West Kazakhstan-Caspian Stable Zone",
            RiskLevel::Low,
            80.0,
            "Caspian depression and Ural foreland with low seismic activity",
            &[
                [47.0, 44.0], [55.0, 44.5], [60.0, 46.0], [62.0, 48.0], [60.5, 50.0],
                [57.0, 51.5], [52.0, 52.0], [48.0, 50.5], [47.0, 47.0],
            ],
        ),
        zone(
            "North Kazakhstan Platform",
            RiskLevel::Low,
            88.0,
            "Stable Siberian platform extension with very low seismic risk",
            &[
                [60.0, 50.0], [70.0, 50.5], [75.0, 52.0], [76.0, 54.0],
                [74.0, 55.0], [68.0, 55.2], [62.0, 54.5], [60.0, 52.0],
            ],
        ),
        zone(
            "Mangystau Peninsula Moderate Zone",
            RiskLevel::Medium,
            70.0,
            "Coastal zone with moderate tectonic activity",
            &[
                [50.0, 42.5], [53.5, 42.0], [55.0, 43.5], [54.0, 45.0], [52.0, 45.5], [50.5, 44.0],
            ],
        ),
        zone(
            "South Kazakhstan Transitional Zone",
            RiskLevel::Medium,
            60.0,
            "Transitional area between Tien Shan and stable platform",
            &[
                [66.0, 40.8], [74.0, 41.0], [75.0, 42.5], [73.5, 43.5],
                [70.0, 43.8], [67.5, 43.0], [66.0, 42.0],
            ],
        ),
    ])
}

/// Last-resort transportation layer
pub fn major_airports() -> Vec<TransportFeature> {
    vec![
        TransportFeature::airport("Almaty International Airport", 43.3521, 77.0405, "ALA", "UAAA"),
        TransportFeature::airport("Nursultan Nazarbayev International Airport", 51.0222, 71.4669, "NQZ", "UACC"),
        TransportFeature::airport("Shymkent International Airport", 42.3642, 69.4789, "CIT", "UAII"),
    ]
}
