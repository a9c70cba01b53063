//! Site scoring implementation
//!
//! Ten closed-form criteria, each clamped to [0, 100], combined as a
//! weighted mean:
//! overall = round(Σ scoreᵢ·wᵢ / Σ wᵢ)
//!
//! Cost, timeline and revenue figures are deterministic heuristics, not
//! simulations.

use crate::reference::{City, WaterSource};
use chrono::{DateTime, Utc};
use geo_kernel::{ExclusionCheck, GeoPoint, RestrictionLevel, SeismicAssessment};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Default weights (9 decimal precision)
/// Sum = 1.000000000
pub const W_POPULATION_ACCESS: f64 = 0.150000000;
pub const W_WATER_SUPPLY: f64 = 0.120000000;
pub const W_SEISMIC_SAFETY: f64 = 0.100000000;
pub const W_ENVIRONMENTAL: f64 = 0.080000000;
pub const W_GRID_INTEGRATION: f64 = 0.100000000;
pub const W_TRANSPORTATION: f64 = 0.080000000;
pub const W_INDUSTRIAL_DEMAND: f64 = 0.120000000;
pub const W_ECONOMIC_VIABILITY: f64 = 0.100000000;
pub const W_PUBLIC_ACCEPTANCE: f64 = 0.050000000;
pub const W_EMERGENCY_PREPAREDNESS: f64 = 0.100000000;

/// Share of voters supporting construction in the October 2024 referendum
pub const PUBLIC_SUPPORT_PCT: f64 = 71.000000000;

/// Minimum distance from a population center considered safe (km)
pub const SAFE_POPULATION_DISTANCE_KM: f64 = 30.000000000;

/// Cities with existing high-voltage transmission
const GRID_CAPITALS: [&str; 3] = ["Almaty", "Nur-Sultan", "Shymkent"];

/// Road/rail hub bonus by city
const TRANSPORT_HUB_BONUS: [(&str, f64); 6] = [
    ("Almaty", 20.0),
    ("Nur-Sultan", 15.0),
    ("Shymkent", 15.0),
    ("Karaganda", 10.0),
    ("Aktobe", 10.0),
    ("Pavlodar", 10.0),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    PopulationAccess,
    WaterSupply,
    SeismicSafety,
    #[serde(rename = "environmental")]
    EnvironmentalImpact,
    GridIntegration,
    Transportation,
    IndustrialDemand,
    EconomicViability,
    PublicAcceptance,
    EmergencyPreparedness,
}

impl Criterion {
    pub const COUNT: usize = 10;

    pub const ALL: [Criterion; Criterion::COUNT] = [
        Criterion::PopulationAccess,
        Criterion::WaterSupply,
        Criterion::SeismicSafety,
        Criterion::EnvironmentalImpact,
        Criterion::GridIntegration,
        Criterion::Transportation,
        Criterion::IndustrialDemand,
        Criterion::EconomicViability,
        Criterion::PublicAcceptance,
        Criterion::EmergencyPreparedness,
    ];

    /// Stable key used in weight maps and persisted records
    pub fn key(&self) -> &'static str {
        match self {
            Self::PopulationAccess => "population_access",
            Self::WaterSupply => "water_supply",
            Self::SeismicSafety => "seismic_safety",
            Self::EnvironmentalImpact => "environmental",
            Self::GridIntegration => "grid_integration",
            Self::Transportation => "transportation",
            Self::IndustrialDemand => "industrial_demand",
            Self::EconomicViability => "economic_viability",
            Self::PublicAcceptance => "public_acceptance",
            Self::EmergencyPreparedness => "emergency_preparedness",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::PopulationAccess => "Population Access",
            Self::WaterSupply => "Water Supply",
            Self::SeismicSafety => "Seismic Safety",
            Self::EnvironmentalImpact => "Environmental Impact",
            Self::GridIntegration => "Grid Integration",
            Self::Transportation => "Transportation",
            Self::IndustrialDemand => "Industrial Demand",
            Self::EconomicViability => "Economic Viability",
            Self::PublicAcceptance => "Public Acceptance",
            Self::EmergencyPreparedness => "Emergency Preparedness",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::PopulationAccess => "Distance to major population centers",
            Self::WaterSupply => "Proximity to reliable water sources",
            Self::SeismicSafety => "Geological stability and earthquake risk",
            Self::EnvironmentalImpact => "Environmental protection requirements",
            Self::GridIntegration => "Electrical grid connectivity",
            Self::Transportation => "Road and rail infrastructure",
            Self::IndustrialDemand => "Industrial electricity demand",
            Self::EconomicViability => "Construction and operational costs",
            Self::PublicAcceptance => "Community support levels",
            Self::EmergencyPreparedness => "Emergency response capabilities",
        }
    }

    pub fn default_weight(&self) -> f64 {
        match self {
            Self::PopulationAccess => W_POPULATION_ACCESS,
            Self::WaterSupply => W_WATER_SUPPLY,
            Self::SeismicSafety => W_SEISMIC_SAFETY,
            Self::EnvironmentalImpact => W_ENVIRONMENTAL,
            Self::GridIntegration => W_GRID_INTEGRATION,
            Self::Transportation => W_TRANSPORTATION,
            Self::IndustrialDemand => W_INDUSTRIAL_DEMAND,
            Self::EconomicViability => W_ECONOMIC_VIABILITY,
            Self::PublicAcceptance => W_PUBLIC_ACCEPTANCE,
            Self::EmergencyPreparedness => W_EMERGENCY_PREPAREDNESS,
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key() == key)
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One weight per criterion, each in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct CriteriaWeights {
    values: [f64; Criterion::COUNT],
}

impl Default for CriteriaWeights {
    fn default() -> Self {
        Self {
            values: Criterion::ALL.map(|c| c.default_weight()),
        }
    }
}

impl CriteriaWeights {
    pub fn get(&self, criterion: Criterion) -> f64 {
        self.values[criterion.index()]
    }

    /// Set one weight, clamped to [0, 1]. Non-finite values are rejected.
    pub fn set(&mut self, criterion: Criterion, weight: f64) -> bool {
        if !weight.is_finite() {
            return false;
        }
        self.values[criterion.index()] = weight.clamp(0.0, 1.0);
        true
    }

    /// Apply a partial key → weight map.
    ///
    /// Unknown keys and non-finite values are skipped; the criteria that
    /// were actually changed are returned in key order.
    pub fn update(&mut self, partial: &BTreeMap<String, f64>) -> Vec<Criterion> {
        let mut applied = Vec::new();
        for (key, &weight) in partial {
            let Some(criterion) = Criterion::from_key(key) else {
                debug!("Ignoring unknown criterion '{}'", key);
                continue;
            };
            if self.set(criterion, weight) {
                applied.push(criterion);
            } else {
                debug!("Ignoring non-finite weight for {}", criterion);
            }
        }
        applied
    }

    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Criterion, f64)> + '_ {
        Criterion::ALL.into_iter().map(move |c| (c, self.get(c)))
    }
}

impl From<BTreeMap<String, f64>> for CriteriaWeights {
    fn from(map: BTreeMap<String, f64>) -> Self {
        let mut weights = Self::default();
        weights.update(&map);
        weights
    }
}

impl From<CriteriaWeights> for BTreeMap<String, f64> {
    fn from(weights: CriteriaWeights) -> Self {
        weights.iter().map(|(c, w)| (c.key().to_string(), w)).collect()
    }
}

/// Score for a single criterion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionResult {
    pub name: String,
    pub criterion: Criterion,
    pub score: f64,
    pub weight: f64,
    pub details: String,
}

/// Nearest city with its distance from the site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestCity {
    #[serde(flatten)]
    pub city: City,
    pub distance_km: f64,
}

/// Nearest water source with its distance from the site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestWater {
    #[serde(flatten)]
    pub source: WaterSource,
    pub distance_km: f64,
}

/// Everything the scorer needs about one site
#[derive(Debug, Clone)]
pub struct SiteContext {
    pub site: GeoPoint,
    pub nearest_city: NearestCity,
    pub nearest_water: NearestWater,
    pub seismic: SeismicAssessment,
    pub exclusion: ExclusionCheck,
    pub elevation_m: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationDetails {
    pub coordinates: GeoPoint,
    pub nearest_city: NearestCity,
    pub nearest_water: NearestWater,
    pub elevation_m: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationRisk {
    pub safe_distance: bool,
    pub distance_km: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub seismic: SeismicAssessment,
    pub environmental: ExclusionCheck,
    pub population: PopulationRisk,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub base_cost: f64,
    pub location_premium: f64,
    pub water_infrastructure: f64,
    pub seismic_reinforcement: f64,
}

/// Construction cost in billion USD
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub total_cost_billion_usd: f64,
    pub breakdown: CostBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelinePhases {
    pub site_preparation: f64,
    pub construction: f64,
    pub commissioning: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEstimate {
    pub total_years: f64,
    pub phases: TimelinePhases,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicAnalysis {
    pub cost_estimate: CostEstimate,
    pub timeline: TimelineEstimate,
    /// Million USD per year
    pub annual_revenue_estimate: f64,
}

/// A complete, immutable site evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteEvaluation {
    pub coordinates: GeoPoint,
    pub overall_score: u8,
    pub criteria: Vec<CriterionResult>,
    pub location_details: LocationDetails,
    pub risk_assessment: RiskAssessment,
    pub economic_analysis: EconomicAnalysis,
    pub created_at: DateTime<Utc>,
}

impl SiteEvaluation {
    pub fn criterion(&self, criterion: Criterion) -> Option<&CriterionResult> {
        self.criteria.iter().find(|c| c.criterion == criterion)
    }
}

fn clamp_score(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Score every criterion for a site
pub fn score_criteria(ctx: &SiteContext, weights: &CriteriaWeights) -> Vec<CriterionResult> {
    let city = &ctx.nearest_city;
    let water = &ctx.nearest_water;
    let city_km = city.distance_km;
    let water_km = water.distance_km;
    let industrial = city.city.industrial_factor;

    let raw = |criterion: Criterion| -> (f64, String) {
        match criterion {
            Criterion::PopulationAccess => (
                100.0 - city_km * 0.2,
                format!(
                    "{:.0}km from {} ({} people)",
                    city_km,
                    city.city.name,
                    group_thousands(city.city.population)
                ),
            ),
            Criterion::WaterSupply => (
                (100.0 - water_km * 0.5).max(0.0) * (water.source.reliability / 100.0),
                format!(
                    "{:.0}km from {} ({}% reliable)",
                    water_km, water.source.name, water.source.reliability
                ),
            ),
            Criterion::SeismicSafety => (
                ctx.seismic.score,
                format!("{} risk in {}", ctx.seismic.level, ctx.seismic.region),
            ),
            Criterion::EnvironmentalImpact => environmental_score(&ctx.exclusion),
            Criterion::GridIntegration => (
                grid_integration_score(city),
                format!("Transmission infrastructure to {}", city.city.name),
            ),
            Criterion::Transportation => (
                transportation_score(city),
                format!("Road/rail access via {}", city.city.name),
            ),
            Criterion::IndustrialDemand => (
                industrial_demand_score(city),
                format!("Industrial factor: {:.1}", industrial),
            ),
            Criterion::EconomicViability => (
                80.0 - (city_km * 0.1).min(30.0) - (water_km * 0.2).min(20.0)
                    - (100.0 - ctx.seismic.score) * 0.3
                    + industrial * 20.0,
                "Cost-benefit analysis score".to_string(),
            ),
            Criterion::PublicAcceptance => (
                PUBLIC_SUPPORT_PCT,
                "71% referendum support (Oct 2024)".to_string(),
            ),
            Criterion::EmergencyPreparedness => (
                100.0 - city_km * 0.3,
                format!("Emergency services in {}", city.city.name),
            ),
        }
    };

    Criterion::ALL
        .into_iter()
        .map(|criterion| {
            let (score, details) = raw(criterion);
            CriterionResult {
                name: criterion.name().to_string(),
                criterion,
                score: clamp_score(score),
                weight: weights.get(criterion),
                details,
            }
        })
        .collect()
}

fn environmental_score(check: &ExclusionCheck) -> (f64, String) {
    if !check.in_zone {
        return (90.0, "Clear area".to_string());
    }
    let level = check.restriction_level.unwrap_or(RestrictionLevel::High);
    let score = match level {
        RestrictionLevel::High => 10.0,
        RestrictionLevel::Medium => 40.0,
        RestrictionLevel::Low => 60.0,
    };
    let zone = check.zone_name.as_deref().unwrap_or("exclusion zone");
    (score, format!("In {} ({} restriction)", zone, level))
}

fn grid_integration_score(city: &NearestCity) -> f64 {
    let mut score = 100.0 - (city.distance_km * 0.15).min(50.0);
    if city.city.population > 500_000 {
        score += 10.0;
    }
    if GRID_CAPITALS.contains(&city.city.name.as_str()) {
        score += 15.0;
    }
    score
}

fn transportation_score(city: &NearestCity) -> f64 {
    let bonus = TRANSPORT_HUB_BONUS
        .iter()
        .find(|(name, _)| *name == city.city.name)
        .map(|(_, bonus)| *bonus)
        .unwrap_or(0.0);
    (100.0 - city.distance_km * 0.2).max(0.0) + bonus
}

fn industrial_demand_score(city: &NearestCity) -> f64 {
    clamp_score(50.0 + city.city.industrial_factor * 40.0 - city.distance_km * 0.1)
}

/// round(Σ score·weight / Σ weight); 0 when every weight is 0
pub fn overall_score(criteria: &[CriterionResult]) -> u8 {
    let total_weight: f64 = criteria.iter().map(|c| c.weight).sum();
    if total_weight <= 0.0 {
        return 0;
    }
    let weighted: f64 = criteria.iter().map(|c| c.score * c.weight).sum();
    clamp_score((weighted / total_weight).round()) as u8
}

pub fn estimate_cost(city_km: f64, water_km: f64, seismic_score: f64) -> CostEstimate {
    let base_cost = 10.0;
    let location_premium = (city_km * 0.01).min(2.0);
    let water_infrastructure = (water_km * 0.005).min(1.0);
    let seismic_reinforcement = (100.0 - seismic_score) * 0.02;

    CostEstimate {
        total_cost_billion_usd: round1(
            base_cost + location_premium + water_infrastructure + seismic_reinforcement,
        ),
        breakdown: CostBreakdown {
            base_cost,
            location_premium,
            water_infrastructure,
            seismic_reinforcement,
        },
    }
}

pub fn estimate_timeline(overall_score: u8) -> TimelineEstimate {
    let complexity = if overall_score >= 80 {
        0.9
    } else if overall_score >= 60 {
        1.0
    } else {
        1.2
    };
    let total = 10.0 * complexity;

    TimelineEstimate {
        total_years: round1(total),
        phases: TimelinePhases {
            site_preparation: 2.0,
            construction: round1(total - 4.0),
            commissioning: 2.0,
        },
    }
}

/// Annual revenue in million USD
pub fn estimate_revenue(population: u64, industrial_score: f64) -> f64 {
    let population_factor = (population as f64 / 1_000_000.0).min(2.0);
    (800.0 * (0.5 + 0.3 * population_factor + 0.2 * (industrial_score / 100.0))).round()
}

/// Score a site and assemble the full evaluation
pub fn evaluate_site(
    ctx: SiteContext,
    weights: &CriteriaWeights,
    created_at: DateTime<Utc>,
) -> SiteEvaluation {
    let criteria = score_criteria(&ctx, weights);
    let overall = overall_score(&criteria);

    let industrial_score = criteria
        .iter()
        .find(|c| c.criterion == Criterion::IndustrialDemand)
        .map(|c| c.score)
        .unwrap_or(0.0);

    let city_km = ctx.nearest_city.distance_km;
    let economic_analysis = EconomicAnalysis {
        cost_estimate: estimate_cost(city_km, ctx.nearest_water.distance_km, ctx.seismic.score),
        timeline: estimate_timeline(overall),
        annual_revenue_estimate: estimate_revenue(ctx.nearest_city.city.population, industrial_score),
    };

    debug!(
        "Scored ({:.4}, {:.4}): {} near {}",
        ctx.site.lat, ctx.site.lng, overall, ctx.nearest_city.city.name
    );

    SiteEvaluation {
        coordinates: ctx.site,
        overall_score: overall,
        criteria,
        risk_assessment: RiskAssessment {
            seismic: ctx.seismic,
            environmental: ctx.exclusion,
            population: PopulationRisk {
                safe_distance: city_km >= SAFE_POPULATION_DISTANCE_KM,
                distance_km: city_km,
            },
        },
        location_details: LocationDetails {
            coordinates: ctx.site,
            nearest_city: ctx.nearest_city,
            nearest_water: ctx.nearest_water,
            elevation_m: ctx.elevation_m,
        },
        economic_analysis,
        created_at,
    }
}

/// 1234567 → "1,234,567"
fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
