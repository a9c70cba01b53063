//! Site elevation lookup
//!
//! Elevation only feeds the location details of an evaluation, so every
//! failure degrades to [`DEFAULT_ELEVATION_M`] instead of failing the
//! evaluation.

use crate::{Result, SelectorError};
use geo_kernel::GeoPoint;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_ELEVATION_M: f64 = 500.000000000;

pub trait ElevationLookup {
    /// Elevation in meters above sea level
    fn elevation_m(&self, point: GeoPoint) -> f64;
}

/// Constant elevation, used offline and in tests
#[derive(Debug, Clone, Copy)]
pub struct FixedElevation(pub f64);

impl Default for FixedElevation {
    fn default() -> Self {
        Self(DEFAULT_ELEVATION_M)
    }
}

impl ElevationLookup for FixedElevation {
    fn elevation_m(&self, _point: GeoPoint) -> f64 {
        self.0
    }
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    results: Vec<LookupResult>,
}

#[derive(Debug, Deserialize)]
struct LookupResult {
    elevation: f64,
}

/// Open-Elevation client
pub struct OpenElevation {
    url: String,
    client: reqwest::blocking::Client,
}

impl OpenElevation {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SelectorError::Remote(format!("HTTP client init failed: {e}")))?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }

    pub fn fetch(&self, point: GeoPoint) -> Result<f64> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("locations", format!("{},{}", point.lat, point.lng))])
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| SelectorError::Remote(format!("elevation request failed: {e}")))?;
        let body = response
            .json::<LookupResponse>()
            .map_err(|e| SelectorError::Remote(format!("elevation response parse failed: {e}")))?;
        body.results
            .first()
            .map(|r| r.elevation)
            .ok_or_else(|| SelectorError::Remote("elevation response has no results".to_string()))
    }
}

impl ElevationLookup for OpenElevation {
    fn elevation_m(&self, point: GeoPoint) -> f64 {
        match self.fetch(point) {
            Ok(elevation) => {
                debug!("Elevation at ({}, {}): {} m", point.lat, point.lng, elevation);
                elevation
            }
            Err(e) => {
                warn!("{}, using {} m", e, DEFAULT_ELEVATION_M);
                DEFAULT_ELEVATION_M
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_default() {
        assert_eq!(FixedElevation::default().elevation_m(GeoPoint::new(43.0, 77.0)), 500.0);
        assert_eq!(FixedElevation(812.0).elevation_m(GeoPoint::new(43.0, 77.0)), 812.0);
    }

    #[test]
    fn test_response_shape() {
        let body: LookupResponse = serde_json::from_str(
            r#"{"results": [{"latitude": 43.25, "longitude": 76.95, "elevation": 786.0}]}"#,
        )
        .unwrap();
        assert_eq!(body.results[0].elevation, 786.0);
    }
}
