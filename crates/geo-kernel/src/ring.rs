//! Closed polygon rings and even-odd containment
//!
//! A ring is a sequence of `[lng, lat]` vertices whose first vertex repeats
//! as the last. Only outer rings are modelled; holes are not supported.
//!
//! # Edge Convention
//!
//! An edge is counted when the test latitude lies in the half-open interval
//! `(min(edge_lat), max(edge_lat)]`. Points sitting exactly on a boundary may
//! therefore classify either way depending on which edge they touch.

use crate::{GeoError, GeoPoint, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<[f64; 2]>", into = "Vec<[f64; 2]>")]
pub struct Ring {
    vertices: Vec<[f64; 2]>,
}

impl Ring {
    /// Minimum vertex count of a closed ring (triangle + closing vertex)
    pub const MIN_VERTICES: usize = 4;

    /// Validate an already-closed vertex list
    pub fn new(vertices: Vec<[f64; 2]>) -> Result<Self> {
        if vertices.len() < Self::MIN_VERTICES || vertices.first() != vertices.last() {
            return Err(GeoError::OpenRing(vertices.len()));
        }
        Ok(Self { vertices })
    }

    /// Close the vertex list if needed.
    ///
    /// Callers must supply at least three distinct vertices; shorter inputs
    /// produce a ring that [`Ring::is_valid`] rejects.
    pub fn closed(mut vertices: Vec<[f64; 2]>) -> Self {
        if let (Some(first), Some(last)) = (vertices.first().copied(), vertices.last().copied()) {
            if first != last {
                vertices.push(first);
            }
        }
        Self { vertices }
    }

    /// Build from GeoJSON positions, closing the ring on ingest
    pub fn from_positions(positions: &[Vec<f64>]) -> Result<Self> {
        let vertices: Vec<[f64; 2]> = positions
            .iter()
            .filter_map(|p| match p.as_slice() {
                [lng, lat, ..] => Some([*lng, *lat]),
                _ => None,
            })
            .collect();

        if vertices.len() != positions.len() {
            return Err(GeoError::InvalidCoordinates(
                "ring position with fewer than two ordinates".to_string(),
            ));
        }

        let ring = Self::closed(vertices);
        if ring.is_valid() {
            Ok(ring)
        } else {
            Err(GeoError::OpenRing(ring.len()))
        }
    }

    pub fn to_positions(&self) -> Vec<Vec<f64>> {
        self.vertices.iter().map(|v| v.to_vec()).collect()
    }

    pub fn vertices(&self) -> &[[f64; 2]] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        !self.vertices.is_empty() && self.vertices.first() == self.vertices.last()
    }

    pub fn is_valid(&self) -> bool {
        self.is_closed() && self.vertices.len() >= Self::MIN_VERTICES
    }

    /// Same ring traced from a different starting vertex
    pub fn rotated(&self, shift: usize) -> Self {
        let open = &self.vertices[..self.vertices.len().saturating_sub(1)];
        if open.is_empty() {
            return self.clone();
        }
        let shift = shift % open.len();
        let mut vertices: Vec<[f64; 2]> = open[shift..].iter().chain(&open[..shift]).copied().collect();
        vertices.push(vertices[0]);
        Self { vertices }
    }

    /// Even-odd ray casting, x = lng, y = lat
    pub fn contains(&self, point: GeoPoint) -> bool {
        let n = self.vertices.len();
        if n == 0 {
            return false;
        }

        let (x, y) = (point.lng, point.lat);
        let mut inside = false;
        let [mut p1x, mut p1y] = self.vertices[0];

        for i in 1..=n {
            let [p2x, p2y] = self.vertices[i % n];
            if y > p1y.min(p2y) && y <= p1y.max(p2y) && x <= p1x.max(p2x) {
                // p1y != p2y is implied by the half-open interval test
                let crosses = if p1x == p2x {
                    true
                } else {
                    let x_intercept = (y - p1y) * (p2x - p1x) / (p2y - p1y) + p1x;
                    x <= x_intercept
                };
                if crosses {
                    inside = !inside;
                }
            }
            p1x = p2x;
            p1y = p2y;
        }

        inside
    }
}

impl TryFrom<Vec<[f64; 2]>> for Ring {
    type Error = GeoError;

    fn try_from(vertices: Vec<[f64; 2]>) -> Result<Self> {
        Ring::new(vertices)
    }
}

impl From<Ring> for Vec<[f64; 2]> {
    fn from(ring: Ring) -> Self {
        ring.vertices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Ring {
        Ring::closed(vec![[76.6, 43.0], [77.2, 43.0], [77.2, 43.4], [76.6, 43.4]])
    }

    #[test]
    fn test_closed_appends_first_vertex() {
        let ring = square();
        assert_eq!(ring.len(), 5);
        assert!(ring.is_closed());
        assert!(ring.is_valid());
    }

    #[test]
    fn test_new_rejects_open_ring() {
        let err = Ring::new(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]).unwrap_err();
        assert_eq!(err, GeoError::OpenRing(4));
    }

    #[test]
    fn test_contains_interior_and_exterior() {
        let ring = square();
        assert!(ring.contains(GeoPoint::new(43.2, 76.85)));
        assert!(!ring.contains(GeoPoint::new(43.5, 76.85)));
        assert!(!ring.contains(GeoPoint::new(43.2, 77.3)));
    }

    #[test]
    fn test_edge_convention() {
        let ring = Ring::closed(vec![[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0]]);
        // lower edge excluded, upper edge included
        assert!(!ring.contains(GeoPoint::new(0.0, 1.0)));
        assert!(ring.contains(GeoPoint::new(2.0, 1.0)));
        assert!(!ring.contains(GeoPoint::new(0.0, -1.0)));
    }

    #[test]
    fn test_concave_ring() {
        // U shape open to the north
        let ring = Ring::closed(vec![
            [0.0, 0.0],
            [3.0, 0.0],
            [3.0, 3.0],
            [2.0, 3.0],
            [2.0, 1.0],
            [1.0, 1.0],
            [1.0, 3.0],
            [0.0, 3.0],
        ]);
        assert!(ring.contains(GeoPoint::new(2.0, 0.5)));
        assert!(!ring.contains(GeoPoint::new(2.0, 1.5)));
        assert!(ring.contains(GeoPoint::new(2.0, 2.5)));
    }

    #[test]
    fn test_rotation_preserves_containment() {
        let ring = square();
        let inside = GeoPoint::new(43.2, 76.85);
        let outside = GeoPoint::new(44.0, 76.85);
        for shift in 0..4 {
            let rotated = ring.rotated(shift);
            assert!(rotated.is_valid());
            assert!(rotated.contains(inside));
            assert!(!rotated.contains(outside));
        }
    }

    #[test]
    fn test_from_positions_closes() {
        let positions = vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![1.0, 1.0]];
        let ring = Ring::from_positions(&positions).unwrap();
        assert_eq!(ring.len(), 4);
        assert_eq!(ring.to_positions()[3], vec![0.0, 0.0]);
    }

    #[test]
    fn test_from_positions_rejects_degenerate() {
        let positions = vec![vec![0.0, 0.0], vec![1.0, 0.0]];
        assert!(Ring::from_positions(&positions).is_err());
    }
}
