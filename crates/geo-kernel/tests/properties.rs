//! Property tests for the geometry primitives

use geo_kernel::{haversine_km, nearest_entity, BoundingBox, GeoPoint, PolygonSynthesizer};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn national_point() -> impl Strategy<Value = GeoPoint> {
    let b = BoundingBox::KAZAKHSTAN;
    (b.min_lat..=b.max_lat, b.min_lng..=b.max_lng).prop_map(|(lat, lng)| GeoPoint::new(lat, lng))
}

fn area_km2() -> impl Strategy<Value = f64> {
    prop_oneof![0.0..500.0, 500.0..5000.0, 5000.0..200_000.0]
}

const NAMES: &[&str] = &[
    "Altyn-Emel National Park",
    "Caspian Coastal Zakaznik",
    "Northern Steppe Reserve",
    "Unnamed Tract",
    "Korgalzhyn",
];

proptest! {
    #[test]
    fn distance_symmetric(a in national_point(), b in national_point()) {
        let ab = haversine_km(a, b);
        let ba = haversine_km(b, a);
        prop_assert!((ab - ba).abs() < 1e-9, "{} vs {}", ab, ba);
    }

    #[test]
    fn distance_to_self_is_zero(p in national_point()) {
        prop_assert!(haversine_km(p, p).abs() < 1e-9);
    }

    #[test]
    fn nearest_is_minimal_and_first(
        probe in national_point(),
        points in prop::collection::vec(national_point(), 1..20),
    ) {
        let nearest = nearest_entity(probe, &points).unwrap();
        for (i, p) in points.iter().enumerate() {
            let d = haversine_km(probe, *p);
            prop_assert!(nearest.distance_km <= d);
            if i < nearest.index {
                prop_assert!(d > nearest.distance_km);
            }
        }
    }

    #[test]
    fn synthesized_rings_are_closed(
        seed in any::<u64>(),
        name_idx in 0..NAMES.len(),
        area in area_km2(),
    ) {
        let mut synth = PolygonSynthesizer::new(ChaCha8Rng::seed_from_u64(seed));
        let poly = synth.synthesize(NAMES[name_idx], area);
        let vertices = poly.ring.vertices();
        prop_assert!(vertices.len() >= 4);
        prop_assert_eq!(vertices[0], vertices[vertices.len() - 1]);
    }

    #[test]
    fn containment_invariant_under_rotation(
        seed in any::<u64>(),
        area in area_km2(),
        shift in 0usize..12,
        probe in national_point(),
    ) {
        let mut synth = PolygonSynthesizer::new(ChaCha8Rng::seed_from_u64(seed));
        let ring = synth.synthesize("Unnamed Tract", area).ring;
        let rotated = ring.rotated(shift);
        prop_assert_eq!(ring.contains(probe), rotated.contains(probe));
        prop_assert_eq!(ring.contains(poly_center(&ring)), rotated.contains(poly_center(&ring)));
    }

    #[test]
    fn seeded_synthesizers_agree(seed in any::<u64>(), area in area_km2()) {
        let a = PolygonSynthesizer::new(ChaCha8Rng::seed_from_u64(seed)).synthesize("Unnamed Tract", area);
        let b = PolygonSynthesizer::new(ChaCha8Rng::seed_from_u64(seed)).synthesize("Unnamed Tract", area);
        prop_assert_eq!(a, b);
    }
}

/// Vertex centroid of the open ring
fn poly_center(ring: &geo_kernel::Ring) -> GeoPoint {
    let open = &ring.vertices()[..ring.len() - 1];
    let n = open.len() as f64;
    let lng = open.iter().map(|v| v[0]).sum::<f64>() / n;
    let lat = open.iter().map(|v| v[1]).sum::<f64>() / n;
    GeoPoint::new(lat, lng)
}
