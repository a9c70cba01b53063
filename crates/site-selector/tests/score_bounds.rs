use geo_kernel::{BoundingBox, GeoPoint};
use proptest::prelude::*;
use site_selector::store::{MemoryEvaluationLog, MemoryWeightStore};
use site_selector::{CriteriaWeights, Criterion, SelectorConfig, SiteSelector};
use tempfile::TempDir;

fn national_site() -> impl Strategy<Value = GeoPoint> {
    let b = BoundingBox::KAZAKHSTAN;
    (b.min_lat..=b.max_lat, b.min_lng..=b.max_lng).prop_map(|(lat, lng)| GeoPoint::new(lat, lng))
}

fn weights() -> impl Strategy<Value = CriteriaWeights> {
    prop::collection::vec(0.0f64..=1.0, Criterion::COUNT).prop_map(|values| {
        let mut weights = CriteriaWeights::default();
        for (criterion, value) in Criterion::ALL.into_iter().zip(values) {
            weights.set(criterion, value);
        }
        weights
    })
}

fn offline_selector(dir: &TempDir) -> SiteSelector {
    let mut config = SelectorConfig::default();
    config.cache.dir = dir.path().to_path_buf();
    config.remote.enabled = false;
    config.exclusion.geojson_path = None;
    config.exclusion.protected_areas_path = None;
    config.seed = Some(7);
    SiteSelector::from_config(config)
        .unwrap()
        .with_evaluation_log(Box::new(MemoryEvaluationLog::new()))
        .with_weight_store(Box::new(MemoryWeightStore::new()))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn overall_score_in_range(site in national_site()) {
        let dir = TempDir::new().unwrap();
        let mut selector = offline_selector(&dir);
        let evaluation = selector.evaluate(site).unwrap();
        prop_assert!(evaluation.overall_score <= 100);
        for criterion in &evaluation.criteria {
            prop_assert!((0.0..=100.0).contains(&criterion.score), "{} = {}", criterion.name, criterion.score);
        }
    }

    #[test]
    fn custom_weights_keep_score_in_range(site in national_site(), weights in weights()) {
        let dir = TempDir::new().unwrap();
        let mut selector = offline_selector(&dir);
        let evaluation = selector.evaluate_with_weights(site, &weights).unwrap();
        prop_assert!(evaluation.overall_score <= 100);
    }
}
