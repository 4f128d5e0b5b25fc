//! Train-then-forecast runs through the file-backed pipeline

mod common;

use chrono::Duration;
use std::collections::BTreeMap;

use renewables_forecast::domain::{GroupKey, Observation, Source};
use renewables_forecast::forecast::{enrichment, peak_hours};
use renewables_forecast::pipeline::TrainRequest;
use renewables_forecast::repo::registry::load_registry;
use renewables_forecast::repo::{FileModelStore, ModelStore};

#[tokio::test]
async fn test_every_trained_group_is_forecast() {
    let dir = tempfile::tempdir().unwrap();
    let history = common::history();
    let pipeline = common::pipeline(dir.path(), &history);

    let summary = pipeline.train(TrainRequest::default()).await.unwrap();
    assert_eq!(summary.status, "ok");
    assert_eq!(summary.groups_trained, 4);

    let manifest = FileModelStore::new(dir.path().join("models"))
        .read_manifest()
        .unwrap()
        .unwrap();
    assert_eq!(manifest.len(), 4);

    let rows = pipeline.forecast().await.unwrap();
    let mut per_group: BTreeMap<GroupKey, usize> = BTreeMap::new();
    for row in &rows {
        *per_group.entry(row.group_key()).or_default() += 1;
        assert!(row.mw_hat.is_finite());
        assert!(row.mw_lo.is_finite() && row.mw_hi.is_finite());
    }
    assert_eq!(per_group.len(), 4);
    for key in manifest.keys() {
        assert_eq!(per_group.get(&key), Some(&168), "group {key}");
    }

    let last = history.last().unwrap().timestamp;
    let first_hour = rows.iter().map(|r| r.timestamp).min().unwrap();
    assert_eq!(first_hour, last + Duration::hours(1));

    // 4 groups over 7 or 8 calendar days
    let peaks = peak_hours(&rows);
    assert!(peaks.len() >= 4 * 7);
}

#[tokio::test]
async fn test_training_enriches_registry() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = common::pipeline(dir.path(), &common::history());
    pipeline.train(TrainRequest::default()).await.unwrap();

    let registry = load_registry(&dir.path().join("regions.json")).unwrap();
    let north = registry.get("north").unwrap();
    assert_eq!(north.static_value(enrichment::PVGIS_FEATURE), Some(150.0));
    let speed = north.static_value(enrichment::WIND_ATLAS_FEATURE).unwrap();
    assert!((speed - enrichment::wind_atlas_mean_speed(north.lat)).abs() < 1e-9);
}

#[tokio::test]
async fn test_retraining_gives_identical_forecast() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = common::pipeline(dir.path(), &common::history());

    pipeline.train(TrainRequest::default()).await.unwrap();
    let first = pipeline.forecast().await.unwrap();
    pipeline.train(TrainRequest::default()).await.unwrap();
    let second = pipeline.forecast().await.unwrap();

    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_short_group_is_not_trained_or_forecast() {
    let dir = tempfile::tempdir().unwrap();
    let mut history = common::history();
    let t0 = common::start();
    // a third region with only a day of data
    let tiny: Vec<Observation> = (0..24)
        .map(|h| Observation::new(t0 + Duration::hours(h), "tiny", Source::Wind, 3.0))
        .collect();
    history.extend(tiny);
    history.sort_by_key(|o| o.timestamp);

    let pipeline = common::pipeline(dir.path(), &history);
    let summary = pipeline.train(TrainRequest::default()).await.unwrap();
    assert_eq!(summary.groups_trained, 4);

    let manifest = FileModelStore::new(dir.path().join("models"))
        .read_manifest()
        .unwrap()
        .unwrap();
    assert!(!manifest.contains(&GroupKey::new("tiny", Source::Wind)));

    let rows = pipeline.forecast().await.unwrap();
    assert!(rows.iter().all(|r| r.region != "tiny"));
}

#[tokio::test]
async fn test_empty_history_trains_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = common::pipeline(dir.path(), &[]);

    let summary = pipeline.train(TrainRequest::default()).await.unwrap();
    assert_eq!(summary.groups_trained, 0);

    let manifest = FileModelStore::new(dir.path().join("models"))
        .read_manifest()
        .unwrap()
        .unwrap();
    assert!(manifest.is_empty());
    assert!(pipeline.forecast().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reversed_history_window_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = common::pipeline(dir.path(), &common::history());
    let req = TrainRequest {
        history_start: chrono::NaiveDate::from_ymd_opt(2025, 2, 1),
        history_end: chrono::NaiveDate::from_ymd_opt(2025, 1, 1),
        ..TrainRequest::default()
    };
    assert!(pipeline.train(req).await.is_err());
}
