//! Lag features never read across group boundaries

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use renewables_forecast::domain::{Observation, Source};
use renewables_forecast::forecast::features::{add_lag_features, lag_column, FeatureFrame};

fn series(region: &str, source: Source, values: &[f64]) -> Vec<Observation> {
    let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
    values
        .iter()
        .enumerate()
        .map(|(h, mw)| Observation::new(t0 + Duration::hours(h as i64), region, source, *mw))
        .collect()
}

fn lags_of(frame: &FeatureFrame, offset: usize, region: &str, source: Source) -> Vec<Option<f64>> {
    let col = lag_column(offset);
    (0..frame.len())
        .filter(|&i| frame.regions[i] == region && frame.sources[i] == source)
        .map(|i| frame.value(&col, i))
        .collect()
}

proptest! {
    #[test]
    fn lag_features_are_independent_of_other_groups(
        a in prop::collection::vec(0.0f64..100.0, 1..80),
        b in prop::collection::vec(0.0f64..100.0, 1..80),
        offset in 1usize..30,
    ) {
        let alone = add_lag_features(
            FeatureFrame::from_observations(&series("north", Source::Solar, &a)),
            &[offset],
        );

        let mut mixed = series("north", Source::Solar, &a);
        mixed.extend(series("north", Source::Wind, &b));
        mixed.extend(series("south", Source::Solar, &b));
        mixed.sort_by_key(|o| o.timestamp);
        let mixed = add_lag_features(FeatureFrame::from_observations(&mixed), &[offset]);

        let expected = lags_of(&alone, offset, "north", Source::Solar);
        prop_assert_eq!(&lags_of(&mixed, offset, "north", Source::Solar), &expected);

        for (k, lag) in expected.iter().enumerate() {
            if k < offset {
                prop_assert!(lag.is_none());
            } else {
                prop_assert_eq!(*lag, Some(a[k - offset]));
            }
        }
    }
}
