//! Shared fixtures for the integration tests
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::path::Path;
use std::sync::Arc;

use renewables_forecast::config::{Config, ForecastConfig};
use renewables_forecast::domain::{Observation, RegionEntry, RegionRegistry};
use renewables_forecast::forecast::{RadiationSource, WeatherSource, WeatherTable};
use renewables_forecast::ml::booster::GbmParams;
use renewables_forecast::pipeline::{synth, Pipeline};
use renewables_forecast::repo::export_history;
use renewables_forecast::repo::registry::save_registry;

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

/// Deterministic hourly weather covering January and February 2025
pub struct StubWeather;

impl StubWeather {
    fn table() -> WeatherTable {
        let mut table = WeatherTable::new(vec![
            "temperature_2m".into(),
            "wind_speed_100m".into(),
            "shortwave_radiation".into(),
        ]);
        for h in 0..(59 * 24) {
            let ts = start() + Duration::hours(h);
            let hour = (h % 24) as f64;
            table.insert(
                ts,
                vec![
                    Some(2.0 + hour * 0.2),
                    Some(8.0 + (h % 7) as f64),
                    Some(if (6.0..18.0).contains(&hour) { 120.0 } else { 0.0 }),
                ],
            );
        }
        table
    }
}

#[async_trait]
impl WeatherSource for StubWeather {
    async fn forecast(&self, _lat: f64, _lon: f64, _days: u32) -> Result<WeatherTable> {
        Ok(Self::table())
    }

    async fn history(&self, _lat: f64, _lon: f64, _start: NaiveDate, _end: NaiveDate) -> Result<WeatherTable> {
        Ok(Self::table())
    }
}

pub struct StubRadiation(pub Option<f64>);

#[async_trait]
impl RadiationSource for StubRadiation {
    async fn mean_irradiance(&self, _lat: f64, _lon: f64) -> Result<Option<f64>> {
        Ok(self.0)
    }
}

pub fn registry() -> RegionRegistry {
    RegionRegistry::new(vec![
        RegionEntry::new("north", 55.7, 12.6),
        RegionEntry::new("south", 48.1, 11.6),
    ])
}

/// 21 days of synthetic history for both registry regions
pub fn history() -> Vec<Observation> {
    let end = start() + Duration::hours(21 * 24 - 1);
    synth::generate(&registry(), start(), end, synth::DEFAULT_SEED).unwrap()
}

/// Config whose paths all live under `dir`, with a small booster
pub fn config(dir: &Path) -> Config {
    let mut cfg = Config::default();
    cfg.paths.data = dir.join("history.csv");
    cfg.paths.registry = dir.join("regions.json");
    cfg.paths.model_dir = dir.join("models");
    cfg.paths.out_dir = dir.join("out");
    cfg.forecast = ForecastConfig {
        lags: vec![1, 24, 48],
        min_history_days: 7,
        gbm: GbmParams {
            max_iter: 15,
            min_samples_leaf: 10,
            max_bins: 32,
            ..GbmParams::default()
        },
        ..ForecastConfig::default()
    };
    cfg
}

/// Write `history` and the test registry under `dir` and build a pipeline on stubs
pub fn pipeline(dir: &Path, history: &[Observation]) -> Pipeline {
    let cfg = config(dir);
    export_history(history, &cfg.paths.data).unwrap();
    save_registry(&registry(), &cfg.paths.registry).unwrap();
    Pipeline::new(cfg, Arc::new(StubWeather), Arc::new(StubRadiation(Some(150.0))))
}
