//! End-to-end train and forecast runs over the configured files

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::domain::{ForecastRow, Observation, RegionRegistry};
use crate::forecast::{
    daily_map_frames, enrich_registry, render_map_gif, Forecaster, OpenMeteoClient, PvgisClient, RadiationSource, RegionWeather,
    WeatherSource,
};
use crate::ml::training::Trainer;
use crate::repo::registry::{load_registry, save_registry};
use crate::repo::{load_history, FileModelStore};

pub mod synth;

/// File name of the map animation when none is given
pub const DEFAULT_MAP_GIF: &str = "regional_animation.gif";

/// Training inputs; unset fields fall back to the configured paths and the
/// history's own date span.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainRequest {
    pub data_path: Option<PathBuf>,
    pub registry_path: Option<PathBuf>,
    pub model_dir: Option<PathBuf>,
    pub history_start: Option<NaiveDate>,
    pub history_end: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainSummary {
    pub status: String,
    pub models_dir: String,
    pub groups_trained: usize,
}

pub struct Pipeline {
    cfg: Config,
    weather: Arc<dyn WeatherSource>,
    radiation: Arc<dyn RadiationSource>,
}

impl Pipeline {
    pub fn new(cfg: Config, weather: Arc<dyn WeatherSource>, radiation: Arc<dyn RadiationSource>) -> Self {
        Self {
            cfg,
            weather,
            radiation,
        }
    }

    /// Pipeline backed by Open-Meteo and PVGIS
    pub fn from_config(cfg: Config) -> Result<Self> {
        let weather = Arc::new(OpenMeteoClient::new(&cfg.weather)?);
        let radiation = Arc::new(PvgisClient::new(&cfg.radiation)?);
        Ok(Self::new(cfg, weather, radiation))
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// 7-day forecast for every trained group in the configured history
    pub async fn forecast(&self) -> Result<Vec<ForecastRow>> {
        let history = load_history(&self.cfg.paths.data)?;
        let registry = load_registry(&self.cfg.paths.registry)?;
        let store = FileModelStore::new(&self.cfg.paths.model_dir);
        let forecaster = Forecaster::new(self.cfg.forecast.clone(), self.weather.clone());
        Ok(forecaster.forecast_per_group(&history, &registry, &store).await)
    }

    pub fn registry(&self) -> Result<RegionRegistry> {
        load_registry(&self.cfg.paths.registry)
    }

    /// Render the daily map animation of `rows` to `out_dir/gif_name`
    pub async fn render_map(&self, rows: &[ForecastRow], out_dir: &Path, gif_name: &str) -> Result<PathBuf> {
        let registry = self.registry()?;
        let frames = daily_map_frames(rows, &registry);
        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("failed to create {}", out_dir.display()))?;
        let path = out_dir.join(gif_name);

        let target = path.clone();
        let n_frames = frames.len();
        tokio::task::spawn_blocking(move || render_map_gif(&frames, &registry, &target))
            .await
            .context("map rendering task panicked")??;

        info!(path = %path.display(), frames = n_frames, "wrote map animation");
        Ok(path)
    }

    /// Enrich the registry, fetch historical weather, train every group and
    /// save the enriched registry.
    pub async fn train(&self, req: TrainRequest) -> Result<TrainSummary> {
        let data_path = req.data_path.unwrap_or_else(|| self.cfg.paths.data.clone());
        let registry_path = req.registry_path.unwrap_or_else(|| self.cfg.paths.registry.clone());
        let model_dir = req.model_dir.unwrap_or_else(|| self.cfg.paths.model_dir.clone());

        let history = load_history(&data_path)?;
        let mut registry = load_registry(&registry_path)?;
        enrich_registry(&mut registry, self.radiation.as_ref()).await;

        let span = history_span(&history);
        let start = req.history_start.or(span.map(|s| s.0));
        let end = req.history_end.or(span.map(|s| s.1));
        let weather = match (start, end) {
            (Some(start), Some(end)) if start <= end => self.fetch_history_weather(&registry, start, end).await,
            (Some(start), Some(end)) => anyhow::bail!("history_start {start} is after history_end {end}"),
            _ => RegionWeather::new(),
        };

        let trainer = Trainer::new(self.cfg.forecast.clone());
        let store = FileModelStore::new(&model_dir);
        let (manifest, registry) = tokio::task::spawn_blocking(move || {
            trainer
                .train_per_group(&history, &registry, &weather, &store)
                .map(|m| (m, registry))
        })
        .await
        .context("training task panicked")??;

        save_registry(&registry, &registry_path)?;

        Ok(TrainSummary {
            status: "ok".to_string(),
            models_dir: model_dir.display().to_string(),
            groups_trained: manifest.len(),
        })
    }

    /// Historical weather per region; regions whose fetch fails train without it
    async fn fetch_history_weather(
        &self,
        registry: &RegionRegistry,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RegionWeather {
        let mut weather = RegionWeather::new();
        for entry in registry.iter() {
            match self.weather.history(entry.lat, entry.lon, start, end).await {
                Ok(table) => {
                    weather.insert(entry.region.clone(), table);
                }
                Err(e) => {
                    warn!(region = %entry.region, error = %e, "historical weather unavailable");
                }
            }
        }
        info!(regions = weather.len(), %start, %end, "fetched historical weather");
        weather
    }
}

fn history_span(history: &[Observation]) -> Option<(NaiveDate, NaiveDate)> {
    let first = history.first()?.timestamp.date_naive();
    let last = history.last()?.timestamp.date_naive();
    Some((first, last))
}
