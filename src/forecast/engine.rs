use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::features::{build_features, lag_column, FeatureFrame};
use super::weather::WeatherSource;
use crate::config::ForecastConfig;
use crate::domain::{group_observations, ForecastRow, GroupKey, Observation, RegionRegistry};
use crate::error::GroupError;
use crate::ml::models::{GroupModel, QuantileModel, RowPredictor};
use crate::repo::ModelStore;

/// Most recent target values of one group, newest at the back
#[derive(Debug, Clone, PartialEq)]
pub struct LagBuffer {
    values: VecDeque<f64>,
    capacity: usize,
}

impl LagBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Buffer holding the last `capacity` values of `history`
    pub fn seeded(capacity: usize, history: &[f64]) -> Self {
        let mut buffer = Self::new(capacity);
        let start = history.len().saturating_sub(capacity);
        for v in &history[start..] {
            buffer.push(*v);
        }
        buffer
    }

    /// Append a value, evicting the oldest when full
    pub fn push(&mut self, value: f64) {
        if self.capacity == 0 {
            return;
        }
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// The `n`-th most recent value (n = 1 is the latest)
    pub fn at_offset(&self, n: usize) -> Option<f64> {
        if n == 0 || n > self.values.len() {
            return None;
        }
        self.values.get(self.values.len() - n).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.values.iter()
    }
}

/// Predict the frame one row at a time, feeding each prediction back as the
/// newest lag value for the rows after it.
///
/// For every step the lag columns are set from the buffer, the row is
/// forward/backward filled across the frame, and the point model predicts
/// with `features` as column order. Returns the predictions and the final
/// buffer.
pub fn run_autoregressive(
    frame: &mut FeatureFrame,
    model: &dyn GroupModel,
    features: &[String],
    lags: &[usize],
    mut buffer: LagBuffer,
) -> Result<(Vec<f64>, LagBuffer)> {
    let lag_names: Vec<String> = lags.iter().map(|l| lag_column(*l)).collect();
    for name in &lag_names {
        if frame.column(name).is_none() {
            frame.set_column(name, vec![None; frame.len()]);
        }
    }

    let predictor = model.predictor()?;
    let mut predictions = Vec::with_capacity(frame.len());
    for step in 0..frame.len() {
        for (name, &lag) in lag_names.iter().zip(lags) {
            frame.set_value(name, step, buffer.at_offset(lag));
        }
        let row = frame.filled_row_vector(features, step);
        let prediction = predictor.predict_row(&row)?;
        buffer.push(prediction);
        predictions.push(prediction);
    }
    Ok((predictions, buffer))
}

/// Hourly timestamps following `last`
pub fn horizon_timestamps(last: DateTime<Utc>, hours: usize) -> Vec<DateTime<Utc>> {
    (1..=hours as i64).map(|h| last + Duration::hours(h)).collect()
}

/// Per-group multi-step forecaster
pub struct Forecaster {
    config: ForecastConfig,
    weather: Arc<dyn WeatherSource>,
}

impl Forecaster {
    pub fn new(config: ForecastConfig, weather: Arc<dyn WeatherSource>) -> Self {
        Self { config, weather }
    }

    /// Forecast every group in `history` that has a persisted point model.
    ///
    /// Groups are processed one at a time in sorted order. A failing group is
    /// logged and left out; the run itself never fails.
    pub async fn forecast_per_group(
        &self,
        history: &[Observation],
        registry: &RegionRegistry,
        store: &dyn ModelStore,
    ) -> Vec<ForecastRow> {
        let mut rows = Vec::new();
        for (key, group) in group_observations(history) {
            match self.forecast_group(&key, &group, registry, store).await {
                Ok(group_rows) => {
                    debug!(region = %key.region, source = %key.source, rows = group_rows.len(), "forecast group");
                    rows.extend(group_rows);
                }
                Err(GroupError::MissingArtifact { kind }) => {
                    debug!(region = %key.region, source = %key.source, %kind, "no trained model, skipping group");
                }
                Err(e) => {
                    warn!(
                        region = %key.region,
                        source = %key.source,
                        reason = e.label(),
                        error = %e,
                        "group forecast skipped"
                    );
                }
            }
        }
        info!(rows = rows.len(), "forecast complete");
        rows
    }

    async fn forecast_group(
        &self,
        key: &GroupKey,
        history: &[Observation],
        registry: &RegionRegistry,
        store: &dyn ModelStore,
    ) -> Result<Vec<ForecastRow>, GroupError> {
        let point = store
            .load_point(key)
            .map_err(|e| GroupError::Store(format!("{e:#}")))?
            .ok_or_else(|| GroupError::MissingArtifact { kind: "point".into() })?;

        let last = history
            .last()
            .map(|o| o.timestamp)
            .ok_or_else(|| GroupError::MalformedInput("empty group".into()))?;
        let timestamps = horizon_timestamps(last, self.config.horizon_hours);

        let entry = registry
            .get(&key.region)
            .ok_or_else(|| GroupError::MalformedInput(format!("region {} not in registry", key.region)))?;
        let weather = self
            .weather
            .forecast(entry.lat, entry.lon, self.config.horizon_days())
            .await
            .map_err(|e| GroupError::UpstreamFetch(format!("{e:#}")))?
            .restrict_to(&timestamps);

        let lags = &self.config.lags;
        let mut frame = build_features(
            FeatureFrame::future(key, timestamps.clone()),
            registry,
            Some(&weather),
            &point.encoder,
            lags,
        );

        let targets: Vec<f64> = history.iter().map(|o| o.mw).collect();
        let buffer = LagBuffer::seeded(self.config.max_lag(), &targets);
        let (mw_hat, _) = run_autoregressive(&mut frame, &point, &point.feature_names, lags, buffer)
            .map_err(|e| GroupError::MalformedInput(format!("{e:#}")))?;

        let (mw_lo, mw_hi) = match self.load_band_models(key, store) {
            Some((lo, hi)) => {
                let matrix = frame.filled_matrix(&point.feature_names);
                match (lo.predict(&matrix), hi.predict(&matrix)) {
                    (Ok(lo), Ok(hi)) => (lo, hi),
                    _ => self.fallback_band(&mw_hat),
                }
            }
            None => self.fallback_band(&mw_hat),
        };

        Ok(timestamps
            .into_iter()
            .enumerate()
            .map(|(i, timestamp)| ForecastRow {
                timestamp,
                region: key.region.clone(),
                source: key.source,
                mw_hat: mw_hat[i],
                mw_lo: mw_lo[i],
                mw_hi: mw_hi[i],
            })
            .collect())
    }

    /// Lowest and highest configured quantile models, when both load
    fn load_band_models(&self, key: &GroupKey, store: &dyn ModelStore) -> Option<(QuantileModel, QuantileModel)> {
        let low = *self.config.quantiles.first()?;
        let high = *self.config.quantiles.last()?;
        let load = |q: f64| match store.load_quantile(key, q) {
            Ok(model) => model,
            Err(e) => {
                warn!(region = %key.region, source = %key.source, quantile = q, error = %e, "quantile model load failed");
                None
            }
        };
        Some((load(low)?, load(high)?))
    }

    fn fallback_band(&self, mw_hat: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let lo = 1.0 - self.config.fallback_band;
        let hi = 1.0 + self.config.fallback_band;
        (
            mw_hat.iter().map(|v| v * lo).collect(),
            mw_hat.iter().map(|v| v * hi).collect(),
        )
    }
}
