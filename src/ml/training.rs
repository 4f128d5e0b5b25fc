//! Per-group training pipeline
//!
//! History is partitioned by (region, source). Every group with enough
//! history gets one point model and one quantile model per configured
//! quantile, all fitted on the same feature matrix.

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::models::{GroupModel, PointModel, QuantileModel};
use super::{pinball_loss, ModelKind, ModelMetadata, ValidationMetrics};
use crate::config::ForecastConfig;
use crate::domain::{group_observations, GroupKey, Observation, RegionRegistry, Source};
use crate::error::GroupError;
use crate::forecast::features::{build_features, feature_columns, lag_column, CategoryEncoder, FeatureFrame};
use crate::forecast::weather::RegionWeather;
use crate::repo::{ModelArtifact, ModelKey, ModelStore};

/// One trained group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub region: String,
    pub source: Source,
    /// Feature columns in training order
    pub features: Vec<String>,
    pub training_rows: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ValidationMetrics>,
    /// In-sample pinball loss of each quantile model
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quantile_losses: Vec<QuantileLoss>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantileLoss {
    pub quantile: f64,
    pub pinball: f64,
}

impl ManifestEntry {
    pub fn group_key(&self) -> GroupKey {
        GroupKey::new(self.region.clone(), self.source)
    }
}

/// Record of the groups trained in one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    pub groups: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn contains(&self, key: &GroupKey) -> bool {
        self.groups
            .iter()
            .any(|g| g.region == key.region && g.source == key.source)
    }

    pub fn keys(&self) -> Vec<GroupKey> {
        self.groups.iter().map(ManifestEntry::group_key).collect()
    }
}

/// Model Trainer
pub struct Trainer {
    config: ForecastConfig,
}

impl Trainer {
    pub fn new(config: ForecastConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Train every eligible group, persist its models and write the manifest.
    ///
    /// Groups below the history threshold are skipped silently. Any other
    /// per-group failure is logged and the group is left out of the manifest.
    pub fn train_per_group(
        &self,
        history: &[Observation],
        registry: &RegionRegistry,
        weather: &RegionWeather,
        store: &dyn ModelStore,
    ) -> Result<Manifest> {
        let encoder = CategoryEncoder::fit(history);
        let required = self.config.min_history_rows();
        let mut manifest = Manifest::default();

        for (key, rows) in group_observations(history) {
            if rows.len() < required {
                debug!(
                    region = %key.region,
                    source = %key.source,
                    rows = rows.len(),
                    required,
                    "skipping group with insufficient history"
                );
                continue;
            }

            match self.train_group(&key, &rows, registry, weather, &encoder, store) {
                Ok(entry) => {
                    info!(
                        region = %key.region,
                        source = %key.source,
                        rows = entry.training_rows,
                        features = entry.features.len(),
                        "trained group models"
                    );
                    manifest.groups.push(entry);
                }
                Err(e) => {
                    warn!(
                        region = %key.region,
                        source = %key.source,
                        reason = e.label(),
                        error = %e,
                        "group training skipped"
                    );
                }
            }
        }

        store.write_manifest(&manifest)?;
        info!(groups = manifest.len(), store = %store.location(), "training complete");
        Ok(manifest)
    }

    fn train_group(
        &self,
        key: &GroupKey,
        rows: &[Observation],
        registry: &RegionRegistry,
        weather: &RegionWeather,
        encoder: &CategoryEncoder,
        store: &dyn ModelStore,
    ) -> Result<ManifestEntry, GroupError> {
        let lags = &self.config.lags;
        let frame = build_features(
            FeatureFrame::from_observations(rows),
            registry,
            weather.get(&key.region),
            encoder,
            lags,
        );
        let lag_names: Vec<String> = lags.iter().map(|l| lag_column(*l)).collect();
        let frame = frame.retain_rows(|i| lag_names.iter().all(|l| frame.value(l, i).is_some()));
        if frame.is_empty() {
            return Err(GroupError::InsufficientHistory {
                rows: rows.len(),
                required: self.config.min_history_rows(),
            });
        }

        let features = feature_columns(&frame, lags);
        let x: Vec<Vec<f64>> = (0..frame.len())
            .map(|i| frame.row_vector(&features, i))
            .collect();
        let y: Vec<f64> = frame.target.iter().flatten().copied().collect();
        if y.len() != x.len() {
            return Err(GroupError::MalformedInput("training rows without target".into()));
        }

        let mut point = PointModel::new(features.clone(), encoder.clone(), self.config.gbm.clone());
        point
            .fit(&x, &y)
            .map_err(|e| GroupError::MalformedInput(format!("{e:#}")))?;
        let fitted = point
            .predict(&x)
            .map_err(|e| GroupError::MalformedInput(format!("{e:#}")))?;
        let metrics = ValidationMetrics::calculate(&y, &fitted).ok();
        point.metadata = Some(ModelMetadata {
            model_id: uuid::Uuid::new_v4().to_string(),
            kind: ModelKind::Point,
            version: env!("CARGO_PKG_VERSION").to_string(),
            trained_at: Utc::now(),
            training_samples: x.len(),
            validation_metrics: metrics.unwrap_or(ValidationMetrics::new(0.0, 0.0, 0.0, 0.0)),
            feature_names: features.clone(),
        });

        // Fit every model before persisting any, so a failing fit leaves no
        // partial set behind.
        let mut quantile_models = Vec::with_capacity(self.config.quantiles.len());
        let mut quantile_losses = Vec::with_capacity(self.config.quantiles.len());
        for &q in &self.config.quantiles {
            let mut model = QuantileModel::new(q, features.clone(), self.config.gbm.clone());
            model
                .fit(&x, &y)
                .map_err(|e| GroupError::MalformedInput(format!("{e:#}")))?;
            let band = model
                .predict(&x)
                .map_err(|e| GroupError::MalformedInput(format!("{e:#}")))?;
            if let Ok(pinball) = pinball_loss(&y, &band, q) {
                quantile_losses.push(QuantileLoss { quantile: q, pinball });
            }
            quantile_models.push(model);
        }

        let store_err = |e: anyhow::Error| GroupError::Store(format!("{e:#}"));
        store
            .save(&ModelKey::new(key, ModelKind::Point), &ModelArtifact::Point(point))
            .map_err(store_err)?;
        for model in quantile_models {
            let model_key = ModelKey::new(key, model.kind());
            store
                .save(&model_key, &ModelArtifact::Quantile(model))
                .map_err(store_err)?;
        }

        Ok(ManifestEntry {
            region: key.region.clone(),
            source: key.source,
            features,
            training_rows: x.len(),
            metrics,
            quantile_losses,
        })
    }
}
