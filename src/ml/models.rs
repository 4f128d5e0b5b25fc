//! Group model definitions
//!
//! Every (region, source) group owns one point model and one quantile model
//! per configured quantile. Both wrap a LightGBM booster trained with a
//! different objective.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::booster::{GbmParams, GbmRegressor, LoadedBooster, Loss};
use super::{ModelKind, ModelMetadata};
use crate::forecast::features::CategoryEncoder;

/// Single-row prediction from a model ready to run
pub trait RowPredictor {
    fn predict_row(&self, features: &[f64]) -> Result<f64>;
}

impl RowPredictor for LoadedBooster {
    fn predict_row(&self, features: &[f64]) -> Result<f64> {
        LoadedBooster::predict_row(self, features)
    }
}

/// Trainable regressor over a fixed feature-column order
pub trait GroupModel: Send + Sync {
    fn fit(&mut self, features: &[Vec<f64>], target: &[f64]) -> Result<()>;

    /// Predictor for repeated single-row calls, built once per use
    fn predictor(&self) -> Result<Box<dyn RowPredictor>>;

    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        let predictor = self.predictor()?;
        rows.iter().map(|r| predictor.predict_row(r)).collect()
    }

    fn kind(&self) -> ModelKind;
}

/// Squared-error model producing `mw_hat`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointModel {
    /// Training column order; forecast vectors must follow it
    pub feature_names: Vec<String>,
    /// Category codes used at fit time
    pub encoder: CategoryEncoder,
    pub params: GbmParams,
    pub metadata: Option<ModelMetadata>,
    booster: Option<GbmRegressor>,
}

impl PointModel {
    pub fn new(feature_names: Vec<String>, encoder: CategoryEncoder, params: GbmParams) -> Self {
        Self {
            feature_names,
            encoder,
            params,
            metadata: None,
            booster: None,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.booster.is_some()
    }

    fn booster(&self) -> Result<&GbmRegressor> {
        self.booster
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("point model is not fitted"))
    }
}

impl GroupModel for PointModel {
    fn fit(&mut self, features: &[Vec<f64>], target: &[f64]) -> Result<()> {
        let booster = GbmRegressor::fit(&self.params, Loss::SquaredError, features, target)
            .context("point model fit failed")?;
        self.booster = Some(booster);
        Ok(())
    }

    fn predictor(&self) -> Result<Box<dyn RowPredictor>> {
        Ok(Box::new(self.booster()?.load()?))
    }

    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        self.booster()?.predict(rows)
    }

    fn kind(&self) -> ModelKind {
        ModelKind::Point
    }
}

/// Pinball-loss model producing one band edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantileModel {
    pub quantile: f64,
    pub feature_names: Vec<String>,
    pub params: GbmParams,
    booster: Option<GbmRegressor>,
}

impl QuantileModel {
    pub fn new(quantile: f64, feature_names: Vec<String>, params: GbmParams) -> Self {
        Self {
            quantile,
            feature_names,
            params,
            booster: None,
        }
    }

    fn booster(&self) -> Result<&GbmRegressor> {
        self.booster
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("quantile {} model is not fitted", self.quantile))
    }
}

impl GroupModel for QuantileModel {
    fn fit(&mut self, features: &[Vec<f64>], target: &[f64]) -> Result<()> {
        let booster = GbmRegressor::fit(
            &self.params,
            Loss::Quantile(self.quantile),
            features,
            target,
        )
        .with_context(|| format!("quantile {} model fit failed", self.quantile))?;
        self.booster = Some(booster);
        Ok(())
    }

    fn predictor(&self) -> Result<Box<dyn RowPredictor>> {
        Ok(Box::new(self.booster()?.load()?))
    }

    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        self.booster()?.predict(rows)
    }

    fn kind(&self) -> ModelKind {
        ModelKind::Quantile(self.quantile)
    }
}

/// Model that always predicts the same value
#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ConstantModel(pub f64);

#[cfg(test)]
impl RowPredictor for ConstantModel {
    fn predict_row(&self, _features: &[f64]) -> Result<f64> {
        Ok(self.0)
    }
}

#[cfg(test)]
impl GroupModel for ConstantModel {
    fn fit(&mut self, _features: &[Vec<f64>], _target: &[f64]) -> Result<()> {
        Ok(())
    }

    fn predictor(&self) -> Result<Box<dyn RowPredictor>> {
        Ok(Box::new(*self))
    }

    fn kind(&self) -> ModelKind {
        ModelKind::Point
    }
}
