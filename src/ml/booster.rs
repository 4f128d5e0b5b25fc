//! LightGBM gradient boosting
//!
//! Boosters are trained through `lightgbm3` and kept as LightGBM's text model
//! dump, so a fitted regressor serializes with the rest of its artifact and is
//! rebuilt with `Booster::from_string` when it is needed for prediction.
//!
//! Training runs single-threaded with `deterministic` and `force_row_wise`
//! set and no bagging, so identical inputs give identical models. Missing
//! feature values (NaN) follow the default direction learned at each split.

use anyhow::{anyhow, Result};
use lightgbm3::{Booster, Dataset};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Training objective
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Loss {
    SquaredError,
    /// Pinball loss at the given quantile in (0, 1)
    Quantile(f64),
}

/// Booster hyper-parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbmParams {
    /// Boosting rounds (`num_iterations`)
    pub max_iter: usize,
    pub learning_rate: f64,
    /// `num_leaves`
    pub max_leaf_nodes: usize,
    /// `min_data_in_leaf`
    pub min_samples_leaf: usize,
    /// `max_bin`
    pub max_bins: usize,
    /// `lambda_l2`
    pub l2_regularization: f64,
}

impl Default for GbmParams {
    fn default() -> Self {
        Self {
            max_iter: 100,
            learning_rate: 0.1,
            max_leaf_nodes: 31,
            min_samples_leaf: 20,
            max_bins: 255,
            l2_regularization: 0.0,
        }
    }
}

impl GbmParams {
    /// LightGBM parameter object for `loss`
    pub fn to_lightgbm(&self, loss: Loss) -> Value {
        let mut params = json!({
            "num_iterations": self.max_iter,
            "learning_rate": self.learning_rate,
            "num_leaves": self.max_leaf_nodes,
            "min_data_in_leaf": self.min_samples_leaf,
            "max_bin": self.max_bins,
            "lambda_l2": self.l2_regularization,
            "deterministic": true,
            "force_row_wise": true,
            "num_threads": 1,
            "seed": 0,
            "verbosity": -1,
        });
        match loss {
            Loss::SquaredError => params["objective"] = json!("regression"),
            Loss::Quantile(q) => {
                params["objective"] = json!("quantile");
                params["alpha"] = json!(q);
            }
        }
        params
    }
}

/// Fitted LightGBM regressor held as its model string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbmRegressor {
    loss: Loss,
    n_features: usize,
    model: String,
}

impl GbmRegressor {
    pub fn fit(params: &GbmParams, loss: Loss, x: &[Vec<f64>], y: &[f64]) -> Result<Self> {
        if x.is_empty() {
            anyhow::bail!("Cannot train on empty dataset");
        }
        if x.len() != y.len() {
            anyhow::bail!(
                "Feature and target count mismatch: {} rows, {} targets",
                x.len(),
                y.len()
            );
        }
        let n_features = x[0].len();
        if n_features == 0 {
            anyhow::bail!("Feature rows are empty");
        }
        if x.iter().any(|r| r.len() != n_features) {
            anyhow::bail!("Feature rows have inconsistent widths");
        }
        if y.iter().any(|v| !v.is_finite()) {
            anyhow::bail!("Target contains non-finite values");
        }
        if let Loss::Quantile(q) = loss {
            if !(q > 0.0 && q < 1.0) {
                anyhow::bail!("Quantile must lie in (0, 1), got {q}");
            }
        }

        let flat: Vec<f64> = x.iter().flatten().copied().collect();
        let labels: Vec<f32> = y.iter().map(|v| *v as f32).collect();
        let dataset = Dataset::from_slice(&flat, &labels, n_features as i32, true)
            .map_err(|e| anyhow!("failed to build LightGBM dataset: {e}"))?;
        let booster = Booster::train(dataset, &params.to_lightgbm(loss))
            .map_err(|e| anyhow!("LightGBM training failed: {e}"))?;
        let model = booster
            .save_string()
            .map_err(|e| anyhow!("failed to dump LightGBM model: {e}"))?;

        Ok(Self {
            loss,
            n_features,
            model,
        })
    }

    pub fn loss(&self) -> Loss {
        self.loss
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// LightGBM text model
    pub fn model_string(&self) -> &str {
        &self.model
    }

    /// Rebuild the native booster for prediction
    pub fn load(&self) -> Result<LoadedBooster> {
        let booster = Booster::from_string(&self.model)
            .map_err(|e| anyhow!("failed to load LightGBM model: {e}"))?;
        Ok(LoadedBooster {
            booster,
            n_features: self.n_features,
        })
    }

    /// Predict every row with a single loaded booster
    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(bad) = rows.iter().find(|r| r.len() != self.n_features) {
            anyhow::bail!(
                "Feature count mismatch: expected {}, got {}",
                self.n_features,
                bad.len()
            );
        }
        let loaded = self.load()?;
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        let preds = loaded
            .booster
            .predict(&flat, self.n_features as i32, true)
            .map_err(|e| anyhow!("LightGBM prediction failed: {e}"))?;
        if preds.len() != rows.len() {
            anyhow::bail!("LightGBM returned {} predictions for {} rows", preds.len(), rows.len());
        }
        Ok(preds)
    }
}

/// Native booster rebuilt from a model string
pub struct LoadedBooster {
    booster: Booster,
    n_features: usize,
}

impl LoadedBooster {
    pub fn predict_row(&self, row: &[f64]) -> Result<f64> {
        if row.len() != self.n_features {
            anyhow::bail!(
                "Feature count mismatch: expected {}, got {}",
                self.n_features,
                row.len()
            );
        }
        self.booster
            .predict(row, self.n_features as i32, true)
            .map_err(|e| anyhow!("LightGBM prediction failed: {e}"))?
            .first()
            .copied()
            .ok_or_else(|| anyhow!("LightGBM returned no prediction"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_params() -> GbmParams {
        GbmParams {
            max_iter: 50,
            min_samples_leaf: 5,
            ..GbmParams::default()
        }
    }

    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..200).map(|i| vec![i as f64, (i % 7) as f64]).collect();
        let y: Vec<f64> = (0..200).map(|i| if i < 100 { 10.0 } else { 50.0 }).collect();
        (x, y)
    }

    #[test]
    fn test_lightgbm_params() {
        let params = GbmParams::default().to_lightgbm(Loss::Quantile(0.95));
        assert_eq!(params["objective"], "quantile");
        assert_eq!(params["alpha"], 0.95);
        assert_eq!(params["max_bin"], 255);
        assert_eq!(params["num_leaves"], 31);
        assert_eq!(params["min_data_in_leaf"], 20);
        assert_eq!(params["deterministic"], true);

        let params = GbmParams::default().to_lightgbm(Loss::SquaredError);
        assert_eq!(params["objective"], "regression");
        assert!(params.get("alpha").is_none());
    }

    #[test]
    fn test_step_function_is_learned() {
        let (x, y) = step_data();
        let model = GbmRegressor::fit(&small_params(), Loss::SquaredError, &x, &y).unwrap();
        let loaded = model.load().unwrap();
        assert!((loaded.predict_row(&[20.0, 3.0]).unwrap() - 10.0).abs() < 2.0);
        assert!((loaded.predict_row(&[180.0, 3.0]).unwrap() - 50.0).abs() < 2.0);
        assert_eq!(model.n_features(), 2);
        assert_eq!(model.loss(), Loss::SquaredError);
    }

    #[test]
    fn test_quantile_models_are_ordered() {
        let x: Vec<Vec<f64>> = (0..300).map(|i| vec![(i % 10) as f64]).collect();
        let y: Vec<f64> = (0..300).map(|i| (i % 10) as f64 + ((i * 37) % 11) as f64).collect();
        let lo = GbmRegressor::fit(&small_params(), Loss::Quantile(0.05), &x, &y).unwrap();
        let hi = GbmRegressor::fit(&small_params(), Loss::Quantile(0.95), &x, &y).unwrap();
        let lo = lo.predict(&x).unwrap();
        let hi = hi.predict(&x).unwrap();
        let mean_lo = lo.iter().sum::<f64>() / lo.len() as f64;
        let mean_hi = hi.iter().sum::<f64>() / hi.len() as f64;
        assert!(mean_lo < mean_hi);
    }

    #[test]
    fn test_missing_values_predict() {
        let (x, y) = step_data();
        let model = GbmRegressor::fit(&small_params(), Loss::SquaredError, &x, &y).unwrap();
        let pred = model.load().unwrap().predict_row(&[f64::NAN, 1.0]).unwrap();
        assert!(pred.is_finite());
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (x, y) = step_data();
        let a = GbmRegressor::fit(&small_params(), Loss::SquaredError, &x, &y).unwrap();
        let b = GbmRegressor::fit(&small_params(), Loss::SquaredError, &x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_model_string_survives_serialization() {
        let (x, y) = step_data();
        let model = GbmRegressor::fit(&small_params(), Loss::SquaredError, &x, &y).unwrap();
        assert!(model.model_string().contains("tree"));

        let bytes = bincode::serialize(&model).unwrap();
        let restored: GbmRegressor = bincode::deserialize(&bytes).unwrap();
        assert_eq!(restored, model);
        assert_eq!(restored.predict(&x).unwrap(), model.predict(&x).unwrap());
    }

    #[test]
    fn test_batch_matches_single_row() {
        let (x, y) = step_data();
        let model = GbmRegressor::fit(&small_params(), Loss::SquaredError, &x, &y).unwrap();
        let batch = model.predict(&x[..5]).unwrap();
        let loaded = model.load().unwrap();
        for (row, expected) in x[..5].iter().zip(&batch) {
            assert!((loaded.predict_row(row).unwrap() - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_invalid_inputs() {
        let p = small_params();
        assert!(GbmRegressor::fit(&p, Loss::SquaredError, &[], &[]).is_err());
        assert!(GbmRegressor::fit(&p, Loss::SquaredError, &[vec![1.0]], &[1.0, 2.0]).is_err());
        assert!(GbmRegressor::fit(&p, Loss::SquaredError, &[vec![1.0], vec![1.0, 2.0]], &[1.0, 2.0]).is_err());
        assert!(GbmRegressor::fit(&p, Loss::SquaredError, &[vec![1.0]], &[f64::NAN]).is_err());
        assert!(GbmRegressor::fit(&p, Loss::Quantile(1.0), &[vec![1.0]], &[1.0]).is_err());

        let (x, y) = step_data();
        let model = GbmRegressor::fit(&p, Loss::SquaredError, &x, &y).unwrap();
        assert!(model.load().unwrap().predict_row(&[1.0]).is_err());
        assert!(model.predict(&[vec![1.0]]).is_err());
        assert!(model.predict(&[]).unwrap().is_empty());
    }
}
