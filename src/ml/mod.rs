//! Machine Learning Module
//!
//! Per-group generation models:
//! - LightGBM boosters (`booster`)
//! - Point and quantile group models (`models`)
//! - Per-group training pipeline (`training`)

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod booster;
pub mod models;
pub mod training;

/// Which model of a group an artifact holds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ModelKind {
    Point,
    Quantile(f64),
}

impl ModelKind {
    /// Short tag used in artifact names: `point`, `q5`, `q95`
    pub fn tag(&self) -> String {
        match self {
            Self::Point => "point".to_string(),
            Self::Quantile(q) => format!("q{}", (q * 100.0).round() as i64),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

/// ML Model Metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_id: String,
    pub kind: ModelKind,
    pub version: String,
    pub trained_at: chrono::DateTime<chrono::Utc>,
    pub training_samples: usize,
    pub validation_metrics: ValidationMetrics,
    pub feature_names: Vec<String>,
}

/// Metrics calculation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MetricsError {
    #[error("Dimension mismatch: actual={actual}, predicted={predicted}")]
    DimensionMismatch { actual: usize, predicted: usize },

    #[error("Empty data provided")]
    EmptyData,
}

/// In-sample fit metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub mae: f64,  // Mean Absolute Error
    pub rmse: f64, // Root Mean Square Error
    pub mape: f64, // Mean Absolute Percentage Error, over non-zero actuals
    pub r2: f64,   // R-squared
}

impl ValidationMetrics {
    pub fn new(mae: f64, rmse: f64, mape: f64, r2: f64) -> Self {
        Self {
            mae,
            rmse,
            mape,
            r2,
        }
    }

    pub fn calculate(actual: &[f64], predicted: &[f64]) -> Result<Self, MetricsError> {
        if actual.len() != predicted.len() {
            return Err(MetricsError::DimensionMismatch {
                actual: actual.len(),
                predicted: predicted.len(),
            });
        }
        if actual.is_empty() {
            return Err(MetricsError::EmptyData);
        }

        let n = actual.len() as f64;
        let pairs = || actual.iter().zip(predicted.iter());

        let mae = pairs().map(|(a, p)| (a - p).abs()).sum::<f64>() / n;
        let sse: f64 = pairs().map(|(a, p)| (a - p).powi(2)).sum();
        let rmse = (sse / n).sqrt();

        // Night-time solar hours are zero; MAPE only covers non-zero actuals.
        let pct: Vec<f64> = pairs()
            .filter(|(a, _)| a.abs() > 1e-6)
            .map(|(a, p)| ((a - p) / a).abs() * 100.0)
            .collect();
        let mape = if pct.is_empty() {
            0.0
        } else {
            pct.iter().sum::<f64>() / pct.len() as f64
        };

        let mean = actual.iter().sum::<f64>() / n;
        let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
        let r2 = if ss_tot > 1e-10 { 1.0 - sse / ss_tot } else { 0.0 };

        Ok(Self::new(mae, rmse, mape, r2))
    }
}

/// Mean pinball loss of quantile predictions
pub fn pinball_loss(actual: &[f64], predicted: &[f64], q: f64) -> Result<f64, MetricsError> {
    if actual.len() != predicted.len() {
        return Err(MetricsError::DimensionMismatch {
            actual: actual.len(),
            predicted: predicted.len(),
        });
    }
    if actual.is_empty() {
        return Err(MetricsError::EmptyData);
    }
    let total: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| {
            let diff = a - p;
            if diff >= 0.0 {
                q * diff
            } else {
                (q - 1.0) * diff
            }
        })
        .sum();
    Ok(total / actual.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ModelKind::Point, "point")]
    #[case(ModelKind::Quantile(0.05), "q5")]
    #[case(ModelKind::Quantile(0.95), "q95")]
    #[case(ModelKind::Quantile(0.5), "q50")]
    fn test_model_kind_tag(#[case] kind: ModelKind, #[case] tag: &str) {
        assert_eq!(kind.tag(), tag);
    }

    #[test]
    fn test_perfect_fit_metrics() {
        let actual = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let m = ValidationMetrics::calculate(&actual, &actual).unwrap();
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.rmse, 0.0);
        assert_eq!(m.mape, 0.0);
        assert_eq!(m.r2, 1.0);
    }

    #[test]
    fn test_metrics_ignore_zero_actuals_for_mape() {
        let actual = vec![0.0, 100.0];
        let predicted = vec![5.0, 110.0];
        let m = ValidationMetrics::calculate(&actual, &predicted).unwrap();
        assert!((m.mape - 10.0).abs() < 1e-9);
        assert!((m.mae - 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_metrics_errors() {
        assert_eq!(
            ValidationMetrics::calculate(&[1.0], &[]),
            Err(MetricsError::DimensionMismatch {
                actual: 1,
                predicted: 0
            })
        );
        assert_eq!(ValidationMetrics::calculate(&[], &[]), Err(MetricsError::EmptyData));
    }

    #[test]
    fn test_pinball_loss() {
        // under-prediction weighted by q, over-prediction by 1 - q
        let loss = pinball_loss(&[10.0, 10.0], &[8.0, 12.0], 0.9).unwrap();
        assert!((loss - (0.9 * 2.0 + 0.1 * 2.0) / 2.0).abs() < 1e-12);
    }
}
