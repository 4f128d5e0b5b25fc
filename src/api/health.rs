use axum::{extract::State, Json};
use serde::Serialize;

use super::AppState;
use crate::repo::{FileModelStore, ModelStore};

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    version: &'static str,
    timestamp: chrono::DateTime<chrono::Utc>,
    checks: HealthChecks,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    registry: ComponentHealth,
    models: ComponentHealth,
}

/// Health status of a component
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl ComponentHealth {
    fn healthy(detail: impl Into<String>) -> Self {
        Self {
            status: "healthy".to_string(),
            detail: Some(detail.into()),
        }
    }

    fn unhealthy(error: String) -> Self {
        Self {
            status: "unhealthy".to_string(),
            detail: Some(error),
        }
    }

    fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// GET /healthz
///
/// Always 200 while the process serves requests; `status` is `degraded` when
/// the registry cannot be read or no models have been trained yet.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let registry = match state.pipeline.registry() {
        Ok(r) => ComponentHealth::healthy(format!("{} regions", r.len())),
        Err(e) => ComponentHealth::unhealthy(format!("{e:#}")),
    };

    let store = FileModelStore::new(&state.pipeline.config().paths.model_dir);
    let models = match store.read_manifest() {
        Ok(Some(m)) => ComponentHealth::healthy(format!("{} groups trained", m.len())),
        Ok(None) => ComponentHealth::unhealthy("no manifest".to_string()),
        Err(e) => ComponentHealth::unhealthy(format!("{e:#}")),
    };

    let all_healthy = registry.is_healthy() && models.is_healthy();
    tracing::debug!(healthy = all_healthy, "health check completed");

    Json(HealthResponse {
        status: if all_healthy { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now(),
        checks: HealthChecks { registry, models },
    })
}
