use axum::{extract::State, Json};
use tracing::info;

use super::{error::ApiError, AppState};
use crate::pipeline::{TrainRequest, TrainSummary};

/// POST /train
///
/// Fields left out of the body fall back to the configured paths and the
/// history's own date span.
pub async fn train(
    State(state): State<AppState>,
    Json(req): Json<TrainRequest>,
) -> Result<Json<TrainSummary>, ApiError> {
    if let (Some(start), Some(end)) = (req.history_start, req.history_end) {
        if start > end {
            return Err(ApiError::BadRequest(format!(
                "history_start {start} is after history_end {end}"
            )));
        }
    }
    let summary = state.pipeline.train(req).await?;
    info!(groups = summary.groups_trained, dir = %summary.models_dir, "training finished");
    Ok(Json(summary))
}
