//! Map animation endpoints

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use super::{error::ApiError, AppState};
use crate::pipeline::DEFAULT_MAP_GIF;

#[derive(Debug, Clone, Deserialize)]
pub struct MapRequest {
    /// Restrict the map to these regions; all regions when absent
    #[serde(default)]
    pub regions: Option<Vec<String>>,
    #[serde(default = "default_gif_name")]
    pub gif_name: String,
}

impl Default for MapRequest {
    fn default() -> Self {
        Self {
            regions: None,
            gif_name: default_gif_name(),
        }
    }
}

fn default_gif_name() -> String {
    DEFAULT_MAP_GIF.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapResponse {
    pub gif_path: String,
}

/// Plain file name inside the output directory
fn check_gif_name(name: &str) -> Result<(), ApiError> {
    if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
        return Err(ApiError::BadRequest(format!("invalid gif_name '{name}'")));
    }
    Ok(())
}

async fn render(state: &AppState, req: &MapRequest) -> Result<MapResponse, ApiError> {
    check_gif_name(&req.gif_name)?;
    let mut rows = state.pipeline.forecast().await?;
    if let Some(wanted) = &req.regions {
        rows.retain(|r| wanted.contains(&r.region));
    }
    if rows.is_empty() {
        return Err(ApiError::NotFound("no forecast to map; train models first".into()));
    }
    let out_dir = &state.pipeline.config().paths.out_dir;
    let path = state.pipeline.render_map(&rows, out_dir, &req.gif_name).await?;
    Ok(MapResponse {
        gif_path: path.display().to_string(),
    })
}

/// GET /map
pub async fn map_get(State(state): State<AppState>) -> Result<Json<MapResponse>, ApiError> {
    Ok(Json(render(&state, &MapRequest::default()).await?))
}

/// POST /map
pub async fn map_post(
    State(state): State<AppState>,
    Json(req): Json<MapRequest>,
) -> Result<Json<MapResponse>, ApiError> {
    Ok(Json(render(&state, &req).await?))
}

/// GET /map.gif serves the last rendered default animation
pub async fn map_gif(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let path = state.pipeline.config().paths.out_dir.join(DEFAULT_MAP_GIF);
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(([(header::CONTENT_TYPE, "image/gif")], bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ApiError::NotFound("map animation has not been rendered".into()))
        }
        Err(e) => Err(ApiError::InternalError(format!("failed to read {}: {e}", path.display()))),
    }
}
