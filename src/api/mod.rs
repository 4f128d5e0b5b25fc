pub mod error;
pub mod forecast;
pub mod health;
pub mod map;
pub mod train;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{config::Config, pipeline::Pipeline};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

pub fn router(state: AppState, cfg: &Config) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/forecast",
            get(forecast::forecast_get).post(forecast::forecast_post),
        )
        .route("/peaks", get(forecast::peaks_get).post(forecast::peaks_post))
        .route("/map", get(map::map_get).post(map::map_post))
        .route("/map.gif", get(map::map_gif))
        .route("/train", post(train::train))
        .route("/healthz", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(
            ServiceBuilder::new()
                .layer(axum::extract::DefaultBodyLimit::max(1024 * 1024))
                .layer(TimeoutLayer::new(Duration::from_secs(cfg.server.request_timeout_secs))),
        )
        .layer(TraceLayer::new_for_http())
}
