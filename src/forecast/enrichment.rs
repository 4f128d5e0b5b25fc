//! Static site features for the region registry
//!
//! - `pvgis_ghi_mean`: mean in-plane irradiance G(i) from the PVGIS hourly
//!   series calculator
//! - `gwa_mean_speed_100m`: latitude heuristic standing in for a Global Wind
//!   Atlas lookup

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::RadiationConfig;
use crate::domain::RegionRegistry;

pub const PVGIS_FEATURE: &str = "pvgis_ghi_mean";
pub const WIND_ATLAS_FEATURE: &str = "gwa_mean_speed_100m";

const PVGIS_DATABASE: &str = "PVGIS-SARAH3";

/// Long-term solar resource at a coordinate
#[async_trait]
pub trait RadiationSource: Send + Sync {
    /// Mean hourly irradiance (W/m²), `None` when the series carries none
    async fn mean_irradiance(&self, lat: f64, lon: f64) -> Result<Option<f64>>;
}

/// PVGIS `seriescalc` client
pub struct PvgisClient {
    client: Client,
    url: String,
    start_year: u16,
    end_year: u16,
}

impl PvgisClient {
    pub fn new(cfg: &RadiationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_seconds))
            .build()
            .context("failed to build PVGIS HTTP client")?;
        Ok(Self {
            client,
            url: cfg.pvgis_url.clone(),
            start_year: cfg.start_year,
            end_year: cfg.end_year,
        })
    }
}

#[derive(Debug, Deserialize)]
struct PvgisResponse {
    outputs: Option<PvgisOutputs>,
}

#[derive(Debug, Deserialize)]
struct PvgisOutputs {
    #[serde(default)]
    hourly: Vec<PvgisHour>,
}

#[derive(Debug, Deserialize)]
struct PvgisHour {
    #[serde(rename = "G(i)")]
    irradiance: Option<f64>,
}

#[async_trait]
impl RadiationSource for PvgisClient {
    async fn mean_irradiance(&self, lat: f64, lon: f64) -> Result<Option<f64>> {
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("raddatabase", PVGIS_DATABASE.to_string()),
                ("startyear", self.start_year.to_string()),
                ("endyear", self.end_year.to_string()),
                ("outputformat", "json".to_string()),
            ])
            .send()
            .await
            .context("Failed to send request to PVGIS")?;

        if !response.status().is_success() {
            anyhow::bail!("PVGIS API error: {}", response.status());
        }

        let body: PvgisResponse = response
            .json()
            .await
            .context("Failed to parse PVGIS response")?;

        let values: Vec<f64> = body
            .outputs
            .map(|o| o.hourly.into_iter().filter_map(|h| h.irradiance).collect())
            .unwrap_or_default();
        if values.is_empty() {
            return Ok(None);
        }
        Ok(Some(values.iter().sum::<f64>() / values.len() as f64))
    }
}

/// Mean 100 m wind speed (m/s) estimated from latitude
pub fn wind_atlas_mean_speed(lat: f64) -> f64 {
    6.5 + (lat.abs() - 30.0) * 0.03
}

/// Fill in missing static features. Entries that already carry a value keep
/// it; a failed PVGIS fetch leaves the feature null.
pub async fn enrich_registry(registry: &mut RegionRegistry, radiation: &dyn RadiationSource) {
    for entry in registry.iter_mut() {
        if entry.static_value(PVGIS_FEATURE).is_none() {
            let value = match radiation.mean_irradiance(entry.lat, entry.lon).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(region = %entry.region, error = %e, "PVGIS fetch failed");
                    None
                }
            };
            entry.set_static(PVGIS_FEATURE, value);
        }
        if entry.static_value(WIND_ATLAS_FEATURE).is_none() {
            entry.set_static(WIND_ATLAS_FEATURE, Some(wind_atlas_mean_speed(entry.lat)));
        }
        debug!(region = %entry.region, "registry entry enriched");
    }
}
