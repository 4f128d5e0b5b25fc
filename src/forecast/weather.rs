//! Weather covariates (Open-Meteo)
//!
//! Hourly weather tables used both as historical covariates at training time
//! and as forecast covariates over the prediction horizon.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::WeatherConfig;

/// Hourly variables requested from Open-Meteo, in column order
pub const HOURLY_VARIABLES: [&str; 12] = [
    "temperature_2m",
    "relative_humidity_2m",
    "cloud_cover",
    "wind_speed_10m",
    "wind_speed_100m",
    "wind_speed_120m",
    "wind_gusts_10m",
    "shortwave_radiation",
    "direct_radiation",
    "diffuse_radiation",
    "surface_pressure",
    "precipitation",
];

/// Hourly covariate table keyed by timestamp
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeatherTable {
    pub variables: Vec<String>,
    rows: BTreeMap<DateTime<Utc>, Vec<Option<f64>>>,
}

impl WeatherTable {
    pub fn new(variables: Vec<String>) -> Self {
        Self {
            variables,
            rows: BTreeMap::new(),
        }
    }

    /// Insert one hour; `values` follow `variables` order
    pub fn insert(&mut self, timestamp: DateTime<Utc>, mut values: Vec<Option<f64>>) {
        values.resize(self.variables.len(), None);
        self.rows.insert(timestamp, values);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn timestamps(&self) -> impl Iterator<Item = &DateTime<Utc>> {
        self.rows.keys()
    }

    pub fn value(&self, timestamp: &DateTime<Utc>, variable: usize) -> Option<f64> {
        self.rows
            .get(timestamp)
            .and_then(|row| row.get(variable).copied().flatten())
    }

    /// Keep only the given timestamps
    pub fn restrict_to(&self, timestamps: &[DateTime<Utc>]) -> Self {
        let rows = timestamps
            .iter()
            .filter_map(|ts| self.rows.get(ts).map(|row| (*ts, row.clone())))
            .collect();
        Self {
            variables: self.variables.clone(),
            rows,
        }
    }
}

/// Historical weather per region, used at training time
pub type RegionWeather = BTreeMap<String, WeatherTable>;

/// Source of hourly weather tables
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Forecast covering `days` days from today
    async fn forecast(&self, lat: f64, lon: f64, days: u32) -> Result<WeatherTable>;

    /// Observed/reanalysis weather between two dates (inclusive)
    async fn history(&self, lat: f64, lon: f64, start: NaiveDate, end: NaiveDate)
        -> Result<WeatherTable>;
}

/// Open-Meteo forecast and archive API client
pub struct OpenMeteoClient {
    client: Client,
    forecast_url: String,
    archive_url: String,
}

impl OpenMeteoClient {
    pub fn new(cfg: &WeatherConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_seconds))
            .build()
            .context("failed to build Open-Meteo HTTP client")?;
        Ok(Self {
            client,
            forecast_url: cfg.forecast_url.clone(),
            archive_url: cfg.archive_url.clone(),
        })
    }

    async fn fetch(&self, url: &str, params: &[(&str, String)]) -> Result<WeatherTable> {
        debug!(%url, "fetching weather from Open-Meteo");

        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .context("Failed to send request to Open-Meteo API")?;

        if !response.status().is_success() {
            error!("Open-Meteo API returned error status: {}", response.status());
            anyhow::bail!("Open-Meteo API error: {}", response.status());
        }

        let body: OpenMeteoResponse = response
            .json()
            .await
            .context("Failed to parse Open-Meteo response")?;

        parse_hourly(body.hourly)
    }

    fn base_params(lat: f64, lon: f64) -> Vec<(&'static str, String)> {
        vec![
            ("latitude", format!("{lat:.4}")),
            ("longitude", format!("{lon:.4}")),
            ("timezone", "UTC".to_string()),
            ("hourly", HOURLY_VARIABLES.join(",")),
        ]
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    async fn forecast(&self, lat: f64, lon: f64, days: u32) -> Result<WeatherTable> {
        let mut params = Self::base_params(lat, lon);
        params.push(("forecast_days", days.to_string()));
        let table = self.fetch(&self.forecast_url, &params).await?;
        info!(lat, lon, hours = table.len(), "fetched weather forecast");
        Ok(table)
    }

    async fn history(
        &self,
        lat: f64,
        lon: f64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<WeatherTable> {
        let mut params = Self::base_params(lat, lon);
        params.push(("start_date", start.format("%Y-%m-%d").to_string()));
        params.push(("end_date", end.format("%Y-%m-%d").to_string()));
        let table = self.fetch(&self.archive_url, &params).await?;
        info!(lat, lon, hours = table.len(), "fetched weather history");
        Ok(table)
    }
}

// Open-Meteo API response structures
#[derive(Debug, Deserialize)]
struct OpenMeteoResponse {
    hourly: OpenMeteoHourly,
}

#[derive(Debug, Deserialize)]
struct OpenMeteoHourly {
    time: Vec<String>,
    #[serde(flatten)]
    variables: BTreeMap<String, Vec<Option<f64>>>,
}

fn parse_hourly(hourly: OpenMeteoHourly) -> Result<WeatherTable> {
    // Requested variables first in request order, then anything unexpected.
    let mut names: Vec<String> = HOURLY_VARIABLES
        .iter()
        .filter(|v| hourly.variables.contains_key(**v))
        .map(|v| v.to_string())
        .collect();
    for name in hourly.variables.keys() {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }

    let mut table = WeatherTable::new(names.clone());
    for (i, raw) in hourly.time.iter().enumerate() {
        let timestamp = parse_open_meteo_time(raw)
            .with_context(|| format!("invalid Open-Meteo timestamp {raw:?}"))?;
        let values = names
            .iter()
            .map(|n| hourly.variables.get(n).and_then(|col| col.get(i).copied().flatten()))
            .collect();
        table.insert(timestamp, values);
    }
    Ok(table)
}

fn parse_open_meteo_time(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")?;
    Ok(naive.and_utc())
}
