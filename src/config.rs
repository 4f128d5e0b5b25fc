use anyhow::Result;
use figment::{providers::{Env, Format, Serialized, Toml}, Figment};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::ml::booster::GbmParams;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub radiation: RadiationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_secs: 600,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub data: PathBuf,
    pub model_dir: PathBuf,
    pub registry: PathBuf,
    pub out_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data: PathBuf::from("data/synthetic.csv"),
            model_dir: PathBuf::from("models"),
            registry: PathBuf::from("config/regions.json"),
            out_dir: PathBuf::from("out"),
        }
    }
}

/// Training and forecasting parameters shared by the trainer and forecaster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Lag offsets in hours
    pub lags: Vec<usize>,
    /// Quantiles fitted per group; the first and last form the band
    pub quantiles: Vec<f64>,
    pub horizon_hours: usize,
    /// Days of history required on top of the largest lag
    pub min_history_days: usize,
    /// Relative band used when quantile models are unavailable
    pub fallback_band: f64,
    pub gbm: GbmParams,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            lags: vec![1, 24, 48, 168],
            quantiles: vec![0.05, 0.95],
            horizon_hours: 24 * 7,
            min_history_days: 14,
            fallback_band: 0.15,
            gbm: GbmParams::default(),
        }
    }
}

impl ForecastConfig {
    pub fn max_lag(&self) -> usize {
        self.lags.iter().copied().max().unwrap_or(0)
    }

    /// Minimum observations a group needs before it is trained
    pub fn min_history_rows(&self) -> usize {
        self.max_lag() + 24 * self.min_history_days
    }

    /// Days of weather forecast covering the horizon
    pub fn horizon_days(&self) -> u32 {
        self.horizon_hours.div_ceil(24).max(1) as u32
    }

    pub fn validate(&self) -> Result<()> {
        if self.lags.is_empty() || self.lags.contains(&0) {
            anyhow::bail!("lags must be non-empty and strictly positive");
        }
        if self.quantiles.iter().any(|q| *q <= 0.0 || *q >= 1.0) {
            anyhow::bail!("quantiles must lie in (0, 1)");
        }
        if self.horizon_hours == 0 {
            anyhow::bail!("horizon_hours must be positive");
        }
        if !(0.0..1.0).contains(&self.fallback_band) {
            anyhow::bail!("fallback_band must lie in [0, 1)");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    pub forecast_url: String,
    pub archive_url: String,
    pub http_timeout_seconds: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            forecast_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            archive_url: "https://archive-api.open-meteo.com/v1/archive".to_string(),
            http_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadiationConfig {
    pub pvgis_url: String,
    pub http_timeout_seconds: u64,
    pub start_year: u16,
    pub end_year: u16,
}

impl Default for RadiationConfig {
    fn default() -> Self {
        Self {
            pvgis_url: "https://re.jrc.ec.europa.eu/api/v5_2/seriescalc".to_string(),
            http_timeout_seconds: 30,
            start_year: 2020,
            end_year: 2024,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("RFC__").split("__"));
        let cfg: Config = figment.extract()?;
        cfg.forecast.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_forecast_config() {
        let cfg = ForecastConfig::default();
        assert_eq!(cfg.max_lag(), 168);
        assert_eq!(cfg.min_history_rows(), 168 + 14 * 24);
        assert_eq!(cfg.horizon_days(), 7);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_invalid_forecast_config() {
        let cfg = ForecastConfig {
            quantiles: vec![0.0, 0.95],
            ..ForecastConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = ForecastConfig {
            lags: vec![],
            ..ForecastConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_partial_toml_overrides_defaults() {
        let figment = Figment::from(Serialized::defaults(Config::default())).merge(Toml::string(
            "[forecast]\nhorizon_hours = 48\n[server]\nport = 9000\nhost = \"0.0.0.0\"\nrequest_timeout_secs = 5\n",
        ));
        let cfg: Config = figment.extract().unwrap();
        assert_eq!(cfg.forecast.horizon_hours, 48);
        assert_eq!(cfg.forecast.lags, vec![1, 24, 48, 168]);
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.paths.model_dir, PathBuf::from("models"));
    }
}
