use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{GroupKey, Source};

/// One hourly forecast value with its uncertainty band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub timestamp: DateTime<Utc>,
    pub region: String,
    pub source: Source,
    /// Point forecast (MW)
    pub mw_hat: f64,
    /// Lower band (MW)
    pub mw_lo: f64,
    /// Upper band (MW)
    pub mw_hi: f64,
}

impl ForecastRow {
    pub fn group_key(&self) -> GroupKey {
        GroupKey::new(self.region.clone(), self.source)
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// Daily peak of a group's forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakRow {
    pub date: NaiveDate,
    pub timestamp: DateTime<Utc>,
    pub region: String,
    pub source: Source,
    pub peak_mw_forecast: f64,
    pub mw_lo: f64,
    pub mw_hi: f64,
}

impl From<&ForecastRow> for PeakRow {
    fn from(row: &ForecastRow) -> Self {
        Self {
            date: row.date(),
            timestamp: row.timestamp,
            region: row.region.clone(),
            source: row.source,
            peak_mw_forecast: row.mw_hat,
            mw_lo: row.mw_lo,
            mw_hi: row.mw_hi,
        }
    }
}
