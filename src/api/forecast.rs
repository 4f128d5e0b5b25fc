use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Duration;
use serde::Deserialize;
use validator::Validate;

use super::{error::ApiError, AppState};
use crate::domain::{ForecastRow, PeakRow, Source};
use crate::forecast::peak_hours;

const MAX_HORIZON_HOURS: usize = 168;

/// Optional region/source filter shared by the forecast and peak endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupFilter {
    pub region: Option<String>,
    pub source: Option<String>,
}

impl GroupFilter {
    fn parse(&self) -> Result<(Option<&str>, Option<Source>), ApiError> {
        let source = self
            .source
            .as_deref()
            .map(|s| {
                s.parse::<Source>()
                    .map_err(|_| ApiError::BadRequest(format!("unknown source '{s}'")))
            })
            .transpose()?;
        Ok((self.region.as_deref(), source))
    }

    fn apply<T>(&self, rows: Vec<T>, key: impl Fn(&T) -> (&str, Source)) -> Result<Vec<T>, ApiError> {
        let (region, source) = self.parse()?;
        Ok(rows
            .into_iter()
            .filter(|row| {
                let (r, s) = key(row);
                region.map_or(true, |want| want == r) && source.map_or(true, |want| want == s)
            })
            .collect())
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ForecastRequest {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default = "default_horizon")]
    #[validate(range(min = 1, max = 168))]
    pub horizon_hours: usize,
}

fn default_horizon() -> usize {
    MAX_HORIZON_HOURS
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PeaksRequest {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

/// Keep the last `hours` hours ending at the latest timestamp in `rows`
pub fn trim_horizon(rows: Vec<ForecastRow>, hours: usize) -> Vec<ForecastRow> {
    if hours >= MAX_HORIZON_HOURS {
        return rows;
    }
    let Some(tmax) = rows.iter().map(|r| r.timestamp).max() else {
        return rows;
    };
    let tmin = tmax - Duration::hours(hours as i64 - 1);
    rows.into_iter()
        .filter(|r| r.timestamp >= tmin && r.timestamp <= tmax)
        .collect()
}

fn forecast_key(row: &ForecastRow) -> (&str, Source) {
    (row.region.as_str(), row.source)
}

fn peak_key(row: &PeakRow) -> (&str, Source) {
    (row.region.as_str(), row.source)
}

/// GET /forecast?region=&source=
pub async fn forecast_get(
    State(state): State<AppState>,
    Query(filter): Query<GroupFilter>,
) -> Result<Json<Vec<ForecastRow>>, ApiError> {
    filter.parse()?;
    let rows = state.pipeline.forecast().await?;
    Ok(Json(filter.apply(rows, forecast_key)?))
}

/// POST /forecast
pub async fn forecast_post(
    State(state): State<AppState>,
    Json(req): Json<ForecastRequest>,
) -> Result<Json<Vec<ForecastRow>>, ApiError> {
    req.validate()?;
    let filter = GroupFilter {
        region: req.region.clone(),
        source: req.source.clone(),
    };
    filter.parse()?;
    let rows = state.pipeline.forecast().await?;
    let rows = filter.apply(rows, forecast_key)?;
    Ok(Json(trim_horizon(rows, req.horizon_hours)))
}

/// GET /peaks?region=&source=
pub async fn peaks_get(
    State(state): State<AppState>,
    Query(filter): Query<GroupFilter>,
) -> Result<Json<Vec<PeakRow>>, ApiError> {
    filter.parse()?;
    let rows = state.pipeline.forecast().await?;
    Ok(Json(filter.apply(peak_hours(&rows), peak_key)?))
}

/// POST /peaks
pub async fn peaks_post(
    State(state): State<AppState>,
    Json(req): Json<PeaksRequest>,
) -> Result<Json<Vec<PeakRow>>, ApiError> {
    let filter = GroupFilter {
        region: req.region,
        source: req.source,
    };
    filter.parse()?;
    let rows = state.pipeline.forecast().await?;
    Ok(Json(filter.apply(peak_hours(&rows), peak_key)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn rows() -> Vec<ForecastRow> {
        let t0 = Utc.with_ymd_and_hms(2025, 11, 1, 0, 0, 0).unwrap();
        let mut out = Vec::new();
        for (region, source) in [("north", Source::Solar), ("south", Source::Wind)] {
            for h in 0..168 {
                out.push(ForecastRow {
                    timestamp: t0 + Duration::hours(h),
                    region: region.into(),
                    source,
                    mw_hat: 1.0,
                    mw_lo: 0.85,
                    mw_hi: 1.15,
                });
            }
        }
        out
    }

    #[test]
    fn test_filter_by_region_and_source() {
        let filter = GroupFilter {
            region: Some("south".into()),
            source: Some("wind".into()),
        };
        let kept = filter.apply(rows(), forecast_key).unwrap();
        assert_eq!(kept.len(), 168);
        assert!(kept.iter().all(|r| r.region == "south"));

        let none = GroupFilter {
            region: Some("north".into()),
            source: Some("Wind".into()),
        };
        assert!(none.apply(rows(), forecast_key).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_source_is_bad_request() {
        let filter = GroupFilter {
            region: None,
            source: Some("Hydro".into()),
        };
        assert!(matches!(
            filter.apply(rows(), forecast_key),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_trim_horizon_keeps_last_hours() {
        let trimmed = trim_horizon(rows(), 24);
        assert_eq!(trimmed.len(), 48);
        let tmax = rows().iter().map(|r| r.timestamp).max().unwrap();
        assert!(trimmed.iter().all(|r| r.timestamp > tmax - Duration::hours(24)));
        assert_eq!(trim_horizon(rows(), 168).len(), 336);
        assert!(trim_horizon(Vec::new(), 1).is_empty());
    }

    #[test]
    fn test_horizon_validation() {
        let ok: ForecastRequest = serde_json::from_str(r#"{"region": "north"}"#).unwrap();
        assert_eq!(ok.horizon_hours, 168);
        assert!(ok.validate().is_ok());

        let bad: ForecastRequest = serde_json::from_str(r#"{"horizon_hours": 0}"#).unwrap();
        assert!(bad.validate().is_err());
        let bad: ForecastRequest = serde_json::from_str(r#"{"horizon_hours": 169}"#).unwrap();
        assert!(bad.validate().is_err());
    }
}
