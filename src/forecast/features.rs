//! Feature engineering for the per-group generation models
//!
//! A [`FeatureFrame`] is a small column store over a time-indexed generation
//! table. Every builder step takes the frame by value and returns it, so the
//! training and forecasting paths chain the exact same steps.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{GroupKey, Observation, RegionRegistry, Source};
use crate::forecast::weather::WeatherTable;

/// Calendar columns, in modeling order
pub const CALENDAR_COLUMNS: [&str; 5] = ["hour", "dow", "dom", "month", "is_weekend"];

/// Categorical code columns, in modeling order
pub const CATEGORY_COLUMNS: [&str; 3] = ["region_code", "source_code", "site_id_code"];

/// Name of the lag column for an offset in hours
pub fn lag_column(offset: usize) -> String {
    format!("lag_{offset}")
}

/// A named numeric column with missing values
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// Generation table with identifier columns and derived numeric columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureFrame {
    pub timestamps: Vec<DateTime<Utc>>,
    pub regions: Vec<String>,
    pub sources: Vec<Source>,
    pub site_ids: Vec<String>,
    /// Target (MW); missing for future rows
    pub target: Vec<Option<f64>>,
    columns: Vec<Column>,
}

impl FeatureFrame {
    /// Frame over observations, preserving their order
    pub fn from_observations(observations: &[Observation]) -> Self {
        let mut frame = Self::default();
        for obs in observations {
            frame.timestamps.push(obs.timestamp);
            frame.regions.push(obs.region.clone());
            frame.sources.push(obs.source);
            frame.site_ids.push(crate::domain::site_id(&obs.region, obs.source));
            frame.target.push(Some(obs.mw));
        }
        frame
    }

    /// Frame of future hours for one group, target unknown
    pub fn future(key: &GroupKey, timestamps: Vec<DateTime<Utc>>) -> Self {
        let n = timestamps.len();
        Self {
            timestamps,
            regions: vec![key.region.clone(); n],
            sources: vec![key.source; n],
            site_ids: vec![key.site_id(); n],
            target: vec![None; n],
            columns: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Replace a column in place or append it
    pub fn set_column(&mut self, name: &str, values: Vec<Option<f64>>) {
        debug_assert_eq!(values.len(), self.len());
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(col) => col.values = values,
            None => self.columns.push(Column {
                name: name.to_string(),
                values,
            }),
        }
    }

    pub fn value(&self, name: &str, row: usize) -> Option<f64> {
        self.column(name).and_then(|c| c.values.get(row).copied().flatten())
    }

    pub fn set_value(&mut self, name: &str, row: usize, value: Option<f64>) {
        if let Some(slot) = self
            .columns
            .iter_mut()
            .find(|c| c.name == name)
            .and_then(|c| c.values.get_mut(row))
        {
            *slot = value;
        }
    }

    /// Keep only rows where `keep(row)` is true
    pub fn retain_rows(&self, keep: impl Fn(usize) -> bool) -> Self {
        let idx: Vec<usize> = (0..self.len()).filter(|&i| keep(i)).collect();
        let pick = |v: &Vec<Option<f64>>| idx.iter().map(|&i| v[i]).collect::<Vec<_>>();
        Self {
            timestamps: idx.iter().map(|&i| self.timestamps[i]).collect(),
            regions: idx.iter().map(|&i| self.regions[i].clone()).collect(),
            sources: idx.iter().map(|&i| self.sources[i]).collect(),
            site_ids: idx.iter().map(|&i| self.site_ids[i].clone()).collect(),
            target: pick(&self.target),
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    values: pick(&c.values),
                })
                .collect(),
        }
    }

    /// Raw feature vector for one row, missing values as NaN
    pub fn row_vector(&self, features: &[String], row: usize) -> Vec<f64> {
        features
            .iter()
            .map(|f| self.value(f, row).unwrap_or(f64::NAN))
            .collect()
    }

    /// Feature vector for one row with missing cells filled forward, then
    /// backward, along each column. Cells with no value anywhere stay NaN.
    pub fn filled_row_vector(&self, features: &[String], row: usize) -> Vec<f64> {
        features
            .iter()
            .map(|f| {
                self.column(f)
                    .and_then(|c| fill_cell(&c.values, row))
                    .unwrap_or(f64::NAN)
            })
            .collect()
    }

    /// Full feature matrix, forward- then backward-filled
    pub fn filled_matrix(&self, features: &[String]) -> Vec<Vec<f64>> {
        let filled: Vec<Vec<Option<f64>>> = features
            .iter()
            .map(|f| match self.column(f) {
                Some(c) => forward_backward_fill(&c.values),
                None => vec![None; self.len()],
            })
            .collect();
        (0..self.len())
            .map(|row| {
                filled
                    .iter()
                    .map(|col| col[row].unwrap_or(f64::NAN))
                    .collect()
            })
            .collect()
    }
}

/// Value of `values[row]`, else the last value before it, else the first after
fn fill_cell(values: &[Option<f64>], row: usize) -> Option<f64> {
    values
        .get(row)
        .copied()
        .flatten()
        .or_else(|| values[..row.min(values.len())].iter().rev().find_map(|v| *v))
        .or_else(|| values.iter().skip(row + 1).find_map(|v| *v))
}

/// Forward-fill then backward-fill a column
pub fn forward_backward_fill(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    let mut last = None;
    for v in values {
        if v.is_some() {
            last = *v;
        }
        out.push(last);
    }
    let mut next = None;
    for v in out.iter_mut().rev() {
        if v.is_some() {
            next = *v;
        } else {
            *v = next;
        }
    }
    out
}

/// Hour, day of week (Monday = 0), day of month, month and weekend flag
pub fn add_calendar_features(mut frame: FeatureFrame) -> FeatureFrame {
    let ts = &frame.timestamps;
    let hour = ts.iter().map(|t| Some(t.hour() as f64)).collect();
    let dow: Vec<Option<f64>> = ts
        .iter()
        .map(|t| Some(t.weekday().num_days_from_monday() as f64))
        .collect();
    let dom = ts.iter().map(|t| Some(t.day() as f64)).collect();
    let month = ts.iter().map(|t| Some(t.month() as f64)).collect();
    let weekend = dow
        .iter()
        .map(|d| d.map(|d| if d >= 5.0 { 1.0 } else { 0.0 }))
        .collect();

    frame.set_column("hour", hour);
    frame.set_column("dow", dow);
    frame.set_column("dom", dom);
    frame.set_column("month", month);
    frame.set_column("is_weekend", weekend);
    frame
}

/// Lagged targets per (region, source, site) group.
///
/// Within a group, rows are ordered by timestamp and `lag_N` takes the target
/// N positions earlier; rows without such a predecessor get a missing value.
pub fn add_lag_features(mut frame: FeatureFrame, offsets: &[usize]) -> FeatureFrame {
    let mut groups: BTreeMap<(&str, Source, &str), Vec<usize>> = BTreeMap::new();
    for i in 0..frame.len() {
        groups
            .entry((&frame.regions[i], frame.sources[i], &frame.site_ids[i]))
            .or_default()
            .push(i);
    }

    let mut lag_values = vec![vec![None; frame.len()]; offsets.len()];
    for rows in groups.values_mut() {
        rows.sort_by_key(|&i| frame.timestamps[i]);
        for (k, &row) in rows.iter().enumerate() {
            for (o, &offset) in offsets.iter().enumerate() {
                if k >= offset {
                    lag_values[o][row] = frame.target[rows[k - offset]];
                }
            }
        }
    }

    for (offset, values) in offsets.iter().zip(lag_values) {
        frame.set_column(&lag_column(*offset), values);
    }
    frame
}

/// Category -> integer code mapping for region, source and site.
///
/// Fitted once at training time (sorted distinct values get codes 0..n) and
/// stored with the trained point model, so forecast vectors use the same codes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryEncoder {
    regions: Vec<String>,
    sources: Vec<String>,
    site_ids: Vec<String>,
}

impl CategoryEncoder {
    pub fn fit(observations: &[Observation]) -> Self {
        let regions: BTreeSet<String> = observations.iter().map(|o| o.region.clone()).collect();
        let sources: BTreeSet<String> =
            observations.iter().map(|o| o.source.to_string()).collect();
        let site_ids: BTreeSet<String> = observations
            .iter()
            .map(|o| crate::domain::site_id(&o.region, o.source))
            .collect();
        Self {
            regions: regions.into_iter().collect(),
            sources: sources.into_iter().collect(),
            site_ids: site_ids.into_iter().collect(),
        }
    }

    fn code(categories: &[String], value: &str) -> f64 {
        categories
            .binary_search_by(|c| c.as_str().cmp(value))
            .map(|i| i as f64)
            .unwrap_or(-1.0)
    }

    pub fn region_code(&self, region: &str) -> f64 {
        Self::code(&self.regions, region)
    }

    pub fn source_code(&self, source: Source) -> f64 {
        Self::code(&self.sources, source.as_str())
    }

    pub fn site_code(&self, site_id: &str) -> f64 {
        Self::code(&self.site_ids, site_id)
    }
}

/// Append `region_code`, `source_code` and `site_id_code`; unknown values get -1
pub fn encode_categoricals(mut frame: FeatureFrame, encoder: &CategoryEncoder) -> FeatureFrame {
    let region = frame.regions.iter().map(|r| Some(encoder.region_code(r))).collect();
    let source = frame.sources.iter().map(|s| Some(encoder.source_code(*s))).collect();
    let site = frame.site_ids.iter().map(|s| Some(encoder.site_code(s))).collect();
    frame.set_column("region_code", region);
    frame.set_column("source_code", source);
    frame.set_column("site_id_code", site);
    frame
}

/// Left join of weather covariates on timestamp
pub fn merge_weather(mut frame: FeatureFrame, weather: &WeatherTable) -> FeatureFrame {
    for (v, name) in weather.variables.iter().enumerate() {
        let values = frame
            .timestamps
            .iter()
            .map(|ts| weather.value(ts, v))
            .collect();
        frame.set_column(name, values);
    }
    frame
}

/// Left join of registry static features on region
pub fn attach_static(mut frame: FeatureFrame, registry: &RegionRegistry) -> FeatureFrame {
    for column in registry.static_columns() {
        let values = frame
            .regions
            .iter()
            .map(|r| registry.static_feature(r, &column))
            .collect();
        frame.set_column(&column, values);
    }
    frame
}

/// Apply every builder step in the order shared by training and forecasting
pub fn build_features(
    frame: FeatureFrame,
    registry: &RegionRegistry,
    weather: Option<&WeatherTable>,
    encoder: &CategoryEncoder,
    lags: &[usize],
) -> FeatureFrame {
    let frame = attach_static(frame, registry);
    let frame = match weather {
        Some(table) => merge_weather(frame, table),
        None => frame,
    };
    let frame = add_calendar_features(frame);
    let frame = add_lag_features(frame, lags);
    encode_categoricals(frame, encoder)
}

/// Modeling columns: calendar, category codes, lags, then every other
/// numeric column in frame order. Identifiers and the target never appear.
pub fn feature_columns(frame: &FeatureFrame, lags: &[usize]) -> Vec<String> {
    let lag_names: Vec<String> = lags.iter().map(|l| lag_column(*l)).collect();
    let mut cols: Vec<String> = CALENDAR_COLUMNS
        .iter()
        .chain(CATEGORY_COLUMNS.iter())
        .map(|s| s.to_string())
        .chain(lag_names.iter().cloned())
        .filter(|c| frame.column(c).is_some())
        .collect();
    for name in frame.column_names() {
        if !cols.iter().any(|c| c == name) {
            cols.push(name.to_string());
        }
    }
    cols
}
