use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ============================================================================
// Generation Sources
// ============================================================================

/// Renewable generation technology of a site
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Source {
    Solar,
    Wind,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Solar => "Solar",
            Self::Wind => "Wind",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Source {
    type Err = &'static str;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "solar" => Ok(Self::Solar),
            "wind" => Ok(Self::Wind),
            _ => Err("invalid source; expected Solar or Wind"),
        }
    }
}

// ============================================================================
// Groups & Observations
// ============================================================================

/// A (region, source) pair, the unit of independent training and forecasting
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub region: String,
    pub source: Source,
}

impl GroupKey {
    pub fn new(region: impl Into<String>, source: Source) -> Self {
        Self {
            region: region.into(),
            source,
        }
    }

    /// Site identity, e.g. `"north-Solar"`
    pub fn site_id(&self) -> String {
        site_id(&self.region, self.source)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.region, self.source)
    }
}

pub fn site_id(region: &str, source: Source) -> String {
    format!("{region}-{source}")
}

/// One hourly generation measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub region: String,
    pub source: Source,
    /// Generation in MW (non-negative)
    pub mw: f64,
}

impl Observation {
    pub fn new(timestamp: DateTime<Utc>, region: impl Into<String>, source: Source, mw: f64) -> Self {
        Self {
            timestamp,
            region: region.into(),
            source,
            mw,
        }
    }

    pub fn group_key(&self) -> GroupKey {
        GroupKey::new(self.region.clone(), self.source)
    }
}

/// Partition observations by group, each group sorted by timestamp.
///
/// Iteration order of the returned map is the sorted group order used by
/// both training and forecasting.
pub fn group_observations(history: &[Observation]) -> BTreeMap<GroupKey, Vec<Observation>> {
    let mut groups: BTreeMap<GroupKey, Vec<Observation>> = BTreeMap::new();
    for obs in history {
        groups.entry(obs.group_key()).or_default().push(obs.clone());
    }
    for rows in groups.values_mut() {
        rows.sort_by_key(|o| o.timestamp);
    }
    groups
}

// ============================================================================
// Region Registry
// ============================================================================

/// Static attributes of a region.
///
/// Summary features (e.g. `pvgis_ghi_mean`, `gwa_mean_speed_100m`) live in
/// `extra` so that registry files keep any field they carry on save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionEntry {
    pub region: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl RegionEntry {
    pub fn new(region: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            region: region.into(),
            lat,
            lon,
            elevation: None,
            extra: BTreeMap::new(),
        }
    }

    /// Numeric value of a static summary feature, `None` when absent or null
    pub fn static_value(&self, name: &str) -> Option<f64> {
        self.extra.get(name).and_then(|v| v.as_f64())
    }

    pub fn set_static(&mut self, name: &str, value: Option<f64>) {
        let v = value
            .and_then(serde_json::Number::from_f64)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null);
        self.extra.insert(name.to_string(), v);
    }

    /// Names of extra fields that hold numbers (or null placeholders)
    fn numeric_extra_names(&self) -> impl Iterator<Item = &String> {
        self.extra
            .iter()
            .filter(|(_, v)| v.is_number() || v.is_null())
            .map(|(k, _)| k)
    }
}

/// Region name -> static attributes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionRegistry {
    entries: BTreeMap<String, RegionEntry>,
}

impl RegionRegistry {
    pub fn new(entries: Vec<RegionEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|e| (e.region.clone(), e))
                .collect(),
        }
    }

    pub fn get(&self, region: &str) -> Option<&RegionEntry> {
        self.entries.get(region)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegionEntry> {
        self.entries.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RegionEntry> {
        self.entries.values_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<RegionEntry> {
        self.entries.into_values().collect()
    }

    /// Static column layout shared by every region: lat, lon, elevation, then
    /// the union of numeric summary fields in name order.
    pub fn static_columns(&self) -> Vec<String> {
        let extras: BTreeSet<&String> = self
            .entries
            .values()
            .flat_map(|e| e.numeric_extra_names())
            .collect();
        ["lat", "lon", "elevation"]
            .iter()
            .map(|s| s.to_string())
            .chain(extras.into_iter().cloned())
            .collect()
    }

    /// Value of one static column for a region
    pub fn static_feature(&self, region: &str, column: &str) -> Option<f64> {
        let entry = self.entries.get(region)?;
        match column {
            "lat" => Some(entry.lat),
            "lon" => Some(entry.lon),
            "elevation" => entry.elevation,
            other => entry.static_value(other),
        }
    }
}
