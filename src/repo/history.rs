//! Historical generation loader (CSV)

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::HashSet;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{info, warn};

use crate::domain::{Observation, Source};
use crate::error::GroupError;

const REQUIRED_COLUMNS: [&str; 4] = ["timestamp", "region", "source", "mw"];

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Load observations from a CSV file with `timestamp,region,source,mw` columns
pub fn load_history(path: &Path) -> Result<Vec<Observation>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open history file {}", path.display()))?;
    let observations = read_history(file)?;
    info!(path = %path.display(), rows = observations.len(), "loaded history");
    Ok(observations)
}

/// Parse history CSV from any reader.
///
/// A header without one of the required columns yields an empty history. Rows with an unparseable timestamp, unknown source, or missing, negative or
/// non-finite `mw` are dropped. Duplicate (region, source, timestamp) rows keep
/// the first occurrence. The result is sorted by timestamp.
pub fn read_history<R: Read>(reader: R) -> Result<Vec<Observation>> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = csv.headers().context("failed to read history header")?.clone();
    let mut idx = [0usize; 4];
    for (slot, name) in idx.iter_mut().zip(REQUIRED_COLUMNS) {
        match headers.iter().position(|h| h.eq_ignore_ascii_case(name)) {
            Some(pos) => *slot = pos,
            None => {
                warn!(column = name, "history is missing a required column, treating it as empty");
                return Ok(Vec::new());
            }
        }
    }

    let mut seen = HashSet::new();
    let mut observations = Vec::new();
    let mut dropped = 0usize;
    let mut duplicates = 0usize;

    for record in csv.records() {
        let parsed = record
            .map_err(|e| GroupError::MalformedInput(e.to_string()))
            .and_then(|r| parse_row(&r, &idx));
        let obs = match parsed {
            Ok(obs) => obs,
            Err(_) => {
                dropped += 1;
                continue;
            }
        };
        if !seen.insert((obs.region.clone(), obs.source, obs.timestamp)) {
            duplicates += 1;
            continue;
        }
        observations.push(obs);
    }

    if dropped > 0 || duplicates > 0 {
        warn!(dropped, duplicates, "dropped malformed or duplicate history rows");
    }

    observations.sort_by_key(|o| o.timestamp);
    Ok(observations)
}

fn parse_row(record: &csv::StringRecord, idx: &[usize; 4]) -> Result<Observation, GroupError> {
    let field = |i: usize| {
        record
            .get(idx[i])
            .filter(|v| !v.is_empty())
            .ok_or_else(|| GroupError::MalformedInput(format!("missing {}", REQUIRED_COLUMNS[i])))
    };

    let timestamp = parse_timestamp(field(0)?)?;
    let region = field(1)?.to_string();
    let source: Source = field(2)?
        .parse()
        .map_err(|e: &str| GroupError::MalformedInput(e.to_string()))?;
    let mw: f64 = field(3)?
        .parse()
        .map_err(|_| GroupError::MalformedInput("mw is not a number".into()))?;
    if !mw.is_finite() || mw < 0.0 {
        return Err(GroupError::MalformedInput(format!("invalid mw {mw}")));
    }

    Ok(Observation::new(timestamp, region, source, mw))
}

/// Write observations in the layout `read_history` accepts
pub fn write_history_csv(observations: &[Observation], writer: impl Write) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(REQUIRED_COLUMNS)?;
    for o in observations {
        wtr.write_record(&[
            o.timestamp.format("%Y-%m-%d %H:%M:%S%:z").to_string(),
            o.region.clone(),
            o.source.to_string(),
            o.mw.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn export_history(observations: &[Observation], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    write_history_csv(observations, std::io::BufWriter::new(file))
}

/// RFC 3339, `YYYY-MM-DD HH:MM:SS+00:00`, or a naive timestamp taken as UTC
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, GroupError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%:z") {
        return Ok(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| GroupError::MalformedInput(format!("unparseable timestamp {raw:?}")))
}
