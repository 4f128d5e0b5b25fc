//! CSV export for forecast and peak tables

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::domain::{ForecastRow, PeakRow};

const FORECAST_HEADER: [&str; 6] = ["timestamp", "region", "source", "mw_hat", "mw_lo", "mw_hi"];
const PEAK_HEADER: [&str; 7] = [
    "date",
    "timestamp",
    "region",
    "source",
    "peak_mw_forecast",
    "mw_lo",
    "mw_hi",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

pub fn export_forecast(rows: &[ForecastRow], path: &Path) -> Result<()> {
    let file = create(path)?;
    write_forecast_csv(rows, io::BufWriter::new(file))
        .with_context(|| format!("failed to write {}", path.display()))
}

pub fn export_peaks(rows: &[PeakRow], path: &Path) -> Result<()> {
    let file = create(path)?;
    write_peaks_csv(rows, io::BufWriter::new(file))
        .with_context(|| format!("failed to write {}", path.display()))
}

fn create(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    File::create(path).with_context(|| format!("failed to create {}", path.display()))
}

/// Forecast rows as CSV, one line per hour
pub fn write_forecast_csv(rows: &[ForecastRow], writer: impl Write) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(FORECAST_HEADER)?;
    for r in rows {
        wtr.write_record(&[
            r.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            r.region.clone(),
            r.source.to_string(),
            r.mw_hat.to_string(),
            r.mw_lo.to_string(),
            r.mw_hi.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_peaks_csv(rows: &[PeakRow], writer: impl Write) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(PEAK_HEADER)?;
    for r in rows {
        wtr.write_record(&[
            r.date.format("%Y-%m-%d").to_string(),
            r.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            r.region.clone(),
            r.source.to_string(),
            r.peak_mw_forecast.to_string(),
            r.mw_lo.to_string(),
            r.mw_hi.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Source;
    use chrono::{TimeZone, Utc};

    fn row() -> ForecastRow {
        ForecastRow {
            timestamp: Utc.with_ymd_and_hms(2025, 11, 1, 14, 0, 0).unwrap(),
            region: "north".into(),
            source: Source::Solar,
            mw_hat: 12.5,
            mw_lo: 10.625,
            mw_hi: 14.375,
        }
    }

    #[test]
    fn test_forecast_csv_layout() {
        let mut buf = Vec::new();
        write_forecast_csv(&[row()], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "timestamp,region,source,mw_hat,mw_lo,mw_hi");
        assert_eq!(lines[1], "2025-11-01 14:00:00+00:00,north,Solar,12.5,10.625,14.375");
    }

    #[test]
    fn test_peaks_csv_layout() {
        let mut buf = Vec::new();
        write_peaks_csv(&[PeakRow::from(&row())], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("date,timestamp,region,source,peak_mw_forecast,mw_lo,mw_hi\n"));
        assert!(text.contains("2025-11-01,2025-11-01 14:00:00+00:00,north,Solar,12.5"));
    }

    #[test]
    fn test_export_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/forecast_7d.csv");
        export_forecast(&[row()], &path).unwrap();
        assert!(path.exists());
    }
}
