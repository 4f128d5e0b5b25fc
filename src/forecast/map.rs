//! Daily regional totals and the animated map built from them

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use itertools::{Itertools, MinMaxResult};
use plotters::prelude::*;
use plotters::style::FontStyle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;
use std::path::Path;
use std::sync::OnceLock;

use crate::domain::{ForecastRow, RegionRegistry};

/// One region marker in a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapPoint {
    pub region: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Sum of `mw_hat` over the day and all sources
    pub mw_hat: f64,
    pub marker_size: f64,
}

/// All region markers for one calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapFrame {
    pub day: NaiveDate,
    pub points: Vec<MapPoint>,
}

/// Marker size scaled against the day's largest total (floored at 1 MW)
fn marker_size(mw: f64, day_max: f64) -> f64 {
    50.0 + mw / day_max.max(1.0) * 300.0
}

pub fn daily_map_frames(rows: &[ForecastRow], registry: &RegionRegistry) -> Vec<MapFrame> {
    let mut totals: BTreeMap<NaiveDate, BTreeMap<&str, f64>> = BTreeMap::new();
    for row in rows {
        *totals
            .entry(row.date())
            .or_default()
            .entry(row.region.as_str())
            .or_default() += row.mw_hat;
    }

    totals
        .into_iter()
        .map(|(day, regions)| {
            let day_max = regions.values().copied().fold(f64::NEG_INFINITY, f64::max);
            let points = regions
                .into_iter()
                .map(|(region, mw)| {
                    let entry = registry.get(region);
                    MapPoint {
                        region: region.to_string(),
                        lat: entry.map(|e| e.lat),
                        lon: entry.map(|e| e.lon),
                        mw_hat: mw,
                        marker_size: marker_size(mw, day_max),
                    }
                })
                .collect_vec();
            MapFrame { day, points }
        })
        .collect()
}

const GIF_SIZE: (u32, u32) = (600, 400);
const FRAME_DELAY_MS: u32 = 1000;
const COORD_PAD_DEG: f64 = 5.0;
const TITLE: &str = "Daily Regional Generation (Forecast)";

static FONT: OnceLock<Result<(), String>> = OnceLock::new();

fn register_fonts() -> Result<()> {
    FONT.get_or_init(|| {
        plotters::style::register_font(
            "sans-serif",
            FontStyle::Normal,
            include_bytes!("../../assets/DejaVuSans.ttf"),
        )
        .map_err(|_| "InvalidFont".to_string())
    })
    .clone()
    .map_err(|e| anyhow!("failed to register map font: {e}"))
}

fn padded(range: MinMaxResult<f64>) -> Option<Range<f64>> {
    let (lo, hi) = match range {
        MinMaxResult::NoElements => return None,
        MinMaxResult::OneElement(v) => (v, v),
        MinMaxResult::MinMax(lo, hi) => (lo, hi),
    };
    Some(lo - COORD_PAD_DEG..hi + COORD_PAD_DEG)
}

/// Longitude and latitude axis ranges covering every registry region
fn map_bounds(registry: &RegionRegistry) -> Option<(Range<f64>, Range<f64>)> {
    let lon = padded(registry.iter().map(|e| e.lon).minmax_by(f64::total_cmp))?;
    let lat = padded(registry.iter().map(|e| e.lat).minmax_by(f64::total_cmp))?;
    Some((lon, lat))
}

/// Marker radius in pixels for a scatter size given in square points
fn marker_radius(marker_size: f64) -> i32 {
    (marker_size.sqrt() * 0.7).round() as i32
}

fn plot_err(e: impl std::fmt::Display) -> anyhow::Error {
    anyhow!("map rendering failed: {e}")
}

/// Write `frames` as an animated GIF, one frame per day.
///
/// Axes span the registry coordinates padded by 5 degrees. Points without
/// coordinates are left off the map.
pub fn render_map_gif(frames: &[MapFrame], registry: &RegionRegistry, path: &Path) -> Result<()> {
    if frames.is_empty() {
        anyhow::bail!("no map frames to render");
    }
    let (lon_range, lat_range) =
        map_bounds(registry).ok_or_else(|| anyhow!("region registry has no coordinates"))?;
    register_fonts()?;

    let root = BitMapBackend::gif(path, GIF_SIZE, FRAME_DELAY_MS)
        .map_err(plot_err)?
        .into_drawing_area();

    for frame in frames {
        root.fill(&WHITE).map_err(plot_err)?;
        let mut chart = ChartBuilder::on(&root)
            .caption(format!("{TITLE} {}", frame.day), ("sans-serif", 18))
            .margin(10)
            .x_label_area_size(35)
            .y_label_area_size(40)
            .build_cartesian_2d(lon_range.clone(), lat_range.clone())
            .map_err(plot_err)?;
        chart
            .configure_mesh()
            .x_desc("Longitude")
            .y_desc("Latitude")
            .draw()
            .map_err(plot_err)?;

        chart
            .draw_series(frame.points.iter().filter_map(|p| {
                let at = (p.lon?, p.lat?);
                let r = marker_radius(p.marker_size);
                Some(
                    EmptyElement::at(at)
                        + Circle::new((0, 0), r, BLUE.mix(0.6).filled())
                        + Text::new(p.region.clone(), (-r, -r - 26), ("sans-serif", 12).into_font())
                        + Text::new(format!("{:.0} MW", p.mw_hat), (-r, -r - 13), ("sans-serif", 12).into_font()),
                )
            }))
            .map_err(plot_err)?;

        root.present().map_err(plot_err)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RegionEntry, Source};
    use chrono::{Duration, TimeZone, Utc};

    fn row(region: &str, source: Source, hour: i64, mw: f64) -> ForecastRow {
        let t0 = Utc.with_ymd_and_hms(2025, 11, 1, 0, 0, 0).unwrap();
        ForecastRow {
            timestamp: t0 + Duration::hours(hour),
            region: region.into(),
            source,
            mw_hat: mw,
            mw_lo: mw,
            mw_hi: mw,
        }
    }

    #[test]
    fn test_daily_region_sums_and_sizes() {
        let registry = RegionRegistry::new(vec![RegionEntry::new("north", 55.0, 9.0)]);
        let rows = vec![
            row("north", Source::Solar, 1, 10.0),
            row("north", Source::Wind, 2, 30.0),
            row("south", Source::Wind, 3, 20.0),
            row("south", Source::Wind, 25, 0.5),
        ];
        let frames = daily_map_frames(&rows, &registry);
        assert_eq!(frames.len(), 2);

        let first = &frames[0];
        assert_eq!(first.points[0].region, "north");
        assert_eq!(first.points[0].mw_hat, 40.0);
        assert_eq!(first.points[0].marker_size, 350.0);
        assert_eq!(first.points[0].lat, Some(55.0));
        assert_eq!(first.points[1].marker_size, 50.0 + 20.0 / 40.0 * 300.0);
        assert_eq!(first.points[1].lat, None);

        // below 1 MW the scale floor applies
        assert_eq!(frames[1].points[0].marker_size, 50.0 + 0.5 * 300.0);
    }

    #[test]
    fn test_empty_forecast_has_no_frames() {
        assert!(daily_map_frames(&[], &RegionRegistry::default()).is_empty());
    }

    #[test]
    fn test_bounds_are_padded() {
        let registry = RegionRegistry::new(vec![
            RegionEntry::new("north", 55.0, 9.0),
            RegionEntry::new("south", 47.0, 11.0),
        ]);
        let (lon, lat) = map_bounds(&registry).unwrap();
        assert_eq!(lon, 4.0..16.0);
        assert_eq!(lat, 42.0..60.0);
        assert!(map_bounds(&RegionRegistry::default()).is_none());
        assert_eq!(marker_radius(350.0), 13);
    }

    #[test]
    fn test_render_gif() {
        let registry = RegionRegistry::new(vec![
            RegionEntry::new("north", 55.0, 9.0),
            RegionEntry::new("south", 47.0, 11.0),
        ]);
        let rows = vec![
            row("north", Source::Solar, 1, 10.0),
            row("south", Source::Wind, 2, 20.0),
            row("east", Source::Wind, 3, 5.0),
            row("north", Source::Wind, 30, 12.0),
        ];
        let frames = daily_map_frames(&rows, &registry);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.gif");

        render_map_gif(&frames, &registry, &path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"GIF8"));
        // a second render reuses the registered font
        render_map_gif(&frames, &registry, &path).unwrap();
    }

    #[test]
    fn test_render_without_frames_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RegionRegistry::new(vec![RegionEntry::new("north", 55.0, 9.0)]);
        assert!(render_map_gif(&[], &registry, &dir.path().join("map.gif")).is_err());
        assert!(!dir.path().join("map.gif").exists());
    }
}
