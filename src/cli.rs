//! Command line interface

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::pipeline::{synth::DEFAULT_SEED, TrainRequest};
use crate::repo::history::parse_timestamp;

#[derive(Parser, Debug)]
#[command(
    name = "renewables-forecast",
    version,
    about = "Per-region solar and wind generation forecasts over a 7-day horizon"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP API
    Serve,

    /// Train one model set per (region, source) group
    Train(TrainArgs),

    /// Forecast every trained group and write the CSV outputs and map animation
    Forecast(ForecastArgs),

    /// Generate a synthetic history file for the registry regions
    Synth(SynthArgs),
}

#[derive(Args, Debug, Default)]
pub struct TrainArgs {
    /// History CSV (defaults to `paths.data`)
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Region registry JSON (defaults to `paths.registry`)
    #[arg(long)]
    pub registry: Option<PathBuf>,

    /// Output directory for model artifacts (defaults to `paths.model_dir`)
    #[arg(long)]
    pub model_dir: Option<PathBuf>,

    /// First day of historical weather, YYYY-MM-DD
    #[arg(long)]
    pub history_start: Option<NaiveDate>,

    /// Last day of historical weather, YYYY-MM-DD
    #[arg(long)]
    pub history_end: Option<NaiveDate>,
}

impl From<TrainArgs> for TrainRequest {
    fn from(args: TrainArgs) -> Self {
        Self {
            data_path: args.data,
            registry_path: args.registry,
            model_dir: args.model_dir,
            history_start: args.history_start,
            history_end: args.history_end,
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct ForecastArgs {
    /// Directory for forecast_7d.csv, peak_hours.csv and the map GIF (defaults to `paths.out_dir`)
    #[arg(long)]
    pub out_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SynthArgs {
    /// First hour of the series
    #[arg(long, value_parser = parse_utc)]
    pub start: DateTime<Utc>,

    /// Last hour of the series (inclusive)
    #[arg(long, value_parser = parse_utc)]
    pub end: DateTime<Utc>,

    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Output CSV (defaults to `paths.data`)
    #[arg(long)]
    pub output: Option<PathBuf>,
}

fn parse_utc(raw: &str) -> Result<DateTime<Utc>, String> {
    parse_timestamp(raw)
        .or_else(|_| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(|d| d.and_time(NaiveTime::MIN).and_utc())
                .map_err(|e| e.to_string())
        })
        .map_err(|e| format!("invalid timestamp {raw:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_train_args() {
        let cli = Cli::try_parse_from([
            "renewables-forecast",
            "train",
            "--data",
            "data/history.csv",
            "--history-start",
            "2025-01-01",
            "--history-end",
            "2025-03-31",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else {
            panic!("expected train");
        };
        let req = TrainRequest::from(args);
        assert_eq!(req.data_path, Some(PathBuf::from("data/history.csv")));
        assert_eq!(req.history_start, NaiveDate::from_ymd_opt(2025, 1, 1));
        assert!(req.model_dir.is_none());
    }

    #[test]
    fn test_parse_synth_args() {
        let cli = Cli::try_parse_from([
            "renewables-forecast",
            "synth",
            "--start",
            "2025-01-01",
            "--end",
            "2025-01-31 23:00:00",
        ])
        .unwrap();
        let Commands::Synth(args) = cli.command else {
            panic!("expected synth");
        };
        assert_eq!(args.start, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(args.end, Utc.with_ymd_and_hms(2025, 1, 31, 23, 0, 0).unwrap());
        assert_eq!(args.seed, DEFAULT_SEED);
    }

    #[test]
    fn test_unknown_subcommand_fails() {
        assert!(Cli::try_parse_from(["renewables-forecast", "optimize"]).is_err());
    }
}
