use anyhow::Result;
use clap::Parser;
use renewables_forecast::cli::{Cli, Commands, ForecastArgs, SynthArgs};
use renewables_forecast::{api, config, forecast, pipeline, repo, telemetry};
use config::Config;
use pipeline::{Pipeline, DEFAULT_MAP_GIF};
use telemetry::init_tracing;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let cfg = Config::load()?;

    match cli.command {
        Commands::Serve => serve(cfg).await,
        Commands::Train(args) => {
            let pipeline = Pipeline::from_config(cfg)?;
            let summary = pipeline.train(args.into()).await?;
            info!(
                groups = summary.groups_trained,
                dir = %summary.models_dir,
                "training finished"
            );
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Commands::Forecast(args) => run_forecast(cfg, args).await,
        Commands::Synth(args) => run_synth(cfg, args),
    }
}

async fn serve(cfg: Config) -> Result<()> {
    let addr = cfg.server.socket_addr()?;
    let state = api::AppState::new(Pipeline::from_config(cfg.clone())?);
    let app = api::router(state, &cfg);

    if cfg.server.host == "0.0.0.0" {
        warn!("server binding to 0.0.0.0 - the API will be reachable from the network");
    }

    info!(%addr, "starting renewables forecast API");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    warn!("shutdown complete");
    Ok(())
}

async fn run_forecast(cfg: Config, args: ForecastArgs) -> Result<()> {
    let out_dir = args.out_dir.unwrap_or_else(|| cfg.paths.out_dir.clone());
    let pipeline = Pipeline::from_config(cfg)?;
    let rows = pipeline.forecast().await?;
    if rows.is_empty() {
        anyhow::bail!("no forecast produced; train models first");
    }
    let peaks = forecast::peak_hours(&rows);

    repo::output::export_forecast(&rows, &out_dir.join("forecast_7d.csv"))?;
    repo::output::export_peaks(&peaks, &out_dir.join("peak_hours.csv"))?;
    pipeline
        .render_map(&rows, &out_dir, DEFAULT_MAP_GIF)
        .await?;
    info!(
        rows = rows.len(),
        peaks = peaks.len(),
        dir = %out_dir.display(),
        "wrote forecast outputs"
    );
    Ok(())
}

fn run_synth(cfg: Config, args: SynthArgs) -> Result<()> {
    let registry = repo::registry::load_registry(&cfg.paths.registry)?;
    let output = args.output.unwrap_or_else(|| cfg.paths.data.clone());
    let observations = pipeline::synth::generate(&registry, args.start, args.end, args.seed)?;
    repo::export_history(&observations, &output)?;
    info!(rows = observations.len(), path = %output.display(), "wrote synthetic history");
    Ok(())
}
