//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "binary"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Binary entrypoint for the exporter daemon."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ame_collector::{CollectorFleet, CollectorSchedule};
use ame_common::config::{AppConfig, LoadedAppConfig};
use ame_common::logging::init_tracing;
use ame_metrics::{new_registry, spawn_http_server, ExporterMetrics, GaugeRegistry};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Synthetic device connectivity exporter",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, help = "Override the default site label")]
    site: Option<String>,

    #[arg(long, value_name = "SECS", help = "Override the base period in seconds")]
    period_secs: Option<f64>,

    #[arg(long, help = "Seed the random health source for reproducible output")]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run the device collectors")]
    Run,
    #[command(about = "Load and validate the configuration, then exit")]
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let load_started = Instant::now();
    let loaded = match &cli.config {
        Some(path) => LoadedAppConfig {
            config: AppConfig::from_path(path)?,
            source: path.clone(),
        },
        None => AppConfig::load_with_source(&[
            PathBuf::from("configs/exporter.toml"),
            PathBuf::from("exporter.toml"),
        ])?,
    };
    let mut config = loaded.config;
    apply_overrides(&mut config, &cli)?;
    let load_duration = load_started.elapsed();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            init_tracing("ame-exporterd", &config.logging)?;
            info!(config_path = %loaded.source.display(), devices = config.devices.len(), "configuration loaded");
            run_daemon(config, load_duration).await?
        }
        Commands::CheckConfig => print_summary(&config, &loaded.source),
    }

    Ok(())
}

fn apply_overrides(config: &mut AppConfig, cli: &Cli) -> Result<()> {
    if let Some(site) = &cli.site {
        config.site = site.clone();
    }
    if let Some(secs) = cli.period_secs {
        config.period = Duration::try_from_secs_f64(secs)
            .with_context(|| format!("invalid --period-secs value {secs}"))?;
    }
    if let Some(seed) = cli.seed {
        config.health.seed = Some(seed);
    }
    config
        .validate()
        .context("invalid configuration after CLI overrides")
}

async fn run_daemon(config: AppConfig, load_duration: Duration) -> Result<()> {
    let registry = new_registry();
    let exporter_metrics = ExporterMetrics::new(registry.clone())?;
    exporter_metrics.inc_start();
    exporter_metrics.observe_config_load(load_duration.as_secs_f64());
    let gauges = Arc::new(GaugeRegistry::new(registry.clone())?);

    let metrics_server = if config.metrics.enabled {
        Some(spawn_http_server(registry, config.metrics.listen)?)
    } else {
        info!("metrics exporter disabled by configuration");
        None
    };

    let fleet = CollectorFleet::from_config(&config, gauges).with_metrics(exporter_metrics);
    let handle = fleet.start_configured(&config);

    info!(
        collectors = handle.len(),
        serial_numbers = ?handle.serial_numbers(),
        "exporter running; waiting for termination signal"
    );
    signal::ctrl_c().await?;
    info!("ctrl-c received; shutting down");
    handle.shutdown().await?;

    if let Some(server) = metrics_server {
        server.shutdown().await?;
    }
    Ok(())
}

fn print_summary(config: &AppConfig, source: &std::path::Path) {
    let schedule = CollectorSchedule::from_config(config.period, &config.schedule);
    println!("Config: {}", source.display());
    println!("Site: {}", config.site);
    println!("Period: {:?}", config.period);
    println!(
        "Schedule: connectivity every {:?}, core after {:?}, ran after {:?}, fabric after {:?}",
        schedule.connectivity_interval,
        schedule.core_event_delay,
        schedule.ran_event_delay,
        schedule.fabric_event_delay
    );
    match config.health.seed {
        Some(seed) => println!("Health: random, seed {}", seed),
        None => println!("Health: random, entropy seeded"),
    }
    for (serial, device) in &config.devices {
        println!(
            "Device {}: sim={} site={}",
            serial,
            device.sim.as_deref().unwrap_or("<none>"),
            config.site_for(device)
        );
    }
    if config.metrics.enabled {
        println!("Metrics: http://{}/metrics", config.metrics.listen);
    } else {
        println!("Metrics: disabled");
    }
}
