use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tipdj::event_pipeline::StopSignal;
use tipdj::{init_logging, App, Settings};

/// Queue songs requested in stream tips
#[derive(Parser, Debug)]
#[command(name = "tipdj")]
#[command(version)]
pub struct Args {
    /// Path to the TOML settings file
    #[arg(short, long, default_value = "tipdj.toml")]
    pub config: PathBuf,

    /// Log level (error, warn, info, debug, trace); overrides the settings file
    #[arg(long)]
    pub log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let settings = Settings::load(&args.config)
        .with_context(|| format!("Failed to load settings from {}", args.config.display()))?;

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| settings.logging.level.clone());
    init_logging(&settings.logging, &level).context("Failed to initialize logging")?;

    let app = App::from_settings(settings).context("Failed to start tipdj")?;

    let stop = StopSignal::new();
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        tracing::info!("Interrupt received, shutting down");
        handler_stop.stop();
    })
    .context("Failed to install Ctrl-C handler")?;

    let summary = app.run(stop)?;
    tracing::info!(
        "Fetched {} pages ({} failed), handled {} events, {} left queued",
        summary.poller.fetches,
        summary.poller.failures,
        summary.events_handled,
        summary.events_left_queued
    );

    Ok(())
}
