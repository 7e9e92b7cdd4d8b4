use std::{env, fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use rebalancer::prelude::*;
use time::macros::format_description;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Train or evaluate a DQN portfolio rebalancer on a table of unit valuations.
#[derive(Debug, Parser)]
#[command(name = "rebalancer", version, about)]
struct Cli {
    /// Either "train" or "test" ("eval" is accepted as an alias for "test").
    #[arg(short, long)]
    mode: RunMode,

    /// JSON run configuration; unspecified fields keep their defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the number of episodes.
    #[arg(short, long)]
    episodes: Option<usize>,

    /// Seed exploration, replay sampling, weight init and scaler fitting.
    #[arg(short, long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing()?;

    let mut cfg = match &cli.config {
        Some(path) => RunConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => RunConfig::default(),
    };
    if let Some(episodes) = cli.episodes {
        cfg = cfg.with_episodes(episodes);
    }
    if let Some(seed) = cli.seed {
        cfg = cfg.with_seed(seed);
    }

    info!(mode = %cli.mode, episodes = cfg.episodes, data = %cfg.data_path.display(), "Starting run");
    let values = run(&cfg, cli.mode).with_context(|| format!("{} run failed", cli.mode))?;

    if let Some(summary) = values.summary() {
        println!("{} finished: {summary}", cli.mode);
    }

    // The WorkerGuard ensures all buffered logs are flushed when dropped.
    drop(_guard);

    Ok(())
}

// ================================================================================================
// Tracing Configuration
// ================================================================================================

fn init_tracing() -> Result<Option<WorkerGuard>> {
    let app_name = "rebalancer";

    // Detect if running in container
    let in_container =
        env::var("CONTAINER").is_ok() || std::path::Path::new("/.dockerenv").exists();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if in_container {
        // Container mode: log to stdout
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_span_events(tracing_subscriber::fmt::format::FmtSpan::NONE)
            .with_current_span(true)
            .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
            .init();

        info!("Logging to stdout (container mode)");
        Ok(None)
    } else {
        // Local mode: log to file
        let log_dir = dirs::state_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".local/state")))
            .context("Failed to find a state or home directory for logs")?
            .join(app_name)
            .join("logs");
        fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

        let timestamp = time::OffsetDateTime::now_utc()
            .format(&format_description!(
                "[year][month][day]-[hour][minute][second]"
            ))
            .context("Failed to format timestamp")?;
        let file_name = format!("{app_name}-{timestamp}.log");
        let file_path = log_dir.join(&file_name);

        let file_appender = tracing_appender::rolling::never(&log_dir, &file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(non_blocking)
            .with_span_events(tracing_subscriber::fmt::format::FmtSpan::NONE)
            .with_current_span(true)
            .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
            .init();

        info!(log_file = %file_path.display(), "Logging to file (local mode)");
        Ok(Some(guard))
    }
}
