use anyhow::Context;
use clap::Parser;
use tracker::{ServerError, config::TrackerConfig, logging};

/// Operations time-efficiency tracker API server.
#[derive(Debug, Parser)]
#[command(name = "pallyops-tracker", version, about)]
struct Args {
    /// Address to bind; overrides `HOST`.
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on; overrides `PORT`.
    #[arg(long, short)]
    port: Option<u16>,

    /// Log level used when `RUST_LOG` is unset.
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Tokio worker threads (defaults to the number of cores).
    #[arg(long)]
    workers: Option<usize>,
}

fn main() -> Result<(), ServerError> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = TrackerConfig::from_env().context("failed to load configuration")?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    let log_level = args
        .log_level
        .unwrap_or_else(|| if config.debug { "debug" } else { "info" }.to_string());
    let _file_log_guard = logging::init_logging(&log_level);

    let mut runtime = tokio::runtime::Builder::new_multi_thread();
    runtime.enable_all();
    if let Some(workers) = args.workers.filter(|&n| n > 0) {
        runtime.worker_threads(workers);
    }

    runtime.build()?.block_on(tracker::run(config))
}
