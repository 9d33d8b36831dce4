use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use animatic_config::{AnimaticConfig, ObservabilityConfig};

#[derive(Debug, Parser)]
#[command(name = "animatic-server", about = "Prompt-to-animation pipeline server")]
struct Args {
    #[arg(long, default_value = "configs/animatic.yaml")]
    config: PathBuf,
    /// Overrides server.listen from the config file
    #[arg(long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = if args.config.exists() {
        animatic_config::load_config(&args.config)?
    } else {
        eprintln!(
            "config file '{}' not found; using defaults",
            args.config.display()
        );
        AnimaticConfig::default()
    };

    init_tracing(&config.observability);

    let listen = match args.listen {
        Some(listen) => listen,
        None => config
            .server
            .listen
            .parse()
            .context("invalid server.listen address")?,
    };

    animatic_server::run_server(config, listen).await
}

fn init_tracing(observability: &ObservabilityConfig) {
    let fallback_level = match observability.log_level.trim().to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "info" => "info",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(fallback_level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
