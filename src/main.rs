// src/main.rs

use clap::Parser;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use drawbridge::config::DrawbridgeConfig;

#[derive(Debug, Parser)]
#[command(name = "drawbridge", about = "Streaming LLM chat proxy for draw.io diagram authoring")]
struct Cli {
    /// Bind host (overrides DRAWBRIDGE_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides DRAWBRIDGE_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Path to the persisted client configuration file
    #[arg(long)]
    config_path: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = DrawbridgeConfig::from_env();
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(path) = cli.config_path {
        config.config_path = Some(path);
    }

    let level = config
        .log_level
        .parse::<Level>()
        .unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting drawbridge");
    info!("Request timeout: {}s", config.request_timeout);

    drawbridge::server::run(&config).await
}
