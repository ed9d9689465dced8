//! skylink server entry point.
//!
//! ```text
//! skylink-server                  Run in the foreground
//! skylink-server --config <path>  Load a custom config TOML
//! skylink-server --gen-config     Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use skylink_server::config::ServerConfig;
use skylink_server::service::ServerService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "skylink-server", about = "skylink stick-control receiver and video streamer")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "skylink-server.toml")]
    config: PathBuf,

    /// Override the control port.
    #[arg(long)]
    control_port: Option<u16>,

    /// Override the client video address (`ip:port`).
    #[arg(long)]
    client: Option<String>,

    /// Override the output device ("trace", "null").
    #[arg(long)]
    device: Option<String>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&ServerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Load config.
    let mut config = match ServerConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            init_tracing("info");
            error!("{e}");
            std::process::exit(1);
        }
    };
    if let Some(port) = cli.control_port {
        config.network.control_port = port;
    }
    if let Some(client) = cli.client {
        config.network.client_address = client;
    }
    if let Some(device) = cli.device {
        config.device.kind = device;
    }

    init_tracing(&config.logging.level);
    if !cli.config.exists() {
        info!("no config at {}; using defaults", cli.config.display());
    }

    info!("skylink-server v{}", env!("CARGO_PKG_VERSION"));
    info!("control port: {}", config.network.control_port);
    info!("client video address: {}", config.network.client_address);
    info!("video: {}x{} q{} ({:?})", config.video.width, config.video.height, config.video.quality, config.video.codec);

    let service = ServerService::new(config);
    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
    };

    if let Err(e) = service.run(shutdown).await {
        error!("server failed to start: {e}");
        std::process::exit(1);
    }

    Ok(())
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
