//! skylink client entry point.
//!
//! ```text
//! skylink-client                         Connect with defaults
//! skylink-client --pattern circles       Drive a calibration pattern
//! skylink-client --duration 30           Stop after 30 seconds
//! skylink-client --config <path>         Use custom config TOML
//! skylink-client --gen-config            Dump default config and exit
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use skylink_core::Pattern;
use skylink_client::config::ClientConfig;
use skylink_client::service::ClientService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "skylink-client", about = "skylink stick-control sender and video viewer")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "skylink-client.toml")]
    config: PathBuf,

    /// Server control address (overrides config). Example: 192.168.1.50:9000
    #[arg(short, long)]
    server: Option<String>,

    /// Stick pattern: center, disarm, circles, throttle-up, pitch-up,
    /// roll-right, yaw-left, throttle-down, throttle-drop.
    #[arg(short, long)]
    pattern: Option<Pattern>,

    /// Seconds to run before stopping (0 = until Ctrl-C).
    #[arg(short, long)]
    duration: Option<u64>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ClientConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = match ClientConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            init_tracing("info");
            error!("{e}");
            std::process::exit(1);
        }
    };
    if let Some(addr) = cli.server {
        config.network.server_address = addr;
    }
    if let Some(pattern) = cli.pattern {
        config.pattern.name = pattern;
    }
    if let Some(secs) = cli.duration {
        config.pattern.duration_secs = secs;
    }

    init_tracing(&config.logging.level);
    if !cli.config.exists() {
        info!("no config at {}; using defaults", cli.config.display());
    }

    info!("skylink-client v{}", env!("CARGO_PKG_VERSION"));
    info!("server: {}", config.network.server_address);
    info!("video port: {}", config.network.video_port);
    info!("pattern: {}", config.pattern.name);

    let service = ClientService::new(config);
    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, centring sticks and shutting down");
    };

    if let Err(e) = service.run(shutdown).await {
        error!("client failed to start: {e}");
        std::process::exit(1);
    }

    Ok(())
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
