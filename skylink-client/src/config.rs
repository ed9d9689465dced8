//! Client configuration.

use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use serde::{Deserialize, Serialize};
use skylink_core::{ClientLinkConfig, CodecKind, ControlSenderConfig, LinkError, Pattern};

/// Top-level configuration for the client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// Control sender rates.
    pub control: ControlConfig,
    /// Video display settings.
    pub display: DisplayConfig,
    /// Stick pattern to drive.
    pub pattern: PatternConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Network settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Server control address (`ip:port`).
    pub server_address: String,
    /// Address to bind the video socket on.
    pub bind_address: String,
    /// UDP port receiving video.
    pub video_port: u16,
}

/// Control sender settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Packets per second while the sticks move.
    pub rate_hz: u32,
    /// Packets per second while the sticks are still. `0` disables
    /// throttling.
    pub idle_rate_hz: u32,
}

/// Display settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Receive and decode video at all.
    pub enabled: bool,
    /// Frame codec; must match the server ("jpeg" for live capture).
    pub codec: CodecKind,
}

/// Pattern settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Pattern name, e.g. "circles" or "throttle-up".
    pub name: Pattern,
    /// Run time in seconds. `0` runs until Ctrl-C.
    pub duration_secs: u64,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level.
    pub level: String,
    /// Seconds between link statistics lines. `0` disables them.
    pub stats_interval_secs: u64,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:9000".into(),
            bind_address: "0.0.0.0".into(),
            video_port: 9001,
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        let defaults = ControlSenderConfig::default();
        Self {
            rate_hz: defaults.rate_hz,
            idle_rate_hz: defaults.idle_rate_hz,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            codec: CodecKind::Zstd,
        }
    }
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            name: Pattern::Center,
            duration_secs: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            stats_interval_secs: 5,
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ClientConfig {
    /// Load from a TOML file. A missing file yields the defaults; a
    /// file that exists but does not parse is an error.
    pub fn load(path: &Path) -> Result<Self, LinkError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents)
                .map_err(|e| LinkError::Config(format!("invalid config {}: {e}", path.display()))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(LinkError::Config(format!("cannot read config {}: {e}", path.display()))),
        }
    }

    /// Resolve endpoints and sender rates for the link.
    pub fn to_link_config(&self) -> Result<ClientLinkConfig, LinkError> {
        let server: SocketAddr = self.network.server_address.parse().map_err(|e| {
            LinkError::Config(format!("network.server_address {:?}: {e}", self.network.server_address))
        })?;
        let bind_ip: IpAddr = self.network.bind_address.parse().map_err(|e| {
            LinkError::Config(format!("network.bind_address {:?}: {e}", self.network.bind_address))
        })?;

        Ok(ClientLinkConfig {
            video_bind: SocketAddr::new(bind_ip, self.network.video_port),
            control_target: server,
            sender: ControlSenderConfig {
                rate_hz: self.control.rate_hz.clamp(1, 1000),
                idle_rate_hz: self.control.idle_rate_hz,
            },
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────
