//! Configuration for the skylink server.

use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use skylink_core::{
    CodecKind, ControlReceiverConfig, LinkError, ServerLinkConfig, VideoProducerConfig,
};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Endpoints.
    pub network: NetworkConfig,
    /// Capture and streaming settings.
    pub video: VideoConfig,
    /// Control receiver tuning.
    pub control: ControlConfig,
    /// Output device selection.
    pub device: DeviceConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind the control socket on.
    pub bind_address: String,
    /// UDP port receiving control packets.
    pub control_port: u16,
    /// `ip:port` of the client's video socket.
    pub client_address: String,
}

/// Video configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Capture source: "synthetic".
    pub source: String,
    /// Native capture size.
    pub capture_width: u32,
    pub capture_height: u32,
    /// Transmission size; frames are scaled to this before encoding.
    pub width: u32,
    pub height: u32,
    /// Capture rate.
    pub fps: u32,
    /// Compression quality (1..=100).
    pub quality: u8,
    /// Frame codec: "zstd" or "jpeg".
    ///
    /// zstd is lossless: a 480x360 BGRA frame of real screen content
    /// rarely compresses under the 65,000-byte datagram limit, so most
    /// frames are dropped. It suits the synthetic test card. For a live
    /// capture source build with the `jpeg` feature and use "jpeg".
    pub codec: CodecKind,
    /// Sleep when no new frame is ready, in milliseconds.
    pub idle_interval_ms: u64,
}

/// Control receiver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Sleep between socket polls when idle, in milliseconds.
    pub poll_interval_ms: u64,
}

/// Output device configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Device backend: "trace" or "null".
    pub kind: String,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Seconds between link statistics lines. `0` disables them.
    pub stats_interval_secs: u64,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".into(),
            control_port: 9000,
            client_address: "127.0.0.1:9001".into(),
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            source: "synthetic".into(),
            capture_width: 960,
            capture_height: 720,
            width: 480,
            height: 360,
            fps: 120,
            quality: 80,
            codec: CodecKind::Zstd,
            idle_interval_ms: 1,
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self { poll_interval_ms: 1 }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            kind: "trace".into(),
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

impl ServerConfig {
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

    /// Resolve endpoints and loop settings for the link.
    pub fn to_link_config(&self) -> Result<ServerLinkConfig, LinkError> {
        let bind_ip: IpAddr = self.network.bind_address.parse().map_err(|e| {
            LinkError::Config(format!("network.bind_address {:?}: {e}", self.network.bind_address))
        })?;
        let client: SocketAddr = self.network.client_address.parse().map_err(|e| {
            LinkError::Config(format!("network.client_address {:?}: {e}", self.network.client_address))
        })?;

        Ok(ServerLinkConfig {
            control_bind: SocketAddr::new(bind_ip, self.network.control_port),
            video_target: client,
            receiver: ControlReceiverConfig {
                poll_interval: Duration::from_millis(self.control.poll_interval_ms.clamp(1, 50)),
            },
            producer: VideoProducerConfig {
                width: self.video.width,
                height: self.video.height,
                target_fps: self.video.fps.clamp(1, 240),
                idle_interval: Duration::from_millis(self.video.idle_interval_ms.clamp(1, 50)),
            },
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let text = toml::to_string_pretty(&ServerConfig::default()).unwrap();
        assert!(text.contains("control_port"));
        assert!(text.contains("client_address"));
        assert!(text.contains("codec = \"zstd\""));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let cfg: ServerConfig = toml::from_str(
            r#"
            [network]
            control_port = 9100

            [device]
            kind = "null"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.network.control_port, 9100);
        assert_eq!(cfg.network.client_address, "127.0.0.1:9001");
        assert_eq!(cfg.device.kind, "null");
        assert_eq!(cfg.video.quality, 80);
    }

    #[test]
    fn link_config_from_defaults() {
        let link = ServerConfig::default().to_link_config().unwrap();
        assert_eq!(link.control_bind, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(link.video_target, "127.0.0.1:9001".parse().unwrap());
        assert_eq!((link.producer.width, link.producer.height), (480, 360));
        assert_eq!(link.receiver.poll_interval, Duration::from_millis(1));
    }

    #[test]
    fn to_link_config_clamps_and_validates() {
        let mut cfg = ServerConfig::default();
        cfg.video.fps = 0;
        cfg.control.poll_interval_ms = 0;
        let link = cfg.to_link_config().unwrap();
        assert_eq!(link.producer.target_fps, 1);
        assert_eq!(link.receiver.poll_interval, Duration::from_millis(1));

        cfg.network.client_address = "not-an-address".into();
        assert!(matches!(cfg.to_link_config(), Err(LinkError::Config(_))));
    }

    fn scratch_file(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("skylink-server-{}-{name}.toml", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = ServerConfig::load(Path::new("/nonexistent/skylink-server.toml")).unwrap();
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn malformed_file_is_rejected() {
        let path = scratch_file("broken", "[network\nport = \"oops\"\n");
        let result = ServerConfig::load(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(LinkError::Config(msg)) if msg.contains("invalid config")));
    }

    #[test]
    fn wrong_value_type_is_rejected() {
        let path = scratch_file("typed", "[logging]\nstats_interval_secs = \"often\"\n");
        let result = ServerConfig::load(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(LinkError::Config(_))));
    }

    #[test]
    fn valid_file_is_loaded() {
        let path = scratch_file("valid", "[logging]\nlevel = \"debug\"\n");
        let cfg = ServerConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.logging.stats_interval_secs, 5);
    }
}
