//! Server service: opens the boundaries named by the config, starts the
//! link and reports statistics until told to stop.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use skylink_core::{
    FrameCodec, LinkError, LinkSession, open_capture, open_codec, open_device,
};

use crate::config::ServerConfig;

/// The top-level server service.
pub struct ServerService {
    config: ServerConfig,
}

impl ServerService {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Open device, capture and codec, then start the link.
    ///
    /// Any error here is an initialisation failure.
    pub async fn start(&self) -> Result<LinkSession, LinkError> {
        let link = self.config.to_link_config()?;
        let video = &self.config.video;

        let device = open_device(&self.config.device.kind)?;
        let capture = open_capture(&video.source, video.capture_width, video.capture_height)?;
        let codec = FrameCodec::new(open_codec(video.codec)?, video.quality);

        info!(
            device = device.name(),
            capture = capture.name(),
            codec = codec.codec_name(),
            "boundaries opened"
        );
        LinkSession::start_server(link, device, capture, codec).await
    }

    /// Run until `shutdown` resolves, then tear the link down.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) -> Result<(), LinkError> {
        let session = self.start().await?;
        info!(local = %session.local_addr(), peer = %session.peer_addr(), "link up");
        let interval = self.config.logging.stats_interval_secs;

        tokio::pin!(shutdown);
        if interval == 0 {
            shutdown.await;
        } else {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval));
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = ticker.tick() => Self::report(&session),
                }
            }
        }

        session.shutdown().await;
        Ok(())
    }

    fn report(session: &LinkSession) {
        if let Some(control) = session.control_diagnostics() {
            match control.since_last_applied() {
                Some(age) if age > Duration::from_secs(1) => {
                    warn!(silent_for = ?age, "no control packets recently");
                }
                None => warn!("no control packets received yet"),
                Some(_) => {}
            }
            info!(
                received = control.received(),
                applied = control.applied(),
                malformed = control.malformed(),
                device_errors = control.device_errors(),
                "control"
            );
        }
        if let Some(video) = session.producer_stats() {
            info!(
                sent = video.sent(),
                dropped = video.dropped_oversize(),
                bytes_per_sec = video.bytes_per_sec(),
                "video"
            );
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
