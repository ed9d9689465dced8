//! Client service: starts the link, drives the configured pattern and
//! reports statistics until told to stop.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use skylink_core::pattern::PATTERN_STEP;
use skylink_core::{
    DisplaySink, FrameCodec, LinkError, LinkSession, NullSink, SessionState, open_codec,
    run_pattern,
};

use crate::config::ClientConfig;
use crate::display::StatusSink;

/// The top-level client service.
pub struct ClientService {
    config: ClientConfig,
}

impl ClientService {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Start the link around `state`.
    ///
    /// Any error here is an initialisation failure.
    pub async fn start(&self, state: SessionState) -> Result<LinkSession, LinkError> {
        let link = self.config.to_link_config()?;
        let codec = FrameCodec::new(open_codec(self.config.display.codec)?, 100);
        let sink: Box<dyn DisplaySink> = if self.config.display.enabled {
            Box::new(StatusSink::new())
        } else {
            Box::new(NullSink)
        };
        LinkSession::start_client(link, state, sink, codec).await
    }

    /// Run until `shutdown` resolves or the pattern duration elapses.
    ///
    /// The sticks are re-centred and that sample is given time to reach
    /// the server before the link is torn down.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) -> Result<(), LinkError> {
        let state = SessionState::default();
        let session = self.start(state.clone()).await?;
        info!(local = %session.local_addr(), peer = %session.peer_addr(), "link up");

        let pattern = self.config.pattern.name;
        let pattern_cancel = session.cancel_token().child_token();
        let pattern_task = tokio::spawn(run_pattern(
            pattern,
            state.clone(),
            PATTERN_STEP,
            pattern_cancel.clone(),
        ));

        let limit = self.config.pattern.duration_secs;
        let deadline = async move {
            if limit == 0 {
                std::future::pending::<()>().await;
            } else {
                tokio::time::sleep(Duration::from_secs(limit)).await;
                info!(pattern = %pattern, secs = limit, "pattern duration elapsed");
            }
        };

        let interval = Duration::from_secs(self.config.logging.stats_interval_secs.max(1));
        let report = self.config.logging.stats_interval_secs > 0;
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        tokio::pin!(shutdown);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = &mut deadline => break,
                _ = ticker.tick() => if report { Self::report(&session) },
            }
        }

        pattern_cancel.cancel();
        if let Err(e) = pattern_task.await {
            warn!("pattern task failed: {e}");
        }
        tokio::time::sleep(self.flush_delay()).await;

        session.shutdown().await;
        Ok(())
    }

    /// Two send ticks, so the centred sample goes out at least once.
    fn flush_delay(&self) -> Duration {
        let rate = self.config.control.rate_hz.max(1) as f64;
        Duration::from_secs_f64(2.0 / rate).max(Duration::from_millis(20))
    }

    fn report(session: &LinkSession) {
        if let Some(control) = session.sender_stats() {
            info!(sent = control.sent(), failed = control.failed(), "control");
        }
        if let Some(video) = session.frame_stats() {
            let s = video.borrow().clone();
            info!(
                fps = s.fps,
                frames = s.total_frames,
                bytes = s.total_bytes,
                width = s.width,
                height = s.height,
                decode_failures = s.decode_failures,
                "video"
            );
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
