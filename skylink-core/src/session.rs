//! Link session: owns every socket and channel loop of one endpoint.
//!
//! A server session runs the control receiver and the video producer; a
//! client session runs the control sender and the video consumer. There
//! is no handshake, so either side may start first. Receive sockets are
//! bound before any task is spawned, which makes bind failures surface
//! as errors from `start_*` instead of from inside a loop.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::control::{
    ControlDiagnostics, ControlReceiver, ControlReceiverConfig, ControlSender, ControlSenderConfig,
    SenderStats,
};
use crate::device::OutputDevice;
use crate::error::LinkError;
use crate::session_state::SessionState;
use crate::task::ChannelTasks;
use crate::video::{
    CaptureSource, DisplaySink, FrameCodec, FrameStats, ProducerStats, VideoConsumer,
    VideoProducer, VideoProducerConfig,
};

/// How long teardown waits for a loop before aborting it.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

// ── Configs ──────────────────────────────────────────────────────

/// Endpoints and loop settings for the server side.
#[derive(Debug, Clone)]
pub struct ServerLinkConfig {
    /// Where control packets are received.
    pub control_bind: SocketAddr,
    /// Where video datagrams are sent.
    pub video_target: SocketAddr,
    pub receiver: ControlReceiverConfig,
    pub producer: VideoProducerConfig,
}

impl Default for ServerLinkConfig {
    fn default() -> Self {
        Self {
            control_bind: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 9000)),
            video_target: SocketAddr::from((Ipv4Addr::LOCALHOST, 9001)),
            receiver: ControlReceiverConfig::default(),
            producer: VideoProducerConfig::default(),
        }
    }
}

/// Endpoints and loop settings for the client side.
#[derive(Debug, Clone)]
pub struct ClientLinkConfig {
    /// Where video datagrams are received.
    pub video_bind: SocketAddr,
    /// Where control packets are sent.
    pub control_target: SocketAddr,
    pub sender: ControlSenderConfig,
}

impl Default for ClientLinkConfig {
    fn default() -> Self {
        Self {
            video_bind: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 9001)),
            control_target: SocketAddr::from((Ipv4Addr::LOCALHOST, 9000)),
            sender: ControlSenderConfig::default(),
        }
    }
}

// ── LinkSession ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRole {
    Server,
    Client,
}

/// Running endpoint. Dropping it cancels the loops without waiting;
/// prefer [`shutdown`](Self::shutdown).
pub struct LinkSession {
    role: LinkRole,
    local_addr: SocketAddr,
    peer_addr: SocketAddr,
    tasks: ChannelTasks,
    control_diagnostics: Option<Arc<ControlDiagnostics>>,
    producer_stats: Option<Arc<ProducerStats>>,
    sender_stats: Option<Arc<SenderStats>>,
    frame_stats: Option<watch::Receiver<FrameStats>>,
}

impl LinkSession {
    /// Bind the control socket, start capture, then spawn the control
    /// receiver and the video producer.
    pub async fn start_server(
        config: ServerLinkConfig,
        device: Box<dyn OutputDevice>,
        mut capture: Box<dyn CaptureSource>,
        codec: FrameCodec,
    ) -> Result<Self, LinkError> {
        let control_socket = UdpSocket::bind(config.control_bind).await?;
        let local_addr = control_socket.local_addr()?;
        let video_socket = bind_ephemeral(config.video_target).await?;

        capture.start(config.producer.target_fps)?;

        let receiver = ControlReceiver::new(control_socket, device, &config.receiver);
        let producer = VideoProducer::new(
            video_socket,
            config.video_target,
            capture,
            codec,
            config.producer.clone(),
        );
        let control_diagnostics = receiver.diagnostics();
        let producer_stats = producer.stats();

        let mut tasks = ChannelTasks::new();
        tasks.spawn("control-receiver", move |cancel| receiver.run(cancel));
        tasks.spawn("video-producer", move |cancel| producer.run(cancel));

        info!(control = %local_addr, video_target = %config.video_target, "server link started");
        Ok(Self {
            role: LinkRole::Server,
            local_addr,
            peer_addr: config.video_target,
            tasks,
            control_diagnostics: Some(control_diagnostics),
            producer_stats: Some(producer_stats),
            sender_stats: None,
            frame_stats: None,
        })
    }

    /// Bind the video socket, then spawn the control sender and the
    /// video consumer.
    pub async fn start_client(
        config: ClientLinkConfig,
        state: SessionState,
        sink: Box<dyn DisplaySink>,
        codec: FrameCodec,
    ) -> Result<Self, LinkError> {
        let video_socket = UdpSocket::bind(config.video_bind).await?;
        let local_addr = video_socket.local_addr()?;
        let control_socket = bind_ephemeral(config.control_target).await?;

        let sender = ControlSender::new(control_socket, config.control_target, state, &config.sender)?;
        let consumer = VideoConsumer::new(video_socket, codec, sink);
        let sender_stats = sender.stats();
        let frame_stats = consumer.stats_receiver();

        let mut tasks = ChannelTasks::new();
        tasks.spawn("control-sender", move |cancel| sender.run(cancel));
        tasks.spawn("video-consumer", move |cancel| consumer.run(cancel));

        info!(video = %local_addr, control_target = %config.control_target, "client link started");
        Ok(Self {
            role: LinkRole::Client,
            local_addr,
            peer_addr: config.control_target,
            tasks,
            control_diagnostics: None,
            producer_stats: None,
            sender_stats: Some(sender_stats),
            frame_stats: Some(frame_stats),
        })
    }

    pub fn role(&self) -> LinkRole {
        self.role
    }

    /// Bound receive address: control on a server, video on a client.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Address this endpoint sends to.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Token shared by every loop. Cancel it to stop the session, or
    /// hand it to auxiliary tasks that should stop with it.
    pub fn cancel_token(&self) -> CancellationToken {
        self.tasks.token()
    }

    /// Whether every loop has returned.
    pub fn is_finished(&self) -> bool {
        self.tasks.all_finished()
    }

    pub fn control_diagnostics(&self) -> Option<Arc<ControlDiagnostics>> {
        self.control_diagnostics.clone()
    }

    pub fn producer_stats(&self) -> Option<Arc<ProducerStats>> {
        self.producer_stats.clone()
    }

    pub fn sender_stats(&self) -> Option<Arc<SenderStats>> {
        self.sender_stats.clone()
    }

    pub fn frame_stats(&self) -> Option<watch::Receiver<FrameStats>> {
        self.frame_stats.clone()
    }

    /// Cancel every loop and wait for it to return. Sockets, the device
    /// and the capture source are released by their loops on the way out.
    pub async fn shutdown(mut self) {
        self.tasks.join_all(SHUTDOWN_GRACE).await;
        info!(role = ?self.role, "link stopped");
    }
}

/// Unspecified-address socket on an ephemeral port, same family as `peer`.
async fn bind_ephemeral(peer: SocketAddr) -> Result<UdpSocket, LinkError> {
    let local = match peer {
        SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
        SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
    };
    Ok(UdpSocket::bind(local).await?)
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::NullDevice;
    use crate::video::{NullSink, SyntheticCapture, ZstdCodec};

    fn loopback() -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, 0))
    }

    #[tokio::test]
    async fn control_port_in_use_is_an_init_error() {
        let squatter = UdpSocket::bind(loopback()).await.unwrap();
        let config = ServerLinkConfig {
            control_bind: squatter.local_addr().unwrap(),
            ..ServerLinkConfig::default()
        };
        let result = LinkSession::start_server(
            config,
            Box::new(NullDevice),
            Box::new(SyntheticCapture::new(16, 16)),
            FrameCodec::new(Box::new(ZstdCodec), 80),
        )
        .await;
        assert!(matches!(result, Err(LinkError::Transport(_))));
    }

    #[tokio::test]
    async fn capture_failure_is_an_init_error() {
        let config = ServerLinkConfig {
            control_bind: loopback(),
            ..ServerLinkConfig::default()
        };
        let result = LinkSession::start_server(
            config,
            Box::new(NullDevice),
            Box::new(SyntheticCapture::new(0, 0)),
            FrameCodec::new(Box::new(ZstdCodec), 80),
        )
        .await;
        assert!(matches!(result, Err(LinkError::DeviceInit(_))));
    }

    #[tokio::test]
    async fn zero_rate_client_is_a_config_error() {
        let config = ClientLinkConfig {
            video_bind: loopback(),
            sender: ControlSenderConfig {
                rate_hz: 0,
                ..ControlSenderConfig::default()
            },
            ..ClientLinkConfig::default()
        };
        let result = LinkSession::start_client(
            config,
            SessionState::default(),
            Box::new(NullSink),
            FrameCodec::new(Box::new(ZstdCodec), 80),
        )
        .await;
        assert!(matches!(result, Err(LinkError::Config(_))));
    }

    #[tokio::test]
    async fn client_reports_bound_address_and_stops() {
        let config = ClientLinkConfig {
            video_bind: loopback(),
            ..ClientLinkConfig::default()
        };
        let session = LinkSession::start_client(
            config,
            SessionState::default(),
            Box::new(NullSink),
            FrameCodec::new(Box::new(ZstdCodec), 80),
        )
        .await
        .unwrap();

        assert_eq!(session.role(), LinkRole::Client);
        assert!(session.local_addr().ip().is_loopback());
        assert_ne!(session.local_addr().port(), 0);
        assert_eq!(session.peer_addr(), "127.0.0.1:9000".parse().unwrap());
        assert!(session.frame_stats().is_some());
        assert!(session.control_diagnostics().is_none());

        tokio::time::timeout(Duration::from_millis(500), session.shutdown())
            .await
            .expect("shutdown hung");
    }
}
