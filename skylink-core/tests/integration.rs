//! Integration tests: full server and client sessions talking over real
//! UDP sockets on localhost.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

use skylink_core::{
    AXIS_MID, AXIS_MIN, AxisSample, CaptureSource, Channel, ClientLinkConfig, CodecKind,
    ControlSenderConfig, FrameCodec, LinkError, LinkSession, MAX_VIDEO_PAYLOAD, NullSink,
    ControlCodec, PixelFormat, RawFrame, RecordingDevice, RecordingHandle, ServerLinkConfig,
    SessionState, SyntheticCapture, VideoProducerConfig, WatchSink, open_codec,
};
use tokio_test::assert_ok;

// ── Helpers ──────────────────────────────────────────────────────

/// Reserve a loopback port by binding and immediately releasing it.
fn free_port() -> SocketAddr {
    let socket = std::net::UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    socket.local_addr().unwrap()
}

fn codec() -> FrameCodec {
    FrameCodec::new(open_codec(CodecKind::Zstd).unwrap(), 80)
}

/// Emits a fixed frame every `interval`.
struct FixedCapture {
    frame: RawFrame,
    interval: Duration,
    last: Option<Instant>,
}

impl FixedCapture {
    fn black(width: u32, height: u32) -> Self {
        Self {
            frame: RawFrame::black(width, height, PixelFormat::Rgb8),
            interval: Duration::from_millis(20),
            last: None,
        }
    }
}

impl CaptureSource for FixedCapture {
    fn start(&mut self, _target_fps: u32) -> Result<(), LinkError> {
        Ok(())
    }

    fn latest_frame(&mut self) -> Option<RawFrame> {
        let due = self.last.is_none_or(|t| t.elapsed() >= self.interval);
        if due {
            self.last = Some(Instant::now());
            Some(self.frame.clone())
        } else {
            None
        }
    }

    fn stop(&mut self) {}

    fn name(&self) -> &str {
        "fixed"
    }
}

struct Pair {
    server: LinkSession,
    client: LinkSession,
    device: RecordingHandle,
    state: SessionState,
}

/// Start a server and a client pointed at each other.
async fn start_pair(
    rate_hz: u32,
    initial: AxisSample,
    sink: Box<dyn skylink_core::DisplaySink>,
) -> Pair {
    let control = free_port();
    let video = free_port();

    let (device, handle) = RecordingDevice::new();
    let server = LinkSession::start_server(
        ServerLinkConfig {
            control_bind: control,
            video_target: video,
            producer: VideoProducerConfig {
                width: 64,
                height: 48,
                ..VideoProducerConfig::default()
            },
            ..ServerLinkConfig::default()
        },
        Box::new(device),
        Box::new(FixedCapture::black(64, 48)),
        codec(),
    )
    .await
    .unwrap();

    let state = SessionState::new(initial);
    let client = LinkSession::start_client(
        ClientLinkConfig {
            video_bind: video,
            control_target: control,
            sender: ControlSenderConfig {
                rate_hz,
                idle_rate_hz: 0,
            },
        },
        state.clone(),
        sink,
        codec(),
    )
    .await
    .unwrap();

    Pair {
        server,
        client,
        device: handle,
        state,
    }
}

// ── Control ──────────────────────────────────────────────────────

#[tokio::test(flavor = "current_thread")]
async fn control_stays_responsive_while_video_streams() {
    let (device, _handle) = RecordingDevice::new();
    let viewer = tokio::net::UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let server = LinkSession::start_server(
        ServerLinkConfig {
            control_bind: (Ipv4Addr::LOCALHOST, 0).into(),
            video_target: viewer.local_addr().unwrap(),
            ..ServerLinkConfig::default()
        },
        Box::new(device),
        Box::new(SyntheticCapture::new(64, 48)),
        codec(),
    )
    .await
    .unwrap();
    let diagnostics = server.control_diagnostics().unwrap();
    let video = server.producer_stats().unwrap();

    // Wait until the producer is busy scaling and compressing.
    let deadline = Instant::now() + Duration::from_secs(2);
    while video.sent() < 5 {
        assert!(Instant::now() < deadline, "video never started");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let pilot = tokio::net::UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let sent_at = Instant::now();
    pilot
        .send_to(&ControlCodec::encode(&AxisSample::disarmed()), server.local_addr())
        .await
        .unwrap();
    while diagnostics.applied() == 0 {
        assert!(
            sent_at.elapsed() < Duration::from_millis(250),
            "control packet waited {:?} behind video",
            sent_at.elapsed()
        );
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert_eq!(diagnostics.last_applied(), Some(AxisSample::disarmed()));

    server.shutdown().await;
}

#[tokio::test]
async fn disarm_reaches_device() {
    let pair = start_pair(10, AxisSample::disarmed(), Box::new(NullSink)).await;
    let diagnostics = pair.server.control_diagnostics().unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    while diagnostics.last_applied() != Some(AxisSample::disarmed()) {
        assert!(Instant::now() < deadline, "throttle never reached the device");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(pair.device.last(Channel::Throttle), Some(AXIS_MIN));
    assert_eq!(pair.device.last(Channel::Roll), Some(AXIS_MID));
    assert_eq!(diagnostics.malformed(), 0);

    pair.client.shutdown().await;
    pair.server.shutdown().await;
}

#[tokio::test]
async fn state_changes_follow_through() {
    let pair = start_pair(100, AxisSample::centered(), Box::new(NullSink)).await;

    pair.state.set_axis(Channel::Yaw, 99_999);
    let deadline = Instant::now() + Duration::from_secs(2);
    while pair.device.last(Channel::Yaw) != Some(32_768) {
        assert!(Instant::now() < deadline, "yaw change never arrived");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    pair.client.shutdown().await;
    pair.server.shutdown().await;
}

#[tokio::test]
async fn client_without_server_keeps_running() {
    let config = ClientLinkConfig {
        video_bind: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
        control_target: free_port(),
        sender: ControlSenderConfig::default(),
    };
    let client = assert_ok!(
        LinkSession::start_client(config, SessionState::default(), Box::new(NullSink), codec()).await
    );
    tokio::time::sleep(Duration::from_millis(200)).await;

    let stats = client.sender_stats().unwrap();
    assert!(stats.sent() + stats.failed() > 0);
    assert!(!client.is_finished());
    client.shutdown().await;
}

// ── Video ────────────────────────────────────────────────────────

#[tokio::test]
async fn black_frame_reaches_display() {
    let payload = codec().encode(&RawFrame::black(64, 48, PixelFormat::Rgb8)).unwrap();
    assert!(payload.len() < MAX_VIDEO_PAYLOAD);

    let (sink, mut frames) = WatchSink::new();
    let pair = start_pair(100, AxisSample::centered(), Box::new(sink)).await;

    tokio::time::timeout(Duration::from_secs(2), frames.changed())
        .await
        .expect("no frame displayed")
        .unwrap();
    let frame = frames.borrow().clone().unwrap();
    assert_eq!((frame.width, frame.height), (64, 48));
    assert!(frame.data.chunks(3).all(|px| px == [0, 0, 0]));

    let stats = pair.client.frame_stats().unwrap().borrow().clone();
    assert!(stats.total_frames >= 1);
    assert_eq!(stats.decode_failures, 0);

    pair.client.shutdown().await;
    pair.server.shutdown().await;
}

// ── Shutdown ─────────────────────────────────────────────────────

#[tokio::test]
async fn all_loops_stop_promptly_and_device_goes_quiet() {
    let pair = start_pair(100, AxisSample::centered(), Box::new(NullSink)).await;

    // Let traffic flow both ways first.
    let deadline = Instant::now() + Duration::from_secs(2);
    while pair.device.is_empty() {
        assert!(Instant::now() < deadline, "no control traffic");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    pair.client.cancel_token().cancel();
    pair.server.cancel_token().cancel();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(pair.client.is_finished(), "client loops still running");
    assert!(pair.server.is_finished(), "server loops still running");

    let writes = pair.device.len();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(pair.device.len(), writes, "device written after shutdown");

    pair.client.shutdown().await;
    pair.server.shutdown().await;
}
