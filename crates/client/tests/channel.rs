//! Integration tests for the reconnecting job channel over an in-memory
//! transport. Timing tests run on tokio's paused clock.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use aidj_client::transport::{Connection, Connector, TransportError};
use aidj_client::{ChannelConfig, ConnectionState, JobChannel};
use async_trait::async_trait;
use common::{recording_handlers, test_config, Call, FakeConnector, FakeSocket};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

struct Harness {
    channel: JobChannel,
    socket: FakeSocket,
    calls: mpsc::UnboundedReceiver<Call>,
    connector: Arc<FakeConnector>,
    sockets: mpsc::UnboundedReceiver<FakeSocket>,
    state: watch::Receiver<ConnectionState>,
}

async fn open_connected(job_id: &str) -> Harness {
    let (connector, mut sockets) = FakeConnector::new();
    let (handlers, calls) = recording_handlers();
    let channel = JobChannel::open(job_id, handlers, &test_config(), connector.clone());
    let mut state = channel.state_changes();

    let socket = sockets.recv().await.unwrap();
    state.wait_for(|s| s.is_open()).await.unwrap();

    Harness {
        channel,
        socket,
        calls,
        connector,
        sockets,
        state,
    }
}

fn assert_close_to(actual: Duration, expected: Duration) {
    assert!(
        actual >= expected && actual < expected + Duration::from_millis(10),
        "expected ~{expected:?}, got {actual:?}"
    );
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stage_update_calls_generic_and_specific_handler_once() {
    let mut h = open_connected("job-1").await;
    assert_eq!(h.socket.url, "ws://mock/ws/job-1");

    h.socket
        .send_text(r#"{"type":"stage_update","stage":1,"name":"Analysis","status":"complete"}"#);
    h.socket.send_text(r#"{"type":"heartbeat"}"#);

    assert_eq!(h.calls.recv().await, Some(Call::Message("stage_update".into())));
    assert_eq!(
        h.calls.recv().await,
        Some(Call::Stage(1, "Analysis".into(), "complete".into()))
    );
    assert_eq!(h.calls.recv().await, Some(Call::Message("heartbeat".into())));
}

#[tokio::test]
async fn progress_passes_through_unclamped() {
    let mut h = open_connected("job-2").await;

    h.socket.send_text(r#"{"type":"progress","percent":42.5}"#);
    h.socket.send_text(r#"{"type":"progress","percent":150}"#);
    h.socket.send_text(r#"{"type":"progress","percent":-3}"#);

    let mut seen = Vec::new();
    for _ in 0..6 {
        if let Some(Call::Progress(p)) = h.calls.recv().await {
            seen.push(p);
        }
    }
    assert_eq!(seen, vec![42.5, 150.0, -3.0]);
}

#[tokio::test]
async fn unknown_type_reaches_only_generic_handler() {
    let mut h = open_connected("job-3").await;

    h.socket.send_text(r#"{"type":"foo","bar":1}"#);
    h.socket.send_text(r#"{"type":"error","message":"GPU lost"}"#);

    assert_eq!(h.calls.recv().await, Some(Call::Message("foo".into())));
    assert_eq!(h.calls.recv().await, Some(Call::Message("error".into())));
    assert_eq!(h.calls.recv().await, Some(Call::Error("GPU lost".into())));
}

#[tokio::test]
async fn undecodable_frames_are_dropped_and_stream_continues() {
    let mut h = open_connected("job-4").await;

    h.socket.send_text("not json");
    h.socket.send_text(r#"{"type":"#);
    h.socket.send_text("[1,2,3]");
    h.socket.send_text(r#"{"kind":"log"}"#);
    h.socket.send_text(r#"{"type":"progress","percent":"high"}"#);
    h.socket.send_text(r#"{"type":"log","message":"still here"}"#);

    assert_eq!(h.calls.recv().await, Some(Call::Message("log".into())));
    assert_eq!(
        h.calls.recv().await,
        Some(Call::Log("still here".into(), "info".into()))
    );
    assert_eq!(h.channel.state(), ConnectionState::Open);
    assert_eq!(h.connector.attempts().len(), 1);
}

#[tokio::test]
async fn terminal_events_leave_channel_open() {
    let mut h = open_connected("job-5").await;

    h.socket.send_text(r#"{"type":"complete","mix_url":"https://cdn/mix.mp3","duration":312.4}"#);

    assert_eq!(h.calls.recv().await, Some(Call::Message("complete".into())));
    assert_eq!(
        h.calls.recv().await,
        Some(Call::Complete("https://cdn/mix.mp3".into()))
    );
    assert_eq!(h.channel.state(), ConnectionState::Open);
}

// ---------------------------------------------------------------------------
// Reconnect and keepalive
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn reconnects_after_fixed_delay_and_resumes_pings() {
    let mut h = open_connected("job-6").await;

    let dropped_at = Instant::now();
    h.socket.drop_connection();
    h.state
        .wait_for(|s| *s == ConnectionState::Reconnecting)
        .await
        .unwrap();

    let mut second = h.sockets.recv().await.unwrap();
    h.state.wait_for(|s| s.is_open()).await.unwrap();
    let reopened_at = Instant::now();

    let attempts = h.connector.attempts();
    assert_eq!(attempts.len(), 2);
    assert_close_to(attempts[1].1 - dropped_at, Duration::from_millis(3000));

    assert_eq!(second.recv().await.as_deref(), Some("ping"));
    assert_close_to(reopened_at.elapsed(), Duration::from_secs(25));

    second.send_text(r#"{"type":"progress","percent":10}"#);
    assert_eq!(h.calls.recv().await, Some(Call::Message("progress".into())));
}

#[tokio::test(start_paused = true)]
async fn server_close_frame_triggers_reconnect() {
    let mut h = open_connected("job-7").await;

    h.socket.send_close();
    let _second = h.sockets.recv().await.unwrap();
    assert_eq!(h.connector.attempts().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn refused_connections_retry_forever_at_fixed_interval() {
    let (connector, mut sockets) = FakeConnector::new();
    connector.refuse_next(4);
    let (handlers, _calls) = recording_handlers();
    let channel = JobChannel::open("job-8", handlers, &test_config(), connector.clone());

    let _socket = sockets.recv().await.unwrap();
    let mut state = channel.state_changes();
    state.wait_for(|s| s.is_open()).await.unwrap();

    let attempts = connector.attempts();
    assert_eq!(attempts.len(), 5);
    for pair in attempts.windows(2) {
        assert_close_to(pair[1].1 - pair[0].1, Duration::from_millis(3000));
    }
}

#[tokio::test(start_paused = true)]
async fn pings_repeat_every_interval_while_open() {
    let mut h = open_connected("job-9").await;
    let opened_at = Instant::now();

    for n in 1..=3u32 {
        assert_eq!(h.socket.recv().await.as_deref(), Some("ping"));
        assert_close_to(opened_at.elapsed(), Duration::from_secs(25) * n);
    }
}

#[tokio::test(start_paused = true)]
async fn zero_ping_interval_falls_back_to_default_and_still_reconnects() {
    let (connector, mut sockets) = FakeConnector::new();
    let (handlers, _calls) = recording_handlers();
    let config = ChannelConfig {
        ping_interval: Duration::ZERO,
        ..test_config()
    };
    let channel = JobChannel::open("job-zero-ping", handlers, &config, connector.clone());
    let mut state = channel.state_changes();

    let mut socket = sockets.recv().await.unwrap();
    state.wait_for(|s| s.is_open()).await.unwrap();
    let opened_at = Instant::now();

    assert_eq!(socket.recv().await.as_deref(), Some("ping"));
    assert_close_to(opened_at.elapsed(), Duration::from_secs(25));

    socket.drop_connection();
    let _second = sockets.recv().await.unwrap();
    state.wait_for(|s| s.is_open()).await.unwrap();
    assert_eq!(connector.attempts().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn resolver_is_consulted_on_every_attempt() {
    let (connector, mut sockets) = FakeConnector::new();
    let (handlers, _calls) = recording_handlers();
    let counter = Arc::new(AtomicUsize::new(0));
    let resolver = {
        let counter = Arc::clone(&counter);
        move |job_id: &str| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            format!("ws://node-{n}/events/{job_id}")
        }
    };

    let _channel = JobChannel::open_with_resolver(
        "job-10",
        handlers,
        &test_config(),
        Arc::new(resolver),
        connector.clone(),
    );

    let first = sockets.recv().await.unwrap();
    assert_eq!(first.url, "ws://node-0/events/job-10");
    first.drop_connection();

    let second = sockets.recv().await.unwrap();
    assert_eq!(second.url, "ws://node-1/events/job-10");
}

struct HangingConnector {
    attempts: AtomicUsize,
}

#[async_trait]
impl Connector for HangingConnector {
    async fn connect(&self, _url: &str) -> Result<Connection, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn connect_timeout_moves_to_reconnecting() {
    let connector = Arc::new(HangingConnector {
        attempts: AtomicUsize::new(0),
    });
    let config = ChannelConfig {
        connect_timeout: Some(Duration::from_secs(5)),
        ..test_config()
    };
    let (handlers, _calls) = recording_handlers();
    let started = Instant::now();
    let channel = JobChannel::open("job-11", handlers, &config, connector.clone());

    let mut state = channel.state_changes();
    state
        .wait_for(|s| *s == ConnectionState::Reconnecting)
        .await
        .unwrap();
    assert_close_to(started.elapsed(), Duration::from_secs(5));
    assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// Disposal and sends
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn close_stops_reconnects_and_handlers() {
    let mut h = open_connected("job-12").await;

    h.socket.send_text(r#"{"type":"progress","percent":99}"#);
    h.channel.close();
    h.socket.send_close();
    assert_eq!(h.channel.state(), ConnectionState::Disposed);

    h.channel.send("late");
    h.channel.close();
    h.channel.closed().await;

    // Handlers are dropped with the task without seeing the buffered frame.
    assert_eq!(h.calls.recv().await, None);
    // The client closed its write half and never wrote "late".
    assert_eq!(h.socket.recv().await, None);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.connector.attempts().len(), 1);
    assert!(h.sockets.try_recv().is_err());
    assert_eq!(*h.state.borrow(), ConnectionState::Disposed);
}

#[tokio::test(start_paused = true)]
async fn close_during_reconnect_delay_cancels_retry() {
    let mut h = open_connected("job-13").await;

    h.socket.drop_connection();
    h.state
        .wait_for(|s| *s == ConnectionState::Reconnecting)
        .await
        .unwrap();

    h.channel.close();
    h.channel.closed().await;

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.connector.attempts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_disposes_the_channel() {
    let Harness {
        channel,
        mut socket,
        connector,
        ..
    } = open_connected("job-14").await;

    drop(channel);

    assert_eq!(socket.recv().await, None);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(connector.attempts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn send_is_discarded_unless_open() {
    let (connector, mut sockets) = FakeConnector::new();
    connector.refuse_next(1);
    let (handlers, _calls) = recording_handlers();
    let channel = JobChannel::open("job-15", handlers, &test_config(), connector.clone());
    let mut state = channel.state_changes();

    channel.send("while-connecting");
    state
        .wait_for(|s| *s == ConnectionState::Reconnecting)
        .await
        .unwrap();
    channel.send("while-reconnecting");

    let mut socket = sockets.recv().await.unwrap();
    state.wait_for(|s| s.is_open()).await.unwrap();

    channel.send("hello");
    assert_eq!(socket.recv().await.as_deref(), Some("hello"));
}
