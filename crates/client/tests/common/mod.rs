#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use aidj_client::transport::{Connection, Connector, Frame, TransportError};
use aidj_client::{ChannelConfig, JobHandlers};
use async_trait::async_trait;
use futures::channel::mpsc as frames;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Server side of one accepted in-memory connection.
pub struct FakeSocket {
    pub url: String,
    to_client: frames::UnboundedSender<Result<Frame, TransportError>>,
    from_client: frames::UnboundedReceiver<String>,
}

impl FakeSocket {
    /// Queue a text frame. Ignored once the client dropped the stream.
    pub fn send_text(&self, text: &str) {
        let _ = self.to_client.unbounded_send(Ok(Frame::Text(text.to_string())));
    }

    pub fn send_close(&self) {
        let _ = self.to_client.unbounded_send(Ok(Frame::Close));
    }

    /// End the inbound stream as if the TCP connection dropped.
    pub fn drop_connection(&self) {
        self.to_client.close_channel();
    }

    /// Next frame the client wrote, or `None` once the client closed.
    pub async fn recv(&mut self) -> Option<String> {
        self.from_client.next().await
    }
}

/// In-memory [`Connector`] that records every attempt.
pub struct FakeConnector {
    refusals: AtomicUsize,
    attempts: Mutex<Vec<(String, Instant)>>,
    accepted: mpsc::UnboundedSender<FakeSocket>,
}

impl FakeConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<FakeSocket>) {
        let (accepted, sockets) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            refusals: AtomicUsize::new(0),
            attempts: Mutex::new(Vec::new()),
            accepted,
        });
        (connector, sockets)
    }

    /// Refuse the next `n` connection attempts.
    pub fn refuse_next(&self, n: usize) {
        self.refusals.store(n, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> Vec<(String, Instant)> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, url: &str) -> Result<Connection, TransportError> {
        self.attempts
            .lock()
            .unwrap()
            .push((url.to_string(), Instant::now()));

        let refused = self
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TransportError::Connection("connection refused".into()));
        }

        let (to_client, inbound) = frames::unbounded();
        let (outbound, from_client) = frames::unbounded::<String>();

        self.accepted
            .send(FakeSocket {
                url: url.to_string(),
                to_client,
                from_client,
            })
            .map_err(|_| TransportError::Connection("test dropped socket receiver".into()))?;

        let sink = outbound.sink_map_err(|e| TransportError::Protocol(e.to_string()));
        Ok(Connection {
            sink: Box::pin(sink),
            stream: Box::pin(inbound),
        })
    }
}

/// Handler invocations, in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Message(String),
    Stage(i64, String, String),
    Log(String, String),
    Progress(f64),
    Complete(String),
    Error(String),
}

/// Handlers that forward every call into a channel.
pub fn recording_handlers() -> (JobHandlers, mpsc::UnboundedReceiver<Call>) {
    let (tx, rx) = mpsc::unbounded_channel();

    let handlers = JobHandlers::new()
        .on_message({
            let tx = tx.clone();
            move |msg: &aidj_client::JobMessage| {
                let _ = tx.send(Call::Message(msg.kind().to_string()));
            }
        })
        .on_stage_update({
            let tx = tx.clone();
            move |stage: i64, name: &str, status: &str| {
                let _ = tx.send(Call::Stage(stage, name.into(), status.into()));
            }
        })
        .on_log({
            let tx = tx.clone();
            move |message: &str, level: &str| {
                let _ = tx.send(Call::Log(message.into(), level.into()));
            }
        })
        .on_progress({
            let tx = tx.clone();
            move |percent: f64| {
                let _ = tx.send(Call::Progress(percent));
            }
        })
        .on_complete({
            let tx = tx.clone();
            move |url: &str| {
                let _ = tx.send(Call::Complete(url.into()));
            }
        })
        .on_error(move |message: &str| {
            let _ = tx.send(Call::Error(message.into()));
        });

    (handlers, rx)
}

pub fn test_config() -> ChannelConfig {
    ChannelConfig {
        base_url: "ws://mock".into(),
        ..ChannelConfig::default()
    }
}
