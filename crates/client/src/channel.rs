//! Reconnecting event channel for one render job.
//!
//! [`JobChannel`] owns a single tokio task that drives the connection
//! state machine:
//!
//! ```text
//! Connecting -> Open -> Closed -> Reconnecting -> Connecting -> ...
//!      \___________\________\___________\______-> Disposed (terminal)
//! ```
//!
//! Every state transition, handler call and timer lives on that task, so
//! the channel needs no locks. The public handle talks to it through a
//! command queue, a `watch` channel carrying the state, and a
//! [`CancellationToken`] used for disposal.

use std::sync::Arc;
use std::time::Duration;

use aidj_core::job_events::PING_FRAME;
use aidj_core::types::JobId;
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::{ChannelConfig, DEFAULT_PING_INTERVAL};
use crate::endpoint::{BaseUrlResolver, EndpointResolver};
use crate::handlers::JobHandlers;
use crate::messages::decode_frame;
use crate::reconnect::{next_delay, wait_before_retry};
use crate::transport::{Connection, Connector, Frame, TransportError, WebSocketConnector};

/// How long disposal waits for the close handshake to be written.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Lifecycle state of a [`JobChannel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// A connection attempt is in flight.
    Connecting,
    /// Connected; sends are accepted and pings are running.
    Open,
    /// The connection was lost or refused.
    Closed,
    /// Waiting out the reconnect delay.
    Reconnecting,
    /// Closed by the caller. Terminal.
    Disposed,
}

impl ConnectionState {
    pub fn is_open(self) -> bool {
        self == ConnectionState::Open
    }
}

/// Commands from the handle to the connection task.
enum Command {
    Send(String),
}

/// Why a connected session ended.
enum SessionEnd {
    Lost,
    Disposed,
}

/// Live, auto-recovering event stream for one job.
///
/// Construction spawns the connection task and returns immediately, so
/// it must be called from within a tokio runtime. Dropping the handle
/// disposes the channel.
pub struct JobChannel {
    job_id: JobId,
    commands: mpsc::UnboundedSender<Command>,
    state: Arc<watch::Sender<ConnectionState>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl JobChannel {
    /// Open a channel over a real WebSocket at `{base_url}/ws/{job_id}`.
    pub fn connect_websocket(
        job_id: impl Into<JobId>,
        handlers: JobHandlers,
        config: &ChannelConfig,
    ) -> Self {
        Self::open(job_id, handlers, config, Arc::new(WebSocketConnector))
    }

    /// Open a channel using `connector` for every connection attempt.
    pub fn open(
        job_id: impl Into<JobId>,
        handlers: JobHandlers,
        config: &ChannelConfig,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let resolver = Arc::new(BaseUrlResolver::new(config.base_url.clone()));
        Self::open_with_resolver(job_id, handlers, config, resolver, connector)
    }

    /// Open a channel with a custom endpoint resolver.
    ///
    /// The resolver is consulted on every attempt, so it may return a
    /// different URL after a reconnect.
    pub fn open_with_resolver(
        job_id: impl Into<JobId>,
        handlers: JobHandlers,
        config: &ChannelConfig,
        resolver: Arc<dyn EndpointResolver>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let job_id = job_id.into();
        let mut config = config.clone();
        if config.ping_interval.is_zero() {
            tracing::warn!(
                job_id = %job_id,
                fallback_secs = DEFAULT_PING_INTERVAL.as_secs(),
                "Zero ping interval, using default",
            );
            config.ping_interval = DEFAULT_PING_INTERVAL;
        }
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(ConnectionState::Connecting);
        let state = Arc::new(state_tx);
        let cancel = CancellationToken::new();

        let task = ChannelTask {
            job_id: job_id.clone(),
            handlers,
            config,
            resolver,
            connector,
            state: Arc::clone(&state),
            commands: commands_rx,
            cancel: cancel.clone(),
        };

        let span = tracing::info_span!("job_channel", job_id = %job_id);
        let handle = tokio::spawn(task.run().instrument(span));

        Self {
            job_id,
            commands: commands_tx,
            state,
            cancel,
            task: Some(handle),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Subscribe to state transitions.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Best-effort send. Discarded silently unless the channel is open.
    pub fn send(&self, data: impl Into<String>) {
        if self.cancel.is_cancelled() || !self.state().is_open() {
            tracing::trace!(job_id = %self.job_id, "Discarding send on non-open channel");
            return;
        }
        let _ = self.commands.send(Command::Send(data.into()));
    }

    /// Dispose the channel.
    ///
    /// Cancels the reconnect timer and the ping interval and closes the
    /// connection if one is open. No further frame is dispatched once
    /// the channel is disposed, though a handler call already in progress
    /// on another thread may still finish. Calling it again is a no-op.
    pub fn close(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        self.state.send_replace(ConnectionState::Disposed);
        tracing::info!(job_id = %self.job_id, "Job channel disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for the connection task to exit. Only returns after
    /// [`close`](Self::close).
    pub async fn closed(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(job_id = %self.job_id, error = %e, "Job channel task failed");
            }
        }
    }
}

impl Drop for JobChannel {
    fn drop(&mut self) {
        self.close();
    }
}

/// State owned by the connection task.
struct ChannelTask {
    job_id: JobId,
    handlers: JobHandlers,
    config: ChannelConfig,
    resolver: Arc<dyn EndpointResolver>,
    connector: Arc<dyn Connector>,
    state: Arc<watch::Sender<ConnectionState>>,
    commands: mpsc::UnboundedReceiver<Command>,
    cancel: CancellationToken,
}

impl ChannelTask {
    /// Connect, process, and reconnect until disposed.
    async fn run(mut self) {
        let mut delay = self.config.reconnect.initial_delay;
        let mut attempt = 0u32;

        while !self.cancel.is_cancelled() {
            attempt += 1;
            let url = self.resolver.resolve(&self.job_id);
            self.set_state(ConnectionState::Connecting);
            tracing::debug!(url = %url, attempt, "Connecting to job event stream");

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                result = self.open_connection(&url) => result,
            };

            match result {
                Ok(connection) => {
                    tracing::info!(attempt, "Job event stream connected");
                    attempt = 0;
                    delay = self.config.reconnect.initial_delay;
                    self.set_state(ConnectionState::Open);

                    if let SessionEnd::Disposed = self.run_session(connection).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Job event stream connection failed");
                }
            }

            self.set_state(ConnectionState::Closed);
            self.discard_pending_sends();

            if self.cancel.is_cancelled() {
                break;
            }

            self.set_state(ConnectionState::Reconnecting);
            tracing::info!(
                delay_ms = delay.as_millis() as u64,
                "Reconnecting to job event stream",
            );

            if !wait_before_retry(delay, &self.cancel).await {
                break;
            }
            delay = next_delay(delay, &self.config.reconnect);
        }

        self.set_state(ConnectionState::Disposed);
        tracing::debug!("Job channel task exited");
    }

    async fn open_connection(&self, url: &str) -> Result<Connection, TransportError> {
        match self.config.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, self.connector.connect(url))
                .await
                .map_err(|_| TransportError::Timeout(limit))?,
            None => self.connector.connect(url).await,
        }
    }

    /// Pump one open connection until it is lost or the channel is
    /// disposed.
    async fn run_session(&mut self, connection: Connection) -> SessionEnd {
        let Connection {
            mut sink,
            mut stream,
        } = connection;

        let period = self.config.ping_interval;
        let mut ping = tokio::time::interval_at(Instant::now() + period, period);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let end = loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break SessionEnd::Disposed,
                frame = stream.next() => match frame {
                    Some(Ok(Frame::Text(text))) => self.dispatch(&text),
                    Some(Ok(Frame::Binary(data))) => {
                        tracing::trace!(len = data.len(), "Ignoring binary frame");
                    }
                    Some(Ok(Frame::Close)) => {
                        tracing::info!("Job event stream closed by server");
                        break SessionEnd::Lost;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Job event stream error");
                        break SessionEnd::Lost;
                    }
                    None => {
                        tracing::info!("Job event stream ended");
                        break SessionEnd::Lost;
                    }
                },
                Some(command) = self.commands.recv() => match command {
                    Command::Send(data) => {
                        if let Err(e) = sink.send(data).await {
                            tracing::warn!(error = %e, "Failed to send on job event stream");
                            break SessionEnd::Lost;
                        }
                    }
                },
                _ = ping.tick() => {
                    if let Err(e) = sink.send(PING_FRAME.to_string()).await {
                        tracing::warn!(error = %e, "Failed to send keepalive ping");
                        break SessionEnd::Lost;
                    }
                    tracing::trace!("Sent keepalive ping");
                }
            }
        };

        if let SessionEnd::Disposed = end {
            match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::debug!(error = %e, "Error closing job event stream"),
                Err(_) => tracing::debug!("Timed out closing job event stream"),
            }
        }

        end
    }

    /// Decode one text frame and hand it to the handlers.
    fn dispatch(&self, text: &str) {
        if self.cancel.is_cancelled() {
            return;
        }

        match decode_frame(text) {
            Ok(message) => {
                tracing::trace!(kind = message.kind(), "Dispatching job event");
                self.handlers.dispatch(&message);
            }
            Err(e) => {
                tracing::warn!(error = %e, raw_message = %text, "Dropping undecodable job frame");
            }
        }
    }

    /// Sends queued while the connection was dropping are not replayed.
    fn discard_pending_sends(&mut self) {
        let mut dropped = 0usize;
        while let Ok(Command::Send(_)) = self.commands.try_recv() {
            dropped += 1;
        }
        if dropped > 0 {
            tracing::debug!(dropped, "Discarded sends queued on a lost connection");
        }
    }

    /// Move to `next` unless the channel is already disposed.
    fn set_state(&self, next: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == next || *current == ConnectionState::Disposed {
                return false;
            }
            tracing::debug!(from = ?*current, to = ?next, "Connection state changed");
            *current = next;
            true
        });
    }
}
