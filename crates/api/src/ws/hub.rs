use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use aidj_core::job_events::{JobEvent, MSG_TYPE_CONNECTED, MSG_TYPE_HEARTBEAT, TOTAL_STAGES};
use aidj_core::types::{JobId, Timestamp};
use axum::body::Bytes;
use axum::extract::ws::Message;
use serde_json::{json, Value};
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing frames to one WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Default time a `complete` event stays replayable.
pub const DEFAULT_COMPLETED_STATE_TTL: Duration = Duration::from_secs(60);

/// One WebSocket following a job.
pub struct Subscriber {
    pub sender: WsSender,
    pub connected_at: Timestamp,
}

#[derive(Default)]
struct HubInner {
    /// job_id -> conn_id -> subscriber
    jobs: HashMap<JobId, HashMap<String, Subscriber>>,
    /// Last broadcast message per job, replayed to new subscribers.
    states: HashMap<JobId, Value>,
}

/// Fans job events out to every connection following that job.
///
/// The most recent event per job is kept so a client that connects (or
/// reconnects) mid-render immediately sees where the job is. Wrap in
/// `Arc` and share across handlers.
pub struct JobHub {
    inner: Arc<RwLock<HubInner>>,
    completed_state_ttl: Duration,
}

impl JobHub {
    pub fn new(completed_state_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HubInner::default())),
            completed_state_ttl,
        }
    }

    /// Register a connection for `job_id`.
    ///
    /// The returned receiver yields a `connected` frame first, then the
    /// job's last state if one is stored, then live events.
    pub async fn subscribe(
        &self,
        job_id: &str,
        conn_id: String,
    ) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(text_frame(&json!({
            "type": MSG_TYPE_CONNECTED,
            "job_id": job_id,
        })));

        let mut inner = self.inner.write().await;
        if let Some(state) = inner.states.get(job_id) {
            let _ = tx.send(text_frame(state));
        }
        inner.jobs.entry(job_id.to_string()).or_default().insert(
            conn_id,
            Subscriber {
                sender: tx,
                connected_at: chrono::Utc::now(),
            },
        );
        rx
    }

    /// Remove a connection. The job entry goes away with its last subscriber.
    pub async fn unsubscribe(&self, job_id: &str, conn_id: &str) {
        let mut inner = self.inner.write().await;
        if let Some(subscribers) = inner.jobs.get_mut(job_id) {
            if let Some(subscriber) = subscribers.remove(conn_id) {
                let connected_for = chrono::Utc::now() - subscriber.connected_at;
                tracing::debug!(
                    job_id,
                    conn_id,
                    connected_secs = connected_for.num_seconds(),
                    "Subscriber removed",
                );
            }
            if subscribers.is_empty() {
                inner.jobs.remove(job_id);
            }
        }
    }

    /// Store `message` as the job's last state and send it to every
    /// subscriber. `connected` and `heartbeat` messages are not stored.
    ///
    /// Subscribers whose channel is closed are dropped. Returns the number
    /// of connections the message reached.
    pub async fn broadcast(&self, job_id: &str, message: Value) -> usize {
        let transient = matches!(
            message.get("type").and_then(Value::as_str),
            Some(MSG_TYPE_CONNECTED | MSG_TYPE_HEARTBEAT)
        );
        let frame = text_frame(&message);

        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        if !transient {
            inner.states.insert(job_id.to_string(), message);
        }

        let Some(subscribers) = inner.jobs.get_mut(job_id) else {
            return 0;
        };
        subscribers.retain(|conn_id, subscriber| {
            let alive = subscriber.sender.send(frame.clone()).is_ok();
            if !alive {
                tracing::debug!(job_id, conn_id = %conn_id, "Pruning dead subscriber");
            }
            alive
        });

        let delivered = subscribers.len();
        if delivered == 0 {
            inner.jobs.remove(job_id);
        }
        delivered
    }

    /// Broadcast a typed event.
    ///
    /// Stage updates get `total_stages` filled in. `complete` and `error`
    /// carry a `success` flag, and a `complete` state expires after the
    /// configured TTL.
    pub async fn publish(&self, job_id: &str, mut event: JobEvent) -> usize {
        if let JobEvent::StageUpdate { total_stages, .. } = &mut event {
            total_stages.get_or_insert(TOTAL_STAGES);
        }

        let mut message = match serde_json::to_value(&event) {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(job_id, error = %e, "Failed to serialize job event");
                return 0;
            }
        };

        let success = match &event {
            JobEvent::Complete { .. } => Some(true),
            JobEvent::Error { .. } => Some(false),
            _ => None,
        };
        if let (Some(success), Some(fields)) = (success, message.as_object_mut()) {
            fields.insert("success".into(), Value::Bool(success));
        }

        let delivered = self.broadcast(job_id, message.clone()).await;
        tracing::debug!(job_id, kind = event.kind(), delivered, "Published job event");

        if let JobEvent::Complete { .. } = event {
            self.expire_state_after_ttl(job_id, message);
        }
        delivered
    }

    pub async fn send_stage_update(
        &self,
        job_id: &str,
        stage: i64,
        name: &str,
        status: &str,
    ) -> usize {
        self.publish(
            job_id,
            JobEvent::StageUpdate {
                stage,
                name: name.into(),
                status: status.into(),
                total_stages: Some(TOTAL_STAGES),
            },
        )
        .await
    }

    /// `level` defaults to `"info"`.
    pub async fn send_log(&self, job_id: &str, message: &str, level: Option<&str>) -> usize {
        self.publish(
            job_id,
            JobEvent::Log {
                message: message.into(),
                level: level.unwrap_or("info").into(),
            },
        )
        .await
    }

    pub async fn send_progress(&self, job_id: &str, percent: f64, stage: Option<i64>) -> usize {
        self.publish(job_id, JobEvent::Progress { percent, stage }).await
    }

    pub async fn send_complete(&self, job_id: &str, mix_url: &str, duration: Option<f64>) -> usize {
        self.publish(
            job_id,
            JobEvent::Complete {
                mix_url: mix_url.into(),
                duration,
            },
        )
        .await
    }

    pub async fn send_error(&self, job_id: &str, message: &str) -> usize {
        self.publish(
            job_id,
            JobEvent::Error {
                message: message.into(),
            },
        )
        .await
    }

    pub async fn send_paused(&self, job_id: &str) -> usize {
        self.publish(
            job_id,
            JobEvent::Paused {
                message: Some("Mix generation paused".into()),
            },
        )
        .await
    }

    pub async fn send_resumed(&self, job_id: &str) -> usize {
        self.publish(
            job_id,
            JobEvent::Resumed {
                message: Some("Mix generation resumed".into()),
            },
        )
        .await
    }

    pub async fn send_cancelled(&self, job_id: &str) -> usize {
        self.publish(
            job_id,
            JobEvent::Cancelled {
                message: Some("Mix generation cancelled".into()),
            },
        )
        .await
    }

    /// Last stored message for a job.
    pub async fn last_state(&self, job_id: &str) -> Option<Value> {
        self.inner.read().await.states.get(job_id).cloned()
    }

    /// Close every connection following `job_id` and forget its state.
    pub async fn cleanup_job(&self, job_id: &str) {
        let mut inner = self.inner.write().await;
        inner.states.remove(job_id);
        if let Some(subscribers) = inner.jobs.remove(job_id) {
            for subscriber in subscribers.values() {
                let _ = subscriber.sender.send(Message::Close(None));
            }
            tracing::info!(job_id, count = subscribers.len(), "Cleaned up job");
        }
    }

    /// Total connections across all jobs.
    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.jobs.values().map(HashMap::len).sum()
    }

    pub async fn job_connection_count(&self, job_id: &str) -> usize {
        self.inner
            .read()
            .await
            .jobs
            .get(job_id)
            .map_or(0, HashMap::len)
    }

    /// Send a Close frame to every connection, then clear the registry.
    pub async fn shutdown_all(&self) {
        let mut inner = self.inner.write().await;
        let mut count = 0usize;
        for subscriber in inner.jobs.values().flat_map(HashMap::values) {
            let _ = subscriber.sender.send(Message::Close(None));
            count += 1;
        }
        inner.jobs.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Send a Ping frame to every connection.
    pub async fn ping_all(&self) {
        let inner = self.inner.read().await;
        for subscriber in inner.jobs.values().flat_map(HashMap::values) {
            let _ = subscriber.sender.send(Message::Ping(Bytes::new()));
        }
    }

    fn expire_state_after_ttl(&self, job_id: &str, message: Value) {
        let inner = Arc::clone(&self.inner);
        let ttl = self.completed_state_ttl;
        let job_id = job_id.to_string();

        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let mut inner = inner.write().await;
            // A newer event for the same job keeps its state.
            if inner.states.get(&job_id) == Some(&message) {
                inner.states.remove(&job_id);
                tracing::debug!(job_id = %job_id, "Expired completed job state");
            }
        });
    }
}

impl Default for JobHub {
    fn default() -> Self {
        Self::new(DEFAULT_COMPLETED_STATE_TTL)
    }
}

fn text_frame(message: &Value) -> Message {
    Message::Text(message.to_string().into())
}
