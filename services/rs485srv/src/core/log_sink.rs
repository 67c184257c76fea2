//! Communication log sink
//!
//! Every device-level action is reported to a [`CommLogSink`]. Dispatch is
//! fire-and-forget: the entry is handed to a spawned task and the caller never
//! waits on, or fails because of, the sink.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{info, warn};

use super::types::DeviceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommAction {
    Initialize,
    InitializeError,
    ProcessMessage,
    ProcessMessageError,
    Heartbeat,
    HeartbeatError,
    HeartbeatTimeout,
    BuildResponse,
    BuildResponseError,
    DisconnectDevice,
    Register,
    RegisterError,
}

impl CommAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialize => "INITIALIZE",
            Self::InitializeError => "INITIALIZE_ERROR",
            Self::ProcessMessage => "PROCESS_MESSAGE",
            Self::ProcessMessageError => "PROCESS_MESSAGE_ERROR",
            Self::Heartbeat => "HEARTBEAT",
            Self::HeartbeatError => "HEARTBEAT_ERROR",
            Self::HeartbeatTimeout => "HEARTBEAT_TIMEOUT",
            Self::BuildResponse => "BUILD_RESPONSE",
            Self::BuildResponseError => "BUILD_RESPONSE_ERROR",
            Self::DisconnectDevice => "DISCONNECT_DEVICE",
            Self::Register => "REGISTER",
            Self::RegisterError => "REGISTER_ERROR",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::InitializeError
                | Self::ProcessMessageError
                | Self::HeartbeatError
                | Self::HeartbeatTimeout
                | Self::BuildResponseError
                | Self::RegisterError
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommLogEntry {
    pub device_id: DeviceId,
    pub action: CommAction,
    pub message: String,
    pub error_message: Option<String>,
    pub timestamp_ms: i64,
}

impl CommLogEntry {
    pub fn new(device_id: DeviceId, action: CommAction, message: impl Into<String>, timestamp_ms: i64) -> Self {
        Self {
            device_id,
            action,
            message: message.into(),
            error_message: None,
            timestamp_ms,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error_message = Some(error.into());
        self
    }
}

/// Destination for communication log entries
#[async_trait]
pub trait CommLogSink: Send + Sync {
    async fn record(&self, entry: CommLogEntry);
}

/// Hand `entry` to the sink without waiting for it
pub fn dispatch(sink: &Arc<dyn CommLogSink>, entry: CommLogEntry) {
    let sink = Arc::clone(sink);
    tokio::spawn(async move {
        sink.record(entry).await;
    });
}

/// Writes entries as tracing events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

#[async_trait]
impl CommLogSink for TracingLogSink {
    async fn record(&self, entry: CommLogEntry) {
        match &entry.error_message {
            Some(error) => warn!(
                device_id = entry.device_id,
                action = entry.action.as_str(),
                "{} ({})",
                entry.message,
                error
            ),
            None => info!(
                device_id = entry.device_id,
                action = entry.action.as_str(),
                "{}",
                entry.message
            ),
        }
    }
}

/// Keeps entries in memory; used by embedders that poll the log and by tests
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    entries: Mutex<Vec<CommLogEntry>>,
    notify: Notify,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<CommLogEntry> {
        self.entries.lock().clone()
    }

    pub fn actions_for(&self, device_id: DeviceId) -> Vec<CommAction> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.device_id == device_id)
            .map(|e| e.action)
            .collect()
    }

    /// Wait until at least `count` entries arrived or `timeout` passed
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<CommLogEntry> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            {
                let entries = self.entries.lock();
                if entries.len() >= count {
                    return entries.clone();
                }
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.entries();
            }
        }
    }
}

#[async_trait]
impl CommLogSink for MemoryLogSink {
    async fn record(&self, entry: CommLogEntry) {
        self.entries.lock().push(entry);
        self.notify.notify_waiters();
    }
}
