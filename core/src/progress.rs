use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::error::{ErrorCode, HeapscopeError};

/// Human readable description of a pipeline checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDescriptor {
    pub prefix: String,
    pub suffix: String,
}

impl StatusDescriptor {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }
}

/// A formatted notification, ready for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressParams {
    pub message: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket: Option<String>,
}

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("progress callback rejected notification: {0}")]
    Rejected(String),
    #[error("progress channel closed before acknowledgment")]
    ChannelClosed,
    #[error("progress sink lock poisoned")]
    LockPoisoned,
}

impl HeapscopeError for ProgressError {
    fn error_code(&self) -> ErrorCode {
        ErrorCode::ProgressRejected
    }
}

/// Delivery sink for progress notifications. The returned future resolving
/// is the acknowledgment.
#[async_trait]
pub trait ProgressCallback: Send + Sync {
    async fn deliver(
        &self,
        message: serde_json::Value,
        socket: Option<String>,
    ) -> Result<(), ProgressError>;
}

pub trait ProgressFormatter: Send + Sync {
    fn format(
        &self,
        status: &StatusDescriptor,
        timestamp_millis: u64,
        is_final: Option<bool>,
    ) -> ProgressParams;
}

/// Pairs a formatter with a callback so pipeline stages only deal with
/// status descriptors.
#[derive(Clone)]
pub struct ProgressReporter {
    callback: Arc<dyn ProgressCallback>,
    formatter: Arc<dyn ProgressFormatter>,
}

impl ProgressReporter {
    pub fn new(callback: Arc<dyn ProgressCallback>, formatter: Arc<dyn ProgressFormatter>) -> Self {
        Self {
            callback,
            formatter,
        }
    }

    /// Formats and delivers one notification, returning once it has been
    /// acknowledged.
    pub async fn update_status(
        &self,
        status: &StatusDescriptor,
        is_final: Option<bool>,
    ) -> Result<(), ProgressError> {
        let params = self.formatter.format(status, now_millis(), is_final);
        tracing::debug!(prefix = %status.prefix, suffix = %status.suffix, "progress update");
        self.callback.deliver(params.message, params.socket).await
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter").finish_non_exhaustive()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Renders `{prefix, suffix, timestamp, final}` objects addressed to a fixed
/// socket.
#[derive(Debug, Clone, Default)]
pub struct JsonProgressFormatter {
    socket: Option<String>,
}

impl JsonProgressFormatter {
    pub fn new(socket: impl Into<String>) -> Self {
        Self {
            socket: Some(socket.into()),
        }
    }
}

impl ProgressFormatter for JsonProgressFormatter {
    fn format(
        &self,
        status: &StatusDescriptor,
        timestamp_millis: u64,
        is_final: Option<bool>,
    ) -> ProgressParams {
        ProgressParams {
            message: serde_json::json!({
                "prefix": status.prefix,
                "suffix": status.suffix,
                "timestamp": timestamp_millis,
                "final": is_final.unwrap_or(false),
            }),
            socket: self.socket.clone(),
        }
    }
}

/// Acknowledges immediately and keeps every delivered message.
#[derive(Default)]
pub struct InMemoryProgressCallback {
    delivered: Mutex<Vec<ProgressParams>>,
}

impl InMemoryProgressCallback {
    pub fn delivered(&self) -> Result<Vec<ProgressParams>, ProgressError> {
        let delivered = self
            .delivered
            .lock()
            .map_err(|_| ProgressError::LockPoisoned)?;
        Ok(delivered.clone())
    }
}

#[async_trait]
impl ProgressCallback for InMemoryProgressCallback {
    async fn deliver(
        &self,
        message: serde_json::Value,
        socket: Option<String>,
    ) -> Result<(), ProgressError> {
        let mut delivered = self
            .delivered
            .lock()
            .map_err(|_| ProgressError::LockPoisoned)?;
        delivered.push(ProgressParams { message, socket });
        Ok(())
    }
}
