use async_trait::async_trait;
use heapscope_core::progress::{ProgressCallback, ProgressError};
use tokio::sync::{mpsc, oneshot};

/// One notification in flight. The receiver acknowledges by sending on `ack`
/// (or rejects by sending an error message).
#[derive(Debug)]
pub struct ProgressEvent {
    pub message: serde_json::Value,
    pub socket: Option<String>,
    pub ack: oneshot::Sender<Result<(), String>>,
}

/// Progress callback backed by a Tokio channel. `deliver` resolves only once
/// the consumer has acknowledged the event.
#[derive(Clone)]
pub struct ChannelProgressCallback {
    sender: mpsc::Sender<ProgressEvent>,
}

impl ChannelProgressCallback {
    pub fn new(sender: mpsc::Sender<ProgressEvent>) -> Self {
        Self { sender }
    }

    async fn send(&self, event: ProgressEvent) -> anyhow::Result<()> {
        self.sender
            .send(event)
            .await
            .map_err(|e| anyhow::anyhow!("progress send error: {}", e))
    }
}

pub fn progress_channel(capacity: usize) -> (ChannelProgressCallback, mpsc::Receiver<ProgressEvent>) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (ChannelProgressCallback::new(sender), receiver)
}

#[async_trait]
impl ProgressCallback for ChannelProgressCallback {
    async fn deliver(
        &self,
        message: serde_json::Value,
        socket: Option<String>,
    ) -> Result<(), ProgressError> {
        let (ack, acked) = oneshot::channel();
        self.send(ProgressEvent {
            message,
            socket,
            ack,
        })
        .await
        .map_err(|e| {
            tracing::warn!("{}", e);
            ProgressError::ChannelClosed
        })?;

        match acked.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(reason)) => Err(ProgressError::Rejected(reason)),
            Err(_) => Err(ProgressError::ChannelClosed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_deliver_waits_for_ack() {
        let (callback, mut receiver) = progress_channel(1);

        let consumer = tokio::spawn(async move {
            let event = receiver.recv().await.unwrap();
            assert_eq!(event.message, json!({"step": 1}));
            event.ack.send(Ok(())).unwrap();
        });

        callback
            .deliver(json!({"step": 1}), Some("s".to_string()))
            .await
            .unwrap();
        consumer.await.unwrap();
    }

    #[tokio::test]
    async fn test_rejection_and_dropped_ack() {
        let (callback, mut receiver) = progress_channel(4);

        let consumer = tokio::spawn(async move {
            let first = receiver.recv().await.unwrap();
            first.ack.send(Err("client gone".to_string())).unwrap();
            let second = receiver.recv().await.unwrap();
            drop(second);
        });

        let err = callback.deliver(json!(1), None).await.unwrap_err();
        assert!(matches!(err, ProgressError::Rejected(reason) if reason == "client gone"));

        let err = callback.deliver(json!(2), None).await.unwrap_err();
        assert!(matches!(err, ProgressError::ChannelClosed));
        consumer.await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_receiver() {
        let (callback, receiver) = progress_channel(1);
        drop(receiver);
        let err = callback.deliver(json!(null), None).await.unwrap_err();
        assert!(matches!(err, ProgressError::ChannelClosed));
    }
}
