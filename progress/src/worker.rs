use crate::channel::ProgressEvent;
use heapscope_core::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveredProgress {
    pub message: serde_json::Value,
    pub socket: Option<String>,
}

/// Drains a progress channel, optionally forwarding each event to a
/// downstream callback, and acknowledges it.
pub struct ProgressWorker {
    receiver: mpsc::Receiver<ProgressEvent>,
    downstream: Option<Arc<dyn ProgressCallback>>,
}

impl ProgressWorker {
    pub fn new(receiver: mpsc::Receiver<ProgressEvent>) -> Self {
        Self {
            receiver,
            downstream: None,
        }
    }

    pub fn with_downstream(mut self, downstream: Arc<dyn ProgressCallback>) -> Self {
        self.downstream = Some(downstream);
        self
    }

    /// Runs until every sender is dropped, returning the acknowledged events
    /// in arrival order.
    pub async fn run(mut self) -> Vec<DeliveredProgress> {
        info!("Progress worker started");
        let mut delivered = Vec::new();
        while let Some(event) = self.receiver.recv().await {
            let ProgressEvent {
                message,
                socket,
                ack,
            } = event;

            let outcome = match &self.downstream {
                Some(downstream) => downstream
                    .deliver(message.clone(), socket.clone())
                    .await
                    .map_err(|e| e.to_string()),
                None => Ok(()),
            };

            match &outcome {
                Ok(()) => {
                    info!("Progress {} -> {:?}", message, socket);
                    delivered.push(DeliveredProgress { message, socket });
                }
                Err(e) => error!("Failed to forward progress: {}", e),
            }

            if ack.send(outcome).is_err() {
                error!("Progress sender dropped before acknowledgment");
            }
        }
        info!("Progress worker stopped");
        delivered
    }
}
