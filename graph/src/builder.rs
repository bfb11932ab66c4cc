use async_trait::async_trait;
use heapscope_core::model::SnapshotPayload;
use heapscope_core::progress::{ProgressReporter, StatusDescriptor};
use std::sync::Mutex;

use crate::heap_graph::{HeapGraph, NodeMetrics};

/// Turns a raw snapshot into a [`HeapGraph`] with retained sizes and
/// distances filled in. Implementations may report progress through
/// `progress`; each update must be awaited before continuing.
#[async_trait]
pub trait GraphBuilder: Send + Sync {
    async fn build(
        &self,
        payload: SnapshotPayload,
        progress: &ProgressReporter,
    ) -> anyhow::Result<HeapGraph>;
}

/// Builder for snapshots whose metrics were computed elsewhere, e.g. by a
/// previous run over the same capture. Metrics are handed out once.
pub struct PrecomputedMetricsBuilder {
    metrics: Mutex<Option<NodeMetrics>>,
}

impl PrecomputedMetricsBuilder {
    pub fn new(metrics: NodeMetrics) -> Self {
        Self {
            metrics: Mutex::new(Some(metrics)),
        }
    }
}

#[async_trait]
impl GraphBuilder for PrecomputedMetricsBuilder {
    async fn build(
        &self,
        payload: SnapshotPayload,
        progress: &ProgressReporter,
    ) -> anyhow::Result<HeapGraph> {
        let metrics = self
            .metrics
            .lock()
            .map_err(|_| anyhow::anyhow!("metrics lock poisoned"))?
            .take()
            .ok_or_else(|| anyhow::anyhow!("precomputed metrics already consumed"))?;

        progress
            .update_status(&StatusDescriptor::new("Building edge indexes", ""), None)
            .await?;
        let graph = HeapGraph::from_payload(payload, metrics)?;
        progress
            .update_status(
                &StatusDescriptor::new("Calculating statistics", "graph ready"),
                None,
            )
            .await?;
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapscope_core::progress::{InMemoryProgressCallback, JsonProgressFormatter};
    use std::sync::Arc;

    fn single_node_payload() -> SnapshotPayload {
        SnapshotPayload {
            nodes: vec![9, 0, 1, 0, 0, 0],
            edges: vec![],
            strings: vec!["".to_string()],
            ..SnapshotPayload::default()
        }
    }

    #[tokio::test]
    async fn test_precomputed_builder_reports_and_builds() {
        let callback = Arc::new(InMemoryProgressCallback::default());
        let reporter = ProgressReporter::new(callback.clone(), Arc::new(JsonProgressFormatter::default()));
        let builder = PrecomputedMetricsBuilder::new(NodeMetrics {
            retained_sizes: vec![0],
            distances: vec![0],
        });

        let graph = builder.build(single_node_payload(), &reporter).await.unwrap();
        assert_eq!(graph.node_count(), 1);

        let delivered = callback.delivered().unwrap();
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0].message["prefix"], "Building edge indexes");

        let second = builder.build(single_node_payload(), &reporter).await;
        assert!(second.is_err());
    }
}
