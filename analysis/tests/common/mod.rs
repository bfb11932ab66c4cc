#![allow(dead_code)]

use analysis::AnalysisOptions;
use async_trait::async_trait;
use graph::{GraphBuilder, HeapGraph, NodeMetrics, PrecomputedMetricsBuilder};
use heapscope_core::model::SnapshotPayload;
use heapscope_core::progress::{
    InMemoryProgressCallback, JsonProgressFormatter, ProgressCallback, ProgressReporter,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// root(0) -a-> 1 (retains 50), -b-> 2 (120), -[0]-> 3 (10)
/// 1 -c-> 4 (5), -d-> 5 (8)
pub const SCENARIO_JSON: &str = r#"{
    "snapshot": {"root_index": 0, "node_count": 6, "edge_count": 5},
    "nodes": [
        9, 0, 1, 0, 3, 0,
        3, 3, 3, 20, 2, 0,
        3, 3, 5, 120, 0, 0,
        3, 3, 7, 10, 0, 0,
        3, 6, 9, 5, 0, 0,
        3, 6, 11, 8, 0, 0
    ],
    "edges": [
        2, 1, 6,
        2, 2, 12,
        1, 0, 18,
        2, 4, 24,
        2, 5, 30
    ],
    "strings": ["(root)", "a", "b", "Obj", "c", "d", "Leaf"]
}"#;

pub fn scenario_payload() -> SnapshotPayload {
    serde_json::from_str(SCENARIO_JSON).unwrap()
}

pub fn scenario_metrics() -> NodeMetrics {
    NodeMetrics {
        retained_sizes: vec![213, 50, 120, 10, 5, 8],
        distances: vec![0, 1, 1, 1, 2, 2],
    }
}

pub fn scenario_builder() -> Arc<CountingBuilder> {
    Arc::new(CountingBuilder::new(scenario_metrics()))
}

pub fn recording_options() -> (Arc<InMemoryProgressCallback>, AnalysisOptions) {
    let callback = Arc::new(InMemoryProgressCallback::default());
    let options = AnalysisOptions::new(
        callback.clone() as Arc<dyn ProgressCallback>,
        Arc::new(JsonProgressFormatter::new("test-socket")),
    );
    (callback, options)
}

/// Precomputed builder that records how often it was invoked.
pub struct CountingBuilder {
    inner: PrecomputedMetricsBuilder,
    calls: AtomicUsize,
}

impl CountingBuilder {
    pub fn new(metrics: NodeMetrics) -> Self {
        Self {
            inner: PrecomputedMetricsBuilder::new(metrics),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GraphBuilder for CountingBuilder {
    async fn build(
        &self,
        payload: SnapshotPayload,
        progress: &ProgressReporter,
    ) -> anyhow::Result<HeapGraph> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.build(payload, progress).await
    }
}

pub struct FailingBuilder;

#[async_trait]
impl GraphBuilder for FailingBuilder {
    async fn build(
        &self,
        _payload: SnapshotPayload,
        _progress: &ProgressReporter,
    ) -> anyhow::Result<HeapGraph> {
        Err(anyhow::anyhow!("dominator tree computation failed"))
    }
}
