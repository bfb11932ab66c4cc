use graph::{GraphBuilder, GraphError, GraphReducer, MinimizedGraph};
use heapscope_core::config::HeapscopeConfig;
use heapscope_core::error::{ErrorCode, HeapscopeError};
use heapscope_core::progress::{
    ProgressCallback, ProgressError, ProgressFormatter, ProgressReporter, StatusDescriptor,
};
use ingestion::{IngestionError, SnapshotSource, StreamIngestor};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::selector::{LeakPoint, LeakPointSelector};
use crate::serializer::{serialize_node, SerializedNode};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("ingestion failed: {0}")]
    Ingestion(#[from] IngestionError),
    #[error("snapshot build failed: {0}")]
    SnapshotBuild(#[source] anyhow::Error),
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),
    #[error("progress notification failed: {0}")]
    Progress(#[from] ProgressError),
}

impl HeapscopeError for AnalysisError {
    fn error_code(&self) -> ErrorCode {
        match self {
            AnalysisError::InvalidConfiguration(_) => ErrorCode::InvalidConfiguration,
            AnalysisError::Ingestion(err) => err.error_code(),
            AnalysisError::SnapshotBuild(_) => ErrorCode::SnapshotBuildFailure,
            AnalysisError::Graph(err) => err.error_code(),
            AnalysisError::Progress(err) => err.error_code(),
        }
    }
}

#[derive(Clone, Default)]
pub struct AnalysisOptions {
    pub callback: Option<Arc<dyn ProgressCallback>>,
    pub params: Option<Arc<dyn ProgressFormatter>>,
    /// Leak-point count and per-node child bound; `None` or 0 means 5.
    pub limit: Option<usize>,
}

impl AnalysisOptions {
    pub fn new(callback: Arc<dyn ProgressCallback>, params: Arc<dyn ProgressFormatter>) -> Self {
        Self {
            callback: Some(callback),
            params: Some(params),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn from_config(
        config: &HeapscopeConfig,
        callback: Arc<dyn ProgressCallback>,
        params: Arc<dyn ProgressFormatter>,
    ) -> Self {
        Self::new(callback, params).with_limit(config.analysis.limit)
    }

    pub fn reporter(&self) -> Result<ProgressReporter, AnalysisError> {
        let callback = self.callback.clone().ok_or_else(|| {
            AnalysisError::InvalidConfiguration("progress callback is required".to_string())
        })?;
        let params = self.params.clone().ok_or_else(|| {
            AnalysisError::InvalidConfiguration("progress params formatter is required".to_string())
        })?;
        Ok(ProgressReporter::new(callback, params))
    }
}

impl std::fmt::Debug for AnalysisOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisOptions")
            .field("callback", &self.callback.is_some())
            .field("params", &self.params.is_some())
            .field("limit", &self.limit)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub leak_point: Vec<LeakPoint>,
    pub graph: MinimizedGraph,
    pub root_index: usize,
}

impl AnalysisResult {
    pub fn serialize(&self, index: usize, limit: Option<usize>) -> Result<SerializedNode, GraphError> {
        serialize_node(&self.graph, index, limit, self.root_index)
    }

    pub fn serialize_root(&self, limit: Option<usize>) -> Result<SerializedNode, GraphError> {
        self.serialize(self.root_index, limit)
    }

    pub fn serialize_leak_points(&self, limit: Option<usize>) -> Result<Vec<SerializedNode>, GraphError> {
        self.leak_point
            .iter()
            .map(|point| self.serialize(point.index, limit))
            .collect()
    }
}

pub struct HeapAnalyzer {
    builder: Arc<dyn GraphBuilder>,
    ingestor: StreamIngestor,
    options: AnalysisOptions,
}

impl HeapAnalyzer {
    pub fn new(builder: Arc<dyn GraphBuilder>, options: AnalysisOptions) -> Self {
        Self {
            builder,
            ingestor: StreamIngestor::default(),
            options,
        }
    }

    pub fn with_ingestor(mut self, ingestor: StreamIngestor) -> Self {
        self.ingestor = ingestor;
        self
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    /// Ingest, build, reduce, select. Each stage starts only after the
    /// previous one, including its progress acknowledgments, has resolved.
    pub async fn analyze(&self, source: SnapshotSource) -> Result<AnalysisResult, AnalysisError> {
        let reporter = self.options.reporter()?;
        info!(stream = source.is_stream(), "heap analysis started");

        let payload = self.ingestor.ingest(source, &reporter).await?;
        let root_index = payload.root_index();

        let built = self
            .builder
            .build(payload, &reporter)
            .await
            .map_err(|err| match err.downcast::<ProgressError>() {
                Ok(progress) => AnalysisError::Progress(progress),
                Err(err) => AnalysisError::SnapshotBuild(err),
            })?;
        info!(nodes = built.node_count(), root_index, "heap graph built");

        let graph = GraphReducer::reduce(built)?;
        graph.node(root_index)?;

        let selector = LeakPointSelector::new(self.options.limit);
        let leak_point = selector.select(&graph, root_index);
        info!(
            candidates = leak_point.len(),
            limit = selector.limit(),
            "leak points selected"
        );

        reporter
            .update_status(
                &StatusDescriptor::new(
                    "Heap analysis complete",
                    format!("{} leak point candidates", leak_point.len()),
                ),
                Some(true),
            )
            .await?;

        Ok(AnalysisResult {
            leak_point,
            graph,
            root_index,
        })
    }
}

/// One-shot form of [`HeapAnalyzer::analyze`].
pub async fn analyze(
    source: SnapshotSource,
    options: AnalysisOptions,
    builder: Arc<dyn GraphBuilder>,
) -> Result<AnalysisResult, AnalysisError> {
    HeapAnalyzer::new(builder, options).analyze(source).await
}
