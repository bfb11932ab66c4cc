pub mod builder;
pub mod heap_graph;
pub mod minimized;
pub mod reducer;
pub mod types;

pub use builder::{GraphBuilder, PrecomputedMetricsBuilder};
pub use heap_graph::{Aggregate, BuilderState, HeapGraph, NodeMetrics, Statistics};
pub use minimized::{EdgeRecord, EdgeRecords, MinimizedGraph, NodeRecord};
pub use reducer::GraphReducer;
pub use types::{EdgeType, MetaNode, NodeType};

use heapscope_core::error::{ErrorCode, HeapscopeError};
use thiserror::Error;

/// Distances at or above this value mark nodes unreachable from the root.
pub const UNREACHABLE_DISTANCE: u32 = 100_000_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("node index {index} out of bounds (node count {node_count})")]
    IndexOutOfBounds { index: usize, node_count: usize },
    #[error("invalid heap graph: {0}")]
    InvalidGraph(String),
}

impl HeapscopeError for GraphError {
    fn error_code(&self) -> ErrorCode {
        match self {
            GraphError::IndexOutOfBounds { .. } => ErrorCode::IndexOutOfBounds,
            GraphError::InvalidGraph(_) => ErrorCode::InvalidGraph,
        }
    }
}
