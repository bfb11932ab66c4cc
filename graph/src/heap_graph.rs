use heapscope_core::model::SnapshotPayload;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{MetaNode, NodeType};
use crate::GraphError;

pub const NODE_TYPE_OFFSET: usize = 0;
pub const NODE_NAME_OFFSET: usize = 1;
pub const NODE_ID_OFFSET: usize = 2;
pub const NODE_SELF_SIZE_OFFSET: usize = 3;
pub const NODE_EDGE_COUNT_OFFSET: usize = 4;
pub const NODE_TRACE_NODE_ID_OFFSET: usize = 5;

pub const EDGE_TYPE_OFFSET: usize = 0;
pub const EDGE_NAME_OFFSET: usize = 1;
pub const EDGE_TO_NODE_OFFSET: usize = 2;

/// Per-node metrics computed by a graph builder (dominators, BFS from root).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeMetrics {
    pub retained_sizes: Vec<u64>,
    pub distances: Vec<u32>,
}

/// Auxiliary indexes a builder needs while computing metrics but which the
/// analysis never reads.
#[derive(Debug, Clone, Default)]
pub struct BuilderState {
    pub dominators_tree: Vec<u32>,
    pub first_retainer_index: Vec<u32>,
    pub retaining_nodes: Vec<u32>,
    pub retaining_edges: Vec<u32>,
    pub node_flags: Vec<u32>,
}

impl BuilderState {
    pub fn heap_bytes(&self) -> usize {
        (self.dominators_tree.capacity()
            + self.first_retainer_index.capacity()
            + self.retaining_nodes.capacity()
            + self.retaining_edges.capacity()
            + self.node_flags.capacity())
            * std::mem::size_of::<u32>()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total: u64,
    pub code: u64,
    pub strings: u64,
    pub js_arrays: u64,
    pub native: u64,
    pub system: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregate {
    pub count: u64,
    pub self_size: u64,
    pub max_retained: u64,
}

/// Fully built snapshot graph as returned by a [`crate::GraphBuilder`].
#[derive(Debug, Clone)]
pub struct HeapGraph {
    pub statistics: Statistics,
    pub aggregates: BTreeMap<String, Aggregate>,
    pub meta: MetaNode,
    pub nodes: Vec<u64>,
    pub edges: Vec<u64>,
    pub strings: Vec<String>,
    pub node_field_count: usize,
    pub edge_fields_count: usize,
    pub first_edge_indexes: Vec<usize>,
    pub retained_sizes: Vec<u64>,
    pub node_distances: Vec<u32>,
    pub builder_state: BuilderState,
    /// Raw document, if the builder chose to keep it around.
    pub source: Option<SnapshotPayload>,
}

impl HeapGraph {
    /// Assembles a graph from a payload and builder-computed metrics,
    /// deriving the edge index, statistics and class aggregates.
    pub fn from_payload(payload: SnapshotPayload, metrics: NodeMetrics) -> Result<Self, GraphError> {
        let meta = match payload.snapshot.meta.as_ref() {
            Some(raw) => MetaNode::from_snapshot_meta(raw)?,
            None => MetaNode::default(),
        };
        let node_field_count = meta.node_field_count();
        let edge_fields_count = meta.edge_fields_count();

        let SnapshotPayload {
            nodes,
            edges,
            strings,
            ..
        } = payload;

        if nodes.len() % node_field_count != 0 {
            return Err(GraphError::InvalidGraph(format!(
                "nodes length {} is not a multiple of {}",
                nodes.len(),
                node_field_count
            )));
        }
        let node_count = nodes.len() / node_field_count;
        let NodeMetrics {
            retained_sizes,
            distances,
        } = metrics;
        if retained_sizes.len() != node_count || distances.len() != node_count {
            return Err(GraphError::InvalidGraph(format!(
                "metrics cover {} retained sizes and {} distances for {} nodes",
                retained_sizes.len(),
                distances.len(),
                node_count
            )));
        }

        let first_edge_indexes =
            first_edge_indexes(&nodes, node_field_count, edge_fields_count, edges.len())?;
        let statistics = Statistics::compute(&nodes, node_field_count, &strings);
        let aggregates =
            compute_aggregates(&nodes, node_field_count, &strings, &meta, &retained_sizes);

        Ok(Self {
            statistics,
            aggregates,
            meta,
            nodes,
            edges,
            strings,
            node_field_count,
            edge_fields_count,
            first_edge_indexes,
            retained_sizes,
            node_distances: distances,
            builder_state: BuilderState::default(),
            source: None,
        })
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len() / self.node_field_count
    }
}

fn first_edge_indexes(
    nodes: &[u64],
    node_field_count: usize,
    edge_fields_count: usize,
    edges_len: usize,
) -> Result<Vec<usize>, GraphError> {
    let mut indexes = Vec::with_capacity(nodes.len() / node_field_count + 1);
    let mut offset = 0usize;
    for record in nodes.chunks_exact(node_field_count) {
        indexes.push(offset);
        offset = usize::try_from(record[NODE_EDGE_COUNT_OFFSET])
            .ok()
            .and_then(|count| count.checked_mul(edge_fields_count))
            .and_then(|span| offset.checked_add(span))
            .ok_or_else(|| GraphError::InvalidGraph("edge count overflow".to_string()))?;
    }
    indexes.push(offset);

    if offset != edges_len {
        return Err(GraphError::InvalidGraph(format!(
            "node edge counts cover {} edge slots, edges array has {}",
            offset, edges_len
        )));
    }
    Ok(indexes)
}

impl Statistics {
    pub fn compute(nodes: &[u64], node_field_count: usize, strings: &[String]) -> Self {
        let mut stats = Statistics::default();
        for record in nodes.chunks_exact(node_field_count) {
            let self_size = record[NODE_SELF_SIZE_OFFSET];
            stats.total += self_size;
            match NodeType::from_id(record[NODE_TYPE_OFFSET]) {
                Some(NodeType::Code) => stats.code += self_size,
                Some(NodeType::Native) => stats.native += self_size,
                Some(t) if t.is_string() => stats.strings += self_size,
                Some(NodeType::Object)
                    if string_at(strings, record[NODE_NAME_OFFSET]) == Some("Array") =>
                {
                    stats.js_arrays += self_size
                }
                _ => {}
            }
        }
        stats.system = stats
            .total
            .saturating_sub(stats.code + stats.native + stats.strings + stats.js_arrays);
        stats
    }
}

/// Groups nodes by class name: the constructor name for objects and native
/// nodes, `(<type>)` for everything else.
fn compute_aggregates(
    nodes: &[u64],
    node_field_count: usize,
    strings: &[String],
    meta: &MetaNode,
    retained_sizes: &[u64],
) -> BTreeMap<String, Aggregate> {
    let mut aggregates: BTreeMap<String, Aggregate> = BTreeMap::new();
    for (index, record) in nodes.chunks_exact(node_field_count).enumerate() {
        let type_id = record[NODE_TYPE_OFFSET];
        let class_name = match NodeType::from_id(type_id) {
            Some(NodeType::Object) | Some(NodeType::Native) => string_at(strings, record[NODE_NAME_OFFSET])
                .unwrap_or("(unknown)")
                .to_string(),
            _ => format!("({})", meta.node_type_name(type_id).unwrap_or("unknown")),
        };

        let entry = aggregates.entry(class_name).or_default();
        entry.count += 1;
        entry.self_size += record[NODE_SELF_SIZE_OFFSET];
        entry.max_retained = entry.max_retained.max(retained_sizes[index]);
    }
    aggregates
}

fn string_at(strings: &[String], id: u64) -> Option<&str> {
    strings
        .get(usize::try_from(id).ok()?)
        .map(String::as_str)
}
