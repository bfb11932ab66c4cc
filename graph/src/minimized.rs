use serde::Serialize;
use std::collections::BTreeMap;

use crate::heap_graph::{
    Aggregate, Statistics, EDGE_NAME_OFFSET, EDGE_TO_NODE_OFFSET, EDGE_TYPE_OFFSET,
    NODE_EDGE_COUNT_OFFSET, NODE_ID_OFFSET, NODE_NAME_OFFSET, NODE_SELF_SIZE_OFFSET,
    NODE_TRACE_NODE_ID_OFFSET, NODE_TYPE_OFFSET,
};
use crate::types::{EdgeType, MetaNode};
use crate::GraphError;

/// Analysis-ready graph: only the arrays needed for leak-point selection and
/// node serialization. Built by [`crate::GraphReducer`], immutable afterwards.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MinimizedGraph {
    pub(crate) statistics: Statistics,
    pub(crate) aggregates: BTreeMap<String, Aggregate>,
    pub(crate) meta: MetaNode,
    pub(crate) nodes: Vec<u64>,
    pub(crate) edges: Vec<u64>,
    pub(crate) strings: Vec<String>,
    pub(crate) node_field_count: usize,
    pub(crate) edge_fields_count: usize,
    pub(crate) first_edge_indexes: Vec<usize>,
    pub(crate) retained_sizes: Vec<u64>,
    pub(crate) node_distances: Vec<u32>,
}

#[derive(Debug, Clone, Copy)]
pub struct NodeRecord<'a> {
    index: usize,
    fields: &'a [u64],
}

impl<'a> NodeRecord<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn type_id(&self) -> u64 {
        self.fields[NODE_TYPE_OFFSET]
    }

    pub fn name_id(&self) -> u64 {
        self.fields[NODE_NAME_OFFSET]
    }

    pub fn id(&self) -> u64 {
        self.fields[NODE_ID_OFFSET]
    }

    pub fn self_size(&self) -> u64 {
        self.fields[NODE_SELF_SIZE_OFFSET]
    }

    pub fn edge_count(&self) -> u64 {
        self.fields[NODE_EDGE_COUNT_OFFSET]
    }

    pub fn trace_node_id(&self) -> u64 {
        self.fields[NODE_TRACE_NODE_ID_OFFSET]
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EdgeRecord<'a> {
    fields: &'a [u64],
    node_field_count: usize,
}

impl<'a> EdgeRecord<'a> {
    pub fn type_id(&self) -> u64 {
        self.fields[EDGE_TYPE_OFFSET]
    }

    pub fn edge_type(&self) -> Option<EdgeType> {
        EdgeType::from_id(self.type_id())
    }

    /// String id for named edges, literal index for element/hidden edges.
    pub fn name_or_index(&self) -> u64 {
        self.fields[EDGE_NAME_OFFSET]
    }

    pub fn to_node_offset(&self) -> u64 {
        self.fields[EDGE_TO_NODE_OFFSET]
    }

    /// Offsets that do not fit in `usize` map to `usize::MAX`, which every
    /// bounds-checked accessor rejects.
    pub fn target_index(&self) -> usize {
        usize::try_from(self.to_node_offset())
            .map_or(usize::MAX, |offset| offset / self.node_field_count)
    }
}

pub struct EdgeRecords<'a> {
    chunks: std::slice::ChunksExact<'a, u64>,
    node_field_count: usize,
}

impl<'a> Iterator for EdgeRecords<'a> {
    type Item = EdgeRecord<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.chunks.next().map(|fields| EdgeRecord {
            fields,
            node_field_count: self.node_field_count,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl ExactSizeIterator for EdgeRecords<'_> {}

impl MinimizedGraph {
    pub fn node_count(&self) -> usize {
        self.nodes.len() / self.node_field_count
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len() / self.edge_fields_count
    }

    pub fn node_field_count(&self) -> usize {
        self.node_field_count
    }

    pub fn edge_fields_count(&self) -> usize {
        self.edge_fields_count
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    pub fn aggregates(&self) -> &BTreeMap<String, Aggregate> {
        &self.aggregates
    }

    pub fn meta(&self) -> &MetaNode {
        &self.meta
    }

    pub fn retained_sizes(&self) -> &[u64] {
        &self.retained_sizes
    }

    pub fn node_distances(&self) -> &[u32] {
        &self.node_distances
    }

    fn check_index(&self, index: usize) -> Result<(), GraphError> {
        let node_count = self.node_count();
        if index >= node_count {
            return Err(GraphError::IndexOutOfBounds { index, node_count });
        }
        Ok(())
    }

    pub fn node(&self, index: usize) -> Result<NodeRecord<'_>, GraphError> {
        self.check_index(index)?;
        let start = index * self.node_field_count;
        Ok(NodeRecord {
            index,
            fields: &self.nodes[start..start + self.node_field_count],
        })
    }

    pub fn retained_size(&self, index: usize) -> Result<u64, GraphError> {
        self.check_index(index)?;
        Ok(self.retained_sizes[index])
    }

    pub fn distance(&self, index: usize) -> Result<u32, GraphError> {
        self.check_index(index)?;
        Ok(self.node_distances[index])
    }

    /// Outgoing edge records of `index`, in snapshot order.
    pub fn edges_of(&self, index: usize) -> Result<EdgeRecords<'_>, GraphError> {
        self.check_index(index)?;
        let start = self.first_edge_indexes[index];
        let end = self.first_edge_indexes[index + 1];
        let slots = self.edges.get(start..end).ok_or_else(|| {
            GraphError::InvalidGraph(format!("edge range {start}..{end} of node {index}"))
        })?;
        Ok(EdgeRecords {
            chunks: slots.chunks_exact(self.edge_fields_count),
            node_field_count: self.node_field_count,
        })
    }

    pub fn string(&self, id: u64) -> Result<&str, GraphError> {
        usize::try_from(id)
            .ok()
            .and_then(|id| self.strings.get(id))
            .map(String::as_str)
            .ok_or_else(|| GraphError::InvalidGraph(format!("string id {id} out of range")))
    }

    pub fn node_type_name(&self, type_id: u64) -> Result<&str, GraphError> {
        self.meta
            .node_type_name(type_id)
            .ok_or_else(|| GraphError::InvalidGraph(format!("unknown node type {type_id}")))
    }

    pub fn edge_type_name(&self, type_id: u64) -> Result<&str, GraphError> {
        self.meta
            .edge_type_name(type_id)
            .ok_or_else(|| GraphError::InvalidGraph(format!("unknown edge type {type_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_index_divides_by_record_width() {
        let edge = EdgeRecord {
            fields: &[2, 0, 12],
            node_field_count: 6,
        };
        assert_eq!(edge.target_index(), 2);
    }

    #[test]
    fn test_oversized_target_offset_stays_out_of_bounds() {
        let edge = EdgeRecord {
            fields: &[2, 0, u64::MAX],
            node_field_count: 6,
        };
        assert!(edge.target_index() >= usize::MAX / 6);
    }
}
