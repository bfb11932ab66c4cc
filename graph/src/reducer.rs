use tracing::debug;

use crate::heap_graph::{HeapGraph, NODE_EDGE_COUNT_OFFSET, NODE_SELF_SIZE_OFFSET};
use crate::minimized::MinimizedGraph;
use crate::types::{MIN_EDGE_FIELDS, MIN_NODE_FIELDS};
use crate::{GraphError, UNREACHABLE_DISTANCE};

/// Strips a built graph down to what the analysis reads.
pub struct GraphReducer;

impl GraphReducer {
    /// Consumes `graph`, moving the kept arrays into a [`MinimizedGraph`].
    /// Builder state and the raw payload are dropped before returning.
    pub fn reduce(graph: HeapGraph) -> Result<MinimizedGraph, GraphError> {
        let HeapGraph {
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
            node_distances,
            builder_state,
            source,
        } = graph;

        debug!(
            builder_state_bytes = builder_state.heap_bytes(),
            source_retained = source.is_some(),
            "releasing builder state"
        );
        drop(builder_state);
        drop(source);

        let reduced = MinimizedGraph {
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
            node_distances,
        };
        validate(&reduced)?;
        Ok(reduced)
    }
}

fn invalid(message: String) -> GraphError {
    GraphError::InvalidGraph(message)
}

fn validate(graph: &MinimizedGraph) -> Result<(), GraphError> {
    let nfc = graph.node_field_count;
    let efc = graph.edge_fields_count;
    if nfc < MIN_NODE_FIELDS || efc < MIN_EDGE_FIELDS {
        return Err(invalid(format!("record widths {nfc}/{efc} too narrow")));
    }
    if graph.nodes.len() % nfc != 0 {
        return Err(invalid(format!(
            "nodes length {} is not a multiple of {nfc}",
            graph.nodes.len()
        )));
    }
    if graph.edges.len() % efc != 0 {
        return Err(invalid(format!(
            "edges length {} is not a multiple of {efc}",
            graph.edges.len()
        )));
    }

    let node_count = graph.nodes.len() / nfc;
    if graph.retained_sizes.len() != node_count || graph.node_distances.len() != node_count {
        return Err(invalid(format!(
            "{} retained sizes and {} distances for {node_count} nodes",
            graph.retained_sizes.len(),
            graph.node_distances.len()
        )));
    }
    if graph.first_edge_indexes.len() != node_count + 1 {
        return Err(invalid(format!(
            "{} first edge indexes for {node_count} nodes",
            graph.first_edge_indexes.len()
        )));
    }
    if graph.first_edge_indexes.last() != Some(&graph.edges.len()) {
        return Err(invalid("first edge indexes do not end at edges length".to_string()));
    }

    for (index, record) in graph.nodes.chunks_exact(nfc).enumerate() {
        let start = graph.first_edge_indexes[index];
        let end = graph.first_edge_indexes[index + 1];
        if end < start || start % efc != 0 {
            return Err(invalid(format!("edge range {start}..{end} of node {index}")));
        }
        if ((end - start) / efc) as u64 != record[NODE_EDGE_COUNT_OFFSET] {
            return Err(invalid(format!(
                "node {index} declares {} edges, index spans {}",
                record[NODE_EDGE_COUNT_OFFSET],
                (end - start) / efc
            )));
        }
        if graph.node_distances[index] < UNREACHABLE_DISTANCE
            && graph.retained_sizes[index] < record[NODE_SELF_SIZE_OFFSET]
        {
            return Err(invalid(format!(
                "node {index} retains {} bytes, less than its self size {}",
                graph.retained_sizes[index], record[NODE_SELF_SIZE_OFFSET]
            )));
        }
    }

    let nodes_len = graph.nodes.len() as u64;
    for edge in graph.edges.chunks_exact(efc) {
        let to_node = edge[crate::heap_graph::EDGE_TO_NODE_OFFSET];
        if to_node % nfc as u64 != 0 || to_node >= nodes_len {
            return Err(invalid(format!("edge target offset {to_node} is not a node")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap_graph::{BuilderState, NodeMetrics};
    use crate::types::EdgeType;
    use heapscope_core::model::SnapshotPayload;

    fn sample_graph() -> HeapGraph {
        let payload = SnapshotPayload {
            nodes: vec![
                9, 0, 1, 0, 2, 0, //
                3, 1, 3, 32, 1, 7, //
                2, 2, 5, 16, 0, 0,
            ],
            edges: vec![1, 0, 6, 2, 3, 12, 2, 3, 12],
            strings: vec!["(root)".into(), "Foo".into(), "hello".into(), "s".into()],
            ..SnapshotPayload::default()
        };
        let metrics = NodeMetrics {
            retained_sizes: vec![48, 48, 16],
            distances: vec![0, 1, 1],
        };
        HeapGraph::from_payload(payload, metrics).unwrap()
    }

    #[test]
    fn test_reduce_keeps_analysis_arrays() {
        let mut graph = sample_graph();
        graph.builder_state = BuilderState {
            dominators_tree: vec![0, 0, 0],
            ..BuilderState::default()
        };
        graph.source = Some(SnapshotPayload::default());

        let reduced = GraphReducer::reduce(graph).unwrap();
        assert_eq!(reduced.node_count(), 3);
        assert_eq!(reduced.edge_count(), 3);
        assert_eq!(reduced.retained_sizes(), &[48, 48, 16]);
        assert_eq!(reduced.statistics().total, 48);
    }

    #[test]
    fn test_record_accessors() {
        let reduced = GraphReducer::reduce(sample_graph()).unwrap();

        let node = reduced.node(1).unwrap();
        assert_eq!(node.id(), 3);
        assert_eq!(node.self_size(), 32);
        assert_eq!(node.edge_count(), 1);
        assert_eq!(node.trace_node_id(), 7);
        assert_eq!(reduced.string(node.name_id()).unwrap(), "Foo");
        assert_eq!(reduced.node_type_name(node.type_id()).unwrap(), "object");

        let edges: Vec<_> = reduced.edges_of(0).unwrap().collect();
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].edge_type(), Some(EdgeType::Element));
        assert_eq!(edges[0].target_index(), 1);
        assert_eq!(edges[1].target_index(), 2);
        assert_eq!(reduced.edges_of(2).unwrap().count(), 0);
    }

    #[test]
    fn test_accessors_reject_out_of_range_index() {
        let reduced = GraphReducer::reduce(sample_graph()).unwrap();
        assert_eq!(
            reduced.node(3).unwrap_err(),
            GraphError::IndexOutOfBounds {
                index: 3,
                node_count: 3
            }
        );
        assert!(reduced.edges_of(10).is_err());
        assert!(reduced.retained_size(3).is_err());
        assert!(reduced.string(99).is_err());
    }

    #[test]
    fn test_dangling_edge_target_is_rejected() {
        let mut graph = sample_graph();
        graph.edges[2] = 7;
        assert!(matches!(
            GraphReducer::reduce(graph),
            Err(GraphError::InvalidGraph(_))
        ));

        let mut graph = sample_graph();
        graph.edges[2] = 18;
        assert!(GraphReducer::reduce(graph).is_err());
    }

    #[test]
    fn test_retained_below_self_size_is_rejected() {
        let mut graph = sample_graph();
        graph.retained_sizes[1] = 4;
        assert!(GraphReducer::reduce(graph).is_err());

        // unreachable nodes are not held to the invariant
        let mut graph = sample_graph();
        graph.retained_sizes[1] = 4;
        graph.node_distances[1] = UNREACHABLE_DISTANCE;
        assert!(GraphReducer::reduce(graph).is_ok());
    }
}
