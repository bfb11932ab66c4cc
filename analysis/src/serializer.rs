use graph::{GraphError, MinimizedGraph};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedEdge {
    /// Index of the target node.
    pub index: usize,
    pub name_or_index: String,
    pub to_node_id: String,
    #[serde(rename = "type")]
    pub edge_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedNode {
    pub index: usize,
    #[serde(rename = "type")]
    pub node_type: String,
    pub name: String,
    pub id: String,
    pub trace_node_id: u64,
    pub retained_size: u64,
    pub distance: u32,
    pub children: Vec<SerializedEdge>,
}

fn heap_id(unique_id: u64) -> String {
    format!("@{}", unique_id)
}

/// Renders node `index` with its outgoing references.
///
/// The reference retaining the most is always first, the rest follow in
/// snapshot order. For non-root nodes a non-zero `limit` caps the number of
/// children, the biggest included.
pub fn serialize_node(
    graph: &MinimizedGraph,
    index: usize,
    limit: Option<usize>,
    root_index: usize,
) -> Result<SerializedNode, GraphError> {
    let node = graph.node(index)?;
    let edges = graph.edges_of(index)?;

    let mut all = Vec::with_capacity(edges.len());
    let mut biggest: Option<(usize, u64)> = None;
    for (position, edge) in edges.enumerate() {
        let name_or_index = match edge.edge_type() {
            Some(edge_type) if edge_type.has_index_name() => format!("[{}]", edge.name_or_index()),
            _ => graph.string(edge.name_or_index())?.to_string(),
        };
        let target = edge.target_index();
        let retained_size = graph.retained_size(target)?;

        if biggest.map_or(true, |(_, size)| retained_size > size) {
            biggest = Some((position, retained_size));
        }

        all.push(SerializedEdge {
            index: target,
            name_or_index,
            to_node_id: heap_id(graph.node(target)?.id()),
            edge_type: graph.edge_type_name(edge.type_id())?.to_string(),
        });
    }

    let cap = match limit {
        Some(n) if n > 0 && index != root_index => n,
        _ => usize::MAX,
    };
    let mut children = Vec::with_capacity(all.len().min(cap));
    if let Some((position, _)) = biggest {
        children.push(all.remove(position));
    }
    for edge in all {
        if children.len() >= cap {
            break;
        }
        children.push(edge);
    }

    Ok(SerializedNode {
        index,
        node_type: graph.node_type_name(node.type_id())?.to_string(),
        name: graph.string(node.name_id())?.to_string(),
        id: heap_id(node.id()),
        trace_node_id: node.trace_node_id(),
        retained_size: graph.retained_size(index)?,
        distance: graph.distance(index)?,
        children,
    })
}
