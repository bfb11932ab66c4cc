//! Node and edge type tables of the V8 heap snapshot format.
//!
//! Ids follow `HeapGraphNode::Type` and `HeapGraphEdge::Type` in
//! `v8/include/v8-profiler.h`, as serialized by V8 heap snapshots with
//! `snapshot.meta` layout version 3 (node fields
//! `type,name,id,self_size,edge_count,trace_node_id[,detachedness]`,
//! edge fields `type,name_or_index,to_node`).

use heapscope_core::model::SnapshotMeta;
use serde::{Deserialize, Serialize};

use crate::GraphError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Hidden = 0,
    Array = 1,
    String = 2,
    Object = 3,
    Code = 4,
    Closure = 5,
    RegExp = 6,
    HeapNumber = 7,
    Native = 8,
    Synthetic = 9,
    ConsString = 10,
    SlicedString = 11,
    Symbol = 12,
    BigInt = 13,
    ObjectShape = 14,
}

impl NodeType {
    pub const ALL: [NodeType; 15] = [
        NodeType::Hidden,
        NodeType::Array,
        NodeType::String,
        NodeType::Object,
        NodeType::Code,
        NodeType::Closure,
        NodeType::RegExp,
        NodeType::HeapNumber,
        NodeType::Native,
        NodeType::Synthetic,
        NodeType::ConsString,
        NodeType::SlicedString,
        NodeType::Symbol,
        NodeType::BigInt,
        NodeType::ObjectShape,
    ];

    pub fn from_id(id: u64) -> Option<Self> {
        Self::ALL.get(usize::try_from(id).ok()?).copied()
    }

    pub fn id(self) -> u64 {
        self as u64
    }

    /// Name used in `snapshot.meta.node_types[0]`.
    pub fn name(self) -> &'static str {
        match self {
            NodeType::Hidden => "hidden",
            NodeType::Array => "array",
            NodeType::String => "string",
            NodeType::Object => "object",
            NodeType::Code => "code",
            NodeType::Closure => "closure",
            NodeType::RegExp => "regexp",
            NodeType::HeapNumber => "number",
            NodeType::Native => "native",
            NodeType::Synthetic => "synthetic",
            NodeType::ConsString => "concatenated string",
            NodeType::SlicedString => "sliced string",
            NodeType::Symbol => "symbol",
            NodeType::BigInt => "bigint",
            NodeType::ObjectShape => "object shape",
        }
    }

    pub fn is_string(self) -> bool {
        matches!(
            self,
            NodeType::String | NodeType::ConsString | NodeType::SlicedString
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeType {
    /// A variable from a function context.
    ContextVariable = 0,
    /// An element of an array.
    Element = 1,
    /// A named object property.
    Property = 2,
    /// A link that can't be accessed from JS.
    Internal = 3,
    /// A link needed for size calculation but hidden from the user.
    Hidden = 4,
    /// A link that must not be followed during size calculation.
    Shortcut = 5,
    /// A weak reference, ignored by the GC.
    Weak = 6,
}

impl EdgeType {
    pub const ALL: [EdgeType; 7] = [
        EdgeType::ContextVariable,
        EdgeType::Element,
        EdgeType::Property,
        EdgeType::Internal,
        EdgeType::Hidden,
        EdgeType::Shortcut,
        EdgeType::Weak,
    ];

    pub fn from_id(id: u64) -> Option<Self> {
        Self::ALL.get(usize::try_from(id).ok()?).copied()
    }

    pub fn id(self) -> u64 {
        self as u64
    }

    pub fn name(self) -> &'static str {
        match self {
            EdgeType::ContextVariable => "context",
            EdgeType::Element => "element",
            EdgeType::Property => "property",
            EdgeType::Internal => "internal",
            EdgeType::Hidden => "hidden",
            EdgeType::Shortcut => "shortcut",
            EdgeType::Weak => "weak",
        }
    }

    /// Element and hidden edges carry a numeric index instead of a string id.
    pub fn has_index_name(self) -> bool {
        matches!(self, EdgeType::Element | EdgeType::Hidden)
    }
}

const DEFAULT_NODE_FIELDS: [&str; 6] = [
    "type",
    "name",
    "id",
    "self_size",
    "edge_count",
    "trace_node_id",
];
const DEFAULT_EDGE_FIELDS: [&str; 3] = ["type", "name_or_index", "to_node"];

pub const MIN_NODE_FIELDS: usize = DEFAULT_NODE_FIELDS.len();
pub const MIN_EDGE_FIELDS: usize = DEFAULT_EDGE_FIELDS.len();

/// Lookup tables from type ids to display names, plus the record layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaNode {
    pub node_fields: Vec<String>,
    pub node_types: Vec<String>,
    pub edge_fields: Vec<String>,
    pub edge_types: Vec<String>,
}

impl Default for MetaNode {
    fn default() -> Self {
        Self {
            node_fields: DEFAULT_NODE_FIELDS.iter().map(|s| s.to_string()).collect(),
            node_types: NodeType::ALL.iter().map(|t| t.name().to_string()).collect(),
            edge_fields: DEFAULT_EDGE_FIELDS.iter().map(|s| s.to_string()).collect(),
            edge_types: EdgeType::ALL.iter().map(|t| t.name().to_string()).collect(),
        }
    }
}

impl MetaNode {
    /// Reads the `snapshot.meta` block. Missing parts fall back to the
    /// built-in tables.
    pub fn from_snapshot_meta(meta: &SnapshotMeta) -> Result<Self, GraphError> {
        let defaults = Self::default();

        let node_fields = if meta.node_fields.is_empty() {
            defaults.node_fields
        } else {
            meta.node_fields.clone()
        };
        let edge_fields = if meta.edge_fields.is_empty() {
            defaults.edge_fields
        } else {
            meta.edge_fields.clone()
        };
        if node_fields.len() < MIN_NODE_FIELDS {
            return Err(GraphError::InvalidGraph(format!(
                "meta declares {} node fields, need at least {}",
                node_fields.len(),
                MIN_NODE_FIELDS
            )));
        }
        if edge_fields.len() < MIN_EDGE_FIELDS {
            return Err(GraphError::InvalidGraph(format!(
                "meta declares {} edge fields, need at least {}",
                edge_fields.len(),
                MIN_EDGE_FIELDS
            )));
        }

        Ok(Self {
            node_fields,
            node_types: type_table(&meta.node_types, "node")?.unwrap_or(defaults.node_types),
            edge_fields,
            edge_types: type_table(&meta.edge_types, "edge")?.unwrap_or(defaults.edge_types),
        })
    }

    pub fn node_field_count(&self) -> usize {
        self.node_fields.len()
    }

    pub fn edge_fields_count(&self) -> usize {
        self.edge_fields.len()
    }

    pub fn node_type_name(&self, type_id: u64) -> Option<&str> {
        self.node_types
            .get(usize::try_from(type_id).ok()?)
            .map(String::as_str)
    }

    pub fn edge_type_name(&self, type_id: u64) -> Option<&str> {
        self.edge_types
            .get(usize::try_from(type_id).ok()?)
            .map(String::as_str)
    }
}

fn type_table(
    types: &[serde_json::Value],
    kind: &str,
) -> Result<Option<Vec<String>>, GraphError> {
    let Some(first) = types.first() else {
        return Ok(None);
    };
    let entries = first.as_array().ok_or_else(|| {
        GraphError::InvalidGraph(format!("meta {kind}_types[0] is not an array"))
    })?;
    entries
        .iter()
        .map(|entry| {
            entry.as_str().map(str::to_string).ok_or_else(|| {
                GraphError::InvalidGraph(format!("meta {kind}_types[0] holds a non-string entry"))
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}
