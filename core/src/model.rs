use serde::{Deserialize, Serialize};

/// Raw heap snapshot document as captured from the profiler.
///
/// Only the fields the analysis needs are modelled; unknown top-level keys
/// (`trace_function_infos`, `samples`, `locations`, ...) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPayload {
    #[serde(default)]
    pub snapshot: SnapshotHeader,
    pub nodes: Vec<u64>,
    pub edges: Vec<u64>,
    pub strings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_index: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<SnapshotMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_count: Option<u64>,
}

/// The `snapshot.meta` block.
///
/// `node_types` and `edge_types` hold one entry per field; the entry for the
/// `type` field is itself an array of type names, the rest are plain
/// strings such as `"string"` or `"number"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    #[serde(default)]
    pub node_fields: Vec<String>,
    #[serde(default)]
    pub node_types: Vec<serde_json::Value>,
    #[serde(default)]
    pub edge_fields: Vec<String>,
    #[serde(default)]
    pub edge_types: Vec<serde_json::Value>,
}

impl SnapshotPayload {
    pub fn root_index(&self) -> usize {
        self.snapshot.root_index.unwrap_or(0) as usize
    }
}
