pub mod pipeline;
pub mod selector;
pub mod serializer;

pub use pipeline::{analyze, AnalysisError, AnalysisOptions, AnalysisResult, HeapAnalyzer};
pub use selector::{LeakPoint, LeakPointSelector};
pub use serializer::{serialize_node, SerializedEdge, SerializedNode};
