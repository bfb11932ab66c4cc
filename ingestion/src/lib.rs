pub mod scanner;
pub mod source;
pub mod stream;

pub use source::SnapshotSource;
pub use stream::{IngestionError, StreamIngestor};
