use heapscope_core::model::SnapshotPayload;
use std::path::Path;
use tokio::io::AsyncRead;

/// Where a snapshot comes from: an already parsed document, or a byte
/// stream carrying one JSON document.
pub enum SnapshotSource {
    Payload(SnapshotPayload),
    Stream(Box<dyn AsyncRead + Send + Unpin>),
}

impl SnapshotSource {
    pub fn from_reader(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self::Stream(Box::new(reader))
    }

    /// Opens a `.heapsnapshot` file as a stream source.
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Self::from_reader(tokio::io::BufReader::new(file)))
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Self::Stream(_))
    }

    /// Root index declared by an already parsed payload. Streams must be
    /// ingested first.
    pub fn root_index(&self) -> Option<usize> {
        match self {
            Self::Payload(payload) => Some(payload.root_index()),
            Self::Stream(_) => None,
        }
    }
}

impl From<SnapshotPayload> for SnapshotSource {
    fn from(payload: SnapshotPayload) -> Self {
        Self::Payload(payload)
    }
}

impl std::fmt::Debug for SnapshotSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Payload(payload) => f
                .debug_struct("Payload")
                .field("nodes", &payload.nodes.len())
                .field("edges", &payload.edges.len())
                .field("strings", &payload.strings.len())
                .finish(),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}
