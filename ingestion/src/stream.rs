use bytes::BytesMut;
use heapscope_core::config::HeapscopeConfig;
use heapscope_core::error::{ErrorCode, HeapscopeError};
use heapscope_core::model::SnapshotPayload;
use heapscope_core::progress::{ProgressError, ProgressReporter, StatusDescriptor};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, warn};

use crate::scanner::{FrameScanner, ScanOutcome};
use crate::source::SnapshotSource;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("malformed snapshot stream at byte {offset}: {reason}")]
    Malformed { offset: usize, reason: String },
    #[error("snapshot stream ended after {0} bytes before the document closed")]
    Truncated(usize),
    #[error("snapshot stream read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot document does not match the payload shape: {0}")]
    Json(#[from] serde_json::Error),
    #[error("progress notification failed: {0}")]
    Progress(#[from] ProgressError),
}

impl HeapscopeError for IngestionError {
    fn error_code(&self) -> ErrorCode {
        match self {
            IngestionError::Progress(err) => err.error_code(),
            _ => ErrorCode::MalformedInput,
        }
    }
}

pub fn stream_ready_status() -> StatusDescriptor {
    StatusDescriptor::new("Memory stream data ready", "preparing to build edge indexes")
}

/// Assembles a [`SnapshotPayload`] from a [`SnapshotSource`].
#[derive(Debug, Clone)]
pub struct StreamIngestor {
    read_buffer_bytes: usize,
}

impl Default for StreamIngestor {
    fn default() -> Self {
        Self::from_config(&HeapscopeConfig::default())
    }
}

impl StreamIngestor {
    pub fn new(read_buffer_bytes: usize) -> Self {
        Self {
            read_buffer_bytes: read_buffer_bytes.max(1),
        }
    }

    pub fn from_config(config: &HeapscopeConfig) -> Self {
        Self::new(config.ingestion.read_buffer_bytes)
    }

    /// Resolves the source to a payload. Stream sources notify `progress`
    /// once the document is assembled and wait for the acknowledgment.
    pub async fn ingest(
        &self,
        source: SnapshotSource,
        progress: &ProgressReporter,
    ) -> Result<SnapshotPayload, IngestionError> {
        match source {
            SnapshotSource::Payload(payload) => Ok(payload),
            SnapshotSource::Stream(reader) => {
                let payload = self.assemble(reader).await?;
                progress.update_status(&stream_ready_status(), None).await?;
                Ok(payload)
            }
        }
    }

    /// Reads until the first top-level document closes, then deserializes
    /// it. Syntax errors fail on the chunk that contains them.
    pub async fn assemble<R>(&self, mut reader: R) -> Result<SnapshotPayload, IngestionError>
    where
        R: AsyncRead + Unpin,
    {
        let mut scanner = FrameScanner::new();
        let mut buffer = BytesMut::with_capacity(self.read_buffer_bytes);

        let end = loop {
            buffer.reserve(self.read_buffer_bytes);
            let scanned = buffer.len();
            let read = reader.read_buf(&mut buffer).await?;
            if read == 0 {
                return Err(IngestionError::Truncated(scanned));
            }
            debug!(read, total = buffer.len(), "snapshot chunk received");

            match scanner.feed(&buffer[scanned..]) {
                Ok(ScanOutcome::Complete(end)) => break end,
                Ok(ScanOutcome::NeedMore) => {}
                Err(err) => {
                    return Err(IngestionError::Malformed {
                        offset: err.offset,
                        reason: err.reason,
                    })
                }
            }
        };

        if buffer.len() > end {
            warn!(
                ignored = buffer.len() - end,
                "ignoring bytes after the snapshot document"
            );
        }
        buffer.truncate(end);

        let payload: SnapshotPayload = serde_json::from_slice(&buffer)?;
        info!(
            bytes = end,
            nodes = payload.nodes.len(),
            edges = payload.edges.len(),
            strings = payload.strings.len(),
            "snapshot stream assembled"
        );
        Ok(payload)
    }
}
