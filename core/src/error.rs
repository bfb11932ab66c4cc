use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    MalformedInput,
    InvalidConfiguration,
    IndexOutOfBounds,
    SnapshotBuildFailure,
    InvalidGraph,
    ProgressRejected,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCode::MalformedInput => "MALFORMED_INPUT",
            ErrorCode::InvalidConfiguration => "INVALID_CONFIGURATION",
            ErrorCode::IndexOutOfBounds => "INDEX_OUT_OF_BOUNDS",
            ErrorCode::SnapshotBuildFailure => "SNAPSHOT_BUILD_FAILURE",
            ErrorCode::InvalidGraph => "INVALID_GRAPH",
            ErrorCode::ProgressRejected => "PROGRESS_REJECTED",
        };
        write!(f, "{}", s)
    }
}

pub trait HeapscopeError: std::error::Error {
    fn error_code(&self) -> ErrorCode;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_serde_name() {
        for code in [
            ErrorCode::MalformedInput,
            ErrorCode::InvalidConfiguration,
            ErrorCode::IndexOutOfBounds,
            ErrorCode::SnapshotBuildFailure,
            ErrorCode::InvalidGraph,
            ErrorCode::ProgressRejected,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code));
        }
    }
}
