use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse transcript JSON array: {source}")]
    Parse {
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize transcript: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },
}

impl TranscriptError {
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn parse(source: serde_json::Error) -> Self {
        Self::Parse { source }
    }

    /// True for failures caused by the shape of the source text rather than I/O.
    #[must_use]
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}
