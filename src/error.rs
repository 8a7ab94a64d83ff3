use std::io;

use thiserror::Error;

/// Failures surfaced while reading instrumentation state or rendering a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The provider cannot supply this data on the current host.
    #[error("instrumentation unavailable: {0}")]
    Unavailable(String),

    /// Reading provider state failed.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// The provider returned data that could not be parsed.
    #[error("malformed {what}: {detail}")]
    Malformed { what: &'static str, detail: String },

    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl SnapshotError {
    /// Wraps an I/O failure, reporting unsupported operations as unavailable.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        let context = context.into();
        if source.kind() == io::ErrorKind::Unsupported {
            SnapshotError::Unavailable(context)
        } else {
            SnapshotError::Io { context, source }
        }
    }
}

pub type Result<T> = std::result::Result<T, SnapshotError>;
