//! Error types for tabtime-core operations.
//!
//! None of these are fatal to the tracking loop: the controller logs them and
//! keeps its in-memory state as the source of truth.

/// All errors that can occur in tabtime-core operations.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    // ─────────────────────────────────────────────────────────────────────
    // Storage Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("No main sessions stored; nothing to replace")]
    EmptyCollection,

    #[error("Could not determine a storage path (no home directory)")]
    NoStoragePath,

    #[error("Storage writer thread panicked before draining its queue")]
    WriterPanicked,

    // ─────────────────────────────────────────────────────────────────────
    // Model Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Main session already holds an open tab session ({domain}); it must stay last")]
    OpenTabSessionNotLast { domain: String },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl TrackerError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        TrackerError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        TrackerError::Json {
            context: context.into(),
            source,
        }
    }
}

/// Convenience type alias for Results using TrackerError.
pub type Result<T> = std::result::Result<T, TrackerError>;

impl From<TrackerError> for String {
    fn from(err: TrackerError) -> String {
        err.to_string()
    }
}
