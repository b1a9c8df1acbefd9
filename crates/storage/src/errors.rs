//! Error types for the persistent stores.

use std::path::PathBuf;

use thiserror::Error;

/// Error type for the persistent stores.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying file I/O failed.
    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// The on-disk state failed to decode. The operator must delete the file to force a rebuild
    /// from genesis.
    #[error("corrupt storage file {}: {source}", .path.display())]
    Corrupt {
        /// The offending file.
        path: PathBuf,

        /// The decode failure.
        source: bincode::Error,
    },

    /// The in-memory state failed to encode. This indicates a bug, not an environment problem.
    #[error("failed to encode storage state: {0}")]
    Encode(#[source] bincode::Error),
}

/// Wrapper type for storage results.
pub type StorageResult<T> = Result<T, StorageError>;
