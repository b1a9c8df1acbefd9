//! Error types for the stake transaction processor.

use supernode_primitives::oracle::OracleError;
use supernode_storage::StorageError;
use thiserror::Error;

/// Unified error type for everything that can fail in the processor.
///
/// Per-transaction problems are not errors: an invalid stake or disqualification is logged and
/// skipped. What surfaces here is the fatal remainder: store corruption, unexpected oracle
/// failures, and programmer errors like double initialisation.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// Errors from reading or writing the persistent stores.
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),

    /// Unexpected errors from the chain oracle. A plain
    /// [`OracleError::BlockNotFound`](supernode_primitives::oracle::OracleError::BlockNotFound)
    /// during sync is handled internally and never surfaces here.
    #[error("oracle failure: {0}")]
    Oracle(#[from] OracleError),

    /// The storages were initialised twice. Programmer error.
    #[error("processor storages have already been initialized")]
    StoragesAlreadyInitialized,
}
