//! Parameters bounding a single synchronisation pass.

use serde::{Deserialize, Serialize};

use crate::default::{MAX_ITERATIONS_COUNT, SUPERNODE_HISTORY_SIZE, SYNC_DEBUG_LOG_STEP};

/// Bounds on the synchronisation loop and the tier-list history window.
///
/// Unlike [`crate::stake::StakeParams`] these do not affect which stakes are accepted; they bound
/// how much work a single pass does and how far back observers can look.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncParams {
    /// Maximum number of blocks applied by a single synchronisation pass. The driver is expected
    /// to call again to continue.
    pub max_iterations: u64,

    /// Block-index step at which sync progress is logged.
    pub debug_log_step: u64,

    /// Number of per-block tier snapshots kept in the blockchain-based list history.
    pub history_size: usize,
}

impl Default for SyncParams {
    fn default() -> Self {
        Self {
            max_iterations: MAX_ITERATIONS_COUNT,
            debug_log_step: SYNC_DEBUG_LOG_STEP,
            history_size: SUPERNODE_HISTORY_SIZE,
        }
    }
}
