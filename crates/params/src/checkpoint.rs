//! Parameters for checkpoint voting.

use serde::{Deserialize, Serialize};

use crate::default::{
    CHECKPOINT_INTERVAL, CHECKPOINT_MIN_VOTES, CHECKPOINT_QUORUM_SIZE, CHECKPOINT_VOTE_LIFETIME,
};

/// Checkpoint voting cadence and quorum bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointParams {
    /// A checkpoint is voted on every this many blocks.
    pub interval: u64,

    /// Number of voters drawn from the tier lists into the checkpoint quorum.
    pub quorum_size: usize,

    /// Minimum number of quorum votes for a checkpoint to be considered signed.
    pub min_votes: usize,

    /// Number of blocks a checkpoint vote stays relayable before it expires.
    pub vote_lifetime: u64,
}

impl Default for CheckpointParams {
    fn default() -> Self {
        Self {
            interval: CHECKPOINT_INTERVAL,
            quorum_size: CHECKPOINT_QUORUM_SIZE,
            min_votes: CHECKPOINT_MIN_VOTES,
            vote_lifetime: CHECKPOINT_VOTE_LIFETIME,
        }
    }
}
