//! Checkpoint voting: quorums drawn from the tier lists vote on the hash of every checkpoint
//! block, and the pool collects votes until a quorum's worth can be assembled.
//!
//! The pool is a plain accumulator; deciding when to assemble a checkpoint and what to do with
//! it is the caller's business.

use supernode_params::checkpoint::CheckpointParams;
use supernode_primitives::{
    crypto::{check_signature, fast_hash},
    hashes::BlockHash,
    keys::{SupernodeId, SupernodeSignature},
    stake::TierArray,
};
use thiserror::Error;
use tracing::debug;

/// Why a vote was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoteError {
    /// The voted height is not a checkpoint height.
    #[error("height {0} is not a checkpoint interval multiple")]
    NotCheckpointHeight(u64),

    /// The voted height is ahead of the chain.
    #[error("vote for height {vote} is ahead of the chain tip {tip}")]
    FromFuture {
        /// The voted height.
        vote: u64,
        /// The current tip height.
        tip: u64,
    },

    /// The vote is older than the vote lifetime.
    #[error("vote for height {vote} expired at tip {tip}")]
    Expired {
        /// The voted height.
        vote: u64,
        /// The current tip height.
        tip: u64,
    },

    /// The voter index does not exist in the quorum.
    #[error("voter index {0} is not in the quorum")]
    UnknownVoter(u32),

    /// The signature does not verify under the quorum member's key.
    #[error("invalid vote signature from voter index {0}")]
    InvalidSignature(u32),

    /// The same quorum member already voted for this checkpoint.
    #[error("duplicate vote from voter index {0}")]
    DuplicateVote(u32),
}

/// The supernodes eligible to sign a checkpoint, in roster order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointQuorum {
    /// The quorum members' identity keys.
    pub voters: Vec<SupernodeId>,
}

impl CheckpointQuorum {
    /// Draws the quorum from a tier-list snapshot: the roster is flattened lowest tier first and
    /// truncated to the quorum size.
    pub fn from_tier_array(tiers: &TierArray, params: &CheckpointParams) -> Self {
        let voters = tiers
            .iter()
            .flatten()
            .filter_map(|entry| entry.supernode_public_id.parse().ok())
            .take(params.quorum_size)
            .collect();
        Self { voters }
    }
}

/// One quorum member's vote for a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointVote {
    /// The checkpointed height.
    pub block_height: u64,

    /// The hash of the block at that height.
    pub block_hash: BlockHash,

    /// The voter's position in the quorum.
    pub voter_index: u32,

    /// Signature over [`checkpoint_signing_hash`].
    pub signature: SupernodeSignature,
}

/// The hash a checkpoint vote signs: the block hash bound to its height.
pub fn checkpoint_signing_hash(block_hash: &BlockHash, block_height: u64) -> [u8; 32] {
    fast_hash(&[block_hash.as_bytes().as_slice(), &block_height.to_le_bytes()].concat())
}

impl CheckpointVote {
    /// Checks the vote is for a current checkpoint height: an interval multiple, not in the
    /// future, and within the vote lifetime of the tip.
    pub fn verify_age(&self, tip_height: u64, params: &CheckpointParams) -> Result<(), VoteError> {
        if self.block_height % params.interval != 0 {
            return Err(VoteError::NotCheckpointHeight(self.block_height));
        }
        if self.block_height > tip_height {
            return Err(VoteError::FromFuture {
                vote: self.block_height,
                tip: tip_height,
            });
        }
        if tip_height - self.block_height >= params.vote_lifetime {
            return Err(VoteError::Expired {
                vote: self.block_height,
                tip: tip_height,
            });
        }
        Ok(())
    }

    /// Checks the vote is signed by the quorum member it claims to come from.
    pub fn verify_signature(&self, quorum: &CheckpointQuorum) -> Result<(), VoteError> {
        let voter = quorum
            .voters
            .get(self.voter_index as usize)
            .ok_or(VoteError::UnknownVoter(self.voter_index))?;
        let hash = checkpoint_signing_hash(&self.block_hash, self.block_height);
        if !check_signature(&hash, voter, &self.signature) {
            return Err(VoteError::InvalidSignature(self.voter_index));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct CheckpointPoolEntry {
    block_height: u64,
    block_hash: BlockHash,
    votes: Vec<CheckpointVote>,
}

/// Accumulates checkpoint votes, one pool per (height, hash) pair.
#[derive(Debug, Clone, Default)]
pub struct VotingPool {
    pools: Vec<CheckpointPoolEntry>,
}

impl VotingPool {
    /// Adds a vote unless the same quorum member already voted for this checkpoint. Returns the
    /// number of votes now pooled for it.
    pub fn add_vote_if_unique(&mut self, vote: CheckpointVote) -> Result<usize, VoteError> {
        let pool = match self.pools.iter_mut().find(|entry| {
            entry.block_height == vote.block_height && entry.block_hash == vote.block_hash
        }) {
            Some(pool) => pool,
            None => {
                self.pools.push(CheckpointPoolEntry {
                    block_height: vote.block_height,
                    block_hash: vote.block_hash,
                    votes: Vec::new(),
                });
                self.pools.last_mut().expect("just pushed")
            }
        };

        if pool
            .votes
            .iter()
            .any(|existing| existing.voter_index == vote.voter_index)
        {
            return Err(VoteError::DuplicateVote(vote.voter_index));
        }

        debug!(
            block_height = vote.block_height,
            voter_index = vote.voter_index,
            "pooled checkpoint vote"
        );
        pool.votes.push(vote);
        Ok(pool.votes.len())
    }

    /// Drops every pool whose votes have fallen out of the vote lifetime.
    pub fn remove_expired_votes(&mut self, tip_height: u64, params: &CheckpointParams) {
        self.pools.retain(|pool| {
            tip_height < pool.block_height + params.vote_lifetime
        });
    }

    /// Drops pools for checkpoints that have been finalised elsewhere.
    pub fn remove_used_votes(&mut self, finalised: &[(u64, BlockHash)]) {
        self.pools.retain(|pool| {
            !finalised
                .iter()
                .any(|(height, hash)| pool.block_height == *height && pool.block_hash == *hash)
        });
    }

    /// The votes worth relaying at the given tip: everything still within the vote lifetime.
    pub fn relayable_votes(&self, tip_height: u64, params: &CheckpointParams) -> Vec<CheckpointVote> {
        self.pools
            .iter()
            .filter(|pool| tip_height < pool.block_height + params.vote_lifetime)
            .flat_map(|pool| pool.votes.iter().cloned())
            .collect()
    }

    /// True once a checkpoint has collected the minimum quorum votes.
    pub fn has_quorum(
        &self,
        block_height: u64,
        block_hash: &BlockHash,
        params: &CheckpointParams,
    ) -> bool {
        self.pools
            .iter()
            .find(|pool| pool.block_height == block_height && pool.block_hash == *block_hash)
            .is_some_and(|pool| pool.votes.len() >= params.min_votes)
    }
}
