//! The read-only interface to the canonical chain.

use supernode_params::network::Network;
use thiserror::Error;

use crate::{
    hashes::{BlockHash, TxHash},
    tx::{Block, Transaction},
};

/// Errors surfaced by the chain oracle.
#[derive(Debug, Clone, Error)]
pub enum OracleError {
    /// The block at the requested height is not (yet) part of the canonical chain. Sync passes
    /// end cleanly on this and retry on the next call.
    #[error("block at height {0} does not exist")]
    BlockNotFound(u64),

    /// No block with the requested hash is known.
    #[error("no block with hash {0}")]
    UnknownBlockHash(BlockHash),
}

/// The canonical chain, as far as stake processing is concerned.
///
/// The chain is an externally shared resource; implementations hand out snapshots of their
/// current view through `&self` and the processor holds the borrow for the duration of a sync
/// pass.
pub trait ChainOracle {
    /// The current chain height (number of blocks).
    fn height(&self) -> u64;

    /// The hash of the block at `block_index`.
    fn block_hash(&self, block_index: u64) -> Result<BlockHash, OracleError>;

    /// The block with the given hash.
    fn block_by_hash(&self, hash: &BlockHash) -> Result<Block, OracleError>;

    /// Resolves transaction hashes to bodies. Returns the found bodies and the hashes that could
    /// not be resolved; a missed hash is not an error.
    fn transactions(&self, hashes: &[TxHash]) -> (Vec<Transaction>, Vec<TxHash>);

    /// The hard-fork version in force at `block_index`.
    fn hard_fork_version(&self, block_index: u64) -> u8;

    /// The first height at which the given hard-fork version would ideally activate.
    fn earliest_ideal_height_for_version(&self, version: u8) -> u64;

    /// The network this chain belongs to.
    fn network(&self) -> Network;
}
