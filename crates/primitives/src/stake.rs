//! Accepted stake transactions and the derived per-supernode stake views.

use serde::{Deserialize, Serialize};
use supernode_params::{default::TIERS, stake::StakeParams};

use crate::{
    hashes::TxHash,
    keys::{PublicAddress, SupernodeSignature, TxSecretKey},
};

/// A stake transaction accepted into the storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeTransaction {
    /// Hex-encoded supernode public identifier the stake counts toward.
    pub supernode_public_id: String,

    /// The supernode wallet address the stake was paid to.
    pub supernode_public_address: PublicAddress,

    /// Signature binding the address to the identifier.
    pub supernode_signature: SupernodeSignature,

    /// The published transaction secret key.
    pub tx_secret_key: TxSecretKey,

    /// The staked amount in atomic units.
    pub amount: u64,

    /// The block the stake transaction was included in.
    pub block_height: u64,

    /// Unlock time relative to `block_height`, in blocks.
    pub unlock_time: u64,

    /// The transaction prefix hash.
    pub hash: TxHash,
}

impl StakeTransaction {
    /// Returns true if the stake counts toward eligibility at `block_index`.
    ///
    /// The stake becomes valid `validation_period` blocks after its containing block and stays
    /// valid through the unlock time plus the trusted restaking period.
    pub fn is_valid(&self, params: &StakeParams, block_index: u64) -> bool {
        let first_valid_block = self.block_height + params.validation_period;
        let last_valid_block =
            self.block_height + self.unlock_time + params.trusted_restaking_period;

        block_index >= first_valid_block && block_index < last_valid_block
    }
}

/// The aggregate stake of one supernode at one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupernodeStake {
    /// Hex-encoded supernode public identifier.
    pub supernode_public_id: String,

    /// Sum of all stake amounts valid at the block, in atomic units.
    pub amount: u64,
}

/// One supernode's row in a tier list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierEntry {
    /// Hex-encoded supernode public identifier.
    pub supernode_public_id: String,

    /// The aggregate stake that placed the supernode into this tier, in atomic units.
    pub stake_amount: u64,
}

/// The per-block tier lists, lowest tier first.
pub type TierArray = [Vec<TierEntry>; TIERS];
