//! The sidechain transaction and block shapes consumed by stake processing.
//!
//! Only the fields the processor inspects are modelled: the version tag used for transaction
//! classification, the unlock time, the typed extra fields and the outputs (with their commitment
//! data for post-hard-fork transactions).

use serde::{Deserialize, Serialize};

use crate::{
    crypto::fast_hash,
    hashes::{BlockHash, TxHash},
    tx_extra::ExtraField,
};

/// What an output pays to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputTarget {
    /// A one-time output key.
    Key {
        /// The derived one-time public key.
        key: [u8; 32],
    },

    /// Opaque data carried in an output; never owned by anyone.
    Data {
        /// The raw payload.
        bytes: Vec<u8>,
    },
}

/// A single transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    /// Plaintext amount. Zero for commitment transactions, where the amount hides in
    /// [`RctSignatures`].
    pub amount: u64,

    /// What the output pays to.
    pub target: OutputTarget,
}

/// The blinded `(mask, amount)` pair published per output of a commitment transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcdhTuple {
    /// The blinded commitment mask.
    pub mask: [u8; 32],

    /// The blinded amount scalar.
    pub amount: [u8; 32],
}

/// Commitment data of a post-hard-fork transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RctSignatures {
    /// Per-output blinded `(mask, amount)` pairs.
    pub ecdh_info: Vec<EcdhTuple>,

    /// Per-output amount commitments.
    pub out_pk: Vec<[u8; 32]>,
}

/// A transaction as handed out by the chain oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Version tag. `1` for plaintext-amount transactions, `2` for commitment transactions, and
    /// the reserved disqualification tags (see `supernode_params::default`).
    pub version: u32,

    /// Absolute unlock time in blocks. Stake processing reads it relative to the containing
    /// block.
    pub unlock_time: u64,

    /// Typed extra fields.
    pub extra: Vec<ExtraField>,

    /// The outputs.
    pub vout: Vec<TxOut>,

    /// Commitment data, present on commitment transactions only.
    pub rct: Option<RctSignatures>,
}

impl Transaction {
    /// The prefix hash identifying this transaction. Covers everything except the commitment
    /// data.
    pub fn prefix_hash(&self) -> TxHash {
        let prefix = (self.version, self.unlock_time, &self.extra, &self.vout);
        let encoded = bincode::serialize(&prefix).expect("in-memory serialization");
        TxHash(fast_hash(&encoded))
    }
}

/// A block as handed out by the chain oracle. Transaction bodies are fetched separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Hash of the parent block.
    pub prev_hash: BlockHash,

    /// Hashes of the transactions included in this block.
    pub tx_hashes: Vec<TxHash>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> Transaction {
        Transaction {
            version: 1,
            unlock_time: 100,
            extra: Vec::new(),
            vout: vec![TxOut {
                amount: 42,
                target: OutputTarget::Key { key: [9; 32] },
            }],
            rct: None,
        }
    }

    #[test]
    fn prefix_hash_ignores_commitment_data() {
        let tx = sample_tx();
        let mut with_rct = tx.clone();
        with_rct.rct = Some(RctSignatures {
            ecdh_info: vec![],
            out_pk: vec![],
        });
        assert_eq!(tx.prefix_hash(), with_rct.prefix_hash());
    }

    #[test]
    fn prefix_hash_covers_outputs() {
        let tx = sample_tx();
        let mut other = tx.clone();
        other.vout[0].amount = 43;
        assert_ne!(tx.prefix_hash(), other.prefix_hash());
    }
}
