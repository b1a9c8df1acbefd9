//! Disqualification records as they are persisted in the stake transaction storage.

use serde::{Deserialize, Serialize};

use crate::{
    keys::SupernodeId,
    tx_extra::{Disqualification2Extra, DisqualificationExtra},
};

/// A v1 disqualification accepted into the storage: the encoded record plus the fields the
/// processor extracts from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisqualificationRecord {
    /// The encoded [`DisqualificationExtra`].
    pub blob: Vec<u8>,

    /// The block the disqualification transaction was included in.
    pub block_index: u64,

    /// The disqualified supernode.
    pub id: SupernodeId,

    /// Hex rendering of `id`, kept because records are keyed by hex ids everywhere else.
    pub id_str: String,
}

impl DisqualificationRecord {
    /// Builds a record from a decoded extra at the given block.
    pub fn from_extra(extra: &DisqualificationExtra, block_index: u64) -> Self {
        let id = extra.item.id;
        Self {
            blob: bincode::serialize(extra).expect("in-memory serialization"),
            block_index,
            id,
            id_str: id.to_string(),
        }
    }

    /// Returns true if the disqualification is in force at `block_index`.
    ///
    /// A disqualification takes effect at its containing block and never expires; the supernode
    /// only leaves the record when the block carrying it is rolled back.
    pub fn is_active(&self, block_index: u64) -> bool {
        block_index >= self.block_index
    }
}

/// A v2 disqualification accepted into the storage. Only the encoded record and the block index
/// are kept; the target ids are read back out of the blob on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disqualification2Record {
    /// The encoded [`Disqualification2Extra`].
    pub blob: Vec<u8>,

    /// The block the disqualification transaction was included in.
    pub block_index: u64,
}

impl Disqualification2Record {
    /// Builds a record from a decoded extra at the given block.
    pub fn from_extra(extra: &Disqualification2Extra, block_index: u64) -> Self {
        Self {
            blob: bincode::serialize(extra).expect("in-memory serialization"),
            block_index,
        }
    }

    /// The supernodes this record disqualifies. Empty if the blob fails to decode, which can
    /// only happen if the storage file was tampered with.
    pub fn ids(&self) -> Vec<SupernodeId> {
        match bincode::deserialize::<Disqualification2Extra>(&self.blob) {
            Ok(extra) => extra.item.ids,
            Err(_) => {
                debug_assert!(false, "undecodable disqualification2 blob in storage");
                Vec::new()
            }
        }
    }

    /// Returns true if the disqualification is in force at `block_index`.
    ///
    /// Same semantics as [`DisqualificationRecord::is_active`]: effective from its containing
    /// block, permanent thereafter.
    pub fn is_active(&self, block_index: u64) -> bool {
        block_index >= self.block_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{hashes::BlockHash, tx_extra::Disqualification2Item};

    #[test]
    fn v2_record_round_trips_ids() {
        let extra = Disqualification2Extra {
            item: Disqualification2Item {
                payment_id: "payment".into(),
                block_height: 5,
                block_hash: BlockHash([1; 32]),
                ids: vec![SupernodeId([2; 32]), SupernodeId([3; 32])],
            },
            signers: Vec::new(),
        };
        let record = Disqualification2Record::from_extra(&extra, 7);
        assert_eq!(record.ids(), extra.item.ids);
    }

    #[test]
    fn active_from_containing_block_onwards() {
        let record = DisqualificationRecord {
            blob: Vec::new(),
            block_index: 100,
            id: SupernodeId([0; 32]),
            id_str: String::new(),
        };
        assert!(!record.is_active(99));
        assert!(record.is_active(100));
        // No re-qualification: the record stays in force arbitrarily far past its block.
        assert!(record.is_active(100_000));
        assert!(record.is_active(u64::MAX));
    }
}
