//! The blockchain-based list: the per-block tiered supernode roster with a bounded history
//! window.
//!
//! The history is a queue where the front is the newest snapshot and the back is the oldest one
//! still inside the window; applying a block pushes a new tip and, once the window is full,
//! drops the oldest snapshot. Rolling a block back pops the tip.

use std::{collections::VecDeque, fs, io::Write, path::PathBuf};

use serde::{Deserialize, Serialize};
use supernode_params::{stake::StakeParams, sync::SyncParams};
use supernode_primitives::{
    crypto::{check_key, hex_to_pubkey},
    hashes::BlockHash,
    stake::{TierArray, TierEntry},
};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::{
    errors::{StorageError, StorageResult},
    stake_store::StakeTransactionStorage,
};

/// File the list persists to. The `v5` in the name versions the binary format: bumping it
/// abandons old state and forces a rebuild from genesis.
pub const BLOCKCHAIN_BASED_LIST_FILE_NAME: &str = "blockchain_based_list.v5.bin";

/// The tier lists derived for one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BblSnapshot {
    /// The block the snapshot was derived for.
    pub block_index: u64,

    /// The hash of that block.
    pub block_hash: BlockHash,

    /// The tier lists, lowest tier first.
    pub tiers: TierArray,
}

/// Per-block tiered supernode roster with bounded history.
#[derive(Debug)]
pub struct BlockchainBasedList {
    /// Where the history is persisted. `None` keeps the list purely in memory.
    path: Option<PathBuf>,

    /// The block index the list starts after when the history is empty.
    first_block_number: u64,

    stake_params: StakeParams,

    /// Maximum number of snapshots kept.
    history_size: usize,

    /// The snapshot queue; front is the tip.
    history: VecDeque<BblSnapshot>,

    need_store: bool,
}

impl BlockchainBasedList {
    /// Opens the list, loading previous history from `path` if the file exists.
    ///
    /// A file that exists but fails to decode is a hard error: the operator must delete it to
    /// force a rebuild.
    pub fn new(
        path: Option<PathBuf>,
        first_block_number: u64,
        stake_params: StakeParams,
        sync_params: &SyncParams,
    ) -> StorageResult<Self> {
        let history: VecDeque<BblSnapshot> = match &path {
            Some(path) if path.exists() => {
                let bytes = fs::read(path)?;
                bincode::deserialize(&bytes).map_err(|source| StorageError::Corrupt {
                    path: path.clone(),
                    source,
                })?
            }
            _ => VecDeque::new(),
        };

        debug!(
            first_block_number,
            history_depth = history.len(),
            "opened blockchain based list"
        );

        Ok(Self {
            path,
            first_block_number,
            stake_params,
            history_size: sync_params.history_size,
            history,
            need_store: false,
        })
    }

    /// The block index of the tip snapshot, or the seeded first block number when the history is
    /// empty.
    pub fn block_height(&self) -> u64 {
        self.history
            .front()
            .map(|snapshot| snapshot.block_index)
            .unwrap_or(self.first_block_number)
    }

    /// Number of snapshots available for lookup.
    pub fn history_depth(&self) -> usize {
        self.history.len()
    }

    /// Derives and pushes the tier lists for `block_index`.
    ///
    /// Candidates are the supernodes whose aggregate stake is valid at `block_index` and which
    /// are not disqualified there; each is slotted into a tier by its stake amount, and tiers
    /// are ordered by stake descending with the id as the tie break. A block at or below the
    /// current tip is skipped, which happens when the stake storage is being caught up behind
    /// the list.
    pub fn apply_block(
        &mut self,
        block_index: u64,
        block_hash: BlockHash,
        storage: &StakeTransactionStorage,
    ) {
        if block_index <= self.block_height() && !self.history.is_empty() {
            debug!(block_index, "tier lists already derived, skipping block");
            return;
        }
        debug_assert!(
            block_index == self.block_height() + 1,
            "blocks must be applied in order without gaps"
        );

        let stakes = storage.valid_stakes_at(block_index);
        let disqualified: std::collections::BTreeSet<String> = storage
            .get_supernode_disqualifications(block_index)
            .into_iter()
            .map(|id| id.to_string())
            .collect();

        let mut tiers: TierArray = Default::default();
        for (id, stake) in &stakes {
            if disqualified.contains(id) {
                continue;
            }
            // A stake only gets in with a well-formed key; the selection code relies on every
            // roster id resolving back to a curve point.
            match hex_to_pubkey(id) {
                Ok(key) if check_key(&key) => {}
                _ => {
                    warn!(supernode_public_id = %id, "dropping roster candidate with unusable key");
                    continue;
                }
            }
            if let Some(tier) = self.stake_params.tier_for_amount(stake.amount) {
                tiers[tier].push(TierEntry {
                    supernode_public_id: id.clone(),
                    stake_amount: stake.amount,
                });
            }
        }
        for tier in tiers.iter_mut() {
            tier.sort_by(|a, b| {
                b.stake_amount
                    .cmp(&a.stake_amount)
                    .then_with(|| a.supernode_public_id.cmp(&b.supernode_public_id))
            });
        }

        self.history.push_front(BblSnapshot {
            block_index,
            block_hash,
            tiers,
        });
        if self.history.len() > self.history_size {
            self.history.pop_back();
        }
        self.need_store = true;
    }

    /// Pops the tip snapshot.
    pub fn remove_latest_block(&mut self) {
        if self.history.pop_front().is_some() {
            self.need_store = true;
        }
    }

    /// The snapshot at `depth` below the tip (0 = tip).
    ///
    /// # Panics
    ///
    /// Panics if `depth >= history_depth()`; asking for a snapshot outside the window is a
    /// caller bug.
    pub fn snapshot(&self, depth: usize) -> &BblSnapshot {
        assert!(
            depth < self.history.len(),
            "snapshot depth {depth} outside history window of {}",
            self.history.len()
        );
        &self.history[depth]
    }

    /// The tier lists at `depth` below the tip (0 = tip). Same panics as [`Self::snapshot`].
    pub fn tiers(&self, depth: usize) -> &TierArray {
        &self.snapshot(depth).tiers
    }

    /// True if the history has been mutated since the last [`Self::store`].
    pub fn need_store(&self) -> bool {
        self.need_store
    }

    /// Persists the history atomically: the encoded blob goes to a temp file next to the target
    /// which is then renamed over it.
    pub fn store(&mut self) -> StorageResult<()> {
        if let Some(path) = &self.path {
            let bytes = bincode::serialize(&self.history).map_err(StorageError::Encode)?;
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => std::path::Path::new("."),
            };
            let mut tmp = NamedTempFile::new_in(dir)?;
            tmp.write_all(&bytes)?;
            tmp.persist(path).map_err(|e| StorageError::Io(e.error))?;
            debug!(path = %path.display(), bytes = bytes.len(), "stored blockchain based list");
        }
        self.need_store = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::SigningKey;
    use supernode_params::default::COIN;
    use supernode_primitives::{
        crypto::fast_hash,
        hashes::TxHash,
        keys::{PublicAddress, SupernodeSignature, TxSecretKey},
        stake::StakeTransaction,
    };

    use super::*;

    fn supernode_id(seed: u8) -> String {
        let key = SigningKey::from_bytes(&fast_hash(&[seed]));
        hex::encode(key.verifying_key().to_bytes())
    }

    fn stake(id: &str, block_height: u64, amount: u64) -> StakeTransaction {
        StakeTransaction {
            supernode_public_id: id.to_string(),
            supernode_public_address: PublicAddress {
                view_public: [0; 32],
                spend_public: [0; 32],
            },
            supernode_signature: SupernodeSignature([0; 64]),
            tx_secret_key: TxSecretKey([0; 32]),
            amount,
            block_height,
            unlock_time: 1000,
            hash: TxHash(fast_hash(&[id.as_bytes(), &block_height.to_le_bytes()].concat())),
        }
    }

    fn bbl(history_size: usize) -> BlockchainBasedList {
        let sync_params = SyncParams {
            history_size,
            ..Default::default()
        };
        BlockchainBasedList::new(None, 0, StakeParams::default(), &sync_params).unwrap()
    }

    fn storage_with_stakes(stakes: &[(String, u64)]) -> StakeTransactionStorage {
        let mut storage =
            StakeTransactionStorage::new(None, 0, StakeParams::default()).unwrap();
        for (id, amount) in stakes {
            storage.add_tx(stake(id, 1, *amount));
        }
        storage
    }

    #[test]
    fn tiers_slot_by_amount_and_order_deterministically() {
        let id_a = supernode_id(1);
        let id_b = supernode_id(2);
        let id_c = supernode_id(3);
        let storage = storage_with_stakes(&[
            (id_a.clone(), 50_000 * COIN),
            (id_b.clone(), 60_000 * COIN),
            (id_c.clone(), 260_000 * COIN),
        ]);

        let mut list = bbl(10);
        let apply_at = 1 + StakeParams::default().validation_period;
        for index in 1..=apply_at {
            list.apply_block(index, BlockHash([index as u8; 32]), &storage);
        }

        let tiers = list.tiers(0);
        // Tier 0 holds both small stakes, larger amount first.
        assert_eq!(tiers[0].len(), 2);
        assert_eq!(tiers[0][0].supernode_public_id, id_b);
        assert_eq!(tiers[0][1].supernode_public_id, id_a);
        assert!(tiers[1].is_empty() && tiers[2].is_empty());
        assert_eq!(tiers[3].len(), 1);
        assert_eq!(tiers[3][0].supernode_public_id, id_c);
    }

    #[test]
    fn history_window_is_bounded() {
        let storage = storage_with_stakes(&[]);
        let mut list = bbl(3);

        for index in 1..=5 {
            list.apply_block(index, BlockHash([index as u8; 32]), &storage);
        }

        assert_eq!(list.history_depth(), 3);
        assert_eq!(list.block_height(), 5);
        assert_eq!(list.snapshot(0).block_index, 5);
        assert_eq!(list.snapshot(2).block_index, 3);
    }

    #[test]
    fn apply_skips_already_derived_blocks() {
        let storage = storage_with_stakes(&[]);
        let mut list = bbl(10);

        list.apply_block(1, BlockHash([1; 32]), &storage);
        list.apply_block(1, BlockHash([1; 32]), &storage);

        assert_eq!(list.history_depth(), 1);
    }

    #[test]
    fn remove_latest_block_pops_tip() {
        let storage = storage_with_stakes(&[]);
        let mut list = bbl(10);

        list.apply_block(1, BlockHash([1; 32]), &storage);
        list.apply_block(2, BlockHash([2; 32]), &storage);
        list.remove_latest_block();

        assert_eq!(list.block_height(), 1);
    }

    #[test]
    #[should_panic(expected = "outside history window")]
    fn out_of_window_depth_is_a_caller_bug() {
        let list = bbl(10);
        list.tiers(0);
    }

    #[test]
    fn store_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(BLOCKCHAIN_BASED_LIST_FILE_NAME);
        let id = supernode_id(7);
        let storage = storage_with_stakes(&[(id, 90_000 * COIN)]);

        let sync_params = SyncParams::default();
        let mut list = BlockchainBasedList::new(
            Some(path.clone()),
            0,
            StakeParams::default(),
            &sync_params,
        )
        .unwrap();
        let apply_at = 1 + StakeParams::default().validation_period;
        for index in 1..=apply_at {
            list.apply_block(index, BlockHash([index as u8; 32]), &storage);
        }
        list.store().unwrap();

        let reloaded =
            BlockchainBasedList::new(Some(path), 0, StakeParams::default(), &sync_params)
                .unwrap();
        assert_eq!(reloaded.history_depth(), list.history_depth());
        assert_eq!(reloaded.snapshot(0), list.snapshot(0));
    }
}
