//! The stake transaction storage: the persistent log of accepted stake transactions and
//! disqualifications, the processed-chain markers, and the lazily-built per-block supernode
//! stake index.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    io::Write,
    path::PathBuf,
};

use serde::{Deserialize, Serialize};
use supernode_params::stake::StakeParams;
use supernode_primitives::{
    disqualification::{Disqualification2Record, DisqualificationRecord},
    hashes::{BlockHash, TxHash},
    keys::SupernodeId,
    stake::{StakeTransaction, SupernodeStake},
};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::errors::{StorageError, StorageResult};

/// File the storage persists to. The `v2` in the name versions the binary format: bumping it
/// abandons old state and forces a rebuild from genesis.
pub const STAKE_TRANSACTION_STORAGE_FILE_NAME: &str = "stake_transactions.v2.bin";

/// The persisted portion of the storage. The supernode stake index is derived and rebuilt on
/// demand, so it never hits the disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StorageState {
    txs: Vec<StakeTransaction>,
    disquals: Vec<DisqualificationRecord>,
    disquals2: Vec<Disqualification2Record>,
    processed_chain: Vec<(u64, BlockHash)>,
}

/// Persistent log of accepted stake transactions and disqualifications, plus the markers for
/// which prefix of the chain has been processed.
#[derive(Debug)]
pub struct StakeTransactionStorage {
    /// Where the state is persisted. `None` keeps the storage purely in memory.
    path: Option<PathBuf>,

    /// The block index processing starts after when the store is empty.
    first_block_number: u64,

    params: StakeParams,

    state: StorageState,

    /// Hashes of the stake transactions in `state.txs`; makes `add_tx` idempotence a set probe.
    tx_hashes: BTreeSet<TxHash>,

    /// block index -> supernode id -> aggregate stake. Derived, never persisted.
    supernode_stakes: BTreeMap<u64, BTreeMap<String, SupernodeStake>>,

    need_store: bool,
}

impl StakeTransactionStorage {
    /// Opens the storage, loading previous state from `path` if the file exists.
    ///
    /// A file that exists but fails to decode is a hard error: the operator must delete it to
    /// force a rebuild.
    pub fn new(
        path: Option<PathBuf>,
        first_block_number: u64,
        params: StakeParams,
    ) -> StorageResult<Self> {
        let state = match &path {
            Some(path) if path.exists() => {
                let bytes = fs::read(path)?;
                bincode::deserialize(&bytes).map_err(|source| StorageError::Corrupt {
                    path: path.clone(),
                    source,
                })?
            }
            _ => StorageState::default(),
        };

        let tx_hashes = state.txs.iter().map(|tx| tx.hash).collect();

        debug!(
            first_block_number,
            tx_count = state.txs.len(),
            processed = state.processed_chain.len(),
            "opened stake transaction storage"
        );

        Ok(Self {
            path,
            first_block_number,
            params,
            state,
            tx_hashes,
            supernode_stakes: BTreeMap::new(),
            need_store: false,
        })
    }

    /// Appends an accepted stake transaction. A second insert with the same transaction hash is
    /// ignored.
    pub fn add_tx(&mut self, stake: StakeTransaction) {
        if !self.tx_hashes.insert(stake.hash) {
            debug!(tx_hash = %stake.hash, "ignoring duplicate stake transaction");
            return;
        }
        self.state.txs.push(stake);
        self.need_store = true;
    }

    /// Appends a batch of v1 disqualifications.
    pub fn add_disquals(&mut self, disquals: Vec<DisqualificationRecord>) {
        if disquals.is_empty() {
            return;
        }
        self.state.disquals.extend(disquals);
        self.need_store = true;
    }

    /// Appends a batch of v2 disqualifications.
    pub fn add_disquals2(&mut self, disquals2: Vec<Disqualification2Record>) {
        if disquals2.is_empty() {
            return;
        }
        self.state.disquals2.extend(disquals2);
        self.need_store = true;
    }

    /// Returns true if at least one block has been processed.
    pub fn has_last_processed_block(&self) -> bool {
        !self.state.processed_chain.is_empty()
    }

    /// The index of the last processed block, or the seeded first block number when nothing has
    /// been processed yet.
    pub fn get_last_processed_block_index(&self) -> u64 {
        self.state
            .processed_chain
            .last()
            .map(|(index, _)| *index)
            .unwrap_or(self.first_block_number)
    }

    /// The hash of the last processed block, if any block has been processed.
    pub fn get_last_processed_block_hash(&self) -> Option<BlockHash> {
        self.state.processed_chain.last().map(|(_, hash)| *hash)
    }

    /// Marks `block_index` as processed. The caller guarantees indices arrive in increasing
    /// order.
    pub fn add_last_processed_block(&mut self, block_index: u64, block_hash: BlockHash) {
        debug_assert!(
            block_index > self.get_last_processed_block_index()
                || !self.has_last_processed_block(),
            "processed blocks must be added in increasing order"
        );
        self.state.processed_chain.push((block_index, block_hash));
        self.need_store = true;
    }

    /// Unrolls the last processed block: pops the marker and drops every stake transaction and
    /// disqualification that was extracted from that block. Returns the number of stake
    /// transactions removed.
    pub fn remove_last_processed_block(&mut self) -> usize {
        let Some((block_index, _)) = self.state.processed_chain.pop() else {
            return 0;
        };

        let tx_count_before = self.state.txs.len();
        self.state.txs.retain(|tx| {
            let keep = tx.block_height != block_index;
            if !keep {
                self.tx_hashes.remove(&tx.hash);
            }
            keep
        });
        self.state
            .disquals
            .retain(|disq| disq.block_index != block_index);
        self.state
            .disquals2
            .retain(|disq| disq.block_index != block_index);

        self.need_store = true;

        let removed = tx_count_before - self.state.txs.len();
        if removed > 0 {
            warn!(block_index, removed, "unrolled stake transactions");
        }
        removed
    }

    /// Drops the derived per-block stake index. It is rebuilt on demand.
    pub fn clear_supernode_stakes(&mut self) {
        self.supernode_stakes.clear();
    }

    /// Computes the aggregate stake per supernode counting every stake transaction valid at
    /// `block_index`.
    pub fn valid_stakes_at(&self, block_index: u64) -> BTreeMap<String, SupernodeStake> {
        let mut stakes: BTreeMap<String, SupernodeStake> = BTreeMap::new();
        for tx in &self.state.txs {
            if !tx.is_valid(&self.params, block_index) {
                continue;
            }
            stakes
                .entry(tx.supernode_public_id.clone())
                .and_modify(|stake| stake.amount = stake.amount.saturating_add(tx.amount))
                .or_insert_with(|| SupernodeStake {
                    supernode_public_id: tx.supernode_public_id.clone(),
                    amount: tx.amount,
                });
        }
        stakes
    }

    /// Rebuilds the stake index at `block_index`. Entries for blocks before `block_index` are
    /// dropped; they are recomputed lazily if ever asked for again.
    pub fn update_supernode_stakes(&mut self, block_index: u64) {
        let stakes = self.valid_stakes_at(block_index);
        self.supernode_stakes = self.supernode_stakes.split_off(&block_index);
        self.supernode_stakes.insert(block_index, stakes);
    }

    /// Looks up the aggregate stake of one supernode at one block.
    pub fn find_supernode_stake(
        &mut self,
        block_index: u64,
        supernode_public_id: &str,
    ) -> Option<&SupernodeStake> {
        self.stakes_entry(block_index).get(supernode_public_id)
    }

    /// All supernode stakes at `block_index`, in id order.
    pub fn get_supernode_stakes(&mut self, block_index: u64) -> Vec<SupernodeStake> {
        self.stakes_entry(block_index).values().cloned().collect()
    }

    fn stakes_entry(&mut self, block_index: u64) -> &BTreeMap<String, SupernodeStake> {
        if !self.supernode_stakes.contains_key(&block_index) {
            let stakes = self.valid_stakes_at(block_index);
            self.supernode_stakes.insert(block_index, stakes);
        }
        &self.supernode_stakes[&block_index]
    }

    /// The supernodes disqualified as of `block_index`, deduplicated and in key order.
    pub fn get_supernode_disqualifications(&self, block_index: u64) -> Vec<SupernodeId> {
        let mut ids = BTreeSet::new();
        for disq in &self.state.disquals {
            if disq.is_active(block_index) {
                ids.insert(disq.id);
            }
        }
        for disq in &self.state.disquals2 {
            if disq.is_active(block_index) {
                ids.extend(disq.ids());
            }
        }
        ids.into_iter().collect()
    }

    /// Number of accepted stake transactions.
    pub fn get_tx_count(&self) -> usize {
        self.state.txs.len()
    }

    /// True if the state has been mutated since the last [`Self::store`].
    pub fn need_store(&self) -> bool {
        self.need_store
    }

    /// Persists the state atomically: the encoded blob goes to a temp file next to the target
    /// which is then renamed over it.
    pub fn store(&mut self) -> StorageResult<()> {
        if let Some(path) = &self.path {
            let bytes = bincode::serialize(&self.state).map_err(StorageError::Encode)?;
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => std::path::Path::new("."),
            };
            let mut tmp = NamedTempFile::new_in(dir)?;
            tmp.write_all(&bytes)?;
            tmp.persist(path).map_err(|e| StorageError::Io(e.error))?;
            debug!(path = %path.display(), bytes = bytes.len(), "stored stake transactions");
        }
        self.need_store = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use supernode_primitives::{
        keys::{PublicAddress, SupernodeSignature, TxSecretKey},
        tx_extra::{DisqualificationExtra, DisqualificationItem},
    };

    use super::*;

    fn stake(id: u8, block_height: u64, amount: u64) -> StakeTransaction {
        let mut hash = [0u8; 32];
        hash[0] = id;
        hash[8..16].copy_from_slice(&block_height.to_le_bytes());
        hash[16..24].copy_from_slice(&amount.to_le_bytes());
        StakeTransaction {
            supernode_public_id: hex::encode([id; 32]),
            supernode_public_address: PublicAddress {
                view_public: [0; 32],
                spend_public: [0; 32],
            },
            supernode_signature: SupernodeSignature([0; 64]),
            tx_secret_key: TxSecretKey([0; 32]),
            amount,
            block_height,
            unlock_time: 100,
            hash: TxHash(fast_hash_like(hash)),
        }
    }

    // Cheap stand-in for a hash; uniqueness is all the tests need.
    fn fast_hash_like(seed: [u8; 32]) -> [u8; 32] {
        seed
    }

    fn storage() -> StakeTransactionStorage {
        StakeTransactionStorage::new(None, 0, StakeParams::default()).unwrap()
    }

    #[test]
    fn add_tx_is_idempotent() {
        let mut store = storage();
        let tx = stake(1, 10, 500);
        store.add_tx(tx.clone());
        store.add_tx(tx);
        assert_eq!(store.get_tx_count(), 1);
    }

    #[test]
    fn stakes_aggregate_per_supernode() {
        let params = StakeParams::default();
        let mut store = storage();
        store.add_tx(stake(1, 10, 500));
        store.add_tx(stake(1, 11, 300));
        store.add_tx(stake(2, 10, 700));

        let at = 11 + params.validation_period;
        let id1 = hex::encode([1u8; 32]);
        assert_eq!(store.find_supernode_stake(at, &id1).unwrap().amount, 800);

        let stakes = store.get_supernode_stakes(at);
        assert_eq!(stakes.len(), 2);
        assert_eq!(stakes.iter().map(|s| s.amount).sum::<u64>(), 1500);
    }

    #[test]
    fn stakes_respect_validity_window() {
        let params = StakeParams::default();
        let mut store = storage();
        store.add_tx(stake(1, 10, 500));

        let id = hex::encode([1u8; 32]);
        assert!(store
            .find_supernode_stake(10 + params.validation_period - 1, &id)
            .is_none());
        assert!(store
            .find_supernode_stake(10 + params.validation_period, &id)
            .is_some());
    }

    #[test]
    fn remove_last_processed_block_purges_block_contents() {
        let mut store = storage();
        store.add_tx(stake(1, 5, 500));
        store.add_tx(stake(2, 6, 700));
        store.add_last_processed_block(5, BlockHash([5; 32]));
        store.add_last_processed_block(6, BlockHash([6; 32]));

        assert_eq!(store.remove_last_processed_block(), 1);
        assert_eq!(store.get_tx_count(), 1);
        assert_eq!(store.get_last_processed_block_index(), 5);

        // The removed transaction can be re-added after the unroll.
        store.add_tx(stake(2, 6, 700));
        assert_eq!(store.get_tx_count(), 2);
    }

    #[test]
    fn disqualifications_are_permanent() {
        let mut store = storage();
        let extra = DisqualificationExtra {
            item: DisqualificationItem {
                block_height: 9,
                block_hash: BlockHash([9; 32]),
                id: SupernodeId([1; 32]),
            },
            signers: Vec::new(),
        };
        store.add_disquals(vec![DisqualificationRecord::from_extra(&extra, 10)]);

        // Not yet in force before its containing block, in force forever after it.
        assert!(store.get_supernode_disqualifications(9).is_empty());
        assert_eq!(store.get_supernode_disqualifications(10).len(), 1);
        assert_eq!(store.get_supernode_disqualifications(100_000).len(), 1);

        // Unrolling the containing block is the only way out of the record.
        store.add_last_processed_block(10, BlockHash([10; 32]));
        store.remove_last_processed_block();
        assert!(store.get_supernode_disqualifications(10).is_empty());
    }

    #[test]
    fn store_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(STAKE_TRANSACTION_STORAGE_FILE_NAME);

        let mut store =
            StakeTransactionStorage::new(Some(path.clone()), 0, StakeParams::default()).unwrap();
        store.add_tx(stake(1, 10, 500));
        store.add_last_processed_block(10, BlockHash([10; 32]));
        assert!(store.need_store());
        store.store().unwrap();
        assert!(!store.need_store());

        let reloaded =
            StakeTransactionStorage::new(Some(path), 0, StakeParams::default()).unwrap();
        assert_eq!(reloaded.get_tx_count(), 1);
        assert_eq!(reloaded.get_last_processed_block_index(), 10);
        assert_eq!(
            reloaded.get_last_processed_block_hash(),
            Some(BlockHash([10; 32]))
        );
    }

    #[test]
    fn corrupt_file_fails_loudly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(STAKE_TRANSACTION_STORAGE_FILE_NAME);
        fs::write(&path, b"garbage that is not bincode").unwrap();

        let result = StakeTransactionStorage::new(Some(path), 0, StakeParams::default());
        assert!(matches!(result, Err(StorageError::Corrupt { .. })));
    }
}
