//! A programmable in-memory chain oracle.

use std::{collections::BTreeMap, sync::Mutex};

use supernode_params::network::Network;
use supernode_primitives::{
    crypto::fast_hash,
    hashes::{BlockHash, TxHash},
    oracle::{ChainOracle, OracleError},
    tx::{Block, Transaction},
};

#[derive(Debug, Clone)]
struct StoredBlock {
    hash: BlockHash,
    block: Block,
}

#[derive(Debug, Default)]
struct ChainState {
    blocks: Vec<StoredBlock>,
    transactions: BTreeMap<TxHash, Transaction>,
    /// (activation height, version) pairs, ascending by height.
    hard_forks: Vec<(u64, u8)>,
}

/// An in-memory chain the tests drive directly. Blocks can be appended, truncated and replaced
/// (with a different salt, so the replacement block gets a different hash), which is all a reorg
/// is from the processor's point of view.
#[derive(Debug)]
pub struct MockOracle {
    network: Network,
    state: Mutex<ChainState>,
}

impl MockOracle {
    /// An empty testnet chain with the given hard-fork schedule.
    pub fn new(hard_forks: Vec<(u64, u8)>) -> Self {
        Self {
            network: Network::Testnet,
            state: Mutex::new(ChainState {
                hard_forks,
                ..Default::default()
            }),
        }
    }

    /// Appends a block containing `txs` and returns its index. The block hash commits to the
    /// parent hash, the index and `salt`.
    pub fn push_block_with_salt(&self, txs: Vec<Transaction>, salt: u64) -> u64 {
        let mut state = self.state.lock().expect("mock oracle lock");

        let prev_hash = state
            .blocks
            .last()
            .map(|stored| stored.hash)
            .unwrap_or_default();
        let index = state.blocks.len() as u64;

        let mut tx_hashes = Vec::with_capacity(txs.len());
        for tx in txs {
            let hash = tx.prefix_hash();
            tx_hashes.push(hash);
            state.transactions.insert(hash, tx);
        }

        let block = Block {
            prev_hash,
            tx_hashes,
        };
        let hash = BlockHash(fast_hash(
            &[
                prev_hash.as_bytes().as_slice(),
                &index.to_le_bytes(),
                &salt.to_le_bytes(),
            ]
            .concat(),
        ));
        state.blocks.push(StoredBlock { hash, block });
        index
    }

    /// Appends a block containing `txs` with the default salt.
    pub fn push_block(&self, txs: Vec<Transaction>) -> u64 {
        self.push_block_with_salt(txs, 0)
    }

    /// Appends `count` empty blocks.
    pub fn push_empty_blocks(&self, count: u64) {
        for _ in 0..count {
            self.push_block(Vec::new());
        }
    }

    /// Drops every block at or above `height`. Transaction bodies stay resolvable, like a node
    /// that keeps orphaned transactions in its pool.
    pub fn truncate(&self, height: u64) {
        let mut state = self.state.lock().expect("mock oracle lock");
        state.blocks.truncate(height as usize);
    }

    /// Removes a transaction body so fetches report it as missed.
    pub fn forget_transaction(&self, hash: &TxHash) {
        let mut state = self.state.lock().expect("mock oracle lock");
        state.transactions.remove(hash);
    }
}

impl ChainOracle for MockOracle {
    fn height(&self) -> u64 {
        self.state.lock().expect("mock oracle lock").blocks.len() as u64
    }

    fn block_hash(&self, block_index: u64) -> Result<BlockHash, OracleError> {
        self.state
            .lock()
            .expect("mock oracle lock")
            .blocks
            .get(block_index as usize)
            .map(|stored| stored.hash)
            .ok_or(OracleError::BlockNotFound(block_index))
    }

    fn block_by_hash(&self, hash: &BlockHash) -> Result<Block, OracleError> {
        self.state
            .lock()
            .expect("mock oracle lock")
            .blocks
            .iter()
            .find(|stored| stored.hash == *hash)
            .map(|stored| stored.block.clone())
            .ok_or(OracleError::UnknownBlockHash(*hash))
    }

    fn transactions(&self, hashes: &[TxHash]) -> (Vec<Transaction>, Vec<TxHash>) {
        let state = self.state.lock().expect("mock oracle lock");
        let mut found = Vec::new();
        let mut missed = Vec::new();
        for hash in hashes {
            match state.transactions.get(hash) {
                Some(tx) => found.push(tx.clone()),
                None => missed.push(*hash),
            }
        }
        (found, missed)
    }

    fn hard_fork_version(&self, block_index: u64) -> u8 {
        let state = self.state.lock().expect("mock oracle lock");
        state
            .hard_forks
            .iter()
            .take_while(|(height, _)| *height <= block_index)
            .last()
            .map(|(_, version)| *version)
            .unwrap_or(0)
    }

    fn earliest_ideal_height_for_version(&self, version: u8) -> u64 {
        let state = self.state.lock().expect("mock oracle lock");
        state
            .hard_forks
            .iter()
            .find(|(_, v)| *v >= version)
            .map(|(height, _)| *height)
            .unwrap_or(u64::MAX)
    }

    fn network(&self) -> Network {
        self.network
    }
}
