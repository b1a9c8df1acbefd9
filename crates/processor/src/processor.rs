//! The synchronisation orchestrator: unrolls abandoned forks, applies new blocks and fires the
//! update observers.

use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard},
};

use supernode_params::default::{DISQUALIFICATION2_TX_VERSION, DISQUALIFICATION_TX_VERSION};
use supernode_params::{selection::SelectionParams, stake::StakeParams, sync::SyncParams};
use supernode_primitives::{
    crypto::{check_key, check_signature, fast_hash, hex_to_pubkey},
    disqualification::{Disqualification2Record, DisqualificationRecord},
    hashes::{BlockHash, TxHash},
    keys::address_as_string,
    oracle::{ChainOracle, OracleError},
    stake::{StakeTransaction, SupernodeStake},
    tx::{Block, Transaction},
    tx_extra::{
        check_disqualification, check_disqualification2, get_stake_extra, Disqualification2Extra,
        DisqualificationExtra,
    },
};
use supernode_selection::{resolve_ids, select_auth_sample, select_bbqs_qcl};
use supernode_storage::{
    BlockchainBasedList, StakeTransactionStorage, BLOCKCHAIN_BASED_LIST_FILE_NAME,
    STAKE_TRANSACTION_STORAGE_FILE_NAME,
};
use tracing::{debug, error, warn};

use crate::{
    errors::ProcessorError,
    observers::{BblUpdateHandler, ObserverRegistry, StakesUpdateHandler},
};

/// The parameter bundle a processor runs with.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessorParams {
    /// Stake acceptance and validity parameters.
    pub stake: StakeParams,

    /// Committee sizes and vote thresholds.
    pub selection: SelectionParams,

    /// Sync pass bounds and the tier-list history window.
    pub sync: SyncParams,
}

/// Everything guarded by the storage lock: the two stores, the observer slots and the
/// need-update flags.
#[derive(Debug)]
struct Inner {
    config_dir: Option<PathBuf>,
    storage: Option<StakeTransactionStorage>,
    bbl: Option<BlockchainBasedList>,
    observers: ObserverRegistry,
    stakes_need_update: bool,
    bbl_need_update: bool,
}

/// The stake transaction processor.
///
/// Owns the stake transaction storage and the blockchain-based list for their entire lifetime
/// (they are lazily created on the first applicable [`Self::synchronise`] call) and keeps the
/// derived state a pure function of the current canonical chain, rollbacks included.
#[derive(Debug)]
pub struct StakeTransactionProcessor<O> {
    oracle: Arc<O>,
    params: ProcessorParams,
    inner: Mutex<Inner>,
}

impl<O: ChainOracle> StakeTransactionProcessor<O> {
    /// Creates a processor over the given chain oracle.
    pub fn new(oracle: Arc<O>, params: ProcessorParams) -> Self {
        Self {
            oracle,
            params,
            inner: Mutex::new(Inner {
                config_dir: None,
                storage: None,
                bbl: None,
                observers: ObserverRegistry::default(),
                stakes_need_update: true,
                bbl_need_update: true,
            }),
        }
    }

    /// Sets the directory the two stores persist into. Without this call the processor runs
    /// purely in memory.
    ///
    /// Calling this twice, or after the stores have been created, is a programmer error.
    pub fn init_storages(&self, config_dir: impl Into<PathBuf>) -> Result<(), ProcessorError> {
        let mut inner = self.lock();
        if inner.config_dir.is_some() || inner.storage.is_some() || inner.bbl.is_some() {
            return Err(ProcessorError::StoragesAlreadyInitialized);
        }
        inner.config_dir = Some(config_dir.into());
        Ok(())
    }

    /// Looks up the aggregate stake of one supernode at one block.
    pub fn find_supernode_stake(
        &self,
        block_number: u64,
        supernode_public_id: &str,
    ) -> Option<SupernodeStake> {
        let mut inner = self.lock();
        inner
            .storage
            .as_mut()?
            .find_supernode_stake(block_number, supernode_public_id)
            .cloned()
    }

    /// Registers the stakes-update observer.
    pub fn set_on_update_stakes_handler(&self, handler: StakesUpdateHandler) {
        self.lock().observers.on_stakes_update = Some(handler);
    }

    /// Fires the stakes-update observer for the current chain tip. Without `force` the call is
    /// deduplicated: it only fires if the stakes changed since the observer last ran.
    pub fn invoke_update_stakes_handler(&self, force: bool) {
        let mut inner = self.lock();
        if inner.observers.on_stakes_update.is_none() {
            return;
        }
        if !inner.stakes_need_update && !force {
            return;
        }
        let height = self.oracle.height();
        if height == 0 {
            return;
        }
        invoke_update_stakes_handler_impl(&mut inner, height - 1);
    }

    /// Registers the tier-lists-update observer.
    pub fn set_on_update_blockchain_based_list_handler(&self, handler: BblUpdateHandler) {
        self.lock().observers.on_bbl_update = Some(handler);
    }

    /// Fires the tier-lists observer for the newest `depth` snapshots. `depth > 1` implies
    /// `force`; without `force` the call is deduplicated.
    pub fn invoke_update_blockchain_based_list_handler(&self, force: bool, depth: usize) {
        let mut inner = self.lock();
        if inner.observers.on_bbl_update.is_none() {
            return;
        }
        let force = force || depth > 1;
        if !inner.bbl_need_update && !force {
            return;
        }
        invoke_update_bbl_handler_impl(&mut inner, depth);
    }

    /// Brings the derived state in sync with the canonical chain.
    ///
    /// One pass unrolls any processed tail the chain no longer agrees with, applies at most
    /// `sync.max_iterations` new blocks, persists whatever changed, and fires the observers once
    /// the chain tip has been reached. The external driver is expected to call this
    /// periodically.
    pub fn synchronise(&self) -> Result<(), ProcessorError> {
        // Lock order is fixed: the storage lock first, then the oracle read borrow for the rest
        // of the pass.
        let mut inner = self.lock();
        let oracle = self.oracle.as_ref();

        let height = oracle.height();
        if height == 0
            || oracle.hard_fork_version(height - 1) < self.params.stake.processing_hf_version
        {
            return Ok(());
        }

        self.ensure_storages(&mut inner)?;

        // Unroll already processed blocks that belong to an abandoned fork.
        loop {
            let (storage, bbl) = storages_mut(&mut inner);
            if !storage.has_last_processed_block() {
                break;
            }
            let last_processed_block_index = storage.get_last_processed_block_index();
            if last_processed_block_index < height {
                match oracle.block_hash(last_processed_block_index) {
                    Ok(chain_hash)
                        if Some(chain_hash) == storage.get_last_processed_block_hash() =>
                    {
                        // The latest processed block is still canonical.
                        break;
                    }
                    Ok(_) => {}
                    // The block is not there yet; wait until it is received.
                    Err(OracleError::BlockNotFound(_)) => return Ok(()),
                    Err(e) => return Err(e.into()),
                }
            }

            warn!(
                block_index = last_processed_block_index,
                height, "stake transactions processing: unroll block"
            );

            let removed_stakes = storage.remove_last_processed_block();
            if removed_stakes > 0 {
                storage.clear_supernode_stakes();
            }
            if bbl.block_height() == last_processed_block_index {
                bbl.remove_latest_block();
            }
        }

        // Apply new blocks.
        let first_block_index = {
            let (storage, bbl) = storages_mut(&mut inner);
            let first = storage.get_last_processed_block_index() + 1;
            first.min(bbl.block_height() + 1)
        };

        let mut last_block_index = first_block_index;
        let mut last_block_index_for_sync = height;
        if last_block_index_for_sync - last_block_index > self.params.sync.max_iterations {
            last_block_index_for_sync = first_block_index + self.params.sync.max_iterations;
        }

        while last_block_index < last_block_index_for_sync {
            if last_block_index % self.params.sync.debug_log_step == 0
                || last_block_index == height - 1
            {
                debug!(
                    block_index = last_block_index,
                    target = height - 1,
                    "stake transactions block sync"
                );
            }

            let block_hash = match oracle.block_hash(last_block_index) {
                Ok(hash) => hash,
                // The block is not there yet; continue on a later pass.
                Err(OracleError::BlockNotFound(_)) => break,
                Err(e) => return Err(e.into()),
            };
            let block = oracle.block_by_hash(&block_hash)?;

            self.process_block(&mut inner, oracle, last_block_index, &block, block_hash, false)?;

            last_block_index += 1;
        }

        {
            let (storage, bbl) = storages_mut(&mut inner);
            if bbl.need_store() {
                bbl.store()?;
            }
            if storage.need_store() {
                storage.store()?;
            }
        }

        if last_block_index == height {
            if inner.stakes_need_update && inner.observers.on_stakes_update.is_some() {
                invoke_update_stakes_handler_impl(&mut inner, last_block_index - 1);
            }
            if inner.bbl_need_update && inner.observers.on_bbl_update.is_some() {
                invoke_update_bbl_handler_impl(
                    &mut inner,
                    (last_block_index - first_block_index) as usize,
                );
            }
            if first_block_index != last_block_index {
                debug!("stake transactions sync OK");
            }
        }

        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("storage lock poisoned")
    }

    /// Lazily creates the stores, seeded with the block before the ideal activation height of
    /// the processing hard fork.
    fn ensure_storages(&self, inner: &mut Inner) -> Result<(), ProcessorError> {
        if inner.storage.is_some() && inner.bbl.is_some() {
            return Ok(());
        }

        let mut first_block_number = self
            .oracle
            .earliest_ideal_height_for_version(self.params.stake.processing_hf_version);
        if first_block_number > 0 {
            first_block_number -= 1;
        }

        debug!(
            first_block_number,
            "initialize stake processing storages"
        );

        let (storage_path, bbl_path) = match &inner.config_dir {
            Some(dir) => (
                Some(dir.join(STAKE_TRANSACTION_STORAGE_FILE_NAME)),
                Some(dir.join(BLOCKCHAIN_BASED_LIST_FILE_NAME)),
            ),
            None => (None, None),
        };

        inner.storage = Some(StakeTransactionStorage::new(
            storage_path,
            first_block_number,
            self.params.stake,
        )?);
        inner.bbl = Some(BlockchainBasedList::new(
            bbl_path,
            first_block_number,
            self.params.stake,
            &self.params.sync,
        )?);
        Ok(())
    }

    fn process_block(
        &self,
        inner: &mut Inner,
        oracle: &O,
        block_index: u64,
        block: &Block,
        block_hash: BlockHash,
        update_storage: bool,
    ) -> Result<(), ProcessorError> {
        self.process_block_stake_transactions(
            inner,
            oracle,
            block_index,
            block,
            block_hash,
            update_storage,
        )?;
        self.process_block_tier_lists(inner, block_index, block_hash, update_storage)
    }

    /// Classifies and validates the block's transactions, appends what is accepted to the
    /// storage and marks the block processed.
    fn process_block_stake_transactions(
        &self,
        inner: &mut Inner,
        oracle: &O,
        block_index: u64,
        block: &Block,
        block_hash: BlockHash,
        update_storage: bool,
    ) -> Result<(), ProcessorError> {
        let Inner {
            storage,
            bbl,
            stakes_need_update,
            ..
        } = inner;
        let storage = storage.as_mut().expect("storages initialized");
        let bbl = bbl.as_ref().expect("storages initialized");

        if block_index <= storage.get_last_processed_block_index()
            && storage.has_last_processed_block()
        {
            return Ok(());
        }

        if oracle.hard_fork_version(block_index) >= self.params.stake.processing_hf_version {
            let (txs, missed) = oracle.transactions(&block.tx_hashes);

            if !missed.is_empty() {
                warn!(block_index, "some transactions for block have been missed");
                for tx_hash in &missed {
                    warn!(%tx_hash, "missed transaction");
                }
            }

            let mut disquals = Vec::new();
            let mut disquals2 = Vec::new();

            for tx in &txs {
                let tx_hash = tx.prefix_hash();

                match tx.version {
                    DISQUALIFICATION_TX_VERSION => {
                        if let Some(extra) =
                            self.check_disqualification_transaction(oracle, bbl, tx, tx_hash, block_index)
                        {
                            let record = DisqualificationRecord::from_extra(&extra, block_index);
                            debug!(
                                block_index,
                                %tx_hash,
                                supernode_id = %record.id_str,
                                "new disqualification transaction found"
                            );
                            disquals.push(record);
                        }
                    }
                    DISQUALIFICATION2_TX_VERSION => {
                        if let Some(extra) =
                            self.check_disqualification2_transaction(oracle, bbl, tx, tx_hash, block_index)
                        {
                            let record = Disqualification2Record::from_extra(&extra, block_index);
                            debug!(
                                block_index,
                                %tx_hash,
                                disqualified = ?extra.item.ids,
                                "new disqualification2 transaction found"
                            );
                            disquals2.push(record);
                        }
                    }
                    _ => {
                        if let Some(stake) =
                            self.process_stake_transaction(oracle, tx, tx_hash, block_index)
                        {
                            debug!(
                                block_index,
                                %tx_hash,
                                supernode_id = %stake.supernode_public_id,
                                amount = stake.amount,
                                "new stake transaction found"
                            );
                            storage.add_tx(stake);
                        }
                    }
                }
            }

            storage.add_disquals(disquals);
            storage.add_disquals2(disquals2);

            // TODO: carry the stake index forward incrementally instead of a full rebuild per
            // block.
            *stakes_need_update = true;

            storage.update_supernode_stakes(block_index);
        }

        storage.add_last_processed_block(block_index, block_hash);

        if update_storage {
            storage.store()?;
        }

        Ok(())
    }

    /// Derives the block's tier lists from the storage.
    fn process_block_tier_lists(
        &self,
        inner: &mut Inner,
        block_index: u64,
        block_hash: BlockHash,
        update_storage: bool,
    ) -> Result<(), ProcessorError> {
        let Inner {
            storage,
            bbl,
            bbl_need_update,
            ..
        } = inner;
        let storage = storage.as_ref().expect("storages initialized");
        let bbl = bbl.as_mut().expect("storages initialized");

        let prev_block_height = bbl.block_height();

        bbl.apply_block(block_index, block_hash, storage);

        if bbl.need_store() || prev_block_height != bbl.block_height() {
            *bbl_need_update = true;

            if update_storage {
                bbl.store()?;
            }
        }

        Ok(())
    }

    /// Validates a v1 disqualification against the snapshot it claims to be evaluated at.
    /// Returns the decoded record if every check passes.
    fn check_disqualification_transaction(
        &self,
        oracle: &O,
        bbl: &BlockchainBasedList,
        tx: &Transaction,
        tx_hash: TxHash,
        block_index: u64,
    ) -> Option<DisqualificationExtra> {
        let Some(disq) = check_disqualification(tx) else {
            warn!(%tx_hash, "ignore invalid disqualification transaction");
            return None;
        };

        if block_index <= disq.item.block_height {
            warn!(
                %tx_hash,
                disq_block_height = disq.item.block_height,
                block_index,
                "ignore invalid disqualification transaction: invalid block_height"
            );
            return None;
        }

        match oracle.block_hash(disq.item.block_height) {
            Ok(chain_hash) if chain_hash == disq.item.block_hash => {}
            _ => {
                warn!(%tx_hash, "ignore invalid disqualification transaction: invalid block_hash");
                return None;
            }
        }

        let depth = (bbl.block_height() - disq.item.block_height) as usize;
        if depth >= bbl.history_depth() {
            warn!(%tx_hash, "ignore invalid disqualification transaction: out of history");
            return None;
        }

        if disq.signers.len() < self.params.selection.required_bbqs_votes {
            warn!(%tx_hash, "ignore invalid disqualification transaction: lack of signers");
            return None;
        }

        let tiers = bbl.tiers(depth);
        let (bbqs_indexes, qcl_indexes) =
            select_bbqs_qcl(&disq.item.block_hash, tiers, &self.params.selection);
        let bbqs = resolve_ids(tiers, &bbqs_indexes);
        let qcl = resolve_ids(tiers, &qcl_indexes);

        if !qcl.contains(&disq.item.id) {
            warn!(
                %tx_hash,
                disqualified_id = %disq.item.id,
                "ignore invalid disqualification transaction: disqualified id is not in QCL"
            );
            return None;
        }

        for signer in &disq.signers {
            if !bbqs.contains(&signer.signer_id) {
                warn!(
                    %tx_hash,
                    signer_id = %signer.signer_id,
                    "ignore invalid disqualification transaction: signer id is not in BBQS"
                );
                return None;
            }
        }

        Some(disq)
    }

    /// Validates a v2 disqualification against the payment-authorisation sample of the snapshot
    /// it claims to be evaluated at. Returns the decoded record if every check passes.
    fn check_disqualification2_transaction(
        &self,
        oracle: &O,
        bbl: &BlockchainBasedList,
        tx: &Transaction,
        tx_hash: TxHash,
        block_index: u64,
    ) -> Option<Disqualification2Extra> {
        let Some(disq) = check_disqualification2(tx) else {
            warn!(%tx_hash, "ignore invalid disqualification2 transaction");
            return None;
        };

        if block_index <= disq.item.block_height {
            warn!(
                %tx_hash,
                disq_block_height = disq.item.block_height,
                block_index,
                "ignore invalid disqualification2 transaction: invalid block_height"
            );
            return None;
        }

        match oracle.block_hash(disq.item.block_height) {
            Ok(chain_hash) if chain_hash == disq.item.block_hash => {}
            _ => {
                warn!(%tx_hash, "ignore invalid disqualification2 transaction: invalid block_hash");
                return None;
            }
        }

        let depth = (bbl.block_height() - disq.item.block_height) as usize;
        if depth >= bbl.history_depth() {
            warn!(%tx_hash, "ignore invalid disqualification2 transaction: out of history");
            return None;
        }

        if disq.signers.len() < self.params.selection.required_disqual2_votes {
            warn!(%tx_hash, "ignore invalid disqualification2 transaction: lack of signers");
            return None;
        }

        let tiers = bbl.tiers(depth);
        let auth_indexes =
            select_auth_sample(&disq.item.payment_id, tiers, &self.params.selection);
        let auth_sample = resolve_ids(tiers, &auth_indexes);

        for id in &disq.item.ids {
            if !auth_sample.contains(id) {
                warn!(
                    %tx_hash,
                    disqualified_id = %id,
                    "ignore invalid disqualification2 transaction: disqualified id is not in the auth sample"
                );
                return None;
            }
        }

        for signer in &disq.signers {
            if !auth_sample.contains(&signer.signer_id) {
                warn!(
                    %tx_hash,
                    signer_id = %signer.signer_id,
                    "ignore invalid disqualification2 transaction: signer id is not in the auth sample"
                );
                return None;
            }
        }

        Some(disq)
    }

    /// Validates a candidate stake transaction. Returns the accepted stake, or `None` for
    /// transactions that carry no stake record or fail any check.
    fn process_stake_transaction(
        &self,
        oracle: &O,
        tx: &Transaction,
        tx_hash: TxHash,
        block_index: u64,
    ) -> Option<StakeTransaction> {
        let extra = get_stake_extra(tx)?;

        let supernode_key = match hex_to_pubkey(&extra.supernode_public_id) {
            Ok(key) if check_key(&key) => key,
            _ => {
                warn!(
                    block_index,
                    %tx_hash,
                    supernode_id = %extra.supernode_public_id,
                    "ignore stake transaction because of invalid supernode public identifier"
                );
                return None;
            }
        };

        let is_subaddress = false;
        let address_str = address_as_string(
            oracle.network(),
            is_subaddress,
            &extra.supernode_public_address,
        );
        let data = format!("{address_str}:{}", extra.supernode_public_id);
        let signing_hash = fast_hash(data.as_bytes());

        if !check_signature(&signing_hash, &supernode_key, &extra.supernode_signature) {
            warn!(
                block_index,
                %tx_hash,
                supernode_id = %extra.supernode_public_id,
                "ignore stake transaction because of invalid supernode signature (mismatch)"
            );
            return None;
        }

        // The unlock time is block-count-relative; an absolute-looking small value saturates to
        // zero and fails the minimum check instead of wrapping.
        let unlock_time = tx.unlock_time.saturating_sub(block_index);

        if unlock_time < self.params.stake.min_unlock_time {
            warn!(
                block_index,
                %tx_hash,
                supernode_id = %extra.supernode_public_id,
                unlock_time,
                minimum = self.params.stake.min_unlock_time,
                "ignore stake transaction because unlock time is less than minimum allowed"
            );
            return None;
        }

        if unlock_time > self.params.stake.max_unlock_time {
            warn!(
                block_index,
                %tx_hash,
                supernode_id = %extra.supernode_public_id,
                unlock_time,
                maximum = self.params.stake.max_unlock_time,
                "ignore stake transaction because unlock time is greater than maximum allowed"
            );
            return None;
        }

        let amount = crate::amount::transaction_amount(
            tx,
            &extra.supernode_public_address,
            &extra.tx_secret_key,
        );

        if amount == 0 {
            warn!(
                block_index,
                %tx_hash,
                supernode_id = %extra.supernode_public_id,
                "ignore stake transaction because of error at parsing amount"
            );
            return None;
        }

        Some(StakeTransaction {
            supernode_public_id: extra.supernode_public_id.clone(),
            supernode_public_address: extra.supernode_public_address,
            supernode_signature: extra.supernode_signature,
            tx_secret_key: extra.tx_secret_key,
            amount,
            block_height: block_index,
            unlock_time,
            hash: tx_hash,
        })
    }
}

fn storages_mut(
    inner: &mut Inner,
) -> (&mut StakeTransactionStorage, &mut BlockchainBasedList) {
    let Inner { storage, bbl, .. } = inner;
    (
        storage.as_mut().expect("storages initialized"),
        bbl.as_mut().expect("storages initialized"),
    )
}

/// Fires the stakes observer for `block_index`. The need-update flag is only cleared when the
/// handler returns normally; a panicking handler never poisons the processor state.
fn invoke_update_stakes_handler_impl(inner: &mut Inner, block_index: u64) {
    let Inner {
        storage,
        observers,
        stakes_need_update,
        ..
    } = inner;
    let Some(storage) = storage.as_mut() else {
        return;
    };
    let Some(handler) = observers.on_stakes_update.as_mut() else {
        return;
    };

    let stakes = storage.get_supernode_stakes(block_index);
    let disqualifications = storage.get_supernode_disqualifications(block_index);

    match catch_unwind(AssertUnwindSafe(|| {
        handler(block_index, &stakes, &disqualifications)
    })) {
        Ok(()) => *stakes_need_update = false,
        Err(_) => error!("panic in stake transactions update handler"),
    }
}

/// Fires the tier-lists observer for the newest `depth` snapshots, tip first. Same panic policy
/// as the stakes observer.
fn invoke_update_bbl_handler_impl(inner: &mut Inner, depth: usize) {
    let Inner {
        bbl,
        observers,
        bbl_need_update,
        ..
    } = inner;
    let Some(bbl) = bbl.as_ref() else {
        return;
    };
    let Some(handler) = observers.on_bbl_update.as_mut() else {
        return;
    };

    if bbl.history_depth() == 0 {
        return;
    }
    let depth = depth.min(bbl.history_depth());

    match catch_unwind(AssertUnwindSafe(|| {
        for i in 0..depth {
            let snapshot = bbl.snapshot(i);
            handler(snapshot.block_index, snapshot.block_hash, &snapshot.tiers);
        }
    })) {
        Ok(()) => *bbl_need_update = false,
        Err(_) => error!("panic in blockchain based list update handler"),
    }
}
