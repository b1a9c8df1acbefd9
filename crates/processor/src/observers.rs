//! The observer registry: the two update callbacks downstream consumers can register.
//!
//! Handlers are plain boxed closures held by the registry. They run under the processor's
//! storage lock and must not re-enter the processor; in particular a handler must not capture
//! the processor it is registered on, or the two would keep each other alive.

use supernode_primitives::{hashes::BlockHash, keys::SupernodeId, stake::SupernodeStake};

/// Callback fired when the supernode stakes changed: receives the block index the stakes were
/// computed at, the per-supernode aggregate stakes, and the supernodes disqualified at that
/// block.
pub type StakesUpdateHandler = Box<dyn FnMut(u64, &[SupernodeStake], &[SupernodeId]) + Send>;

/// Callback fired per emitted tier-list snapshot: receives the snapshot's block index, block
/// hash and tier lists.
pub type BblUpdateHandler =
    Box<dyn FnMut(u64, BlockHash, &supernode_primitives::stake::TierArray) + Send>;

/// The two observer slots.
#[derive(Default)]
pub(crate) struct ObserverRegistry {
    pub(crate) on_stakes_update: Option<StakesUpdateHandler>,
    pub(crate) on_bbl_update: Option<BblUpdateHandler>,
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("on_stakes_update", &self.on_stakes_update.is_some())
            .field("on_bbl_update", &self.on_bbl_update.is_some())
            .finish()
    }
}
