//! Default values for the supernode stake processing parameters.
//!
//! These are network-wide constants: changing any of them changes which stakes count, which
//! supernodes land in which tier and which committees get selected, so they must be identical on
//! every node of a network.

/// Number of atomic units in one coin.
pub const COIN: u64 = 10_000_000_000;

/// The number of supernode tiers.
///
/// This value is baked into the shape of a tier array and must be known at compile time.
pub const TIERS: usize = 4;

/// Transaction version tag carrying a v1 disqualification.
pub const DISQUALIFICATION_TX_VERSION: u32 = 123;

/// Transaction version tag carrying a v2 disqualification.
pub const DISQUALIFICATION2_TX_VERSION: u32 = 124;

/// Number of blocks after the staking block before the stake starts counting.
pub(crate) const STAKE_VALIDATION_PERIOD: u64 = 6;

/// Number of blocks past the unlock time during which a supernode is trusted to restake.
pub(crate) const TRUSTED_RESTAKING_PERIOD: u64 = 1000;

/// Minimum accepted relative unlock time of a stake transaction, in blocks.
pub(crate) const STAKE_MIN_UNLOCK_TIME: u64 = 50;

/// Maximum accepted relative unlock time of a stake transaction, in blocks.
pub(crate) const STAKE_MAX_UNLOCK_TIME: u64 = 500_000;

/// Hard-fork version from which stake transactions are processed.
pub(crate) const STAKE_TRANSACTION_PROCESSING_DB_VERSION: u8 = 13;

/// Minimum stake, in atomic units, for each tier.
pub(crate) const TIER_STAKE_AMOUNTS: [u64; TIERS] =
    [50_000 * COIN, 90_000 * COIN, 150_000 * COIN, 250_000 * COIN];

/// Number of per-block tier snapshots kept in the blockchain-based list history.
pub(crate) const SUPERNODE_HISTORY_SIZE: usize = 1000;

/// Target size of the blockchain-based quorum set.
pub(crate) const BBQS_SIZE: usize = 8;

/// Target size of the quorum candidate list.
pub(crate) const QCL_SIZE: usize = 8;

/// Target size of the payment-authorisation sample.
pub(crate) const AUTH_SAMPLE_SIZE: usize = 8;

/// Minimum number of signers on a v1 disqualification.
pub(crate) const REQUIRED_BBQS_VOTES: usize = 6;

/// Minimum number of signers on a v2 disqualification.
pub(crate) const REQUIRED_DISQUAL2_VOTES: usize = 5;

/// Maximum number of blocks applied by a single synchronisation pass.
pub(crate) const MAX_ITERATIONS_COUNT: u64 = 10_000;

/// Block-index step at which sync progress is logged.
pub(crate) const SYNC_DEBUG_LOG_STEP: u64 = 10_000;

/// A checkpoint is voted on every this many blocks.
pub(crate) const CHECKPOINT_INTERVAL: u64 = 4;

/// Number of voters drawn from the tier lists into the checkpoint quorum.
pub(crate) const CHECKPOINT_QUORUM_SIZE: usize = 8;

/// Minimum number of quorum votes for a checkpoint to be considered signed.
pub(crate) const CHECKPOINT_MIN_VOTES: usize = 6;

/// Number of blocks a checkpoint vote stays relayable before it expires.
pub(crate) const CHECKPOINT_VOTE_LIFETIME: u64 = 60;
