//! Test fixtures for stake processing: a programmable in-memory chain oracle and builders for
//! cryptographically real stake and disqualification transactions.
//!
//! Everything here is deterministic: keys are derived from small integer seeds, and block hashes
//! from the chain shape plus an explicit salt, so reorg scenarios can be staged by rewriting the
//! chain with a different salt.

pub mod fixtures;
pub mod oracle;

pub use fixtures::{
    disqualification2_transaction, disqualification_transaction, stake_transaction, SupernodeKeys,
    Wallet,
};
pub use oracle::MockOracle;
