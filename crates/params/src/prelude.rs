//! Re-exports of the commonly used parameter types.

pub use crate::{
    checkpoint::CheckpointParams,
    default::{COIN, DISQUALIFICATION2_TX_VERSION, DISQUALIFICATION_TX_VERSION, TIERS},
    network::Network,
    selection::SelectionParams,
    stake::StakeParams,
    sync::SyncParams,
};
