//! This crate contains the consensus-critical parameters that dictate how supernode stakes,
//! disqualifications and committees are derived from the canonical chain, in a way that ensures
//! that all nodes come to a consensus on the derived state.

pub mod checkpoint;
pub mod default;
pub mod network;
pub mod prelude;
pub mod selection;
pub mod stake;
pub mod sync;
