//! The stake transaction processor: watches the canonical block stream, extracts staking and
//! disqualification activity, maintains the two persistent derived views of that activity and
//! republishes them to downstream observers when they change.
//!
//! The processor is a cooperative single actor: all long-running work happens inside
//! [`StakeTransactionProcessor::synchronise`], which an external driver is expected to call
//! periodically. No internal threads are spawned, and a single pass is bounded so every
//! invocation is finite.

mod amount;
pub mod checkpoint;
pub mod errors;
pub mod observers;
mod processor;

pub use errors::ProcessorError;
pub use observers::{BblUpdateHandler, StakesUpdateHandler};
pub use processor::{ProcessorParams, StakeTransactionProcessor};
