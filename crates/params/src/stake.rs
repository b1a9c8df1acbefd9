//! Parameters governing stake acceptance, validity windows and tier placement.

use serde::{Deserialize, Serialize};

use crate::default::{
    STAKE_MAX_UNLOCK_TIME, STAKE_MIN_UNLOCK_TIME, STAKE_TRANSACTION_PROCESSING_DB_VERSION,
    STAKE_VALIDATION_PERIOD, TIERS, TIER_STAKE_AMOUNTS, TRUSTED_RESTAKING_PERIOD,
};

/// The stake acceptance and validity parameters that are inherent to the protocol and do not need
/// to be interactively shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeParams {
    /// Number of blocks after the staking block before the stake starts counting.
    pub validation_period: u64,

    /// Number of blocks past the unlock time during which the stake still counts, trusting the
    /// supernode to restake.
    pub trusted_restaking_period: u64,

    /// Minimum accepted relative unlock time, in blocks.
    pub min_unlock_time: u64,

    /// Maximum accepted relative unlock time, in blocks.
    pub max_unlock_time: u64,

    /// Hard-fork version from which stake transactions are processed.
    pub processing_hf_version: u8,

    /// Minimum stake, in atomic units, for each tier.
    pub tier_stake_amounts: [u64; TIERS],
}

impl Default for StakeParams {
    fn default() -> Self {
        Self {
            validation_period: STAKE_VALIDATION_PERIOD,
            trusted_restaking_period: TRUSTED_RESTAKING_PERIOD,
            min_unlock_time: STAKE_MIN_UNLOCK_TIME,
            max_unlock_time: STAKE_MAX_UNLOCK_TIME,
            processing_hf_version: STAKE_TRANSACTION_PROCESSING_DB_VERSION,
            tier_stake_amounts: TIER_STAKE_AMOUNTS,
        }
    }
}

impl StakeParams {
    /// Returns the tier a stake of `amount` atomic units falls into, or `None` if the amount is
    /// below the lowest tier threshold.
    ///
    /// Tier 0 is the lowest tier.
    pub fn tier_for_amount(&self, amount: u64) -> Option<usize> {
        let mut tier = None;
        for (t, threshold) in self.tier_stake_amounts.iter().enumerate() {
            if amount >= *threshold {
                tier = Some(t);
            }
        }
        tier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::default::COIN;

    #[test]
    fn stake_params_serde() {
        let params = StakeParams::default();
        let serialized = toml::to_string(&params).unwrap();

        let deserialized: StakeParams = toml::from_str(&serialized).unwrap();

        assert_eq!(params, deserialized);
    }

    #[test]
    fn tier_for_amount_respects_thresholds() {
        let params = StakeParams::default();

        assert_eq!(params.tier_for_amount(0), None);
        assert_eq!(params.tier_for_amount(50_000 * COIN - 1), None);
        assert_eq!(params.tier_for_amount(50_000 * COIN), Some(0));
        assert_eq!(params.tier_for_amount(90_000 * COIN), Some(1));
        assert_eq!(params.tier_for_amount(150_000 * COIN), Some(2));
        assert_eq!(params.tier_for_amount(250_000 * COIN), Some(3));
        assert_eq!(params.tier_for_amount(u64::MAX), Some(3));
    }
}
