//! Parameters governing committee selection and disqualification quorums.

use serde::{Deserialize, Serialize};

use crate::default::{
    AUTH_SAMPLE_SIZE, BBQS_SIZE, QCL_SIZE, REQUIRED_BBQS_VOTES, REQUIRED_DISQUAL2_VOTES,
};

/// Committee sizes and vote thresholds.
///
/// The selection itself is seeded by a block hash or payment id; these parameters only bound how
/// many members are drawn and how many of them must sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionParams {
    /// Target size of the blockchain-based quorum set (the signers of v1 disqualifications).
    pub bbqs_size: usize,

    /// Target size of the quorum candidate list (the supernodes a v1 disqualification may
    /// target).
    pub qcl_size: usize,

    /// Target size of the payment-authorisation sample (both targets and signers of v2
    /// disqualifications).
    pub auth_sample_size: usize,

    /// Minimum number of signers on a v1 disqualification.
    pub required_bbqs_votes: usize,

    /// Minimum number of signers on a v2 disqualification.
    pub required_disqual2_votes: usize,
}

impl Default for SelectionParams {
    fn default() -> Self {
        Self {
            bbqs_size: BBQS_SIZE,
            qcl_size: QCL_SIZE,
            auth_sample_size: AUTH_SAMPLE_SIZE,
            required_bbqs_votes: REQUIRED_BBQS_VOTES,
            required_disqual2_votes: REQUIRED_DISQUAL2_VOTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_params_serde() {
        let params = SelectionParams::default();
        let serialized = toml::to_string(&params).unwrap();

        let deserialized: SelectionParams = toml::from_str(&serialized).unwrap();

        assert_eq!(params, deserialized);
    }

    #[test]
    fn vote_thresholds_fit_committees() {
        let params = SelectionParams::default();
        assert!(params.required_bbqs_votes <= params.bbqs_size);
        assert!(params.required_disqual2_votes <= params.auth_sample_size);
    }
}
