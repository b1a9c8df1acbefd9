//! Network selection for the supernode sidechain.

use serde::{Deserialize, Serialize};

/// The network a node is running on.
///
/// Address strings embed the network prefix, so a stake signature produced for one network never
/// verifies on another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// The production network.
    Mainnet,
    /// The public test network.
    Testnet,
    /// The staging network used for pre-release testing.
    Stagenet,
}

impl Network {
    /// Returns the address prefix for this network.
    pub const fn address_prefix(&self) -> &'static str {
        match self {
            Network::Mainnet => "sn1",
            Network::Testnet => "snt",
            Network::Stagenet => "sns",
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
            Network::Stagenet => write!(f, "stagenet"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_prefixes_are_distinct() {
        let prefixes = [
            Network::Mainnet.address_prefix(),
            Network::Testnet.address_prefix(),
            Network::Stagenet.address_prefix(),
        ];
        for (i, a) in prefixes.iter().enumerate() {
            for b in prefixes.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
