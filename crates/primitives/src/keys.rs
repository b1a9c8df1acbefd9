//! Key and signature types for supernode identities and stake wallets.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use supernode_params::network::Network;

use crate::hashes::HashParseError;

/// A supernode identity: a compressed ed25519 public key, hex-encoded wherever it appears in
/// records.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SupernodeId(pub [u8; 32]);

impl SupernodeId {
    /// Returns the raw bytes of the key.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for SupernodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for SupernodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SupernodeId({self})")
    }
}

impl FromStr for SupernodeId {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        let len = bytes.len();
        bytes
            .try_into()
            .map(SupernodeId)
            .map_err(|_| HashParseError::InvalidLength(len))
    }
}

/// An ed25519 signature produced by a supernode key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SupernodeSignature(pub [u8; 64]);

impl fmt::Debug for SupernodeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SupernodeSignature({})", hex::encode(self.0))
    }
}

// serde does not derive for 64-byte arrays, so the signature round-trips through its (R, s)
// halves.
impl Serialize for SupernodeSignature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let r: [u8; 32] = self.0[..32].try_into().expect("fixed split");
        let s: [u8; 32] = self.0[32..].try_into().expect("fixed split");
        (r, s).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SupernodeSignature {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (r, s) = <([u8; 32], [u8; 32])>::deserialize(deserializer)?;
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&r);
        bytes[32..].copy_from_slice(&s);
        Ok(SupernodeSignature(bytes))
    }
}

/// The secret scalar of a stake transaction, published in the transaction extra so that the
/// network can decode the amount paid to the supernode address.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxSecretKey(pub [u8; 32]);

impl fmt::Debug for TxSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The tx key is public by publication but is still not worth dumping in logs.
        f.write_str("TxSecretKey(..)")
    }
}

/// A stake wallet address: a pair of public view and spend keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicAddress {
    /// The public view key.
    pub view_public: [u8; 32],

    /// The public spend key.
    pub spend_public: [u8; 32],
}

/// Renders an address the way it is signed over in stake transactions: the network prefix
/// followed by the hex of the view and spend keys.
pub fn address_as_string(network: Network, is_subaddress: bool, address: &PublicAddress) -> String {
    let infix = if is_subaddress { "sub" } else { "" };
    format!(
        "{}{}{}{}",
        network.address_prefix(),
        infix,
        hex::encode(address.view_public),
        hex::encode(address.spend_public),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supernode_id_hex_round_trip() {
        let id = SupernodeId([7; 32]);
        assert_eq!(id.to_string().parse::<SupernodeId>().unwrap(), id);
    }

    #[test]
    fn signature_serde_round_trip() {
        let mut bytes = [0u8; 64];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        let sig = SupernodeSignature(bytes);
        let encoded = bincode::serialize(&sig).unwrap();
        let decoded: SupernodeSignature = bincode::deserialize(&encoded).unwrap();
        assert_eq!(sig, decoded);
    }

    #[test]
    fn address_string_embeds_network() {
        let addr = PublicAddress {
            view_public: [1; 32],
            spend_public: [2; 32],
        };
        let mainnet = address_as_string(Network::Mainnet, false, &addr);
        let testnet = address_as_string(Network::Testnet, false, &addr);
        assert_ne!(mainnet, testnet);
        assert!(mainnet.starts_with(Network::Mainnet.address_prefix()));
    }
}
