//! Typed transaction extra fields and their accessors.
//!
//! The extra field of a transaction carries the stake and disqualification records that stake
//! processing consumes. Decoding yields typed records; the `check_*` accessors additionally
//! verify the embedded signer signatures, which is the full codec-level contract for
//! disqualifications.

use serde::{Deserialize, Serialize};

use crate::{
    crypto::{check_signature, fast_hash},
    hashes::BlockHash,
    keys::{PublicAddress, SupernodeId, SupernodeSignature, TxSecretKey},
    tx::Transaction,
};

/// The stake announcement carried in a stake transaction's extra field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeExtra {
    /// Hex-encoded supernode public identifier.
    pub supernode_public_id: String,

    /// The supernode wallet address the stake is paid to.
    pub supernode_public_address: PublicAddress,

    /// Signature binding the address to the identifier.
    pub supernode_signature: SupernodeSignature,

    /// The transaction secret key, published so the network can decode the staked amount.
    pub tx_secret_key: TxSecretKey,
}

/// The disqualified-supernode statement of a v1 disqualification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisqualificationItem {
    /// Height of the tier-list snapshot the disqualification is evaluated against.
    pub block_height: u64,

    /// Hash of the block at that height.
    pub block_hash: BlockHash,

    /// The supernode being disqualified.
    pub id: SupernodeId,
}

/// One committee member's signature over a disqualification item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerItem {
    /// The signer's supernode identifier.
    pub signer_id: SupernodeId,

    /// The signer's signature over the item hash.
    pub signature: SupernodeSignature,
}

/// A complete v1 disqualification record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisqualificationExtra {
    /// The statement being signed.
    pub item: DisqualificationItem,

    /// The committee signatures.
    pub signers: Vec<SignerItem>,
}

/// The disqualified-supernodes statement of a v2 disqualification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disqualification2Item {
    /// The payment the auth sample was selected for; the selection seed.
    pub payment_id: String,

    /// Height of the tier-list snapshot the disqualification is evaluated against.
    pub block_height: u64,

    /// Hash of the block at that height.
    pub block_hash: BlockHash,

    /// The supernodes being disqualified.
    pub ids: Vec<SupernodeId>,
}

/// A complete v2 disqualification record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disqualification2Extra {
    /// The statement being signed.
    pub item: Disqualification2Item,

    /// The committee signatures.
    pub signers: Vec<SignerItem>,
}

/// A single typed extra field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtraField {
    /// A stake announcement.
    Stake(StakeExtra),

    /// A v1 disqualification.
    Disqualification(DisqualificationExtra),

    /// A v2 disqualification.
    Disqualification2(Disqualification2Extra),

    /// Arbitrary bytes the processor does not interpret.
    Nonce(Vec<u8>),
}

/// The hash a v1 disqualification's signers sign.
pub fn disqualification_item_hash(item: &DisqualificationItem) -> [u8; 32] {
    fast_hash(&bincode::serialize(item).expect("in-memory serialization"))
}

/// The hash a v2 disqualification's signers sign.
pub fn disqualification2_item_hash(item: &Disqualification2Item) -> [u8; 32] {
    fast_hash(&bincode::serialize(item).expect("in-memory serialization"))
}

/// Extracts the stake announcement from a transaction's extra field, if present.
pub fn get_stake_extra(tx: &Transaction) -> Option<&StakeExtra> {
    tx.extra.iter().find_map(|field| match field {
        ExtraField::Stake(stake) => Some(stake),
        _ => None,
    })
}

/// Extracts the v1 disqualification record from a transaction's extra field, without verifying
/// signatures.
pub fn get_disqualification(tx: &Transaction) -> Option<DisqualificationExtra> {
    tx.extra.iter().find_map(|field| match field {
        ExtraField::Disqualification(disq) => Some(disq.clone()),
        _ => None,
    })
}

/// Extracts the v1 disqualification record and verifies every signer's signature over the item
/// hash. Returns `None` when the record is absent or any signature fails.
pub fn check_disqualification(tx: &Transaction) -> Option<DisqualificationExtra> {
    let disq = get_disqualification(tx)?;
    let hash = disqualification_item_hash(&disq.item);
    disq.signers
        .iter()
        .all(|signer| check_signature(&hash, &signer.signer_id, &signer.signature))
        .then_some(disq)
}

/// Extracts the v2 disqualification record from a transaction's extra field, without verifying
/// signatures.
pub fn get_disqualification2(tx: &Transaction) -> Option<Disqualification2Extra> {
    tx.extra.iter().find_map(|field| match field {
        ExtraField::Disqualification2(disq) => Some(disq.clone()),
        _ => None,
    })
}

/// Extracts the v2 disqualification record and verifies every signer's signature over the item
/// hash. Returns `None` when the record is absent or any signature fails.
pub fn check_disqualification2(tx: &Transaction) -> Option<Disqualification2Extra> {
    let disq = get_disqualification2(tx)?;
    let hash = disqualification2_item_hash(&disq.item);
    disq.signers
        .iter()
        .all(|signer| check_signature(&hash, &signer.signer_id, &signer.signature))
        .then_some(disq)
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::{Signer, SigningKey};

    use super::*;

    fn signed_disqualification(tamper: bool) -> Transaction {
        let signer_key = SigningKey::from_bytes(&fast_hash(b"signer"));
        let item = DisqualificationItem {
            block_height: 10,
            block_hash: BlockHash([1; 32]),
            id: SupernodeId([2; 32]),
        };
        let mut hash = disqualification_item_hash(&item);
        if tamper {
            hash[0] ^= 1;
        }
        let extra = DisqualificationExtra {
            item,
            signers: vec![SignerItem {
                signer_id: SupernodeId(signer_key.verifying_key().to_bytes()),
                signature: SupernodeSignature(signer_key.sign(&hash).to_bytes()),
            }],
        };
        Transaction {
            version: 123,
            unlock_time: 0,
            extra: vec![ExtraField::Disqualification(extra)],
            vout: Vec::new(),
            rct: None,
        }
    }

    #[test]
    fn check_disqualification_accepts_valid_signers() {
        let tx = signed_disqualification(false);
        assert!(check_disqualification(&tx).is_some());
    }

    #[test]
    fn check_disqualification_rejects_bad_signature() {
        let tx = signed_disqualification(true);
        // The record still decodes, but the signature check fails.
        assert!(get_disqualification(&tx).is_some());
        assert!(check_disqualification(&tx).is_none());
    }

    #[test]
    fn stake_extra_lookup_skips_other_fields() {
        let stake = StakeExtra {
            supernode_public_id: "00".repeat(32),
            supernode_public_address: PublicAddress {
                view_public: [3; 32],
                spend_public: [4; 32],
            },
            supernode_signature: SupernodeSignature([0; 64]),
            tx_secret_key: TxSecretKey([5; 32]),
        };
        let tx = Transaction {
            version: 1,
            unlock_time: 0,
            extra: vec![
                ExtraField::Nonce(vec![1, 2, 3]),
                ExtraField::Stake(stake.clone()),
            ],
            vout: Vec::new(),
            rct: None,
        };
        assert_eq!(get_stake_extra(&tx), Some(&stake));
    }
}
