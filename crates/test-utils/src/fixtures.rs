//! Deterministic key material and transaction builders.

use curve25519_dalek::{edwards::EdwardsPoint, scalar::Scalar};
use ed25519_dalek::{Signer, SigningKey};
use supernode_params::{
    default::{DISQUALIFICATION2_TX_VERSION, DISQUALIFICATION_TX_VERSION},
    network::Network,
};
use supernode_primitives::{
    crypto::{
        amount_to_scalar, commitment, derivation_to_scalar, derive_public_key, ecdh_encode,
        fast_hash, generate_key_derivation, hash_to_scalar,
    },
    keys::{address_as_string, PublicAddress, SupernodeId, SupernodeSignature, TxSecretKey},
    tx::{EcdhTuple, OutputTarget, RctSignatures, Transaction, TxOut},
    tx_extra::{
        disqualification2_item_hash, disqualification_item_hash, Disqualification2Extra,
        Disqualification2Item, DisqualificationExtra, DisqualificationItem, ExtraField,
        SignerItem, StakeExtra,
    },
};

/// A supernode identity keypair.
pub struct SupernodeKeys {
    signing: SigningKey,
}

impl SupernodeKeys {
    /// Derives a keypair from a small integer seed. The same seed always yields the same keys.
    pub fn deterministic(seed: u64) -> Self {
        let mut data = *b"supernode-keys--________";
        data[16..].copy_from_slice(&seed.to_le_bytes());
        Self {
            signing: SigningKey::from_bytes(&fast_hash(&data)),
        }
    }

    /// The identity key.
    pub fn id(&self) -> SupernodeId {
        SupernodeId(self.signing.verifying_key().to_bytes())
    }

    /// The identity key in the hex form records carry.
    pub fn id_hex(&self) -> String {
        self.id().to_string()
    }

    /// Signs a 32-byte hash with the identity key.
    pub fn sign_hash(&self, hash: &[u8; 32]) -> SupernodeSignature {
        SupernodeSignature(self.signing.sign(hash).to_bytes())
    }
}

/// A stake wallet: view/spend secrets and the matching public address.
pub struct Wallet {
    /// The view secret scalar.
    pub view_secret: [u8; 32],

    /// The spend secret scalar.
    pub spend_secret: [u8; 32],

    /// The public address.
    pub address: PublicAddress,
}

impl Wallet {
    /// Derives a wallet from a small integer seed. The same seed always yields the same wallet.
    pub fn deterministic(seed: u64) -> Self {
        let mut data = *b"stake-wallet----________";
        data[16..].copy_from_slice(&seed.to_le_bytes());

        let view = Scalar::from_bytes_mod_order(fast_hash(&[&data[..], b"view"].concat()));
        let spend = Scalar::from_bytes_mod_order(fast_hash(&[&data[..], b"spend"].concat()));

        Self {
            view_secret: view.to_bytes(),
            spend_secret: spend.to_bytes(),
            address: PublicAddress {
                view_public: EdwardsPoint::mul_base(&view).compress().to_bytes(),
                spend_public: EdwardsPoint::mul_base(&spend).compress().to_bytes(),
            },
        }
    }
}

/// Builds a stake transaction paying `amount` to `wallet`, announced for `supernode` and signed
/// with its identity key.
///
/// With `use_commitments` the amount is hidden behind an ECDH tuple and a Pedersen commitment,
/// the way post-hard-fork transactions carry it; otherwise it is a plaintext output.
pub fn stake_transaction(
    network: Network,
    supernode: &SupernodeKeys,
    wallet: &Wallet,
    amount: u64,
    unlock_time: u64,
    use_commitments: bool,
) -> Transaction {
    // The tx key is derived from the inputs so repeated builds yield the same transaction.
    let tx_key = TxSecretKey(hash_to_scalar(
        &[
            supernode.id().as_bytes().as_slice(),
            &wallet.address.view_public,
            &amount.to_le_bytes(),
            &unlock_time.to_le_bytes(),
        ]
        .concat(),
    ));

    let derivation = generate_key_derivation(&wallet.address.view_public, &tx_key)
        .expect("wallet view key is a valid point");
    let output_key =
        derive_public_key(&derivation, 0, &wallet.address.spend_public).expect("valid spend key");

    let id_hex = supernode.id_hex();
    let address_str = address_as_string(network, false, &wallet.address);
    let signing_hash = fast_hash(format!("{address_str}:{id_hex}").as_bytes());

    let extra = ExtraField::Stake(StakeExtra {
        supernode_public_id: id_hex,
        supernode_public_address: wallet.address,
        supernode_signature: supernode.sign_hash(&signing_hash),
        tx_secret_key: tx_key,
    });

    let (version, vout, rct) = if use_commitments {
        let mask = hash_to_scalar(&[b"mask".as_slice(), &tx_key.0].concat());
        let shared = derivation_to_scalar(&derivation, 0);
        let ecdh: EcdhTuple = ecdh_encode(&mask, &amount_to_scalar(amount), &shared);
        (
            2,
            vec![TxOut {
                amount: 0,
                target: OutputTarget::Key { key: output_key },
            }],
            Some(RctSignatures {
                ecdh_info: vec![ecdh],
                out_pk: vec![commitment(&mask, &amount_to_scalar(amount))],
            }),
        )
    } else {
        (
            1,
            vec![TxOut {
                amount,
                target: OutputTarget::Key { key: output_key },
            }],
            None,
        )
    };

    Transaction {
        version,
        unlock_time,
        extra: vec![extra],
        vout,
        rct,
    }
}

/// Builds a v1 disqualification transaction with `item` signed by every key in `signers`.
pub fn disqualification_transaction(
    item: DisqualificationItem,
    signers: &[&SupernodeKeys],
) -> Transaction {
    let hash = disqualification_item_hash(&item);
    let signers = signers
        .iter()
        .map(|keys| SignerItem {
            signer_id: keys.id(),
            signature: keys.sign_hash(&hash),
        })
        .collect();

    Transaction {
        version: DISQUALIFICATION_TX_VERSION,
        unlock_time: 0,
        extra: vec![ExtraField::Disqualification(DisqualificationExtra {
            item,
            signers,
        })],
        vout: Vec::new(),
        rct: None,
    }
}

/// Builds a v2 disqualification transaction with `item` signed by every key in `signers`.
pub fn disqualification2_transaction(
    item: Disqualification2Item,
    signers: &[&SupernodeKeys],
) -> Transaction {
    let hash = disqualification2_item_hash(&item);
    let signers = signers
        .iter()
        .map(|keys| SignerItem {
            signer_id: keys.id(),
            signature: keys.sign_hash(&hash),
        })
        .collect();

    Transaction {
        version: DISQUALIFICATION2_TX_VERSION,
        unlock_time: 0,
        extra: vec![ExtraField::Disqualification2(Disqualification2Extra {
            item,
            signers,
        })],
        vout: Vec::new(),
        rct: None,
    }
}
