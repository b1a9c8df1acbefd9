//! The crypto interface consumed by stake processing: key validation, output-key derivation,
//! ECDH amount decoding, Pedersen commitment checks and signature verification.
//!
//! Identities and wallet keys live on the ed25519 curve; the implementation is backed by
//! `curve25519-dalek` / `ed25519-dalek`. All functions are pure and never touch I/O.

use std::sync::LazyLock;

use curve25519_dalek::{
    edwards::{CompressedEdwardsY, EdwardsPoint},
    scalar::Scalar,
};
use ed25519_dalek::{Signature, VerifyingKey};
use sha3::{Digest, Keccak256};
use thiserror::Error;

use crate::{
    keys::{SupernodeId, SupernodeSignature, TxSecretKey},
    tx::EcdhTuple,
};

/// Errors produced by the crypto interface.
///
/// Callers treat any of these as "invalid input" for the transaction under inspection; none of
/// them is fatal to a sync pass.
#[derive(Debug, Clone, Error)]
pub enum CryptoError {
    /// A hex-encoded key could not be decoded.
    #[error("invalid hex encoding of a key: {0}")]
    InvalidHex(#[from] crate::hashes::HashParseError),

    /// A compressed key did not decode to a valid curve point.
    #[error("key is not a valid curve point")]
    InvalidPoint,
}

/// The shared secret between a transaction key and a wallet's view key, as a compressed curve
/// point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyDerivation(pub [u8; 32]);

/// The secondary generator used for amount commitments.
///
/// `H` has no known discrete logarithm relation against the standard basepoint, which is what
/// makes `mask·G + amount·H` binding.
static COMMITMENT_GENERATOR: LazyLock<EdwardsPoint> = LazyLock::new(|| {
    let bytes =
        hex::decode("8b655970153799af2aeadc9ff1add0ea6c7251d54154cfa92c173a0dd39c1f94")
            .expect("valid hex");
    CompressedEdwardsY(bytes.try_into().expect("32 bytes"))
        .decompress()
        .expect("valid curve point")
});

/// Keccak-256, the fast hash used for record digests and signature challenges.
pub fn fast_hash(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// Hashes arbitrary bytes onto the scalar field.
pub fn hash_to_scalar(data: &[u8]) -> [u8; 32] {
    Scalar::from_bytes_mod_order(fast_hash(data)).to_bytes()
}

/// Decodes a hex-encoded supernode public identifier.
pub fn hex_to_pubkey(id: &str) -> Result<SupernodeId, CryptoError> {
    Ok(id.parse()?)
}

/// Returns true if the key decodes to a usable curve point.
pub fn check_key(id: &SupernodeId) -> bool {
    match CompressedEdwardsY(id.0).decompress() {
        Some(point) => !point.is_small_order(),
        None => false,
    }
}

/// Computes the shared key derivation `8·(r·V)` between the published transaction secret `r` and
/// a wallet view key `V`.
pub fn generate_key_derivation(
    view_public: &[u8; 32],
    tx_key: &TxSecretKey,
) -> Result<KeyDerivation, CryptoError> {
    let view_point = CompressedEdwardsY(*view_public)
        .decompress()
        .ok_or(CryptoError::InvalidPoint)?;
    let r = Scalar::from_bytes_mod_order(tx_key.0);
    let derivation = (r * view_point).mul_by_cofactor();
    Ok(KeyDerivation(derivation.compress().to_bytes()))
}

/// Hashes the derivation together with the output index onto the scalar field.
pub fn derivation_to_scalar(derivation: &KeyDerivation, output_index: u64) -> [u8; 32] {
    let mut data = [0u8; 40];
    data[..32].copy_from_slice(&derivation.0);
    data[32..].copy_from_slice(&output_index.to_le_bytes());
    hash_to_scalar(&data)
}

/// Derives the one-time output public key `H_s(D || n)·G + spend_public` for output `n`.
pub fn derive_public_key(
    derivation: &KeyDerivation,
    output_index: u64,
    spend_public: &[u8; 32],
) -> Result<[u8; 32], CryptoError> {
    let spend_point = CompressedEdwardsY(*spend_public)
        .decompress()
        .ok_or(CryptoError::InvalidPoint)?;
    let scalar = Scalar::from_bytes_mod_order(derivation_to_scalar(derivation, output_index));
    let point = EdwardsPoint::mul_base(&scalar) + spend_point;
    Ok(point.compress().to_bytes())
}

/// Unblinds an output's `(mask, amount)` pair with the shared scalar for that output.
pub fn ecdh_decode(ecdh: &EcdhTuple, shared_scalar: &[u8; 32]) -> ([u8; 32], [u8; 32]) {
    let sec1 = Scalar::from_bytes_mod_order(hash_to_scalar(shared_scalar));
    let sec2 = Scalar::from_bytes_mod_order(hash_to_scalar(&sec1.to_bytes()));
    let mask = Scalar::from_bytes_mod_order(ecdh.mask) - sec1;
    let amount = Scalar::from_bytes_mod_order(ecdh.amount) - sec2;
    (mask.to_bytes(), amount.to_bytes())
}

/// Blinds an output's `(mask, amount)` pair with the shared scalar for that output.
///
/// The inverse of [`ecdh_decode`]; senders use it when building commitment outputs.
pub fn ecdh_encode(mask: &[u8; 32], amount: &[u8; 32], shared_scalar: &[u8; 32]) -> EcdhTuple {
    let sec1 = Scalar::from_bytes_mod_order(hash_to_scalar(shared_scalar));
    let sec2 = Scalar::from_bytes_mod_order(hash_to_scalar(&sec1.to_bytes()));
    EcdhTuple {
        mask: (Scalar::from_bytes_mod_order(*mask) + sec1).to_bytes(),
        amount: (Scalar::from_bytes_mod_order(*amount) + sec2).to_bytes(),
    }
}

/// Computes the Pedersen commitment `mask·G + amount·H`.
pub fn commitment(mask: &[u8; 32], amount: &[u8; 32]) -> [u8; 32] {
    let x = Scalar::from_bytes_mod_order(*mask);
    let a = Scalar::from_bytes_mod_order(*amount);
    EdwardsPoint::vartime_double_scalar_mul_basepoint(&a, &COMMITMENT_GENERATOR, &x)
        .compress()
        .to_bytes()
}

/// Converts an atomic-unit amount to its scalar representation.
pub fn amount_to_scalar(amount: u64) -> [u8; 32] {
    Scalar::from(amount).to_bytes()
}

/// Reads an atomic-unit amount back out of its scalar representation.
pub fn scalar_to_amount(scalar: &[u8; 32]) -> u64 {
    u64::from_le_bytes(scalar[..8].try_into().expect("fixed split"))
}

/// Verifies an ed25519 signature over a 32-byte hash under a supernode identity key.
pub fn check_signature(hash: &[u8; 32], id: &SupernodeId, signature: &SupernodeSignature) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(&id.0) else {
        return false;
    };
    key.verify_strict(hash, &Signature::from_bytes(&signature.0))
        .is_ok()
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::{Signer, SigningKey};

    use super::*;

    fn scalar_pair(seed: u8) -> ([u8; 32], [u8; 32]) {
        let secret = Scalar::from_bytes_mod_order(fast_hash(&[seed]));
        let public = EdwardsPoint::mul_base(&secret).compress().to_bytes();
        (secret.to_bytes(), public)
    }

    #[test]
    fn derivation_is_symmetric() {
        // 8·(r·V) computed by the network must equal 8·(v·R) computed by the wallet.
        let (view_secret, view_public) = scalar_pair(1);
        let (tx_secret, tx_public) = scalar_pair(2);

        let network_side =
            generate_key_derivation(&view_public, &TxSecretKey(tx_secret)).unwrap();
        let wallet_side = generate_key_derivation(&tx_public, &TxSecretKey(view_secret)).unwrap();

        assert_eq!(network_side, wallet_side);
    }

    #[test]
    fn derived_output_key_matches_wallet_construction() {
        let (_, view_public) = scalar_pair(3);
        let (spend_secret, spend_public) = scalar_pair(4);
        let (tx_secret, _) = scalar_pair(5);

        let derivation = generate_key_derivation(&view_public, &TxSecretKey(tx_secret)).unwrap();
        let derived = derive_public_key(&derivation, 0, &spend_public).unwrap();

        // H_s(D || 0)·G + s·G == H_s(D || 0)·G + S
        let expected = (EdwardsPoint::mul_base(&Scalar::from_bytes_mod_order(
            derivation_to_scalar(&derivation, 0),
        )) + EdwardsPoint::mul_base(&Scalar::from_bytes_mod_order(spend_secret)))
        .compress()
        .to_bytes();
        assert_eq!(derived, expected);
    }

    #[test]
    fn ecdh_round_trip_and_commitment() {
        let shared = hash_to_scalar(b"shared");
        let mask = hash_to_scalar(b"mask");
        let amount = amount_to_scalar(123_456_789);

        let ecdh = ecdh_encode(&mask, &amount, &shared);
        let (mask_out, amount_out) = ecdh_decode(&ecdh, &shared);

        assert_eq!(mask, mask_out);
        assert_eq!(amount, amount_out);
        assert_eq!(scalar_to_amount(&amount_out), 123_456_789);
        assert_eq!(commitment(&mask, &amount), commitment(&mask_out, &amount_out));
    }

    #[test]
    fn commitment_binds_amount() {
        let mask = hash_to_scalar(b"mask");
        assert_ne!(
            commitment(&mask, &amount_to_scalar(1)),
            commitment(&mask, &amount_to_scalar(2)),
        );
    }

    #[test]
    fn signature_verification() {
        let signing_key = SigningKey::from_bytes(&fast_hash(b"supernode"));
        let id = SupernodeId(signing_key.verifying_key().to_bytes());
        let hash = fast_hash(b"message");

        let signature = SupernodeSignature(signing_key.sign(&hash).to_bytes());
        assert!(check_signature(&hash, &id, &signature));

        let other_hash = fast_hash(b"other message");
        assert!(!check_signature(&other_hash, &id, &signature));
    }

    #[test]
    fn check_key_rejects_garbage() {
        // All-0xff is not a valid compressed point encoding.
        assert!(!check_key(&SupernodeId([0xff; 32])));

        let signing_key = SigningKey::from_bytes(&fast_hash(b"valid"));
        assert!(check_key(&SupernodeId(signing_key.verifying_key().to_bytes())));
    }
}
