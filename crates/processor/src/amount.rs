//! Decoding of the amount a transaction pays to a supernode wallet address.

use supernode_primitives::{
    crypto::{
        commitment, derivation_to_scalar, derive_public_key, ecdh_decode,
        generate_key_derivation, scalar_to_amount,
    },
    keys::{PublicAddress, TxSecretKey},
    tx::{OutputTarget, Transaction},
};
use tracing::warn;

/// Sums the outputs of `tx` that pay to `address`, using the published transaction secret key to
/// claim them.
///
/// For pre-commitment transactions the plaintext output amount is used. For commitment
/// transactions the `(mask, amount)` pair is unblinded and only counted if the reconstructed
/// commitment matches the published one. Any crypto failure contributes zero; it never aborts
/// the transaction.
pub(crate) fn transaction_amount(
    tx: &Transaction,
    address: &PublicAddress,
    tx_key: &TxSecretKey,
) -> u64 {
    let derivation = match generate_key_derivation(&address.view_public, tx_key) {
        Ok(derivation) => derivation,
        Err(e) => {
            warn!("failed to generate key derivation from supplied parameters: {e}");
            return 0;
        }
    };

    let mut received: u64 = 0;

    for (n, out) in tx.vout.iter().enumerate() {
        let OutputTarget::Key { key } = &out.target else {
            continue;
        };
        let n = n as u64;

        let derived = match derive_public_key(&derivation, n, &address.spend_public) {
            Ok(derived) => derived,
            Err(e) => {
                warn!(output = n, "failed to derive output key: {e}");
                continue;
            }
        };
        if derived != *key {
            continue;
        }

        let contribution = match &tx.rct {
            // Pre-commitment transaction: the plaintext amount is authoritative.
            None => out.amount,
            Some(rct) => {
                let (Some(ecdh), Some(out_pk)) =
                    (rct.ecdh_info.get(n as usize), rct.out_pk.get(n as usize))
                else {
                    warn!(output = n, "commitment data missing for owned output");
                    continue;
                };
                let shared = derivation_to_scalar(&derivation, n);
                let (mask, amount) = ecdh_decode(ecdh, &shared);
                if commitment(&mask, &amount) == *out_pk {
                    scalar_to_amount(&amount)
                } else {
                    0
                }
            }
        };

        received = received.saturating_add(contribution);
    }

    received
}

#[cfg(test)]
mod tests {
    use supernode_primitives::{
        crypto::{amount_to_scalar, ecdh_encode, hash_to_scalar},
        tx::{RctSignatures, TxOut},
    };
    use supernode_test_utils::Wallet;

    use super::*;

    fn tx_key(seed: u8) -> TxSecretKey {
        TxSecretKey(hash_to_scalar(&[b"tx key".as_slice(), &[seed]].concat()))
    }

    fn owned_output_key(wallet: &Wallet, tx_key: &TxSecretKey, n: u64) -> [u8; 32] {
        let derivation = generate_key_derivation(&wallet.address.view_public, tx_key).unwrap();
        derive_public_key(&derivation, n, &wallet.address.spend_public).unwrap()
    }

    fn plain_tx(vout: Vec<TxOut>) -> Transaction {
        Transaction {
            version: 1,
            unlock_time: 0,
            extra: Vec::new(),
            vout,
            rct: None,
        }
    }

    #[test]
    fn plaintext_amounts_sum_over_owned_outputs() {
        let wallet = Wallet::deterministic(1);
        let other = Wallet::deterministic(2);
        let key = tx_key(1);

        let tx = plain_tx(vec![
            TxOut {
                amount: 700,
                target: OutputTarget::Key {
                    key: owned_output_key(&wallet, &key, 0),
                },
            },
            TxOut {
                amount: 999,
                target: OutputTarget::Key {
                    key: owned_output_key(&other, &key, 1),
                },
            },
            TxOut {
                amount: 300,
                target: OutputTarget::Key {
                    key: owned_output_key(&wallet, &key, 2),
                },
            },
            // Data outputs are never owned.
            TxOut {
                amount: 123,
                target: OutputTarget::Data {
                    bytes: b"memo".to_vec(),
                },
            },
        ]);

        assert_eq!(transaction_amount(&tx, &wallet.address, &key), 1000);
    }

    #[test]
    fn commitment_amount_decodes_and_verifies() {
        let wallet = Wallet::deterministic(3);
        let key = tx_key(3);
        let derivation = generate_key_derivation(&wallet.address.view_public, &key).unwrap();

        let amount = 42_000u64;
        let mask = hash_to_scalar(b"test mask");
        let shared = derivation_to_scalar(&derivation, 0);

        let tx = Transaction {
            version: 2,
            unlock_time: 0,
            extra: Vec::new(),
            vout: vec![TxOut {
                amount: 0,
                target: OutputTarget::Key {
                    key: owned_output_key(&wallet, &key, 0),
                },
            }],
            rct: Some(RctSignatures {
                ecdh_info: vec![ecdh_encode(&mask, &amount_to_scalar(amount), &shared)],
                out_pk: vec![commitment(&mask, &amount_to_scalar(amount))],
            }),
        };

        assert_eq!(transaction_amount(&tx, &wallet.address, &key), amount);
    }

    #[test]
    fn mismatched_commitment_contributes_zero() {
        let wallet = Wallet::deterministic(4);
        let key = tx_key(4);
        let derivation = generate_key_derivation(&wallet.address.view_public, &key).unwrap();

        let mask = hash_to_scalar(b"mask");
        let shared = derivation_to_scalar(&derivation, 0);

        let tx = Transaction {
            version: 2,
            unlock_time: 0,
            extra: Vec::new(),
            vout: vec![TxOut {
                amount: 0,
                target: OutputTarget::Key {
                    key: owned_output_key(&wallet, &key, 0),
                },
            }],
            rct: Some(RctSignatures {
                ecdh_info: vec![ecdh_encode(&mask, &amount_to_scalar(42), &shared)],
                // Commitment to a different amount than the one in the tuple.
                out_pk: vec![commitment(&mask, &amount_to_scalar(43))],
            }),
        };

        assert_eq!(transaction_amount(&tx, &wallet.address, &key), 0);
    }

    #[test]
    fn foreign_outputs_are_ignored() {
        let wallet = Wallet::deterministic(5);
        let other = Wallet::deterministic(6);
        let key = tx_key(5);

        let tx = plain_tx(vec![TxOut {
            amount: 500,
            target: OutputTarget::Key {
                key: owned_output_key(&other, &key, 0),
            },
        }]);

        assert_eq!(transaction_amount(&tx, &wallet.address, &key), 0);
    }
}
