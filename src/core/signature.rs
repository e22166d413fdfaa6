//! Unlock capability for transaction inputs
//!
//! Ledger logic only talks to these traits, so the signature scheme can be swapped
//! without touching transaction construction or verification.

use crate::error::Result;
use crate::utils::ecdsa_p256_sha256_sign_verify;

/// Something that can authorise spending of outputs locked to its public key hash.
pub trait Signer {
    fn public_key(&self) -> &[u8];

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>>;
}

/// Checks a signature produced by the matching [`Signer`].
pub trait Verifier {
    fn verify(&self, public_key: &[u8], signature: &[u8], message: &[u8]) -> bool;
}

/// ECDSA over P-256 with SHA-256, fixed-width signatures.
#[derive(Debug, Clone, Copy, Default)]
pub struct EcdsaVerifier;

impl Verifier for EcdsaVerifier {
    fn verify(&self, public_key: &[u8], signature: &[u8], message: &[u8]) -> bool {
        ecdsa_p256_sha256_sign_verify(public_key, signature, message)
    }
}
