//! # Ed25519 Root Signer
//!
//! Implements the [`LogSigner`] port with Ed25519 and offers the matching
//! client-side check for signed log roots.
//!
//! ## Security Properties
//!
//! - Deterministic signatures (no RNG needed when signing)
//! - `SigningKey` wipes its secret on drop (ed25519-dalek `zeroize` feature)
//! - The seed handed to [`Ed25519LogSigner::from_seed`] is wiped after use

use crate::domain::entities::SignedLogRoot;
use crate::domain::errors::SignerError;
use crate::ports::outbound::LogSigner;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use zeroize::Zeroize;

/// Ed25519 public key length in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Ed25519 signature length in bytes.
pub const SIGNATURE_LEN: usize = 64;

pub struct Ed25519LogSigner {
    signing_key: SigningKey,
}

impl Ed25519LogSigner {
    /// Generate a random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut rand::thread_rng());
        Self { signing_key }
    }

    /// Create from a 32-byte secret seed.
    pub fn from_seed(mut seed: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&seed);
        seed.zeroize();
        Self { signing_key }
    }

    pub fn verifying_key(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.signing_key.verifying_key().to_bytes()
    }
}

impl LogSigner for Ed25519LogSigner {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SignerError> {
        Ok(self.signing_key.sign(message).to_bytes().to_vec())
    }

    fn public_key(&self) -> Vec<u8> {
        self.verifying_key().to_vec()
    }
}

/// Verify a raw Ed25519 signature.
pub fn verify_signature(
    public_key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<(), SignerError> {
    let key_bytes: [u8; PUBLIC_KEY_LEN] = public_key
        .try_into()
        .map_err(|_| SignerError::InvalidPublicKey)?;
    let verifying_key =
        VerifyingKey::from_bytes(&key_bytes).map_err(|_| SignerError::InvalidPublicKey)?;

    let sig_bytes: [u8; SIGNATURE_LEN] = signature
        .try_into()
        .map_err(|_| SignerError::InvalidSignature)?;
    let sig = Signature::from_bytes(&sig_bytes);

    verifying_key
        .verify(message, &sig)
        .map_err(|_| SignerError::VerificationFailed)
}

/// Check a signed log root against the log's public key.
pub fn verify_signed_root(public_key: &[u8], root: &SignedLogRoot) -> Result<(), SignerError> {
    verify_signature(public_key, &root.log_root_bytes(), &root.signature)
}
