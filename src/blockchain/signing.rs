// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rampline

//! Payment-callback signing.
//!
//! The gateway contract accepts completion callbacks only when they carry a
//! signature from its registered gateway signer. This service acts as that
//! signer for its own gateway entry, so the adapter can self-sign callbacks.
//! The capability sits behind [`CallbackSigner`] so the local key can later
//! be replaced by a hardware-backed or multi-party signer without touching
//! the adapter's call sites.

use alloy::{
    primitives::{eip191_hash_message, keccak256, Address, B256},
    signers::{local::PrivateKeySigner, SignerSync},
};

/// Errors raised while producing a callback signature.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("Signing failed: {0}")]
    Signing(String),
}

/// Capability to sign payment completion callbacks.
pub trait CallbackSigner: Send + Sync {
    /// Sign the `(payment_id, status)` callback message.
    ///
    /// Returns the 65-byte `r ‖ s ‖ v` signature with `v` normalized to
    /// `{27, 28}` as the contract's `ecrecover` expects.
    fn sign_callback(&self, payment_id: &str, status: u8) -> Result<Vec<u8>, SigningError>;

    /// The signer's chain address (the gateway-signer identity).
    fn address(&self) -> Address;
}

/// Digest signed by the callback signer.
///
/// The contract packs the payment id bytes followed by the single status
/// byte, hashes them, and wraps the hash in the EIP-191 personal-message
/// envelope before recovery.
pub fn callback_digest(payment_id: &str, status: u8) -> B256 {
    let mut packed = Vec::with_capacity(payment_id.len() + 1);
    packed.extend_from_slice(payment_id.as_bytes());
    packed.push(status);
    let message_hash = keccak256(&packed);
    eip191_hash_message(message_hash)
}

/// Callback signer backed by the in-process service key.
pub struct LocalCallbackSigner {
    signer: PrivateKeySigner,
}

impl LocalCallbackSigner {
    /// Wrap the service signing key.
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }
}

impl CallbackSigner for LocalCallbackSigner {
    fn sign_callback(&self, payment_id: &str, status: u8) -> Result<Vec<u8>, SigningError> {
        let digest = callback_digest(payment_id, status);
        let signature = self
            .signer
            .sign_hash_sync(&digest)
            .map_err(|e| SigningError::Signing(e.to_string()))?;

        let mut bytes = Vec::with_capacity(65);
        bytes.extend_from_slice(&signature.r().to_be_bytes::<32>());
        bytes.extend_from_slice(&signature.s().to_be_bytes::<32>());
        bytes.push(if signature.v() { 28 } else { 27 });
        Ok(bytes)
    }

    fn address(&self) -> Address {
        self.signer.address()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Signature;

    // Well-known Anvil development key, never used against real funds.
    const TEST_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn test_signer() -> LocalCallbackSigner {
        let key_bytes = alloy::hex::decode(TEST_KEY).unwrap();
        LocalCallbackSigner::new(PrivateKeySigner::from_slice(&key_bytes).unwrap())
    }

    #[test]
    fn signature_is_sixty_five_bytes_with_legacy_v() {
        let signer = test_signer();
        let bytes = signer.sign_callback("ord-42", 1).expect("sign");
        assert_eq!(bytes.len(), 65);
        assert!(bytes[64] == 27 || bytes[64] == 28);
    }

    #[test]
    fn signature_recovers_the_service_address() {
        let signer = test_signer();
        let bytes = signer.sign_callback("ord-42", 1).expect("sign");

        let signature = Signature::from_raw(&bytes).expect("parse signature");
        let digest = callback_digest("ord-42", 1);
        let recovered = signature
            .recover_address_from_prehash(&digest)
            .expect("recover");
        assert_eq!(recovered, signer.address());
    }

    #[test]
    fn digest_depends_on_payment_id_and_status() {
        let base = callback_digest("ord-42", 1);
        assert_ne!(base, callback_digest("ord-43", 1));
        assert_ne!(base, callback_digest("ord-42", 2));
        // Deterministic for identical inputs.
        assert_eq!(base, callback_digest("ord-42", 1));
    }
}
