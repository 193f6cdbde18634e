//! Canonical hashing and ed25519 signatures.
//!
//! ## Commit / reveal
//!
//! A worker computes a `digest` of its off-platform result and commits to
//! two values:
//!
//! ```text
//! result_hash = H("poco:result_hash:v1:" || task_id || digest)
//! result_seal = H("poco:result_seal:v1:" || worker || task_id || digest)
//! ```
//!
//! The hash is what workers vote on. The seal binds the vote to the worker:
//! copying another worker's `result_hash` is useless without the digest, and
//! the digest is only published at reveal time, after consensus.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::{Address, Bytes32, PocoError, Result, TaskId, address_or_zero};

/// Commitment of a result digest to a task.
#[must_use]
pub fn result_hash(task_id: &TaskId, digest: &Bytes32) -> Bytes32 {
    let mut hasher = Sha256::new();
    hasher.update(b"poco:result_hash:v1:");
    hasher.update(task_id.0);
    hasher.update(digest.0);
    Bytes32(hasher.finalize().into())
}

/// Worker-bound commitment of a result digest to a task.
#[must_use]
pub fn result_seal(worker: &Address, task_id: &TaskId, digest: &Bytes32) -> Bytes32 {
    let mut hasher = Sha256::new();
    hasher.update(b"poco:result_seal:v1:");
    hasher.update(worker.0);
    hasher.update(task_id.0);
    hasher.update(digest.0);
    Bytes32(hasher.finalize().into())
}

/// Digest of an arbitrary results payload.
#[must_use]
pub fn results_digest(results: &[u8]) -> Bytes32 {
    let mut hasher = Sha256::new();
    hasher.update(b"poco:results:v1:");
    hasher.update(results);
    Bytes32(hasher.finalize().into())
}

/// Message a scheduler signs to let `worker` contribute to `task_id`
/// (optionally through `enclave`).
///
/// Format: `"poco:authorization:v1:" || worker || task_id || enclave_or_zero`
#[must_use]
pub fn authorization_payload(
    worker: &Address,
    task_id: &TaskId,
    enclave: Option<&Address>,
) -> Vec<u8> {
    let mut payload = Vec::with_capacity(22 + 96);
    payload.extend_from_slice(b"poco:authorization:v1:");
    payload.extend_from_slice(&worker.0);
    payload.extend_from_slice(&task_id.0);
    payload.extend_from_slice(&address_or_zero(enclave));
    payload
}

/// Message an enclave signs to attest a contribution.
///
/// Format: `"poco:attestation:v1:" || result_hash || result_seal`
#[must_use]
pub fn attestation_payload(result_hash: &Bytes32, result_seal: &Bytes32) -> Vec<u8> {
    let mut payload = Vec::with_capacity(20 + 64);
    payload.extend_from_slice(b"poco:attestation:v1:");
    payload.extend_from_slice(&result_hash.0);
    payload.extend_from_slice(&result_seal.0);
    payload
}

/// Verify an ed25519 `signature` by `signer` over `message`.
///
/// `what` names the signed object in the error.
///
/// # Errors
/// Returns [`PocoError::InvalidSignature`] if the key or signature is
/// malformed or the signature doesn't verify.
pub fn verify_signature(
    signer: &Address,
    message: &[u8],
    signature: &[u8],
    what: &'static str,
) -> Result<()> {
    let key = VerifyingKey::from_bytes(&signer.0)
        .map_err(|_| PocoError::InvalidSignature { what })?;
    let signature =
        Signature::from_slice(signature).map_err(|_| PocoError::InvalidSignature { what })?;
    key.verify(message, &signature)
        .map_err(|_| PocoError::InvalidSignature { what })
}

/// Sign `message` and return the 64 signature bytes.
#[must_use]
pub fn sign(key: &SigningKey, message: &[u8]) -> Vec<u8> {
    key.sign(message).to_bytes().to_vec()
}

/// The address controlled by `key`.
#[must_use]
pub fn address_of(key: &SigningKey) -> Address {
    Address(key.verifying_key().to_bytes())
}

/// Deterministic signer for tests. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
#[derive(Debug, Clone)]
pub struct TestSigner {
    key: SigningKey,
}

#[cfg(any(test, feature = "test-helpers"))]
impl TestSigner {
    /// Derive a key from a one-byte seed so tests can name their actors.
    #[must_use]
    pub fn from_seed(seed: u8) -> Self {
        let mut secret = [seed; 32];
        secret[0] = 0xA5;
        Self {
            key: SigningKey::from_bytes(&secret),
        }
    }

    #[must_use]
    pub fn key(&self) -> &SigningKey {
        &self.key
    }

    #[must_use]
    pub fn address(&self) -> Address {
        address_of(&self.key)
    }

    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        sign(&self.key, message)
    }
}
