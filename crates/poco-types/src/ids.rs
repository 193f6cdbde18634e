//! Identifiers used throughout PoCo.
//!
//! Every identifier is 32 bytes. Accounts are raw ed25519 public keys;
//! order hashes, deal ids and task ids are SHA-256 digests over versioned,
//! domain-separated payloads so that every node derives the same id for the
//! same input.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// An account on the marketplace (requester, scheduler, worker, asset owner,
/// enclave, or a reserved protocol account).
///
/// This is the raw ed25519 verifying key (32 bytes), so a signature by an
/// address can be checked without any lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Address(pub [u8; 32]);

impl Address {
    /// The all-zero address. Used in signed payloads to encode "none".
    pub const ZERO: Self = Self([0u8; 32]);

    #[must_use]
    pub fn from_pubkey(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Deterministic address for a reserved protocol account (escrow, kitty).
    ///
    /// Nobody holds a signing key for these, they only move funds through
    /// ledger operations.
    #[must_use]
    pub fn reserved(label: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"poco:reserved_address:v1:");
        hasher.update(label.as_bytes());
        Self(hasher.finalize().into())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0[..8]))
    }
}

/// Encode an optional address as 32 bytes for signing payloads.
#[must_use]
pub fn address_or_zero(address: Option<&Address>) -> [u8; 32] {
    address.map_or([0u8; 32], |a| a.0)
}

// ---------------------------------------------------------------------------
// 32-byte digests
// ---------------------------------------------------------------------------

macro_rules! digest_newtype {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            pub const ZERO: Self = Self([0u8; 32]);

            #[must_use]
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            #[must_use]
            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; 32]
            }

            #[must_use]
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), hex::encode(&self.0[..8]))
            }
        }
    };
}

digest_newtype!(
    /// Generic 32-byte value: result hashes, result seals, result digests.
    Bytes32,
    "0x"
);

digest_newtype!(
    /// Canonical hash of a signed order (see [`crate::SignedOrder::hash`]).
    OrderHash,
    "order:"
);

digest_newtype!(
    /// Identifier of a deal.
    DealId,
    "deal:"
);

digest_newtype!(
    /// Identifier of a task: `H(deal_id, task_index)`.
    TaskId,
    "task:"
);

impl DealId {
    /// Deterministic deal id from the request order's hash and the number of
    /// units of that request already consumed before this match.
    ///
    /// Matching the same signed request order again (while it has volume
    /// left) therefore always produces a fresh id.
    #[must_use]
    pub fn derive(request_hash: &OrderHash, consumed_before: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"poco:deal_id:v1:");
        hasher.update(request_hash.0);
        hasher.update(consumed_before.to_le_bytes());
        Self(hasher.finalize().into())
    }
}

impl TaskId {
    /// Deterministic task id from its deal and index within the deal.
    #[must_use]
    pub fn derive(deal_id: &DealId, index: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"poco:task_id:v1:");
        hasher.update(deal_id.0);
        hasher.update(index.to_le_bytes());
        Self(hasher.finalize().into())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
