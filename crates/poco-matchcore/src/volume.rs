//! Consumed-volume bookkeeping.
//!
//! Orders are never stored; only the number of units consumed under each
//! order hash, and the hashes their signer registered in place of a
//! signature. `consumed(h) <= volume` always holds for every hash the book
//! has seen through [`VolumeBook::consume`] or [`VolumeBook::cancel`].

use std::collections::{HashMap, HashSet};

use poco_types::{OrderHash, PocoError, Result};

#[derive(Debug, Clone, Default)]
pub struct VolumeBook {
    consumed: HashMap<OrderHash, u64>,
    presigned: HashSet<OrderHash>,
}

impl VolumeBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Units of `hash` already consumed.
    #[must_use]
    pub fn consumed(&self, hash: &OrderHash) -> u64 {
        self.consumed.get(hash).copied().unwrap_or(0)
    }

    /// Units left on an order of declared `volume`.
    #[must_use]
    pub fn remaining(&self, hash: &OrderHash, volume: u64) -> u64 {
        volume.saturating_sub(self.consumed(hash))
    }

    /// Consume `amount` units of an order of declared `volume`.
    ///
    /// # Errors
    /// `OrderExhausted` if fewer than `amount` units remain.
    pub fn consume(&mut self, hash: OrderHash, amount: u64, volume: u64) -> Result<()> {
        if self.remaining(&hash, volume) < amount {
            return Err(PocoError::OrderExhausted(hash));
        }
        *self.consumed.entry(hash).or_insert(0) += amount;
        Ok(())
    }

    /// Mark the order fully consumed.
    pub fn cancel(&mut self, hash: OrderHash, volume: u64) {
        let entry = self.consumed.entry(hash).or_insert(0);
        *entry = (*entry).max(volume);
    }

    /// Accept `hash` without a signature from now on.
    pub fn presign(&mut self, hash: OrderHash) {
        self.presigned.insert(hash);
    }

    #[must_use]
    pub fn is_presigned(&self, hash: &OrderHash) -> bool {
        self.presigned.contains(hash)
    }
}
