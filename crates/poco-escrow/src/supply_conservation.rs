//! Supply conservation invariant checker.
//!
//! Invariant enforced after every operation:
//! ```text
//! Σ(available + locked) == Σ(deposits) - Σ(withdrawals)
//! ```
//!
//! Seizes, rewards, locks and unlocks only move funds between accounts, so
//! any drift means a bookkeeping bug.

use poco_types::{Amount, PocoError, Result};

/// Running totals of funds entering and leaving the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupplyConservation {
    deposits: u128,
    withdrawals: u128,
}

impl SupplyConservation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_deposit(&mut self, amount: Amount) {
        self.deposits += u128::from(amount);
    }

    pub fn record_withdrawal(&mut self, amount: Amount) {
        self.withdrawals += u128::from(amount);
    }

    /// Expected total supply: deposits - withdrawals.
    #[must_use]
    pub fn expected_supply(&self) -> u128 {
        self.deposits.saturating_sub(self.withdrawals)
    }

    /// Verify that the actual supply matches the expected supply.
    ///
    /// # Errors
    /// Returns [`PocoError::SupplyInvariantViolation`] if actual ≠ expected.
    pub fn verify(&self, actual_supply: u128) -> Result<()> {
        let expected = self.expected_supply();
        if actual_supply != expected {
            return Err(PocoError::SupplyInvariantViolation {
                reason: format!(
                    "actual supply {actual_supply} != expected {expected} \
                     (deposits={}, withdrawals={})",
                    self.deposits, self.withdrawals
                ),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn total_deposits(&self) -> u128 {
        self.deposits
    }

    #[must_use]
    pub fn total_withdrawals(&self) -> u128 {
        self.withdrawals
    }
}
