//! Balance tracking types for the PoCo escrow model.
//!
//! Every account has an `available` balance (withdrawable, usable to fund
//! deals and stakes) and a `locked` balance (reserved by deals and stakes
//! awaiting a task outcome).

use serde::{Deserialize, Serialize};

use crate::{PocoError, Result};

/// Amounts are integer base units. No fractional values exist anywhere in
/// the protocol.
pub type Amount = u64;

/// A single account's balance record.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    /// Free to withdraw or to lock.
    pub available: Amount,
    /// Reserved by a deal or a stake.
    pub locked: Amount,
}

impl Account {
    /// Create a zero balance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total balance (available + locked), widened so it cannot overflow.
    #[must_use]
    pub fn total(&self) -> u128 {
        u128::from(self.available) + u128::from(self.locked)
    }

    /// Whether this account holds nothing at all.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.available == 0 && self.locked == 0
    }
}

/// `amount × ratio / 100`, rounded down.
///
/// # Errors
/// `ArithmeticOverflow` if the result doesn't fit an [`Amount`].
pub fn percent_of(amount: Amount, ratio: u64) -> Result<Amount> {
    mul_div(amount, ratio, 100)
}

/// `amount × numerator / denominator` with a `u128` intermediate, rounded down.
///
/// # Errors
/// `ArithmeticOverflow` if `denominator` is zero or the result doesn't fit.
pub fn mul_div(amount: Amount, numerator: u64, denominator: u64) -> Result<Amount> {
    if denominator == 0 {
        return Err(PocoError::ArithmeticOverflow);
    }
    let wide = u128::from(amount) * u128::from(numerator) / u128::from(denominator);
    Amount::try_from(wide).map_err(|_| PocoError::ArithmeticOverflow)
}

/// `amount × count`, checked.
///
/// # Errors
/// `ArithmeticOverflow` on overflow.
pub fn times(amount: Amount, count: u64) -> Result<Amount> {
    amount.checked_mul(count).ok_or(PocoError::ArithmeticOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_zero() {
        let account = Account::default();
        assert_eq!(account.available, 0);
        assert_eq!(account.locked, 0);
        assert!(account.is_zero());
    }

    #[test]
    fn total_does_not_overflow() {
        let account = Account {
            available: u64::MAX,
            locked: u64::MAX,
        };
        assert_eq!(account.total(), 2 * u128::from(u64::MAX));
        assert!(!account.is_zero());
    }

    #[test]
    fn percent_rounds_down() {
        assert_eq!(percent_of(25, 30).unwrap(), 7);
        assert_eq!(percent_of(100, 30).unwrap(), 30);
        assert_eq!(percent_of(0, 30).unwrap(), 0);
    }

    #[test]
    fn mul_div_uses_wide_intermediate() {
        assert_eq!(mul_div(u64::MAX, 2, 2).unwrap(), u64::MAX);
        assert_eq!(mul_div(u64::MAX, 3, 2).unwrap_err(), PocoError::ArithmeticOverflow);
        assert_eq!(mul_div(1, 1, 0).unwrap_err(), PocoError::ArithmeticOverflow);
    }

    #[test]
    fn times_checks_overflow() {
        assert_eq!(times(28, 3).unwrap(), 84);
        assert!(times(u64::MAX, 2).is_err());
    }
}
