//! Per-account available/locked bookkeeping.
//!
//! Each mutation checks every precondition before touching any balance, so
//! a failed call leaves the ledger unchanged.

use std::collections::HashMap;

use poco_types::{Account, Address, Amount, PocoError, Result};
use tracing::debug;

use crate::SupplyConservation;

/// The source of truth for all balances.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    accounts: HashMap<Address, Account>,
    supply: SupplyConservation,
}

fn checked_credit(balance: Amount, amount: Amount) -> Result<Amount> {
    balance.checked_add(amount).ok_or(PocoError::ArithmeticOverflow)
}

impl Ledger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn account(&self, account: &Address) -> Account {
        self.accounts.get(account).copied().unwrap_or_default()
    }

    fn store(&mut self, account: Address, entry: Account) {
        if entry.is_zero() {
            self.accounts.remove(&account);
        } else {
            self.accounts.insert(account, entry);
        }
    }

    /// Fund `account` from outside the ledger.
    ///
    /// # Errors
    /// `ArithmeticOverflow` if the balance would exceed `u64::MAX`.
    pub fn deposit(&mut self, account: Address, amount: Amount) -> Result<()> {
        let mut entry = self.account(&account);
        entry.available = checked_credit(entry.available, amount)?;
        self.store(account, entry);
        self.supply.record_deposit(amount);
        debug!(account = %account, amount, "deposit");
        Ok(())
    }

    /// Take funds out of the ledger.
    ///
    /// # Errors
    /// `InsufficientBalance` if `available < amount`.
    pub fn withdraw(&mut self, account: Address, amount: Amount) -> Result<()> {
        let mut entry = self.account(&account);
        if entry.available < amount {
            return Err(PocoError::InsufficientBalance {
                account,
                needed: amount,
                available: entry.available,
            });
        }
        entry.available -= amount;
        self.store(account, entry);
        self.supply.record_withdrawal(amount);
        debug!(account = %account, amount, "withdraw");
        Ok(())
    }

    /// available → locked.
    ///
    /// # Errors
    /// `InsufficientBalance` if `available < amount`.
    pub fn lock(&mut self, account: Address, amount: Amount) -> Result<()> {
        let mut entry = self.account(&account);
        if entry.available < amount {
            return Err(PocoError::InsufficientBalance {
                account,
                needed: amount,
                available: entry.available,
            });
        }
        entry.locked = checked_credit(entry.locked, amount)?;
        entry.available -= amount;
        self.store(account, entry);
        debug!(account = %account, amount, "lock");
        Ok(())
    }

    /// Lock several amounts as one unit. Amounts for the same account are
    /// summed before checking, so either every lock applies or none does.
    ///
    /// # Errors
    /// `InsufficientBalance` for the first account that can't cover its total.
    pub fn lock_all(&mut self, locks: &[(Address, Amount)]) -> Result<()> {
        let mut totals: Vec<(Address, Amount)> = Vec::with_capacity(locks.len());
        for (account, amount) in locks {
            match totals.iter_mut().find(|(a, _)| a == account) {
                Some((_, total)) => *total = checked_credit(*total, *amount)?,
                None => totals.push((*account, *amount)),
            }
        }

        for (account, amount) in &totals {
            let entry = self.account(account);
            if entry.available < *amount {
                return Err(PocoError::InsufficientBalance {
                    account: *account,
                    needed: *amount,
                    available: entry.available,
                });
            }
            checked_credit(entry.locked, *amount)?;
        }

        for (account, amount) in totals {
            let mut entry = self.account(&account);
            entry.available -= amount;
            entry.locked += amount;
            self.store(account, entry);
            debug!(account = %account, amount, "lock");
        }
        Ok(())
    }

    /// locked → available.
    ///
    /// # Errors
    /// `InsufficientLocked` if `locked < amount`.
    pub fn unlock(&mut self, account: Address, amount: Amount) -> Result<()> {
        let mut entry = self.account(&account);
        if entry.locked < amount {
            return Err(PocoError::InsufficientLocked {
                account,
                needed: amount,
                locked: entry.locked,
            });
        }
        entry.available = checked_credit(entry.available, amount)?;
        entry.locked -= amount;
        self.store(account, entry);
        debug!(account = %account, amount, "unlock");
        Ok(())
    }

    /// `account.locked` → `sink.available`.
    ///
    /// # Errors
    /// `InsufficientLocked` if `account.locked < amount`.
    pub fn seize(&mut self, account: Address, amount: Amount, sink: Address) -> Result<()> {
        let mut from = self.account(&account);
        if from.locked < amount {
            return Err(PocoError::InsufficientLocked {
                account,
                needed: amount,
                locked: from.locked,
            });
        }
        from.locked -= amount;
        if account == sink {
            from.available = checked_credit(from.available, amount)?;
            self.store(account, from);
        } else {
            let mut to = self.account(&sink);
            to.available = checked_credit(to.available, amount)?;
            self.store(account, from);
            self.store(sink, to);
        }
        debug!(account = %account, sink = %sink, amount, "seize");
        Ok(())
    }

    /// `sink.available` → `account.available`.
    ///
    /// # Errors
    /// `InsufficientBalance` if `sink.available < amount`.
    pub fn reward(&mut self, sink: Address, account: Address, amount: Amount) -> Result<()> {
        let mut from = self.account(&sink);
        if from.available < amount {
            return Err(PocoError::InsufficientBalance {
                account: sink,
                needed: amount,
                available: from.available,
            });
        }
        if sink != account {
            let mut to = self.account(&account);
            to.available = checked_credit(to.available, amount)?;
            from.available -= amount;
            self.store(sink, from);
            self.store(account, to);
        }
        debug!(sink = %sink, account = %account, amount, "reward");
        Ok(())
    }

    /// Balance of `account` (zero if never seen).
    #[must_use]
    pub fn balance(&self, account: &Address) -> Account {
        self.account(account)
    }

    /// Sum of every account's available + locked.
    #[must_use]
    pub fn total_supply(&self) -> u128 {
        self.accounts.values().map(Account::total).sum()
    }

    /// Check Σ(available + locked) == deposits − withdrawals.
    ///
    /// # Errors
    /// `SupplyInvariantViolation` on drift.
    pub fn verify_supply(&self) -> Result<()> {
        self.supply.verify(self.total_supply())
    }

    #[must_use]
    pub fn supply(&self) -> &SupplyConservation {
        &self.supply
    }
}
