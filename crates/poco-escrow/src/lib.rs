//! # poco-escrow
//!
//! **Escrow**: the keyed account store every other component moves funds
//! through.
//!
//! ## Operations
//!
//! | Operation | Effect |
//! |-----------|--------|
//! | `deposit` | external → `available` |
//! | `withdraw` | `available` → external |
//! | `lock` / `lock_all` | `available` → `locked` |
//! | `unlock` | `locked` → `available` |
//! | `seize(account, sink)` | `account.locked` → `sink.available` |
//! | `reward(sink, account)` | `sink.available` → `account.available` |
//!
//! Every operation is all-or-nothing. Only `deposit` and `withdraw` change
//! the total supply, which [`SupplyConservation`] tracks.

pub mod ledger;
pub mod supply_conservation;

pub use ledger::Ledger;
pub use supply_conservation::SupplyConservation;
