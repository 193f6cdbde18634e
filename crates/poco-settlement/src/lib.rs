//! # poco-settlement
//!
//! Moves funds once a task ends.
//!
//! ## Finalize
//!
//! 1. Seize the task price from the sponsor into the escrow account
//! 2. Pay the app and dataset owners their prices
//! 3. Seize the stakes of contributions that weren't proved; they join the
//!    workerpool price in the reward pool
//! 4. Split `(100 - scheduler_reward_ratio)%` of the pool among proved
//!    workers by weight; unlock their stakes
//! 5. Unlock the scheduler stake; pay the scheduler the remainder plus the
//!    kitty bonus
//!
//! ## Claim
//!
//! Unlock the task price for the sponsor and every worker stake. The
//! scheduler stake is unlocked, or seized into the kitty if the scheduler
//! abandoned a revealed task.
//!
//! The escrow account nets to zero after every settlement.

pub mod rewards;
pub mod settler;

pub use rewards::{RewardSplit, kitty_bonus, split_rewards};
pub use settler::{ClaimReceipt, FinalizeReceipt, SettlementEngine};
