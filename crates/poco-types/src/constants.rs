//! Protocol-wide constants for the PoCo marketplace.
//!
//! Ratios are whole percentages. Deadline ratios are multiples of a
//! category's `time_ref`.

/// Percentage of the workerpool price the scheduler stakes per task.
pub const WORKERPOOL_STAKE_RATIO: u64 = 30;

/// Contribution deadline = deal start + `time_ref` × this ratio.
pub const CONTRIBUTION_DEADLINE_RATIO: u64 = 7;

/// Reveal deadline = consensus time + `time_ref` × this ratio.
pub const REVEAL_DEADLINE_RATIO: u64 = 2;

/// Final deadline = deal start + `time_ref` × this ratio.
pub const FINAL_DEADLINE_RATIO: u64 = 10;

/// Percentage of the kitty paid to a scheduler on every finalize.
pub const KITTY_RATIO: u64 = 10;

/// Minimum kitty payout on finalize (bounded by what the kitty holds).
pub const KITTY_MIN: u64 = 1_000_000_000;

/// Label of the reserved account that holds funds in transit between
/// a seize and the matching rewards.
pub const ESCROW_ACCOUNT_LABEL: &str = "escrow";

/// Label of the reserved account that accumulates slashed scheduler stakes.
pub const KITTY_ACCOUNT_LABEL: &str = "kitty";

/// Default workerpool policy: percentage of the workerpool price a worker
/// stakes per contribution.
pub const DEFAULT_WORKER_STAKE_RATIO: u64 = 30;

/// Default workerpool policy: percentage of the reward pool kept by the
/// scheduler.
pub const DEFAULT_SCHEDULER_REWARD_RATIO: u64 = 1;

/// Numerator / denominator of the score decay applied to a worker whose
/// contribution was not proved at finalize.
pub const SCORE_DECAY_NUMERATOR: u64 = 2;
pub const SCORE_DECAY_DENOMINATOR: u64 = 3;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol name.
pub const PROTOCOL_NAME: &str = "PoCo";
