//! # poco-consensus
//!
//! Per-task lifecycle and staked commit-reveal voting.
//!
//! ## Flow
//!
//! 1. The scheduler **initializes** a task of a deal (UNSET → ACTIVE)
//! 2. Workers **contribute** a result hash and a worker-bound seal, locking
//!    a stake. Each contribution adds its weight to the [`ConsensusTally`]
//!    group of its hash.
//! 3. The first group whose weight reaches the deal's trust becomes the
//!    consensus value (ACTIVE → REVEALING)
//! 4. Consensus voters **reveal** the digest behind their commitment
//! 5. Finalize or claim end the task; funds move in `poco-settlement`
//!
//! Worker weights come from the [`ReputationBook`].

pub mod reputation;
pub mod tally;
pub mod task_machine;

pub use reputation::ReputationBook;
pub use tally::{ConsensusTally, ResultGroup};
pub use task_machine::{ClaimKind, ContributeOutcome, ContributionRequest, RevealOutcome, TaskBook};
