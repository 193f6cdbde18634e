//! Task lifecycle and contributions.
//!
//! ```text
//! UNSET ──► ACTIVE ──► REVEALING ──► COMPLETED
//!             │            │
//!             └────────────┴───────► FAILED
//! ```
//!
//! Transitions only move forward; a terminal task never changes again.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::{Address, Bytes32, DealId, PocoError, Result, TaskId};

/// Status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Not yet initialized by the scheduler.
    Unset,
    /// Accepting contributions.
    Active,
    /// Consensus reached; accepting reveals from consensus voters.
    Revealing,
    /// Finalized and settled. Terminal.
    Completed,
    /// Timed out and refunded. Terminal.
    Failed,
}

impl TaskStatus {
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Unset, Self::Active)
                | (Self::Active, Self::Revealing | Self::Failed)
                | (Self::Revealing, Self::Completed | Self::Failed)
        )
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unset => write!(f, "UNSET"),
            Self::Active => write!(f, "ACTIVE"),
            Self::Revealing => write!(f, "REVEALING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Status of a single worker's contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContributionStatus {
    Unset,
    /// Committed, not yet revealed.
    Contributed,
    /// Revealed and matched the consensus value.
    Proved,
    /// Revealed but didn't match.
    Rejected,
}

impl ContributionStatus {
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Unset, Self::Contributed) | (Self::Contributed, Self::Proved | Self::Rejected)
        )
    }
}

impl std::fmt::Display for ContributionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unset => write!(f, "UNSET"),
            Self::Contributed => write!(f, "CONTRIBUTED"),
            Self::Proved => write!(f, "PROVED"),
            Self::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// One worker's staked bet on a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    pub worker: Address,
    pub status: ContributionStatus,
    pub result_hash: Bytes32,
    pub result_seal: Bytes32,
    pub enclave: Option<Address>,
    /// Voting weight, `1 + score` at contribution time.
    pub weight: u64,
}

impl Contribution {
    #[must_use]
    pub fn new(
        worker: Address,
        result_hash: Bytes32,
        result_seal: Bytes32,
        enclave: Option<Address>,
        weight: u64,
    ) -> Self {
        Self {
            worker,
            status: ContributionStatus::Contributed,
            result_hash,
            result_seal,
            enclave,
            weight,
        }
    }

    /// Move to `target`, rejecting backwards or sideways moves.
    pub fn transition(&mut self, target: ContributionStatus, operation: &'static str) -> Result<()> {
        if !self.status.can_transition_to(target) {
            return Err(PocoError::InvalidStateTransition {
                operation,
                status: self.status.to_string(),
            });
        }
        self.status = target;
        Ok(())
    }
}

/// One unit of work within a deal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub deal_id: DealId,
    pub index: u64,
    pub status: TaskStatus,
    pub contribution_deadline: DateTime<Utc>,
    /// Set when consensus is reached.
    pub reveal_deadline: Option<DateTime<Utc>>,
    pub final_deadline: DateTime<Utc>,
    pub consensus_value: Option<Bytes32>,
    pub reveal_counter: u64,
    /// Number of contributions that voted for the consensus value.
    pub winner_counter: u64,
    /// Arrival order.
    pub contributions: Vec<Contribution>,
    /// First proved digest.
    pub result_digest: Option<Bytes32>,
    /// Results payload submitted at finalize.
    pub results: Option<Vec<u8>>,
}

impl Task {
    /// A fresh, uninitialized task.
    #[must_use]
    pub fn new(
        id: TaskId,
        deal_id: DealId,
        index: u64,
        contribution_deadline: DateTime<Utc>,
        final_deadline: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            deal_id,
            index,
            status: TaskStatus::Unset,
            contribution_deadline,
            reveal_deadline: None,
            final_deadline,
            consensus_value: None,
            reveal_counter: 0,
            winner_counter: 0,
            contributions: Vec::new(),
            result_digest: None,
            results: None,
        }
    }

    /// Move to `target`, rejecting backwards or sideways moves.
    ///
    /// # Errors
    /// `InvalidStateTransition` naming `operation` and the current status.
    pub fn transition(&mut self, target: TaskStatus, operation: &'static str) -> Result<()> {
        if !self.status.can_transition_to(target) {
            return Err(PocoError::InvalidStateTransition {
                operation,
                status: self.status.to_string(),
            });
        }
        self.status = target;
        Ok(())
    }

    /// Fail with `InvalidStateTransition` unless the task is in `expected`.
    pub fn require_status(&self, expected: TaskStatus, operation: &'static str) -> Result<()> {
        if self.status == expected {
            Ok(())
        } else {
            Err(PocoError::InvalidStateTransition {
                operation,
                status: self.status.to_string(),
            })
        }
    }

    #[must_use]
    pub fn contribution(&self, worker: &Address) -> Option<&Contribution> {
        self.contributions.iter().find(|c| c.worker == *worker)
    }

    pub fn contribution_mut(&mut self, worker: &Address) -> Option<&mut Contribution> {
        self.contributions.iter_mut().find(|c| c.worker == *worker)
    }

    /// Consensus voters that have not revealed yet.
    #[must_use]
    pub fn pending_reveals(&self) -> u64 {
        let Some(consensus) = self.consensus_value else {
            return 0;
        };
        self.contributions
            .iter()
            .filter(|c| c.status == ContributionStatus::Contributed && c.result_hash == consensus)
            .count() as u64
    }

    /// Sum of the weights of proved contributions.
    #[must_use]
    pub fn proved_weight(&self) -> u128 {
        self.contributions
            .iter()
            .filter(|c| c.status == ContributionStatus::Proved)
            .map(|c| u128::from(c.weight))
            .sum()
    }
}

/// `start + time_ref × ratio` seconds.
///
/// # Errors
/// `ArithmeticOverflow` if the offset or the resulting timestamp is out of
/// range.
pub fn deadline_after(start: DateTime<Utc>, time_ref: u64, ratio: u64) -> Result<DateTime<Utc>> {
    let seconds = time_ref
        .checked_mul(ratio)
        .and_then(|s| i64::try_from(s).ok())
        .ok_or(PocoError::ArithmeticOverflow)?;
    let delta = TimeDelta::try_seconds(seconds).ok_or(PocoError::ArithmeticOverflow)?;
    start
        .checked_add_signed(delta)
        .ok_or(PocoError::ArithmeticOverflow)
}
