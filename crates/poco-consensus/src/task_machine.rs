//! Task state machine and commit-reveal voting.
//!
//! [`TaskBook`] owns every initialized task and its tally. It asserts the
//! task's status and deadlines before each step, locks worker stakes on
//! contribution, and moves tasks through
//! `UNSET → ACTIVE → REVEALING → COMPLETED | FAILED`.
//!
//! Settlement (who gets paid) lives in `poco-settlement`; this module only
//! decides *whether* a task may be finalized or claimed.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use poco_escrow::Ledger;
use poco_types::{
    Address, Bytes32, Contribution, ContributionStatus, Deal, PocoError, ProtocolConfig, Result,
    Task, TaskId, TaskStatus, crypto, deadline_after,
};
use tracing::{debug, info, warn};

use crate::{ConsensusTally, ReputationBook};

/// A worker's contribution call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributionRequest {
    pub task_id: TaskId,
    pub worker: Address,
    pub result_hash: Bytes32,
    pub result_seal: Bytes32,
    pub enclave: Option<Address>,
    /// Enclave signature over `(result_hash, result_seal)`. Ignored without an enclave.
    pub enclave_signature: Vec<u8>,
    /// Scheduler signature over `(worker, task_id, enclave)`.
    pub authorization: Vec<u8>,
}

/// Result of a successful contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContributeOutcome {
    /// No result hash has reached the trust threshold yet.
    Pending,
    /// This contribution pushed its hash over the threshold.
    ConsensusReached(Bytes32),
}

/// Result of a reveal. A rejected reveal is not an error: the call
/// succeeds and the contribution is marked REJECTED.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealOutcome {
    Proved,
    Rejected(PocoError),
}

/// How a claimable task ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimKind {
    /// Nobody is at fault on the protocol side: the sponsor and the
    /// scheduler are refunded.
    Refund,
    /// Consensus was revealed but the scheduler never finalized before the
    /// final deadline. The sponsor is refunded and the scheduler's stake is
    /// seized into the kitty.
    SchedulerAbandoned,
}

#[derive(Debug, Clone, Default)]
pub struct TaskBook {
    tasks: HashMap<TaskId, Task>,
    tallies: HashMap<TaskId, ConsensusTally>,
}

impl TaskBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Look up a task or fail with `UnknownTask`.
    pub fn require_task(&self, id: &TaskId) -> Result<&Task> {
        self.tasks.get(id).ok_or(PocoError::UnknownTask(*id))
    }

    fn task_mut(&mut self, id: &TaskId) -> Result<&mut Task> {
        self.tasks.get_mut(id).ok_or(PocoError::UnknownTask(*id))
    }

    /// Status of `id`; tasks never initialized are UNSET.
    #[must_use]
    pub fn status(&self, id: &TaskId) -> TaskStatus {
        self.tasks.get(id).map_or(TaskStatus::Unset, |t| t.status)
    }

    #[must_use]
    pub fn tally(&self, id: &TaskId) -> Option<&ConsensusTally> {
        self.tallies.get(id)
    }

    /// Scheduler-only task initialization.
    ///
    /// # Errors
    /// `NotAuthorized` if `caller` isn't the deal's scheduler, plus every
    /// error of [`Self::open`].
    pub fn initialize(
        &mut self,
        deal: &Deal,
        index: u64,
        caller: Address,
        time_ref: u64,
        config: &ProtocolConfig,
    ) -> Result<TaskId> {
        if caller != deal.scheduler() {
            return Err(PocoError::NotAuthorized {
                role: "scheduler",
                caller,
            });
        }
        self.open(deal, index, time_ref, config)
    }

    /// Create task `index` of `deal` and make it ACTIVE.
    ///
    /// # Errors
    /// `InvalidTaskIndex`, `InvalidStateTransition` if already initialized,
    /// `ArithmeticOverflow` on deadline overflow.
    pub fn open(
        &mut self,
        deal: &Deal,
        index: u64,
        time_ref: u64,
        config: &ProtocolConfig,
    ) -> Result<TaskId> {
        deal.check_index(index)?;
        let id = TaskId::derive(&deal.id, index);
        if let Some(existing) = self.tasks.get(&id) {
            return Err(PocoError::InvalidStateTransition {
                operation: "initialize",
                status: existing.status.to_string(),
            });
        }

        let mut task = Task::new(
            id,
            deal.id,
            index,
            deadline_after(deal.start_time, time_ref, config.contribution_deadline_ratio)?,
            deadline_after(deal.start_time, time_ref, config.final_deadline_ratio)?,
        );
        task.transition(TaskStatus::Active, "initialize")?;

        info!(
            task = %id,
            deal = %deal.id,
            index,
            contribution_deadline = %task.contribution_deadline,
            final_deadline = %task.final_deadline,
            "Task initialized"
        );
        self.tasks.insert(id, task);
        self.tallies.insert(id, ConsensusTally::new());
        Ok(id)
    }

    /// Checks shared by every contribution path. Leaves state untouched.
    fn check_contribution(&self, deal: &Deal, request: &ContributionRequest, now: DateTime<Utc>) -> Result<()> {
        let task = self.require_task(&request.task_id)?;
        if task.deal_id != deal.id {
            return Err(PocoError::Internal(format!(
                "task {} does not belong to deal {}",
                task.id, deal.id
            )));
        }
        task.require_status(TaskStatus::Active, "contribute")?;
        if now >= task.contribution_deadline {
            return Err(PocoError::DeadlineElapsed {
                deadline: task.contribution_deadline,
            });
        }
        if let Some(existing) = task.contribution(&request.worker) {
            return Err(PocoError::InvalidStateTransition {
                operation: "contribute",
                status: existing.status.to_string(),
            });
        }
        if request.result_hash.is_zero() || request.result_seal.is_zero() {
            return Err(PocoError::InvalidContribution {
                reason: "result hash and seal must be non-zero".into(),
            });
        }
        if deal.requires_tee() && request.enclave.is_none() {
            return Err(PocoError::InvalidContribution {
                reason: "trusted execution required: enclave missing".into(),
            });
        }

        crypto::verify_signature(
            &deal.scheduler(),
            &crypto::authorization_payload(&request.worker, &request.task_id, request.enclave.as_ref()),
            &request.authorization,
            "scheduler authorization",
        )?;
        if let Some(enclave) = &request.enclave {
            crypto::verify_signature(
                enclave,
                &crypto::attestation_payload(&request.result_hash, &request.result_seal),
                &request.enclave_signature,
                "enclave attestation",
            )?;
        }
        Ok(())
    }

    /// Record a staked contribution and update the tally.
    ///
    /// # Errors
    /// `UnknownTask`, `InvalidStateTransition`, `DeadlineElapsed`,
    /// `InvalidContribution`, `InvalidSignature`, `InsufficientBalance`.
    #[allow(clippy::too_many_arguments)]
    pub fn contribute(
        &mut self,
        deal: &Deal,
        ledger: &mut Ledger,
        reputation: &ReputationBook,
        config: &ProtocolConfig,
        time_ref: u64,
        request: &ContributionRequest,
        now: DateTime<Utc>,
    ) -> Result<ContributeOutcome> {
        self.check_contribution(deal, request, now)?;
        ledger.lock(request.worker, deal.worker_stake)?;

        let weight = reputation.weight(&request.worker);
        let group = self
            .tallies
            .entry(request.task_id)
            .or_default()
            .record(request.result_hash, request.worker, weight);
        let group_weight = group.weight;
        let group_size = group.contributors.len() as u64;

        let task = self.task_mut(&request.task_id)?;
        task.contributions.push(Contribution::new(
            request.worker,
            request.result_hash,
            request.result_seal,
            request.enclave,
            weight,
        ));
        debug!(
            task = %task.id,
            worker = %request.worker,
            result_hash = %request.result_hash,
            weight,
            group_weight,
            "Contribution recorded"
        );

        if group_weight < u128::from(deal.trust) {
            return Ok(ContributeOutcome::Pending);
        }

        task.transition(TaskStatus::Revealing, "contribute")?;
        task.consensus_value = Some(request.result_hash);
        task.reveal_deadline = Some(deadline_after(now, time_ref, config.reveal_deadline_ratio)?);
        task.winner_counter = group_size;
        info!(
            task = %task.id,
            consensus = %request.result_hash,
            winners = group_size,
            group_weight,
            "Consensus reached"
        );
        Ok(ContributeOutcome::ConsensusReached(request.result_hash))
    }

    /// Record a contribution that is proved on arrival: the worker supplies
    /// the digest, so hash and seal are checked here and the task goes
    /// straight to REVEALING with one reveal. Only for trust-1 deals with no
    /// prior contribution.
    ///
    /// `request.result_hash` and `request.result_seal` must be derived from
    /// `digest`.
    #[allow(clippy::too_many_arguments)]
    pub fn contribute_proved(
        &mut self,
        deal: &Deal,
        ledger: &mut Ledger,
        reputation: &ReputationBook,
        config: &ProtocolConfig,
        time_ref: u64,
        request: &ContributionRequest,
        digest: &Bytes32,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if deal.trust > 1 {
            return Err(PocoError::InvalidContribution {
                reason: format!("single-call finalize needs trust 1, deal has {}", deal.trust),
            });
        }
        if !self.require_task(&request.task_id)?.contributions.is_empty() {
            return Err(PocoError::InvalidContribution {
                reason: "task already has contributions".into(),
            });
        }
        if crypto::result_hash(&request.task_id, digest) != request.result_hash {
            return Err(PocoError::ResultHashMismatch);
        }
        if crypto::result_seal(&request.worker, &request.task_id, digest) != request.result_seal {
            return Err(PocoError::SealMismatch);
        }

        match self.contribute(deal, ledger, reputation, config, time_ref, request, now)? {
            ContributeOutcome::ConsensusReached(_) => {}
            ContributeOutcome::Pending => {
                return Err(PocoError::Internal("single contribution did not reach trust 1".into()));
            }
        }
        let task = self.task_mut(&request.task_id)?;
        if let Some(contribution) = task.contribution_mut(&request.worker) {
            contribution.transition(ContributionStatus::Proved, "contribute")?;
        }
        task.reveal_counter = 1;
        task.result_digest = Some(*digest);
        Ok(())
    }

    /// Reveal the digest behind a contribution.
    ///
    /// # Errors
    /// `UnknownTask`, `InvalidStateTransition` (task not REVEALING or
    /// contribution already revealed), `DeadlineElapsed`, `NotAuthorized`
    /// (no contribution from `worker`).
    pub fn reveal(
        &mut self,
        task_id: &TaskId,
        worker: Address,
        digest: Bytes32,
        now: DateTime<Utc>,
    ) -> Result<RevealOutcome> {
        let task = self.task_mut(task_id)?;
        task.require_status(TaskStatus::Revealing, "reveal")?;
        let (Some(consensus), Some(reveal_deadline)) = (task.consensus_value, task.reveal_deadline) else {
            return Err(PocoError::Internal(format!("task {task_id} is revealing without consensus")));
        };
        if now >= reveal_deadline {
            return Err(PocoError::DeadlineElapsed {
                deadline: reveal_deadline,
            });
        }

        let contribution = task.contribution_mut(&worker).ok_or(PocoError::NotAuthorized {
            role: "contributor",
            caller: worker,
        })?;
        if contribution.status != ContributionStatus::Contributed {
            return Err(PocoError::InvalidStateTransition {
                operation: "reveal",
                status: contribution.status.to_string(),
            });
        }

        let rejection = if contribution.result_hash != consensus
            || crypto::result_hash(task_id, &digest) != consensus
        {
            Some(PocoError::ResultHashMismatch)
        } else if crypto::result_seal(&worker, task_id, &digest) != contribution.result_seal {
            Some(PocoError::SealMismatch)
        } else {
            None
        };

        if let Some(cause) = rejection {
            contribution.transition(ContributionStatus::Rejected, "reveal")?;
            warn!(task = %task_id, worker = %worker, cause = %cause, "Reveal rejected");
            return Ok(RevealOutcome::Rejected(cause));
        }

        contribution.transition(ContributionStatus::Proved, "reveal")?;
        task.reveal_counter += 1;
        if task.result_digest.is_none() {
            task.result_digest = Some(digest);
        }
        debug!(
            task = %task_id,
            worker = %worker,
            reveals = task.reveal_counter,
            "Reveal proved"
        );
        Ok(RevealOutcome::Proved)
    }

    /// Check the scheduler may finalize `task_id` now.
    ///
    /// # Errors
    /// `NotAuthorized`, `UnknownTask`, `InvalidStateTransition`,
    /// `DeadlineElapsed` (final deadline passed), `ConsensusNotReached` (no
    /// reveal), `DeadlineNotElapsed` (consensus voters may still reveal).
    pub fn ensure_finalizable(
        &self,
        deal: &Deal,
        task_id: &TaskId,
        caller: Address,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if caller != deal.scheduler() {
            return Err(PocoError::NotAuthorized {
                role: "scheduler",
                caller,
            });
        }
        let task = self.require_task(task_id)?;
        task.require_status(TaskStatus::Revealing, "finalize")?;
        if now >= task.final_deadline {
            return Err(PocoError::DeadlineElapsed {
                deadline: task.final_deadline,
            });
        }
        if task.reveal_counter == 0 {
            return Err(PocoError::ConsensusNotReached);
        }
        if task.pending_reveals() > 0 {
            if let Some(reveal_deadline) = task.reveal_deadline {
                if now < reveal_deadline {
                    return Err(PocoError::DeadlineNotElapsed {
                        deadline: reveal_deadline,
                    });
                }
            }
        }
        Ok(())
    }

    /// REVEALING → COMPLETED, storing the results payload.
    pub fn complete(&mut self, task_id: &TaskId, results: Vec<u8>) -> Result<&Task> {
        let task = self.task_mut(task_id)?;
        task.transition(TaskStatus::Completed, "finalize")?;
        info!(
            task = %task_id,
            reveals = task.reveal_counter,
            results = %crypto::results_digest(&results),
            "Task finalized"
        );
        task.results = Some(results);
        Ok(task)
    }

    /// Decide whether `task_id` can be claimed now, and how.
    ///
    /// | Status | Reveals | Claimable once | Kind |
    /// |--------|---------|----------------|------|
    /// | ACTIVE | - | contribution deadline | `Refund` |
    /// | REVEALING | 0 | reveal or final deadline | `Refund` |
    /// | REVEALING | ≥ 1 | final deadline | `SchedulerAbandoned` |
    ///
    /// # Errors
    /// `UnknownTask`, `InvalidStateTransition` (terminal task),
    /// `DeadlineNotElapsed`.
    pub fn claim_kind(&self, task_id: &TaskId, now: DateTime<Utc>) -> Result<ClaimKind> {
        let task = self.require_task(task_id)?;
        let (deadline, kind) = match task.status {
            TaskStatus::Active => (task.contribution_deadline, ClaimKind::Refund),
            TaskStatus::Revealing if task.reveal_counter == 0 => {
                let reveal = task.reveal_deadline.unwrap_or(task.final_deadline);
                (reveal.min(task.final_deadline), ClaimKind::Refund)
            }
            TaskStatus::Revealing => (task.final_deadline, ClaimKind::SchedulerAbandoned),
            status => {
                return Err(PocoError::InvalidStateTransition {
                    operation: "claim",
                    status: status.to_string(),
                });
            }
        };
        if now < deadline {
            return Err(PocoError::DeadlineNotElapsed { deadline });
        }
        Ok(kind)
    }

    /// ACTIVE | REVEALING → FAILED.
    pub fn fail(&mut self, task_id: &TaskId) -> Result<&Task> {
        let task = self.task_mut(task_id)?;
        task.transition(TaskStatus::Failed, "claim")?;
        info!(task = %task_id, contributions = task.contributions.len(), "Task claimed");
        Ok(task)
    }
}
