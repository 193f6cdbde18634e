//! Boundaries to the systems the protocol consults but does not own.
//!
//! - [`AssetRegistry`]: who owns an app, dataset or workerpool, and the
//!   workerpool's staking policy.
//! - [`CategoryRegistry`]: the reference duration of a task category.
//! - [`CallbackDispatcher`]: delivery of final results to a callback
//!   address.
//!
//! In-memory implementations are provided for embedding and tests.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Address, PocoError, Result, TaskId, constants};

/// Kind of registered asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    App,
    Dataset,
    Workerpool,
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::App => write!(f, "app"),
            Self::Dataset => write!(f, "dataset"),
            Self::Workerpool => write!(f, "workerpool"),
        }
    }
}

/// Staking and reward policy a workerpool owner sets for its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerpoolPolicy {
    /// Percentage of the workerpool price each worker stakes per contribution.
    pub worker_stake_ratio: u64,
    /// Percentage of the reward pool kept by the scheduler.
    pub scheduler_reward_ratio: u64,
}

impl Default for WorkerpoolPolicy {
    fn default() -> Self {
        Self {
            worker_stake_ratio: constants::DEFAULT_WORKER_STAKE_RATIO,
            scheduler_reward_ratio: constants::DEFAULT_SCHEDULER_REWARD_RATIO,
        }
    }
}

impl WorkerpoolPolicy {
    /// Both ratios are percentages.
    ///
    /// # Errors
    /// `Configuration` if either ratio exceeds 100.
    pub fn validate(&self) -> Result<()> {
        for (name, ratio) in [
            ("worker_stake_ratio", self.worker_stake_ratio),
            ("scheduler_reward_ratio", self.scheduler_reward_ratio),
        ] {
            if ratio > 100 {
                return Err(PocoError::Configuration(format!(
                    "workerpool policy {name} {ratio} exceeds 100"
                )));
            }
        }
        Ok(())
    }
}

pub trait AssetRegistry {
    /// Owner of `asset`, or `None` if it isn't registered as `kind`.
    fn owner(&self, kind: AssetKind, asset: &Address) -> Option<Address>;

    fn workerpool_policy(&self, workerpool: &Address) -> WorkerpoolPolicy {
        let _ = workerpool;
        WorkerpoolPolicy::default()
    }
}

pub trait CategoryRegistry {
    /// Reference duration of `category`, in seconds.
    fn time_ref(&self, category: u64) -> Option<u64>;
}

pub trait CallbackDispatcher {
    /// Deliver `results` of `task_id` to `callback`.
    ///
    /// # Errors
    /// A human-readable reason. Failures are logged by the caller and
    /// never undo the settlement.
    fn dispatch(
        &mut self,
        callback: &Address,
        task_id: &TaskId,
        results: &[u8],
    ) -> std::result::Result<(), String>;
}

// ---------------------------------------------------------------------------
// In-memory implementations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    owners: HashMap<(AssetKind, Address), Address>,
    policies: HashMap<Address, WorkerpoolPolicy>,
}

impl InMemoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: AssetKind, asset: Address, owner: Address) {
        self.owners.insert((kind, asset), owner);
    }

    pub fn set_policy(&mut self, workerpool: Address, policy: WorkerpoolPolicy) {
        self.policies.insert(workerpool, policy);
    }
}

impl AssetRegistry for InMemoryRegistry {
    fn owner(&self, kind: AssetKind, asset: &Address) -> Option<Address> {
        self.owners.get(&(kind, *asset)).copied()
    }

    fn workerpool_policy(&self, workerpool: &Address) -> WorkerpoolPolicy {
        self.policies.get(workerpool).copied().unwrap_or_default()
    }
}

/// Categories keyed by id.
#[derive(Debug, Clone, Default)]
pub struct CategoryTable {
    time_refs: HashMap<u64, u64>,
}

impl CategoryTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with categories `0..n` taking the given `time_ref`s in order.
    #[must_use]
    pub fn with_time_refs(time_refs: &[u64]) -> Self {
        Self {
            time_refs: (0u64..).zip(time_refs.iter().copied()).collect(),
        }
    }

    pub fn insert(&mut self, category: u64, time_ref: u64) {
        self.time_refs.insert(category, time_ref);
    }
}

impl CategoryRegistry for CategoryTable {
    fn time_ref(&self, category: u64) -> Option<u64> {
        self.time_refs.get(&category).copied()
    }
}

/// A delivered callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackRecord {
    pub callback: Address,
    pub task_id: TaskId,
    pub results: Vec<u8>,
}

/// Records every dispatch. Can be told to refuse delivery.
#[derive(Debug, Clone, Default)]
pub struct CallbackLog {
    pub delivered: Vec<CallbackRecord>,
    pub refuse: bool,
}

impl CallbackLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn refusing() -> Self {
        Self {
            delivered: Vec::new(),
            refuse: true,
        }
    }
}

impl CallbackDispatcher for CallbackLog {
    fn dispatch(
        &mut self,
        callback: &Address,
        task_id: &TaskId,
        results: &[u8],
    ) -> std::result::Result<(), String> {
        if self.refuse {
            return Err(format!("callback {callback} refused delivery"));
        }
        self.delivered.push(CallbackRecord {
            callback: *callback,
            task_id: *task_id,
            results: results.to_vec(),
        });
        Ok(())
    }
}
