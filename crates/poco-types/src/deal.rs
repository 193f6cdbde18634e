//! The deal model: a funded agreement produced by matching four orders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Address, Amount, DealId, OrderHash, PocoError, Result, Tag};

/// One priced asset of a deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealAsset {
    /// The asset (app, dataset or workerpool).
    pub pointer: Address,
    /// Who gets paid for it. For the workerpool this is the scheduler.
    pub owner: Address,
    /// Effective per-task price.
    pub price: Amount,
}

/// Hashes of the orders a deal consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealOrders {
    pub app: OrderHash,
    pub dataset: Option<OrderHash>,
    pub workerpool: OrderHash,
    pub request: OrderHash,
}

/// A matched and funded deal. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deal {
    pub id: DealId,
    pub orders: DealOrders,
    pub app: DealAsset,
    pub dataset: Option<DealAsset>,
    pub workerpool: DealAsset,
    pub requester: Address,
    /// Who paid the deal cost; equals `requester` unless sponsored.
    pub sponsor: Address,
    pub beneficiary: Address,
    pub callback: Option<Address>,
    pub params: String,
    /// Union of the app, dataset and request tags.
    pub tag: Tag,
    pub category: u64,
    pub trust: u64,
    /// Number of tasks in this deal.
    pub volume: u64,
    pub start_time: DateTime<Utc>,
    /// Stake a worker locks per contribution.
    pub worker_stake: Amount,
    /// Stake the scheduler locked per task at match time.
    pub scheduler_stake_per_task: Amount,
    /// Percentage of the reward pool kept by the scheduler.
    pub scheduler_reward_ratio: u64,
}

impl Deal {
    /// The scheduler is the workerpool owner.
    #[must_use]
    pub fn scheduler(&self) -> Address {
        self.workerpool.owner
    }

    /// Sum of the three per-task prices.
    ///
    /// # Errors
    /// `ArithmeticOverflow` if the sum doesn't fit an [`Amount`].
    pub fn task_price(&self) -> Result<Amount> {
        let dataset_price = self.dataset.map_or(0, |d| d.price);
        self.app
            .price
            .checked_add(dataset_price)
            .and_then(|p| p.checked_add(self.workerpool.price))
            .ok_or(PocoError::ArithmeticOverflow)
    }

    /// `true` if contributions to this deal must come through an enclave.
    #[must_use]
    pub fn requires_tee(&self) -> bool {
        self.tag.requires_tee()
    }

    /// Check that `index` names a task of this deal.
    pub fn check_index(&self, index: u64) -> Result<()> {
        if index < self.volume {
            Ok(())
        } else {
            Err(PocoError::InvalidTaskIndex {
                index,
                volume: self.volume,
            })
        }
    }
}
