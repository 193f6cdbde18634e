//! Pure reward arithmetic.
//!
//! All splits are integer and exact: every unit of the reward pool goes
//! either to a worker or to the scheduler, which collects the rounding
//! dust.

use poco_types::{
    Address, Amount, ContributionStatus, Deal, PocoError, ProtocolConfig, Result, Task, mul_div,
    percent_of,
};

/// How a finalized task's workerpool side is paid out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardSplit {
    /// Workers whose contribution wasn't proved, each losing one stake.
    pub forfeited: Vec<(Address, Amount)>,
    /// Workerpool price plus forfeited stakes.
    pub pool: Amount,
    /// Proved workers and their share of the pool, in arrival order.
    pub workers: Vec<(Address, Amount)>,
    /// Remainder of the pool, dust included.
    pub scheduler: Amount,
}

/// Compute the split for `task` of `deal`.
///
/// # Errors
/// `ConsensusNotReached` if no contribution is proved,
/// `ArithmeticOverflow` if the pool doesn't fit an [`Amount`].
pub fn split_rewards(deal: &Deal, task: &Task) -> Result<RewardSplit> {
    let total_weight = task.proved_weight();
    if total_weight == 0 {
        return Err(PocoError::ConsensusNotReached);
    }

    let forfeited: Vec<(Address, Amount)> = task
        .contributions
        .iter()
        .filter(|c| c.status != ContributionStatus::Proved)
        .map(|c| (c.worker, deal.worker_stake))
        .collect();
    let pool = forfeited
        .iter()
        .try_fold(deal.workerpool.price, |acc, (_, stake)| acc.checked_add(*stake))
        .ok_or(PocoError::ArithmeticOverflow)?;

    let workers_pool = percent_of(pool, 100u64.saturating_sub(deal.scheduler_reward_ratio))?;
    let mut workers = Vec::new();
    let mut distributed: Amount = 0;
    for contribution in task
        .contributions
        .iter()
        .filter(|c| c.status == ContributionStatus::Proved)
    {
        let share = u128::from(workers_pool) * u128::from(contribution.weight) / total_weight;
        let share = Amount::try_from(share).map_err(|_| PocoError::ArithmeticOverflow)?;
        distributed += share;
        workers.push((contribution.worker, share));
    }

    Ok(RewardSplit {
        forfeited,
        pool,
        workers,
        scheduler: pool - distributed,
    })
}

/// Bonus paid from the kitty to a finalizing scheduler:
/// `min(locked, max(locked × kitty_ratio / 100, kitty_min))`.
///
/// # Errors
/// `ArithmeticOverflow` only on a pathological ratio.
pub fn kitty_bonus(kitty_locked: Amount, config: &ProtocolConfig) -> Result<Amount> {
    if kitty_locked == 0 {
        return Ok(0);
    }
    let share = mul_div(kitty_locked, config.kitty_ratio, 100)?;
    Ok(kitty_locked.min(share.max(config.kitty_min)))
}
