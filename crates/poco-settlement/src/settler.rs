//! Fund movements for finalized and claimed tasks.
//!
//! The engine borrows the ledger, the reputation book and the protocol
//! config for one settlement. Callers check the task's state first (see
//! `TaskBook::ensure_finalizable` and `TaskBook::claim_kind`) and run the
//! whole operation on a staged store, so a failed step discards everything.

use poco_consensus::{ClaimKind, ReputationBook};
use poco_escrow::Ledger;
use poco_types::{
    Address, Amount, ContributionStatus, Deal, PocoError, ProtocolConfig, Result, Task, TaskId,
};
use tracing::{debug, info, warn};

use crate::rewards::{kitty_bonus, split_rewards};

/// Payouts of one finalize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeReceipt {
    pub task_id: TaskId,
    pub app_reward: (Address, Amount),
    pub dataset_reward: Option<(Address, Amount)>,
    pub worker_rewards: Vec<(Address, Amount)>,
    pub forfeited: Vec<(Address, Amount)>,
    /// Remainder of the reward pool.
    pub scheduler_reward: Amount,
    pub kitty_bonus: Amount,
}

/// Refunds of one claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimReceipt {
    pub task_id: TaskId,
    pub kind: ClaimKind,
    /// Task price returned to the sponsor.
    pub sponsor_refund: Amount,
    /// Scheduler stake returned to the scheduler (zero when seized).
    pub scheduler_refund: Amount,
    /// Scheduler stake moved into the kitty.
    pub kitty_seized: Amount,
    pub worker_unlocks: Vec<(Address, Amount)>,
}

pub struct SettlementEngine<'a> {
    ledger: &'a mut Ledger,
    reputation: &'a mut ReputationBook,
    config: &'a ProtocolConfig,
}

impl<'a> SettlementEngine<'a> {
    pub fn new(ledger: &'a mut Ledger, reputation: &'a mut ReputationBook, config: &'a ProtocolConfig) -> Self {
        Self {
            ledger,
            reputation,
            config,
        }
    }

    fn escrow_balance(&self) -> Amount {
        self.ledger.balance(&self.config.escrow_account).available
    }

    fn check_escrow_drained(&self, before: Amount) -> Result<()> {
        let after = self.escrow_balance();
        if after == before {
            Ok(())
        } else {
            Err(PocoError::Internal(format!(
                "escrow account moved from {before} to {after} during settlement"
            )))
        }
    }

    /// Pay out a task whose consensus has been revealed.
    ///
    /// # Errors
    /// `ConsensusNotReached` if nothing was proved; ledger errors if the
    /// locked funds don't match the deal (a bookkeeping bug).
    pub fn finalize(&mut self, deal: &Deal, task: &Task) -> Result<FinalizeReceipt> {
        let escrow = self.config.escrow_account;
        let escrow_before = self.escrow_balance();
        let split = split_rewards(deal, task)?;
        let scheduler = deal.scheduler();

        // Requester side
        self.ledger.seize(deal.sponsor, deal.task_price()?, escrow)?;
        self.ledger.reward(escrow, deal.app.owner, deal.app.price)?;
        if let Some(dataset) = &deal.dataset {
            self.ledger.reward(escrow, dataset.owner, dataset.price)?;
        }

        // Workers
        for (worker, stake) in &split.forfeited {
            self.ledger.seize(*worker, *stake, escrow)?;
            self.reputation.penalize(*worker);
            warn!(task = %task.id, worker = %worker, stake, "Worker stake forfeited");
        }
        for (worker, share) in &split.workers {
            self.ledger.unlock(*worker, deal.worker_stake)?;
            self.ledger.reward(escrow, *worker, *share)?;
            self.reputation.reward(*worker);
            debug!(task = %task.id, worker = %worker, share, "Worker rewarded");
        }

        // Scheduler
        self.ledger.unlock(scheduler, deal.scheduler_stake_per_task)?;
        self.ledger.reward(escrow, scheduler, split.scheduler)?;
        let kitty = self.config.kitty_account;
        let bonus = kitty_bonus(self.ledger.balance(&kitty).locked, self.config)?;
        if bonus > 0 {
            self.ledger.seize(kitty, bonus, scheduler)?;
        }

        self.check_escrow_drained(escrow_before)?;
        info!(
            task = %task.id,
            deal = %deal.id,
            pool = split.pool,
            winners = split.workers.len(),
            forfeited = split.forfeited.len(),
            scheduler_reward = split.scheduler,
            kitty_bonus = bonus,
            "Task settled"
        );

        Ok(FinalizeReceipt {
            task_id: task.id,
            app_reward: (deal.app.owner, deal.app.price),
            dataset_reward: deal.dataset.map(|d| (d.owner, d.price)),
            worker_rewards: split.workers,
            forfeited: split.forfeited,
            scheduler_reward: split.scheduler,
            kitty_bonus: bonus,
        })
    }

    /// Release or seize the funds of a task that timed out.
    ///
    /// # Errors
    /// Ledger errors if the locked funds don't match the deal.
    pub fn claim(&mut self, deal: &Deal, task: &Task, kind: ClaimKind) -> Result<ClaimReceipt> {
        let scheduler = deal.scheduler();
        let stake = deal.scheduler_stake_per_task;
        let sponsor_refund = deal.task_price()?;
        self.ledger.unlock(deal.sponsor, sponsor_refund)?;

        let (scheduler_refund, kitty_seized) = match kind {
            ClaimKind::Refund => {
                self.ledger.unlock(scheduler, stake)?;
                (stake, 0)
            }
            ClaimKind::SchedulerAbandoned => {
                let kitty = self.config.kitty_account;
                self.ledger.seize(scheduler, stake, kitty)?;
                self.ledger.lock(kitty, stake)?;
                warn!(task = %task.id, scheduler = %scheduler, stake, "Scheduler stake seized into kitty");
                (0, stake)
            }
        };

        let mut worker_unlocks = Vec::with_capacity(task.contributions.len());
        for contribution in &task.contributions {
            if contribution.status == ContributionStatus::Unset {
                continue;
            }
            self.ledger.unlock(contribution.worker, deal.worker_stake)?;
            worker_unlocks.push((contribution.worker, deal.worker_stake));
        }

        info!(
            task = %task.id,
            deal = %deal.id,
            kind = ?kind,
            sponsor_refund,
            scheduler_refund,
            kitty_seized,
            workers = worker_unlocks.len(),
            "Task funds released"
        );

        Ok(ClaimReceipt {
            task_id: task.id,
            kind,
            sponsor_refund,
            scheduler_refund,
            kitty_seized,
            worker_unlocks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use poco_types::{Account, Bytes32, Contribution, DealAsset, DealId, DealOrders, OrderHash, Tag};

    const SPONSOR: Address = Address([4u8; 32]);
    const APP_OWNER: Address = Address([101u8; 32]);
    const SCHEDULER: Address = Address([103u8; 32]);

    fn deal() -> Deal {
        Deal {
            id: DealId([1u8; 32]),
            orders: DealOrders {
                app: OrderHash([1u8; 32]),
                dataset: None,
                workerpool: OrderHash([3u8; 32]),
                request: OrderHash([4u8; 32]),
            },
            app: DealAsset {
                pointer: Address([1u8; 32]),
                owner: APP_OWNER,
                price: 3,
            },
            dataset: None,
            workerpool: DealAsset {
                pointer: Address([3u8; 32]),
                owner: SCHEDULER,
                price: 25,
            },
            requester: SPONSOR,
            sponsor: SPONSOR,
            beneficiary: SPONSOR,
            callback: None,
            params: String::new(),
            tag: Tag::NONE,
            category: 0,
            trust: 1,
            volume: 1,
            start_time: DateTime::<Utc>::UNIX_EPOCH,
            worker_stake: 7,
            scheduler_stake_per_task: 7,
            scheduler_reward_ratio: 1,
        }
    }

    fn worker(byte: u8) -> Address {
        Address([byte; 32])
    }

    /// Ledger as it stands after matching and two contributions.
    fn ledger() -> Ledger {
        let mut ledger = Ledger::new();
        ledger.deposit(SPONSOR, 100).unwrap();
        ledger.deposit(SCHEDULER, 100).unwrap();
        ledger.lock_all(&[(SPONSOR, 28), (SCHEDULER, 7)]).unwrap();
        for w in [10, 11] {
            ledger.deposit(worker(w), 100).unwrap();
            ledger.lock(worker(w), 7).unwrap();
        }
        ledger
    }

    fn task(statuses: [ContributionStatus; 2]) -> Task {
        let deal_id = DealId([1u8; 32]);
        let mut task = Task::new(
            poco_types::TaskId::derive(&deal_id, 0),
            deal_id,
            0,
            DateTime::<Utc>::UNIX_EPOCH,
            DateTime::<Utc>::UNIX_EPOCH,
        );
        for (w, status) in [10u8, 11].into_iter().zip(statuses) {
            let mut c = Contribution::new(worker(w), Bytes32([1u8; 32]), Bytes32([w; 32]), None, 1);
            c.status = status;
            task.contributions.push(c);
        }
        task
    }

    #[test]
    fn finalize_pays_everyone_and_conserves_supply() {
        let mut ledger = ledger();
        let mut reputation = ReputationBook::new();
        let config = ProtocolConfig::default();
        let t = task([ContributionStatus::Proved, ContributionStatus::Rejected]);
        let receipt = SettlementEngine::new(&mut ledger, &mut reputation, &config)
            .finalize(&deal(), &t)
            .unwrap();

        // Pool = 25 + 7 forfeited = 32; workers get 99% = 31.
        assert_eq!(receipt.worker_rewards, vec![(worker(10), 31)]);
        assert_eq!(receipt.scheduler_reward, 1);
        assert_eq!(ledger.balance(&SPONSOR), Account { available: 72, locked: 0 });
        assert_eq!(ledger.balance(&APP_OWNER).available, 3);
        assert_eq!(ledger.balance(&worker(10)), Account { available: 131, locked: 0 });
        assert_eq!(ledger.balance(&worker(11)), Account { available: 93, locked: 0 });
        assert_eq!(ledger.balance(&SCHEDULER), Account { available: 101, locked: 0 });
        assert!(ledger.balance(&config.escrow_account).is_zero());
        assert!(ledger.verify_supply().is_ok());

        assert_eq!(reputation.score(&worker(10)), 1);
        assert_eq!(reputation.score(&worker(11)), 0);
    }

    #[test]
    fn finalize_pays_kitty_bonus() {
        let mut ledger = ledger();
        let config = ProtocolConfig {
            kitty_min: 2,
            ..ProtocolConfig::default()
        };
        ledger.deposit(config.kitty_account, 50).unwrap();
        ledger.lock(config.kitty_account, 50).unwrap();
        let mut reputation = ReputationBook::new();
        let t = task([ContributionStatus::Proved, ContributionStatus::Proved]);
        let receipt = SettlementEngine::new(&mut ledger, &mut reputation, &config)
            .finalize(&deal(), &t)
            .unwrap();
        assert_eq!(receipt.kitty_bonus, 5);
        assert_eq!(ledger.balance(&config.kitty_account).locked, 45);
        // Pool 25, workers 24 split 12/12, scheduler 1 + bonus 5.
        assert_eq!(ledger.balance(&SCHEDULER).available, 100 + 1 + 5);
    }

    #[test]
    fn refund_claim_unlocks_everything() {
        let mut ledger = ledger();
        let mut reputation = ReputationBook::new();
        let config = ProtocolConfig::default();
        let t = task([ContributionStatus::Contributed, ContributionStatus::Contributed]);
        let receipt = SettlementEngine::new(&mut ledger, &mut reputation, &config)
            .claim(&deal(), &t, ClaimKind::Refund)
            .unwrap();
        assert_eq!(receipt.sponsor_refund, 28);
        assert_eq!(receipt.scheduler_refund, 7);
        for account in [SPONSOR, SCHEDULER, worker(10), worker(11)] {
            assert_eq!(ledger.balance(&account), Account { available: 100, locked: 0 });
        }
    }

    #[test]
    fn abandoned_claim_feeds_the_kitty() {
        let mut ledger = ledger();
        let mut reputation = ReputationBook::new();
        let config = ProtocolConfig::default();
        let t = task([ContributionStatus::Proved, ContributionStatus::Contributed]);
        let receipt = SettlementEngine::new(&mut ledger, &mut reputation, &config)
            .claim(&deal(), &t, ClaimKind::SchedulerAbandoned)
            .unwrap();
        assert_eq!(receipt.kitty_seized, 7);
        assert_eq!(ledger.balance(&SCHEDULER), Account { available: 93, locked: 0 });
        assert_eq!(ledger.balance(&config.kitty_account), Account { available: 0, locked: 7 });
        assert_eq!(ledger.balance(&SPONSOR).locked, 0);
        assert!(ledger.verify_supply().is_ok());
    }
}
