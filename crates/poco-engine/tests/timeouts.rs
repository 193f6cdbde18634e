//! Deadlines, claims and the kitty.
//!
//! With `time_ref` = 300 s and the default ratios, a task accepts
//! contributions until `after(7)`, must be finalized before `after(10)`,
//! and reveals close two `time_ref`s after consensus.

mod common;

use common::*;
use poco_engine::{ClaimKind, RevealOutcome};
use poco_types::{Account, PocoError, TaskId, TaskStatus};

#[test]
fn untouched_task_is_refunded_after_the_contribution_deadline() {
    let mut m = Market::new();
    let deal_id = m.deal(1, 0);
    let task_id = m.initialize(deal_id, 0);

    assert_eq!(
        m.poco.claim(&task_id, after(6)).unwrap_err(),
        PocoError::DeadlineNotElapsed { deadline: after(7) }
    );

    let receipt = m.poco.claim(&task_id, after(7)).unwrap();
    assert_eq!(receipt.kind, ClaimKind::Refund);
    assert_eq!(receipt.sponsor_refund, 28);
    assert_eq!(receipt.scheduler_refund, STAKE);
    assert!(receipt.worker_unlocks.is_empty());

    assert_eq!(m.poco.task_status(&task_id), TaskStatus::Failed);
    assert_eq!(m.poco.balance(&m.requester.address()), Account { available: FUNDING, locked: 0 });
    assert_eq!(m.poco.balance(&m.scheduler.address()), Account { available: FUNDING, locked: 0 });

    assert!(matches!(
        m.poco.claim(&task_id, after(8)).unwrap_err(),
        PocoError::InvalidStateTransition { operation: "claim", .. }
    ));
    assert_eq!(m.poco.total_supply(), m.funded_supply());
}

#[test]
fn contributions_close_at_the_deadline() {
    let mut m = Market::new();
    let deal_id = m.deal(1, 3);
    let task_id = m.initialize(deal_id, 0);
    m.contribute(task_id, 0, digest(0x01), after(1));

    let late = m.contribution(task_id, 1, digest(0x01));
    assert_eq!(
        m.poco.contribute(&late, after(7)).unwrap_err(),
        PocoError::DeadlineElapsed { deadline: after(7) }
    );

    let receipt = m.poco.claim(&task_id, after(7)).unwrap();
    assert_eq!(receipt.kind, ClaimKind::Refund);
    assert_eq!(receipt.worker_unlocks, vec![(m.worker(0), STAKE)]);
    assert_eq!(m.poco.balance(&m.worker(0)), Account { available: WORKER_FUNDING, locked: 0 });
}

#[test]
fn consensus_without_reveals_is_refunded_after_the_reveal_deadline() {
    let mut m = Market::new();
    let deal_id = m.deal(1, 0);
    let task_id = m.initialize(deal_id, 0);
    m.contribute(task_id, 0, digest(0x01), after(1));
    assert_eq!(m.poco.task(&task_id).unwrap().reveal_deadline, Some(after(3)));

    assert_eq!(
        m.poco.claim(&task_id, after(2)).unwrap_err(),
        PocoError::DeadlineNotElapsed { deadline: after(3) }
    );
    assert_eq!(
        m.poco.reveal(&task_id, m.worker(0), digest(0x01), after(3)).unwrap_err(),
        PocoError::DeadlineElapsed { deadline: after(3) }
    );

    let receipt = m.poco.claim(&task_id, after(3)).unwrap();
    assert_eq!(receipt.kind, ClaimKind::Refund);
    assert_eq!(receipt.worker_unlocks, vec![(m.worker(0), STAKE)]);
    assert_eq!(m.poco.balance(&m.scheduler.address()), Account { available: FUNDING, locked: 0 });
    assert_eq!(m.poco.total_supply(), m.funded_supply());
}

#[test]
fn finalize_waits_for_pending_reveals() {
    let mut m = Market::new();
    let deal_id = m.deal(1, 2);
    let task_id = m.initialize(deal_id, 0);
    m.contribute(task_id, 0, digest(0x01), after(1));
    m.contribute(task_id, 1, digest(0x01), after(1));
    assert_eq!(
        m.poco.reveal(&task_id, m.worker(0), digest(0x01), after(2)).unwrap(),
        RevealOutcome::Proved
    );

    let scheduler = m.scheduler.address();
    assert_eq!(
        m.poco.finalize(scheduler, &task_id, Vec::new(), after(2)).unwrap_err(),
        PocoError::DeadlineNotElapsed { deadline: after(3) }
    );

    let receipt = m.poco.finalize(scheduler, &task_id, Vec::new(), after(3)).unwrap();
    assert_eq!(receipt.forfeited, vec![(m.worker(1), STAKE)]);
    assert_eq!(receipt.worker_rewards, vec![(m.worker(0), 31)]);
    assert_eq!(receipt.scheduler_reward, 1);
    assert_eq!(m.poco.balance(&m.worker(1)).available, WORKER_FUNDING - STAKE);
}

#[test]
fn finalize_is_refused_past_the_final_deadline() {
    let mut m = Market::new();
    let deal_id = m.deal(1, 0);
    let task_id = m.initialize(deal_id, 0);
    m.contribute(task_id, 0, digest(0x01), after(1));
    m.poco.reveal(&task_id, m.worker(0), digest(0x01), after(1)).unwrap();

    assert_eq!(
        m.poco
            .finalize(m.scheduler.address(), &task_id, Vec::new(), after(10))
            .unwrap_err(),
        PocoError::DeadlineElapsed { deadline: after(10) }
    );
    assert_eq!(m.poco.task_status(&task_id), TaskStatus::Revealing);
}

#[test]
fn abandoned_task_feeds_the_kitty_and_the_next_finalize_drains_it() {
    let mut m = Market::new();
    let kitty = m.poco.config().kitty_account;

    let deal_id = m.deal(1, 0);
    let task_id = m.initialize(deal_id, 0);
    m.contribute(task_id, 0, digest(0x01), after(1));
    m.poco.reveal(&task_id, m.worker(0), digest(0x01), after(1)).unwrap();

    assert_eq!(
        m.poco.claim(&task_id, after(9)).unwrap_err(),
        PocoError::DeadlineNotElapsed { deadline: after(10) }
    );
    let receipt = m.poco.claim(&task_id, after(10)).unwrap();
    assert_eq!(receipt.kind, ClaimKind::SchedulerAbandoned);
    assert_eq!(receipt.kitty_seized, STAKE);
    assert_eq!(receipt.scheduler_refund, 0);

    assert_eq!(m.poco.balance(&kitty), Account { available: 0, locked: STAKE });
    assert_eq!(m.poco.balance(&m.scheduler.address()), Account { available: FUNDING - STAKE, locked: 0 });
    assert_eq!(m.poco.balance(&m.worker(0)), Account { available: WORKER_FUNDING, locked: 0 });
    assert_eq!(m.poco.balance(&m.requester.address()), Account { available: FUNDING, locked: 0 });
    assert_eq!(m.poco.total_supply(), m.funded_supply());

    // The default minimum payout exceeds the kitty, so it is emptied.
    let next = m.deal(1, 0);
    let task_id = m.initialize(next, 0);
    m.contribute(task_id, 1, digest(0x02), after(1));
    m.poco.reveal(&task_id, m.worker(1), digest(0x02), after(1)).unwrap();
    let receipt = m
        .poco
        .finalize(m.scheduler.address(), &task_id, Vec::new(), after(2))
        .unwrap();
    assert_eq!(receipt.kitty_bonus, STAKE);
    assert_eq!(m.poco.balance(&kitty), Account::default());
    assert_eq!(m.poco.balance(&m.scheduler.address()).available, FUNDING - STAKE + 1 + STAKE);
    assert_eq!(m.poco.total_supply(), m.funded_supply());
}

#[test]
fn never_initialized_task_can_be_claimed() {
    let mut m = Market::new();
    let deal_id = m.deal(1, 0);
    let task_id = TaskId::derive(&deal_id, 0);

    assert_eq!(
        m.poco.initialize_and_claim(deal_id, 0, after(6)).unwrap_err(),
        PocoError::DeadlineNotElapsed { deadline: after(7) }
    );
    assert_eq!(m.poco.task_status(&task_id), TaskStatus::Unset);

    let receipt = m.poco.initialize_and_claim(deal_id, 0, after(7)).unwrap();
    assert_eq!(receipt.task_id, task_id);
    assert_eq!(receipt.kind, ClaimKind::Refund);
    assert_eq!(m.poco.task_status(&task_id), TaskStatus::Failed);

    assert!(matches!(
        m.poco.initialize(m.scheduler.address(), deal_id, 0).unwrap_err(),
        PocoError::InvalidStateTransition { operation: "initialize", .. }
    ));
    assert_eq!(m.poco.balance(&m.requester.address()), Account { available: FUNDING, locked: 0 });
}

#[test]
fn claim_array_is_all_or_nothing() {
    let mut m = Market::new();
    let deal_id = m.deal(2, 0);
    let ids = m
        .poco
        .initialize_array(m.scheduler.address(), &[(deal_id, 0), (deal_id, 1)])
        .unwrap();

    // Task 1 reaches consensus and is finalized; task 0 stays idle.
    m.contribute(ids[1], 0, digest(0x01), after(1));
    m.poco.reveal(&ids[1], m.worker(0), digest(0x01), after(1)).unwrap();
    m.poco
        .finalize(m.scheduler.address(), &ids[1], Vec::new(), after(2))
        .unwrap();

    assert!(matches!(
        m.poco.claim_array(&ids, after(7)).unwrap_err(),
        PocoError::InvalidStateTransition { operation: "claim", .. }
    ));
    assert_eq!(m.poco.task_status(&ids[0]), TaskStatus::Active);

    let receipts = m.poco.claim_array(&ids[..1], after(7)).unwrap();
    assert_eq!(receipts.len(), 1);
    assert_eq!(m.poco.task_status(&ids[0]), TaskStatus::Failed);
    assert_eq!(m.poco.balance(&m.requester.address()).locked, 0);
    assert_eq!(m.poco.balance(&m.scheduler.address()).locked, 0);
    assert_eq!(m.poco.total_supply(), m.funded_supply());
}
