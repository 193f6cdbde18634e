//! Everything the protocol persists.

use poco_consensus::{ReputationBook, TaskBook};
use poco_escrow::Ledger;
use poco_matchcore::DealMatcher;

/// Consumed volumes and deals, tasks with their contributions and tallies,
/// balances, and worker scores.
///
/// Cloning a store yields an independent staging copy.
#[derive(Debug, Clone, Default)]
pub struct Store {
    pub matcher: DealMatcher,
    pub tasks: TaskBook,
    pub ledger: Ledger,
    pub reputation: ReputationBook,
}

impl Store {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
