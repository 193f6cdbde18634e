//! Worker scores.
//!
//! A proved contribution at finalize earns one point. A contribution that
//! wasn't proved decays the score to two thirds, rounded down.

use std::collections::HashMap;

use poco_types::Address;
use poco_types::constants::{SCORE_DECAY_DENOMINATOR, SCORE_DECAY_NUMERATOR};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct ReputationBook {
    scores: HashMap<Address, u64>,
}

impl ReputationBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn score(&self, worker: &Address) -> u64 {
        self.scores.get(worker).copied().unwrap_or(0)
    }

    /// Voting weight: `1 + score`.
    #[must_use]
    pub fn weight(&self, worker: &Address) -> u64 {
        self.score(worker).saturating_add(1)
    }

    pub fn reward(&mut self, worker: Address) {
        let score = self.scores.entry(worker).or_insert(0);
        *score = score.saturating_add(1);
        debug!(worker = %worker, score = *score, "Score increased");
    }

    pub fn penalize(&mut self, worker: Address) {
        let score = self.score(&worker);
        let decayed = u64::try_from(
            u128::from(score) * u128::from(SCORE_DECAY_NUMERATOR) / u128::from(SCORE_DECAY_DENOMINATOR),
        )
        .unwrap_or(score);
        if decayed == 0 {
            self.scores.remove(&worker);
        } else {
            self.scores.insert(worker, decayed);
        }
        debug!(worker = %worker, score = decayed, "Score decayed");
    }
}
