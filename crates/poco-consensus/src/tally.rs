//! Incremental weighted tally of result hashes.
//!
//! Each contribution adds its weight to the group of its result hash. The
//! tally never recounts: a group's weight is the running sum of the weights
//! recorded for it.

use poco_types::{Address, Bytes32};

/// Contributors that committed to the same result hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultGroup {
    pub result_hash: Bytes32,
    pub weight: u128,
    /// Arrival order.
    pub contributors: Vec<Address>,
}

/// Tally for one task. Groups are kept in first-arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsensusTally {
    groups: Vec<ResultGroup>,
    total_weight: u128,
}

impl ConsensusTally {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `weight` for `worker` to the group of `result_hash`; returns the
    /// group after the update.
    pub fn record(&mut self, result_hash: Bytes32, worker: Address, weight: u64) -> &ResultGroup {
        let weight = u128::from(weight);
        self.total_weight += weight;
        let index = match self.groups.iter().position(|g| g.result_hash == result_hash) {
            Some(index) => index,
            None => {
                self.groups.push(ResultGroup {
                    result_hash,
                    weight: 0,
                    contributors: Vec::new(),
                });
                self.groups.len() - 1
            }
        };
        let group = &mut self.groups[index];
        group.weight += weight;
        group.contributors.push(worker);
        group
    }

    #[must_use]
    pub fn group(&self, result_hash: &Bytes32) -> Option<&ResultGroup> {
        self.groups.iter().find(|g| g.result_hash == *result_hash)
    }

    #[must_use]
    pub fn groups(&self) -> &[ResultGroup] {
        &self.groups
    }

    #[must_use]
    pub fn total_weight(&self) -> u128 {
        self.total_weight
    }
}
