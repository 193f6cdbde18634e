//! Protocol configuration.

use serde::{Deserialize, Serialize};

use crate::{Address, PocoError, Result, constants};

/// Tunable protocol parameters.
///
/// Every field has a default from [`constants`], so a JSON config only
/// needs to name the values it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Percentage of the workerpool price staked by the scheduler per task.
    pub workerpool_stake_ratio: u64,
    /// Multiples of `time_ref` after deal start until contributions close.
    pub contribution_deadline_ratio: u64,
    /// Multiples of `time_ref` after consensus until reveals close.
    pub reveal_deadline_ratio: u64,
    /// Multiples of `time_ref` after deal start until the task must be finalized.
    pub final_deadline_ratio: u64,
    /// Percentage of the kitty paid out to a scheduler on finalize.
    pub kitty_ratio: u64,
    /// Minimum kitty payout on finalize.
    pub kitty_min: u64,
    /// Reserved account holding funds between a seize and a reward.
    pub escrow_account: Address,
    /// Reserved account whose locked balance is the slashing pool.
    pub kitty_account: Address,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            workerpool_stake_ratio: constants::WORKERPOOL_STAKE_RATIO,
            contribution_deadline_ratio: constants::CONTRIBUTION_DEADLINE_RATIO,
            reveal_deadline_ratio: constants::REVEAL_DEADLINE_RATIO,
            final_deadline_ratio: constants::FINAL_DEADLINE_RATIO,
            kitty_ratio: constants::KITTY_RATIO,
            kitty_min: constants::KITTY_MIN,
            escrow_account: Address::reserved(constants::ESCROW_ACCOUNT_LABEL),
            kitty_account: Address::reserved(constants::KITTY_ACCOUNT_LABEL),
        }
    }
}

impl ProtocolConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check ranges and internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.workerpool_stake_ratio > 100 {
            return Err(PocoError::Configuration(format!(
                "workerpool_stake_ratio {} exceeds 100",
                self.workerpool_stake_ratio
            )));
        }
        if self.kitty_ratio > 100 {
            return Err(PocoError::Configuration(format!(
                "kitty_ratio {} exceeds 100",
                self.kitty_ratio
            )));
        }
        if self.contribution_deadline_ratio == 0
            || self.reveal_deadline_ratio == 0
            || self.final_deadline_ratio == 0
        {
            return Err(PocoError::Configuration(
                "deadline ratios must be positive".into(),
            ));
        }
        if self.contribution_deadline_ratio >= self.final_deadline_ratio {
            return Err(PocoError::Configuration(format!(
                "contribution_deadline_ratio {} must be below final_deadline_ratio {}",
                self.contribution_deadline_ratio, self.final_deadline_ratio
            )));
        }
        if self.escrow_account == self.kitty_account {
            return Err(PocoError::Configuration(
                "escrow and kitty accounts must differ".into(),
            ));
        }
        Ok(())
    }
}
