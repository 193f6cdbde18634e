//! Error types for the PoCo marketplace.
//!
//! All errors use the `POCO_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Order errors
//! - 2xx: Ledger errors
//! - 3xx: Deal errors
//! - 4xx: Task lifecycle errors
//! - 5xx: Consensus errors
//! - 9xx: General / internal errors

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{Address, Amount, DealId, OrderHash, TaskId};

/// Central error enum for all PoCo operations.
///
/// Errors are `Clone` and comparable: a rejected reveal records its cause in
/// the outcome instead of aborting the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PocoError {
    // =================================================================
    // Order Errors (1xx)
    // =================================================================
    /// A signature (order, scheduler authorization, enclave attestation)
    /// didn't verify against the expected signer.
    #[error("POCO_ERR_100: Invalid signature on {what}")]
    InvalidSignature { what: &'static str },

    /// The order has no volume left.
    #[error("POCO_ERR_101: Order exhausted: {0}")]
    OrderExhausted(OrderHash),

    /// The four orders cannot be matched together.
    #[error("POCO_ERR_102: Incompatible orders: {reason}")]
    IncompatibleOrders { reason: String },

    /// The order is structurally invalid (zero volume, bad field).
    #[error("POCO_ERR_103: Invalid order: {reason}")]
    InvalidOrder { reason: String },

    /// The registry doesn't know the referenced asset.
    #[error("POCO_ERR_104: Unknown asset: {0}")]
    UnknownAsset(Address),

    // =================================================================
    // Ledger Errors (2xx)
    // =================================================================
    /// Not enough available balance to perform the operation.
    #[error("POCO_ERR_200: Insufficient available balance for {account}: need {needed}, have {available}")]
    InsufficientBalance {
        account: Address,
        needed: Amount,
        available: Amount,
    },

    /// Not enough locked balance to unlock or seize.
    #[error("POCO_ERR_201: Insufficient locked balance for {account}: need {needed}, have {locked}")]
    InsufficientLocked {
        account: Address,
        needed: Amount,
        locked: Amount,
    },

    /// An amount computation overflowed.
    #[error("POCO_ERR_202: Arithmetic overflow")]
    ArithmeticOverflow,

    /// Supply conservation invariant violated. Critical safety alert.
    #[error("POCO_ERR_203: Supply invariant violation: {reason}")]
    SupplyInvariantViolation { reason: String },

    // =================================================================
    // Deal Errors (3xx)
    // =================================================================
    /// No deal with this id.
    #[error("POCO_ERR_300: Deal not found: {0}")]
    UnknownDeal(DealId),

    /// The task index is outside the deal's volume.
    #[error("POCO_ERR_301: Task index {index} out of range for deal volume {volume}")]
    InvalidTaskIndex { index: u64, volume: u64 },

    // =================================================================
    // Task Lifecycle Errors (4xx)
    // =================================================================
    /// No task with this id.
    #[error("POCO_ERR_400: Task not found: {0}")]
    UnknownTask(TaskId),

    /// The operation is not allowed from the current task/contribution status.
    #[error("POCO_ERR_401: Cannot {operation} from status {status}")]
    InvalidStateTransition {
        operation: &'static str,
        status: String,
    },

    /// The caller does not hold the role this operation requires.
    #[error("POCO_ERR_402: {caller} is not authorized: {role} required")]
    NotAuthorized { role: &'static str, caller: Address },

    /// The relevant deadline has already passed.
    #[error("POCO_ERR_403: Deadline elapsed at {deadline}")]
    DeadlineElapsed { deadline: DateTime<Utc> },

    /// The relevant deadline has not passed yet.
    #[error("POCO_ERR_404: Deadline not elapsed until {deadline}")]
    DeadlineNotElapsed { deadline: DateTime<Utc> },

    // =================================================================
    // Consensus Errors (5xx)
    // =================================================================
    /// No contribution has been proved for this task.
    #[error("POCO_ERR_500: Consensus not reached")]
    ConsensusNotReached,

    /// The revealed digest doesn't reproduce the worker's sealed commitment.
    #[error("POCO_ERR_501: Result seal mismatch")]
    SealMismatch,

    /// The revealed digest (or the worker's commitment) doesn't match the
    /// task's consensus value.
    #[error("POCO_ERR_502: Result hash does not match consensus value")]
    ResultHashMismatch,

    /// The contribution is structurally invalid.
    #[error("POCO_ERR_503: Invalid contribution: {reason}")]
    InvalidContribution { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("POCO_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("POCO_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, out-of-range ratio, etc.).
    #[error("POCO_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, PocoError>;

impl From<serde_json::Error> for PocoError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
