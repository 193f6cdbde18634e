//! # poco-types
//!
//! Shared types, errors, and configuration for the **PoCo** compute
//! marketplace.
//!
//! This crate is the leaf dependency of the workspace. Every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`Address`], [`OrderHash`], [`DealId`], [`TaskId`], [`Bytes32`]
//! - **Order model**: [`AppOrder`], [`DatasetOrder`], [`WorkerpoolOrder`], [`RequestOrder`],
//!   the [`SignedOrder`] trait and the [`Order`] sum type
//! - **Capabilities**: [`Tag`]
//! - **Deal model**: [`Deal`], [`DealAsset`]
//! - **Task model**: [`Task`], [`TaskStatus`], [`Contribution`], [`ContributionStatus`]
//! - **Balance model**: [`Account`], [`Amount`]
//! - **Configuration**: [`ProtocolConfig`]
//! - **Collaborators**: [`AssetRegistry`], [`CategoryRegistry`], [`CallbackDispatcher`]
//! - **Errors**: [`PocoError`] with `POCO_ERR_` prefix codes
//! - **Crypto**: canonical hashing, result sealing, ed25519 signing helpers
//! - **Constants**: protocol ratios and defaults

pub mod balance;
pub mod collaborators;
pub mod config;
pub mod constants;
pub mod crypto;
pub mod deal;
pub mod error;
pub mod ids;
pub mod order;
pub mod tag;
pub mod task;

// Re-export all primary types at crate root for ergonomic imports:
//   use poco_types::{AppOrder, Deal, Task, PocoError, ...};

pub use balance::*;
pub use collaborators::*;
pub use config::*;
pub use deal::*;
pub use error::*;
pub use ids::*;
pub use order::*;
pub use tag::*;
pub use task::*;

// Constants and crypto helpers are accessed via `poco_types::constants::FOO`
// and `poco_types::crypto::foo` (not re-exported to avoid name collisions).
