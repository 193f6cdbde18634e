//! # poco-matchcore
//!
//! Turns four independently signed orders into a funded [`Deal`].
//!
//! - [`validator`]: signature checks against the asset registry, and the
//!   pure compatibility rules between the four orders
//! - [`volume`]: how many units of each order hash have been consumed
//! - [`matcher`]: the [`DealMatcher`], which locks the deal cost and the
//!   scheduler stake, consumes volume, and records the deal
//!
//! [`Deal`]: poco_types::Deal

pub mod matcher;
pub mod validator;
pub mod volume;

pub use matcher::DealMatcher;
pub use validator::{OrderSet, SignedOrderSet, check_compatibility, order_signer, validate_signatures};
pub use volume::VolumeBook;
