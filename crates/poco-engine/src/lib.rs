//! # poco-engine
//!
//! The public face of the PoCo marketplace.
//!
//! [`Poco`] wires the matcher, the task book, the ledger and the settlement
//! engine to the external collaborators (asset registry, category registry,
//! callback dispatcher). Every mutating call runs on a staged copy of the
//! [`Store`] that is committed only if the call succeeds and the ledger's
//! supply still balances.
//!
//! ```text
//! match_orders ─► initialize ─► contribute* ─► reveal* ─► finalize
//!                                   │                        │
//!                                   └──────── claim ◄────────┘ (on timeout)
//! ```

pub mod poco;
pub mod store;

pub use poco::{ContributeAndFinalize, Poco};
pub use store::Store;

pub use poco_consensus::{ClaimKind, ContributeOutcome, ContributionRequest, RevealOutcome};
pub use poco_matchcore::OrderSet;
pub use poco_settlement::{ClaimReceipt, FinalizeReceipt};
