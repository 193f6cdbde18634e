//! Capability tags.
//!
//! A tag is a bitmask of features an order requires (app, dataset, request)
//! or offers (workerpool). Bit 0 marks trusted execution: results must be
//! attested by an enclave.

use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag(pub u64);

impl Tag {
    pub const NONE: Self = Self(0);

    /// Trusted execution environment required.
    pub const TEE: Self = Self(1);

    #[must_use]
    pub fn bits(self) -> u64 {
        self.0
    }

    /// `true` if every bit of `self` is also set in `other`.
    #[must_use]
    pub fn is_subset_of(self, other: Self) -> bool {
        self.0 & !other.0 == 0
    }

    #[must_use]
    pub fn contains(self, other: Self) -> bool {
        other.is_subset_of(self)
    }

    #[must_use]
    pub fn requires_tee(self) -> bool {
        self.contains(Self::TEE)
    }
}

impl BitOr for Tag {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
