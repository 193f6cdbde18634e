//! Order types for the PoCo marketplace.
//!
//! Four kinds of signed intent meet in a match:
//!
//! | Order        | Signed by          | Sells / buys                        |
//! |--------------|--------------------|-------------------------------------|
//! | `AppOrder`   | app owner          | runs of an application              |
//! | `DatasetOrder` | dataset owner    | access to a dataset                 |
//! | `WorkerpoolOrder` | scheduler     | compute capacity of a workerpool    |
//! | `RequestOrder` | requester        | buys all of the above, bounded price|
//!
//! Orders are immutable once signed. The protocol never stores them; it
//! only tracks how many units of each order hash have been consumed.

use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Address, Amount, OrderHash, Result, Tag, address_or_zero, crypto};

/// Which of the four order kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum OrderKind {
    App,
    Dataset,
    Workerpool,
    Request,
}

impl OrderKind {
    /// Human-readable label, used in signature errors.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::App => "app order",
            Self::Dataset => "dataset order",
            Self::Workerpool => "workerpool order",
            Self::Request => "request order",
        }
    }
}

impl std::fmt::Display for OrderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::App => write!(f, "APP"),
            Self::Dataset => write!(f, "DATASET"),
            Self::Workerpool => write!(f, "WORKERPOOL"),
            Self::Request => write!(f, "REQUEST"),
        }
    }
}

/// The parties of a prospective match, used to evaluate restriction fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchParties {
    pub app: Address,
    pub dataset: Option<Address>,
    pub workerpool: Address,
    pub requester: Address,
}

/// `true` if `restrict` is unset or names exactly `party`.
#[must_use]
pub fn restriction_allows(restrict: Option<&Address>, party: Option<&Address>) -> bool {
    match restrict {
        None => true,
        Some(r) => party == Some(r),
    }
}

/// Behaviour shared by the four order kinds.
pub trait SignedOrder {
    const KIND: OrderKind;

    /// Canonical bytes covered by the signature (everything but the
    /// signature itself).
    fn signing_payload(&self) -> Vec<u8>;

    /// Maximum number of units this order can ever supply or buy.
    fn volume(&self) -> u64;

    fn signature(&self) -> &[u8];

    fn set_signature(&mut self, signature: Vec<u8>);

    /// Restriction fields of this order accept the given parties.
    fn restrictions_satisfied(&self, parties: &MatchParties) -> bool;

    /// Canonical struct hash. Pure function of the order content.
    fn hash(&self) -> OrderHash {
        OrderHash(Sha256::digest(self.signing_payload()).into())
    }

    /// Sign the order hash with `key`, replacing any previous signature.
    fn sign_with(&mut self, key: &SigningKey) {
        let hash = self.hash();
        self.set_signature(crypto::sign(key, &hash.0));
    }

    /// Verify the signature against `signer`; returns the order hash.
    ///
    /// # Errors
    /// Returns `InvalidSignature` if the signature doesn't verify.
    fn verify(&self, signer: &Address) -> Result<OrderHash> {
        let hash = self.hash();
        crypto::verify_signature(signer, &hash.0, self.signature(), Self::KIND.label())?;
        Ok(hash)
    }
}

// ---------------------------------------------------------------------------
// AppOrder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppOrder {
    pub app: Address,
    pub app_price: Amount,
    pub volume: u64,
    pub tag: Tag,
    pub dataset_restrict: Option<Address>,
    pub workerpool_restrict: Option<Address>,
    pub requester_restrict: Option<Address>,
    pub salt: [u8; 32],
    pub signature: Vec<u8>,
}

impl AppOrder {
    #[must_use]
    pub fn new(app: Address, app_price: Amount, volume: u64) -> Self {
        Self {
            app,
            app_price,
            volume,
            tag: Tag::NONE,
            dataset_restrict: None,
            workerpool_restrict: None,
            requester_restrict: None,
            salt: [0u8; 32],
            signature: Vec::new(),
        }
    }
}

impl SignedOrder for AppOrder {
    const KIND: OrderKind = OrderKind::App;

    fn signing_payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(256);
        payload.extend_from_slice(b"poco:app_order:v1:");
        payload.extend_from_slice(&self.app.0);
        payload.extend_from_slice(&self.app_price.to_le_bytes());
        payload.extend_from_slice(&self.volume.to_le_bytes());
        payload.extend_from_slice(&self.tag.bits().to_le_bytes());
        payload.extend_from_slice(&address_or_zero(self.dataset_restrict.as_ref()));
        payload.extend_from_slice(&address_or_zero(self.workerpool_restrict.as_ref()));
        payload.extend_from_slice(&address_or_zero(self.requester_restrict.as_ref()));
        payload.extend_from_slice(&self.salt);
        payload
    }

    fn volume(&self) -> u64 {
        self.volume
    }

    fn signature(&self) -> &[u8] {
        &self.signature
    }

    fn set_signature(&mut self, signature: Vec<u8>) {
        self.signature = signature;
    }

    fn restrictions_satisfied(&self, parties: &MatchParties) -> bool {
        restriction_allows(self.dataset_restrict.as_ref(), parties.dataset.as_ref())
            && restriction_allows(self.workerpool_restrict.as_ref(), Some(&parties.workerpool))
            && restriction_allows(self.requester_restrict.as_ref(), Some(&parties.requester))
    }
}

// ---------------------------------------------------------------------------
// DatasetOrder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetOrder {
    pub dataset: Address,
    pub dataset_price: Amount,
    pub volume: u64,
    pub tag: Tag,
    pub app_restrict: Option<Address>,
    pub workerpool_restrict: Option<Address>,
    pub requester_restrict: Option<Address>,
    pub salt: [u8; 32],
    pub signature: Vec<u8>,
}

impl DatasetOrder {
    #[must_use]
    pub fn new(dataset: Address, dataset_price: Amount, volume: u64) -> Self {
        Self {
            dataset,
            dataset_price,
            volume,
            tag: Tag::NONE,
            app_restrict: None,
            workerpool_restrict: None,
            requester_restrict: None,
            salt: [0u8; 32],
            signature: Vec::new(),
        }
    }
}

impl SignedOrder for DatasetOrder {
    const KIND: OrderKind = OrderKind::Dataset;

    fn signing_payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(256);
        payload.extend_from_slice(b"poco:dataset_order:v1:");
        payload.extend_from_slice(&self.dataset.0);
        payload.extend_from_slice(&self.dataset_price.to_le_bytes());
        payload.extend_from_slice(&self.volume.to_le_bytes());
        payload.extend_from_slice(&self.tag.bits().to_le_bytes());
        payload.extend_from_slice(&address_or_zero(self.app_restrict.as_ref()));
        payload.extend_from_slice(&address_or_zero(self.workerpool_restrict.as_ref()));
        payload.extend_from_slice(&address_or_zero(self.requester_restrict.as_ref()));
        payload.extend_from_slice(&self.salt);
        payload
    }

    fn volume(&self) -> u64 {
        self.volume
    }

    fn signature(&self) -> &[u8] {
        &self.signature
    }

    fn set_signature(&mut self, signature: Vec<u8>) {
        self.signature = signature;
    }

    fn restrictions_satisfied(&self, parties: &MatchParties) -> bool {
        restriction_allows(self.app_restrict.as_ref(), Some(&parties.app))
            && restriction_allows(self.workerpool_restrict.as_ref(), Some(&parties.workerpool))
            && restriction_allows(self.requester_restrict.as_ref(), Some(&parties.requester))
    }
}

// ---------------------------------------------------------------------------
// WorkerpoolOrder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerpoolOrder {
    pub workerpool: Address,
    pub workerpool_price: Amount,
    pub volume: u64,
    /// Capabilities the workerpool offers.
    pub tag: Tag,
    pub category: u64,
    /// Minimum trust the workerpool accepts to run.
    pub trust: u64,
    pub app_restrict: Option<Address>,
    pub dataset_restrict: Option<Address>,
    pub requester_restrict: Option<Address>,
    pub salt: [u8; 32],
    pub signature: Vec<u8>,
}

impl WorkerpoolOrder {
    #[must_use]
    pub fn new(workerpool: Address, workerpool_price: Amount, volume: u64, category: u64) -> Self {
        Self {
            workerpool,
            workerpool_price,
            volume,
            tag: Tag::NONE,
            category,
            trust: 0,
            app_restrict: None,
            dataset_restrict: None,
            requester_restrict: None,
            salt: [0u8; 32],
            signature: Vec::new(),
        }
    }
}

impl SignedOrder for WorkerpoolOrder {
    const KIND: OrderKind = OrderKind::Workerpool;

    fn signing_payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(256);
        payload.extend_from_slice(b"poco:workerpool_order:v1:");
        payload.extend_from_slice(&self.workerpool.0);
        payload.extend_from_slice(&self.workerpool_price.to_le_bytes());
        payload.extend_from_slice(&self.volume.to_le_bytes());
        payload.extend_from_slice(&self.tag.bits().to_le_bytes());
        payload.extend_from_slice(&self.category.to_le_bytes());
        payload.extend_from_slice(&self.trust.to_le_bytes());
        payload.extend_from_slice(&address_or_zero(self.app_restrict.as_ref()));
        payload.extend_from_slice(&address_or_zero(self.dataset_restrict.as_ref()));
        payload.extend_from_slice(&address_or_zero(self.requester_restrict.as_ref()));
        payload.extend_from_slice(&self.salt);
        payload
    }

    fn volume(&self) -> u64 {
        self.volume
    }

    fn signature(&self) -> &[u8] {
        &self.signature
    }

    fn set_signature(&mut self, signature: Vec<u8>) {
        self.signature = signature;
    }

    fn restrictions_satisfied(&self, parties: &MatchParties) -> bool {
        restriction_allows(self.app_restrict.as_ref(), Some(&parties.app))
            && restriction_allows(self.dataset_restrict.as_ref(), parties.dataset.as_ref())
            && restriction_allows(self.requester_restrict.as_ref(), Some(&parties.requester))
    }
}

// ---------------------------------------------------------------------------
// RequestOrder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOrder {
    pub app: Address,
    pub app_max_price: Amount,
    pub dataset: Option<Address>,
    pub dataset_max_price: Amount,
    /// `None` accepts any workerpool.
    pub workerpool: Option<Address>,
    pub workerpool_max_price: Amount,
    pub requester: Address,
    pub volume: u64,
    pub tag: Tag,
    pub category: u64,
    pub trust: u64,
    pub beneficiary: Address,
    pub callback: Option<Address>,
    /// Opaque execution parameters handed to workers.
    pub params: String,
    pub salt: [u8; 32],
    pub signature: Vec<u8>,
}

impl RequestOrder {
    #[must_use]
    pub fn new(app: Address, app_max_price: Amount, requester: Address, volume: u64, category: u64) -> Self {
        Self {
            app,
            app_max_price,
            dataset: None,
            dataset_max_price: 0,
            workerpool: None,
            workerpool_max_price: 0,
            requester,
            volume,
            tag: Tag::NONE,
            category,
            trust: 0,
            beneficiary: requester,
            callback: None,
            params: String::new(),
            salt: [0u8; 32],
            signature: Vec::new(),
        }
    }
}

impl SignedOrder for RequestOrder {
    const KIND: OrderKind = OrderKind::Request;

    fn signing_payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(384 + self.params.len());
        payload.extend_from_slice(b"poco:request_order:v1:");
        payload.extend_from_slice(&self.app.0);
        payload.extend_from_slice(&self.app_max_price.to_le_bytes());
        payload.extend_from_slice(&address_or_zero(self.dataset.as_ref()));
        payload.extend_from_slice(&self.dataset_max_price.to_le_bytes());
        payload.extend_from_slice(&address_or_zero(self.workerpool.as_ref()));
        payload.extend_from_slice(&self.workerpool_max_price.to_le_bytes());
        payload.extend_from_slice(&self.requester.0);
        payload.extend_from_slice(&self.volume.to_le_bytes());
        payload.extend_from_slice(&self.tag.bits().to_le_bytes());
        payload.extend_from_slice(&self.category.to_le_bytes());
        payload.extend_from_slice(&self.trust.to_le_bytes());
        payload.extend_from_slice(&self.beneficiary.0);
        payload.extend_from_slice(&address_or_zero(self.callback.as_ref()));
        payload.extend_from_slice(&(self.params.len() as u64).to_le_bytes());
        payload.extend_from_slice(self.params.as_bytes());
        payload.extend_from_slice(&self.salt);
        payload
    }

    fn volume(&self) -> u64 {
        self.volume
    }

    fn signature(&self) -> &[u8] {
        &self.signature
    }

    fn set_signature(&mut self, signature: Vec<u8>) {
        self.signature = signature;
    }

    /// The request's own references (app, dataset, workerpool) are checked
    /// by the validator; here only the workerpool may be left open.
    fn restrictions_satisfied(&self, parties: &MatchParties) -> bool {
        restriction_allows(self.workerpool.as_ref(), Some(&parties.workerpool))
    }
}

// ---------------------------------------------------------------------------
// Order sum type
// ---------------------------------------------------------------------------

/// Any of the four order kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    App(AppOrder),
    Dataset(DatasetOrder),
    Workerpool(WorkerpoolOrder),
    Request(RequestOrder),
}

impl Order {
    #[must_use]
    pub fn kind(&self) -> OrderKind {
        match self {
            Self::App(_) => OrderKind::App,
            Self::Dataset(_) => OrderKind::Dataset,
            Self::Workerpool(_) => OrderKind::Workerpool,
            Self::Request(_) => OrderKind::Request,
        }
    }

    #[must_use]
    pub fn hash(&self) -> OrderHash {
        match self {
            Self::App(o) => o.hash(),
            Self::Dataset(o) => o.hash(),
            Self::Workerpool(o) => o.hash(),
            Self::Request(o) => o.hash(),
        }
    }

    #[must_use]
    pub fn volume(&self) -> u64 {
        match self {
            Self::App(o) => o.volume,
            Self::Dataset(o) => o.volume,
            Self::Workerpool(o) => o.volume,
            Self::Request(o) => o.volume,
        }
    }

    /// Verify the signature against `signer`; returns the order hash.
    pub fn verify(&self, signer: &Address) -> Result<OrderHash> {
        match self {
            Self::App(o) => o.verify(signer),
            Self::Dataset(o) => o.verify(signer),
            Self::Workerpool(o) => o.verify(signer),
            Self::Request(o) => o.verify(signer),
        }
    }
}

impl From<AppOrder> for Order {
    fn from(order: AppOrder) -> Self {
        Self::App(order)
    }
}

impl From<DatasetOrder> for Order {
    fn from(order: DatasetOrder) -> Self {
        Self::Dataset(order)
    }
}

impl From<WorkerpoolOrder> for Order {
    fn from(order: WorkerpoolOrder) -> Self {
        Self::Workerpool(order)
    }
}

impl From<RequestOrder> for Order {
    fn from(order: RequestOrder) -> Self {
        Self::Request(order)
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use super::SignedOrder;
    use crate::crypto::TestSigner;

    /// Fresh random salt, so otherwise identical orders hash apart.
    #[must_use]
    pub fn random_salt() -> [u8; 32] {
        rand::random::<[u8; 32]>()
    }

    /// Sign the order as-is.
    pub fn signed<O: SignedOrder>(mut order: O, signer: &TestSigner) -> O {
        order.sign_with(signer.key());
        order
    }
}
