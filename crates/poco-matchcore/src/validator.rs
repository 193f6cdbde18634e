//! Order validation.
//!
//! Two independent gates:
//!
//! 1. [`validate_signatures`]: every order is signed by the right party.
//!    App, dataset and workerpool orders are signed by the asset owner
//!    (resolved through the [`AssetRegistry`]); request orders by the
//!    requester. An order its signer presigned needs no signature.
//! 2. [`check_compatibility`]: the four orders agree with each other.
//!    Pure function of the order contents.

use crate::VolumeBook;
use poco_types::{
    Address, AppOrder, AssetKind, AssetRegistry, DatasetOrder, MatchParties, Order, OrderHash,
    PocoError, RequestOrder, Result, SignedOrder, Tag, WorkerpoolOrder,
};

/// One order of each kind, ready to be matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSet {
    pub app: AppOrder,
    /// Must be present iff the request names a dataset.
    pub dataset: Option<DatasetOrder>,
    pub workerpool: WorkerpoolOrder,
    pub request: RequestOrder,
}

impl OrderSet {
    /// The parties as seen by restriction fields.
    #[must_use]
    pub fn parties(&self) -> MatchParties {
        MatchParties {
            app: self.app.app,
            dataset: self.dataset.as_ref().map(|d| d.dataset),
            workerpool: self.workerpool.workerpool,
            requester: self.request.requester,
        }
    }

    /// Union of the tags the workerpool must offer.
    #[must_use]
    pub fn required_tag(&self) -> Tag {
        let dataset_tag = self.dataset.as_ref().map_or(Tag::NONE, |d| d.tag);
        self.app.tag | dataset_tag | self.request.tag
    }
}

/// Hashes and resolved signers of a validated [`OrderSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedOrderSet {
    pub app_hash: OrderHash,
    pub dataset_hash: Option<OrderHash>,
    pub workerpool_hash: OrderHash,
    pub request_hash: OrderHash,
    pub app_owner: Address,
    pub dataset_owner: Option<Address>,
    /// Owner of the workerpool.
    pub scheduler: Address,
}

fn owner_of<R: AssetRegistry + ?Sized>(registry: &R, kind: AssetKind, asset: &Address) -> Result<Address> {
    registry.owner(kind, asset).ok_or(PocoError::UnknownAsset(*asset))
}

/// The address that must have signed `order`.
///
/// # Errors
/// `UnknownAsset` if the registry doesn't know the order's asset.
pub fn order_signer<R: AssetRegistry + ?Sized>(registry: &R, order: &Order) -> Result<Address> {
    match order {
        Order::App(o) => owner_of(registry, AssetKind::App, &o.app),
        Order::Dataset(o) => owner_of(registry, AssetKind::Dataset, &o.dataset),
        Order::Workerpool(o) => owner_of(registry, AssetKind::Workerpool, &o.workerpool),
        Order::Request(o) => Ok(o.requester),
    }
}

/// Order hash of `order`, accepted either because `signer` presigned it or
/// because its signature verifies.
fn authenticate<O: SignedOrder>(order: &O, signer: &Address, volumes: &VolumeBook) -> Result<OrderHash> {
    let hash = order.hash();
    if volumes.is_presigned(&hash) {
        return Ok(hash);
    }
    order.verify(signer)
}

/// Resolve signers and verify every signature of the set.
///
/// # Errors
/// `UnknownAsset` for an unregistered asset, `InvalidSignature` naming the
/// first order that is neither presigned nor correctly signed.
pub fn validate_signatures<R: AssetRegistry + ?Sized>(
    registry: &R,
    orders: &OrderSet,
    volumes: &VolumeBook,
) -> Result<SignedOrderSet> {
    let app_owner = owner_of(registry, AssetKind::App, &orders.app.app)?;
    let app_hash = authenticate(&orders.app, &app_owner, volumes)?;

    let (dataset_hash, dataset_owner) = match &orders.dataset {
        Some(dataset) => {
            let owner = owner_of(registry, AssetKind::Dataset, &dataset.dataset)?;
            (Some(authenticate(dataset, &owner, volumes)?), Some(owner))
        }
        None => (None, None),
    };

    let scheduler = owner_of(registry, AssetKind::Workerpool, &orders.workerpool.workerpool)?;
    let workerpool_hash = authenticate(&orders.workerpool, &scheduler, volumes)?;

    let request_hash = authenticate(&orders.request, &orders.request.requester, volumes)?;

    Ok(SignedOrderSet {
        app_hash,
        dataset_hash,
        workerpool_hash,
        request_hash,
        app_owner,
        dataset_owner,
        scheduler,
    })
}

fn incompatible(reason: impl Into<String>) -> PocoError {
    PocoError::IncompatibleOrders {
        reason: reason.into(),
    }
}

/// Check that the four orders can be matched together.
///
/// # Errors
/// `IncompatibleOrders` describing the first rule that fails.
pub fn check_compatibility(orders: &OrderSet) -> Result<()> {
    let OrderSet {
        app,
        dataset,
        workerpool,
        request,
    } = orders;

    // Assets
    if request.app != app.app {
        return Err(incompatible(format!(
            "request names app {} but app order sells {}",
            request.app, app.app
        )));
    }
    match (&request.dataset, dataset) {
        (None, None) => {}
        (Some(wanted), Some(order)) if *wanted == order.dataset => {}
        (Some(wanted), Some(order)) => {
            return Err(incompatible(format!(
                "request names dataset {wanted} but dataset order sells {}",
                order.dataset
            )));
        }
        (Some(wanted), None) => {
            return Err(incompatible(format!(
                "request names dataset {wanted} but no dataset order was given"
            )));
        }
        (None, Some(order)) => {
            return Err(incompatible(format!(
                "dataset order {} given but request names no dataset",
                order.dataset
            )));
        }
    }

    // Prices
    if app.app_price > request.app_max_price {
        return Err(incompatible(format!(
            "app price {} exceeds request max {}",
            app.app_price, request.app_max_price
        )));
    }
    if let Some(dataset) = dataset {
        if dataset.dataset_price > request.dataset_max_price {
            return Err(incompatible(format!(
                "dataset price {} exceeds request max {}",
                dataset.dataset_price, request.dataset_max_price
            )));
        }
    }
    if workerpool.workerpool_price > request.workerpool_max_price {
        return Err(incompatible(format!(
            "workerpool price {} exceeds request max {}",
            workerpool.workerpool_price, request.workerpool_max_price
        )));
    }

    // Category and trust
    if request.category != workerpool.category {
        return Err(incompatible(format!(
            "request category {} != workerpool category {}",
            request.category, workerpool.category
        )));
    }
    if request.trust < workerpool.trust {
        return Err(incompatible(format!(
            "request trust {} below workerpool trust {}",
            request.trust, workerpool.trust
        )));
    }

    // Tags
    let required = orders.required_tag();
    if !required.is_subset_of(workerpool.tag) {
        return Err(incompatible(format!(
            "workerpool tag {} does not cover required tag {required}",
            workerpool.tag
        )));
    }
    if required.requires_tee() && !app.tag.requires_tee() {
        return Err(incompatible("trusted execution required but app does not declare it"));
    }

    // Restrictions
    let parties = orders.parties();
    if !app.restrictions_satisfied(&parties) {
        return Err(incompatible("app order restrictions not satisfied"));
    }
    if let Some(dataset) = dataset {
        if !dataset.restrictions_satisfied(&parties) {
            return Err(incompatible("dataset order restrictions not satisfied"));
        }
    }
    if !workerpool.restrictions_satisfied(&parties) {
        return Err(incompatible("workerpool order restrictions not satisfied"));
    }
    if !request.restrictions_satisfied(&parties) {
        return Err(incompatible(format!(
            "request restricted to another workerpool than {}",
            workerpool.workerpool
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use poco_types::InMemoryRegistry;
    use poco_types::crypto::TestSigner;
    use poco_types::test_helpers::signed;

    struct Fixture {
        registry: InMemoryRegistry,
        app_owner: TestSigner,
        dataset_owner: TestSigner,
        scheduler: TestSigner,
        requester: TestSigner,
    }

    const APP: Address = Address([0x0a; 32]);
    const DATASET: Address = Address([0x0d; 32]);
    const POOL: Address = Address([0x0e; 32]);

    fn fixture() -> Fixture {
        let app_owner = TestSigner::from_seed(1);
        let dataset_owner = TestSigner::from_seed(2);
        let scheduler = TestSigner::from_seed(3);
        let requester = TestSigner::from_seed(4);
        let mut registry = InMemoryRegistry::new();
        registry.register(AssetKind::App, APP, app_owner.address());
        registry.register(AssetKind::Dataset, DATASET, dataset_owner.address());
        registry.register(AssetKind::Workerpool, POOL, scheduler.address());
        Fixture {
            registry,
            app_owner,
            dataset_owner,
            scheduler,
            requester,
        }
    }

    fn orders(f: &Fixture, with_dataset: bool) -> OrderSet {
        let mut request = RequestOrder::new(APP, 3, f.requester.address(), 1, 0);
        request.workerpool_max_price = 25;
        let dataset = with_dataset.then(|| {
            request.dataset = Some(DATASET);
            request.dataset_max_price = 1;
            signed(DatasetOrder::new(DATASET, 1, 1), &f.dataset_owner)
        });
        OrderSet {
            app: signed(AppOrder::new(APP, 3, 1), &f.app_owner),
            dataset,
            workerpool: signed(WorkerpoolOrder::new(POOL, 25, 1, 0), &f.scheduler),
            request: signed(request, &f.requester),
        }
    }

    fn reason(err: PocoError) -> String {
        match err {
            PocoError::IncompatibleOrders { reason } => reason,
            other => panic!("expected IncompatibleOrders, got {other:?}"),
        }
    }

    #[test]
    fn valid_set_passes_both_gates() {
        let f = fixture();
        for with_dataset in [false, true] {
            let set = orders(&f, with_dataset);
            let signed = validate_signatures(&f.registry, &set, &VolumeBook::new()).unwrap();
            assert_eq!(signed.scheduler, f.scheduler.address());
            assert_eq!(signed.dataset_hash.is_some(), with_dataset);
            check_compatibility(&set).unwrap();
        }
    }

    #[test]
    fn wrong_signer_rejected() {
        let f = fixture();
        let mut set = orders(&f, false);
        set.workerpool = signed(set.workerpool.clone(), &f.requester);
        assert_eq!(
            validate_signatures(&f.registry, &set, &VolumeBook::new()).unwrap_err(),
            PocoError::InvalidSignature {
                what: "workerpool order"
            }
        );
    }

    #[test]
    fn presigned_order_needs_no_signature() {
        let f = fixture();
        let mut set = orders(&f, false);
        set.workerpool.signature.clear();
        let mut volumes = VolumeBook::new();
        assert!(validate_signatures(&f.registry, &set, &volumes).is_err());

        volumes.presign(set.workerpool.hash());
        let signed = validate_signatures(&f.registry, &set, &volumes).unwrap();
        assert_eq!(signed.workerpool_hash, set.workerpool.hash());
    }

    #[test]
    fn unknown_asset_rejected() {
        let f = fixture();
        let mut set = orders(&f, false);
        set.app.app = Address([0x77; 32]);
        assert_eq!(
            validate_signatures(&f.registry, &set, &VolumeBook::new()).unwrap_err(),
            PocoError::UnknownAsset(Address([0x77; 32]))
        );
    }

    #[test]
    fn request_signer_is_requester() {
        let f = fixture();
        let set = orders(&f, false);
        let order = Order::Request(set.request.clone());
        assert_eq!(order_signer(&f.registry, &order).unwrap(), f.requester.address());
        let order = Order::App(set.app);
        assert_eq!(order_signer(&f.registry, &order).unwrap(), f.app_owner.address());
    }

    #[test]
    fn price_above_max_rejected() {
        let f = fixture();
        let mut set = orders(&f, false);
        set.workerpool.workerpool_price = 26;
        assert!(reason(check_compatibility(&set).unwrap_err()).contains("workerpool price"));
    }

    #[test]
    fn dataset_presence_must_match_request() {
        let f = fixture();
        let mut set = orders(&f, true);
        set.dataset = None;
        assert!(reason(check_compatibility(&set).unwrap_err()).contains("no dataset order"));

        let mut set = orders(&f, true);
        set.request.dataset = None;
        assert!(reason(check_compatibility(&set).unwrap_err()).contains("names no dataset"));
    }

    #[test]
    fn category_and_trust() {
        let f = fixture();
        let mut set = orders(&f, false);
        set.request.category = 1;
        assert!(reason(check_compatibility(&set).unwrap_err()).contains("category"));

        let mut set = orders(&f, false);
        set.workerpool.trust = 5;
        set.request.trust = 4;
        assert!(reason(check_compatibility(&set).unwrap_err()).contains("trust"));
        set.request.trust = 5;
        check_compatibility(&set).unwrap();
    }

    #[test]
    fn tags_must_be_covered_by_workerpool() {
        let f = fixture();
        let mut set = orders(&f, false);
        set.request.tag = Tag(0b10);
        assert!(reason(check_compatibility(&set).unwrap_err()).contains("tag"));
        set.workerpool.tag = Tag(0b10);
        check_compatibility(&set).unwrap();
    }

    #[test]
    fn tee_requires_app_declaration() {
        let f = fixture();
        let mut set = orders(&f, false);
        set.request.tag = Tag::TEE;
        set.workerpool.tag = Tag::TEE;
        assert!(reason(check_compatibility(&set).unwrap_err()).contains("trusted execution"));
        set.app.tag = Tag::TEE;
        check_compatibility(&set).unwrap();
    }

    #[test]
    fn restrictions_enforced() {
        let f = fixture();
        let mut set = orders(&f, false);
        set.app.requester_restrict = Some(Address([0x99; 32]));
        assert!(reason(check_compatibility(&set).unwrap_err()).contains("app order"));

        let mut set = orders(&f, false);
        set.workerpool.app_restrict = Some(APP);
        check_compatibility(&set).unwrap();

        let mut set = orders(&f, false);
        set.request.workerpool = Some(Address([0x99; 32]));
        assert!(reason(check_compatibility(&set).unwrap_err()).contains("another workerpool"));
    }
}
