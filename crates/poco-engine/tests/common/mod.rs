//! Shared market fixture for the engine integration tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeDelta, Utc};
use poco_engine::{ContributionRequest, OrderSet, Poco};
use poco_types::crypto::{self, TestSigner};
use poco_types::test_helpers::{random_salt, signed};
use poco_types::{
    Address, AppOrder, AssetKind, Bytes32, CallbackLog, CategoryTable, DatasetOrder, DealId,
    InMemoryRegistry, ProtocolConfig, RequestOrder, TaskId, WorkerpoolOrder,
};

pub const APP: Address = Address([0x0a; 32]);
pub const DATASET: Address = Address([0x0d; 32]);
pub const POOL: Address = Address([0x0e; 32]);
pub const CALLBACK: Address = Address([0xcb; 32]);

pub const TIME_REF: i64 = 300;
pub const APP_PRICE: u64 = 3;
pub const POOL_PRICE: u64 = 25;
/// 30% of the workerpool price, rounded down.
pub const STAKE: u64 = 7;
pub const FUNDING: u64 = 1_000;
pub const WORKER_FUNDING: u64 = 100;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn t0() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// `t0` plus `multiples` of the category reference time.
pub fn after(multiples: i64) -> DateTime<Utc> {
    t0() + TimeDelta::seconds(TIME_REF * multiples)
}

pub fn digest(byte: u8) -> Bytes32 {
    Bytes32([byte; 32])
}

pub struct Market {
    pub poco: Poco,
    pub app_owner: TestSigner,
    pub dataset_owner: TestSigner,
    pub scheduler: TestSigner,
    pub requester: TestSigner,
    pub workers: Vec<TestSigner>,
}

impl Market {
    pub fn new() -> Self {
        Self::with_callbacks(CallbackLog::new())
    }

    pub fn with_callbacks(callbacks: CallbackLog) -> Self {
        init_tracing();
        let app_owner = TestSigner::from_seed(1);
        let dataset_owner = TestSigner::from_seed(2);
        let scheduler = TestSigner::from_seed(3);
        let requester = TestSigner::from_seed(4);
        let workers: Vec<TestSigner> = (10..15).map(TestSigner::from_seed).collect();

        let mut registry = InMemoryRegistry::new();
        registry.register(AssetKind::App, APP, app_owner.address());
        registry.register(AssetKind::Dataset, DATASET, dataset_owner.address());
        registry.register(AssetKind::Workerpool, POOL, scheduler.address());

        let mut poco = Poco::new(
            ProtocolConfig::default(),
            registry,
            CategoryTable::with_time_refs(&[300]),
            callbacks,
        )
        .unwrap();
        poco.deposit(requester.address(), FUNDING).unwrap();
        poco.deposit(scheduler.address(), FUNDING).unwrap();
        for worker in &workers {
            poco.deposit(worker.address(), WORKER_FUNDING).unwrap();
        }

        Self {
            poco,
            app_owner,
            dataset_owner,
            scheduler,
            requester,
            workers,
        }
    }

    pub fn worker(&self, i: usize) -> Address {
        self.workers[i].address()
    }

    /// App, workerpool and request orders; `edit` tweaks the request
    /// before it's signed.
    pub fn orders(&self, volume: u64, edit: impl FnOnce(&mut RequestOrder)) -> OrderSet {
        let mut request = RequestOrder::new(APP, APP_PRICE, self.requester.address(), volume, 0);
        request.workerpool_max_price = POOL_PRICE;
        request.salt = random_salt();
        edit(&mut request);
        let mut workerpool = WorkerpoolOrder::new(POOL, POOL_PRICE, volume, 0);
        workerpool.salt = random_salt();
        let mut app = AppOrder::new(APP, APP_PRICE, volume);
        app.salt = random_salt();
        OrderSet {
            app: signed(app, &self.app_owner),
            dataset: None,
            workerpool: signed(workerpool, &self.scheduler),
            request: signed(request, &self.requester),
        }
    }

    pub fn with_dataset(&self, mut orders: OrderSet, price: u64) -> OrderSet {
        let mut request = orders.request.clone();
        request.dataset = Some(DATASET);
        request.dataset_max_price = price;
        orders.request = signed(request, &self.requester);
        let mut dataset = DatasetOrder::new(DATASET, price, orders.app.volume);
        dataset.salt = random_salt();
        orders.dataset = Some(signed(dataset, &self.dataset_owner));
        orders
    }

    /// Match a deal of `volume` tasks with the given trust, at `t0`.
    pub fn deal(&mut self, volume: u64, trust: u64) -> DealId {
        let orders = self.orders(volume, |r| r.trust = trust);
        self.poco.match_orders(&orders, t0()).unwrap()
    }

    pub fn initialize(&mut self, deal: DealId, index: u64) -> TaskId {
        let scheduler = self.scheduler.address();
        self.poco.initialize(scheduler, deal, index).unwrap()
    }

    /// A scheduler-authorized contribution of `digest` by worker `i`.
    pub fn contribution(&self, task_id: TaskId, i: usize, digest: Bytes32) -> ContributionRequest {
        let worker = self.worker(i);
        ContributionRequest {
            task_id,
            worker,
            result_hash: crypto::result_hash(&task_id, &digest),
            result_seal: crypto::result_seal(&worker, &task_id, &digest),
            enclave: None,
            enclave_signature: Vec::new(),
            authorization: self
                .scheduler
                .sign(&crypto::authorization_payload(&worker, &task_id, None)),
        }
    }

    pub fn contribute(&mut self, task_id: TaskId, i: usize, digest: Bytes32, now: DateTime<Utc>) {
        let request = self.contribution(task_id, i, digest);
        self.poco.contribute(&request, now).unwrap();
    }

    /// Sum of every deposit made by [`Market::new`].
    pub fn funded_supply(&self) -> u128 {
        u128::from(2 * FUNDING + WORKER_FUNDING * self.workers.len() as u64)
    }
}
