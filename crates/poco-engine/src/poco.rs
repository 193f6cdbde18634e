//! The atomic marketplace facade.

use chrono::{DateTime, Utc};
use poco_consensus::{ClaimKind, ContributeOutcome, ContributionRequest, RevealOutcome, TaskBook};
use poco_matchcore::{DealMatcher, OrderSet};
use poco_settlement::{ClaimReceipt, FinalizeReceipt, SettlementEngine};
use poco_types::{
    Account, Address, AssetRegistry, Bytes32, CallbackDispatcher, CallbackLog, CategoryRegistry,
    CategoryTable, Deal, DealId, InMemoryRegistry, Order, OrderHash, PocoError, ProtocolConfig,
    Result, Task, TaskId, TaskStatus, crypto,
};
use tracing::{debug, warn};

use crate::Store;

/// A worker call that contributes and finalizes a trust-1 task at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributeAndFinalize {
    pub task_id: TaskId,
    pub worker: Address,
    /// Digest of the result; hash and seal are derived from it.
    pub digest: Bytes32,
    pub results: Vec<u8>,
    pub enclave: Option<Address>,
    pub enclave_signature: Vec<u8>,
    /// Scheduler signature over `(worker, task_id, enclave)`.
    pub authorization: Vec<u8>,
}

/// Read-only collaborators handed to a staged operation.
struct Context<'a, R, C> {
    config: &'a ProtocolConfig,
    registry: &'a R,
    categories: &'a C,
}

impl<R, C: CategoryRegistry> Context<'_, R, C> {
    fn time_ref(&self, deal: &Deal) -> Result<u64> {
        self.categories
            .time_ref(deal.category)
            .ok_or_else(|| PocoError::Configuration(format!("unknown category {}", deal.category)))
    }
}

/// The PoCo marketplace.
///
/// Every mutating method is all-or-nothing: on error the store is exactly
/// as it was before the call.
#[derive(Debug)]
pub struct Poco<R = InMemoryRegistry, C = CategoryTable, K = CallbackLog> {
    config: ProtocolConfig,
    registry: R,
    categories: C,
    callbacks: K,
    store: Store,
}

impl<R, C, K> Poco<R, C, K>
where
    R: AssetRegistry,
    C: CategoryRegistry,
    K: CallbackDispatcher,
{
    /// # Errors
    /// `Configuration` if `config` doesn't validate.
    pub fn new(config: ProtocolConfig, registry: R, categories: C, callbacks: K) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            registry,
            categories,
            callbacks,
            store: Store::new(),
        })
    }

    /// Run `op` on a staged copy of the store; commit only on success.
    fn atomically<T>(
        &mut self,
        op: impl FnOnce(&mut Store, &Context<'_, R, C>) -> Result<T>,
    ) -> Result<T> {
        let ctx = Context {
            config: &self.config,
            registry: &self.registry,
            categories: &self.categories,
        };
        let mut staged = self.store.clone();
        let out = op(&mut staged, &ctx)?;
        staged.ledger.verify_supply()?;
        self.store = staged;
        Ok(out)
    }

    // -----------------------------------------------------------------
    // Funds
    // -----------------------------------------------------------------

    pub fn deposit(&mut self, account: Address, amount: u64) -> Result<()> {
        self.atomically(|store, _| store.ledger.deposit(account, amount))
    }

    pub fn withdraw(&mut self, account: Address, amount: u64) -> Result<()> {
        self.atomically(|store, _| store.ledger.withdraw(account, amount))
    }

    // -----------------------------------------------------------------
    // Orders
    // -----------------------------------------------------------------

    /// Match four orders; the requester pays.
    pub fn match_orders(&mut self, orders: &OrderSet, now: DateTime<Utc>) -> Result<DealId> {
        self.match_with(orders, None, now)
    }

    /// Match four orders; `sponsor` pays instead of the requester.
    pub fn sponsor_match_orders(
        &mut self,
        sponsor: Address,
        orders: &OrderSet,
        now: DateTime<Utc>,
    ) -> Result<DealId> {
        self.match_with(orders, Some(sponsor), now)
    }

    fn match_with(
        &mut self,
        orders: &OrderSet,
        sponsor: Option<Address>,
        now: DateTime<Utc>,
    ) -> Result<DealId> {
        self.atomically(|store, ctx| {
            let deal = store.matcher.match_orders(
                &mut store.ledger,
                ctx.registry,
                ctx.categories,
                ctx.config,
                orders,
                sponsor,
                now,
            )?;
            Ok(deal.id)
        })
    }

    /// The signer of `order` registers it so it matches without a signature.
    pub fn presign_order(&mut self, caller: Address, order: &Order) -> Result<OrderHash> {
        self.atomically(|store, ctx| store.matcher.presign_order(ctx.registry, caller, order))
    }

    /// The signer of `order` withdraws it from the market.
    pub fn cancel_order(&mut self, caller: Address, order: &Order) -> Result<OrderHash> {
        self.atomically(|store, ctx| store.matcher.cancel_order(ctx.registry, caller, order))
    }

    // -----------------------------------------------------------------
    // Tasks
    // -----------------------------------------------------------------

    pub fn initialize(&mut self, caller: Address, deal_id: DealId, index: u64) -> Result<TaskId> {
        self.atomically(|store, ctx| initialize_in(store, ctx, caller, deal_id, index))
    }

    /// Initialize several tasks as one unit.
    pub fn initialize_array(
        &mut self,
        caller: Address,
        tasks: &[(DealId, u64)],
    ) -> Result<Vec<TaskId>> {
        self.atomically(|store, ctx| {
            tasks
                .iter()
                .map(|(deal_id, index)| initialize_in(store, ctx, caller, *deal_id, *index))
                .collect()
        })
    }

    pub fn contribute(
        &mut self,
        request: &ContributionRequest,
        now: DateTime<Utc>,
    ) -> Result<ContributeOutcome> {
        self.atomically(|store, ctx| {
            let Store {
                matcher,
                tasks,
                ledger,
                reputation,
            } = store;
            let deal = deal_of(matcher, tasks, &request.task_id)?;
            let time_ref = ctx.time_ref(deal)?;
            tasks.contribute(deal, ledger, reputation, ctx.config, time_ref, request, now)
        })
    }

    /// Contribute, prove and settle a trust-1 task in one call.
    pub fn contribute_and_finalize(
        &mut self,
        call: &ContributeAndFinalize,
        now: DateTime<Utc>,
    ) -> Result<FinalizeReceipt> {
        let (receipt, callback) = self.atomically(|store, ctx| {
            let Store {
                matcher,
                tasks,
                ledger,
                reputation,
            } = store;
            let deal = deal_of(matcher, tasks, &call.task_id)?;
            let request = ContributionRequest {
                task_id: call.task_id,
                worker: call.worker,
                result_hash: crypto::result_hash(&call.task_id, &call.digest),
                result_seal: crypto::result_seal(&call.worker, &call.task_id, &call.digest),
                enclave: call.enclave,
                enclave_signature: call.enclave_signature.clone(),
                authorization: call.authorization.clone(),
            };
            tasks.contribute_proved(
                deal,
                ledger,
                reputation,
                ctx.config,
                ctx.time_ref(deal)?,
                &request,
                &call.digest,
                now,
            )?;
            let receipt = SettlementEngine::new(ledger, reputation, ctx.config)
                .finalize(deal, tasks.require_task(&call.task_id)?)?;
            tasks.complete(&call.task_id, call.results.clone())?;
            Ok((receipt, deal.callback))
        })?;
        self.dispatch_callback(callback, &call.task_id, &call.results);
        Ok(receipt)
    }

    pub fn reveal(
        &mut self,
        task_id: &TaskId,
        worker: Address,
        digest: Bytes32,
        now: DateTime<Utc>,
    ) -> Result<RevealOutcome> {
        self.atomically(|store, _| store.tasks.reveal(task_id, worker, digest, now))
    }

    /// Scheduler-only: settle a revealed task and store its results.
    ///
    /// The deal's callback, if any, is invoked after the settlement is
    /// committed. A failed delivery is logged and doesn't undo anything.
    pub fn finalize(
        &mut self,
        caller: Address,
        task_id: &TaskId,
        results: Vec<u8>,
        now: DateTime<Utc>,
    ) -> Result<FinalizeReceipt> {
        let (receipt, callback) = self.atomically(|store, ctx| {
            let Store {
                matcher,
                tasks,
                ledger,
                reputation,
            } = store;
            let deal = deal_of(matcher, tasks, task_id)?;
            tasks.ensure_finalizable(deal, task_id, caller, now)?;
            let receipt = SettlementEngine::new(ledger, reputation, ctx.config)
                .finalize(deal, tasks.require_task(task_id)?)?;
            tasks.complete(task_id, results.clone())?;
            Ok((receipt, deal.callback))
        })?;
        self.dispatch_callback(callback, task_id, &results);
        Ok(receipt)
    }

    /// Anyone: fail a timed-out task and release its funds.
    pub fn claim(&mut self, task_id: &TaskId, now: DateTime<Utc>) -> Result<ClaimReceipt> {
        self.atomically(|store, ctx| claim_in(store, ctx.config, task_id, now))
    }

    /// Claim several tasks as one unit.
    pub fn claim_array(
        &mut self,
        task_ids: &[TaskId],
        now: DateTime<Utc>,
    ) -> Result<Vec<ClaimReceipt>> {
        self.atomically(|store, ctx| {
            task_ids
                .iter()
                .map(|task_id| claim_in(store, ctx.config, task_id, now))
                .collect()
        })
    }

    /// Anyone: fail a task the scheduler never initialized, once its
    /// contribution deadline has passed.
    pub fn initialize_and_claim(
        &mut self,
        deal_id: DealId,
        index: u64,
        now: DateTime<Utc>,
    ) -> Result<ClaimReceipt> {
        self.atomically(|store, ctx| {
            let deal = store.matcher.require_deal(&deal_id)?;
            let task_id = store.tasks.open(deal, index, ctx.time_ref(deal)?, ctx.config)?;
            claim_in(store, ctx.config, &task_id, now)
        })
    }

    fn dispatch_callback(&mut self, callback: Option<Address>, task_id: &TaskId, results: &[u8]) {
        let Some(callback) = callback else {
            return;
        };
        match self.callbacks.dispatch(&callback, task_id, results) {
            Ok(()) => debug!(task = %task_id, callback = %callback, "Callback delivered"),
            Err(reason) => warn!(task = %task_id, callback = %callback, %reason, "Callback failed"),
        }
    }

    // -----------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------

    #[must_use]
    pub fn deal(&self, id: &DealId) -> Option<&Deal> {
        self.store.matcher.deal(id)
    }

    #[must_use]
    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.store.tasks.task(id)
    }

    #[must_use]
    pub fn task_status(&self, id: &TaskId) -> TaskStatus {
        self.store.tasks.status(id)
    }

    #[must_use]
    pub fn balance(&self, account: &Address) -> Account {
        self.store.ledger.balance(account)
    }

    #[must_use]
    pub fn consumed(&self, order: &OrderHash) -> u64 {
        self.store.matcher.consumed(order)
    }

    #[must_use]
    pub fn score(&self, worker: &Address) -> u64 {
        self.store.reputation.score(worker)
    }

    #[must_use]
    pub fn total_supply(&self) -> u128 {
        self.store.ledger.total_supply()
    }

    #[must_use]
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    #[must_use]
    pub fn callbacks(&self) -> &K {
        &self.callbacks
    }

    pub fn registry_mut(&mut self) -> &mut R {
        &mut self.registry
    }

    pub fn categories_mut(&mut self) -> &mut C {
        &mut self.categories
    }
}

impl Poco {
    /// In-memory marketplace with default config.
    #[must_use]
    pub fn in_memory(registry: InMemoryRegistry, categories: CategoryTable) -> Self {
        Self {
            config: ProtocolConfig::default(),
            registry,
            categories,
            callbacks: CallbackLog::new(),
            store: Store::new(),
        }
    }
}

fn deal_of<'a>(
    matcher: &'a DealMatcher,
    tasks: &TaskBook,
    task_id: &TaskId,
) -> Result<&'a Deal> {
    let deal_id = tasks.require_task(task_id)?.deal_id;
    matcher.require_deal(&deal_id)
}

fn initialize_in<R, C: CategoryRegistry>(
    store: &mut Store,
    ctx: &Context<'_, R, C>,
    caller: Address,
    deal_id: DealId,
    index: u64,
) -> Result<TaskId> {
    let deal = store.matcher.require_deal(&deal_id)?;
    store
        .tasks
        .initialize(deal, index, caller, ctx.time_ref(deal)?, ctx.config)
}

fn claim_in(
    store: &mut Store,
    config: &ProtocolConfig,
    task_id: &TaskId,
    now: DateTime<Utc>,
) -> Result<ClaimReceipt> {
    let Store {
        matcher,
        tasks,
        ledger,
        reputation,
    } = store;
    let kind: ClaimKind = tasks.claim_kind(task_id, now)?;
    let deal = deal_of(matcher, tasks, task_id)?;
    let receipt = SettlementEngine::new(ledger, reputation, config).claim(
        deal,
        tasks.require_task(task_id)?,
        kind,
    )?;
    tasks.fail(task_id)?;
    Ok(receipt)
}
