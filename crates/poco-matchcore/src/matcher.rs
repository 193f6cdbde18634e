//! Deal formation.
//!
//! ```text
//! match_orders(OrderSet) -> Deal
//! ```
//!
//! ## Algorithm
//!
//! 1. Resolve asset owners and verify all four signatures
//! 2. Check the orders are compatible
//! 3. `volume = min(remaining(app), remaining(dataset), remaining(workerpool), remaining(request))`
//! 4. Lock `task_price × volume` from the payer (requester or sponsor) and
//!    `stake_ratio% × workerpool_price × volume` from the scheduler, as one unit
//! 5. Consume `volume` units of every order
//! 6. Record the deal under `H(request_hash, consumed_before(request))`

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use poco_escrow::Ledger;
use poco_types::{
    Address, AssetRegistry, CategoryRegistry, Deal, DealAsset, DealId, DealOrders, Order,
    OrderHash, PocoError, ProtocolConfig, Result, percent_of, times,
};
use tracing::{debug, info};

use crate::validator::{OrderSet, check_compatibility, order_signer, validate_signatures};
use crate::VolumeBook;

/// Owns consumed volumes and every deal ever formed.
#[derive(Debug, Clone, Default)]
pub struct DealMatcher {
    volumes: VolumeBook,
    deals: HashMap<DealId, Deal>,
}

impl DealMatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Match `orders` into a new deal.
    ///
    /// `sponsor` pays the deal cost instead of the requester when set.
    ///
    /// # Errors
    /// `UnknownAsset`, `InvalidSignature`, `IncompatibleOrders`,
    /// `InvalidOrder` (unknown category), `Configuration` (workerpool policy
    /// ratio above 100), `OrderExhausted`,
    /// `InsufficientBalance` or `ArithmeticOverflow`. Nothing changes on
    /// error.
    #[allow(clippy::too_many_arguments)]
    pub fn match_orders<R, C>(
        &mut self,
        ledger: &mut Ledger,
        registry: &R,
        categories: &C,
        config: &ProtocolConfig,
        orders: &OrderSet,
        sponsor: Option<Address>,
        now: DateTime<Utc>,
    ) -> Result<Deal>
    where
        R: AssetRegistry + ?Sized,
        C: CategoryRegistry + ?Sized,
    {
        let signed = validate_signatures(registry, orders, &self.volumes)?;
        check_compatibility(orders)?;

        let category = orders.request.category;
        if categories.time_ref(category).is_none() {
            return Err(PocoError::InvalidOrder {
                reason: format!("unknown category {category}"),
            });
        }
        let policy = registry.workerpool_policy(&orders.workerpool.workerpool);
        policy.validate()?;

        // Volume
        let mut candidates: Vec<(OrderHash, u64)> = vec![
            (signed.app_hash, orders.app.volume),
            (signed.workerpool_hash, orders.workerpool.volume),
            (signed.request_hash, orders.request.volume),
        ];
        if let (Some(hash), Some(dataset)) = (signed.dataset_hash, &orders.dataset) {
            candidates.insert(1, (hash, dataset.volume));
        }
        let mut volume = u64::MAX;
        for (hash, declared) in &candidates {
            let remaining = self.volumes.remaining(hash, *declared);
            if remaining == 0 {
                return Err(PocoError::OrderExhausted(*hash));
            }
            volume = volume.min(remaining);
        }

        // Funds
        let app = DealAsset {
            pointer: orders.app.app,
            owner: signed.app_owner,
            price: orders.app.app_price,
        };
        let dataset = match (&orders.dataset, signed.dataset_owner) {
            (Some(order), Some(owner)) => Some(DealAsset {
                pointer: order.dataset,
                owner,
                price: order.dataset_price,
            }),
            _ => None,
        };
        let workerpool = DealAsset {
            pointer: orders.workerpool.workerpool,
            owner: signed.scheduler,
            price: orders.workerpool.workerpool_price,
        };

        let task_price = app
            .price
            .checked_add(dataset.map_or(0, |d| d.price))
            .and_then(|p| p.checked_add(workerpool.price))
            .ok_or(PocoError::ArithmeticOverflow)?;
        let deal_cost = times(task_price, volume)?;
        let scheduler_stake_per_task = percent_of(workerpool.price, config.workerpool_stake_ratio)?;
        let scheduler_stake = times(scheduler_stake_per_task, volume)?;

        let payer = sponsor.unwrap_or(orders.request.requester);
        ledger.lock_all(&[(payer, deal_cost), (signed.scheduler, scheduler_stake)])?;

        // Volume consumption cannot fail past this point: every order had
        // at least `volume` units remaining.
        let consumed_before = self.volumes.consumed(&signed.request_hash);
        for (hash, declared) in candidates {
            self.volumes.consume(hash, volume, declared)?;
        }

        let request = &orders.request;
        let deal = Deal {
            id: DealId::derive(&signed.request_hash, consumed_before),
            orders: DealOrders {
                app: signed.app_hash,
                dataset: signed.dataset_hash,
                workerpool: signed.workerpool_hash,
                request: signed.request_hash,
            },
            app,
            dataset,
            workerpool,
            requester: request.requester,
            sponsor: payer,
            beneficiary: request.beneficiary,
            callback: request.callback,
            params: request.params.clone(),
            tag: orders.required_tag(),
            category,
            trust: request.trust.max(1),
            volume,
            start_time: now,
            worker_stake: percent_of(workerpool.price, policy.worker_stake_ratio)?,
            scheduler_stake_per_task,
            scheduler_reward_ratio: policy.scheduler_reward_ratio,
        };

        info!(
            deal = %deal.id,
            volume,
            requester = %deal.requester,
            sponsor = %deal.sponsor,
            scheduler = %signed.scheduler,
            deal_cost,
            scheduler_stake,
            "Deal matched"
        );

        self.deals.insert(deal.id, deal.clone());
        Ok(deal)
    }

    /// Register `order` so it matches without a signature. Only its signer
    /// may do this.
    ///
    /// # Errors
    /// `UnknownAsset` or `NotAuthorized`.
    pub fn presign_order<R: AssetRegistry + ?Sized>(
        &mut self,
        registry: &R,
        caller: Address,
        order: &Order,
    ) -> Result<OrderHash> {
        require_signer(registry, caller, order)?;
        let hash = order.hash();
        self.volumes.presign(hash);
        debug!(order = %hash, kind = %order.kind(), "Order presigned");
        Ok(hash)
    }

    /// Mark `order` fully consumed. Only its signer may do this.
    ///
    /// # Errors
    /// `UnknownAsset` or `NotAuthorized`.
    pub fn cancel_order<R: AssetRegistry + ?Sized>(
        &mut self,
        registry: &R,
        caller: Address,
        order: &Order,
    ) -> Result<OrderHash> {
        require_signer(registry, caller, order)?;
        let hash = order.hash();
        self.volumes.cancel(hash, order.volume());
        debug!(order = %hash, kind = %order.kind(), "Order cancelled");
        Ok(hash)
    }

    #[must_use]
    pub fn deal(&self, id: &DealId) -> Option<&Deal> {
        self.deals.get(id)
    }

    /// Look up a deal or fail with `UnknownDeal`.
    pub fn require_deal(&self, id: &DealId) -> Result<&Deal> {
        self.deals.get(id).ok_or(PocoError::UnknownDeal(*id))
    }

    #[must_use]
    pub fn consumed(&self, hash: &OrderHash) -> u64 {
        self.volumes.consumed(hash)
    }

    #[must_use]
    pub fn deal_count(&self) -> usize {
        self.deals.len()
    }
}

fn require_signer<R: AssetRegistry + ?Sized>(registry: &R, caller: Address, order: &Order) -> Result<()> {
    if caller == order_signer(registry, order)? {
        Ok(())
    } else {
        Err(PocoError::NotAuthorized {
            role: "order signer",
            caller,
        })
    }
}
