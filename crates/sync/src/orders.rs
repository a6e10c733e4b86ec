//! Offline-first access to the order collection.
//!
//! Orders are the only collection with partial updates. Online, a patch goes
//! to the remote API and its response is canonical. Offline, the patch is
//! applied to the mirrored record in place (additive advance, derived money
//! fields) and the patch itself is queued so replay sends exactly what the
//! operator asked for.

use atelier_core::{OrderId, TenantId};
use atelier_orders::{Expense, NewOrder, Order, OrderPatch};

use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use crate::mirror::{Mirrored, Tracked};
use crate::outbox::Operation;
use crate::query::QueryKey;

/// Tenant-gated reads and writes for orders.
#[derive(Debug, Clone)]
pub struct OrdersHandle {
    ctx: SyncContext,
}

impl OrdersHandle {
    pub(crate) fn new(ctx: SyncContext) -> Self {
        Self { ctx }
    }

    fn list_key(tenant_id: TenantId) -> QueryKey {
        QueryKey::collection(tenant_id, Order::COLLECTION)
    }

    /// List the active tenant's orders.
    pub async fn list(&self) -> SyncResult<Vec<Tracked<Order>>> {
        let tenant = self.ctx.require_tenant().await?;
        let tenant_id = tenant.tenant_id();
        let key = Self::list_key(tenant_id);

        if let Some(cached) = self.ctx.query_cache().get(&key).await {
            return serde_json::from_value(cached).map_err(|e| SyncError::Parse(e.to_string()));
        }

        let tracked: Vec<Tracked<Order>> = if self.ctx.connectivity().is_online() {
            let records = self.ctx.api().list_orders(tenant_id).await?;
            records.into_iter().map(Tracked::synced).collect()
        } else {
            self.ctx
                .mirror()
                .list::<Order>(tenant_id)
                .await
                .map_err(|e| SyncError::Mirror(e.to_string()))?
        };

        let snapshot =
            serde_json::to_value(&tracked).map_err(|e| SyncError::Parse(e.to_string()))?;
        self.ctx.query_cache().put(key, snapshot).await;
        Ok(tracked)
    }

    /// Take a new order.
    pub async fn create(&self, new: NewOrder) -> SyncResult<Tracked<Order>> {
        let tenant = self.ctx.require_tenant().await?;
        let tenant_id = tenant.tenant_id();
        let record = new.into_record(tenant_id)?;

        let tracked = if self.ctx.connectivity().is_online() {
            let canonical = self.ctx.api().create_order(&record).await?;
            if let Err(err) = self.ctx.mirror().upsert(&canonical).await {
                tracing::warn!("failed to warm mirror after order create: {err:?}");
            }
            Tracked::synced(canonical)
        } else {
            self.ctx
                .mirror()
                .insert_local(&record)
                .await
                .map_err(|e| SyncError::Mirror(e.to_string()))?;
            let payload =
                serde_json::to_value(&record).map_err(|e| SyncError::Parse(e.to_string()))?;
            self.ctx
                .outbox()
                .enqueue(
                    tenant_id,
                    Operation::CreateOrder,
                    record.id.to_string(),
                    payload,
                )
                .await
                .map_err(|e| SyncError::Outbox(e.to_string()))?;
            tracing::debug!(order = %record.id, "queued order create for replay");
            Tracked::unsynced(record)
        };

        self.ctx
            .query_cache()
            .invalidate(&Self::list_key(tenant_id))
            .await;
        Ok(tracked)
    }

    /// Apply a partial update to an order.
    ///
    /// Offline the target must already be mirrored; patching a record the
    /// mirror has never seen is refused rather than invented.
    pub async fn update(&self, order_id: OrderId, patch: OrderPatch) -> SyncResult<Tracked<Order>> {
        let tenant = self.ctx.require_tenant().await?;
        let tenant_id = tenant.tenant_id();
        patch.validate()?;

        let tracked = if self.ctx.connectivity().is_online() {
            let canonical = self.ctx.api().update_order(order_id, &patch).await?;
            Tracked::synced(canonical)
        } else {
            let mirrored = self
                .ctx
                .mirror()
                .get::<Order>(tenant_id, &order_id.to_string())
                .await
                .map_err(|e| SyncError::Mirror(e.to_string()))?
                .ok_or_else(|| SyncError::NotMirrored(order_id.to_string()))?;

            let mut record = mirrored.record;
            record.apply_patch(&patch);
            self.ctx
                .mirror()
                .apply_local(&record)
                .await
                .map_err(|e| SyncError::Mirror(e.to_string()))?;

            let payload =
                serde_json::to_value(&patch).map_err(|e| SyncError::Parse(e.to_string()))?;
            self.ctx
                .outbox()
                .enqueue(
                    tenant_id,
                    Operation::UpdateOrder,
                    order_id.to_string(),
                    payload,
                )
                .await
                .map_err(|e| SyncError::Outbox(e.to_string()))?;
            tracing::debug!(order = %order_id, "queued order update for replay");
            Tracked::unsynced(record)
        };

        self.ctx
            .query_cache()
            .invalidate(&Self::list_key(tenant_id))
            .await;
        Ok(tracked)
    }

    /// Append one expense. Derived money fields follow.
    pub async fn add_expense(&self, order: &Order, expense: Expense) -> SyncResult<Tracked<Order>> {
        self.update(order.id, order.with_expense(expense)).await
    }

    /// Remove the expense at `index`. Out-of-range indexes change nothing.
    pub async fn remove_expense(&self, order: &Order, index: usize) -> SyncResult<Tracked<Order>> {
        self.update(order.id, order.without_expense(index)).await
    }
}
