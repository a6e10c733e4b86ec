//! Replay of queued offline writes.
//!
//! A pass drains one tenant's replayable outbox entries in creation order.
//! Confirmed entries refresh the mirror and drop the affected cached reads.
//! A rejection parks the entry as failed and the pass moves on; a dropped
//! connection returns the entry to pending, flips the connectivity oracle
//! and stops the pass. Replay only ever runs when asked to.

use atelier_clients::Client;
use atelier_core::{OrderId, TenantId};
use atelier_measurements::Measurement;
use atelier_orders::{Order, OrderPatch};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::api::ApiError;
use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use crate::mirror::Mirrored;
use crate::outbox::{Operation, OutboxEntry};
use crate::query::QueryKey;

/// Outcome of one replay pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplayReport {
    /// Entries confirmed by the remote API.
    pub synced: usize,
    /// Entries rejected and parked as failed, with the sanitized reason.
    pub failed: Vec<(Uuid, String)>,
    /// Entries still pending when the pass ended.
    pub deferred: usize,
}

impl ReplayReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.deferred == 0
    }
}

/// Pushes queued writes to the remote API.
#[derive(Debug, Clone)]
pub struct ReplayEngine {
    ctx: SyncContext,
}

impl ReplayEngine {
    pub(crate) fn new(ctx: SyncContext) -> Self {
        Self { ctx }
    }

    /// Probe the remote health endpoint and set the connectivity oracle to
    /// what it found.
    pub async fn probe(&self) -> bool {
        let online = self.ctx.api().health().await;
        if online {
            self.ctx.connectivity().set_online();
        } else {
            self.ctx.connectivity().set_offline();
        }
        online
    }

    /// Replay the outbox of the active tenant.
    pub async fn replay_current(&self) -> SyncResult<ReplayReport> {
        let tenant = self.ctx.require_tenant().await?;
        self.replay_tenant(tenant.tenant_id()).await
    }

    /// Replay one tenant's queued writes, oldest first.
    pub async fn replay_tenant(&self, tenant_id: TenantId) -> SyncResult<ReplayReport> {
        let entries = self
            .ctx
            .outbox()
            .list_replayable(tenant_id)
            .await
            .map_err(|e| SyncError::Outbox(e.to_string()))?;

        let mut report = ReplayReport::default();
        if entries.is_empty() {
            return Ok(report);
        }
        if self.ctx.connectivity().is_offline() {
            report.deferred = entries.len();
            return Ok(report);
        }

        let total = entries.len();
        tracing::info!(tenant = %tenant_id, entries = total, "replaying outbox");

        for (index, entry) in entries.iter().enumerate() {
            self.ctx
                .outbox()
                .mark_inflight(entry.id)
                .await
                .map_err(|e| SyncError::Outbox(e.to_string()))?;

            match self.replay_entry(entry).await {
                Ok(invalidated) => {
                    self.ctx
                        .outbox()
                        .mark_synced(entry.id)
                        .await
                        .map_err(|e| SyncError::Outbox(e.to_string()))?;
                    self.ctx.query_cache().invalidate(&invalidated).await;
                    report.synced += 1;
                }
                Err(err) if err.is_network() => {
                    tracing::warn!(entry = %entry.id, "replay lost the network, deferring the rest: {err}");
                    self.ctx
                        .outbox()
                        .requeue(entry.id)
                        .await
                        .map_err(|e| SyncError::Outbox(e.to_string()))?;
                    self.ctx.connectivity().set_offline();
                    report.deferred = total - index;
                    break;
                }
                Err(err) => {
                    let reason = err.to_string();
                    tracing::warn!(entry = %entry.id, "replay entry rejected: {reason}");
                    self.ctx
                        .outbox()
                        .mark_failed(entry.id, &reason)
                        .await
                        .map_err(|e| SyncError::Outbox(e.to_string()))?;
                    report.failed.push((entry.id, reason));
                }
            }
        }

        tracing::info!(
            tenant = %tenant_id,
            synced = report.synced,
            failed = report.failed.len(),
            deferred = report.deferred,
            "replay pass finished"
        );
        Ok(report)
    }

    async fn replay_entry(&self, entry: &OutboxEntry) -> Result<QueryKey, ApiError> {
        match entry.operation {
            Operation::CreateClient => {
                let record: Client = decode_payload(&entry.payload)?;
                let canonical = self.ctx.api().create_client(&record).await?;
                self.refresh_created(entry, &entry.record_id, &canonical).await;
                Ok(QueryKey::collection(entry.tenant_id, Client::COLLECTION))
            }
            Operation::CreateMeasurement => {
                let record: Measurement = decode_payload(&entry.payload)?;
                let canonical = self.ctx.api().create_measurement(&record).await?;
                let client_id = canonical.client_id;
                self.refresh_created(entry, &entry.record_id, &canonical).await;
                Ok(QueryKey::for_client(
                    entry.tenant_id,
                    Measurement::COLLECTION,
                    client_id,
                ))
            }
            Operation::CreateOrder => {
                let record: Order = decode_payload(&entry.payload)?;
                let canonical = self.ctx.api().create_order(&record).await?;
                self.refresh_created(entry, &entry.record_id, &canonical).await;
                Ok(QueryKey::collection(entry.tenant_id, Order::COLLECTION))
            }
            Operation::UpdateOrder => {
                let patch: OrderPatch = decode_payload(&entry.payload)?;
                let order_id = entry
                    .record_id
                    .parse::<OrderId>()
                    .map_err(|e| ApiError::Decode(e.to_string()))?;
                let canonical = self.ctx.api().update_order(order_id, &patch).await?;
                if let Err(err) = self.ctx.mirror().upsert(&canonical).await {
                    tracing::warn!("failed to refresh mirror after replayed update: {err:?}");
                }
                Ok(QueryKey::collection(entry.tenant_id, Order::COLLECTION))
            }
        }
    }

    /// Refresh the mirror with the canonical record once the remote API has
    /// confirmed a create. If the server re-keyed the record the provisional
    /// row is dropped so it cannot linger as a duplicate.
    async fn refresh_created<T: Mirrored>(&self, entry: &OutboxEntry, local_id: &str, canonical: &T) {
        if canonical.record_id() != local_id {
            if let Err(err) = self
                .ctx
                .mirror()
                .delete(entry.tenant_id, T::COLLECTION, local_id)
                .await
            {
                tracing::warn!("failed to drop re-keyed mirror row: {err:?}");
            }
        }
        if let Err(err) = self.ctx.mirror().upsert(canonical).await {
            tracing::warn!("failed to refresh mirror after replay: {err:?}");
        }
    }
}

fn decode_payload<T: DeserializeOwned>(payload: &Value) -> Result<T, ApiError> {
    serde_json::from_value(payload.clone()).map_err(|e| ApiError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbox::EntryStatus;
    use atelier_clients::NewClient;
    use atelier_core::{ClientId, GarmentType};
    use atelier_orders::NewOrder;
    use atelier_tenancy::{Tenant, TenantContext};

    async fn offline_ctx_with_tenant() -> (SyncContext, TenantId) {
        let ctx = SyncContext::builder("http://127.0.0.1:9")
            .store_in_memory()
            .start_offline()
            .build();
        let tenant = Tenant::new("Atelier Yasmine", "yasmine").unwrap();
        let tenant_id = tenant.id;
        ctx.tenant_slot().set(TenantContext::new(tenant)).await;
        (ctx, tenant_id)
    }

    fn new_client(name: &str) -> NewClient {
        NewClient {
            name: name.to_string(),
            ..NewClient::default()
        }
    }

    #[tokio::test]
    async fn replay_without_a_tenant_is_refused() {
        let ctx = SyncContext::in_memory("http://127.0.0.1:9");
        match ctx.replay().replay_current().await {
            Err(SyncError::TenantUnresolved) => {}
            other => panic!("expected TenantUnresolved, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_outbox_yields_a_clean_report_without_network() {
        // The API endpoint is dead; a clean pass proves nothing was sent.
        let (ctx, tenant_id) = offline_ctx_with_tenant().await;
        ctx.connectivity().set_online();

        let report = ctx.replay().replay_tenant(tenant_id).await.unwrap();
        assert!(report.is_clean());
        assert_eq!(report.synced, 0);
    }

    #[tokio::test]
    async fn offline_pass_defers_everything_untouched() {
        let (ctx, tenant_id) = offline_ctx_with_tenant().await;
        ctx.clients().create(new_client("Ahmed Alaoui")).await.unwrap();
        ctx.clients().create(new_client("Fatima Zahra")).await.unwrap();

        let report = ctx.replay().replay_tenant(tenant_id).await.unwrap();
        assert_eq!(report.deferred, 2);
        assert_eq!(report.synced, 0);

        let entries = ctx.outbox().list(tenant_id).await.unwrap();
        assert!(entries.iter().all(|e| e.status == EntryStatus::Pending));
    }

    #[tokio::test]
    async fn dropped_connection_requeues_and_flips_offline() {
        let (ctx, tenant_id) = offline_ctx_with_tenant().await;
        ctx.clients().create(new_client("Ahmed Alaoui")).await.unwrap();
        ctx.orders()
            .create(NewOrder {
                client_id: ClientId::new(),
                garment_type: GarmentType::Jellaba,
                total_price: 800,
                advance_payment: 0,
                due_date: None,
                expenses: Vec::new(),
                production_steps: Vec::new(),
            })
            .await
            .unwrap();

        // The oracle says online but nothing listens on the API port.
        ctx.connectivity().set_online();
        let report = ctx.replay().replay_tenant(tenant_id).await.unwrap();

        assert_eq!(report.synced, 0);
        assert_eq!(report.deferred, 2);
        assert!(ctx.connectivity().is_offline());

        let entries = ctx.outbox().list(tenant_id).await.unwrap();
        assert!(entries.iter().all(|e| e.status == EntryStatus::Pending));
    }

    #[tokio::test]
    async fn probe_flips_the_oracle_when_the_api_is_down() {
        let (ctx, _) = offline_ctx_with_tenant().await;
        ctx.connectivity().set_online();

        assert!(!ctx.replay().probe().await);
        assert!(ctx.connectivity().is_offline());
    }
}
