//! Offline-first access to the client collection.

use atelier_clients::{Client, NewClient};
use atelier_core::TenantId;

use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use crate::mirror::{Mirrored, Tracked};
use crate::outbox::Operation;
use crate::query::QueryKey;

/// Tenant-gated reads and writes for clients.
#[derive(Debug, Clone)]
pub struct ClientsHandle {
    ctx: SyncContext,
}

impl ClientsHandle {
    pub(crate) fn new(ctx: SyncContext) -> Self {
        Self { ctx }
    }

    fn list_key(tenant_id: TenantId) -> QueryKey {
        QueryKey::collection(tenant_id, Client::COLLECTION)
    }

    /// List the active tenant's clients.
    ///
    /// Serves the cached result set when present. Otherwise reads the remote
    /// API online or the mirror offline, then caches what it saw. Reads
    /// never write the mirror.
    pub async fn list(&self) -> SyncResult<Vec<Tracked<Client>>> {
        let tenant = self.ctx.require_tenant().await?;
        let tenant_id = tenant.tenant_id();
        let key = Self::list_key(tenant_id);

        if let Some(cached) = self.ctx.query_cache().get(&key).await {
            return serde_json::from_value(cached).map_err(|e| SyncError::Parse(e.to_string()));
        }

        let tracked: Vec<Tracked<Client>> = if self.ctx.connectivity().is_online() {
            let records = self.ctx.api().list_clients(tenant_id).await?;
            records.into_iter().map(Tracked::synced).collect()
        } else {
            self.ctx
                .mirror()
                .list::<Client>(tenant_id)
                .await
                .map_err(|e| SyncError::Mirror(e.to_string()))?
        };

        let snapshot =
            serde_json::to_value(&tracked).map_err(|e| SyncError::Parse(e.to_string()))?;
        self.ctx.query_cache().put(key, snapshot).await;
        Ok(tracked)
    }

    /// Create a client.
    ///
    /// The record is materialized locally first; its id doubles as the
    /// idempotency key when the write is replayed later. Online the record
    /// is confirmed remotely and the mirror warmed; offline it lands in the
    /// mirror as unsynced plus an outbox entry.
    pub async fn create(&self, new: NewClient) -> SyncResult<Tracked<Client>> {
        let tenant = self.ctx.require_tenant().await?;
        let tenant_id = tenant.tenant_id();
        let record = new.into_record(tenant_id)?;

        let tracked = if self.ctx.connectivity().is_online() {
            let canonical = self.ctx.api().create_client(&record).await?;
            if let Err(err) = self.ctx.mirror().upsert(&canonical).await {
                tracing::warn!("failed to warm mirror after client create: {err:?}");
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
                    Operation::CreateClient,
                    record.id.to_string(),
                    payload,
                )
                .await
                .map_err(|e| SyncError::Outbox(e.to_string()))?;
            tracing::debug!(client = %record.id, "queued client create for replay");
            Tracked::unsynced(record)
        };

        self.ctx
            .query_cache()
            .invalidate(&Self::list_key(tenant_id))
            .await;
        Ok(tracked)
    }
}
