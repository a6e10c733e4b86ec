//! Offline-first access to the measurement collection.
//!
//! Measurements are always read per client; the cache key carries the client
//! id so one client's history never shadows another's.

use atelier_core::{ClientId, TenantId};
use atelier_measurements::{Measurement, NewMeasurement};

use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use crate::mirror::{Mirrored, Tracked};
use crate::outbox::Operation;
use crate::query::QueryKey;

/// Tenant-gated reads and writes for measurements.
#[derive(Debug, Clone)]
pub struct MeasurementsHandle {
    ctx: SyncContext,
}

impl MeasurementsHandle {
    pub(crate) fn new(ctx: SyncContext) -> Self {
        Self { ctx }
    }

    fn list_key(tenant_id: TenantId, client_id: ClientId) -> QueryKey {
        QueryKey::for_client(tenant_id, Measurement::COLLECTION, client_id)
    }

    /// List one client's measurements for the active tenant.
    pub async fn list_for_client(&self, client_id: ClientId) -> SyncResult<Vec<Tracked<Measurement>>> {
        let tenant = self.ctx.require_tenant().await?;
        let tenant_id = tenant.tenant_id();
        let key = Self::list_key(tenant_id, client_id);

        if let Some(cached) = self.ctx.query_cache().get(&key).await {
            return serde_json::from_value(cached).map_err(|e| SyncError::Parse(e.to_string()));
        }

        let tracked: Vec<Tracked<Measurement>> = if self.ctx.connectivity().is_online() {
            let records = self
                .ctx
                .api()
                .list_measurements(tenant_id, client_id)
                .await?;
            records.into_iter().map(Tracked::synced).collect()
        } else {
            self.ctx
                .mirror()
                .list_for_client::<Measurement>(tenant_id, client_id)
                .await
                .map_err(|e| SyncError::Mirror(e.to_string()))?
        };

        let snapshot =
            serde_json::to_value(&tracked).map_err(|e| SyncError::Parse(e.to_string()))?;
        self.ctx.query_cache().put(key, snapshot).await;
        Ok(tracked)
    }

    /// Record a new set of measurements for a client.
    pub async fn create(&self, new: NewMeasurement) -> SyncResult<Tracked<Measurement>> {
        let tenant = self.ctx.require_tenant().await?;
        let tenant_id = tenant.tenant_id();
        let record = new.into_record(tenant_id)?;
        let client_id = record.client_id;

        let tracked = if self.ctx.connectivity().is_online() {
            let canonical = self.ctx.api().create_measurement(&record).await?;
            if let Err(err) = self.ctx.mirror().upsert(&canonical).await {
                tracing::warn!("failed to warm mirror after measurement create: {err:?}");
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
                    Operation::CreateMeasurement,
                    record.id.to_string(),
                    payload,
                )
                .await
                .map_err(|e| SyncError::Outbox(e.to_string()))?;
            tracing::debug!(measurement = %record.id, "queued measurement create for replay");
            Tracked::unsynced(record)
        };

        self.ctx
            .query_cache()
            .invalidate(&Self::list_key(tenant_id, client_id))
            .await;
        Ok(tracked)
    }
}
