//! Tenant resolution and the active-tenant slot.
//!
//! A context has at most one active tenant at a time. Resolution prefers the
//! remote API and caches the answer in the mirror so the same subdomain still
//! resolves offline. Every entity handle gates on the slot; while it is empty
//! they refuse to do anything at all.

use std::sync::Arc;

use atelier_tenancy::{subdomain_from_host, Tenant, TenantContext};
use tokio::sync::RwLock;

use crate::api::{ApiClient, ApiError, ApiErrorKind};
use crate::connectivity::Connectivity;
use crate::error::SyncError;
use crate::mirror::MirrorStore;

/// Shared slot holding the currently resolved tenant.
///
/// Clones observe the same slot.
#[derive(Debug, Clone, Default)]
pub struct TenantSlot {
    inner: Arc<RwLock<Option<TenantContext>>>,
}

impl TenantSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current(&self) -> Option<TenantContext> {
        self.inner.read().await.clone()
    }

    pub async fn set(&self, ctx: TenantContext) {
        *self.inner.write().await = Some(ctx);
    }

    pub async fn clear(&self) {
        *self.inner.write().await = None;
    }
}

/// Resolves a subdomain to a tenant and publishes it to the slot.
#[derive(Debug, Clone)]
pub struct TenantResolver {
    api: ApiClient,
    mirror: MirrorStore,
    connectivity: Connectivity,
    slot: TenantSlot,
}

impl TenantResolver {
    pub fn new(
        api: ApiClient,
        mirror: MirrorStore,
        connectivity: Connectivity,
        slot: TenantSlot,
    ) -> Self {
        Self {
            api,
            mirror,
            connectivity,
            slot,
        }
    }

    /// Resolve a tenant from a request host such as `yasmine.atelier.ma`.
    pub async fn resolve_host(&self, host: &str) -> Result<TenantContext, SyncError> {
        match subdomain_from_host(host) {
            Some(subdomain) => self.resolve(&subdomain).await,
            None => {
                self.slot.clear().await;
                Err(SyncError::TenantUnresolved)
            }
        }
    }

    /// Resolve a tenant by subdomain.
    ///
    /// Online, the remote answer wins and is cached in the mirror. A network
    /// failure flips the connectivity oracle and falls back to the cached
    /// tenant. Offline, only the cache is consulted. On any failure the slot
    /// is cleared so no stale tenant lingers.
    pub async fn resolve(&self, subdomain: &str) -> Result<TenantContext, SyncError> {
        if self.connectivity.is_online() {
            match self.api.get_tenant(subdomain).await {
                Ok(tenant) => {
                    if let Err(err) = self.mirror.put_tenant(&tenant).await {
                        tracing::warn!("failed to cache resolved tenant: {err:?}");
                    }
                    return self.publish(tenant).await;
                }
                Err(ApiError::Status {
                    kind: ApiErrorKind::NotFound,
                    ..
                }) => {
                    self.slot.clear().await;
                    return Err(SyncError::TenantUnresolved);
                }
                Err(err) if err.is_network() => {
                    tracing::warn!("tenant resolution lost the network, going offline: {err}");
                    self.connectivity.set_offline();
                    // fall through to the cached tenant
                }
                Err(err) => {
                    self.slot.clear().await;
                    return Err(err.into());
                }
            }
        }

        match self
            .mirror
            .get_tenant(subdomain)
            .await
            .map_err(|e| SyncError::Mirror(e.to_string()))?
        {
            Some(tenant) => self.publish(tenant).await,
            None => {
                self.slot.clear().await;
                Err(SyncError::TenantUnresolved)
            }
        }
    }

    async fn publish(&self, tenant: Tenant) -> Result<TenantContext, SyncError> {
        let ctx = TenantContext::new(tenant);
        self.slot.set(ctx.clone()).await;
        tracing::debug!(tenant = %ctx.tenant_id(), subdomain = %ctx.subdomain(), "tenant resolved");
        Ok(ctx)
    }

    /// The tenant currently published to the slot, if any.
    pub async fn current(&self) -> Option<TenantContext> {
        self.slot.current().await
    }

    /// Drop the active tenant. Subsequent entity operations fail until a new
    /// one is resolved.
    pub async fn clear(&self) {
        self.slot.clear().await;
    }
}
