//! Assembled data layer: one remote API, one mirror, one outbox, one cache,
//! one connectivity signal, one tenant slot.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use atelier_tenancy::TenantContext;

use crate::api::ApiClient;
use crate::clients::ClientsHandle;
use crate::connectivity::{Connectivity, ConnectivityState};
use crate::error::SyncError;
use crate::measurements::MeasurementsHandle;
use crate::mirror::MirrorStore;
use crate::orders::OrdersHandle;
use crate::outbox::Outbox;
use crate::query::QueryCache;
use crate::replay::ReplayEngine;
use crate::tenant::{TenantResolver, TenantSlot};
use crate::worker::ReplayWorker;

/// Shared state behind every handle. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SyncContext {
    api: ApiClient,
    mirror: MirrorStore,
    outbox: Outbox,
    cache: Arc<QueryCache>,
    connectivity: Connectivity,
    slot: TenantSlot,
}

impl SyncContext {
    pub fn builder(api_base_url: impl Into<String>) -> SyncContextBuilder {
        SyncContextBuilder {
            api_base_url: api_base_url.into(),
            storage: Storage::PlatformDefault,
            initial: ConnectivityState::Online,
        }
    }

    /// Context with throwaway in-memory storage. Used by tests.
    pub fn in_memory(api_base_url: impl Into<String>) -> Self {
        Self::builder(api_base_url).store_in_memory().build()
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn mirror(&self) -> &MirrorStore {
        &self.mirror
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    pub fn query_cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn tenant_slot(&self) -> &TenantSlot {
        &self.slot
    }

    pub async fn current_tenant(&self) -> Option<TenantContext> {
        self.slot.current().await
    }

    /// The gate every entity operation passes first.
    pub async fn require_tenant(&self) -> Result<TenantContext, SyncError> {
        self.slot.current().await.ok_or(SyncError::TenantUnresolved)
    }

    pub fn resolver(&self) -> TenantResolver {
        TenantResolver::new(
            self.api.clone(),
            self.mirror.clone(),
            self.connectivity.clone(),
            self.slot.clone(),
        )
    }

    pub fn clients(&self) -> ClientsHandle {
        ClientsHandle::new(self.clone())
    }

    pub fn measurements(&self) -> MeasurementsHandle {
        MeasurementsHandle::new(self.clone())
    }

    pub fn orders(&self) -> OrdersHandle {
        OrdersHandle::new(self.clone())
    }

    pub fn replay(&self) -> ReplayEngine {
        ReplayEngine::new(self.clone())
    }

    /// Background replay worker. Opt-in; nothing starts it implicitly.
    pub fn worker(&self, interval: Duration) -> ReplayWorker {
        ReplayWorker::new(self.replay(), interval)
    }
}

#[derive(Debug, Clone)]
enum Storage {
    PlatformDefault,
    DataDir(PathBuf),
    InMemory,
}

/// Builder for [`SyncContext`].
#[derive(Debug, Clone)]
pub struct SyncContextBuilder {
    api_base_url: String,
    storage: Storage,
    initial: ConnectivityState,
}

impl SyncContextBuilder {
    /// Keep mirror and outbox under the given directory
    /// (`mirror.db` / `outbox.db`).
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage = Storage::DataDir(dir.into());
        self
    }

    /// Keep mirror and outbox in memory; everything is lost on drop.
    pub fn store_in_memory(mut self) -> Self {
        self.storage = Storage::InMemory;
        self
    }

    /// Start with the connectivity oracle reading offline.
    pub fn start_offline(mut self) -> Self {
        self.initial = ConnectivityState::Offline;
        self
    }

    pub fn build(self) -> SyncContext {
        let (mirror, outbox) = match self.storage {
            Storage::PlatformDefault => (MirrorStore::new(), Outbox::new()),
            Storage::DataDir(dir) => (
                MirrorStore::at_path(dir.join("mirror.db")),
                Outbox::at_path(dir.join("outbox.db")),
            ),
            Storage::InMemory => (MirrorStore::in_memory(), Outbox::in_memory()),
        };

        SyncContext {
            api: ApiClient::new(self.api_base_url),
            mirror,
            outbox,
            cache: Arc::new(QueryCache::new()),
            connectivity: Connectivity::new(self.initial),
            slot: TenantSlot::new(),
        }
    }
}
