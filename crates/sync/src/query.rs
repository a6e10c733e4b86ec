//! In-memory cache of read results.
//!
//! Entries live until explicitly invalidated; there is no TTL and no size
//! bound. Write paths invalidate the keys they touch so the next read goes
//! back to the source (remote API or mirror).

use std::collections::HashMap;

use atelier_core::{ClientId, TenantId};
use serde_json::Value;
use tokio::sync::RwLock;

/// Identifies one cached read: a collection under a tenant, optionally
/// narrowed to a single client (measurements are read per client).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub tenant_id: TenantId,
    pub collection: &'static str,
    pub client_id: Option<ClientId>,
}

impl QueryKey {
    pub fn collection(tenant_id: TenantId, collection: &'static str) -> Self {
        Self {
            tenant_id,
            collection,
            client_id: None,
        }
    }

    pub fn for_client(tenant_id: TenantId, collection: &'static str, client_id: ClientId) -> Self {
        Self {
            tenant_id,
            collection,
            client_id: Some(client_id),
        }
    }
}

/// Cache of serialized result sets, shared by all handles of a context.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: RwLock<HashMap<QueryKey, Value>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &QueryKey) -> Option<Value> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn put(&self, key: QueryKey, value: Value) {
        self.entries.write().await.insert(key, value);
    }

    /// Drop one entry. Missing keys are a no-op.
    pub async fn invalidate(&self, key: &QueryKey) {
        self.entries.write().await.remove(key);
    }

    /// Drop every entry belonging to a tenant.
    pub async fn clear_tenant(&self, tenant_id: TenantId) {
        self.entries
            .write()
            .await
            .retain(|key, _| key.tenant_id != tenant_id);
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
