//! Local SQLite mirror of remote collections.
//!
//! The mirror is the offline read source and the landing zone for offline
//! writes. Rows are keyed by `(tenant_id, collection, record_id)` and carry
//! the full record as JSON plus a `synced` flag: `true` means the row echoes
//! a remotely confirmed record, `false` means it was written locally and is
//! still waiting for replay. A small side table caches resolved tenants by
//! subdomain so tenant resolution works offline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use atelier_clients::Client;
use atelier_core::{ClientId, TenantId};
use atelier_measurements::Measurement;
use atelier_orders::Order;
use atelier_tenancy::Tenant;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

/// Records the mirror can hold.
pub trait Mirrored: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection name. Doubles as the cache-key collection and the remote
    /// endpoint slug.
    const COLLECTION: &'static str;

    fn tenant_id(&self) -> TenantId;
    fn record_id(&self) -> String;

    /// Client scope, for collections that are read per client.
    fn client_id(&self) -> Option<ClientId> {
        None
    }
}

impl Mirrored for Client {
    const COLLECTION: &'static str = "clients";

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    fn record_id(&self) -> String {
        self.id.to_string()
    }
}

impl Mirrored for Measurement {
    const COLLECTION: &'static str = "measurements";

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    fn record_id(&self) -> String {
        self.id.to_string()
    }

    fn client_id(&self) -> Option<ClientId> {
        Some(self.client_id)
    }
}

impl Mirrored for Order {
    const COLLECTION: &'static str = "orders";

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    fn record_id(&self) -> String {
        self.id.to_string()
    }

    fn client_id(&self) -> Option<ClientId> {
        Some(self.client_id)
    }
}

/// A record together with its sync status.
///
/// Serializes with the flag inline next to the record's own fields, the same
/// shape the mirror rows use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tracked<T> {
    #[serde(flatten)]
    pub record: T,
    pub synced: bool,
}

impl<T> Tracked<T> {
    /// Wrap a remotely confirmed record.
    pub fn synced(record: T) -> Self {
        Self {
            record,
            synced: true,
        }
    }

    /// Wrap a local record still waiting for replay.
    pub fn unsynced(record: T) -> Self {
        Self {
            record,
            synced: false,
        }
    }
}

#[derive(Debug, Clone)]
enum MirrorLocation {
    PlatformDefault,
    Path(PathBuf),
    InMemory,
}

/// SQLite-backed mirror store.
///
/// Cheap to clone; all clones share one lazily opened pool. The database is
/// created on first use.
#[derive(Debug, Clone)]
pub struct MirrorStore {
    pool: Arc<tokio::sync::Mutex<Option<SqlitePool>>>,
    location: MirrorLocation,
}

impl MirrorStore {
    /// Mirror in the platform data directory (`atelier/mirror.db`).
    pub fn new() -> Self {
        Self::with_location(MirrorLocation::PlatformDefault)
    }

    /// Mirror at an explicit file path.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self::with_location(MirrorLocation::Path(path.into()))
    }

    /// Private in-memory mirror. Used by tests and throwaway contexts.
    pub fn in_memory() -> Self {
        Self::with_location(MirrorLocation::InMemory)
    }

    fn with_location(location: MirrorLocation) -> Self {
        Self {
            pool: Arc::new(tokio::sync::Mutex::new(None)),
            location,
        }
    }

    async fn ensure_initialized(&self) -> anyhow::Result<()> {
        let mut pool_guard = self.pool.lock().await;
        if pool_guard.is_some() {
            return Ok(());
        }

        let pool = match &self.location {
            MirrorLocation::InMemory => {
                // A single never-recycled connection keeps the memory
                // database alive for the lifetime of the pool.
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None)
                    .connect("sqlite::memory:")
                    .await
                    .context("failed to open in-memory mirror database")?
            }
            MirrorLocation::Path(path) => open_file_pool(path).await?,
            MirrorLocation::PlatformDefault => {
                let path = default_mirror_path()
                    .context("failed to determine mirror DB path - no platform data directory")?;
                open_file_pool(&path).await?
            }
        };

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS mirror_records (
                tenant_id   TEXT NOT NULL,
                collection  TEXT NOT NULL,
                record_id   TEXT NOT NULL,
                client_id   TEXT NULL,
                data        TEXT NOT NULL,
                synced      INTEGER NOT NULL,
                cached_at   TEXT NOT NULL,
                PRIMARY KEY (tenant_id, collection, record_id)
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("failed to create mirror_records table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS mirror_tenants (
                subdomain  TEXT PRIMARY KEY,
                data       TEXT NOT NULL,
                cached_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("failed to create mirror_tenants table")?;

        *pool_guard = Some(pool);
        Ok(())
    }

    async fn get_pool(&self) -> anyhow::Result<SqlitePool> {
        self.ensure_initialized().await?;
        let pool_guard = self.pool.lock().await;
        match pool_guard.as_ref() {
            Some(pool) => Ok(pool.clone()),
            None => Err(anyhow::anyhow!("mirror pool vanished after initialization")),
        }
    }

    /// Store a remotely confirmed record (`synced = true`).
    pub async fn upsert<T: Mirrored>(&self, record: &T) -> anyhow::Result<()> {
        self.write_record(record, true).await
    }

    /// Store a locally created record (`synced = false`).
    pub async fn insert_local<T: Mirrored>(&self, record: &T) -> anyhow::Result<()> {
        self.write_record(record, false).await
    }

    /// Overwrite a record with a locally patched version (`synced = false`).
    pub async fn apply_local<T: Mirrored>(&self, record: &T) -> anyhow::Result<()> {
        self.write_record(record, false).await
    }

    async fn write_record<T: Mirrored>(&self, record: &T, synced: bool) -> anyhow::Result<()> {
        let pool = self.get_pool().await?;
        let data = serde_json::to_string(record).context("failed to serialize mirror record")?;

        sqlx::query(
            r#"
            INSERT INTO mirror_records (tenant_id, collection, record_id, client_id, data, synced, cached_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(tenant_id, collection, record_id) DO UPDATE SET
                client_id = excluded.client_id,
                data      = excluded.data,
                synced    = excluded.synced,
                cached_at = excluded.cached_at
            "#,
        )
        .bind(record.tenant_id().to_string())
        .bind(T::COLLECTION)
        .bind(record.record_id())
        .bind(record.client_id().map(|id| id.to_string()))
        .bind(&data)
        .bind(synced)
        .bind(Utc::now().to_rfc3339())
        .execute(&pool)
        .await
        .context("failed to write mirror record")?;

        Ok(())
    }

    /// Flip a row to `synced = true` without touching its payload.
    pub async fn mark_synced(
        &self,
        tenant_id: TenantId,
        collection: &str,
        record_id: &str,
    ) -> anyhow::Result<()> {
        let pool = self.get_pool().await?;
        sqlx::query(
            r#"
            UPDATE mirror_records
            SET synced = 1
            WHERE tenant_id = ?1 AND collection = ?2 AND record_id = ?3
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(collection)
        .bind(record_id)
        .execute(&pool)
        .await
        .context("failed to mark mirror record synced")?;
        Ok(())
    }

    /// Remove a single row. Absent rows are a no-op.
    pub async fn delete(
        &self,
        tenant_id: TenantId,
        collection: &str,
        record_id: &str,
    ) -> anyhow::Result<()> {
        let pool = self.get_pool().await?;
        sqlx::query(
            r#"
            DELETE FROM mirror_records
            WHERE tenant_id = ?1 AND collection = ?2 AND record_id = ?3
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(collection)
        .bind(record_id)
        .execute(&pool)
        .await
        .context("failed to delete mirror record")?;
        Ok(())
    }

    pub async fn get<T: Mirrored>(
        &self,
        tenant_id: TenantId,
        record_id: &str,
    ) -> anyhow::Result<Option<Tracked<T>>> {
        let pool = self.get_pool().await?;
        let row = sqlx::query(
            r#"
            SELECT data, synced
            FROM mirror_records
            WHERE tenant_id = ?1 AND collection = ?2 AND record_id = ?3
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(T::COLLECTION)
        .bind(record_id)
        .fetch_optional(&pool)
        .await
        .context("failed to read mirror record")?;

        row.map(row_to_tracked::<T>).transpose()
    }

    /// All of a tenant's rows in one collection, in record creation order
    /// (UUIDv7 record ids sort by creation time).
    pub async fn list<T: Mirrored>(&self, tenant_id: TenantId) -> anyhow::Result<Vec<Tracked<T>>> {
        let pool = self.get_pool().await?;
        let rows = sqlx::query(
            r#"
            SELECT data, synced
            FROM mirror_records
            WHERE tenant_id = ?1 AND collection = ?2
            ORDER BY record_id ASC
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(T::COLLECTION)
        .fetch_all(&pool)
        .await
        .context("failed to list mirror records")?;

        rows.into_iter().map(row_to_tracked::<T>).collect()
    }

    /// Like [`MirrorStore::list`], narrowed to one client.
    pub async fn list_for_client<T: Mirrored>(
        &self,
        tenant_id: TenantId,
        client_id: ClientId,
    ) -> anyhow::Result<Vec<Tracked<T>>> {
        let pool = self.get_pool().await?;
        let rows = sqlx::query(
            r#"
            SELECT data, synced
            FROM mirror_records
            WHERE tenant_id = ?1 AND collection = ?2 AND client_id = ?3
            ORDER BY record_id ASC
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(T::COLLECTION)
        .bind(client_id.to_string())
        .fetch_all(&pool)
        .await
        .context("failed to list mirror records for client")?;

        rows.into_iter().map(row_to_tracked::<T>).collect()
    }

    /// Records written locally and not yet confirmed by replay.
    pub async fn list_unsynced<T: Mirrored>(&self, tenant_id: TenantId) -> anyhow::Result<Vec<T>> {
        let pool = self.get_pool().await?;
        let rows = sqlx::query(
            r#"
            SELECT data, synced
            FROM mirror_records
            WHERE tenant_id = ?1 AND collection = ?2 AND synced = 0
            ORDER BY record_id ASC
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(T::COLLECTION)
        .fetch_all(&pool)
        .await
        .context("failed to list unsynced mirror records")?;

        rows.into_iter()
            .map(|row| row_to_tracked::<T>(row).map(|tracked| tracked.record))
            .collect()
    }

    /// Drop every mirrored record of one tenant. The tenant-resolution cache
    /// is left alone.
    pub async fn clear_tenant(&self, tenant_id: TenantId) -> anyhow::Result<()> {
        let pool = self.get_pool().await?;
        sqlx::query("DELETE FROM mirror_records WHERE tenant_id = ?1")
            .bind(tenant_id.to_string())
            .execute(&pool)
            .await
            .context("failed to clear tenant mirror records")?;
        Ok(())
    }

    /// Drop everything, including cached tenants.
    pub async fn clear_all(&self) -> anyhow::Result<()> {
        let pool = self.get_pool().await?;
        sqlx::query("DELETE FROM mirror_records")
            .execute(&pool)
            .await
            .context("failed to clear mirror records")?;
        sqlx::query("DELETE FROM mirror_tenants")
            .execute(&pool)
            .await
            .context("failed to clear mirror tenants")?;
        Ok(())
    }

    /// Cache a resolved tenant for offline resolution.
    pub async fn put_tenant(&self, tenant: &Tenant) -> anyhow::Result<()> {
        let pool = self.get_pool().await?;
        let data = serde_json::to_string(tenant).context("failed to serialize tenant")?;
        sqlx::query(
            r#"
            INSERT INTO mirror_tenants (subdomain, data, cached_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(subdomain) DO UPDATE SET
                data      = excluded.data,
                cached_at = excluded.cached_at
            "#,
        )
        .bind(&tenant.subdomain)
        .bind(&data)
        .bind(Utc::now().to_rfc3339())
        .execute(&pool)
        .await
        .context("failed to cache tenant")?;
        Ok(())
    }

    pub async fn get_tenant(&self, subdomain: &str) -> anyhow::Result<Option<Tenant>> {
        let pool = self.get_pool().await?;
        let row = sqlx::query("SELECT data FROM mirror_tenants WHERE subdomain = ?1")
            .bind(subdomain)
            .fetch_optional(&pool)
            .await
            .context("failed to read cached tenant")?;

        match row {
            Some(row) => {
                let data: String = row.try_get("data")?;
                let tenant: Tenant =
                    serde_json::from_str(&data).context("invalid JSON in mirror_tenants.data")?;
                Ok(Some(tenant))
            }
            None => Ok(None),
        }
    }
}

impl Default for MirrorStore {
    fn default() -> Self {
        Self::new()
    }
}

fn row_to_tracked<T: Mirrored>(row: SqliteRow) -> anyhow::Result<Tracked<T>> {
    let data: String = row.try_get("data")?;
    let record: T =
        serde_json::from_str(&data).context("invalid JSON in mirror_records.data")?;
    let synced: bool = row.try_get("synced")?;
    Ok(Tracked { record, synced })
}

async fn open_file_pool(path: &Path) -> anyhow::Result<SqlitePool> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create mirror directory at {:?}", parent))?;
    }
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    SqlitePoolOptions::new()
        .connect_with(options)
        .await
        .with_context(|| format!("failed to open mirror database at {:?}", path))
}

fn default_mirror_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("atelier").join("mirror.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_clients::NewClient;
    use atelier_core::GarmentType;
    use atelier_measurements::NewMeasurement;
    use std::collections::BTreeMap;

    fn client(tenant_id: TenantId, name: &str) -> Client {
        NewClient {
            name: name.to_string(),
            ..NewClient::default()
        }
        .into_record(tenant_id)
        .unwrap()
    }

    fn measurement(tenant_id: TenantId, client_id: ClientId) -> Measurement {
        let mut data = BTreeMap::new();
        data.insert("chest".to_string(), 104.0);
        NewMeasurement {
            client_id,
            garment_type: GarmentType::Caftan,
            data,
            is_last: true,
        }
        .into_record(tenant_id)
        .unwrap()
    }

    #[tokio::test]
    async fn insert_local_reads_back_unsynced() {
        let store = MirrorStore::in_memory();
        let tenant_id = TenantId::new();
        let record = client(tenant_id, "Ahmed Alaoui");

        store.insert_local(&record).await.unwrap();
        let tracked = store
            .get::<Client>(tenant_id, &record.record_id())
            .await
            .unwrap()
            .unwrap();
        assert!(!tracked.synced);
        assert_eq!(tracked.record.name, "Ahmed Alaoui");
    }

    #[tokio::test]
    async fn upsert_overwrites_and_marks_synced() {
        let store = MirrorStore::in_memory();
        let tenant_id = TenantId::new();
        let mut record = client(tenant_id, "Fatima Zahra");

        store.insert_local(&record).await.unwrap();
        record.phone = Some("0612345678".to_string());
        store.upsert(&record).await.unwrap();

        let tracked = store
            .get::<Client>(tenant_id, &record.record_id())
            .await
            .unwrap()
            .unwrap();
        assert!(tracked.synced);
        assert_eq!(tracked.record.phone.as_deref(), Some("0612345678"));
    }

    #[tokio::test]
    async fn list_scopes_by_tenant() {
        let store = MirrorStore::in_memory();
        let (t1, t2) = (TenantId::new(), TenantId::new());
        store.upsert(&client(t1, "A")).await.unwrap();
        store.upsert(&client(t1, "B")).await.unwrap();
        store.upsert(&client(t2, "C")).await.unwrap();

        let listed = store.list::<Client>(t1).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|t| t.record.tenant_id == t1));
    }

    #[tokio::test]
    async fn list_for_client_filters_measurements() {
        let store = MirrorStore::in_memory();
        let tenant_id = TenantId::new();
        let (c1, c2) = (ClientId::new(), ClientId::new());
        store.upsert(&measurement(tenant_id, c1)).await.unwrap();
        store.upsert(&measurement(tenant_id, c1)).await.unwrap();
        store.upsert(&measurement(tenant_id, c2)).await.unwrap();

        let listed = store
            .list_for_client::<Measurement>(tenant_id, c1)
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|t| t.record.client_id == c1));
    }

    #[tokio::test]
    async fn list_unsynced_returns_only_local_rows() {
        let store = MirrorStore::in_memory();
        let tenant_id = TenantId::new();
        let synced = client(tenant_id, "Synced");
        let local = client(tenant_id, "Local");
        store.upsert(&synced).await.unwrap();
        store.insert_local(&local).await.unwrap();

        let unsynced = store.list_unsynced::<Client>(tenant_id).await.unwrap();
        assert_eq!(unsynced.len(), 1);
        assert_eq!(unsynced[0].name, "Local");
    }

    #[tokio::test]
    async fn mark_synced_flips_the_flag_in_place() {
        let store = MirrorStore::in_memory();
        let tenant_id = TenantId::new();
        let record = client(tenant_id, "Khadija");
        store.insert_local(&record).await.unwrap();

        store
            .mark_synced(tenant_id, Client::COLLECTION, &record.record_id())
            .await
            .unwrap();

        let tracked = store
            .get::<Client>(tenant_id, &record.record_id())
            .await
            .unwrap()
            .unwrap();
        assert!(tracked.synced);
        assert_eq!(tracked.record.name, "Khadija");
    }

    #[tokio::test]
    async fn delete_removes_a_single_row() {
        let store = MirrorStore::in_memory();
        let tenant_id = TenantId::new();
        let keep = client(tenant_id, "Keep");
        let gone = client(tenant_id, "Drop");
        store.upsert(&keep).await.unwrap();
        store.upsert(&gone).await.unwrap();

        store
            .delete(tenant_id, Client::COLLECTION, &gone.record_id())
            .await
            .unwrap();

        let listed = store.list::<Client>(tenant_id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].record.name, "Keep");
    }

    #[tokio::test]
    async fn clear_tenant_leaves_other_tenants_alone() {
        let store = MirrorStore::in_memory();
        let (t1, t2) = (TenantId::new(), TenantId::new());
        store.upsert(&client(t1, "A")).await.unwrap();
        store.upsert(&client(t2, "B")).await.unwrap();

        store.clear_tenant(t1).await.unwrap();
        assert!(store.list::<Client>(t1).await.unwrap().is_empty());
        assert_eq!(store.list::<Client>(t2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn tenant_cache_round_trips_by_subdomain() {
        let store = MirrorStore::in_memory();
        let tenant = Tenant::new("Atelier Yasmine", "yasmine").unwrap();
        store.put_tenant(&tenant).await.unwrap();

        let cached = store.get_tenant("yasmine").await.unwrap().unwrap();
        assert_eq!(cached.id, tenant.id);
        assert_eq!(cached.name, "Atelier Yasmine");
        assert_eq!(store.get_tenant("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn tracked_serializes_flag_inline() {
        let tenant_id = TenantId::new();
        let record = client(tenant_id, "Inline");
        let value = serde_json::to_value(Tracked::unsynced(record)).unwrap();
        assert_eq!(value["synced"], serde_json::json!(false));
        assert_eq!(value["name"], serde_json::json!("Inline"));
    }
}
