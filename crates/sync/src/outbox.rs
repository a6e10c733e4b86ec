//! Durable queue of writes made while offline.
//!
//! Every offline write lands here as an [`OutboxEntry`] next to its unsynced
//! mirror row. Entries are scoped by tenant and replayed in creation order
//! by the replay engine; nothing drains the outbox implicitly. Record ids
//! are minted locally, so re-submitting an entry after a crash or a dropped
//! connection is safe.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use atelier_core::TenantId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// What an entry does when replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CreateClient,
    CreateMeasurement,
    CreateOrder,
    UpdateOrder,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::CreateClient => "create_client",
            Operation::CreateMeasurement => "create_measurement",
            Operation::CreateOrder => "create_order",
            Operation::UpdateOrder => "update_order",
        }
    }

    /// Collection the operation writes to.
    pub fn collection(&self) -> &'static str {
        match self {
            Operation::CreateClient => "clients",
            Operation::CreateMeasurement => "measurements",
            Operation::CreateOrder | Operation::UpdateOrder => "orders",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryStatus {
    /// Waiting for replay.
    Pending,
    /// Picked up by a replay pass. Entries found in this state at the start
    /// of a pass were dropped mid-flight and are safe to retry.
    Inflight,
    /// Confirmed by the remote API.
    Synced,
    /// Rejected by the remote API. Stays out of replay until retried
    /// explicitly.
    Failed,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Pending => "Pending",
            EntryStatus::Inflight => "Inflight",
            EntryStatus::Synced => "Synced",
            EntryStatus::Failed => "Failed",
        }
    }
}

impl sqlx::Type<sqlx::Sqlite> for EntryStatus {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <&str as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for EntryStatus {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<'r, sqlx::Sqlite>>::decode(value)?;
        match s {
            "Pending" => Ok(EntryStatus::Pending),
            "Inflight" => Ok(EntryStatus::Inflight),
            "Synced" => Ok(EntryStatus::Synced),
            "Failed" => Ok(EntryStatus::Failed),
            _ => Err(format!("invalid EntryStatus: {}", s).into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for EntryStatus {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        let s = self.as_str();
        <&str as sqlx::Encode<'q, sqlx::Sqlite>>::encode_by_ref(&s, buf)
    }
}

/// One queued write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub operation: Operation,
    /// Id of the record the operation targets.
    pub record_id: String,
    /// Full record for creates, the patch for updates.
    pub payload: Value,
    pub status: EntryStatus,
    pub created_at: DateTime<Utc>,
    pub synced_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// SQLite-backed outbox.
///
/// Cheap to clone; all clones share one lazily opened pool.
#[derive(Debug, Clone)]
pub struct Outbox {
    pool: Arc<tokio::sync::Mutex<Option<SqlitePool>>>,
    location: OutboxLocation,
}

#[derive(Debug, Clone)]
enum OutboxLocation {
    PlatformDefault,
    Path(PathBuf),
    InMemory,
}

impl Outbox {
    /// Outbox in the platform data directory (`atelier/outbox.db`).
    pub fn new() -> Self {
        Self::with_location(OutboxLocation::PlatformDefault)
    }

    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self::with_location(OutboxLocation::Path(path.into()))
    }

    pub fn in_memory() -> Self {
        Self::with_location(OutboxLocation::InMemory)
    }

    fn with_location(location: OutboxLocation) -> Self {
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
            OutboxLocation::InMemory => SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect("sqlite::memory:")
                .await
                .context("failed to open in-memory outbox database")?,
            OutboxLocation::Path(path) => open_file_pool(path).await?,
            OutboxLocation::PlatformDefault => {
                let path = default_outbox_path()
                    .context("failed to determine outbox DB path - no platform data directory")?;
                open_file_pool(&path).await?
            }
        };

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS outbox (
                id          TEXT PRIMARY KEY,
                tenant_id   TEXT NOT NULL,
                operation   TEXT NOT NULL,
                record_id   TEXT NOT NULL,
                payload     TEXT NOT NULL,
                status      TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                synced_at   TEXT NULL,
                error       TEXT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("failed to create outbox table")?;

        *pool_guard = Some(pool);
        Ok(())
    }

    async fn get_pool(&self) -> anyhow::Result<SqlitePool> {
        self.ensure_initialized().await?;
        let pool_guard = self.pool.lock().await;
        match pool_guard.as_ref() {
            Some(pool) => Ok(pool.clone()),
            None => Err(anyhow::anyhow!("outbox pool vanished after initialization")),
        }
    }

    /// Queue a write for later replay.
    pub async fn enqueue(
        &self,
        tenant_id: TenantId,
        operation: Operation,
        record_id: String,
        payload: Value,
    ) -> anyhow::Result<OutboxEntry> {
        let entry = OutboxEntry {
            id: Uuid::now_v7(),
            tenant_id,
            operation,
            record_id,
            payload,
            status: EntryStatus::Pending,
            created_at: Utc::now(),
            synced_at: None,
            error: None,
        };

        let pool = self.get_pool().await?;
        sqlx::query(
            r#"
            INSERT INTO outbox (
                id,
                tenant_id,
                operation,
                record_id,
                payload,
                status,
                created_at,
                synced_at,
                error
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, NULL)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.tenant_id.to_string())
        .bind(entry.operation.as_str())
        .bind(&entry.record_id)
        .bind(entry.payload.to_string())
        .bind(entry.status)
        .bind(entry.created_at.to_rfc3339())
        .execute(&pool)
        .await
        .context("failed to insert outbox entry")?;

        Ok(entry)
    }

    /// Entries a replay pass should push: pending ones plus inflight ones a
    /// previous pass never resolved, in creation order.
    pub async fn list_replayable(&self, tenant_id: TenantId) -> anyhow::Result<Vec<OutboxEntry>> {
        let pool = self.get_pool().await?;
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, operation, record_id, payload, status, created_at, synced_at, error
            FROM outbox
            WHERE tenant_id = ?1
              AND status IN (?2, ?3)
            ORDER BY created_at ASC
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(EntryStatus::Pending)
        .bind(EntryStatus::Inflight)
        .fetch_all(&pool)
        .await
        .context("failed to list replayable outbox entries")?;

        rows.into_iter().map(row_to_entry).collect()
    }

    /// Every entry of a tenant regardless of status, in creation order.
    pub async fn list(&self, tenant_id: TenantId) -> anyhow::Result<Vec<OutboxEntry>> {
        let pool = self.get_pool().await?;
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, operation, record_id, payload, status, created_at, synced_at, error
            FROM outbox
            WHERE tenant_id = ?1
            ORDER BY created_at ASC
            "#,
        )
        .bind(tenant_id.to_string())
        .fetch_all(&pool)
        .await
        .context("failed to list outbox entries")?;

        rows.into_iter().map(row_to_entry).collect()
    }

    pub async fn mark_inflight(&self, id: Uuid) -> anyhow::Result<()> {
        self.update_status(id, EntryStatus::Inflight, None).await
    }

    pub async fn mark_synced(&self, id: Uuid) -> anyhow::Result<()> {
        self.update_status(id, EntryStatus::Synced, Some(Utc::now()))
            .await
    }

    /// Record a rejection. The entry leaves the replayable set until
    /// [`Outbox::retry_failed`] is called for it.
    pub async fn mark_failed(&self, id: Uuid, error: &str) -> anyhow::Result<()> {
        let pool = self.get_pool().await?;
        sqlx::query(
            r#"
            UPDATE outbox
            SET status = ?2,
                error = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id.to_string())
        .bind(EntryStatus::Failed)
        .bind(error)
        .execute(&pool)
        .await
        .context("failed to mark outbox entry failed")?;
        Ok(())
    }

    /// Return an inflight entry to pending after a dropped connection.
    pub async fn requeue(&self, id: Uuid) -> anyhow::Result<()> {
        let pool = self.get_pool().await?;
        sqlx::query(
            r#"
            UPDATE outbox
            SET status = ?2
            WHERE id = ?1
              AND status = ?3
            "#,
        )
        .bind(id.to_string())
        .bind(EntryStatus::Pending)
        .bind(EntryStatus::Inflight)
        .execute(&pool)
        .await
        .context("failed to requeue outbox entry")?;
        Ok(())
    }

    /// Put a failed entry back into the replayable set and clear its error.
    pub async fn retry_failed(&self, id: Uuid) -> anyhow::Result<()> {
        let pool = self.get_pool().await?;
        sqlx::query(
            r#"
            UPDATE outbox
            SET status = ?2,
                error = NULL
            WHERE id = ?1
              AND status = ?3
            "#,
        )
        .bind(id.to_string())
        .bind(EntryStatus::Pending)
        .bind(EntryStatus::Failed)
        .execute(&pool)
        .await
        .context("failed to retry outbox entry")?;
        Ok(())
    }

    /// Drop synced entries older than seven days.
    pub async fn clear_synced(&self) -> anyhow::Result<u64> {
        let cutoff = (Utc::now() - Duration::days(7)).to_rfc3339();
        let pool = self.get_pool().await?;
        let result = sqlx::query(
            r#"
            DELETE FROM outbox
            WHERE status = ?1
              AND synced_at IS NOT NULL
              AND synced_at < ?2
            "#,
        )
        .bind(EntryStatus::Synced)
        .bind(cutoff)
        .execute(&pool)
        .await
        .context("failed to clear synced outbox entries")?;
        Ok(result.rows_affected())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: EntryStatus,
        synced_at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<()> {
        let pool = self.get_pool().await?;
        sqlx::query(
            r#"
            UPDATE outbox
            SET status = ?2,
                synced_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id.to_string())
        .bind(status)
        .bind(synced_at.map(|dt| dt.to_rfc3339()))
        .execute(&pool)
        .await
        .context("failed to update outbox entry status")?;
        Ok(())
    }
}

impl Default for Outbox {
    fn default() -> Self {
        Self::new()
    }
}

fn row_to_entry(row: sqlx::sqlite::SqliteRow) -> anyhow::Result<OutboxEntry> {
    let id_str: String = row.try_get("id")?;
    let id = Uuid::parse_str(&id_str).context("invalid UUID in outbox.id")?;

    let tenant_str: String = row.try_get("tenant_id")?;
    let tenant_id = tenant_str
        .parse::<TenantId>()
        .context("invalid tenant_id in outbox")?;

    let operation_str: String = row.try_get("operation")?;
    let operation = match operation_str.as_str() {
        "create_client" => Operation::CreateClient,
        "create_measurement" => Operation::CreateMeasurement,
        "create_order" => Operation::CreateOrder,
        "update_order" => Operation::UpdateOrder,
        other => return Err(anyhow::anyhow!("unknown operation '{}' in outbox", other)),
    };

    let record_id: String = row.try_get("record_id")?;

    let payload_str: String = row.try_get("payload")?;
    let payload: Value =
        serde_json::from_str(&payload_str).context("invalid JSON payload in outbox")?;

    let status: EntryStatus = row.try_get("status")?;

    let created_at_str: String = row.try_get("created_at")?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .context("invalid created_at in outbox")?;

    let synced_at_str: Option<String> = row.try_get("synced_at")?;
    let synced_at = if let Some(s) = synced_at_str {
        Some(
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .context("invalid synced_at in outbox")?,
        )
    } else {
        None
    };

    let error: Option<String> = row.try_get("error")?;

    Ok(OutboxEntry {
        id,
        tenant_id,
        operation,
        record_id,
        payload,
        status,
        created_at,
        synced_at,
        error,
    })
}

async fn open_file_pool(path: &Path) -> anyhow::Result<SqlitePool> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create outbox directory at {:?}", parent))?;
    }
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    SqlitePoolOptions::new()
        .connect_with(options)
        .await
        .with_context(|| format!("failed to open outbox database at {:?}", path))
}

fn default_outbox_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("atelier").join("outbox.db"))
}
