//! Offline-first data layer: remote API access with a local SQLite mirror.
//!
//! Every read and write goes through a tenant-gated handle. Online, reads hit
//! the remote API and writes are confirmed remotely before the mirror is
//! warmed. Offline, reads fall back to the tenant's mirror rows and writes
//! land in the mirror as unsynced plus an outbox entry. Queued writes are
//! only pushed by an explicit replay pass (or the opt-in background worker);
//! reconnecting by itself never mutates anything.

pub mod api;
pub mod clients;
pub mod connectivity;
pub mod context;
pub mod error;
pub mod measurements;
pub mod mirror;
pub mod orders;
pub mod outbox;
pub mod query;
pub mod replay;
pub mod tenant;
pub mod worker;

pub use api::{ApiClient, ApiError, ApiErrorKind};
pub use clients::ClientsHandle;
pub use connectivity::{Connectivity, ConnectivityState};
pub use context::{SyncContext, SyncContextBuilder};
pub use error::{SyncError, SyncResult};
pub use measurements::MeasurementsHandle;
pub use mirror::{MirrorStore, Mirrored, Tracked};
pub use orders::OrdersHandle;
pub use outbox::{EntryStatus, Operation, Outbox, OutboxEntry};
pub use query::{QueryCache, QueryKey};
pub use replay::{ReplayEngine, ReplayReport};
pub use tenant::{TenantResolver, TenantSlot};
pub use worker::ReplayWorker;
