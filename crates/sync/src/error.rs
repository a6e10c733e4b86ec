//! Error surface of the sync layer.

use atelier_core::DomainError;
use thiserror::Error;

use crate::api::ApiError;

/// Errors surfaced by the offline-first data layer.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No tenant has been resolved for this context. Every entity operation
    /// is gated on this and performs no work at all when it fires.
    #[error("no tenant resolved for this context")]
    TenantUnresolved,

    /// The operation needs the network and the connectivity oracle says
    /// we are offline.
    #[error("client is offline")]
    Offline,

    /// A remote API call failed. Bodies are never carried along.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Input was rejected by domain validation before any side effect.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The local mirror store failed.
    #[error("mirror error: {0}")]
    Mirror(String),

    /// The outbox failed.
    #[error("outbox error: {0}")]
    Outbox(String),

    /// An offline update targeted a record the mirror has never seen.
    #[error("record {0} is not in the local mirror")]
    NotMirrored(String),

    /// A locally stored payload or cached snapshot could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),
}

pub type SyncResult<T> = Result<T, SyncError>;
