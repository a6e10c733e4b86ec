//! HTTP client for the remote API.
//!
//! Thin and deliberately dumb: one method per endpoint, no retry, no
//! timeout tuning. Failures map to a sanitized [`ApiErrorKind`]; response
//! bodies of failed requests are dropped, never parsed or echoed.

use atelier_clients::Client;
use atelier_core::{ClientId, OrderId, TenantId};
use atelier_measurements::Measurement;
use atelier_orders::{Order, OrderPatch};
use atelier_tenancy::Tenant;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Sanitized classification of a failed remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// 400
    Validation,
    /// 401
    Unauthorized,
    /// 404
    NotFound,
    /// 409
    Conflict,
    /// Any 5xx
    Server,
    /// Any other non-success status
    Unexpected,
}

impl ApiErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiErrorKind::Validation => "validation",
            ApiErrorKind::Unauthorized => "unauthorized",
            ApiErrorKind::NotFound => "not_found",
            ApiErrorKind::Conflict => "conflict",
            ApiErrorKind::Server => "server",
            ApiErrorKind::Unexpected => "unexpected",
        }
    }
}

impl core::fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The server answered with a non-success status.
    #[error("api error: {kind} (status {status})")]
    Status { kind: ApiErrorKind, status: u16 },

    /// The request never completed (DNS, connect, reset).
    #[error("network error: {0}")]
    Network(String),

    /// The server answered 2xx but the body did not decode.
    #[error("response decode error: {0}")]
    Decode(String),
}

impl ApiError {
    fn from_status(status: reqwest::StatusCode) -> Self {
        let kind = match status.as_u16() {
            400 => ApiErrorKind::Validation,
            401 => ApiErrorKind::Unauthorized,
            404 => ApiErrorKind::NotFound,
            409 => ApiErrorKind::Conflict,
            500..=599 => ApiErrorKind::Server,
            _ => ApiErrorKind::Unexpected,
        };
        ApiError::Status {
            kind,
            status: status.as_u16(),
        }
    }

    pub fn kind(&self) -> Option<ApiErrorKind> {
        match self {
            ApiError::Status { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }
}

/// Client for the remote REST API.
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Reachability probe. Any transport failure or non-2xx reads as "down".
    pub async fn health(&self) -> bool {
        match self.http.get(self.url("/api/health")).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    pub async fn get_tenant(&self, subdomain: &str) -> Result<Tenant, ApiError> {
        let resp = self
            .http
            .get(self.url("/api/tenant"))
            .query(&[("subdomain", subdomain)])
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        decode(resp).await
    }

    pub async fn list_clients(&self, tenant_id: TenantId) -> Result<Vec<Client>, ApiError> {
        let resp = self
            .http
            .get(self.url("/api/clients"))
            .query(&[("tenantId", tenant_id.to_string())])
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        decode(resp).await
    }

    /// Create (or idempotently re-submit) a client record.
    pub async fn create_client(&self, record: &Client) -> Result<Client, ApiError> {
        let resp = self
            .http
            .post(self.url("/api/clients"))
            .json(record)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        decode(resp).await
    }

    pub async fn list_measurements(
        &self,
        tenant_id: TenantId,
        client_id: ClientId,
    ) -> Result<Vec<Measurement>, ApiError> {
        let resp = self
            .http
            .get(self.url("/api/measurements"))
            .query(&[
                ("tenantId", tenant_id.to_string()),
                ("clientId", client_id.to_string()),
            ])
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        decode(resp).await
    }

    pub async fn create_measurement(&self, record: &Measurement) -> Result<Measurement, ApiError> {
        let resp = self
            .http
            .post(self.url("/api/measurements"))
            .json(record)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        decode(resp).await
    }

    pub async fn list_orders(&self, tenant_id: TenantId) -> Result<Vec<Order>, ApiError> {
        let resp = self
            .http
            .get(self.url("/api/orders"))
            .query(&[("tenantId", tenant_id.to_string())])
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        decode(resp).await
    }

    pub async fn create_order(&self, record: &Order) -> Result<Order, ApiError> {
        let resp = self
            .http
            .post(self.url("/api/orders"))
            .json(record)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        decode(resp).await
    }

    /// Partial update. The response is the server's canonical record.
    pub async fn update_order(&self, id: OrderId, patch: &OrderPatch) -> Result<Order, ApiError> {
        let resp = self
            .http
            .patch(self.url(&format!("/api/orders/{id}")))
            .json(patch)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        decode(resp).await
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(ApiError::from_status(status));
    }
    resp.json::<T>()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}
