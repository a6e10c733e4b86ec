use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use atelier_core::{DomainError, Entity, TenantId};

/// Per-tenant presentation settings, stored as an open JSON blob server-side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// One workshop. Resolved once per session from the host subdomain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub subdomain: String,
    #[serde(default)]
    pub settings: TenantSettings,
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    /// Build a tenant record, validating the parts a workshop operator types in.
    pub fn new(name: impl Into<String>, subdomain: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        let subdomain = subdomain.into();

        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if subdomain.trim().is_empty() {
            return Err(DomainError::validation("subdomain cannot be empty"));
        }

        Ok(Self {
            id: TenantId::new(),
            name,
            subdomain,
            settings: TenantSettings::default(),
            created_at: Utc::now(),
        })
    }
}

impl Entity for Tenant {
    type Id = TenantId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// The resolved tenant scope a data-layer session operates under.
///
/// Handles take this by value (it is cheap to clone) so their tenant binding
/// is explicit at construction rather than read from ambient state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant: Tenant,
}

impl TenantContext {
    pub fn new(tenant: Tenant) -> Self {
        Self { tenant }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant.id
    }

    pub fn subdomain(&self) -> &str {
        &self.tenant.subdomain
    }

    pub fn tenant(&self) -> &Tenant {
        &self.tenant
    }
}
