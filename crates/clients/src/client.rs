use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use atelier_core::{ClientId, DomainError, Entity, TenantId};

/// A customer of one workshop.
///
/// The identifier is generated on the device that first records the client,
/// so a record created offline keeps the same id once the remote store
/// confirms it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: ClientId,
    pub tenant_id: TenantId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entity for Client {
    type Id = ClientId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Operator input for recording a new client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClient {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl NewClient {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        Ok(())
    }

    /// Materialize the full record under a tenant, minting the id and the
    /// creation timestamp locally.
    pub fn into_record(self, tenant_id: TenantId) -> Result<Client, DomainError> {
        self.validate()?;
        Ok(Client {
            id: ClientId::new(),
            tenant_id,
            name: self.name,
            phone: self.phone,
            address: self.address,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    #[test]
    fn into_record_mints_id_and_timestamp() {
        let new = NewClient {
            name: "Ahmed Alaoui".to_string(),
            phone: Some("+212600000000".to_string()),
            address: None,
        };
        let tenant_id = test_tenant_id();

        let client = new.into_record(tenant_id).unwrap();
        assert_eq!(client.tenant_id, tenant_id);
        assert_eq!(client.name, "Ahmed Alaoui");
        assert_eq!(client.phone.as_deref(), Some("+212600000000"));
        assert_eq!(client.address, None);
    }

    #[test]
    fn into_record_rejects_empty_name() {
        let new = NewClient {
            name: "   ".to_string(),
            phone: None,
            address: None,
        };

        let err = new.into_record(test_tenant_id()).unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error for empty name"),
        }
    }

    #[test]
    fn distinct_records_get_distinct_ids() {
        let tenant_id = test_tenant_id();
        let a = NewClient {
            name: "A".to_string(),
            ..NewClient::default()
        }
        .into_record(tenant_id)
        .unwrap();
        let b = NewClient {
            name: "B".to_string(),
            ..NewClient::default()
        }
        .into_record(tenant_id)
        .unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn wire_json_is_camel_case_and_omits_empty_optionals() {
        let client = NewClient {
            name: "Ahmed Alaoui".to_string(),
            phone: None,
            address: None,
        }
        .into_record(test_tenant_id())
        .unwrap();

        let json = serde_json::to_value(&client).unwrap();
        assert!(json.get("tenantId").is_some());
        assert!(json.get("createdAt").is_some());
        assert!(json.get("phone").is_none());
        assert!(json.get("tenant_id").is_none());
    }
}
