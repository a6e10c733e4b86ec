use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use atelier_core::{ClientId, DomainError, Entity, GarmentType, MeasurementId, TenantId};

/// Dimension names the measurement form proposes by default.
///
/// The map is open: a workshop can record any named dimension, these are
/// just the usual ones.
pub const STANDARD_DIMENSIONS: [&str; 8] = [
    "shoulders",
    "chest",
    "waist",
    "hips",
    "length",
    "sleeves",
    "wrist",
    "neck",
];

/// One measurement sheet for a client and a garment type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub id: MeasurementId,
    pub tenant_id: TenantId,
    pub client_id: ClientId,
    pub garment_type: GarmentType,
    /// Named dimensions in centimeters.
    pub data: BTreeMap<String, f64>,
    /// Whether this is the sheet a new order should start from.
    pub is_last: bool,
    pub created_at: DateTime<Utc>,
}

impl Entity for Measurement {
    type Id = MeasurementId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Operator input for taking a new measurement sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMeasurement {
    pub client_id: ClientId,
    pub garment_type: GarmentType,
    pub data: BTreeMap<String, f64>,
    #[serde(default = "default_is_last")]
    pub is_last: bool,
}

fn default_is_last() -> bool {
    true
}

impl NewMeasurement {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.data.is_empty() {
            return Err(DomainError::validation(
                "a measurement needs at least one dimension",
            ));
        }
        for (name, value) in &self.data {
            if name.trim().is_empty() {
                return Err(DomainError::validation("dimension name cannot be empty"));
            }
            if !value.is_finite() || *value < 0.0 {
                return Err(DomainError::validation(format!(
                    "dimension {name} must be a non-negative number"
                )));
            }
        }
        Ok(())
    }

    /// Materialize the full record under a tenant, minting the id and the
    /// creation timestamp locally.
    pub fn into_record(self, tenant_id: TenantId) -> Result<Measurement, DomainError> {
        self.validate()?;
        Ok(Measurement {
            id: MeasurementId::new(),
            tenant_id,
            client_id: self.client_id,
            garment_type: self.garment_type,
            data: self.data,
            is_last: self.is_last,
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

    fn test_client_id() -> ClientId {
        ClientId::new()
    }

    fn caftan_sheet() -> NewMeasurement {
        let mut data = BTreeMap::new();
        data.insert("shoulders".to_string(), 42.0);
        data.insert("chest".to_string(), 96.5);
        data.insert("length".to_string(), 140.0);
        NewMeasurement {
            client_id: test_client_id(),
            garment_type: GarmentType::Caftan,
            data,
            is_last: true,
        }
    }

    #[test]
    fn into_record_keeps_dimensions_and_flags() {
        let tenant_id = test_tenant_id();
        let new = caftan_sheet();
        let client_id = new.client_id;

        let m = new.into_record(tenant_id).unwrap();
        assert_eq!(m.tenant_id, tenant_id);
        assert_eq!(m.client_id, client_id);
        assert_eq!(m.garment_type, GarmentType::Caftan);
        assert_eq!(m.data.get("chest"), Some(&96.5));
        assert!(m.is_last);
    }

    #[test]
    fn rejects_empty_dimension_map() {
        let new = NewMeasurement {
            data: BTreeMap::new(),
            ..caftan_sheet()
        };
        let err = new.into_record(test_tenant_id()).unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error for empty dimension map"),
        }
    }

    #[test]
    fn rejects_negative_dimension() {
        let mut new = caftan_sheet();
        new.data.insert("waist".to_string(), -3.0);

        let err = new.into_record(test_tenant_id()).unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("waist") => {}
            _ => panic!("Expected Validation error naming the bad dimension"),
        }
    }

    #[test]
    fn rejects_non_finite_dimension() {
        let mut new = caftan_sheet();
        new.data.insert("neck".to_string(), f64::NAN);

        let err = new.into_record(test_tenant_id()).unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("neck") => {}
            _ => panic!("Expected Validation error for NaN dimension"),
        }
    }

    #[test]
    fn is_last_defaults_to_true_on_the_wire() {
        let json = format!(
            r#"{{"clientId":"{}","garmentType":"Jellaba","data":{{"length":120.0}}}}"#,
            test_client_id()
        );
        let new: NewMeasurement = serde_json::from_str(&json).unwrap();
        assert!(new.is_last);
    }

    #[test]
    fn wire_json_is_camel_case() {
        let m = caftan_sheet().into_record(test_tenant_id()).unwrap();
        let json = serde_json::to_value(&m).unwrap();
        assert!(json.get("clientId").is_some());
        assert!(json.get("garmentType").is_some());
        assert!(json.get("isLast").is_some());
        assert!(json.get("client_id").is_none());
    }
}
