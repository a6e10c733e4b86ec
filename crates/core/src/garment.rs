use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Garment categories a workshop takes measurements for.
///
/// Wire names match the values the management API stores, including the
/// French catch-all `"Autre"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GarmentType {
    Caftan,
    Takchitta,
    Jellaba,
    Gandoura,
    Jabador,
    #[serde(rename = "Autre")]
    Other,
}

impl GarmentType {
    /// All garment types, in display order.
    pub const ALL: [GarmentType; 6] = [
        GarmentType::Caftan,
        GarmentType::Takchitta,
        GarmentType::Jellaba,
        GarmentType::Gandoura,
        GarmentType::Jabador,
        GarmentType::Other,
    ];

    /// Wire name of the garment type.
    pub fn as_str(&self) -> &'static str {
        match self {
            GarmentType::Caftan => "Caftan",
            GarmentType::Takchitta => "Takchitta",
            GarmentType::Jellaba => "Jellaba",
            GarmentType::Gandoura => "Gandoura",
            GarmentType::Jabador => "Jabador",
            GarmentType::Other => "Autre",
        }
    }
}

impl core::fmt::Display for GarmentType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for GarmentType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GarmentType::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown garment type: {s}")))
    }
}
