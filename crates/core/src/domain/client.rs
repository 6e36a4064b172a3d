use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::company::CompanyId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub String);

/// Structured postal address, stored as a JSON column. All fields are
/// optional; an entirely empty address serializes as `{}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl Address {
    pub fn is_empty(&self) -> bool {
        self.line1.is_none()
            && self.line2.is_none()
            && self.city.is_none()
            && self.postal_code.is_none()
            && self.country.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub company_id: CompanyId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<Address>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::Address;

    #[test]
    fn empty_address_serializes_to_empty_object() {
        let address = Address::default();
        assert!(address.is_empty());
        assert_eq!(serde_json::to_value(&address).unwrap(), serde_json::json!({}));
    }

    #[test]
    fn partial_address_keeps_only_present_fields() {
        let address = Address {
            line1: Some("12 Harbour Rd".to_string()),
            city: Some("Rotterdam".to_string()),
            ..Address::default()
        };
        let value = serde_json::to_value(&address).unwrap();
        assert_eq!(value, serde_json::json!({"line1": "12 Harbour Rd", "city": "Rotterdam"}));
    }
}
