use phonenumber::PhoneNumber;
use serde::{Deserialize, Serialize};

use crate::error::AdminError;
use crate::model::{
    db::registry::{NewRegistryEntry, RegistryEntry},
    mongodb::{hex_id, Id},
};

/// A student registry entry as submitted by the administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySpec {
    pub university_id: String,
    pub full_name: String,
    /// International format, e.g. `+1 650-253-0000`.
    #[serde(default)]
    pub phone: Option<String>,
}

impl RegistrySpec {
    pub fn validate(self) -> Result<NewRegistryEntry, AdminError> {
        let university_id = self.university_id.trim().to_uppercase();
        let full_name = self.full_name.trim().to_string();
        if university_id.is_empty() || full_name.is_empty() {
            return Err(AdminError::ValidationFailed(
                "University ID and full name are required.".to_string(),
            ));
        }

        let phone = match self.phone.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => {
                let number = raw.parse::<PhoneNumber>().map_err(|e| {
                    AdminError::ValidationFailed(format!("Invalid phone number '{raw}': {e}"))
                })?;
                if !phonenumber::is_valid(&number) {
                    return Err(AdminError::ValidationFailed(format!(
                        "Invalid phone number '{raw}'"
                    )));
                }
                Some(number.to_string())
            }
        };

        Ok(NewRegistryEntry {
            university_id,
            full_name,
            phone,
        })
    }
}

/// A registry entry as shown to the administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryDescription {
    #[serde(with = "hex_id")]
    pub id: Id,
    pub university_id: String,
    pub full_name: String,
    pub phone: Option<String>,
}

impl From<RegistryEntry> for RegistryDescription {
    fn from(entry: RegistryEntry) -> Self {
        Self {
            id: entry.id,
            university_id: entry.entry.university_id,
            full_name: entry.entry.full_name,
            phone: entry.entry.phone,
        }
    }
}
