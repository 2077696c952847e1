use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// An entry in the administrator-curated roll of enrolled students.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntryCore {
    pub university_id: String,
    pub full_name: String,
    /// E.164 formatted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// A registry entry without an ID.
pub type NewRegistryEntry = RegistryEntryCore;

/// A registry entry from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub entry: RegistryEntryCore,
}

impl Deref for RegistryEntry {
    type Target = RegistryEntryCore;

    fn deref(&self) -> &Self::Target {
        &self.entry
    }
}

impl DerefMut for RegistryEntry {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.entry
    }
}
