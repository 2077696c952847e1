use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::common::Role;

/// A registered user's profile. The ID is the identity provider's ID for the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    pub display_name: String,
    /// Only the administrator has no university ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub university_id: Option<String>,
    /// Set by the administrator; only verified voters may vote.
    pub verified: bool,
    #[serde(default)]
    pub role: Role,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// A fresh, unverified voter profile.
    pub fn new_voter(
        id: String,
        email: String,
        display_name: String,
        university_id: String,
    ) -> Self {
        Self {
            id,
            email,
            display_name,
            university_id: Some(university_id),
            verified: false,
            role: Role::Voter,
            created_at: Utc::now(),
        }
    }

    /// The administrator's profile. It is never eligible to vote, so `verified` is irrelevant.
    pub fn new_administrator(id: String, email: String) -> Self {
        Self {
            id,
            display_name: "Administrator".to_string(),
            email,
            university_id: None,
            verified: true,
            role: Role::Administrator,
            created_at: Utc::now(),
        }
    }
}
