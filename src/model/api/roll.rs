use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::db::profile::Profile;

/// One row of the voter roll shown to the administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterRollEntry {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub university_id: Option<String>,
    pub verified: bool,
    pub registered_at: DateTime<Utc>,
    /// Name on the student registry for this university ID, if listed.
    pub registry_name: Option<String>,
}

impl VoterRollEntry {
    pub fn new(profile: Profile, registry_name: Option<String>) -> Self {
        Self {
            id: profile.id,
            email: profile.email,
            display_name: profile.display_name,
            university_id: profile.university_id,
            verified: profile.verified,
            registered_at: profile.created_at,
            registry_name,
        }
    }
}

/// One recorded vote, with names resolved for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotLogEntry {
    pub voter_email: String,
    pub voter_name: String,
    pub candidate_name: String,
    pub cast_at: DateTime<Utc>,
}

/// The signed-in voter's own profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileView {
    pub email: String,
    pub display_name: String,
    pub university_id: Option<String>,
    pub verified: bool,
    pub eligible: bool,
}
