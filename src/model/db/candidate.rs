use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

const PLACEHOLDER_PHOTO_BASE: &str = "https://placehold.co/150x150/003049/ffffff?text=";

/// Core candidate data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCore {
    pub election_id: Id,
    pub name: String,
    #[serde(default)]
    pub motto: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifesto: Option<String>,
    pub photo_url: String,
    /// Cached tally. Only ever changed by the vote ledger's atomic cast.
    pub votes: u64,
}

/// A candidate without an ID.
pub type NewCandidate = CandidateCore;

/// A candidate from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}

/// A generated avatar showing the first two letters of the candidate's name.
pub fn placeholder_photo(name: &str) -> String {
    let initials: String = name
        .chars()
        .filter(|c| c.is_alphanumeric())
        .take(2)
        .flat_map(char::to_uppercase)
        .collect();
    format!("{PLACEHOLDER_PHOTO_BASE}{initials}")
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_uses_initial_letters() {
        assert_eq!(
            placeholder_photo("hodan ali"),
            "https://placehold.co/150x150/003049/ffffff?text=HO"
        );
        assert_eq!(
            placeholder_photo(" x"),
            "https://placehold.co/150x150/003049/ffffff?text=X"
        );
    }
}
