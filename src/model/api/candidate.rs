use serde::{Deserialize, Serialize};

use crate::error::AdminError;
use crate::model::{
    db::candidate::{placeholder_photo, Candidate, NewCandidate},
    mongodb::{hex_id, Id},
};

/// The editable fields of a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub name: String,
    #[serde(default)]
    pub motto: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub year_level: Option<String>,
    #[serde(default)]
    pub manifesto: Option<String>,
    /// Falls back to a generated placeholder.
    #[serde(default)]
    pub photo_url: Option<String>,
}

impl CandidateSpec {
    /// Validate and convert into a new candidate with no votes.
    pub fn into_candidate(self, election_id: Id) -> Result<NewCandidate, AdminError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(AdminError::ValidationFailed(
                "A candidate needs a name.".to_string(),
            ));
        }
        let photo_url = non_blank(self.photo_url).unwrap_or_else(|| placeholder_photo(&name));
        Ok(NewCandidate {
            election_id,
            name,
            motto: self.motto.trim().to_string(),
            bio: non_blank(self.bio),
            department: non_blank(self.department),
            year_level: non_blank(self.year_level),
            manifesto: non_blank(self.manifesto),
            photo_url,
            votes: 0,
        })
    }
}

fn non_blank(field: Option<String>) -> Option<String> {
    field
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// A candidate as shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDescription {
    #[serde(with = "hex_id")]
    pub id: Id,
    #[serde(with = "hex_id")]
    pub election_id: Id,
    pub name: String,
    pub motto: String,
    pub bio: Option<String>,
    pub department: Option<String>,
    pub year_level: Option<String>,
    pub manifesto: Option<String>,
    pub photo_url: String,
    pub votes: u64,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        let Candidate { id, candidate } = candidate;
        Self {
            id,
            election_id: candidate.election_id,
            name: candidate.name,
            motto: candidate.motto,
            bio: candidate.bio,
            department: candidate.department,
            year_level: candidate.year_level,
            manifesto: candidate.manifesto,
            photo_url: candidate.photo_url,
            votes: candidate.votes,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_photo_gets_placeholder() {
        let candidate = CandidateSpec::example().into_candidate(Id::new()).unwrap();
        assert_eq!(candidate.photo_url, placeholder_photo("Hodan Ali"));
        assert_eq!(candidate.votes, 0);

        let mut spec = CandidateSpec::example();
        spec.photo_url = Some("   ".to_string());
        let candidate = spec.into_candidate(Id::new()).unwrap();
        assert_eq!(candidate.photo_url, placeholder_photo("Hodan Ali"));
    }

    #[test]
    fn given_photo_is_kept() {
        let candidate = CandidateSpec::example2().into_candidate(Id::new()).unwrap();
        assert_eq!(candidate.photo_url, "https://cdn.example.edu/liban.png");
    }

    #[test]
    fn nameless_candidate_is_rejected() {
        let mut spec = CandidateSpec::example();
        spec.name = " ".to_string();
        assert!(spec.into_candidate(Id::new()).is_err());
    }
}
