use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AdminError;
use crate::model::{
    common::ElectionStatus,
    db::election::{Election, NewElection},
    mongodb::hex_id,
    mongodb::Id,
};

use super::{
    candidate::{CandidateDescription, CandidateSpec},
    listing::Listing,
    notice::Notice,
};

/// The editable fields of an election.
///
/// Times must carry an explicit UTC offset; they are normalised to UTC on input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionEdit {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl ElectionEdit {
    /// Reject empty titles and windows that do not end strictly after they start.
    pub fn validate(self) -> Result<NewElection, AdminError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(AdminError::ValidationFailed(
                "An election needs a title.".to_string(),
            ));
        }
        if self.end_time <= self.start_time {
            return Err(AdminError::ValidationFailed(
                "The end time must be after the start time.".to_string(),
            ));
        }
        Ok(NewElection {
            title,
            description: self.description.trim().to_string(),
            start_time: self.start_time,
            end_time: self.end_time,
        })
    }
}

/// A new election, optionally with its initial candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionSpec {
    #[serde(flatten)]
    pub election: ElectionEdit,
    #[serde(default)]
    pub candidates: Vec<CandidateSpec>,
}

/// An election as shown to users, with its status derived at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionSummary {
    #[serde(with = "hex_id")]
    pub id: Id,
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: ElectionStatus,
}

impl ElectionSummary {
    pub fn at(election: Election, now: DateTime<Utc>) -> Self {
        let status = election.status_at(now);
        Self {
            id: election.id,
            title: election.election.title,
            description: election.election.description,
            start_time: election.election.start_time,
            end_time: election.election.end_time,
            status,
        }
    }
}

/// An election together with its candidates.
///
/// A store failure leaves the candidates empty and sets `warning`; the election
/// itself is absent only if it could not be read at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDetail {
    #[serde(flatten)]
    pub election: Option<ElectionSummary>,
    pub candidates: Vec<CandidateDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<Notice>,
}

impl ElectionDetail {
    pub fn new<E: Display>(
        election: ElectionSummary,
        candidates: Result<Vec<CandidateDescription>, E>,
    ) -> Self {
        let Listing {
            items: candidates,
            warning,
        } = Listing::degrade(candidates, "candidates");
        Self {
            election: Some(election),
            candidates,
            warning,
        }
    }

    /// The election could not be read.
    pub fn unavailable<E: Display>(error: E) -> Self {
        let Listing { items, warning } = Listing::degrade(Err(error), "election");
        Self {
            election: None,
            candidates: items,
            warning,
        }
    }
}

/// An election from one voter's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterElection {
    #[serde(flatten)]
    pub election: ElectionSummary,
    pub has_voted: bool,
}


#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rocket::serde::json::serde_json;

    use super::*;

    #[test]
    fn window_must_end_after_start() {
        let mut edit = ElectionEdit::example();
        edit.end_time = edit.start_time;
        assert!(edit.validate().is_err());

        let mut edit = ElectionEdit::example();
        edit.end_time = edit.start_time - Duration::seconds(1);
        assert!(edit.validate().is_err());

        assert!(ElectionEdit::example().validate().is_ok());
    }

    #[test]
    fn blank_title_is_rejected() {
        let mut edit = ElectionEdit::example();
        edit.title = "  ".to_string();
        assert!(edit.validate().is_err());
    }

    #[test]
    fn times_are_normalised_to_utc() {
        let json = r#"{
            "title": "Treasurer",
            "start_time": "2025-01-01T03:00:00+03:00",
            "end_time": "2025-01-02T00:00:00Z"
        }"#;
        let edit: ElectionEdit = serde_json::from_str(json).unwrap();
        assert_eq!(edit.start_time.to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn naive_times_are_rejected() {
        let json = r#"{
            "title": "Treasurer",
            "start_time": "2025-01-01T03:00:00",
            "end_time": "2025-01-02T00:00:00"
        }"#;
        assert!(serde_json::from_str::<ElectionEdit>(json).is_err());
    }
}
