use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::{hex_id, Id};

/// A voter's choice in one election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotRequest {
    #[serde(with = "hex_id")]
    pub candidate_id: Id,
}

/// Proof that a vote was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    #[serde(with = "hex_id")]
    pub election_id: Id,
    #[serde(with = "hex_id")]
    pub candidate_id: Id,
    pub cast_at: DateTime<Utc>,
    /// The candidate's tally including this vote.
    pub tally: u64,
}
