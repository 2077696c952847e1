use std::fmt::Display;

use serde::{Deserialize, Serialize};

use super::{
    candidate::CandidateDescription, election::ElectionSummary, listing::Listing, notice::Notice,
};

/// Standings for one election, most votes first.
///
/// If the store could not be read, the standings are empty and `warning` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub election: Option<ElectionSummary>,
    /// True once the election has closed.
    pub is_final: bool,
    pub total_votes: u64,
    pub candidates: Vec<CandidateDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<Notice>,
}

impl ElectionResults {
    /// Standings from candidates that are already ranked.
    pub fn new<E: Display>(
        election: ElectionSummary,
        is_final: bool,
        ranked: Result<Vec<CandidateDescription>, E>,
    ) -> Self {
        let Listing {
            items: candidates,
            warning,
        } = Listing::degrade(ranked, "results");
        Self {
            election: Some(election),
            is_final,
            total_votes: candidates.iter().map(|c| c.votes).sum(),
            candidates,
            warning,
        }
    }

    /// The election could not be read.
    pub fn unavailable<E: Display>(error: E) -> Self {
        let Listing { items, warning } = Listing::degrade(Err(error), "results");
        Self {
            election: None,
            is_final: false,
            total_votes: 0,
            candidates: items,
            warning,
        }
    }
}
