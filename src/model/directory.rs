//! Read-only views over elections and their candidates.
//!
//! Status is always derived from the clock at read time; nothing here trusts
//! a stored status.

use std::cmp::Reverse;
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use mongodb::{bson::doc, error::Error as DbError, Database};
use rocket::{
    futures::TryStreamExt,
    request::{self, FromRequest, Request},
    State,
};

use crate::model::{
    api::{
        candidate::CandidateDescription,
        election::{ElectionDetail, ElectionSummary, VoterElection},
        results::ElectionResults,
    },
    common::ElectionStatus,
    db::{candidate::Candidate, election::Election, vote::Vote},
    mongodb::{Coll, Id},
};

pub struct ElectionDirectory {
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
}

impl ElectionDirectory {
    pub fn new(db: &Database) -> Self {
        Self {
            elections: Coll::from_db(db),
            candidates: Coll::from_db(db),
            votes: Coll::from_db(db),
        }
    }

    /// Every election, most recently started first.
    pub async fn list_elections(&self, now: DateTime<Utc>) -> Result<Vec<ElectionSummary>, DbError> {
        let mut elections: Vec<Election> = self.elections.find(None, None).await?.try_collect().await?;
        order_by_start(&mut elections);
        Ok(elections
            .into_iter()
            .map(|election| ElectionSummary::at(election, now))
            .collect())
    }

    /// Every election, flagged with whether `voter_id` has already voted in it.
    pub async fn list_for_voter(
        &self,
        voter_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<VoterElection>, DbError> {
        let elections = self.list_elections(now).await?;
        let voted: HashSet<Id> = self
            .votes
            .find(doc! { "voter_id": voter_id }, None)
            .await?
            .map_ok(|vote| vote.election_id)
            .try_collect()
            .await?;
        Ok(elections
            .into_iter()
            .map(|election| VoterElection {
                has_voted: voted.contains(&election.id),
                election,
            })
            .collect())
    }

    pub async fn election(
        &self,
        election_id: Id,
        now: DateTime<Utc>,
    ) -> Result<Option<ElectionSummary>, DbError> {
        let election = self.elections.find_one(election_id.as_doc(), None).await?;
        Ok(election.map(|election| ElectionSummary::at(election, now)))
    }

    /// An election with its candidates, or `None` if there is no such election.
    ///
    /// Store failures degrade into an [`ElectionDetail`] carrying a warning.
    pub async fn detail(&self, election_id: Id, now: DateTime<Utc>) -> Option<ElectionDetail> {
        match self.election(election_id, now).await {
            Ok(Some(election)) => Some(ElectionDetail::new(
                election,
                self.candidates_for(election_id).await,
            )),
            Ok(None) => None,
            Err(e) => Some(ElectionDetail::unavailable(e)),
        }
    }

    /// The candidates standing in an election, in a stable order.
    pub async fn candidates_for(&self, election_id: Id) -> Result<Vec<CandidateDescription>, DbError> {
        let mut candidates: Vec<Candidate> = self
            .candidates
            .find(doc! { "election_id": election_id }, None)
            .await?
            .try_collect()
            .await?;
        candidates.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(candidates.into_iter().map(Into::into).collect())
    }

    /// Standings for an election, or `None` if there is no such election.
    ///
    /// Store failures degrade into empty standings carrying a warning.
    pub async fn results_for(&self, election_id: Id, now: DateTime<Utc>) -> Option<ElectionResults> {
        let election = match self.election(election_id, now).await {
            Ok(Some(election)) => election,
            Ok(None) => return None,
            Err(e) => return Some(ElectionResults::unavailable(e)),
        };
        let ranked = self.candidates_for(election_id).await.map(|mut candidates| {
            rank(&mut candidates);
            candidates
        });
        let is_final = election.status == ElectionStatus::Closed;
        Some(ElectionResults::new(election, is_final, ranked))
    }
}

/// Latest start first; ties by ID so the order never flickers between reads.
fn order_by_start(elections: &mut [Election]) {
    elections.sort_by_key(|e| (Reverse(e.start_time), e.id));
}

/// Most votes first; ties by candidate ID.
fn rank(candidates: &mut [CandidateDescription]) {
    candidates.sort_by_key(|c| (Reverse(c.votes), c.id));
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ElectionDirectory {
    type Error = ();

    /// Panics iff the database is not managed.
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let db = req.guard::<&State<Database>>().await.unwrap();
        request::Outcome::Success(ElectionDirectory::new(db))
    }
}
