//! The vote ledger: the only place votes are written and tallies change.
//!
//! A cast checks eligibility, the candidate and the election window up front,
//! then records the vote and increments the tally inside a single transaction.
//! The unique `(voter_id, election_id)` index is the final word on double votes;
//! the in-transaction lookup only short-circuits the common case.

use std::time::{Duration, Instant};

use chrono::{DateTime, Timelike, Utc};
use log::{error, info, warn};
use mongodb::{
    bson::doc,
    error::{Error as DbError, UNKNOWN_TRANSACTION_COMMIT_RESULT},
    options::{FindOneAndUpdateOptions, ReturnDocument},
    Client, ClientSession, Database,
};
use rand::Rng;
use rocket::{
    request::{self, FromRequest, Request},
    tokio::time::sleep,
    State,
};

use crate::config::Config;
use crate::error::VoteError;
use crate::model::{
    api::ballot::VoteReceipt,
    common::ElectionStatus,
    db::{
        candidate::Candidate,
        election::Election,
        profile::Profile,
        vote::{NewVote, Vote},
    },
    eligibility,
    mongodb::{is_duplicate_key_error, is_transient_transaction_error, Coll, Id},
};

/// How long a cast keeps re-running a transaction that hit a transient error.
const TRANSACTION_TIME_BUDGET: Duration = Duration::from_secs(120);
/// Upper bound of the first pause between attempts; doubles per attempt.
const BACKOFF_BASE: Duration = Duration::from_millis(5);
const BACKOFF_CAP: Duration = Duration::from_millis(500);
/// How many times a commit with an unknown outcome is retried.
const MAX_COMMIT_ATTEMPTS: usize = 3;

/// Who is casting a vote.
#[derive(Debug, Clone, Copy)]
pub struct Voter<'a> {
    pub id: &'a str,
    pub email: &'a str,
}

/// Why a transaction attempt stopped.
enum Abort {
    /// The vote must not be recorded.
    Rejected(VoteError),
    /// The store failed; may or may not be retryable.
    Db(DbError),
}

impl From<DbError> for Abort {
    fn from(e: DbError) -> Self {
        Self::Db(e)
    }
}

pub struct VoteLedger<'a> {
    client: &'a Client,
    db: &'a Database,
    config: &'a Config,
}

impl<'a> VoteLedger<'a> {
    pub fn new(client: &'a Client, db: &'a Database, config: &'a Config) -> Self {
        Self { client, db, config }
    }

    /// Record `voter`'s vote for `candidate_id` in `election_id` at time `now`.
    ///
    /// Any failure to read or write the store is reported as
    /// [`VoteError::StorageUnavailable`], never as success. Transactions that
    /// collide with other voters' casts are re-run with jittered backoff until
    /// [`TRANSACTION_TIME_BUDGET`] runs out.
    pub async fn cast_vote(
        &self,
        voter: Voter<'_>,
        candidate_id: Id,
        election_id: Id,
        now: DateTime<Utc>,
    ) -> Result<VoteReceipt, VoteError> {
        // The store keeps milliseconds; the receipt must show the stored time.
        let now = to_millis(now);

        // 1. Eligibility.
        let profiles = Coll::<Profile>::from_db(self.db);
        let eligible = eligibility::is_eligible_voter(&profiles, voter.id, voter.email, self.config)
            .await
            .map_err(storage_failure)?;
        if !eligible {
            return Err(VoteError::NotEligible);
        }

        // 2. The candidate, and the election it stands in.
        let candidate = Coll::<Candidate>::from_db(self.db)
            .find_one(candidate_id.as_doc(), None)
            .await
            .map_err(storage_failure)?
            .filter(|c| c.election_id == election_id)
            .ok_or(VoteError::CandidateNotFound)?;
        let election = Coll::<Election>::from_db(self.db)
            .find_one(candidate.election_id.as_doc(), None)
            .await
            .map_err(storage_failure)?
            .ok_or(VoteError::CandidateNotFound)?;

        // 3. The election must be open right now.
        let status = election.status_at(now);
        if status != ElectionStatus::Active {
            return Err(VoteError::ElectionNotActive(status));
        }

        // 4 & 5. Check, insert and increment as one transaction.
        let deadline = Instant::now() + TRANSACTION_TIME_BUDGET;
        let mut attempt = 1;
        loop {
            match self.try_record(voter, candidate_id, election_id, now).await {
                Ok(receipt) => {
                    info!(
                        "Vote recorded in election {election_id} for candidate {candidate_id} (tally {})",
                        receipt.tally
                    );
                    return Ok(receipt);
                }
                Err(Abort::Rejected(reason)) => {
                    warn!("Vote in election {election_id} rejected: {reason}");
                    return Err(reason);
                }
                Err(Abort::Db(e)) if is_duplicate_key_error(&e) => {
                    warn!("Vote in election {election_id} rejected by unique index");
                    return Err(VoteError::AlreadyVoted);
                }
                Err(Abort::Db(e)) if is_transient_transaction_error(&e) => {
                    if Instant::now() >= deadline {
                        error!(
                            "Vote transaction for election {election_id} gave up after {attempt} attempts: {e}"
                        );
                        return Err(VoteError::StorageUnavailable);
                    }
                    let pause = backoff(attempt);
                    warn!(
                        "Vote transaction attempt {attempt} hit a transient error, retrying in {}ms: {e}",
                        pause.as_millis()
                    );
                    sleep(pause).await;
                    attempt += 1;
                }
                Err(Abort::Db(e)) => return Err(storage_failure(e)),
            }
        }
    }

    /// One attempt at the transaction. Aborts on any failure.
    async fn try_record(
        &self,
        voter: Voter<'_>,
        candidate_id: Id,
        election_id: Id,
        now: DateTime<Utc>,
    ) -> Result<VoteReceipt, Abort> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        match self
            .record(&mut session, voter, candidate_id, election_id, now)
            .await
        {
            Ok(receipt) => {
                commit(&mut session).await?;
                Ok(receipt)
            }
            Err(abort) => {
                // Nothing was committed either way; a failed abort changes nothing.
                if let Err(e) = session.abort_transaction().await {
                    warn!("Failed to abort vote transaction: {e}");
                }
                Err(abort)
            }
        }
    }

    async fn record(
        &self,
        session: &mut ClientSession,
        voter: Voter<'_>,
        candidate_id: Id,
        election_id: Id,
        now: DateTime<Utc>,
    ) -> Result<VoteReceipt, Abort> {
        // Fast path. A failed lookup aborts rather than being read as "no vote".
        let existing = doc! {
            "voter_id": voter.id,
            "election_id": election_id,
        };
        if Coll::<Vote>::from_db(self.db)
            .find_one_with_session(existing, None, session)
            .await?
            .is_some()
        {
            return Err(Abort::Rejected(VoteError::AlreadyVoted));
        }

        let vote = NewVote {
            voter_id: voter.id.to_string(),
            candidate_id,
            election_id,
            cast_at: now,
        };
        Coll::<NewVote>::from_db(self.db)
            .insert_one_with_session(&vote, None, session)
            .await?;

        let filter = doc! {
            "_id": candidate_id,
            "election_id": election_id,
        };
        let update = doc! {
            "$inc": { "votes": 1 },
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let candidate = Coll::<Candidate>::from_db(self.db)
            .find_one_and_update_with_session(filter, update, options, session)
            .await?
            .ok_or(Abort::Rejected(VoteError::CandidateNotFound))?;

        Ok(VoteReceipt {
            election_id,
            candidate_id,
            cast_at: now,
            tally: candidate.votes,
        })
    }
}

/// Commit, retrying only the commit itself when its outcome is unknown.
async fn commit(session: &mut ClientSession) -> Result<(), DbError> {
    let mut attempt = 1;
    loop {
        match session.commit_transaction().await {
            Ok(()) => return Ok(()),
            Err(e)
                if e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
                    && attempt < MAX_COMMIT_ATTEMPTS =>
            {
                warn!("Vote commit outcome unknown, retrying commit: {e}");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// A random pause of up to `BACKOFF_BASE * 2^(attempt - 1)`, capped at `BACKOFF_CAP`.
fn backoff(attempt: u32) -> Duration {
    let ceiling = BACKOFF_BASE
        .saturating_mul(1 << attempt.saturating_sub(1).min(16))
        .min(BACKOFF_CAP);
    let millis = ceiling.as_millis() as u64;
    Duration::from_millis(rand::thread_rng().gen_range(0..=millis))
}

fn to_millis(time: DateTime<Utc>) -> DateTime<Utc> {
    time.with_nanosecond(time.nanosecond() / 1_000_000 * 1_000_000)
        .unwrap_or(time)
}

fn storage_failure(e: DbError) -> VoteError {
    error!("Vote not recorded, store failure: {e}");
    VoteError::StorageUnavailable
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for VoteLedger<'r> {
    type Error = ();

    /// Panics iff the store client, database or config are not managed.
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let client = req.guard::<&State<Client>>().await.unwrap();
        let db = req.guard::<&State<Database>>().await.unwrap();
        let config = req.guard::<&State<Config>>().await.unwrap();
        request::Outcome::Success(VoteLedger::new(client, db, config))
    }
}
