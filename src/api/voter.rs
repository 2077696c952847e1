use chrono::Utc;
use mongodb::bson::doc;
use rocket::{
    http::{ContentType, Status},
    response::status::Custom,
    serde::json::Json,
    Route, State,
};

use crate::{
    error::{Error, Result, VoteError},
    model::{
        api::{
            auth::{AuthToken, Session, Voter},
            ballot::{BallotRequest, VoteReceipt},
            election::VoterElection,
            listing::Listing,
            roll::ProfileView,
        },
        db::profile::Profile,
        directory::ElectionDirectory,
        eligibility,
        ledger::{self, VoteLedger},
        mongodb::{Coll, Id},
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![profile, elections, vote, voter_only_get, voter_only_post]
}

#[get("/voter/profile")]
pub async fn profile(
    token: AuthToken<Voter>,
    profiles: Coll<Profile>,
    config: &State<Config>,
) -> Result<Json<ProfileView>> {
    let with_id = doc! {
        "_id": token.id.as_str(),
    };
    let profile = profiles
        .find_one(with_id, None)
        .await?
        .ok_or_else(|| Error::not_found("Profile"))?;
    let eligible = eligibility::decide(&token.email, Some(&profile), config);
    Ok(Json(ProfileView {
        email: profile.email,
        display_name: profile.display_name,
        university_id: profile.university_id,
        verified: profile.verified,
        eligible,
    }))
}

#[get("/voter/elections")]
pub async fn elections(
    token: AuthToken<Voter>,
    directory: ElectionDirectory,
) -> Json<Listing<VoterElection>> {
    let elections = directory.list_for_voter(&token.id, Utc::now()).await;
    Json(Listing::degrade(elections, "elections"))
}

#[post("/voter/elections/<election_id>/vote", data = "<ballot>", format = "json")]
pub async fn vote(
    token: AuthToken<Voter>,
    election_id: Id,
    ballot: Json<BallotRequest>,
    ledger: VoteLedger<'_>,
) -> Result<Custom<Json<VoteReceipt>>> {
    let voter = ledger::Voter {
        id: &token.id,
        email: &token.email,
    };
    let receipt = ledger
        .cast_vote(voter, ballot.candidate_id, election_id, Utc::now())
        .await?;
    Ok(Custom(Status::Created, Json(receipt)))
}

/// Anything under `/voter` that matched no voter route.
fn voter_fallback(session: Session, content_type: Option<&ContentType>, expects_json: bool) -> Error {
    match session {
        Session::Anonymous => super::login_required(),
        Session::Administrator { .. } => VoteError::NotEligible.into(),
        Session::Voter { .. } => super::unmatched(content_type, expects_json),
    }
}

#[get("/voter/<_..>", rank = 100)]
fn voter_only_get(session: Session) -> Error {
    voter_fallback(session, None, false)
}

#[post("/voter/<_..>", rank = 100)]
fn voter_only_post(session: Session, content_type: Option<&ContentType>) -> Error {
    voter_fallback(session, content_type, true)
}

#[cfg(test)]
mod tests {
    use mongodb::Database;
    use rocket::{local::asynchronous::Client, serde::json::serde_json::json};

    use crate::model::{
        api::notice::Notice,
        db::{
            candidate::{Candidate, NewCandidate},
            election::NewElection,
            vote::Vote,
        },
    };

    use super::*;

    async fn insert_election(db: &Database, election: NewElection) -> (Id, Id) {
        let election_id: Id = Coll::<NewElection>::from_db(db)
            .insert_one(election, None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into();
        let candidate_id: Id = Coll::<NewCandidate>::from_db(db)
            .insert_one(NewCandidate::example(election_id), None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into();
        (election_id, candidate_id)
    }

    async fn cast(client: &Client, election_id: Id, candidate_id: Id) -> Status {
        client
            .post(uri!(vote(election_id)))
            .header(ContentType::JSON)
            .body(json!(BallotRequest { candidate_id }).to_string())
            .dispatch()
            .await
            .status()
    }

    #[backend_test(voter)]
    async fn verified_voter_votes_once(client: Client, db: Database, votes: Coll<Vote>) {
        let (election_id, candidate_id) = insert_election(&db, NewElection::active_example()).await;

        let response = client
            .post(uri!(vote(election_id)))
            .header(ContentType::JSON)
            .body(json!(BallotRequest { candidate_id }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Created, response.status());
        let receipt: VoteReceipt = response.into_json().await.unwrap();
        assert_eq!(receipt.tally, 1);

        // The second attempt conflicts and changes nothing.
        let response = client
            .post(uri!(vote(election_id)))
            .header(ContentType::JSON)
            .body(json!(BallotRequest { candidate_id }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Conflict, response.status());
        let notice: Notice = response.into_json().await.unwrap();
        assert_eq!(notice.message, VoteError::AlreadyVoted.to_string());
        assert_eq!(votes.count_documents(None, None).await.unwrap(), 1);

        let candidate = Coll::<Candidate>::from_db(&db)
            .find_one(candidate_id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(candidate.votes, 1);
    }

    #[backend_test(voter)]
    async fn closed_election_refuses_votes(client: Client, db: Database) {
        let (election_id, candidate_id) = insert_election(&db, NewElection::closed_example()).await;
        assert_eq!(Status::Conflict, cast(&client, election_id, candidate_id).await);
    }

    #[backend_test(voter)]
    async fn voter_sees_has_voted(client: Client, db: Database) {
        let (election_id, candidate_id) = insert_election(&db, NewElection::active_example()).await;
        insert_election(&db, NewElection::upcoming_example()).await;
        assert_eq!(Status::Created, cast(&client, election_id, candidate_id).await);

        let listing: Listing<VoterElection> = client
            .get(uri!(elections))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert_eq!(listing.items.len(), 2);
        for election in listing.items {
            assert_eq!(election.has_voted, election.election.id == election_id);
        }
    }

    #[backend_test(voter)]
    async fn profile_reports_eligibility(client: Client) {
        let view: ProfileView = client
            .get(uri!(profile))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert!(view.verified);
        assert!(view.eligible);
    }

    #[backend_test(admin)]
    async fn admin_cannot_vote(client: Client, db: Database, votes: Coll<Vote>) {
        let (election_id, candidate_id) = insert_election(&db, NewElection::active_example()).await;
        assert_eq!(Status::Forbidden, cast(&client, election_id, candidate_id).await);
        assert_eq!(votes.count_documents(None, None).await.unwrap(), 0);
    }

    #[backend_test]
    async fn anonymous_cannot_vote(client: Client, db: Database) {
        let (election_id, candidate_id) = insert_election(&db, NewElection::active_example()).await;
        assert_eq!(Status::Unauthorized, cast(&client, election_id, candidate_id).await);
    }

    #[backend_test(voter)]
    async fn voter_missing_a_route_is_not_told_to_log_in(
        client: Client,
        db: Database,
        votes: Coll<Vote>,
    ) {
        let (election_id, candidate_id) = insert_election(&db, NewElection::active_example()).await;

        let response = client
            .post(uri!(vote(election_id)))
            .body(json!(BallotRequest { candidate_id }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::UnsupportedMediaType, response.status());

        let response = client
            .post("/voter/elections/not-an-id/vote")
            .header(ContentType::JSON)
            .body(json!(BallotRequest { candidate_id }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());

        let response = client.get("/voter/nowhere").dispatch().await;
        assert_eq!(Status::NotFound, response.status());
        assert_eq!(votes.count_documents(None, None).await.unwrap(), 0);
    }
}
