use chrono::Utc;
use rocket::{serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            election::{ElectionDetail, ElectionSummary},
            listing::Listing,
            results::ElectionResults,
        },
        directory::ElectionDirectory,
        mongodb::Id,
    },
};

pub fn routes() -> Vec<Route> {
    routes![elections, election, results]
}

#[get("/elections")]
pub async fn elections(directory: ElectionDirectory) -> Json<Listing<ElectionSummary>> {
    let elections = directory.list_elections(Utc::now()).await;
    Json(Listing::degrade(elections, "elections"))
}

#[get("/elections/<election_id>")]
pub async fn election(
    election_id: Id,
    directory: ElectionDirectory,
) -> Result<Json<ElectionDetail>> {
    directory
        .detail(election_id, Utc::now())
        .await
        .map(Json)
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))
}

#[get("/elections/<election_id>/results")]
pub async fn results(
    election_id: Id,
    directory: ElectionDirectory,
) -> Result<Json<ElectionResults>> {
    directory
        .results_for(election_id, Utc::now())
        .await
        .map(Json)
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))
}

#[cfg(test)]
mod tests {
    use mongodb::{
        bson::{doc, Document},
        Database,
    };
    use rocket::{http::Status, local::asynchronous::Client};

    use crate::model::{
        api::notice::Notice,
        common::ElectionStatus,
        db::{
            candidate::{Candidate, NewCandidate},
            election::NewElection,
        },
        mongodb::{Coll, MongoCollection},
    };

    use super::*;

    async fn insert_election(elections: &Coll<NewElection>, election: NewElection) -> Id {
        elections
            .insert_one(election, None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into()
    }

    #[backend_test]
    async fn anyone_can_list_elections(client: Client, elections: Coll<NewElection>) {
        insert_election(&elections, NewElection::closed_example()).await;
        insert_election(&elections, NewElection::active_example()).await;

        let response = client.get(uri!(elections)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let listing: Listing<ElectionSummary> = response.into_json().await.unwrap();
        assert!(listing.warning.is_none());
        let statuses: Vec<_> = listing.items.iter().map(|e| e.status).collect();
        assert_eq!(statuses, vec![ElectionStatus::Active, ElectionStatus::Closed]);
    }

    #[backend_test]
    async fn election_detail_includes_candidates(
        client: Client,
        elections: Coll<NewElection>,
        candidates: Coll<NewCandidate>,
    ) {
        let election_id = insert_election(&elections, NewElection::active_example()).await;
        candidates
            .insert_many(
                [
                    NewCandidate::example(election_id),
                    NewCandidate::example2(election_id),
                ],
                None,
            )
            .await
            .unwrap();

        let response = client.get(uri!(election(election_id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let detail: ElectionDetail = response.into_json().await.unwrap();
        assert_eq!(detail.election.map(|e| e.id), Some(election_id));
        assert_eq!(detail.candidates.len(), 2);
        assert!(detail.warning.is_none());
    }

    #[backend_test]
    async fn results_of_missing_election_are_not_found(client: Client) {
        let response = client.get(uri!(results(Id::new()))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test]
    async fn results_are_ranked(
        client: Client,
        elections: Coll<NewElection>,
        candidates: Coll<NewCandidate>,
    ) {
        let election_id = insert_election(&elections, NewElection::active_example()).await;
        let mut trailing = NewCandidate::example(election_id);
        trailing.votes = 1;
        let mut leading = NewCandidate::example2(election_id);
        leading.votes = 4;
        candidates
            .insert_many([trailing, leading], None)
            .await
            .unwrap();

        let response = client.get(uri!(results(election_id))).dispatch().await;
        let results: ElectionResults = response.into_json().await.unwrap();
        assert!(!results.is_final);
        assert_eq!(results.total_votes, 5);
        let votes: Vec<_> = results.candidates.iter().map(|c| c.votes).collect();
        assert_eq!(votes, vec![4, 1]);
    }

    #[backend_test]
    async fn unreadable_results_still_answer(
        client: Client,
        db: Database,
        elections: Coll<NewElection>,
    ) {
        let election_id = insert_election(&elections, NewElection::active_example()).await;
        db.collection::<Document>(Candidate::NAME)
            .insert_one(doc! { "election_id": election_id, "votes": "many" }, None)
            .await
            .unwrap();

        let response = client.get(uri!(results(election_id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let results: ElectionResults = response.into_json().await.unwrap();
        assert_eq!(results.election.map(|e| e.id), Some(election_id));
        assert!(results.candidates.is_empty());
        assert_eq!(results.warning, Some(Notice::warning("Unable to load results.")));
    }
}
