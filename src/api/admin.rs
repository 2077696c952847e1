use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{info, warn};
use mongodb::{bson::doc, error::Error as DbError, options::FindOptions, Client};
use rocket::{
    data::{Data, ToByteUnit},
    futures::TryStreamExt,
    http::{ContentType, Status},
    response::status::Custom,
    serde::json::Json,
    Route, State,
};

use crate::{
    error::{AdminError, Error, Result},
    model::{
        api::{
            auth::{Admin, AuthToken, Session},
            candidate::{CandidateDescription, CandidateSpec},
            election::{ElectionDetail, ElectionEdit, ElectionSpec, ElectionSummary},
            listing::Listing,
            notice::Notice,
            registry::{RegistryDescription, RegistrySpec},
            roll::{BallotLogEntry, VoterRollEntry},
        },
        common::Role,
        db::{
            candidate::{Candidate, NewCandidate},
            election::Election,
            profile::Profile,
            registry::{NewRegistryEntry, RegistryEntry},
            vote::Vote,
        },
        directory::ElectionDirectory,
        mongodb::{is_duplicate_key_error, Coll, Id},
    },
    platform::Platform,
};

/// Largest candidate photo accepted.
const PHOTO_LIMIT_MIB: u64 = 5;

pub fn routes() -> Vec<Route> {
    routes![
        create_election,
        modify_election,
        delete_election,
        create_candidate,
        modify_candidate,
        delete_candidate,
        upload_photo,
        voter_roll,
        verify_voter,
        unverify_voter,
        delete_voter,
        ballot_log,
        get_registry,
        create_registry_entry,
        modify_registry_entry,
        delete_registry_entry,
        admin_only_get,
        admin_only_post,
        admin_only_put,
        admin_only_delete,
    ]
}

#[post("/admin/elections", data = "<spec>", format = "json")]
async fn create_election(
    _token: AuthToken<Admin>,
    spec: Json<ElectionSpec>,
    elections: Coll<Election>,
    new_candidates: Coll<NewCandidate>,
    directory: ElectionDirectory,
    db_client: &State<Client>,
) -> Result<Custom<Json<ElectionDetail>>> {
    // Validate everything before writing anything.
    let ElectionSpec {
        election,
        candidates,
    } = spec.0;
    let election = Election {
        id: Id::new(),
        election: election.validate()?,
    };
    let candidates = candidates
        .into_iter()
        .map(|candidate| candidate.into_candidate(election.id))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;
        elections
            .insert_one_with_session(&election, None, &mut session)
            .await?;
        if !candidates.is_empty() {
            new_candidates
                .insert_many_with_session(&candidates, None, &mut session)
                .await?;
        }
        session.commit_transaction().await?;
    }
    info!(
        "Created election {} with {} candidates",
        election.id,
        candidates.len()
    );

    let detail = directory
        .detail(election.id, Utc::now())
        .await
        .ok_or_else(|| Error::not_found(format!("Election {}", election.id)))?;
    Ok(Custom(Status::Created, Json(detail)))
}

#[put("/admin/elections/<election_id>", data = "<edit>", format = "json")]
async fn modify_election(
    _token: AuthToken<Admin>,
    election_id: Id,
    edit: Json<ElectionEdit>,
    elections: Coll<Election>,
) -> Result<Json<ElectionSummary>> {
    let election = Election {
        id: election_id,
        election: edit.0.validate()?,
    };
    let result = elections
        .replace_one(election_id.as_doc(), &election, None)
        .await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Election {election_id}")));
    }
    info!("Modified election {election_id}");
    Ok(Json(ElectionSummary::at(election, Utc::now())))
}

/// Delete an election together with its candidates and votes.
#[delete("/admin/elections/<election_id>")]
async fn delete_election(
    _token: AuthToken<Admin>,
    election_id: Id,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
    db_client: &State<Client>,
) -> Result<Json<Notice>> {
    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;

    let in_election = doc! {
        "election_id": election_id,
    };
    let deleted_votes = votes
        .delete_many_with_session(in_election.clone(), None, &mut session)
        .await?
        .deleted_count;
    let deleted_candidates = candidates
        .delete_many_with_session(in_election, None, &mut session)
        .await?
        .deleted_count;
    let result = elections
        .delete_one_with_session(election_id.as_doc(), None, &mut session)
        .await?;
    if result.deleted_count == 0 {
        session.abort_transaction().await?;
        return Err(Error::not_found(format!("Election {election_id}")));
    }
    session.commit_transaction().await?;

    info!("Deleted election {election_id} ({deleted_candidates} candidates, {deleted_votes} votes)");
    Ok(Json(Notice::success("Election deleted.")))
}

#[post("/admin/elections/<election_id>/candidates", data = "<spec>", format = "json")]
async fn create_candidate(
    _token: AuthToken<Admin>,
    election_id: Id,
    spec: Json<CandidateSpec>,
    elections: Coll<Election>,
    new_candidates: Coll<NewCandidate>,
) -> Result<Custom<Json<CandidateDescription>>> {
    let candidate = spec.0.into_candidate(election_id)?;
    if elections
        .find_one(election_id.as_doc(), None)
        .await?
        .is_none()
    {
        return Err(Error::not_found(format!("Election {election_id}")));
    }

    let candidate_id: Id = new_candidates
        .insert_one(&candidate, None)
        .await?
        .inserted_id
        .as_object_id()
        .ok_or_else(|| Error::Status(Status::InternalServerError, "Bad candidate ID".to_string()))?
        .into();
    info!("Added candidate {candidate_id} to election {election_id}");

    let candidate = Candidate {
        id: candidate_id,
        candidate,
    };
    Ok(Custom(Status::Created, Json(candidate.into())))
}

/// Edit a candidate's details. The tally is never touched here.
#[put("/admin/candidates/<candidate_id>", data = "<spec>", format = "json")]
async fn modify_candidate(
    _token: AuthToken<Admin>,
    candidate_id: Id,
    spec: Json<CandidateSpec>,
    candidates: Coll<Candidate>,
) -> Result<Json<CandidateDescription>> {
    let existing = candidates
        .find_one(candidate_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Candidate {candidate_id}")))?;
    let keep_photo = spec.photo_url.as_deref().map_or(true, |url| url.trim().is_empty())
        && !existing.photo_url.is_empty();
    let mut edited = spec.0.into_candidate(existing.election_id)?;
    if keep_photo {
        edited.photo_url = existing.photo_url.clone();
    }

    let update = doc! {
        "$set": {
            "name": &edited.name,
            "motto": &edited.motto,
            "bio": edited.bio.as_deref(),
            "department": edited.department.as_deref(),
            "year_level": edited.year_level.as_deref(),
            "manifesto": edited.manifesto.as_deref(),
            "photo_url": &edited.photo_url,
        }
    };
    candidates
        .update_one(candidate_id.as_doc(), update, None)
        .await?;
    info!("Modified candidate {candidate_id}");

    let candidate = candidates
        .find_one(candidate_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Candidate {candidate_id}")))?;
    Ok(Json(candidate.into()))
}

/// Delete a candidate together with the votes cast for them.
#[delete("/admin/candidates/<candidate_id>")]
async fn delete_candidate(
    _token: AuthToken<Admin>,
    candidate_id: Id,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
    db_client: &State<Client>,
) -> Result<Json<Notice>> {
    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;

    let for_candidate = doc! {
        "candidate_id": candidate_id,
    };
    let deleted_votes = votes
        .delete_many_with_session(for_candidate, None, &mut session)
        .await?
        .deleted_count;
    let result = candidates
        .delete_one_with_session(candidate_id.as_doc(), None, &mut session)
        .await?;
    if result.deleted_count == 0 {
        session.abort_transaction().await?;
        return Err(Error::not_found(format!("Candidate {candidate_id}")));
    }
    session.commit_transaction().await?;

    info!("Deleted candidate {candidate_id} ({deleted_votes} votes)");
    Ok(Json(Notice::success("Candidate deleted successfully!")))
}

/// Upload a new photo for a candidate. The body is the raw image.
#[put("/admin/candidates/<candidate_id>/photo", data = "<photo>")]
async fn upload_photo(
    _token: AuthToken<Admin>,
    candidate_id: Id,
    content_type: Option<&ContentType>,
    photo: Data<'_>,
    candidates: Coll<Candidate>,
    platform: &State<Platform>,
) -> Result<Json<CandidateDescription>> {
    let content_type = content_type
        .filter(|ct| ct.top() == "image")
        .ok_or_else(|| Error::validation("Photos must be uploaded as an image content type."))?;
    if candidates
        .find_one(candidate_id.as_doc(), None)
        .await?
        .is_none()
    {
        return Err(Error::not_found(format!("Candidate {candidate_id}")));
    }

    let bytes = photo
        .open(PHOTO_LIMIT_MIB.mebibytes())
        .into_bytes()
        .await
        .map_err(|e| Error::Status(Status::BadRequest, format!("Could not read photo: {e}")))?;
    if !bytes.is_complete() {
        return Err(Error::Status(
            Status::PayloadTooLarge,
            format!("Photos may be at most {PHOTO_LIMIT_MIB} MiB."),
        ));
    }

    let path = format!(
        "{candidate_id}/{}.{}",
        Utc::now().timestamp_millis(),
        content_type.sub()
    );
    let url = platform
        .storage
        .upload(&path, &content_type.to_string(), bytes.into_inner())
        .await?;

    let update = doc! {
        "$set": { "photo_url": &url },
    };
    candidates
        .update_one(candidate_id.as_doc(), update, None)
        .await?;
    info!("Uploaded photo for candidate {candidate_id} to {url}");

    let candidate = candidates
        .find_one(candidate_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Candidate {candidate_id}")))?;
    Ok(Json(candidate.into()))
}

#[get("/admin/voters")]
async fn voter_roll(
    _token: AuthToken<Admin>,
    profiles: Coll<Profile>,
    registry: Coll<RegistryEntry>,
) -> Json<Listing<VoterRollEntry>> {
    Json(Listing::degrade(
        load_roll(&profiles, &registry).await,
        "voters",
    ))
}

/// Every voter profile, newest first, matched against the student registry.
async fn load_roll(
    profiles: &Coll<Profile>,
    registry: &Coll<RegistryEntry>,
) -> std::result::Result<Vec<VoterRollEntry>, DbError> {
    let options = FindOptions::builder()
        .sort(doc! { "created_at": -1 })
        .build();
    let voters: Vec<Profile> = profiles
        .find(doc! { "role": Role::Voter }, options)
        .await?
        .try_collect()
        .await?;
    let names: HashMap<String, String> = registry
        .find(None, None)
        .await?
        .map_ok(|entry| (entry.entry.university_id, entry.entry.full_name))
        .try_collect()
        .await?;

    Ok(voters
        .into_iter()
        .map(|profile| {
            let registry_name = profile
                .university_id
                .as_ref()
                .and_then(|id| names.get(id))
                .cloned();
            VoterRollEntry::new(profile, registry_name)
        })
        .collect())
}

async fn set_verified(profiles: &Coll<Profile>, voter_id: &str, verified: bool) -> Result<()> {
    let filter = doc! {
        "_id": voter_id,
        "role": Role::Voter,
    };
    let update = doc! {
        "$set": { "verified": verified },
    };
    let result = profiles.update_one(filter, update, None).await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Voter {voter_id}")));
    }
    info!("Set verified={verified} for voter {voter_id}");
    Ok(())
}

#[post("/admin/voters/<voter_id>/verify")]
async fn verify_voter(
    _token: AuthToken<Admin>,
    voter_id: &str,
    profiles: Coll<Profile>,
) -> Result<Json<Notice>> {
    set_verified(&profiles, voter_id, true).await?;
    Ok(Json(Notice::success("Voter verified.")))
}

#[post("/admin/voters/<voter_id>/unverify")]
async fn unverify_voter(
    _token: AuthToken<Admin>,
    voter_id: &str,
    profiles: Coll<Profile>,
) -> Result<Json<Notice>> {
    set_verified(&profiles, voter_id, false).await?;
    Ok(Json(Notice::success("Voter verification removed.")))
}

/// Delete a voter's profile. Voters who have voted are kept so the ledger stays whole.
#[delete("/admin/voters/<voter_id>")]
async fn delete_voter(
    _token: AuthToken<Admin>,
    voter_id: &str,
    profiles: Coll<Profile>,
    votes: Coll<Vote>,
) -> Result<Json<Notice>> {
    if votes
        .find_one(doc! { "voter_id": voter_id }, None)
        .await?
        .is_some()
    {
        return Err(Error::validation(
            "This voter has already voted and cannot be deleted. Unverify them instead.",
        ));
    }
    let filter = doc! {
        "_id": voter_id,
        "role": Role::Voter,
    };
    let result = profiles.delete_one(filter, None).await?;
    if result.deleted_count == 0 {
        return Err(Error::not_found(format!("Voter {voter_id}")));
    }
    info!("Deleted voter {voter_id}");
    Ok(Json(Notice::success("Voter deleted.")))
}

#[get("/admin/elections/<election_id>/votes")]
async fn ballot_log(
    _token: AuthToken<Admin>,
    election_id: Id,
    votes: Coll<Vote>,
    profiles: Coll<Profile>,
    candidates: Coll<Candidate>,
) -> Json<Listing<BallotLogEntry>> {
    Json(Listing::degrade(
        load_ballot_log(election_id, &votes, &profiles, &candidates).await,
        "votes",
    ))
}

/// Every vote in an election, most recent first, with names resolved.
async fn load_ballot_log(
    election_id: Id,
    votes: &Coll<Vote>,
    profiles: &Coll<Profile>,
    candidates: &Coll<Candidate>,
) -> std::result::Result<Vec<BallotLogEntry>, DbError> {
    let options = FindOptions::builder().sort(doc! { "cast_at": -1 }).build();
    let cast: Vec<Vote> = votes
        .find(doc! { "election_id": election_id }, options)
        .await?
        .try_collect()
        .await?;
    let candidate_names: HashMap<Id, String> = candidates
        .find(doc! { "election_id": election_id }, None)
        .await?
        .map_ok(|candidate| (candidate.id, candidate.candidate.name))
        .try_collect()
        .await?;
    let voter_ids: Vec<&str> = cast.iter().map(|vote| vote.voter_id.as_str()).collect();
    let voters: HashMap<String, Profile> = profiles
        .find(doc! { "_id": { "$in": voter_ids } }, None)
        .await?
        .map_ok(|profile| (profile.id.clone(), profile))
        .try_collect()
        .await?;

    Ok(cast
        .into_iter()
        .map(|vote| {
            let (voter_email, voter_name) = match voters.get(&vote.voter_id) {
                Some(profile) => (profile.email.clone(), profile.display_name.clone()),
                None => (String::new(), "Unknown".to_string()),
            };
            BallotLogEntry {
                voter_email,
                voter_name,
                candidate_name: candidate_names
                    .get(&vote.candidate_id)
                    .cloned()
                    .unwrap_or_else(|| "Unknown".to_string()),
                cast_at: vote.cast_at,
            }
        })
        .collect())
}

#[get("/admin/registry")]
async fn get_registry(
    _token: AuthToken<Admin>,
    registry: Coll<RegistryEntry>,
) -> Json<Listing<RegistryDescription>> {
    Json(Listing::degrade(
        load_registry(&registry).await,
        "student registry",
    ))
}

async fn load_registry(
    registry: &Coll<RegistryEntry>,
) -> std::result::Result<Vec<RegistryDescription>, DbError> {
    let options = FindOptions::builder()
        .sort(doc! { "university_id": 1 })
        .build();
    registry
        .find(None, options)
        .await?
        .map_ok(RegistryDescription::from)
        .try_collect()
        .await
}

/// Map a unique index violation on the registry to a validation failure.
fn registry_write_error(e: DbError, university_id: &str) -> Error {
    if is_duplicate_key_error(&e) {
        Error::validation(format!("University ID {university_id} is already in the registry."))
    } else {
        e.into()
    }
}

#[post("/admin/registry", data = "<spec>", format = "json")]
async fn create_registry_entry(
    _token: AuthToken<Admin>,
    spec: Json<RegistrySpec>,
    new_entries: Coll<NewRegistryEntry>,
) -> Result<Custom<Json<RegistryDescription>>> {
    let entry = spec.0.validate()?;
    let id: Id = new_entries
        .insert_one(&entry, None)
        .await
        .map_err(|e| registry_write_error(e, &entry.university_id))?
        .inserted_id
        .as_object_id()
        .ok_or_else(|| Error::Status(Status::InternalServerError, "Bad registry ID".to_string()))?
        .into();
    info!("Added registry entry {id}");
    Ok(Custom(
        Status::Created,
        Json(RegistryEntry { id, entry }.into()),
    ))
}

#[put("/admin/registry/<entry_id>", data = "<spec>", format = "json")]
async fn modify_registry_entry(
    _token: AuthToken<Admin>,
    entry_id: Id,
    spec: Json<RegistrySpec>,
    registry: Coll<RegistryEntry>,
) -> Result<Json<RegistryDescription>> {
    let entry = RegistryEntry {
        id: entry_id,
        entry: spec.0.validate()?,
    };
    let result = registry
        .replace_one(entry_id.as_doc(), &entry, None)
        .await
        .map_err(|e| registry_write_error(e, &entry.university_id))?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Registry entry {entry_id}")));
    }
    info!("Modified registry entry {entry_id}");
    Ok(Json(entry.into()))
}

#[delete("/admin/registry/<entry_id>")]
async fn delete_registry_entry(
    _token: AuthToken<Admin>,
    entry_id: Id,
    registry: Coll<RegistryEntry>,
) -> Result<Json<Notice>> {
    let result = registry.delete_one(entry_id.as_doc(), None).await?;
    if result.deleted_count == 0 {
        return Err(Error::not_found(format!("Registry entry {entry_id}")));
    }
    info!("Deleted registry entry {entry_id}");
    Ok(Json(Notice::success("Registry entry deleted successfully.")))
}

/// Anything under `/admin` that matched no administrator route.
fn admin_fallback(session: Session, content_type: Option<&ContentType>, expects_json: bool) -> Error {
    match session {
        Session::Anonymous => super::login_required(),
        Session::Voter { id, .. } => {
            warn!("Refused voter {id} access to an administrator route");
            AdminError::NotAuthorized.into()
        }
        Session::Administrator { .. } => super::unmatched(content_type, expects_json),
    }
}

/// Whether the POST or PUT route at `path` takes a JSON body.
fn takes_json(path: &Path) -> bool {
    !matches!(
        path.file_name().and_then(|name| name.to_str()),
        Some("photo" | "verify" | "unverify")
    )
}

#[get("/admin/<_..>", rank = 100)]
fn admin_only_get(session: Session) -> Error {
    admin_fallback(session, None, false)
}

#[post("/admin/<path..>", rank = 100)]
fn admin_only_post(path: PathBuf, session: Session, content_type: Option<&ContentType>) -> Error {
    admin_fallback(session, content_type, takes_json(&path))
}

#[put("/admin/<path..>", rank = 100)]
fn admin_only_put(path: PathBuf, session: Session, content_type: Option<&ContentType>) -> Error {
    admin_fallback(session, content_type, takes_json(&path))
}

#[delete("/admin/<_..>", rank = 100)]
fn admin_only_delete(session: Session) -> Error {
    admin_fallback(session, None, false)
}

#[cfg(test)]
mod tests {
    use mongodb::Database;
    use rocket::{local::asynchronous::Client, serde::json::serde_json::json};

    use crate::model::{
        api::candidate::CandidateSpec,
        db::{election::NewElection, vote::NewVote},
    };

    use super::*;

    async fn insert_election(db: &Database) -> (Id, [Id; 2]) {
        let election_id: Id = Coll::<NewElection>::from_db(db)
            .insert_one(NewElection::active_example(), None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into();
        let candidates = Coll::<NewCandidate>::from_db(db);
        let mut candidate_ids = [Id::new(); 2];
        for (slot, candidate) in candidate_ids.iter_mut().zip([
            NewCandidate::example(election_id),
            NewCandidate::example2(election_id),
        ]) {
            *slot = candidates
                .insert_one(candidate, None)
                .await
                .unwrap()
                .inserted_id
                .as_object_id()
                .unwrap()
                .into();
        }
        (election_id, candidate_ids)
    }

    /// Record a vote directly, as the ledger would.
    async fn insert_vote(db: &Database, voter: &Profile, election_id: Id, candidate_id: Id) {
        let vote = NewVote {
            voter_id: voter.id.clone(),
            candidate_id,
            election_id,
            cast_at: Utc::now(),
        };
        Coll::<NewVote>::from_db(db)
            .insert_one(vote, None)
            .await
            .unwrap();
        Coll::<Candidate>::from_db(db)
            .update_one(
                candidate_id.as_doc(),
                doc! { "$inc": { "votes": 1 } },
                None,
            )
            .await
            .unwrap();
    }

    #[backend_test(admin)]
    async fn create_election_with_candidates(client: Client, elections: Coll<Election>) {
        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .body(json!(ElectionSpec::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Created, response.status());

        let detail: ElectionDetail = response.into_json().await.unwrap();
        assert_eq!(detail.candidates.len(), 2);
        assert!(detail.candidates.iter().all(|c| c.votes == 0));
        assert_eq!(elections.count_documents(None, None).await.unwrap(), 1);
    }

    #[backend_test(admin)]
    async fn invalid_election_writes_nothing(
        client: Client,
        elections: Coll<Election>,
        candidates: Coll<Candidate>,
    ) {
        let mut spec = ElectionSpec::example();
        spec.election.end_time = spec.election.start_time;
        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .body(json!(spec).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::UnprocessableEntity, response.status());

        // A bad candidate also rejects the whole election.
        let mut spec = ElectionSpec::example();
        spec.candidates[1].name = "  ".to_string();
        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .body(json!(spec).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::UnprocessableEntity, response.status());

        assert_eq!(elections.count_documents(None, None).await.unwrap(), 0);
        assert_eq!(candidates.count_documents(None, None).await.unwrap(), 0);
    }

    #[backend_test(voter)]
    async fn voter_is_not_authorized(client: Client, elections: Coll<Election>) {
        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .body(json!(ElectionSpec::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Forbidden, response.status());

        let response = client.get(uri!(voter_roll)).dispatch().await;
        assert_eq!(Status::Forbidden, response.status());
        assert_eq!(elections.count_documents(None, None).await.unwrap(), 0);
    }

    #[backend_test]
    async fn anonymous_must_log_in(client: Client) {
        let response = client.get(uri!(get_registry)).dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());

        let response = client.delete(uri!(delete_election(Id::new()))).dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test(admin)]
    async fn admin_missing_a_route_is_still_admin(client: Client, db: Database) {
        let (_, candidate_ids) = insert_election(&db).await;

        let response = client.delete("/admin/elections/not-hex").dispatch().await;
        assert_eq!(Status::NotFound, response.status());

        let response = client
            .put(uri!(modify_candidate(candidate_ids[0])))
            .header(ContentType::Plain)
            .body(json!(CandidateSpec::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::UnsupportedMediaType, response.status());

        let response = client.post("/admin/voters/not-hex/verify").dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[test]
    fn json_bodies_by_path() {
        assert!(takes_json(Path::new("elections")));
        assert!(takes_json(Path::new("candidates/64b7f0c2a1b2c3d4e5f60718")));
        assert!(!takes_json(Path::new("candidates/64b7f0c2a1b2c3d4e5f60718/photo")));
        assert!(!takes_json(Path::new("voters/abc/verify")));
    }

    #[backend_test(admin)]
    async fn delete_election_cascades(
        client: Client,
        db: Database,
        elections: Coll<Election>,
        candidates: Coll<Candidate>,
        votes: Coll<Vote>,
    ) {
        let (election_id, candidate_ids) = insert_election(&db).await;
        insert_vote(&db, &Profile::example(), election_id, candidate_ids[0]).await;

        let response = client
            .delete(uri!(delete_election(election_id)))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        assert_eq!(elections.count_documents(None, None).await.unwrap(), 0);
        assert_eq!(candidates.count_documents(None, None).await.unwrap(), 0);
        assert_eq!(votes.count_documents(None, None).await.unwrap(), 0);

        let response = client
            .delete(uri!(delete_election(election_id)))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test(admin)]
    async fn candidate_edits_keep_tally_and_photo(client: Client, db: Database) {
        let (election_id, candidate_ids) = insert_election(&db).await;
        insert_vote(&db, &Profile::example(), election_id, candidate_ids[0]).await;

        let mut spec = CandidateSpec::example();
        spec.motto = "A new motto".to_string();
        spec.photo_url = None;
        let response = client
            .put(uri!(modify_candidate(candidate_ids[0])))
            .header(ContentType::JSON)
            .body(json!(spec).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        let candidate: CandidateDescription = response.into_json().await.unwrap();
        assert_eq!(candidate.motto, "A new motto");
        assert_eq!(candidate.votes, 1);
        assert_eq!(
            candidate.photo_url,
            NewCandidate::example(election_id).photo_url
        );
    }

    #[backend_test(admin)]
    async fn delete_candidate_removes_their_votes(
        client: Client,
        db: Database,
        candidates: Coll<Candidate>,
        votes: Coll<Vote>,
    ) {
        let (election_id, candidate_ids) = insert_election(&db).await;
        insert_vote(&db, &Profile::example(), election_id, candidate_ids[0]).await;
        insert_vote(
            &db,
            &Profile::unverified_example(),
            election_id,
            candidate_ids[1],
        )
        .await;

        let response = client
            .delete(uri!(delete_candidate(candidate_ids[0])))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        assert_eq!(candidates.count_documents(None, None).await.unwrap(), 1);
        assert_eq!(votes.count_documents(None, None).await.unwrap(), 1);
    }

    #[backend_test(admin)]
    async fn photo_upload_stores_public_url(client: Client, db: Database) {
        let (_, candidate_ids) = insert_election(&db).await;

        let response = client
            .put(uri!(upload_photo(candidate_ids[0])))
            .header(ContentType::PNG)
            .body([0x89, b'P', b'N', b'G'])
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let candidate: CandidateDescription = response.into_json().await.unwrap();
        assert!(candidate.photo_url.starts_with("memory://photos/"));
        assert!(candidate.photo_url.ends_with(".png"));

        let response = client
            .put(uri!(upload_photo(candidate_ids[0])))
            .header(ContentType::Plain)
            .body("not a photo")
            .dispatch()
            .await;
        assert_eq!(Status::UnprocessableEntity, response.status());
    }

    #[backend_test(admin)]
    async fn verify_and_unverify_voter(
        client: Client,
        profiles: Coll<Profile>,
        new_entries: Coll<NewRegistryEntry>,
    ) {
        let voter = Profile::unverified_example();
        profiles.insert_one(&voter, None).await.unwrap();
        let mut listed = RegistrySpec::example().validate().unwrap();
        listed.university_id = voter.university_id.clone().unwrap();
        new_entries.insert_one(&listed, None).await.unwrap();

        let response = client
            .post(uri!(verify_voter(voter.id.as_str())))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        let roll: Listing<VoterRollEntry> = client
            .get(uri!(voter_roll))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert_eq!(roll.items.len(), 1);
        assert!(roll.items[0].verified);
        assert_eq!(roll.items[0].registry_name.as_ref(), Some(&listed.full_name));

        let response = client
            .post(uri!(unverify_voter(voter.id.as_str())))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let stored = profiles
            .find_one(doc! { "_id": voter.id.as_str() }, None)
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.verified);

        let response = client
            .post(uri!(verify_voter("no-such-voter")))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test(admin)]
    async fn voter_who_voted_cannot_be_deleted(
        client: Client,
        db: Database,
        profiles: Coll<Profile>,
    ) {
        let voted = Profile::example();
        let fresh = Profile::unverified_example();
        profiles.insert_many([&voted, &fresh], None).await.unwrap();
        let (election_id, candidate_ids) = insert_election(&db).await;
        insert_vote(&db, &voted, election_id, candidate_ids[0]).await;

        let response = client
            .delete(uri!(delete_voter(voted.id.as_str())))
            .dispatch()
            .await;
        assert_eq!(Status::UnprocessableEntity, response.status());

        let response = client
            .delete(uri!(delete_voter(fresh.id.as_str())))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        assert!(profiles
            .find_one(doc! { "_id": fresh.id.as_str() }, None)
            .await
            .unwrap()
            .is_none());
    }

    #[backend_test(admin)]
    async fn ballot_log_resolves_names(client: Client, db: Database, profiles: Coll<Profile>) {
        let voter = Profile::example();
        profiles.insert_one(&voter, None).await.unwrap();
        let (election_id, candidate_ids) = insert_election(&db).await;
        insert_vote(&db, &voter, election_id, candidate_ids[1]).await;

        let log: Listing<BallotLogEntry> = client
            .get(uri!(ballot_log(election_id)))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert_eq!(log.items.len(), 1);
        assert_eq!(log.items[0].voter_email, voter.email);
        assert_eq!(
            log.items[0].candidate_name,
            NewCandidate::example2(election_id).name
        );
    }

    #[backend_test(admin)]
    async fn registry_crud(client: Client, registry: Coll<RegistryEntry>) {
        let response = client
            .post(uri!(create_registry_entry))
            .header(ContentType::JSON)
            .body(json!(RegistrySpec::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Created, response.status());
        let created: RegistryDescription = response.into_json().await.unwrap();

        // University IDs are unique.
        let response = client
            .post(uri!(create_registry_entry))
            .header(ContentType::JSON)
            .body(json!(RegistrySpec::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::UnprocessableEntity, response.status());

        let mut spec = RegistrySpec::example();
        spec.full_name = "Amina H. Yusuf".to_string();
        let response = client
            .put(uri!(modify_registry_entry(created.id)))
            .header(ContentType::JSON)
            .body(json!(spec).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        let listing: Listing<RegistryDescription> = client
            .get(uri!(get_registry))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert_eq!(listing.items.len(), 1);
        assert_eq!(listing.items[0].full_name, "Amina H. Yusuf");

        let response = client
            .delete(uri!(delete_registry_entry(created.id)))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        assert_eq!(registry.count_documents(None, None).await.unwrap(), 0);
    }
}
