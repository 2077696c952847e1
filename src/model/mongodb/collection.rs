use std::ops::Deref;

use log::debug;
use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::model::db::{
    candidate::{Candidate, NewCandidate},
    election::{Election, NewElection},
    profile::Profile,
    registry::{NewRegistryEntry, RegistryEntry},
    vote::{NewVote, Vote},
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: MongoCollection,
{
    type Error = ();

    /// Get the database connection from the managed state and wrap it in a collection.
    ///
    /// Panics iff the [`Database`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let db = req.guard::<&State<Database>>().await.unwrap();
        request::Outcome::Success(Coll::from_db(db))
    }
}

// Profile collection
const PROFILES: &str = "profiles";
impl MongoCollection for Profile {
    const NAME: &'static str = PROFILES;
}

// Election collections
const ELECTIONS: &str = "elections";
impl MongoCollection for Election {
    const NAME: &'static str = ELECTIONS;
}
impl MongoCollection for NewElection {
    const NAME: &'static str = ELECTIONS;
}

// Candidate collections
const CANDIDATES: &str = "candidates";
impl MongoCollection for Candidate {
    const NAME: &'static str = CANDIDATES;
}
impl MongoCollection for NewCandidate {
    const NAME: &'static str = CANDIDATES;
}

// Vote collections
const VOTES: &str = "votes";
impl MongoCollection for Vote {
    const NAME: &'static str = VOTES;
}
impl MongoCollection for NewVote {
    const NAME: &'static str = VOTES;
}

// Student registry collections
const STUDENT_REGISTRY: &str = "student_registry";
impl MongoCollection for RegistryEntry {
    const NAME: &'static str = STUDENT_REGISTRY;
}
impl MongoCollection for NewRegistryEntry {
    const NAME: &'static str = STUDENT_REGISTRY;
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();
    // The administrator's profile has no university ID.
    let unique_sparse = IndexOptions::builder().unique(true).sparse(true).build();

    // Profile collection.
    let profiles = Coll::<Profile>::from_db(db);
    let university_id_index = IndexModel::builder()
        .keys(doc! {"university_id": 1})
        .options(unique_sparse)
        .build();
    profiles.create_index(university_id_index, None).await?;
    let email_index = IndexModel::builder()
        .keys(doc! {"email": 1})
        .options(unique.clone())
        .build();
    profiles.create_index(email_index, None).await?;

    // Candidate collection.
    let candidate_index = IndexModel::builder()
        .keys(doc! {"election_id": 1})
        .build();
    Coll::<Candidate>::from_db(db)
        .create_index(candidate_index, None)
        .await?;

    // Vote collection. The unique index is the authoritative one-vote-per-election guard.
    let votes = Coll::<Vote>::from_db(db);
    let ballot_index = IndexModel::builder()
        .keys(doc! {"voter_id": 1, "election_id": 1})
        .options(unique.clone())
        .build();
    votes.create_index(ballot_index, None).await?;
    let tally_index = IndexModel::builder()
        .keys(doc! {"candidate_id": 1})
        .build();
    votes.create_index(tally_index, None).await?;

    // Student registry collection.
    let registry_index = IndexModel::builder()
        .keys(doc! {"university_id": 1})
        .options(unique)
        .build();
    Coll::<RegistryEntry>::from_db(db)
        .create_index(registry_index, None)
        .await?;

    Ok(())
}
