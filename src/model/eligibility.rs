//! Who may cast votes.
//!
//! Eligibility is separate from authentication: a signed-in voter may only vote
//! once the administrator has verified their profile.

use mongodb::error::Error as DbError;

use crate::config::Config;
use crate::model::{common::Role, db::profile::Profile, mongodb::Coll};

/// Decide eligibility from an identity's email and its profile, if it has one.
///
/// The administrator is excluded before the verified flag is even looked at.
pub fn decide(email: &str, profile: Option<&Profile>, config: &Config) -> bool {
    if config.is_admin_email(email) {
        return false;
    }
    match profile {
        Some(profile) if profile.role == Role::Administrator => false,
        Some(profile) => profile.verified,
        None => false,
    }
}

/// Look up an identity's profile and decide whether it may vote.
pub async fn is_eligible_voter(
    profiles: &Coll<Profile>,
    id: &str,
    email: &str,
    config: &Config,
) -> Result<bool, DbError> {
    if config.is_admin_email(email) {
        return Ok(false);
    }
    let filter = mongodb::bson::doc! { "_id": id };
    let profile = profiles.find_one(filter, None).await?;
    Ok(decide(email, profile.as_ref(), config))
}
