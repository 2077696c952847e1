use rocket::request::{FromRequest, Outcome, Request};
use serde::{Deserialize, Serialize};

use crate::error::Error;

use super::{
    token::AuthToken,
    user::{Admin, Voter},
};

/// Who is making a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Session {
    Anonymous,
    Voter { id: String, email: String },
    Administrator { id: String, email: String },
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Session {
    type Error = Error;

    /// Classify the caller. Never forwards: a missing or invalid token is anonymous.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match req.guard::<AuthToken<Admin>>().await {
            Outcome::Success(token) => {
                return Outcome::Success(Self::Administrator {
                    id: token.id,
                    email: token.email,
                })
            }
            Outcome::Failure(failure) => return Outcome::Failure(failure),
            Outcome::Forward(()) => {}
        }
        match req.guard::<AuthToken<Voter>>().await {
            Outcome::Success(token) => Outcome::Success(Self::Voter {
                id: token.id,
                email: token.email,
            }),
            Outcome::Failure(failure) => Outcome::Failure(failure),
            Outcome::Forward(()) => Outcome::Success(Self::Anonymous),
        }
    }
}
