use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use log::{error, warn};
use mongodb::error::Error as DbError;
use reqwest::Error as PlatformError;
use rocket::{
    http::{Status, StatusClass},
    response::{self, status::Custom, Responder},
    serde::json::Json,
    Request,
};
use thiserror::Error;

use crate::model::{
    api::notice::Notice, common::ElectionStatus, mongodb::is_unavailable_error,
};

pub type Result<T> = std::result::Result<T, Error>;

/// Failures signing in or registering with the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Incorrect email or password.")]
    InvalidCredentials,
    #[error("Please verify your email before logging in.")]
    EmailUnconfirmed,
    #[error("Authentication failed: {0}")]
    Unknown(String),
}

/// Reasons a vote was not recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VoteError {
    #[error("You have already voted in this election.")]
    AlreadyVoted,
    #[error("{}", not_active_message(.0))]
    ElectionNotActive(ElectionStatus),
    #[error("You are not eligible to vote.")]
    NotEligible,
    #[error("That candidate is not standing in this election.")]
    CandidateNotFound,
    #[error("Your vote was not recorded. Please try again.")]
    StorageUnavailable,
}

fn not_active_message(status: &ElectionStatus) -> &'static str {
    match status {
        ElectionStatus::Upcoming => "This election has not started yet.",
        ElectionStatus::Closed => "This election has already ended.",
        ElectionStatus::Active => "This election is not open for voting.",
    }
}

/// Failures of administrator operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdminError {
    #[error("Administrator access only.")]
    NotAuthorized,
    #[error("{0}")]
    ValidationFailed(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Vote(#[from] VoteError),
    #[error(transparent)]
    Admin(#[from] AdminError),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    pub fn not_found(what: impl AsRef<str>) -> Self {
        Self::Status(Status::NotFound, format!("Not found: {}", what.as_ref()))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Admin(AdminError::ValidationFailed(msg.into()))
    }

    /// The HTTP status this error should be reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::Db(e) if is_unavailable_error(e) => Status::ServiceUnavailable,
            Self::Db(_) => Status::InternalServerError,
            Self::Jwt(e) => match e.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
            Self::Platform(e) if e.is_timeout() || e.is_connect() => Status::ServiceUnavailable,
            Self::Platform(_) => Status::BadGateway,
            Self::Auth(AuthError::InvalidCredentials) => Status::Unauthorized,
            Self::Auth(AuthError::EmailUnconfirmed) => Status::Forbidden,
            Self::Auth(AuthError::Unknown(_)) => Status::BadGateway,
            Self::Vote(VoteError::AlreadyVoted) => Status::Conflict,
            Self::Vote(VoteError::ElectionNotActive(_)) => Status::Conflict,
            Self::Vote(VoteError::NotEligible) => Status::Forbidden,
            Self::Vote(VoteError::CandidateNotFound) => Status::NotFound,
            Self::Vote(VoteError::StorageUnavailable) => Status::ServiceUnavailable,
            Self::Admin(AdminError::NotAuthorized) => Status::Forbidden,
            Self::Admin(AdminError::ValidationFailed(_)) => Status::UnprocessableEntity,
            Self::Status(status, _) => *status,
        }
    }

    /// The message shown to the user. Raw store and platform errors stay in the log.
    pub fn user_message(&self) -> String {
        match self {
            Self::Db(e) if is_unavailable_error(e) => {
                "The election store is unavailable. Please try again shortly.".to_string()
            }
            Self::Db(_) => "Something went wrong reading or writing election data.".to_string(),
            Self::Jwt(_) => "Your session is invalid or has expired. Please log in again.".to_string(),
            Self::Platform(_) => {
                "Could not reach the authentication service. Please try again.".to_string()
            }
            Self::Auth(AuthError::Unknown(_)) => {
                "Login failed. Please check your connection and try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        match status.class() {
            StatusClass::ServerError => error!("{self}"),
            _ => warn!("{self}"),
        }
        Custom(status, Json(Notice::error(self.user_message()))).respond_to(req)
    }
}
