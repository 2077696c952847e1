use rocket::{
    http::{ContentType, Status},
    response::status::Custom,
    serde::json::Json,
    Catcher, Request, Route,
};

use crate::{error::Error, model::api::notice::Notice};

pub mod admin;
pub mod auth;
pub mod public;
pub mod voter;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(public::routes());
    routes.extend(auth::routes());
    routes.extend(voter::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![default_catcher]
}

/// Errors Rocket raises itself (unknown routes, malformed bodies) get the same JSON shape as ours.
#[catch(default)]
fn default_catcher(status: Status, _req: &Request) -> Custom<Json<Notice>> {
    let message = status.reason().unwrap_or("Something went wrong.");
    Custom(status, Json(Notice::error(message)))
}

/// The caller has no session at all.
fn login_required() -> Error {
    Error::Status(Status::Unauthorized, "Please log in first.".to_string())
}

/// A correctly authenticated request that matched no route: either a body
/// that is not JSON where JSON is expected, or a malformed or unknown path.
fn unmatched(content_type: Option<&ContentType>, expects_json: bool) -> Error {
    if expects_json && !content_type.map_or(false, |c| c.is_json()) {
        Error::Status(
            Status::UnsupportedMediaType,
            "Request body must be JSON.".to_string(),
        )
    } else {
        Error::not_found("No such resource")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_json_is_unsupported() {
        assert_eq!(unmatched(None, true).status(), Status::UnsupportedMediaType);
        assert_eq!(
            unmatched(Some(&ContentType::Plain), true).status(),
            Status::UnsupportedMediaType
        );
    }

    #[test]
    fn json_or_bodiless_miss_is_not_found() {
        assert_eq!(unmatched(Some(&ContentType::JSON), true).status(), Status::NotFound);
        assert_eq!(unmatched(None, false).status(), Status::NotFound);
    }
}
