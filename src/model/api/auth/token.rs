use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use mongodb::{bson::doc, Database};
use rocket::{
    http::{Cookie, SameSite, Status},
    outcome::{try_outcome, IntoOutcome},
    request::{FromRequest, Outcome},
    time::Duration,
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;
use crate::model::{common::Role, db::profile::Profile, mongodb::Coll};

use super::user::User;

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// An authentication token representing a specific identity with a specific role.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthToken<U> {
    /// Identity provider ID, which is also the profile ID.
    pub id: String,
    pub email: String,
    #[serde(rename = "rol")]
    pub role: Role,
    #[serde(skip)]
    phantom: PhantomData<U>,
}

impl<U> AuthToken<U> {
    /// Create a token for the given profile, carrying that profile's role.
    pub fn new(profile: &Profile) -> Self {
        Self {
            id: profile.id.clone(),
            email: profile.email.clone(),
            role: profile.role,
            phantom: PhantomData,
        }
    }

    /// Does this token permit the given role?
    pub fn permits(&self, target: Role) -> bool {
        self.role == target
    }

    #[allow(clippy::missing_panics_doc)]
    /// Serialize this token into a cookie.
    pub fn into_cookie(self, config: &Config) -> Cookie<'static> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };

        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )
        .expect("JWT encoding is infallible with default settings");

        Cookie::build(AUTH_TOKEN_COOKIE, token)
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .finish()
    }

    /// Deserialize a token from a cookie.
    pub fn from_cookie(cookie: &Cookie<'_>, config: &Config) -> Result<Self, Error> {
        let token = jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims<U>>| claims.claims.token)?;
        Ok(token)
    }
}

/// Cookie claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<U> {
    #[serde(flatten, bound = "")]
    token: AuthToken<U>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r, U> FromRequest<'r> for AuthToken<U>
where
    U: User + Send,
{
    type Error = Error;

    /// Get an [`AuthToken`] from the cookie and verify that it has the correct role for this user
    /// type.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwrap is safe as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        // Forward to any routes that do not require an authentication token.
        let cookie = try_outcome!(req.cookies().get(AUTH_TOKEN_COOKIE).or_forward(()));

        // Decode the token.
        let token: Self = try_outcome!(Self::from_cookie(cookie, config).or_forward(()));

        // Check it represents the correct role.
        if !token.permits(U::ROLE) {
            return Outcome::Forward(());
        }

        // There is exactly one administrator identity.
        if token.role == Role::Administrator && !config.is_admin_email(&token.email) {
            return Outcome::Forward(());
        }

        // Check the profile still exists with the same role.
        let db = req.guard::<&State<Database>>().await.unwrap();
        let filter = doc! {
            "_id": token.id.as_str(),
            "role": token.role,
        };
        match Coll::<Profile>::from_db(db).find_one(filter, None).await {
            Ok(Some(_)) => Outcome::Success(token),
            Ok(None) => Outcome::Forward(()),
            Err(e) => Outcome::Failure((Status::InternalServerError, e.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::user::{Admin, Voter};
    use super::*;

    #[test]
    fn token_survives_cookie_round_trip() {
        let config = Config::example();
        let profile = Profile::example();
        let cookie = AuthToken::<Voter>::new(&profile).into_cookie(&config);

        let token = AuthToken::<Voter>::from_cookie(&cookie, &config).unwrap();
        assert_eq!(token.id, profile.id);
        assert_eq!(token.email, profile.email);
        assert!(token.permits(Role::Voter));
        assert!(!token.permits(Role::Administrator));
    }

    #[test]
    fn admin_token_carries_admin_role() {
        let config = Config::example();
        let cookie = AuthToken::<Admin>::new(&Profile::admin_example()).into_cookie(&config);
        let token = AuthToken::<Admin>::from_cookie(&cookie, &config).unwrap();
        assert!(token.permits(Role::Administrator));
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let config = Config::example();
        let cookie = AuthToken::<Voter>::new(&Profile::example()).into_cookie(&config);

        let mut other = Config::example();
        other.set_jwt_secret("a different secret");
        assert!(AuthToken::<Voter>::from_cookie(&cookie, &other).is_err());
    }
}
