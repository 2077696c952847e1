use log::{info, warn};
use mongodb::bson::doc;
use rocket::{
    http::{Cookie, CookieJar, Status},
    response::status::Custom,
    serde::json::Json,
    Route, State,
};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::{
                Admin, AuthToken, Credentials, Landing, LoginOutcome, PasswordResetRequest,
                RegistrationRequest, Session, Voter, AUTH_TOKEN_COOKIE,
            },
            notice::Notice,
        },
        common::Role,
        db::profile::Profile,
        mongodb::{is_duplicate_key_error, Coll},
    },
    platform::Platform,
    Config,
};

/// Private cookie holding the identity provider's own session token.
pub const PROVIDER_SESSION_COOKIE: &str = "provider_session";

pub fn routes() -> Vec<Route> {
    routes![register, login, logout, password_reset, session]
}

#[post("/auth/register", data = "<request>", format = "json")]
pub async fn register(
    request: Json<RegistrationRequest>,
    profiles: Coll<Profile>,
    platform: &State<Platform>,
    config: &State<Config>,
) -> Result<Custom<Json<Notice>>> {
    let request = request.0.validate()?;
    if config.is_admin_email(&request.email) {
        return Err(Error::validation("This email address cannot register as a voter."));
    }

    // Reject a taken email or university ID before an account is created for it.
    // The provider may hide a taken email behind a placeholder account.
    let taken = doc! {
        "$or": [
            { "email": &request.email },
            { "university_id": &request.university_id },
        ],
    };
    if let Some(existing) = profiles.find_one(taken, None).await? {
        return Err(if existing.email == request.email {
            Error::validation("An account with this email already exists.")
        } else {
            Error::validation(format!(
                "University ID {} is already registered.",
                request.university_id
            ))
        });
    }

    let identity = platform
        .identity
        .sign_up(&request.email, &request.password, &request.display_name)
        .await?;
    let profile = Profile::new_voter(
        identity.id,
        request.email,
        request.display_name,
        request.university_id,
    );
    match profiles.insert_one(&profile, None).await {
        Ok(_) => {}
        Err(e) if is_duplicate_key_error(&e) => {
            return Err(Error::validation(
                "An account with this email or university ID already exists.",
            ))
        }
        Err(e) => return Err(e.into()),
    }
    info!("Registered voter {}", profile.id);

    Ok(Custom(
        Status::Created,
        Json(Notice::success(
            "Registration successful! Please check your email to verify your account.",
        )),
    ))
}

#[post("/auth/login", data = "<credentials>", format = "json")]
pub async fn login(
    cookies: &CookieJar<'_>,
    credentials: Json<Credentials>,
    profiles: Coll<Profile>,
    platform: &State<Platform>,
    config: &State<Config>,
) -> Result<Json<LoginOutcome>> {
    let credentials = credentials.0.normalized()?;
    let sign_in = platform
        .identity
        .sign_in(&credentials.email, &credentials.password)
        .await?;
    let identity = sign_in.identity;
    let is_admin = config.is_admin_email(&identity.email);

    let with_id = doc! {
        "_id": identity.id.as_str(),
    };
    let profile = match profiles.find_one(with_id.clone(), None).await? {
        Some(profile) if is_admin && profile.role != Role::Administrator => {
            // The administrator email always carries the administrator role.
            let promote = doc! { "$set": { "role": Role::Administrator } };
            profiles.update_one(with_id, promote, None).await?;
            Profile {
                role: Role::Administrator,
                ..profile
            }
        }
        Some(profile) if !is_admin && profile.role == Role::Administrator => {
            warn!("Profile {} has the administrator role but not the administrator email", profile.id);
            return Err(Error::Status(
                Status::Forbidden,
                "This account is not allowed to sign in.".to_string(),
            ));
        }
        Some(profile) => profile,
        None if is_admin => {
            let admin = Profile::new_administrator(identity.id, identity.email);
            profiles.insert_one(&admin, None).await?;
            info!("Created administrator profile {}", admin.id);
            admin
        }
        None => {
            return Err(Error::Status(
                Status::Forbidden,
                "No voter profile exists for this account. Please register first.".to_string(),
            ))
        }
    };

    let landing = match profile.role {
        Role::Administrator => {
            cookies.add(AuthToken::<Admin>::new(&profile).into_cookie(config));
            Landing::Admin
        }
        Role::Voter => {
            cookies.add(AuthToken::<Voter>::new(&profile).into_cookie(config));
            Landing::Ballot
        }
    };
    cookies.add_private(Cookie::new(PROVIDER_SESSION_COOKIE, sign_in.access_token));

    Ok(Json(LoginOutcome {
        landing,
        display_name: profile.display_name,
    }))
}

#[delete("/auth")]
pub async fn logout(cookies: &CookieJar<'_>, platform: &State<Platform>) -> Json<Notice> {
    if let Some(provider_session) = cookies.get_private(PROVIDER_SESSION_COOKIE) {
        // Best effort: the local session ends regardless.
        if let Err(e) = platform.identity.sign_out(provider_session.value()).await {
            warn!("Provider sign-out failed: {e}");
        }
    }
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    cookies.remove_private(Cookie::named(PROVIDER_SESSION_COOKIE));
    Json(Notice::info("You have been logged out."))
}

#[post("/auth/password-reset", data = "<request>", format = "json")]
pub async fn password_reset(
    request: Json<PasswordResetRequest>,
    platform: &State<Platform>,
    config: &State<Config>,
) -> Json<Notice> {
    let email = request.email.trim().to_lowercase();
    if !email.is_empty() {
        // Same answer either way, so the response reveals nothing about accounts.
        if let Err(e) = platform
            .identity
            .send_password_reset(&email, config.password_reset_url())
            .await
        {
            warn!("Password reset request failed: {e}");
        }
    }
    Json(Notice::info(
        "If an account exists for that email, a password reset link has been sent.",
    ))
}

#[get("/auth/session")]
pub fn session(session: Session) -> Json<Session> {
    Json(session)
}
