//! Accounts and passwords live with a hosted identity provider; this module
//! only speaks its HTTP API.

use log::{debug, warn};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::{de::IgnoredAny, Deserialize, Serialize};

use crate::error::{AuthError, Error};

/// An account as known to the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
}

/// A successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignIn {
    pub identity: Identity,
    /// The provider's own session token, needed to sign out again.
    pub access_token: String,
}

#[rocket::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an account. The provider may require the email to be confirmed
    /// before the account can sign in.
    async fn sign_up(&self, email: &str, password: &str, display_name: &str)
        -> Result<Identity, Error>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<SignIn, Error>;

    async fn sign_out(&self, access_token: &str) -> Result<(), Error>;

    /// Ask the provider to email a reset link that returns to `redirect_to`.
    async fn send_password_reset(&self, email: &str, redirect_to: &str) -> Result<(), Error>;
}

/// Error bodies vary between endpoints; any of these fields may carry the message.
#[derive(Debug, Default, Deserialize)]
struct ProviderError {
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

impl ProviderError {
    fn text(self) -> String {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
            .unwrap_or_default()
    }
}

/// Turn a provider error message into something safe to show.
pub fn classify(message: &str) -> Error {
    let lower = message.to_lowercase();
    if lower.contains("invalid login credentials") {
        AuthError::InvalidCredentials.into()
    } else if lower.contains("email not confirmed") {
        AuthError::EmailUnconfirmed.into()
    } else if lower.contains("already registered") {
        Error::validation("An account with this email already exists.")
    } else if lower.contains("password should be") {
        Error::validation(message)
    } else {
        AuthError::Unknown(message.to_string()).into()
    }
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct SignUpBody<'a> {
    email: &'a str,
    password: &'a str,
    data: SignUpData<'a>,
}

#[derive(Serialize)]
struct SignUpData<'a> {
    display_name: &'a str,
}

#[derive(Serialize)]
struct RecoverBody<'a> {
    email: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    user: Identity,
}

/// Sign-up answers with a session when confirmation is off, or the bare user when it is on.
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session { user: SignedUpUser },
    User(SignedUpUser),
}

#[derive(Deserialize)]
struct SignedUpUser {
    id: String,
    email: String,
    /// Empty for the placeholder user returned when the email is already taken.
    #[serde(default)]
    identities: Option<Vec<IgnoredAny>>,
}

impl SignUpResponse {
    /// The new account, unless the provider answered with a placeholder for
    /// an existing one.
    fn into_identity(self) -> Result<Identity, Error> {
        let (Self::Session { user } | Self::User(user)) = self;
        if user.identities.map_or(false, |identities| identities.is_empty()) {
            debug!("Identity provider returned a placeholder user for an existing email");
            return Err(classify("User already registered"));
        }
        Ok(Identity {
            id: user.id,
            email: user.email,
        })
    }
}

/// The hosted platform's auth API.
pub struct HostedIdentity {
    client: Client,
    base: Url,
    key: String,
}

impl HostedIdentity {
    pub fn new(client: Client, base: Url, key: String) -> Self {
        Self { client, base, key }
    }

    fn post(&self, path: &str) -> Result<RequestBuilder, Error> {
        let url = self
            .base
            .join(path)
            .map_err(|e| AuthError::Unknown(format!("bad auth URL {path}: {e}")))?;
        Ok(self
            .client
            .post(url)
            .header("apikey", &self.key)
            .bearer_auth(&self.key))
    }

    /// Pass successes through; classify failures by their message.
    async fn check(response: Response) -> Result<Response, Error> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body: ProviderError = response.json().await.unwrap_or_default();
        let text = body.text();
        debug!("Identity provider answered {status}: {text}");
        Err(classify(&text))
    }
}

#[rocket::async_trait]
impl IdentityProvider for HostedIdentity {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Identity, Error> {
        let body = SignUpBody {
            email,
            password,
            data: SignUpData { display_name },
        };
        let response = self.post("auth/v1/signup")?.json(&body).send().await?;
        let signed_up: SignUpResponse = Self::check(response).await?.json().await?;
        signed_up.into_identity()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SignIn, Error> {
        let response = self
            .post("auth/v1/token?grant_type=password")?
            .json(&PasswordGrant { email, password })
            .send()
            .await?;
        let token: TokenResponse = Self::check(response).await?.json().await?;
        Ok(SignIn {
            identity: token.user,
            access_token: token.access_token,
        })
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), Error> {
        let response = self
            .post("auth/v1/logout")?
            .bearer_auth(access_token)
            .send()
            .await?;
        if let Err(e) = Self::check(response).await {
            warn!("Provider sign-out failed: {e}");
        }
        Ok(())
    }

    async fn send_password_reset(&self, email: &str, redirect_to: &str) -> Result<(), Error> {
        let response = self
            .post("auth/v1/recover")?
            .query(&[("redirect_to", redirect_to)])
            .json(&RecoverBody { email })
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
pub mod memory {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    struct Account {
        identity: Identity,
        password: String,
        confirmed: bool,
    }

    /// An identity provider that keeps accounts in memory.
    #[derive(Default)]
    pub struct InMemoryIdentity {
        pub(super) accounts: Mutex<HashMap<String, Account>>,
        pub(super) resets: Mutex<Vec<(String, String)>>,
        /// New accounts must be confirmed before they can sign in.
        pub require_confirmation: bool,
    }

    impl InMemoryIdentity {
        /// Add a confirmed account directly.
        pub fn with_account(self, id: &str, email: &str, password: &str) -> Self {
            self.accounts.lock().unwrap().insert(
                email.to_lowercase(),
                Account {
                    identity: Identity {
                        id: id.to_string(),
                        email: email.to_lowercase(),
                    },
                    password: password.to_string(),
                    confirmed: true,
                },
            );
            self
        }

        pub fn confirm(&self, email: &str) {
            if let Some(account) = self.accounts.lock().unwrap().get_mut(email) {
                account.confirmed = true;
            }
        }

        /// Every `(email, redirect_to)` a reset was requested for.
        pub fn resets(&self) -> Vec<(String, String)> {
            self.resets.lock().unwrap().clone()
        }
    }

    #[rocket::async_trait]
    impl IdentityProvider for InMemoryIdentity {
        async fn sign_up(
            &self,
            email: &str,
            password: &str,
            _display_name: &str,
        ) -> Result<Identity, Error> {
            let mut accounts = self.accounts.lock().unwrap();
            if accounts.contains_key(email) {
                return Err(classify("User already registered"));
            }
            let identity = Identity {
                id: format!("{:032x}", rand::random::<u128>()),
                email: email.to_string(),
            };
            accounts.insert(
                email.to_string(),
                Account {
                    identity: identity.clone(),
                    password: password.to_string(),
                    confirmed: !self.require_confirmation,
                },
            );
            Ok(identity)
        }

        async fn sign_in(&self, email: &str, password: &str) -> Result<SignIn, Error> {
            let accounts = self.accounts.lock().unwrap();
            match accounts.get(email) {
                Some(account) if account.password == password && account.confirmed => Ok(SignIn {
                    identity: account.identity.clone(),
                    access_token: format!("token-{}", account.identity.id),
                }),
                Some(account) if account.password == password => {
                    Err(classify("Email not confirmed"))
                }
                _ => Err(classify("Invalid login credentials")),
            }
        }

        async fn sign_out(&self, _access_token: &str) -> Result<(), Error> {
            Ok(())
        }

        async fn send_password_reset(&self, email: &str, redirect_to: &str) -> Result<(), Error> {
            self.resets
                .lock()
                .unwrap()
                .push((email.to_string(), redirect_to.to_string()));
            Ok(())
        }
    }
}
