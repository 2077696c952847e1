use serde::{Deserialize, Serialize};

use crate::error::{AdminError, AuthError};

/// Minimum password length accepted by the identity provider.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Email and password, as typed by the user. Never stored.
#[derive(Clone, Deserialize, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    /// Trim the email; an empty field can never sign in.
    pub fn normalized(self) -> Result<Self, AuthError> {
        let email = self.email.trim().to_lowercase();
        if email.is_empty() || self.password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(Self {
            email,
            password: self.password,
        })
    }
}

/// A new voter's registration form.
#[derive(Clone, Deserialize, Serialize)]
pub struct RegistrationRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub university_id: String,
}

impl RegistrationRequest {
    /// Check every required field is present, returning the trimmed request.
    pub fn validate(self) -> Result<Self, AdminError> {
        let email = self.email.trim().to_lowercase();
        let display_name = self.display_name.trim().to_string();
        let university_id = self.university_id.trim().to_uppercase();

        if email.is_empty() || display_name.is_empty() || university_id.is_empty() {
            return Err(AdminError::ValidationFailed(
                "Email, name and university ID are all required.".to_string(),
            ));
        }
        if !email.contains('@') {
            return Err(AdminError::ValidationFailed(format!(
                "'{email}' is not an email address."
            )));
        }
        if self.password.len() < MIN_PASSWORD_LENGTH {
            return Err(AdminError::ValidationFailed(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters."
            )));
        }

        Ok(Self {
            email,
            password: self.password,
            display_name,
            university_id,
        })
    }
}

/// Request for a password reset email.
#[derive(Clone, Deserialize, Serialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

/// Where the client should go after signing in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Landing {
    Admin,
    Ballot,
}

/// Result of a successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginOutcome {
    pub landing: Landing,
    pub display_name: String,
}
