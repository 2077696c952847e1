mod request;
mod session;
mod token;
mod user;

pub use request::{
    Credentials, Landing, LoginOutcome, PasswordResetRequest, RegistrationRequest,
    MIN_PASSWORD_LENGTH,
};
pub use session::Session;
pub use token::{AuthToken, AUTH_TOKEN_COOKIE};
pub use user::{Admin, User, Voter};
