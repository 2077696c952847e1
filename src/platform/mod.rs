//! Clients for the hosted platform that owns accounts and candidate photos.

use reqwest::{Client, Url};

use crate::config::PlatformConfig;

pub mod identity;
pub mod storage;

pub use identity::{Identity, IdentityProvider, SignIn};
pub use storage::ObjectStorage;

use identity::HostedIdentity;
use storage::HostedStorage;

/// The identity provider and object storage, as managed state.
pub struct Platform {
    pub identity: Box<dyn IdentityProvider>,
    pub storage: Box<dyn ObjectStorage>,
}

#[derive(Debug, thiserror::Error)]
pub enum PlatformSetupError {
    #[error("Invalid platform URL {0}")]
    Url(String),
    #[error(transparent)]
    Client(#[from] reqwest::Error),
}

impl Platform {
    pub fn new(
        identity: impl IdentityProvider + 'static,
        storage: impl ObjectStorage + 'static,
    ) -> Self {
        Self {
            identity: Box::new(identity),
            storage: Box::new(storage),
        }
    }

    /// Clients for the hosted platform, sharing one connection pool.
    pub fn hosted(config: &PlatformConfig) -> Result<Self, PlatformSetupError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        let mut base = config.platform_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base =
            Url::parse(&base).map_err(|e| PlatformSetupError::Url(format!("{base}: {e}")))?;
        Ok(Self::new(
            HostedIdentity::new(client.clone(), base.clone(), config.platform_key.clone()),
            HostedStorage::new(
                client,
                base,
                config.platform_key.clone(),
                config.photo_bucket.clone(),
            ),
        ))
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;
    use crate::model::{api::auth::Credentials, db::profile::Profile};

    impl Platform {
        /// In-memory platform with accounts for the example voter and administrator.
        pub fn example() -> Self {
            let voter = Profile::example();
            let voter_login = Credentials::example();
            let admin = Profile::admin_example();
            let admin_login = Credentials::admin_example();
            let identity = identity::memory::InMemoryIdentity::default()
                .with_account(&voter.id, &voter_login.email, &voter_login.password)
                .with_account(&admin.id, &admin_login.email, &admin_login.password);
            Self::new(identity, storage::memory::InMemoryStorage::default())
        }
    }
}
