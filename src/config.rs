use std::time::Duration as StdDuration;

use chrono::Duration;
use log::{error, info};
use mongodb::{options::ClientOptions, Client as MongoClient};
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::mongodb::ensure_indexes_exist;
use crate::platform::Platform;

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Clone, Deserialize)]
pub struct Config {
    // non-secrets
    admin_email: String,
    auth_ttl: u32,
    password_reset_url: String,
    // secrets
    jwt_secret: String,
}

impl Config {
    /// The one identity allowed to administer elections.
    pub fn admin_email(&self) -> &str {
        &self.admin_email
    }

    /// Whether `email` is the administrator's. Case and surrounding space are ignored.
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_email.trim().eq_ignore_ascii_case(email.trim())
    }

    /// Valid lifetime of auth token cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Where password reset emails send the user back to.
    pub fn password_reset_url(&self) -> &str {
        &self.password_reset_url
    }

    /// Secret key used to sign JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // non-secrets
    #[serde(default = "default_timeout")]
    db_timeout: u64,
    // secrets
    db_uri: String,
}

fn default_timeout() -> u64 {
    10
}

/// A fairing that loads the MongoDB config, connects to the database,
/// ensures the indexes exist, and places both a `Client` and a `Database`
/// into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");

        let mut options = match ClientOptions::parse(&config.db_uri).await {
            Ok(options) => options,
            Err(e) => {
                error!("Invalid database URI: {e}");
                return Err(rocket);
            }
        };
        let timeout = StdDuration::from_secs(config.db_timeout);
        options.server_selection_timeout = Some(timeout);
        options.connect_timeout = Some(timeout);
        let client = match MongoClient::with_options(options) {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&get_database_name());

        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to prepare database: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        rocket = rocket.manage(client).manage(db);
        Ok(rocket)
    }
}

/// Get the name of the database to use (production version).
#[cfg(not(test))]
pub(crate) fn get_database_name() -> String {
    "campus_vote".to_string()
}

/// Get the name of the database to use (test version).
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
pub(crate) fn get_database_name() -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}

/// Configuration for the hosted auth and storage platform.
#[derive(Deserialize)]
pub struct PlatformConfig {
    // non-secrets
    pub platform_url: String,
    pub photo_bucket: String,
    #[serde(default = "default_timeout")]
    pub platform_timeout: u64,
    // secrets
    pub platform_key: String,
}

impl PlatformConfig {
    pub fn timeout(&self) -> StdDuration {
        StdDuration::from_secs(self.platform_timeout)
    }
}

/// A fairing that loads the platform config and places the identity provider
/// and object storage clients into managed state.
pub struct PlatformFairing;

#[rocket::async_trait]
impl Fairing for PlatformFairing {
    fn info(&self) -> Info {
        Info {
            name: "Auth & storage platform",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<PlatformConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load platform config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        let platform = match Platform::hosted(&config) {
            Ok(platform) => platform,
            Err(e) => {
                error!("Failed to build platform client: {e}");
                return Err(rocket);
            }
        };
        info!("Loaded platform config for {}", config.platform_url);

        rocket = rocket.manage(platform);
        Ok(rocket)
    }
}
