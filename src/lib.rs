#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod platform;

pub use config::Config;

use config::{ConfigFairing, DatabaseFairing, PlatformFairing};
use logging::LoggerFairing;

/// Build the server. Each fairing loads its own slice of the configuration
/// and fails ignition if it cannot.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(PlatformFairing)
}

/// Connect to the test database server named by `ROCKET_DB_URI`.
#[cfg(test)]
pub(crate) async fn db_client() -> mongodb::Client {
    let uri = std::env::var("ROCKET_DB_URI").unwrap();
    mongodb::Client::with_uri_str(uri).await.unwrap()
}

/// A fresh database name for one test.
#[cfg(test)]
pub(crate) fn database() -> String {
    config::get_database_name()
}

/// A server using the given database and platform, with the example config.
#[cfg(test)]
pub(crate) async fn rocket_for_db_and_platform(
    client: mongodb::Client,
    db_name: &str,
    platform: platform::Platform,
) -> Rocket<Build> {
    let db = client.database(db_name);
    model::mongodb::ensure_indexes_exist(&db).await.unwrap();
    rocket::build()
        .mount("/", api::routes())
        .register("/", api::catchers())
        .manage(Config::example())
        .manage(client)
        .manage(db)
        .manage(platform)
}
