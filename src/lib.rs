#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod logging;
pub mod mixnet;
pub mod model;
pub mod store;

use config::{Config, ConfigFairing, EngineFairing, StoreFairing};
use logging::LoggerFairing;
use store::Stores;

/// Build the server from `Rocket.toml` and the environment.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(ConfigFairing)
        .attach(StoreFairing)
        .attach(EngineFairing)
        .attach(LoggerFairing)
        .mount("/", api::routes())
}

/// Build the server around an explicit config and stores.
pub fn rocket_with(config: Config, stores: Stores) -> Result<Rocket<Build>, reqwest::Error> {
    let engine = config::build_engine(&config, stores.clone())?;
    Ok(rocket::build()
        .manage(config)
        .manage(stores)
        .manage(engine)
        .attach(LoggerFairing)
        .mount("/", api::routes()))
}

/// Connect to a freshly named test database on the server given by `db_uri`.
#[cfg(test)]
pub(crate) async fn test_db() -> mongodb::Database {
    let db_uri = rocket::Config::figment()
        .extract_inner::<String>("db_uri")
        .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
    let client = mongodb::Client::with_uri_str(&db_uri).await.unwrap();
    client.database(&config::get_database_name())
}
