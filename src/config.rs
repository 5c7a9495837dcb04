use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::engine::Engine;
use crate::mixnet::{Coordinator, HttpDirectory, LocalAuthority};
use crate::store::Stores;

fn default_keybits() -> usize {
    256
}

fn default_authority_timeout() -> u64 {
    10
}

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // non-secrets
    base_url: String,
    #[serde(default = "default_keybits")]
    keybits: usize,
    #[serde(default = "default_authority_timeout")]
    authority_timeout: u64,
    // secrets
    jwt_secret: String,
}

impl Config {
    /// URL under which this node serves as an authority.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Bit length of the group modulus. Every authority of a deployment must
    /// agree on it.
    pub fn keybits(&self) -> usize {
        self.keybits
    }

    /// Upper bound on every call to an authority.
    pub fn authority_timeout(&self) -> Duration {
        Duration::from_secs(self.authority_timeout)
    }

    /// Secret key used to verify actor JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }
}

/// A fairing that loads the application config and puts it in managed state.
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
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        if config.keybits < crate::crypto::group::MIN_KEYBITS {
            error!("`keybits` must be at least {}", crate::crypto::group::MIN_KEYBITS);
            return Err(rocket);
        }

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // secrets
    db_uri: Option<String>,
}

/// A fairing that connects the vote stores. With a `db_uri` they live in
/// MongoDB, otherwise they are kept in memory.
pub struct StoreFairing;

#[rocket::async_trait]
impl Fairing for StoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Stores",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let stores = match config.db_uri {
            Some(db_uri) => {
                info!("Loaded database config, connecting...");
                let client = match MongoClient::with_uri_str(db_uri).await {
                    Ok(client) => client,
                    Err(e) => {
                        error!("Failed to connect to database: {e}");
                        return Err(rocket);
                    }
                };
                let db = client.database(&get_database_name());
                match Stores::mongodb(&db).await {
                    Ok(stores) => {
                        info!("...database connection online!");
                        stores
                    }
                    Err(e) => {
                        error!("Failed to set up database: {e}");
                        return Err(rocket);
                    }
                }
            }
            None => {
                warn!("No `db_uri` set, votings and ballots will only be kept in memory");
                Stores::memory()
            }
        };

        // Manage the state.
        rocket = rocket.manage(stores);
        Ok(rocket)
    }
}

/// A fairing that assembles the tally engine from the config and stores.
/// Must be attached after [`ConfigFairing`] and [`StoreFairing`].
pub struct EngineFairing;

#[rocket::async_trait]
impl Fairing for EngineFairing {
    fn info(&self) -> Info {
        Info {
            name: "Engine",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let (config, stores) = match (rocket.state::<Config>(), rocket.state::<Stores>()) {
            (Some(config), Some(stores)) => (config.clone(), stores.clone()),
            _ => {
                error!("Engine requires the config and stores to be loaded first");
                return Err(rocket);
            }
        };
        let engine = match build_engine(&config, stores) {
            Ok(engine) => engine,
            Err(e) => {
                error!("Failed to build the engine: {e}");
                return Err(rocket);
            }
        };
        info!(
            "Engine ready: local authority at {}, {}-bit groups",
            config.base_url(),
            config.keybits()
        );
        Ok(rocket.manage(engine))
    }
}

/// Wire the local authority, the remote transport and the stores together.
pub fn build_engine(config: &Config, stores: Stores) -> Result<Engine, reqwest::Error> {
    let local = Arc::new(LocalAuthority::new(
        config.base_url(),
        config.keybits(),
        stores.key_shares.clone(),
    ));
    let directory = HttpDirectory::new(local.clone(), config)?;
    let coordinator = Coordinator::new(Arc::new(directory), config.authority_timeout());
    Ok(Engine::new(config, stores, coordinator, local))
}

/// Get the name of the database to use (production version).
#[cfg(not(test))]
pub(crate) fn get_database_name() -> String {
    "mixvote".to_string()
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

/// Example data for tests.
#[cfg(test)]
pub(crate) mod examples {
    use super::*;
    use crate::crypto::group::examples::TEST_KEYBITS;
    use crate::model::voting::examples::LOCAL_URL;

    impl Config {
        pub fn example() -> Self {
            Self::example_with_secret("test jwt secret")
        }

        pub fn example_with_secret(secret: &str) -> Self {
            Self {
                base_url: LOCAL_URL.to_string(),
                keybits: TEST_KEYBITS,
                authority_timeout: 2,
                jwt_secret: secret.to_string(),
            }
        }
    }
}
