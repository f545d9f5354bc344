use chrono::Duration;
use mongodb::{bson::doc, error::Error as DbError, Client as MongoClient, Database};
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{
    db::{question_type::ensure_question_types_exist, user::ensure_admin_exists},
    mongodb::{ensure_indexes_exist, ensure_position_counter_exists, Coll},
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    auth_ttl: u32,
    // secrets
    jwt_secret: String,
}

impl Config {
    /// Valid lifetime of auth tokens in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Secret key used to sign JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Reject settings the server cannot run safely with.
    fn check(&self) -> Result<(), String> {
        if self.auth_ttl == 0 {
            return Err("auth_ttl must be at least one second".to_string());
        }
        if self.jwt_secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(format!(
                "jwt_secret must be at least {MIN_JWT_SECRET_LENGTH} bytes"
            ));
        }
        Ok(())
    }
}

const MIN_JWT_SECRET_LENGTH: usize = 16;

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
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        if let Err(problem) = config.check() {
            error!("Invalid application config: {problem}");
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
    db_uri: String,
    default_admin_password: String,
}

/// Whether the deployment behind `db` can run multi-document transactions,
/// i.e. is a replica set or a sharded cluster.
pub async fn supports_transactions(db: &Database) -> Result<bool, DbError> {
    let hello = db.run_command(doc! { "hello": 1 }, None).await?;
    Ok(hello.contains_key("setName") || matches!(hello.get_str("msg"), Ok("isdbgrid")))
}

/// Prepare a freshly connected database: indexes, the default admin, the
/// default question types and the position counter.
///
/// This operation is idempotent.
pub async fn prepare_database(db: &Database, admin_password: &str) -> Result<(), DbError> {
    ensure_indexes_exist(db).await?;
    ensure_admin_exists(&Coll::from_db(db), admin_password).await?;
    ensure_question_types_exist(&Coll::from_db(db)).await?;
    ensure_position_counter_exists(&Coll::from_db(db)).await?;
    Ok(())
}

/// A fairing that loads the MongoDB config, connects to the database,
/// performs any setup necessary, and places both a `Client` and a `Database`
/// into managed state.
///
/// The database must be a replica set, since schema changes run in transactions.
pub struct DatabaseFairing {
    db_name: String,
}

impl DatabaseFairing {
    pub fn new(db_name: impl Into<String>) -> Self {
        Self {
            db_name: db_name.into(),
        }
    }
}

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
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
        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&self.db_name);

        match supports_transactions(&db).await {
            Ok(true) => {}
            Ok(false) => {
                error!("Database deployment is standalone, it must be a replica set");
                return Err(rocket);
            }
            Err(e) => {
                error!("Failed to query database deployment: {e}");
                return Err(rocket);
            }
        }
        if let Err(e) = prepare_database(&db, &config.default_admin_password).await {
            error!("Failed to prepare database {}: {e}", self.db_name);
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        rocket = rocket.manage(client).manage(db);
        Ok(rocket)
    }
}
