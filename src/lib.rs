#[macro_use]
extern crate rocket;

#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::config::{ConfigFairing, DatabaseFairing};
use crate::logging::LoggerFairing;

pub mod api;
pub mod config;
pub mod error;
pub mod form;
pub mod logging;
pub mod model;

pub use crate::config::Config;

/// Name of the production database.
const DATABASE: &str = "dapa";

/// Build the server, connecting to the configured database on ignition.
pub fn build() -> Rocket<Build> {
    mount(rocket::build()).attach(DatabaseFairing::new(DATABASE))
}

/// Mount the routes and catchers and attach the fairings every server needs.
fn mount(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/api", api::routes())
        .register("/", api::catchers())
        .attach(ConfigFairing)
        .attach(LoggerFairing)
}

/// Build a server around an existing connection, preparing the named
/// database as ignition would.
#[cfg(test)]
pub(crate) async fn rocket_for_db(client: mongodb::Client, db_name: &str) -> Rocket<Build> {
    let db = client.database(db_name);
    let password = rocket::Config::figment()
        .extract_inner::<String>("default_admin_password")
        .unwrap();
    config::prepare_database(&db, &password).await.unwrap();
    mount(rocket::build()).manage(client).manage(db)
}

/// Connect to the configured database server.
#[cfg(test)]
pub(crate) async fn db_client() -> mongodb::Client {
    let db_uri = rocket::Config::figment()
        .extract_inner::<String>("db_uri")
        .unwrap();
    mongodb::Client::with_uri_str(db_uri).await.unwrap()
}

/// A fresh database name, so tests never see each other's data.
#[cfg(test)]
pub(crate) fn database() -> String {
    let random: u32 = rand::random();
    format!("test{random}")
}
