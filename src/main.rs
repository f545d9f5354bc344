use log::{error, info, LevelFilter};
use rocket::Error as RocketError;
use thiserror::Error;

/// Errors that stop the server from starting or keep it from running.
#[derive(Debug, Error)]
enum Error {
    #[error("Server failed: {0}")]
    Rocket(#[from] RocketError),
}

async fn run() -> Result<(), Error> {
    info!(
        "Starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
    // Ignition connects to and prepares the database.
    let rocket = dapa_backend::build().ignite().await?;
    info!("Database ready, question types seeded");
    // Rocket's own logging is only useful up to ignition; our fairing takes over.
    log4rs_dynamic_filters::DynamicLevelFilter::set("rocket", LevelFilter::Off);
    let _ = rocket.launch().await?;
    Ok(())
}

#[rocket::main]
async fn main() {
    log4rs::init_file("log4rs.yaml", log4rs_dynamic_filters::default_deserializers())
        .expect("Failed to initialise logging from log4rs.yaml");

    if let Err(err) = run().await {
        error!("{err}");
        error!("Shutting down");
        std::process::exit(1)
    }
}
