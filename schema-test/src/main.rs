//! Round-trip schema test driver.
//!
//! Runs the migration round-trip test against a local PostgreSQL instance.
//! The instance's port must be named by the `SCHEMA_TEST_POSTGRES_PORT`
//! environment variable, the database must be empty, and `pg_dump` must be
//! on `PATH`.

use std::process::ExitCode;

use pgmigrate::{schema_test, PostgresConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod migrations;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let port = match std::env::var("SCHEMA_TEST_POSTGRES_PORT") {
        Ok(value) => match value.parse::<u16>() {
            Ok(port) => port,
            Err(_) => {
                error!("SCHEMA_TEST_POSTGRES_PORT is not a valid port: {value:?}");
                return ExitCode::FAILURE;
            }
        },
        Err(_) => {
            error!("SCHEMA_TEST_POSTGRES_PORT env variable must be set");
            return ExitCode::FAILURE;
        }
    };

    let config = PostgresConfig {
        host: "localhost".to_string(),
        port,
        database: "postgres".to_string(),
        user: "postgres".to_string(),
        password: "postgres".to_string(),
    };

    if let Err(err) = schema_test(&config, migrations::all_migrations()) {
        error!("schema test failed: {err}");
        return ExitCode::FAILURE;
    }

    info!("schema test succeeded");
    ExitCode::SUCCESS
}
