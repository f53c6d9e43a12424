//! Shared PostgreSQL test infrastructure: one disposable container for the
//! whole test run, one freshly created database per test.

use std::sync::OnceLock;

use postgres::{Client, NoTls};
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;
use uuid::Uuid;

/// Default credentials for testcontainers-modules postgres.
pub const PG_USER: &str = "postgres";
pub const PG_PASSWORD: &str = "postgres";
const PG_ADMIN_DB: &str = "postgres";

static POSTGRES_PORT: OnceLock<u16> = OnceLock::new();

/// Start the shared container on first use and return its mapped port. The
/// container and the runtime managing it are leaked so they outlive every
/// test in the run.
pub fn postgres_port() -> u16 {
    *POSTGRES_PORT.get_or_init(|| {
        let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
        let port = rt.block_on(async {
            let container = Postgres::default()
                .start()
                .await
                .expect("failed to start postgres container");
            let port = container
                .get_host_port_ipv4(5432)
                .await
                .expect("failed to get postgres port");
            std::mem::forget(container);
            port
        });
        std::mem::forget(rt);
        port
    })
}

fn url(db: &str) -> String {
    format!(
        "postgres://{}:{}@127.0.0.1:{}/{}",
        PG_USER,
        PG_PASSWORD,
        postgres_port(),
        db
    )
}

/// Connect to a database on the shared container.
pub fn connect(db: &str) -> Client {
    Client::connect(&url(db), NoTls).expect("failed to connect to test database")
}

/// Create a database with a unique name for isolated testing, returning a
/// connection to it together with its name.
pub fn fresh_db() -> (Client, String) {
    let mut admin = connect(PG_ADMIN_DB);
    // PostgreSQL identifiers are case-insensitive, so lowercase is fine.
    let db_name = format!("test_{}", Uuid::new_v4().simple());
    admin
        .execute(&format!("CREATE DATABASE \"{}\"", db_name), &[])
        .expect("failed to create test database");
    drop(admin);
    (connect(&db_name), db_name)
}

/// A connection to a fresh, isolated database.
pub fn fresh_client() -> Client {
    fresh_db().0
}
