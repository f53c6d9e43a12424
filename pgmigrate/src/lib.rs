//! `pgmigrate` applies an ordered, append-only list of named migrations to a
//! PostgreSQL database, records what it has done, and supports exact reversal.
//!
//! Core concepts:
//! - Migrations are identified by their position in the declared list. The
//!   `migration` ledger table records the applied prefix by index and name,
//!   and the engine refuses to proceed when the recorded history disagrees
//!   with the declared list in any way.
//! - Each migration runs in its own transaction under a table-level lock on
//!   the ledger, so concurrent migrators on the same database serialise at
//!   the cluster. A failure aborts only that step; previously committed steps
//!   stay applied.
//! - Migrations receive a live [`postgres::Transaction`], so a migration can
//!   query data, transform it in Rust, and write it back rather than being
//!   limited to prepared SQL.
//!
//! The [`schema_test`] round-trip verifier proves, via `pg_dump` snapshots,
//! that every declared migration is a true inverse of its reverse and that
//! re-applying a migration is deterministic.
//!
//! # Example
//!
//! ```ignore
//! use pgmigrate::{Migration, Migrator, NamedMigration};
//! use postgres::{Client, NoTls};
//!
//! let migrations = vec![
//!     NamedMigration::new(
//!         "Create users table",
//!         Migration::sql(["CREATE TABLE users (id serial PRIMARY KEY, name text)"]),
//!     )
//!     .with_reverse(Migration::sql(["DROP TABLE users"])),
//! ];
//!
//! let mut client = Client::connect("postgres://postgres@localhost/mydb", NoTls)?;
//! Migrator::new(migrations).migrate(&mut client)?;
//! ```

mod dump;
mod error;
mod migration;
mod migrator;
mod users;

pub use dump::{dump, PostgresConfig};
pub use error::Error;
pub use migration::{Migration, NamedMigration};
pub use migrator::{applied_migrations, ensure_schema, AppliedMigration, Migrator};
pub use schema_test::schema_test;
pub use users::{ensure_users_with_roles, PostgresUser, UserAuthentication};

#[cfg(test)]
pub(crate) mod test_postgres;
