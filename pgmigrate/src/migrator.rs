//! The migration ledger and the apply/rollback loops.
//!
//! The `migration` table is the single source of truth for applied state; the
//! engine never infers applied state from the shape of the schema. Every
//! apply or rollback step runs in its own transaction that first takes a
//! table-level lock on the ledger, so concurrent migrators against the same
//! database serialise at the cluster.

use chrono::{DateTime, Utc};
use postgres::{Client, Transaction};
use tracing::{info, warn};

use crate::error::Error;
use crate::migration::NamedMigration;

const CREATE_LEDGER_SQL: &str = r#"
    CREATE TABLE migration (
        id serial PRIMARY KEY,
        "index" integer,
        name text,
        applied_at timestamp with time zone DEFAULT current_timestamp,
        UNIQUE ("index")
    )"#;

/// A migration recorded in the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedMigration {
    pub index: i32,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

fn ledger_exists(client: &mut Client) -> Result<bool, Error> {
    let row = client
        .query_one(
            "SELECT EXISTS(SELECT 1 FROM information_schema.tables \
             WHERE table_name = 'migration' AND table_schema = current_schema())",
            &[],
        )
        .map_err(Error::LedgerUnreachable)?;
    Ok(row.get(0))
}

pub(crate) fn ensure_ledger_exists(client: &mut Client) -> Result<(), Error> {
    if !ledger_exists(client)? {
        info!("creating migration ledger table");
        client
            .batch_execute(CREATE_LEDGER_SQL)
            .map_err(Error::LedgerUnreachable)?;
    }
    Ok(())
}

/// The ledger contents, ordered by index. Returns an empty list when the
/// ledger table has not been created yet.
pub fn applied_migrations(client: &mut Client) -> Result<Vec<AppliedMigration>, Error> {
    if !ledger_exists(client)? {
        return Ok(Vec::new());
    }
    let rows = client
        .query(
            r#"SELECT "index", name, applied_at FROM migration ORDER BY "index" ASC"#,
            &[],
        )
        .map_err(Error::LedgerUnreachable)?;
    Ok(rows
        .into_iter()
        .map(|row| AppliedMigration {
            index: row.get(0),
            name: row.get(1),
            applied_at: row.get(2),
        })
        .collect())
}

/// `CREATE SCHEMA IF NOT EXISTS <name>`. Quoting of the schema name is the
/// caller's responsibility.
pub fn ensure_schema(client: &mut Client, schema_name: &str) -> Result<(), Error> {
    client.batch_execute(&format!("CREATE SCHEMA IF NOT EXISTS {schema_name}"))?;
    Ok(())
}

fn lock_ledger(tx: &mut Transaction<'_>) -> Result<(), Error> {
    // Held until the step's transaction closes.
    tx.batch_execute("LOCK TABLE migration")
        .map_err(Error::LedgerUnreachable)
}

/// Walk the ledger against the declared list and return the first unapplied
/// index. The recorded rows must form exactly a prefix of the declared list,
/// matching by both index and name; any deviation is an error.
fn first_unapplied_index(
    tx: &mut Transaction<'_>,
    migrations: &[NamedMigration],
) -> Result<usize, Error> {
    let rows = tx
        .query(
            r#"SELECT "index", name FROM migration ORDER BY "index" ASC"#,
            &[],
        )
        .map_err(Error::LedgerUnreachable)?;
    let mut expected = 0usize;
    for row in rows {
        let stored_index: i32 = row.get(0);
        let stored_name: String = row.get(1);
        if stored_index < expected as i32 {
            return Err(Error::DuplicateOrNegativeIndex {
                index: stored_index,
            });
        }
        if stored_index as usize >= migrations.len() {
            return Err(Error::UnknownMigration {
                index: stored_index,
                name: stored_name,
            });
        }
        let declared = &migrations[expected].name;
        if stored_index as usize > expected {
            return Err(Error::MigrationSkipped {
                index: expected,
                name: declared.clone(),
            });
        }
        if stored_name != *declared {
            return Err(Error::NameMismatch {
                index: expected,
                declared: declared.clone(),
                stored: stored_name,
            });
        }
        expected += 1;
    }
    Ok(expected)
}

/// Roll back a step's transaction after a failure. A failed rollback is
/// logged so it never masks the error that got us here.
pub(crate) fn abort_transaction(tx: Transaction<'_>) {
    if let Err(err) = tx.rollback() {
        warn!("error rolling back migrations transaction: {err}");
    }
}

/// Apply the next unapplied migration and record it, in one transaction.
/// Returns false when there is nothing left to apply.
fn migrate_one(client: &mut Client, migrations: &[NamedMigration]) -> Result<bool, Error> {
    let mut tx = client.transaction()?;
    match try_migrate_one(&mut tx, migrations) {
        Ok(migrated) => {
            tx.commit()?;
            Ok(migrated)
        }
        Err(err) => {
            abort_transaction(tx);
            Err(err)
        }
    }
}

fn try_migrate_one(tx: &mut Transaction<'_>, migrations: &[NamedMigration]) -> Result<bool, Error> {
    lock_ledger(tx)?;
    let index = first_unapplied_index(tx, migrations)?;
    if index >= migrations.len() {
        return Ok(false);
    }
    let migration = &migrations[index];
    info!(index, name = %migration.name, "performing migration");
    migration
        .forward
        .apply(tx)
        .map_err(|cause| Error::MigrationFailed {
            index,
            name: migration.name.clone(),
            source: Box::new(cause),
        })?;
    tx.execute(
        r#"INSERT INTO migration ("index", name) VALUES ($1, $2)"#,
        &[&(index as i32), &migration.name],
    )?;
    Ok(true)
}

/// Reverse the topmost applied migration and delete its ledger row, in one
/// transaction. Returns the index that was rolled back.
fn rollback_one(
    client: &mut Client,
    migrations: &[NamedMigration],
    through: usize,
) -> Result<usize, Error> {
    let mut tx = client.transaction()?;
    match try_rollback_one(&mut tx, migrations, through) {
        Ok(index) => {
            tx.commit()?;
            Ok(index)
        }
        Err(err) => {
            abort_transaction(tx);
            Err(err)
        }
    }
}

fn try_rollback_one(
    tx: &mut Transaction<'_>,
    migrations: &[NamedMigration],
    through: usize,
) -> Result<usize, Error> {
    lock_ledger(tx)?;
    let first_unapplied = first_unapplied_index(tx, migrations)?;
    if through >= first_unapplied {
        return Err(Error::NotYetApplied { index: through });
    }
    let index = first_unapplied - 1;
    let migration = &migrations[index];
    let reverse = migration.reverse.as_ref().ok_or_else(|| Error::NoReverse {
        index,
        name: migration.name.clone(),
    })?;
    info!(index, name = %migration.name, "reversing migration");
    reverse.apply(tx).map_err(|cause| Error::RollbackFailed {
        index,
        name: migration.name.clone(),
        source: Box::new(cause),
    })?;
    tx.execute(
        r#"DELETE FROM migration WHERE "index" = $1"#,
        &[&(index as i32)],
    )?;
    Ok(index)
}

/// The entrypoint for applying and reversing an ordered list of
/// [NamedMigration]s on a PostgreSQL database.
///
/// The list is append-only across releases: the names and order of entries
/// that have been applied to any database must never change, because the
/// ledger is verified against the list before every step.
#[derive(Debug)]
pub struct Migrator {
    migrations: Vec<NamedMigration>,
}

impl Migrator {
    pub fn new(migrations: Vec<NamedMigration>) -> Self {
        Self { migrations }
    }

    /// All declared migrations, in order.
    pub fn migrations(&self) -> &[NamedMigration] {
        &self.migrations
    }

    /// Apply any unapplied tail of the declared list.
    ///
    /// Each migration commits in its own transaction, so a failure partway
    /// through leaves the already-applied prefix in place, both in the schema
    /// and in the ledger.
    pub fn migrate(&self, client: &mut Client) -> Result<(), Error> {
        ensure_ledger_exists(client)?;
        while migrate_one(client, &self.migrations)? {}
        Ok(())
    }

    /// Apply migrations up to and including `index`, leaving later ones
    /// alone. The ledger is verified against the prefix only.
    pub fn migrate_to(&self, client: &mut Client, index: usize) -> Result<(), Error> {
        if index >= self.migrations.len() {
            return Err(Error::InvalidTarget { index });
        }
        ensure_ledger_exists(client)?;
        let prefix = &self.migrations[..=index];
        while migrate_one(client, prefix)? {}
        Ok(())
    }

    /// Reverse applied migrations from the top down to and including
    /// `through`, deleting each one's ledger row as it goes.
    pub fn rollback(&self, client: &mut Client, through: usize) -> Result<(), Error> {
        ensure_ledger_exists(client)?;
        loop {
            let rolled_back = rollback_one(client, &self.migrations, through)?;
            if rolled_back == through {
                return Ok(());
            }
        }
    }
}
