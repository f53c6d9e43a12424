use std::fmt;

use postgres::Transaction;

use crate::error::Error;

/// The signature of a custom migration: all database access must go through
/// the supplied transaction, and the callback must not commit or roll it back.
pub type MigrationFn = Box<dyn Fn(&mut Transaction<'_>) -> Result<(), Error> + Send + Sync>;

/// A single schema change, applied within a transaction supplied by the
/// migrator.
pub enum Migration {
    /// An ordered list of SQL statements. Each statement is executed verbatim
    /// via the simple-query protocol, with no parameter binding; the first
    /// failure aborts. Quoting of identifiers and literals is the caller's
    /// responsibility.
    Static(Vec<String>),
    /// A user-supplied callback receiving the open transaction.
    Custom(MigrationFn),
}

impl Migration {
    /// A migration that is just a list of SQL statements to perform.
    pub fn sql<I, S>(statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Migration::Static(statements.into_iter().map(Into::into).collect())
    }

    /// A migration that runs the given callback against the transaction.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&mut Transaction<'_>) -> Result<(), Error> + Send + Sync + 'static,
    {
        Migration::Custom(Box::new(f))
    }

    pub(crate) fn apply(&self, tx: &mut Transaction<'_>) -> Result<(), Error> {
        match self {
            Migration::Static(statements) => {
                for sql in statements {
                    tx.batch_execute(sql)?;
                }
                Ok(())
            }
            Migration::Custom(f) => f(tx),
        }
    }
}

impl fmt::Debug for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Migration::Static(statements) => f.debug_tuple("Static").field(statements).finish(),
            Migration::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A declared migration unit: a forward step paired with an optional exact
/// reverse, identified by a human-readable name.
///
/// The name and the unit's position in the declared list are recorded in the
/// ledger when the migration is applied, and must never change afterwards.
#[derive(Debug)]
pub struct NamedMigration {
    pub name: String,
    pub forward: Migration,
    /// Does the opposite of `forward`. Migrations without a reverse cannot be
    /// rolled back.
    pub reverse: Option<Migration>,
}

impl NamedMigration {
    pub fn new(name: impl Into<String>, forward: Migration) -> Self {
        Self {
            name: name.into(),
            forward,
            reverse: None,
        }
    }

    pub fn with_reverse(mut self, reverse: Migration) -> Self {
        self.reverse = Some(reverse);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_omits_callback_body() {
        let custom = Migration::custom(|_tx: &mut Transaction<'_>| Ok(()));
        assert_eq!(format!("{:?}", custom), "Custom(..)");

        let stat = Migration::sql(["SELECT 1"]);
        assert_eq!(format!("{:?}", stat), r#"Static(["SELECT 1"])"#);
    }
}
