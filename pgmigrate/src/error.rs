/// Error type for the pgmigrate crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The `migration` ledger table could not be queried, created, or locked.
    #[error("error querying or locking the migration table: {0}")]
    LedgerUnreachable(#[source] postgres::Error),

    /// A ledger row carries an index below the contiguous prefix walked so
    /// far, which only a negative or duplicate index can produce.
    #[error("negative or duplicate migration index {index} in database")]
    DuplicateOrNegativeIndex { index: i32 },

    /// A ledger row names an index beyond the declared list.
    #[error("cannot verify migration {index} ({name:?}) in database: no such migration")]
    UnknownMigration { index: i32, name: String },

    /// The ledger records a later migration without this one.
    #[error("migration {index} ({name:?}) was skipped in the database")]
    MigrationSkipped { index: usize, name: String },

    /// The ledger's name for an index disagrees with the declared list.
    #[error("migration {index}: expected name {declared:?} but was {stored:?} in database")]
    NameMismatch {
        index: usize,
        declared: String,
        stored: String,
    },

    /// A forward step failed; its transaction was rolled back and earlier
    /// steps remain applied.
    #[error("error performing migration {index} ({name:?}): {source}")]
    MigrationFailed {
        index: usize,
        name: String,
        source: Box<Error>,
    },

    /// Rollback reached a migration declared without a reverse.
    #[error("no reverse for migration {index} ({name:?})")]
    NoReverse { index: usize, name: String },

    /// A reverse step failed; its transaction was rolled back.
    #[error("error reversing migration {index} ({name:?}): {source}")]
    RollbackFailed {
        index: usize,
        name: String,
        source: Box<Error>,
    },

    /// The requested migration index is outside the declared list.
    #[error("migration index {index} is outside the declared migrations")]
    InvalidTarget { index: usize },

    /// Rollback was asked to reverse a migration that is not applied.
    #[error("migration {index} has not been applied yet")]
    NotYetApplied { index: usize },

    /// The round-trip test requires an empty database.
    #[error("existing tables found; the schema test must run on an empty database")]
    NonEmptyDatabase,

    /// `pg_dump` exited non-zero; its combined output is included.
    #[error("pg_dump failed with {status}; output:\n{output}")]
    DumpFailed {
        status: std::process::ExitStatus,
        output: String,
    },

    /// Two schema dumps that must be byte-identical were not.
    #[error("schema dump after {step} did not match; diff:\n{diff}")]
    SchemaMismatch { step: String, diff: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Postgres(#[from] postgres::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
