//! The migration list exercised by the schema test.

use pgmigrate::{Migration, NamedMigration};

pub fn all_migrations() -> Vec<NamedMigration> {
    vec![
        NamedMigration::new(
            "Create a table",
            Migration::sql([
                "CREATE TABLE table1 (
                    id serial PRIMARY KEY,
                    f1 TEXT NULL
                )",
            ]),
        )
        .with_reverse(Migration::sql(["DROP TABLE table1"])),
        NamedMigration::new(
            "Make field not-nullable",
            Migration::sql(["ALTER TABLE table1 ALTER COLUMN f1 SET NOT NULL"]),
        )
        .with_reverse(Migration::sql([
            "ALTER TABLE table1 ALTER COLUMN f1 DROP NOT NULL",
        ])),
        NamedMigration::new(
            "Create a dependent table",
            Migration::sql([
                "CREATE TABLE table2 (
                    id serial PRIMARY KEY,
                    table1_id integer REFERENCES table1(id)
                )",
            ]),
        )
        .with_reverse(Migration::sql(["DROP TABLE table2"])),
        NamedMigration::new(
            "Create a table with an enum type",
            Migration::sql([
                "CREATE TYPE type1 AS ENUM (
                    'type1val1',
                    'type1val2'
                )",
                "CREATE TABLE table3 (
                    id serial PRIMARY KEY,
                    v type1 NOT NULL
                )",
            ]),
        )
        .with_reverse(Migration::sql(["DROP TABLE table3", "DROP TYPE type1"])),
        NamedMigration::new(
            "Add a new value to the enum type",
            Migration::sql(["ALTER TYPE type1 ADD VALUE 'type1val3'"]),
        )
        .with_reverse(Migration::sql([
            // There is no ALTER TYPE ... DROP VALUE; rebuild the type and
            // swap the column over to it.
            "ALTER TYPE type1 RENAME TO type1_old",
            "CREATE TYPE type1 AS ENUM (
                'type1val1',
                'type1val2'
            )",
            "ALTER TABLE table3 ALTER COLUMN v TYPE type1 USING v::text::type1",
            "DROP TYPE type1_old",
        ])),
        NamedMigration::new(
            "Create a view referencing a new enum value",
            Migration::sql(["CREATE VIEW v AS SELECT * FROM table3 WHERE v = 'type1val3'"]),
        )
        .with_reverse(Migration::sql(["DROP VIEW v"])),
    ]
}
