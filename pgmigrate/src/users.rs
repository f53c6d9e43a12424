//! Cluster user provisioning.

use postgres::{Client, Transaction};
use postgres_protocol::escape::{escape_identifier, escape_literal};
use tracing::info;

use crate::error::Error;
use crate::migrator::abort_transaction;

/// A database user together with the complete set of roles it should hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresUser {
    pub username: String,
    pub grant_roles: Vec<String>,
}

/// How provisioned users will authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAuthentication {
    /// IAM token authentication: passwords are removed and the `rds_iam`
    /// role is granted.
    Iam,
    /// Password authentication: each user's password is set to its username.
    Password,
}

/// Make sure that the given users exist in the database cluster and have only
/// the role memberships specified. All operations are done in a single
/// transaction.
pub fn ensure_users_with_roles(
    client: &mut Client,
    users: &[PostgresUser],
    auth: UserAuthentication,
) -> Result<(), Error> {
    let mut tx = client.transaction()?;
    match try_ensure_users(&mut tx, users, auth) {
        Ok(()) => {
            tx.commit()?;
            Ok(())
        }
        Err(err) => {
            abort_transaction(tx);
            Err(err)
        }
    }
}

fn try_ensure_users(
    tx: &mut Transaction<'_>,
    users: &[PostgresUser],
    auth: UserAuthentication,
) -> Result<(), Error> {
    for user in users {
        info!(username = %user.username, "ensuring user");
        let username_literal = escape_literal(&user.username);
        let username_identifier = escape_identifier(&user.username);

        let create_user_sql = format!(
            r"
            DO $$
            DECLARE
                username text := {username_literal};
            BEGIN
                IF NOT EXISTS (
                    SELECT FROM pg_catalog.pg_user WHERE usename = username
                ) THEN
                    EXECUTE format('CREATE USER %I', username);
                END IF;
            END
            $$"
        );
        tx.batch_execute(&create_user_sql)?;

        // Revoke all existing role memberships; the grants below are the
        // complete set. There could also be privileges on a variety of other
        // object kinds, but only roles are managed here.
        let revoke_roles_sql = format!(
            r"
            DO $$
            DECLARE
                r RECORD;
            BEGIN
                FOR r IN
                    SELECT roleid::regrole AS granted_role
                    FROM pg_catalog.pg_auth_members
                    WHERE member = {username_literal}::regrole
                LOOP
                    EXECUTE format('REVOKE %I FROM {username_identifier}', r.granted_role);
                END LOOP;
            END
            $$"
        );
        tx.batch_execute(&revoke_roles_sql)?;

        let mut roles: Vec<&str> = user.grant_roles.iter().map(String::as_str).collect();
        if auth == UserAuthentication::Iam {
            roles.push("rds_iam");
        }
        for role in roles {
            tx.batch_execute(&format!(
                "GRANT {} TO {}",
                escape_identifier(role),
                username_identifier
            ))?;
        }

        match auth {
            UserAuthentication::Password => {
                tx.batch_execute(&format!(
                    "ALTER USER {username_identifier} WITH PASSWORD {username_literal}"
                ))?;
            }
            UserAuthentication::Iam => {
                tx.batch_execute(&format!(
                    "ALTER USER {username_identifier} WITH PASSWORD NULL"
                ))?;
            }
        }
    }
    Ok(())
}
