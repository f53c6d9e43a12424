//! Canonical schema snapshots via the external `pg_dump` binary.

use std::fs::OpenOptions;
use std::io::Write;
use std::process::Command;

use postgres::{Client, NoTls};

use crate::error::Error;

/// Connection parameters for a PostgreSQL database.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl PostgresConfig {
    pub(crate) fn validate(&self) -> Result<(), Error> {
        for (field, value) in [
            ("host", &self.host),
            ("database", &self.database),
            ("user", &self.user),
            ("password", &self.password),
        ] {
            if value.is_empty() {
                return Err(Error::Config(format!("{field} must not be empty")));
            }
        }
        if self.port == 0 {
            return Err(Error::Config("port must not be zero".to_string()));
        }
        Ok(())
    }

    /// Open a connection without TLS.
    pub fn connect(&self) -> Result<Client, Error> {
        let mut config = postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.database)
            .user(&self.user)
            .password(&self.password)
            .ssl_mode(postgres::config::SslMode::Disable);
        Ok(config.connect(NoTls)?)
    }

    fn pgpass_line(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.host, self.port, self.database, self.user, self.password
        )
    }
}

/// Dump the schema (no data) of the configured database.
///
/// Two invocations against the same logical schema yield byte-identical
/// output, which is what the round-trip tester compares. The password is
/// passed through a 0600 password file in a temp directory that is removed on
/// every exit path.
pub fn dump(config: &PostgresConfig) -> Result<Vec<u8>, Error> {
    let temp_dir = tempfile::Builder::new().prefix("pgdump").tempdir()?;
    let pass_path = temp_dir.path().join(".pgpass");
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut pass_file = options.open(&pass_path)?;
    pass_file.write_all(config.pgpass_line().as_bytes())?;
    drop(pass_file);

    let output = Command::new("pg_dump")
        .arg("-s") // schema only
        .args(["-h", &config.host])
        .args(["-p", &config.port.to_string()])
        .args(["-U", &config.user])
        // if not specified, will be random, so not repeatable
        .arg("--restrict-key=key")
        .arg(&config.database)
        .current_dir(temp_dir.path())
        .env("PGPASSFILE", &pass_path)
        .output()?;
    if !output.status.success() {
        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);
        return Err(Error::DumpFailed {
            status: output.status,
            output: String::from_utf8_lossy(&combined).into_owned(),
        });
    }
    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PostgresConfig {
        PostgresConfig {
            host: "localhost".to_string(),
            port: 5432,
            database: "postgres".to_string(),
            user: "postgres".to_string(),
            password: "hunter2".to_string(),
        }
    }

    #[test]
    fn pgpass_line_is_colon_separated() {
        assert_eq!(
            config().pgpass_line(),
            "localhost:5432:postgres:postgres:hunter2"
        );
    }

    #[test]
    fn validate_rejects_empty_fields() {
        assert!(config().validate().is_ok());

        let mut empty_password = config();
        empty_password.password.clear();
        let err = empty_password.validate().unwrap_err();
        assert!(matches!(err, Error::Config(message) if message.contains("password")));

        let mut zero_port = config();
        zero_port.port = 0;
        let err = zero_port.validate().unwrap_err();
        assert!(matches!(err, Error::Config(message) if message.contains("port")));
    }
}
