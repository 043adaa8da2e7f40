//! Configuration loading and validation.
//!
//! All settings come from environment-style key/value pairs: the process
//! environment first, then an optional `.env` file in the working directory.
//! The configuration is built once at startup and passed by reference.

mod types;
mod validation;

pub use types::*;
pub use validation::validate_batch_size;

use crate::error::{MigrateError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Dotenv file read by [`Config::from_env`].
pub const DOTENV_FILE: &str = ".env";

/// Path to the SQLite database file.
pub const ENV_SQLITE_DB_PATH: &str = "SQLITE_DB_PATH";
/// PostgreSQL host.
pub const ENV_POSTGRES_HOST: &str = "POSTGRES_HOST";
/// PostgreSQL port (optional).
pub const ENV_POSTGRES_PORT: &str = "POSTGRES_PORT";
/// PostgreSQL database name.
pub const ENV_POSTGRES_DBNAME: &str = "POSTGRES_DBNAME";
/// PostgreSQL user.
pub const ENV_POSTGRES_USER: &str = "POSTGRES_USER";
/// PostgreSQL password.
pub const ENV_POSTGRES_PASSWORD: &str = "POSTGRES_PASSWORD";
/// Destination namespace (optional).
pub const ENV_POSTGRES_SCHEMA: &str = "POSTGRES_SCHEMA";
/// Rows per page.
pub const ENV_BATCH_SIZE: &str = "BATCH_SIZE";

impl Config {
    /// Load configuration from the process environment and `./.env`.
    pub fn from_env() -> Result<Self> {
        Self::from_env_file(DOTENV_FILE)
    }

    /// Load configuration from the process environment, falling back to
    /// `path` for keys the environment does not set. A missing file is not
    /// an error.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = read_env_file(path.as_ref())?;
        Self::from_lookup(|key| std::env::var(key).ok().or_else(|| file.get(key).cloned()))
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            match lookup(key) {
                Some(value) if !value.trim().is_empty() => Ok(value),
                _ => Err(MigrateError::Config(format!(
                    "{} environment variable not set",
                    key
                ))),
            }
        };

        let path = required(ENV_SQLITE_DB_PATH)?;
        let host = required(ENV_POSTGRES_HOST)?;
        let database = required(ENV_POSTGRES_DBNAME)?;
        let user = required(ENV_POSTGRES_USER)?;
        let password = required(ENV_POSTGRES_PASSWORD)?;

        let port = match lookup(ENV_POSTGRES_PORT).filter(|v| !v.trim().is_empty()) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                MigrateError::Config(format!(
                    "Expected {} to be a port number but got {}",
                    ENV_POSTGRES_PORT, raw
                ))
            })?,
            None => default_pg_port(),
        };

        let schema = lookup(ENV_POSTGRES_SCHEMA)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(default_target_schema);

        let raw_batch = required(ENV_BATCH_SIZE)?;
        let batch_size = raw_batch.trim().parse::<i64>().map_err(|_| {
            MigrateError::Config(format!(
                "Expected {} to be an integer but got {}",
                ENV_BATCH_SIZE, raw_batch
            ))
        })?;

        let config = Config {
            source: SourceConfig {
                path: PathBuf::from(path),
            },
            target: TargetConfig {
                host,
                port,
                database,
                user,
                password,
                schema,
            },
            migration: MigrationConfig { batch_size },
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

/// Parse a dotenv file into key/value pairs without touching the process
/// environment.
fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let invalid =
        |e: dotenvy::Error| MigrateError::Config(format!("Cannot read {}: {}", path.display(), e));

    match dotenvy::from_path_iter(path) {
        Ok(iter) => iter.map(|item| item.map_err(invalid)).collect(),
        Err(e) if e.not_found() => Ok(HashMap::new()),
        Err(e) => Err(invalid(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn full_env() -> HashMap<String, String> {
        env(&[
            (ENV_SQLITE_DB_PATH, "db.sqlite"),
            (ENV_POSTGRES_HOST, "localhost"),
            (ENV_POSTGRES_DBNAME, "movies_database"),
            (ENV_POSTGRES_USER, "app"),
            (ENV_POSTGRES_PASSWORD, "123qwe"),
            (ENV_BATCH_SIZE, "100"),
        ])
    }

    fn load(vars: &HashMap<String, String>) -> Result<Config> {
        Config::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn test_from_lookup_with_defaults() {
        let config = load(&full_env()).unwrap();
        assert_eq!(config.source.path, PathBuf::from("db.sqlite"));
        assert_eq!(config.target.port, 5432);
        assert_eq!(config.target.schema, "content");
        assert_eq!(config.migration.batch_size, 100);
    }

    #[test]
    fn test_optional_overrides() {
        let mut vars = full_env();
        vars.insert(ENV_POSTGRES_PORT.into(), "6543".into());
        vars.insert(ENV_POSTGRES_SCHEMA.into(), "staging".into());
        let config = load(&vars).unwrap();
        assert_eq!(config.target.port, 6543);
        assert_eq!(config.target.schema, "staging");
    }

    #[test]
    fn test_missing_required_key() {
        for key in [
            ENV_SQLITE_DB_PATH,
            ENV_POSTGRES_HOST,
            ENV_POSTGRES_DBNAME,
            ENV_POSTGRES_USER,
            ENV_POSTGRES_PASSWORD,
            ENV_BATCH_SIZE,
        ] {
            let mut vars = full_env();
            vars.remove(key);
            match load(&vars) {
                Err(MigrateError::Config(msg)) => assert!(msg.contains(key)),
                other => panic!("expected config error for {}, got {:?}", key, other),
            }
        }
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let mut vars = full_env();
        vars.insert(ENV_POSTGRES_USER.into(), "  ".into());
        assert!(matches!(load(&vars), Err(MigrateError::Config(_))));
    }

    #[test]
    fn test_non_integer_batch_size() {
        let mut vars = full_env();
        vars.insert(ENV_BATCH_SIZE.into(), "ten".into());
        match load(&vars) {
            Err(MigrateError::Config(msg)) => assert!(msg.contains("integer")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_non_positive_batch_size() {
        for raw in ["0", "-5"] {
            let mut vars = full_env();
            vars.insert(ENV_BATCH_SIZE.into(), raw.into());
            assert!(matches!(
                load(&vars),
                Err(MigrateError::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn test_read_env_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "# local settings\nSQLITE_DB_PATH=db.sqlite\nPOSTGRES_PASSWORD=\"123qwe\"\nBATCH_SIZE=50\n",
        )
        .unwrap();

        let vars = read_env_file(&path).unwrap();
        assert_eq!(vars.len(), 3);
        assert_eq!(vars[ENV_SQLITE_DB_PATH], "db.sqlite");
        assert_eq!(vars[ENV_POSTGRES_PASSWORD], "123qwe");
        assert_eq!(vars[ENV_BATCH_SIZE], "50");
    }

    #[test]
    fn test_missing_env_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_env_file(&dir.path().join(".env")).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_env_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "=100\n").unwrap();
        assert!(matches!(read_env_file(&path), Err(MigrateError::Config(_))));
    }

    #[test]
    fn test_env_file_fills_unset_keys_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "BATCH_SIZE=50\nPOSTGRES_SCHEMA=staging\n").unwrap();
        let file = read_env_file(&path).unwrap();

        let mut process = full_env();
        process.remove(ENV_BATCH_SIZE);
        process.insert(ENV_POSTGRES_SCHEMA.into(), "content".into());

        let config =
            Config::from_lookup(|k| process.get(k).cloned().or_else(|| file.get(k).cloned()))
                .unwrap();
        assert_eq!(config.migration.batch_size, 50);
        assert_eq!(config.target.schema, "content");
    }

    #[test]
    fn test_bad_port() {
        let mut vars = full_env();
        vars.insert(ENV_POSTGRES_PORT.into(), "99999".into());
        assert!(matches!(load(&vars), Err(MigrateError::Config(_))));
    }
}
