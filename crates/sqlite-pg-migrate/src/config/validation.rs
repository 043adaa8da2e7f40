//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.source.path.as_os_str().is_empty() {
        return Err(MigrateError::Config("source path is required".into()));
    }

    if config.target.host.is_empty() {
        return Err(MigrateError::Config("target host is required".into()));
    }
    if config.target.database.is_empty() {
        return Err(MigrateError::Config("target database is required".into()));
    }
    if config.target.user.is_empty() {
        return Err(MigrateError::Config("target user is required".into()));
    }
    if config.target.schema.is_empty() {
        return Err(MigrateError::Config("target schema is required".into()));
    }

    validate_batch_size(config.migration.batch_size)
}

/// Reject a batch size the pagination loop cannot advance with.
pub fn validate_batch_size(batch_size: i64) -> Result<()> {
    if batch_size <= 0 {
        return Err(MigrateError::InvalidConfiguration(format!(
            "batch size must be a positive integer, got {}",
            batch_size
        )));
    }
    Ok(())
}
