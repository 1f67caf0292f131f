//! Configuration validation.

use super::Config;
use crate::error::{Result, SyncError};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.host.is_empty() {
        return Err(SyncError::Config("source.host is required".into()));
    }
    if config.source.database.is_empty() {
        return Err(SyncError::Config("source.database is required".into()));
    }
    if config.source.user.is_empty() {
        return Err(SyncError::Config("source.user is required".into()));
    }
    if config.source.r#type != "mssql" {
        return Err(SyncError::Config(format!(
            "source.type must be 'mssql', got '{}'",
            config.source.r#type
        )));
    }

    // Target validation
    if config.target.host.is_empty() {
        return Err(SyncError::Config("target.host is required".into()));
    }
    if config.target.database.is_empty() {
        return Err(SyncError::Config("target.database is required".into()));
    }
    if config.target.user.is_empty() {
        return Err(SyncError::Config("target.user is required".into()));
    }
    if config.target.r#type != "postgres" {
        return Err(SyncError::Config(format!(
            "target.type must be 'postgres', got '{}'",
            config.target.r#type
        )));
    }

    // Cannot sync into the same database
    if config.source.host == config.target.host
        && config.source.port == config.target.port
        && config.source.database == config.target.database
    {
        return Err(SyncError::Config(
            "source and target cannot be the same database".into(),
        ));
    }

    // Sync config validation
    if config.sync.workers == 0 {
        return Err(SyncError::Config(
            "sync.workers must be at least 1".into(),
        ));
    }
    if config.sync.query_timeout_secs == 0 {
        return Err(SyncError::Config(
            "sync.query_timeout_secs must be at least 1".into(),
        ));
    }

    Ok(())
}
