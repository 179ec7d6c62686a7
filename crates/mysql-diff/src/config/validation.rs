//! Configuration validation.

use super::{Config, DatabaseSelection, DiffConfig};
use crate::error::{DiffError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    for (name, conn) in [("url1", &config.url1), ("url2", &config.url2)] {
        if conn.user.is_empty() {
            return Err(DiffError::Config(format!("{} user is required", name)));
        }
        if conn.host.is_empty() {
            return Err(DiffError::Config(format!("{} host is required", name)));
        }
    }

    if let DatabaseSelection::Names(names) = &config.selection {
        if names.is_empty() {
            return Err(DiffError::Config(
                "either --all-databases or --databases is required".into(),
            ));
        }
    }

    validate_diff(&config.diff)
}

/// Validate engine tuning values.
pub fn validate_diff(diff: &DiffConfig) -> Result<()> {
    if diff.chunk_size == 0 {
        return Err(DiffError::Config("chunk_size must be at least 1".into()));
    }
    if diff.workers == 0 {
        return Err(DiffError::Config("workers must be at least 1".into()));
    }
    if diff.max_divergences == 0 {
        return Err(DiffError::Config(
            "max_divergences must be at least 1".into(),
        ));
    }
    if diff.query_timeout_secs == 0 {
        return Err(DiffError::Config(
            "query_timeout_secs must be at least 1".into(),
        ));
    }
    if diff.connect_timeout_secs == 0 {
        return Err(DiffError::Config(
            "connect_timeout_secs must be at least 1".into(),
        ));
    }
    if diff.retry.max_attempts == 0 {
        return Err(DiffError::Config(
            "retry.max_attempts must be at least 1".into(),
        ));
    }
    if diff.retry.base_delay_ms > diff.retry.max_delay_ms {
        return Err(DiffError::Config(
            "retry.base_delay_ms cannot exceed retry.max_delay_ms".into(),
        ));
    }

    Ok(())
}
