//! Configuration type definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DiffError, Result};

/// Root configuration, built once at startup and passed by reference.
#[derive(Debug, Clone)]
pub struct Config {
    /// First (reference) instance.
    pub url1: ConnectionConfig,

    /// Second (replica or migrated) instance.
    pub url2: ConnectionConfig,

    /// Databases to compare.
    pub selection: DatabaseSelection,

    /// Engine tuning.
    pub diff: DiffConfig,
}

/// Which databases a run compares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseSelection {
    /// Every user database; both sides must hold the same set.
    All,

    /// An explicit list, compared in the given order.
    Names(Vec<String>),
}

impl DatabaseSelection {
    /// Parse a comma-separated database list. Empty entries are dropped.
    pub fn from_list(list: &str) -> Self {
        DatabaseSelection::Names(
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        )
    }
}

/// Connection parameters for one instance, parsed from `user[:password]@host:port`.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Username.
    pub user: String,

    /// Password, empty when the URL carries none.
    pub password: String,

    /// Host name or address.
    pub host: String,

    /// TCP port.
    pub port: u16,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

impl fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.user, self.host, self.port)
    }
}

const URL_FORMAT: &str = "format: user[:password]@host:port";

impl ConnectionConfig {
    /// Parse `user[:password]@host:port`.
    ///
    /// The URL must contain exactly one `@`; the credentials half at most one
    /// `:`; the address half exactly one `:` followed by a numeric port.
    pub fn from_url(url: &str) -> Result<Self> {
        let parse_err = || DiffError::Config(URL_FORMAT.to_string());

        let parts: Vec<&str> = url.split('@').collect();
        let [credentials, address] = parts.as_slice() else {
            return Err(parse_err());
        };

        let creds: Vec<&str> = credentials.split(':').collect();
        let (user, password) = match creds.as_slice() {
            [user] => (*user, ""),
            [user, password] => (*user, *password),
            _ => return Err(parse_err()),
        };

        let addr: Vec<&str> = address.split(':').collect();
        let [host, port] = addr.as_slice() else {
            return Err(parse_err());
        };
        let port: u16 = port.parse().map_err(|_| parse_err())?;

        Ok(Self {
            user: user.to_string(),
            password: password.to_string(),
            host: host.to_string(),
            port,
        })
    }
}

/// Engine tuning, loadable from a YAML file. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Target rows per chunk (default: 5000).
    pub chunk_size: u64,

    /// Tables compared concurrently per database (default: 4).
    pub workers: usize,

    /// Stop at the first non-equal or failed table (default: true).
    pub fail_fast: bool,

    /// Maximum bisection depth when narrowing a mismatched chunk (default: 32).
    pub max_narrow_depth: u32,

    /// Stop narrowing once a range holds at most this many rows (default: 1).
    pub narrow_min_rows: u64,

    /// Maximum divergences reported per table (default: 100).
    pub max_divergences: usize,

    /// Deadline for a single query attempt in seconds (default: 30).
    pub query_timeout_secs: u64,

    /// Deadline for connecting to an instance in seconds (default: 30).
    pub connect_timeout_secs: u64,

    /// Retry behavior for transient failures.
    pub retry: RetryConfig,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            chunk_size: 5000,
            workers: 4,
            fail_fast: true,
            max_narrow_depth: 32,
            narrow_min_rows: 1,
            max_divergences: 100,
            query_timeout_secs: 30,
            connect_timeout_secs: 30,
            retry: RetryConfig::default(),
        }
    }
}

impl DiffConfig {
    /// Connection pool size per side.
    pub fn pool_size(&self) -> u32 {
        (self.workers as u32).saturating_mul(2).clamp(4, 64)
    }
}

/// Bounded exponential backoff settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first (default: 3).
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds (default: 200).
    pub base_delay_ms: u64,

    /// Upper bound on any single delay in milliseconds (default: 5000).
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5000,
        }
    }
}
