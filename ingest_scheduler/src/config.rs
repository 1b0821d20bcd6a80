//! Process configuration.
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults
//! 2. an optional TOML file (`--config`)
//! 3. environment variables, after loading `.env`:
//!    `POLYGON_API_KEY`, `POLYGON_BASE_URL`, `DATABASE_URL`, `INGEST_CRON`
//!
//! Example file:
//! ```toml
//! database_url = "sqlite://./market.db"
//! latest_policy = "session"
//! cron = "0 45 16 * * Mon-Fri"
//! run_on_start = false
//!
//! [database]
//! max_connections = 5
//! write_timeout_secs = 300
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use shared_utils::env::optional_env_var;
use snapshot_store::LatestPolicy;
use snapshot_store::StoreOptions;
use snapshot_store::db::connection::PoolSettings;
use snapshot_store::sql::OpTimeouts;

use crate::cycle::DEFAULT_CYCLE_TIMEOUT;
use crate::scheduler::DEFAULT_CRON;

const POLYGON_API_KEY: &str = "POLYGON_API_KEY";
const POLYGON_BASE_URL: &str = "POLYGON_BASE_URL";
const DATABASE_URL: &str = "DATABASE_URL";
const INGEST_CRON: &str = "INGEST_CRON";

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("reading config file {path}: {source}")]
    Read {
        /// Path that was read.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`AppConfig`].
    #[error("parsing config file {path}: {source}")]
    Parse {
        /// Path that was parsed.
        path: PathBuf,
        /// TOML failure.
        #[source]
        source: toml::de::Error,
    },

    /// A value is out of range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// SQL pool and per-operation deadlines (`[database]` table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DatabaseConfig {
    /// Pool upper bound.
    pub max_connections: u32,
    /// Connections kept open while idle.
    pub min_idle: u32,
    /// Connection recycle age in seconds.
    pub max_lifetime_secs: u64,
    /// Idle connection timeout in seconds.
    pub idle_timeout_secs: u64,
    /// How long to wait for a pooled connection, in seconds.
    pub connection_timeout_secs: u64,
    /// Deadline for each read query, in seconds.
    pub read_timeout_secs: u64,
    /// Deadline for one batch write, in seconds.
    pub write_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let pool = PoolSettings::default();
        let timeouts = OpTimeouts::default();
        let secs = |d: Option<Duration>| d.map_or(0, |d| d.as_secs());
        Self {
            max_connections: pool.max_size,
            min_idle: pool.min_idle.unwrap_or(0),
            max_lifetime_secs: secs(pool.max_lifetime),
            idle_timeout_secs: secs(pool.idle_timeout),
            connection_timeout_secs: pool.connection_timeout.as_secs(),
            read_timeout_secs: timeouts.read.as_secs(),
            write_timeout_secs: timeouts.write.as_secs(),
        }
    }
}

impl DatabaseConfig {
    /// r2d2 settings; a zero lifetime or idle timeout disables that limit.
    pub fn pool_settings(&self) -> PoolSettings {
        let limit = |secs: u64| (secs > 0).then(|| Duration::from_secs(secs));
        PoolSettings {
            max_size: self.max_connections,
            min_idle: Some(self.min_idle.min(self.max_connections)),
            max_lifetime: limit(self.max_lifetime_secs),
            idle_timeout: limit(self.idle_timeout_secs),
            connection_timeout: Duration::from_secs(self.connection_timeout_secs),
        }
    }

    /// Per-operation deadlines.
    pub fn timeouts(&self) -> OpTimeouts {
        OpTimeouts {
            read: Duration::from_secs(self.read_timeout_secs),
            write: Duration::from_secs(self.write_timeout_secs),
        }
    }
}

/// Top-level configuration of the `market-dash` process.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AppConfig {
    /// Polygon API key; required by commands that fetch data.
    pub polygon_api_key: Option<String>,
    /// Alternate Polygon endpoint.
    pub polygon_base_url: Option<String>,
    /// SQL store URL; unset selects the in-memory store.
    pub database_url: Option<String>,
    /// How the store resolves each symbol's latest bar.
    pub latest_policy: LatestPolicy,
    /// Six-field cron expression (with seconds), evaluated in New York time.
    pub cron: String,
    /// Upper bound on the provider fetch of one cycle, in seconds.
    pub cycle_timeout_secs: u64,
    /// Run one cycle immediately when the scheduler starts.
    pub run_on_start: bool,
    /// Rows per list in the market summary.
    pub summary_limit: usize,
    /// Pool and deadline settings for the SQL store.
    pub database: DatabaseConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            polygon_api_key: None,
            polygon_base_url: None,
            database_url: None,
            latest_policy: LatestPolicy::default(),
            cron: DEFAULT_CRON.to_string(),
            cycle_timeout_secs: DEFAULT_CYCLE_TIMEOUT.as_secs(),
            run_on_start: true,
            summary_limit: snapshot_store::facade::SUMMARY_LIMIT,
            database: DatabaseConfig::default(),
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("polygon_api_key", &self.polygon_api_key.as_ref().map(|_| "[REDACTED]"))
            .field("polygon_base_url", &self.polygon_base_url)
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("latest_policy", &self.latest_policy)
            .field("cron", &self.cron)
            .field("cycle_timeout_secs", &self.cycle_timeout_secs)
            .field("run_on_start", &self.run_on_start)
            .field("summary_limit", &self.summary_limit)
            .field("database", &self.database)
            .finish()
    }
}

impl AppConfig {
    /// Loads the optional file at `path`, then environment overrides.
    ///
    /// `.env` is not read here; load it first with
    /// [`shared_utils::env::load_dotenv`] so its variables take part.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(optional_env_var);
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML file; missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies environment-style overrides from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(POLYGON_API_KEY) {
            self.polygon_api_key = Some(key);
        }
        if let Some(url) = lookup(POLYGON_BASE_URL) {
            self.polygon_base_url = Some(url);
        }
        if let Some(url) = lookup(DATABASE_URL) {
            self.database_url = Some(url);
        }
        if let Some(cron) = lookup(INGEST_CRON) {
            self.cron = cron;
        }
    }

    /// Rejects values that would make the process misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason: &str| {
            Err(ConfigError::Invalid {
                field,
                reason: reason.to_string(),
            })
        };
        if self.cron.split_whitespace().count() != 6 {
            return invalid("cron", "expected six fields: sec min hour day-of-month month day-of-week");
        }
        if self.cycle_timeout_secs == 0 {
            return invalid("cycle_timeout_secs", "must be positive");
        }
        if self.summary_limit == 0 {
            return invalid("summary_limit", "must be positive");
        }
        if self.database.max_connections == 0 {
            return invalid("database.max_connections", "must be positive");
        }
        if self.database.read_timeout_secs == 0 || self.database.write_timeout_secs == 0 {
            return invalid("database", "read and write timeouts must be positive");
        }
        Ok(())
    }

    /// The API key, wrapped so it never shows up in logs.
    pub fn api_key(&self) -> Option<SecretString> {
        self.polygon_api_key
            .as_deref()
            .map(|key| SecretString::new(key.into()))
    }

    /// Fetch deadline for each cycle.
    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_secs(self.cycle_timeout_secs)
    }

    /// Options for [`snapshot_store::open_store`].
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            database_url: self.database_url.clone(),
            policy: self.latest_policy,
            pool: self.database.pool_settings(),
            timeouts: self.database.timeouts(),
        }
    }
}
