//! Service configuration.
//!
//! # Responsibility
//! - Describe database, logging, pagination and RPC settings.
//! - Load settings from JSON with defaults for every omitted key.
//!
//! # Invariants
//! - `validate()` must pass before a config is used to open resources.
//! - `default_page_size <= max_page_size`, both positive.

use crate::db::{Database, DbResult};
use crate::logging::default_log_level;
use crate::model::car::CarListQuery;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Duration;

/// Marker path selecting a private in-memory database.
pub const IN_MEMORY_DB_PATH: &str = ":memory:";

const DEFAULT_DB_FILE_NAME: &str = "car_service.sqlite3";
const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 100;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub database: DatabaseConfig,
    pub log: LogConfig,
    pub pagination: PaginationConfig,
    pub rpc: RpcConfig,
}

impl ServiceConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::Invalid("database.path cannot be empty".to_string()));
        }
        self.pagination.validate()?;
        if self.rpc.timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "rpc.timeout_ms must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file path, or `:memory:`.
    pub path: String,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_DB_FILE_NAME.to_string(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Opens and migrates the configured database.
    pub fn open(&self) -> DbResult<Database> {
        if self.path == IN_MEMORY_DB_PATH {
            return Database::open_in_memory();
        }
        Database::open_with_busy_timeout(&self.path, self.busy_timeout())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    /// Absolute directory for rolling log files; logging stays off when unset.
    pub dir: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl PaginationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_page_size == 0 || self.max_page_size == 0 {
            return Err(ConfigError::Invalid(
                "page sizes must be positive".to_string(),
            ));
        }
        if self.default_page_size > self.max_page_size {
            return Err(ConfigError::Invalid(format!(
                "default_page_size {} exceeds max_page_size {}",
                self.default_page_size, self.max_page_size
            )));
        }
        Ok(())
    }

    /// Turns raw caller input into a valid list query.
    ///
    /// - `page <= 0` becomes 1.
    /// - `page_size <= 0` becomes the default size.
    /// - `page_size` above the maximum is capped.
    pub fn clamp(&self, page: i64, page_size: i64, model: Option<String>) -> CarListQuery {
        let page = u32::try_from(page.max(1)).unwrap_or(u32::MAX);
        let page_size = if page_size <= 0 {
            self.default_page_size
        } else {
            u32::try_from(page_size)
                .unwrap_or(u32::MAX)
                .min(self.max_page_size)
        };
        CarListQuery {
            page,
            page_size,
            model,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Per-call deadline applied to every inbound call.
    pub timeout_ms: Option<u64>,
}

impl RpcConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}
