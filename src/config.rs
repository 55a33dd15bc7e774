use crate::core::{MigrateError, Result};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PATCH_DIR: &str = "sql_patches";
pub const MEMORY_URL: &str = "sqlite::memory:";

/// Migration configuration
///
/// Can be built in code, parsed from a database URL or read from a JSON file.
/// Missing JSON fields take their default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrateConfig {
    /// `sqlite::memory:`, `sqlite://<path>` or a plain file path
    pub database_url: String,

    /// Directory holding the primary patch catalog
    pub patch_dir: PathBuf,

    /// Additional catalogs, later ones override patches of earlier ones
    pub override_dirs: Vec<PathBuf>,

    /// Migration target name, defaults to the catalog's `repo_name`
    pub target: Option<String>,

    /// Roll back all changes instead of committing
    pub simulate: bool,

    /// How long to wait for another writer holding the database lock
    pub busy_timeout_ms: u64,
}

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    Memory,
    File(PathBuf),
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            database_url: MEMORY_URL.to_string(),
            patch_dir: PathBuf::from(DEFAULT_PATCH_DIR),
            override_dirs: Vec::new(),
            target: None,
            simulate: false,
            busy_timeout_ms: 5_000,
        }
    }
}

impl MigrateConfig {
    pub fn new(database_url: &str) -> Self {
        Self {
            database_url: database_url.to_string(),
            ..Self::default()
        }
    }

    /// Parse and validate a database URL
    ///
    /// # Examples
    ///
    /// ```
    /// # use dbmigrate::MigrateConfig;
    /// let config = MigrateConfig::from_url("sqlite://var/shop.db").unwrap();
    /// assert_eq!(config.database_url, "sqlite://var/shop.db");
    /// assert!(MigrateConfig::from_url("postgres://localhost/shop").is_err());
    /// ```
    pub fn from_url(url: &str) -> Result<Self> {
        let config = Self::new(url);
        config.location()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            MigrateError::Config(format!("invalid config file '{}': {}", path.display(), e))
        })?;
        config.location()?;
        Ok(config)
    }

    /// Set the database URL
    pub fn database_url(mut self, url: &str) -> Self {
        self.database_url = url.to_string();
        self
    }

    /// Set the primary patch directory
    pub fn patch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.patch_dir = dir.into();
        self
    }

    /// Add an overriding patch directory
    pub fn override_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.override_dirs.push(dir.into());
        self
    }

    /// Set the migration target name
    pub fn target(mut self, target: &str) -> Self {
        self.target = Some(target.to_string());
        self
    }

    pub fn simulate(mut self, simulate: bool) -> Self {
        self.simulate = simulate;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn busy_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn location(&self) -> Result<DatabaseLocation> {
        let url = self.database_url.trim();
        if url == MEMORY_URL || url == ":memory:" {
            return Ok(DatabaseLocation::Memory);
        }

        let path = match url.strip_prefix("sqlite://") {
            Some(path) => path,
            None if url.contains("://") => {
                return Err(MigrateError::Config(format!(
                    "unsupported database URL '{}', expected 'sqlite://<path>'",
                    url
                )));
            }
            None => url,
        };

        if path.is_empty() {
            return Err(MigrateError::Config(format!("database URL '{}' has no path", url)));
        }
        Ok(DatabaseLocation::File(PathBuf::from(path)))
    }

    /// Opens a connection with the configured busy timeout.
    pub fn connect(&self) -> Result<Connection> {
        let conn = match self.location()? {
            DatabaseLocation::Memory => Connection::open_in_memory()?,
            DatabaseLocation::File(path) => Connection::open(path)?,
        };
        conn.busy_timeout(self.busy_timeout_duration())?;
        Ok(conn)
    }
}
