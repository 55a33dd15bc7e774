use super::types::Direction;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("Patch '{patch}': could not find depended on patch '{dependency}'")]
    DependencyNotFound { patch: String, dependency: String },

    #[error("Patch '{0}' not found")]
    PatchNotFound(String),

    #[error("Cyclic patch dependency: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    #[error("Patch catalog has not been resolved")]
    CatalogUnresolved,

    #[error("Migration target '{0}' already exists")]
    TargetAlreadyExists(String),

    #[error("Migration target '{0}' does not exist")]
    TargetNotFound(String),

    #[error("Patch {direction} failed '{patch}'")]
    PatchApplicationFailed {
        patch: String,
        direction: Direction,
        details: Vec<String>,
    },

    /// Raised by a script executor when the backend rejects a script.
    #[error("Script execution error: {0}")]
    Execution(String),

    #[error("Migration target '{target}' misses the patches {}", .missing.join(", "))]
    MissingPatches { target: String, missing: Vec<String> },

    #[error("'{0}' requires an open transaction")]
    NoTransaction(&'static str),

    #[error("Invalid patch: {0}")]
    InvalidPatch(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MigrateError>;

impl MigrateError {
    /// Wraps a backend execution failure for the given patch.
    ///
    /// The backend message is trimmed and split into lines so that callers can
    /// report multi-line diagnostics one line at a time.
    pub fn patch_failed(patch: impl Into<String>, direction: Direction, message: &str) -> Self {
        Self::PatchApplicationFailed {
            patch: patch.into(),
            direction,
            details: message.trim().lines().map(str::to_string).collect(),
        }
    }

    /// Detail lines of a failed patch, empty for every other error kind.
    pub fn details(&self) -> &[String] {
        match self {
            Self::PatchApplicationFailed { details, .. } => details,
            _ => &[],
        }
    }
}
