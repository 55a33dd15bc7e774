use crate::core::{Result, TargetId};

/// Bookkeeping table holding one row per migration target.
pub const TARGETS_TABLE: &str = "migrate_targets";

/// Bookkeeping table holding one row per (target, applied patch name).
pub const APPLIED_PATCHES_TABLE: &str = "migrate_applied_patches";

/// Persistence backing for migration bookkeeping - allows pluggable backends.
///
/// All calls are expected to run inside one ambient transaction owned by the
/// caller. Implementations must not commit on their own.
pub trait MigrationStore {
    /// Whether an ambient transaction is currently open.
    fn in_transaction(&self) -> bool;

    /// Check if an arbitrary table currently exists
    fn table_exists(&self, name: &str) -> Result<bool>;

    /// Both bookkeeping tables exist.
    fn storage_exists(&self) -> Result<bool> {
        Ok(self.table_exists(TARGETS_TABLE)? && self.table_exists(APPLIED_PATCHES_TABLE)?)
    }

    /// Creates the bookkeeping tables unless they already exist.
    fn ensure_storage(&self) -> Result<()>;

    /// Drops the bookkeeping tables if no target uses them anymore.
    /// Returns whether the tables were dropped.
    fn drop_storage_if_unused(&self) -> Result<bool>;

    fn find_target(&self, name: &str) -> Result<Option<TargetId>>;

    fn create_target(&self, name: &str) -> Result<TargetId>;

    /// Deletes a target together with all of its applied-patch records.
    fn delete_target(&self, target: TargetId) -> Result<()>;

    fn target_names(&self) -> Result<Vec<String>>;

    /// Names of the patches recorded as applied, sorted by name.
    fn applied_patch_names(&self, target: TargetId) -> Result<Vec<String>>;

    fn insert_applied(&self, target: TargetId, patch_name: &str) -> Result<()>;

    fn delete_applied(&self, target: TargetId, patch_name: &str) -> Result<()>;
}

/// Executes opaque schema-change scripts against the live schema.
pub trait ScriptExecutor {
    /// Runs `script` inside the ambient transaction.
    ///
    /// A script rejected by the backend must be reported as
    /// [`MigrateError::Execution`](crate::core::MigrateError::Execution);
    /// every other error kind is treated as an infrastructure failure.
    fn execute_script(&self, script: &str) -> Result<()>;
}
