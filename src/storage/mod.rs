pub mod engine;
pub mod sqlite;

pub use engine::{APPLIED_PATCHES_TABLE, MigrationStore, ScriptExecutor, TARGETS_TABLE};
pub use sqlite::SqliteStore;
