use super::engine::{APPLIED_PATCHES_TABLE, MigrationStore, ScriptExecutor, TARGETS_TABLE};
use crate::core::{MigrateError, Result, TargetId};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

/// SQLite implementation of [`MigrationStore`] and [`ScriptExecutor`].
///
/// Borrows a connection; pass a `rusqlite::Transaction` (it derefs to a
/// connection) so every statement joins the caller's transaction.
#[derive(Clone, Copy)]
pub struct SqliteStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &'c Connection {
        self.conn
    }

    fn create_tables_sql() -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {targets} (
                target_id INTEGER PRIMARY KEY AUTOINCREMENT,
                target_name TEXT NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS {applied} (
                target_id INTEGER NOT NULL
                    REFERENCES {targets}(target_id) ON DELETE CASCADE,
                patch_name TEXT NOT NULL,
                PRIMARY KEY (target_id, patch_name)
            );",
            targets = TARGETS_TABLE,
            applied = APPLIED_PATCHES_TABLE,
        )
    }
}

impl MigrationStore for SqliteStore<'_> {
    fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    fn table_exists(&self, name: &str) -> Result<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1)",
            params![name],
            |row| row.get::<_, bool>(0),
        )?;
        Ok(exists)
    }

    fn ensure_storage(&self) -> Result<()> {
        self.conn.execute_batch(&Self::create_tables_sql())?;
        Ok(())
    }

    fn drop_storage_if_unused(&self) -> Result<bool> {
        if !self.table_exists(TARGETS_TABLE)? {
            return Ok(false);
        }

        let remaining: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", TARGETS_TABLE),
            [],
            |row| row.get(0),
        )?;
        if remaining > 0 {
            debug!(remaining, "bookkeeping tables still in use");
            return Ok(false);
        }

        self.conn.execute_batch(&format!(
            "DROP TABLE IF EXISTS {}; DROP TABLE IF EXISTS {};",
            APPLIED_PATCHES_TABLE, TARGETS_TABLE
        ))?;
        debug!("dropped bookkeeping tables");
        Ok(true)
    }

    fn find_target(&self, name: &str) -> Result<Option<TargetId>> {
        if !self.table_exists(TARGETS_TABLE)? {
            return Ok(None);
        }

        let id = self
            .conn
            .query_row(
                &format!("SELECT target_id FROM {} WHERE target_name = ?1", TARGETS_TABLE),
                params![name],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(id.map(TargetId))
    }

    fn create_target(&self, name: &str) -> Result<TargetId> {
        self.conn.execute(
            &format!("INSERT INTO {} (target_name) VALUES (?1)", TARGETS_TABLE),
            params![name],
        )?;
        Ok(TargetId(self.conn.last_insert_rowid()))
    }

    fn delete_target(&self, target: TargetId) -> Result<()> {
        // Foreign keys are off by default in SQLite, so don't rely on the cascade
        self.conn.execute(
            &format!("DELETE FROM {} WHERE target_id = ?1", APPLIED_PATCHES_TABLE),
            params![target.0],
        )?;
        let deleted = self.conn.execute(
            &format!("DELETE FROM {} WHERE target_id = ?1", TARGETS_TABLE),
            params![target.0],
        )?;
        if deleted == 0 {
            return Err(MigrateError::Storage(format!("no migration target with id {}", target)));
        }
        Ok(())
    }

    fn target_names(&self) -> Result<Vec<String>> {
        if !self.table_exists(TARGETS_TABLE)? {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(&format!(
            "SELECT target_name FROM {} ORDER BY target_name",
            TARGETS_TABLE
        ))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    fn applied_patch_names(&self, target: TargetId) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT patch_name FROM {} WHERE target_id = ?1 ORDER BY patch_name",
            APPLIED_PATCHES_TABLE
        ))?;
        let names = stmt
            .query_map(params![target.0], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    fn insert_applied(&self, target: TargetId, patch_name: &str) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO {} (target_id, patch_name) VALUES (?1, ?2)",
                APPLIED_PATCHES_TABLE
            ),
            params![target.0, patch_name],
        )?;
        Ok(())
    }

    fn delete_applied(&self, target: TargetId, patch_name: &str) -> Result<()> {
        let deleted = self.conn.execute(
            &format!(
                "DELETE FROM {} WHERE target_id = ?1 AND patch_name = ?2",
                APPLIED_PATCHES_TABLE
            ),
            params![target.0, patch_name],
        )?;
        if deleted == 0 {
            return Err(MigrateError::Storage(format!(
                "patch '{}' is not recorded as applied to target {}",
                patch_name, target
            )));
        }
        Ok(())
    }
}

impl ScriptExecutor for SqliteStore<'_> {
    fn execute_script(&self, script: &str) -> Result<()> {
        // Anything the engine rejected is a script failure; the rest are
        // client-side errors.
        self.conn.execute_batch(script).map_err(|err| match err {
            rusqlite::Error::SqliteFailure(_, Some(message)) => MigrateError::Execution(message),
            rusqlite::Error::SqlInputError { msg, .. } => MigrateError::Execution(msg),
            other if other.sqlite_error_code().is_some() => {
                MigrateError::Execution(other.to_string())
            }
            other => MigrateError::Sqlite(other),
        })
    }
}
