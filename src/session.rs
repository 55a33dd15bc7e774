use crate::config::MigrateConfig;
use crate::core::{MigrateError, Result};
use crate::driver::Driver;
use crate::patch::{DirCatalogLoader, PatchCatalog};
use crate::storage::SqliteStore;
use rusqlite::{Connection, TransactionBehavior};
use tracing::{info, warn};

/// One migration invocation: a connection, a resolved catalog and the
/// target they drive.
///
/// [`run`](Self::run) wraps the whole read-state, compute-plan, apply-plan
/// sequence in a single `IMMEDIATE` transaction. SQLite grants that lock to
/// one writer at a time, so two sessions migrating the same database are
/// serialized; the second waits up to the busy timeout and then fails.
pub struct MigrationSession {
    conn: Connection,
    catalog: PatchCatalog,
    target: String,
    simulate: bool,
}

impl MigrationSession {
    pub fn new(conn: Connection, catalog: PatchCatalog, target: impl Into<String>) -> Result<Self> {
        catalog.ensure_resolved()?;
        Ok(Self {
            conn,
            catalog,
            target: target.into(),
            simulate: false,
        })
    }

    /// Loads the catalogs named by `config` and connects to its database.
    pub fn open(config: &MigrateConfig) -> Result<Self> {
        let catalog =
            DirCatalogLoader::default().load_catalogs(&config.patch_dir, &config.override_dirs)?;
        let target = match (&config.target, catalog.name()) {
            (Some(target), _) => target.clone(),
            (None, Some(name)) => name.to_string(),
            (None, None) => {
                return Err(MigrateError::Config("no migration target name configured".to_string()));
            }
        };

        let conn = config.connect()?;
        Ok(Self::new(conn, catalog, target)?.with_simulate(config.simulate))
    }

    /// Roll back instead of committing at the end of [`run`](Self::run).
    pub fn with_simulate(mut self, simulate: bool) -> Self {
        self.simulate = simulate;
        self
    }

    pub fn catalog(&self) -> &PatchCatalog {
        &self.catalog
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn is_simulation(&self) -> bool {
        self.simulate
    }

    /// Runs `f` with a driver inside one write-locked transaction.
    ///
    /// Commits when `f` succeeds, rolls back when it fails or when the
    /// session simulates. Partial plans never survive an error.
    pub fn run<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&Driver<'_, SqliteStore<'_>>) -> Result<T>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let outcome = {
            let driver = Driver::new(SqliteStore::new(&tx), &self.catalog, self.target.as_str())?;
            f(&driver)
        };

        match outcome {
            Ok(value) if self.simulate => {
                tx.rollback()?;
                info!("simulation option set, rolled back all changes");
                Ok(value)
            }
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                warn!(error = %err, "rolling back all changes to the database");
                if let Err(rollback_err) = tx.rollback() {
                    warn!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }
}
