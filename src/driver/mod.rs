// ============================================================================
// Migration Driver
// ============================================================================
//
// Drives the upgrade and downgrade of one migration target. The Driver reads
// the applied state from the store, asks the planner for an ordered plan and
// walks it, writing bookkeeping before running each script.
//
// The Driver never commits. Everything it does joins the caller's
// transaction; on any error the caller rolls back the whole plan.
//
// ============================================================================

mod apply;

use crate::core::{MigrateError, Result, TargetId};
use crate::patch::{PatchCatalog, PatchRef};
use crate::storage::{MigrationStore, ScriptExecutor};
use std::collections::HashSet;
use tracing::{debug, info};

pub struct Driver<'a, S> {
    store: S,
    catalog: &'a PatchCatalog,
    target: String,
}

impl<'a, S: MigrationStore + ScriptExecutor> Driver<'a, S> {
    /// Creates a driver for the migration target `target`.
    ///
    /// The catalog has to be resolved.
    pub fn new(store: S, catalog: &'a PatchCatalog, target: impl Into<String>) -> Result<Self> {
        catalog.ensure_resolved()?;

        let target = target.into();
        if target.trim().is_empty() {
            return Err(MigrateError::Config(
                "migration target name must not be empty".to_string(),
            ));
        }

        Ok(Self {
            store,
            catalog,
            target,
        })
    }

    /// Creates a driver whose target is named after the catalog.
    pub fn for_catalog(store: S, catalog: &'a PatchCatalog) -> Result<Self> {
        let name = catalog.name().ok_or_else(|| {
            MigrateError::Config("patch catalog has no name to use as migration target".to_string())
        })?;
        Self::new(store, catalog, name)
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn catalog(&self) -> &'a PatchCatalog {
        self.catalog
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn require_transaction(&self, operation: &'static str) -> Result<()> {
        if self.store.in_transaction() {
            Ok(())
        } else {
            Err(MigrateError::NoTransaction(operation))
        }
    }

    fn target_id(&self) -> Result<TargetId> {
        self.store
            .find_target(&self.target)?
            .ok_or_else(|| MigrateError::TargetNotFound(self.target.clone()))
    }

    pub fn is_initialized(&self) -> Result<bool> {
        Ok(self.store.find_target(&self.target)?.is_some())
    }

    /// Registers the migration target.
    ///
    /// Patches in `baseline` are recorded as applied without running their
    /// scripts, for schemas that already match a known state.
    pub fn init(&self, baseline: Option<&[PatchRef]>) -> Result<()> {
        self.require_transaction("init")?;

        if self.store.find_target(&self.target)?.is_some() {
            return Err(MigrateError::TargetAlreadyExists(self.target.clone()));
        }

        self.store.ensure_storage()?;
        let target = self.store.create_target(&self.target)?;

        let mut recorded = HashSet::new();
        for patch in baseline.unwrap_or_default() {
            let name = self.catalog.name_of(patch);
            if recorded.insert(name) {
                self.store.insert_applied(target, name)?;
            }
        }

        info!(
            target_name = %self.target,
            id = %target,
            baseline = recorded.len(),
            "initialised migration target"
        );
        Ok(())
    }

    /// Removes the migration target and its records. The bookkeeping tables
    /// go away together with the last target.
    pub fn uninit(&self) -> Result<()> {
        self.require_transaction("uninit")?;

        let target = self.target_id()?;
        self.store.delete_target(target)?;
        let dropped = self.store.drop_storage_if_unused()?;

        info!(target_name = %self.target, "removed migration target");
        if dropped {
            debug!("no migration targets left, bookkeeping tables dropped");
        }
        Ok(())
    }

    /// Patches recorded as applied, sorted by name. Names missing from the
    /// catalog come back as ghosts.
    pub fn applied_patches(&self) -> Result<Vec<PatchRef>> {
        let target = self.target_id()?;
        self.applied_for(target)
    }

    fn applied_for(&self, target: TargetId) -> Result<Vec<PatchRef>> {
        Ok(self
            .store
            .applied_patch_names(target)?
            .iter()
            .map(|name| self.catalog.reference(name))
            .collect())
    }

    /// Catalog patches that are not applied, in catalog order.
    pub fn unapplied_patches(&self) -> Result<Vec<PatchRef>> {
        let applied: HashSet<PatchRef> = self.applied_patches()?.into_iter().collect();
        Ok(self
            .catalog
            .all()
            .into_iter()
            .filter(|patch| !applied.contains(patch))
            .collect())
    }

    pub fn is_applied(&self, patch_name: &str) -> Result<bool> {
        let target = self.target_id()?;
        Ok(self
            .store
            .applied_patch_names(target)?
            .iter()
            .any(|name| name == patch_name))
    }

    /// Fails with [`MigrateError::MissingPatches`] unless every named patch is
    /// applied.
    pub fn require_applied<N: AsRef<str>>(&self, patch_names: &[N]) -> Result<()> {
        let target = self.target_id()?;
        let applied: HashSet<String> = self.store.applied_patch_names(target)?.into_iter().collect();

        let missing: Vec<String> = patch_names
            .iter()
            .map(|name| name.as_ref())
            .filter(|name| !applied.contains(*name))
            .map(str::to_string)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(MigrateError::MissingPatches {
                target: self.target.clone(),
                missing,
            })
        }
    }

    /// Minimal subset of `patches` that still pulls in all of them.
    pub fn calculate_minimal_deps(&self, patches: &[PatchRef]) -> Result<Vec<PatchRef>> {
        self.catalog.minimal_deps(patches)
    }
}
