use super::Driver;
use crate::core::{Direction, MigrateError, Result};
use crate::patch::PatchRef;
use crate::planner::{generate_downgrade_plan, generate_upgrade_plan};
use crate::storage::{MigrationStore, ScriptExecutor};
use tracing::{debug, error, info, warn};

impl<S: MigrationStore + ScriptExecutor> Driver<'_, S> {
    /// Applies `patches` and everything they depend on.
    ///
    /// Each step is recorded before its upgrade script runs. With
    /// `execute_scripts` off only the bookkeeping changes. Returns the plan.
    ///
    /// An unapplied [`PatchRef::Ghost`] is recorded without running anything,
    /// so ghosts reverted by [`renew`](Self::renew) come back.
    pub fn upgrade(&self, patches: &[PatchRef], execute_scripts: bool) -> Result<Vec<PatchRef>> {
        self.require_transaction("upgrade")?;

        let target = self.target_id()?;
        let applied = self.applied_for(target)?;
        let plan = generate_upgrade_plan(self.catalog, &applied, patches)?;
        debug!(
            target_name = %self.target,
            plan = ?self.catalog.names(&plan),
            "computed upgrade plan"
        );

        for patch in &plan {
            let name = self.catalog.name_of(patch);
            info!(target_name = %self.target, patch = name, "applying patch");
            self.store.insert_applied(target, name)?;
            self.run_script(patch, Direction::Upgrade, execute_scripts)?;
        }

        Ok(plan)
    }

    /// Applies every patch of the catalog that is still missing.
    pub fn upgrade_all(&self, execute_scripts: bool) -> Result<Vec<PatchRef>> {
        self.upgrade(&self.catalog.all(), execute_scripts)
    }

    /// Reverts `patches` and every applied patch depending on them.
    ///
    /// Dependents are reverted first. Each step's record is deleted before its
    /// downgrade script runs. Returns the plan.
    pub fn downgrade(&self, patches: &[PatchRef], execute_scripts: bool) -> Result<Vec<PatchRef>> {
        self.require_transaction("downgrade")?;

        let target = self.target_id()?;
        let applied = self.applied_for(target)?;
        let plan = generate_downgrade_plan(self.catalog, &applied, patches)?;
        debug!(
            target_name = %self.target,
            plan = ?self.catalog.names(&plan),
            "computed downgrade plan"
        );

        for patch in &plan {
            let name = self.catalog.name_of(patch);
            info!(target_name = %self.target, patch = name, "removing patch");
            self.store.delete_applied(target, name)?;
            self.run_script(patch, Direction::Downgrade, execute_scripts)?;
        }

        Ok(plan)
    }

    /// Reverts every applied patch, ghosts included.
    pub fn downgrade_all(&self, execute_scripts: bool) -> Result<Vec<PatchRef>> {
        let applied = self.applied_patches()?;
        self.downgrade(&applied, execute_scripts)
    }

    /// Reverts `patches` and re-applies everything that was reverted,
    /// including dependents the downgrade pulled in.
    pub fn renew(&self, patches: &[PatchRef]) -> Result<Vec<PatchRef>> {
        let reverted = self.downgrade(patches, true)?;
        self.upgrade(&reverted, true)
    }

    /// Applies and reverts a plan twice in a row.
    ///
    /// A downgrade script that doesn't fully undo its upgrade usually makes
    /// the second application fail. `None` tests the whole catalog.
    pub fn test_upgrade(&self, patches: Option<&[PatchRef]>) -> Result<()> {
        for round in 1..=2 {
            let plan = match patches {
                Some(patches) => self.upgrade(patches, true)?,
                None => self.upgrade_all(true)?,
            };
            self.downgrade(&plan, true)?;
            debug!(round, patches = plan.len(), "upgrade/downgrade round passed");
        }
        Ok(())
    }

    fn run_script(&self, patch: &PatchRef, direction: Direction, execute_scripts: bool) -> Result<()> {
        // ghosts carry no scripts
        let PatchRef::Known(id) = patch else {
            return Ok(());
        };
        let definition = self.catalog.patch(*id);
        let Some(script) = definition.script(direction) else {
            return Ok(());
        };
        if !execute_scripts {
            return Ok(());
        }

        for missing in definition.missing_optional() {
            warn!(
                patch = definition.name(),
                missing = missing.as_str(),
                "ignoring optional missing patch"
            );
        }

        self.store.execute_script(script).map_err(|err| match err {
            MigrateError::Execution(message) => {
                error!(
                    target_name = %self.target,
                    patch = definition.name(),
                    %direction,
                    "patch script failed"
                );
                MigrateError::patch_failed(definition.name(), direction, &message)
            }
            other => other,
        })
    }
}
