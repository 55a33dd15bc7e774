use super::model::{Patch, PatchId, PatchRef};
use crate::core::{MigrateError, Result};
use std::collections::HashMap;

/// All patches that could potentially be applied to a migration target.
///
/// Patches live in an arena and refer to each other by [`PatchId`]. Names are
/// unique: adding a patch whose name is already present replaces the earlier
/// definition in place (last write wins).
///
/// The catalog must be [`resolve`](Self::resolve)d before it is used for
/// planning. Any modification afterwards marks it unresolved again.
#[derive(Debug, Clone, Default)]
pub struct PatchCatalog {
    name: Option<String>,
    patches: Vec<Patch>,
    index: HashMap<String, PatchId>,
    resolved: bool,
}

impl PatchCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Name of the catalog, used as default migration target name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn add_patch(&mut self, mut patch: Patch) -> PatchId {
        patch.resolved.clear();
        patch.missing_optional.clear();
        self.resolved = false;

        if let Some(&id) = self.index.get(patch.name()) {
            self.patches[id.0] = patch;
            return id;
        }

        let id = PatchId(self.patches.len());
        self.index.insert(patch.name().to_string(), id);
        self.patches.push(patch);
        id
    }

    pub fn add_patches(&mut self, patches: impl IntoIterator<Item = Patch>) {
        for patch in patches {
            self.add_patch(patch);
        }
    }

    /// Merges `other` into this catalog; patches from `other` override
    /// definitions with the same name. The catalog name is kept.
    pub fn merge(&mut self, other: PatchCatalog) {
        self.add_patches(other.patches);
        if self.name.is_none() {
            self.name = other.name;
        }
    }

    /// Turns every patch's dependency names into patch references.
    ///
    /// Missing required dependencies fail with
    /// [`MigrateError::DependencyNotFound`]; missing optional ones are only
    /// remembered on the patch. Afterwards the dependency graph is checked for
    /// cycles, which fail with [`MigrateError::CyclicDependency`].
    pub fn resolve(&mut self) -> Result<()> {
        self.resolved = false;

        let mut resolution = Vec::with_capacity(self.patches.len());
        for patch in &self.patches {
            let mut resolved = Vec::new();
            let mut missing = Vec::new();
            for dependency in patch.dependencies() {
                match self.index.get(&dependency.name) {
                    Some(id) => {
                        if !resolved.contains(id) {
                            resolved.push(*id);
                        }
                    }
                    None if dependency.optional => missing.push(dependency.name.clone()),
                    None => {
                        return Err(MigrateError::DependencyNotFound {
                            patch: patch.name().to_string(),
                            dependency: dependency.name.clone(),
                        });
                    }
                }
            }
            resolution.push((resolved, missing));
        }

        for (patch, (resolved, missing)) in self.patches.iter_mut().zip(resolution) {
            patch.resolved = resolved;
            patch.missing_optional = missing;
        }

        self.check_acyclic()?;
        self.resolved = true;
        Ok(())
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    pub(crate) fn ensure_resolved(&self) -> Result<()> {
        if self.resolved {
            Ok(())
        } else {
            Err(MigrateError::CatalogUnresolved)
        }
    }

    /// Depth-first walk over resolved edges; reports the first cycle found as
    /// the chain of names from the repeated patch back to itself.
    fn check_acyclic(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            OnPath,
            Done,
        }

        let mut marks = vec![Mark::Unvisited; self.patches.len()];
        for start in 0..self.patches.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }

            marks[start] = Mark::OnPath;
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
            while let Some(frame) = stack.last_mut() {
                let (node, next) = *frame;
                let Some(dependency) = self.patches[node].resolved.get(next) else {
                    marks[node] = Mark::Done;
                    stack.pop();
                    continue;
                };
                frame.1 += 1;

                let dependency = dependency.0;
                match marks[dependency] {
                    Mark::Unvisited => {
                        marks[dependency] = Mark::OnPath;
                        stack.push((dependency, 0));
                    }
                    Mark::OnPath => {
                        let from = stack
                            .iter()
                            .position(|(n, _)| *n == dependency)
                            .unwrap_or(0);
                        let mut cycle: Vec<String> = stack[from..]
                            .iter()
                            .map(|(n, _)| self.patches[*n].name().to_string())
                            .collect();
                        cycle.push(self.patches[dependency].name().to_string());
                        return Err(MigrateError::CyclicDependency(cycle));
                    }
                    Mark::Done => {}
                }
            }
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<PatchId> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn get(&self, id: PatchId) -> Option<&Patch> {
        self.patches.get(id.0)
    }

    /// Returns the patch for an id handed out by this catalog.
    ///
    /// # Panics
    ///
    /// Panics if `id` belongs to a different, larger catalog.
    pub fn patch(&self, id: PatchId) -> &Patch {
        &self.patches[id.0]
    }

    /// Looks up patches by name, preserving the order of `names`.
    pub fn lookup<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<PatchRef>> {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.find(name)
                    .map(PatchRef::Known)
                    .ok_or_else(|| MigrateError::PatchNotFound(name.to_string()))
            })
            .collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = PatchId> + '_ {
        (0..self.patches.len()).map(PatchId)
    }

    pub fn patches(&self) -> impl Iterator<Item = (PatchId, &Patch)> {
        self.patches
            .iter()
            .enumerate()
            .map(|(index, patch)| (PatchId(index), patch))
    }

    /// Every patch of the catalog as a plan reference.
    pub fn all(&self) -> Vec<PatchRef> {
        self.ids().map(PatchRef::Known).collect()
    }

    pub fn name_of<'a>(&'a self, patch: &'a PatchRef) -> &'a str {
        match patch {
            PatchRef::Known(id) => self.patch(*id).name(),
            PatchRef::Ghost(name) => name,
        }
    }

    /// Resolved dependencies of a reference; ghosts have none.
    pub fn dependencies_of(&self, patch: &PatchRef) -> &[PatchId] {
        match patch {
            PatchRef::Known(id) => self.patch(*id).resolved_dependencies(),
            PatchRef::Ghost(_) => &[],
        }
    }

    /// Turns a persisted patch name into a reference, falling back to a ghost.
    pub fn reference(&self, name: &str) -> PatchRef {
        self.find(name)
            .map(PatchRef::Known)
            .unwrap_or_else(|| PatchRef::Ghost(name.to_string()))
    }

    pub fn names(&self, patches: &[PatchRef]) -> Vec<String> {
        patches
            .iter()
            .map(|patch| self.name_of(patch).to_string())
            .collect()
    }
}
