use crate::core::Result;
use crate::patch::{PatchCatalog, PatchRef};
use std::collections::{HashSet, VecDeque};

/// Returns the ordered list of patches to install so that every patch in
/// `desired` ends up applied, dependencies included.
///
/// Dependencies always precede their dependents in the result. The relative
/// order of unrelated patches follows worklist order and is not part of the
/// contract.
pub fn generate_upgrade_plan(
    catalog: &PatchCatalog,
    applied: &[PatchRef],
    desired: &[PatchRef],
) -> Result<Vec<PatchRef>> {
    catalog.ensure_resolved()?;

    // Applied patches plus everything already placed in the plan
    let mut installed: HashSet<PatchRef> = applied.iter().cloned().collect();
    let mut queued = HashSet::new();
    let mut worklist = VecDeque::new();
    for patch in desired {
        if !installed.contains(patch) && queued.insert(patch.clone()) {
            worklist.push_back(patch.clone());
        }
    }

    let mut plan = Vec::new();
    while let Some(patch) = worklist.pop_front() {
        let unmet: Vec<PatchRef> = catalog
            .dependencies_of(&patch)
            .iter()
            .map(|id| PatchRef::Known(*id))
            .filter(|dependency| !installed.contains(dependency))
            .collect();

        if unmet.is_empty() {
            installed.insert(patch.clone());
            plan.push(patch);
            continue;
        }

        // Unmet dependencies end up ahead of the patch in the worklist.
        for dependency in unmet {
            if queued.insert(dependency.clone()) {
                worklist.push_back(dependency);
            }
        }
        worklist.push_back(patch);
    }

    Ok(plan)
}

/// Returns the ordered list of patches to uninstall.
///
/// Patches in `to_remove` that are not applied are ignored. Applied patches
/// depending on a removed patch are removed too, always before the patch they
/// depend on, so an applied patch never loses a dependency.
pub fn generate_downgrade_plan(
    catalog: &PatchCatalog,
    applied: &[PatchRef],
    to_remove: &[PatchRef],
) -> Result<Vec<PatchRef>> {
    catalog.ensure_resolved()?;

    let applied_set: HashSet<&PatchRef> = applied.iter().collect();
    let mut removed: HashSet<PatchRef> = HashSet::new();
    let mut queued = HashSet::new();
    let mut worklist = VecDeque::new();
    for patch in to_remove {
        if applied_set.contains(patch) && queued.insert(patch.clone()) {
            worklist.push_back(patch.clone());
        }
    }

    let mut plan = Vec::new();
    while let Some(candidate) = worklist.pop_front() {
        let dependents: Vec<PatchRef> = match candidate.known() {
            Some(id) => applied
                .iter()
                .filter(|patch| !removed.contains(*patch))
                .filter(|patch| catalog.dependencies_of(patch).contains(&id))
                .cloned()
                .collect(),
            // nothing can depend on a ghost
            None => Vec::new(),
        };

        if dependents.is_empty() {
            removed.insert(candidate.clone());
            plan.push(candidate);
            continue;
        }

        for dependent in dependents {
            if queued.insert(dependent.clone()) {
                worklist.push_back(dependent);
            }
        }
        worklist.push_back(candidate);
    }

    Ok(plan)
}
