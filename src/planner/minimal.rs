use super::plan::generate_upgrade_plan;
use crate::core::Result;
use crate::patch::{PatchCatalog, PatchRef};
use std::collections::HashSet;

/// Returns the smallest subset of `patches` whose upgrade closure equals the
/// closure of `patches`.
///
/// A patch is dropped when it is part of the dependency closure of another
/// requested patch. This compares every pair and is meant for the handful of
/// patches a caller names, not for whole catalogs. Input order is kept.
pub fn minimal_deps(catalog: &PatchCatalog, patches: &[PatchRef]) -> Result<Vec<PatchRef>> {
    catalog.ensure_resolved()?;

    let mut requested: Vec<PatchRef> = Vec::with_capacity(patches.len());
    for patch in patches {
        if !requested.contains(patch) {
            requested.push(patch.clone());
        }
    }

    let mut implied = HashSet::new();
    for patch in &requested {
        let closure: HashSet<PatchRef> =
            generate_upgrade_plan(catalog, &[], std::slice::from_ref(patch))?
                .into_iter()
                .collect();
        for other in &requested {
            if other != patch && closure.contains(other) {
                implied.insert(other.clone());
            }
        }
    }

    Ok(requested
        .into_iter()
        .filter(|patch| !implied.contains(patch))
        .collect())
}

impl PatchCatalog {
    /// See [`minimal_deps`].
    pub fn minimal_deps(&self, patches: &[PatchRef]) -> Result<Vec<PatchRef>> {
        minimal_deps(self, patches)
    }
}
