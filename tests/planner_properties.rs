//! Property tests for upgrade and downgrade plans over random dependency graphs

use dbmigrate::{
    Patch, PatchCatalog, PatchRef, generate_downgrade_plan, generate_upgrade_plan, minimal_deps,
};
use proptest::prelude::*;
use std::collections::HashSet;

/// Dependency lists where patch `i` only depends on patches `< i`.
fn dag() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1usize..12).prop_flat_map(|n| {
        (0..n)
            .map(|i| proptest::sample::subsequence((0..i).collect::<Vec<_>>(), 0..=i))
            .collect::<Vec<_>>()
    })
}

fn build_catalog(graph: &[Vec<usize>]) -> PatchCatalog {
    let mut catalog = PatchCatalog::new().with_name("prop");
    // add in reverse so arena order differs from dependency order
    for (i, deps) in graph.iter().enumerate().rev() {
        let mut patch = Patch::new(format!("p{i}"));
        for dep in deps {
            patch = patch.depends_on(format!("p{dep}"));
        }
        catalog.add_patch(patch);
    }
    catalog.resolve().unwrap();
    catalog
}

fn patch_ref(catalog: &PatchCatalog, index: usize) -> PatchRef {
    catalog.reference(&format!("p{index}"))
}

fn select(catalog: &PatchCatalog, n: usize, mask: u16) -> Vec<PatchRef> {
    (0..n)
        .filter(|i| mask & (1 << i) != 0)
        .map(|i| patch_ref(catalog, i))
        .collect()
}

/// Subset chosen by `mask`, closed under dependencies.
fn applied_closure(graph: &[Vec<usize>], catalog: &PatchCatalog, mask: u16) -> Vec<PatchRef> {
    let mut chosen: Vec<bool> = (0..graph.len()).map(|i| mask & (1 << i) != 0).collect();
    for i in (0..graph.len()).rev() {
        if chosen[i] {
            for &dep in &graph[i] {
                chosen[dep] = true;
            }
        }
    }
    (0..graph.len())
        .filter(|&i| chosen[i])
        .map(|i| patch_ref(catalog, i))
        .collect()
}

fn deps(catalog: &PatchCatalog, patch: &PatchRef) -> Vec<PatchRef> {
    catalog
        .dependencies_of(patch)
        .iter()
        .map(|id| PatchRef::from(*id))
        .collect()
}

fn closure(catalog: &PatchCatalog, patches: &[PatchRef]) -> HashSet<PatchRef> {
    generate_upgrade_plan(catalog, &[], patches)
        .unwrap()
        .into_iter()
        .collect()
}

proptest! {
    #[test]
    fn upgrade_plan_orders_dependencies_first(
        graph in dag(),
        applied_mask in any::<u16>(),
        desired_mask in any::<u16>(),
    ) {
        let catalog = build_catalog(&graph);
        let applied = applied_closure(&graph, &catalog, applied_mask);
        let desired = select(&catalog, graph.len(), desired_mask);

        let plan = generate_upgrade_plan(&catalog, &applied, &desired).unwrap();

        let mut installed: HashSet<PatchRef> = applied.iter().cloned().collect();
        for patch in &plan {
            prop_assert!(!installed.contains(patch), "{:?} planned twice or already applied", patch);
            for dep in deps(&catalog, patch) {
                prop_assert!(installed.contains(&dep), "{:?} planned before its dependency", patch);
            }
            installed.insert(patch.clone());
        }
        for patch in &desired {
            prop_assert!(installed.contains(patch));
        }

        let after: Vec<PatchRef> = installed.into_iter().collect();
        let again = generate_upgrade_plan(&catalog, &after, &desired).unwrap();
        prop_assert!(again.is_empty());
    }

    #[test]
    fn downgrade_plan_removes_dependents_first(
        graph in dag(),
        applied_mask in any::<u16>(),
        remove_mask in any::<u16>(),
    ) {
        let catalog = build_catalog(&graph);
        let applied = applied_closure(&graph, &catalog, applied_mask);
        let to_remove = select(&catalog, graph.len(), remove_mask);

        let plan = generate_downgrade_plan(&catalog, &applied, &to_remove).unwrap();

        let mut remaining: HashSet<PatchRef> = applied.iter().cloned().collect();
        for patch in &plan {
            prop_assert!(remaining.remove(patch), "{:?} not applied or removed twice", patch);
            for other in &remaining {
                prop_assert!(
                    !deps(&catalog, other).contains(patch),
                    "{:?} removed while {:?} still depends on it", patch, other
                );
            }
        }
        for patch in &to_remove {
            prop_assert!(!remaining.contains(patch));
        }
        for patch in &remaining {
            for dep in deps(&catalog, patch) {
                prop_assert!(remaining.contains(&dep));
            }
        }
    }

    #[test]
    fn upgrade_then_downgrade_restores_applied_set(
        graph in dag(),
        applied_mask in any::<u16>(),
        desired_mask in any::<u16>(),
    ) {
        let catalog = build_catalog(&graph);
        let applied = applied_closure(&graph, &catalog, applied_mask);
        let desired = select(&catalog, graph.len(), desired_mask);

        let upgrade = generate_upgrade_plan(&catalog, &applied, &desired).unwrap();
        let mut after: Vec<PatchRef> = applied.clone();
        after.extend(upgrade.iter().cloned());

        let downgrade = generate_downgrade_plan(&catalog, &after, &upgrade).unwrap();
        let removed: HashSet<PatchRef> = downgrade.into_iter().collect();
        let planned: HashSet<PatchRef> = upgrade.into_iter().collect();
        prop_assert_eq!(removed, planned);
    }

    #[test]
    fn minimal_deps_preserves_closure(
        graph in dag(),
        selected_mask in any::<u16>(),
    ) {
        let catalog = build_catalog(&graph);
        let selected = select(&catalog, graph.len(), selected_mask);

        let minimal = minimal_deps(&catalog, &selected).unwrap();

        prop_assert_eq!(closure(&catalog, &minimal), closure(&catalog, &selected));
        for patch in &minimal {
            prop_assert!(selected.contains(patch));
            for other in &minimal {
                if other != patch {
                    prop_assert!(
                        !closure(&catalog, std::slice::from_ref(patch)).contains(other),
                        "{:?} is implied by {:?}", other, patch
                    );
                }
            }
        }
    }
}
