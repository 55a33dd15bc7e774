// ============================================================================
// Plan generation
// ============================================================================
//
// Pure functions over a resolved PatchCatalog. Both generators run a
// worklist: a patch that can't be placed yet pushes its blockers onto the
// worklist and goes back behind them.
//
// ============================================================================

pub mod minimal;
pub mod plan;

pub use minimal::minimal_deps;
pub use plan::{generate_downgrade_plan, generate_upgrade_plan};
