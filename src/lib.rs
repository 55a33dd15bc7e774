// ============================================================================
// dbmigrate Library
// ============================================================================

//! Dependency-aware SQL patch migrations.
//!
//! Patches declare which other patches they depend on. The planner turns a
//! request like "upgrade to `orders`" into an ordered plan against what is
//! already applied, and the [`Driver`] applies it inside the caller's
//! transaction.
//!
//! # Examples
//!
//! ```
//! use dbmigrate::{MigrationSession, Patch, PatchCatalog};
//! use rusqlite::Connection;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut catalog = PatchCatalog::new().with_name("shop");
//! catalog.add_patch(
//!     Patch::new("customers")
//!         .with_upgrade("CREATE TABLE customers (id INTEGER PRIMARY KEY);")
//!         .with_downgrade("DROP TABLE customers;"),
//! );
//! catalog.add_patch(
//!     Patch::new("orders")
//!         .depends_on("customers")
//!         .with_upgrade("CREATE TABLE orders (customer_id INTEGER REFERENCES customers(id));")
//!         .with_downgrade("DROP TABLE orders;"),
//! );
//! catalog.resolve()?;
//!
//! let mut session = MigrationSession::new(Connection::open_in_memory()?, catalog, "shop")?;
//! let plan = session.run(|driver| {
//!     driver.init(None)?;
//!     let orders = driver.catalog().lookup(&["orders"])?;
//!     driver.upgrade(&orders, true)
//! })?;
//!
//! assert_eq!(session.catalog().names(&plan), vec!["customers", "orders"]);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod driver;
pub mod logging;
pub mod patch;
pub mod planner;
pub mod session;
pub mod storage;

// Re-export main types for convenience
pub use config::{DatabaseLocation, MigrateConfig};
pub use core::{Direction, MigrateError, Result, TargetId};
pub use driver::Driver;
pub use patch::{
    Dependency, DirCatalogLoader, DirPatchLoader, Patch, PatchCatalog, PatchId, PatchRef,
};
pub use planner::{generate_downgrade_plan, generate_upgrade_plan, minimal_deps};
pub use session::MigrationSession;
pub use storage::{MigrationStore, ScriptExecutor, SqliteStore};
