pub mod catalog;
pub mod loader;
pub mod model;

pub use catalog::PatchCatalog;
pub use loader::{DirCatalogLoader, DirPatchLoader};
pub use model::{Dependency, Patch, PatchId, PatchRef};
