use crate::core::Direction;
use std::fmt;
use std::path::{Path, PathBuf};

/// Index of a patch inside its [`PatchCatalog`](super::PatchCatalog) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatchId(pub(crate) usize);

impl PatchId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A named dependency reference as written in a patch definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    pub name: String,
    /// Optional references may point at patches that don't exist.
    pub optional: bool,
}

impl Dependency {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            optional: false,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            optional: true,
        }
    }
}

/// A single SQL patch.
///
/// A patch carries directives that move the schema forward (`upgrade_script`)
/// and possibly directives that revert that step (`downgrade_script`). It may
/// depend on other patches, which then have to be applied first. Dependencies
/// marked optional are allowed to be absent from the catalog; if they exist
/// they are treated like required ones.
#[derive(Debug, Clone)]
pub struct Patch {
    name: String,
    dependencies: Vec<Dependency>,
    upgrade_script: Option<String>,
    downgrade_script: Option<String>,
    origin: Option<PathBuf>,
    // Populated by `PatchCatalog::resolve`
    pub(crate) resolved: Vec<PatchId>,
    pub(crate) missing_optional: Vec<String>,
}

impl Patch {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            upgrade_script: None,
            downgrade_script: None,
            origin: None,
            resolved: Vec::new(),
            missing_optional: Vec::new(),
        }
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(Dependency::required(name));
        self
    }

    pub fn optionally_depends_on(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(Dependency::optional(name));
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<Dependency>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_upgrade(mut self, script: impl Into<String>) -> Self {
        self.upgrade_script = Some(script.into());
        self
    }

    pub fn with_downgrade(mut self, script: impl Into<String>) -> Self {
        self.downgrade_script = Some(script.into());
        self
    }

    pub fn with_origin(mut self, origin: impl Into<PathBuf>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn upgrade_script(&self) -> Option<&str> {
        self.upgrade_script.as_deref()
    }

    pub fn downgrade_script(&self) -> Option<&str> {
        self.downgrade_script.as_deref()
    }

    pub fn script(&self, direction: Direction) -> Option<&str> {
        match direction {
            Direction::Upgrade => self.upgrade_script(),
            Direction::Downgrade => self.downgrade_script(),
        }
    }

    /// Where the definition was loaded from, if it came from disk.
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    /// Resolved dependencies. Empty until the catalog has been resolved.
    pub fn resolved_dependencies(&self) -> &[PatchId] {
        &self.resolved
    }

    /// Optional dependencies that were not found during resolution.
    pub fn missing_optional(&self) -> &[String] {
        &self.missing_optional
    }
}

/// A patch as seen by planning and persisted state.
///
/// `Ghost` is a patch name found among the applied records of a target whose
/// definition is no longer part of the catalog. Ghosts have no scripts and no
/// dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PatchRef {
    Known(PatchId),
    Ghost(String),
}

impl PatchRef {
    pub fn is_ghost(&self) -> bool {
        matches!(self, PatchRef::Ghost(_))
    }

    pub fn known(&self) -> Option<PatchId> {
        match self {
            PatchRef::Known(id) => Some(*id),
            PatchRef::Ghost(_) => None,
        }
    }
}

impl From<PatchId> for PatchRef {
    fn from(id: PatchId) -> Self {
        PatchRef::Known(id)
    }
}

impl fmt::Display for PatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
