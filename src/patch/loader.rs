use super::catalog::PatchCatalog;
use super::model::{Dependency, Patch};
use crate::core::{MigrateError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEPENDS_ON_FILE: &str = "depends_on";
pub const UPGRADE_FILE: &str = "upgrade.sql";
pub const DOWNGRADE_FILE: &str = "downgrade.sql";
pub const REPO_NAME_FILE: &str = "repo_name";

/// Loads single patches from a directory-based structure.
///
/// A patch is a directory named after the patch. It may contain:
/// - `depends_on`: one dependency name per line, `#` starts a comment line,
///   a trailing `?` marks the dependency optional,
/// - `upgrade.sql`: script applying the patch,
/// - `downgrade.sql`: script reverting the patch.
///
/// Every file may be omitted; other files in the directory are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirPatchLoader;

impl DirPatchLoader {
    pub fn new() -> Self {
        Self
    }

    pub fn is_patch(&self, path: &Path) -> bool {
        path.is_dir()
    }

    pub fn load_patch(&self, path: &Path) -> Result<Patch> {
        if !self.is_patch(path) {
            return Err(MigrateError::PatchNotFound(path.display().to_string()));
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                MigrateError::InvalidPatch(format!("'{}' has no usable name", path.display()))
            })?;

        let mut patch = Patch::new(name).with_origin(path);
        if let Some(lines) = read_lines(&path.join(DEPENDS_ON_FILE))? {
            patch = patch.with_dependencies(parse_dependencies(&lines));
        }
        if let Some(script) = read_optional(&path.join(UPGRADE_FILE))? {
            patch = patch.with_upgrade(script);
        }
        if let Some(script) = read_optional(&path.join(DOWNGRADE_FILE))? {
            patch = patch.with_downgrade(script);
        }

        Ok(patch)
    }
}

/// Loads a whole catalog from a directory of patch directories.
///
/// The directory must contain a `repo_name` file naming the catalog.
#[derive(Debug, Clone, Default)]
pub struct DirCatalogLoader {
    patch_loader: DirPatchLoader,
}

impl DirCatalogLoader {
    pub fn new(patch_loader: DirPatchLoader) -> Self {
        Self { patch_loader }
    }

    /// Returns an unresolved catalog with all patches found in `dir`.
    pub fn load_catalog(&self, dir: &Path) -> Result<PatchCatalog> {
        let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<_>>()?;
        // read_dir order is platform dependent; keep override order reproducible
        entries.sort();

        let mut catalog = PatchCatalog::new();
        let mut repo_name = None;
        for path in entries {
            if path.file_name().is_some_and(|n| n == REPO_NAME_FILE) {
                repo_name = Some(fs::read_to_string(&path)?.trim().to_string());
                continue;
            }
            if !self.patch_loader.is_patch(&path) {
                continue;
            }
            catalog.add_patch(self.patch_loader.load_patch(&path)?);
        }

        match repo_name {
            Some(name) if !name.is_empty() => catalog.set_name(name),
            _ => {
                return Err(MigrateError::InvalidPatch(format!(
                    "patch directory '{}' has no '{}' file",
                    dir.display(),
                    REPO_NAME_FILE
                )));
            }
        }

        debug!(
            dir = %dir.display(),
            patches = catalog.len(),
            "loaded patch catalog"
        );
        Ok(catalog)
    }

    /// Loads `primary` and lets every catalog in `overrides` replace its
    /// patches, in order. The result is resolved.
    pub fn load_catalogs<P: AsRef<Path>>(&self, primary: &Path, overrides: &[P]) -> Result<PatchCatalog> {
        let mut catalog = self.load_catalog(primary)?;
        for dir in overrides {
            let other = self.load_catalog(dir.as_ref())?;
            catalog.merge(other);
        }
        catalog.resolve()?;
        Ok(catalog)
    }
}

fn parse_dependencies(lines: &[String]) -> Vec<Dependency> {
    lines
        .iter()
        .map(|line| match line.strip_suffix('?') {
            Some(name) => Dependency::optional(name.trim_end()),
            None => Dependency::required(line.as_str()),
        })
        .collect()
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    Ok(Some(fs::read_to_string(path)?))
}

/// Non-empty lines of `path` without `#` comment lines, `None` if absent.
fn read_lines(path: &Path) -> Result<Option<Vec<String>>> {
    let Some(content) = read_optional(path)? else {
        return Ok(None);
    };

    Ok(Some(
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_patch(root: &Path, name: &str, files: &[(&str, &str)]) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir(&dir).unwrap();
        for (file, content) in files {
            fs::write(dir.join(file), content).unwrap();
        }
        dir
    }

    #[test]
    fn test_dir_load() {
        let temp_dir = TempDir::new().unwrap();
        let dir = write_patch(
            temp_dir.path(),
            "the_patch",
            &[
                (DEPENDS_ON_FILE, "other_patch\n# comment\nyet_another_one\n\noptional_one?\n"),
                (UPGRADE_FILE, "SELECT 1\n"),
                (DOWNGRADE_FILE, "SELECT 2\n"),
            ],
        );

        let patch = DirPatchLoader::new().load_patch(&dir).unwrap();
        assert_eq!(patch.name(), "the_patch");
        assert_eq!(
            patch.dependencies(),
            &[
                Dependency::required("other_patch"),
                Dependency::required("yet_another_one"),
                Dependency::optional("optional_one"),
            ]
        );
        assert_eq!(patch.upgrade_script(), Some("SELECT 1\n"));
        assert_eq!(patch.downgrade_script(), Some("SELECT 2\n"));
        assert_eq!(patch.origin(), Some(dir.as_path()));
    }

    #[test]
    fn test_missing_patch_dir() {
        let temp_dir = TempDir::new().unwrap();
        let err = DirPatchLoader::new()
            .load_patch(&temp_dir.path().join("absent"))
            .unwrap_err();
        assert!(matches!(err, MigrateError::PatchNotFound(_)));
    }

    #[test]
    fn test_catalog_dir_load() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join(REPO_NAME_FILE), "accounting\n").unwrap();
        write_patch(
            root,
            "patch1",
            &[
                (DEPENDS_ON_FILE, "patch2\npatch7\n"),
                (UPGRADE_FILE, "SELECT 1\n"),
                (DOWNGRADE_FILE, "SELECT 2\n"),
            ],
        );
        write_patch(root, "patch2", &[(UPGRADE_FILE, "SELECT 3\n"), (DOWNGRADE_FILE, "SELECT 4\n")]);
        write_patch(root, "patch7", &[(DEPENDS_ON_FILE, "patch2\n"), (UPGRADE_FILE, "SELECT 5\n")]);
        fs::write(root.join("unrelated_file"), "").unwrap();

        let mut catalog = DirCatalogLoader::default().load_catalog(root).unwrap();
        assert_eq!(catalog.name(), Some("accounting"));
        let mut names: Vec<_> = catalog.patches().map(|(_, p)| p.name().to_string()).collect();
        names.sort();
        assert_eq!(names, vec!["patch1", "patch2", "patch7"]);

        let patch7 = catalog.find("patch7").unwrap();
        assert_eq!(catalog.patch(patch7).upgrade_script(), Some("SELECT 5\n"));
        assert_eq!(catalog.patch(patch7).downgrade_script(), None);

        catalog.resolve().unwrap();
        assert_eq!(
            catalog.patch(patch7).resolved_dependencies(),
            &[catalog.find("patch2").unwrap()]
        );
    }

    #[test]
    fn test_catalog_without_repo_name() {
        let temp_dir = TempDir::new().unwrap();
        write_patch(temp_dir.path(), "patch1", &[]);

        let err = DirCatalogLoader::default()
            .load_catalog(temp_dir.path())
            .unwrap_err();
        assert!(matches!(err, MigrateError::InvalidPatch(_)));
    }

    #[test]
    fn test_override_catalogs() {
        let primary = TempDir::new().unwrap();
        fs::write(primary.path().join(REPO_NAME_FILE), "shop").unwrap();
        write_patch(primary.path(), "base", &[(UPGRADE_FILE, "CREATE TABLE a(x integer);")]);
        write_patch(primary.path(), "feature", &[(DEPENDS_ON_FILE, "base\nsite_extras?\n")]);

        let site = TempDir::new().unwrap();
        fs::write(site.path().join(REPO_NAME_FILE), "site").unwrap();
        write_patch(site.path(), "base", &[(UPGRADE_FILE, "CREATE TABLE b(x integer);")]);
        write_patch(site.path(), "site_extras", &[]);

        let catalog = DirCatalogLoader::default()
            .load_catalogs(primary.path(), &[site.path()])
            .unwrap();

        assert!(catalog.is_resolved());
        assert_eq!(catalog.name(), Some("shop"));
        assert_eq!(catalog.len(), 3);
        let base = catalog.find("base").unwrap();
        assert_eq!(catalog.patch(base).upgrade_script(), Some("CREATE TABLE b(x integer);"));
        let feature = catalog.patch(catalog.find("feature").unwrap());
        assert_eq!(feature.resolved_dependencies().len(), 2);
        assert!(feature.missing_optional().is_empty());
    }
}
