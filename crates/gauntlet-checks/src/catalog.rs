//! Target frameworks offered by a package's `lib/` folder

use crate::error::{CheckError, CheckResult};
use crate::framework::Framework;
use gauntlet_build::PackageIdAndVersion;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Source of per-target-framework asset groups
#[async_trait::async_trait]
pub trait PackageCatalog: Send + Sync {
    /// Target frameworks with at least one `lib/` asset, sorted by moniker
    async fn lib_frameworks(&self, package: &PackageIdAndVersion) -> CheckResult<Vec<Framework>>;
}

/// Reads extracted packages from the NuGet global packages folder
#[derive(Debug, Clone)]
pub struct GlobalPackagesCatalog {
    root: PathBuf,
}

impl GlobalPackagesCatalog {
    /// Catalog over an explicit folder
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `NUGET_PACKAGES`, or `.nuget/packages` in the user's home directory
    pub fn from_env() -> CheckResult<Self> {
        if let Some(root) = std::env::var_os("NUGET_PACKAGES") {
            return Ok(Self::new(root));
        }
        let home = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .ok_or_else(|| CheckError::Catalog("cannot locate the global packages folder".into()))?;
        Ok(Self::new(Path::new(&home).join(".nuget").join("packages")))
    }

    /// Folder holding the extracted package
    #[must_use]
    pub fn package_dir(&self, package: &PackageIdAndVersion) -> PathBuf {
        self.root
            .join(package.id.to_lowercase())
            .join(package.version.to_lowercase())
    }
}

#[async_trait::async_trait]
impl PackageCatalog for GlobalPackagesCatalog {
    async fn lib_frameworks(&self, package: &PackageIdAndVersion) -> CheckResult<Vec<Framework>> {
        let lib = self.package_dir(package).join("lib");
        let entries = fs::read_dir(&lib)
            .map_err(|e| CheckError::Catalog(format!("could not read {}: {e}", lib.display())))?;

        let mut frameworks = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            // Some old packages list empty entries for target folders
            if !path.is_dir() || !has_files(&path) {
                debug!(path = %path.display(), "skipping empty lib entry");
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            match name.parse::<Framework>() {
                Ok(framework) => frameworks.push(framework),
                Err(err) => warn!(%package, %err, "ignoring lib folder"),
            }
        }

        if frameworks.is_empty() {
            return Err(CheckError::Catalog(format!("{package} has no lib target frameworks")));
        }
        frameworks.sort_by(|a, b| a.moniker().cmp(b.moniker()));
        Ok(frameworks)
    }
}

fn has_files(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .any(|e| e.file_type().is_ok_and(|t| t.is_file()) && !e.file_name().is_empty())
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[tokio::test]
    async fn lists_lib_folders_with_files() {
        let dir = tempfile::tempdir().unwrap();
        let base = "system.reactive.linq/3.0.0/lib";
        write(dir.path(), &format!("{base}/net45/System.Reactive.Linq.dll"));
        write(dir.path(), &format!("{base}/net46/System.Reactive.Linq.dll"));
        write(dir.path(), &format!("{base}/netstandard1.3/System.Reactive.Linq.dll"));
        fs::create_dir_all(dir.path().join(format!("{base}/netstandard1.0"))).unwrap();

        let catalog = GlobalPackagesCatalog::new(dir.path());
        let frameworks = catalog
            .lib_frameworks(&PackageIdAndVersion::new("System.Reactive.Linq", "3.0.0"))
            .await
            .unwrap();
        let monikers: Vec<_> = frameworks.iter().map(Framework::moniker).collect();
        assert_eq!(monikers, ["net45", "net46", "netstandard1.3"]);
    }

    #[tokio::test]
    async fn missing_package_is_catalog_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = GlobalPackagesCatalog::new(dir.path())
            .lib_frameworks(&PackageIdAndVersion::new("Nope", "1.0.0"))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckError::Catalog(_)));
    }
}
