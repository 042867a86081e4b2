//! Harness configuration and command line value resolution

use crate::error::{CheckError, CheckResult};
use crate::packages::RxPackageSet;
use crate::result::TestDetails;
use chrono::{DateTime, NaiveDateTime, Utc};
use gauntlet_build::{BuildEnvironment, PackageIdAndVersion, SystemProcessRunner, Toolchain};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Format of `--test-timestamp`, also used as the run id prefix
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Where templates live and how the toolchain is driven
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Root of the template project tree
    pub templates_root: PathBuf,
    /// `dotnet` executable
    pub dotnet: PathBuf,
    /// Grace period for draining child output after exit
    pub drain_grace: Duration,
    /// Parent of all temporary workspaces, system temp when unset
    pub temp_root: Option<PathBuf>,
    /// Plug-in template and host folder, `{templates_root}/PlugIns` when unset
    pub plugins_root: Option<PathBuf>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            templates_root: PathBuf::from("templates"),
            dotnet: PathBuf::from("dotnet"),
            drain_grace: gauntlet_build::DEFAULT_DRAIN_GRACE,
            temp_root: None,
            plugins_root: None,
        }
    }
}

impl HarnessConfig {
    /// Defaults
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folder holding the project templates
    #[inline]
    #[must_use]
    pub fn with_templates_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.templates_root = root.into();
        self
    }

    /// `dotnet` executable to use
    #[inline]
    #[must_use]
    pub fn with_dotnet(mut self, dotnet: impl Into<PathBuf>) -> Self {
        self.dotnet = dotnet.into();
        self
    }

    /// How long to wait for output after a process exits
    #[inline]
    #[must_use]
    pub fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    /// Folder that workspaces are created under
    #[inline]
    #[must_use]
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    /// Folder holding the plug-in templates and hosts
    #[inline]
    #[must_use]
    pub fn with_plugins_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.plugins_root = Some(root.into());
        self
    }

    /// Folder of the deployment bloat template
    #[must_use]
    pub fn bloat_template_dir(&self) -> PathBuf {
        self.templates_root.join("Bloat").join("Bloat.ConsoleWinRtTemplate")
    }

    /// Folder of the extension method workaround template
    #[must_use]
    pub fn extension_method_template_dir(&self) -> PathBuf {
        self.templates_root
            .join("ExtensionMethods")
            .join("ExtensionMethods.DisableTransitiveWorkaroundFail")
    }

    /// Transitive check app project
    #[must_use]
    pub fn transitive_app_project(&self) -> PathBuf {
        self.transitive_root().join("Transitive.App").join("Transitive.App.csproj")
    }

    /// Transitive check library project
    #[must_use]
    pub fn transitive_library_project(&self) -> PathBuf {
        self.transitive_root()
            .join("Transitive.Lib.UsesRx")
            .join("Transitive.Lib.UsesRx.csproj")
    }

    fn transitive_root(&self) -> PathBuf {
        self.templates_root.join("TransitiveReferences")
    }

    /// Folder holding the plug-in templates and hosts
    #[must_use]
    pub fn plugins_root(&self) -> PathBuf {
        self.plugins_root
            .clone()
            .unwrap_or_else(|| self.templates_root.join("PlugIns"))
    }

    /// Environment that runs the real toolchain
    #[must_use]
    pub fn build_environment(&self) -> BuildEnvironment {
        let runner = Arc::new(SystemProcessRunner::new(self.drain_grace));
        let env = BuildEnvironment::new(Toolchain::new(&self.dotnet, runner));
        match &self.temp_root {
            Some(root) => env.with_temp_root(root),
            None => env,
        }
    }

    /// Fail early when the template tree is missing
    pub fn ensure_templates(&self) -> CheckResult<()> {
        ensure_dir(&self.templates_root)
    }
}

fn ensure_dir(path: &Path) -> CheckResult<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(CheckError::orchestration(format!("template folder not found: {}", path.display())))
    }
}

/// Build the package set from repeated `--rx-package` values and the
/// optional legacy package and source.
pub fn parse_package_set(
    rx_packages: &[String],
    legacy: Option<&str>,
    source: Option<String>,
) -> CheckResult<RxPackageSet> {
    let packages = rx_packages
        .iter()
        .map(|p| p.parse::<PackageIdAndVersion>())
        .collect::<Result<Vec<_>, _>>()?;
    let legacy = legacy.map(str::parse::<PackageIdAndVersion>).transpose()?;
    RxPackageSet::from_packages(packages, legacy, source)
}

/// Resolve the run id and timestamp, generating whichever is missing.
///
/// The timestamp is read as UTC in [`TIMESTAMP_FORMAT`]. A generated run id
/// is the timestamp followed by eight random hex digits.
pub fn resolve_test_details(
    test_run_id: Option<String>,
    test_timestamp: Option<&str>,
    now: DateTime<Utc>,
) -> CheckResult<TestDetails> {
    let timestamp = match test_timestamp {
        Some(text) => NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
            .map_err(|e| CheckError::Settings(format!("test timestamp '{text}': {e}")))?
            .and_utc(),
        None => now,
    };
    let test_run_id = test_run_id.unwrap_or_else(|| {
        format!("{}-{:08x}", timestamp.format(TIMESTAMP_FORMAT), rand::random::<u32>())
    });
    Ok(TestDetails {
        test_run_id,
        test_run_date_time: timestamp.to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn template_paths() {
        let config = HarnessConfig::new().with_templates_root("/t");
        assert_eq!(
            config.transitive_app_project(),
            PathBuf::from("/t/TransitiveReferences/Transitive.App/Transitive.App.csproj")
        );
        assert_eq!(config.plugins_root(), PathBuf::from("/t/PlugIns"));
        assert_eq!(config.with_plugins_root("/p").plugins_root(), PathBuf::from("/p"));
    }

    #[test]
    fn first_package_is_main() {
        let set = parse_package_set(
            &strings(&["System.Reactive.Net,7.0.0", "System.Reactive.For.Wpf,7.0.0"]),
            Some("System.Reactive,7.0.0"),
            None,
        )
        .unwrap();
        assert_eq!(set.main.id, "System.Reactive.Net");
        assert_eq!(set.ui.len(), 1);
        assert_eq!(set.legacy.map(|p| p.id).as_deref(), Some("System.Reactive"));
    }

    #[test]
    fn rejects_malformed_and_duplicate_packages() {
        let err = parse_package_set(&strings(&["System.Reactive"]), None, None).unwrap_err();
        assert!(err.to_string().contains("Must be <PackageId>,<Version>"));

        let err = parse_package_set(&strings(&["A,1.0", "A,2.0"]), None, None).unwrap_err();
        assert!(err.to_string().contains("Duplicate package id: A."));

        assert!(parse_package_set(&[], None, None).is_err());
    }

    #[test]
    fn generated_run_id_uses_timestamp() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 30, 0).unwrap();
        let details = resolve_test_details(None, None, now).unwrap();
        assert!(details.test_run_id.starts_with("2025-06-01_12-30-00-"));
        assert_eq!(details.test_run_id.len(), "2025-06-01_12-30-00-".len() + 8);
        assert_eq!(details.test_run_date_time, "2025-06-01T12:30:00+00:00");
    }

    #[test]
    fn explicit_values_win() {
        let details =
            resolve_test_details(Some("run-1".into()), Some("2024-01-02_03-04-05"), Utc::now()).unwrap();
        assert_eq!(details.test_run_id, "run-1");
        assert_eq!(details.test_run_date_time, "2024-01-02T03:04:05+00:00");

        assert!(matches!(
            resolve_test_details(None, Some("yesterday"), Utc::now()),
            Err(CheckError::Settings(_))
        ));
    }
}
