//! Rx package selection and reference resolution

use crate::error::{CheckError, CheckResult};
use crate::reference::{DirectReference, LegacyInclusion, NewDirect, ReferenceChoice, TransitiveViaLibrary};
use gauntlet_build::{PackageIdAndVersion, PackageSource};
use serde::Serialize;
use std::collections::HashSet;

/// Last published version of the old single package
pub const OLD_RX_ID: &str = "System.Reactive";

/// Version used for direct references to the old package
pub const OLD_RX_VERSION: &str = "6.0.1";

/// The old package as referenced by templates and old-style apps
#[must_use]
pub fn old_rx() -> PackageIdAndVersion {
    PackageIdAndVersion::new(OLD_RX_ID, OLD_RX_VERSION)
}

/// The Rx packages under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RxPackageSet {
    /// Main package
    pub main: PackageIdAndVersion,
    /// Legacy-compatibility facade, when the candidate has one
    pub legacy: Option<PackageIdAndVersion>,
    /// UI-framework companion packages
    pub ui: Vec<PackageIdAndVersion>,
    /// Extra feed offered alongside nuget.org
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl RxPackageSet {
    /// Build from the repeated `--rx-package` values: the first is main,
    /// the rest are UI companions.
    ///
    /// Rejects an empty list and duplicate ids.
    pub fn from_packages(
        packages: Vec<PackageIdAndVersion>,
        legacy: Option<PackageIdAndVersion>,
        source: Option<String>,
    ) -> CheckResult<Self> {
        let mut seen = HashSet::with_capacity(packages.len() + 1);
        for package in packages.iter().chain(legacy.iter()) {
            if !seen.insert(package.id.as_str()) {
                return Err(CheckError::resolution(format!("Duplicate package id: {}.", package.id)));
            }
        }

        let mut packages = packages.into_iter();
        let main = packages
            .next()
            .ok_or_else(|| CheckError::resolution("at least one Rx package is required"))?;
        Ok(Self {
            main,
            legacy,
            ui: packages.collect(),
            source,
        })
    }

    /// Main package followed by the UI companions
    #[must_use]
    pub fn all_packages(&self) -> Vec<PackageIdAndVersion> {
        std::iter::once(self.main.clone())
            .chain(self.ui.iter().cloned())
            .collect()
    }

    /// Main package plus the legacy facade when there is one
    #[must_use]
    pub fn main_and_legacy(&self) -> Vec<PackageIdAndVersion> {
        std::iter::once(self.main.clone())
            .chain(self.legacy.iter().cloned())
            .collect()
    }

    /// The legacy facade, or main when the candidate has no facade
    #[must_use]
    pub fn legacy_or_main(&self) -> Vec<PackageIdAndVersion> {
        vec![self.legacy.clone().unwrap_or_else(|| self.main.clone())]
    }

    /// Feeds to offer builds, in order
    #[must_use]
    pub fn package_sources(&self) -> Vec<PackageSource> {
        self.source.iter().map(PackageSource::custom).collect()
    }

    /// Packages a direct reference to the new family stands for
    #[must_use]
    pub fn resolve_new(&self, new: &NewDirect) -> Vec<PackageIdAndVersion> {
        let mut packages = match new.legacy_inclusion {
            LegacyInclusion::JustMain => vec![self.main.clone()],
            LegacyInclusion::JustLegacy => self.legacy_or_main(),
            LegacyInclusion::MainAndLegacy => self.main_and_legacy(),
        };
        if new.include_ui_packages {
            packages.extend(self.ui.iter().cloned());
        }
        packages
    }

    /// Packages a library that references the new family is built against
    #[must_use]
    pub fn library_packages(&self, library: &TransitiveViaLibrary) -> Vec<PackageIdAndVersion> {
        let mut packages = self.main_and_legacy();
        if library.library_exposes_ui_feature {
            packages.extend(self.ui.iter().cloned());
        }
        packages
    }

    /// Resolve one dependency slot to package references.
    ///
    /// `built_library` maps a transitive reference to its packed library and
    /// must know every library the slot can name.
    pub fn resolve<F>(&self, choice: &ReferenceChoice, built_library: F) -> CheckResult<Vec<PackageIdAndVersion>>
    where
        F: Fn(&TransitiveViaLibrary) -> Option<PackageIdAndVersion>,
    {
        match choice {
            ReferenceChoice::Direct(DirectReference::Old) => Ok(vec![old_rx()]),
            ReferenceChoice::Direct(DirectReference::New(new)) => Ok(self.resolve_new(new)),
            ReferenceChoice::TransitiveViaLibrary(library) => built_library(library)
                .map(|package| vec![package])
                .ok_or_else(|| CheckError::resolution(format!("library package was not built: {library:?}"))),
        }
    }

    /// Resolve a whole dependency list, preserving order
    pub fn resolve_all<F>(
        &self,
        choices: &[ReferenceChoice],
        built_library: F,
    ) -> CheckResult<Vec<PackageIdAndVersion>>
    where
        F: Fn(&TransitiveViaLibrary) -> Option<PackageIdAndVersion>,
    {
        let mut packages = Vec::new();
        for choice in choices {
            packages.extend(self.resolve(choice, &built_library)?);
        }
        Ok(packages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::TfmList;
    use pretty_assertions::assert_eq;

    fn main() -> PackageIdAndVersion {
        PackageIdAndVersion::new("System.Reactive.Net", "7.0.0")
    }

    fn legacy() -> PackageIdAndVersion {
        PackageIdAndVersion::new("System.Reactive", "7.0.0")
    }

    fn wpf() -> PackageIdAndVersion {
        PackageIdAndVersion::new("System.Reactive.For.Wpf", "7.0.0")
    }

    fn set(legacy_package: Option<PackageIdAndVersion>) -> RxPackageSet {
        RxPackageSet::from_packages(vec![main(), wpf()], legacy_package, None).unwrap()
    }

    fn no_library(_: &TransitiveViaLibrary) -> Option<PackageIdAndVersion> {
        None
    }

    #[test]
    fn just_main_without_ui() {
        let packages = set(Some(legacy()))
            .resolve(&ReferenceChoice::new_direct(LegacyInclusion::JustMain, false), no_library)
            .unwrap();
        assert_eq!(packages, vec![main()]);
    }

    #[test]
    fn just_legacy_falls_back_to_main() {
        let choice = ReferenceChoice::new_direct(LegacyInclusion::JustLegacy, false);
        assert_eq!(set(Some(legacy())).resolve(&choice, no_library).unwrap(), vec![legacy()]);
        assert_eq!(set(None).resolve(&choice, no_library).unwrap(), vec![main()]);
    }

    #[test]
    fn main_and_legacy() {
        let choice = ReferenceChoice::new_direct(LegacyInclusion::MainAndLegacy, false);
        assert_eq!(
            set(Some(legacy())).resolve(&choice, no_library).unwrap(),
            vec![main(), legacy()]
        );
    }

    #[test]
    fn ui_packages_are_appended() {
        let choice = ReferenceChoice::new_direct(LegacyInclusion::MainAndLegacy, true);
        assert_eq!(
            set(Some(legacy())).resolve(&choice, no_library).unwrap(),
            vec![main(), legacy(), wpf()]
        );
    }

    #[test]
    fn old_reference_is_last_published_package() {
        let packages = set(None).resolve(&ReferenceChoice::old(), no_library).unwrap();
        assert_eq!(packages, vec![PackageIdAndVersion::new("System.Reactive", "6.0.1")]);
    }

    #[test]
    fn transitive_reference_uses_built_library() {
        let library = TransitiveViaLibrary::new(TfmList::parse("net8.0"), false, false);
        let built = PackageIdAndVersion::new("Transitive.Lib.UsesRx.Old.net8.0", "1.0.0-preview1");
        let choices = vec![
            ReferenceChoice::TransitiveViaLibrary(library.clone()),
            ReferenceChoice::new_direct(LegacyInclusion::JustMain, false),
        ];
        let packages = set(None)
            .resolve_all(&choices, |l| (l == &library).then(|| built.clone()))
            .unwrap();
        assert_eq!(packages, vec![built, main()]);

        let err = set(None).resolve_all(&choices, no_library).unwrap_err();
        assert!(matches!(err, CheckError::Resolution(_)));
    }

    #[test]
    fn rejects_empty_and_duplicate_selections() {
        assert!(RxPackageSet::from_packages(vec![], None, None).is_err());
        let err = RxPackageSet::from_packages(vec![main(), main()], None, None).unwrap_err();
        assert!(err.to_string().contains("Duplicate package id"));
        assert!(RxPackageSet::from_packages(vec![legacy()], Some(legacy()), None).is_err());
    }

    #[test]
    fn custom_source_is_offered() {
        let packages = RxPackageSet::from_packages(vec![main()], None, Some("/feed".into())).unwrap();
        assert_eq!(packages.package_sources(), vec![PackageSource::custom("/feed")]);
        assert_eq!(packages.all_packages(), vec![main()]);
    }
}
