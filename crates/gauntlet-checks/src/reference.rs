//! How an app acquires its Rx dependency
//!
//! [`ReferenceChoice`] is a two-level sum type: a direct package reference
//! (old or new package family) or a reference acquired transitively through
//! an intermediate library. Callers wrap the inner variant explicitly:
//!
//! ```
//! use gauntlet_checks::reference::{DirectReference, LegacyInclusion, NewDirect, ReferenceChoice};
//!
//! let choice = ReferenceChoice::Direct(DirectReference::New(NewDirect::new(LegacyInclusion::JustMain, false)));
//! assert!(choice.is_new_reference());
//! ```

use serde::Serialize;
use std::fmt;

/// Which of the new package family's packages a direct reference pulls in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LegacyInclusion {
    /// Only the new main package
    JustMain,
    /// Only the legacy-compatibility facade
    JustLegacy,
    /// Both the main package and the facade
    MainAndLegacy,
}

impl LegacyInclusion {
    /// Every option, in generation order
    pub const ALL: [Self; 3] = [Self::JustMain, Self::JustLegacy, Self::MainAndLegacy];

    /// Whether the main package is referenced
    #[inline]
    #[must_use]
    pub fn includes_main(self) -> bool {
        !matches!(self, Self::JustLegacy)
    }

    /// Whether the legacy facade is referenced
    #[inline]
    #[must_use]
    pub fn includes_legacy(self) -> bool {
        !matches!(self, Self::JustMain)
    }
}

/// Direct reference to the new package family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDirect {
    /// Main/legacy selection
    pub legacy_inclusion: LegacyInclusion,
    /// Also reference the UI-framework companion packages
    pub include_ui_packages: bool,
}

impl NewDirect {
    /// Reference to the new package family
    #[inline]
    #[must_use]
    pub fn new(legacy_inclusion: LegacyInclusion, include_ui_packages: bool) -> Self {
        Self {
            legacy_inclusion,
            include_ui_packages,
        }
    }
}

/// A direct package reference from the app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DirectReference {
    /// The last published version of the old single package
    Old,
    /// The new package family
    New(NewDirect),
}

/// `;`-separated target framework list of an intermediate library
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TfmList(String);

impl TfmList {
    /// Parse a `;`-separated list, dropping empty entries
    #[must_use]
    pub fn parse(list: &str) -> Self {
        Self(
            list.split(';')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(";"),
        )
    }

    /// Individual monikers
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.split(';').filter(|t| !t.is_empty())
    }

    /// The list as written into `TargetFrameworks`
    #[inline]
    #[must_use]
    pub fn joined(&self) -> &str {
        &self.0
    }

    /// Whether any target is OS-specific to Windows
    #[must_use]
    pub fn has_windows_target(&self) -> bool {
        self.iter().any(|t| t.contains("-windows"))
    }
}

impl fmt::Display for TfmList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rx acquired only through an intermediate library package
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitiveViaLibrary {
    /// Library target frameworks
    pub tfms: TfmList,
    /// Library references the new package family rather than the old package
    pub references_new_version: bool,
    /// Library's Windows target contains code using UI-specific Rx features
    pub library_exposes_ui_feature: bool,
}

impl TransitiveViaLibrary {
    /// Library built for `tfms`
    #[must_use]
    pub fn new(tfms: TfmList, references_new_version: bool, library_exposes_ui_feature: bool) -> Self {
        Self {
            tfms,
            references_new_version,
            library_exposes_ui_feature,
        }
    }

    /// Whether Rx UI features are reachable from the library's code.
    ///
    /// The old package always carries them on Windows targets. The new family
    /// only brings them in when the library opts into its UI code path.
    #[must_use]
    pub fn could_use_rx_ui(&self) -> bool {
        (self.tfms.has_windows_target() && !self.references_new_version) || self.library_exposes_ui_feature
    }

    /// Whether the library offers a public API that uses UI-specific Rx features.
    ///
    /// UI-specific Rx only exists on Windows targets.
    #[must_use]
    pub fn provides_ui_feature(&self) -> bool {
        self.tfms.has_windows_target() && self.could_use_rx_ui() && self.library_exposes_ui_feature
    }
}

/// One dependency slot of an app
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ReferenceChoice {
    /// Package reference declared by the app
    Direct(DirectReference),
    /// Reference inherited from a library
    TransitiveViaLibrary(TransitiveViaLibrary),
}

impl ReferenceChoice {
    /// Shorthand for `Direct(Old)`
    #[must_use]
    pub fn old() -> Self {
        Self::Direct(DirectReference::Old)
    }

    /// Shorthand for `Direct(New(..))`
    #[must_use]
    pub fn new_direct(legacy_inclusion: LegacyInclusion, include_ui_packages: bool) -> Self {
        Self::Direct(DirectReference::New(NewDirect::new(legacy_inclusion, include_ui_packages)))
    }

    /// Direct reference to old Rx
    #[must_use]
    pub fn is_old_reference(&self) -> bool {
        matches!(self, Self::Direct(DirectReference::Old))
    }

    /// Direct reference to the new family
    #[must_use]
    pub fn is_new_reference(&self) -> bool {
        matches!(self, Self::Direct(DirectReference::New(_)))
    }

    /// Reference through a library
    #[must_use]
    pub fn is_transitive_reference(&self) -> bool {
        matches!(self, Self::TransitiveViaLibrary(_))
    }

    /// The direct reference, if this is one
    #[must_use]
    pub fn as_direct(&self) -> Option<&DirectReference> {
        match self {
            Self::Direct(d) => Some(d),
            Self::TransitiveViaLibrary(_) => None,
        }
    }

    /// The new-family reference, if this is one
    #[must_use]
    pub fn as_new(&self) -> Option<&NewDirect> {
        match self {
            Self::Direct(DirectReference::New(n)) => Some(n),
            _ => None,
        }
    }

    /// The library, if this goes through one
    #[must_use]
    pub fn as_transitive(&self) -> Option<&TransitiveViaLibrary> {
        match self {
            Self::TransitiveViaLibrary(t) => Some(t),
            Self::Direct(_) => None,
        }
    }

    /// Whether these references alone make Rx UI features available to the app
    #[must_use]
    pub fn makes_rx_ui_available(&self) -> bool {
        match self {
            Self::Direct(DirectReference::Old) => true,
            Self::Direct(DirectReference::New(n)) => n.include_ui_packages,
            Self::TransitiveViaLibrary(t) => t.library_exposes_ui_feature,
        }
    }

    /// Whether this reference could drag in the desktop framework implicitly.
    ///
    /// UI companion packages are ignored: referencing them is an explicit
    /// decision to use UI features.
    #[must_use]
    pub fn may_cause_implicit_desktop_framework_reference(&self) -> bool {
        match self {
            Self::Direct(DirectReference::Old) => true,
            Self::Direct(DirectReference::New(n)) => n.legacy_inclusion.includes_legacy(),
            Self::TransitiveViaLibrary(t) => !t.references_new_version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn old_lib(exposes_ui: bool) -> TransitiveViaLibrary {
        TransitiveViaLibrary::new(TfmList::parse("net8.0;net8.0-windows10.0.19041"), false, exposes_ui)
    }

    #[test]
    fn predicates_are_mutually_exclusive() {
        let choices = [
            ReferenceChoice::old(),
            ReferenceChoice::new_direct(LegacyInclusion::JustMain, false),
            ReferenceChoice::TransitiveViaLibrary(old_lib(false)),
        ];
        for choice in &choices {
            let flags = [
                choice.is_old_reference(),
                choice.is_new_reference(),
                choice.is_transitive_reference(),
            ];
            assert_eq!(flags.iter().filter(|f| **f).count(), 1, "{choice:?}");
        }
    }

    #[test]
    fn accessors_narrow() {
        let new = ReferenceChoice::new_direct(LegacyInclusion::MainAndLegacy, true);
        assert_eq!(
            new.as_new(),
            Some(&NewDirect::new(LegacyInclusion::MainAndLegacy, true))
        );
        assert!(new.as_transitive().is_none());
        assert!(ReferenceChoice::old().as_new().is_none());
        assert_eq!(ReferenceChoice::old().as_direct(), Some(&DirectReference::Old));
    }

    #[test]
    fn equal_library_values_hash_together() {
        let mut set = HashSet::new();
        set.insert(old_lib(false));
        set.insert(old_lib(false));
        set.insert(old_lib(true));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn tfm_list_detects_windows_targets() {
        assert!(TfmList::parse("net8.0;net8.0-windows10.0.19041").has_windows_target());
        assert!(!TfmList::parse("net8.0").has_windows_target());
        assert_eq!(TfmList::parse(" net8.0 ;; net9.0").joined(), "net8.0;net9.0");
    }

    #[test]
    fn old_library_on_windows_could_use_ui_but_only_provides_it_when_exposed() {
        assert!(old_lib(false).could_use_rx_ui());
        assert!(!old_lib(false).provides_ui_feature());
        assert!(old_lib(true).provides_ui_feature());

        let new_lib = TransitiveViaLibrary::new(TfmList::parse("net8.0;net8.0-windows10.0.19041"), true, false);
        assert!(!new_lib.could_use_rx_ui());
    }

    #[test]
    fn library_without_windows_target_never_provides_ui() {
        let portable = TransitiveViaLibrary::new(TfmList::parse("net8.0"), true, true);
        assert!(!portable.provides_ui_feature());

        let windows = TransitiveViaLibrary::new(TfmList::parse("net8.0;net8.0-windows10.0.19041"), true, true);
        assert!(windows.provides_ui_feature());
    }

    #[test]
    fn implicit_desktop_framework_risk() {
        assert!(ReferenceChoice::old().may_cause_implicit_desktop_framework_reference());
        assert!(!ReferenceChoice::new_direct(LegacyInclusion::JustMain, true)
            .may_cause_implicit_desktop_framework_reference());
        assert!(ReferenceChoice::new_direct(LegacyInclusion::JustLegacy, false)
            .may_cause_implicit_desktop_framework_reference());
        assert!(ReferenceChoice::TransitiveViaLibrary(old_lib(false))
            .may_cause_implicit_desktop_framework_reference());
    }
}
