//! Transitive framework reference scenarios
//!
//! A scenario describes an app before and after an Rx upgrade. The
//! [`AppChoice`] list holds the curated before/after dependency pairs. Each
//! is crossed with the usage dimensions that make sense for it, and with the
//! `DisableTransitiveFrameworkReferences` workaround when the after state
//! could pull in the desktop framework implicitly.

use super::bools_if;
use crate::reference::{LegacyInclusion, ReferenceChoice, TfmList, TransitiveViaLibrary};
use crate::symbols::UsageFlags;
use serde::Serialize;

/// Application target framework used by default
pub const DEFAULT_APP_TFM: &str = "net8.0-windows10.0.19041";

/// Intermediate library target frameworks used by default
pub const DEFAULT_LIBRARY_TFMS: &str = "net8.0;net8.0-windows10.0.19041";

/// Fixed inputs of the generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Target framework of the test app
    pub app_tfm: String,
    /// Target frameworks of the intermediate library
    pub library_tfms: TfmList,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            app_tfm: DEFAULT_APP_TFM.to_string(),
            library_tfms: TfmList::parse(DEFAULT_LIBRARY_TFMS),
        }
    }
}

/// A before/after pair of app dependency lists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppChoice {
    /// Dependencies before the upgrade
    pub before: Vec<ReferenceChoice>,
    /// Dependencies after the upgrade
    pub after: Vec<ReferenceChoice>,
}

impl AppChoice {
    /// Pair of dependency lists
    #[must_use]
    pub fn new(before: Vec<ReferenceChoice>, after: Vec<ReferenceChoice>) -> Self {
        Self { before, after }
    }

    /// The app references the Rx-using library in both states
    #[must_use]
    pub fn library_present_before_and_after(&self) -> bool {
        references_library(&self.before) && references_library(&self.after)
    }

    /// Rx UI features are reachable from the references in both states
    #[must_use]
    pub fn ui_available_before_and_after(&self) -> bool {
        makes_rx_ui_available(&self.before) && makes_rx_ui_available(&self.after)
    }

    /// The library offers its UI-feature API in both states
    #[must_use]
    pub fn library_provides_ui_before_and_after(&self) -> bool {
        library_provides_ui(&self.before) && library_provides_ui(&self.after)
    }

    /// Whether the after state could cause an implicit desktop framework
    /// reference, which is the only case where the workaround matters
    #[must_use]
    pub fn should_test_disable_transitive_frameworks_workaround(&self) -> bool {
        self.after
            .iter()
            .any(ReferenceChoice::may_cause_implicit_desktop_framework_reference)
    }

    /// Usage flag combinations that are meaningful for this choice
    #[must_use]
    pub fn usage_choices(&self) -> Vec<UsageFlags> {
        let app_invokes_library_non_ui = self.library_present_before_and_after();
        let mut usages = Vec::new();
        for &app_uses_non_ui_directly in bools_if(true) {
            for &app_uses_ui_directly in bools_if(self.ui_available_before_and_after()) {
                for &app_invokes_library_ui in bools_if(self.library_provides_ui_before_and_after()) {
                    usages.push(UsageFlags {
                        app_uses_non_ui_directly,
                        app_uses_ui_directly,
                        app_invokes_library_non_ui,
                        app_invokes_library_ui,
                    });
                }
            }
        }
        usages
    }
}

fn references_library(deps: &[ReferenceChoice]) -> bool {
    deps.iter().any(ReferenceChoice::is_transitive_reference)
}

fn makes_rx_ui_available(deps: &[ReferenceChoice]) -> bool {
    deps.iter().any(ReferenceChoice::makes_rx_ui_available)
}

fn library_provides_ui(deps: &[ReferenceChoice]) -> bool {
    deps.iter()
        .filter_map(ReferenceChoice::as_transitive)
        .any(TransitiveViaLibrary::provides_ui_feature)
}

/// One fully specified transitive reference test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitiveScenario {
    /// Target framework of the test app
    pub app_tfm: String,
    /// Target frameworks of the intermediate library
    pub library_tfms: TfmList,
    /// Dependencies of the before build
    pub before: Vec<ReferenceChoice>,
    /// Dependencies of the after build
    pub after: Vec<ReferenceChoice>,
    /// Emit `DisableTransitiveFrameworkReferences` in the after build
    pub disable_transitive_framework_references_after: bool,
    /// What the app's own code does with Rx
    pub usage: UsageFlags,
}

impl TransitiveScenario {
    /// Every library referenced in either state, before first, with repeats
    pub fn libraries(&self) -> impl Iterator<Item = &TransitiveViaLibrary> {
        self.before
            .iter()
            .chain(&self.after)
            .filter_map(ReferenceChoice::as_transitive)
    }
}

/// The curated before/after pairs.
///
/// 1-3: an app that only had Rx through an old-Rx library adds the new
/// family. 4-6: an app that also referenced old Rx directly upgrades that
/// reference. 7-9: an app already on the new family adds an old-Rx library.
#[must_use]
pub fn app_choices(config: &GeneratorConfig) -> Vec<AppChoice> {
    let old_library = || {
        ReferenceChoice::TransitiveViaLibrary(TransitiveViaLibrary::new(config.library_tfms.clone(), false, false))
    };
    let new = |inclusion| ReferenceChoice::new_direct(inclusion, false);

    let mut choices = Vec::with_capacity(9);
    for inclusion in LegacyInclusion::ALL {
        choices.push(AppChoice::new(vec![old_library()], vec![old_library(), new(inclusion)]));
    }
    for inclusion in LegacyInclusion::ALL {
        choices.push(AppChoice::new(
            vec![old_library(), ReferenceChoice::old()],
            vec![old_library(), new(inclusion)],
        ));
    }
    for inclusion in [
        LegacyInclusion::JustMain,
        LegacyInclusion::MainAndLegacy,
        LegacyInclusion::JustLegacy,
    ] {
        choices.push(AppChoice::new(
            vec![new(LegacyInclusion::JustMain)],
            vec![new(inclusion), old_library()],
        ));
    }
    choices
}

/// Scenarios for the curated app choices
#[must_use]
pub fn generate(config: &GeneratorConfig) -> Vec<TransitiveScenario> {
    generate_from(config, &app_choices(config))
}

/// Scenarios for an explicit list of app choices.
///
/// Order: app choice, then usage flags, then the workaround flag.
#[must_use]
pub fn generate_from(config: &GeneratorConfig, choices: &[AppChoice]) -> Vec<TransitiveScenario> {
    let mut scenarios = Vec::new();
    for choice in choices {
        let workaround = bools_if(choice.should_test_disable_transitive_frameworks_workaround());
        for usage in choice.usage_choices() {
            for &disable in workaround {
                scenarios.push(TransitiveScenario {
                    app_tfm: config.app_tfm.clone(),
                    library_tfms: config.library_tfms.clone(),
                    before: choice.before.clone(),
                    after: choice.after.clone(),
                    disable_transitive_framework_references_after: disable,
                    usage,
                });
            }
        }
    }
    scenarios
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn windows_library(references_new_version: bool, exposes_ui: bool) -> ReferenceChoice {
        ReferenceChoice::TransitiveViaLibrary(TransitiveViaLibrary::new(
            TfmList::parse(DEFAULT_LIBRARY_TFMS),
            references_new_version,
            exposes_ui,
        ))
    }

    #[test]
    fn curated_choices_produce_fixed_matrix() {
        let scenarios = generate(&GeneratorConfig::default());
        // Nine choices, each with non-UI usage and workaround varied
        assert_eq!(scenarios.len(), 36);
        assert!(scenarios.iter().all(|s| s.app_tfm == DEFAULT_APP_TFM));
    }

    #[test]
    fn generation_is_deterministic() {
        let config = GeneratorConfig::default();
        assert_eq!(generate(&config), generate(&config));
    }

    #[test]
    fn old_library_then_new_main_never_uses_ui_directly() {
        let config = GeneratorConfig::default();
        let choice = AppChoice::new(
            vec![windows_library(false, false)],
            vec![
                windows_library(false, false),
                ReferenceChoice::new_direct(LegacyInclusion::JustMain, false),
            ],
        );
        let scenarios = generate_from(&config, &[choice]);
        assert!(scenarios.iter().any(|s| s.usage.app_uses_non_ui_directly));
        assert!(scenarios.iter().any(|s| !s.usage.app_uses_non_ui_directly));
        assert!(scenarios.iter().all(|s| !s.usage.app_uses_ui_directly));
        assert!(scenarios.iter().all(|s| s.usage.app_invokes_library_non_ui));
    }

    #[test]
    fn workaround_pruned_without_old_residue() {
        let clean = AppChoice::new(
            vec![ReferenceChoice::new_direct(LegacyInclusion::JustMain, false)],
            vec![ReferenceChoice::new_direct(LegacyInclusion::JustMain, false)],
        );
        assert!(!clean.should_test_disable_transitive_frameworks_workaround());
        assert!(generate_from(&GeneratorConfig::default(), &[clean])
            .iter()
            .all(|s| !s.disable_transitive_framework_references_after));

        let with_old = AppChoice::new(vec![], vec![ReferenceChoice::old()]);
        assert!(with_old.should_test_disable_transitive_frameworks_workaround());
        let with_old_library = AppChoice::new(vec![], vec![windows_library(false, false)]);
        assert!(with_old_library.should_test_disable_transitive_frameworks_workaround());
    }

    #[test]
    fn library_ui_dimension_needs_ui_in_both_states() {
        let both = AppChoice::new(vec![windows_library(false, true)], vec![windows_library(true, true)]);
        assert!(both.usage_choices().iter().any(|u| u.app_invokes_library_ui));

        let only_after = AppChoice::new(vec![windows_library(false, false)], vec![windows_library(true, true)]);
        assert!(only_after.usage_choices().iter().all(|u| !u.app_invokes_library_ui));
    }

    #[test]
    fn empty_before_list_means_no_library_calls() {
        let choice = AppChoice::new(vec![], vec![windows_library(false, false)]);
        assert!(choice.usage_choices().iter().all(|u| !u.app_invokes_library_non_ui));
    }

    fn arb_reference() -> impl Strategy<Value = ReferenceChoice> {
        prop_oneof![
            Just(ReferenceChoice::old()),
            (0usize..3, any::<bool>())
                .prop_map(|(i, ui)| ReferenceChoice::new_direct(LegacyInclusion::ALL[i], ui)),
            (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(windows, new, ui)| {
                let tfms = if windows { DEFAULT_LIBRARY_TFMS } else { "net8.0" };
                ReferenceChoice::TransitiveViaLibrary(TransitiveViaLibrary::new(TfmList::parse(tfms), new, ui))
            }),
        ]
    }

    fn arb_choice() -> impl Strategy<Value = AppChoice> {
        (
            prop::collection::vec(arb_reference(), 0..3),
            prop::collection::vec(arb_reference(), 1..3),
        )
            .prop_map(|(before, after)| AppChoice::new(before, after))
    }

    proptest! {
        #[test]
        fn ui_flags_only_when_available_in_both_states(choice in arb_choice()) {
            for scenario in generate_from(&GeneratorConfig::default(), std::slice::from_ref(&choice)) {
                if scenario.usage.app_uses_ui_directly {
                    prop_assert!(choice.ui_available_before_and_after());
                }
                if scenario.usage.app_invokes_library_ui {
                    prop_assert!(choice.library_provides_ui_before_and_after());
                }
                if scenario.disable_transitive_framework_references_after {
                    prop_assert!(choice.should_test_disable_transitive_frameworks_workaround());
                }
            }
        }

        #[test]
        fn new_main_only_after_state_is_never_pruned_in(include_count in 1usize..4) {
            let after = vec![ReferenceChoice::new_direct(LegacyInclusion::JustMain, false); include_count];
            let choice = AppChoice::new(vec![ReferenceChoice::old()], after);
            prop_assert!(!choice.should_test_disable_transitive_frameworks_workaround());
        }
    }
}
