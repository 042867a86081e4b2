//! Scenario generation
//!
//! Every generator is a pure function of its inputs: calling it twice yields
//! the same scenarios in the same order.

pub mod bloat;
pub mod extension_method;
pub mod plugin;
pub mod transitive;

pub use bloat::BloatScenario;
pub use extension_method::ExtensionMethodScenario;
pub use plugin::{PlugInDescriptor, PlugInScenario};
pub use transitive::{AppChoice, GeneratorConfig, TransitiveScenario};

const BOOLS: [bool; 2] = [false, true];
const JUST_FALSE: [bool; 1] = [false];
const OPTIONAL_BOOLS: [Option<bool>; 3] = [None, Some(true), Some(false)];

/// `[false, true]` when `vary`, else `[false]`
pub(crate) fn bools_if(vary: bool) -> &'static [bool] {
    if vary {
        &BOOLS
    } else {
        &JUST_FALSE
    }
}

/// `{base}-{windows_version}`, or just `base`
#[must_use]
pub fn target_framework(base_tfm: &str, windows_version: Option<&str>) -> String {
    match windows_version {
        Some(version) => format!("{base_tfm}-{version}"),
        None => base_tfm.to_string(),
    }
}
