//! Usage flags to conditional compilation symbols
//!
//! The template projects compile optional code paths depending on the
//! `_ScenarioDefineConstants` (all targets) and
//! `_ScenarioWindowsDefineConstants` (Windows targets only) properties.

use serde::Serialize;

/// Property holding symbols defined for every target
pub const DEFINE_CONSTANTS_PROPERTY: &str = "_ScenarioDefineConstants";

/// Property holding symbols defined for Windows targets only
pub const WINDOWS_DEFINE_CONSTANTS_PROPERTY: &str = "_ScenarioWindowsDefineConstants";

/// What the test app's own code does with Rx
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageFlags {
    /// App code uses non-UI Rx features directly
    pub app_uses_non_ui_directly: bool,
    /// App code uses UI-framework-specific Rx features directly
    pub app_uses_ui_directly: bool,
    /// App calls a library method that uses non-UI Rx features
    pub app_invokes_library_non_ui: bool,
    /// App calls a library method that uses UI-framework-specific Rx features
    pub app_invokes_library_ui: bool,
}

/// Define-constant values for one project
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefineConstants {
    /// Symbols for all targets
    pub all_targets: Vec<&'static str>,
    /// Symbols for Windows targets
    pub windows_targets: Vec<&'static str>,
}

impl DefineConstants {
    /// `;`-joined value for [`DEFINE_CONSTANTS_PROPERTY`]
    #[must_use]
    pub fn all_targets_value(&self) -> String {
        self.all_targets.join(";")
    }

    /// `;`-joined value for [`WINDOWS_DEFINE_CONSTANTS_PROPERTY`]
    #[must_use]
    pub fn windows_targets_value(&self) -> String {
        self.windows_targets.join(";")
    }
}

const APP_ALL_TARGETS: [(fn(&UsageFlags) -> bool, &str); 2] = [
    (|f| f.app_uses_non_ui_directly, "UseNonUiFrameworkSpecificRxDirectly"),
    (
        |f| f.app_invokes_library_non_ui,
        "InvokeLibraryMethodThatUsesNonFrameworkSpecificRxFeature",
    ),
];

const APP_WINDOWS_TARGETS: [(fn(&UsageFlags) -> bool, &str); 2] = [
    (|f| f.app_uses_ui_directly, "UseUiFrameworkSpecificRxDirectly"),
    (
        |f| f.app_invokes_library_ui,
        "InvokeLibraryMethodThatUsesUiFrameworkSpecificRxFeature",
    ),
];

/// Symbol that compiles the library's UI code path on Windows targets
pub const LIBRARY_UI_SYMBOL: &str = "UseUiFrameworkSpecificRx";

/// Symbols for the test app
#[must_use]
pub fn app_define_constants(flags: &UsageFlags) -> DefineConstants {
    let pick = |table: &[(fn(&UsageFlags) -> bool, &'static str)]| {
        table
            .iter()
            .filter(|(enabled, _)| enabled(flags))
            .map(|(_, symbol)| *symbol)
            .collect()
    };
    DefineConstants {
        all_targets: pick(&APP_ALL_TARGETS),
        windows_targets: pick(&APP_WINDOWS_TARGETS),
    }
}

/// Symbols for the intermediate library
#[must_use]
pub fn library_define_constants(exposes_ui_feature: bool) -> DefineConstants {
    DefineConstants {
        all_targets: Vec::new(),
        windows_targets: if exposes_ui_feature {
            vec![LIBRARY_UI_SYMBOL]
        } else {
            Vec::new()
        },
    }
}
