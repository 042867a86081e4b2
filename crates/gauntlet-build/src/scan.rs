//! Detection of UI framework assemblies in build output

use serde::Serialize;
use std::path::Path;
use walkdir::WalkDir;

/// File whose presence means WPF was deployed
pub const WPF_MARKER: &str = "PresentationFramework.dll";

/// File whose presence means Windows Forms was deployed
pub const WINDOWS_FORMS_MARKER: &str = "System.Windows.Forms.dll";

/// Which UI frameworks ended up in an output tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiFrameworkComponents {
    /// `PresentationFramework.dll` found
    pub wpf: bool,
    /// `System.Windows.Forms.dll` found
    pub windows_forms: bool,
}

/// Walk `dir` recursively and compare file names case-insensitively.
///
/// A missing directory, as left by a failed build, reports nothing deployed.
#[must_use]
pub fn check_for_ui_components(dir: &Path) -> UiFrameworkComponents {
    let mut found = UiFrameworkComponents::default();
    for entry in WalkDir::new(dir).into_iter().flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name.eq_ignore_ascii_case(WPF_MARKER) {
            found.wpf = true;
        }
        if name.eq_ignore_ascii_case(WINDOWS_FORMS_MARKER) {
            found.windows_forms = true;
        }
        if found.wpf && found.windows_forms {
            break;
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_wpf_three_levels_deep() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("net8.0").join("win-x64").join("publish");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join(WPF_MARKER), b"").unwrap();

        let found = check_for_ui_components(dir.path());
        assert!(found.wpf);
        assert!(!found.windows_forms);
    }

    #[test]
    fn matches_names_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("system.windows.forms.DLL"), b"").unwrap();
        assert_eq!(
            check_for_ui_components(dir.path()),
            UiFrameworkComponents {
                wpf: false,
                windows_forms: true
            }
        );
    }

    #[test]
    fn directory_named_like_marker_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(WPF_MARKER)).unwrap();
        assert!(!check_for_ui_components(dir.path()).wpf);
    }

    #[test]
    fn missing_directory_reports_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let found = check_for_ui_components(&dir.path().join("bin").join("Release"));
        assert_eq!(found, UiFrameworkComponents::default());
    }
}
