//! Error types for the checks
//!
//! Build and execution failures of the code under test are data and never
//! appear here. These are the conditions under which a scenario, or a whole
//! check, cannot produce a meaningful record.

use gauntlet_build::{BuildError, ConfigurationError, ParsePackageError};

/// Check error type
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    /// Cloning, building or launching failed
    #[error(transparent)]
    Build(#[from] BuildError),

    /// Requested Rx package combination is structurally invalid
    #[error("resolution error: {0}")]
    Resolution(String),

    /// An auxiliary library package did not build
    #[error("Unexpected failure when building NuGet package {assembly_name} to be consumed by test app")]
    AuxiliaryPackageFailed {
        /// Assembly name of the library
        assembly_name: String,
        /// Toolchain output of the failed pack
        stdout: String,
    },

    /// Required fixture, host or output location is missing or unusable
    #[error("orchestration error: {0}")]
    Orchestration(String),

    /// Plug-in host wrote something other than the expected report
    #[error("could not parse host output: {message}")]
    HostOutput {
        /// Parser message
        message: String,
        /// Raw host standard output
        stdout: String,
    },

    /// Command line or configuration value is unusable
    #[error("invalid setting: {0}")]
    Settings(String),

    /// Package target frameworks could not be read
    #[error("package catalog error: {0}")]
    Catalog(String),

    /// Result file could not be written
    #[error("failed to write results: {0}")]
    Output(#[from] std::io::Error),

    /// Result record could not be serialized
    #[error("failed to serialize result: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl CheckError {
    /// Create resolution error
    pub fn resolution(message: impl Into<String>) -> Self {
        Self::Resolution(message.into())
    }

    /// Create orchestration error
    pub fn orchestration(message: impl Into<String>) -> Self {
        Self::Orchestration(message.into())
    }

    /// Errors confined to one scenario.
    ///
    /// These are logged and the matrix moves on. Everything else stops the
    /// check.
    #[must_use]
    pub fn is_data_level(&self) -> bool {
        matches!(
            self,
            Self::Build(BuildError::OutputNotDrained { .. })
                | Self::AuxiliaryPackageFailed { .. }
                | Self::HostOutput { .. }
        )
    }

    /// Errors after which no further scenario can succeed
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Output(_) | Self::Serialize(_) | Self::Catalog(_) | Self::Resolution(_) | Self::Settings(_)
        )
    }
}

impl From<ConfigurationError> for CheckError {
    fn from(err: ConfigurationError) -> Self {
        Self::Build(err.into())
    }
}

impl From<ParsePackageError> for CheckError {
    fn from(err: ParsePackageError) -> Self {
        Self::Resolution(err.to_string())
    }
}

/// Result type alias for checks
pub type CheckResult<T> = Result<T, CheckError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_failure_is_data_level() {
        let err: CheckError = BuildError::OutputNotDrained {
            program: "Transitive.App.exe".into(),
        }
        .into();
        assert!(err.is_data_level());
        assert!(!err.is_fatal());
    }

    #[test]
    fn configuration_error_is_neither_data_nor_fatal() {
        let err: CheckError = ConfigurationError::missing_node("/Project/PropertyGroup/TargetFramework").into();
        assert!(!err.is_data_level());
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("Did not find"));
    }

    #[test]
    fn parse_error_becomes_resolution() {
        let err: CheckError = "nope".parse::<gauntlet_build::PackageIdAndVersion>().unwrap_err().into();
        assert!(matches!(err, CheckError::Resolution(_)));
        assert!(err.is_fatal());
    }
}
