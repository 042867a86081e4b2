//! Error types for build plumbing
//!
//! A non-zero toolchain exit code is never an error here. It is reported
//! through [`crate::BuildOutput`] and judged by the caller.

use std::path::PathBuf;

/// Template project does not match what the rewriter expects
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// Expected anchor node is absent
    #[error("Did not find '{path}'")]
    MissingNode {
        /// Path of the node that was looked for
        path: String,
    },

    /// Project file is not well-formed XML
    #[error("invalid project xml: {message}")]
    InvalidXml {
        /// Parser message
        message: String,
    },
}

impl ConfigurationError {
    /// Create missing-node error for a node path
    pub fn missing_node(path: impl Into<String>) -> Self {
        Self::MissingNode { path: path.into() }
    }
}

impl From<roxmltree::Error> for ConfigurationError {
    fn from(err: roxmltree::Error) -> Self {
        Self::InvalidXml {
            message: err.to_string(),
        }
    }
}

/// Errors from cloning, building and running
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Template rewrite failed
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Filesystem operation failed
    #[error("io error at {path}: {source}")]
    Io {
        /// Path being read or written
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// Child process could not be started
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// Program that was launched
        program: String,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// Child output streams did not finish within the grace period
    #[error("Did not get output from program {program}")]
    OutputNotDrained {
        /// Program whose output was lost
        program: String,
    },

    /// Pack did not leave exactly one package behind
    #[error("{0}")]
    PackOutput(String),
}

impl BuildError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error means the template and rewriter disagree
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Result type alias for build operations
pub type BuildResult<T> = Result<T, BuildError>;
