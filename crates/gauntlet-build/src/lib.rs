//! Build plumbing for the Rx gauntlet
//!
//! Clones template projects into isolated workspaces, rewrites their project
//! files, and drives the external `dotnet` toolchain:
//!
//! - [`project`] edits `.csproj` documents in place, failing fast on drifted templates
//! - [`workspace`] owns a temporary clone and its build invocations
//! - [`builder`] packs auxiliary libraries into a local feed and builds apps against it
//! - [`scan`] inspects build output for deployed UI frameworks

pub mod builder;
pub mod error;
pub mod package;
pub mod process;
pub mod project;
pub mod scan;
pub mod toolchain;
pub mod workspace;
mod xml;

pub use builder::{BuiltComponent, ComponentBuilder};
pub use error::{BuildError, BuildResult, ConfigurationError};
pub use package::{PackageIdAndVersion, PackageSource, ParsePackageError};
pub use process::{Invocation, ProcessOutput, ProcessRunner, SystemProcessRunner};
pub use project::{PackageReplacement, ProjectEdits, ProjectFileRewriter};
pub use scan::{check_for_ui_components, UiFrameworkComponents};
pub use toolchain::{BuildVerb, Toolchain};
pub use workspace::{BuildEnvironment, BuildOutput, Workspace};

/// Name of the folder under the temp root that every workspace lives in
pub const TEMP_FOLDER_NAME: &str = "RxGauntlet";

/// Default grace period for draining child output after exit
pub const DEFAULT_DRAIN_GRACE: std::time::Duration = std::time::Duration::from_secs(2);
