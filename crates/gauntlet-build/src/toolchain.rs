//! The external `dotnet` toolchain

use crate::error::BuildResult;
use crate::process::{Invocation, ProcessOutput, ProcessRunner};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Toolchain verb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildVerb {
    /// `dotnet build`
    Build,
    /// `dotnet pack`
    Pack,
    /// `dotnet publish`
    Publish,
    /// `dotnet restore`
    Restore,
}

impl BuildVerb {
    /// Command-line spelling
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Pack => "pack",
            Self::Publish => "publish",
            Self::Restore => "restore",
        }
    }

    /// Whether the verb takes a build configuration
    #[must_use]
    pub fn takes_configuration(self) -> bool {
        !matches!(self, Self::Restore)
    }
}

impl fmt::Display for BuildVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build configuration passed to every build, pack and publish
pub const CONFIGURATION: &str = "Release";

/// Handle on the `dotnet` executable plus the runner that launches it
#[derive(Clone)]
pub struct Toolchain {
    program: PathBuf,
    runner: Arc<dyn ProcessRunner>,
}

impl fmt::Debug for Toolchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Toolchain")
            .field("program", &self.program)
            .finish_non_exhaustive()
    }
}

impl Toolchain {
    /// Create for `program` launched through `runner`
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            program: program.into(),
            runner,
        }
    }

    /// Path of the toolchain executable
    #[inline]
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Underlying process runner, also used to launch built executables
    #[inline]
    #[must_use]
    pub fn runner(&self) -> &Arc<dyn ProcessRunner> {
        &self.runner
    }

    /// Command line for `verb` on `project`, run inside `working_dir`
    #[must_use]
    pub fn invocation(&self, verb: BuildVerb, project: &str, working_dir: &Path) -> Invocation {
        let mut invocation = Invocation::new(&self.program).arg(verb.as_str());
        if verb.takes_configuration() {
            invocation = invocation.args(["-c", CONFIGURATION]);
        }
        invocation.arg(project).in_dir(working_dir)
    }

    /// Run `verb` on `project`
    pub async fn run(&self, verb: BuildVerb, project: &str, working_dir: &Path) -> BuildResult<ProcessOutput> {
        info!(%verb, project, dir = %working_dir.display(), "running toolchain");
        self.runner
            .run(&self.invocation(verb, project, working_dir))
            .await
    }
}
