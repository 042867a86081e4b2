//! Isolated, temporary clones of template projects
//!
//! A [`Workspace`] owns its directory. Build outputs stay readable until the
//! caller releases the workspace with [`Workspace::close`]; dropping it
//! without closing still removes the directory.

use crate::error::{BuildError, BuildResult};
use crate::package::PackageSource;
use crate::project::ProjectEdits;
use crate::toolchain::{BuildVerb, Toolchain, CONFIGURATION};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// Public feed that every generated `NuGet.config` keeps
pub const NUGET_ORG: &str = "https://api.nuget.org/v3/index.json";

/// Toolchain plus the directory that workspaces are created under
#[derive(Debug, Clone)]
pub struct BuildEnvironment {
    toolchain: Toolchain,
    temp_root: PathBuf,
}

impl BuildEnvironment {
    /// Create using `{system temp}/RxGauntlet` as the root
    #[must_use]
    pub fn new(toolchain: Toolchain) -> Self {
        Self {
            toolchain,
            temp_root: std::env::temp_dir().join(crate::TEMP_FOLDER_NAME),
        }
    }

    /// Override the temp root
    #[inline]
    #[must_use]
    pub fn with_temp_root(mut self, temp_root: impl Into<PathBuf>) -> Self {
        self.temp_root = temp_root.into();
        self
    }

    /// The toolchain
    #[inline]
    #[must_use]
    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    /// Root under which workspaces and local feeds are created
    #[inline]
    #[must_use]
    pub fn temp_root(&self) -> &Path {
        &self.temp_root
    }

    /// Create a fresh timestamped directory under `{temp_root}/{parent_name}`
    pub fn create_temp_dir(&self, parent_name: &str) -> BuildResult<TempDir> {
        let parent = self.temp_root.join(parent_name);
        fs::create_dir_all(&parent).map_err(|e| BuildError::io_error(&parent, e))?;
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        tempfile::Builder::new()
            .prefix(&format!("{stamp}-"))
            .tempdir_in(&parent)
            .map_err(|e| BuildError::io_error(&parent, e))
    }
}

/// Outcome of one toolchain invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    /// Toolchain exit code
    pub exit_code: i32,
    /// `bin/Release` of the workspace
    pub output_dir: PathBuf,
    /// Captured toolchain output
    pub stdout: String,
}

impl BuildOutput {
    /// Zero exit code
    #[inline]
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// A modified clone of a template project
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    toolchain: Toolchain,
}

impl Workspace {
    /// Clone `template_dir` into a new directory under `temp_parent_name`.
    ///
    /// Top-level `.cs` files are copied verbatim and every `.csproj` is
    /// rewritten with `edits`. When `sources` is non-empty a `NuGet.config`
    /// is written that clears inherited feeds, keeps nuget.org, and adds
    /// `sources` in order. On failure the directory is removed.
    pub fn create(
        env: &BuildEnvironment,
        template_dir: &Path,
        temp_parent_name: &str,
        edits: &ProjectEdits,
        sources: &[PackageSource],
    ) -> BuildResult<Self> {
        let dir = env.create_temp_dir(temp_parent_name)?;
        debug!(template = %template_dir.display(), clone = %dir.path().display(), "cloning template");

        let entries = fs::read_dir(template_dir).map_err(|e| BuildError::io_error(template_dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| BuildError::io_error(template_dir, e))?;
            let source = entry.path();
            if !source.is_file() {
                continue;
            }
            let destination = dir.path().join(entry.file_name());
            let extension = source
                .extension()
                .map(|e| e.to_string_lossy().to_ascii_lowercase());
            match extension.as_deref() {
                Some("cs") => {
                    fs::copy(&source, &destination).map_err(|e| BuildError::io_error(&source, e))?;
                }
                Some("csproj") => {
                    let text = fs::read_to_string(&source).map_err(|e| BuildError::io_error(&source, e))?;
                    let rewritten = edits.rewrite(&text)?;
                    fs::write(&destination, rewritten).map_err(|e| BuildError::io_error(&destination, e))?;
                }
                _ => {}
            }
        }

        if !sources.is_empty() {
            let config = dir.path().join("NuGet.config");
            fs::write(&config, nuget_config(sources)).map_err(|e| BuildError::io_error(&config, e))?;
        }

        Ok(Self {
            dir,
            toolchain: env.toolchain().clone(),
        })
    }

    /// Root of the clone
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// `bin/Release` inside the clone
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.path().join("bin").join(CONFIGURATION)
    }

    /// `dotnet build -c Release {project}`
    pub async fn run_build(&self, project: &str) -> BuildResult<BuildOutput> {
        self.run(BuildVerb::Build, project).await
    }

    /// `dotnet pack -c Release {project}`
    pub async fn run_pack(&self, project: &str) -> BuildResult<BuildOutput> {
        self.run(BuildVerb::Pack, project).await
    }

    /// `dotnet publish -c Release {project}`
    pub async fn run_publish(&self, project: &str) -> BuildResult<BuildOutput> {
        self.run(BuildVerb::Publish, project).await
    }

    /// `dotnet restore {project}`
    pub async fn run_restore(&self, project: &str) -> BuildResult<BuildOutput> {
        self.run(BuildVerb::Restore, project).await
    }

    async fn run(&self, verb: BuildVerb, project: &str) -> BuildResult<BuildOutput> {
        let output = self.toolchain.run(verb, project, self.path()).await?;
        let result = BuildOutput {
            exit_code: output.exit_code,
            output_dir: self.output_dir(),
            stdout: output.stdout,
        };
        info!(%verb, project, exit_code = result.exit_code, "toolchain finished");
        Ok(result)
    }

    /// Delete the clone now
    pub fn close(self) -> BuildResult<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().map_err(|e| BuildError::io_error(path, e))
    }
}

fn nuget_config(sources: &[PackageSource]) -> String {
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<configuration>\n  <packageSources>\n    <clear />\n",
    );
    let _ = writeln!(out, "    <add key=\"nuget.org\" value=\"{NUGET_ORG}\" />");
    for source in sources {
        let _ = writeln!(
            out,
            "    <add key=\"{}\" value=\"{}\" />",
            crate::xml::escape(&source.name),
            crate::xml::escape(&source.location)
        );
    }
    out.push_str("  </packageSources>\n</configuration>\n");
    out
}
