//! Auxiliary package builds and app builds against a local feed
//!
//! [`ComponentBuilder`] owns a local package feed directory. Libraries packed
//! with [`ComponentBuilder::build_local_package`] land in that feed, and apps
//! built with [`ComponentBuilder::build_app`] see it as their first package
//! source. The feed lives as long as the builder.

use crate::error::{BuildError, BuildResult};
use crate::package::PackageSource;
use crate::project::ProjectEdits;
use crate::workspace::{BuildEnvironment, BuildOutput, Workspace};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{info, warn};
use walkdir::WalkDir;

const PACKAGE_TEMP_FOLDER_NAME: &str = "PackageBuild";
const LOCAL_FEED_TEMP_FOLDER_NAME: &str = "LocalNuGet";

/// Feed key under which freshly packed packages are offered to apps
pub const LOCAL_FEED_NAME: &str = "DynamicallyBuiltPackages";

/// A built app and the workspace that still holds its output
#[derive(Debug)]
pub struct BuiltComponent {
    /// Build result
    pub output: BuildOutput,
    /// Owning workspace, to be closed once the output has been inspected
    pub workspace: Workspace,
}

impl BuiltComponent {
    /// Release the workspace
    pub fn close(self) -> BuildResult<()> {
        self.workspace.close()
    }
}

/// Builds packages into a private feed and apps that consume them
#[derive(Debug)]
pub struct ComponentBuilder {
    env: BuildEnvironment,
    app_temp_folder_name: String,
    package_sources: Vec<PackageSource>,
    feed: TempDir,
}

impl ComponentBuilder {
    /// Create a builder with a new, empty local feed.
    ///
    /// `package_sources` are offered to every build after nuget.org.
    pub fn new(
        env: BuildEnvironment,
        app_temp_folder_name: impl Into<String>,
        package_sources: Vec<PackageSource>,
    ) -> BuildResult<Self> {
        let feed = env.create_temp_dir(LOCAL_FEED_TEMP_FOLDER_NAME)?;
        Ok(Self {
            env,
            app_temp_folder_name: app_temp_folder_name.into(),
            package_sources,
            feed,
        })
    }

    /// Directory of the local feed
    #[inline]
    #[must_use]
    pub fn feed_dir(&self) -> &Path {
        self.feed.path()
    }

    /// Build environment shared by every workspace
    #[inline]
    #[must_use]
    pub fn environment(&self) -> &BuildEnvironment {
        &self.env
    }

    /// Pack `template_project` and copy the resulting `.nupkg` into the feed.
    ///
    /// A failed pack is returned as data. A successful pack that leaves zero
    /// or several packages behind is an error.
    pub async fn build_local_package(
        &self,
        template_project: &Path,
        edits: &ProjectEdits,
    ) -> BuildResult<BuildOutput> {
        let (folder, project) = split_project_path(template_project)?;
        let workspace = Workspace::create(
            &self.env,
            folder,
            PACKAGE_TEMP_FOLDER_NAME,
            edits,
            &self.package_sources,
        )?;

        let output = workspace.run_pack(project).await?;
        if output.succeeded() {
            let package = single_package(&output.output_dir)?;
            let file_name = package
                .file_name()
                .ok_or_else(|| BuildError::PackOutput(format!("unnamed package at {}", package.display())))?;
            let destination = self.feed_dir().join(file_name);
            fs::copy(&package, &destination).map_err(|e| BuildError::io_error(&destination, e))?;
            info!(package = %destination.display(), "added package to local feed");
        } else {
            warn!(project, exit_code = output.exit_code, "pack failed");
        }

        workspace.close()?;
        Ok(output)
    }

    /// Build `template_project` with the local feed as its first package source
    pub async fn build_app(&self, template_project: &Path, edits: &ProjectEdits) -> BuildResult<BuiltComponent> {
        let (folder, project) = split_project_path(template_project)?;
        let mut sources = Vec::with_capacity(self.package_sources.len() + 1);
        sources.push(PackageSource::new(
            LOCAL_FEED_NAME,
            self.feed_dir().to_string_lossy(),
        ));
        sources.extend(self.package_sources.iter().cloned());

        let workspace = Workspace::create(&self.env, folder, &self.app_temp_folder_name, edits, &sources)?;
        let output = workspace.run_build(project).await?;
        Ok(BuiltComponent { output, workspace })
    }

    /// Delete the local feed now
    pub fn close(self) -> BuildResult<()> {
        let path = self.feed.path().to_path_buf();
        self.feed.close().map_err(|e| BuildError::io_error(path, e))
    }
}

fn split_project_path(template_project: &Path) -> BuildResult<(&Path, &str)> {
    let invalid = || {
        BuildError::io_error(
            template_project,
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "template project path must name a project file inside a folder",
            ),
        )
    };
    let folder = template_project.parent().ok_or_else(invalid)?;
    let file = template_project
        .file_name()
        .and_then(|f| f.to_str())
        .ok_or_else(invalid)?;
    Ok((folder, file))
}

fn single_package(output_dir: &Path) -> BuildResult<PathBuf> {
    let packages: Vec<PathBuf> = WalkDir::new(output_dir)
        .into_iter()
        .flatten()
        .filter(|e| {
            e.file_type().is_file()
                && e.path()
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("nupkg"))
        })
        .map(walkdir::DirEntry::into_path)
        .collect();

    match packages.as_slice() {
        [] => Err(BuildError::PackOutput(
            "No .nupkg file found after packing the project".to_string(),
        )),
        [single] => Ok(single.clone()),
        _ => Err(BuildError::PackOutput(
            "Multiple .nupkg files found after packing the project".to_string(),
        )),
    }
}
