//! Testing utilities for the Rx gauntlet workspace
//!
//! Shared fakes and fixtures: a scripted process runner that stands in for
//! the `dotnet` toolchain, and a template tree with minimal projects.

#![allow(missing_docs)]

use gauntlet_build::{
    BuildEnvironment, BuildResult, BuildVerb, Invocation, ProcessOutput, ProcessRunner, Toolchain,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A rule matched against the text of the `.csproj` being built
#[derive(Debug, Clone)]
struct ProjectRule {
    verb: Option<BuildVerb>,
    project_contains: String,
}

impl ProjectRule {
    fn matches(&self, verb: BuildVerb, project_text: &str) -> bool {
        self.verb.map_or(true, |v| v == verb) && project_text.contains(&self.project_contains)
    }
}

#[derive(Debug, Default)]
struct FakeState {
    invocations: Vec<Invocation>,
    failures: Vec<ProjectRule>,
    deploy_wpf: Vec<ProjectRule>,
    deploy_windows_forms: Vec<ProjectRule>,
    program_outputs: Vec<(String, ProcessOutput)>,
    stalled_programs: Vec<String>,
    projects: Vec<(BuildVerb, String)>,
    packed: HashMap<PathBuf, usize>,
}

/// Scripted [`ProcessRunner`] standing in for `dotnet` and built executables
///
/// Toolchain verbs create a `bin/Release` folder in the working directory.
/// `pack` leaves one `.nupkg` behind. Any other program returns exit code 0
/// with empty output unless an output was scripted for it.
#[derive(Debug, Default)]
pub struct FakeProcessRunner {
    state: Mutex<FakeState>,
}

impl FakeProcessRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Exit with code 1 when `verb` runs on a project containing `text`
    pub fn fail_when(&self, verb: Option<BuildVerb>, text: &str) {
        self.state.lock().failures.push(ProjectRule {
            verb,
            project_contains: text.to_string(),
        });
    }

    /// Plant `PresentationFramework.dll` when the project contains `text`
    pub fn deploy_wpf_when(&self, text: &str) {
        self.state.lock().deploy_wpf.push(ProjectRule {
            verb: None,
            project_contains: text.to_string(),
        });
    }

    /// Plant `System.Windows.Forms.dll` when the project contains `text`
    pub fn deploy_windows_forms_when(&self, text: &str) {
        self.state.lock().deploy_windows_forms.push(ProjectRule {
            verb: None,
            project_contains: text.to_string(),
        });
    }

    /// Script the output of any program whose path ends with `suffix`
    pub fn script_program(&self, suffix: &str, output: ProcessOutput) {
        self.state
            .lock()
            .program_outputs
            .push((suffix.to_string(), output));
    }

    /// Lose the output of any program whose path ends with `suffix`
    pub fn stall_program(&self, suffix: &str) {
        self.state.lock().stalled_programs.push(suffix.to_string());
    }

    /// Text of every project `verb` ran on, in invocation order
    pub fn project_texts(&self, verb: BuildVerb) -> Vec<String> {
        self.state
            .lock()
            .projects
            .iter()
            .filter(|(v, _)| *v == verb)
            .map(|(_, text)| text.clone())
            .collect()
    }

    /// Every invocation so far
    pub fn invocations(&self) -> Vec<Invocation> {
        self.state.lock().invocations.clone()
    }

    /// Number of toolchain invocations with `verb`
    pub fn count(&self, verb: BuildVerb) -> usize {
        self.state
            .lock()
            .invocations
            .iter()
            .filter(|i| i.args.first().map(String::as_str) == Some(verb.as_str()))
            .count()
    }

    /// Invocations of programs other than the toolchain
    pub fn executions(&self) -> Vec<Invocation> {
        self.state
            .lock()
            .invocations
            .iter()
            .filter(|i| toolchain_verb(i).is_none())
            .cloned()
            .collect()
    }

    fn run_toolchain(&self, verb: BuildVerb, invocation: &Invocation) -> std::io::Result<ProcessOutput> {
        let dir = invocation
            .working_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let project = invocation.args.last().cloned().unwrap_or_default();
        let project_text = fs::read_to_string(dir.join(&project)).unwrap_or_default();

        let mut state = self.state.lock();
        state.projects.push((verb, project_text.clone()));
        if state.failures.iter().any(|r| r.matches(verb, &project_text)) {
            return Ok(ProcessOutput {
                exit_code: 1,
                stdout: format!("error: scripted failure for {project}"),
                stderr: String::new(),
            });
        }

        let output_dir = dir.join("bin").join("Release");
        fs::create_dir_all(&output_dir)?;
        let deploy_dir = output_dir.join("net8.0").join("win-x64");
        if state.deploy_wpf.iter().any(|r| r.matches(verb, &project_text)) {
            fs::create_dir_all(&deploy_dir)?;
            fs::write(deploy_dir.join("PresentationFramework.dll"), b"")?;
        }
        if state
            .deploy_windows_forms
            .iter()
            .any(|r| r.matches(verb, &project_text))
        {
            fs::create_dir_all(&deploy_dir)?;
            fs::write(deploy_dir.join("System.Windows.Forms.dll"), b"")?;
        }
        if verb == BuildVerb::Pack {
            let count = state.packed.entry(dir.clone()).or_default();
            *count += 1;
            let stem = Path::new(&project)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            fs::write(output_dir.join(format!("{stem}.1.0.{count}.nupkg")), b"")?;
        }

        Ok(ProcessOutput {
            exit_code: 0,
            stdout: format!("{verb} succeeded for {project}"),
            stderr: String::new(),
        })
    }
}

fn toolchain_verb(invocation: &Invocation) -> Option<BuildVerb> {
    if invocation.program_name() != "dotnet" {
        return None;
    }
    match invocation.args.first().map(String::as_str) {
        Some("build") => Some(BuildVerb::Build),
        Some("pack") => Some(BuildVerb::Pack),
        Some("publish") => Some(BuildVerb::Publish),
        Some("restore") => Some(BuildVerb::Restore),
        _ => None,
    }
}

#[async_trait::async_trait]
impl ProcessRunner for FakeProcessRunner {
    async fn run(&self, invocation: &Invocation) -> BuildResult<ProcessOutput> {
        self.state.lock().invocations.push(invocation.clone());

        if let Some(verb) = toolchain_verb(invocation) {
            return self
                .run_toolchain(verb, invocation)
                .map_err(|e| gauntlet_build::BuildError::io_error(&invocation.program, e));
        }

        let program = invocation.program_name();
        let state = self.state.lock();
        if state.stalled_programs.iter().any(|suffix| program.ends_with(suffix.as_str())) {
            return Err(gauntlet_build::BuildError::OutputNotDrained {
                program: invocation.program.display().to_string(),
            });
        }
        Ok(state
            .program_outputs
            .iter()
            .find(|(suffix, _)| program.ends_with(suffix.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_default())
    }
}

/// Build environment using `runner` as `dotnet` with workspaces under `temp_root`
pub fn fake_environment(runner: Arc<FakeProcessRunner>, temp_root: &Path) -> BuildEnvironment {
    BuildEnvironment::new(Toolchain::new("dotnet", runner)).with_temp_root(temp_root)
}

pub const APP_CSPROJ: &str = r#"<Project Sdk="Microsoft.NET.Sdk">
  <PropertyGroup>
    <OutputType>Exe</OutputType>
    <TargetFramework>net8.0</TargetFramework>
    <RuntimeIdentifier>win-x64</RuntimeIdentifier>
    <_ScenarioDefineConstants></_ScenarioDefineConstants>
    <_ScenarioWindowsDefineConstants></_ScenarioWindowsDefineConstants>
  </PropertyGroup>
  <ItemGroup>
    <ProjectReference Include="..\Transitive.Lib.UsesRx\Transitive.Lib.UsesRx.csproj" />
  </ItemGroup>
</Project>
"#;

pub const LIBRARY_CSPROJ: &str = r#"<Project Sdk="Microsoft.NET.Sdk">
  <PropertyGroup>
    <TargetFrameworks>net8.0</TargetFrameworks>
    <_ScenarioWindowsDefineConstants>UseUiFrameworkSpecificRx</_ScenarioWindowsDefineConstants>
  </PropertyGroup>
  <ItemGroup>
    <PackageReference Include="System.Reactive" Version="6.0.1" />
  </ItemGroup>
</Project>
"#;

pub const CONSOLE_CSPROJ: &str = r#"<Project Sdk="Microsoft.NET.Sdk">
  <PropertyGroup>
    <OutputType>Exe</OutputType>
    <TargetFramework>net8.0</TargetFramework>
    <RuntimeIdentifier>win-x64</RuntimeIdentifier>
    <SelfContained>true</SelfContained>
  </PropertyGroup>
  <ItemGroup>
    <PackageReference Include="System.Reactive" Version="6.0.1" />
  </ItemGroup>
</Project>
"#;

pub const PLUG_IN_CSPROJ: &str = r#"<Project Sdk="Microsoft.NET.Sdk">
  <PropertyGroup>
    <TargetFramework>net8.0</TargetFramework>
  </PropertyGroup>
  <ItemGroup>
    <PackageReference Include="System.Reactive" Version="6.0.1" />
  </ItemGroup>
  <ItemGroup>
    <ProjectReference Include="..\PlugIn.Api\PlugIn.Api.csproj" />
  </ItemGroup>
</Project>
"#;

/// Template tree laid out the way the checks expect to find it
#[derive(Debug)]
pub struct TemplateFixture {
    dir: TempDir,
}

impl TemplateFixture {
    pub fn new() -> std::io::Result<Self> {
        let dir = tempfile::tempdir()?;
        let fixture = Self { dir };
        fixture.write("TransitiveReferences/Transitive.App/Transitive.App.csproj", APP_CSPROJ)?;
        fixture.write("TransitiveReferences/Transitive.App/Program.cs", "class Program {}\n")?;
        fixture.write(
            "TransitiveReferences/Transitive.Lib.UsesRx/Transitive.Lib.UsesRx.csproj",
            LIBRARY_CSPROJ,
        )?;
        fixture.write("TransitiveReferences/Transitive.Lib.UsesRx/RxLib.cs", "class RxLib {}\n")?;
        fixture.write(
            "Bloat/Bloat.ConsoleWinRtTemplate/Bloat.ConsoleWinRtTemplate.csproj",
            CONSOLE_CSPROJ,
        )?;
        fixture.write("Bloat/Bloat.ConsoleWinRtTemplate/Program.cs", "class Program {}\n")?;
        fixture.write(
            "ExtensionMethods/ExtensionMethods.DisableTransitiveWorkaroundFail/ExtensionMethods.DisableTransitiveWorkaroundFail.csproj",
            CONSOLE_CSPROJ,
        )?;
        fixture.write("PlugIns/PlugIn/PlugIn.csproj", PLUG_IN_CSPROJ)?;
        fixture.write("PlugIns/PlugIn/PlugInEntryPoint.cs", "class PlugInEntryPoint {}\n")?;
        Ok(fixture)
    }

    /// Add built host executables for each of `host_tfms`
    pub fn with_plug_in_hosts(self, host_tfms: &[&str]) -> std::io::Result<Self> {
        for tfm in host_tfms {
            let launcher = if tfm.contains('.') {
                "PlugIn.HostDotnet"
            } else {
                "PlugIn.HostNetFx"
            };
            self.write(
                &format!("PlugIns/{launcher}/bin/Release/{tfm}/{launcher}.exe"),
                "",
            )?;
        }
        Ok(self)
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, relative: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }
}
