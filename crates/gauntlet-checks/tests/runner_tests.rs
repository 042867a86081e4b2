//! Check runners driven end to end against a scripted toolchain

use gauntlet_build::{BuildVerb, PackageIdAndVersion, ProcessOutput};
use gauntlet_checks::error::CheckError;
use gauntlet_checks::reference::{LegacyInclusion, ReferenceChoice, TfmList, TransitiveViaLibrary};
use gauntlet_checks::result::TestDetails;
use gauntlet_checks::runner::{
    run_matrix, BloatRunner, ExtensionMethodRunner, PlugInConflictRunner, ScenarioRunner, TransitiveReferenceRunner,
};
use gauntlet_checks::scenario::transitive::{AppChoice, DEFAULT_LIBRARY_TFMS};
use gauntlet_checks::scenario::{self, GeneratorConfig, PlugInDescriptor, PlugInScenario};
use gauntlet_checks::symbols::{LIBRARY_UI_SYMBOL, WINDOWS_DEFINE_CONSTANTS_PROPERTY};
use gauntlet_checks::{HarnessConfig, JsonArrayWriter, RxPackageSet};
use gauntlet_test_utils::{fake_environment, FakeProcessRunner, TemplateFixture};
use serde_json::Value;
use std::collections::HashSet;

fn details() -> TestDetails {
    TestDetails {
        test_run_id: "run-1".into(),
        test_run_date_time: "2025-01-02T03:04:05+00:00".into(),
    }
}

fn candidate() -> RxPackageSet {
    RxPackageSet::from_packages(
        vec![
            PackageIdAndVersion::new("System.Reactive.Net", "7.0.0-preview.1"),
            PackageIdAndVersion::new("System.Reactive.For.Wpf", "7.0.0-preview.1"),
        ],
        Some(PackageIdAndVersion::new("System.Reactive", "7.0.0-preview.1")),
        None,
    )
    .unwrap()
}

fn records(writer: JsonArrayWriter<Vec<u8>>) -> Vec<Value> {
    let bytes = writer.finish().unwrap();
    match serde_json::from_slice(&bytes).unwrap() {
        Value::Array(items) => items,
        other => panic!("expected an array, got {other}"),
    }
}

#[tokio::test]
async fn transitive_packs_each_library_once() {
    let fixture = TemplateFixture::new().unwrap();
    let temp = tempfile::tempdir().unwrap();
    let fake = FakeProcessRunner::new();
    let config = HarnessConfig::new().with_templates_root(fixture.root());

    let mut runner = TransitiveReferenceRunner::new(
        fake_environment(fake.clone(), temp.path()),
        config.transitive_app_project(),
        config.transitive_library_project(),
        candidate(),
        details(),
    )
    .unwrap();

    let scenarios: Vec<_> = scenario::transitive::generate(&GeneratorConfig::default())
        .into_iter()
        .filter(|s| s.libraries().next().is_some())
        .take(12)
        .collect();
    let distinct: HashSet<_> = scenarios.iter().flat_map(|s| s.libraries().cloned()).collect();

    let mut writer = JsonArrayWriter::new(Vec::new()).unwrap();
    let summary = run_matrix(&mut runner, &scenarios, &mut writer).await.unwrap();

    assert_eq!(summary.completed, scenarios.len());
    assert_eq!(fake.count(BuildVerb::Pack), distinct.len());
    assert_eq!(fake.count(BuildVerb::Build), scenarios.len() * 2);
    // Every successful build is run exactly once
    assert_eq!(fake.executions().len(), scenarios.len() * 2);
    assert!(fake
        .executions()
        .iter()
        .all(|i| i.program.ends_with("net8.0-windows10.0.19041/win-x64/Transitive.App.exe")));

    let items = records(writer);
    assert_eq!(items.len(), scenarios.len());
    assert_eq!(items[0]["testRunId"], "run-1");
    assert_eq!(items[0]["resultsBefore"]["buildSucceeded"], true);
    assert_eq!(items[0]["resultsBefore"]["executionExitCode"], 0);
    assert!(items[0]["resultsBefore"].get("buildStdOut").is_none());

    runner.close().unwrap();
}

/// Text of the first `<name>` element in a project file
fn property<'a>(project: &'a str, name: &str) -> &'a str {
    let open = format!("<{name}>");
    let start = project.find(&open).map(|i| i + open.len()).unwrap_or(project.len());
    let len = project[start..].find('<').unwrap_or(0);
    &project[start..start + len]
}

#[tokio::test]
async fn library_ui_symbol_only_when_ui_is_exposed() {
    let fixture = TemplateFixture::new().unwrap();
    let temp = tempfile::tempdir().unwrap();
    let fake = FakeProcessRunner::new();
    let config = HarnessConfig::new().with_templates_root(fixture.root());

    let mut runner = TransitiveReferenceRunner::new(
        fake_environment(fake.clone(), temp.path()),
        config.transitive_app_project(),
        config.transitive_library_project(),
        candidate(),
        details(),
    )
    .unwrap();

    let library = |exposes_ui| {
        ReferenceChoice::TransitiveViaLibrary(TransitiveViaLibrary::new(
            TfmList::parse(DEFAULT_LIBRARY_TFMS),
            true,
            exposes_ui,
        ))
    };
    let choices: Vec<_> = [true, false]
        .into_iter()
        .map(|exposes_ui| {
            AppChoice::new(
                vec![library(exposes_ui)],
                vec![library(exposes_ui), ReferenceChoice::new_direct(LegacyInclusion::JustMain, false)],
            )
        })
        .collect();
    let scenarios = scenario::transitive::generate_from(&GeneratorConfig::default(), &choices);

    let mut writer = JsonArrayWriter::new(Vec::new()).unwrap();
    let summary = run_matrix(&mut runner, &scenarios, &mut writer).await.unwrap();
    assert_eq!(summary.completed, scenarios.len());
    assert_eq!(summary.errors, 0);

    let packed = fake.project_texts(BuildVerb::Pack);
    assert_eq!(packed.len(), 2);
    for project in &packed {
        let exposes_ui = project.contains("Transitive.Lib.UsesRx.New.Ui.");
        assert_eq!(
            property(project, WINDOWS_DEFINE_CONSTANTS_PROPERTY).contains(LIBRARY_UI_SYMBOL),
            exposes_ui,
            "{project}"
        );
    }
    assert_eq!(
        packed
            .iter()
            .filter(|p| p.contains("Transitive.Lib.UsesRx.New.Ui."))
            .count(),
        1
    );

    for (scenario, item) in scenarios.iter().zip(records(writer)) {
        let exposes_ui = scenario.libraries().any(|l| l.library_exposes_ui_feature);
        assert_eq!(item["config"]["after"]["transitiveRefUsesRxUiFeatures"], exposes_ui);
    }
    runner.close().unwrap();
}

#[tokio::test]
async fn app_that_loses_its_output_is_recorded() {
    let fixture = TemplateFixture::new().unwrap();
    let temp = tempfile::tempdir().unwrap();
    let fake = FakeProcessRunner::new();
    fake.stall_program("Transitive.App.exe");
    let config = HarnessConfig::new().with_templates_root(fixture.root());

    let mut runner = TransitiveReferenceRunner::new(
        fake_environment(fake.clone(), temp.path()),
        config.transitive_app_project(),
        config.transitive_library_project(),
        candidate(),
        details(),
    )
    .unwrap();

    let scenarios: Vec<_> = scenario::transitive::generate(&GeneratorConfig::default())
        .into_iter()
        .take(2)
        .collect();
    let mut writer = JsonArrayWriter::new(Vec::new()).unwrap();
    let summary = run_matrix(&mut runner, &scenarios, &mut writer).await.unwrap();

    assert_eq!(summary.completed, 2);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.errors, 0);
    // The after side is still built and run
    assert_eq!(fake.count(BuildVerb::Build), 4);
    assert_eq!(fake.executions().len(), 4);

    let items = records(writer);
    assert_eq!(items.len(), 2);
    for item in &items {
        for side in ["resultsBefore", "resultsAfter"] {
            assert_eq!(item[side]["buildSucceeded"], true);
            assert!(item[side].get("executionExitCode").is_none());
            assert!(item[side]["executionError"]
                .as_str()
                .unwrap()
                .starts_with("Did not get output from program"));
        }
    }
    runner.close().unwrap();
}

#[tokio::test]
async fn failed_app_build_is_recorded_without_running() {
    let fixture = TemplateFixture::new().unwrap();
    let temp = tempfile::tempdir().unwrap();
    let fake = FakeProcessRunner::new();
    fake.fail_when(Some(BuildVerb::Build), "<DisableTransitiveFrameworkReferences>True");
    let config = HarnessConfig::new().with_templates_root(fixture.root());

    let mut runner = TransitiveReferenceRunner::new(
        fake_environment(fake.clone(), temp.path()),
        config.transitive_app_project(),
        config.transitive_library_project(),
        candidate(),
        details(),
    )
    .unwrap();

    let scenario = scenario::transitive::generate(&GeneratorConfig::default())
        .into_iter()
        .find(|s| s.disable_transitive_framework_references_after)
        .unwrap();
    let record = runner.run_scenario(&scenario).await.unwrap();

    assert!(record.results_before.build_succeeded);
    assert!(!record.results_after.build_succeeded);
    assert!(record.results_after.execution_exit_code.is_none());
    assert!(record.results_after.build_std_out.is_some());
    assert_eq!(fake.executions().len(), 1);
    runner.close().unwrap();
}

#[tokio::test]
async fn bloat_reports_deployed_frameworks() {
    let fixture = TemplateFixture::new().unwrap();
    let temp = tempfile::tempdir().unwrap();
    let fake = FakeProcessRunner::new();
    fake.deploy_wpf_when("<UseWPF>True</UseWPF>");
    fake.deploy_windows_forms_when("<UseWindowsForms>True</UseWindowsForms>");
    let config = HarnessConfig::new().with_templates_root(fixture.root());

    let mut runner = BloatRunner::new(
        fake_environment(fake.clone(), temp.path()),
        config.bloat_template_dir(),
        candidate(),
        details(),
    );
    let scenarios = scenario::bloat::generate();
    let mut writer = JsonArrayWriter::new(Vec::new()).unwrap();
    let summary = run_matrix(&mut runner, &scenarios, &mut writer).await.unwrap();

    assert_eq!(summary.completed, scenarios.len());
    assert_eq!(fake.count(BuildVerb::Publish), scenarios.len());
    for (scenario, item) in scenarios.iter().zip(records(writer)) {
        assert_eq!(item["deployedWpf"], scenario.use_wpf == Some(true), "{scenario:?}");
        assert_eq!(
            item["deployedWindowsForms"],
            scenario.use_windows_forms == Some(true),
            "{scenario:?}"
        );
        assert_eq!(item["config"]["rxVersion"]["main"]["id"], "System.Reactive.Net");
    }
}

#[tokio::test]
async fn extension_method_build_failure_is_data() {
    let fixture = TemplateFixture::new().unwrap();
    let temp = tempfile::tempdir().unwrap();
    let fake = FakeProcessRunner::new();
    fake.fail_when(Some(BuildVerb::Build), "<DisableTransitiveFrameworkReferences>True");
    let config = HarnessConfig::new().with_templates_root(fixture.root());

    let mut runner = ExtensionMethodRunner::new(
        fake_environment(fake.clone(), temp.path()),
        config.extension_method_template_dir(),
        candidate(),
        details(),
    );
    let scenarios = scenario::extension_method::generate();
    let mut writer = JsonArrayWriter::new(Vec::new()).unwrap();
    let summary = run_matrix(&mut runner, &scenarios, &mut writer).await.unwrap();

    assert_eq!(summary.completed, scenarios.len());
    for (scenario, item) in scenarios.iter().zip(records(writer)) {
        assert_eq!(
            item["buildSucceeded"],
            !scenario.emit_disable_transitive_framework_references,
            "{scenario:?}"
        );
    }
}

fn plug_in(tfm: &str, version: &str) -> PlugInDescriptor {
    PlugInDescriptor {
        tfm: tfm.into(),
        packages: vec![PackageIdAndVersion::new("System.Reactive", version)],
        package_source: None,
    }
}

fn plug_in_scenario() -> PlugInScenario {
    PlugInScenario {
        host_tfm: "net472".into(),
        first: plug_in("net46", "6.0.1"),
        second: plug_in("net45", "4.4.1"),
    }
}

const HOST_REPORT: &str = r#"{
  "FirstPlugIn": {
    "PlugInLocation": "C:\\p1\\PlugIn.net46.Rx60.dll",
    "RxFullAssemblyName": "System.Reactive, Version=6.0.0.0",
    "RxLocation": "C:\\p1\\System.Reactive.dll",
    "RxTargetFramework": ".NETFramework,Version=v4.7.2",
    "FlowsCancellationTokenToOperationCancelledException": true,
    "SupportsWindowsForms": true
  },
  "SecondPlugIn": {
    "PlugInLocation": "C:\\p2\\PlugIn.net45.Rx44.dll",
    "RxFullAssemblyName": "System.Reactive, Version=6.0.0.0",
    "RxLocation": "C:\\p1\\System.Reactive.dll",
    "RxTargetFramework": ".NETFramework,Version=v4.7.2",
    "FlowsCancellationTokenToOperationCancelledException": true,
    "SupportsWindowsForms": true
  }
}"#;

#[tokio::test]
async fn plug_in_host_report_becomes_record() {
    let fixture = TemplateFixture::new().unwrap().with_plug_in_hosts(&["net472"]).unwrap();
    let temp = tempfile::tempdir().unwrap();
    let fake = FakeProcessRunner::new();
    fake.script_program(
        "PlugIn.HostNetFx.exe",
        ProcessOutput {
            exit_code: 0,
            stdout: HOST_REPORT.into(),
            stderr: String::new(),
        },
    );
    let config = HarnessConfig::new().with_templates_root(fixture.root());

    let mut runner = PlugInConflictRunner::new(
        fake_environment(fake.clone(), temp.path()),
        config.plugins_root(),
        candidate(),
        details(),
    );
    let record = runner.run_scenario(&plug_in_scenario()).await.unwrap();

    assert_eq!(record.config.host_tfm, "net472");
    assert_eq!(record.plug_in2.rx_location, r"C:\p1\System.Reactive.dll");
    assert_eq!(runner.plug_ins().built_count(), 2);

    let executions = fake.executions();
    assert_eq!(executions.len(), 1);
    assert!(executions[0].args[0].ends_with("PlugIn.net46.Rx60.dll"));
    assert!(executions[0].args[1].ends_with("PlugIn.net45.Rx44.dll"));

    // Second run reuses both plug-in builds
    runner.run_scenario(&plug_in_scenario()).await.unwrap();
    assert_eq!(fake.count(BuildVerb::Build), 2);
    runner.close().unwrap();
}

#[tokio::test]
async fn missing_plug_in_host_skips_scenario() {
    let fixture = TemplateFixture::new().unwrap();
    let temp = tempfile::tempdir().unwrap();
    let fake = FakeProcessRunner::new();
    let config = HarnessConfig::new().with_templates_root(fixture.root());

    let mut runner = PlugInConflictRunner::new(
        fake_environment(fake.clone(), temp.path()),
        config.plugins_root(),
        candidate(),
        details(),
    );
    let err = runner.run_scenario(&plug_in_scenario()).await.unwrap_err();
    assert!(matches!(err, CheckError::Orchestration(_)));
    assert_eq!(runner.plug_ins().built_count(), 0);

    let mut writer = JsonArrayWriter::new(Vec::new()).unwrap();
    let summary = run_matrix(&mut runner, &[plug_in_scenario()], &mut writer).await.unwrap();
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.errors, 1);
    assert!(records(writer).is_empty());
}

#[tokio::test]
async fn unparsable_host_output_is_data_level() {
    let fixture = TemplateFixture::new().unwrap().with_plug_in_hosts(&["net472"]).unwrap();
    let temp = tempfile::tempdir().unwrap();
    let fake = FakeProcessRunner::new();
    fake.script_program(
        "PlugIn.HostNetFx.exe",
        ProcessOutput {
            exit_code: 1,
            stdout: "Unhandled exception".into(),
            stderr: String::new(),
        },
    );
    let config = HarnessConfig::new().with_templates_root(fixture.root());

    let mut runner = PlugInConflictRunner::new(
        fake_environment(fake, temp.path()),
        config.plugins_root(),
        candidate(),
        details(),
    );
    let err = runner.run_scenario(&plug_in_scenario()).await.unwrap_err();
    assert!(err.is_data_level());
    match err {
        CheckError::HostOutput { stdout, .. } => assert_eq!(stdout, "Unhandled exception"),
        other => panic!("unexpected error: {other}"),
    }
    runner.close().unwrap();
}
