//! `gauntlet-check`: runs one check's scenario matrix for a candidate Rx package set

use anyhow::Context;
use chrono::Utc;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use gauntlet_checks::catalog::GlobalPackagesCatalog;
use gauntlet_checks::framework::NuGetStyleReducer;
use gauntlet_checks::result::TestDetails;
use gauntlet_checks::runner::{
    run_matrix, BloatRunner, ExtensionMethodRunner, PlugInConflictRunner, TransitiveReferenceRunner,
};
use gauntlet_checks::scenario::{self, GeneratorConfig};
use gauntlet_checks::settings::{parse_package_set, resolve_test_details};
use gauntlet_checks::{HarnessConfig, JsonArrayWriter, MatrixSummary, RxPackageSet};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn common_args(default_output: &'static str) -> [Arg; 10] {
    [
        Arg::new("rx-package")
            .long("rx-package")
            .required(true)
            .action(ArgAction::Append)
            .value_name("ID,VERSION")
            .help("Rx package to test; the first is the main package, the rest UI companions"),
        Arg::new("rx-legacy-package")
            .long("rx-legacy-package")
            .value_name("ID,VERSION")
            .help("Legacy facade package shipped alongside the main package"),
        Arg::new("package-source")
            .long("package-source")
            .value_name("URL_OR_PATH")
            .help("Extra NuGet source holding the candidate packages"),
        Arg::new("output")
            .long("output")
            .default_value(default_output)
            .value_parser(value_parser!(PathBuf))
            .help("Results file"),
        Arg::new("test-run-id")
            .long("test-run-id")
            .help("Identifier recorded with every result"),
        Arg::new("test-timestamp")
            .long("test-timestamp")
            .value_name("yyyy-MM-dd_HH-mm-ss")
            .help("Time recorded with every result, UTC"),
        Arg::new("templates-root")
            .long("templates-root")
            .env("RX_GAUNTLET_TEMPLATES")
            .default_value("templates")
            .value_parser(value_parser!(PathBuf))
            .help("Folder holding the template projects"),
        Arg::new("dotnet")
            .long("dotnet")
            .env("RX_GAUNTLET_DOTNET")
            .default_value("dotnet")
            .value_parser(value_parser!(PathBuf))
            .help("dotnet executable"),
        Arg::new("drain-grace-ms")
            .long("drain-grace-ms")
            .default_value("2000")
            .value_parser(value_parser!(u64))
            .help("How long to wait for child output after the process exits"),
        Arg::new("temp-root")
            .long("temp-root")
            .value_parser(value_parser!(PathBuf))
            .help("Parent folder for temporary workspaces"),
    ]
}

fn cli() -> Command {
    Command::new("gauntlet-check")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Run one Rx packaging check against a candidate package set")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("bloat")
                .about("Check whether a self-contained publish deploys WPF or Windows Forms")
                .args(common_args("CheckIssue1745.json")),
        )
        .subcommand(
            Command::new("extension-method")
                .about("Check the DisableTransitiveFrameworkReferences workaround against extension methods")
                .args(common_args("CheckExtensionMethodsWorkaround.json")),
        )
        .subcommand(
            Command::new("plugin-conflict")
                .about("Load two plug-ins using different Rx builds into one host")
                .args(common_args("CheckPluginIssue97.json")),
        )
        .subcommand(
            Command::new("transitive-framework-reference")
                .about("Upgrade Rx behind a library and compare app behavior before and after")
                .args(common_args("CheckTransitiveFrameworkReference.json")),
        )
}

/// Values every subcommand shares
struct Invocation {
    config: HarnessConfig,
    packages: RxPackageSet,
    details: TestDetails,
    output: PathBuf,
}

impl Invocation {
    fn from_matches(args: &ArgMatches) -> anyhow::Result<Self> {
        let rx_packages: Vec<String> = args
            .get_many::<String>("rx-package")
            .map(|values| values.cloned().collect())
            .unwrap_or_default();
        let packages = parse_package_set(
            &rx_packages,
            args.get_one::<String>("rx-legacy-package").map(String::as_str),
            args.get_one::<String>("package-source").cloned(),
        )?;
        let details = resolve_test_details(
            args.get_one::<String>("test-run-id").cloned(),
            args.get_one::<String>("test-timestamp").map(String::as_str),
            Utc::now(),
        )?;

        let mut config = HarnessConfig::new();
        if let Some(root) = args.get_one::<PathBuf>("templates-root") {
            config = config.with_templates_root(root);
        }
        if let Some(dotnet) = args.get_one::<PathBuf>("dotnet") {
            config = config.with_dotnet(dotnet);
        }
        if let Some(ms) = args.get_one::<u64>("drain-grace-ms") {
            config = config.with_drain_grace(Duration::from_millis(*ms));
        }
        if let Some(root) = args.get_one::<PathBuf>("temp-root") {
            config = config.with_temp_root(root);
        }

        let output = args
            .get_one::<PathBuf>("output")
            .cloned()
            .context("no output path")?;

        Ok(Self {
            config,
            packages,
            details,
            output,
        })
    }
}

async fn run(check: &str, args: &ArgMatches) -> anyhow::Result<MatrixSummary> {
    let inv = Invocation::from_matches(args)?;
    inv.config.ensure_templates()?;
    info!(
        check,
        main_package = %inv.packages.main,
        run_id = %inv.details.test_run_id,
        output = %inv.output.display(),
        "starting check"
    );

    let env = inv.config.build_environment();
    let mut writer = JsonArrayWriter::create(&inv.output)
        .with_context(|| format!("could not create {}", inv.output.display()))?;

    let summary = match check {
        "bloat" => {
            let mut runner = BloatRunner::new(env, inv.config.bloat_template_dir(), inv.packages, inv.details);
            run_matrix(&mut runner, &scenario::bloat::generate(), &mut writer).await?
        }
        "extension-method" => {
            let mut runner = ExtensionMethodRunner::new(
                env,
                inv.config.extension_method_template_dir(),
                inv.packages,
                inv.details,
            );
            run_matrix(&mut runner, &scenario::extension_method::generate(), &mut writer).await?
        }
        "plugin-conflict" => {
            let mut runner = PlugInConflictRunner::new(env, inv.config.plugins_root(), inv.packages, inv.details);
            let catalog = GlobalPackagesCatalog::from_env()?;
            let planned = runner.plan(&catalog, &NuGetStyleReducer).await;
            let outcome = match planned {
                Ok(scenarios) => run_matrix(&mut runner, &scenarios, &mut writer).await,
                Err(err) => Err(err),
            };
            runner.close()?;
            outcome?
        }
        "transitive-framework-reference" => {
            let mut runner = TransitiveReferenceRunner::new(
                env,
                inv.config.transitive_app_project(),
                inv.config.transitive_library_project(),
                inv.packages,
                inv.details,
            )?;
            let scenarios = scenario::transitive::generate(&GeneratorConfig::default());
            let outcome = run_matrix(&mut runner, &scenarios, &mut writer).await;
            runner.close()?;
            outcome?
        }
        other => anyhow::bail!("unknown check: {other}"),
    };

    writer.finish()?;
    if summary.errors > 0 {
        anyhow::bail!(
            "{} of {} scenarios could not be run",
            summary.errors,
            summary.completed + summary.skipped
        );
    }
    Ok(summary)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let matches = cli().get_matches();
    let Some((check, args)) = matches.subcommand() else {
        std::process::exit(2);
    };

    match run(check, args).await {
        Ok(summary) => {
            info!(check, completed = summary.completed, skipped = summary.skipped, "check finished");
        }
        Err(err) => {
            error!(check, "{err:#}");
            std::process::exit(1);
        }
    }
}
