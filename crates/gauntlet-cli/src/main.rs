//! `rx-gauntlet`: runs every check for a candidate or for all published Rx releases

use anyhow::Context;
use chrono::Utc;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use gauntlet_build::SystemProcessRunner;
use gauntlet_checks::settings::{parse_package_set, TIMESTAMP_FORMAT};
use gauntlet_cli::{published_rx, Coordinator, PackageSelection, RunIdentity, TEST_TYPES};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn run_args() -> [Arg; 4] {
    [
        Arg::new("output")
            .long("output")
            .value_parser(value_parser!(PathBuf))
            .help("Folder for the results files; must not exist. Defaults to a timestamped folder"),
        Arg::new("test-id")
            .long("test-id")
            .help("Run id recorded in every result"),
        Arg::new("check-executable")
            .long("check-executable")
            .env("RX_GAUNTLET_CHECK")
            .value_parser(value_parser!(PathBuf))
            .help("gauntlet-check binary. Defaults to the one next to this executable"),
        Arg::new("max-parallel")
            .long("max-parallel")
            .default_value("1")
            .value_parser(value_parser!(usize))
            .help("Checks to run at once"),
    ]
}

fn cli() -> Command {
    Command::new("rx-gauntlet")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Run every Rx packaging check")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("test-candidate")
                .about("Test a candidate Rx build")
                .arg(
                    Arg::new("rx-package")
                        .long("rx-package")
                        .required(true)
                        .action(ArgAction::Append)
                        .value_name("ID,VERSION")
                        .help("Candidate package; the first is the main package, the rest UI companions"),
                )
                .arg(
                    Arg::new("rx-legacy-package")
                        .long("rx-legacy-package")
                        .value_name("ID,VERSION")
                        .help("Legacy facade package of the candidate"),
                )
                .arg(
                    Arg::new("package-source")
                        .long("package-source")
                        .value_name("URL_OR_PATH")
                        .help("Feed holding the candidate packages"),
                )
                .args(run_args()),
        )
        .subcommand(
            Command::new("test-all-published-rx")
                .about("Test every published Rx release line")
                .args(run_args()),
        )
}

fn candidate_selection(args: &ArgMatches) -> anyhow::Result<PackageSelection> {
    let rx_packages: Vec<String> = args
        .get_many::<String>("rx-package")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let set = parse_package_set(
        &rx_packages,
        args.get_one::<String>("rx-legacy-package").map(String::as_str),
        args.get_one::<String>("package-source").cloned(),
    )?;
    Ok(PackageSelection {
        main: set.main,
        ui: set.ui,
        legacy: set.legacy,
        package_source: set.source,
    })
}

fn default_check_executable() -> anyhow::Result<PathBuf> {
    let exe = std::env::current_exe().context("could not locate the rx-gauntlet executable")?;
    Ok(exe.with_file_name(format!("gauntlet-check{}", std::env::consts::EXE_SUFFIX)))
}

async fn run(command: &str, args: &ArgMatches) -> anyhow::Result<bool> {
    let selections = match command {
        "test-candidate" => vec![candidate_selection(args)?],
        "test-all-published-rx" => published_rx(),
        other => anyhow::bail!("unknown command: {other}"),
    };

    let now = Utc::now();
    let identity = RunIdentity::new(args.get_one::<String>("test-id").cloned(), now)?;
    let output_dir = match args.get_one::<PathBuf>("output") {
        Some(dir) => dir.clone(),
        None => {
            let dir = PathBuf::from(now.format(TIMESTAMP_FORMAT).to_string());
            info!(output = %dir.display(), "no output folder given");
            dir
        }
    };
    let check_executable = match args.get_one::<PathBuf>("check-executable") {
        Some(path) => path.clone(),
        None => default_check_executable()?,
    };
    let max_parallel = args.get_one::<usize>("max-parallel").copied().unwrap_or(1);

    let coordinator = Coordinator::new(
        Arc::new(SystemProcessRunner::default()),
        check_executable,
        output_dir,
        identity,
    )
    .with_max_parallel(max_parallel);
    let summary = coordinator.run(&TEST_TYPES, &selections).await?;

    info!(
        launches = summary.outcomes.len(),
        failures = summary.failures(),
        "gauntlet finished"
    );
    Ok(summary.succeeded())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let matches = cli().get_matches();
    let Some((command, args)) = matches.subcommand() else {
        std::process::exit(2);
    };

    match run(command, args).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            error!("An error occurred while running the tests: {err:#}");
            std::process::exit(1);
        }
    }
}
