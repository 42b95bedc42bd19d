//! `codemode` command line: run scripts and describe the orchestration tool

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use codemode_core::{CodemodeConfig, Orchestrator};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Command::new("codemode")
        .version(codemode_core::VERSION)
        .about("Run orchestration scripts against aggregated capabilities")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines on stderr"),
        )
        .subcommand(
            Command::new("run")
                .about("Execute a script and print the result")
                .arg(
                    Arg::new("script")
                        .long("script")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Script file"),
                )
                .arg(
                    Arg::new("timeout-ms")
                        .long("timeout-ms")
                        .value_parser(value_parser!(u64).range(1..))
                        .help("Override the execution timeout"),
                ),
        )
        .subcommand(
            Command::new("describe")
                .about("Print the orchestration tool description")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the full tool definition as JSON"),
                ),
        );

    let matches = cli.get_matches();
    let json_logs = matches
        .subcommand()
        .is_some_and(|(_, args)| args.get_flag("json-logs"));
    init_tracing(json_logs);

    let code = match dispatch(&matches).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            1
        }
    };
    std::process::exit(code);
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<CodemodeConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => CodemodeConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(CodemodeConfig::default()),
    }
}

async fn dispatch(matches: &ArgMatches) -> anyhow::Result<i32> {
    match matches.subcommand() {
        Some(("run", args)) => {
            let mut config = load_config(args)?;
            if let Some(ms) = args.get_one::<u64>("timeout-ms") {
                config = config.with_timeout(Duration::from_millis(*ms));
            }
            let path = args
                .get_one::<PathBuf>("script")
                .context("--script is required")?;
            let script = std::fs::read_to_string(path)
                .with_context(|| format!("reading script {}", path.display()))?;

            let session = Orchestrator::new(&config).open_session(None).await;
            let result = session.tool.call(&serde_json::json!({ "script": script })).await;

            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(if result.is_success() { 0 } else { 1 })
        }
        Some(("describe", args)) => {
            let config = load_config(args)?;
            let session = Orchestrator::new(&config).open_session(None).await;

            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&session.tool.definition())?);
            } else {
                println!("{}", session.tool.description());
            }
            Ok(0)
        }
        _ => anyhow::bail!("unknown command"),
    }
}
