//! Offline driver for the friction loop.
//! - `replay`: run a JSONL trace through one session, print cycle reports and history
//! - `defaults`: print the default engine configuration
//! - `check`: validate a configuration file

mod trace;


use anyhow::{Context, Result};
use clap::{crate_version, Arg, ArgAction, ArgMatches, Command};
use friction_engine::{EngineConfig, FrictionEngine};
use prometheus_bridge::FrictionMetrics;
use std::fs::File;
use std::io::{self, BufReader, Write};
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

fn cli() -> Command {
    Command::new("friction-cli")
        .version(crate_version!())
        .about("Friction diagnosis and adaptation loop, offline")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log at debug level"),
        )
        .subcommand(
            Command::new("replay")
                .about("Replay a signal trace through one session")
                .arg(
                    Arg::new("trace")
                        .long("trace")
                        .required(true)
                        .value_name("PATH")
                        .help("JSONL file of signal and cycle events"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_name("PATH")
                        .help("Engine configuration JSON (defaults when omitted)"),
                )
                .arg(
                    Arg::new("auto-cycle")
                        .long("auto-cycle")
                        .action(ArgAction::SetTrue)
                        .help("Run a cycle after every qualifying signal"),
                )
                .arg(
                    Arg::new("metrics")
                        .long("metrics")
                        .action(ArgAction::SetTrue)
                        .help("Print Prometheus text exposition after the replay"),
                ),
        )
        .subcommand(Command::new("defaults").about("Print the default configuration"))
        .subcommand(
            Command::new("check").about("Validate a configuration file").arg(
                Arg::new("config")
                    .long("config")
                    .required(true)
                    .value_name("PATH"),
            ),
        )
}

fn init_logging(verbose: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(if verbose { "debug" } else { "info" })
    });
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .compact();
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

fn load_config(matches: &ArgMatches) -> Result<EngineConfig> {
    match matches.get_one::<String>("config") {
        Some(path) => EngineConfig::from_path(path)
            .with_context(|| format!("loading engine config from {path}")),
        None => Ok(EngineConfig::default()),
    }
}

fn run_replay(matches: &ArgMatches) -> Result<()> {
    let config = load_config(matches)?;
    let engine = FrictionEngine::new(config)?;
    let metrics = FrictionMetrics::new()?;

    let trace_path = matches
        .get_one::<String>("trace")
        .context("--trace is required")?;
    let file = File::open(trace_path).with_context(|| format!("opening trace {trace_path}"))?;
    let events = trace::parse_trace(BufReader::new(file))?;

    let outcome = trace::replay(&engine, &metrics, events, matches.get_flag("auto-cycle"))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for report in &outcome.cycles {
        writeln!(out, "{}", serde_json::to_string(report)?)?;
    }
    writeln!(
        out,
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "rejected_signals": outcome.rejected,
            "history": outcome.history,
            "summary": outcome.summary,
        }))?
    )?;
    if matches.get_flag("metrics") {
        write!(out, "{}", metrics.gather_text()?)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let matches = cli().get_matches();
    let verbose = matches.get_flag("verbose")
        || matches
            .subcommand()
            .map_or(false, |(_, sub)| sub.get_flag("verbose"));
    init_logging(verbose);

    match matches.subcommand() {
        Some(("replay", sub)) => run_replay(sub),
        Some(("defaults", _)) => {
            println!("{}", serde_json::to_string_pretty(&EngineConfig::default())?);
            Ok(())
        }
        Some(("check", sub)) => {
            load_config(sub)?;
            println!("configuration is valid");
            Ok(())
        }
        Some((other, _)) => anyhow::bail!("unknown subcommand `{other}`"),
        None => anyhow::bail!("a subcommand is required"),
    }
}
