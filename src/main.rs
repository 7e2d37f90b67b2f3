use std::{path::PathBuf, process::ExitCode};

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};

use regnet::{
    dispatch::{self, Function},
    Caller, MemoryLedger, NetworkConfig, Outcome, TxContext,
};

#[derive(Parser)]
#[command(name = "regnet", version, about = "Property registration network ledger")]
struct Cli {
    /// Ledger snapshot file; created on first write
    #[arg(long, default_value = "regnet.snapshot.json", global = true)]
    state: PathBuf,

    /// Network config (JSON); built-in defaults when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a transaction and persist its writes
    Invoke(Call),
    /// Evaluate a transaction without persisting anything
    Query(Call),
    /// Print ledger height, record count and state root
    State,
    /// List transaction functions and their arguments count
    Functions,
}

#[derive(Args)]
struct Call {
    /// MSP id of the calling organisation, e.g. usersMSP or registrarMSP
    #[arg(long)]
    msp: String,

    /// Enrolled user as name/aadhaarId; participant calls must act for that user
    #[arg(long)]
    id: Option<String>,

    /// Explicit transaction id
    #[arg(long)]
    tx_id: Option<String>,

    function: String,

    args: Vec<String>,
}

#[derive(Serialize)]
struct StateReport {
    height: u64,
    timestamp: i64,
    records: usize,
    state_root: String,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn call(cli: &Cli, call: &Call, persist: bool) -> anyhow::Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => NetworkConfig::load(path)?,
        None => NetworkConfig::default(),
    };
    let network = config.network();
    let mut ledger = MemoryLedger::load(&cli.state)
        .with_context(|| format!("loading ledger from {}", cli.state.display()))?;

    let mut caller: Caller = network.roles.caller(call.msp.as_str());
    if let Some(id) = &call.id {
        caller = caller.with_id(id.as_str());
    }
    let mut ctx = TxContext::new(caller, Utc::now());
    if let Some(tx_id) = &call.tx_id {
        ctx = ctx.with_tx_id(tx_id.as_str());
    }
    debug!(tx_id = %ctx.tx_id, function = %call.function, "dispatching");

    let outcome = dispatch::invoke(&network, &mut ledger, &ctx, &call.function, &call.args)?;
    let is_query = call.function.parse::<Function>().map(Function::is_query).unwrap_or(false);
    if persist && !is_query && matches!(outcome, Outcome::Committed(_)) {
        ledger
            .save(&cli.state)
            .with_context(|| format!("saving ledger to {}", cli.state.display()))?;
        info!(height = ledger.meta.height, "snapshot saved");
    }

    print_json(&outcome)?;
    Ok(match outcome {
        Outcome::Committed(_) => ExitCode::SUCCESS,
        Outcome::Declined(_) => ExitCode::from(2),
    })
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match &cli.command {
        Command::Invoke(c) => call(&cli, c, true),
        Command::Query(c) => call(&cli, c, false),
        Command::State => {
            let ledger = MemoryLedger::load(&cli.state)
                .with_context(|| format!("loading ledger from {}", cli.state.display()))?;
            print_json(&StateReport {
                height: ledger.meta.height,
                timestamp: ledger.meta.timestamp,
                records: ledger.len(),
                state_root: hex::encode(ledger.state_root()),
            })?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Functions => {
            for function in Function::ALL {
                let kind = if function.is_query() { "query" } else { "invoke" };
                println!("{:<30} {} args ({kind})", function.name(), function.arity());
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(
        "regnet=info"
            .parse()
            .unwrap_or_else(|_| tracing_subscriber::filter::LevelFilter::INFO.into()),
    );
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
