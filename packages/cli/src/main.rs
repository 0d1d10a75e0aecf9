use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use graphmc::domain::reduction::summarize_spinloops;
use graphmc::{load_program, CheckOutcome, Checker, ExplorerConfig, MemoryModel, StopPolicy};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Exit code for unreadable programs and bad arguments
const USAGE_ERROR: u8 = 2;

/// graphmc - stateless model checking over execution graphs
#[derive(Parser)]
#[command(name = "graphmc", version)]
#[command(about = "Explore every consistent execution of a concurrent test program", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Explore a program and report violations
    Check(CheckArgs),
    /// Show which spin loops would be summarised
    Summarize {
        /// Program file (JSON)
        program: PathBuf,
    },
}

#[derive(Args)]
struct CheckArgs {
    /// Program file (JSON)
    program: PathBuf,

    /// Memory model: sc, tso, ra or lkmm
    #[arg(long, default_value_t = MemoryModel::Ra)]
    model: MemoryModel,

    /// Explore one representative of symmetric threads
    #[arg(long)]
    symmetry: bool,

    /// Treat critical sections lock-aware
    #[arg(long)]
    lapor: bool,

    /// Keep spin loops as written
    #[arg(long)]
    no_spin_summaries: bool,

    /// Stop after this many complete executions
    #[arg(long)]
    max_executions: Option<u64>,

    /// Stop after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Block a thread after this many events
    #[arg(long, default_value_t = 256)]
    max_thread_events: usize,

    /// Stop at the first violation (default)
    #[arg(long, conflicts_with = "exhaustive")]
    stop_on_first: bool,

    /// Keep exploring after violations
    #[arg(long)]
    exhaustive: bool,

    /// Report threads blocked forever as liveness violations
    #[arg(long)]
    check_liveness: bool,

    /// Run the recovery routine on every crash point
    #[arg(long)]
    persistency: bool,

    /// Print the outcome as JSON
    #[arg(long)]
    json: bool,
}

impl CheckArgs {
    fn config(&self) -> ExplorerConfig {
        let stop_policy = if self.exhaustive { StopPolicy::Exhaustive } else { StopPolicy::FirstViolation };
        ExplorerConfig::builder()
            .with_model(self.model)
            .with_symmetry(self.symmetry)
            .with_lock_aware(self.lapor)
            .with_spinloops(!self.no_spin_summaries)
            .with_max_executions(self.max_executions)
            .with_timeout(self.timeout_secs.map(Duration::from_secs))
            .with_max_thread_events(Some(self.max_thread_events))
            .with_stop_policy(stop_policy)
            .with_liveness(self.check_liveness)
            .with_persistency(self.persistency)
            .build()
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Check(args) => check(&args),
        Commands::Summarize { program } => summarize(&program),
    };
    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(USAGE_ERROR)
        }
    }
}

fn check(args: &CheckArgs) -> Result<u8> {
    let program = load_program(&args.program)
        .with_context(|| format!("failed to load {}", args.program.display()))?;
    let config = args.config();
    debug!(?config, "configuration");

    let outcome = Checker::new(config)
        .check(&program)
        .with_context(|| format!("failed to check {}", program.name))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome).context("failed to encode outcome")?);
    } else {
        print_outcome(&outcome);
    }
    let code = outcome.exit_code();
    info!(code, "done");
    Ok(u8::try_from(code).unwrap_or(1))
}

fn print_outcome(outcome: &CheckOutcome) {
    let report = &outcome.report;
    let stats = &report.stats;
    println!("program:     {}", outcome.program);
    println!("model:       {}", report.model);
    for site in &outcome.spinloops.summarized {
        println!("spin loop:   {site} summarised");
    }
    println!(
        "executions:  {} complete, {} blocked, {} pruned",
        stats.executions, stats.blocked, stats.inconsistent
    );
    println!(
        "revisits:    {} forward, {} backward",
        stats.forward_revisits, stats.backward_revisits
    );
    println!("time:        {:.3}s", report.elapsed.as_secs_f64());
    if let Some(bound) = report.bound_reached {
        println!("bound:       {bound:?} reached, exploration incomplete");
    }
    if report.is_clean() {
        println!("No errors were detected.");
    }
    for violation in &report.violations {
        println!("error:       {violation}");
    }
}

fn summarize(path: &Path) -> Result<u8> {
    let program = load_program(path).with_context(|| format!("failed to load {}", path.display()))?;
    let (_, report) = summarize_spinloops(&program);
    for site in &report.summarized {
        println!("summarised  {site}");
    }
    for (site, reason) in &report.rejected {
        println!("kept        {site}: {reason}");
    }
    if report.summarized.is_empty() && report.rejected.is_empty() {
        println!("no spin loops in {}", program.name);
    }
    Ok(0)
}
