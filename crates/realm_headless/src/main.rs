//! Headless realm runner.
//!
//! Runs episodes without graphics or agents. Summaries go to stdout as
//! JSON, logs to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Run one episode from a scenario file, writing a world dump
//! cargo run -p realm_headless -- run --config scenario.ron --seed 7 --ticks 1000 --dump world.bin
//!
//! # Verify determinism
//! cargo run -p realm_headless -- verify --preset medium --seed 12345 --runs 5
//!
//! # Time steps at full population
//! cargo run -p realm_headless -- bench --preset large --ticks 2000
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use realm_headless::{bench, run_episode, verify_determinism, EpisodeRunner, Result, Scenario, TerrainLayout};

#[derive(Parser)]
#[command(name = "realm_headless")]
#[command(about = "Headless realm runner for determinism checks and profiling")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where the scenario comes from.
#[derive(Args)]
struct ScenarioArgs {
    /// Scenario RON file
    #[arg(short, long, conflicts_with = "preset")]
    config: Option<PathBuf>,

    /// Built-in preset: small, medium or large
    #[arg(short, long, default_value = "small")]
    preset: String,

    /// Override the scenario's terrain layout
    #[arg(long, value_enum)]
    layout: Option<TerrainLayout>,
}

impl ScenarioArgs {
    fn load(&self) -> Result<Scenario> {
        let mut scenario = match &self.config {
            Some(path) => Scenario::load(path)?,
            None => Scenario::preset(&self.preset).ok_or_else(|| {
                realm_core::error::RealmError::InvalidConfig(format!("Unknown preset '{}'", self.preset))
            })?,
        };
        if let Some(layout) = self.layout {
            scenario.layout = layout;
        }
        Ok(scenario)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run one episode and print a JSON summary
    Run {
        #[command(flatten)]
        scenario: ScenarioArgs,

        /// Episode seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Ticks to simulate
        #[arg(short, long, default_value = "1000")]
        ticks: u64,

        /// Write a bincode world dump here at the end
        #[arg(long)]
        dump: Option<PathBuf>,
    },

    /// Verify determinism by running the same seed several times
    Verify {
        #[command(flatten)]
        scenario: ScenarioArgs,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,

        /// Ticks per run
        #[arg(short, long, default_value = "500")]
        ticks: u64,
    },

    /// Run N ticks for benchmarking
    Bench {
        #[command(flatten)]
        scenario: ScenarioArgs,

        /// Episode seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Number of ticks to run
        #[arg(short, long, default_value = "2000")]
        ticks: u64,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr, stdout is for summaries
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    let outcome = match cli.command {
        Commands::Run {
            scenario,
            seed,
            ticks,
            dump,
        } => cmd_run(&scenario, seed, ticks, dump),
        Commands::Verify {
            scenario,
            seed,
            runs,
            ticks,
        } => cmd_verify(&scenario, seed, runs, ticks),
        Commands::Bench { scenario, seed, ticks } => cmd_bench(&scenario, seed, ticks),
    };

    if let Err(e) = outcome {
        tracing::error!(error = %e, "Command failed");
        eprintln!("FATAL: {e}");
        std::process::exit(1);
    }
}

/// Run a single episode
fn cmd_run(args: &ScenarioArgs, seed: u64, ticks: u64, dump: Option<PathBuf>) -> Result<()> {
    let scenario = args.load()?;
    tracing::info!(scenario = %scenario.name, seed, ticks, "Starting episode");

    let summary = match dump {
        Some(path) => {
            let mut runner = EpisodeRunner::new(scenario, seed)?;
            runner.run(ticks)?;
            runner.write_dump(&path)?;
            runner.summary()
        }
        None => run_episode(&scenario, seed, ticks)?,
    };
    println!("{}", summary.to_json()?);
    Ok(())
}

/// Verify determinism across parallel runs
fn cmd_verify(args: &ScenarioArgs, seed: u64, runs: u32, ticks: u64) -> Result<()> {
    let scenario = args.load()?;
    tracing::info!(
        "Verifying determinism: {} with seed {} ({} runs, {} ticks)",
        scenario.name,
        seed,
        runs,
        ticks
    );

    let report = verify_determinism(&scenario, seed, runs, ticks)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.is_deterministic() {
        eprintln!("PASS: All {runs} runs produced identical results");
        Ok(())
    } else {
        eprintln!("FAIL: Non-determinism detected!");
        std::process::exit(1);
    }
}

/// Time a run of N ticks
fn cmd_bench(args: &ScenarioArgs, seed: u64, ticks: u64) -> Result<()> {
    let scenario = args.load()?;
    tracing::info!("Running {} tick benchmark on '{}'", ticks, scenario.name);

    let report = bench(&scenario, seed, ticks)?;
    eprintln!(
        "{} ticks in {:.3}s ({:.1} ticks/s)",
        report.ticks, report.total_seconds, report.ticks_per_second
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
