use anyhow::Context;
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use axi4shared_tb::config::RunConfig;
use axi4shared_tb::report::{log_outcome, write_junit};
use axi4shared_tb::run_axi4shared;

/// Runs the Axi4Shared memory checker against the on-chip RAM model
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// YAML run configuration, defaults apply to every missing key
    #[arg(short, long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Seed of the stimulus and device model
    #[arg(short, long)]
    seed: Option<u64>,

    /// Global deadline in simulation time units
    #[arg(short, long)]
    deadline: Option<u64>,

    /// Required number of read responses with non-zero data
    #[arg(short, long)]
    target: Option<u64>,

    /// Log simulation speed every N clock cycles
    #[arg(long, value_name = "CYCLES")]
    speed_print: Option<u64>,

    /// Write a JUnit XML report to this path
    #[arg(long, value_name = "XML_FILE")]
    junit: Option<PathBuf>,
}

fn main() -> anyhow::Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut cfg = match &cli.config {
        Some(path) => RunConfig::from_path(path)?,
        None => RunConfig::default(),
    };
    if let Some(seed) = cli.seed {
        cfg.seed = seed;
    }
    if let Some(deadline) = cli.deadline {
        cfg.phase.wait_tasks_end_time = deadline;
    }
    if let Some(target) = cli.target {
        cfg.checker.non_zero_read_rsp_counter_target = target;
    }
    if let Some(cycles) = cli.speed_print {
        cfg.speed_print_cycles = cycles;
    }

    let start = Instant::now();
    let outcome = run_axi4shared(&cfg).context("Simulation could not run")?;
    let wall_secs = start.elapsed().as_secs_f64();
    log_outcome(&cfg.name, &outcome, wall_secs);

    if let Some(path) = &cli.junit {
        write_junit(&cfg.name, &outcome, wall_secs, path)?;
        info!("junit report written to {}", path.display());
    }

    Ok(if outcome.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
