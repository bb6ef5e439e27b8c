use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use sandbank_runner::prelude::{Orchestrator, Run, Scenario};

#[derive(Parser)]
#[command(about, long_about = None)]
pub struct SandbankCli {
    /// Load the scenario from a TOML definition file instead of building one from the flags
    /// below.
    #[clap(long)]
    pub scenario_file: Option<PathBuf>,

    /// The number of simulated days to run
    #[clap(long, default_value = "7")]
    pub days: u32,

    /// Synthetic users to create per simulated day
    #[clap(long, default_value = "3")]
    pub users_per_day: u32,

    /// Transfers each new user's account fans out
    #[clap(long, default_value = "2")]
    pub transactions_per_user: u32,

    /// Maximum number of concurrently executing runs
    #[clap(long, default_value = "5")]
    pub pool_capacity: usize,

    /// Seed for reproducible generation content
    #[clap(long)]
    pub seed: Option<u64>,

    /// Request cancellation this many milliseconds after the run starts
    #[clap(long)]
    pub cancel_after_ms: Option<u64>,
}

/// Initialise logging and parse the command line for a scenario binary.
pub fn init() -> SandbankCli {
    env_logger::init();

    SandbankCli::parse()
}

/// Load a declarative scenario definition from a TOML file.
pub fn load_scenario(path: &Path) -> anyhow::Result<Scenario> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
    let scenario = toml::from_str(&raw)
        .with_context(|| format!("Failed to parse scenario file {}", path.display()))?;
    Ok(scenario)
}

/// Poll the orchestrator until the run reaches a terminal state.
pub fn wait_for_terminal(orchestrator: &Orchestrator, run_id: &str) -> anyhow::Result<Run> {
    loop {
        let run = orchestrator
            .run_status(run_id)
            .context("Run disappeared while polling")?;
        if run.status.is_terminal() {
            return Ok(run);
        }
        std::thread::sleep(Duration::from_millis(100));
    }
}
