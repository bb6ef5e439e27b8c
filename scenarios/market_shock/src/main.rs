use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use chrono::Utc;
use sandbank_ledger::prelude::*;

/// A turbulent market: external-context events fire most days while normal banking activity
/// carries on underneath. Pass `--cancel-after-ms` to watch a run wind down cooperatively.
fn main() -> anyhow::Result<()> {
    let cli = sandbank_cli::init();

    let bank = Arc::new(InMemoryBank::new());
    let market = Arc::new(StaticMarketData::seeded(Utc::now()));
    let risk = Arc::new(HeuristicRiskService::new(bank.clone()));
    let orchestrator = Orchestrator::with_in_memory_stores(
        OrchestratorConfig {
            pool_capacity: cli.pool_capacity,
        },
        Collaborators {
            accounts: bank,
            market,
            risk,
        },
    );

    let scenario = match &cli.scenario_file {
        Some(path) => sandbank_cli::load_scenario(path)?,
        None => {
            let mut scenario = Scenario::new(env!("CARGO_PKG_NAME"), ScenarioKind::MarketShock)
                .with_duration_days(cli.days)
                .with_parameter("numUsersPerDay", cli.users_per_day)
                .with_parameter("numTransactionsPerUser", cli.transactions_per_user);
            if let Some(seed) = cli.seed {
                scenario = scenario.with_parameter("seed", seed);
            }
            scenario
        }
    };

    orchestrator.save_scenario(scenario.clone())?;
    let run = orchestrator.start_run(&scenario.name)?;
    println!("Submitted run {} for scenario {}", run.id, scenario.name);

    if let Some(delay_ms) = cli.cancel_after_ms {
        std::thread::sleep(Duration::from_millis(delay_ms));
        if orchestrator.cancel_run(&run.id) {
            println!("Requested cancellation of run {}", run.id);
        } else {
            println!("Run {} had already finished", run.id);
        }
    }

    let run = sandbank_cli::wait_for_terminal(&orchestrator, &run.id)?;
    println!(
        "Run {} finished as {} with {} events: {}",
        run.id,
        run.status,
        run.events_generated,
        run.summary.clone().unwrap_or_default()
    );

    match run.status {
        RunStatus::Completed | RunStatus::Cancelled => Ok(()),
        other => bail!("run {} ended as {other}", run.id),
    }
}
