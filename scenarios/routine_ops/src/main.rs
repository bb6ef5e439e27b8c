use std::collections::HashMap;
use std::sync::Arc;

use anyhow::bail;
use chrono::Utc;
use sandbank_ledger::prelude::*;

/// A week in the life of a small bank: new users, their accounts, transfers between them, and
/// the occasional market or risk event.
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
            let mut scenario = Scenario::new(env!("CARGO_PKG_NAME"), ScenarioKind::RoutineOperations)
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

    let run = sandbank_cli::wait_for_terminal(&orchestrator, &run.id)?;
    println!("{}", serde_json::to_string_pretty(&run)?);

    let events = orchestrator.list_events_for_run(&run.id)?;
    let mut by_type: HashMap<EventType, usize> = HashMap::new();
    for event in &events {
        *by_type.entry(event.event_type).or_default() += 1;
    }
    for (event_type, count) in &by_type {
        println!("{event_type}: {count}");
    }

    if run.status != RunStatus::Completed {
        bail!(
            "run {} ended as {}: {}",
            run.id,
            run.status,
            run.summary.unwrap_or_default()
        );
    }
    Ok(())
}
