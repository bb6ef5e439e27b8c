use std::collections::HashMap;

use chrono::Utc;
use parking_lot::Mutex;

use sandbank_core::prelude::{SimError, SimResult};

use crate::model::{Event, Run, RunStatus, Scenario};

/// Keyed persistence for scenario definitions.
///
/// The storage technology behind these contracts is deliberately unspecified; the in-memory
/// implementations below are what the tests and scenario binaries run against.
pub trait ScenarioStore: Send + Sync {
    /// Create or replace a scenario by name.
    fn save(&self, scenario: Scenario) -> SimResult<()>;
    fn get(&self, name: &str) -> SimResult<Scenario>;
    fn list(&self) -> Vec<Scenario>;
    fn delete(&self, name: &str) -> SimResult<()>;
}

pub trait RunStore: Send + Sync {
    fn insert(&self, run: Run) -> SimResult<()>;
    fn get(&self, id: &str) -> SimResult<Run>;
    fn list(&self) -> Vec<Run>;

    /// Move a run to `next`, enforcing the one-directional state machine. Entering a terminal
    /// state stamps `ended_at`; a regression is an `InvalidState` error.
    fn transition(&self, id: &str, next: RunStatus) -> SimResult<()>;

    fn record_summary(&self, id: &str, summary: &str) -> SimResult<()>;
    fn record_generated(&self, id: &str, count: u64) -> SimResult<()>;
}

pub trait EventStore: Send + Sync {
    /// Append an event to the log. The event must already be stamped with its owning run.
    fn append(&self, event: Event) -> SimResult<()>;
    fn for_run(&self, run_id: &str) -> Vec<Event>;
}

#[derive(Default)]
pub struct InMemoryScenarioStore {
    scenarios: Mutex<HashMap<String, Scenario>>,
}

impl InMemoryScenarioStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScenarioStore for InMemoryScenarioStore {
    fn save(&self, scenario: Scenario) -> SimResult<()> {
        self.scenarios
            .lock()
            .insert(scenario.name.clone(), scenario);
        Ok(())
    }

    fn get(&self, name: &str) -> SimResult<Scenario> {
        self.scenarios
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| SimError::not_found("scenario", name))
    }

    fn list(&self) -> Vec<Scenario> {
        self.scenarios.lock().values().cloned().collect()
    }

    fn delete(&self, name: &str) -> SimResult<()> {
        self.scenarios
            .lock()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| SimError::not_found("scenario", name))
    }
}

#[derive(Default)]
pub struct InMemoryRunStore {
    runs: Mutex<HashMap<String, Run>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<F>(&self, id: &str, f: F) -> SimResult<()>
    where
        F: FnOnce(&mut Run) -> SimResult<()>,
    {
        let mut runs = self.runs.lock();
        let run = runs
            .get_mut(id)
            .ok_or_else(|| SimError::not_found("run", id))?;
        f(run)
    }
}

impl RunStore for InMemoryRunStore {
    fn insert(&self, run: Run) -> SimResult<()> {
        self.runs.lock().insert(run.id.clone(), run);
        Ok(())
    }

    fn get(&self, id: &str) -> SimResult<Run> {
        self.runs
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| SimError::not_found("run", id))
    }

    fn list(&self) -> Vec<Run> {
        self.runs.lock().values().cloned().collect()
    }

    fn transition(&self, id: &str, next: RunStatus) -> SimResult<()> {
        self.update(id, |run| {
            if !run.status.can_transition_to(next) {
                return Err(SimError::invalid_state(format!(
                    "run {id} cannot move from {} to {next}",
                    run.status
                )));
            }
            run.status = next;
            if next.is_terminal() {
                run.ended_at = Some(Utc::now());
            }
            Ok(())
        })
    }

    fn record_summary(&self, id: &str, summary: &str) -> SimResult<()> {
        self.update(id, |run| {
            run.summary = Some(summary.to_string());
            Ok(())
        })
    }

    fn record_generated(&self, id: &str, count: u64) -> SimResult<()> {
        self.update(id, |run| {
            run.events_generated = count;
            Ok(())
        })
    }
}

#[derive(Default)]
pub struct InMemoryEventStore {
    events: Mutex<Vec<Event>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for InMemoryEventStore {
    fn append(&self, event: Event) -> SimResult<()> {
        if event.run_id.is_empty() {
            return Err(SimError::invalid_state(
                "event must be stamped with its owning run before persistence",
            ));
        }
        self.events.lock().push(event);
        Ok(())
    }

    fn for_run(&self, run_id: &str) -> Vec<Event> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.run_id == run_id)
            .cloned()
            .collect()
    }
}
