use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use sandbank_core::prelude::{CancelHandle, CancelListener, SimResult};

use crate::generator::EventGenerator;
use crate::injector::DataInjector;
use crate::model::{Event, Run, RunStatus, Scenario};
use crate::pool::WorkerPool;
use crate::services::Collaborators;
use crate::store::{
    EventStore, InMemoryEventStore, InMemoryRunStore, InMemoryScenarioStore, RunStore,
    ScenarioStore,
};

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    /// Maximum number of concurrently executing runs. Submissions beyond this queue for a free
    /// worker rather than running unbounded.
    pub pool_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { pool_capacity: 5 }
    }
}

type Registry = Arc<Mutex<HashMap<String, CancelHandle>>>;

/// Owns the worker pool, the run state machine and the cancellation bookkeeping, composing the
/// event generator and the data injector into one supervised unit of work per run.
///
/// Every state transition is persisted before the next phase begins, so an observer polling
/// [Orchestrator::run_status] sees monotonic progress; if the process dies mid-run the run is
/// simply left in its last persisted state.
pub struct Orchestrator {
    scenarios: Arc<dyn ScenarioStore>,
    runs: Arc<dyn RunStore>,
    events: Arc<dyn EventStore>,
    collaborators: Collaborators,
    registry: Registry,
    pool: WorkerPool,
    capacity: usize,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        scenarios: Arc<dyn ScenarioStore>,
        runs: Arc<dyn RunStore>,
        events: Arc<dyn EventStore>,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            scenarios,
            runs,
            events,
            collaborators,
            registry: Arc::new(Mutex::new(HashMap::new())),
            pool: WorkerPool::new(config.pool_capacity),
            capacity: config.pool_capacity,
        }
    }

    /// Convenience constructor wiring up fresh in-memory stores.
    pub fn with_in_memory_stores(config: OrchestratorConfig, collaborators: Collaborators) -> Self {
        Self::new(
            config,
            Arc::new(InMemoryScenarioStore::new()),
            Arc::new(InMemoryRunStore::new()),
            Arc::new(InMemoryEventStore::new()),
            collaborators,
        )
    }

    pub fn save_scenario(&self, scenario: Scenario) -> SimResult<()> {
        scenario.validate()?;
        log::info!("Saving scenario {}", scenario.name);
        self.scenarios.save(scenario)
    }

    pub fn delete_scenario(&self, name: &str) -> SimResult<()> {
        self.scenarios.delete(name)
    }

    pub fn list_scenarios(&self) -> Vec<Scenario> {
        self.scenarios.list()
    }

    /// Start a run for the named scenario and return it immediately, still `Pending`; execution
    /// proceeds on the worker pool and is observed by polling [Orchestrator::run_status].
    ///
    /// The scenario is snapshotted here, so edits made after submission never affect this run.
    pub fn start_run(&self, scenario_name: &str) -> SimResult<Run> {
        let scenario = self.scenarios.get(scenario_name)?;

        let run = Run::new(&scenario.name);
        self.runs.insert(run.clone())?;

        let handle = CancelHandle::new();
        let listener = handle.new_listener();
        let in_flight = {
            let mut registry = self.registry.lock();
            registry.insert(run.id.clone(), handle);
            registry.len()
        };
        if in_flight > self.capacity {
            log::warn!(
                "Pool is at capacity ({} runs in flight); run {} is queued",
                in_flight,
                run.id
            );
        }

        let worker = RunWorker {
            scenario,
            run: run.clone(),
            runs: Arc::clone(&self.runs),
            events: Arc::clone(&self.events),
            collaborators: self.collaborators.clone(),
            registry: Arc::clone(&self.registry),
            listener,
        };
        self.pool.submit(Box::new(move || worker.execute()));

        log::info!("Submitted run {} for scenario {scenario_name}", run.id);
        Ok(run)
    }

    /// Request cooperative cancellation of an in-flight run.
    ///
    /// Returns false when the run is unknown or already terminal. On acceptance the signal is
    /// observed by the run's worker at its next checkpoint, which finalises the run as
    /// `Cancelled`; this call does not wait for that to happen.
    pub fn cancel_run(&self, run_id: &str) -> bool {
        let terminal = match self.runs.get(run_id) {
            Ok(run) => run.status.is_terminal(),
            Err(_) => return false,
        };
        if terminal {
            log::debug!("Ignoring cancellation of terminal run {run_id}");
            return false;
        }

        match self.registry.lock().get(run_id) {
            Some(handle) => {
                handle.cancel();
                log::info!("Cancellation requested for run {run_id}");
                true
            }
            None => {
                log::debug!("No in-flight handle for run {run_id}, nothing to cancel");
                false
            }
        }
    }

    pub fn run_status(&self, run_id: &str) -> SimResult<Run> {
        self.runs.get(run_id)
    }

    pub fn list_runs(&self) -> Vec<Run> {
        self.runs.list()
    }

    pub fn list_events_for_run(&self, run_id: &str) -> SimResult<Vec<Event>> {
        // Surface NotFound for unknown runs rather than returning an empty log.
        self.runs.get(run_id)?;
        Ok(self.events.for_run(run_id))
    }
}

/// Everything one run's worker needs, moved onto the pool as a single job.
struct RunWorker {
    scenario: Scenario,
    run: Run,
    runs: Arc<dyn RunStore>,
    events: Arc<dyn EventStore>,
    collaborators: Collaborators,
    registry: Registry,
    listener: CancelListener,
}

impl RunWorker {
    fn execute(mut self) {
        // Registry removal must happen on every exit path, including panics in the stores or
        // collaborators, so the run can never be cancelled after it has finished.
        let _guard = RegistryGuard {
            registry: Arc::clone(&self.registry),
            run_id: self.run.id.clone(),
        };

        if self.listener.is_cancelled() {
            self.finalize(RunStatus::Cancelled, "cancelled before execution started");
            return;
        }

        if let Err(e) = self.runs.transition(&self.run.id, RunStatus::Running) {
            log::error!("Could not mark run {} as running: {e}", self.run.id);
            return;
        }
        log::info!(
            "Run {} is executing scenario {}",
            self.run.id,
            self.scenario.name
        );

        let generator = EventGenerator::new(self.collaborators.clone());
        match generator.generate(&self.scenario, &self.run, &mut self.listener) {
            Ok(output) => {
                if let Err(e) = self
                    .runs
                    .record_generated(&self.run.id, output.events.len() as u64)
                {
                    log::warn!("Could not record event count for run {}: {e}", self.run.id);
                }

                let cancelled = output.cancelled;
                let generated = output.events.len();
                let skipped = output.skipped.len();

                let injector = DataInjector::new(Arc::clone(&self.events));
                let report = injector.inject_events(&self.run.id, output.events);

                let summary = format!(
                    "generated {generated} events, injected {}, skipped {skipped} units",
                    report.injected
                );
                if cancelled {
                    self.finalize(RunStatus::Cancelled, &format!("cancelled: {summary}"));
                } else {
                    self.finalize(RunStatus::Completed, &summary);
                }
            }
            Err(e) => {
                log::error!("Run {} failed: {e}", self.run.id);
                self.finalize(RunStatus::Failed, &format!("failed: {e}"));
            }
        }
    }

    fn finalize(&self, status: RunStatus, summary: &str) {
        if let Err(e) = self.runs.record_summary(&self.run.id, summary) {
            log::warn!("Could not record summary for run {}: {e}", self.run.id);
        }
        if let Err(e) = self.runs.transition(&self.run.id, status) {
            log::error!("Could not finalise run {} as {status}: {e}", self.run.id);
        } else {
            log::info!("Run {} finished as {status}: {summary}", self.run.id);
        }
    }
}

struct RegistryGuard {
    registry: Registry,
    run_id: String,
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.run_id);
    }
}
