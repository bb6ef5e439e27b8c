use std::sync::Arc;

use crate::model::{Event, EventType};
use crate::store::EventStore;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InjectionReport {
    pub injected: u64,
    pub failed: u64,
}

/// Durably records generated events against the event log and applies any domain effect the
/// generator deferred.
///
/// Injection is best-effort: one event failing to persist is logged and counted, never fatal to
/// the rest of the batch, so the report's `injected` count may be lower than the number of
/// events generated.
pub struct DataInjector {
    events: Arc<dyn EventStore>,
}

impl DataInjector {
    pub fn new(events: Arc<dyn EventStore>) -> Self {
        Self { events }
    }

    pub fn inject_events(&self, run_id: &str, events: Vec<Event>) -> InjectionReport {
        let mut report = InjectionReport::default();

        for mut event in events {
            event.run_id = run_id.to_string();
            let event_type = event.event_type;

            match self.events.append(event) {
                Ok(()) => {
                    report.injected += 1;
                    apply_deferred_effect(event_type);
                }
                Err(e) => {
                    log::warn!("Failed to inject a {event_type} event for run {run_id}: {e}");
                    report.failed += 1;
                }
            }
        }

        log::info!(
            "Injected {} events for run {run_id} ({} failed)",
            report.injected,
            report.failed
        );
        report
    }
}

/// Dispatch point for effects that are intentionally not applied at generation time.
///
/// Ledger effects (accounts, deposits, transfers, loan disbursements) happen inline while the
/// generator runs, so most event types need nothing further here; the external-context, risk
/// and loan-repayment events are informational records only.
fn apply_deferred_effect(event_type: EventType) {
    match event_type {
        EventType::AccountCreation
        | EventType::Transaction
        | EventType::LoanIssued => {
            // Applied by the generator when the event was synthesized.
        }
        EventType::FraudAttempt
        | EventType::RateFluctuation
        | EventType::NewsEvent
        | EventType::EconomicIndicator
        | EventType::RiskAssessment
        | EventType::LoanRepayment => {
            log::trace!("No deferred effect for {event_type} events");
        }
    }
}
