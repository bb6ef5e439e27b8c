use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use sandbank_core::prelude::{SimError, SimResult};

/// The broad shape of activity a scenario produces.
///
/// The kind pre-sets generator defaults (see [crate::generator::GeneratorSettings::resolve]);
/// explicit scenario parameters always override the kind's defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    #[display("routine_operations")]
    RoutineOperations,
    #[display("market_shock")]
    MarketShock,
    #[display("risk_event")]
    RiskEvent,
    #[display("user_behavior_shift")]
    UserBehaviorShift,
    #[display("custom")]
    Custom,
}

/// Declarative definition of a simulation, uniquely named.
///
/// The simulated time window is either an explicit `[start, end)` pair or a duration in days
/// anchored at the run's submission time. Parameters are free-form strings interpreted leniently
/// by the generator; unknown keys are ignored and missing keys fall back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub kind: ScenarioKind,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_days: Option<u32>,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

impl Scenario {
    pub fn new(name: impl Into<String>, kind: ScenarioKind) -> Self {
        Self {
            name: name.into(),
            kind,
            start: None,
            end: None,
            duration_days: None,
            parameters: HashMap::new(),
        }
    }

    pub fn with_window(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn with_duration_days(mut self, days: u32) -> Self {
        self.duration_days = Some(days);
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.parameters.insert(key.into(), value.to_string());
        self
    }

    /// Check the time window invariant: either both `start` and `end` are set, or
    /// `duration_days` is set.
    pub fn validate(&self) -> SimResult<()> {
        match (self.start, self.end, self.duration_days) {
            (Some(start), Some(end), _) => {
                if end <= start {
                    return Err(SimError::invalid_state(format!(
                        "scenario {} has an empty time window: {start} .. {end}",
                        self.name
                    )));
                }
                Ok(())
            }
            (None, None, Some(_)) => Ok(()),
            _ => Err(SimError::invalid_state(format!(
                "scenario {} must set either both start and end, or a duration in days",
                self.name
            ))),
        }
    }

    /// Resolve the simulated time window for a run submitted at `run_started`.
    pub fn window(&self, run_started: DateTime<Utc>) -> SimResult<(DateTime<Utc>, DateTime<Utc>)> {
        self.validate()?;
        match (self.start, self.end, self.duration_days) {
            (Some(start), Some(end), _) => Ok((start, end)),
            (_, _, Some(days)) => Ok((run_started, run_started + Duration::days(days as i64))),
            _ => unreachable!("validate() rejects scenarios without a window"),
        }
    }

    /// Lenient typed parameter lookup: a missing key or an unparseable value both yield `None`
    /// so the caller falls back to its default.
    pub fn param<T: FromStr>(&self, key: &str) -> Option<T> {
        self.parameters.get(key).and_then(|v| v.parse().ok())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    #[display("PENDING")]
    Pending,
    #[display("RUNNING")]
    Running,
    #[display("COMPLETED")]
    Completed,
    #[display("FAILED")]
    Failed,
    #[display("CANCELLED")]
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Transitions are monotonic and one-directional; no state may be re-entered once left.
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Running | Self::Failed | Self::Cancelled),
            Self::Running => next.is_terminal(),
            _ => false,
        }
    }
}

/// One execution instance of a scenario.
///
/// A run is created `Pending` at submission time and mutated only by its own worker (and, for
/// the cancellation signal, indirectly through the orchestrator). Runs are never deleted; they
/// are the audit record of what was simulated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub scenario_name: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    pub events_generated: u64,
}

impl Run {
    pub fn new(scenario_name: impl Into<String>) -> Self {
        Self {
            id: nanoid::nanoid!(),
            scenario_name: scenario_name.into(),
            status: RunStatus::Pending,
            started_at: Utc::now(),
            ended_at: None,
            summary: None,
            events_generated: 0,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    #[display("account_creation")]
    AccountCreation,
    #[display("transaction")]
    Transaction,
    #[display("fraud_attempt")]
    FraudAttempt,
    #[display("rate_fluctuation")]
    RateFluctuation,
    #[display("news_event")]
    NewsEvent,
    #[display("economic_indicator")]
    EconomicIndicator,
    #[display("risk_assessment")]
    RiskAssessment,
    #[display("loan_issued")]
    LoanIssued,
    #[display("loan_repayment")]
    LoanRepayment,
}

/// Reference to the domain entity an event concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: String,
    pub id: String,
}

impl EntityRef {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

/// A single synthetic occurrence produced during a run.
///
/// The generator leaves `run_id` empty; the injector stamps the owning run just before
/// persisting. Events are append-only and never mutated after persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub run_id: String,
    pub at: DateTime<Utc>,
    pub event_type: EventType,
    pub details: String,
    #[serde(default)]
    pub entity: Option<EntityRef>,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

impl Event {
    pub fn new(at: DateTime<Utc>, event_type: EventType, details: impl Into<String>) -> Self {
        Self {
            run_id: String::new(),
            at,
            event_type,
            details: details.into(),
            entity: None,
            parameters: HashMap::new(),
        }
    }

    pub fn with_entity(mut self, kind: impl Into<String>, id: impl Into<String>) -> Self {
        self.entity = Some(EntityRef::new(kind, id));
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.parameters.insert(key.into(), value.to_string());
        self
    }
}
