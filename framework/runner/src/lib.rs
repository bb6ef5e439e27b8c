mod generator;
mod injector;
mod model;
mod orchestrator;
mod pool;
mod services;
mod store;

pub mod prelude {
    pub use crate::generator::{
        defaults, EventGenerator, GeneratorOutput, GeneratorSettings, SkippedUnit,
    };
    pub use crate::injector::{DataInjector, InjectionReport};
    pub use crate::model::{
        EntityRef, Event, EventType, Run, RunStatus, Scenario, ScenarioKind,
    };
    pub use crate::orchestrator::{Orchestrator, OrchestratorConfig};
    pub use crate::services::{
        AccountInfo, AccountKind, AccountService, Collaborators, EconomicIndicator,
        MarketDataCache, NewsItem, RateSnapshot, RiskAssessment, RiskRating, RiskService,
    };
    pub use crate::store::{
        EventStore, InMemoryEventStore, InMemoryRunStore, InMemoryScenarioStore, RunStore,
        ScenarioStore,
    };

    /// Re-export of the `sandbank_core` prelude.
    ///
    /// This is for convenience so that collaborator implementations and scenario binaries can
    /// depend on a single crate for the orchestrator.
    pub use sandbank_core::prelude::*;
}
