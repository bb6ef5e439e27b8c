mod common;

use std::sync::Arc;

use common::*;
use pretty_assertions::assert_eq;
use sandbank_runner::prelude::*;

fn generate(scenario: &Scenario, collaborators: Collaborators) -> GeneratorOutput {
    let run = Run::new(&scenario.name);
    let handle = CancelHandle::new();
    let mut listener = handle.new_listener();
    EventGenerator::new(collaborators)
        .generate(scenario, &run, &mut listener)
        .expect("generation should succeed")
}

#[test]
fn lone_account_transfer_is_skipped_with_a_reason() {
    env_logger::try_init().ok();
    let scenario = quiet_scenario("lonely", 1, 1, 1);

    let out = generate(
        &scenario,
        collaborators(
            Arc::new(FakeBank::default()),
            FakeMarket::empty(),
            FakeRisk { fail: false },
        ),
    );

    assert_eq!(out.events.len(), 1);
    assert_eq!(out.events[0].event_type, EventType::AccountCreation);
    assert_eq!(out.skipped.len(), 1);
    assert_eq!(out.skipped[0].what, "transfer");
    assert!(out.skipped[0].reason.contains("no transfer counterparty"));
    assert!(!out.cancelled);
}

#[test]
fn overdrawing_transfer_is_skipped() {
    env_logger::try_init().ok();
    // Deposits are never credited, so every account sits at zero balance and every transfer
    // would overdraw its source.
    let scenario = quiet_scenario("broke", 1, 2, 1);

    let out = generate(
        &scenario,
        collaborators(
            Arc::new(FakeBank::broke()),
            FakeMarket::empty(),
            FakeRisk { fail: false },
        ),
    );

    assert_eq!(out.events.len(), 2);
    let overdraw_skips: Vec<_> = out
        .skipped
        .iter()
        .filter(|s| s.what == "transfer" && s.reason.contains("would overdraw"))
        .collect();
    // The first user has no counterparty yet; the second one does but cannot fund the transfer.
    assert_eq!(overdraw_skips.len(), 1);
}

#[test]
fn cancellation_before_the_first_day_produces_nothing() {
    env_logger::try_init().ok();
    let scenario = quiet_scenario("cancelled-early", 10, 3, 1);
    let run = Run::new(&scenario.name);

    let handle = CancelHandle::new();
    let mut listener = handle.new_listener();
    handle.cancel();

    let out = EventGenerator::new(collaborators(
        Arc::new(FakeBank::default()),
        FakeMarket::empty(),
        FakeRisk { fail: false },
    ))
    .generate(&scenario, &run, &mut listener)
    .unwrap();

    assert!(out.cancelled);
    assert!(out.events.is_empty());
}

#[test]
fn external_context_events_mirror_the_caches() {
    env_logger::try_init().ok();
    let scenario = Scenario::new("context-only", ScenarioKind::Custom)
        .with_duration_days(1)
        .with_parameter("numUsersPerDay", 0)
        .with_parameter("fraudProbability", 0.0)
        .with_parameter("loanProbability", 0.0)
        .with_parameter("rateEventProbability", 1.0)
        .with_parameter("newsEventProbability", 1.0)
        .with_parameter("indicatorEventProbability", 1.0);

    let filled = generate(
        &scenario,
        collaborators(
            Arc::new(FakeBank::default()),
            FakeMarket::filled(),
            FakeRisk { fail: false },
        ),
    );
    let types: Vec<EventType> = filled.events.iter().map(|e| e.event_type).collect();
    assert_eq!(
        types,
        vec![
            EventType::RateFluctuation,
            EventType::NewsEvent,
            EventType::EconomicIndicator,
        ]
    );

    let empty = generate(
        &scenario,
        collaborators(
            Arc::new(FakeBank::default()),
            FakeMarket::empty(),
            FakeRisk { fail: false },
        ),
    );
    assert!(empty.events.is_empty());
    assert_eq!(empty.skipped.len(), 3);
    assert!(empty.skipped.iter().all(|s| s.reason.contains("cache is empty")));
}

#[test]
fn fraud_pass_emits_attempt_then_assessment() {
    env_logger::try_init().ok();
    let scenario = quiet_scenario("fraudulent", 1, 1, 0).with_parameter("fraudProbability", 1.0);

    let out = generate(
        &scenario,
        collaborators(
            Arc::new(FakeBank::default()),
            FakeMarket::empty(),
            FakeRisk { fail: false },
        ),
    );

    let types: Vec<EventType> = out.events.iter().map(|e| e.event_type).collect();
    assert_eq!(
        types,
        vec![
            EventType::AccountCreation,
            EventType::FraudAttempt,
            EventType::RiskAssessment,
        ]
    );
    let assessment = &out.events[2];
    assert_eq!(assessment.parameters.get("rating").unwrap(), "medium");
}

#[test]
fn timestamps_are_ordered_and_inside_the_window() {
    env_logger::try_init().ok();
    let scenario = quiet_scenario("ordered", 3, 2, 1).with_parameter("seed", 7);
    let run = Run::new(&scenario.name);

    let handle = CancelHandle::new();
    let mut listener = handle.new_listener();
    let out = EventGenerator::new(collaborators(
        Arc::new(FakeBank::default()),
        FakeMarket::empty(),
        FakeRisk { fail: false },
    ))
    .generate(&scenario, &run, &mut listener)
    .unwrap();

    let (start, end) = scenario.window(run.started_at).unwrap();
    assert!(!out.events.is_empty());
    assert!(out.events.iter().all(|e| start <= e.at && e.at < end));
    assert!(out.events.windows(2).all(|pair| pair[0].at <= pair[1].at));
}

#[test]
fn kind_overlays_set_defaults_and_parameters_override_them() {
    env_logger::try_init().ok();

    let shock = Scenario::new("shock", ScenarioKind::MarketShock).with_duration_days(1);
    let settings = GeneratorSettings::resolve(&shock);
    assert_eq!(settings.rate_probability, 0.90);
    assert_eq!(settings.news_probability, 0.50);
    assert_eq!(settings.indicator_probability, 0.25);
    assert_eq!(settings.users_per_day, defaults::NUM_USERS_PER_DAY);

    let overridden = Scenario::new("shock-tuned", ScenarioKind::MarketShock)
        .with_duration_days(1)
        .with_parameter("rateEventProbability", 0.05);
    assert_eq!(
        GeneratorSettings::resolve(&overridden).rate_probability,
        0.05
    );

    let risky = Scenario::new("risky", ScenarioKind::RiskEvent).with_duration_days(1);
    assert_eq!(GeneratorSettings::resolve(&risky).fraud_probability, 0.20);

    let busy = Scenario::new("busy", ScenarioKind::UserBehaviorShift).with_duration_days(1);
    let busy = GeneratorSettings::resolve(&busy);
    assert_eq!(busy.users_per_day, 8);
    assert_eq!(busy.transactions_per_user, 5);

    // Out-of-range probabilities are clamped rather than rejected.
    let wild = Scenario::new("wild", ScenarioKind::Custom)
        .with_duration_days(1)
        .with_parameter("fraudProbability", 7.5);
    assert_eq!(GeneratorSettings::resolve(&wild).fraud_probability, 1.0);
}

#[test]
fn seeded_runs_generate_identical_shapes() {
    env_logger::try_init().ok();
    let scenario = quiet_scenario("seeded", 2, 2, 1).with_parameter("seed", 42);

    let first = generate(
        &scenario,
        collaborators(
            Arc::new(FakeBank::default()),
            FakeMarket::empty(),
            FakeRisk { fail: false },
        ),
    );
    let second = generate(
        &scenario,
        collaborators(
            Arc::new(FakeBank::default()),
            FakeMarket::empty(),
            FakeRisk { fail: false },
        ),
    );

    let shape = |out: &GeneratorOutput| {
        out.events
            .iter()
            .map(|e| (e.event_type, e.details.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(shape(&first), shape(&second));
}
