use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

use sandbank_core::prelude::{CancelListener, SimError, SimResult};

use crate::model::{Event, EventType, Run, Scenario, ScenarioKind};
use crate::services::{AccountInfo, AccountKind, Collaborators};

/// Fallback values for scenario parameters the generator interprets leniently.
pub mod defaults {
    pub const NUM_USERS_PER_DAY: u32 = 3;
    pub const NUM_TRANSACTIONS_PER_USER: u32 = 2;
    pub const RATE_EVENT_PROBABILITY: f64 = 0.20;
    pub const NEWS_EVENT_PROBABILITY: f64 = 0.10;
    pub const INDICATOR_EVENT_PROBABILITY: f64 = 0.05;
    pub const FRAUD_PROBABILITY: f64 = 0.01;
    pub const LOAN_PROBABILITY: f64 = 0.05;
    pub const CURRENCY: &str = "USD";
    pub const BANK_ID: &str = "SIM-BANK-1";
}

/// Generator knobs resolved from a scenario: kind overlay first, explicit parameters second.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorSettings {
    pub users_per_day: u32,
    pub transactions_per_user: u32,
    pub rate_probability: f64,
    pub news_probability: f64,
    pub indicator_probability: f64,
    pub fraud_probability: f64,
    pub loan_probability: f64,
    pub currency: String,
    pub bank_id: String,
    pub seed: Option<u64>,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            users_per_day: defaults::NUM_USERS_PER_DAY,
            transactions_per_user: defaults::NUM_TRANSACTIONS_PER_USER,
            rate_probability: defaults::RATE_EVENT_PROBABILITY,
            news_probability: defaults::NEWS_EVENT_PROBABILITY,
            indicator_probability: defaults::INDICATOR_EVENT_PROBABILITY,
            fraud_probability: defaults::FRAUD_PROBABILITY,
            loan_probability: defaults::LOAN_PROBABILITY,
            currency: defaults::CURRENCY.to_string(),
            bank_id: defaults::BANK_ID.to_string(),
            seed: None,
        }
    }
}

impl GeneratorSettings {
    pub fn resolve(scenario: &Scenario) -> Self {
        let mut settings = Self::default();

        match scenario.kind {
            ScenarioKind::MarketShock => {
                settings.rate_probability = 0.90;
                settings.news_probability = 0.50;
                settings.indicator_probability = 0.25;
            }
            ScenarioKind::RiskEvent => {
                settings.fraud_probability = 0.20;
            }
            ScenarioKind::UserBehaviorShift => {
                settings.users_per_day = 8;
                settings.transactions_per_user = 5;
            }
            ScenarioKind::RoutineOperations | ScenarioKind::Custom => {}
        }

        if let Some(v) = scenario.param("numUsersPerDay") {
            settings.users_per_day = v;
        }
        if let Some(v) = scenario.param("numTransactionsPerUser") {
            settings.transactions_per_user = v;
        }
        if let Some(v) = scenario.param("rateEventProbability") {
            settings.rate_probability = v;
        }
        if let Some(v) = scenario.param("newsEventProbability") {
            settings.news_probability = v;
        }
        if let Some(v) = scenario.param("indicatorEventProbability") {
            settings.indicator_probability = v;
        }
        if let Some(v) = scenario.param("fraudProbability") {
            settings.fraud_probability = v;
        }
        if let Some(v) = scenario.param("loanProbability") {
            settings.loan_probability = v;
        }
        if let Some(v) = scenario.param::<String>("currency") {
            settings.currency = v;
        }
        if let Some(v) = scenario.param::<String>("bankId") {
            settings.bank_id = v;
        }
        settings.seed = scenario.param("seed");

        for p in [
            &mut settings.rate_probability,
            &mut settings.news_probability,
            &mut settings.indicator_probability,
            &mut settings.fraud_probability,
            &mut settings.loan_probability,
        ] {
            *p = p.clamp(0.0, 1.0);
        }

        settings
    }
}

/// A unit of work the generator gave up on rather than aborting the whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedUnit {
    pub day: DateTime<Utc>,
    pub what: &'static str,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct GeneratorOutput {
    pub events: Vec<Event>,
    pub skipped: Vec<SkippedUnit>,
    pub cancelled: bool,
}

/// Issues non-decreasing timestamps inside one simulated day: each event gets the next whole
/// second, capped so every timestamp stays inside the day.
struct DayClock {
    day: DateTime<Utc>,
    offset: i64,
}

impl DayClock {
    const MAX_OFFSET: i64 = 86_399;

    fn new(day: DateTime<Utc>) -> Self {
        Self { day, offset: 0 }
    }

    fn next(&mut self) -> DateTime<Utc> {
        let at = self.day + Duration::seconds(self.offset.min(Self::MAX_OFFSET));
        self.offset += 1;
        at
    }
}

/// Translates a scenario into an ordered sequence of typed events, driving the collaborator
/// services so that each event reflects real domain activity.
///
/// The shape of the output is deterministic (a day-stepped loop over the scenario window); the
/// content is randomized, reproducibly so when the scenario pins a `seed` parameter. Generation
/// applies domain effects inline, so re-running a scenario produces fresh activity rather than
/// replaying the old.
pub struct EventGenerator {
    collaborators: Collaborators,
}

impl EventGenerator {
    pub fn new(collaborators: Collaborators) -> Self {
        Self { collaborators }
    }

    /// Generate the event sequence for one run.
    ///
    /// The cancellation signal is checked between simulated days; once observed, generation
    /// stops and returns what has been produced so far with `cancelled` set.
    pub fn generate(
        &self,
        scenario: &Scenario,
        run: &Run,
        cancel: &mut CancelListener,
    ) -> SimResult<GeneratorOutput> {
        let settings = GeneratorSettings::resolve(scenario);
        let (start, end) = scenario.window(run.started_at)?;

        let mut rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        log::info!(
            "Generating events for run {} over {} .. {} ({} scenario)",
            run.id,
            start,
            end,
            scenario.kind
        );

        let mut out = GeneratorOutput::default();
        let mut open_loans: HashSet<String> = HashSet::new();

        let mut day = start;
        while day < end {
            if cancel.is_cancelled() {
                log::info!(
                    "Run {} cancelled after generating {} events; stopping at {}",
                    run.id,
                    out.events.len(),
                    day
                );
                out.cancelled = true;
                return Ok(out);
            }

            let mut clock = DayClock::new(day);
            self.population_pass(&settings, &mut rng, &mut clock, &mut out)?;
            self.external_context_pass(&settings, &mut rng, &mut clock, &mut out)?;
            self.risk_pass(&settings, &mut rng, &mut clock, &mut out)?;
            self.loan_pass(&settings, &mut rng, &mut clock, &mut open_loans, &mut out)?;

            day += Duration::days(1);
        }

        Ok(out)
    }

    /// Create the day's synthetic users, each with a freshly funded account, then let each new
    /// account fan out transfers to the rest of the population.
    fn population_pass(
        &self,
        settings: &GeneratorSettings,
        rng: &mut StdRng,
        clock: &mut DayClock,
        out: &mut GeneratorOutput,
    ) -> SimResult<()> {
        for _ in 0..settings.users_per_day {
            let at = clock.next();
            let opened = self.open_funded_account(settings, rng, at);
            let account = match unit(out, at, "user", opened)? {
                Some((account, event)) => {
                    out.events.push(event);
                    account
                }
                None => continue,
            };

            for _ in 0..settings.transactions_per_user {
                let at = clock.next();
                if let Some(event) =
                    unit(out, at, "transfer", self.random_transfer(settings, rng, &account, at))?
                {
                    out.events.push(event);
                }
            }
        }
        Ok(())
    }

    fn open_funded_account(
        &self,
        settings: &GeneratorSettings,
        rng: &mut StdRng,
        at: DateTime<Utc>,
    ) -> SimResult<(AccountInfo, Event)> {
        let accounts = &self.collaborators.accounts;

        let user_id = accounts.create_user(&synthetic_name(rng))?;
        let kind = if rng.gen_bool(0.8) {
            AccountKind::Checking
        } else {
            AccountKind::Savings
        };
        let account = accounts.create_account(&user_id, &settings.bank_id, kind, &settings.currency)?;

        // Cents, so amounts stay exact in decimal arithmetic.
        let deposit = Decimal::new(rng.gen_range(50_00..5_000_00), 2);
        accounts.deposit(
            &account.id,
            deposit,
            &settings.currency,
            "initial deposit",
            at,
        )?;

        let event = Event::new(
            at,
            EventType::AccountCreation,
            format!(
                "opened {} account {} for user {} with an initial deposit of {} {}",
                account.kind, account.number, user_id, deposit, settings.currency
            ),
        )
        .with_entity("account", &account.id)
        .with_parameter("user_id", &user_id)
        .with_parameter("initial_deposit", deposit);

        Ok((account, event))
    }

    fn random_transfer(
        &self,
        settings: &GeneratorSettings,
        rng: &mut StdRng,
        source: &AccountInfo,
        at: DateTime<Utc>,
    ) -> SimResult<Event> {
        let accounts = self.collaborators.accounts.list_accounts();

        let candidates: Vec<&AccountInfo> =
            accounts.iter().filter(|a| a.id != source.id).collect();
        let target = candidates.choose(rng).ok_or_else(|| {
            SimError::invalid_state(format!(
                "account {} has no transfer counterparty",
                source.number
            ))
        })?;

        let amount = Decimal::new(rng.gen_range(1_00..500_00), 2);
        let balance = accounts
            .iter()
            .find(|a| a.id == source.id)
            .map(|a| a.balance)
            .unwrap_or_default();
        if balance < amount {
            return Err(SimError::invalid_state(format!(
                "transfer of {amount} would overdraw account {} (balance {balance})",
                source.number
            )));
        }

        let transaction_id = self.collaborators.accounts.transfer(
            &source.id,
            &target.number,
            amount,
            &settings.currency,
            "synthetic transfer",
            at,
        )?;

        Ok(Event::new(
            at,
            EventType::Transaction,
            format!(
                "transferred {} {} from {} to {}",
                amount, settings.currency, source.number, target.number
            ),
        )
        .with_entity("transaction", transaction_id)
        .with_parameter("source_account_id", &source.id)
        .with_parameter("target_account_id", &target.id)
        .with_parameter("amount", amount))
    }

    /// Informational events mirroring the latest cached market data. No domain mutation.
    fn external_context_pass(
        &self,
        settings: &GeneratorSettings,
        rng: &mut StdRng,
        clock: &mut DayClock,
        out: &mut GeneratorOutput,
    ) -> SimResult<()> {
        let market = &self.collaborators.market;

        if settings.rate_probability > 0.0 && rng.gen_bool(settings.rate_probability) {
            let at = clock.next();
            match market.latest_rate() {
                Some(rate) => out.events.push(
                    Event::new(
                        at,
                        EventType::RateFluctuation,
                        format!("{} trading at {}", rate.pair, rate.rate),
                    )
                    .with_parameter("pair", &rate.pair)
                    .with_parameter("rate", rate.rate),
                ),
                None => skip(out, at, "rate snapshot", "rate cache is empty"),
            }
        }

        if settings.news_probability > 0.0 && rng.gen_bool(settings.news_probability) {
            let at = clock.next();
            match market.latest_news() {
                Some(news) => out.events.push(
                    Event::new(at, EventType::NewsEvent, news.headline.clone())
                        .with_parameter("sentiment", news.sentiment),
                ),
                None => skip(out, at, "news snapshot", "news cache is empty"),
            }
        }

        if settings.indicator_probability > 0.0 && rng.gen_bool(settings.indicator_probability) {
            let at = clock.next();
            match market.latest_indicator() {
                Some(indicator) => out.events.push(
                    Event::new(
                        at,
                        EventType::EconomicIndicator,
                        format!("{} at {}", indicator.name, indicator.value),
                    )
                    .with_parameter("indicator", &indicator.name)
                    .with_parameter("value", indicator.value),
                ),
                None => skip(out, at, "indicator snapshot", "indicator cache is empty"),
            }
        }

        Ok(())
    }

    /// A fraud attempt against a random account, followed by the risk assessment it triggers.
    /// The risk collaborator is load-bearing here: its failure fails the run.
    fn risk_pass(
        &self,
        settings: &GeneratorSettings,
        rng: &mut StdRng,
        clock: &mut DayClock,
        out: &mut GeneratorOutput,
    ) -> SimResult<()> {
        if settings.fraud_probability <= 0.0 || !rng.gen_bool(settings.fraud_probability) {
            return Ok(());
        }

        let accounts = self.collaborators.accounts.list_accounts();
        let Some(target) = accounts.choose(rng) else {
            skip(out, clock.day, "fraud attempt", "no accounts exist yet");
            return Ok(());
        };

        let at = clock.next();
        out.events.push(
            Event::new(
                at,
                EventType::FraudAttempt,
                format!("suspicious activity detected on account {}", target.number),
            )
            .with_entity("account", &target.id),
        );

        let assessment = self
            .collaborators
            .risk
            .assess_account_risk(&target.id)
            .map_err(|e| SimError::collaborator(format!("risk assessment failed: {e}")))?;

        let at = clock.next();
        out.events.push(
            Event::new(
                at,
                EventType::RiskAssessment,
                format!(
                    "account {} assessed as {} risk (score {:.2})",
                    target.number, assessment.rating, assessment.score
                ),
            )
            .with_entity("account", &target.id)
            .with_parameter("score", assessment.score)
            .with_parameter("rating", assessment.rating),
        );

        Ok(())
    }

    /// Occasional loan activity: a disbursement onto a random account, or a repayment when that
    /// account already carries an open loan.
    fn loan_pass(
        &self,
        settings: &GeneratorSettings,
        rng: &mut StdRng,
        clock: &mut DayClock,
        open_loans: &mut HashSet<String>,
        out: &mut GeneratorOutput,
    ) -> SimResult<()> {
        if settings.loan_probability <= 0.0 || !rng.gen_bool(settings.loan_probability) {
            return Ok(());
        }

        let accounts = self.collaborators.accounts.list_accounts();
        let Some(account) = accounts.choose(rng) else {
            skip(out, clock.day, "loan", "no accounts exist yet");
            return Ok(());
        };

        let at = clock.next();
        if open_loans.remove(&account.id) {
            let amount = Decimal::new(rng.gen_range(100_00..2_000_00), 2);
            out.events.push(
                Event::new(
                    at,
                    EventType::LoanRepayment,
                    format!("loan repayment of {} {} on account {}", amount, settings.currency, account.number),
                )
                .with_entity("account", &account.id)
                .with_parameter("amount", amount),
            );
        } else {
            let amount = Decimal::new(rng.gen_range(500_00..10_000_00), 2);
            let result = self.collaborators.accounts.deposit(
                &account.id,
                amount,
                &settings.currency,
                "loan disbursement",
                at,
            );
            if unit(out, at, "loan", result)?.is_none() {
                return Ok(());
            }

            open_loans.insert(account.id.clone());
            out.events.push(
                Event::new(
                    at,
                    EventType::LoanIssued,
                    format!("loan of {} {} issued to account {}", amount, settings.currency, account.number),
                )
                .with_entity("account", &account.id)
                .with_parameter("amount", amount),
            );
        }

        Ok(())
    }
}

/// Per-unit failure filter: `NotFound`/`InvalidState` become a recorded skip, anything else
/// propagates and fails the run.
fn unit<T>(
    out: &mut GeneratorOutput,
    at: DateTime<Utc>,
    what: &'static str,
    result: SimResult<T>,
) -> SimResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_skippable() => {
            log::debug!("Skipping {what}: {e}");
            out.skipped.push(SkippedUnit {
                day: at,
                what,
                reason: e.to_string(),
            });
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn skip(out: &mut GeneratorOutput, day: DateTime<Utc>, what: &'static str, reason: &str) {
    log::debug!("Skipping {what}: {reason}");
    out.skipped.push(SkippedUnit {
        day,
        what,
        reason: reason.to_string(),
    });
}

fn synthetic_name(rng: &mut StdRng) -> String {
    const FIRST: &[&str] = &[
        "Alex", "Dana", "Jordan", "Kim", "Morgan", "Riley", "Sam", "Taylor",
    ];
    const LAST: &[&str] = &[
        "Archer", "Bell", "Castillo", "Diaz", "Ellis", "Flores", "Grant", "Hayes",
    ];
    format!(
        "{} {}",
        FIRST.choose(rng).expect("FIRST is non-empty"),
        LAST.choose(rng).expect("LAST is non-empty")
    )
}
