//! Shared in-memory collaborator fakes for the runner's integration tests.

// Not every test binary exercises every helper in here.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use sandbank_runner::prelude::*;

#[derive(Default)]
struct BankState {
    accounts: Vec<AccountInfo>,
    next_user: u64,
    next_account: u64,
    next_transaction: u64,
}

/// Minimal account service; configurable to slow down or to refuse to credit deposits so that
/// tests can provoke queueing and skip paths.
pub struct FakeBank {
    state: Mutex<BankState>,
    pub delay_per_user: Option<Duration>,
    pub credit_deposits: bool,
}

impl Default for FakeBank {
    fn default() -> Self {
        Self {
            state: Mutex::new(BankState::default()),
            delay_per_user: None,
            credit_deposits: true,
        }
    }
}

impl FakeBank {
    pub fn slow(delay_per_user: Duration) -> Self {
        Self {
            delay_per_user: Some(delay_per_user),
            ..Self::default()
        }
    }

    pub fn broke() -> Self {
        Self {
            credit_deposits: false,
            ..Self::default()
        }
    }
}

impl AccountService for FakeBank {
    fn create_user(&self, _display_name: &str) -> SimResult<String> {
        if let Some(delay) = self.delay_per_user {
            std::thread::sleep(delay);
        }
        let mut state = self.state.lock();
        state.next_user += 1;
        Ok(format!("USR-{}", state.next_user))
    }

    fn create_account(
        &self,
        user_id: &str,
        bank_id: &str,
        kind: AccountKind,
        currency: &str,
    ) -> SimResult<AccountInfo> {
        let mut state = self.state.lock();
        state.next_account += 1;
        let account = AccountInfo {
            id: format!("ACC-{}", state.next_account),
            number: format!("SB-{:08}", state.next_account),
            user_id: user_id.to_string(),
            bank_id: bank_id.to_string(),
            kind,
            currency: currency.to_string(),
            balance: Decimal::ZERO,
        };
        state.accounts.push(account.clone());
        Ok(account)
    }

    fn list_accounts(&self) -> Vec<AccountInfo> {
        self.state.lock().accounts.clone()
    }

    fn accounts_for_user(&self, user_id: &str) -> SimResult<Vec<AccountInfo>> {
        Ok(self
            .state
            .lock()
            .accounts
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    fn deposit(
        &self,
        account_id: &str,
        amount: Decimal,
        _currency: &str,
        _description: &str,
        _at: DateTime<Utc>,
    ) -> SimResult<String> {
        let mut state = self.state.lock();
        let account = state
            .accounts
            .iter_mut()
            .find(|a| a.id == account_id)
            .ok_or_else(|| SimError::not_found("account", account_id))?;
        if self.credit_deposits {
            account.balance += amount;
        }
        state.next_transaction += 1;
        Ok(format!("TXN-{}", state.next_transaction))
    }

    fn transfer(
        &self,
        source_account_id: &str,
        target_number: &str,
        amount: Decimal,
        _currency: &str,
        _description: &str,
        _at: DateTime<Utc>,
    ) -> SimResult<String> {
        let mut state = self.state.lock();

        let source_balance = state
            .accounts
            .iter()
            .find(|a| a.id == source_account_id)
            .map(|a| a.balance)
            .ok_or_else(|| SimError::not_found("account", source_account_id))?;
        if source_balance < amount {
            return Err(SimError::invalid_state(format!(
                "insufficient funds on account {source_account_id}"
            )));
        }
        if !state.accounts.iter().any(|a| a.number == target_number) {
            return Err(SimError::not_found("account", target_number));
        }

        for account in state.accounts.iter_mut() {
            if account.id == source_account_id {
                account.balance -= amount;
            } else if account.number == target_number {
                account.balance += amount;
            }
        }
        state.next_transaction += 1;
        Ok(format!("TXN-{}", state.next_transaction))
    }
}

/// Market cache with fixed contents; `empty()` models caches that have never been filled.
#[derive(Default)]
pub struct FakeMarket {
    pub rate: Option<RateSnapshot>,
    pub news: Option<NewsItem>,
    pub indicator: Option<EconomicIndicator>,
}

impl FakeMarket {
    pub fn filled() -> Self {
        let as_of = Utc::now();
        Self {
            rate: Some(RateSnapshot {
                pair: "EUR/USD".to_string(),
                rate: Decimal::new(1_0842, 4),
                as_of,
            }),
            news: Some(NewsItem {
                headline: "Central bank holds rates steady".to_string(),
                sentiment: 0.1,
                as_of,
            }),
            indicator: Some(EconomicIndicator {
                name: "CPI YoY".to_string(),
                value: Decimal::new(31, 1),
                as_of,
            }),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

impl MarketDataCache for FakeMarket {
    fn latest_rate(&self) -> Option<RateSnapshot> {
        self.rate.clone()
    }

    fn latest_news(&self) -> Option<NewsItem> {
        self.news.clone()
    }

    fn latest_indicator(&self) -> Option<EconomicIndicator> {
        self.indicator.clone()
    }
}

pub struct FakeRisk {
    pub fail: bool,
}

impl RiskService for FakeRisk {
    fn assess_account_risk(&self, account_id: &str) -> SimResult<RiskAssessment> {
        if self.fail {
            return Err(SimError::collaborator("risk service unavailable"));
        }
        Ok(RiskAssessment {
            account_id: account_id.to_string(),
            score: 0.42,
            rating: RiskRating::Medium,
            assessed_at: Utc::now(),
        })
    }
}

pub fn collaborators(bank: Arc<FakeBank>, market: FakeMarket, risk: FakeRisk) -> Collaborators {
    Collaborators {
        accounts: bank,
        market: Arc::new(market),
        risk: Arc::new(risk),
    }
}

/// A scenario with every probabilistic pass switched off, so only the population pass runs.
pub fn quiet_scenario(name: &str, days: u32, users: u32, transactions: u32) -> Scenario {
    Scenario::new(name, ScenarioKind::RoutineOperations)
        .with_duration_days(days)
        .with_parameter("numUsersPerDay", users)
        .with_parameter("numTransactionsPerUser", transactions)
        .with_parameter("rateEventProbability", 0.0)
        .with_parameter("newsEventProbability", 0.0)
        .with_parameter("indicatorEventProbability", 0.0)
        .with_parameter("fraudProbability", 0.0)
        .with_parameter("loanProbability", 0.0)
}

/// Poll until the run reaches a terminal state, panicking if it takes too long.
pub fn wait_for_terminal(orchestrator: &Orchestrator, run_id: &str, timeout: Duration) -> Run {
    let deadline = std::time::Instant::now() + timeout;
    loop {
        let run = orchestrator
            .run_status(run_id)
            .expect("run should be queryable while waiting");
        if run.status.is_terminal() {
            return run;
        }
        assert!(
            std::time::Instant::now() < deadline,
            "run {run_id} did not finish within {timeout:?}, last status {}",
            run.status
        );
        std::thread::sleep(Duration::from_millis(5));
    }
}
