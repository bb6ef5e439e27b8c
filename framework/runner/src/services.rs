use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use sandbank_core::prelude::SimResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    #[display("checking")]
    Checking,
    #[display("savings")]
    Savings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub id: String,
    pub number: String,
    pub user_id: String,
    pub bank_id: String,
    pub kind: AccountKind,
    pub currency: String,
    pub balance: Decimal,
}

/// Domain services the generator drives to make each event internally consistent.
///
/// Implementations live outside the runner (see the ledger bindings); the runner only relies on
/// the error taxonomy: `NotFound` and `InvalidState` (e.g. insufficient funds) mean "skip this
/// unit", anything else fails the enclosing run.
pub trait AccountService: Send + Sync {
    /// Create a synthetic user and return its id.
    fn create_user(&self, display_name: &str) -> SimResult<String>;

    /// Open an account for an existing user at the given bank. The balance starts at zero;
    /// seed it with [AccountService::deposit].
    fn create_account(
        &self,
        user_id: &str,
        bank_id: &str,
        kind: AccountKind,
        currency: &str,
    ) -> SimResult<AccountInfo>;

    fn list_accounts(&self) -> Vec<AccountInfo>;

    fn accounts_for_user(&self, user_id: &str) -> SimResult<Vec<AccountInfo>>;

    /// Book a deposit onto an account and return the transaction id.
    fn deposit(
        &self,
        account_id: &str,
        amount: Decimal,
        currency: &str,
        description: &str,
        at: DateTime<Utc>,
    ) -> SimResult<String>;

    /// Book a transfer from a source account to a target account addressed by its account
    /// number, and return the transaction id.
    fn transfer(
        &self,
        source_account_id: &str,
        target_number: &str,
        amount: Decimal,
        currency: &str,
        description: &str,
        at: DateTime<Utc>,
    ) -> SimResult<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum RiskRating {
    #[display("low")]
    Low,
    #[display("medium")]
    Medium,
    #[display("high")]
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub account_id: String,
    pub score: f64,
    pub rating: RiskRating,
    pub assessed_at: DateTime<Utc>,
}

/// Risk assessment collaborator. May be slow; a failure here aborts the enclosing run.
pub trait RiskService: Send + Sync {
    fn assess_account_risk(&self, account_id: &str) -> SimResult<RiskAssessment>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub pair: String,
    pub rate: Decimal,
    pub as_of: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub headline: String,
    pub sentiment: f64,
    pub as_of: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicIndicator {
    pub name: String,
    pub value: Decimal,
    pub as_of: DateTime<Utc>,
}

/// Read-only view over the external market-data caches.
///
/// Each accessor returns the latest cached value or `None`; the cache never blocks on a live
/// network call from the orchestrator's perspective.
pub trait MarketDataCache: Send + Sync {
    fn latest_rate(&self) -> Option<RateSnapshot>;
    fn latest_news(&self) -> Option<NewsItem>;
    fn latest_indicator(&self) -> Option<EconomicIndicator>;
}

/// The collaborator services a run executes against.
#[derive(Clone)]
pub struct Collaborators {
    pub accounts: Arc<dyn AccountService>,
    pub market: Arc<dyn MarketDataCache>,
    pub risk: Arc<dyn RiskService>,
}
