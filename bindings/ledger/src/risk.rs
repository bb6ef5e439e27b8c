use std::sync::Arc;

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sandbank_runner::prelude::{RiskAssessment, RiskRating, RiskService, SimError, SimResult};

use crate::bank::InMemoryBank;

/// Scores an account from what the ledger knows about it: low balances and high transaction
/// churn both push the score up.
pub struct HeuristicRiskService {
    bank: Arc<InMemoryBank>,
}

impl HeuristicRiskService {
    pub fn new(bank: Arc<InMemoryBank>) -> Self {
        Self { bank }
    }
}

impl RiskService for HeuristicRiskService {
    fn assess_account_risk(&self, account_id: &str) -> SimResult<RiskAssessment> {
        let account = self
            .bank
            .account(account_id)
            .map_err(|e| SimError::collaborator(format!("cannot assess {account_id}: {e}")))?;
        let activity = self.bank.transaction_count_for(account_id);

        let balance = account.balance.max(Decimal::ZERO).to_f64().unwrap_or(0.0);
        // Thin balances score up to 0.6, churn adds up to 0.4.
        let balance_component = 0.6 * (1.0 - (balance / 10_000.0).min(1.0));
        let activity_component = 0.4 * ((activity as f64) / 50.0).min(1.0);
        let score = balance_component + activity_component;

        let rating = if score < 0.3 {
            RiskRating::Low
        } else if score < 0.7 {
            RiskRating::Medium
        } else {
            RiskRating::High
        };

        log::debug!("Assessed account {account_id}: score {score:.2} ({rating})");
        Ok(RiskAssessment {
            account_id: account_id.to_string(),
            score,
            rating,
            assessed_at: Utc::now(),
        })
    }
}
