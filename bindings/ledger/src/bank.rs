use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use sandbank_runner::prelude::{
    AccountInfo, AccountKind, AccountService, SimError, SimResult,
};

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub id: String,
    pub source_account_id: Option<String>,
    pub target_account_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
    pub at: DateTime<Utc>,
}

#[derive(Default)]
struct LedgerState {
    /// User id to display name.
    users: HashMap<String, String>,
    accounts: HashMap<String, AccountInfo>,
    account_ids_by_number: HashMap<String, String>,
    transactions: Vec<TransactionRecord>,
    next_user: u64,
    next_account: u64,
    next_transaction: u64,
}

impl LedgerState {
    fn account_mut(&mut self, id: &str) -> SimResult<&mut AccountInfo> {
        self.accounts
            .get_mut(id)
            .ok_or_else(|| SimError::not_found("account", id))
    }

    fn record_transaction(
        &mut self,
        source_account_id: Option<String>,
        target_account_id: String,
        amount: Decimal,
        currency: &str,
        description: &str,
        at: DateTime<Utc>,
    ) -> String {
        self.next_transaction += 1;
        let id = format!("TXN-{}", self.next_transaction);
        self.transactions.push(TransactionRecord {
            id: id.clone(),
            source_account_id,
            target_account_id,
            amount,
            currency: currency.to_string(),
            description: description.to_string(),
            at,
        });
        id
    }
}

/// The live ledger every run mutates.
///
/// Runs executing concurrently share this state on purpose: two runs can race to transfer
/// between the same accounts, serialised only by the ledger's own lock. Balances never go
/// negative; a transfer that would overdraw its source is rejected as `InvalidState`.
#[derive(Default)]
pub struct InMemoryBank {
    state: Mutex<LedgerState>,
}

impl InMemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transactions(&self) -> Vec<TransactionRecord> {
        self.state.lock().transactions.clone()
    }

    /// Number of transactions that touched the account, as either source or target.
    pub fn transaction_count_for(&self, account_id: &str) -> usize {
        self.state
            .lock()
            .transactions
            .iter()
            .filter(|t| {
                t.target_account_id == account_id
                    || t.source_account_id.as_deref() == Some(account_id)
            })
            .count()
    }

    pub fn account(&self, account_id: &str) -> SimResult<AccountInfo> {
        self.state
            .lock()
            .accounts
            .get(account_id)
            .cloned()
            .ok_or_else(|| SimError::not_found("account", account_id))
    }
}

impl AccountService for InMemoryBank {
    fn create_user(&self, display_name: &str) -> SimResult<String> {
        let mut state = self.state.lock();
        state.next_user += 1;
        let id = format!("USR-{}", state.next_user);
        state.users.insert(id.clone(), display_name.to_string());
        log::debug!("Created user {id} ({display_name})");
        Ok(id)
    }

    fn create_account(
        &self,
        user_id: &str,
        bank_id: &str,
        kind: AccountKind,
        currency: &str,
    ) -> SimResult<AccountInfo> {
        let mut state = self.state.lock();
        if !state.users.contains_key(user_id) {
            return Err(SimError::not_found("user", user_id));
        }

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
        state
            .account_ids_by_number
            .insert(account.number.clone(), account.id.clone());
        state.accounts.insert(account.id.clone(), account.clone());
        log::debug!("Opened account {} for user {user_id}", account.number);
        Ok(account)
    }

    fn list_accounts(&self) -> Vec<AccountInfo> {
        let mut accounts: Vec<AccountInfo> =
            self.state.lock().accounts.values().cloned().collect();
        // Stable order so random selections over the list are reproducible under a seed.
        accounts.sort_by(|a, b| a.id.cmp(&b.id));
        accounts
    }

    fn accounts_for_user(&self, user_id: &str) -> SimResult<Vec<AccountInfo>> {
        let state = self.state.lock();
        if !state.users.contains_key(user_id) {
            return Err(SimError::not_found("user", user_id));
        }
        Ok(state
            .accounts
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    fn deposit(
        &self,
        account_id: &str,
        amount: Decimal,
        currency: &str,
        description: &str,
        at: DateTime<Utc>,
    ) -> SimResult<String> {
        if amount <= Decimal::ZERO {
            return Err(SimError::invalid_state(format!(
                "deposit amount must be positive, got {amount}"
            )));
        }

        let mut state = self.state.lock();
        let account = state.account_mut(account_id)?;
        account.balance += amount;

        Ok(state.record_transaction(None, account_id.to_string(), amount, currency, description, at))
    }

    fn transfer(
        &self,
        source_account_id: &str,
        target_number: &str,
        amount: Decimal,
        currency: &str,
        description: &str,
        at: DateTime<Utc>,
    ) -> SimResult<String> {
        if amount <= Decimal::ZERO {
            return Err(SimError::invalid_state(format!(
                "transfer amount must be positive, got {amount}"
            )));
        }

        let mut state = self.state.lock();

        let target_id = state
            .account_ids_by_number
            .get(target_number)
            .cloned()
            .ok_or_else(|| SimError::not_found("account", target_number))?;
        if target_id == source_account_id {
            return Err(SimError::invalid_state(format!(
                "account {target_number} cannot transfer to itself"
            )));
        }

        let source = state.account_mut(source_account_id)?;
        if source.balance < amount {
            return Err(SimError::invalid_state(format!(
                "insufficient funds on account {source_account_id}: balance {} < {amount}",
                source.balance
            )));
        }
        source.balance -= amount;
        state.account_mut(&target_id)?.balance += amount;

        Ok(state.record_transaction(
            Some(source_account_id.to_string()),
            target_id,
            amount,
            currency,
            description,
            at,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn funded_account(bank: &InMemoryBank, cents: i64) -> AccountInfo {
        let user = bank.create_user("Test User").unwrap();
        let account = bank
            .create_account(&user, "SIM-BANK-1", AccountKind::Checking, "USD")
            .unwrap();
        if cents > 0 {
            bank.deposit(&account.id, Decimal::new(cents, 2), "USD", "seed", Utc::now())
                .unwrap();
        }
        bank.account(&account.id).unwrap()
    }

    #[test]
    fn deposit_credits_the_account() {
        env_logger::try_init().ok();
        let bank = InMemoryBank::new();
        let account = funded_account(&bank, 125_50);

        assert_eq!(account.balance, Decimal::new(125_50, 2));
        assert_eq!(bank.transaction_count_for(&account.id), 1);
    }

    #[test]
    fn transfer_moves_funds_between_accounts() {
        env_logger::try_init().ok();
        let bank = InMemoryBank::new();
        let source = funded_account(&bank, 100_00);
        let target = funded_account(&bank, 0);

        let txn = bank
            .transfer(
                &source.id,
                &target.number,
                Decimal::new(40_00, 2),
                "USD",
                "rent",
                Utc::now(),
            )
            .unwrap();
        assert!(txn.starts_with("TXN-"));

        assert_eq!(bank.account(&source.id).unwrap().balance, Decimal::new(60_00, 2));
        assert_eq!(bank.account(&target.id).unwrap().balance, Decimal::new(40_00, 2));
    }

    #[test]
    fn transfer_rejects_overdraw_and_unknown_target() {
        env_logger::try_init().ok();
        let bank = InMemoryBank::new();
        let source = funded_account(&bank, 10_00);
        let target = funded_account(&bank, 0);

        let overdraw = bank.transfer(
            &source.id,
            &target.number,
            Decimal::new(20_00, 2),
            "USD",
            "too much",
            Utc::now(),
        );
        assert!(matches!(overdraw, Err(SimError::InvalidState(_))));

        let missing = bank.transfer(
            &source.id,
            "SB-99999999",
            Decimal::new(1_00, 2),
            "USD",
            "nowhere",
            Utc::now(),
        );
        assert!(matches!(missing, Err(SimError::NotFound { .. })));

        // Balances are untouched by the rejected transfers.
        assert_eq!(bank.account(&source.id).unwrap().balance, Decimal::new(10_00, 2));
    }

    #[test]
    fn self_transfer_is_rejected() {
        env_logger::try_init().ok();
        let bank = InMemoryBank::new();
        let account = funded_account(&bank, 50_00);

        let result = bank.transfer(
            &account.id,
            &account.number,
            Decimal::new(1_00, 2),
            "USD",
            "loop",
            Utc::now(),
        );
        assert!(matches!(result, Err(SimError::InvalidState(_))));
    }

    #[test]
    fn account_creation_requires_an_existing_user() {
        env_logger::try_init().ok();
        let bank = InMemoryBank::new();
        let result = bank.create_account("USR-404", "SIM-BANK-1", AccountKind::Savings, "USD");
        assert!(matches!(result, Err(SimError::NotFound { .. })));
    }
}
