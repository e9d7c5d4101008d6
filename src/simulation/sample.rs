//! Sample ledger generation.
//!
//! Builds a ledger with random accounts, a nested category tree, payees,
//! split transactions and transfers, all through the public mutation API so
//! the result is internally consistent.

use crate::core::error::Result;
use crate::core::events::NodeId;
use crate::core::ids::{AccountId, CategoryId, PayeeId};
use crate::ledger::book::Ledger;
use crate::ledger::split::Split;
use crate::ledger::transaction::Transaction;
use crate::registry::account::{Account, AccountType};
use crate::registry::category::CategoryType;
use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

const ACCOUNT_TYPES: [AccountType; 4] = [
    AccountType::Checking,
    AccountType::Savings,
    AccountType::Credit,
    AccountType::Cash,
];

const CATEGORY_ROOTS: [&str; 6] = ["Food", "Home", "Travel", "Health", "Auto", "Fun"];

/// Shape of a generated ledger.
#[derive(Debug, Clone)]
pub struct SampleConfig {
    pub account_count: usize,
    /// Children created under each root category.
    pub subcategories_per_root: usize,
    pub payee_count: usize,
    /// Average number of transactions per account.
    pub transactions_per_account: usize,
    /// Probability that a transaction is split in two.
    pub split_ratio: f64,
    /// Probability that a transaction becomes a transfer.
    pub transfer_ratio: f64,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    pub start_date: NaiveDate,
    /// Transactions are spread over this many days from `start_date`.
    pub days: i64,
    /// Fixed seed for reproducible ledgers; `None` draws from the thread rng.
    pub seed: Option<u64>,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            account_count: 4,
            subcategories_per_root: 3,
            payee_count: 12,
            transactions_per_account: 25,
            split_ratio: 0.1,
            transfer_ratio: 0.1,
            min_amount: Decimal::from(1),
            max_amount: Decimal::from(500),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or(NaiveDate::MIN),
            days: 365,
            seed: None,
        }
    }
}

/// Generate a random ledger shaped by `config`.
pub fn generate_sample_ledger(config: &SampleConfig) -> Result<Ledger> {
    match config.seed {
        Some(seed) => populate(&mut StdRng::seed_from_u64(seed), config),
        None => populate(&mut rand::thread_rng(), config),
    }
}

fn populate<R: Rng>(rng: &mut R, config: &SampleConfig) -> Result<Ledger> {
    let mut ledger = Ledger::new();
    ledger.begin_update(NodeId::Ledger);
    let result = fill(&mut ledger, rng, config);
    ledger.end_update(NodeId::Ledger);
    result?;
    ledger.accept_changes();
    log::debug!(
        "generated sample ledger: {} accounts, {} categories, {} transactions",
        ledger.accounts().len(),
        ledger.categories().len(),
        ledger.transactions().len()
    );
    Ok(ledger)
}

fn fill<R: Rng>(ledger: &mut Ledger, rng: &mut R, config: &SampleConfig) -> Result<()> {
    let accounts: Vec<AccountId> = (0..config.account_count)
        .map(|i| {
            let kind = ACCOUNT_TYPES[i % ACCOUNT_TYPES.len()];
            let opening = random_amount(rng, config);
            ledger.add_account(Account::new(format!("Account {:02}", i), kind).with_opening_balance(opening))
        })
        .collect::<Result<_>>()?;

    let mut categories: Vec<CategoryId> = Vec::new();
    for root in CATEGORY_ROOTS {
        for child in 0..config.subcategories_per_root {
            let path = format!("{}:Sub {}", root, child);
            categories.push(ledger.get_or_create_category(&path, CategoryType::Expense)?);
        }
        if config.subcategories_per_root == 0 {
            categories.push(ledger.get_or_create_category(root, CategoryType::Expense)?);
        }
    }

    let payees: Vec<PayeeId> = (0..config.payee_count)
        .map(|i| ledger.get_or_create_payee(&format!("Payee {:03}", i)))
        .collect::<Result<_>>()?;

    let total = config.account_count * config.transactions_per_account;
    for _ in 0..total {
        let account = accounts[rng.gen_range(0..accounts.len())];
        let date = config.start_date + Duration::days(rng.gen_range(0..config.days.max(1)));
        let amount = -random_amount(rng, config);

        let mut transaction = Transaction::new(account, date, amount);
        if !payees.is_empty() {
            transaction = transaction.with_payee(payees[rng.gen_range(0..payees.len())]);
        }
        let split = rng.gen_bool(config.split_ratio.clamp(0.0, 1.0));
        if !split {
            transaction = transaction.with_category(categories[rng.gen_range(0..categories.len())]);
        }
        let id = ledger.add_transaction(transaction)?;

        let other = (accounts.len() > 1).then(|| loop {
            let candidate = accounts[rng.gen_range(0..accounts.len())];
            if candidate != account {
                break candidate;
            }
        });
        let transfer = other.filter(|_| rng.gen_bool(config.transfer_ratio.clamp(0.0, 1.0)));

        if split {
            let half = (amount / Decimal::from(2)).round_dp(2);
            let first = Split::new(half).with_category(categories[rng.gen_range(0..categories.len())]);
            ledger.add_split(id, first)?;
            let second = ledger.add_split(id, Split::new(amount - half))?;
            match transfer {
                Some(to) => {
                    ledger.transfer_split(id, second, to)?;
                }
                None => {
                    let category = categories[rng.gen_range(0..categories.len())];
                    ledger.set_split_category(id, second, Some(category))?;
                }
            }
        } else if let Some(to) = transfer {
            ledger.transfer(id, to)?;
        }
    }
    Ok(())
}

fn random_amount<R: Rng>(rng: &mut R, config: &SampleConfig) -> Decimal {
    let min = (config.min_amount * Decimal::from(100)).to_i64().unwrap_or(100);
    let max = (config.max_amount * Decimal::from(100)).to_i64().unwrap_or(min + 1);
    let cents = if max > min { rng.gen_range(min..=max) } else { min };
    Decimal::new(cents, 2)
}
