//! Account and category balances.
//!
//! Account balances are recomputed per account by [`Ledger::rebalance`];
//! while any update scope is open the request is deferred and each affected
//! account is rebalanced once when the last scope closes.
//!
//! Category balances are maintained by delta. The ledger remembers what
//! each transaction currently contributes to which category; after every
//! edit the contribution is recomputed and only the difference is pushed
//! into the hierarchy. [`Ledger::recompute_category_balances`] rebuilds the
//! same numbers from scratch.

use crate::core::error::{LedgerError, Result};
use crate::core::events::{EntityKind, NodeId};
use crate::core::ids::{AccountId, CategoryId, TransactionId};
use crate::ledger::book::Ledger;
use crate::ledger::transaction::TransferLink;
use crate::registry::Entity;
use chrono::Local;
use rust_decimal::Decimal;

impl Ledger {
    /// Recompute the running balance of every transaction in `account`, the
    /// account balance and its reconciled balance.
    ///
    /// Void transactions are skipped. Accounts that hold securities also
    /// count the market value reported by the cost-basis collaborator.
    /// Returns whether the account balance changed.
    pub fn rebalance(&mut self, account: AccountId) -> Result<bool> {
        let acct = self.accounts.live(account)?;
        let opening = acct.opening_balance;
        let holdings = if acct.account_type.holds_securities() {
            let as_of = self
                .config()
                .investment_valuation_date
                .unwrap_or_else(|| Local::now().date_naive());
            self.cost_basis
                .holdings(acct, as_of)
                .iter()
                .map(|h| h.market_value)
                .sum()
        } else {
            Decimal::ZERO
        };

        let mut running = opening;
        let mut reconciled = opening;
        for id in self.transactions.ids_for_account(account) {
            let Some(t) = self.transactions.get_mut(id) else { continue };
            if !t.is_void() {
                running += t.amount;
                if t.is_reconciled() {
                    reconciled += t.amount;
                }
            }
            t.running_balance = running;
        }
        let balance = running + holdings;

        let acct = self.accounts.live_mut(account)?;
        let changed = acct.balance != balance;
        acct.balance = balance;
        acct.reconciled_balance = reconciled;
        if changed {
            self.events.raise_field(NodeId::account(account), "balance");
        }
        Ok(changed)
    }

    /// Rebalance every live account. Returns how many balances changed.
    pub fn rebalance_all(&mut self) -> usize {
        let mut changed = 0;
        for account in self.accounts.ids() {
            if let Ok(true) = self.rebalance(account) {
                changed += 1;
            }
        }
        changed
    }

    /// Rebalance now, or after the last open scope closes.
    pub(crate) fn request_rebalance(&mut self, account: AccountId) {
        if self.events.any_batching() {
            self.pending_rebalance.insert(account);
            return;
        }
        if self.accounts.contains(account) {
            if let Err(e) = self.rebalance(account) {
                log::warn!("rebalance of {} failed: {}", account, e);
            }
        }
    }

    pub(crate) fn flush_rebalances(&mut self) {
        let pending = std::mem::take(&mut self.pending_rebalance);
        for account in pending {
            if self.accounts.contains(account) {
                if let Err(e) = self.rebalance(account) {
                    log::warn!("deferred rebalance of {} failed: {}", account, e);
                }
            }
        }
    }

    /// Bring a transaction's derived state up to date after an edit.
    pub(crate) fn settle(&mut self, id: TransactionId) {
        let account = self.transactions.get_mut(id).map(|t| {
            let target = t.split_target();
            t.splits.rebalance(target);
            t.account
        });
        self.sync_attribution(id);
        if let Some(account) = account {
            self.request_rebalance(account);
        }
    }

    /// What `id` contributes to category balances right now.
    ///
    /// Inert transactions and transactions inside category-fund accounts
    /// contribute nothing. A split transaction contributes its splits. A
    /// transfer into a category-fund account counts against the fund's
    /// category.
    pub fn attribution(&self, id: TransactionId) -> Vec<(CategoryId, Decimal)> {
        let Some(t) = self.transactions.get(id).filter(|t| !t.is_inert()) else {
            return Vec::new();
        };
        if self.fund_category(t.account).is_some() {
            return Vec::new();
        }
        if t.has_splits() {
            t.splits
                .iter()
                .filter_map(|s| {
                    self.attributed_category(s.category, s.transfer.as_ref())
                        .map(|c| (c, s.amount))
                })
                .collect()
        } else {
            self.attributed_category(t.category, t.transfer.as_ref())
                .map(|c| (c, t.amount))
                .into_iter()
                .collect()
        }
    }

    fn attributed_category(&self, category: Option<CategoryId>, transfer: Option<&TransferLink>) -> Option<CategoryId> {
        transfer
            .and_then(|link| self.fund_category(link.account))
            .or(category)
            .filter(|c| self.categories.contains(*c))
    }

    fn fund_category(&self, account: AccountId) -> Option<CategoryId> {
        self.accounts
            .get(account)
            .filter(|a| !a.is_deleted())
            .and_then(|a| a.fund_category())
    }

    /// Push the difference between `id`'s remembered and current
    /// contribution into the category hierarchy.
    pub(crate) fn sync_attribution(&mut self, id: TransactionId) {
        let now = self.attribution(id);
        let before = self.attributed.remove(&id).unwrap_or_default();
        if before != now {
            for (category, amount) in &before {
                self.categories.add_balance(*category, -*amount, &mut self.events);
            }
            for (category, amount) in &now {
                self.categories.add_balance(*category, *amount, &mut self.events);
            }
        }
        if !now.is_empty() {
            self.attributed.insert(id, now);
        }
    }

    /// Zero every category and attribute every live transaction once.
    pub fn recompute_category_balances(&mut self) {
        self.batch(NodeId::Container(EntityKind::Category), |ledger| {
            ledger.categories.clear_balances();
            ledger.attributed.clear();
            let ids: Vec<TransactionId> = ledger.transactions.iter().map(|t| t.id()).collect();
            for id in ids {
                ledger.sync_attribution(id);
            }
        });
        log::debug!("recomputed category balances");
    }

    /// Open a reconciliation scope on `account`: reconciled amounts in it
    /// become editable and its rebalancing is deferred until the scope ends.
    pub fn begin_reconcile(&mut self, account: AccountId) -> Result<()> {
        self.accounts.live(account)?;
        if !self.reconciling.insert(account) {
            return Err(LedgerError::InvalidMutation {
                transaction: account.to_string(),
                reason: "account is already being reconciled".to_string(),
            });
        }
        self.begin_update(NodeId::account(account));
        Ok(())
    }

    pub fn end_reconcile(&mut self, account: AccountId) {
        if self.reconciling.remove(&account) {
            self.end_update(NodeId::account(account));
        }
    }

    pub fn is_reconciling(&self, account: AccountId) -> bool {
        self.reconciling.contains(&account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::LedgerConfig;
    use crate::core::ids::SecurityId;
    use crate::ledger::holdings::{FixedHoldings, Holding};
    use crate::ledger::transaction::{Transaction, TransactionStatus};
    use crate::registry::account::{Account, AccountType};
    use crate::registry::category::CategoryType;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
    }

    #[test]
    fn test_running_and_reconciled_balance() {
        let mut ledger = Ledger::new();
        let a = ledger
            .add_account(Account::new("Checking", AccountType::Checking).with_opening_balance(dec!(100)))
            .unwrap();
        let late = ledger.add_transaction(Transaction::new(a, day(20), dec!(-30))).unwrap();
        let early = ledger
            .add_transaction(Transaction::new(a, day(2), dec!(50)).with_status(TransactionStatus::Reconciled))
            .unwrap();

        assert_eq!(ledger.transaction(early).unwrap().running_balance(), dec!(150));
        assert_eq!(ledger.transaction(late).unwrap().running_balance(), dec!(120));
        let account = ledger.account(a).unwrap();
        assert_eq!(account.balance(), dec!(120));
        assert_eq!(account.reconciled_balance(), dec!(150));
    }

    #[test]
    fn test_rebalance_reports_change_once() {
        let mut ledger = Ledger::new();
        let a = ledger.add_account(Account::new("Cash", AccountType::Cash)).unwrap();
        ledger.add_transaction(Transaction::new(a, day(1), dec!(5))).unwrap();
        assert!(!ledger.rebalance(a).unwrap());
    }

    #[test]
    fn test_rebalance_deferred_inside_batch() {
        let mut ledger = Ledger::new();
        let a = ledger.add_account(Account::new("Cash", AccountType::Cash)).unwrap();
        ledger.begin_update(NodeId::Ledger);
        ledger.add_transaction(Transaction::new(a, day(1), dec!(5))).unwrap();
        ledger.add_transaction(Transaction::new(a, day(2), dec!(7))).unwrap();
        assert_eq!(ledger.account(a).unwrap().balance(), Decimal::ZERO);
        ledger.end_update(NodeId::Ledger);
        assert_eq!(ledger.account(a).unwrap().balance(), dec!(12));
    }

    #[test]
    fn test_brokerage_includes_market_value() {
        let config = LedgerConfig {
            investment_valuation_date: Some(day(31)),
            ..LedgerConfig::default()
        };
        let mut ledger = Ledger::with_config(config);
        let mut holdings = FixedHoldings::new();
        holdings.hold(
            AccountId::new(0),
            Holding {
                security: SecurityId::new(0),
                units_remaining: dec!(10),
                market_value: dec!(420),
            },
        );
        ledger.set_cost_basis(holdings);
        let a = ledger
            .add_account(Account::new("Brokerage", AccountType::Brokerage).with_opening_balance(dec!(80)))
            .unwrap();
        assert_eq!(a, AccountId::new(0));
        assert_eq!(ledger.account(a).unwrap().balance(), dec!(500));
    }

    #[test]
    fn test_incremental_matches_recompute() {
        let mut ledger = Ledger::new();
        let a = ledger.add_account(Account::new("Checking", AccountType::Checking)).unwrap();
        let rent = ledger.get_or_create_category("Home:Rent", CategoryType::Expense).unwrap();
        let home = ledger.categories().find_id("Home").unwrap();
        let t = ledger
            .add_transaction(Transaction::new(a, day(1), dec!(-900)).with_category(rent))
            .unwrap();
        ledger.set_amount(t, dec!(-950)).unwrap();
        let incremental = ledger.category(home).unwrap().balance();

        ledger.recompute_category_balances();
        assert_eq!(ledger.category(home).unwrap().balance(), incremental);
        assert_eq!(incremental, dec!(-950));
    }

    #[test]
    fn test_transfer_into_fund_counts_against_category() {
        let mut ledger = Ledger::new();
        let a = ledger.add_account(Account::new("Checking", AccountType::Checking)).unwrap();
        let vacation = ledger.get_or_create_category("Vacation", CategoryType::Savings).unwrap();
        let fund = ledger.add_account(Account::category_fund("Vacation Fund", vacation)).unwrap();
        let t = ledger.add_transaction(Transaction::new(a, day(3), dec!(-75))).unwrap();
        ledger.transfer(t, fund).unwrap();
        assert_eq!(ledger.category(vacation).unwrap().balance(), dec!(-75));

        ledger.recompute_category_balances();
        assert_eq!(ledger.category(vacation).unwrap().balance(), dec!(-75));
    }

    #[test]
    fn test_double_reconcile_rejected() {
        let mut ledger = Ledger::new();
        let a = ledger.add_account(Account::new("Checking", AccountType::Checking)).unwrap();
        ledger.begin_reconcile(a).unwrap();
        assert!(ledger.begin_reconcile(a).is_err());
        ledger.end_reconcile(a);
        assert!(!ledger.is_reconciling(a));
        assert!(!ledger.is_batching());
    }
}
