//! Flat snapshots of the entity graph.
//!
//! A [`Snapshot`] holds the live entities of every registry. Storage layers
//! write it out after [`Ledger::prepare_for_save`] and hand one back to
//! [`Ledger::from_snapshot`], which re-links everything by id.

use crate::core::config::LedgerConfig;
use crate::core::error::Result;
use crate::core::events::NodeId;
use crate::core::ids::{AccountId, TransactionId};
use crate::ledger::book::Ledger;
use crate::ledger::transaction::Transaction;
use crate::ledger::transactions::Transactions;
use crate::registry::account::Account;
use crate::registry::alias::Alias;
use crate::registry::category::Category;
use crate::registry::currency::Currency;
use crate::registry::online_account::OnlineAccount;
use crate::registry::payee::Payee;
use crate::registry::security::Security;
use crate::registry::{Entity, Registry};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub accounts: Vec<Account>,
    pub payees: Vec<Payee>,
    pub categories: Vec<Category>,
    pub securities: Vec<Security>,
    pub currencies: Vec<Currency>,
    pub aliases: Vec<Alias>,
    pub online_accounts: Vec<OnlineAccount>,
    pub transactions: Vec<Transaction>,
}

impl Snapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Total number of entities, splits not included.
    pub fn len(&self) -> usize {
        self.accounts.len()
            + self.payees.len()
            + self.categories.len()
            + self.securities.len()
            + self.currencies.len()
            + self.aliases.len()
            + self.online_accounts.len()
            + self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Registries built from a snapshot before any of them replaces live state.
struct Staged {
    accounts: Registry<Account>,
    payees: Registry<Payee>,
    categories: Registry<Category>,
    securities: Registry<Security>,
    currencies: Registry<Currency>,
    aliases: Registry<Alias>,
    online_accounts: Registry<OnlineAccount>,
    transactions: Transactions,
}

impl Staged {
    fn new(snapshot: Snapshot) -> Result<Self> {
        Ok(Self {
            accounts: Registry::from_loaded(snapshot.accounts)?,
            payees: Registry::from_loaded(snapshot.payees)?,
            categories: Registry::from_loaded(snapshot.categories)?,
            securities: Registry::from_loaded(snapshot.securities)?,
            currencies: Registry::from_loaded(snapshot.currencies)?,
            aliases: Registry::from_loaded(snapshot.aliases)?,
            online_accounts: Registry::from_loaded(snapshot.online_accounts)?,
            transactions: Transactions::from_loaded(snapshot.transactions)?,
        })
    }
}

impl Ledger {
    /// Every live entity. Deleted splits are left out as well.
    pub fn snapshot(&self) -> Snapshot {
        let transactions = self
            .transactions
            .iter()
            .map(|t| {
                let mut t = t.clone();
                t.splits.remove_deleted();
                t
            })
            .collect();
        Snapshot {
            accounts: self.accounts.iter().cloned().collect(),
            payees: self.payees.iter().cloned().collect(),
            categories: self.categories.iter().cloned().collect(),
            securities: self.securities.iter().cloned().collect(),
            currencies: self.currencies.iter().cloned().collect(),
            aliases: self.aliases.iter().cloned().collect(),
            online_accounts: self.online_accounts.iter().cloned().collect(),
            transactions,
        }
    }

    /// Sweep tombstones, then snapshot.
    pub fn prepare_for_save(&mut self) -> Snapshot {
        self.remove_deleted();
        self.snapshot()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self> {
        Self::from_snapshot_with_config(snapshot, LedgerConfig::default())
    }

    /// Rebuild a ledger from `snapshot`. Ids are kept; a repeated id fails
    /// with `DuplicateKey`. Everything comes back `Unchanged` apart from
    /// entities whose dangling references had to be dropped.
    pub fn from_snapshot_with_config(snapshot: Snapshot, config: LedgerConfig) -> Result<Self> {
        let staged = Staged::new(snapshot)?;
        let mut ledger = Ledger::with_config(config);
        ledger.install(staged);
        ledger.post_deserialize_fixup();
        log::info!(
            "loaded ledger: {} accounts, {} categories, {} transactions",
            ledger.accounts.len(),
            ledger.categories.len(),
            ledger.transactions.len()
        );
        Ok(ledger)
    }

    /// Replace every registry with the contents of `snapshot`, keeping the
    /// configuration, collaborators and subscriptions.
    ///
    /// Each container raises `Reloaded`, and observers get the whole reload
    /// as one batch. Open reconciliations are ended first. If the snapshot
    /// does not load, the ledger is left untouched.
    pub fn reload(&mut self, snapshot: Snapshot) -> Result<()> {
        let staged = Staged::new(snapshot)?;
        let open: Vec<AccountId> = self.reconciling.iter().copied().collect();
        for account in open {
            self.end_reconcile(account);
        }
        self.batch(NodeId::Ledger, |ledger| {
            ledger.attributed.clear();
            ledger.pending_rebalance.clear();
            ledger.install(staged);
            ledger.post_deserialize_fixup();
        });
        log::info!(
            "reloaded ledger: {} accounts, {} categories, {} transactions",
            self.accounts.len(),
            self.categories.len(),
            self.transactions.len()
        );
        Ok(())
    }

    fn install(&mut self, staged: Staged) {
        let hub = &mut self.events;
        self.online_accounts.replace(staged.online_accounts, hub);
        self.currencies.replace(staged.currencies, hub);
        self.securities.replace(staged.securities, hub);
        self.payees.replace(staged.payees, hub);
        self.aliases.replace(staged.aliases, hub);
        self.categories.replace(staged.categories, hub);
        self.accounts.replace(staged.accounts, hub);
        self.transactions.replace(staged.transactions, hub);
    }

    /// Re-link references after a load: drop references to entities that do
    /// not exist, compile alias patterns, rebuild the category tree, then
    /// recompute category balances and rebalance every account once.
    fn post_deserialize_fixup(&mut self) {
        for account in self.accounts.iter_mut() {
            let mut fixed = false;
            if account.online_account.is_some_and(|o| !self.online_accounts.contains(o)) {
                account.online_account = None;
                fixed = true;
            }
            if account.category_fund.is_some_and(|c| !self.categories.contains(c)) {
                account.category_fund = None;
                fixed = true;
            }
            if fixed {
                log::warn!("dropped unknown references on {}", account.id());
                account.set_state(account.state().touched());
            }
        }

        let homeless: Vec<TransactionId> = self
            .transactions
            .iter()
            .filter(|t| !self.accounts.contains(t.account))
            .map(|t| t.id())
            .collect();
        for id in &homeless {
            log::warn!("dropping {}: unknown account", id);
            self.transactions.remove(*id, &mut self.events);
        }
        if !homeless.is_empty() {
            self.transactions.remove_deleted();
        }

        for t in self.transactions.iter_mut() {
            let mut fixed = false;
            if t.payee.is_some_and(|p| !self.payees.contains(p)) {
                t.payee = None;
                fixed = true;
            }
            if t.category.is_some_and(|c| !self.categories.contains(c)) {
                t.category = None;
                fixed = true;
            }
            if let Some(investment) = t.investment.as_mut() {
                if investment.security.is_some_and(|s| !self.securities.contains(s)) {
                    investment.security = None;
                    fixed = true;
                }
            }
            for split in t.splits.iter_mut() {
                if split.payee.is_some_and(|p| !self.payees.contains(p)) {
                    split.payee = None;
                    fixed = true;
                }
                if split.category.is_some_and(|c| !self.categories.contains(c)) {
                    split.category = None;
                    fixed = true;
                }
            }
            let target = t.split_target();
            t.splits.rebalance(target);
            if fixed {
                log::warn!("dropped unknown references on {}", t.id());
                t.set_state(t.state().touched());
            }
        }

        let mut broken_aliases = Vec::new();
        for alias in self.aliases.iter_mut() {
            if !self.payees.contains(alias.payee) {
                log::warn!("dropping alias '{}': unknown payee {}", alias.pattern(), alias.payee);
                broken_aliases.push(alias.id());
            } else if let Err(e) = alias.compile() {
                log::warn!("dropping alias: {}", e);
                broken_aliases.push(alias.id());
            }
        }
        for id in broken_aliases {
            self.aliases.remove(id, &mut self.events);
        }

        let orphaned = self.categories.rebuild_tree();
        if orphaned > 0 {
            log::warn!("{} categories had unknown parents and became roots", orphaned);
        }
        self.recompute_category_balances();
        self.rebalance_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::{ChangeBatch, ChangeType, EntityKind};
    use crate::core::ids::{AccountId, CategoryId};
    use crate::ledger::split::Split;
    use std::sync::{Arc, Mutex};
    use crate::registry::EntityState;
    use crate::registry::account::AccountType;
    use crate::registry::category::CategoryType;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, d).unwrap()
    }

    fn sample() -> (Ledger, AccountId, AccountId) {
        let mut ledger = Ledger::new();
        let checking = ledger
            .add_account(Account::new("Checking", AccountType::Checking).with_opening_balance(dec!(1000)))
            .unwrap();
        let savings = ledger.add_account(Account::new("Savings", AccountType::Savings)).unwrap();
        let food = ledger
            .get_or_create_category("Food:Groceries", CategoryType::Expense)
            .unwrap();
        let grocer = ledger.get_or_create_payee("Grocer").unwrap();
        ledger.add_alias(Alias::regex("^GROCER.*", grocer).unwrap()).unwrap();
        let t = ledger
            .add_transaction(Transaction::new(checking, day(1), dec!(-200)))
            .unwrap();
        ledger.transfer(t, savings).unwrap();
        let shop = ledger
            .add_transaction(Transaction::new(checking, day(2), dec!(-60)).with_payee(grocer))
            .unwrap();
        ledger
            .add_split(shop, Split::new(dec!(-45)).with_category(food))
            .unwrap();
        (ledger, checking, savings)
    }

    #[test]
    fn test_round_trip_restores_derived_state() {
        let (mut ledger, checking, savings) = sample();
        let json = ledger.prepare_for_save().to_json().unwrap();
        let mut loaded = Ledger::from_snapshot(Snapshot::from_json(&json).unwrap()).unwrap();

        assert_eq!(loaded.account(checking).unwrap().balance(), dec!(740));
        assert_eq!(loaded.account(savings).unwrap().balance(), dec!(200));
        let food = loaded.categories().find_id("Food").unwrap();
        assert_eq!(loaded.category(food).unwrap().balance(), dec!(-45));
        let groceries = loaded.categories().find("Food:Groceries").unwrap();
        assert_eq!(groceries.parent(), Some(food));
        assert!(loaded.category(food).unwrap().children().contains(&groceries.id()));
        assert_eq!(loaded.match_payee("GROCER 0042"), loaded.payees().find_id("Grocer"));

        let shop = loaded
            .transactions()
            .iter()
            .find(|t| t.has_splits())
            .unwrap();
        assert_eq!(shop.splits().unassigned(), dec!(-15));
        assert_eq!(shop.state(), EntityState::Unchanged);
        assert!(loaded.check_transfers().is_empty());
    }

    #[test]
    fn test_prepare_for_save_excludes_tombstones() {
        let (mut ledger, checking, _) = sample();
        ledger.accept_changes();
        let t = ledger.transactions().ids_for_account(checking)[1];
        ledger.remove_transaction(t).unwrap();
        assert!(ledger.transactions().get(t).is_some());

        let snapshot = ledger.prepare_for_save();
        assert!(snapshot.transactions.iter().all(|x| x.id() != t));
        assert!(ledger.transactions().get(t).is_none());
    }

    #[test]
    fn test_unknown_references_dropped() {
        let (ledger, _, _) = sample();
        let mut snapshot = ledger.snapshot();
        snapshot.payees.clear();
        snapshot.categories.retain(|c| c.full_name() != "Food:Groceries");
        let stray = Transaction::new(AccountId::new(99), day(3), dec!(1));
        snapshot.transactions.push(stray);

        let loaded = Ledger::from_snapshot(snapshot).unwrap();
        assert!(loaded.aliases().is_empty());
        assert!(loaded.transactions().iter().all(|t| t.payee().is_none()));
        assert!(loaded
            .transactions()
            .iter()
            .all(|t| t.account() != AccountId::new(99)));
        let food: CategoryId = loaded.categories().find_id("Food").unwrap();
        assert_eq!(loaded.category(food).unwrap().balance(), dec!(0));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let (ledger, _, _) = sample();
        let mut snapshot = ledger.snapshot();
        let copy = snapshot.accounts[0].clone();
        snapshot.accounts.push(copy);
        assert!(Ledger::from_snapshot(snapshot).is_err());
    }

    #[test]
    fn test_reload_replaces_contents_in_one_batch() {
        let (mut ledger, checking, savings) = sample();
        let saved = ledger.prepare_for_save();
        ledger.accept_changes();
        ledger
            .add_transaction(Transaction::new(checking, day(5), dec!(-500)))
            .unwrap();
        ledger.get_or_create_payee("Stranger").unwrap();
        assert_eq!(ledger.account(checking).unwrap().balance(), dec!(240));

        let reloaded = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reloaded);
        ledger.subscribe_changed(
            NodeId::Ledger,
            Box::new(move |batch: &ChangeBatch| {
                let nodes: Vec<NodeId> = batch
                    .iter()
                    .filter(|e| e.change == ChangeType::Reloaded)
                    .map(|e| e.node)
                    .collect();
                sink.lock().unwrap().push(nodes);
            }),
        );
        ledger.reload(saved).unwrap();

        let batches = reloaded.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert!(batches[0].contains(&NodeId::Container(EntityKind::Category)));
        assert!(batches[0].contains(&NodeId::Container(EntityKind::Transaction)));
        assert_eq!(ledger.account(checking).unwrap().balance(), dec!(740));
        assert_eq!(ledger.account(savings).unwrap().balance(), dec!(200));
        assert!(ledger.payees().find("Stranger").is_none());
        let food = ledger.categories().find_id("Food").unwrap();
        assert_eq!(ledger.category(food).unwrap().balance(), dec!(-45));
        assert!(ledger.check_transfers().is_empty());
        assert!(!ledger.is_batching());
    }

    #[test]
    fn test_failed_reload_leaves_ledger_untouched() {
        let (mut ledger, checking, _) = sample();
        let mut bad = ledger.snapshot();
        let copy = bad.transactions[0].clone();
        bad.transactions.push(copy);
        bad.payees.clear();

        assert!(ledger.reload(bad).is_err());
        assert!(ledger.payees().find("Grocer").is_some());
        assert_eq!(ledger.account(checking).unwrap().balance(), dec!(740));
    }

    #[test]
    fn test_reload_ends_open_reconciliation() {
        let (mut ledger, checking, _) = sample();
        let saved = ledger.snapshot();
        ledger.begin_reconcile(checking).unwrap();
        ledger.reload(saved).unwrap();
        assert!(!ledger.is_reconciling(checking));
        assert!(!ledger.is_batching());
    }
}
