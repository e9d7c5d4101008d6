//! The ledger aggregate.
//!
//! [`Ledger`] owns every registry, the transaction store and the change hub.
//! All mutations go through it so that derived state (split remainders,
//! category balances, account balances) is settled after each one. A
//! mutation either succeeds completely or returns an error before touching
//! anything.

use crate::core::config::LedgerConfig;
use crate::core::currency::{CurrencyCode, CurrencyConverter};
use crate::core::error::{LedgerError, Result};
use crate::core::events::{ChangeHub, ChangedHandler, FieldHandler, NodeId, SubscriptionId};
use crate::core::ids::{
    AccountId, AliasId, CategoryId, CurrencyId, OnlineAccountId, PayeeId, SecurityId,
    TransactionId,
};
use crate::ledger::holdings::{CostBasis, NoHoldings};
use crate::ledger::transaction::Transaction;
use crate::ledger::transactions::Transactions;
use crate::registry::account::Account;
use crate::registry::alias::Alias;
use crate::registry::category::{Category, CategoryType, ReservedCategory};
use crate::registry::currency::Currency;
use crate::registry::online_account::OnlineAccount;
use crate::registry::payee::Payee;
use crate::registry::security::Security;
use crate::registry::{Entity, Registry};
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

/// The in-memory ledger.
///
/// There is a single mutator at a time: every mutating method takes
/// `&mut self`. Share a ledger across threads by wrapping it in a
/// `Mutex` or `RwLock`; observers are `Send` for that reason.
///
/// # Examples
///
/// ```
/// use money_ledger::ledger::book::Ledger;
/// use money_ledger::registry::account::{Account, AccountType};
/// use rust_decimal_macros::dec;
///
/// let mut ledger = Ledger::new();
/// let checking = ledger
///     .add_account(Account::new("Checking", AccountType::Checking).with_opening_balance(dec!(1000)))
///     .unwrap();
/// assert_eq!(ledger.account(checking).unwrap().balance(), dec!(1000));
/// ```
pub struct Ledger {
    config: LedgerConfig,
    pub(crate) events: ChangeHub,
    pub(crate) accounts: Registry<Account>,
    pub(crate) payees: Registry<Payee>,
    pub(crate) categories: Registry<Category>,
    pub(crate) securities: Registry<Security>,
    pub(crate) currencies: Registry<Currency>,
    pub(crate) aliases: Registry<Alias>,
    pub(crate) online_accounts: Registry<OnlineAccount>,
    pub(crate) transactions: Transactions,
    /// Category amounts each transaction currently contributes.
    pub(crate) attributed: HashMap<TransactionId, Vec<(CategoryId, Decimal)>>,
    pub(crate) pending_rebalance: BTreeSet<AccountId>,
    pub(crate) reconciling: HashSet<AccountId>,
    pub(crate) cost_basis: Box<dyn CostBasis + Send>,
    converter: Option<Box<dyn CurrencyConverter + Send>>,
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger")
            .field("accounts", &self.accounts.len())
            .field("categories", &self.categories.len())
            .field("payees", &self.payees.len())
            .field("transactions", &self.transactions.len())
            .field("events", &self.events)
            .finish()
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self::with_config(LedgerConfig::default())
    }

    pub fn with_config(config: LedgerConfig) -> Self {
        Self {
            config,
            events: ChangeHub::new(),
            accounts: Registry::new(),
            payees: Registry::new(),
            categories: Registry::new(),
            securities: Registry::new(),
            currencies: Registry::new(),
            aliases: Registry::new(),
            online_accounts: Registry::new(),
            transactions: Transactions::new(),
            attributed: HashMap::new(),
            pending_rebalance: BTreeSet::new(),
            reconciling: HashSet::new(),
            cost_basis: Box::new(NoHoldings),
            converter: None,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Replace the holdings source consulted when rebalancing investment
    /// accounts.
    pub fn set_cost_basis(&mut self, cost_basis: impl CostBasis + Send + 'static) {
        self.cost_basis = Box::new(cost_basis);
    }

    /// Replace the converter used by transfers and currency conversion.
    /// Without one, the ledger's own currency registry is used.
    pub fn set_currency_converter(&mut self, converter: impl CurrencyConverter + Send + 'static) {
        self.converter = Some(Box::new(converter));
    }

    pub(crate) fn convert(&self, amount: Decimal, from: &CurrencyCode, to: &CurrencyCode) -> Decimal {
        match &self.converter {
            Some(converter) => converter.convert(amount, from, to),
            None => self.currencies.convert(amount, from, to),
        }
    }

    // ---- read access ----

    pub fn accounts(&self) -> &Registry<Account> {
        &self.accounts
    }

    pub fn payees(&self) -> &Registry<Payee> {
        &self.payees
    }

    pub fn categories(&self) -> &Registry<Category> {
        &self.categories
    }

    pub fn securities(&self) -> &Registry<Security> {
        &self.securities
    }

    pub fn currencies(&self) -> &Registry<Currency> {
        &self.currencies
    }

    pub fn aliases(&self) -> &Registry<Alias> {
        &self.aliases
    }

    pub fn online_accounts(&self) -> &Registry<OnlineAccount> {
        &self.online_accounts
    }

    pub fn transactions(&self) -> &Transactions {
        &self.transactions
    }

    pub fn account(&self, id: AccountId) -> Result<&Account> {
        self.accounts.live(id)
    }

    pub fn category(&self, id: CategoryId) -> Result<&Category> {
        self.categories.live(id)
    }

    pub fn transaction(&self, id: TransactionId) -> Result<&Transaction> {
        self.transactions.live(id)
    }

    // ---- change notification ----

    pub fn subscribe_changed(&mut self, node: NodeId, handler: ChangedHandler) -> SubscriptionId {
        self.events.subscribe_changed(node, handler)
    }

    pub fn subscribe_field(&mut self, node: NodeId, handler: FieldHandler) -> SubscriptionId {
        self.events.subscribe_field(node, handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn begin_update(&mut self, node: NodeId) {
        self.events.begin_update(node);
    }

    /// Close one level of `node`'s scope. When this closes the last open
    /// scope, deferred account rebalances run first. Their balance events
    /// land in the outgoing batch when `node` is an ancestor of the account
    /// and are delivered on their own otherwise. A root observer of a batch
    /// on a single transaction therefore sees two deliveries: the balance
    /// change first, then the transaction's batch.
    ///
    /// # Panics
    ///
    /// Panics if `node` has no open scope.
    pub fn end_update(&mut self, node: NodeId) {
        if self.events.open_scopes() == 1 && self.events.depth(node) == 1 {
            self.flush_rebalances();
        }
        self.events.end_update(node);
    }

    /// Run `f` inside an update scope on `node`.
    pub fn batch<R>(&mut self, node: NodeId, f: impl FnOnce(&mut Self) -> R) -> R {
        self.begin_update(node);
        let result = f(self);
        self.end_update(node);
        result
    }

    pub fn is_batching(&self) -> bool {
        self.events.any_batching()
    }

    /// Mark every live entity as persisted.
    pub fn accept_changes(&mut self) {
        self.accounts.accept_changes();
        self.payees.accept_changes();
        self.categories.accept_changes();
        self.securities.accept_changes();
        self.currencies.accept_changes();
        self.aliases.accept_changes();
        self.online_accounts.accept_changes();
        self.transactions.accept_changes();
    }

    /// Discard every tombstone. Running it twice is the same as running it
    /// once.
    pub fn remove_deleted(&mut self) -> usize {
        let swept = self.accounts.remove_deleted()
            + self.payees.remove_deleted()
            + self.categories.remove_deleted()
            + self.securities.remove_deleted()
            + self.currencies.remove_deleted()
            + self.aliases.remove_deleted()
            + self.online_accounts.remove_deleted()
            + self.transactions.remove_deleted();
        if swept > 0 {
            log::debug!("swept {} deleted entities", swept);
        }
        swept
    }

    // ---- accounts ----

    pub fn add_account(&mut self, account: Account) -> Result<AccountId> {
        if let Some(category) = account.category_fund {
            self.categories.live(category)?;
        }
        if let Some(online) = account.online_account {
            self.online_accounts.live(online)?;
        }
        let id = self.accounts.add(account, &mut self.events)?;
        self.request_rebalance(id);
        Ok(id)
    }

    pub fn rename_account(&mut self, id: AccountId, name: &str) -> Result<()> {
        self.accounts.rename(id, name, &mut self.events)
    }

    pub fn close_account(&mut self, id: AccountId, closed: bool) -> Result<()> {
        let account = self.accounts.live_mut(id)?;
        if account.closed != closed {
            account.closed = closed;
            self.accounts.touch(id, "closed", &mut self.events);
        }
        Ok(())
    }

    pub fn set_opening_balance(&mut self, id: AccountId, amount: Decimal) -> Result<()> {
        let account = self.accounts.live_mut(id)?;
        if account.opening_balance != amount {
            account.opening_balance = amount;
            self.accounts.touch(id, "opening_balance", &mut self.events);
            self.request_rebalance(id);
        }
        Ok(())
    }

    pub fn set_online_account(&mut self, id: AccountId, online: Option<OnlineAccountId>) -> Result<()> {
        if let Some(online) = online {
            self.online_accounts.live(online)?;
        }
        self.accounts.live_mut(id)?.online_account = online;
        self.accounts.touch(id, "online_account", &mut self.events);
        Ok(())
    }

    /// Re-express the account in `symbol`: the opening balance, every live
    /// transaction amount, sales tax and split amount go through the
    /// converter. Reconciled amounts are converted too.
    pub fn convert_account_currency(&mut self, id: AccountId, symbol: impl Into<String>) -> Result<()> {
        let account = self.accounts.live(id)?;
        let from = account.currency.clone();
        let to = CurrencyCode::new(symbol);
        if from == to {
            return Ok(());
        }
        let opening = self.convert(account.opening_balance, &from, &to);

        self.batch(NodeId::account(id), |ledger| {
            for tid in ledger.transactions.ids_for_account(id) {
                let Some(t) = ledger.transactions.get(tid) else { continue };
                let amount = ledger.convert(t.amount, &from, &to);
                let tax = ledger.convert(t.sales_tax, &from, &to);
                let splits: Vec<_> = t
                    .splits
                    .iter()
                    .map(|s| (s.id(), ledger.convert(s.amount, &from, &to)))
                    .collect();
                if let Some(t) = ledger.transactions.get_mut(tid) {
                    t.amount = amount;
                    t.sales_tax = tax;
                    for (sid, value) in &splits {
                        if let Some(split) = t.splits.get_mut(*sid) {
                            split.amount = *value;
                            split.state = split.state.touched();
                        }
                    }
                }
                for (sid, _) in &splits {
                    ledger.events.raise_field(NodeId::split(tid, *sid), "amount");
                }
                ledger.transactions.touch(tid, "amount", &mut ledger.events);
                ledger.settle(tid);
            }
            if let Some(account) = ledger.accounts.get_mut(id) {
                account.opening_balance = opening;
                account.currency = to.clone();
            }
            ledger.accounts.touch(id, "currency", &mut ledger.events);
            ledger.request_rebalance(id);
        });
        log::info!("converted {} from {} to {}", id, from, to);
        Ok(())
    }

    // ---- payees ----

    pub fn add_payee(&mut self, payee: Payee) -> Result<PayeeId> {
        self.payees.add(payee, &mut self.events)
    }

    pub fn get_or_create_payee(&mut self, name: &str) -> Result<PayeeId> {
        match self.payees.find_id(name) {
            Some(id) => Ok(id),
            None => self.add_payee(Payee::new(name)),
        }
    }

    pub fn rename_payee(&mut self, id: PayeeId, name: &str) -> Result<()> {
        self.payees.rename(id, name, &mut self.events)
    }

    /// Remove a payee, clearing it from transactions and splits and dropping
    /// the aliases that point at it.
    pub fn remove_payee(&mut self, id: PayeeId) -> Result<()> {
        self.payees.live(id)?;
        self.batch(NodeId::Ledger, |ledger| {
            let referencing: Vec<TransactionId> = ledger
                .transactions
                .iter()
                .filter(|t| t.payee == Some(id) || t.splits.iter().any(|s| s.payee == Some(id)))
                .map(|t| t.id())
                .collect();
            for tid in referencing {
                let mut touched_splits = Vec::new();
                let mut whole = false;
                if let Some(t) = ledger.transactions.get_mut(tid) {
                    if t.payee == Some(id) {
                        t.payee = None;
                        whole = true;
                    }
                    for split in t.splits.iter_mut().filter(|s| s.payee == Some(id)) {
                        split.payee = None;
                        split.state = split.state.touched();
                        touched_splits.push(split.id());
                    }
                }
                if whole {
                    ledger.transactions.touch(tid, "payee", &mut ledger.events);
                }
                for sid in touched_splits {
                    ledger.events.raise_field(NodeId::split(tid, sid), "payee");
                }
            }
            let aliases: Vec<AliasId> = ledger
                .aliases
                .iter()
                .filter(|a| a.payee == id)
                .map(|a| a.id())
                .collect();
            for alias in aliases {
                ledger.aliases.remove(alias, &mut ledger.events);
            }
            ledger.payees.remove(id, &mut ledger.events);
        });
        Ok(())
    }

    /// Remove payees no live transaction or split refers to. Payees that an
    /// alias still maps to are kept. Returns how many were removed.
    pub fn remove_unused_payees(&mut self) -> usize {
        let mut used: HashSet<PayeeId> = HashSet::new();
        for t in self.transactions.iter() {
            used.extend(t.payee);
            used.extend(t.splits.iter().filter_map(|s| s.payee));
        }
        used.extend(self.aliases.iter().map(|a| a.payee));
        let unused: Vec<PayeeId> = self
            .payees
            .iter()
            .map(|p| p.id())
            .filter(|id| !used.contains(id))
            .collect();
        for id in &unused {
            self.payees.remove(*id, &mut self.events);
        }
        if !unused.is_empty() {
            log::info!("removed {} unused payees", unused.len());
        }
        unused.len()
    }

    // ---- aliases ----

    /// Add an alias, compiling its pattern.
    pub fn add_alias(&mut self, mut alias: Alias) -> Result<AliasId> {
        self.payees.live(alias.payee)?;
        alias.compile()?;
        self.aliases.add(alias, &mut self.events)
    }

    pub fn remove_alias(&mut self, id: AliasId) -> Result<()> {
        self.aliases.live(id)?;
        self.aliases.remove(id, &mut self.events);
        Ok(())
    }

    /// The payee of the first alias (in id order) matching `text`.
    pub fn match_payee(&self, text: &str) -> Option<PayeeId> {
        self.aliases.iter().find(|a| a.matches(text)).map(|a| a.payee)
    }

    // ---- categories ----

    pub fn get_or_create_category(&mut self, path: &str, category_type: CategoryType) -> Result<CategoryId> {
        self.categories.get_or_create(path, category_type, &mut self.events)
    }

    pub fn add_category(&mut self, category: Category, parent: Option<CategoryId>) -> Result<CategoryId> {
        self.categories.add_child(category, parent, &mut self.events)
    }

    /// The id of a reserved category, creating it on first use.
    pub fn reserved_category(&mut self, which: ReservedCategory) -> Result<CategoryId> {
        self.categories
            .get_or_create(which.name(), which.category_type(), &mut self.events)
    }

    pub fn move_category(&mut self, id: CategoryId, parent: Option<CategoryId>) -> Result<()> {
        self.categories.move_to(id, parent, &mut self.events)
    }

    pub fn rename_category(&mut self, id: CategoryId, label: &str) -> Result<()> {
        self.categories.relabel(id, label, &mut self.events)
    }

    /// Assign a category balance directly; the delta reaches every ancestor.
    pub fn set_category_balance(&mut self, id: CategoryId, value: Decimal) -> Result<()> {
        self.categories.live(id)?;
        self.categories.set_balance(id, value, &mut self.events);
        Ok(())
    }

    /// Remove `id` and its subtree. Transactions, splits and fund accounts
    /// that referenced any of them lose the reference. Returns the removed
    /// ids, parents first.
    pub fn remove_category(&mut self, id: CategoryId) -> Result<Vec<CategoryId>> {
        self.categories.live(id)?;
        let doomed: HashSet<CategoryId> = self.categories.subtree(id).into_iter().collect();
        let removed = self.batch(NodeId::Ledger, |ledger| {
            let referencing: Vec<TransactionId> = ledger
                .transactions
                .iter()
                .filter(|t| {
                    t.category.is_some_and(|c| doomed.contains(&c))
                        || t.splits.iter().any(|s| s.category.is_some_and(|c| doomed.contains(&c)))
                })
                .map(|t| t.id())
                .collect();
            for tid in referencing {
                let mut whole = false;
                let mut touched_splits = Vec::new();
                if let Some(t) = ledger.transactions.get_mut(tid) {
                    if t.category.is_some_and(|c| doomed.contains(&c)) {
                        t.category = None;
                        whole = true;
                    }
                    for split in t.splits.iter_mut() {
                        if split.category.is_some_and(|c| doomed.contains(&c)) {
                            split.category = None;
                            split.state = split.state.touched();
                            touched_splits.push(split.id());
                        }
                    }
                }
                if whole {
                    ledger.transactions.touch(tid, "category", &mut ledger.events);
                }
                for sid in touched_splits {
                    ledger.events.raise_field(NodeId::split(tid, sid), "category");
                }
            }
            let funds: Vec<AccountId> = ledger
                .accounts
                .iter()
                .filter(|a| a.category_fund.is_some_and(|c| doomed.contains(&c)))
                .map(|a| a.id())
                .collect();
            for account in funds {
                if let Some(a) = ledger.accounts.get_mut(account) {
                    a.category_fund = None;
                }
                ledger.accounts.touch(account, "category_fund", &mut ledger.events);
            }
            ledger.recompute_category_balances();
            ledger.categories.remove_subtree(id, &mut ledger.events)
        });
        log::info!("removed {} categories under {}", removed.len(), id);
        Ok(removed)
    }

    // ---- securities, currencies, online accounts ----

    pub fn add_security(&mut self, security: Security) -> Result<SecurityId> {
        self.securities.add(security, &mut self.events)
    }

    pub fn set_security_price(&mut self, id: SecurityId, price: Decimal) -> Result<()> {
        self.securities.live_mut(id)?.price = price;
        self.securities.touch(id, "price", &mut self.events);
        let holders: Vec<AccountId> = self
            .accounts
            .iter()
            .filter(|a| a.account_type.holds_securities())
            .map(|a| a.id())
            .collect();
        for account in holders {
            self.request_rebalance(account);
        }
        Ok(())
    }

    /// Remove a security, clearing it from investment details.
    pub fn remove_security(&mut self, id: SecurityId) -> Result<()> {
        self.securities.live(id)?;
        self.batch(NodeId::Ledger, |ledger| {
            let holding: Vec<TransactionId> = ledger
                .transactions
                .iter()
                .filter(|t| t.investment.as_ref().is_some_and(|i| i.security == Some(id)))
                .map(|t| t.id())
                .collect();
            for tid in holding {
                if let Some(investment) = ledger.transactions.get_mut(tid).and_then(|t| t.investment.as_mut()) {
                    investment.security = None;
                }
                ledger.transactions.touch(tid, "investment", &mut ledger.events);
            }
            ledger.securities.remove(id, &mut ledger.events);
        });
        Ok(())
    }

    pub fn add_currency(&mut self, currency: Currency) -> Result<CurrencyId> {
        self.currencies.add(currency, &mut self.events)
    }

    pub fn remove_currency(&mut self, id: CurrencyId) -> Result<()> {
        self.currencies.live(id)?;
        self.currencies.remove(id, &mut self.events);
        Ok(())
    }

    pub fn add_online_account(&mut self, online: OnlineAccount) -> Result<OnlineAccountId> {
        self.online_accounts.add(online, &mut self.events)
    }

    /// Remove an online account, detaching the accounts linked to it.
    pub fn remove_online_account(&mut self, id: OnlineAccountId) -> Result<()> {
        self.online_accounts.live(id)?;
        let linked: Vec<AccountId> = self
            .accounts
            .iter()
            .filter(|a| a.online_account == Some(id))
            .map(|a| a.id())
            .collect();
        for account in linked {
            if let Some(a) = self.accounts.get_mut(account) {
                a.online_account = None;
            }
            self.accounts.touch(account, "online_account", &mut self.events);
        }
        self.online_accounts.remove(id, &mut self.events);
        Ok(())
    }

    pub(crate) fn ensure_amount_editable(&self, t: &Transaction) -> Result<()> {
        if t.is_reconciled() && !self.reconciling.contains(&t.account) {
            return Err(LedgerError::InvalidMutation {
                transaction: t.id().to_string(),
                reason: "amount is locked outside reconciliation".to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn check_references(&self, payee: Option<PayeeId>, category: Option<CategoryId>) -> Result<()> {
        if let Some(payee) = payee {
            self.payees.live(payee)?;
        }
        if let Some(category) = category {
            self.categories.live(category)?;
        }
        Ok(())
    }
}
