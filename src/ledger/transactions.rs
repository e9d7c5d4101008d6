use crate::core::error::Result;
use crate::core::events::ChangeHub;
use crate::core::ids::{AccountId, TransactionId};
use crate::ledger::transaction::Transaction;
use crate::registry::{Entity, Registry};
use std::collections::{BTreeSet, HashMap};

/// Transaction registry with a per-account index.
#[derive(Debug, Clone, Default)]
pub struct Transactions {
    registry: Registry<Transaction>,
    by_account: HashMap<AccountId, BTreeSet<TransactionId>>,
}

impl Transactions {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, transaction: Transaction, hub: &mut ChangeHub) -> Result<TransactionId> {
        let account = transaction.account();
        let id = self.registry.add(transaction, hub)?;
        self.by_account.entry(account).or_default().insert(id);
        Ok(id)
    }

    pub(crate) fn insert_loaded(&mut self, mut transaction: Transaction) -> Result<TransactionId> {
        transaction.splits.fixup();
        transaction.splits.accept_changes();
        let account = transaction.account();
        let id = self.registry.insert_loaded(transaction)?;
        self.by_account.entry(account).or_default().insert(id);
        Ok(id)
    }

    pub(crate) fn from_loaded(items: Vec<Transaction>) -> Result<Self> {
        let mut fresh = Self::new();
        for transaction in items {
            fresh.insert_loaded(transaction)?;
        }
        Ok(fresh)
    }

    /// Swap in `fresh` and raise `Reloaded` on the transaction container.
    pub(crate) fn replace(&mut self, fresh: Self, hub: &mut ChangeHub) {
        let Self { registry, by_account } = fresh;
        self.registry.replace(registry, hub);
        self.by_account = by_account;
    }

    pub(crate) fn remove(&mut self, id: TransactionId, hub: &mut ChangeHub) -> bool {
        let account = self.registry.get(id).map(|t| t.account());
        let removed = self.registry.remove(id, hub);
        if removed {
            if let Some(ids) = account.and_then(|a| self.by_account.get_mut(&a)) {
                ids.remove(&id);
            }
        }
        removed
    }

    /// Any transaction, including tombstones.
    pub fn get(&self, id: TransactionId) -> Option<&Transaction> {
        self.registry.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: TransactionId) -> Option<&mut Transaction> {
        self.registry.get_mut(id)
    }

    pub fn live(&self, id: TransactionId) -> Result<&Transaction> {
        self.registry.live(id)
    }

    pub(crate) fn live_mut(&mut self, id: TransactionId) -> Result<&mut Transaction> {
        self.registry.live_mut(id)
    }

    pub fn contains(&self, id: TransactionId) -> bool {
        self.registry.contains(id)
    }

    pub(crate) fn touch(&mut self, id: TransactionId, field: &'static str, hub: &mut ChangeHub) {
        self.registry.touch(id, field, hub);
    }

    /// Live transactions of `account` ordered by date, then id.
    pub fn for_account(&self, account: AccountId) -> Vec<&Transaction> {
        let mut list: Vec<&Transaction> = self
            .by_account
            .get(&account)
            .into_iter()
            .flatten()
            .filter_map(|id| self.registry.get(*id))
            .filter(|t| !t.is_deleted())
            .collect();
        list.sort_by_key(|t| (t.date(), t.id()));
        list
    }

    pub fn ids_for_account(&self, account: AccountId) -> Vec<TransactionId> {
        self.for_account(account).iter().map(|t| t.id()).collect()
    }

    pub fn count_for_account(&self, account: AccountId) -> usize {
        self.by_account.get(&account).map_or(0, |ids| ids.len())
    }

    /// Live transactions in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.registry.iter()
    }

    pub fn iter_all(&self) -> impl Iterator<Item = &Transaction> {
        self.registry.iter_all()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Transaction> {
        self.registry.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Sweep transaction and split tombstones.
    pub(crate) fn remove_deleted(&mut self) -> usize {
        let mut swept = self.registry.remove_deleted();
        for transaction in self.registry.iter_mut() {
            swept += transaction.splits.remove_deleted();
        }
        swept
    }

    pub(crate) fn accept_changes(&mut self) {
        self.registry.accept_changes();
        for transaction in self.registry.iter_mut() {
            transaction.splits.accept_changes();
        }
    }
}
