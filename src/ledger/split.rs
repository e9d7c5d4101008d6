use crate::core::ids::{CategoryId, EntityId, PayeeId, SplitId};
use crate::ledger::transaction::TransferLink;
use crate::registry::EntityState;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A sub-allocation of a transaction's amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Split {
    id: SplitId,
    pub(crate) amount: Decimal,
    pub(crate) category: Option<CategoryId>,
    pub(crate) payee: Option<PayeeId>,
    pub(crate) memo: Option<String>,
    pub(crate) transfer: Option<TransferLink>,
    #[serde(skip)]
    pub(crate) state: EntityState,
}

impl Split {
    pub fn new(amount: Decimal) -> Self {
        Self {
            id: SplitId::UNASSIGNED,
            amount,
            category: None,
            payee: None,
            memo: None,
            transfer: None,
            state: EntityState::Inserted,
        }
    }

    pub fn with_category(mut self, category: CategoryId) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_payee(mut self, payee: PayeeId) -> Self {
        self.payee = Some(payee);
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn id(&self) -> SplitId {
        self.id
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn category(&self) -> Option<CategoryId> {
        self.category
    }

    pub fn payee(&self) -> Option<PayeeId> {
        self.payee
    }

    pub fn memo(&self) -> Option<&str> {
        self.memo.as_deref()
    }

    pub fn transfer(&self) -> Option<&TransferLink> {
        self.transfer.as_ref()
    }

    pub fn state(&self) -> EntityState {
        self.state
    }

    pub fn is_deleted(&self) -> bool {
        self.state == EntityState::Deleted
    }
}

/// The split set of one transaction.
///
/// `unassigned` holds the part of the transaction amount (net of sales tax)
/// not yet covered by live splits; it is recomputed by the owning ledger
/// after every split or parent-amount mutation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Splits {
    items: BTreeMap<SplitId, Split>,
    #[serde(skip)]
    next_id: i64,
    #[serde(skip)]
    unassigned: Decimal,
}

impl Splits {
    pub(crate) fn add(&mut self, mut split: Split) -> SplitId {
        let id = if split.id.is_assigned() && !self.items.contains_key(&split.id) {
            split.id
        } else {
            SplitId::new(self.next_id)
        };
        self.next_id = self.next_id.max(id.raw() + 1);
        split.id = id;
        self.items.insert(id, split);
        id
    }

    /// Drop a never-persisted split, tombstone a persisted one.
    pub(crate) fn remove(&mut self, id: SplitId) -> bool {
        let Some(state) = self.items.get(&id).map(|s| s.state) else {
            return false;
        };
        match state {
            EntityState::Deleted => false,
            EntityState::Inserted => {
                self.items.remove(&id);
                true
            }
            _ => {
                if let Some(split) = self.items.get_mut(&id) {
                    split.state = EntityState::Deleted;
                }
                true
            }
        }
    }

    pub fn get(&self, id: SplitId) -> Option<&Split> {
        self.items.get(&id).filter(|s| !s.is_deleted())
    }

    pub(crate) fn get_mut(&mut self, id: SplitId) -> Option<&mut Split> {
        self.items.get_mut(&id).filter(|s| !s.is_deleted())
    }

    /// Live splits in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Split> {
        self.items.values().filter(|s| !s.is_deleted())
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Split> {
        self.items.values_mut().filter(|s| !s.is_deleted())
    }

    pub fn iter_all(&self) -> impl Iterator<Item = &Split> {
        self.items.values()
    }

    pub fn ids(&self) -> Vec<SplitId> {
        self.iter().map(|s| s.id).collect()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of live split amounts.
    pub fn total(&self) -> Decimal {
        self.iter().map(|s| s.amount).sum()
    }

    pub fn unassigned(&self) -> Decimal {
        self.unassigned
    }

    /// Recompute `unassigned` against the amount the splits must cover.
    pub(crate) fn rebalance(&mut self, target: Decimal) {
        self.unassigned = if self.is_empty() {
            Decimal::ZERO
        } else {
            target - self.total()
        };
    }

    pub(crate) fn remove_deleted(&mut self) -> usize {
        let before = self.items.len();
        self.items.retain(|_, s| !s.is_deleted());
        before - self.items.len()
    }

    pub(crate) fn accept_changes(&mut self) {
        for split in self.items.values_mut() {
            if !split.is_deleted() {
                split.state = EntityState::Unchanged;
            }
        }
    }

    /// Restore the allocator after deserialization.
    pub(crate) fn fixup(&mut self) {
        self.next_id = self.items.keys().map(|id| id.raw() + 1).max().unwrap_or(0);
    }
}
