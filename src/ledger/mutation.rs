//! Transaction and split edits.
//!
//! Each setter validates first, then mutates, raises a field notification
//! and settles the transaction (split remainder, category attribution,
//! account rebalance request). Amount and date edits on one side of a
//! transfer carry over to the other side.

use crate::core::error::{LedgerError, Result};
use crate::core::events::{ChangeEvent, ChangeType, EntityKind, NodeId};
use crate::core::ids::{CategoryId, PayeeId, SplitId, TransactionId};
use crate::ledger::book::Ledger;
use crate::ledger::split::Split;
use crate::ledger::transaction::{Investment, Transaction, TransactionStatus, TransferLink};
use crate::ledger::transfer::Release;
use crate::registry::category::ReservedCategory;
use crate::registry::EntityState;
use chrono::NaiveDate;
use rust_decimal::Decimal;

impl Ledger {
    /// Insert a transaction into its account.
    ///
    /// Transfer links cannot be inserted this way; any present are dropped.
    /// Use [`transfer`](Ledger::transfer) to create both sides of a transfer.
    pub fn add_transaction(&mut self, mut transaction: Transaction) -> Result<TransactionId> {
        self.accounts.live(transaction.account)?;
        self.check_references(transaction.payee, transaction.category)?;
        if let Some(security) = transaction.investment.as_ref().and_then(|i| i.security) {
            self.securities.live(security)?;
        }
        for split in transaction.splits.iter() {
            self.check_references(split.payee, split.category)?;
        }
        let mut stripped = transaction.transfer.take().is_some();
        for split in transaction.splits.iter_mut() {
            stripped |= split.transfer.take().is_some();
        }
        if stripped {
            log::warn!("dropped transfer links on inserted transaction; use transfer() instead");
        }
        let id = self.transactions.add(transaction, &mut self.events)?;
        self.settle(id);
        Ok(id)
    }

    /// Fails with `InvalidMutation` on a reconciled transaction unless its
    /// account is being reconciled.
    pub fn set_amount(&mut self, id: TransactionId, amount: Decimal) -> Result<()> {
        let t = self.transactions.live(id)?;
        if t.amount == amount {
            return Ok(());
        }
        self.ensure_amount_editable(t)?;
        let counterpart = match t.transfer {
            Some(link) => self.plan_counterpart_amount(&link, t.account, amount)?,
            None => None,
        };

        if let Some(t) = self.transactions.get_mut(id) {
            t.amount = amount;
        }
        self.transactions.touch(id, "amount", &mut self.events);
        self.settle(id);
        if let Some((link, value)) = counterpart {
            self.apply_counterpart_amount(&link, value);
        }
        Ok(())
    }

    pub fn set_date(&mut self, id: TransactionId, date: NaiveDate) -> Result<()> {
        let t = self.transactions.live(id)?;
        if t.date == date {
            return Ok(());
        }
        let mirror = t
            .transfer
            .filter(|link| link.split.is_none())
            .map(|link| link.transaction)
            .filter(|m| self.transactions.contains(*m));

        for target in std::iter::once(id).chain(mirror) {
            if let Some(t) = self.transactions.get_mut(target) {
                t.date = date;
            }
            self.transactions.touch(target, "date", &mut self.events);
            self.settle(target);
        }
        Ok(())
    }

    pub fn set_payee(&mut self, id: TransactionId, payee: Option<PayeeId>) -> Result<()> {
        self.transactions.live(id)?;
        self.check_references(payee, None)?;
        self.transactions.live_mut(id)?.payee = payee;
        self.transactions.touch(id, "payee", &mut self.events);
        Ok(())
    }

    /// Assign a category. Any splits are removed first, releasing their
    /// transfers; if one of those is locked, nothing changes.
    pub fn set_category(&mut self, id: TransactionId, category: Option<CategoryId>) -> Result<()> {
        let t = self.transactions.live(id)?;
        self.check_references(None, category)?;
        let split_links: Vec<TransferLink> = t.splits.iter().filter_map(|s| s.transfer).collect();
        for link in &split_links {
            self.check_transfer_removable(link)?;
        }
        let split_ids = t.splits.ids();

        self.batch(NodeId::transaction(id), |ledger| {
            for link in split_links {
                ledger.release_counterpart(link, Release::Unlink);
            }
            if let Some(t) = ledger.transactions.get_mut(id) {
                for sid in &split_ids {
                    t.splits.remove(*sid);
                }
                t.category = category;
            }
            for sid in split_ids {
                ledger
                    .events
                    .raise(ChangeEvent::new(NodeId::split(id, sid), ChangeType::Deleted));
            }
            ledger.transactions.touch(id, "category", &mut ledger.events);
            ledger.settle(id);
        });
        Ok(())
    }

    pub fn set_status(&mut self, id: TransactionId, status: TransactionStatus) -> Result<()> {
        let t = self.transactions.live_mut(id)?;
        if t.status == status {
            return Ok(());
        }
        t.status = status;
        self.transactions.touch(id, "status", &mut self.events);
        self.settle(id);
        Ok(())
    }

    pub fn set_memo(&mut self, id: TransactionId, memo: Option<String>) -> Result<()> {
        self.transactions.live_mut(id)?.memo = memo;
        self.transactions.touch(id, "memo", &mut self.events);
        Ok(())
    }

    pub fn set_number(&mut self, id: TransactionId, number: Option<String>) -> Result<()> {
        self.transactions.live_mut(id)?.number = number;
        self.transactions.touch(id, "number", &mut self.events);
        Ok(())
    }

    pub fn set_sales_tax(&mut self, id: TransactionId, tax: Decimal) -> Result<()> {
        self.transactions.live_mut(id)?.sales_tax = tax;
        self.transactions.touch(id, "sales_tax", &mut self.events);
        self.settle(id);
        Ok(())
    }

    pub fn set_investment(&mut self, id: TransactionId, investment: Option<Investment>) -> Result<()> {
        self.transactions.live(id)?;
        if let Some(security) = investment.as_ref().and_then(|i| i.security) {
            self.securities.live(security)?;
        }
        self.transactions.live_mut(id)?.investment = investment;
        self.transactions.touch(id, "investment", &mut self.events);
        self.settle(id);
        Ok(())
    }

    /// Remove a transaction together with the far side of its transfers.
    ///
    /// A reconciled, non-zero transaction can only be removed while its
    /// account is being reconciled.
    pub fn remove_transaction(&mut self, id: TransactionId) -> Result<()> {
        let t = self.transactions.live(id)?;
        if t.is_reconciled() && !t.amount.is_zero() && !self.reconciling.contains(&t.account) {
            return Err(LedgerError::InvalidMutation {
                transaction: id.to_string(),
                reason: "reconciled transactions cannot be removed".to_string(),
            });
        }
        let links: Vec<TransferLink> = t
            .transfer
            .into_iter()
            .chain(t.splits.iter().filter_map(|s| s.transfer))
            .collect();
        for link in &links {
            self.check_transfer_removable(link)?;
        }
        self.batch(NodeId::Ledger, |ledger| ledger.drop_transaction(id, Release::Unlink));
        Ok(())
    }

    // ---- splits ----

    /// Add a split. The transaction's category becomes the reserved `Split`
    /// category.
    pub fn add_split(&mut self, id: TransactionId, mut split: Split) -> Result<SplitId> {
        self.transactions.live(id)?;
        self.check_references(split.payee, split.category)?;
        let split_category = self.reserved_category(ReservedCategory::Split)?;
        if split.transfer.take().is_some() {
            log::warn!("dropped transfer link on inserted split; use transfer_split() instead");
        }
        split.state = EntityState::Inserted;

        let t = self.transactions.live_mut(id)?;
        let sid = t.splits.add(split);
        let recategorized = t.category != Some(split_category);
        t.category = Some(split_category);
        self.events
            .raise(ChangeEvent::new(NodeId::split(id, sid), ChangeType::Inserted));
        if recategorized {
            self.transactions.touch(id, "category", &mut self.events);
        }
        self.transactions.touch(id, "splits", &mut self.events);
        self.settle(id);
        Ok(sid)
    }

    /// Remove a split, releasing its transfer. When the last split goes the
    /// transaction drops the `Split` category.
    pub fn remove_split(&mut self, id: TransactionId, split: SplitId) -> Result<()> {
        let t = self.transactions.live(id)?;
        let link = self.live_split(t, split)?.transfer;
        if let Some(link) = &link {
            self.check_transfer_removable(link)?;
        }
        let split_category = self.categories.find_id(ReservedCategory::Split.name());

        self.batch(NodeId::transaction(id), |ledger| {
            if let Some(link) = link {
                ledger.release_counterpart(link, Release::Unlink);
            }
            let mut uncategorized = false;
            if let Some(t) = ledger.transactions.get_mut(id) {
                t.splits.remove(split);
                if t.splits.is_empty() && t.category.is_some() && t.category == split_category {
                    t.category = None;
                    uncategorized = true;
                }
            }
            ledger
                .events
                .raise(ChangeEvent::new(NodeId::split(id, split), ChangeType::Deleted));
            if uncategorized {
                ledger.transactions.touch(id, "category", &mut ledger.events);
            }
            ledger.transactions.touch(id, "splits", &mut ledger.events);
            ledger.settle(id);
        });
        Ok(())
    }

    pub fn set_split_amount(&mut self, id: TransactionId, split: SplitId, amount: Decimal) -> Result<()> {
        let t = self.transactions.live(id)?;
        let s = self.live_split(t, split)?;
        if s.amount == amount {
            return Ok(());
        }
        self.ensure_amount_editable(t)?;
        let counterpart = match s.transfer {
            Some(link) => self.plan_counterpart_amount(&link, t.account, amount)?,
            None => None,
        };
        self.edit_split(id, split, "amount", |s| s.amount = amount);
        if let Some((link, value)) = counterpart {
            self.apply_counterpart_amount(&link, value);
        }
        Ok(())
    }

    pub fn set_split_category(
        &mut self,
        id: TransactionId,
        split: SplitId,
        category: Option<CategoryId>,
    ) -> Result<()> {
        let t = self.transactions.live(id)?;
        self.live_split(t, split)?;
        self.check_references(None, category)?;
        self.edit_split(id, split, "category", |s| s.category = category);
        Ok(())
    }

    pub fn set_split_payee(&mut self, id: TransactionId, split: SplitId, payee: Option<PayeeId>) -> Result<()> {
        let t = self.transactions.live(id)?;
        self.live_split(t, split)?;
        self.check_references(payee, None)?;
        self.edit_split(id, split, "payee", |s| s.payee = payee);
        Ok(())
    }

    pub fn set_split_memo(&mut self, id: TransactionId, split: SplitId, memo: Option<String>) -> Result<()> {
        let t = self.transactions.live(id)?;
        self.live_split(t, split)?;
        self.edit_split(id, split, "memo", |s| s.memo = memo);
        Ok(())
    }

    pub(crate) fn live_split<'a>(&self, t: &'a Transaction, split: SplitId) -> Result<&'a Split> {
        t.splits
            .get(split)
            .ok_or_else(|| LedgerError::not_found(EntityKind::Split, split))
    }

    /// Apply `edit` to a live split, then notify and settle.
    pub(crate) fn edit_split(
        &mut self,
        id: TransactionId,
        split: SplitId,
        field: &'static str,
        edit: impl FnOnce(&mut Split),
    ) {
        let Some(s) = self
            .transactions
            .get_mut(id)
            .and_then(|t| t.splits.get_mut(split))
        else {
            return;
        };
        edit(s);
        s.state = s.state.touched();
        self.events.raise_field(NodeId::split(id, split), field);
        self.transactions.touch(id, "splits", &mut self.events);
        self.settle(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::account::{Account, AccountType};
    use crate::registry::category::CategoryType;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn checking(ledger: &mut Ledger) -> crate::core::ids::AccountId {
        ledger
            .add_account(Account::new("Checking", AccountType::Checking))
            .unwrap()
    }

    #[test]
    fn test_reconciled_amount_locked() {
        let mut ledger = Ledger::new();
        let a = checking(&mut ledger);
        let t = ledger
            .add_transaction(Transaction::new(a, day(1), dec!(-10)).with_status(TransactionStatus::Reconciled))
            .unwrap();

        let err = ledger.set_amount(t, dec!(-11)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidMutation { .. }));

        ledger.begin_reconcile(a).unwrap();
        ledger.set_amount(t, dec!(-11)).unwrap();
        ledger.end_reconcile(a);
        assert_eq!(ledger.transaction(t).unwrap().amount(), dec!(-11));
    }

    #[test]
    fn test_reconciled_removal_rejected() {
        let mut ledger = Ledger::new();
        let a = checking(&mut ledger);
        let t = ledger
            .add_transaction(Transaction::new(a, day(2), dec!(-3)).with_status(TransactionStatus::Reconciled))
            .unwrap();
        assert!(ledger.remove_transaction(t).is_err());
        ledger.set_status(t, TransactionStatus::Cleared).unwrap();
        ledger.remove_transaction(t).unwrap();
        assert!(!ledger.transactions().contains(t));
    }

    #[test]
    fn test_splits_force_split_category() {
        let mut ledger = Ledger::new();
        let a = checking(&mut ledger);
        let food = ledger.get_or_create_category("Food", CategoryType::Expense).unwrap();
        let t = ledger
            .add_transaction(Transaction::new(a, day(3), dec!(-30)).with_category(food))
            .unwrap();
        let s = ledger
            .add_split(t, Split::new(dec!(-30)).with_category(food))
            .unwrap();
        let split_cat = ledger.categories().find_id("Split").unwrap();
        assert_eq!(ledger.transaction(t).unwrap().category(), Some(split_cat));
        assert_eq!(ledger.category(food).unwrap().balance(), dec!(-30));

        ledger.remove_split(t, s).unwrap();
        assert_eq!(ledger.transaction(t).unwrap().category(), None);
        assert_eq!(ledger.category(food).unwrap().balance(), Decimal::ZERO);
    }

    #[test]
    fn test_setting_category_clears_splits() {
        let mut ledger = Ledger::new();
        let a = checking(&mut ledger);
        let rent = ledger.get_or_create_category("Rent", CategoryType::Expense).unwrap();
        let t = ledger.add_transaction(Transaction::new(a, day(4), dec!(-50))).unwrap();
        ledger.add_split(t, Split::new(dec!(-20))).unwrap();
        ledger.add_split(t, Split::new(dec!(-30))).unwrap();

        ledger.set_category(t, Some(rent)).unwrap();
        let txn = ledger.transaction(t).unwrap();
        assert!(!txn.has_splits());
        assert_eq!(txn.category(), Some(rent));
        assert_eq!(ledger.category(rent).unwrap().balance(), dec!(-50));
    }

    #[test]
    fn test_sales_tax_shifts_unassigned() {
        let mut ledger = Ledger::new();
        let a = checking(&mut ledger);
        let t = ledger.add_transaction(Transaction::new(a, day(5), dec!(-108))).unwrap();
        ledger.add_split(t, Split::new(dec!(-100))).unwrap();
        assert_eq!(ledger.transaction(t).unwrap().splits().unassigned(), dec!(-8));
        ledger.set_sales_tax(t, dec!(-8)).unwrap();
        assert_eq!(ledger.transaction(t).unwrap().splits().unassigned(), Decimal::ZERO);
    }

    #[test]
    fn test_split_edits_update_category_balance() {
        let mut ledger = Ledger::new();
        let a = checking(&mut ledger);
        let gas = ledger.get_or_create_category("Auto:Gas", CategoryType::Expense).unwrap();
        let auto = ledger.categories().find_id("Auto").unwrap();
        let t = ledger.add_transaction(Transaction::new(a, day(6), dec!(-60))).unwrap();
        let s = ledger.add_split(t, Split::new(dec!(-60))).unwrap();
        ledger.set_split_category(t, s, Some(gas)).unwrap();
        assert_eq!(ledger.category(auto).unwrap().balance(), dec!(-60));
        ledger.set_split_amount(t, s, dec!(-45)).unwrap();
        assert_eq!(ledger.category(auto).unwrap().balance(), dec!(-45));
        assert_eq!(ledger.transaction(t).unwrap().splits().unassigned(), dec!(-15));
    }

    #[test]
    fn test_void_transaction_skipped_by_balances() {
        let mut ledger = Ledger::new();
        let a = checking(&mut ledger);
        let t = ledger.add_transaction(Transaction::new(a, day(7), dec!(-9))).unwrap();
        assert_eq!(ledger.account(a).unwrap().balance(), dec!(-9));
        ledger.set_status(t, TransactionStatus::Void).unwrap();
        assert_eq!(ledger.account(a).unwrap().balance(), Decimal::ZERO);
    }
}
