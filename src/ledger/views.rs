//! Read-only transaction listings.
//!
//! Category and payee listings unroll split transactions: when a filter
//! matches only some of a transaction's splits, each matching split is
//! listed as a [`TransactionView::SplitProjection`] instead of the whole
//! transaction. Views are values computed on demand and cannot be inserted
//! back into the ledger.

use crate::core::ids::{AccountId, CategoryId, PayeeId, SplitId, TransactionId};
use crate::ledger::book::Ledger;
use crate::ledger::split::Split;
use crate::ledger::transaction::{Transaction, TransactionStatus};
use crate::registry::category::ReservedCategory;
use crate::registry::Entity;
use chrono::NaiveDate;
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionView {
    Real(TransactionId),
    SplitProjection(TransactionId, SplitId),
}

impl TransactionView {
    pub fn transaction(self) -> TransactionId {
        match self {
            TransactionView::Real(id) | TransactionView::SplitProjection(id, _) => id,
        }
    }

    pub fn is_projection(self) -> bool {
        matches!(self, TransactionView::SplitProjection(..))
    }
}

/// A materialized listing row.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewRow {
    pub view: TransactionView,
    pub account: AccountId,
    pub date: NaiveDate,
    pub payee: Option<PayeeId>,
    pub category: Option<CategoryId>,
    pub amount: Decimal,
    pub status: TransactionStatus,
    pub memo: Option<String>,
}

impl ViewRow {
    fn real(t: &Transaction) -> Self {
        Self {
            view: TransactionView::Real(t.id()),
            account: t.account(),
            date: t.date(),
            payee: t.payee(),
            category: t.category(),
            amount: t.amount(),
            status: t.status(),
            memo: t.memo().map(str::to_string),
        }
    }

    /// A split shown as if it were a transaction of its own. Missing split
    /// fields fall back to the parent's.
    fn projection(t: &Transaction, s: &Split) -> Self {
        Self {
            view: TransactionView::SplitProjection(t.id(), s.id()),
            account: t.account(),
            date: t.date(),
            payee: s.payee().or(t.payee()),
            category: s.category(),
            amount: s.amount(),
            status: t.status(),
            memo: s.memo().or(t.memo()).map(str::to_string),
        }
    }
}

impl Ledger {
    /// Live transactions of `account` in date order that pass `include`.
    pub fn get_transactions_from(
        &self,
        account: AccountId,
        include: impl Fn(&Transaction) -> bool,
    ) -> Vec<ViewRow> {
        self.transactions
            .for_account(account)
            .into_iter()
            .filter(|t| include(*t))
            .map(ViewRow::real)
            .collect()
    }

    /// Entries attributed to `category` or any category beneath it.
    ///
    /// The reserved `Unknown` category also lists entries with neither a
    /// category nor a transfer, and `Unassigned Split` lists split
    /// transactions whose splits leave a remainder.
    pub fn get_transactions_by_category(
        &self,
        category: CategoryId,
        include: impl Fn(&Transaction) -> bool,
    ) -> Vec<ViewRow> {
        let in_scope = |c: Option<CategoryId>| {
            c.is_some_and(|c| self.categories.is_within(c, category))
        };
        let is_reserved = |which: ReservedCategory| {
            self.categories.find_id(which.name()) == Some(category)
        };
        if is_reserved(ReservedCategory::Unknown) {
            return self.unrolled(
                include,
                |t| in_scope(t.category()) || (t.category().is_none() && t.transfer().is_none()),
                |s| in_scope(s.category()) || (s.category().is_none() && s.transfer().is_none()),
            );
        }
        if is_reserved(ReservedCategory::UnassignedSplit) {
            return self.unrolled(
                include,
                |t| t.has_splits() && !t.splits().unassigned().is_zero(),
                |_| false,
            );
        }
        self.unrolled(include, |t| in_scope(t.category()), |s| in_scope(s.category()))
    }

    /// Entries paid to `payee`.
    pub fn get_transactions_by_payee(
        &self,
        payee: PayeeId,
        include: impl Fn(&Transaction) -> bool,
    ) -> Vec<ViewRow> {
        self.unrolled(
            include,
            |t| t.payee() == Some(payee),
            |s| s.payee() == Some(payee),
        )
    }

    fn unrolled(
        &self,
        include: impl Fn(&Transaction) -> bool,
        whole: impl Fn(&Transaction) -> bool,
        part: impl Fn(&Split) -> bool,
    ) -> Vec<ViewRow> {
        let mut rows = Vec::new();
        for t in self.transactions.iter() {
            if !include(t) {
                continue;
            }
            if !t.has_splits() {
                if whole(t) {
                    rows.push(ViewRow::real(t));
                }
                continue;
            }
            let matching: Vec<&Split> = t.splits().iter().filter(|s| part(*s)).collect();
            if matching.len() == t.splits().len() || (matching.is_empty() && whole(t)) {
                rows.push(ViewRow::real(t));
            } else {
                rows.extend(matching.into_iter().map(|s| ViewRow::projection(t, s)));
            }
        }
        rows.sort_by_key(|r| (r.date, r.view.transaction()));
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::account::{Account, AccountType};
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, d).unwrap()
    }

    #[test]
    fn test_unknown_lists_uncategorized_entries() {
        let mut ledger = Ledger::new();
        let checking = ledger.add_account(Account::new("Checking", AccountType::Checking)).unwrap();
        let savings = ledger.add_account(Account::new("Savings", AccountType::Savings)).unwrap();
        let food = ledger
            .get_or_create_category("Food", crate::registry::category::CategoryType::Expense)
            .unwrap();
        let loose = ledger.add_transaction(Transaction::new(checking, day(1), dec!(-12))).unwrap();
        ledger
            .add_transaction(Transaction::new(checking, day(2), dec!(-30)).with_category(food))
            .unwrap();
        let moved = ledger.add_transaction(Transaction::new(checking, day(3), dec!(-50))).unwrap();
        ledger.transfer(moved, savings).unwrap();
        let split = ledger.add_transaction(Transaction::new(checking, day(4), dec!(-20))).unwrap();
        ledger.add_split(split, Split::new(dec!(-15)).with_category(food)).unwrap();
        let bare = ledger.add_split(split, Split::new(dec!(-5))).unwrap();

        let unknown = ledger.reserved_category(ReservedCategory::Unknown).unwrap();
        let rows = ledger.get_transactions_by_category(unknown, |_| true);
        let views: Vec<TransactionView> = rows.iter().map(|r| r.view).collect();
        assert_eq!(
            views,
            vec![
                TransactionView::Real(loose),
                TransactionView::SplitProjection(split, bare),
            ]
        );
    }

    #[test]
    fn test_unassigned_split_lists_remainders() {
        let mut ledger = Ledger::new();
        let checking = ledger.add_account(Account::new("Checking", AccountType::Checking)).unwrap();
        let open = ledger.add_transaction(Transaction::new(checking, day(5), dec!(-90))).unwrap();
        ledger.add_split(open, Split::new(dec!(-60))).unwrap();
        let closed = ledger.add_transaction(Transaction::new(checking, day(6), dec!(-40))).unwrap();
        ledger.add_split(closed, Split::new(dec!(-40))).unwrap();

        let bucket = ledger.reserved_category(ReservedCategory::UnassignedSplit).unwrap();
        let rows = ledger.get_transactions_by_category(bucket, |_| true);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].view, TransactionView::Real(open));
        assert_eq!(ledger.transaction(open).unwrap().splits().unassigned(), dec!(-30));
    }
}
