//! Transfers between accounts.
//!
//! A transfer is a pair of [`TransferLink`] values, one on each side. The
//! two supported shapes are:
//!
//! - transaction `T` in account A and mirror `M` in account B, where
//!   `T.transfer` points at `M` and `M.transfer` points at `T`;
//! - split `S` of `T` and mirror `M`, where `S.transfer` points at `M` and
//!   `M.transfer` points at `(T, S)`.
//!
//! Links are plain ids resolved through the transaction store, so removing
//! one side never re-enters removal of the other.

use crate::core::error::{LedgerError, Result};
use crate::core::events::NodeId;
use crate::core::ids::{AccountId, CategoryId, SplitId, TransactionId};
use crate::ledger::book::Ledger;
use crate::ledger::transaction::{Investment, InvestmentType, Transaction, TransferLink};
use crate::registry::category::ReservedCategory;
use crate::registry::Entity;
use rust_decimal::Decimal;
use std::fmt;

/// How the far side of a transfer is released when the near side goes away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Release {
    /// Delete a mirror transaction, or unlink a split.
    Unlink,
    /// The near side's account is being deleted: keep the far side but move
    /// it into one of the deleted-account categories.
    Orphan {
        to_deleted: CategoryId,
        from_deleted: CategoryId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DanglingReason {
    /// The linked transaction or split does not exist.
    MissingTarget,
    /// The linked account is gone or holds no transactions.
    TargetAccountDeleted,
    /// The target exists but does not link back.
    NotReciprocal,
}

impl fmt::Display for DanglingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DanglingReason::MissingTarget => "target missing",
            DanglingReason::TargetAccountDeleted => "target account deleted",
            DanglingReason::NotReciprocal => "target does not link back",
        };
        f.write_str(text)
    }
}

/// A transfer found by [`Ledger::check_transfers`] without a valid partner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingTransfer {
    pub transaction: TransactionId,
    pub split: Option<SplitId>,
    pub link: TransferLink,
    pub reason: DanglingReason,
}

/// The investment detail on the far side of a transfer. Buys and sells
/// cannot be mirrored.
fn mirror_investment(investment: &Investment) -> Result<Investment> {
    let investment_type = match investment.investment_type {
        InvestmentType::Add => InvestmentType::Remove,
        InvestmentType::Remove => InvestmentType::Add,
        InvestmentType::Buy | InvestmentType::Sell => {
            return Err(LedgerError::InvalidInvestmentTransferType {
                investment_type: investment.investment_type.to_string(),
            })
        }
        other => other,
    };
    Ok(Investment {
        investment_type,
        ..investment.clone()
    })
}

impl Ledger {
    /// Turn `id` into a transfer to account `to`.
    ///
    /// Any existing transfer on `id` is removed first. A mirror transaction
    /// is created in `to` with the amount negated and converted into `to`'s
    /// currency, and both sides are linked. Returns the mirror's id.
    ///
    /// # Examples
    ///
    /// ```
    /// use money_ledger::ledger::book::Ledger;
    /// use money_ledger::ledger::transaction::Transaction;
    /// use money_ledger::registry::account::{Account, AccountType};
    /// use chrono::NaiveDate;
    /// use rust_decimal_macros::dec;
    ///
    /// let mut ledger = Ledger::new();
    /// let checking = ledger.add_account(Account::new("Checking", AccountType::Checking)).unwrap();
    /// let savings = ledger.add_account(Account::new("Savings", AccountType::Savings)).unwrap();
    /// let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
    ///
    /// let t = ledger.add_transaction(Transaction::new(checking, date, dec!(-200))).unwrap();
    /// let mirror = ledger.transfer(t, savings).unwrap();
    ///
    /// assert_eq!(ledger.transaction(mirror).unwrap().amount(), dec!(200));
    /// assert_eq!(ledger.transaction(t).unwrap().transfer().unwrap().transaction, mirror);
    /// ```
    pub fn transfer(&mut self, id: TransactionId, to: AccountId) -> Result<TransactionId> {
        let t = self.transactions.live(id)?;
        self.accounts.live(to)?;
        if t.account == to {
            return Err(LedgerError::SameAccountTransfer {
                account: to.to_string(),
            });
        }
        let investment = t.investment.as_ref().map(mirror_investment).transpose()?;
        let existing = t.transfer;
        if let Some(link) = &existing {
            self.check_transfer_removable(link)?;
        }

        let source_account = t.account;
        let mut mirror = Transaction::new(to, t.date, -self.convert_between(t.amount, source_account, to));
        mirror.payee = t.payee;
        mirror.memo = t.memo.clone();
        mirror.number = t.number.clone();
        mirror.fitid = t.fitid.clone();
        mirror.investment = investment;
        let clear_category = !t.has_splits();

        self.batch(NodeId::Ledger, |ledger| -> Result<TransactionId> {
            if let Some(link) = existing {
                ledger.set_transfer_link(id, None);
                ledger.release_counterpart(link, Release::Unlink);
            }
            let mirror_id = ledger.transactions.add(mirror, &mut ledger.events)?;
            ledger.set_transfer_link(mirror_id, Some(TransferLink::to_transaction(source_account, id)));
            ledger.set_transfer_link(id, Some(TransferLink::to_transaction(to, mirror_id)));
            if clear_category {
                if let Some(t) = ledger.transactions.get_mut(id) {
                    t.category = None;
                }
            }
            ledger.settle(id);
            ledger.settle(mirror_id);
            log::info!("linked transfer {} <-> {} ({} -> {})", id, mirror_id, source_account, to);
            Ok(mirror_id)
        })
    }

    /// Turn split `split` of `id` into a transfer to account `to`.
    ///
    /// Fails with `ConflictingSplitTransfer` when `id` is itself the mirror
    /// of another transaction's split.
    pub fn transfer_split(&mut self, id: TransactionId, split: SplitId, to: AccountId) -> Result<TransactionId> {
        let t = self.transactions.live(id)?;
        let s = self.live_split(t, split)?;
        self.accounts.live(to)?;
        if t.account == to {
            return Err(LedgerError::SameAccountTransfer {
                account: to.to_string(),
            });
        }
        if t.transfer.is_some_and(|link| link.split.is_some()) {
            return Err(LedgerError::ConflictingSplitTransfer {
                transaction: id.to_string(),
            });
        }
        let existing = s.transfer;
        if let Some(link) = &existing {
            self.check_transfer_removable(link)?;
        }

        let source_account = t.account;
        let mut mirror = Transaction::new(to, t.date, -self.convert_between(s.amount, source_account, to));
        mirror.payee = s.payee.or(t.payee);
        mirror.memo = s.memo.clone().or_else(|| t.memo.clone());
        mirror.number = t.number.clone();

        self.batch(NodeId::Ledger, |ledger| -> Result<TransactionId> {
            if let Some(link) = existing {
                ledger.edit_split(id, split, "transfer", |s| s.transfer = None);
                ledger.release_counterpart(link, Release::Unlink);
            }
            let mirror_id = ledger.transactions.add(mirror, &mut ledger.events)?;
            ledger.set_transfer_link(mirror_id, Some(TransferLink::to_split(source_account, id, split)));
            ledger.edit_split(id, split, "transfer", |s| {
                s.transfer = Some(TransferLink::to_transaction(to, mirror_id));
                s.category = None;
            });
            ledger.settle(id);
            ledger.settle(mirror_id);
            log::info!("linked split transfer {}/{} <-> {}", id, split, mirror_id);
            Ok(mirror_id)
        })
    }

    /// Remove the transfer on `id`. A mirror transaction on the other side
    /// is deleted; a split on the other side is only unlinked.
    pub fn remove_transfer(&mut self, id: TransactionId) -> Result<()> {
        let Some(link) = self.transactions.live(id)?.transfer else {
            return Ok(());
        };
        self.check_transfer_removable(&link)?;
        self.batch(NodeId::Ledger, |ledger| {
            ledger.set_transfer_link(id, None);
            ledger.release_counterpart(link, Release::Unlink);
            ledger.settle(id);
        });
        Ok(())
    }

    /// Remove the transfer on split `split` of `id`, deleting its mirror.
    pub fn remove_split_transfer(&mut self, id: TransactionId, split: SplitId) -> Result<()> {
        let t = self.transactions.live(id)?;
        let Some(link) = self.live_split(t, split)?.transfer else {
            return Ok(());
        };
        self.check_transfer_removable(&link)?;
        self.batch(NodeId::Ledger, |ledger| {
            ledger.edit_split(id, split, "transfer", |s| s.transfer = None);
            ledger.release_counterpart(link, Release::Unlink);
        });
        Ok(())
    }

    /// Remove an account and all of its transactions, whatever their
    /// status. The far side of every transfer into or out of the account is
    /// kept, unlinked and recategorized as a transfer to or from a deleted
    /// account.
    pub fn remove_account(&mut self, id: AccountId) -> Result<()> {
        self.accounts.live(id)?;
        let release = Release::Orphan {
            to_deleted: self.reserved_category(ReservedCategory::TransferToDeletedAccount)?,
            from_deleted: self.reserved_category(ReservedCategory::TransferFromDeletedAccount)?,
        };

        self.batch(NodeId::Ledger, |ledger| {
            let ids = ledger.transactions.ids_for_account(id);
            for tid in &ids {
                ledger.detach_links(*tid, release);
            }
            for tid in &ids {
                ledger.transactions.remove(*tid, &mut ledger.events);
                ledger.sync_attribution(*tid);
            }
            ledger.accounts.remove(id, &mut ledger.events);
            ledger.pending_rebalance.remove(&id);
            log::info!("removed account {} with {} transactions", id, ids.len());
        });
        // An open reconciliation dies with the account and takes its scope along.
        if self.reconciling.remove(&id) {
            self.end_update(NodeId::account(id));
        }
        Ok(())
    }

    /// Scan every transfer for a valid partner.
    ///
    /// Findings are returned, not repaired, with one exception when
    /// `heal_reconciled_transfers` is on: a reconciled transaction whose
    /// mirror has been re-pointed at an unreconciled duplicate (same
    /// account, payee, category and amount) takes its mirror back.
    pub fn check_transfers(&mut self) -> Vec<DanglingTransfer> {
        let mut found = Vec::new();
        let mut heals = Vec::new();
        for t in self.transactions.iter() {
            if let Some(link) = t.transfer {
                let expected = TransferLink::to_transaction(t.account, t.id());
                if let Some(reason) = self.verify_link(&link, &expected) {
                    match self.heal_candidate(t, &link, reason) {
                        Some(duplicate) => heals.push((t.id(), link, duplicate)),
                        None => found.push(DanglingTransfer {
                            transaction: t.id(),
                            split: None,
                            link,
                            reason,
                        }),
                    }
                }
            }
            for s in t.splits.iter() {
                let Some(link) = s.transfer else { continue };
                let expected = TransferLink::to_split(t.account, t.id(), s.id());
                if let Some(reason) = self.verify_link(&link, &expected) {
                    found.push(DanglingTransfer {
                        transaction: t.id(),
                        split: Some(s.id()),
                        link,
                        reason,
                    });
                }
            }
        }

        for (id, link, duplicate) in heals {
            let Some(account) = self.transactions.get(id).map(|t| t.account) else { continue };
            self.set_transfer_link(link.transaction, Some(TransferLink::to_transaction(account, id)));
            self.set_transfer_link(duplicate, None);
            self.settle(duplicate);
            log::info!(
                "healed transfer: {} reclaimed mirror {} from duplicate {}",
                id,
                link.transaction,
                duplicate
            );
        }
        for dangling in &found {
            log::warn!(
                "dangling transfer on {}: {} ({})",
                dangling.transaction,
                dangling.link,
                dangling.reason
            );
        }
        found
    }

    /// Why `link` is broken, if it is. `expected` is the link the target
    /// should hold.
    fn verify_link(&self, link: &TransferLink, expected: &TransferLink) -> Option<DanglingReason> {
        if !self.accounts.contains(link.account) || self.transactions.count_for_account(link.account) == 0 {
            return Some(DanglingReason::TargetAccountDeleted);
        }
        let Some(target) = self
            .transactions
            .get(link.transaction)
            .filter(|t| !t.is_deleted() && t.account == link.account)
        else {
            return Some(DanglingReason::MissingTarget);
        };
        let back = match link.split {
            None => target.transfer,
            Some(split) => match target.splits.get(split) {
                Some(s) => s.transfer,
                None => return Some(DanglingReason::MissingTarget),
            },
        };
        if back != Some(*expected) {
            return Some(DanglingReason::NotReciprocal);
        }
        None
    }

    /// The unreconciled duplicate that stole `t`'s mirror, if `t` may take
    /// it back.
    fn heal_candidate(&self, t: &Transaction, link: &TransferLink, reason: DanglingReason) -> Option<TransactionId> {
        if !self.config().heal_reconciled_transfers
            || reason != DanglingReason::NotReciprocal
            || !t.is_reconciled()
            || link.split.is_some()
        {
            return None;
        }
        let mirror = self.transactions.get(link.transaction)?;
        let back = mirror.transfer?;
        if back.split.is_some() {
            return None;
        }
        let duplicate = self.transactions.get(back.transaction).filter(|d| !d.is_deleted())?;
        let matches = duplicate.id() != t.id()
            && duplicate.account == t.account
            && !duplicate.is_reconciled()
            && duplicate.transfer == Some(*link)
            && duplicate.payee == t.payee
            && duplicate.category == t.category
            && duplicate.amount == t.amount;
        matches.then(|| duplicate.id())
    }

    /// Fails with `ReconciledTransferLocked` if the far side of `link` is
    /// reconciled.
    pub(crate) fn check_transfer_removable(&self, link: &TransferLink) -> Result<()> {
        match self.transactions.get(link.transaction) {
            Some(target) if !target.is_deleted() && target.is_reconciled() => {
                Err(LedgerError::ReconciledTransferLocked {
                    target: link.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Deal with the far side of `link` after the near side has let go.
    pub(crate) fn release_counterpart(&mut self, link: TransferLink, release: Release) {
        let Some(target) = self.transactions.get(link.transaction).filter(|t| !t.is_deleted()) else {
            return;
        };
        match (release, link.split) {
            (Release::Orphan { to_deleted, from_deleted }, None) => {
                let category = if target.amount < Decimal::ZERO {
                    from_deleted
                } else {
                    to_deleted
                };
                self.set_transfer_link(link.transaction, None);
                if let Some(t) = self.transactions.get_mut(link.transaction) {
                    t.category = Some(category);
                }
                self.transactions.touch(link.transaction, "category", &mut self.events);
                self.settle(link.transaction);
                log::info!("orphaned transfer {} into deleted-account category", link.transaction);
            }
            (Release::Orphan { to_deleted, from_deleted }, Some(split)) => {
                let Some(amount) = target.splits.get(split).map(|s| s.amount) else {
                    return;
                };
                let category = if amount < Decimal::ZERO {
                    from_deleted
                } else {
                    to_deleted
                };
                self.edit_split(link.transaction, split, "transfer", |s| {
                    s.transfer = None;
                    s.category = Some(category);
                });
                log::info!("orphaned split transfer {}/{}", link.transaction, split);
            }
            (Release::Unlink, None) => {
                log::debug!("removing transfer mirror {}", link.transaction);
                self.drop_transaction(link.transaction, Release::Unlink);
            }
            (Release::Unlink, Some(split)) => {
                self.edit_split(link.transaction, split, "transfer", |s| {
                    s.transfer = None;
                    s.category = None;
                });
                log::debug!("unlinked split transfer {}/{}", link.transaction, split);
            }
        }
    }

    /// Clear every link held by `id` and its splits, releasing each far side.
    pub(crate) fn detach_links(&mut self, id: TransactionId, release: Release) {
        let Some(t) = self.transactions.get(id) else { return };
        let own = t.transfer;
        let split_links: Vec<(SplitId, TransferLink)> = t
            .splits
            .iter()
            .filter_map(|s| s.transfer.map(|link| (s.id(), link)))
            .collect();
        if let Some(link) = own {
            self.set_transfer_link(id, None);
            self.release_counterpart(link, release);
        }
        for (split, link) in split_links {
            self.edit_split(id, split, "transfer", |s| s.transfer = None);
            self.release_counterpart(link, release);
        }
    }

    /// Detach and remove `id` without any lock checks.
    pub(crate) fn drop_transaction(&mut self, id: TransactionId, release: Release) {
        let Some(account) = self.transactions.get(id).map(|t| t.account) else {
            return;
        };
        self.detach_links(id, release);
        self.transactions.remove(id, &mut self.events);
        self.sync_attribution(id);
        self.request_rebalance(account);
    }

    pub(crate) fn set_transfer_link(&mut self, id: TransactionId, link: Option<TransferLink>) {
        let Some(t) = self.transactions.get_mut(id) else { return };
        if t.transfer == link {
            return;
        }
        t.transfer = link;
        self.transactions.touch(id, "transfer", &mut self.events);
    }

    /// `amount` in `from`'s currency, expressed in `to`'s.
    pub(crate) fn convert_between(&self, amount: Decimal, from: AccountId, to: AccountId) -> Decimal {
        match (self.accounts.get(from), self.accounts.get(to)) {
            (Some(a), Some(b)) => self.convert(amount, &a.currency, &b.currency),
            _ => amount,
        }
    }

    /// The new amount for the far side of `link` once the near side, in
    /// `source_account`, becomes `amount`. Fails if that side is locked.
    pub(crate) fn plan_counterpart_amount(
        &self,
        link: &TransferLink,
        source_account: AccountId,
        amount: Decimal,
    ) -> Result<Option<(TransferLink, Decimal)>> {
        let Some(target) = self.transactions.get(link.transaction).filter(|t| !t.is_deleted()) else {
            return Ok(None);
        };
        if let Some(split) = link.split {
            if target.splits.get(split).is_none() {
                return Ok(None);
            }
        }
        self.ensure_amount_editable(target)?;
        let value = -self.convert_between(amount, source_account, target.account);
        Ok(Some((*link, value)))
    }

    pub(crate) fn apply_counterpart_amount(&mut self, link: &TransferLink, value: Decimal) {
        match link.split {
            Some(split) => self.edit_split(link.transaction, split, "amount", |s| s.amount = value),
            None => {
                let Some(t) = self.transactions.get_mut(link.transaction) else { return };
                if t.amount == value {
                    return;
                }
                t.amount = value;
                self.transactions.touch(link.transaction, "amount", &mut self.events);
                self.settle(link.transaction);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::split::Split;
    use crate::ledger::transaction::TransactionStatus;
    use crate::registry::account::{Account, AccountType};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, d).unwrap()
    }

    fn two_accounts() -> (Ledger, AccountId, AccountId) {
        let mut ledger = Ledger::new();
        let checking = ledger
            .add_account(Account::new("Checking", AccountType::Checking).with_opening_balance(dec!(1000)))
            .unwrap();
        let savings = ledger
            .add_account(Account::new("Savings", AccountType::Savings))
            .unwrap();
        (ledger, checking, savings)
    }

    #[test]
    fn test_same_account_transfer_rejected() {
        let (mut ledger, checking, _) = two_accounts();
        let t = ledger.add_transaction(Transaction::new(checking, day(1), dec!(-5))).unwrap();
        let err = ledger.transfer(t, checking).unwrap_err();
        assert!(matches!(err, LedgerError::SameAccountTransfer { .. }));
        assert!(ledger.transaction(t).unwrap().transfer().is_none());
    }

    #[test]
    fn test_buy_cannot_be_transferred() {
        let (mut ledger, checking, savings) = two_accounts();
        let sec = ledger
            .add_security(crate::registry::security::Security::new("Acme", "ACME"))
            .unwrap();
        let t = ledger
            .add_transaction(
                Transaction::new(checking, day(1), dec!(-5))
                    .with_investment(Investment::new(InvestmentType::Buy, sec, dec!(1))),
            )
            .unwrap();
        let err = ledger.transfer(t, savings).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInvestmentTransferType { .. }));
    }

    #[test]
    fn test_add_is_mirrored_as_remove() {
        let (mut ledger, checking, savings) = two_accounts();
        let sec = ledger
            .add_security(crate::registry::security::Security::new("Acme", "ACME"))
            .unwrap();
        let t = ledger
            .add_transaction(
                Transaction::new(checking, day(1), dec!(0))
                    .with_investment(Investment::new(InvestmentType::Remove, sec, dec!(3))),
            )
            .unwrap();
        let m = ledger.transfer(t, savings).unwrap();
        let mirrored = ledger.transaction(m).unwrap().investment().unwrap();
        assert_eq!(mirrored.investment_type, InvestmentType::Add);
        assert_eq!(mirrored.units, dec!(3));
    }

    #[test]
    fn test_amount_edit_carries_to_mirror() {
        let (mut ledger, checking, savings) = two_accounts();
        let t = ledger.add_transaction(Transaction::new(checking, day(2), dec!(-200))).unwrap();
        let m = ledger.transfer(t, savings).unwrap();
        ledger.set_amount(t, dec!(-250)).unwrap();
        assert_eq!(ledger.transaction(m).unwrap().amount(), dec!(250));
        assert_eq!(ledger.account(savings).unwrap().balance(), dec!(250));
    }

    #[test]
    fn test_retransfer_replaces_mirror() {
        let (mut ledger, checking, savings) = two_accounts();
        let cash = ledger.add_account(Account::new("Wallet", AccountType::Cash)).unwrap();
        let t = ledger.add_transaction(Transaction::new(checking, day(3), dec!(-40))).unwrap();
        let first = ledger.transfer(t, savings).unwrap();
        let second = ledger.transfer(t, cash).unwrap();
        assert!(!ledger.transactions().contains(first));
        assert_eq!(ledger.transaction(second).unwrap().account(), cash);
        assert_eq!(ledger.account(savings).unwrap().balance(), Decimal::ZERO);
        assert!(ledger.check_transfers().is_empty());
    }

    #[test]
    fn test_remove_transfer_deletes_whole_mirror() {
        let (mut ledger, checking, savings) = two_accounts();
        let t = ledger.add_transaction(Transaction::new(checking, day(4), dec!(-70))).unwrap();
        let m = ledger.transfer(t, savings).unwrap();
        ledger.remove_transfer(t).unwrap();
        assert!(ledger.transaction(t).unwrap().transfer().is_none());
        assert!(!ledger.transactions().contains(m));
    }

    #[test]
    fn test_reconciled_target_locks_removal() {
        let (mut ledger, checking, savings) = two_accounts();
        let t = ledger.add_transaction(Transaction::new(checking, day(5), dec!(-70))).unwrap();
        let m = ledger.transfer(t, savings).unwrap();
        ledger.set_status(m, TransactionStatus::Reconciled).unwrap();
        let err = ledger.remove_transfer(t).unwrap_err();
        assert!(matches!(err, LedgerError::ReconciledTransferLocked { .. }));
        assert!(ledger.transaction(t).unwrap().transfer().is_some());
    }

    #[test]
    fn test_split_transfer_links_both_ways() {
        let (mut ledger, checking, savings) = two_accounts();
        let t = ledger.add_transaction(Transaction::new(checking, day(6), dec!(-300))).unwrap();
        ledger.add_split(t, Split::new(dec!(-200))).unwrap();
        let s = ledger.add_split(t, Split::new(dec!(-100))).unwrap();
        let m = ledger.transfer_split(t, s, savings).unwrap();

        let split = ledger.transaction(t).unwrap().splits().get(s).unwrap();
        assert_eq!(split.transfer().unwrap().transaction, m);
        let mirror = ledger.transaction(m).unwrap();
        assert_eq!(mirror.amount(), dec!(100));
        assert_eq!(mirror.transfer(), Some(&TransferLink::to_split(checking, t, s)));
        assert!(ledger.check_transfers().is_empty());

        let err = ledger.transfer_split(m, SplitId::new(0), checking).unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));
    }

    #[test]
    fn test_split_mirror_cannot_own_split_transfer() {
        let (mut ledger, checking, savings) = two_accounts();
        let cash = ledger.add_account(Account::new("Wallet", AccountType::Cash)).unwrap();
        let t = ledger.add_transaction(Transaction::new(checking, day(7), dec!(-30))).unwrap();
        let s = ledger.add_split(t, Split::new(dec!(-30))).unwrap();
        let m = ledger.transfer_split(t, s, savings).unwrap();
        let ms = ledger.add_split(m, Split::new(dec!(30))).unwrap();
        let err = ledger.transfer_split(m, ms, cash).unwrap_err();
        assert!(matches!(err, LedgerError::ConflictingSplitTransfer { .. }));
    }

    #[test]
    fn test_removing_split_mirror_unlinks_split() {
        let (mut ledger, checking, savings) = two_accounts();
        let t = ledger.add_transaction(Transaction::new(checking, day(8), dec!(-30))).unwrap();
        let s = ledger.add_split(t, Split::new(dec!(-30))).unwrap();
        let m = ledger.transfer_split(t, s, savings).unwrap();
        ledger.remove_transaction(m).unwrap();
        let split = ledger.transaction(t).unwrap().splits().get(s).unwrap();
        assert!(split.transfer().is_none());
        assert_eq!(split.category(), None);
    }

    #[test]
    fn test_removing_account_mid_reconcile_closes_scope() {
        let (mut ledger, checking, savings) = two_accounts();
        let t = ledger.add_transaction(Transaction::new(checking, day(11), dec!(-60))).unwrap();
        let m = ledger.transfer(t, savings).unwrap();
        ledger.begin_reconcile(savings).unwrap();
        ledger.remove_account(savings).unwrap();
        ledger.end_reconcile(savings);

        assert!(!ledger.is_batching());
        assert!(!ledger.is_reconciling(savings));
        assert!(!ledger.transactions().contains(m));
        assert_eq!(ledger.account(checking).unwrap().balance(), dec!(940));

        ledger.add_transaction(Transaction::new(checking, day(12), dec!(-100))).unwrap();
        assert_eq!(ledger.account(checking).unwrap().balance(), dec!(840));
    }

    #[test]
    fn test_dangling_detected() {
        let (mut ledger, checking, savings) = two_accounts();
        let t = ledger.add_transaction(Transaction::new(checking, day(9), dec!(-10))).unwrap();
        let m = ledger.transfer(t, savings).unwrap();
        ledger.set_transfer_link(m, None);
        let found = ledger.check_transfers();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].transaction, t);
        assert_eq!(found[0].reason, DanglingReason::NotReciprocal);
    }

    #[test]
    fn test_reconciled_transfer_heals() {
        let (mut ledger, checking, savings) = two_accounts();
        let t = ledger.add_transaction(Transaction::new(checking, day(10), dec!(-10))).unwrap();
        let m = ledger.transfer(t, savings).unwrap();
        ledger.set_status(t, TransactionStatus::Reconciled).unwrap();

        let dup = ledger.add_transaction(Transaction::new(checking, day(10), dec!(-10))).unwrap();
        let link = *ledger.transaction(t).unwrap().transfer().unwrap();
        ledger.set_transfer_link(dup, Some(link));
        ledger.set_transfer_link(m, Some(TransferLink::to_transaction(checking, dup)));

        assert!(ledger.check_transfers().is_empty());
        assert_eq!(
            ledger.transaction(m).unwrap().transfer(),
            Some(&TransferLink::to_transaction(checking, t))
        );
        assert!(ledger.transaction(dup).unwrap().transfer().is_none());
    }
}
