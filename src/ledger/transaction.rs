use crate::core::events::EntityKind;
use crate::core::ids::{AccountId, CategoryId, PayeeId, SecurityId, SplitId, TransactionId};
use crate::ledger::split::Splits;
use crate::registry::{entity_lifecycle, Entity, EntityState};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TransactionStatus {
    #[default]
    None,
    Electronic,
    Cleared,
    Reconciled,
    Void,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InvestmentType {
    #[default]
    None,
    Add,
    Remove,
    Buy,
    Sell,
    Dividend,
}

impl fmt::Display for InvestmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Buy/sell/add/remove detail attached 1:1 to a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Investment {
    pub investment_type: InvestmentType,
    pub security: Option<SecurityId>,
    pub units: Decimal,
    pub unit_price: Decimal,
}

impl Investment {
    pub fn new(investment_type: InvestmentType, security: SecurityId, units: Decimal) -> Self {
        Self {
            investment_type,
            security: Some(security),
            units,
            unit_price: Decimal::ZERO,
        }
    }

    pub fn with_unit_price(mut self, price: Decimal) -> Self {
        self.unit_price = price;
        self
    }
}

/// One side of a transfer: where the other half of the pair lives.
///
/// A transaction or split holding `TransferLink { transaction: B, .. }` is
/// reciprocated when `B` (or `B`'s split named by `split`) holds a link back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferLink {
    pub account: AccountId,
    pub transaction: TransactionId,
    pub split: Option<SplitId>,
}

impl TransferLink {
    pub fn to_transaction(account: AccountId, transaction: TransactionId) -> Self {
        Self {
            account,
            transaction,
            split: None,
        }
    }

    pub fn to_split(account: AccountId, transaction: TransactionId, split: SplitId) -> Self {
        Self {
            account,
            transaction,
            split: Some(split),
        }
    }
}

impl fmt::Display for TransferLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.split {
            Some(split) => write!(f, "{}/{} in {}", self.transaction, split, self.account),
            None => write!(f, "{} in {}", self.transaction, self.account),
        }
    }
}

/// A ledger entry in one account.
///
/// A transaction carries either a category or a non-empty split set, never
/// both in effect: while splits exist its category is the reserved `Split`
/// category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    id: TransactionId,
    pub(crate) account: AccountId,
    pub(crate) date: NaiveDate,
    pub(crate) amount: Decimal,
    pub(crate) payee: Option<PayeeId>,
    pub(crate) category: Option<CategoryId>,
    pub(crate) memo: Option<String>,
    pub(crate) number: Option<String>,
    /// Bank-assigned id from a download.
    pub(crate) fitid: Option<String>,
    pub(crate) status: TransactionStatus,
    pub(crate) sales_tax: Decimal,
    #[serde(default)]
    pub(crate) splits: Splits,
    pub(crate) transfer: Option<TransferLink>,
    pub(crate) investment: Option<Investment>,
    #[serde(skip)]
    pub(crate) running_balance: Decimal,
    #[serde(skip)]
    state: EntityState,
}

impl Transaction {
    pub fn new(account: AccountId, date: NaiveDate, amount: Decimal) -> Self {
        Self {
            id: TransactionId::UNASSIGNED,
            account,
            date,
            amount,
            payee: None,
            category: None,
            memo: None,
            number: None,
            fitid: None,
            status: TransactionStatus::None,
            sales_tax: Decimal::ZERO,
            splits: Splits::default(),
            transfer: None,
            investment: None,
            running_balance: Decimal::ZERO,
            state: EntityState::Inserted,
        }
    }

    pub fn with_payee(mut self, payee: PayeeId) -> Self {
        self.payee = Some(payee);
        self
    }

    pub fn with_category(mut self, category: CategoryId) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn with_number(mut self, number: impl Into<String>) -> Self {
        self.number = Some(number.into());
        self
    }

    pub fn with_fitid(mut self, fitid: impl Into<String>) -> Self {
        self.fitid = Some(fitid.into());
        self
    }

    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_sales_tax(mut self, tax: Decimal) -> Self {
        self.sales_tax = tax;
        self
    }

    pub fn with_investment(mut self, investment: Investment) -> Self {
        self.investment = Some(investment);
        self
    }

    pub fn account(&self) -> AccountId {
        self.account
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn payee(&self) -> Option<PayeeId> {
        self.payee
    }

    pub fn category(&self) -> Option<CategoryId> {
        self.category
    }

    pub fn memo(&self) -> Option<&str> {
        self.memo.as_deref()
    }

    pub fn number(&self) -> Option<&str> {
        self.number.as_deref()
    }

    pub fn fitid(&self) -> Option<&str> {
        self.fitid.as_deref()
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn sales_tax(&self) -> Decimal {
        self.sales_tax
    }

    pub fn splits(&self) -> &Splits {
        &self.splits
    }

    pub fn transfer(&self) -> Option<&TransferLink> {
        self.transfer.as_ref()
    }

    pub fn investment(&self) -> Option<&Investment> {
        self.investment.as_ref()
    }

    /// Account balance after this transaction, as of the last rebalance.
    pub fn running_balance(&self) -> Decimal {
        self.running_balance
    }

    pub fn is_reconciled(&self) -> bool {
        self.status == TransactionStatus::Reconciled
    }

    pub fn is_void(&self) -> bool {
        self.status == TransactionStatus::Void
    }

    pub fn has_splits(&self) -> bool {
        !self.splits.is_empty()
    }

    /// The amount live splits must add up to.
    pub fn split_target(&self) -> Decimal {
        self.amount - self.sales_tax
    }

    /// True while deleted or void: such entries count towards nothing.
    pub fn is_inert(&self) -> bool {
        self.is_deleted() || self.is_void()
    }
}

impl Entity for Transaction {
    entity_lifecycle!(TransactionId, EntityKind::Transaction);
}
