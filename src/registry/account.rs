use crate::core::currency::CurrencyCode;
use crate::core::events::EntityKind;
use crate::core::ids::{AccountId, CategoryId, OnlineAccountId};
use crate::registry::{entity_lifecycle, Entity, EntityState};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AccountType {
    #[default]
    Checking,
    Savings,
    Credit,
    Investment,
    Brokerage,
    Retirement,
    Cash,
    Asset,
    Loan,
    CreditLine,
    MoneyMarket,
    /// Pseudo-account that mirrors a category for budget tracking.
    CategoryFund,
}

impl AccountType {
    /// Accounts whose balance includes the market value of open holdings.
    pub fn holds_securities(self) -> bool {
        matches!(
            self,
            AccountType::Investment | AccountType::Brokerage | AccountType::Retirement
        )
    }
}

/// A ledger account.
///
/// `balance` and `reconciled_balance` are derived by rebalancing and are
/// never written by callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    id: AccountId,
    name: String,
    pub account_type: AccountType,
    pub(crate) opening_balance: Decimal,
    pub(crate) currency: CurrencyCode,
    pub(crate) closed: bool,
    pub budgeted: bool,
    pub tax_deferred: bool,
    pub(crate) online_account: Option<OnlineAccountId>,
    /// The category a `CategoryFund` account mirrors.
    pub(crate) category_fund: Option<CategoryId>,
    #[serde(skip)]
    pub(crate) balance: Decimal,
    #[serde(skip)]
    pub(crate) reconciled_balance: Decimal,
    #[serde(skip)]
    state: EntityState,
}

impl Account {
    pub fn new(name: impl Into<String>, account_type: AccountType) -> Self {
        Self {
            id: AccountId::UNASSIGNED,
            name: name.into(),
            account_type,
            opening_balance: Decimal::ZERO,
            currency: CurrencyCode::default(),
            closed: false,
            budgeted: false,
            tax_deferred: false,
            online_account: None,
            category_fund: None,
            balance: Decimal::ZERO,
            reconciled_balance: Decimal::ZERO,
            state: EntityState::Inserted,
        }
    }

    /// A `CategoryFund` pseudo-account mirroring `category`.
    pub fn category_fund(name: impl Into<String>, category: CategoryId) -> Self {
        let mut account = Self::new(name, AccountType::CategoryFund);
        account.category_fund = Some(category);
        account
    }

    pub fn with_opening_balance(mut self, amount: Decimal) -> Self {
        self.opening_balance = amount;
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = CurrencyCode::new(currency);
        self
    }

    pub fn with_online_account(mut self, online: OnlineAccountId) -> Self {
        self.online_account = Some(online);
        self
    }

    pub fn display_name(&self) -> &str {
        &self.name
    }

    pub fn opening_balance(&self) -> Decimal {
        self.opening_balance
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn reconciled_balance(&self) -> Decimal {
        self.reconciled_balance
    }

    pub fn currency(&self) -> &CurrencyCode {
        &self.currency
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn online_account(&self) -> Option<OnlineAccountId> {
        self.online_account
    }

    pub fn fund_category(&self) -> Option<CategoryId> {
        match self.account_type {
            AccountType::CategoryFund => self.category_fund,
            _ => None,
        }
    }
}

impl Entity for Account {
    entity_lifecycle!(AccountId, EntityKind::Account);

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}
