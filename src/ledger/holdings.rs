//! Cost-basis collaborator interface.
//!
//! Lot tracking lives outside this crate. Rebalancing an investment account
//! asks a [`CostBasis`] implementation for the market value of what the
//! account still holds.

use crate::core::ids::{AccountId, SecurityId};
use crate::registry::account::Account;
use crate::registry::Entity;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub security: SecurityId,
    pub units_remaining: Decimal,
    pub market_value: Decimal,
}

pub trait CostBasis {
    fn holdings(&self, account: &Account, as_of: NaiveDate) -> Vec<Holding>;
}

/// Reports nothing held anywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHoldings;

impl CostBasis for NoHoldings {
    fn holdings(&self, _account: &Account, _as_of: NaiveDate) -> Vec<Holding> {
        Vec::new()
    }
}

/// Fixed holdings per account, independent of date.
#[derive(Debug, Clone, Default)]
pub struct FixedHoldings {
    by_account: HashMap<AccountId, Vec<Holding>>,
}

impl FixedHoldings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hold(&mut self, account: AccountId, holding: Holding) {
        self.by_account.entry(account).or_default().push(holding);
    }
}

impl CostBasis for FixedHoldings {
    fn holdings(&self, account: &Account, _as_of: NaiveDate) -> Vec<Holding> {
        self.by_account.get(&account.id()).cloned().unwrap_or_default()
    }
}
