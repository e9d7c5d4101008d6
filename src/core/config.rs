use crate::core::currency::CurrencyCode;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Tunables for a [`Ledger`](crate::ledger::book::Ledger).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Currency that unknown symbols are treated as.
    pub base_currency: CurrencyCode,
    /// Let the dangling-transfer scan repair a reconciled transfer whose
    /// mirror was re-pointed at an unreconciled duplicate.
    pub heal_reconciled_transfers: bool,
    /// As-of date handed to the cost-basis collaborator. `None` means today.
    pub investment_valuation_date: Option<NaiveDate>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            base_currency: CurrencyCode::new("USD"),
            heal_reconciled_transfers: true,
            investment_valuation_date: None,
        }
    }
}
