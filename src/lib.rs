//! # money-ledger
//!
//! In-memory transactional data model for a personal-finance ledger.
//!
//! A [`Ledger`](ledger::book::Ledger) owns registries of accounts, payees,
//! categories, securities, currencies, aliases and online accounts, plus the
//! transaction list. Every mutation goes through the ledger so that derived
//! state stays consistent: account and running balances, category balances
//! along the hierarchy, split remainders and the two sides of every transfer.
//!
//! ## Architecture
//!
//! - **core** — ids, errors, currencies, configuration and change notification
//! - **registry** — id- and name-indexed entity registries, the category tree
//! - **ledger** — transactions, splits, transfers, balances and views
//! - **persistence** — flat snapshots and post-load re-linking
//! - **tracking** — pending-change bookkeeping on top of change notification
//! - **simulation** — random sample ledgers for tests and benchmarks

pub mod core;
pub mod ledger;
pub mod persistence;
pub mod registry;
pub mod simulation;
pub mod tracking;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::core::config::LedgerConfig;
    pub use crate::core::currency::{CurrencyCode, CurrencyConverter, RateTable};
    pub use crate::core::error::{LedgerError, Result};
    pub use crate::core::events::{ChangeBatch, ChangeEvent, ChangeType, EntityKind, NodeId};
    pub use crate::core::ids::{
        AccountId, AliasId, CategoryId, CurrencyId, EntityId, OnlineAccountId, PayeeId, SecurityId, SplitId,
        TransactionId,
    };
    pub use crate::ledger::book::Ledger;
    pub use crate::ledger::split::Split;
    pub use crate::ledger::transaction::{Investment, InvestmentType, Transaction, TransactionStatus, TransferLink};
    pub use crate::ledger::transfer::{DanglingReason, DanglingTransfer};
    pub use crate::ledger::views::{TransactionView, ViewRow};
    pub use crate::ledger::holdings::{CostBasis, Holding};
    pub use crate::persistence::snapshot::Snapshot;
    pub use crate::registry::account::{Account, AccountType};
    pub use crate::registry::alias::Alias;
    pub use crate::registry::category::{Category, CategoryType, ReservedCategory};
    pub use crate::registry::payee::Payee;
    pub use crate::registry::{Entity, EntityState};
    pub use crate::simulation::sample::{generate_sample_ledger, SampleConfig};
    pub use crate::tracking::change_tracker::ChangeTracker;
}
