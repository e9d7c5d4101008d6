//! Transactions, splits, transfers and the ledger aggregate.

pub mod balance;
pub mod book;
pub mod holdings;
pub mod mutation;
pub mod split;
pub mod transaction;
pub mod transactions;
pub mod transfer;
pub mod views;
