use crate::core::events::EntityKind;
use thiserror::Error;

/// Errors surfaced by mutating ledger operations.
///
/// Every public mutation either succeeds completely or returns one of these
/// without having changed the graph.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// An id or name collided with a live entity on insert or rename.
    #[error("duplicate {kind} key: {key}")]
    DuplicateKey { kind: EntityKind, key: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// A reconciled amount was edited, or a reconciled transaction removed,
    /// outside of a reconciliation scope.
    #[error("transaction {transaction} is reconciled: {reason}")]
    InvalidMutation { transaction: String, reason: String },

    #[error("cannot transfer to the same account ({account})")]
    SameAccountTransfer { account: String },

    /// Buy and Sell cannot be mirrored by a transfer; only Add and Remove can.
    #[error("investment type {investment_type} cannot be transferred")]
    InvalidInvestmentTransferType { investment_type: String },

    #[error("transaction {transaction} is already the target of a split transfer")]
    ConflictingSplitTransfer { transaction: String },

    #[error("transfer target {target} is reconciled and cannot be removed")]
    ReconciledTransferLocked { target: String },

    #[error("invalid category name '{name}'")]
    UnresolvedCategoryName { name: String },

    #[error("invalid alias pattern '{pattern}': {reason}")]
    InvalidAliasPattern { pattern: String, reason: String },

    #[error("snapshot error: {0}")]
    Persistence(#[from] serde_json::Error),
}

impl LedgerError {
    pub(crate) fn not_found(kind: EntityKind, id: impl ToString) -> Self {
        LedgerError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
