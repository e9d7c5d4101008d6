use crate::core::events::EntityKind;
use crate::core::ids::SecurityId;
use crate::registry::{entity_lifecycle, Entity, EntityState};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SecurityType {
    #[default]
    None,
    Bond,
    MutualFund,
    Equity,
    MoneyMarket,
    Etf,
    Reit,
    Futures,
    Private,
}

/// A tradable holding referenced by investment transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Security {
    id: SecurityId,
    name: String,
    pub symbol: String,
    pub security_type: SecurityType,
    /// Last known unit price.
    pub price: Decimal,
    #[serde(skip)]
    state: EntityState,
}

impl Security {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            id: SecurityId::UNASSIGNED,
            name: name.into(),
            symbol: symbol.into(),
            security_type: SecurityType::default(),
            price: Decimal::ZERO,
            state: EntityState::Inserted,
        }
    }

    pub fn with_price(mut self, price: Decimal) -> Self {
        self.price = price;
        self
    }

    pub fn display_name(&self) -> &str {
        &self.name
    }
}

impl Entity for Security {
    entity_lifecycle!(SecurityId, EntityKind::Security);

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}
