use crate::core::currency::{convert_by_ratio, CurrencyCode, CurrencyConverter};
use crate::core::events::EntityKind;
use crate::core::ids::CurrencyId;
use crate::registry::{entity_lifecycle, Entity, EntityState, Registry};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A currency known to the ledger, indexed by symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Currency {
    id: CurrencyId,
    symbol: CurrencyCode,
    pub name: String,
    /// Value of one unit in the base currency.
    pub ratio: Decimal,
    #[serde(skip)]
    state: EntityState,
}

impl Currency {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>, ratio: Decimal) -> Self {
        Self {
            id: CurrencyId::UNASSIGNED,
            symbol: CurrencyCode::new(symbol),
            name: name.into(),
            ratio,
            state: EntityState::Inserted,
        }
    }

    pub fn symbol(&self) -> &CurrencyCode {
        &self.symbol
    }
}

impl Entity for Currency {
    entity_lifecycle!(CurrencyId, EntityKind::Currency);

    fn name(&self) -> Option<&str> {
        Some(self.symbol.as_str())
    }

    fn set_name(&mut self, name: String) {
        self.symbol = CurrencyCode::new(name);
    }
}

impl Registry<Currency> {
    /// Ratio of `symbol` to the base currency; unknown symbols and
    /// non-positive ratios count as 1.
    pub fn ratio(&self, symbol: &CurrencyCode) -> Decimal {
        self.find(symbol.as_str())
            .map(|c| c.ratio)
            .filter(|r| *r > Decimal::ZERO)
            .unwrap_or(Decimal::ONE)
    }
}

impl CurrencyConverter for Registry<Currency> {
    fn convert(&self, amount: Decimal, from: &CurrencyCode, to: &CurrencyCode) -> Decimal {
        if from == to {
            return amount;
        }
        convert_by_ratio(amount, self.ratio(from), self.ratio(to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::ChangeHub;
    use rust_decimal_macros::dec;

    #[test]
    fn test_registry_converts_by_ratio() {
        let mut hub = ChangeHub::new();
        let mut currencies = Registry::new();
        currencies.add(Currency::new("CAD", "Canadian dollar", dec!(0.80)), &mut hub).unwrap();

        let usd = CurrencyCode::new("USD");
        let cad = CurrencyCode::new("CAD");
        assert_eq!(currencies.convert(dec!(100), &cad, &usd), dec!(80));
        assert_eq!(currencies.convert(dec!(80), &usd, &cad), dec!(100));
    }

    #[test]
    fn test_unknown_symbol_ratio_one() {
        let currencies: Registry<Currency> = Registry::new();
        let amount = currencies.convert(dec!(12.34), &CurrencyCode::new("ZZZ"), &CurrencyCode::new("USD"));
        assert_eq!(amount, dec!(12.34));
    }
}
