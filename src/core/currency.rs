use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// ISO 4217-style currency symbol.
///
/// # Examples
///
/// ```
/// use money_ledger::core::currency::CurrencyCode;
///
/// let usd = CurrencyCode::new("USD");
/// let cad = CurrencyCode::new("CAD");
/// assert_ne!(usd, cad);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CurrencyCode {
    fn default() -> Self {
        Self::new("USD")
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CurrencyCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Converts amounts between currencies.
///
/// Implementations must treat an unknown symbol as the base currency,
/// i.e. with a ratio of 1, rather than failing.
pub trait CurrencyConverter {
    fn convert(&self, amount: Decimal, from: &CurrencyCode, to: &CurrencyCode) -> Decimal;
}

/// Ratio table: each symbol maps to the value of one unit in the base currency.
///
/// # Examples
///
/// ```
/// use money_ledger::core::currency::{CurrencyCode, CurrencyConverter, RateTable};
/// use rust_decimal_macros::dec;
///
/// let mut rates = RateTable::new(CurrencyCode::new("USD"));
/// rates.set_ratio(CurrencyCode::new("CAD"), dec!(0.75));
///
/// let converted = rates.convert(
///     dec!(100),
///     &CurrencyCode::new("CAD"),
///     &CurrencyCode::new("USD"),
/// );
/// assert_eq!(converted, dec!(75));
/// ```
#[derive(Debug, Clone)]
pub struct RateTable {
    /// The base currency for normalization.
    pub base_currency: CurrencyCode,
    ratios: HashMap<CurrencyCode, Decimal>,
}

impl RateTable {
    pub fn new(base_currency: CurrencyCode) -> Self {
        Self {
            base_currency,
            ratios: HashMap::new(),
        }
    }

    /// Set the ratio of `currency` to the base. Non-positive ratios are
    /// ignored so that lookups fall back to 1.
    pub fn set_ratio(&mut self, currency: CurrencyCode, ratio: Decimal) {
        if ratio <= Decimal::ZERO {
            log::warn!("ignoring non-positive ratio {} for {}", ratio, currency);
            return;
        }
        self.ratios.insert(currency, ratio);
    }

    pub fn ratio(&self, currency: &CurrencyCode) -> Decimal {
        if *currency == self.base_currency {
            return Decimal::ONE;
        }
        self.ratios.get(currency).copied().unwrap_or(Decimal::ONE)
    }
}

impl CurrencyConverter for RateTable {
    fn convert(&self, amount: Decimal, from: &CurrencyCode, to: &CurrencyCode) -> Decimal {
        convert_by_ratio(amount, self.ratio(from), self.ratio(to))
    }
}

/// `amount` in a currency worth `from_ratio` base units, re-expressed in one
/// worth `to_ratio`, rounded to cents.
pub(crate) fn convert_by_ratio(amount: Decimal, from_ratio: Decimal, to_ratio: Decimal) -> Decimal {
    if from_ratio == to_ratio || to_ratio.is_zero() {
        return amount;
    }
    (amount * from_ratio / to_ratio).round_dp(2)
}
