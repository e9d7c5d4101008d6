use crate::core::error::{LedgerError, Result};
use crate::core::events::EntityKind;
use crate::core::ids::{AliasId, PayeeId};
use crate::registry::{entity_lifecycle, Entity, EntityState};
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AliasType {
    #[default]
    Literal,
    Regex,
}

/// Maps a raw payee string (as banks spell it) onto a canonical payee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alias {
    id: AliasId,
    pattern: String,
    pub alias_type: AliasType,
    pub payee: PayeeId,
    #[serde(skip)]
    compiled: Option<Regex>,
    #[serde(skip)]
    state: EntityState,
}

impl Alias {
    pub fn literal(pattern: impl Into<String>, payee: PayeeId) -> Self {
        Self {
            id: AliasId::UNASSIGNED,
            pattern: pattern.into(),
            alias_type: AliasType::Literal,
            payee,
            compiled: None,
            state: EntityState::Inserted,
        }
    }

    pub fn regex(pattern: impl Into<String>, payee: PayeeId) -> Result<Self> {
        let mut alias = Self::literal(pattern, payee);
        alias.alias_type = AliasType::Regex;
        alias.compile()?;
        Ok(alias)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Compile a regex pattern. Literal aliases need no compilation.
    pub(crate) fn compile(&mut self) -> Result<()> {
        if self.alias_type != AliasType::Regex || self.compiled.is_some() {
            return Ok(());
        }
        let regex = Regex::new(&self.pattern).map_err(|e| LedgerError::InvalidAliasPattern {
            pattern: self.pattern.clone(),
            reason: e.to_string(),
        })?;
        self.compiled = Some(regex);
        Ok(())
    }

    /// Whether `text` is a spelling of this alias' payee.
    pub fn matches(&self, text: &str) -> bool {
        match self.alias_type {
            AliasType::Literal => self.pattern.eq_ignore_ascii_case(text),
            AliasType::Regex => self.compiled.as_ref().is_some_and(|r| r.is_match(text)),
        }
    }
}

impl PartialEq for Alias {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.pattern == other.pattern
            && self.alias_type == other.alias_type
            && self.payee == other.payee
    }
}

impl Entity for Alias {
    entity_lifecycle!(AliasId, EntityKind::Alias);

    fn name(&self) -> Option<&str> {
        Some(&self.pattern)
    }

    fn set_name(&mut self, name: String) {
        self.pattern = name;
        self.compiled = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_match_ignores_case() {
        let alias = Alias::literal("SAFEWAY #123", PayeeId::new(1));
        assert!(alias.matches("safeway #123"));
        assert!(!alias.matches("safeway #124"));
    }

    #[test]
    fn test_regex_match() {
        let alias = Alias::regex(r"^SAFEWAY\s+#\d+$", PayeeId::new(1)).unwrap();
        assert!(alias.matches("SAFEWAY #9"));
        assert!(!alias.matches("SAFEWAY"));
    }

    #[test]
    fn test_bad_regex_rejected() {
        let err = Alias::regex("(unclosed", PayeeId::new(1)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAliasPattern { .. }));
    }
}
