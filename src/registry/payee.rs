use crate::core::events::EntityKind;
use crate::core::ids::PayeeId;
use crate::registry::{entity_lifecycle, Entity, EntityState};
use serde::{Deserialize, Serialize};

/// Someone money is paid to or received from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payee {
    id: PayeeId,
    name: String,
    #[serde(skip)]
    state: EntityState,
}

impl Payee {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: PayeeId::UNASSIGNED,
            name: name.into(),
            state: EntityState::Inserted,
        }
    }

    pub fn with_id(id: PayeeId, name: impl Into<String>) -> Self {
        Self {
            id,
            ..Self::new(name)
        }
    }

    pub fn display_name(&self) -> &str {
        &self.name
    }
}

impl Entity for Payee {
    entity_lifecycle!(PayeeId, EntityKind::Payee);

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}
