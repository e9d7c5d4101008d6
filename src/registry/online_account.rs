use crate::core::events::EntityKind;
use crate::core::ids::OnlineAccountId;
use crate::registry::{entity_lifecycle, Entity, EntityState};
use serde::{Deserialize, Serialize};

/// Connection details for a bank that accounts download from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnlineAccount {
    id: OnlineAccountId,
    name: String,
    pub institution: String,
    pub url: Option<String>,
    #[serde(skip)]
    state: EntityState,
}

impl OnlineAccount {
    pub fn new(name: impl Into<String>, institution: impl Into<String>) -> Self {
        Self {
            id: OnlineAccountId::UNASSIGNED,
            name: name.into(),
            institution: institution.into(),
            url: None,
            state: EntityState::Inserted,
        }
    }

    pub fn display_name(&self) -> &str {
        &self.name
    }
}

impl Entity for OnlineAccount {
    entity_lifecycle!(OnlineAccountId, EntityKind::OnlineAccount);

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}
