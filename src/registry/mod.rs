//! Id- and name-indexed entity registries.

pub mod account;
pub mod alias;
pub mod category;
pub mod currency;
pub mod online_account;
pub mod payee;
pub mod security;

use crate::core::error::{LedgerError, Result};
use crate::core::events::{ChangeEvent, ChangeHub, ChangeType, EntityKind, NodeId};
use crate::core::ids::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Persistence lifecycle of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EntityState {
    /// Created since the last save; never persisted.
    #[default]
    Inserted,
    /// Persisted and untouched since.
    Unchanged,
    /// Persisted and edited since.
    Changed,
    /// Tombstoned, waiting for [`Registry::remove_deleted`].
    Deleted,
}

impl EntityState {
    /// The state after an edit.
    pub fn touched(self) -> Self {
        match self {
            EntityState::Unchanged => EntityState::Changed,
            other => other,
        }
    }
}

/// Something a [`Registry`] can own.
pub trait Entity {
    type Id: EntityId;
    const KIND: EntityKind;

    fn id(&self) -> Self::Id;
    fn set_id(&mut self, id: Self::Id);
    fn state(&self) -> EntityState;
    fn set_state(&mut self, state: EntityState);

    /// Key in the name index, if this kind is name-indexed.
    fn name(&self) -> Option<&str> {
        None
    }

    fn set_name(&mut self, _name: String) {}

    fn is_deleted(&self) -> bool {
        self.state() == EntityState::Deleted
    }

    fn node(&self) -> NodeId {
        NodeId::Entity(Self::KIND, self.id().raw())
    }
}

/// Implements the lifecycle half of [`Entity`] for a struct with `id`
/// and `state` fields.
macro_rules! entity_lifecycle {
    ($id:ty, $kind:expr) => {
        type Id = $id;
        const KIND: $crate::core::events::EntityKind = $kind;

        fn id(&self) -> $id {
            self.id
        }

        fn set_id(&mut self, id: $id) {
            self.id = id;
        }

        fn state(&self) -> $crate::registry::EntityState {
            self.state
        }

        fn set_state(&mut self, state: $crate::registry::EntityState) {
            self.state = state;
        }
    };
}
pub(crate) use entity_lifecycle;

/// An id-indexed map with an optional unique name index.
///
/// Ids are allocated monotonically. Removing a persisted entity only
/// tombstones it (it stays reachable through [`get`](Self::get) so that
/// observers of the current batch can still inspect it) and drops it from
/// the name index; [`remove_deleted`](Self::remove_deleted) discards it.
#[derive(Debug, Clone)]
pub struct Registry<T: Entity> {
    items: BTreeMap<T::Id, T>,
    names: HashMap<String, T::Id>,
    next_id: i64,
}

impl<T: Entity> Default for Registry<T> {
    fn default() -> Self {
        Self {
            items: BTreeMap::new(),
            names: HashMap::new(),
            next_id: 0,
        }
    }
}

impl<T: Entity> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `entity`, allocating an id if it has none.
    ///
    /// An entity that already carries an id keeps it and the allocator
    /// moves past it. Raises `Inserted`.
    pub fn add(&mut self, entity: T, hub: &mut ChangeHub) -> Result<T::Id> {
        let id = self.insert(entity, EntityState::Inserted)?;
        hub.raise(ChangeEvent::new(NodeId::Entity(T::KIND, id.raw()), ChangeType::Inserted));
        log::debug!("inserted {} {}", T::KIND, id);
        Ok(id)
    }

    /// Insert an entity read back from storage: id is honoured, state is
    /// `Unchanged`, no event is raised.
    pub fn insert_loaded(&mut self, entity: T) -> Result<T::Id> {
        self.insert(entity, EntityState::Unchanged)
    }

    fn insert(&mut self, mut entity: T, state: EntityState) -> Result<T::Id> {
        let id = if entity.id().is_assigned() {
            let id = entity.id();
            if self.items.contains_key(&id) {
                return Err(LedgerError::DuplicateKey {
                    kind: T::KIND,
                    key: id.to_string(),
                });
            }
            id
        } else {
            T::Id::from_raw(self.next_id)
        };
        if let Some(name) = entity.name() {
            if self.names.contains_key(name) {
                return Err(LedgerError::DuplicateKey {
                    kind: T::KIND,
                    key: name.to_string(),
                });
            }
            self.names.insert(name.to_string(), id);
        }
        self.next_id = self.next_id.max(id.raw() + 1);
        entity.set_id(id);
        entity.set_state(state);
        self.items.insert(id, entity);
        Ok(id)
    }

    /// Look up by id. Tombstoned entities are still returned.
    pub fn get(&self, id: T::Id) -> Option<&T> {
        self.items.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: T::Id) -> Option<&mut T> {
        self.items.get_mut(&id)
    }

    /// Look up a live entity, failing with `NotFound` otherwise.
    pub fn live(&self, id: T::Id) -> Result<&T> {
        self.items
            .get(&id)
            .filter(|e| !e.is_deleted())
            .ok_or_else(|| LedgerError::not_found(T::KIND, id))
    }

    pub(crate) fn live_mut(&mut self, id: T::Id) -> Result<&mut T> {
        self.items
            .get_mut(&id)
            .filter(|e| !e.is_deleted())
            .ok_or_else(|| LedgerError::not_found(T::KIND, id))
    }

    /// Look up a live entity by name.
    pub fn find(&self, name: &str) -> Option<&T> {
        self.names.get(name).and_then(|id| self.items.get(id))
    }

    pub fn find_id(&self, name: &str) -> Option<T::Id> {
        self.names.get(name).copied()
    }

    pub fn contains(&self, id: T::Id) -> bool {
        self.items.get(&id).is_some_and(|e| !e.is_deleted())
    }

    /// Swap the name index entry and the entity's name together.
    pub fn rename(&mut self, id: T::Id, new_name: &str, hub: &mut ChangeHub) -> Result<()> {
        let old = match self.live(id)?.name() {
            Some(old) if old == new_name => return Ok(()),
            old => old.map(str::to_string),
        };
        if self.names.contains_key(new_name) {
            return Err(LedgerError::DuplicateKey {
                kind: T::KIND,
                key: new_name.to_string(),
            });
        }
        if let Some(old) = &old {
            self.names.remove(old);
        }
        self.names.insert(new_name.to_string(), id);
        let entity = self.live_mut(id)?;
        entity.set_name(new_name.to_string());
        entity.set_state(entity.state().touched());
        hub.raise_field(NodeId::Entity(T::KIND, id.raw()), "name");
        Ok(())
    }

    /// Remove `id`. Never-persisted entities are dropped outright, others are
    /// tombstoned. Returns false if there was nothing live to remove.
    pub fn remove(&mut self, id: T::Id, hub: &mut ChangeHub) -> bool {
        let Some((state, name)) = self
            .items
            .get(&id)
            .map(|e| (e.state(), e.name().map(str::to_string)))
        else {
            return false;
        };
        if state == EntityState::Deleted {
            return false;
        }
        self.reindex_name(id, name.as_deref(), None);
        if state == EntityState::Inserted {
            self.items.remove(&id);
        } else if let Some(entity) = self.items.get_mut(&id) {
            entity.set_state(EntityState::Deleted);
        }
        hub.raise(ChangeEvent::new(NodeId::Entity(T::KIND, id.raw()), ChangeType::Deleted));
        log::debug!("removed {} {}", T::KIND, id);
        true
    }

    /// Record an edit of `field` on `id`.
    pub(crate) fn touch(&mut self, id: T::Id, field: &'static str, hub: &mut ChangeHub) {
        if let Some(entity) = self.items.get_mut(&id) {
            entity.set_state(entity.state().touched());
        }
        hub.raise_field(NodeId::Entity(T::KIND, id.raw()), field);
    }

    /// Physically discard tombstones. Returns how many were dropped.
    pub fn remove_deleted(&mut self) -> usize {
        let before = self.items.len();
        self.items.retain(|_, e| !e.is_deleted());
        before - self.items.len()
    }

    /// Mark every live entity as persisted.
    pub fn accept_changes(&mut self) {
        for entity in self.items.values_mut() {
            if !entity.is_deleted() {
                entity.set_state(EntityState::Unchanged);
            }
        }
    }

    /// A registry holding `items` as loaded from storage.
    pub fn from_loaded(items: Vec<T>) -> Result<Self> {
        let mut fresh = Registry::new();
        for item in items {
            fresh.insert_loaded(item)?;
        }
        Ok(fresh)
    }

    /// Replace the whole contents with `items` and raise `Reloaded` on the
    /// container. On error the registry is left as it was.
    pub fn reload(&mut self, items: Vec<T>, hub: &mut ChangeHub) -> Result<()> {
        let fresh = Self::from_loaded(items)?;
        self.replace(fresh, hub);
        Ok(())
    }

    pub(crate) fn replace(&mut self, fresh: Self, hub: &mut ChangeHub) {
        *self = fresh;
        hub.raise(ChangeEvent::new(NodeId::Container(T::KIND), ChangeType::Reloaded));
        log::debug!("reloaded {} registry with {} entities", T::KIND, self.items.len());
    }

    /// Live entities in id order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.values().filter(|e| !e.is_deleted())
    }

    /// Every entity including tombstones.
    pub fn iter_all(&self) -> impl Iterator<Item = &T> {
        self.items.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.values_mut().filter(|e| !e.is_deleted())
    }

    pub fn ids(&self) -> Vec<T::Id> {
        self.iter().map(|e| e.id()).collect()
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn reindex_name(&mut self, id: T::Id, old: Option<&str>, new: Option<&str>) {
        if let Some(old) = old {
            if self.names.get(old) == Some(&id) {
                self.names.remove(old);
            }
        }
        if let Some(new) = new {
            self.names.insert(new.to_string(), id);
        }
    }
}
