//! Pending-change bookkeeping.
//!
//! A [`ChangeTracker`] listens at the ledger root and keeps, per entity
//! kind, the set of nodes inserted, changed and deleted since the last
//! [`ChangeTracker::clear`]. An insert followed by a delete cancels out, and
//! an edit to an inserted or deleted node is already covered by that entry.

use crate::core::events::{ChangeBatch, ChangeEvent, ChangeType, EntityKind, NodeId, SubscriptionId};
use crate::ledger::book::Ledger;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeList {
    pub inserted: HashSet<NodeId>,
    pub changed: HashSet<NodeId>,
    pub deleted: HashSet<NodeId>,
}

impl ChangeList {
    fn record(&mut self, node: NodeId, change: ChangeType) {
        match change {
            ChangeType::Changed => {
                if !self.inserted.contains(&node) && !self.deleted.contains(&node) {
                    self.changed.insert(node);
                }
            }
            ChangeType::Inserted => {
                self.deleted.remove(&node);
                self.changed.remove(&node);
                self.inserted.insert(node);
            }
            ChangeType::Deleted => {
                self.changed.remove(&node);
                if !self.inserted.remove(&node) {
                    self.deleted.insert(node);
                }
            }
            ChangeType::Reloaded => {}
        }
    }

    pub fn len(&self) -> usize {
        self.inserted.len() + self.changed.len() + self.deleted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
pub struct ChangeTracker {
    changes: BTreeMap<EntityKind, ChangeList>,
    dirty: bool,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a fresh tracker at the ledger root. The returned handle is
    /// shared with the subscription; hold on to the id to detach it again.
    pub fn attach(ledger: &mut Ledger) -> (Arc<Mutex<ChangeTracker>>, SubscriptionId) {
        let tracker = Arc::new(Mutex::new(ChangeTracker::new()));
        let sink = Arc::clone(&tracker);
        let id = ledger.subscribe_changed(
            NodeId::Ledger,
            Box::new(move |batch: &ChangeBatch| {
                if let Ok(mut tracker) = sink.lock() {
                    tracker.observe(batch);
                }
            }),
        );
        (tracker, id)
    }

    /// Fold every event of `batch` into the pending sets.
    pub fn observe(&mut self, batch: &ChangeBatch) {
        for event in batch.iter() {
            self.record(event);
        }
    }

    fn record(&mut self, event: &ChangeEvent) {
        // Scope-level notifications carry no entity.
        let kind = match event.node {
            NodeId::Entity(kind, _) => kind,
            NodeId::Split(..) => EntityKind::Split,
            NodeId::Ledger | NodeId::Container(_) => return,
        };
        if event.change == ChangeType::Reloaded {
            return;
        }
        self.changes.entry(kind).or_default().record(event.node, event.change);
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Total pending entries across every kind.
    pub fn change_count(&self) -> usize {
        self.changes.values().map(ChangeList::len).sum()
    }

    pub fn changes(&self, kind: EntityKind) -> Option<&ChangeList> {
        self.changes.get(&kind)
    }

    /// Kinds with at least one pending entry, in a stable order.
    pub fn kinds(&self) -> impl Iterator<Item = EntityKind> + '_ {
        self.changes
            .iter()
            .filter(|(_, list)| !list.is_empty())
            .map(|(kind, _)| *kind)
    }

    pub fn clear(&mut self) {
        self.changes.clear();
        self.dirty = false;
    }
}
