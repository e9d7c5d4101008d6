//! Change notification and batched update scopes.
//!
//! Every entity and container in the ledger is a node in a fixed tracking
//! tree (`Entity -> Container -> Ledger`, splits hang under their
//! transaction). A change raised on a node is queued on the nearest ancestor
//! that has an open update scope, or delivered straight away when no
//! ancestor is batching.
//!
//! Delivery is deliberately asymmetric. Coarse `changed` observers are called
//! once per delivered batch and are handed the batch; its head is the first
//! queued event. Field observers are called once for every queued event that
//! names a field.

use crate::core::ids::{AccountId, CategoryId, EntityId, SplitId, TransactionId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The kinds of entity the ledger tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Account,
    Payee,
    Category,
    Security,
    Currency,
    Alias,
    OnlineAccount,
    Transaction,
    Split,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Account => "account",
            EntityKind::Payee => "payee",
            EntityKind::Category => "category",
            EntityKind::Security => "security",
            EntityKind::Currency => "currency",
            EntityKind::Alias => "alias",
            EntityKind::OnlineAccount => "online account",
            EntityKind::Transaction => "transaction",
            EntityKind::Split => "split",
        };
        f.write_str(name)
    }
}

/// Address of a node in the tracking tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeId {
    Ledger,
    Container(EntityKind),
    Entity(EntityKind, i64),
    /// (transaction id, split id)
    Split(i64, i64),
}

impl NodeId {
    pub fn account(id: AccountId) -> Self {
        NodeId::Entity(EntityKind::Account, id.raw())
    }

    pub fn category(id: CategoryId) -> Self {
        NodeId::Entity(EntityKind::Category, id.raw())
    }

    pub fn transaction(id: TransactionId) -> Self {
        NodeId::Entity(EntityKind::Transaction, id.raw())
    }

    pub fn split(transaction: TransactionId, split: SplitId) -> Self {
        NodeId::Split(transaction.raw(), split.raw())
    }

    pub fn parent(self) -> Option<NodeId> {
        match self {
            NodeId::Ledger => None,
            NodeId::Container(_) => Some(NodeId::Ledger),
            NodeId::Entity(kind, _) => Some(NodeId::Container(kind)),
            NodeId::Split(transaction, _) => {
                Some(NodeId::Entity(EntityKind::Transaction, transaction))
            }
        }
    }

    /// This node followed by each of its ancestors, ending at the ledger.
    pub fn ancestry(self) -> impl Iterator<Item = NodeId> {
        std::iter::successors(Some(self), |n| n.parent())
    }

    /// True if `self` is `other` or one of `other`'s ancestors.
    pub fn contains(self, other: NodeId) -> bool {
        other.ancestry().any(|n| n == self)
    }

    pub fn kind(self) -> Option<EntityKind> {
        match self {
            NodeId::Ledger => None,
            NodeId::Container(kind) | NodeId::Entity(kind, _) => Some(kind),
            NodeId::Split(..) => Some(EntityKind::Split),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeType {
    Changed,
    Inserted,
    Deleted,
    Reloaded,
}

/// A single queued or delivered change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub node: NodeId,
    pub change: ChangeType,
    /// Name of the field that changed, if the change was a field edit.
    pub field: Option<&'static str>,
}

impl ChangeEvent {
    pub fn new(node: NodeId, change: ChangeType) -> Self {
        Self {
            node,
            change,
            field: None,
        }
    }

    pub fn field(node: NodeId, field: &'static str) -> Self {
        Self {
            node,
            change: ChangeType::Changed,
            field: Some(field),
        }
    }
}

/// The unit handed to coarse observers.
///
/// Never empty: a scope that closes with nothing queued delivers a
/// synthetic `Changed` event for the scope's own node.
#[derive(Debug, Clone)]
pub struct ChangeBatch {
    events: Vec<ChangeEvent>,
}

impl ChangeBatch {
    fn new(events: Vec<ChangeEvent>) -> Self {
        debug_assert!(!events.is_empty());
        Self { events }
    }

    /// The first event queued in the batch.
    pub fn head(&self) -> &ChangeEvent {
        &self.events[0]
    }

    /// All queued events, head first.
    pub fn iter(&self) -> impl Iterator<Item = &ChangeEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

pub type ChangedHandler = Box<dyn FnMut(&ChangeBatch) + Send>;
pub type FieldHandler = Box<dyn FnMut(&ChangeEvent, &'static str) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Default)]
struct UpdateScope {
    depth: usize,
    queue: Vec<ChangeEvent>,
}

/// Owns every open update scope and every observer.
#[derive(Default)]
pub struct ChangeHub {
    scopes: HashMap<NodeId, UpdateScope>,
    changed: Vec<(SubscriptionId, NodeId, ChangedHandler)>,
    fields: Vec<(SubscriptionId, NodeId, FieldHandler)>,
    next_subscription: u64,
}

impl fmt::Debug for ChangeHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeHub")
            .field("open_scopes", &self.scopes.len())
            .field("changed_observers", &self.changed.len())
            .field("field_observers", &self.fields.len())
            .finish()
    }
}

impl ChangeHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe_changed(&mut self, node: NodeId, handler: ChangedHandler) -> SubscriptionId {
        let id = self.next_id();
        self.changed.push((id, node, handler));
        id
    }

    pub fn subscribe_field(&mut self, node: NodeId, handler: FieldHandler) -> SubscriptionId {
        let id = self.next_id();
        self.fields.push((id, node, handler));
        id
    }

    /// Returns false if the subscription was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.changed.len() + self.fields.len();
        self.changed.retain(|(sub, _, _)| *sub != id);
        self.fields.retain(|(sub, _, _)| *sub != id);
        before != self.changed.len() + self.fields.len()
    }

    fn next_id(&mut self) -> SubscriptionId {
        self.next_subscription += 1;
        SubscriptionId(self.next_subscription)
    }

    /// Open (or nest) an update scope on `node`.
    pub fn begin_update(&mut self, node: NodeId) {
        self.scopes.entry(node).or_default().depth += 1;
    }

    /// Close one level of `node`'s update scope, delivering or forwarding
    /// the queued batch when the outermost level closes.
    ///
    /// # Panics
    ///
    /// Panics if `node` has no open scope.
    pub fn end_update(&mut self, node: NodeId) {
        let depth = match self.scopes.get_mut(&node) {
            Some(scope) => {
                scope.depth -= 1;
                scope.depth
            }
            None => panic!("end_update called on {:?} without a matching begin_update", node),
        };
        if depth > 0 {
            return;
        }
        let mut events = self
            .scopes
            .remove(&node)
            .map(|scope| scope.queue)
            .unwrap_or_default();
        if events.is_empty() {
            events.push(ChangeEvent::new(node, ChangeType::Changed));
        }

        if let Some(batcher) = node.parent().and_then(|p| self.batching_ancestor(p)) {
            if let Some(scope) = self.scopes.get_mut(&batcher) {
                scope.queue.extend(events);
            }
            return;
        }
        self.deliver(node, ChangeBatch::new(events));
    }

    /// Current nesting depth of `node`'s own scope.
    pub fn depth(&self, node: NodeId) -> usize {
        self.scopes.get(&node).map_or(0, |s| s.depth)
    }

    pub fn is_batching(&self, node: NodeId) -> bool {
        self.depth(node) > 0
    }

    /// True while any scope anywhere in the tree is open.
    pub fn any_batching(&self) -> bool {
        !self.scopes.is_empty()
    }

    /// Number of scopes currently open (distinct nodes).
    pub fn open_scopes(&self) -> usize {
        self.scopes.len()
    }

    /// Raise a change on `event.node`.
    pub fn raise(&mut self, event: ChangeEvent) {
        if let Some(batcher) = self.batching_ancestor(event.node) {
            if let Some(scope) = self.scopes.get_mut(&batcher) {
                scope.queue.push(event);
            }
            return;
        }
        let origin = event.node;
        self.deliver(origin, ChangeBatch::new(vec![event]));
    }

    pub fn raise_field(&mut self, node: NodeId, field: &'static str) {
        self.raise(ChangeEvent::field(node, field));
    }

    fn batching_ancestor(&self, node: NodeId) -> Option<NodeId> {
        if self.scopes.is_empty() {
            return None;
        }
        node.ancestry().find(|n| self.scopes.contains_key(n))
    }

    fn deliver(&mut self, origin: NodeId, batch: ChangeBatch) {
        for (_, node, handler) in self.changed.iter_mut() {
            if node.contains(origin) {
                handler(&batch);
            }
        }
        if self.fields.is_empty() {
            return;
        }
        for event in batch.iter() {
            let Some(field) = event.field else { continue };
            for (_, node, handler) in self.fields.iter_mut() {
                if node.contains(event.node) {
                    handler(event, field);
                }
            }
        }
    }
}
