//! Category hierarchy.
//!
//! Categories form a forest. A category's `name` is its full path, the
//! labels of its ancestors and itself joined with `:`, and that path is the
//! key in the registry's name index. Balances propagate by delta: changing a
//! category's balance adds the same delta to every ancestor.

use crate::core::error::{LedgerError, Result};
use crate::core::events::{ChangeHub, EntityKind, NodeId};
use crate::core::ids::{CategoryId, EntityId};
use crate::registry::{entity_lifecycle, Entity, EntityState, Registry};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const SEPARATOR: char = ':';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CategoryType {
    #[default]
    None,
    Income,
    Expense,
    Savings,
    Reserved,
    Transfer,
    Investments,
    RecurringExpense,
}

/// Categories the ledger itself assigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReservedCategory {
    Split,
    Unknown,
    TransferToDeletedAccount,
    TransferFromDeletedAccount,
    UnassignedSplit,
}

impl ReservedCategory {
    pub fn name(self) -> &'static str {
        match self {
            ReservedCategory::Split => "Split",
            ReservedCategory::Unknown => "Unknown",
            ReservedCategory::TransferToDeletedAccount => "Xfer to Deleted Account",
            ReservedCategory::TransferFromDeletedAccount => "Xfer from Deleted Account",
            ReservedCategory::UnassignedSplit => "Unassigned Split",
        }
    }

    pub fn category_type(self) -> CategoryType {
        match self {
            ReservedCategory::TransferToDeletedAccount
            | ReservedCategory::TransferFromDeletedAccount => CategoryType::Transfer,
            _ => CategoryType::Reserved,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    id: CategoryId,
    /// Full path, rebuilt from the parent chain.
    name: String,
    label: String,
    parent: Option<CategoryId>,
    #[serde(skip)]
    children: BTreeSet<CategoryId>,
    pub category_type: CategoryType,
    /// Optional budgeted amount per period.
    pub budget: Option<Decimal>,
    #[serde(skip)]
    balance: Decimal,
    #[serde(skip)]
    state: EntityState,
}

impl Category {
    /// A root category. Use [`Registry::get_or_create`] to build nested paths.
    pub fn new(label: impl Into<String>, category_type: CategoryType) -> Self {
        let label = label.into();
        Self {
            id: CategoryId::UNASSIGNED,
            name: label.clone(),
            label,
            parent: None,
            children: BTreeSet::new(),
            category_type,
            budget: None,
            balance: Decimal::ZERO,
            state: EntityState::Inserted,
        }
    }

    pub fn full_name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn parent(&self) -> Option<CategoryId> {
        self.parent
    }

    pub fn children(&self) -> &BTreeSet<CategoryId> {
        &self.children
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }
}

impl Entity for Category {
    entity_lifecycle!(CategoryId, EntityKind::Category);

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}

/// Reject paths that cannot be stored as a category name.
pub fn validate_path(path: &str) -> Result<()> {
    let bad = || LedgerError::UnresolvedCategoryName {
        name: path.to_string(),
    };
    if path.is_empty() || path.contains(['[', ']', '\t', '\n', '\r']) {
        return Err(bad());
    }
    for segment in path.split(SEPARATOR) {
        if segment.is_empty() || segment.trim() != segment {
            return Err(bad());
        }
    }
    Ok(())
}

fn join(parent: &str, label: &str) -> String {
    format!("{}{}{}", parent, SEPARATOR, label)
}

impl Registry<Category> {
    /// Find `path`, creating it and any missing ancestors.
    pub fn get_or_create(
        &mut self,
        path: &str,
        category_type: CategoryType,
        hub: &mut ChangeHub,
    ) -> Result<CategoryId> {
        validate_path(path)?;
        if let Some(id) = self.find_id(path) {
            return Ok(id);
        }
        let (parent, label) = match path.rsplit_once(SEPARATOR) {
            Some((prefix, label)) => (Some(self.get_or_create(prefix, category_type, hub)?), label),
            None => (None, path),
        };
        let mut category = Category::new(label, category_type);
        if let Some(parent) = parent {
            category.parent = Some(parent);
            category.name = join(self.live(parent)?.full_name(), label);
        }
        let id = self.add(category, hub)?;
        if let Some(parent) = parent {
            if let Some(p) = self.get_mut(parent) {
                p.children.insert(id);
            }
        }
        Ok(id)
    }

    /// Add a root-or-child category built by the caller, naming it after its
    /// parent chain.
    pub fn add_child(
        &mut self,
        mut category: Category,
        parent: Option<CategoryId>,
        hub: &mut ChangeHub,
    ) -> Result<CategoryId> {
        validate_path(&category.label)?;
        if category.label.contains(SEPARATOR) {
            return Err(LedgerError::UnresolvedCategoryName {
                name: category.label.clone(),
            });
        }
        category.parent = parent;
        category.name = match parent {
            Some(p) => join(self.live(p)?.full_name(), &category.label),
            None => category.label.clone(),
        };
        let id = self.add(category, hub)?;
        if let Some(p) = parent.and_then(|p| self.get_mut(p)) {
            p.children.insert(id);
        }
        Ok(id)
    }

    /// `id` and every live category under it, parents before children.
    pub fn subtree(&self, id: CategoryId) -> Vec<CategoryId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let Some(category) = self.get(next).filter(|c| !c.is_deleted()) else {
                continue;
            };
            out.push(next);
            stack.extend(category.children.iter().rev().copied());
        }
        out
    }

    /// True if `id` is `ancestor` or lies beneath it.
    pub fn is_within(&self, id: CategoryId, ancestor: CategoryId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.get(current).and_then(|c| c.parent);
        }
        false
    }

    pub fn roots(&self) -> Vec<CategoryId> {
        self.iter().filter(|c| c.parent.is_none()).map(|c| c.id()).collect()
    }

    /// Re-home `id` under `parent` (or make it a root), renaming the subtree.
    pub fn move_to(
        &mut self,
        id: CategoryId,
        parent: Option<CategoryId>,
        hub: &mut ChangeHub,
    ) -> Result<()> {
        let current = self.live(id)?;
        if current.parent == parent {
            return Ok(());
        }
        let label = current.label.clone();
        let new_name = match parent {
            Some(p) => {
                if self.is_within(p, id) {
                    return Err(LedgerError::UnresolvedCategoryName {
                        name: join(self.live(p)?.full_name(), &label),
                    });
                }
                join(self.live(p)?.full_name(), &label)
            }
            None => label,
        };
        self.check_subtree_rename(id, &new_name)?;

        let (old_parent, balance) = match self.get(id) {
            Some(category) => (category.parent, category.balance),
            None => return Ok(()),
        };
        // The subtree's balance leaves the old ancestor chain and joins the new one.
        if let Some(old) = old_parent {
            self.add_balance(old, -balance, hub);
        }
        if let Some(old) = old_parent.and_then(|p| self.get_mut(p)) {
            old.children.remove(&id);
        }
        if let Some(new) = parent.and_then(|p| self.get_mut(p)) {
            new.children.insert(id);
        }
        if let Some(category) = self.get_mut(id) {
            category.parent = parent;
        }
        if let Some(new) = parent {
            self.add_balance(new, balance, hub);
        }
        self.touch(id, "parent", hub);
        self.rename_subtree(id, hub);
        Ok(())
    }

    /// Change the local label of `id`, renaming its subtree.
    pub fn relabel(&mut self, id: CategoryId, label: &str, hub: &mut ChangeHub) -> Result<()> {
        validate_path(label)?;
        if label.contains(SEPARATOR) {
            return Err(LedgerError::UnresolvedCategoryName {
                name: label.to_string(),
            });
        }
        let parent = self.live(id)?.parent;
        let new_name = match parent {
            Some(p) => join(self.live(p)?.full_name(), label),
            None => label.to_string(),
        };
        self.check_subtree_rename(id, &new_name)?;
        if let Some(category) = self.get_mut(id) {
            category.label = label.to_string();
        }
        self.rename_subtree(id, hub);
        Ok(())
    }

    /// Fail if renaming `id` to `new_name` would collide with a live
    /// category outside the subtree being renamed.
    fn check_subtree_rename(&self, id: CategoryId, new_name: &str) -> Result<()> {
        let Some(old_name) = self.get(id).map(|c| c.name.clone()) else {
            return Ok(());
        };
        for member in self.subtree(id) {
            let Some(member_name) = self.get(member).map(|c| c.name.as_str()) else {
                continue;
            };
            let renamed = format!("{}{}", new_name, &member_name[old_name.len()..]);
            if let Some(existing) = self.find_id(&renamed) {
                if !self.is_within(existing, id) {
                    return Err(LedgerError::DuplicateKey {
                        kind: EntityKind::Category,
                        key: renamed,
                    });
                }
            }
        }
        Ok(())
    }

    /// Recompute full names under `id` from the parent chain and re-index.
    fn rename_subtree(&mut self, id: CategoryId, hub: &mut ChangeHub) {
        for member in self.subtree(id) {
            let Some(category) = self.get(member) else { continue };
            let old = category.name.clone();
            let new = match category.parent.and_then(|p| self.get(p)) {
                Some(parent) => join(&parent.name, &category.label),
                None => category.label.clone(),
            };
            if old == new {
                continue;
            }
            self.reindex_name(member, Some(&old), Some(&new));
            if let Some(category) = self.get_mut(member) {
                category.name = new;
            }
            self.touch(member, "name", hub);
        }
    }

    /// Tombstone `id` and its whole subtree, children first. Returns the
    /// removed ids.
    pub fn remove_subtree(&mut self, id: CategoryId, hub: &mut ChangeHub) -> Vec<CategoryId> {
        let members = self.subtree(id);
        if let Some(parent) = self.get(id).and_then(|c| c.parent) {
            if let Some(p) = self.get_mut(parent) {
                p.children.remove(&id);
            }
        }
        for member in members.iter().rev() {
            self.remove(*member, hub);
        }
        members
    }

    /// Set `id`'s balance and push the delta up the ancestor chain.
    pub fn set_balance(&mut self, id: CategoryId, value: Decimal, hub: &mut ChangeHub) {
        let Some(current) = self.get(id).map(|c| c.balance) else {
            return;
        };
        self.add_balance(id, value - current, hub);
    }

    /// Add `delta` to `id` and to every ancestor.
    pub fn add_balance(&mut self, id: CategoryId, delta: Decimal, hub: &mut ChangeHub) {
        if delta.is_zero() {
            return;
        }
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(category) = self.get_mut(current) else { break };
            category.balance += delta;
            cursor = category.parent;
            hub.raise_field(NodeId::Entity(EntityKind::Category, current.raw()), "balance");
        }
    }

    /// Zero every balance without propagating.
    pub(crate) fn clear_balances(&mut self) {
        for category in self.iter_mut() {
            category.balance = Decimal::ZERO;
        }
    }

    /// Rebuild child sets and full names from the stored parent ids. Parents
    /// that do not exist are dropped (the category becomes a root).
    pub(crate) fn rebuild_tree(&mut self) -> usize {
        let ids = self.ids();
        let mut orphaned = 0;
        for id in &ids {
            let parent = self.get(*id).and_then(|c| c.parent);
            if let Some(category) = self.get_mut(*id) {
                category.children.clear();
                if parent.is_some_and(|p| !ids.contains(&p)) {
                    category.parent = None;
                    orphaned += 1;
                }
            }
        }
        for id in &ids {
            if let Some(parent) = self.get(*id).and_then(|c| c.parent) {
                if let Some(p) = self.get_mut(parent) {
                    p.children.insert(*id);
                }
            }
        }
        let mut quiet = ChangeHub::new();
        for root in self.roots() {
            self.rename_subtree(root, &mut quiet);
        }
        orphaned
    }
}
