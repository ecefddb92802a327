//! Role hierarchy stored as an arena of nodes keyed by [`RoleId`].
//!
//! Each role stores only its parent key. Children are answered from an index
//! (parent key -> child keys) that the tree keeps in step with every write,
//! so `r ∈ children(a) ⟺ r.parent == a` holds by construction.
//!
//! # Invariants
//! - The graph is a forest: a role can not become its own ancestor.
//! - `(parent, name)` is unique for every role written through `insert`/`upsert`.
//! - Removing a role never removes its children; they become roots.

use std::collections::{BTreeSet, HashMap};

use accounts_core::{DomainError, DomainResult, Entity, RoleId};

use crate::role::{Role, RoleName};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleTree {
    roles: HashMap<RoleId, Role>,
    children: HashMap<RoleId, BTreeSet<RoleId>>,
}

impl RoleTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn contains(&self, id: &RoleId) -> bool {
        self.roles.contains_key(id)
    }

    pub fn get(&self, id: &RoleId) -> Option<&Role> {
        self.roles.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.roles.values()
    }

    /// Add a new role. Fails if the id is already present.
    pub fn insert(&mut self, role: Role) -> DomainResult<()> {
        if self.roles.contains_key(role.id()) {
            return Err(DomainError::conflict(format!("role {} already exists", role.id())));
        }
        self.upsert(role)
    }

    /// Insert or replace a role after checking its placement.
    pub fn upsert(&mut self, role: Role) -> DomainResult<()> {
        self.check_placement(&role)?;

        let id = *role.id();
        let previous_parent = self.roles.get(&id).and_then(Role::parent);
        if previous_parent != role.parent() {
            self.unlink(id, previous_parent);
            if let Some(parent) = role.parent() {
                self.children.entry(parent).or_default().insert(id);
            }
        }
        self.roles.insert(id, role);
        Ok(())
    }

    /// Re-parent a role (or make it a root with `None`).
    pub fn set_parent(&mut self, id: RoleId, parent: Option<RoleId>) -> DomainResult<()> {
        let mut role = self
            .roles
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(Role::KIND, id))?;
        role.set_parent(parent);
        self.upsert(role)
    }

    /// Attach `child` under `parent`; a no-op when it is already there.
    pub fn add_child(&mut self, parent: RoleId, child: RoleId) -> DomainResult<()> {
        if !self.roles.contains_key(&parent) {
            return Err(DomainError::not_found(Role::KIND, parent));
        }
        if self.child_ids(&parent).contains(&child) {
            return Ok(());
        }
        self.set_parent(child, Some(parent))
    }

    /// Replace the full set of children of `parent`.
    ///
    /// Roles no longer listed become roots. All-or-nothing: on error the tree is
    /// left untouched.
    pub fn set_children(
        &mut self,
        parent: RoleId,
        children: impl IntoIterator<Item = RoleId>,
    ) -> DomainResult<()> {
        if !self.roles.contains_key(&parent) {
            return Err(DomainError::not_found(Role::KIND, parent));
        }

        let wanted: BTreeSet<RoleId> = children.into_iter().collect();
        let mut next = self.clone();

        for dropped in self.child_ids(&parent) {
            if !wanted.contains(&dropped) {
                next.set_parent(dropped, None)?;
            }
        }
        for child in &wanted {
            next.add_child(parent, *child)?;
        }

        *self = next;
        Ok(())
    }

    /// Remove a role, detaching (not deleting) its children.
    ///
    /// Detached children may share a name with an existing root role.
    pub fn remove(&mut self, id: &RoleId) -> Option<Role> {
        let role = self.roles.remove(id)?;
        self.unlink(*id, role.parent());

        for child in self.children.remove(id).unwrap_or_default() {
            if let Some(child) = self.roles.get_mut(&child) {
                child.set_parent(None);
            }
        }
        tracing::debug!(role = %role.name(), "role removed; children detached");
        Some(role)
    }

    pub fn parent(&self, id: &RoleId) -> Option<&Role> {
        self.roles.get(id)?.parent().and_then(|p| self.roles.get(&p))
    }

    pub fn child_ids(&self, id: &RoleId) -> Vec<RoleId> {
        self.children
            .get(id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn children(&self, id: &RoleId) -> Vec<&Role> {
        self.child_ids(id)
            .iter()
            .filter_map(|c| self.roles.get(c))
            .collect()
    }

    /// Parent, grandparent, ... up to the root.
    pub fn ancestors(&self, id: &RoleId) -> Vec<&Role> {
        let mut out = Vec::new();
        let mut cursor = self.roles.get(id).and_then(Role::parent);
        while let Some(next) = cursor {
            let Some(role) = self.roles.get(&next) else {
                break;
            };
            out.push(role);
            cursor = role.parent();
        }
        out
    }

    /// All roles below `id`, breadth first.
    pub fn descendants(&self, id: &RoleId) -> Vec<&Role> {
        let mut out = Vec::new();
        let mut queue = self.child_ids(id);
        let mut idx = 0;
        while idx < queue.len() {
            let current = queue[idx];
            idx += 1;
            if let Some(role) = self.roles.get(&current) {
                out.push(role);
                queue.extend(self.child_ids(&current));
            }
        }
        out
    }

    pub fn is_descendant_of(&self, id: &RoleId, ancestor: &RoleId) -> bool {
        self.ancestors(id).iter().any(|r| r.id() == ancestor)
    }

    pub fn roots(&self) -> Vec<&Role> {
        let mut roots: Vec<&Role> = self.roles.values().filter(|r| r.parent().is_none()).collect();
        roots.sort_by_key(|r| *r.id());
        roots
    }

    /// Resolve a role by name anywhere in the tree.
    ///
    /// Root roles win over nested ones; ties resolve to the oldest id.
    pub fn find_by_name(&self, name: &RoleName) -> Option<&Role> {
        self.roles
            .values()
            .filter(|r| r.name() == name)
            .min_by_key(|r| (r.parent().is_some(), *r.id()))
    }

    pub fn find_by_parent_and_name(
        &self,
        parent: Option<RoleId>,
        name: &RoleName,
    ) -> Option<&Role> {
        self.roles
            .values()
            .filter(|r| r.parent() == parent && r.name() == name)
            .min_by_key(|r| *r.id())
    }

    fn check_placement(&self, role: &Role) -> DomainResult<()> {
        let id = *role.id();
        if let Some(parent) = role.parent() {
            if parent == id {
                return Err(DomainError::invariant(format!(
                    "role {} can not be its own parent",
                    role.name()
                )));
            }
            if !self.roles.contains_key(&parent) {
                return Err(DomainError::not_found(Role::KIND, parent));
            }
            if self.is_descendant_of(&parent, &id) {
                return Err(DomainError::invariant(format!(
                    "moving role {} under its own descendant would create a cycle",
                    role.name()
                )));
            }
        }

        if let Some(clash) = self.find_by_parent_and_name(role.parent(), role.name()) {
            if clash.id() != role.id() {
                return Err(DomainError::conflict(format!(
                    "role {} already exists under the same parent",
                    role.name()
                )));
            }
        }
        Ok(())
    }

    fn unlink(&mut self, id: RoleId, parent: Option<RoleId>) {
        let Some(parent) = parent else {
            return;
        };
        if let Some(set) = self.children.get_mut(&parent) {
            set.remove(&id);
            if set.is_empty() {
                self.children.remove(&parent);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn role(name: &str) -> Role {
        Role::new(RoleId::new(), name, format!("{name} role"), Utc::now()).unwrap()
    }

    fn tree_with(roles: &[&Role]) -> RoleTree {
        let mut tree = RoleTree::new();
        for r in roles {
            tree.insert((*r).clone()).unwrap();
        }
        tree
    }

    #[test]
    fn set_parent_maintains_children_index() {
        let user = role("user");
        let manager = role("manager");
        let mut tree = tree_with(&[&user, &manager]);

        tree.set_parent(*manager.id(), Some(*user.id())).unwrap();

        assert_eq!(tree.child_ids(user.id()), vec![*manager.id()]);
        assert_eq!(tree.parent(manager.id()).map(|r| *r.id()), Some(*user.id()));
    }

    #[test]
    fn reparenting_moves_child_between_indexes() {
        let a = role("a");
        let b = role("b");
        let c = role("c");
        let mut tree = tree_with(&[&a, &b, &c]);

        tree.set_parent(*c.id(), Some(*a.id())).unwrap();
        tree.set_parent(*c.id(), Some(*b.id())).unwrap();

        assert!(tree.child_ids(a.id()).is_empty());
        assert_eq!(tree.child_ids(b.id()), vec![*c.id()]);
    }

    #[test]
    fn add_child_is_idempotent() {
        let user = role("user");
        let manager = role("manager");
        let mut tree = tree_with(&[&user, &manager]);

        tree.add_child(*user.id(), *manager.id()).unwrap();
        tree.add_child(*user.id(), *manager.id()).unwrap();

        assert_eq!(tree.child_ids(user.id()).len(), 1);
    }

    #[test]
    fn cycles_are_rejected() {
        let a = role("a");
        let b = role("b");
        let c = role("c");
        let mut tree = tree_with(&[&a, &b, &c]);
        tree.set_parent(*b.id(), Some(*a.id())).unwrap();
        tree.set_parent(*c.id(), Some(*b.id())).unwrap();

        let err = tree.set_parent(*a.id(), Some(*c.id())).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));

        let err = tree.set_parent(*a.id(), Some(*a.id())).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn unknown_parent_is_not_found() {
        let a = role("a");
        let mut tree = tree_with(&[&a]);
        let err = tree.set_parent(*a.id(), Some(RoleId::new())).unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[test]
    fn sibling_names_are_unique() {
        let user = role("user");
        let mut tree = tree_with(&[&user]);
        let first = role("editor").with_parent(Some(*user.id()));
        tree.insert(first).unwrap();

        let second = role("editor").with_parent(Some(*user.id()));
        let err = tree.insert(second.clone()).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        // Same name under a different parent is fine.
        tree.insert(second.with_parent(None)).unwrap();
    }

    #[test]
    fn set_children_replaces_collection_and_detaches_dropped() {
        let parent = role("parent");
        let a = role("a");
        let b = role("b");
        let c = role("c");
        let mut tree = tree_with(&[&parent, &a, &b, &c]);

        tree.set_children(*parent.id(), [*a.id(), *b.id()]).unwrap();
        tree.set_children(*parent.id(), [*b.id(), *c.id()]).unwrap();

        let mut expected = vec![*b.id(), *c.id()];
        expected.sort();
        assert_eq!(tree.child_ids(parent.id()), expected);
        assert_eq!(tree.get(a.id()).unwrap().parent(), None);
        assert!(tree.contains(a.id()));
    }

    #[test]
    fn set_children_is_all_or_nothing() {
        let parent = role("parent");
        let a = role("a");
        let mut tree = tree_with(&[&parent, &a]);
        let before = tree.clone();

        let err = tree.set_children(*parent.id(), [*a.id(), *parent.id()]);
        assert!(err.is_err());
        assert_eq!(tree, before);
    }

    #[test]
    fn remove_detaches_children_without_deleting_them() {
        let user = role("user");
        let manager = role("manager").with_parent(Some(*user.id()));
        let mut tree = tree_with(&[&user]);
        tree.insert(manager.clone()).unwrap();

        let removed = tree.remove(user.id()).unwrap();
        assert_eq!(removed.name(), &RoleName::User);

        let manager = tree.get(manager.id()).unwrap();
        assert_eq!(manager.parent(), None);
        assert!(tree.child_ids(user.id()).is_empty());
    }

    #[test]
    fn ancestors_and_descendants() {
        let a = role("a");
        let b = role("b").with_parent(Some(*a.id()));
        let c = role("c").with_parent(Some(*b.id()));
        let mut tree = tree_with(&[&a]);
        tree.insert(b.clone()).unwrap();
        tree.insert(c.clone()).unwrap();

        let ancestors: Vec<RoleId> = tree.ancestors(c.id()).iter().map(|r| *r.id()).collect();
        assert_eq!(ancestors, vec![*b.id(), *a.id()]);

        let descendants: Vec<RoleId> = tree.descendants(a.id()).iter().map(|r| *r.id()).collect();
        assert_eq!(descendants, vec![*b.id(), *c.id()]);

        assert_eq!(tree.roots().len(), 1);
    }

    #[test]
    fn find_by_name_prefers_root_roles() {
        let parent = role("parent");
        let nested = role("editor").with_parent(Some(*parent.id()));
        let root = role("editor");
        let mut tree = tree_with(&[&parent]);
        tree.insert(nested).unwrap();
        tree.insert(root.clone()).unwrap();

        let found = tree.find_by_name(&RoleName::parse("editor")).unwrap();
        assert_eq!(found.id(), root.id());
    }
}
