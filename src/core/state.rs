//! Tree nodes and their stable identifiers.
//!
//! Nodes live in an arena owned by [`StateMachine`](crate::StateMachine).
//! Parent, children and the active child are expressed as [`StateId`]
//! indices into that arena, never as references between nodes.

use super::hooks::{EventHandler, HookSet, MessageHandler};
use serde::{Deserialize, Serialize};
use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Stable handle of a node inside one machine's arena.
///
/// Ids are only meaningful for the machine that issued them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateId(pub(crate) u32);

impl StateId {
    /// The root node of every machine.
    pub const ROOT: StateId = StateId(0);

    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }

    /// True for the machine's root node.
    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A named element of the state tree.
///
/// A node owns its children (by name), an ordered hook list per lifecycle
/// phase, named event handlers and typed message handlers. At most one child
/// is active at a time.
pub struct StateNode {
    name: String,
    path: String,
    parent: Option<StateId>,
    children: BTreeMap<String, StateId>,
    active_child: Option<StateId>,
    is_active: bool,
    destroyed: bool,
    pub(crate) hooks: HookSet,
    pub(crate) events: HashMap<String, EventHandler>,
    pub(crate) messages: HashMap<TypeId, Vec<MessageHandler>>,
}

impl StateNode {
    pub(crate) fn new(name: String, path: String, parent: Option<StateId>) -> Self {
        Self {
            name,
            path,
            parent,
            children: BTreeMap::new(),
            active_child: None,
            is_active: false,
            destroyed: false,
            hooks: HookSet::default(),
            events: HashMap::new(),
            messages: HashMap::new(),
        }
    }

    /// Name of the node, unique among its siblings.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ancestor names joined by the machine's path separator.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn parent(&self) -> Option<StateId> {
        self.parent
    }

    /// The child currently entered, if any.
    pub fn active_child(&self) -> Option<StateId> {
        self.active_child
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// True once the node has been destroyed; a destroyed node is unusable.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Look up a direct child by name.
    pub fn child(&self, name: &str) -> Option<StateId> {
        self.children.get(name).copied()
    }

    /// Direct children, ordered by name.
    pub fn children(&self) -> impl Iterator<Item = StateId> + '_ {
        self.children.values().copied()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Names of the events this node handles.
    pub fn events(&self) -> impl Iterator<Item = &str> {
        self.events.keys().map(String::as_str)
    }

    pub fn has_event(&self, name: &str) -> bool {
        self.events.contains_key(name)
    }

    pub(crate) fn insert_child(&mut self, name: String, id: StateId) {
        self.children.insert(name, id);
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }

    pub(crate) fn set_active_child(&mut self, child: Option<StateId>) {
        self.active_child = child;
    }

    /// Clear the active child only if it still points at `child`.
    pub(crate) fn release_active_child(&mut self, child: StateId) {
        if self.active_child == Some(child) {
            self.active_child = None;
        }
    }

    pub(crate) fn mark_destroyed(&mut self) {
        self.destroyed = true;
        self.is_active = false;
        self.active_child = None;
        self.children.clear();
        self.hooks = HookSet::default();
        self.events.clear();
        self.messages.clear();
    }
}

impl fmt::Debug for StateNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateNode")
            .field("path", &self.path)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("active_child", &self.active_child)
            .field("is_active", &self.is_active)
            .field("destroyed", &self.destroyed)
            .field("events", &self.events.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Hook, Phase};
    use crate::error::HookResult;
    use crate::machine::StateMachine;
    use std::rc::Rc;

    #[test]
    fn root_id_is_zero() {
        assert!(StateId::ROOT.is_root());
        assert_eq!(StateId::ROOT.index(), 0);
        assert!(!StateId::from_index(3).is_root());
        assert_eq!(StateId::from_index(3).to_string(), "#3");
    }

    #[test]
    fn new_node_is_inactive_and_empty() {
        let node = StateNode::new("Idle".into(), "Agent/Idle".into(), Some(StateId::ROOT));

        assert_eq!(node.name(), "Idle");
        assert_eq!(node.path(), "Agent/Idle");
        assert_eq!(node.parent(), Some(StateId::ROOT));
        assert!(!node.is_active());
        assert!(node.active_child().is_none());
        assert_eq!(node.child_count(), 0);
    }

    #[test]
    fn release_active_child_ignores_other_children() {
        let mut node = StateNode::new("Combat".into(), "Agent/Combat".into(), None);
        node.set_active_child(Some(StateId(2)));

        node.release_active_child(StateId(5));
        assert_eq!(node.active_child(), Some(StateId(2)));

        node.release_active_child(StateId(2));
        assert!(node.active_child().is_none());
    }

    #[test]
    fn destroyed_node_forgets_children_and_hooks() {
        let mut node = StateNode::new("Combat".into(), "Agent/Combat".into(), None);
        node.insert_child("Melee".into(), StateId(4));
        node.set_active(true);
        let hook: Hook = Rc::new(|_: &mut StateMachine, _: StateId| -> HookResult { Ok(()) });
        node.hooks.push(Phase::Update, hook);

        node.mark_destroyed();

        assert!(node.is_destroyed());
        assert!(!node.is_active());
        assert!(node.child("Melee").is_none());
        assert_eq!(node.hooks.len(Phase::Update), 0);
    }
}
