//! Arena element tree with an explicit structural-change API.
//!
//! Every insertion and removal made through [`ElementTree`] is described by a
//! [`MutationRecord`] and queued for each registered observer whose target
//! covers the changed parent. Observers read their queue synchronously with
//! [`ElementTree::take_records`]; nothing is delivered behind the caller's back.
//!
//! The tree also stores the current style values of each element (written by
//! the animation engine) and a measured height supplied by layout.

use std::collections::{BTreeMap, HashMap};

use tracing::trace;

use crate::error::{PresenceError, Result};
use crate::types::{AnimatableValue, ElementId};

/// One structural change to a parent's child list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    /// The parent whose child list changed.
    pub target: ElementId,
    pub added: Vec<ElementId>,
    pub removed: Vec<ElementId>,
    /// Sibling before the changed position, at the time of the change.
    pub previous_sibling: Option<ElementId>,
    /// Sibling after the changed position, at the time of the change.
    pub next_sibling: Option<ElementId>,
}

/// Handle for a mutation observer registered on a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

#[derive(Debug)]
struct Observer {
    target: ElementId,
    subtree: bool,
    paused: bool,
    records: Vec<MutationRecord>,
}

#[derive(Debug, Default)]
struct Node {
    name: String,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    styles: BTreeMap<String, AnimatableValue>,
    measured_height: f64,
}

/// The element tree.
#[derive(Debug)]
pub struct ElementTree {
    nodes: HashMap<ElementId, Node>,
    root: ElementId,
    next_id: u64,
    observers: BTreeMap<ObserverId, Observer>,
    next_observer: u64,
}

impl Default for ElementTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementTree {
    /// Create a tree containing only the root element.
    pub fn new() -> Self {
        let root = ElementId(0);
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            Node {
                name: "root".to_string(),
                ..Node::default()
            },
        );
        Self {
            nodes,
            root,
            next_id: 1,
            observers: BTreeMap::new(),
            next_observer: 1,
        }
    }

    pub fn root(&self) -> ElementId {
        self.root
    }

    /// Create a detached element.
    pub fn create_element(&mut self, name: impl Into<String>) -> ElementId {
        let id = ElementId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                name: name.into(),
                ..Node::default()
            },
        );
        id
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn name(&self, id: ElementId) -> Option<&str> {
        self.nodes.get(&id).map(|n| n.name.as_str())
    }

    pub fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    /// Children of `id`, empty if the element does not exist.
    pub fn children(&self, id: ElementId) -> &[ElementId] {
        self.nodes
            .get(&id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn index_of(&self, parent: ElementId, child: ElementId) -> Option<usize> {
        self.children(parent).iter().position(|c| *c == child)
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    pub fn is_inclusive_ancestor(&self, ancestor: ElementId, id: ElementId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Whether the element is reachable from the root.
    pub fn is_connected(&self, id: ElementId) -> bool {
        self.contains(id) && self.is_inclusive_ancestor(self.root, id)
    }

    /// Append `child` as the last child of `parent`.
    pub fn append_child(&mut self, parent: ElementId, child: ElementId) -> Result<()> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` into `parent` before `reference` (or at the end).
    ///
    /// A child that already has a parent is detached first, producing a
    /// removal record for its old parent.
    pub fn insert_before(
        &mut self,
        parent: ElementId,
        child: ElementId,
        reference: Option<ElementId>,
    ) -> Result<()> {
        if !self.contains(parent) {
            return Err(PresenceError::UnknownElement(parent));
        }
        if !self.contains(child) {
            return Err(PresenceError::UnknownElement(child));
        }
        if child == self.root {
            return Err(PresenceError::DetachRoot);
        }
        if self.is_inclusive_ancestor(child, parent) {
            return Err(PresenceError::HierarchyCycle { parent, child });
        }
        if let Some(reference) = reference {
            if reference == child {
                // Inserting a node before itself leaves it where it is.
                return Ok(());
            }
            if self.parent(reference) != Some(parent) {
                return Err(PresenceError::NotAChild {
                    parent,
                    child: reference,
                });
            }
        }

        if self.parent(child).is_some() {
            self.detach(child)?;
        }

        let node = self
            .nodes
            .get_mut(&parent)
            .ok_or(PresenceError::UnknownElement(parent))?;
        let index = reference
            .and_then(|r| node.children.iter().position(|c| *c == r))
            .unwrap_or(node.children.len());
        node.children.insert(index, child);
        let previous_sibling = index.checked_sub(1).map(|i| node.children[i]);
        let next_sibling = node.children.get(index + 1).copied();

        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        trace!(%parent, %child, index, "element inserted");
        self.notify(MutationRecord {
            target: parent,
            added: vec![child],
            removed: Vec::new(),
            previous_sibling,
            next_sibling,
        });
        Ok(())
    }

    /// Remove `child` from its parent. Returns `false` if it had none.
    pub fn detach(&mut self, child: ElementId) -> Result<bool> {
        if child == self.root {
            return Err(PresenceError::DetachRoot);
        }
        let Some(parent) = self.parent(child) else {
            if self.contains(child) {
                return Ok(false);
            }
            return Err(PresenceError::UnknownElement(child));
        };

        let node = self
            .nodes
            .get_mut(&parent)
            .ok_or(PresenceError::UnknownElement(parent))?;
        let index = node
            .children
            .iter()
            .position(|c| *c == child)
            .ok_or(PresenceError::NotAChild { parent, child })?;
        node.children.remove(index);
        let previous_sibling = index.checked_sub(1).map(|i| node.children[i]);
        let next_sibling = node.children.get(index).copied();

        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = None;
        }
        trace!(%parent, %child, index, "element detached");
        self.notify(MutationRecord {
            target: parent,
            added: Vec::new(),
            removed: vec![child],
            previous_sibling,
            next_sibling,
        });
        Ok(true)
    }

    /// Detach `id` and drop it and its whole subtree from the arena.
    pub fn destroy(&mut self, id: ElementId) -> Result<()> {
        self.detach(id)?;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children);
            }
        }
        Ok(())
    }

    pub fn style(&self, id: ElementId, property: &str) -> Option<&AnimatableValue> {
        self.nodes.get(&id).and_then(|n| n.styles.get(property))
    }

    pub fn styles(&self, id: ElementId) -> Option<&BTreeMap<String, AnimatableValue>> {
        self.nodes.get(&id).map(|n| &n.styles)
    }

    /// Write a style value. Returns `false` if the element does not exist.
    pub fn set_style(
        &mut self,
        id: ElementId,
        property: impl Into<String>,
        value: AnimatableValue,
    ) -> bool {
        match self.nodes.get_mut(&id) {
            Some(node) => {
                node.styles.insert(property.into(), value);
                true
            }
            None => false,
        }
    }

    /// Pixel height last reported by layout.
    pub fn measured_height(&self, id: ElementId) -> f64 {
        self.nodes.get(&id).map_or(0.0, |n| n.measured_height)
    }

    pub fn set_measured_height(&mut self, id: ElementId, height: f64) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.measured_height = height;
        }
    }

    /// Register an observer for changes to `target`'s child list, or to any
    /// child list inside `target` when `subtree` is set.
    pub fn observe(&mut self, target: ElementId, subtree: bool) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.insert(
            id,
            Observer {
                target,
                subtree,
                paused: false,
                records: Vec::new(),
            },
        );
        id
    }

    /// Remove an observer and drop its pending records.
    pub fn disconnect(&mut self, observer: ObserverId) {
        self.observers.remove(&observer);
    }

    /// Take every record queued for `observer` since the last call.
    pub fn take_records(&mut self, observer: ObserverId) -> Vec<MutationRecord> {
        self.observers
            .get_mut(&observer)
            .map(|o| std::mem::take(&mut o.records))
            .unwrap_or_default()
    }

    /// Stop or resume queueing records for `observer`.
    pub fn set_observer_paused(&mut self, observer: ObserverId, paused: bool) {
        if let Some(o) = self.observers.get_mut(&observer) {
            o.paused = paused;
        }
    }

    fn notify(&mut self, record: MutationRecord) {
        if self.observers.is_empty() {
            return;
        }
        let interested: Vec<ObserverId> = self
            .observers
            .iter()
            .filter(|(_, o)| {
                !o.paused
                    && (o.target == record.target
                        || (o.subtree && self.is_inclusive_ancestor(o.target, record.target)))
            })
            .map(|(id, _)| *id)
            .collect();
        for id in interested {
            if let Some(o) = self.observers.get_mut(&id) {
                o.records.push(record.clone());
            }
        }
    }
}
