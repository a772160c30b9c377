//! Presence registry and mount gate.
//!
//! A presence boundary owns one [`PresenceState`] and hands descendants a
//! cloneable [`PresenceContext`] when they are constructed. Controllers
//! register an [`ElementDescriptor`] for their element when they declare an
//! exit animation, and read the mount gate before starting their enter
//! animation. A controller built without a context behaves as if the gate is
//! always open and never registers anything.
//!
//! The registry does no animation. It is bookkeeping keyed by element
//! identity, with entries removed explicitly when an element is finalized or
//! its controller unmounts without an exit.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::completion::{Completion, Outcome};
use crate::events::PresenceEvent;
use crate::scene::Scene;
use crate::types::{AnimationParams, ElementId};

/// Boundary configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceOptions {
    /// Animate the boundary's very first render. When `false` the first
    /// children snap to their enter state.
    pub initial: bool,
    /// Wait for an exiting child to finish before the next one enters.
    pub exit_before_enter: bool,
}

impl Default for PresenceOptions {
    fn default() -> Self {
        Self {
            initial: true,
            exit_before_enter: false,
        }
    }
}

/// Exit behavior registered for one element.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementDescriptor {
    element: ElementId,
    exit_params: Option<AnimationParams>,
}

impl ElementDescriptor {
    pub fn new(element: ElementId, exit_params: Option<AnimationParams>) -> Self {
        Self {
            element,
            exit_params,
        }
    }

    pub fn element(&self) -> ElementId {
        self.element
    }

    pub fn exit_params(&self) -> Option<&AnimationParams> {
        self.exit_params.as_ref()
    }

    pub fn has_exit(&self) -> bool {
        self.exit_params.is_some()
    }

    /// Play the exit animation. Resolves immediately when the element is not
    /// attached or no exit is declared.
    pub fn play_exit(&self, scene: &mut Scene) -> Completion {
        match &self.exit_params {
            Some(params) => scene.start_exit(self.element, params),
            None => Completion::settled(Outcome::Finished),
        }
    }

    /// Cancel the exit animation. Returns `false` if none was in flight.
    pub fn cancel_exit(&self, scene: &mut Scene) -> bool {
        scene.cancel_exit(self.element)
    }
}

/// Per-boundary presence bookkeeping.
#[derive(Debug)]
pub struct PresenceState {
    options: PresenceOptions,
    appeared: bool,
    gate_open: bool,
    deferred: Vec<(ElementId, AnimationParams)>,
    registry: HashMap<ElementId, ElementDescriptor>,
}

impl PresenceState {
    fn new(options: PresenceOptions) -> Self {
        Self {
            options,
            appeared: false,
            gate_open: true,
            deferred: Vec::new(),
            registry: HashMap::new(),
        }
    }
}

/// Cloneable capability for one presence boundary.
#[derive(Debug, Clone)]
pub struct PresenceContext {
    state: Rc<RefCell<PresenceState>>,
}

impl PresenceContext {
    pub fn new(options: PresenceOptions) -> Self {
        Self {
            state: Rc::new(RefCell::new(PresenceState::new(options))),
        }
    }

    pub fn options(&self) -> PresenceOptions {
        self.state.borrow().options
    }

    /// Whether both values refer to the same boundary.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    /// Register exit behavior for an element. The last registration wins.
    pub fn register(&self, descriptor: ElementDescriptor) {
        trace!(element = %descriptor.element, "descriptor registered");
        self.state
            .borrow_mut()
            .registry
            .insert(descriptor.element, descriptor);
    }

    /// Remove the entry for `element`, returning it if present.
    pub fn unregister(&self, element: ElementId) -> Option<ElementDescriptor> {
        let removed = self.state.borrow_mut().registry.remove(&element);
        if removed.is_some() {
            trace!(%element, "descriptor unregistered");
        }
        removed
    }

    /// Drop every entry and deferred enter whose element fails `keep`.
    /// Returns the unregistered elements.
    pub fn prune(&self, mut keep: impl FnMut(ElementId) -> bool) -> Vec<ElementId> {
        let mut state = self.state.borrow_mut();
        let mut removed: Vec<ElementId> = state
            .registry
            .keys()
            .copied()
            .filter(|id| !keep(*id))
            .collect();
        removed.sort();
        for id in &removed {
            state.registry.remove(id);
        }
        state.deferred.retain(|(element, _)| keep(*element));
        if !removed.is_empty() {
            debug!(removed = removed.len(), "stale descriptors pruned");
        }
        removed
    }

    pub fn descriptor(&self, element: ElementId) -> Option<ElementDescriptor> {
        self.state.borrow().registry.get(&element).cloned()
    }

    /// Whether `element` has a registered exit animation.
    pub fn has_exit(&self, element: ElementId) -> bool {
        self.state
            .borrow()
            .registry
            .get(&element)
            .is_some_and(ElementDescriptor::has_exit)
    }

    pub fn registered_count(&self) -> usize {
        self.state.borrow().registry.len()
    }

    pub fn is_gate_open(&self) -> bool {
        self.state.borrow().gate_open
    }

    /// True while the boundary's first render should snap instead of animate.
    pub fn should_snap(&self) -> bool {
        let state = self.state.borrow();
        !state.options.initial && !state.appeared
    }

    pub(crate) fn mark_appeared(&self) {
        self.state.borrow_mut().appeared = true;
    }

    pub(crate) fn close_gate(&self) {
        let mut state = self.state.borrow_mut();
        if state.gate_open {
            debug!("mount gate closed");
            state.gate_open = false;
        }
    }

    /// Open the gate, then start every deferred enter in the order they were
    /// deferred. Returns the elements whose enter started.
    pub(crate) fn open_gate(&self, scene: &mut Scene) -> Vec<ElementId> {
        let deferred = {
            let mut state = self.state.borrow_mut();
            if state.gate_open && state.deferred.is_empty() {
                return Vec::new();
            }
            state.gate_open = true;
            std::mem::take(&mut state.deferred)
        };
        debug!(deferred = deferred.len(), "mount gate opened");
        deferred
            .into_iter()
            .filter_map(|(element, params)| scene.start_enter(element, &params).map(|_| element))
            .collect()
    }

    /// Queue an enter until the gate opens. Replaces an earlier entry for the
    /// same element.
    pub(crate) fn defer_enter(&self, scene: &mut Scene, element: ElementId, params: AnimationParams) {
        let mut state = self.state.borrow_mut();
        if let Some(slot) = state.deferred.iter_mut().find(|(e, _)| *e == element) {
            slot.1 = params;
            return;
        }
        state.deferred.push((element, params));
        drop(state);
        trace!(%element, "enter deferred");
        scene.push_event(PresenceEvent::EnterDeferred { element });
    }

    pub fn is_deferred(&self, element: ElementId) -> bool {
        self.state
            .borrow()
            .deferred
            .iter()
            .any(|(e, _)| *e == element)
    }

    /// Drop a deferred enter. Returns `true` if one was queued.
    pub(crate) fn cancel_deferred(&self, element: ElementId) -> bool {
        let mut state = self.state.borrow_mut();
        let before = state.deferred.len();
        state.deferred.retain(|(e, _)| *e != element);
        state.deferred.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SceneEvent;

    fn attached(scene: &mut Scene) -> ElementId {
        let el = scene.tree_mut().create_element("div");
        let root = scene.tree().root();
        scene.tree_mut().append_child(root, el).unwrap();
        el
    }

    #[test]
    fn test_register_is_last_write_wins() {
        let ctx = PresenceContext::new(PresenceOptions::default());
        let el = ElementId(1);
        ctx.register(ElementDescriptor::new(el, None));
        ctx.register(ElementDescriptor::new(
            el,
            Some(AnimationParams::new().set("opacity", 0.0)),
        ));

        assert_eq!(ctx.registered_count(), 1);
        assert!(ctx.has_exit(el));
        assert!(ctx.unregister(el).is_some());
        assert!(ctx.unregister(el).is_none());
        assert!(!ctx.has_exit(el));
    }

    #[test]
    fn test_prune_drops_entries_and_deferred_enters() {
        let mut scene = Scene::default();
        let live = attached(&mut scene);
        let gone = attached(&mut scene);
        let ctx = PresenceContext::new(PresenceOptions::default());
        ctx.register(ElementDescriptor::new(live, None));
        ctx.register(ElementDescriptor::new(gone, None));
        ctx.close_gate();
        ctx.defer_enter(&mut scene, gone, AnimationParams::new().set("opacity", 1.0));

        assert_eq!(ctx.prune(|id| id != gone), vec![gone]);
        assert_eq!(ctx.registered_count(), 1);
        assert!(ctx.descriptor(live).is_some());
        assert!(!ctx.is_deferred(gone));
        assert!(ctx.prune(|_| true).is_empty());
    }

    #[test]
    fn test_gate_starts_open() {
        let ctx = PresenceContext::new(PresenceOptions {
            exit_before_enter: true,
            ..PresenceOptions::default()
        });
        assert!(ctx.is_gate_open());
    }

    #[test]
    fn test_should_snap_only_before_first_appearance() {
        let ctx = PresenceContext::new(PresenceOptions {
            initial: false,
            ..PresenceOptions::default()
        });
        assert!(ctx.should_snap());
        ctx.mark_appeared();
        assert!(!ctx.should_snap());

        let animated = PresenceContext::new(PresenceOptions::default());
        assert!(!animated.should_snap());
    }

    #[test]
    fn test_open_gate_runs_deferred_enters_in_order() {
        let mut scene = Scene::default();
        let a = attached(&mut scene);
        let b = attached(&mut scene);
        let ctx = PresenceContext::new(PresenceOptions::default());

        ctx.close_gate();
        ctx.defer_enter(&mut scene, a, AnimationParams::new().set("opacity", 0.5));
        ctx.defer_enter(&mut scene, b, AnimationParams::new().set("opacity", 1.0));
        ctx.defer_enter(&mut scene, a, AnimationParams::new().set("opacity", 1.0));
        assert!(ctx.is_deferred(a));

        let started = ctx.open_gate(&mut scene);
        assert_eq!(started, vec![a, b]);
        assert!(ctx.is_gate_open());
        assert!(!ctx.is_deferred(a));

        let deferred_events = scene
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, SceneEvent::Presence(PresenceEvent::EnterDeferred { .. })))
            .count();
        assert_eq!(deferred_events, 2);
    }

    #[test]
    fn test_cancel_deferred() {
        let mut scene = Scene::default();
        let a = attached(&mut scene);
        let ctx = PresenceContext::new(PresenceOptions::default());
        ctx.close_gate();
        ctx.defer_enter(&mut scene, a, AnimationParams::new());
        assert!(ctx.cancel_deferred(a));
        assert!(!ctx.cancel_deferred(a));
        assert!(ctx.open_gate(&mut scene).is_empty());
    }

    #[test]
    fn test_descriptor_without_exit_resolves_immediately() {
        let mut scene = Scene::default();
        let el = attached(&mut scene);
        let descriptor = ElementDescriptor::new(el, None);
        assert_eq!(descriptor.play_exit(&mut scene).outcome(), Some(Outcome::Finished));
        assert!(!descriptor.cancel_exit(&mut scene));
    }
}
