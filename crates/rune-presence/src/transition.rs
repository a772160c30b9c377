//! Single-child presence boundary.
//!
//! [`PresenceBoundary`] owns one slot in a container element. The host
//! declares which child should be in the slot with
//! [`set_child`](PresenceBoundary::set_child); the boundary inserts new
//! children, plays the exit animation of the child being replaced and removes
//! it once that animation settles. [`poll`](PresenceBoundary::poll) is called
//! after every [`Scene::tick`] to observe settled exits.
//!
//! Two policies are supported:
//!
//! - parallel (default): the next child enters while the previous one exits,
//!   both sit in the container during the overlap.
//! - exit-before-enter: the next child is held back until the previous one is
//!   finalized. The mount gate is closed for the duration of the exit.

use tracing::{debug, trace, warn};

use crate::completion::{Completion, Outcome};
use crate::controller::{AnimationController, MotionOptions};
use crate::events::PresenceEvent;
use crate::presence::{PresenceContext, PresenceOptions};
use crate::scene::Scene;
use crate::types::ElementId;

/// A child declared for a boundary's slot.
#[derive(Debug, Clone)]
pub struct PresenceChild {
    key: String,
    element: ElementId,
    options: MotionOptions,
}

impl PresenceChild {
    pub fn new(key: impl Into<String>, element: ElementId, options: MotionOptions) -> Self {
        Self {
            key: key.into(),
            element,
            options,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn element(&self) -> ElementId {
        self.element
    }

    pub fn options(&self) -> &MotionOptions {
        &self.options
    }
}

/// Coarse boundary state, for hosts and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionState {
    Idle,
    Entered,
    Exiting,
    Overlapping,
}

#[derive(Debug)]
struct Mounted {
    key: String,
    element: ElementId,
    controller: AnimationController,
}

impl Mounted {
    fn same_slot(&self, child: &PresenceChild) -> bool {
        self.key == child.key || self.element == child.element
    }
}

#[derive(Debug)]
struct Exiting {
    child: Mounted,
    completion: Completion,
}

#[derive(Debug)]
enum Slot {
    Idle,
    Entered(Mounted),
    Exiting {
        old: Exiting,
        pending: Option<PresenceChild>,
    },
    Overlapping {
        old: Exiting,
        current: Mounted,
    },
}

#[derive(Debug)]
pub struct PresenceBoundary {
    container: ElementId,
    context: PresenceContext,
    slot: Slot,
}

impl PresenceBoundary {
    pub fn new(container: ElementId, options: PresenceOptions) -> Self {
        Self {
            container,
            context: PresenceContext::new(options),
            slot: Slot::Idle,
        }
    }

    pub fn container(&self) -> ElementId {
        self.container
    }

    /// Capability handed to controllers created under this boundary.
    pub fn context(&self) -> PresenceContext {
        self.context.clone()
    }

    pub fn options(&self) -> PresenceOptions {
        self.context.options()
    }

    pub fn state(&self) -> TransitionState {
        match &self.slot {
            Slot::Idle => TransitionState::Idle,
            Slot::Entered(_) => TransitionState::Entered,
            Slot::Exiting { .. } => TransitionState::Exiting,
            Slot::Overlapping { .. } => TransitionState::Overlapping,
        }
    }

    /// The child currently occupying the slot.
    pub fn current(&self) -> Option<ElementId> {
        match &self.slot {
            Slot::Entered(current) | Slot::Overlapping { current, .. } => Some(current.element),
            _ => None,
        }
    }

    /// The child playing its exit animation.
    pub fn exiting(&self) -> Option<ElementId> {
        match &self.slot {
            Slot::Exiting { old, .. } | Slot::Overlapping { old, .. } => Some(old.child.element),
            _ => None,
        }
    }

    /// The child waiting for the exit to finish (exit-before-enter only).
    pub fn pending(&self) -> Option<ElementId> {
        match &self.slot {
            Slot::Exiting {
                pending: Some(child),
                ..
            } => Some(child.element),
            _ => None,
        }
    }

    pub fn controller(&self) -> Option<&AnimationController> {
        match &self.slot {
            Slot::Entered(current) | Slot::Overlapping { current, .. } => {
                Some(&current.controller)
            }
            _ => None,
        }
    }

    /// Declare the child that should occupy the slot; `None` empties it.
    pub fn set_child(&mut self, scene: &mut Scene, next: Option<PresenceChild>) {
        let slot = std::mem::replace(&mut self.slot, Slot::Idle);
        self.slot = match slot {
            Slot::Idle => self.admit(scene, next),
            Slot::Entered(current) => self.replace_current(scene, current, next),
            Slot::Exiting { old, pending } => {
                if self.context.options().exit_before_enter {
                    if let (Some(stale), Some(child)) = (&pending, &next) {
                        trace!(stale = %stale.element, next = %child.element, "pending child replaced");
                    }
                    Slot::Exiting { old, pending: next }
                } else {
                    match next {
                        Some(child) if old.child.same_slot(&child) => {
                            Slot::Entered(self.reclaim(scene, old, child))
                        }
                        Some(child) => Slot::Overlapping {
                            old,
                            current: self.enter(scene, child, false),
                        },
                        None => Slot::Exiting { old, pending: None },
                    }
                }
            }
            Slot::Overlapping { old, mut current } => match next {
                Some(child) if child.element == current.element => {
                    self.update(scene, &mut current, child);
                    Slot::Overlapping { old, current }
                }
                Some(child) if old.child.same_slot(&child) => {
                    let reclaimed = self.reclaim(scene, old, child);
                    match self.start_exit(scene, current) {
                        Some(exiting) => Slot::Overlapping {
                            old: exiting,
                            current: reclaimed,
                        },
                        None => Slot::Entered(reclaimed),
                    }
                }
                next => {
                    // One exiting child at a time: the older exit ends now.
                    debug!(element = %old.child.element, "older exit finalized early");
                    self.finalize(scene, old.child.element);
                    self.replace_current(scene, current, next)
                }
            },
        };
    }

    /// Observe settled exits. Returns `true` if the slot changed.
    pub fn poll(&mut self, scene: &mut Scene) -> bool {
        let slot = std::mem::replace(&mut self.slot, Slot::Idle);
        let (slot, changed) = match slot {
            Slot::Exiting { old, pending } => match old.completion.outcome() {
                None => (Slot::Exiting { old, pending }, false),
                Some(outcome) => {
                    self.settle(scene, old, outcome);
                    self.context.open_gate(scene);
                    (self.admit(scene, pending), true)
                }
            },
            Slot::Overlapping { old, current } => match old.completion.outcome() {
                None => (Slot::Overlapping { old, current }, false),
                Some(outcome) => {
                    self.settle(scene, old, outcome);
                    (Slot::Entered(current), true)
                }
            },
            other => (other, false),
        };
        self.slot = slot;
        changed
    }

    fn admit(&mut self, scene: &mut Scene, next: Option<PresenceChild>) -> Slot {
        match next {
            Some(child) => Slot::Entered(self.enter(scene, child, false)),
            None => Slot::Idle,
        }
    }

    fn replace_current(
        &mut self,
        scene: &mut Scene,
        mut current: Mounted,
        next: Option<PresenceChild>,
    ) -> Slot {
        match next {
            Some(child) if child.element == current.element => {
                self.update(scene, &mut current, child);
                Slot::Entered(current)
            }
            Some(child) if child.key == current.key => {
                // Same key, new element: swap without an exit.
                debug!(key = %child.key, old = %current.element, new = %child.element, "keyed child replaced");
                current.controller.unmount(scene);
                self.finalize(scene, current.element);
                Slot::Entered(self.enter(scene, child, false))
            }
            next => self.withdraw(scene, current, next),
        }
    }

    fn withdraw(&mut self, scene: &mut Scene, current: Mounted, next: Option<PresenceChild>) -> Slot {
        let exit_before_enter = self.context.options().exit_before_enter;
        if exit_before_enter {
            self.context.close_gate();
        }
        match self.start_exit(scene, current) {
            Some(old) if exit_before_enter => Slot::Exiting { old, pending: next },
            Some(old) => match next {
                Some(child) => Slot::Overlapping {
                    old,
                    current: self.enter(scene, child, false),
                },
                None => Slot::Exiting { old, pending: None },
            },
            None => {
                self.context.open_gate(scene);
                self.admit(scene, next)
            }
        }
    }

    /// Unmount `current` and play its exit. Returns `None` when the child was
    /// finalized on the spot (no exit registered, or the exit settled at once).
    fn start_exit(&mut self, scene: &mut Scene, mut current: Mounted) -> Option<Exiting> {
        current.controller.unmount(scene);
        let completion = match self.context.descriptor(current.element) {
            Some(descriptor) => descriptor.play_exit(scene),
            None => Completion::settled(Outcome::Finished),
        };
        let exiting = Exiting {
            child: current,
            completion,
        };
        match exiting.completion.outcome() {
            None => Some(exiting),
            Some(outcome) => {
                self.settle(scene, exiting, outcome);
                None
            }
        }
    }

    /// Take back a child whose exit is in flight because the new declaration
    /// occupies the same slot.
    fn reclaim(&mut self, scene: &mut Scene, old: Exiting, child: PresenceChild) -> Mounted {
        let element = old.child.element;
        scene.cancel_exit(element);
        scene.push_event(PresenceEvent::Reclaimed { element });
        let same = child.element == element;
        if same {
            self.context.unregister(element);
        } else {
            self.finalize(scene, element);
        }
        debug!(%element, same, "exiting child reclaimed");
        self.enter(scene, child, same)
    }

    fn settle(&mut self, scene: &mut Scene, old: Exiting, outcome: Outcome) {
        let element = old.child.element;
        match outcome {
            Outcome::Canceled => {
                debug!(%element, "exit canceled, element released");
                self.context.unregister(element);
            }
            Outcome::Failed { reason } => {
                warn!(%element, %reason, "exit failed, finalizing anyway");
                self.finalize(scene, element);
            }
            Outcome::Finished => self.finalize(scene, element),
        }
    }

    fn finalize(&mut self, scene: &mut Scene, element: ElementId) {
        self.context.unregister(element);
        scene.finalize(element);
    }

    /// Insert and mount a child. A reclaimed child keeps its current values
    /// and skips `initial`.
    fn enter(&mut self, scene: &mut Scene, child: PresenceChild, reclaimed: bool) -> Mounted {
        let PresenceChild {
            key,
            element,
            mut options,
        } = child;
        if !self.context.is_gate_open() {
            self.context.open_gate(scene);
        }
        if scene.tree().parent(element) != Some(self.container) {
            if let Err(err) = scene.tree_mut().append_child(self.container, element) {
                warn!(%element, %err, "could not insert child");
            }
        }
        if reclaimed {
            options.initial = None;
        }
        let mut controller =
            AnimationController::new(Some(element), options, Some(self.context.clone()));
        controller.mount(scene);
        self.context.mark_appeared();
        trace!(%element, %key, "child entered");
        Mounted {
            key,
            element,
            controller,
        }
    }

    fn update(&mut self, scene: &mut Scene, current: &mut Mounted, child: PresenceChild) {
        let PresenceChild { key, options, .. } = child;
        if let Some(animate) = options.animate {
            current.controller.set_animate(scene, animate);
        }
        if current.controller.options().exit != options.exit {
            current.controller.set_exit(options.exit);
        }
        current.key = key;
    }
}
