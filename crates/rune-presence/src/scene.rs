//! Shared runtime context for presence components.
//!
//! A [`Scene`] bundles everything the orchestrator touches: the element tree,
//! the animation engine, the in-flight animation jobs of every element, the
//! reduced-motion policy and the event queue. Components receive it as
//! `&mut Scene` for each operation instead of holding references to it.
//!
//! # Frame loop
//!
//! ```ignore
//! loop {
//!     scene.tick(frame_ms);
//!     boundary.poll(&mut scene);
//!     group.poll(&mut scene);
//!     for event in scene.drain_events() { /* ... */ }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::completion::{Completion, Outcome};
use crate::engine::{AnimationEngine, AnimationHandle, TweenEngine};
use crate::events::{EventQueue, PresenceEvent, SceneEvent};
use crate::tree::ElementTree;
use crate::types::{AnimatableValue, AnimationParams, ElementId};

/// Reduced-motion policy applied to every animation duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionPolicy {
    /// When set, every duration collapses to zero.
    pub reduced_motion: bool,
}

impl MotionPolicy {
    pub fn reduced() -> Self {
        Self {
            reduced_motion: true,
        }
    }

    pub fn adjust(&self, duration_ms: f32) -> f32 {
        if self.reduced_motion { 0.0 } else { duration_ms }
    }
}

/// In-flight animations for one element.
///
/// At most one handle is live per element: starting a new animation retires
/// whatever was running before.
#[derive(Debug, Default, Clone)]
pub struct AnimationJobSet {
    enter: Option<AnimationHandle>,
    exit: Option<AnimationHandle>,
}

impl AnimationJobSet {
    pub fn enter(&self) -> Option<&AnimationHandle> {
        self.enter.as_ref()
    }

    pub fn exit(&self) -> Option<&AnimationHandle> {
        self.exit.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.enter.is_none() && self.exit.is_none()
    }

    fn retire_enter(&mut self) {
        if let Some(handle) = self.enter.take() {
            handle.retire();
        }
    }
}

/// The runtime context shared by controllers, boundaries and groups.
#[derive(Debug)]
pub struct Scene {
    tree: ElementTree,
    engine: Box<dyn AnimationEngine>,
    jobs: BTreeMap<ElementId, AnimationJobSet>,
    motion: MotionPolicy,
    events: EventQueue,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(TweenEngine::new())
    }
}

impl Scene {
    pub fn new(engine: impl AnimationEngine + 'static) -> Self {
        Self {
            tree: ElementTree::new(),
            engine: Box::new(engine),
            jobs: BTreeMap::new(),
            motion: MotionPolicy::default(),
            events: EventQueue::new(),
        }
    }

    pub fn with_motion(mut self, motion: MotionPolicy) -> Self {
        self.motion = motion;
        self
    }

    pub fn tree(&self) -> &ElementTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut ElementTree {
        &mut self.tree
    }

    pub fn motion(&self) -> MotionPolicy {
        self.motion
    }

    pub fn set_motion(&mut self, motion: MotionPolicy) {
        self.motion = motion;
    }

    pub fn engine(&self) -> &dyn AnimationEngine {
        self.engine.as_ref()
    }

    /// Jobs currently tracked for `element`.
    pub fn jobs(&self, element: ElementId) -> Option<&AnimationJobSet> {
        self.jobs.get(&element)
    }

    /// Whether `element` has a live enter or exit animation.
    pub fn is_animating(&self, element: ElementId) -> bool {
        self.jobs.get(&element).is_some_and(|jobs| {
            jobs.enter.as_ref().is_some_and(AnimationHandle::is_active)
                || jobs.exit.as_ref().is_some_and(AnimationHandle::is_active)
        })
    }

    /// Whether `element` has an exit in flight.
    pub fn is_exiting(&self, element: ElementId) -> bool {
        self.jobs
            .get(&element)
            .and_then(|jobs| jobs.exit.as_ref())
            .is_some_and(|h| h.finished().is_pending())
    }

    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<SceneEvent> {
        self.events.drain().collect()
    }

    pub(crate) fn push_event(&mut self, event: impl Into<SceneEvent>) {
        self.events.push(event);
    }

    /// Advance the engine by one frame and report settled exits.
    pub fn tick(&mut self, delta_ms: f32) {
        self.engine.tick(&mut self.tree, delta_ms);
        for event in self.engine.drain_events() {
            self.events.push(event);
        }
        self.reap();
    }

    /// Apply `params` instantly, retiring any running enter first.
    pub fn snap(&mut self, element: ElementId, params: &AnimationParams) {
        if !self.tree.contains(element) {
            return;
        }
        if let Some(jobs) = self.jobs.get_mut(&element) {
            jobs.retire_enter();
        }
        self.engine.animate(&mut self.tree, element, &params.instant());
        self.forward_engine_events();
    }

    /// Start an enter animation on `element`.
    ///
    /// Any animation already driving the element is retired first, including
    /// an exit in flight. Returns `None` if the element does not exist.
    pub fn start_enter(
        &mut self,
        element: ElementId,
        params: &AnimationParams,
    ) -> Option<AnimationHandle> {
        if !self.tree.contains(element) {
            trace!(%element, "enter skipped: element missing");
            return None;
        }
        self.cancel_exit(element);
        let jobs = self.jobs.entry(element).or_default();
        jobs.retire_enter();

        let mut params = params.clone();
        params.duration_ms = self.motion.adjust(params.duration_ms);
        let handle = self.engine.animate(&mut self.tree, element, &params);
        debug!(%element, delay_ms = params.delay_ms, "enter started");
        self.jobs.entry(element).or_default().enter = Some(handle.clone());
        self.events.push(PresenceEvent::EnterStarted {
            element,
            animation_id: handle.id(),
            delay_ms: params.delay_ms,
        });
        self.forward_engine_events();
        self.reap();
        Some(handle)
    }

    /// Pause and retire the enter animation of `element`, if any.
    pub fn retire_enter(&mut self, element: ElementId) {
        if let Some(jobs) = self.jobs.get_mut(&element) {
            jobs.retire_enter();
            if jobs.is_empty() {
                self.jobs.remove(&element);
            }
        }
    }

    /// Start the exit animation of `element`.
    ///
    /// Pauses the running enter, snaps an `auto` height to its measured pixel
    /// height so it can be interpolated, applies the reduced-motion policy and
    /// starts the exit. A detached element resolves immediately. An exit
    /// already in flight is returned as is.
    pub fn start_exit(&mut self, element: ElementId, params: &AnimationParams) -> Completion {
        if !self.tree.is_connected(element) {
            trace!(%element, "exit skipped: element not attached");
            return Completion::settled(Outcome::Finished);
        }
        if let Some(running) = self.jobs.get(&element).and_then(|j| j.exit.as_ref()) {
            if running.finished().is_pending() {
                trace!(%element, "exit already in flight");
                return running.finished();
            }
        }
        self.jobs.entry(element).or_default().retire_enter();

        if self
            .tree
            .style(element, "height")
            .is_some_and(AnimatableValue::is_auto)
        {
            let height = self.tree.measured_height(element);
            self.tree
                .set_style(element, "height", AnimatableValue::Number(height));
        }

        let mut params = params.clone();
        params.duration_ms = self.motion.adjust(params.duration_ms);
        let handle = self.engine.animate(&mut self.tree, element, &params);
        debug!(%element, duration_ms = params.duration_ms, "exit started");
        let completion = handle.finished();
        self.events.push(PresenceEvent::ExitStarted {
            element,
            animation_id: handle.id(),
        });
        self.jobs.entry(element).or_default().exit = Some(handle);
        self.forward_engine_events();
        self.reap();
        completion
    }

    /// Cancel the exit of `element`. Returns `false` if none was in flight.
    pub fn cancel_exit(&mut self, element: ElementId) -> bool {
        let Some(handle) = self.jobs.get_mut(&element).and_then(|j| j.exit.take()) else {
            return false;
        };
        if !handle.retire() {
            return false;
        }
        debug!(%element, "exit canceled");
        self.events.push(PresenceEvent::ExitCanceled { element });
        true
    }

    /// Permanently detach `element` and drop its jobs.
    pub fn finalize(&mut self, element: ElementId) {
        if let Some(jobs) = self.jobs.remove(&element) {
            for handle in [jobs.enter, jobs.exit].into_iter().flatten() {
                handle.retire();
            }
        }
        match self.tree.detach(element) {
            Ok(_) => {}
            Err(err) => warn!(%element, %err, "finalize could not detach element"),
        }
        debug!(%element, "element finalized");
        self.events.push(PresenceEvent::Finalized { element });
    }

    fn forward_engine_events(&mut self) {
        for event in self.engine.drain_events() {
            self.events.push(event);
        }
    }

    /// Drop settled jobs; report exits that settled on their own.
    fn reap(&mut self) {
        let mut completed = Vec::new();
        self.jobs.retain(|element, jobs| {
            if jobs.enter.as_ref().is_some_and(|h| !h.finished().is_pending()) {
                jobs.enter = None;
            }
            if let Some(outcome) = jobs.exit.as_ref().and_then(|h| h.finished().outcome()) {
                jobs.exit = None;
                completed.push((*element, outcome));
            }
            !jobs.is_empty()
        });
        for (element, outcome) in completed {
            trace!(%element, ?outcome, "exit settled");
            self.events
                .push(PresenceEvent::ExitCompleted { element, outcome });
        }
    }
}
