//! Animation engine contract and the reference tween engine.
//!
//! The presence runtime never interpolates anything itself. It asks an
//! [`AnimationEngine`] to `animate(element, params)` and keeps the returned
//! [`AnimationHandle`], which can be paused and whose [`Completion`] can be
//! awaited or polled.
//!
//! [`TweenEngine`] is the engine used by default: it interpolates numeric
//! style values with an easing curve, switches non-numeric values when the
//! animation completes, and is driven by [`AnimationEngine::tick`].

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::completion::{Completion, Outcome};
use crate::easing::EasingFunction;
use crate::events::AnimationEvent;
use crate::tree::ElementTree;
use crate::types::{AnimatableValue, AnimationId, AnimationParams, AnimationState, ElementId};

/// Handle to one animation started by an engine.
///
/// Clones refer to the same animation.
#[derive(Debug, Clone)]
pub struct AnimationHandle {
    id: AnimationId,
    element: ElementId,
    paused: Rc<Cell<bool>>,
    finished: Completion,
}

impl AnimationHandle {
    /// New pending handle. Engines create one per `animate` call.
    pub fn new(element: ElementId) -> Self {
        Self {
            id: AnimationId::new(),
            element,
            paused: Rc::new(Cell::new(false)),
            finished: Completion::new(),
        }
    }

    pub fn id(&self) -> AnimationId {
        self.id
    }

    pub fn element(&self) -> ElementId {
        self.element
    }

    /// Stop driving the element. The completion stays pending.
    pub fn pause(&self) {
        self.paused.set(true);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.get()
    }

    /// Completion settled when the animation ends.
    pub fn finished(&self) -> Completion {
        self.finished.clone()
    }

    /// Still pending and not paused.
    pub fn is_active(&self) -> bool {
        !self.is_paused() && self.finished.is_pending()
    }

    /// Pause and settle as canceled. Safe to call repeatedly.
    pub fn retire(&self) -> bool {
        self.pause();
        self.finished.cancel()
    }
}

/// Something that can animate element styles over time.
pub trait AnimationEngine: fmt::Debug {
    /// Start animating `element` towards `params`.
    ///
    /// Zero-duration, zero-delay params must be applied before returning, with
    /// the handle already settled.
    fn animate(
        &mut self,
        tree: &mut ElementTree,
        element: ElementId,
        params: &AnimationParams,
    ) -> AnimationHandle;

    /// Advance every running animation by `delta_ms`.
    fn tick(&mut self, tree: &mut ElementTree, delta_ms: f32);

    /// Events produced since the last call.
    fn drain_events(&mut self) -> Vec<AnimationEvent> {
        Vec::new()
    }

    /// Number of animations still held by the engine.
    fn active_count(&self) -> usize;
}

#[derive(Debug, Clone)]
struct Track {
    property: String,
    from: AnimatableValue,
    to: AnimatableValue,
}

#[derive(Debug)]
struct Tween {
    handle: AnimationHandle,
    tracks: Vec<Track>,
    duration_ms: f32,
    delay_ms: f32,
    elapsed_ms: f32,
    easing: EasingFunction,
    state: AnimationState,
}

impl Tween {
    fn progress(&self) -> f32 {
        let active = (self.elapsed_ms - self.delay_ms).max(0.0);
        if self.duration_ms > 0.0 {
            (active / self.duration_ms).clamp(0.0, 1.0)
        } else {
            1.0
        }
    }

    /// Advance time. Returns `true` while the tween still has work to do.
    fn advance(&mut self, delta_ms: f32) -> bool {
        self.elapsed_ms += delta_ms;
        if self.state == AnimationState::Pending && self.elapsed_ms >= self.delay_ms {
            self.state = AnimationState::Running;
        }
        if self.state == AnimationState::Running
            && self.elapsed_ms - self.delay_ms >= self.duration_ms
        {
            self.state = AnimationState::Finished;
        }
        self.state != AnimationState::Finished
    }

    /// Write current values. Returns `false` if the element is gone.
    fn write(&self, tree: &mut ElementTree) -> bool {
        if !tree.contains(self.handle.element()) {
            return false;
        }
        if self.state == AnimationState::Pending {
            return true;
        }
        let eased = self.easing.evaluate(self.progress());
        for track in &self.tracks {
            let value = if self.state == AnimationState::Finished {
                track.to.clone()
            } else {
                track.from.interpolate(&track.to, eased)
            };
            tree.set_style(self.handle.element(), track.property.clone(), value);
        }
        true
    }
}

/// Reference engine: time-driven tweens over tree styles.
#[derive(Debug, Default)]
pub struct TweenEngine {
    tweens: Vec<Tween>,
    events: Vec<AnimationEvent>,
}

impl TweenEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn reject(&mut self, handle: AnimationHandle, reason: String) -> AnimationHandle {
        trace!(element = %handle.element(), %reason, "animation rejected");
        self.events.push(AnimationEvent::Failed {
            animation_id: handle.id(),
            element: handle.element(),
            reason: reason.clone(),
        });
        handle.finished.settle(Outcome::Failed { reason });
        handle
    }
}

fn valid_time(ms: f32) -> bool {
    ms.is_finite() && ms >= 0.0
}

impl AnimationEngine for TweenEngine {
    fn animate(
        &mut self,
        tree: &mut ElementTree,
        element: ElementId,
        params: &AnimationParams,
    ) -> AnimationHandle {
        let handle = AnimationHandle::new(element);
        if !valid_time(params.duration_ms) || !valid_time(params.delay_ms) {
            let reason = format!(
                "invalid timing: duration {} ms, delay {} ms",
                params.duration_ms, params.delay_ms
            );
            return self.reject(handle, reason);
        }
        if !tree.contains(element) {
            return self.reject(handle, format!("element {element} does not exist"));
        }

        let tracks = params
            .values
            .iter()
            .map(|(property, to)| Track {
                property: property.clone(),
                from: tree
                    .style(element, property)
                    .cloned()
                    .unwrap_or_else(|| to.clone()),
                to: to.clone(),
            })
            .collect();
        self.events.push(AnimationEvent::Started {
            animation_id: handle.id(),
            element,
        });

        let mut tween = Tween {
            handle: handle.clone(),
            tracks,
            duration_ms: params.duration_ms,
            delay_ms: params.delay_ms,
            elapsed_ms: 0.0,
            easing: params.easing,
            state: if params.delay_ms > 0.0 {
                AnimationState::Pending
            } else {
                AnimationState::Running
            },
        };

        if params.is_instant() {
            tween.state = AnimationState::Finished;
            tween.write(tree);
            handle.finished.settle(Outcome::Finished);
            self.events.push(AnimationEvent::Ended {
                animation_id: handle.id(),
                element,
            });
            return handle;
        }

        self.tweens.push(tween);
        handle
    }

    fn tick(&mut self, tree: &mut ElementTree, delta_ms: f32) {
        let events = &mut self.events;
        self.tweens.retain_mut(|tween| {
            let id = tween.handle.id();
            let element = tween.handle.element();

            if !tween.handle.finished.is_pending() {
                events.push(AnimationEvent::Canceled {
                    animation_id: id,
                    element,
                });
                return false;
            }
            if tween.handle.is_paused() {
                return true;
            }

            let running = tween.advance(delta_ms);
            if !tween.write(tree) {
                let reason = format!("element {element} was destroyed mid-animation");
                events.push(AnimationEvent::Failed {
                    animation_id: id,
                    element,
                    reason: reason.clone(),
                });
                tween.handle.finished.settle(Outcome::Failed { reason });
                return false;
            }
            if !running {
                tween.handle.finished.settle(Outcome::Finished);
                events.push(AnimationEvent::Ended {
                    animation_id: id,
                    element,
                });
            }
            running
        });
    }

    fn drain_events(&mut self) -> Vec<AnimationEvent> {
        std::mem::take(&mut self.events)
    }

    fn active_count(&self) -> usize {
        self.tweens.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (ElementTree, ElementId) {
        let mut tree = ElementTree::new();
        let el = tree.create_element("div");
        let root = tree.root();
        tree.append_child(root, el).unwrap();
        tree.set_style(el, "opacity", 0.0.into());
        (tree, el)
    }

    fn opacity(tree: &ElementTree, el: ElementId) -> f64 {
        tree.style(el, "opacity").and_then(AnimatableValue::as_f64).unwrap()
    }

    #[test]
    fn test_tween_interpolates_and_finishes() {
        let (mut tree, el) = setup();
        let mut engine = TweenEngine::new();
        let params = AnimationParams::new()
            .set("opacity", 1.0)
            .with_duration(100.0)
            .with_easing(EasingFunction::Linear);

        let handle = engine.animate(&mut tree, el, &params);
        assert!(handle.is_active());

        engine.tick(&mut tree, 50.0);
        assert!((opacity(&tree, el) - 0.5).abs() < 1e-6);

        engine.tick(&mut tree, 50.0);
        assert_eq!(opacity(&tree, el), 1.0);
        assert_eq!(handle.finished().outcome(), Some(Outcome::Finished));
        assert_eq!(engine.active_count(), 0);

        let events = engine.drain_events();
        assert!(matches!(events[0], AnimationEvent::Started { .. }));
        assert!(matches!(events[1], AnimationEvent::Ended { .. }));
    }

    #[test]
    fn test_instant_params_settle_synchronously() {
        let (mut tree, el) = setup();
        let mut engine = TweenEngine::new();
        let handle = engine.animate(&mut tree, el, &AnimationParams::snapshot([("opacity", 0.4)]));
        assert_eq!(handle.finished().outcome(), Some(Outcome::Finished));
        assert_eq!(opacity(&tree, el), 0.4);
        assert_eq!(engine.active_count(), 0);
    }

    #[test]
    fn test_delay_holds_start_value() {
        let (mut tree, el) = setup();
        let mut engine = TweenEngine::new();
        let params = AnimationParams::new()
            .set("opacity", 1.0)
            .with_duration(100.0)
            .with_delay(40.0);
        let handle = engine.animate(&mut tree, el, &params);

        engine.tick(&mut tree, 30.0);
        assert_eq!(opacity(&tree, el), 0.0);
        engine.tick(&mut tree, 200.0);
        assert_eq!(opacity(&tree, el), 1.0);
        assert!(handle.finished().outcome().is_some_and(|o| o.is_finished()));
    }

    #[test]
    fn test_paused_tween_freezes() {
        let (mut tree, el) = setup();
        let mut engine = TweenEngine::new();
        let params = AnimationParams::new()
            .set("opacity", 1.0)
            .with_duration(100.0)
            .with_easing(EasingFunction::Linear);
        let handle = engine.animate(&mut tree, el, &params);

        engine.tick(&mut tree, 25.0);
        handle.pause();
        engine.tick(&mut tree, 500.0);
        assert!((opacity(&tree, el) - 0.25).abs() < 1e-6);
        assert!(handle.finished().is_pending());
        assert_eq!(engine.active_count(), 1);
    }

    #[test]
    fn test_retired_tween_is_dropped() {
        let (mut tree, el) = setup();
        let mut engine = TweenEngine::new();
        let handle = engine.animate(
            &mut tree,
            el,
            &AnimationParams::new().set("opacity", 1.0).with_duration(100.0),
        );
        assert!(handle.retire());
        assert!(!handle.retire());

        engine.tick(&mut tree, 16.0);
        assert_eq!(engine.active_count(), 0);
        let events = engine.drain_events();
        assert!(matches!(events.last(), Some(AnimationEvent::Canceled { .. })));
    }

    #[test]
    fn test_rejects_invalid_timing_and_missing_elements() {
        let (mut tree, el) = setup();
        let mut engine = TweenEngine::new();

        let bad = engine.animate(
            &mut tree,
            el,
            &AnimationParams::new().set("opacity", 1.0).with_duration(-5.0),
        );
        assert!(bad.finished().outcome().is_some_and(|o| o.is_failed()));

        let missing = engine.animate(&mut tree, ElementId(404), &AnimationParams::new());
        assert!(missing.finished().outcome().is_some_and(|o| o.is_failed()));
        assert_eq!(engine.active_count(), 0);
    }

    #[test]
    fn test_destroyed_element_fails_tween() {
        let (mut tree, el) = setup();
        let mut engine = TweenEngine::new();
        let handle = engine.animate(
            &mut tree,
            el,
            &AnimationParams::new().set("opacity", 1.0).with_duration(100.0),
        );
        tree.destroy(el).unwrap();
        engine.tick(&mut tree, 16.0);
        assert!(handle.finished().outcome().is_some_and(|o| o.is_failed()));
    }

    #[test]
    fn test_missing_start_value_starts_at_target() {
        let (mut tree, el) = setup();
        let mut engine = TweenEngine::new();
        engine.animate(
            &mut tree,
            el,
            &AnimationParams::new()
                .set("scale", 2.0)
                .with_duration(100.0)
                .with_easing(EasingFunction::Linear),
        );
        engine.tick(&mut tree, 10.0);
        assert_eq!(tree.style(el, "scale"), Some(&AnimatableValue::Number(2.0)));
    }
}
