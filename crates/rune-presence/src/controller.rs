//! Per-element animation controller.
//!
//! An [`AnimationController`] wraps one element and drives its enter, update
//! and exit behavior from a [`MotionOptions`] declaration:
//!
//! - `initial`: snapshot applied with zero duration before anything else
//! - `animate`: enter target, re-applied whenever it changes
//! - `exit`: exit target, registered with the enclosing boundary
//!
//! The host calls [`mount`](AnimationController::mount) when the element is
//! attached, [`set_animate`](AnimationController::set_animate) whenever the
//! declared target changes and [`unmount`](AnimationController::unmount) when
//! the element is about to be torn down.
//!
//! ```ignore
//! let ctx = boundary.context();
//! let mut controller = AnimationController::new(
//!     Some(card),
//!     MotionOptions::new()
//!         .initial(AnimationParams::snapshot([("opacity", 0.0)]))
//!         .animate(AnimationParams::new().set("opacity", 1.0))
//!         .exit(AnimationParams::new().set("opacity", 0.0)),
//!     Some(ctx),
//! );
//! controller.mount(&mut scene);
//! ```

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::presence::{ElementDescriptor, PresenceContext};
use crate::scene::Scene;
use crate::types::{AnimationParams, ElementId};

/// Declared animation states for one element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionOptions {
    pub initial: Option<AnimationParams>,
    pub animate: Option<AnimationParams>,
    pub exit: Option<AnimationParams>,
}

impl MotionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial(mut self, params: AnimationParams) -> Self {
        self.initial = Some(params);
        self
    }

    pub fn animate(mut self, params: AnimationParams) -> Self {
        self.animate = Some(params);
        self
    }

    pub fn exit(mut self, params: AnimationParams) -> Self {
        self.exit = Some(params);
        self
    }
}

/// Where a controller is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPhase {
    /// Not mounted yet.
    Detached,
    /// Mounted; the enter waits for the boundary's gate.
    AwaitingGate,
    /// Mounted and the enter has been applied.
    Entered,
    /// Unmounted.
    Unmounted,
}

#[derive(Debug)]
pub struct AnimationController {
    element: Option<ElementId>,
    options: MotionOptions,
    presence: Option<PresenceContext>,
    phase: ControllerPhase,
}

impl AnimationController {
    /// `element` may be `None`; every operation is then a no-op.
    pub fn new(
        element: Option<ElementId>,
        options: MotionOptions,
        presence: Option<PresenceContext>,
    ) -> Self {
        Self {
            element,
            options,
            presence,
            phase: ControllerPhase::Detached,
        }
    }

    pub fn element(&self) -> Option<ElementId> {
        self.element
    }

    pub fn options(&self) -> &MotionOptions {
        &self.options
    }

    pub fn presence(&self) -> Option<&PresenceContext> {
        self.presence.as_ref()
    }

    /// Current phase, accounting for a deferred enter the gate already ran.
    pub fn phase(&self) -> ControllerPhase {
        match (self.phase, self.element, &self.presence) {
            (ControllerPhase::AwaitingGate, Some(element), Some(ctx))
                if !ctx.is_deferred(element) =>
            {
                ControllerPhase::Entered
            }
            (phase, _, _) => phase,
        }
    }

    /// Descriptor this controller registers, if it declares an exit.
    pub fn descriptor(&self) -> Option<ElementDescriptor> {
        let element = self.element?;
        let exit = self.options.exit.clone()?;
        Some(ElementDescriptor::new(element, Some(exit)))
    }

    /// Apply `initial`, register the exit descriptor and start (or defer) the
    /// enter animation.
    pub fn mount(&mut self, scene: &mut Scene) {
        let Some(element) = self.element else {
            trace!("mount skipped: no element");
            return;
        };
        if !scene.tree().contains(element) {
            trace!(%element, "mount skipped: element missing");
            return;
        }
        if let Some(initial) = &self.options.initial {
            scene.snap(element, initial);
        }
        if let (Some(ctx), Some(descriptor)) = (&self.presence, self.descriptor()) {
            ctx.register(descriptor);
        }
        self.apply_enter(scene, element);
    }

    fn apply_enter(&mut self, scene: &mut Scene, element: ElementId) {
        let Some(params) = self.options.animate.clone() else {
            self.phase = ControllerPhase::Entered;
            return;
        };
        match &self.presence {
            Some(ctx) if ctx.should_snap() => {
                scene.snap(element, &params);
                self.phase = ControllerPhase::Entered;
            }
            Some(ctx) if !ctx.is_gate_open() => {
                ctx.defer_enter(scene, element, params);
                self.phase = ControllerPhase::AwaitingGate;
            }
            _ => {
                scene.start_enter(element, &params);
                self.phase = ControllerPhase::Entered;
            }
        }
    }

    /// Reactive update of the enter target.
    ///
    /// Unchanged params are ignored. Before mount the new params are stored;
    /// while the enter is deferred they replace the deferred params; after the
    /// first enter they animate immediately, retiring the previous animation.
    pub fn set_animate(&mut self, scene: &mut Scene, params: AnimationParams) {
        if self.options.animate.as_ref() == Some(&params) {
            return;
        }
        self.options.animate = Some(params.clone());
        let Some(element) = self.element else {
            return;
        };
        match self.phase() {
            ControllerPhase::Detached | ControllerPhase::Unmounted => {}
            ControllerPhase::AwaitingGate => {
                if let Some(ctx) = &self.presence {
                    ctx.defer_enter(scene, element, params);
                }
            }
            ControllerPhase::Entered => {
                self.phase = ControllerPhase::Entered;
                scene.start_enter(element, &params);
            }
        }
    }

    /// Replace the exit target, keeping the registry in sync while mounted.
    pub fn set_exit(&mut self, params: Option<AnimationParams>) {
        self.options.exit = params;
        let (Some(element), Some(ctx)) = (self.element, &self.presence) else {
            return;
        };
        if !matches!(
            self.phase,
            ControllerPhase::AwaitingGate | ControllerPhase::Entered
        ) {
            return;
        }
        match self.descriptor() {
            Some(descriptor) => ctx.register(descriptor),
            None => {
                ctx.unregister(element);
            }
        }
    }

    /// Tear down.
    ///
    /// Without an exit the controller unregisters itself, drops a deferred
    /// enter and pauses its enter animation. With an exit the enclosing
    /// boundary or group owns the element's removal, so nothing is touched.
    pub fn unmount(&mut self, scene: &mut Scene) {
        let previous = std::mem::replace(&mut self.phase, ControllerPhase::Unmounted);
        let Some(element) = self.element else {
            return;
        };
        if previous == ControllerPhase::Unmounted || self.options.exit.is_some() {
            return;
        }
        if let Some(ctx) = &self.presence {
            ctx.unregister(element);
            ctx.cancel_deferred(element);
        }
        scene.retire_enter(element);
        trace!(%element, "controller unmounted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::Outcome;
    use crate::easing::EasingFunction;
    use crate::events::{PresenceEvent, SceneEvent};
    use crate::presence::PresenceOptions;
    use crate::types::AnimatableValue;

    fn attached(scene: &mut Scene) -> ElementId {
        let el = scene.tree_mut().create_element("div");
        let root = scene.tree().root();
        scene.tree_mut().append_child(root, el).unwrap();
        el
    }

    fn fade_in() -> MotionOptions {
        MotionOptions::new()
            .initial(AnimationParams::snapshot([("opacity", 0.0)]))
            .animate(
                AnimationParams::new()
                    .set("opacity", 1.0)
                    .with_duration(100.0)
                    .with_easing(EasingFunction::Linear),
            )
    }

    fn opacity(scene: &Scene, el: ElementId) -> Option<f64> {
        scene.tree().style(el, "opacity").and_then(AnimatableValue::as_f64)
    }

    #[test]
    fn test_mount_without_boundary_enters_immediately() {
        let mut scene = Scene::default();
        let el = attached(&mut scene);
        let mut controller = AnimationController::new(Some(el), fade_in(), None);

        controller.mount(&mut scene);
        assert_eq!(controller.phase(), ControllerPhase::Entered);
        assert_eq!(opacity(&scene, el), Some(0.0));
        assert!(scene.is_animating(el));

        scene.tick(50.0);
        assert!((opacity(&scene, el).unwrap() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_initial_applied_before_enter() {
        let mut scene = Scene::default();
        let el = attached(&mut scene);
        scene.tree_mut().set_style(el, "opacity", 0.8.into());
        let mut controller = AnimationController::new(Some(el), fade_in(), None);
        controller.mount(&mut scene);

        // The enter starts from the snapshot, not from the stale 0.8.
        scene.tick(10.0);
        assert!((opacity(&scene, el).unwrap() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_missing_element_is_a_no_op() {
        let mut scene = Scene::default();
        let mut controller = AnimationController::new(None, fade_in(), None);
        controller.mount(&mut scene);
        controller.set_animate(&mut scene, AnimationParams::new());
        controller.unmount(&mut scene);
        assert!(scene.events().is_empty());
    }

    #[test]
    fn test_closed_gate_defers_enter() {
        let mut scene = Scene::default();
        let el = attached(&mut scene);
        let ctx = PresenceContext::new(PresenceOptions::default());
        ctx.close_gate();

        let mut controller = AnimationController::new(Some(el), fade_in(), Some(ctx.clone()));
        controller.mount(&mut scene);
        assert_eq!(controller.phase(), ControllerPhase::AwaitingGate);
        assert!(!scene.is_animating(el));

        ctx.open_gate(&mut scene);
        assert_eq!(controller.phase(), ControllerPhase::Entered);
        assert!(scene.is_animating(el));
    }

    #[test]
    fn test_update_while_deferred_replaces_target() {
        let mut scene = Scene::default();
        let el = attached(&mut scene);
        let ctx = PresenceContext::new(PresenceOptions::default());
        ctx.close_gate();

        let mut controller = AnimationController::new(Some(el), fade_in(), Some(ctx.clone()));
        controller.mount(&mut scene);
        controller.set_animate(
            &mut scene,
            AnimationParams::snapshot([("opacity", 0.3)]),
        );
        ctx.open_gate(&mut scene);
        assert_eq!(opacity(&scene, el), Some(0.3));
    }

    #[test]
    fn test_reactive_update_retires_previous_enter() {
        let mut scene = Scene::default();
        let el = attached(&mut scene);
        let mut controller = AnimationController::new(Some(el), fade_in(), None);
        controller.mount(&mut scene);
        let first = scene.jobs(el).unwrap().enter().unwrap().clone();

        controller.set_animate(
            &mut scene,
            AnimationParams::new().set("opacity", 0.5).with_duration(100.0),
        );
        assert_eq!(first.finished().outcome(), Some(Outcome::Canceled));
        assert_ne!(scene.jobs(el).unwrap().enter().unwrap().id(), first.id());

        let enters = scene
            .drain_events()
            .into_iter()
            .filter(SceneEvent::is_enter_started)
            .count();
        assert_eq!(enters, 2);

        // Same params again: nothing happens.
        controller.set_animate(
            &mut scene,
            AnimationParams::new().set("opacity", 0.5).with_duration(100.0),
        );
        assert!(scene.events().is_empty());
    }

    #[test]
    fn test_initial_false_boundary_snaps_first_render() {
        let mut scene = Scene::default();
        let el = attached(&mut scene);
        let ctx = PresenceContext::new(PresenceOptions {
            initial: false,
            ..PresenceOptions::default()
        });
        let mut controller = AnimationController::new(Some(el), fade_in(), Some(ctx));
        controller.mount(&mut scene);
        assert_eq!(opacity(&scene, el), Some(1.0));
        assert!(!scene.is_animating(el));
    }

    #[test]
    fn test_exit_registration_and_unmount() {
        let mut scene = Scene::default();
        let with_exit = attached(&mut scene);
        let without_exit = attached(&mut scene);
        let ctx = PresenceContext::new(PresenceOptions::default());

        let mut exiting = AnimationController::new(
            Some(with_exit),
            fade_in().exit(AnimationParams::new().set("opacity", 0.0)),
            Some(ctx.clone()),
        );
        let mut plain = AnimationController::new(Some(without_exit), fade_in(), Some(ctx.clone()));
        exiting.mount(&mut scene);
        plain.mount(&mut scene);
        assert!(ctx.has_exit(with_exit));
        assert!(!ctx.has_exit(without_exit));

        exiting.unmount(&mut scene);
        assert!(ctx.has_exit(with_exit), "boundary owns unregistering");
        assert!(scene.is_animating(with_exit));

        plain.unmount(&mut scene);
        assert!(!scene.is_animating(without_exit));
    }

    #[test]
    fn test_unmount_drops_deferred_enter() {
        let mut scene = Scene::default();
        let el = attached(&mut scene);
        let ctx = PresenceContext::new(PresenceOptions::default());
        ctx.close_gate();
        let mut controller = AnimationController::new(Some(el), fade_in(), Some(ctx.clone()));
        controller.mount(&mut scene);
        controller.unmount(&mut scene);

        assert!(ctx.open_gate(&mut scene).is_empty());
        assert_eq!(controller.phase(), ControllerPhase::Unmounted);
    }

    #[test]
    fn test_set_exit_updates_registry() {
        let mut scene = Scene::default();
        let el = attached(&mut scene);
        let ctx = PresenceContext::new(PresenceOptions::default());
        let mut controller = AnimationController::new(Some(el), fade_in(), Some(ctx.clone()));
        controller.mount(&mut scene);
        assert!(!ctx.has_exit(el));

        controller.set_exit(Some(AnimationParams::new().set("opacity", 0.0)));
        assert!(ctx.has_exit(el));
        controller.set_exit(None);
        assert!(!ctx.has_exit(el));
    }

    #[test]
    fn test_exit_via_descriptor() {
        let mut scene = Scene::default();
        let el = attached(&mut scene);
        let ctx = PresenceContext::new(PresenceOptions::default());
        let mut controller = AnimationController::new(
            Some(el),
            fade_in().exit(AnimationParams::new().set("opacity", 0.0).with_duration(50.0)),
            Some(ctx.clone()),
        );
        controller.mount(&mut scene);

        let descriptor = ctx.descriptor(el).unwrap();
        let completion = descriptor.play_exit(&mut scene);
        assert!(completion.is_pending());
        scene.tick(50.0);
        assert_eq!(completion.outcome(), Some(Outcome::Finished));
        assert!(
            scene
                .drain_events()
                .iter()
                .any(|e| matches!(e, SceneEvent::Presence(PresenceEvent::ExitCompleted { .. })))
        );
    }
}
