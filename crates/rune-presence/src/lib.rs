//! Presence orchestration for animated elements.
//!
//! Elements animate in when they are inserted and animate out before they are
//! removed. The crate provides:
//!
//! - [`AnimationController`]: enter, update and exit animations of one element
//! - [`PresenceContext`]: the exit registry and mount gate of one boundary
//! - [`PresenceBoundary`]: a single-child slot with parallel or
//!   exit-before-enter replacement
//! - [`GroupInterceptor`]: staggered entrances and deferred removals for a
//!   list container
//!
//! Everything runs on one thread against a [`Scene`], which owns the element
//! tree, the animation engine and the event queue. Components receive the
//! scene as `&mut Scene` per call.

pub mod completion;
pub mod controller;
pub mod easing;
pub mod engine;
pub mod error;
pub mod events;
pub mod group;
pub mod presence;
pub mod scene;
pub mod stagger;
pub mod transition;
pub mod tree;
pub mod types;

pub use completion::{Completion, CompletionState, Outcome};
pub use controller::{AnimationController, ControllerPhase, MotionOptions};
pub use easing::EasingFunction;
pub use engine::{AnimationEngine, AnimationHandle, TweenEngine};
pub use error::{PresenceError, Result};
pub use events::{AnimationEvent, EventQueue, PresenceEvent, SceneEvent};
pub use group::{BatchSummary, GroupInterceptor, GroupOptions};
pub use presence::{ElementDescriptor, PresenceContext, PresenceOptions};
pub use scene::{AnimationJobSet, MotionPolicy, Scene};
pub use stagger::{Stagger, StaggerDirection, StaggerPlan};
pub use transition::{PresenceBoundary, PresenceChild, TransitionState};
pub use tree::{ElementTree, MutationRecord, ObserverId};
pub use types::{AnimatableValue, AnimationId, AnimationParams, AnimationState, ElementId};
