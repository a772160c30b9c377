//! Lifecycle events emitted while elements enter, exit and get finalized.
//!
//! Engines report [`AnimationEvent`]s for individual animations; the presence
//! runtime reports [`PresenceEvent`]s for element lifecycle steps. Both are
//! queued on the [`Scene`](crate::scene::Scene) and drained by the host after
//! each frame:
//!
//! ```ignore
//! scene.tick(16.0);
//! boundary.poll(&mut scene);
//! for event in scene.drain_events() {
//!     if let SceneEvent::Presence(PresenceEvent::Finalized { element }) = event {
//!         println!("{element} left the tree");
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::completion::Outcome;
use crate::types::{AnimationId, ElementId};

/// Event emitted by an animation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnimationEvent {
    Started {
        animation_id: AnimationId,
        element: ElementId,
    },
    Ended {
        animation_id: AnimationId,
        element: ElementId,
    },
    /// Stopped early, usually because a newer animation retired it.
    Canceled {
        animation_id: AnimationId,
        element: ElementId,
    },
    /// The engine rejected or aborted the animation.
    Failed {
        animation_id: AnimationId,
        element: ElementId,
        reason: String,
    },
}

impl AnimationEvent {
    pub fn element(&self) -> ElementId {
        match self {
            Self::Started { element, .. }
            | Self::Ended { element, .. }
            | Self::Canceled { element, .. }
            | Self::Failed { element, .. } => *element,
        }
    }

    pub fn animation_id(&self) -> AnimationId {
        match self {
            Self::Started { animation_id, .. }
            | Self::Ended { animation_id, .. }
            | Self::Canceled { animation_id, .. }
            | Self::Failed { animation_id, .. } => *animation_id,
        }
    }
}

/// Element lifecycle step reported by the presence runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PresenceEvent {
    /// An enter animation started (after any stagger delay is scheduled).
    EnterStarted {
        element: ElementId,
        animation_id: AnimationId,
        delay_ms: f32,
    },
    /// The enter animation is waiting for the boundary's mount gate.
    EnterDeferred { element: ElementId },
    ExitStarted {
        element: ElementId,
        animation_id: AnimationId,
    },
    /// The exit animation reached a terminal outcome on its own.
    ExitCompleted { element: ElementId, outcome: Outcome },
    /// The exit animation was canceled before it completed.
    ExitCanceled { element: ElementId },
    /// An exiting element was taken back by new content for the same slot.
    Reclaimed { element: ElementId },
    /// The element was permanently detached.
    Finalized { element: ElementId },
}

impl PresenceEvent {
    pub fn element(&self) -> ElementId {
        match self {
            Self::EnterStarted { element, .. }
            | Self::EnterDeferred { element }
            | Self::ExitStarted { element, .. }
            | Self::ExitCompleted { element, .. }
            | Self::ExitCanceled { element }
            | Self::Reclaimed { element }
            | Self::Finalized { element } => *element,
        }
    }
}

/// Either kind of event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SceneEvent {
    Animation(AnimationEvent),
    Presence(PresenceEvent),
}

impl SceneEvent {
    pub fn element(&self) -> ElementId {
        match self {
            Self::Animation(e) => e.element(),
            Self::Presence(e) => e.element(),
        }
    }

    pub fn is_enter_started(&self) -> bool {
        matches!(self, Self::Presence(PresenceEvent::EnterStarted { .. }))
    }

    pub fn is_exit_started(&self) -> bool {
        matches!(self, Self::Presence(PresenceEvent::ExitStarted { .. }))
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self, Self::Presence(PresenceEvent::Finalized { .. }))
    }
}

impl From<AnimationEvent> for SceneEvent {
    fn from(event: AnimationEvent) -> Self {
        Self::Animation(event)
    }
}

impl From<PresenceEvent> for SceneEvent {
    fn from(event: PresenceEvent) -> Self {
        Self::Presence(event)
    }
}

/// FIFO of scene events.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<SceneEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: impl Into<SceneEvent>) {
        self.events.push_back(event.into());
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn pop(&mut self) -> Option<SceneEvent> {
        self.events.pop_front()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = SceneEvent> + '_ {
        self.events.drain(..)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SceneEvent> {
        self.events.iter()
    }

    /// Pending events concerning `element`.
    pub fn events_for(&self, element: ElementId) -> Vec<&SceneEvent> {
        self.events
            .iter()
            .filter(|e| e.element() == element)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_accessors() {
        let event = AnimationEvent::Failed {
            animation_id: AnimationId(7),
            element: ElementId(3),
            reason: "detached".to_string(),
        };
        assert_eq!(event.element(), ElementId(3));
        assert_eq!(event.animation_id(), AnimationId(7));

        let presence = SceneEvent::from(PresenceEvent::Finalized {
            element: ElementId(4),
        });
        assert_eq!(presence.element(), ElementId(4));
        assert!(presence.is_finalized());
        assert!(!presence.is_exit_started());
    }

    #[test]
    fn test_queue_order_and_filtering() {
        let mut queue = EventQueue::new();
        queue.push(PresenceEvent::EnterDeferred {
            element: ElementId(1),
        });
        queue.push(AnimationEvent::Started {
            animation_id: AnimationId(2),
            element: ElementId(2),
        });
        queue.push(PresenceEvent::ExitCanceled {
            element: ElementId(1),
        });

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.events_for(ElementId(1)).len(), 2);
        assert!(matches!(
            queue.pop(),
            Some(SceneEvent::Presence(PresenceEvent::EnterDeferred { .. }))
        ));
        let rest: Vec<_> = queue.drain().collect();
        assert_eq!(rest.len(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_event_serialization() {
        let event = SceneEvent::Presence(PresenceEvent::ExitCompleted {
            element: ElementId(9),
            outcome: Outcome::Finished,
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("exit_completed"));
        assert!(json.contains("presence"));
        let back: SceneEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
