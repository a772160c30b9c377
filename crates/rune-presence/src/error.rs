//! Error types for the structural tree API.

use thiserror::Error;

use crate::types::ElementId;

/// Result type for tree operations.
pub type Result<T> = std::result::Result<T, PresenceError>;

/// Errors returned by [`ElementTree`](crate::tree::ElementTree) mutations.
///
/// Orchestrator components never surface these to their callers; they log
/// them and fall back to a safe default.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PresenceError {
    /// The element does not exist in the tree.
    #[error("unknown element {0}")]
    UnknownElement(ElementId),

    /// The reference node for an insertion is not a child of the parent.
    #[error("{child} is not a child of {parent}")]
    NotAChild { parent: ElementId, child: ElementId },

    /// The insertion would make an element its own ancestor.
    #[error("inserting {child} under {parent} would create a cycle")]
    HierarchyCycle { parent: ElementId, child: ElementId },

    /// The root element cannot be moved or removed.
    #[error("the root element cannot be detached")]
    DetachRoot,
}
