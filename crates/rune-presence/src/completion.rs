//! One-shot completion signal for animations.
//!
//! A [`Completion`] starts pending and settles exactly once with an
//! [`Outcome`]. Every clone observes the same settlement, and the value can be
//! awaited as a `Future`. Settling again is a no-op that reports `false`, so
//! cancel paths can call it freely.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

/// How an animation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outcome {
    /// Ran to its natural end.
    Finished,
    /// Stopped early by a cancel or a retirement.
    Canceled,
    /// The engine rejected or aborted the animation.
    Failed { reason: String },
}

impl Outcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Snapshot of a completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionState {
    Pending,
    Settled(Outcome),
}

#[derive(Default)]
struct Inner {
    outcome: Option<Outcome>,
    wakers: Vec<Waker>,
}

/// Shared, single-threaded completion cell.
#[derive(Clone, Default)]
pub struct Completion {
    inner: Rc<RefCell<Inner>>,
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("state", &self.state())
            .finish()
    }
}

impl Completion {
    /// A pending completion.
    pub fn new() -> Self {
        Self::default()
    }

    /// A completion that is already settled.
    pub fn settled(outcome: Outcome) -> Self {
        let completion = Self::new();
        completion.settle(outcome);
        completion
    }

    /// Settle with `outcome`. Returns `false` if it was already settled, in
    /// which case the first outcome is kept.
    pub fn settle(&self, outcome: Outcome) -> bool {
        let wakers = {
            let mut inner = self.inner.borrow_mut();
            if inner.outcome.is_some() {
                return false;
            }
            inner.outcome = Some(outcome);
            std::mem::take(&mut inner.wakers)
        };
        for waker in wakers {
            waker.wake();
        }
        true
    }

    /// Settle as [`Outcome::Canceled`].
    pub fn cancel(&self) -> bool {
        self.settle(Outcome::Canceled)
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.inner.borrow().outcome.clone()
    }

    pub fn is_pending(&self) -> bool {
        self.inner.borrow().outcome.is_none()
    }

    pub fn state(&self) -> CompletionState {
        match self.outcome() {
            Some(outcome) => CompletionState::Settled(outcome),
            None => CompletionState::Pending,
        }
    }

    /// Whether both values share the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Future for Completion {
    type Output = Outcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.inner.borrow_mut();
        if let Some(outcome) = &inner.outcome {
            return Poll::Ready(outcome.clone());
        }
        if !inner.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            inner.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}
