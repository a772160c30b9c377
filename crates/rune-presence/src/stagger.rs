//! Stagger delays for batches of entering children.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Which child of a batch starts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaggerDirection {
    #[default]
    Forward,
    Reverse,
    /// Outwards from the middle child, `floor(n / 2)`.
    Center,
}

impl StaggerDirection {
    /// Position of child `index` in the start order of a batch of `total`.
    pub fn map_index(self, index: usize, total: usize) -> usize {
        match self {
            Self::Forward => index,
            Self::Reverse => total.saturating_sub(1).saturating_sub(index),
            Self::Center => (total / 2).abs_diff(index),
        }
    }
}

/// Delay function applied to mapped indices.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Stagger {
    #[default]
    None,
    /// `start_ms + each_ms * index`.
    Delay {
        each_ms: f32,
        #[serde(default)]
        start_ms: f32,
    },
    /// Arbitrary `f(index, total)`.
    #[serde(skip)]
    Custom(Rc<dyn Fn(usize, usize) -> f32>),
}

impl Stagger {
    pub fn each(each_ms: f32) -> Self {
        Self::Delay {
            each_ms,
            start_ms: 0.0,
        }
    }

    pub fn custom(f: impl Fn(usize, usize) -> f32 + 'static) -> Self {
        Self::Custom(Rc::new(f))
    }

    pub fn delay(&self, index: usize, total: usize) -> f32 {
        match self {
            Self::None => 0.0,
            Self::Delay { each_ms, start_ms } => start_ms + each_ms * index as f32,
            Self::Custom(f) => f(index, total),
        }
    }
}

impl fmt::Debug for Stagger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Delay { each_ms, start_ms } => f
                .debug_struct("Delay")
                .field("each_ms", each_ms)
                .field("start_ms", start_ms)
                .finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Stagger settings for one batch.
#[derive(Debug, Clone, Default)]
pub struct StaggerPlan {
    pub stagger: Stagger,
    pub direction: StaggerDirection,
}

impl StaggerPlan {
    pub fn new(stagger: Stagger, direction: StaggerDirection) -> Self {
        Self { stagger, direction }
    }

    /// Delay for child `index` of a batch of `total`. Negative or non-finite
    /// results clamp to zero.
    pub fn delay_for(&self, index: usize, total: usize) -> f32 {
        let mapped = self.direction.map_index(index, total);
        let delay = self.stagger.delay(mapped, total);
        if delay.is_finite() { delay.max(0.0) } else { 0.0 }
    }

    pub fn delays(&self, total: usize) -> Vec<f32> {
        (0..total).map(|i| self.delay_for(i, total)).collect()
    }
}
