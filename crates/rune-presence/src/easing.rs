//! Timing curves for enter and exit animations.
//!
//! The named curves match their CSS counterparts, so params written for a web
//! build behave the same here.
//!
//! ```
//! use rune_presence::easing::EasingFunction;
//!
//! let eased = EasingFunction::EaseOut.evaluate(0.5);
//! assert!(eased > 0.5);
//! ```

use serde::{Deserialize, Serialize};

/// Maps linear progress in `[0, 1]` to eased progress.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EasingFunction {
    Linear,
    /// `cubic-bezier(0.25, 0.1, 0.25, 1.0)`
    #[default]
    Ease,
    /// `cubic-bezier(0.42, 0, 1, 1)`
    EaseIn,
    /// `cubic-bezier(0, 0, 0.58, 1)`
    EaseOut,
    /// `cubic-bezier(0.42, 0, 0.58, 1)`
    EaseInOut,
    /// Custom curve. `x1` and `x2` must lie in `[0, 1]`.
    CubicBezier { x1: f32, y1: f32, x2: f32, y2: f32 },
}

impl EasingFunction {
    /// Evaluate the curve at progress `t` (clamped to `[0, 1]`).
    pub fn evaluate(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self.control_points() {
            None => t,
            Some(curve) => curve.solve(t),
        }
    }

    /// Custom cubic bezier curve, with `x1`/`x2` clamped into `[0, 1]`.
    pub fn cubic_bezier(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self::CubicBezier {
            x1: x1.clamp(0.0, 1.0),
            y1,
            x2: x2.clamp(0.0, 1.0),
            y2,
        }
    }

    fn control_points(&self) -> Option<Bezier> {
        let (x1, y1, x2, y2) = match *self {
            Self::Linear => return None,
            Self::Ease => (0.25, 0.1, 0.25, 1.0),
            Self::EaseIn => (0.42, 0.0, 1.0, 1.0),
            Self::EaseOut => (0.0, 0.0, 0.58, 1.0),
            Self::EaseInOut => (0.42, 0.0, 0.58, 1.0),
            Self::CubicBezier { x1, y1, x2, y2 } => (x1, y1, x2, y2),
        };
        Some(Bezier { x1, y1, x2, y2 })
    }
}

/// Cubic bezier through (0,0) and (1,1) with two free control points.
#[derive(Debug, Clone, Copy)]
struct Bezier {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

impl Bezier {
    const NEWTON_STEPS: usize = 8;
    const EPSILON: f32 = 1e-6;

    fn solve(&self, x: f32) -> f32 {
        if x <= 0.0 {
            return 0.0;
        }
        if x >= 1.0 {
            return 1.0;
        }
        let t = self.parameter_for_x(x);
        Self::component(self.y1, self.y2, t)
    }

    /// Newton-Raphson search for the curve parameter whose x equals `x`.
    fn parameter_for_x(&self, x: f32) -> f32 {
        let mut t = x;
        for _ in 0..Self::NEWTON_STEPS {
            let error = Self::component(self.x1, self.x2, t) - x;
            if error.abs() < Self::EPSILON {
                break;
            }
            let slope = self.x_slope(t);
            if slope.abs() < Self::EPSILON {
                break;
            }
            t = (t - error / slope).clamp(0.0, 1.0);
        }
        t
    }

    /// 3(1-t)^2 t p1 + 3(1-t) t^2 p2 + t^3
    #[inline]
    fn component(p1: f32, p2: f32, t: f32) -> f32 {
        let inv = 1.0 - t;
        3.0 * inv * inv * t * p1 + 3.0 * inv * t * t * p2 + t * t * t
    }

    #[inline]
    fn x_slope(&self, t: f32) -> f32 {
        let inv = 1.0 - t;
        3.0 * inv * inv * self.x1 + 6.0 * inv * t * (self.x2 - self.x1) + 3.0 * t * t * (1.0 - self.x2)
    }
}
