//! Core value types shared by every part of the presence runtime.
//!
//! - `ElementId`: stable identity of an element in the [`ElementTree`](crate::tree::ElementTree)
//! - `AnimationId`: unique identifier for one animation started by an engine
//! - `AnimatableValue`: a style value an animation can drive
//! - `AnimationParams`: target values plus timing for one animation
//! - `AnimationState`: lifecycle of a single running animation

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::easing::EasingFunction;

/// Stable identity of an element in the tree.
///
/// Ids are never reused by a tree, so tables keyed by `ElementId` cannot
/// accidentally alias a newer element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Unique identifier for an animation instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnimationId(pub u64);

impl AnimationId {
    /// Generate a new unique animation ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for AnimationId {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle of a single animation inside an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationState {
    /// Waiting for its delay to elapse.
    #[default]
    Pending,
    /// Actively interpolating.
    Running,
    /// Reached its target.
    Finished,
}

/// Keyword used for "natural size" style values.
pub const AUTO: &str = "auto";

/// A style value an animation can drive.
///
/// Numbers interpolate; anything else switches discretely once the animation
/// completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnimatableValue {
    /// Numeric value (opacity, height in pixels, translate, ...).
    Number(f64),
    /// Keyword or string value (`auto`, colors, ...).
    Text(String),
}

impl AnimatableValue {
    /// The `auto` keyword.
    pub fn auto() -> Self {
        Self::Text(AUTO.to_string())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(_) => None,
        }
    }

    /// Whether this is the `auto` keyword.
    pub fn is_auto(&self) -> bool {
        matches!(self, Self::Text(text) if text.eq_ignore_ascii_case(AUTO))
    }

    /// Interpolate towards `to` at eased progress `t`.
    ///
    /// Non-numeric pairs hold `self` until `t` reaches 1.0.
    pub fn interpolate(&self, to: &Self, t: f32) -> Self {
        match (self, to) {
            (Self::Number(a), Self::Number(b)) => Self::Number(a + (b - a) * f64::from(t)),
            _ if t >= 1.0 => to.clone(),
            _ => self.clone(),
        }
    }
}

impl From<f64> for AnimatableValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for AnimatableValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AnimatableValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Target values and timing for one animation.
///
/// Used for `initial` snapshots, enter targets and exit targets alike. An
/// `initial` snapshot is simply applied with zero duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationParams {
    /// Property name to target value.
    pub values: BTreeMap<String, AnimatableValue>,
    /// Duration in milliseconds.
    pub duration_ms: f32,
    /// Delay before the animation starts in milliseconds.
    pub delay_ms: f32,
    /// Timing curve.
    pub easing: EasingFunction,
}

impl Default for AnimationParams {
    fn default() -> Self {
        Self {
            values: BTreeMap::new(),
            duration_ms: 300.0,
            delay_ms: 0.0,
            easing: EasingFunction::Ease,
        }
    }
}

impl AnimationParams {
    /// Empty params with the default timing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Params that apply `values` instantly.
    pub fn snapshot<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<AnimatableValue>,
    {
        Self {
            values: values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            duration_ms: 0.0,
            ..Self::default()
        }
    }

    /// Set a target value.
    pub fn set(mut self, property: impl Into<String>, value: impl Into<AnimatableValue>) -> Self {
        self.values.insert(property.into(), value.into());
        self
    }

    pub fn with_duration(mut self, duration_ms: f32) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_delay(mut self, delay_ms: f32) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn with_easing(mut self, easing: EasingFunction) -> Self {
        self.easing = easing;
        self
    }

    /// Copy of these params that applies instantly.
    pub fn instant(&self) -> Self {
        Self {
            duration_ms: 0.0,
            delay_ms: 0.0,
            ..self.clone()
        }
    }

    pub fn get(&self, property: &str) -> Option<&AnimatableValue> {
        self.values.get(property)
    }

    /// True when both duration and delay are zero.
    pub fn is_instant(&self) -> bool {
        self.duration_ms <= 0.0 && self.delay_ms <= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_animation_ids_are_unique() {
        let a = AnimationId::new();
        let b = AnimationId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_numeric_interpolation() {
        let from = AnimatableValue::Number(0.0);
        let to = AnimatableValue::Number(10.0);
        assert_eq!(from.interpolate(&to, 0.5), AnimatableValue::Number(5.0));
        assert_eq!(from.interpolate(&to, 1.0), AnimatableValue::Number(10.0));
    }

    #[test]
    fn test_discrete_values_switch_at_end() {
        let from = AnimatableValue::Number(120.0);
        let to = AnimatableValue::auto();
        assert_eq!(from.interpolate(&to, 0.99), from);
        assert!(from.interpolate(&to, 1.0).is_auto());
    }

    #[test]
    fn test_auto_keyword_is_case_insensitive() {
        assert!(AnimatableValue::from("AUTO").is_auto());
        assert!(!AnimatableValue::from("none").is_auto());
        assert!(!AnimatableValue::Number(0.0).is_auto());
    }

    #[test]
    fn test_params_builders() {
        let params = AnimationParams::new()
            .set("opacity", 1.0)
            .set("height", "auto")
            .with_duration(200.0)
            .with_delay(50.0)
            .with_easing(EasingFunction::EaseOut);

        assert_eq!(params.get("opacity"), Some(&AnimatableValue::Number(1.0)));
        assert!(params.get("height").is_some_and(AnimatableValue::is_auto));
        assert_eq!(params.duration_ms, 200.0);
        assert_eq!(params.delay_ms, 50.0);
        assert!(!params.is_instant());
        assert!(params.instant().is_instant());
    }

    #[test]
    fn test_params_deserialize_untagged_values() {
        let json = r#"{"values":{"opacity":0.0,"height":"auto"},"duration_ms":150.0}"#;
        let params: AnimationParams = serde_json::from_str(json).unwrap();
        assert_eq!(params.get("opacity"), Some(&AnimatableValue::Number(0.0)));
        assert!(params.get("height").is_some_and(AnimatableValue::is_auto));
        assert_eq!(params.duration_ms, 150.0);
        assert_eq!(params.delay_ms, 0.0);
    }
}
