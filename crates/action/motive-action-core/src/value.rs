//! Property values carried by keyframes and applied to targets.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::interp::{lerp_f32, lerp_vec2, lerp_vec3, lerp_vec4};

/// One property snapshot: the full set of animated properties at a keyframe.
///
/// All frames of one keyframe action carry the same key set, so any two
/// adjacent frames can be blended key-by-key.
pub type PropertyMap = HashMap<String, Value>;

#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ValueKind {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Color,
    Bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum Value {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    /// RGBA color
    Color([f32; 4]),
    /// Step-only boolean value (no blending)
    Bool(bool),
}

impl Value {
    #[inline]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Float(_) => ValueKind::Float,
            Value::Vec2(_) => ValueKind::Vec2,
            Value::Vec3(_) => ValueKind::Vec3,
            Value::Vec4(_) => ValueKind::Vec4,
            Value::Color(_) => ValueKind::Color,
            Value::Bool(_) => ValueKind::Bool,
        }
    }

    /// Component-wise blend at weight `t`. Bool holds the left value (step);
    /// mismatched kinds fall back to the left value (fail-soft).
    pub fn blend(&self, other: &Value, t: f32) -> Value {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => Value::Float(lerp_f32(*a, *b, t)),
            (Value::Vec2(a), Value::Vec2(b)) => Value::Vec2(lerp_vec2(*a, *b, t)),
            (Value::Vec3(a), Value::Vec3(b)) => Value::Vec3(lerp_vec3(*a, *b, t)),
            (Value::Vec4(a), Value::Vec4(b)) => Value::Vec4(lerp_vec4(*a, *b, t)),
            (Value::Color(a), Value::Color(b)) => Value::Color(lerp_vec4(*a, *b, t)),
            _ => self.clone(),
        }
    }
}

/// Blend two snapshots key-by-key at weight `t`.
///
/// Convenience for [`ActionTarget`](crate::target::ActionTarget)
/// implementations that have no cheaper way to apply a transition.
pub fn blend_snapshots(from: &PropertyMap, to: &PropertyMap, t: f32) -> PropertyMap {
    let mut out = PropertyMap::with_capacity(from.len());
    for (key, a) in from {
        match to.get(key) {
            Some(b) => out.insert(key.clone(), a.blend(b, t)),
            None => out.insert(key.clone(), a.clone()),
        };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_scalar_midpoint() {
        let v = Value::Float(2.0).blend(&Value::Float(4.0), 0.5);
        assert_eq!(v, Value::Float(3.0));
    }

    #[test]
    fn blend_bool_is_step() {
        let v = Value::Bool(false).blend(&Value::Bool(true), 0.9);
        assert_eq!(v, Value::Bool(false));
    }

    #[test]
    fn blend_mismatched_kinds_holds_left() {
        let v = Value::Float(1.0).blend(&Value::Vec2([0.0, 0.0]), 0.5);
        assert_eq!(v, Value::Float(1.0));
    }
}
