//! Easing curves and interpolation helpers.
//!
//! A [`Curve`] maps normalized time `x` in [0,1] to normalized progress `y`
//! in [0,1]. Cubic-bezier timing inverts the x polynomial by bisection; the
//! tolerance is supplied by the caller.

use serde::{Deserialize, Serialize};

/// Linear interpolation of scalars.
#[inline]
pub fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
pub fn lerp_vec2(a: [f32; 2], b: [f32; 2], t: f32) -> [f32; 2] {
    [lerp_f32(a[0], b[0], t), lerp_f32(a[1], b[1], t)]
}

#[inline]
pub fn lerp_vec3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        lerp_f32(a[0], b[0], t),
        lerp_f32(a[1], b[1], t),
        lerp_f32(a[2], b[2], t),
    ]
}

#[inline]
pub fn lerp_vec4(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    [
        lerp_f32(a[0], b[0], t),
        lerp_f32(a[1], b[1], t),
        lerp_f32(a[2], b[2], t),
        lerp_f32(a[3], b[3], t),
    ]
}

/// Normalized easing curve for one keyframe segment.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind")]
pub enum Curve {
    /// Identity timing.
    Linear,
    /// Hold at 0 until the segment completes.
    Step,
    /// Cubic-bezier timing with control points (x1, y1) and (x2, y2),
    /// endpoints fixed at (0,0) and (1,1).
    CubicBezier { x1: f32, y1: f32, x2: f32, y2: f32 },
}

/// The default easing used when adding frames (CSS `ease`).
pub const EASE: Curve = Curve::CubicBezier {
    x1: 0.25,
    y1: 0.1,
    x2: 0.25,
    y2: 1.0,
};

impl Default for Curve {
    fn default() -> Self {
        EASE
    }
}

impl Curve {
    /// Evaluate the curve at `x` in [0,1], returning `y` in [0,1].
    pub fn evaluate(&self, x: f32, tolerance: f32) -> f32 {
        let x = x.clamp(0.0, 1.0);
        match *self {
            Curve::Linear => x,
            Curve::Step => {
                if x >= 1.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Curve::CubicBezier { x1, y1, x2, y2 } => bezier_solve(x, x1, y1, x2, y2, tolerance),
        }
    }
}

/// Cubic Bezier basis function with endpoints p0/p3.
#[inline]
fn cubic_bezier(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
    let u = 1.0 - t;
    u * u * u * p0 + 3.0 * u * u * t * p1 + 3.0 * u * t * t * p2 + t * t * t * p3
}

/// Invert the x bezier by binary search, then evaluate y at the found t.
/// Monotonic x in [0,1] is assumed for x1/x2 in [0,1].
#[inline]
fn bezier_solve(x: f32, x1: f32, y1: f32, x2: f32, y2: f32, tolerance: f32) -> f32 {
    // Fast path: Bezier(0,0,1,1) is exactly linear.
    if x1 == 0.0 && y1 == 0.0 && x2 == 1.0 && y2 == 1.0 {
        return x;
    }
    let mut lo = 0.0f32;
    let mut hi = 1.0f32;
    let mut mid = x;
    for _ in 0..32 {
        let cx = cubic_bezier(0.0, x1, x2, 1.0, mid);
        if (cx - x).abs() < tolerance {
            break;
        }
        if cx < x {
            lo = mid;
        } else {
            hi = mid;
        }
        mid = 0.5 * (lo + hi);
    }
    cubic_bezier(0.0, y1, y2, 1.0, mid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32, eps: f32) {
        assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
    }

    #[test]
    fn linear_is_identity() {
        approx(Curve::Linear.evaluate(0.25, 1e-3), 0.25, 1e-6);
        approx(Curve::Linear.evaluate(1.5, 1e-3), 1.0, 1e-6);
    }

    #[test]
    fn step_holds_until_end() {
        approx(Curve::Step.evaluate(0.99, 1e-3), 0.0, 1e-6);
        approx(Curve::Step.evaluate(1.0, 1e-3), 1.0, 1e-6);
    }

    #[test]
    fn bezier_endpoints_fixed() {
        approx(EASE.evaluate(0.0, 1e-4), 0.0, 1e-3);
        approx(EASE.evaluate(1.0, 1e-4), 1.0, 1e-3);
    }

    #[test]
    fn bezier_linear_controls_match_identity() {
        let c = Curve::CubicBezier {
            x1: 0.0,
            y1: 0.0,
            x2: 1.0,
            y2: 1.0,
        };
        for i in 0..=10 {
            let x = i as f32 / 10.0;
            approx(c.evaluate(x, 1e-4), x, 1e-3);
        }
    }
}
