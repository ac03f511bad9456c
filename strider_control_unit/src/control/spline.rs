//! Closed-form polynomial trajectory segments.
//!
//! All generators take a segment-local time `t`, clamped to [0, 1],
//! and return the position and velocity of a polynomial satisfying
//! the stated boundary conditions at `t = 0` and `t = 1`. The clamp
//! means a segment holds its boundary value when sampled outside its
//! span, which the gait code relies on for open-ended dwell times.
//! Callers scale time and velocities themselves.

/// Position and velocity sample of a trajectory segment.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sample {
    pub x: f64,
    pub xd: f64,
}

/// Quadratic segment through `(x0, v0)` at t=0 reaching `x1` at t=1.
///
/// The terminal velocity is whatever the parabola implies; only three
/// boundary conditions fit a quadratic.
#[inline]
pub fn quadratic(t: f64, x0: f64, v0: f64, x1: f64) -> Sample {
    let t = t.clamp(0.0, 1.0);
    let c = x0;
    let b = v0;
    let a = x1 - x0 - v0;
    Sample {
        x: (a * t + b) * t + c,
        xd: 2.0 * a * t + b,
    }
}

/// Cubic segment from `(x0, v0)` at t=0 to `(x1, v1)` at t=1.
#[inline]
pub fn cubic(t: f64, x0: f64, v0: f64, x1: f64, v1: f64) -> Sample {
    let t = t.clamp(0.0, 1.0);
    let d = x0;
    let c = v0;
    let dx = x1 - x0;
    let b = 3.0 * dx - 2.0 * v0 - v1;
    let a = v1 + v0 - 2.0 * dx;
    Sample {
        x: ((a * t + b) * t + c) * t + d,
        xd: (3.0 * a * t + 2.0 * b) * t + c,
    }
}

/// Quintic segment from `(x0, v0, a0)` at t=0 to `(x1, v1, a1)` at t=1.
#[inline]
pub fn quintic(t: f64, x0: f64, v0: f64, a0: f64, x1: f64, v1: f64, a1: f64) -> Sample {
    let t = t.clamp(0.0, 1.0);
    let f = x0;
    let e = v0;
    let d = 0.5 * a0;
    let y1 = x1 - d - e - f;
    let y2 = v1 - 2.0 * d - e;
    let y3 = a1 - 2.0 * d;
    let a = 6.0 * y1 - 3.0 * y2 + 0.5 * y3;
    let b = -15.0 * y1 + 7.0 * y2 - y3;
    let c = 10.0 * y1 - 4.0 * y2 + 0.5 * y3;
    Sample {
        x: ((((a * t + b) * t + c) * t + d) * t + e) * t + f,
        xd: (((5.0 * a * t + 4.0 * b) * t + 3.0 * c) * t + 2.0 * d) * t + e,
    }
}

/// Minimum-jerk point-to-point quintic from rest at `x0` to rest at
/// `x1`.
#[inline]
pub fn quintic_pp(t: f64, x0: f64, x1: f64) -> Sample {
    let t = t.clamp(0.0, 1.0);
    let t2 = t * t;
    let t3 = t2 * t;
    let dx = x1 - x0;
    Sample {
        x: dx * (6.0 * t2 - 15.0 * t + 10.0) * t3 + x0,
        xd: dx * (30.0 * t2 - 60.0 * t + 30.0) * t2,
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
