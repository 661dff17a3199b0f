//! Planar geometry helpers shared by hit-testing, polygon completion and rendering.
//!
//! All functions are pure and operate on image-space coordinates. Coordinates
//! are stored at integer pixel resolution but every computation is carried out
//! in `f64` so large rings cannot overflow.

use serde::{Deserialize, Serialize};

/// A coordinate in image space (source pixels, origin top-left).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImagePoint {
    pub x: i32,
    pub y: i32,
}

impl ImagePoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Round a fractional image coordinate to the nearest pixel.
    ///
    /// Halves round toward positive infinity so that `-0.5` maps to `0`, the
    /// same rule pointer conversion uses everywhere else.
    pub fn rounded(x: f64, y: f64) -> Self {
        Self {
            x: round_half_up(x),
            y: round_half_up(y),
        }
    }

    /// Calculate distance to another point.
    pub fn distance_to(&self, other: &ImagePoint) -> f64 {
        distance(*self, *other)
    }
}

impl From<(i32, i32)> for ImagePoint {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

fn round_half_up(value: f64) -> i32 {
    // Saturating cast; coordinates far outside i32 only happen for absurd zoom states.
    (value + 0.5).floor() as i32
}

/// Euclidean distance between two image points.
pub fn distance(a: ImagePoint, b: ImagePoint) -> f64 {
    let dx = f64::from(a.x) - f64::from(b.x);
    let dy = f64::from(a.y) - f64::from(b.y);
    dx.hypot(dy)
}

/// Signed shoelace area of a ring.
///
/// Positive for counter-clockwise rings in a y-up frame, which is clockwise on
/// screen since image space points y down. Rings with fewer than three
/// vertices have zero area.
pub fn signed_area(points: &[ImagePoint]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }

    let twice: f64 = (0..n)
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % n];
            f64::from(a.x) * f64::from(b.y) - f64::from(b.x) * f64::from(a.y)
        })
        .sum();

    twice / 2.0
}

/// Unsigned shoelace area of a ring in square pixels.
pub fn polygon_area(points: &[ImagePoint]) -> f64 {
    signed_area(points).abs()
}

/// Even-odd ray casting test with a horizontal ray toward +X.
///
/// Each edge is treated as half-open in Y, so a vertex shared by two edges is
/// counted once and horizontal edges never reach the division. Points exactly
/// on the boundary get a deterministic, but unspecified, answer.
pub fn point_in_polygon(point: ImagePoint, ring: &[ImagePoint]) -> bool {
    if ring.len() < 3 {
        return false;
    }

    let px = f64::from(point.x);
    let py = f64::from(point.y);

    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (xi, yi) = (f64::from(ring[i].x), f64::from(ring[i].y));
        let (xj, yj) = (f64::from(ring[j].x), f64::from(ring[j].y));

        if (yi > py) != (yj > py) {
            let crossing_x = (xj - xi) * (py - yi) / (yj - yi) + xi;
            if px < crossing_x {
                inside = !inside;
            }
        }
        j = i;
    }

    inside
}
