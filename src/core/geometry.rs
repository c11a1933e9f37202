//! Planar geometry in screen coordinates (x right, y down).
//!
//! Orientations follow the arena convention: 0 points right, π/2 points up,
//! so a heading vector is `(cos θ, -sin θ)`. Angles relative to a heading are
//! negative to the left (counter-clockwise) and positive to the right.

use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn dot(&self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y
    }

    /// z component of the 3D cross product. Positive when `rhs` is clockwise
    /// of `self` on screen.
    #[inline]
    pub fn cross(&self, rhs: Self) -> f64 {
        self.x * rhs.y - self.y * rhs.x
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.dot(*self).sqrt()
    }

    #[inline]
    pub fn distance(&self, other: Self) -> f64 {
        (*self - other).length()
    }
}

impl Add for Vec2 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: f64) -> Self::Output {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Vec2 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y)
    }
}

/// Unit heading for an orientation.
#[inline]
pub fn heading(orientation: f64) -> Vec2 {
    Vec2::new(orientation.cos(), -orientation.sin())
}

/// Signed angle from `dir` to `v` in `[-π, π]`, negative to the left.
#[inline]
pub fn relative_angle(dir: Vec2, v: Vec2) -> f64 {
    dir.cross(v).atan2(dir.dot(v))
}

/// Orientation (same convention as agents) of the vector `v`, in `[0, 2π)`.
#[inline]
pub fn global_angle(v: Vec2) -> f64 {
    wrap_angle((-v.y).atan2(v.x))
}

#[inline]
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// Smallest signed difference `a - b` in `(-π, π]`.
#[inline]
pub fn angle_difference(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(TAU);
    if d > PI {
        d - TAU
    } else {
        d
    }
}

/// Intersection of the infinite lines through `a1, a2` and `b1, b2`.
pub fn line_intersection(a1: Vec2, a2: Vec2, b1: Vec2, b2: Vec2) -> Option<Vec2> {
    let da = a2 - a1;
    let db = b2 - b1;
    let denom = da.cross(db);
    if denom.abs() < f64::EPSILON {
        return None;
    }
    let t = (b1 - a1).cross(db) / denom;
    Some(a1 + da * t)
}

pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

#[inline]
pub fn circles_overlap(a: Vec2, ra: f64, b: Vec2, rb: f64) -> bool {
    a.distance(b) < ra + rb
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_heading_convention() {
        let up = heading(PI / 2.0);
        assert!((up.x).abs() < EPS);
        assert!((up.y + 1.0).abs() < EPS);
    }

    #[test]
    fn test_relative_angle_sign() {
        let facing_right = heading(0.0);
        // Screen-up is to the agent's left.
        assert!((relative_angle(facing_right, Vec2::new(0.0, -1.0)) + PI / 2.0).abs() < EPS);
        assert!((relative_angle(facing_right, Vec2::new(0.0, 1.0)) - PI / 2.0).abs() < EPS);
        assert!(relative_angle(facing_right, Vec2::new(5.0, 0.0)).abs() < EPS);
    }

    #[test]
    fn test_global_angle_matches_heading() {
        for theta in [0.0, 0.3, PI / 2.0, PI, 4.0, 6.0] {
            assert!((global_angle(heading(theta)) - theta).abs() < 1e-9);
        }
    }

    #[test]
    fn test_line_intersection() {
        let p = line_intersection(
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(5.0, 5.0),
            Vec2::new(5.0, 4.0),
        )
        .unwrap();
        assert!((p.x - 5.0).abs() < EPS);
        assert!(p.y.abs() < EPS);

        assert!(line_intersection(
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 1.0),
        )
        .is_none());
    }

    #[test]
    fn test_linspace_and_wrap() {
        assert_eq!(linspace(-1.0, 1.0, 3), vec![-1.0, 0.0, 1.0]);
        assert_eq!(linspace(2.0, 3.0, 1), vec![2.0]);
        assert!((wrap_angle(-PI / 2.0) - 1.5 * PI).abs() < EPS);
        assert!((angle_difference(0.1, TAU - 0.1) - 0.2).abs() < EPS);
    }
}
