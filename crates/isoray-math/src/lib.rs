#![warn(missing_docs)]

//! Math types for the isoray ray casting kernel.
//!
//! Thin wrappers around nalgebra providing domain-specific types for 2D
//! isogeometric rendering: points, vectors, the 2x2 Jacobian, the clamped
//! spline parameter interval, RGBA colors and tolerance constants.

use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul};

/// A point in 2D geometry or parameter space.
pub type Point2 = nalgebra::Point2<f64>;

/// A vector in 2D space.
pub type Vec2 = Vector2<f64>;

/// A 2x2 matrix (Jacobians of the geometry map).
pub type Mat2 = Matrix2<f64>;

/// Upper bound of the working parameter interval.
///
/// The spline evaluator is degenerate exactly at the last knot, so the
/// domain is clamped strictly below it.
pub const SPLINE_UPPER: f64 = 0.99999;

/// A closed parameter interval `[min, max]` applied to both `u` and `v`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamInterval {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
}

impl ParamInterval {
    /// Create an interval. Bounds are swapped if given in reverse order.
    pub fn new(min: f64, max: f64) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// Clamp a scalar into the interval.
    #[inline]
    pub fn clamp(&self, x: f64) -> f64 {
        x.clamp(self.min, self.max)
    }

    /// Clamp both coordinates of a parameter point independently.
    #[inline]
    pub fn clamp_point(&self, p: Point2) -> Point2 {
        Point2::new(self.clamp(p.x), self.clamp(p.y))
    }

    /// Whether `x` lies in the interval.
    pub fn contains(&self, x: f64) -> bool {
        x >= self.min && x <= self.max
    }

    /// Whether both coordinates of `p` lie in the interval.
    pub fn contains_point(&self, p: &Point2) -> bool {
        self.contains(p.x) && self.contains(p.y)
    }

    /// `n` evenly spaced values from `min` to `max` inclusive.
    pub fn linspace(&self, n: usize) -> Vec<f64> {
        linspace(self.min, self.max, n)
    }
}

impl Default for ParamInterval {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: SPLINE_UPPER,
        }
    }
}

/// `n` evenly spaced values from `start` to `end` inclusive.
///
/// Returns `[start]` for `n == 1` and an empty vector for `n == 0`.
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

/// An RGBA color with components in `[0, 1]`. Straight alpha unless stated otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rgba {
    /// Red.
    pub r: f64,
    /// Green.
    pub g: f64,
    /// Blue.
    pub b: f64,
    /// Opacity.
    pub a: f64,
}

impl Rgba {
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    /// Create a color from components.
    pub const fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Components as an array `[r, g, b, a]`.
    pub fn to_array(self) -> [f64; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Linear interpolation `self + t * (other - self)`.
    pub fn lerp(self, other: Self, t: f64) -> Self {
        self + (other + self * -1.0) * t
    }

    /// Euclidean distance over all four components.
    pub fn distance(&self, other: &Self) -> f64 {
        let d = [
            self.r - other.r,
            self.g - other.g,
            self.b - other.b,
            self.a - other.a,
        ];
        d.iter().map(|x| x * x).sum::<f64>().sqrt()
    }

    /// Convert to 8-bit channels, clamping to `[0, 1]` first.
    pub fn to_rgba8(self) -> [u8; 4] {
        self.to_array()
            .map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
    }
}

impl Add for Rgba {
    type Output = Rgba;

    fn add(self, rhs: Rgba) -> Rgba {
        Rgba::new(self.r + rhs.r, self.g + rhs.g, self.b + rhs.b, self.a + rhs.a)
    }
}

impl Mul<f64> for Rgba {
    type Output = Rgba;

    fn mul(self, s: f64) -> Rgba {
        Rgba::new(self.r * s, self.g * s, self.b * s, self.a * s)
    }
}

/// Tolerance constants for numeric comparisons.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Distance tolerance in geometry space.
    pub linear: f64,
}

impl Tolerance {
    /// Default tolerances.
    pub const DEFAULT: Self = Self {
        linear: 1e-9,
    };

    /// Check if two geometry points are coincident within tolerance.
    pub fn points_equal(&self, a: &Point2, b: &Point2) -> bool {
        (a - b).norm() < self.linear
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// 2D cross product (z component of the 3D cross product).
#[inline]
pub fn cross2(a: &Vec2, b: &Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Unit vector perpendicular to `d` (rotated counter-clockwise).
#[inline]
pub fn perp(d: &Vec2) -> Vec2 {
    Vec2::new(-d.y, d.x)
}
