//! Axis-aligned bounding box of the rendered domain.

use isoray_math::Point2;
use isoray_spline::SplineMap;
use serde::{Deserialize, Serialize};

use crate::Ray2D;

/// Axis-aligned box in geometry space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum x.
    pub left: f64,
    /// Maximum x.
    pub right: f64,
    /// Minimum y.
    pub bottom: f64,
    /// Maximum y.
    pub top: f64,
}

impl BoundingBox {
    /// Create a box from its four sides.
    pub fn new(left: f64, right: f64, bottom: f64, top: f64) -> Self {
        Self {
            left,
            right,
            bottom,
            top,
        }
    }

    /// Box enclosing the image of a geometry map.
    ///
    /// A B-spline lies in the convex hull of its coefficients, so the
    /// coefficient extrema of each component bound the image.
    pub fn from_geometry<M: SplineMap<2> + ?Sized>(phi: &M) -> Self {
        Self::new(
            phi.coeff_min(0),
            phi.coeff_max(0),
            phi.coeff_min(1),
            phi.coeff_max(1),
        )
    }

    /// Width of the box.
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    /// Height of the box.
    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }

    /// Whether `p` lies inside or on the box.
    pub fn encloses_point(&self, p: &Point2) -> bool {
        p.x >= self.left && p.x <= self.right && p.y >= self.bottom && p.y <= self.top
    }

    /// Map `p` into normalized box coordinates, `[0, 1]^2` for enclosed points.
    pub fn normalize(&self, p: &Point2) -> Point2 {
        Point2::new(
            (p.x - self.left) / self.width(),
            (p.y - self.bottom) / self.height(),
        )
    }

    /// Inverse of [`normalize`](Self::normalize).
    pub fn denormalize(&self, uv: &Point2) -> Point2 {
        Point2::new(
            self.left + uv.x * self.width(),
            self.bottom + uv.y * self.height(),
        )
    }

    /// Corners in counter-clockwise order starting at `(left, bottom)`.
    pub fn corners(&self) -> [Point2; 4] {
        [
            Point2::new(self.left, self.bottom),
            Point2::new(self.right, self.bottom),
            Point2::new(self.right, self.top),
            Point2::new(self.left, self.top),
        ]
    }

    /// Ray-box intersection using the slab method.
    ///
    /// Returns `Some((t_min, t_max))` with `t_min >= 0` if the ray hits the
    /// box in front of its origin.
    pub fn intersect_ray(&self, ray: &Ray2D) -> Option<(f64, f64)> {
        let mut t_min = f64::NEG_INFINITY;
        let mut t_max = f64::INFINITY;

        let slabs = [
            (ray.origin.x, ray.direction.x, self.left, self.right),
            (ray.origin.y, ray.direction.y, self.bottom, self.top),
        ];
        for (o, d, lo, hi) in slabs {
            if d == 0.0 {
                // Parallel to this slab: either always inside or never.
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }
            let t1 = (lo - o) / d;
            let t2 = (hi - o) / d;
            t_min = t_min.max(t1.min(t2));
            t_max = t_max.min(t1.max(t2));
        }

        if t_max >= t_min && t_max >= 0.0 {
            Some((t_min.max(0.0), t_max))
        } else {
            None
        }
    }
}
