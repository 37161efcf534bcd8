//! 2D rays, sample point generation and pixel frustum ellipses.

use isoray_math::{perp, Point2, Vec2};
use serde::Serialize;

/// A view ray through one pixel.
///
/// The ray starts at `origin` and passes through `target`, the pixel center
/// on the screen. `pixel_width` is the frustum width at `target`; for a
/// perspective ray the footprint grows linearly with distance from the origin.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Ray2D {
    /// Origin point of the ray (the eye).
    pub origin: Point2,
    /// Point the ray passes through (the pixel center).
    pub target: Point2,
    /// Unit direction of the ray.
    pub direction: Vec2,
    /// Width of the pixel frustum at `target`.
    pub pixel_width: f64,
    /// Distance from `origin` to `target`.
    target_distance: f64,
}

impl Ray2D {
    /// Create a ray from `origin` through `target`.
    ///
    /// If the two points coincide the ray points along +x.
    pub fn new(origin: Point2, target: Point2, pixel_width: f64) -> Self {
        let d = target - origin;
        let target_distance = d.norm();
        let direction = if target_distance > 0.0 {
            d / target_distance
        } else {
            Vec2::x()
        };
        Self {
            origin,
            target,
            direction,
            pixel_width,
            target_distance,
        }
    }

    /// Evaluate the ray at parameter `t`: `origin + t * direction`.
    #[inline]
    pub fn at(&self, t: f64) -> Point2 {
        self.origin + self.direction * t
    }

    /// Ray parameter of the orthogonal projection of `p` onto the ray.
    #[inline]
    pub fn project(&self, p: &Point2) -> f64 {
        (p - self.origin).dot(&self.direction)
    }

    /// Signed distance of `p` from the ray's supporting line.
    ///
    /// Positive on the left of the direction of travel.
    #[inline]
    pub fn signed_distance(&self, p: &Point2) -> f64 {
        isoray_math::cross2(&self.direction, &(p - self.origin))
    }

    /// Uniformly spaced points from `start` to `end` along the ray.
    ///
    /// The sequence is lazy and restartable: clone the iterator or call this
    /// again to walk it a second time. The last point is the final multiple
    /// of `delta` not beyond `end`.
    pub fn generate_sample_points(&self, start: f64, end: f64, delta: f64) -> SamplePoints {
        let count = if delta > 0.0 && end >= start {
            ((end - start) / delta + 1e-9).floor() as usize + 1
        } else {
            0
        };
        SamplePoints {
            origin: self.origin,
            direction: self.direction,
            start,
            delta,
            count,
            index: 0,
        }
    }

    /// Frustum width at ray parameter `t`.
    pub fn frustum_width_at(&self, t: f64) -> f64 {
        if self.target_distance > 0.0 {
            self.pixel_width * t.max(0.0) / self.target_distance
        } else {
            self.pixel_width
        }
    }

    /// Ellipse bounding the perspective pixel footprint around `point`.
    ///
    /// The semi-axis along the ray is `delta`, so the previous and next
    /// samples of a march with spacing `delta` lie on its boundary. Across
    /// the ray it is half the frustum width at the point's depth.
    pub fn frustum_bounding_ellipse(&self, point: Point2, delta: f64) -> Frustum {
        let across = 0.5 * self.frustum_width_at(self.project(&point));
        Frustum::new(point, self.direction, delta, across)
    }

    /// Ellipse bounding the footprint of a parallel (orthographic) scan ray.
    ///
    /// Parallel rays keep a constant footprint of `pixel_width` across the
    /// ray at every depth.
    pub fn frustum_bounding_ellipse_parallel(&self, point: Point2, delta: f64) -> Frustum {
        Frustum::new(point, self.direction, delta, 0.5 * self.pixel_width)
    }
}

/// Lazy sequence of sample points along a ray.
#[derive(Debug, Clone)]
pub struct SamplePoints {
    origin: Point2,
    direction: Vec2,
    start: f64,
    delta: f64,
    count: usize,
    index: usize,
}

impl SamplePoints {
    /// Ray parameter of the `i`-th sample.
    pub fn parameter(&self, i: usize) -> f64 {
        self.start + self.delta * i as f64
    }
}

impl Iterator for SamplePoints {
    type Item = Point2;

    fn next(&mut self) -> Option<Point2> {
        if self.index >= self.count {
            return None;
        }
        let t = self.parameter(self.index);
        self.index += 1;
        Some(self.origin + self.direction * t)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.count - self.index;
        (n, Some(n))
    }
}

impl ExactSizeIterator for SamplePoints {}

/// Elliptical bound on one pixel's footprint in geometry space.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Frustum {
    /// Center of the ellipse (the sample point).
    pub center: Point2,
    /// Unit axis along the ray.
    pub axis: Vec2,
    /// Semi-axis length along `axis`.
    pub along: f64,
    /// Semi-axis length perpendicular to `axis`.
    pub across: f64,
}

impl Frustum {
    /// Create an ellipse. Semi-axes are kept strictly positive.
    pub fn new(center: Point2, axis: Vec2, along: f64, across: f64) -> Self {
        let axis = if axis.norm() > 0.0 {
            axis.normalize()
        } else {
            Vec2::x()
        };
        Self {
            center,
            axis,
            along: along.abs().max(f64::EPSILON),
            across: across.abs().max(f64::EPSILON),
        }
    }

    /// Squared elliptical distance of `p` from the center; `<= 1` inside.
    pub fn normalized_distance(&self, p: &Point2) -> f64 {
        let d = p - self.center;
        let a = d.dot(&self.axis) / self.along;
        let b = d.dot(&perp(&self.axis)) / self.across;
        a * a + b * b
    }

    /// Whether `p` lies inside or on the ellipse.
    pub fn contains(&self, p: &Point2) -> bool {
        self.normalized_distance(p) <= 1.0 + 1e-12
    }

    /// Points on the ellipse outline, for plotting.
    pub fn outline(&self, segments: usize) -> Vec<Point2> {
        let n = perp(&self.axis);
        (0..=segments)
            .map(|i| {
                let a = std::f64::consts::TAU * i as f64 / segments.max(1) as f64;
                self.center + self.axis * (self.along * a.cos()) + n * (self.across * a.sin())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ray_at() {
        let ray = Ray2D::new(Point2::new(0.0, 0.0), Point2::new(2.0, 0.0), 0.1);
        let p = ray.at(5.0);
        assert_relative_eq!(p.x, 5.0);
        assert_relative_eq!(p.y, 0.0);
        assert_relative_eq!(ray.project(&Point2::new(3.0, 7.0)), 3.0);
        assert_relative_eq!(ray.signed_distance(&Point2::new(3.0, 7.0)), 7.0);
    }

    #[test]
    fn test_sample_points_spacing() {
        let ray = Ray2D::new(Point2::new(-2.0, 0.0), Point2::new(0.0, 0.0), 0.1);
        let points: Vec<_> = ray.generate_sample_points(0.0, 10.0, 0.1).collect();
        assert_eq!(points.len(), 101);
        assert_relative_eq!(points[0].x, -2.0);
        assert_relative_eq!(points[100].x, 8.0, epsilon = 1e-9);
        for w in points.windows(2) {
            assert_relative_eq!((w[1] - w[0]).norm(), 0.1, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_sample_points_partial_last_step() {
        let ray = Ray2D::new(Point2::origin(), Point2::new(1.0, 0.0), 0.1);
        let samples = ray.generate_sample_points(0.0, 1.0, 0.3);
        assert_eq!(samples.len(), 4);
        let last = samples.last().unwrap();
        assert_relative_eq!(last.x, 0.9, epsilon = 1e-12);
    }

    #[test]
    fn test_sample_points_restartable() {
        let ray = Ray2D::new(Point2::origin(), Point2::new(0.0, 1.0), 0.1);
        let samples = ray.generate_sample_points(1.0, 2.0, 0.25);
        let first: Vec<_> = samples.clone().collect();
        let second: Vec<_> = samples.collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
        assert!(ray.generate_sample_points(2.0, 1.0, 0.1).next().is_none());
        assert!(ray.generate_sample_points(0.0, 1.0, 0.0).next().is_none());
    }

    #[test]
    fn test_frustum_grows_with_depth() {
        let ray = Ray2D::new(Point2::new(-2.0, 0.5), Point2::new(-0.5, 0.5), 0.05);
        let near = ray.frustum_bounding_ellipse(ray.at(1.5), 0.1);
        let far = ray.frustum_bounding_ellipse(ray.at(3.0), 0.1);
        assert_relative_eq!(near.across, 0.025, epsilon = 1e-12);
        assert_relative_eq!(far.across, 0.05, epsilon = 1e-12);
        assert_relative_eq!(far.along, 0.1);
    }

    #[test]
    fn test_parallel_frustum_constant_width() {
        let ray = Ray2D::new(Point2::new(-2.0, 0.5), Point2::new(0.0, 0.5), 0.1);
        let a = ray.frustum_bounding_ellipse_parallel(ray.at(1.0), 0.2);
        let b = ray.frustum_bounding_ellipse_parallel(ray.at(3.0), 0.2);
        assert_relative_eq!(a.across, 0.05);
        assert_relative_eq!(b.across, 0.05);
    }

    #[test]
    fn test_frustum_contains() {
        let f = Frustum::new(Point2::new(1.0, 1.0), Vec2::new(1.0, 0.0), 0.2, 0.05);
        assert!(f.contains(&Point2::new(1.0, 1.0)));
        assert!(f.contains(&Point2::new(1.2, 1.0)));
        assert!(f.contains(&Point2::new(1.0, 1.05)));
        assert!(!f.contains(&Point2::new(1.0, 1.06)));
        assert!(!f.contains(&Point2::new(1.15, 1.04)));
    }

    #[test]
    fn test_frustum_rotated_axis() {
        let f = Frustum::new(Point2::origin(), Vec2::new(1.0, 1.0), 1.0, 0.1);
        let d = Vec2::new(1.0, 1.0).normalize() * 0.9;
        assert!(f.contains(&(Point2::origin() + d)));
        assert!(!f.contains(&Point2::new(0.5, -0.5)));
        let outline = f.outline(16);
        for p in &outline {
            assert_relative_eq!(f.normalized_distance(p), 1.0, epsilon = 1e-9);
        }
    }
}
