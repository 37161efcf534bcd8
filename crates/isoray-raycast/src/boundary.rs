//! Ray intersection with the boundary of the mapped parameter domain.
//!
//! The solid is `phi([min, max]^2)`. Its boundary is the image of the four
//! edges of the parameter square. Each edge curve is sampled, sign changes of
//! the signed distance to the ray's line are bracketed, and every bracket is
//! refined by bisection on the edge parameter.

use isoray_math::{ParamInterval, Point2, Tolerance};
use isoray_spline::{GeometryMap, SplineMap};
use serde::{Deserialize, Serialize};

use crate::{BoundingBox, Ray2D};

/// Accuracy settings for boundary intersection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntersectionSettings {
    /// Samples per boundary edge used to bracket crossings.
    pub samples_per_edge: usize,
    /// Bisection stops when the edge-parameter bracket is narrower than this.
    pub tolerance: f64,
    /// Hard limit on bisection steps per crossing.
    pub max_bisections: usize,
}

impl Default for IntersectionSettings {
    fn default() -> Self {
        Self {
            samples_per_edge: 64,
            tolerance: 1e-12,
            max_bisections: 64,
        }
    }
}

/// A ray crossing of the domain boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Intersection {
    /// Crossing point in geometry space.
    pub geom_point: Point2,
    /// Corresponding point on the edge of the parameter square.
    pub param_point: Point2,
    /// Ray parameter of the crossing.
    pub t: f64,
}

/// One side of the parameter square.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    /// `v = min`, `u` varies.
    Bottom,
    /// `u = max`, `v` varies.
    Right,
    /// `v = max`, `u` varies.
    Top,
    /// `u = min`, `v` varies.
    Left,
}

impl Edge {
    const ALL: [Edge; 4] = [Edge::Bottom, Edge::Right, Edge::Top, Edge::Left];

    fn param(self, interval: &ParamInterval, s: f64) -> Point2 {
        match self {
            Edge::Bottom => Point2::new(s, interval.min),
            Edge::Right => Point2::new(interval.max, s),
            Edge::Top => Point2::new(s, interval.max),
            Edge::Left => Point2::new(interval.min, s),
        }
    }
}

/// The boundary of `phi` over the clamped parameter square.
#[derive(Debug, Clone, Copy)]
pub struct DomainBoundary<'a> {
    phi: &'a dyn SplineMap<2>,
    interval: ParamInterval,
    settings: IntersectionSettings,
}

impl<'a> DomainBoundary<'a> {
    /// Boundary of `phi` over `interval^2`.
    pub fn new(
        phi: &'a dyn SplineMap<2>,
        interval: ParamInterval,
        settings: IntersectionSettings,
    ) -> Self {
        Self {
            phi,
            interval,
            settings,
        }
    }

    /// The parameter interval.
    pub fn interval(&self) -> &ParamInterval {
        &self.interval
    }

    /// Bounding box of the mapped domain, from the geometry coefficients.
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_geometry(self.phi)
    }

    /// All crossings in front of the ray origin, sorted by distance.
    pub fn find_intersections(&self, ray: &Ray2D) -> Vec<Intersection> {
        if self.bounding_box().intersect_ray(ray).is_none() {
            return Vec::new();
        }

        let mut hits = Vec::new();
        for edge in Edge::ALL {
            self.intersect_edge(ray, edge, &mut hits);
        }

        hits.sort_by(|a, b| a.t.total_cmp(&b.t));
        // Edges meet at the corners of the square; a crossing there is found twice.
        hits.dedup_by(|a, b| Tolerance::DEFAULT.points_equal(&a.geom_point, &b.geom_point));
        hits
    }

    /// Entry and exit crossings, or `None` if the ray crosses fewer than twice.
    ///
    /// With more than two crossings the outermost pair is returned.
    pub fn find_two_intersections(&self, ray: &Ray2D) -> Option<[Intersection; 2]> {
        let hits = self.find_intersections(ray);
        match (hits.first(), hits.last()) {
            (Some(entry), Some(exit)) if hits.len() >= 2 => Some([*entry, *exit]),
            _ => None,
        }
    }

    /// Boundary curve of one edge sampled at `n + 1` points, for plotting.
    pub fn edge_curve(&self, n: usize) -> Vec<Point2> {
        let mut points = Vec::with_capacity(4 * (n + 1));
        for edge in Edge::ALL {
            let ss = self.interval.linspace(n + 1);
            let ordered: Box<dyn Iterator<Item = &f64>> = match edge {
                // Walk the square counter-clockwise.
                Edge::Bottom | Edge::Right => Box::new(ss.iter()),
                Edge::Top | Edge::Left => Box::new(ss.iter().rev()),
            };
            points.extend(ordered.map(|&s| self.phi.point(edge.param(&self.interval, s))));
        }
        points
    }

    fn intersect_edge(&self, ray: &Ray2D, edge: Edge, hits: &mut Vec<Intersection>) {
        let n = self.settings.samples_per_edge.max(1);
        let ss = self.interval.linspace(n + 1);
        let dist = |s: f64| ray.signed_distance(&self.phi.point(edge.param(&self.interval, s)));

        let mut prev_s = ss[0];
        let mut prev_d = dist(prev_s);
        if prev_d == 0.0 {
            self.push_hit(ray, edge, prev_s, hits);
        }
        for &s in &ss[1..] {
            let d = dist(s);
            if d == 0.0 {
                self.push_hit(ray, edge, s, hits);
            } else if prev_d != 0.0 && (prev_d < 0.0) != (d < 0.0) {
                let root = self.bisect(&dist, prev_s, prev_d, s);
                self.push_hit(ray, edge, root, hits);
            }
            prev_s = s;
            prev_d = d;
        }
    }

    /// Refine a sign change of `dist` on `[lo, hi]`.
    fn bisect(&self, dist: &dyn Fn(f64) -> f64, mut lo: f64, lo_d: f64, mut hi: f64) -> f64 {
        let lo_negative = lo_d < 0.0;
        for _ in 0..self.settings.max_bisections {
            if hi - lo < self.settings.tolerance {
                break;
            }
            let mid = 0.5 * (lo + hi);
            let d = dist(mid);
            if d == 0.0 {
                return mid;
            }
            if (d < 0.0) == lo_negative {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        0.5 * (lo + hi)
    }

    fn push_hit(&self, ray: &Ray2D, edge: Edge, s: f64, hits: &mut Vec<Intersection>) {
        let param_point = edge.param(&self.interval, s);
        let geom_point = self.phi.point(param_point);
        let t = ray.project(&geom_point);
        if t >= 0.0 {
            hits.push(Intersection {
                geom_point,
                param_point,
                t,
            });
        }
    }
}
