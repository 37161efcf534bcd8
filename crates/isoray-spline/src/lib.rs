#![warn(missing_docs)]

//! Tensor-product B-spline maps for the isoray kernel.
//!
//! A spline map sends a parameter point `(u, v)` to a fixed-size output
//! vector: two components for the geometry map `phi`, one for the scalar
//! field `rho`. The ray caster only needs values, first partial derivatives
//! and coefficient extrema, which is what [`SplineMap`] exposes.
//!
//! # Key types
//!
//! - [`SplineMap`] - value / derivative / coefficient-extremum queries
//! - [`BSplineMap`] - non-rational tensor-product B-spline with `D` outputs
//! - [`IdentityMap`], [`LinearRamp`] - trivial maps for tests and debugging
//! - [`GeometryMap`], [`ScalarField`] - typed helpers over `D = 2` and `D = 1`
//!
//! # Algorithms
//!
//! - **Cox–de Boor recursion** for basis values
//! - Analytic first derivatives from the degree `p - 1` basis

pub mod error;
pub mod scene;

pub use error::{Result, SplineError};

use isoray_math::{Mat2, Point2};

// =============================================================================
// Knot vector utilities
// =============================================================================

/// Validate a knot vector: non-decreasing, length = n_control_points + degree + 1.
fn validate_knots(
    direction: &'static str,
    knots: &[f64],
    n_points: usize,
    degree: usize,
) -> Result<()> {
    let expected = n_points + degree + 1;
    if knots.len() != expected {
        return Err(SplineError::InvalidKnots {
            direction,
            len: knots.len(),
            expected,
            n: n_points,
            degree,
        });
    }
    if knots.windows(2).any(|w| w[1] < w[0]) {
        return Err(SplineError::UnsortedKnots(direction));
    }
    Ok(())
}

/// Find the knot span index for parameter `t`.
///
/// Returns `i` such that `knots[i] <= t < knots[i+1]`, clamped to valid range.
/// For `t` at the end of the domain, returns the last valid span.
fn find_span(knots: &[f64], n: usize, degree: usize, t: f64) -> usize {
    // n = number of control points - 1 (last index)
    if t >= knots[n + 1] {
        return n;
    }
    if t <= knots[degree] {
        return degree;
    }
    let mut low = degree;
    let mut high = n + 1;
    let mut mid = (low + high) / 2;
    while t < knots[mid] || t >= knots[mid + 1] {
        if t < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
        mid = (low + high) / 2;
    }
    mid
}

/// Compute non-zero basis function values at parameter `t`.
///
/// Returns `degree + 1` values `N[span-degree..=span]` at `t`.
fn basis_functions(knots: &[f64], span: usize, degree: usize, t: f64) -> Vec<f64> {
    let mut n = vec![0.0; degree + 1];
    let mut left = vec![0.0; degree + 1];
    let mut right = vec![0.0; degree + 1];
    n[0] = 1.0;

    for j in 1..=degree {
        left[j] = t - knots[span + 1 - j];
        right[j] = knots[span + j] - t;
        let mut saved = 0.0;
        for r in 0..j {
            let denom = right[r + 1] + left[j - r];
            let temp = if denom.abs() < 1e-30 { 0.0 } else { n[r] / denom };
            n[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        n[j] = saved;
    }

    n
}

/// Basis values and their first derivatives at `t`.
///
/// `N'_{i,p} = p / (k[i+p] - k[i]) N_{i,p-1} - p / (k[i+p+1] - k[i+1]) N_{i+1,p-1}`
fn basis_with_derivatives(
    knots: &[f64],
    span: usize,
    degree: usize,
    t: f64,
) -> (Vec<f64>, Vec<f64>) {
    let values = basis_functions(knots, span, degree, t);
    if degree == 0 {
        return (values, vec![0.0]);
    }

    // lower[k] is N_{span-degree+1+k, degree-1}
    let lower = basis_functions(knots, span, degree - 1, t);
    let p = degree as f64;
    let mut derivs = vec![0.0; degree + 1];
    for (r, d) in derivs.iter_mut().enumerate() {
        let i = span - degree + r;
        if r >= 1 {
            let denom = knots[i + degree] - knots[i];
            if denom > 0.0 {
                *d += p * lower[r - 1] / denom;
            }
        }
        if r < degree {
            let denom = knots[i + degree + 1] - knots[i + 1];
            if denom > 0.0 {
                *d -= p * lower[r] / denom;
            }
        }
    }

    (values, derivs)
}

// =============================================================================
// Spline map interface
// =============================================================================

/// A smooth map from the rectangular parameter domain to `R^D`.
pub trait SplineMap<const D: usize>: Send + Sync + std::fmt::Debug {
    /// Evaluate the map at `(u, v)`.
    fn evaluate(&self, u: f64, v: f64) -> [f64; D];

    /// Partial derivative with respect to `u`.
    fn d_du(&self, u: f64, v: f64) -> [f64; D];

    /// Partial derivative with respect to `v`.
    fn d_dv(&self, u: f64, v: f64) -> [f64; D];

    /// Smallest coefficient of output component `component`, or 0 if
    /// `component >= D`.
    fn coeff_min(&self, component: usize) -> f64;

    /// Largest coefficient of output component `component`, or 0 if
    /// `component >= D`.
    fn coeff_max(&self, component: usize) -> f64;
}

/// Point-typed helpers for two-component maps.
pub trait GeometryMap: SplineMap<2> {
    /// Image of a parameter point.
    fn point(&self, uv: Point2) -> Point2 {
        let [x, y] = self.evaluate(uv.x, uv.y);
        Point2::new(x, y)
    }

    /// Jacobian `[d/du | d/dv]` at a parameter point.
    fn jacobian(&self, uv: Point2) -> Mat2 {
        let [xu, yu] = self.d_du(uv.x, uv.y);
        let [xv, yv] = self.d_dv(uv.x, uv.y);
        Mat2::new(xu, xv, yu, yv)
    }
}

impl<T: SplineMap<2> + ?Sized> GeometryMap for T {}

/// Scalar-typed helper for one-component maps.
pub trait ScalarField: SplineMap<1> {
    /// Scalar value at a parameter point.
    fn scalar(&self, uv: Point2) -> f64 {
        self.evaluate(uv.x, uv.y)[0]
    }
}

impl<T: SplineMap<1> + ?Sized> ScalarField for T {}

// =============================================================================
// B-spline map
// =============================================================================

/// A non-rational tensor-product B-spline with `D` output components.
///
/// Coefficients are stored u-major: `coeffs[u_idx * n_v + v_idx]`.
#[derive(Debug, Clone)]
pub struct BSplineMap<const D: usize> {
    /// Polynomial degree in both directions.
    pub degree: usize,
    /// Knot vector in u. Length = n_u + degree + 1.
    pub knots_u: Vec<f64>,
    /// Knot vector in v. Length = n_v + degree + 1.
    pub knots_v: Vec<f64>,
    /// Number of coefficients in the u direction.
    pub n_u: usize,
    /// Number of coefficients in the v direction.
    pub n_v: usize,
    coeffs: Vec<[f64; D]>,
}

impl<const D: usize> BSplineMap<D> {
    /// Create a B-spline map from a coefficient grid indexed `grid[u_idx][v_idx]`.
    pub fn new(
        degree: usize,
        knots_u: Vec<f64>,
        knots_v: Vec<f64>,
        grid: Vec<Vec<[f64; D]>>,
    ) -> Result<Self> {
        let n_u = grid.len();
        let n_v = grid.first().map(Vec::len).ok_or(SplineError::EmptyGrid)?;
        if n_v == 0 {
            return Err(SplineError::EmptyGrid);
        }
        for (row, entries) in grid.iter().enumerate() {
            if entries.len() != n_v {
                return Err(SplineError::RaggedGrid {
                    row,
                    len: entries.len(),
                    expected: n_v,
                });
            }
        }
        validate_knots("u", &knots_u, n_u, degree)?;
        validate_knots("v", &knots_v, n_v, degree)?;

        Ok(Self {
            degree,
            knots_u,
            knots_v,
            n_u,
            n_v,
            coeffs: grid.into_iter().flatten().collect(),
        })
    }

    /// Coefficient at `(u_idx, v_idx)`.
    pub fn coeff(&self, u_idx: usize, v_idx: usize) -> &[f64; D] {
        &self.coeffs[u_idx * self.n_v + v_idx]
    }

    /// Parameter domain in u and v.
    pub fn parameter_domain(&self) -> ((f64, f64), (f64, f64)) {
        (
            (self.knots_u[self.degree], self.knots_u[self.n_u]),
            (self.knots_v[self.degree], self.knots_v[self.n_v]),
        )
    }

    /// Spans and basis data at `(u, v)` after clamping into the domain.
    fn locate(&self, u: f64, v: f64) -> (usize, usize, f64, f64) {
        let ((u_min, u_max), (v_min, v_max)) = self.parameter_domain();
        let u = u.clamp(u_min, u_max);
        let v = v.clamp(v_min, v_max);
        let span_u = find_span(&self.knots_u, self.n_u - 1, self.degree, u);
        let span_v = find_span(&self.knots_v, self.n_v - 1, self.degree, v);
        (span_u, span_v, u, v)
    }

    /// Sum `bu[i] * bv[j] * coeff` over the supporting coefficients.
    fn combine(&self, span_u: usize, span_v: usize, bu: &[f64], bv: &[f64]) -> [f64; D] {
        let p = self.degree;
        let mut out = [0.0; D];
        for (i, &wu) in bu.iter().enumerate() {
            let u_idx = span_u - p + i;
            for (j, &wv) in bv.iter().enumerate() {
                let w = wu * wv;
                let c = self.coeff(u_idx, span_v - p + j);
                for k in 0..D {
                    out[k] += w * c[k];
                }
            }
        }
        out
    }

    fn extremum(&self, component: usize, f: fn(f64, f64) -> f64) -> f64 {
        self.coeffs
            .iter()
            .filter_map(|c| c.get(component).copied())
            .reduce(f)
            .unwrap_or(0.0)
    }
}

impl<const D: usize> SplineMap<D> for BSplineMap<D> {
    fn evaluate(&self, u: f64, v: f64) -> [f64; D] {
        let (span_u, span_v, u, v) = self.locate(u, v);
        let bu = basis_functions(&self.knots_u, span_u, self.degree, u);
        let bv = basis_functions(&self.knots_v, span_v, self.degree, v);
        self.combine(span_u, span_v, &bu, &bv)
    }

    fn d_du(&self, u: f64, v: f64) -> [f64; D] {
        let (span_u, span_v, u, v) = self.locate(u, v);
        let (_, dbu) = basis_with_derivatives(&self.knots_u, span_u, self.degree, u);
        let bv = basis_functions(&self.knots_v, span_v, self.degree, v);
        self.combine(span_u, span_v, &dbu, &bv)
    }

    fn d_dv(&self, u: f64, v: f64) -> [f64; D] {
        let (span_u, span_v, u, v) = self.locate(u, v);
        let bu = basis_functions(&self.knots_u, span_u, self.degree, u);
        let (_, dbv) = basis_with_derivatives(&self.knots_v, span_v, self.degree, v);
        self.combine(span_u, span_v, &bu, &dbv)
    }

    fn coeff_min(&self, component: usize) -> f64 {
        self.extremum(component, f64::min)
    }

    fn coeff_max(&self, component: usize) -> f64 {
        self.extremum(component, f64::max)
    }
}

// =============================================================================
// Trivial maps
// =============================================================================

/// The identity geometry map `(u, v) -> (u, v)` on the unit square.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityMap;

impl SplineMap<2> for IdentityMap {
    fn evaluate(&self, u: f64, v: f64) -> [f64; 2] {
        [u, v]
    }

    fn d_du(&self, _u: f64, _v: f64) -> [f64; 2] {
        [1.0, 0.0]
    }

    fn d_dv(&self, _u: f64, _v: f64) -> [f64; 2] {
        [0.0, 1.0]
    }

    fn coeff_min(&self, _component: usize) -> f64 {
        0.0
    }

    fn coeff_max(&self, component: usize) -> f64 {
        if component < 2 {
            1.0
        } else {
            0.0
        }
    }
}

/// The scalar field `(u, v) -> v` on the unit square.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearRamp;

impl SplineMap<1> for LinearRamp {
    fn evaluate(&self, _u: f64, v: f64) -> [f64; 1] {
        [v]
    }

    fn d_du(&self, _u: f64, _v: f64) -> [f64; 1] {
        [0.0]
    }

    fn d_dv(&self, _u: f64, _v: f64) -> [f64; 1] {
        [1.0]
    }

    fn coeff_min(&self, _component: usize) -> f64 {
        0.0
    }

    fn coeff_max(&self, component: usize) -> f64 {
        if component == 0 {
            1.0
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bilinear_square() -> BSplineMap<2> {
        BSplineMap::new(
            1,
            vec![0.0, 0.0, 1.0, 1.0],
            vec![0.0, 0.0, 1.0, 1.0],
            vec![
                vec![[0.0, 0.0], [0.0, 2.0]],
                vec![[3.0, 0.0], [3.0, 2.0]],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_partition_of_unity() {
        let knots = [0.0, 0.0, 0.0, 0.2, 0.7, 1.0, 1.0, 1.0];
        for &t in &[0.0, 0.1, 0.2, 0.45, 0.9, 1.0] {
            let span = find_span(&knots, 4, 2, t);
            let n = basis_functions(&knots, span, 2, t);
            assert_relative_eq!(n.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_basis_derivatives_sum_to_zero() {
        let knots = [0.0, 0.0, 0.0, 0.3, 0.6, 1.0, 1.0, 1.0];
        for &t in &[0.05, 0.3, 0.5, 0.95] {
            let span = find_span(&knots, 4, 2, t);
            let (_, d) = basis_with_derivatives(&knots, span, 2, t);
            assert_relative_eq!(d.iter().sum::<f64>(), 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_bilinear_evaluation() {
        let s = bilinear_square();
        let p = s.evaluate(0.5, 0.25);
        assert_relative_eq!(p[0], 1.5, epsilon = 1e-12);
        assert_relative_eq!(p[1], 0.5, epsilon = 1e-12);

        assert_eq!(s.d_du(0.3, 0.3), [3.0, 0.0]);
        assert_eq!(s.d_dv(0.3, 0.3), [0.0, 2.0]);
    }

    #[test]
    fn test_derivatives_match_finite_differences() {
        let phi = scene::reference_geometry().unwrap();
        let h = 1e-6;
        for &(u, v) in &[(0.1, 0.2), (0.45, 0.5), (0.8, 0.65)] {
            let du = phi.d_du(u, v);
            let dv = phi.d_dv(u, v);
            let pu0 = phi.evaluate(u - h, v);
            let pu1 = phi.evaluate(u + h, v);
            let pv0 = phi.evaluate(u, v - h);
            let pv1 = phi.evaluate(u, v + h);
            for k in 0..2 {
                assert_relative_eq!(du[k], (pu1[k] - pu0[k]) / (2.0 * h), epsilon = 1e-5);
                assert_relative_eq!(dv[k], (pv1[k] - pv0[k]) / (2.0 * h), epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_clamped_corners_interpolate() {
        let phi = scene::reference_geometry().unwrap();
        let p00 = phi.evaluate(0.0, 0.0);
        assert_relative_eq!(p00[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(p00[1], 0.0, epsilon = 1e-12);
        let p11 = phi.evaluate(1.0, 1.0);
        assert_relative_eq!(p11[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(p11[1], 0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_coeff_extrema() {
        let phi = scene::reference_geometry().unwrap();
        assert_relative_eq!(phi.coeff_min(0), -0.2);
        assert_relative_eq!(phi.coeff_max(0), 1.05);
        assert_relative_eq!(phi.coeff_min(1), -0.06);
        assert_relative_eq!(phi.coeff_max(1), 1.05);
        assert_eq!(phi.coeff_min(2), 0.0);
        assert_eq!(phi.coeff_max(7), 0.0);
        assert_eq!(IdentityMap.coeff_max(1), 1.0);
        assert_eq!(IdentityMap.coeff_max(2), 0.0);
        assert_eq!(LinearRamp.coeff_max(1), 0.0);
    }

    #[test]
    fn test_geometry_helpers() {
        let s = bilinear_square();
        let p = s.point(Point2::new(1.0, 1.0));
        assert_relative_eq!(p.x, 3.0);
        assert_relative_eq!(p.y, 2.0);
        let j = s.jacobian(Point2::new(0.5, 0.5));
        assert_relative_eq!(j.determinant(), 6.0, epsilon = 1e-12);
        assert_relative_eq!(LinearRamp.scalar(Point2::new(0.2, 0.7)), 0.7);
    }

    #[test]
    fn test_invalid_knots() {
        let err = BSplineMap::<1>::new(
            2,
            vec![0.0, 0.0, 1.0, 1.0],
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            vec![vec![[0.0]; 3]; 3],
        )
        .unwrap_err();
        assert!(matches!(err, SplineError::InvalidKnots { direction: "u", .. }));

        let err = BSplineMap::<1>::new(
            1,
            vec![0.0, 0.0, 1.0, 0.5],
            vec![0.0, 0.0, 1.0, 1.0],
            vec![vec![[0.0]; 2]; 2],
        )
        .unwrap_err();
        assert_eq!(err, SplineError::UnsortedKnots("u"));
    }

    #[test]
    fn test_ragged_grid() {
        let err = BSplineMap::<1>::new(
            1,
            vec![0.0, 0.0, 1.0, 1.0],
            vec![0.0, 0.0, 1.0, 1.0],
            vec![vec![[0.0]; 2], vec![[0.0]; 1]],
        )
        .unwrap_err();
        assert!(matches!(err, SplineError::RaggedGrid { row: 1, .. }));
    }
}
