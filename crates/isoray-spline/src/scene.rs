//! The reference scene: a warped biquadratic patch and a scalar field on it.

use crate::{BSplineMap, Result};

/// Polynomial degree of both reference maps.
pub const DEGREE: usize = 2;

/// Knot vector in u shared by both reference maps.
pub const KNOTS_U: [f64; 8] = [0.0, 0.0, 0.0, 0.2, 0.7, 1.0, 1.0, 1.0];

/// Knot vector in v shared by both reference maps.
pub const KNOTS_V: [f64; 8] = [0.0, 0.0, 0.0, 0.3, 0.6, 1.0, 1.0, 1.0];

/// The geometry map `phi`: a 5x5 biquadratic patch roughly covering the unit square.
pub fn reference_geometry() -> Result<BSplineMap<2>> {
    let grid = vec![
        vec![[0.0, 0.0], [-0.1, 0.2], [-0.2, 0.5], [0.0, 0.9], [0.0, 1.0]],
        vec![[0.25, -0.05], [0.11, 0.4], [0.4, 0.41], [0.5, 0.9], [0.25, 1.05]],
        vec![[0.5, -0.06], [0.5, 0.2], [0.5, 0.5], [0.6, 0.9], [0.5, 1.03]],
        vec![[0.75, -0.05], [0.7, 0.2], [0.8, 0.5], [0.7, 0.9], [0.75, 0.95]],
        vec![[1.0, 0.0], [1.01, 0.2], [1.02, 0.5], [1.05, 0.7], [1.0, 0.8]],
    ];
    BSplineMap::new(DEGREE, KNOTS_U.to_vec(), KNOTS_V.to_vec(), grid)
}

/// The scalar field `rho` over the same parameter domain.
pub fn reference_scalar_field() -> Result<BSplineMap<1>> {
    let grid = vec![
        vec![[0.6], [0.1], [0.6], [1.0], [1.0]],
        vec![[0.25], [0.11], [1.0], [0.9], [1.0]],
        vec![[0.5], [0.0], [0.3], [0.3], [0.5]],
        vec![[0.75], [0.3], [0.0], [0.7], [0.75]],
        vec![[0.5], [1.0], [1.0], [1.0], [0.8]],
    ];
    BSplineMap::new(DEGREE, KNOTS_U.to_vec(), KNOTS_V.to_vec(), grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GeometryMap, ScalarField};
    use approx::assert_relative_eq;
    use isoray_math::Point2;

    #[test]
    fn test_reference_maps_build() {
        let phi = reference_geometry().unwrap();
        let rho = reference_scalar_field().unwrap();
        assert_eq!((phi.n_u, phi.n_v), (5, 5));
        assert_eq!((rho.n_u, rho.n_v), (5, 5));
    }

    #[test]
    fn test_reference_geometry_is_locally_invertible() {
        let phi = reference_geometry().unwrap();
        for &u in &[0.1, 0.5, 0.9] {
            for &v in &[0.1, 0.5, 0.9] {
                let det = phi.jacobian(Point2::new(u, v)).determinant();
                assert!(det > 0.0, "det at ({u}, {v}) = {det}");
            }
        }
    }

    #[test]
    fn test_reference_scalar_corner() {
        let rho = reference_scalar_field().unwrap();
        assert_relative_eq!(rho.scalar(Point2::new(0.0, 0.0)), 0.6, epsilon = 1e-12);
        assert_relative_eq!(rho.scalar(Point2::new(1.0, 1.0)), 0.8, epsilon = 1e-12);
    }
}
