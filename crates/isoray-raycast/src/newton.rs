//! Newton inversion of the geometry map.
//!
//! Solves `phi(u, v) = g` for `(u, v)` with the update
//! `(u, v) <- (u, v) - J(u, v)^-1 (phi(u, v) - g)`, clamping each coordinate
//! into the parameter interval after every step.
//!
//! The geometry map is only locally invertible, so an unconstrained solve can
//! land on a parameter point whose image is close to `g` but belongs to an
//! unrelated part of the domain. The frustum-constrained variant keeps every
//! iterate's image inside the pixel footprint, which pins the solve to the
//! branch the ray is currently marching through.
//!
//! Neither variant fails: non-convergence returns the last iterate, and the
//! returned [`Inversion`] carries the diagnostics needed to detect it.

use isoray_math::{ParamInterval, Point2};
use isoray_spline::{GeometryMap, SplineMap};
use serde::{Deserialize, Serialize};

use crate::Frustum;

/// Iteration limits for the Newton solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewtonSettings {
    /// Maximum number of Newton steps.
    pub max_iterations: usize,
    /// Residual norm (in geometry space) below which the solve has converged.
    pub tolerance: f64,
    /// Maximum number of step halvings when pulling a step back into the frustum.
    pub max_step_halvings: usize,
}

impl Default for NewtonSettings {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            tolerance: 1e-10,
            max_step_halvings: 10,
        }
    }
}

/// Result of one inversion, with diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Inversion {
    /// Best parameter point found.
    pub uv: Point2,
    /// Image of `uv` under the geometry map.
    pub image: Point2,
    /// Newton steps taken.
    pub iterations: usize,
    /// Final residual norm `|phi(uv) - target|`.
    pub residual: f64,
    /// Whether the residual fell below the tolerance.
    pub converged: bool,
    /// Steps that had at least one coordinate clamped to the interval.
    pub clamped_steps: usize,
    /// Steps shortened to keep the image inside the frustum.
    pub pulled_back_steps: usize,
    /// Whether iteration stopped on a step that could not be brought inside the frustum.
    pub rejected: bool,
    /// Whether iteration stopped on a singular Jacobian.
    pub singular: bool,
}

/// Invert `phi` at `target` starting from `guess`, clamping to `interval`.
pub fn invert_clamped<M: SplineMap<2> + ?Sized>(
    phi: &M,
    target: Point2,
    guess: Point2,
    interval: &ParamInterval,
    settings: &NewtonSettings,
) -> Inversion {
    solve(phi, target, guess, interval, None, settings)
}

/// Invert `phi` at `target`, keeping iterates' images inside `frustum`.
///
/// Once an iterate's image lies inside the frustum, every later iterate's
/// image does too: a step whose image leaves the frustum is halved toward
/// the current iterate until it is back inside, and dropped if that fails.
/// Iterates are unconstrained until the first one lands inside, so a guess
/// whose image starts outside can still walk in.
pub fn invert_in_frustum<M: SplineMap<2> + ?Sized>(
    phi: &M,
    target: Point2,
    guess: Point2,
    interval: &ParamInterval,
    frustum: &Frustum,
    settings: &NewtonSettings,
) -> Inversion {
    solve(phi, target, guess, interval, Some(frustum), settings)
}

fn solve<M: SplineMap<2> + ?Sized>(
    phi: &M,
    target: Point2,
    guess: Point2,
    interval: &ParamInterval,
    frustum: Option<&Frustum>,
    settings: &NewtonSettings,
) -> Inversion {
    let mut uv = interval.clamp_point(guess);
    let mut image = phi.point(uv);
    let mut residual = (image - target).norm();
    let mut constrained = frustum.is_some_and(|f| f.contains(&image));

    let mut result = Inversion {
        uv,
        image,
        iterations: 0,
        residual,
        converged: false,
        clamped_steps: 0,
        pulled_back_steps: 0,
        rejected: false,
        singular: false,
    };

    while result.iterations < settings.max_iterations && residual >= settings.tolerance {
        let Some(j_inv) = phi.jacobian(uv).try_inverse() else {
            result.singular = true;
            break;
        };
        result.iterations += 1;

        let raw = uv - j_inv * (image - target);
        let mut candidate = interval.clamp_point(raw);
        if candidate != raw {
            result.clamped_steps += 1;
        }
        let mut candidate_image = phi.point(candidate);

        if let Some(f) = frustum {
            if constrained {
                let mut halvings = 0;
                while !f.contains(&candidate_image) && halvings < settings.max_step_halvings {
                    candidate = uv + (candidate - uv) * 0.5;
                    candidate_image = phi.point(candidate);
                    halvings += 1;
                }
                if !f.contains(&candidate_image) {
                    result.rejected = true;
                    break;
                }
                if halvings > 0 {
                    result.pulled_back_steps += 1;
                }
            } else {
                constrained = f.contains(&candidate_image);
            }
        }

        uv = candidate;
        image = candidate_image;
        residual = (image - target).norm();
    }

    result.uv = uv;
    result.image = image;
    result.residual = residual;
    result.converged = residual < settings.tolerance;
    if !result.converged {
        log::trace!(
            "newton: no convergence at ({:.4}, {:.4}) after {} steps, residual {:.3e}",
            target.x,
            target.y,
            result.iterations,
            residual
        );
    }
    result
}

/// Inversion diagnostics aggregated over a pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct InversionStats {
    /// Number of inversions.
    pub total: usize,
    /// Inversions that did not reach the tolerance.
    pub non_converged: usize,
    /// Inversions with at least one clamped step.
    pub clamped: usize,
    /// Inversions with at least one step pulled back into the frustum.
    pub pulled_back: usize,
    /// Inversions stopped by a step that could not be brought into the frustum.
    pub rejected: usize,
    /// Inversions stopped by a singular Jacobian.
    pub singular: usize,
    /// Sum of Newton steps.
    pub iterations: usize,
    /// Largest final residual.
    pub max_residual: f64,
}

impl InversionStats {
    /// Add one inversion to the tally.
    pub fn record(&mut self, inv: &Inversion) {
        self.total += 1;
        self.non_converged += usize::from(!inv.converged);
        self.clamped += usize::from(inv.clamped_steps > 0);
        self.pulled_back += usize::from(inv.pulled_back_steps > 0);
        self.rejected += usize::from(inv.rejected);
        self.singular += usize::from(inv.singular);
        self.iterations += inv.iterations;
        self.max_residual = self.max_residual.max(inv.residual);
    }

    /// Combine two tallies.
    pub fn merge(self, other: Self) -> Self {
        Self {
            total: self.total + other.total,
            non_converged: self.non_converged + other.non_converged,
            clamped: self.clamped + other.clamped,
            pulled_back: self.pulled_back + other.pulled_back,
            rejected: self.rejected + other.rejected,
            singular: self.singular + other.singular,
            iterations: self.iterations + other.iterations,
            max_residual: self.max_residual.max(other.max_residual),
        }
    }

    /// Mean Newton steps per inversion.
    pub fn mean_iterations(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.iterations as f64 / self.total as f64
        }
    }
}
