//! The accuracy experiment: reference, direct and voxelized renders of one scene.
//!
//! A [`Renderer`] owns no data; it borrows the geometry map, the scalar field
//! and the transfer function, so every pass can run in parallel over pixels
//! without locking.

use isoray_math::{Point2, Rgba};
use isoray_spline::{ScalarField, SplineMap};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::colordiff::{downsample, ColorDiff, DiffSummary, EuclideanDiff};
use crate::compositing::front_to_back;
use crate::error::Result;
use crate::location::{classify_direct, classify_voxelized, SamplingLocation};
use crate::newton::{invert_in_frustum, InversionStats};
use crate::settings::RenderSettings;
use crate::texture::{voxelize, Texture2D, Voxelization};
use crate::transfer::TransferFunction;
use crate::{BoundingBox, DomainBoundary, Intersection, Ray2D};

/// One sample along a view ray.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SampleTrace {
    /// Sample position on the ray.
    pub point: Point2,
    /// Classification of `point`.
    pub location: SamplingLocation,
    /// Inverted parameter point (direct sampling, inside samples only).
    pub uv: Option<Point2>,
    /// Image of `uv`, where the sample actually lands.
    pub image: Option<Point2>,
    /// Scalar fed to the transfer function (inside samples only).
    pub scalar: Option<f64>,
}

/// Result of casting one view ray.
#[derive(Debug, Clone, Serialize)]
pub struct RayCast {
    /// The view ray.
    pub ray: Ray2D,
    /// Composited pixel color (premultiplied).
    pub color: Rgba,
    /// Every sample, inside or not.
    pub samples: Vec<SampleTrace>,
    /// Entry and exit crossings; always `None` for voxelized casts.
    pub intersections: Option<[Intersection; 2]>,
    /// Inversion diagnostics of this cast.
    pub stats: InversionStats,
}

/// One render pass over a row of pixels.
#[derive(Debug, Clone, Serialize)]
pub struct Pass {
    /// Pixel colors, bottom to top.
    pub colors: Vec<Rgba>,
    /// Per-pixel traces.
    pub casts: Vec<RayCast>,
    /// Inversion diagnostics over all pixels.
    pub stats: InversionStats,
}

impl Pass {
    fn from_casts(casts: Vec<RayCast>) -> Self {
        let colors = casts.iter().map(|c| c.color).collect();
        let stats = casts
            .iter()
            .fold(InversionStats::default(), |acc, c| acc.merge(c.stats));
        Self {
            colors,
            casts,
            stats,
        }
    }
}

/// Everything one run produces.
#[derive(Debug, Clone, Serialize)]
pub struct RenderReport {
    /// Settings the run used.
    pub settings: RenderSettings,
    /// Bounding box of the geometry.
    pub bounding_box: BoundingBox,
    /// Voxel texture and its scan rows.
    pub voxelization: Voxelization,
    /// High-resolution direct pass.
    pub reference: Pass,
    /// Direct pass at output resolution.
    pub direct: Pass,
    /// Voxelized pass at output resolution.
    pub voxelized: Pass,
    /// Per-pixel error of the direct pass against the reference.
    pub direct_diffs: Vec<f64>,
    /// Per-pixel error of the voxelized pass against the reference.
    pub voxelized_diffs: Vec<f64>,
    /// Aggregate of `direct_diffs`.
    pub direct_summary: DiffSummary,
    /// Aggregate of `voxelized_diffs`.
    pub voxelized_summary: DiffSummary,
}

/// Ray caster over a geometry map and scalar field.
pub struct Renderer<'a> {
    phi: &'a dyn SplineMap<2>,
    rho: &'a dyn SplineMap<1>,
    transfer: &'a dyn TransferFunction,
    diff: &'a dyn ColorDiff,
    settings: RenderSettings,
    boundary: DomainBoundary<'a>,
    bbox: BoundingBox,
}

impl<'a> Renderer<'a> {
    /// Create a renderer, validating `settings`.
    pub fn new(
        phi: &'a dyn SplineMap<2>,
        rho: &'a dyn SplineMap<1>,
        transfer: &'a dyn TransferFunction,
        settings: RenderSettings,
    ) -> Result<Self> {
        settings.validate()?;
        let boundary = DomainBoundary::new(phi, settings.interval, settings.intersection);
        let bbox = boundary.bounding_box();
        debug!(
            "bounding box x [{:.4}, {:.4}] y [{:.4}, {:.4}]",
            bbox.left, bbox.right, bbox.bottom, bbox.top
        );
        Ok(Self {
            phi,
            rho,
            transfer,
            diff: &EuclideanDiff,
            settings,
            boundary,
            bbox,
        })
    }

    /// Use `diff` instead of the Euclidean RGBA distance.
    pub fn with_diff(mut self, diff: &'a dyn ColorDiff) -> Self {
        self.diff = diff;
        self
    }

    /// The geometry map.
    pub fn phi(&self) -> &'a dyn SplineMap<2> {
        self.phi
    }

    /// The scalar field.
    pub fn rho(&self) -> &'a dyn SplineMap<1> {
        self.rho
    }

    /// The transfer function.
    pub fn transfer(&self) -> &'a dyn TransferFunction {
        self.transfer
    }

    /// The settings in use.
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// The domain boundary.
    pub fn boundary(&self) -> &DomainBoundary<'a> {
        &self.boundary
    }

    /// The geometry's bounding box.
    pub fn bounding_box(&self) -> &BoundingBox {
        &self.bbox
    }

    /// Build the voxel texture.
    pub fn voxelize(&self) -> Result<Voxelization> {
        voxelize(
            &self.boundary,
            self.phi,
            self.rho,
            &self.bbox,
            &self.settings.texture,
            &self.settings.newton,
        )
    }

    /// Pixel centers at resolution `n`.
    pub fn create_pixels(&self, n: usize) -> Vec<Point2> {
        self.settings.screen.pixel_centers(n)
    }

    /// View rays from the eye through `n` pixels.
    pub fn view_rays(&self, n: usize) -> Vec<Ray2D> {
        let eye = self.settings.eye_point();
        let width = self.settings.screen.pixel_width(n);
        self.create_pixels(n)
            .into_iter()
            .map(|pixel| Ray2D::new(eye, pixel, width))
            .collect()
    }

    /// Cast `ray` with per-sample inversion at spacing `delta`.
    ///
    /// Samples inside the object are inverted inside their pixel frustum,
    /// each seeded with the previous sample's parameters (the first with the
    /// entry crossing). The composited spacing of a sample is the distance
    /// between its image and the previous sample's image.
    pub fn raycast_direct(&self, ray: &Ray2D, delta: f64) -> RayCast {
        let points: Vec<Point2> = ray
            .generate_sample_points(0.0, self.settings.ray_length, delta)
            .collect();
        let intersections = self.boundary.find_two_intersections(ray);
        let locations = classify_direct(&points, intersections.as_ref(), &self.bbox);

        let mut samples = Vec::with_capacity(points.len());
        let mut colors = Vec::new();
        let mut deltas = Vec::new();
        let mut stats = InversionStats::default();

        let mut prev_uv = intersections.map(|[entry, _]| entry.param_point);
        let mut prev_image: Option<Point2> = None;

        for (&point, &location) in points.iter().zip(&locations) {
            let mut trace = SampleTrace {
                point,
                location,
                uv: None,
                image: None,
                scalar: None,
            };
            if let (SamplingLocation::InsideObject, Some(guess)) = (location, prev_uv) {
                let frustum = ray.frustum_bounding_ellipse(point, delta);
                let inv = invert_in_frustum(
                    self.phi,
                    point,
                    guess,
                    &self.settings.interval,
                    &frustum,
                    &self.settings.newton,
                );
                stats.record(&inv);

                let scalar = self.rho.scalar(inv.uv);
                colors.push(self.transfer.apply(scalar));
                deltas.push(prev_image.map_or(delta, |prev| (inv.image - prev).norm()));

                trace.uv = Some(inv.uv);
                trace.image = Some(inv.image);
                trace.scalar = Some(scalar);
                prev_uv = Some(inv.uv);
                prev_image = Some(inv.image);
            }
            samples.push(trace);
        }

        RayCast {
            ray: *ray,
            color: front_to_back(&colors, &deltas, self.settings.opacity_unit),
            samples,
            intersections,
            stats,
        }
    }

    /// Cast `ray` against the voxel texture at the output sample spacing.
    pub fn raycast_voxelized(&self, ray: &Ray2D, texture: &Texture2D) -> RayCast {
        let delta = self.settings.view_ray_delta;
        let points: Vec<Point2> = ray
            .generate_sample_points(0.0, self.settings.ray_length, delta)
            .collect();
        let locations = classify_voxelized(&points, texture, &self.bbox);

        let mut samples = Vec::with_capacity(points.len());
        let mut colors = Vec::new();
        for (&point, &location) in points.iter().zip(&locations) {
            let scalar = (location == SamplingLocation::InsideObject)
                .then(|| texture.fetch(&self.bbox.normalize(&point)));
            if let Some(s) = scalar {
                colors.push(self.transfer.apply(s));
            }
            samples.push(SampleTrace {
                point,
                location,
                uv: None,
                image: None,
                scalar,
            });
        }

        RayCast {
            ray: *ray,
            color: front_to_back(&colors, &[delta], self.settings.opacity_unit),
            samples,
            intersections: None,
            stats: InversionStats::default(),
        }
    }

    /// Direct pass over `num_pixels` pixels.
    pub fn render_direct(&self, num_pixels: usize, delta: f64) -> Pass {
        let casts = self
            .view_rays(num_pixels)
            .par_iter()
            .map(|ray| self.raycast_direct(ray, delta))
            .collect();
        Pass::from_casts(casts)
    }

    /// Voxelized pass over `num_pixels` pixels.
    pub fn render_voxelized(&self, num_pixels: usize, texture: &Texture2D) -> Pass {
        let casts = self
            .view_rays(num_pixels)
            .par_iter()
            .map(|ray| self.raycast_voxelized(ray, texture))
            .collect();
        Pass::from_casts(casts)
    }

    /// Per-pixel error of `colors` against `reference`.
    ///
    /// A reference with a whole multiple of `colors.len()` pixels is
    /// box-averaged down to the output resolution first.
    pub fn diff_against_reference(&self, reference: &[Rgba], colors: &[Rgba]) -> Vec<f64> {
        if colors.is_empty() {
            return Vec::new();
        }
        let factor = reference.len() / colors.len();
        if factor > 1 && reference.len() % colors.len() == 0 {
            self.diff.compare(&downsample(reference, factor), colors)
        } else {
            self.diff.compare(reference, colors)
        }
    }

    /// Run the whole experiment.
    pub fn run(&self) -> Result<RenderReport> {
        let screen = &self.settings.screen;

        let voxelization = self.voxelize()?;
        info!(
            "voxelized {}x{} texture, {} of {} texels inside",
            voxelization.texture.width(),
            voxelization.texture.height(),
            voxelization.texture.set_count(),
            voxelization.texture.width() * voxelization.texture.height()
        );
        report_stats("voxelization", &voxelization.stats);

        let reference = self.render_direct(screen.num_pixels_ref(), self.settings.view_ray_delta_ref);
        report_stats("reference", &reference.stats);

        let direct = self.render_direct(screen.num_pixels, self.settings.view_ray_delta);
        report_stats("direct", &direct.stats);

        let voxelized = self.render_voxelized(screen.num_pixels, &voxelization.texture);

        let direct_diffs = self.diff_against_reference(&reference.colors, &direct.colors);
        let voxelized_diffs = self.diff_against_reference(&reference.colors, &voxelized.colors);
        let direct_summary = DiffSummary::from_diffs(&direct_diffs);
        let voxelized_summary = DiffSummary::from_diffs(&voxelized_diffs);
        info!(
            "direct diff: mean {:.5}, max {:.5}",
            direct_summary.mean, direct_summary.max
        );
        info!(
            "voxelized diff: mean {:.5}, max {:.5}",
            voxelized_summary.mean, voxelized_summary.max
        );

        Ok(RenderReport {
            settings: self.settings.clone(),
            bounding_box: self.bbox,
            voxelization,
            reference,
            direct,
            voxelized,
            direct_diffs,
            voxelized_diffs,
            direct_summary,
            voxelized_summary,
        })
    }
}

fn report_stats(pass: &str, stats: &InversionStats) {
    info!(
        "{pass}: {} inversions, {:.2} mean iterations, max residual {:.2e}",
        stats.total,
        stats.mean_iterations(),
        stats.max_residual
    );
    if stats.non_converged > 0 {
        warn!(
            "{pass}: {} of {} inversions did not converge ({} rejected, {} singular)",
            stats.non_converged, stats.total, stats.rejected, stats.singular
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::LookupTable;
    use isoray_spline::{scene, BSplineMap};

    struct Scene {
        phi: BSplineMap<2>,
        rho: BSplineMap<1>,
        lut: LookupTable,
    }

    fn reference() -> Scene {
        Scene {
            phi: scene::reference_geometry().unwrap(),
            rho: scene::reference_scalar_field().unwrap(),
            lut: LookupTable::default_ramp(100).unwrap(),
        }
    }

    fn small_settings() -> RenderSettings {
        let mut settings = RenderSettings::default();
        settings.screen.num_pixels = 4;
        settings.screen.reference_factor = 2;
        settings.texture.width = 6;
        settings.texture.height = 6;
        settings
    }

    #[test]
    fn test_ray_outside_bbox_is_transparent() {
        let s = reference();
        let r = Renderer::new(&s.phi, &s.rho, &s.lut, RenderSettings::default()).unwrap();
        let vox = r.voxelize().unwrap();
        let ray = Ray2D::new(Point2::new(-2.0, 0.65), Point2::new(-0.5, 3.0), 0.05);

        let direct = r.raycast_direct(&ray, 0.1);
        let voxelized = r.raycast_voxelized(&ray, &vox.texture);
        assert_eq!(direct.color, Rgba::TRANSPARENT);
        assert_eq!(voxelized.color, Rgba::TRANSPARENT);
        assert!(direct.intersections.is_none());
        assert!(direct
            .samples
            .iter()
            .all(|t| t.location == SamplingLocation::OutsideBoundingBox));
        assert_eq!(
            r.diff_against_reference(&[direct.color], &[voxelized.color]),
            vec![0.0]
        );
    }

    #[test]
    fn test_center_ray_hits_object() {
        let s = reference();
        let r = Renderer::new(&s.phi, &s.rho, &s.lut, RenderSettings::default()).unwrap();
        let ray = Ray2D::new(Point2::new(-2.0, 0.65), Point2::new(-0.5, 0.55), 0.05);
        let cast = r.raycast_direct(&ray, 0.1);

        assert!(cast.intersections.is_some());
        assert!(cast.color.a > 0.0 && cast.color.a <= 1.0);
        let inside: Vec<_> = cast
            .samples
            .iter()
            .filter(|t| t.location == SamplingLocation::InsideObject)
            .collect();
        assert!(!inside.is_empty());
        assert_eq!(cast.stats.total, inside.len());
        for t in inside {
            let uv = t.uv.unwrap();
            assert!(r.settings().interval.contains_point(&uv));
            assert_eq!(t.scalar, Some(s.rho.scalar(uv)));
        }
    }

    #[test]
    fn test_diff_downsamples_reference() {
        let s = reference();
        let r = Renderer::new(&s.phi, &s.rho, &s.lut, RenderSettings::default()).unwrap();
        let white = Rgba::new(1.0, 1.0, 1.0, 1.0);
        let reference = [white, Rgba::TRANSPARENT, white, white];
        let diffs = r.diff_against_reference(&reference, &[white * 0.5, white]);
        assert_eq!(diffs, vec![0.0, 0.0]);
    }

    #[test]
    fn test_run_produces_consistent_report() {
        let s = reference();
        let r = Renderer::new(&s.phi, &s.rho, &s.lut, small_settings()).unwrap();
        let report = r.run().unwrap();

        assert_eq!(report.reference.colors.len(), 8);
        assert_eq!(report.direct.colors.len(), 4);
        assert_eq!(report.voxelized.colors.len(), 4);
        assert_eq!(report.direct_diffs.len(), 4);
        assert_eq!(report.voxelized_diffs.len(), 4);
        assert_eq!(report.voxelization.texture.width(), 6);
        assert_eq!(report.voxelization.rows.len(), 6);
        assert_eq!(report.voxelized.stats.total, 0);
        assert!(report.direct.stats.total > 0);
        assert_eq!(
            report.direct_summary,
            DiffSummary::from_diffs(&report.direct_diffs)
        );
        assert!(report.direct.colors.iter().any(|c| c.a > 0.0));
        assert!(report.voxelized.colors.iter().any(|c| c.a > 0.0));
        assert!(serde_json::to_string(&report).is_ok());
    }

    // Only resolutions that divide the reference evenly are comparable: the
    // mean is not monotone across different downsampling factors (32 pixels
    // does worse than 20).
    #[test]
    fn test_direct_error_shrinks_with_resolution() {
        let s = reference();
        let r = Renderer::new(&s.phi, &s.rho, &s.lut, RenderSettings::default()).unwrap();
        let delta = r.settings().view_ray_delta_ref;
        let reference = r.render_direct(160, delta);

        let mean_diff = |n: usize| {
            let pass = r.render_direct(n, delta);
            DiffSummary::from_diffs(&r.diff_against_reference(&reference.colors, &pass.colors)).mean
        };
        let diffs: Vec<(usize, f64)> = [10, 20, 40, 80, 160]
            .into_iter()
            .map(|n| (n, mean_diff(n)))
            .collect();

        for pair in diffs.windows(2) {
            let ((n0, d0), (n1, d1)) = (pair[0], pair[1]);
            assert!(d1 < d0, "mean diff at {n1} pixels ({d1}) not below {n0} pixels ({d0})");
        }
        assert_eq!(diffs[4].1, 0.0);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let s = reference();
        let mut settings = RenderSettings::default();
        settings.screen.num_pixels = 0;
        assert!(Renderer::new(&s.phi, &s.rho, &s.lut, settings).is_err());
    }
}
