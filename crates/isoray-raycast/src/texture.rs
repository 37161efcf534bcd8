//! Voxel texture: the scalar field resampled on a grid over the bounding box.
//!
//! Construction casts one horizontal scan ray per texel row. Texel centers
//! between the row's entry and exit crossings are inverted left to right,
//! each solve seeded with its left neighbour's parameters, and the scalar
//! field is evaluated there. All other texels keep the sentinel value.

use isoray_math::{linspace, ParamInterval, Point2};
use isoray_spline::{ScalarField, SplineMap};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{RenderError, Result};
use crate::newton::{invert_in_frustum, InversionStats, NewtonSettings};
use crate::{BoundingBox, DomainBoundary, Intersection, Ray2D};

/// Texture resolution and sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureSettings {
    /// Texels per row.
    pub width: usize,
    /// Number of rows.
    pub height: usize,
    /// Value marking a texel outside the object.
    pub sentinel: f64,
}

impl Default for TextureSettings {
    fn default() -> Self {
        Self {
            width: 10,
            height: 10,
            sentinel: -1.0,
        }
    }
}

/// A row-major grid of scalars. Row 0 is the bottom of the bounding box.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Texture2D {
    width: usize,
    height: usize,
    data: Vec<f64>,
    sentinel: f64,
}

impl Texture2D {
    /// A texture filled with the sentinel.
    pub fn new(width: usize, height: usize, sentinel: f64) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RenderError::EmptyTexture { width, height });
        }
        Ok(Self {
            width,
            height,
            data: vec![sentinel; width * height],
            sentinel,
        })
    }

    /// A texture from rows of equal length, bottom row first.
    pub fn from_rows(rows: Vec<Vec<f64>>, sentinel: f64) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        let len = rows.iter().map(Vec::len).sum();
        if width == 0 || rows.iter().any(|r| r.len() != width) {
            return Err(RenderError::TextureSize { width, height, len });
        }
        Ok(Self {
            width,
            height,
            data: rows.into_iter().flatten().collect(),
            sentinel,
        })
    }

    /// Texels per row.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// The "unset" value.
    pub fn sentinel(&self) -> f64 {
        self.sentinel
    }

    /// Row-major texel values.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Value at `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.width + col]
    }

    fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.width + col] = value;
    }

    /// Exact comparison against the sentinel.
    #[allow(clippy::float_cmp)]
    pub fn is_sentinel(&self, value: f64) -> bool {
        value == self.sentinel
    }

    /// Number of texels holding a value.
    pub fn set_count(&self) -> usize {
        self.data.iter().filter(|&&v| !self.is_sentinel(v)).count()
    }

    /// Texel containing normalized coordinate `uv`, clamped to the grid.
    pub fn texel_index(&self, uv: &Point2) -> (usize, usize) {
        let col = ((uv.x * self.width as f64).floor().max(0.0) as usize).min(self.width - 1);
        let row = ((uv.y * self.height as f64).floor().max(0.0) as usize).min(self.height - 1);
        (row, col)
    }

    /// Nearest-texel lookup.
    pub fn closest(&self, uv: &Point2) -> f64 {
        let (row, col) = self.texel_index(uv);
        self.get(row, col)
    }

    /// Bilinear lookup between texel centers.
    ///
    /// Unset neighbours are left out and the remaining weights renormalized.
    /// Falls back to [`closest`](Self::closest) when every weighted
    /// neighbour is unset.
    pub fn fetch(&self, uv: &Point2) -> f64 {
        let x = (uv.x * self.width as f64 - 0.5).clamp(0.0, (self.width - 1) as f64);
        let y = (uv.y * self.height as f64 - 0.5).clamp(0.0, (self.height - 1) as f64);
        let (c0, r0) = (x.floor() as usize, y.floor() as usize);
        let (c1, r1) = ((c0 + 1).min(self.width - 1), (r0 + 1).min(self.height - 1));
        let (fx, fy) = (x - c0 as f64, y - r0 as f64);

        let taps = [
            (r0, c0, (1.0 - fx) * (1.0 - fy)),
            (r0, c1, fx * (1.0 - fy)),
            (r1, c0, (1.0 - fx) * fy),
            (r1, c1, fx * fy),
        ];
        let mut sum = 0.0;
        let mut weight = 0.0;
        for (r, c, w) in taps {
            let value = self.get(r, c);
            if w > 0.0 && !self.is_sentinel(value) {
                sum += w * value;
                weight += w;
            }
        }
        if weight > 0.0 {
            sum / weight
        } else {
            self.closest(uv)
        }
    }
}

/// One filled texel and the inversion that produced it.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TexelSample {
    /// Column in the texture.
    pub col: usize,
    /// Texel center in geometry space.
    pub target: Point2,
    /// Inverted parameter point.
    pub uv: Point2,
    /// Image of `uv`.
    pub image: Point2,
    /// Scalar field value at `uv`.
    pub scalar: f64,
}

/// One scan row of the voxelization pass.
#[derive(Debug, Clone, Serialize)]
pub struct ScanRow {
    /// Row index (0 at the bottom).
    pub row: usize,
    /// Height of the scan ray.
    pub y: f64,
    /// Entry and exit crossings of the scan ray.
    pub intersections: Option<[Intersection; 2]>,
    /// Filled texels, left to right.
    pub texels: Vec<TexelSample>,
    /// Inversion diagnostics for this row.
    pub stats: InversionStats,
}

/// Output of the voxelization pass.
#[derive(Debug, Clone, Serialize)]
pub struct Voxelization {
    /// The finished texture.
    pub texture: Texture2D,
    /// Per-row traces.
    pub rows: Vec<ScanRow>,
    /// Inversion diagnostics over all rows.
    pub stats: InversionStats,
}

/// Build the voxel texture of `rho` over `bbox`.
///
/// Fails with [`RenderError::EmptyTexture`] if either dimension is zero.
pub fn voxelize(
    boundary: &DomainBoundary<'_>,
    phi: &dyn SplineMap<2>,
    rho: &dyn SplineMap<1>,
    bbox: &BoundingBox,
    settings: &TextureSettings,
    newton: &NewtonSettings,
) -> Result<Voxelization> {
    let mut texture = Texture2D::new(settings.width, settings.height, settings.sentinel)?;
    let x_delta = bbox.width() / settings.width as f64;
    let y_delta = bbox.height() / settings.height as f64;
    let xs = linspace(
        bbox.left + x_delta / 2.0,
        bbox.right - x_delta / 2.0,
        settings.width,
    );
    let ys = linspace(
        bbox.bottom + y_delta / 2.0,
        bbox.top - y_delta / 2.0,
        settings.height,
    );

    let rows: Vec<ScanRow> = ys
        .par_iter()
        .enumerate()
        .map(|(row, &y)| {
            // Start well left of the box so both crossings lie ahead of the origin.
            let ray = Ray2D::new(
                Point2::new(bbox.left - bbox.width(), y),
                Point2::new(bbox.right, y),
                y_delta,
            );
            scan_row(boundary, phi, rho, &ray, row, &xs, x_delta, newton)
        })
        .collect();

    let mut stats = InversionStats::default();
    for scan in &rows {
        for texel in &scan.texels {
            texture.set(scan.row, texel.col, texel.scalar);
        }
        stats = stats.merge(scan.stats);
    }

    log::debug!(
        "voxelized {}x{} texture: {} texels set, {} inversions ({} not converged)",
        settings.width,
        settings.height,
        texture.set_count(),
        stats.total,
        stats.non_converged
    );

    Ok(Voxelization {
        texture,
        rows,
        stats,
    })
}

#[allow(clippy::too_many_arguments)]
fn scan_row(
    boundary: &DomainBoundary<'_>,
    phi: &dyn SplineMap<2>,
    rho: &dyn SplineMap<1>,
    ray: &Ray2D,
    row: usize,
    xs: &[f64],
    x_delta: f64,
    newton: &NewtonSettings,
) -> ScanRow {
    let y = ray.origin.y;
    let intersections = boundary.find_two_intersections(ray);
    let mut scan = ScanRow {
        row,
        y,
        intersections,
        texels: Vec::new(),
        stats: InversionStats::default(),
    };
    let Some([entry, exit]) = intersections else {
        return scan;
    };

    let interval: &ParamInterval = boundary.interval();
    let mut prev_uv = entry.param_point;
    for (col, &x) in xs.iter().enumerate() {
        if x < entry.geom_point.x || x > exit.geom_point.x {
            continue;
        }
        let target = Point2::new(x, y);
        let frustum = ray.frustum_bounding_ellipse_parallel(target, x_delta);
        let inv = invert_in_frustum(phi, target, prev_uv, interval, &frustum, newton);
        scan.stats.record(&inv);

        scan.texels.push(TexelSample {
            col,
            target,
            uv: inv.uv,
            image: inv.image,
            scalar: rho.scalar(inv.uv),
        });
        prev_uv = inv.uv;
    }
    scan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IntersectionSettings;
    use approx::assert_relative_eq;
    use isoray_spline::{scene, IdentityMap, LinearRamp};

    fn two_by_two() -> Texture2D {
        Texture2D::from_rows(vec![vec![0.0, 1.0], vec![2.0, 3.0]], -1.0).unwrap()
    }

    #[test]
    fn test_closest() {
        let t = two_by_two();
        assert_eq!(t.closest(&Point2::new(0.1, 0.1)), 0.0);
        assert_eq!(t.closest(&Point2::new(0.9, 0.1)), 1.0);
        assert_eq!(t.closest(&Point2::new(0.1, 0.9)), 2.0);
        assert_eq!(t.closest(&Point2::new(1.0, 1.0)), 3.0);
        assert_eq!(t.closest(&Point2::new(-0.5, 2.0)), 2.0);
    }

    #[test]
    fn test_fetch_bilinear() {
        let t = two_by_two();
        assert_relative_eq!(t.fetch(&Point2::new(0.5, 0.5)), 1.5, epsilon = 1e-12);
        assert_relative_eq!(t.fetch(&Point2::new(0.25, 0.25)), 0.0, epsilon = 1e-12);
        assert_relative_eq!(t.fetch(&Point2::new(0.75, 0.25)), 1.0, epsilon = 1e-12);
        assert_relative_eq!(t.fetch(&Point2::new(0.5, 0.25)), 0.5, epsilon = 1e-12);
        // Edges clamp to the outermost texel centers.
        assert_relative_eq!(t.fetch(&Point2::new(0.0, 0.0)), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_fetch_skips_sentinel() {
        let t = Texture2D::from_rows(vec![vec![-1.0, 1.0], vec![-1.0, 3.0]], -1.0).unwrap();
        assert_relative_eq!(t.fetch(&Point2::new(0.5, 0.5)), 2.0, epsilon = 1e-12);
        // Only unset taps carry weight: fall back to the nearest texel.
        assert_eq!(t.fetch(&Point2::new(0.1, 0.1)), -1.0);
    }

    #[test]
    fn test_from_rows_rejects_ragged() {
        let err = Texture2D::from_rows(vec![vec![0.0, 1.0], vec![2.0]], -1.0).unwrap_err();
        assert!(matches!(err, RenderError::TextureSize { width: 2, height: 2, len: 3 }));
        assert!(Texture2D::from_rows(Vec::new(), -1.0).is_err());
    }

    #[test]
    fn test_new_rejects_empty_size() {
        let err = Texture2D::new(0, 4, -1.0).unwrap_err();
        assert!(matches!(err, RenderError::EmptyTexture { width: 0, height: 4 }));
        assert!(Texture2D::new(4, 0, -1.0).is_err());

        let t = Texture2D::new(3, 2, -1.0).unwrap();
        assert_eq!(t.set_count(), 0);
        assert!(t.is_sentinel(t.fetch(&Point2::new(0.5, 0.5))));
    }

    #[test]
    fn test_voxelize_rejects_empty_size() {
        let interval = ParamInterval::new(0.0, 1.0);
        let boundary = DomainBoundary::new(&IdentityMap, interval, IntersectionSettings::default());
        let bbox = boundary.bounding_box();
        let settings = TextureSettings {
            width: 0,
            height: 4,
            sentinel: -1.0,
        };
        let result = voxelize(
            &boundary,
            &IdentityMap,
            &LinearRamp,
            &bbox,
            &settings,
            &NewtonSettings::default(),
        );
        assert!(matches!(result, Err(RenderError::EmptyTexture { .. })));
    }

    #[test]
    fn test_voxelize_identity() {
        let interval = ParamInterval::new(0.0, 1.0);
        let boundary = DomainBoundary::new(&IdentityMap, interval, IntersectionSettings::default());
        let bbox = boundary.bounding_box();
        let settings = TextureSettings {
            width: 4,
            height: 4,
            sentinel: -1.0,
        };
        let vox = voxelize(
            &boundary,
            &IdentityMap,
            &LinearRamp,
            &bbox,
            &settings,
            &NewtonSettings::default(),
        )
        .unwrap();
        let t = &vox.texture;
        assert_eq!(t.set_count(), 16);
        for row in 0..4 {
            let v = (row as f64 + 0.5) / 4.0;
            for col in 0..4 {
                assert_relative_eq!(t.get(row, col), v, epsilon = 1e-9);
            }
        }
        assert_eq!(vox.stats.non_converged, 0);
    }

    #[test]
    fn test_voxelize_reference_scene_invariant() {
        let phi = scene::reference_geometry().unwrap();
        let rho = scene::reference_scalar_field().unwrap();
        let interval = ParamInterval::default();
        let boundary = DomainBoundary::new(&phi, interval, IntersectionSettings::default());
        let bbox = boundary.bounding_box();
        let settings = TextureSettings::default();
        let vox =
            voxelize(&boundary, &phi, &rho, &bbox, &settings, &NewtonSettings::default()).unwrap();

        let t = &vox.texture;
        assert!(t.set_count() > 0);
        assert!(t.set_count() < settings.width * settings.height);

        let mut filled = vec![false; settings.width * settings.height];
        for scan in &vox.rows {
            for texel in &scan.texels {
                filled[scan.row * settings.width + texel.col] = true;
                assert_eq!(t.get(scan.row, texel.col), rho.scalar(texel.uv));
                assert!(interval.contains_point(&texel.uv));
            }
        }
        for row in 0..settings.height {
            for col in 0..settings.width {
                if !filled[row * settings.width + col] {
                    assert!(t.is_sentinel(t.get(row, col)));
                }
            }
        }
    }
}
