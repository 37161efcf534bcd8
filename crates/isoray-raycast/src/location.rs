//! Inside/outside classification of ray samples.

use isoray_math::Point2;
use serde::Serialize;

use crate::{BoundingBox, Intersection, Texture2D};

/// Where a sample point lies relative to the rendered object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SamplingLocation {
    /// Inside the mapped domain.
    InsideObject,
    /// Inside the bounding box but outside the mapped domain.
    OutsideObject,
    /// Outside the bounding box.
    OutsideBoundingBox,
}

/// Membership test for points already known to lie in the bounding box.
pub trait InsideTest {
    /// Whether `p` is inside the object.
    fn is_inside(&self, p: &Point2) -> bool;
}

impl<T: InsideTest> InsideTest for Option<T> {
    fn is_inside(&self, p: &Point2) -> bool {
        self.as_ref().is_some_and(|t| t.is_inside(p))
    }
}

/// The span between an entry and exit crossing, tested on x.
///
/// Only valid for rays travelling in +x whose crossings of the boundary are
/// monotone in x, which holds for the view and scan rays the renderer casts.
#[derive(Debug, Clone, Copy)]
pub struct IntersectionSpan {
    entry_x: f64,
    exit_x: f64,
}

impl IntersectionSpan {
    /// Span of an `(entry, exit)` pair.
    pub fn new(intersections: &[Intersection; 2]) -> Self {
        Self {
            entry_x: intersections[0].geom_point.x,
            exit_x: intersections[1].geom_point.x,
        }
    }
}

impl InsideTest for IntersectionSpan {
    fn is_inside(&self, p: &Point2) -> bool {
        self.entry_x <= p.x && p.x <= self.exit_x
    }
}

/// Texture lookup: a point is inside if its nearest texel is set.
#[derive(Debug, Clone, Copy)]
pub struct TextureMask<'a> {
    texture: &'a Texture2D,
    bbox: &'a BoundingBox,
}

impl<'a> TextureMask<'a> {
    /// Mask over `texture` laid out on `bbox`.
    pub fn new(texture: &'a Texture2D, bbox: &'a BoundingBox) -> Self {
        Self { texture, bbox }
    }
}

impl InsideTest for TextureMask<'_> {
    fn is_inside(&self, p: &Point2) -> bool {
        // Interpolation would blend in the sentinel, so use the nearest texel.
        !self
            .texture
            .is_sentinel(self.texture.closest(&self.bbox.normalize(p)))
    }
}

/// Classify one point.
pub fn locate(p: &Point2, bbox: &BoundingBox, test: &dyn InsideTest) -> SamplingLocation {
    if !bbox.encloses_point(p) {
        SamplingLocation::OutsideBoundingBox
    } else if test.is_inside(p) {
        SamplingLocation::InsideObject
    } else {
        SamplingLocation::OutsideObject
    }
}

/// Classify points against an entry/exit pair (direct sampling).
pub fn classify_direct(
    points: &[Point2],
    intersections: Option<&[Intersection; 2]>,
    bbox: &BoundingBox,
) -> Vec<SamplingLocation> {
    let span = intersections.map(IntersectionSpan::new);
    points.iter().map(|p| locate(p, bbox, &span)).collect()
}

/// Classify points against the voxel texture (voxelized sampling).
pub fn classify_voxelized(
    points: &[Point2],
    texture: &Texture2D,
    bbox: &BoundingBox,
) -> Vec<SamplingLocation> {
    let mask = TextureMask::new(texture, bbox);
    points.iter().map(|p| locate(p, bbox, &mask)).collect()
}
