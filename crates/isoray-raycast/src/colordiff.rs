//! Per-pixel color comparison.

use isoray_math::Rgba;
use serde::Serialize;

/// Compares two color sequences pixel by pixel.
pub trait ColorDiff: Send + Sync {
    /// Error value for each pair of pixels. Extra pixels in either input are ignored.
    fn compare(&self, reference: &[Rgba], colors: &[Rgba]) -> Vec<f64>;
}

/// Euclidean distance over the four RGBA components.
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanDiff;

impl ColorDiff for EuclideanDiff {
    fn compare(&self, reference: &[Rgba], colors: &[Rgba]) -> Vec<f64> {
        reference
            .iter()
            .zip(colors)
            .map(|(a, b)| a.distance(b))
            .collect()
    }
}

/// Box-average consecutive groups of `factor` colors.
///
/// A trailing partial group is averaged over the colors it has.
pub fn downsample(colors: &[Rgba], factor: usize) -> Vec<Rgba> {
    if factor <= 1 {
        return colors.to_vec();
    }
    colors
        .chunks(factor)
        .map(|group| {
            let sum = group.iter().fold(Rgba::TRANSPARENT, |acc, &c| acc + c);
            sum * (1.0 / group.len() as f64)
        })
        .collect()
}

/// Aggregate of a diff sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DiffSummary {
    /// Mean error.
    pub mean: f64,
    /// Largest error.
    pub max: f64,
}

impl DiffSummary {
    /// Summarize `diffs`; zero for an empty slice.
    pub fn from_diffs(diffs: &[f64]) -> Self {
        if diffs.is_empty() {
            return Self::default();
        }
        Self {
            mean: diffs.iter().sum::<f64>() / diffs.len() as f64,
            max: diffs.iter().copied().fold(0.0, f64::max),
        }
    }
}
