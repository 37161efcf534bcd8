//! Transfer functions: scalar to color.

use isoray_math::Rgba;
use serde::Serialize;

use crate::error::{RenderError, Result};

/// Maps a scalar sample to a straight-alpha color.
pub trait TransferFunction: Send + Sync {
    /// Color of scalar `s`.
    fn apply(&self, s: f64) -> Rgba;
}

impl<F> TransferFunction for F
where
    F: Fn(f64) -> Rgba + Send + Sync,
{
    fn apply(&self, s: f64) -> Rgba {
        self(s)
    }
}

/// Fixed-resolution lookup table over scalars in `[0, 1]`.
///
/// Entry `i` holds the color at `i / (len - 1)`; lookups interpolate linearly
/// between neighbouring entries and clamp outside the range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LookupTable {
    entries: Vec<Rgba>,
}

impl LookupTable {
    /// Sample a piecewise-linear ramp through `stops` at `resolution` entries.
    ///
    /// Stops are `(scalar, color)` pairs with strictly increasing scalars.
    pub fn from_stops(stops: &[(f64, Rgba)], resolution: usize) -> Result<Self> {
        if resolution < 2 {
            return Err(RenderError::InvalidTransfer(format!(
                "resolution must be at least 2, got {resolution}"
            )));
        }
        if stops.is_empty() {
            return Err(RenderError::InvalidTransfer("no color stops".into()));
        }
        if stops.windows(2).any(|w| w[1].0 <= w[0].0) {
            return Err(RenderError::InvalidTransfer(
                "stop positions must be strictly increasing".into(),
            ));
        }

        let entries = (0..resolution)
            .map(|i| ramp(stops, i as f64 / (resolution - 1) as f64))
            .collect();
        Ok(Self { entries })
    }

    /// Blue-green-red ramp with rising opacity.
    pub fn default_ramp(resolution: usize) -> Result<Self> {
        Self::from_stops(
            &[
                (0.0, Rgba::new(0.0, 0.0, 1.0, 0.3)),
                (0.5, Rgba::new(0.0, 1.0, 0.0, 0.5)),
                (1.0, Rgba::new(1.0, 0.0, 0.0, 0.8)),
            ],
            resolution,
        )
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; construction requires at least two entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TransferFunction for LookupTable {
    fn apply(&self, s: f64) -> Rgba {
        let last = self.entries.len() - 1;
        let x = if s.is_nan() { 0.0 } else { s.clamp(0.0, 1.0) } * last as f64;
        let i = (x.floor() as usize).min(last.saturating_sub(1));
        let f = x - i as f64;
        self.entries[i].lerp(self.entries[(i + 1).min(last)], f)
    }
}

fn ramp(stops: &[(f64, Rgba)], s: f64) -> Rgba {
    let upper = stops.partition_point(|(pos, _)| *pos <= s);
    match upper {
        0 => stops[0].1,
        n if n == stops.len() => stops[n - 1].1,
        n => {
            let (p0, c0) = stops[n - 1];
            let (p1, c1) = stops[n];
            c0.lerp(c1, (s - p0) / (p1 - p0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_ramp_endpoints() {
        let lut = LookupTable::default_ramp(100).unwrap();
        assert_eq!(lut.len(), 100);
        assert_eq!(lut.apply(0.0), Rgba::new(0.0, 0.0, 1.0, 0.3));
        let top = lut.apply(1.0);
        for (x, y) in top.to_array().into_iter().zip([1.0, 0.0, 0.0, 0.8]) {
            assert_relative_eq!(x, y, epsilon = 1e-12);
        }
        assert_eq!(lut.apply(-3.0), lut.apply(0.0));
        assert_eq!(lut.apply(7.0), top);
    }

    #[test]
    fn test_interpolates_between_entries() {
        let lut = LookupTable::from_stops(
            &[
                (0.0, Rgba::new(0.0, 0.0, 0.0, 0.0)),
                (1.0, Rgba::new(1.0, 1.0, 1.0, 1.0)),
            ],
            3,
        )
        .unwrap();
        let c = lut.apply(0.25);
        assert_relative_eq!(c.r, 0.25, epsilon = 1e-12);
        assert_relative_eq!(c.a, 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_midpoint_of_default_ramp() {
        let lut = LookupTable::default_ramp(101).unwrap();
        let c = lut.apply(0.5);
        assert_relative_eq!(c.g, 1.0, epsilon = 1e-12);
        assert_relative_eq!(c.a, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_tables() {
        assert!(LookupTable::default_ramp(1).is_err());
        assert!(LookupTable::from_stops(&[], 10).is_err());
        let dup = [
            (0.5, Rgba::TRANSPARENT),
            (0.5, Rgba::new(1.0, 1.0, 1.0, 1.0)),
        ];
        assert!(matches!(
            LookupTable::from_stops(&dup, 10),
            Err(RenderError::InvalidTransfer(_))
        ));
    }

    #[test]
    fn test_closure_transfer() {
        let grey = |s: f64| Rgba::new(s, s, s, 1.0);
        assert_eq!(grey.apply(0.25), Rgba::new(0.25, 0.25, 0.25, 1.0));
    }
}
