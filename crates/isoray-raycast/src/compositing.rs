//! Front-to-back alpha compositing.

use isoray_math::Rgba;

/// Composite straight-alpha sample colors front to back.
///
/// Each sample's opacity is corrected for its spacing `d` relative to the
/// spacing `unit` the transfer function's opacities are defined for:
/// `alpha' = 1 - (1 - alpha)^(d / unit)`. Sample `i` uses `deltas[i]`; when
/// `deltas` is shorter than `colors` the last delta is reused, and with no
/// deltas at all every sample is taken to be `unit` long.
///
/// The result has premultiplied color. No samples gives [`Rgba::TRANSPARENT`].
pub fn front_to_back(colors: &[Rgba], deltas: &[f64], unit: f64) -> Rgba {
    let mut acc = Rgba::TRANSPARENT;
    for (i, color) in colors.iter().enumerate() {
        let d = deltas.get(i).or(deltas.last()).copied().unwrap_or(unit);
        let alpha = corrected_opacity(color.a, d, unit);
        let weight = (1.0 - acc.a) * alpha;
        acc.r += weight * color.r;
        acc.g += weight * color.g;
        acc.b += weight * color.b;
        acc.a += weight;
    }
    acc
}

/// Opacity of a sample of length `d` whose opacity over length `unit` is `alpha`.
pub fn corrected_opacity(alpha: f64, d: f64, unit: f64) -> f64 {
    let alpha = alpha.clamp(0.0, 1.0);
    if unit <= 0.0 || d <= 0.0 {
        return if d <= 0.0 { 0.0 } else { alpha };
    }
    1.0 - (1.0 - alpha).powf(d / unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_rgba_eq(a: Rgba, b: Rgba) {
        for (x, y) in a.to_array().into_iter().zip(b.to_array()) {
            assert_relative_eq!(x, y, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_empty_is_transparent() {
        assert_eq!(front_to_back(&[], &[], 0.1), Rgba::TRANSPARENT);
    }

    #[test]
    fn test_single_unit_sample() {
        let c = Rgba::new(1.0, 0.5, 0.0, 0.4);
        let out = front_to_back(&[c], &[0.1], 0.1);
        assert_rgba_eq(out, Rgba::new(0.4, 0.2, 0.0, 0.4));
    }

    #[test]
    fn test_splitting_sample_is_invariant() {
        let c = Rgba::new(0.2, 0.7, 0.3, 0.6);
        let whole = front_to_back(&[c], &[0.08], 0.1);
        let halves = front_to_back(&[c, c], &[0.04, 0.04], 0.1);
        assert_rgba_eq(whole, halves);

        let quarters = front_to_back(&[c; 4], &[0.02], 0.1);
        assert_rgba_eq(whole, quarters);
    }

    #[test]
    fn test_front_sample_occludes() {
        let red = Rgba::new(1.0, 0.0, 0.0, 1.0);
        let blue = Rgba::new(0.0, 0.0, 1.0, 1.0);
        let out = front_to_back(&[red, blue], &[], 0.1);
        assert_rgba_eq(out, Rgba::new(1.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_missing_deltas_reuse_last() {
        let c = Rgba::new(0.0, 1.0, 0.0, 0.5);
        let explicit = front_to_back(&[c, c, c], &[0.05, 0.2, 0.2], 0.1);
        let short = front_to_back(&[c, c, c], &[0.05, 0.2], 0.1);
        assert_rgba_eq(explicit, short);
    }

    #[test]
    fn test_corrected_opacity() {
        assert_relative_eq!(corrected_opacity(0.5, 0.1, 0.1), 0.5);
        assert_relative_eq!(corrected_opacity(0.5, 0.2, 0.1), 0.75);
        assert_eq!(corrected_opacity(0.5, 0.0, 0.1), 0.0);
        assert_eq!(corrected_opacity(1.0, 0.01, 0.1), 1.0);
    }
}
