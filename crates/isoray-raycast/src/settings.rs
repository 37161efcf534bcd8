//! Render configuration.

use isoray_math::{linspace, ParamInterval, Point2};
use serde::{Deserialize, Serialize};

use crate::error::{RenderError, Result};
use crate::{IntersectionSettings, NewtonSettings, TextureSettings};

/// The screen line pixels are placed on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenSettings {
    /// x coordinate of the vertical screen line.
    pub pixel_x: f64,
    /// Top end of the screen.
    pub top: f64,
    /// Bottom end of the screen.
    pub bottom: f64,
    /// Output resolution.
    pub num_pixels: usize,
    /// Reference pixels per output pixel.
    pub reference_factor: usize,
}

impl Default for ScreenSettings {
    fn default() -> Self {
        Self {
            pixel_x: -0.5,
            top: 0.95,
            bottom: 0.15,
            num_pixels: 16,
            reference_factor: 10,
        }
    }
}

impl ScreenSettings {
    /// Resolution of the reference pass.
    pub fn num_pixels_ref(&self) -> usize {
        self.num_pixels * self.reference_factor
    }

    /// Pixel height at resolution `n`.
    pub fn pixel_width(&self, n: usize) -> f64 {
        (self.top - self.bottom) / n as f64
    }

    /// Centers of `n` pixels from bottom to top.
    pub fn pixel_centers(&self, n: usize) -> Vec<Point2> {
        let half = self.pixel_width(n) / 2.0;
        linspace(self.bottom + half, self.top - half, n)
            .into_iter()
            .map(|y| Point2::new(self.pixel_x, y))
            .collect()
    }
}

/// Everything a render needs besides the maps and transfer function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Clamped spline parameter interval.
    pub interval: ParamInterval,
    /// Eye position all view rays start from.
    pub eye: [f64; 2],
    /// Pixel layout.
    pub screen: ScreenSettings,
    /// Sample spacing of the output passes.
    pub view_ray_delta: f64,
    /// Sample spacing of the reference pass.
    pub view_ray_delta_ref: f64,
    /// Ray parameter at which marching stops.
    pub ray_length: f64,
    /// Voxel texture layout.
    pub texture: TextureSettings,
    /// Newton solver limits.
    pub newton: NewtonSettings,
    /// Boundary intersection accuracy.
    pub intersection: IntersectionSettings,
    /// Entries in the transfer function table.
    pub transfer_resolution: usize,
    /// Sample spacing the transfer function's opacities refer to.
    pub opacity_unit: f64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            interval: ParamInterval::default(),
            eye: [-2.0, 0.65],
            screen: ScreenSettings::default(),
            view_ray_delta: 0.1,
            view_ray_delta_ref: 0.05,
            ray_length: 10.0,
            texture: TextureSettings::default(),
            newton: NewtonSettings::default(),
            intersection: IntersectionSettings::default(),
            transfer_resolution: 100,
            opacity_unit: 0.1,
        }
    }
}

impl RenderSettings {
    /// The eye as a point.
    pub fn eye_point(&self) -> Point2 {
        Point2::new(self.eye[0], self.eye[1])
    }

    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if !(self.interval.max > self.interval.min) {
            return Err(RenderError::InvalidSettings(
                "interval must have positive length".into(),
            ));
        }
        if self.screen.num_pixels == 0 || self.screen.reference_factor == 0 {
            return Err(RenderError::InvalidSettings(
                "num_pixels and reference_factor must be positive".into(),
            ));
        }
        if !(self.screen.top > self.screen.bottom) {
            return Err(RenderError::InvalidSettings(
                "screen top must be above screen bottom".into(),
            ));
        }
        if self.screen.pixel_x <= self.eye[0] {
            return Err(RenderError::InvalidSettings(
                "screen must lie in +x of the eye".into(),
            ));
        }
        for (name, value) in [
            ("view_ray_delta", self.view_ray_delta),
            ("view_ray_delta_ref", self.view_ray_delta_ref),
            ("ray_length", self.ray_length),
            ("opacity_unit", self.opacity_unit),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(RenderError::InvalidSettings(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if self.texture.width == 0 || self.texture.height == 0 {
            return Err(RenderError::InvalidSettings(
                "texture must have at least one texel".into(),
            ));
        }
        if self.transfer_resolution < 2 {
            return Err(RenderError::InvalidSettings(
                "transfer_resolution must be at least 2".into(),
            ));
        }
        if self.newton.max_iterations == 0 {
            return Err(RenderError::InvalidSettings(
                "newton.max_iterations must be positive".into(),
            ));
        }
        if self.intersection.samples_per_edge == 0 {
            return Err(RenderError::InvalidSettings(
                "intersection.samples_per_edge must be positive".into(),
            ));
        }
        Ok(())
    }
}
