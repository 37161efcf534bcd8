#![warn(missing_docs)]

//! Direct and voxelized ray casting of scalar fields over isogeometric domains.
//!
//! The domain is the image of the parameter square under a spline geometry
//! map `phi`; a second spline `rho` defines the scalar field on it. A pixel
//! is rendered either by inverting `phi` at every sample along its view ray
//! (direct sampling) or by looking samples up in a texture precomputed over
//! the bounding box (voxelized sampling). Both are compared against a
//! supersampled direct reference.
//!
//! # Architecture
//!
//! - [`Ray2D`], [`Frustum`] - view rays, sample points, pixel footprints
//! - [`BoundingBox`] - axis-aligned bound from the geometry coefficients
//! - [`newton`] - clamped and frustum-constrained inversion of `phi`
//! - [`DomainBoundary`] - entry and exit crossings of a ray
//! - [`location`] - inside/outside classification of samples
//! - [`texture`] - voxel texture construction and lookup
//! - [`compositing`], [`transfer`], [`colordiff`] - color pipeline
//! - [`Renderer`] - the full experiment
//! - [`plot`] - plain-data draw commands for an external plotter
//!
//! # Example
//!
//! ```ignore
//! use isoray_raycast::{LookupTable, RenderSettings, Renderer};
//! use isoray_spline::scene;
//!
//! let phi = scene::reference_geometry()?;
//! let rho = scene::reference_scalar_field()?;
//! let lut = LookupTable::default_ramp(100)?;
//!
//! let renderer = Renderer::new(&phi, &rho, &lut, RenderSettings::default())?;
//! let report = renderer.run()?;
//! println!("direct mean diff: {}", report.direct_summary.mean);
//! ```

mod bbox;
mod boundary;
mod ray;

pub mod colordiff;
pub mod compositing;
pub mod error;
pub mod location;
pub mod newton;
pub mod pipeline;
pub mod plot;
pub mod settings;
pub mod texture;
pub mod transfer;

pub use bbox::BoundingBox;
pub use boundary::{DomainBoundary, Intersection, IntersectionSettings};
pub use colordiff::{ColorDiff, DiffSummary, EuclideanDiff};
pub use compositing::front_to_back;
pub use error::{RenderError, Result};
pub use location::SamplingLocation;
pub use newton::{invert_clamped, invert_in_frustum, Inversion, InversionStats, NewtonSettings};
pub use pipeline::{Pass, RayCast, RenderReport, Renderer, SampleTrace};
pub use plot::{DrawCommand, PlotRegion, PlotSink, RecordingSink};
pub use ray::{Frustum, Ray2D, SamplePoints};
pub use settings::{RenderSettings, ScreenSettings};
pub use texture::{Texture2D, TextureSettings, Voxelization};
pub use transfer::{LookupTable, TransferFunction};
