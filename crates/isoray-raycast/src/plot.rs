//! Plain-data draw commands for visualizing a run.
//!
//! The renderer never depends on a plotting library. Everything worth
//! looking at is translated into [`DrawCommand`]s tagged with the
//! [`PlotRegion`] they belong to and handed to a [`PlotSink`].

use isoray_math::{ParamInterval, Point2, Rgba};
use isoray_spline::{GeometryMap, ScalarField, SplineMap};
use serde::Serialize;

use crate::location::SamplingLocation;
use crate::pipeline::{Pass, RenderReport, Renderer};
use crate::transfer::TransferFunction;
use crate::BoundingBox;

const GRID_COLOR: Rgba = Rgba::new(0.5, 0.5, 0.5, 1.0);
const BLACK: Rgba = Rgba::new(0.0, 0.0, 0.0, 1.0);
const BLUE: Rgba = Rgba::new(0.0, 0.0, 1.0, 1.0);

/// Panel a command is drawn into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlotRegion {
    /// Geometry space: grid lines, boundary, rays, samples.
    Geometry,
    /// Parameter space: grid lines, scalar field, inverted samples.
    Parameter,
    /// Geometry space overlaid with the voxel texture.
    Sampling,
    /// Per-pixel RGB components.
    PixelComponents,
    /// Pixel color strips.
    PixelColors,
    /// Per-pixel diffs against the reference.
    PixelDiffs,
}

/// Marker shape for point sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Marker {
    /// Filled circle.
    Dot,
    /// Cross.
    Cross,
    /// Open circle.
    Circle,
}

/// One thing to draw.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DrawCommand {
    /// Scattered points, one color each or one for all.
    Points {
        /// Positions.
        points: Vec<Point2>,
        /// One color per point, or a single color.
        colors: Vec<Rgba>,
        /// Marker shape.
        marker: Marker,
    },
    /// Connected line segments.
    Polyline {
        /// Vertices.
        points: Vec<Point2>,
        /// Line color.
        color: Rgba,
    },
    /// Row-major scalar grid stretched over `extent`, bottom row first.
    ScalarImage {
        /// Columns.
        width: usize,
        /// Rows.
        height: usize,
        /// Values.
        values: Vec<f64>,
        /// Placement.
        extent: BoundingBox,
    },
    /// Row-major color grid stretched over `extent`, bottom row first.
    ColorImage {
        /// Columns.
        width: usize,
        /// Rows.
        height: usize,
        /// Colors.
        pixels: Vec<Rgba>,
        /// Placement.
        extent: BoundingBox,
    },
    /// Filled rectangle.
    Rect {
        /// Placement.
        extent: BoundingBox,
        /// Fill color.
        color: Rgba,
    },
    /// Text label.
    Label {
        /// Anchor.
        at: Point2,
        /// Text.
        text: String,
    },
}

/// Receiver of draw commands.
pub trait PlotSink {
    /// Start a figure for `num_pixels` output pixels.
    fn begin(&mut self, num_pixels: usize);
    /// Draw one command.
    fn draw(&mut self, region: PlotRegion, command: DrawCommand);
    /// Finish the figure.
    fn finish(&mut self);
}

/// A sink that keeps every command.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecordingSink {
    /// Output resolution announced by `begin`.
    pub num_pixels: usize,
    /// Commands in drawing order.
    pub commands: Vec<(PlotRegion, DrawCommand)>,
    /// Whether `finish` was called.
    pub finished: bool,
}

impl RecordingSink {
    /// Commands drawn into `region`.
    pub fn in_region(&self, region: PlotRegion) -> impl Iterator<Item = &DrawCommand> {
        self.commands
            .iter()
            .filter(move |(r, _)| *r == region)
            .map(|(_, c)| c)
    }
}

impl PlotSink for RecordingSink {
    fn begin(&mut self, num_pixels: usize) {
        self.num_pixels = num_pixels;
        self.commands.clear();
        self.finished = false;
    }

    fn draw(&mut self, region: PlotRegion, command: DrawCommand) {
        self.commands.push((region, command));
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

/// `m` lines of constant `u` and `n` of constant `v`, in both spaces.
pub fn emit_grid<M: SplineMap<2> + ?Sized>(
    phi: &M,
    interval: &ParamInterval,
    m: usize,
    n: usize,
    precision: usize,
    sink: &mut dyn PlotSink,
) {
    let along = interval.linspace(precision);
    let lines = interval
        .linspace(m)
        .into_iter()
        .map(|u| along.iter().map(|&v| Point2::new(u, v)).collect::<Vec<_>>())
        .chain(
            interval
                .linspace(n)
                .into_iter()
                .map(|v| along.iter().map(|&u| Point2::new(u, v)).collect()),
        );
    for params in lines {
        let geom = params.iter().map(|&uv| phi.point(uv)).collect();
        sink.draw(
            PlotRegion::Geometry,
            DrawCommand::Polyline {
                points: geom,
                color: GRID_COLOR,
            },
        );
        sink.draw(
            PlotRegion::Parameter,
            DrawCommand::Polyline {
                points: params,
                color: GRID_COLOR,
            },
        );
    }
}

/// The scalar field through the transfer function, over the parameter square.
pub fn emit_scalar_field<M: SplineMap<1> + ?Sized>(
    rho: &M,
    transfer: &dyn TransferFunction,
    interval: &ParamInterval,
    precision: usize,
    sink: &mut dyn PlotSink,
) {
    let range = interval.linspace(precision);
    let pixels = range
        .iter()
        .flat_map(|&v| {
            range
                .iter()
                .map(move |&u| transfer.apply(rho.scalar(Point2::new(u, v))))
        })
        .collect();
    sink.draw(
        PlotRegion::Parameter,
        DrawCommand::ColorImage {
            width: precision,
            height: precision,
            pixels,
            extent: BoundingBox::new(interval.min, interval.max, interval.min, interval.max),
        },
    );
}

/// Draw everything in `report`.
pub fn emit_report(report: &RenderReport, sink: &mut dyn PlotSink) {
    let bbox = report.bounding_box;
    sink.draw(
        PlotRegion::Geometry,
        DrawCommand::Polyline {
            points: closed(&bbox.corners()),
            color: BLACK,
        },
    );

    let texture = &report.voxelization.texture;
    sink.draw(
        PlotRegion::Sampling,
        DrawCommand::ScalarImage {
            width: texture.width(),
            height: texture.height(),
            values: texture.data().to_vec(),
            extent: bbox,
        },
    );
    let texels = report.voxelization.rows.iter().flat_map(|row| &row.texels);
    let (targets, params): (Vec<Point2>, Vec<Point2>) =
        texels.map(|t| (t.target, t.uv)).unzip();
    sink.draw(
        PlotRegion::Sampling,
        DrawCommand::Points {
            points: targets,
            colors: vec![BLACK],
            marker: Marker::Dot,
        },
    );
    sink.draw(
        PlotRegion::Parameter,
        DrawCommand::Points {
            points: params,
            colors: vec![BLACK],
            marker: Marker::Cross,
        },
    );

    emit_direct_pass(&report.direct, sink);
    emit_voxelized_samples(&report.voxelized, sink);

    for (i, cast) in report.direct.casts.iter().enumerate() {
        sink.draw(
            PlotRegion::Geometry,
            DrawCommand::Label {
                at: cast.ray.target,
                text: i.to_string(),
            },
        );
    }

    let n = report.direct.colors.len();
    let reference = crate::colordiff::downsample(
        &report.reference.colors,
        report.settings.screen.reference_factor,
    );
    for (row, colors) in [&reference, &report.direct.colors, &report.voxelized.colors]
        .into_iter()
        .enumerate()
    {
        emit_components(colors, sink);
        emit_strip(colors, row, sink);
    }
    for diffs in [&report.direct_diffs, &report.voxelized_diffs] {
        sink.draw(
            PlotRegion::PixelDiffs,
            DrawCommand::Polyline {
                points: indexed(diffs.iter().copied().take(n)),
                color: BLACK,
            },
        );
    }
}

/// Draw a whole run: grid, scalar field, boundary and the report.
pub fn emit_run(renderer: &Renderer<'_>, report: &RenderReport, sink: &mut dyn PlotSink) {
    let settings = renderer.settings();
    sink.begin(settings.screen.num_pixels);
    emit_grid(renderer.phi(), &settings.interval, 10, 10, 100, sink);
    emit_scalar_field(
        renderer.rho(),
        renderer.transfer(),
        &settings.interval,
        100,
        sink,
    );
    sink.draw(
        PlotRegion::Geometry,
        DrawCommand::Polyline {
            points: renderer.boundary().edge_curve(100),
            color: BLACK,
        },
    );
    emit_report(report, sink);
    sink.finish();
}

fn emit_direct_pass(pass: &Pass, sink: &mut dyn PlotSink) {
    for cast in &pass.casts {
        let end = cast
            .samples
            .last()
            .map_or(cast.ray.target, |s| s.point);
        sink.draw(
            PlotRegion::Geometry,
            DrawCommand::Polyline {
                points: vec![cast.ray.origin, end],
                color: GRID_COLOR,
            },
        );
        if let Some(hits) = &cast.intersections {
            sink.draw(
                PlotRegion::Geometry,
                DrawCommand::Points {
                    points: hits.iter().map(|h| h.geom_point).collect(),
                    colors: vec![BLUE],
                    marker: Marker::Circle,
                },
            );
        }
        let (points, colors): (Vec<Point2>, Vec<Rgba>) = cast
            .samples
            .iter()
            .map(|s| (s.image.unwrap_or(s.point), location_color(s.location)))
            .unzip();
        sink.draw(
            PlotRegion::Geometry,
            DrawCommand::Points {
                points,
                colors,
                marker: Marker::Dot,
            },
        );
        let params: Vec<Point2> = cast.samples.iter().filter_map(|s| s.uv).collect();
        if !params.is_empty() {
            sink.draw(
                PlotRegion::Parameter,
                DrawCommand::Points {
                    points: params,
                    colors: vec![BLACK],
                    marker: Marker::Cross,
                },
            );
        }
    }
}

fn emit_voxelized_samples(pass: &Pass, sink: &mut dyn PlotSink) {
    let (points, colors): (Vec<Point2>, Vec<Rgba>) = pass
        .casts
        .iter()
        .flat_map(|c| &c.samples)
        .map(|s| (s.point, location_color(s.location)))
        .unzip();
    sink.draw(
        PlotRegion::Sampling,
        DrawCommand::Points {
            points,
            colors,
            marker: Marker::Dot,
        },
    );
}

fn emit_components(colors: &[Rgba], sink: &mut dyn PlotSink) {
    let channels: [(fn(&Rgba) -> f64, Rgba); 3] = [
        (|c| c.r, Rgba::new(1.0, 0.0, 0.0, 1.0)),
        (|c| c.g, Rgba::new(0.0, 1.0, 0.0, 1.0)),
        (|c| c.b, Rgba::new(0.0, 0.0, 1.0, 1.0)),
    ];
    for (channel, color) in channels {
        sink.draw(
            PlotRegion::PixelComponents,
            DrawCommand::Polyline {
                points: indexed(colors.iter().map(channel)),
                color,
            },
        );
    }
}

/// One unit-high row of pixel rectangles; row 0 is drawn on top.
fn emit_strip(colors: &[Rgba], row: usize, sink: &mut dyn PlotSink) {
    let top = -(row as f64);
    for (i, &color) in colors.iter().enumerate() {
        let x = i as f64;
        sink.draw(
            PlotRegion::PixelColors,
            DrawCommand::Rect {
                extent: BoundingBox::new(x - 0.5, x + 0.5, top - 1.0, top),
                color,
            },
        );
    }
}

fn location_color(location: SamplingLocation) -> Rgba {
    match location {
        SamplingLocation::InsideObject => Rgba::new(0.0, 0.6, 0.0, 1.0),
        SamplingLocation::OutsideObject => Rgba::new(0.8, 0.4, 0.0, 1.0),
        SamplingLocation::OutsideBoundingBox => Rgba::new(0.6, 0.6, 0.6, 1.0),
    }
}

fn indexed(values: impl Iterator<Item = f64>) -> Vec<Point2> {
    values
        .enumerate()
        .map(|(i, y)| Point2::new(i as f64, y))
        .collect()
}

fn closed(points: &[Point2]) -> Vec<Point2> {
    let mut out = points.to_vec();
    if let Some(&first) = points.first() {
        out.push(first);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::RenderSettings;
    use crate::transfer::LookupTable;
    use isoray_spline::{scene, IdentityMap, LinearRamp};

    #[test]
    fn test_grid_lines() {
        let mut sink = RecordingSink::default();
        emit_grid(&IdentityMap, &ParamInterval::new(0.0, 1.0), 3, 4, 5, &mut sink);
        assert_eq!(sink.in_region(PlotRegion::Geometry).count(), 7);
        assert_eq!(sink.in_region(PlotRegion::Parameter).count(), 7);
        // The identity map draws the same lines in both spaces.
        let geom: Vec<_> = sink.in_region(PlotRegion::Geometry).collect();
        let param: Vec<_> = sink.in_region(PlotRegion::Parameter).collect();
        assert_eq!(geom, param);
    }

    #[test]
    fn test_scalar_field_image() {
        let mut sink = RecordingSink::default();
        let lut = LookupTable::default_ramp(10).unwrap();
        emit_scalar_field(&LinearRamp, &lut, &ParamInterval::new(0.0, 1.0), 8, &mut sink);
        match &sink.commands[..] {
            [(PlotRegion::Parameter, DrawCommand::ColorImage { width, height, pixels, .. })] => {
                assert_eq!((*width, *height), (8, 8));
                assert_eq!(pixels.len(), 64);
                assert_eq!(pixels[0], lut.apply(0.0));
            }
            other => panic!("unexpected commands {other:?}"),
        }
    }

    #[test]
    fn test_emit_run() {
        let phi = scene::reference_geometry().unwrap();
        let rho = scene::reference_scalar_field().unwrap();
        let lut = LookupTable::default_ramp(100).unwrap();
        let mut settings = RenderSettings::default();
        settings.screen.num_pixels = 4;
        settings.screen.reference_factor = 2;
        let renderer = Renderer::new(&phi, &rho, &lut, settings).unwrap();
        let report = renderer.run().unwrap();

        let mut sink = RecordingSink::default();
        emit_run(&renderer, &report, &mut sink);

        assert!(sink.finished);
        assert_eq!(sink.num_pixels, 4);
        let rects = sink
            .in_region(PlotRegion::PixelColors)
            .filter(|c| matches!(c, DrawCommand::Rect { .. }))
            .count();
        assert_eq!(rects, 3 * 4);
        assert_eq!(sink.in_region(PlotRegion::PixelDiffs).count(), 2);
        assert_eq!(sink.in_region(PlotRegion::PixelComponents).count(), 9);
        assert!(sink
            .in_region(PlotRegion::Sampling)
            .any(|c| matches!(c, DrawCommand::ScalarImage { width: 10, height: 10, .. })));
        assert!(serde_json::to_string(&sink).is_ok());
    }
}
