//! PNG strip of pixel colors and diffs.

use image::{Rgba, RgbaImage};
use isoray_raycast::colordiff::downsample;
use isoray_raycast::RenderReport;

/// Rows, top to bottom: reference (downsampled), direct, voxelized, direct
/// diff, voxelized diff. Colors are composited over black; diffs are grey,
/// saturating at 1.
pub fn render_strip(report: &RenderReport, scale: u32) -> RgbaImage {
    let scale = scale.max(1);
    let reference = downsample(
        &report.reference.colors,
        report.settings.screen.reference_factor,
    );
    let color_rows = [&reference, &report.direct.colors, &report.voxelized.colors];
    let diff_rows = [&report.direct_diffs, &report.voxelized_diffs];

    let width = report.direct.colors.len() as u32;
    let height = (color_rows.len() + diff_rows.len()) as u32;
    let mut img = RgbaImage::new(width * scale, height * scale);

    let rows = color_rows
        .iter()
        .map(|colors| colors.iter().map(|c| over_black(c.to_rgba8())).collect::<Vec<_>>())
        .chain(diff_rows.iter().map(|diffs| diffs.iter().map(|&d| grey(d)).collect()));

    for (row, pixels) in rows.enumerate() {
        for (col, &pixel) in pixels.iter().enumerate().take(width as usize) {
            fill_cell(&mut img, col as u32, row as u32, scale, pixel);
        }
    }
    img
}

/// Premultiplied color over an opaque black background.
fn over_black([r, g, b, _]: [u8; 4]) -> Rgba<u8> {
    Rgba([r, g, b, 255])
}

fn grey(d: f64) -> Rgba<u8> {
    let v = (d.clamp(0.0, 1.0) * 255.0).round() as u8;
    Rgba([v, v, v, 255])
}

fn fill_cell(img: &mut RgbaImage, col: u32, row: u32, scale: u32, pixel: Rgba<u8>) {
    for dy in 0..scale {
        for dx in 0..scale {
            img.put_pixel(col * scale + dx, row * scale + dy, pixel);
        }
    }
}
