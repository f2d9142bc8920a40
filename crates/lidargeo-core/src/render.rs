//! Preview images of derived layers.
//!
//! Each feature's centroid is plotted as a small square coloured by one attribute on a
//! terrain ramp stretched to the attribute's finite range.

use std::path::Path;

use geo::Centroid;
use image::{Rgba, RgbaImage};
use layer_shared::VectorLayer;
use log::info;

use crate::error::DerivationError;

/// Output image size in pixels.
const WIDTH: u32 = 1850;
const HEIGHT: u32 = 1050;
/// Half-width of each plotted marker in pixels.
const MARKER_RADIUS: i64 = 1;
const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Green, yellow, brown, white.
const TERRAIN_STOPS: [(f64, [u8; 3]); 4] = [
    (0.0, [0, 128, 0]),
    (0.4, [230, 220, 50]),
    (0.75, [139, 90, 43]),
    (1.0, [255, 255, 255]),
];

/// Maps `t` in `[0, 1]` onto the terrain ramp.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn terrain_color(t: f64) -> Rgba<u8> {
    let t = t.clamp(0.0, 1.0);
    for pair in TERRAIN_STOPS.windows(2) {
        let (t0, c0) = pair[0];
        let (t1, c1) = pair[1];
        if t <= t1 {
            let f = if t1 > t0 { (t - t0) / (t1 - t0) } else { 0.0 };
            let mix =
                |a: u8, b: u8| (f64::from(a) + f * (f64::from(b) - f64::from(a))).round() as u8;
            return Rgba([mix(c0[0], c1[0]), mix(c0[1], c1[1]), mix(c0[2], c1[2]), 255]);
        }
    }
    let [r, g, b] = TERRAIN_STOPS[TERRAIN_STOPS.len() - 1].1;
    Rgba([r, g, b, 255])
}

/// Minimum and maximum of the finite values, widened when they coincide.
fn finite_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !min.is_finite() {
        return None;
    }
    if (max - min).abs() < f64::EPSILON {
        Some((min, min + 1.0))
    } else {
        Some((min, max))
    }
}

/// Renders `layer` to a PNG at `path`, coloured by `column`.
///
/// Features whose value is missing or non-finite are drawn in grey.
///
/// # Errors
///
/// Returns [`DerivationError::Render`] if the image cannot be written.
pub fn render_png(layer: &VectorLayer, column: &str, path: &Path) -> Result<(), DerivationError> {
    let points: Vec<(f64, f64, Option<f64>)> = layer
        .features
        .iter()
        .filter_map(|f| {
            f.geometry
                .centroid()
                .map(|p| (p.x(), p.y(), f.property(column)))
        })
        .collect();

    let mut image = RgbaImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);

    let extent_x = finite_range(points.iter().map(|p| p.0));
    let extent_y = finite_range(points.iter().map(|p| p.1));
    let values = finite_range(points.iter().filter_map(|p| p.2));

    if let (Some((min_x, max_x)), Some((min_y, max_y))) = (extent_x, extent_y) {
        let scale_x = f64::from(WIDTH - 1) / (max_x - min_x);
        let scale_y = f64::from(HEIGHT - 1) / (max_y - min_y);

        for (x, y, value) in &points {
            let color = match (value, values) {
                (Some(v), Some((lo, hi))) if v.is_finite() => terrain_color((v - lo) / (hi - lo)),
                _ => Rgba([128, 128, 128, 255]),
            };
            #[allow(clippy::cast_possible_truncation)]
            let px = ((x - min_x) * scale_x).round() as i64;
            // Image rows grow downward.
            #[allow(clippy::cast_possible_truncation)]
            let py = ((max_y - y) * scale_y).round() as i64;
            draw_marker(&mut image, px, py, color);
        }
    }

    image.save(path).map_err(|e| DerivationError::Render {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    info!("Saved plot as {}", path.display());
    Ok(())
}

fn draw_marker(image: &mut RgbaImage, cx: i64, cy: i64, color: Rgba<u8>) {
    for dy in -MARKER_RADIUS..=MARKER_RADIUS {
        for dx in -MARKER_RADIUS..=MARKER_RADIUS {
            let (Ok(x), Ok(y)) = (u32::try_from(cx + dx), u32::try_from(cy + dy)) else {
                continue;
            };
            if x < image.width() && y < image.height() {
                image.put_pixel(x, y, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::point;
    use layer_shared::Feature;

    #[test]
    fn test_ramp_endpoints() {
        assert_eq!(terrain_color(0.0), Rgba([0, 128, 0, 255]));
        assert_eq!(terrain_color(1.0), Rgba([255, 255, 255, 255]));
        assert_eq!(terrain_color(7.0), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_range_ignores_non_finite() {
        let range = finite_range([1.0, f64::NAN, 3.0, f64::NEG_INFINITY].into_iter());
        assert_eq!(range, Some((1.0, 3.0)));
        assert_eq!(finite_range([2.0].into_iter()), Some((2.0, 3.0)));
        assert_eq!(finite_range(std::iter::empty()), None);
    }

    #[test]
    fn test_render_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("region.png");
        let layer = VectorLayer::new(vec![
            Feature::new(point!(x: 0.0, y: 0.0).into()).with_property("elevation", 10.0),
            Feature::new(point!(x: 10.0, y: 5.0).into()).with_property("elevation", 20.0),
            Feature::new(point!(x: 5.0, y: 2.0).into()).with_property("elevation", f64::NAN),
        ]);

        render_png(&layer, "elevation", &path).unwrap();

        let image = image::open(&path).unwrap().to_rgba8();
        assert_eq!(image.dimensions(), (WIDTH, HEIGHT));
        assert_eq!(*image.get_pixel(0, HEIGHT - 1), Rgba([0, 128, 0, 255]));
    }
}
