//! PNG previews of a height field. Debug output only; nothing reads them back.

use std::path::Path;

use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};

use crate::error::SculptError;
use crate::heightfield::HeightField;
use crate::tilemap::Tilemap;

/// Heights remapped to `[0, 1]` over the field's own range. A flat field maps
/// to all zeros.
fn normalized(field: &HeightField) -> Tilemap<f32> {
    let map = field.as_tilemap();
    let (lo, hi) = map.min_max().unwrap_or((0.0, 0.0));
    let span = hi - lo;

    let mut out = Tilemap::new(map.width, map.height);
    for (x, y, h) in map.iter() {
        let t = if span > f32::EPSILON { (h - lo) / span } else { 0.0 };
        out.set(x, y, t);
    }
    out
}

pub fn render_grayscale(field: &HeightField) -> GrayImage {
    let norm = normalized(field);
    let mut img: GrayImage = ImageBuffer::new(norm.width as u32, norm.height as u32);
    for (x, y, t) in norm.iter() {
        img.put_pixel(x as u32, y as u32, Luma([(t * 255.0).round() as u8]));
    }
    img
}

/// Lowland green through rock brown to snow, lit from the north-west.
pub fn render_shaded(field: &HeightField) -> RgbImage {
    let norm = normalized(field);
    let mut img: RgbImage = ImageBuffer::new(norm.width as u32, norm.height as u32);
    let light_dir = normalize_vec3(-1.0, -1.0, 2.0);

    for y in 0..norm.height {
        for x in 0..norm.width {
            let t = *norm.get(x, y);
            let normal = surface_normal(&norm, x, y);
            let diffuse = (normal[0] * light_dir[0] + normal[1] * light_dir[1] + normal[2] * light_dir[2])
                .max(0.0);
            let ambient = 0.4;
            let shade = ambient + (1.0 - ambient) * diffuse;

            let base = elevation_color(t);
            let r = (base[0] as f32 * shade).clamp(0.0, 255.0) as u8;
            let g = (base[1] as f32 * shade).clamp(0.0, 255.0) as u8;
            let b = (base[2] as f32 * shade).clamp(0.0, 255.0) as u8;
            img.put_pixel(x as u32, y as u32, Rgb([r, g, b]));
        }
    }
    img
}

fn elevation_color(t: f32) -> [u8; 3] {
    const LOW: [u8; 3] = [70, 120, 60];
    const MID: [u8; 3] = [140, 110, 80];
    const PEAK: [u8; 3] = [240, 240, 245];
    if t < 0.5 {
        lerp_color(LOW, MID, t * 2.0)
    } else {
        lerp_color(MID, PEAK, (t - 0.5) * 2.0)
    }
}

fn lerp_color(a: [u8; 3], b: [u8; 3], t: f32) -> [u8; 3] {
    let t = t.clamp(0.0, 1.0);
    [
        (a[0] as f32 + (b[0] as f32 - a[0] as f32) * t) as u8,
        (a[1] as f32 + (b[1] as f32 - a[1] as f32) * t) as u8,
        (a[2] as f32 + (b[2] as f32 - a[2] as f32) * t) as u8,
    ]
}

/// Central-difference normal with edges clamped (the field does not wrap).
fn surface_normal(map: &Tilemap<f32>, x: usize, y: usize) -> [f32; 3] {
    let x_left = x.saturating_sub(1);
    let x_right = (x + 1).min(map.width - 1);
    let y_up = y.saturating_sub(1);
    let y_down = (y + 1).min(map.height - 1);

    // Exaggerate relief so low hills still read
    let relief = 8.0;
    let dx = (map.get(x_right, y) - map.get(x_left, y)) * relief;
    let dy = (map.get(x, y_down) - map.get(x, y_up)) * relief;

    // Screen Y increases downward
    normalize_vec3(-dx, dy, 1.0)
}

fn normalize_vec3(x: f32, y: f32, z: f32) -> [f32; 3] {
    let len = (x * x + y * y + z * z).sqrt();
    [x / len, y / len, z / len]
}

/// Write a preview PNG; `shaded` picks the hillshade over plain grayscale.
pub fn export_preview(field: &HeightField, path: impl AsRef<Path>, shaded: bool) -> Result<(), SculptError> {
    let path = path.as_ref();
    if shaded {
        render_shaded(field).save(path)?;
    } else {
        render_grayscale(field).save(path)?;
    }
    tracing::info!(path = %path.display(), shaded, "wrote preview");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(size: usize) -> HeightField {
        let mut field = HeightField::new(size, size);
        for col in 0..size as i32 {
            for row in 0..size as i32 {
                field.set(col, row, col as f32 * 2.0);
            }
        }
        field
    }

    #[test]
    fn test_grayscale_spans_full_range() {
        let img = render_grayscale(&ramp(8));
        assert_eq!(img.dimensions(), (8, 8));
        assert_eq!(img.get_pixel(0, 3).0, [0]);
        assert_eq!(img.get_pixel(7, 3).0, [255]);
    }

    #[test]
    fn test_flat_field_renders_black() {
        let img = render_grayscale(&HeightField::new(4, 4));
        assert!(img.pixels().all(|p| p.0 == [0]));
    }

    #[test]
    fn test_export_preview_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let gray = dir.path().join("gray.png");
        let shaded = dir.path().join("shaded.png");

        export_preview(&ramp(16), &gray, false).unwrap();
        export_preview(&ramp(16), &shaded, true).unwrap();

        let loaded = image::open(&shaded).unwrap();
        assert_eq!((loaded.width(), loaded.height()), (16, 16));
        assert!(gray.exists());
    }
}
