//! Brush falloff functions and stamping helpers.
//!
//! The falloff functions are pure: they return an additive delta for one
//! offset from the brush center. The stamp helpers read the brush footprint
//! as one region, add the deltas, apply the caller's clamp policy and write
//! the region back.

use crate::heightfield::HeightField;
use crate::masks::MaskProvider;

/// Linear interpolation with `t` clamped to `[0, 1]`. Lands exactly on `b`
/// at `t >= 1`.
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    if t >= 1.0 {
        return b;
    }
    let t = t.max(0.0);
    a + (b - a) * t
}

fn offset_distance(dx: i32, dy: i32) -> f32 {
    ((dx as f32) * (dx as f32) + (dy as f32) * (dy as f32)).sqrt()
}

/// Cone-shaped delta: `peak` at the center fading linearly to zero at
/// `radius`. Offsets at or beyond the radius contribute nothing.
pub fn radial_falloff(dx: i32, dy: i32, radius: f32, peak: f32) -> f32 {
    if radius <= 0.0 {
        return 0.0;
    }
    let distance = offset_distance(dx, dy);
    if distance >= radius {
        return 0.0;
    }
    lerp(peak, 0.0, distance / radius)
}

/// Height multiplier of a full cone, `clamp01(1 - distance / radius)`.
pub fn cone_multiplier(dx: i32, dy: i32, radius: f32) -> f32 {
    if radius <= 0.0 {
        return 0.0;
    }
    (1.0 - offset_distance(dx, dy) / radius).clamp(0.0, 1.0)
}

/// Mask-shaped delta for a square brush of half-width `size`: the mask is
/// sampled at the offset's texture coordinate, faded toward the rim and
/// scaled by `opacity`. Offsets with `distance / size > 1` contribute nothing.
pub fn mask_falloff<M: MaskProvider + ?Sized>(
    masks: &M,
    mask_index: usize,
    dx: i32,
    dy: i32,
    size: i32,
    opacity: f32,
) -> f32 {
    if size <= 0 {
        return 0.0;
    }
    let size_f = size as f32;
    let distance = offset_distance(dx, dy) / size_f;
    if distance > 1.0 {
        return 0.0;
    }

    let u = (dx as f32 + size_f) / (2.0 * size_f);
    let v = (dy as f32 + size_f) / (2.0 * size_f);
    let strength = masks.sample_bilinear(mask_index, u, v);

    opacity * strength * (1.0 - distance)
}

/// Add a radial falloff centred on `(col, row)`. With `max_height` set the
/// result is clamped to `[0, max_height]`, otherwise heights accumulate
/// without bound. Returns the number of cells inside the brush.
pub fn stamp_radial(
    field: &mut HeightField,
    col: i32,
    row: i32,
    radius: i32,
    peak: f32,
    max_height: Option<f32>,
) -> usize {
    if radius <= 0 {
        return 0;
    }

    let mut region = field.get_square(col, row, radius);
    let mut touched = 0;
    let (origin_col, origin_row) = (region.col, region.row);
    for (x, y, h) in region.cells.iter_mut() {
        let dx = origin_col + x as i32 - col;
        let dy = origin_row + y as i32 - row;
        if offset_distance(dx, dy) >= radius as f32 {
            continue;
        }

        let raised = *h + radial_falloff(dx, dy, radius as f32, peak);
        *h = match max_height {
            Some(max) => raised.clamp(0.0, max),
            None => raised,
        };
        touched += 1;
    }

    field.apply_region(&region);
    touched
}

/// Add one mask stroke centred on `(col, row)`. Each cell's delta is capped
/// to `[0, 1]` and the result clamped to `[0, max_height]`. Returns the
/// number of cells inside the brush.
#[allow(clippy::too_many_arguments)]
pub fn stamp_mask<M: MaskProvider + ?Sized>(
    field: &mut HeightField,
    masks: &M,
    mask_index: usize,
    col: i32,
    row: i32,
    size: i32,
    opacity: f32,
    max_height: f32,
) -> usize {
    if size <= 0 {
        return 0;
    }

    let mut region = field.get_square(col, row, size);
    let mut touched = 0;
    let (origin_col, origin_row) = (region.col, region.row);
    for (x, y, h) in region.cells.iter_mut() {
        let dx = origin_col + x as i32 - col;
        let dy = origin_row + y as i32 - row;
        if offset_distance(dx, dy) / size as f32 > 1.0 {
            continue;
        }

        let delta = mask_falloff(masks, mask_index, dx, dy, size, opacity).clamp(0.0, 1.0);
        *h = (*h + delta).clamp(0.0, max_height);
        touched += 1;
    }

    field.apply_region(&region);
    touched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::masks::MaskSet;
    use crate::tilemap::Tilemap;

    #[test]
    fn test_radial_falloff_center_and_rim() {
        assert_eq!(radial_falloff(0, 0, 10.0, 0.5), 0.5);
        assert_eq!(radial_falloff(10, 0, 10.0, 0.5), 0.0);
        assert_eq!(radial_falloff(8, 8, 10.0, 0.5), 0.0);
        assert!((radial_falloff(5, 0, 10.0, 1.0) - 0.5).abs() < 1e-6);
        assert_eq!(radial_falloff(0, 0, 0.0, 1.0), 0.0);
    }

    #[test]
    fn test_cone_multiplier_clamps() {
        assert_eq!(cone_multiplier(0, 0, 4.0), 1.0);
        assert_eq!(cone_multiplier(6, 0, 4.0), 0.0);
        assert!((cone_multiplier(0, 2, 4.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_mask_falloff_uniform_mask_matches_edge_fade() {
        let masks = MaskSet::new(vec![Tilemap::new_with(8, 8, 1.0f32)]);
        assert!((mask_falloff(&masks, 0, 0, 0, 10, 0.5) - 0.5).abs() < 1e-6);
        assert!((mask_falloff(&masks, 0, 5, 0, 10, 1.0) - 0.5).abs() < 1e-6);
        assert_eq!(mask_falloff(&masks, 0, 10, 1, 10, 1.0), 0.0);
        assert_eq!(mask_falloff(&masks, 3, 0, 0, 10, 1.0), 0.0);
    }

    #[test]
    fn test_stamp_radial_near_corner_stays_in_bounds() {
        let mut field = HeightField::new(16, 16);
        let touched = stamp_radial(&mut field, 0, 0, 4, 1.0, None);

        // Only the quarter disc inside the grid is touched
        assert!(touched > 0);
        assert_eq!(field.get(0, 0), Some(1.0));
        assert_eq!(field.get(4, 0), Some(0.0));
        assert_eq!(field.get(15, 15), Some(0.0));
    }

    #[test]
    fn test_stamp_radial_clamped_policy() {
        let mut field = HeightField::new(9, 9);
        for _ in 0..100 {
            stamp_radial(&mut field, 4, 4, 3, 0.2, Some(0.5));
        }
        let (min_h, max_h) = field.min_max().unwrap();
        assert!(min_h >= 0.0);
        assert!((max_h - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_stamp_radial_unclamped_accumulates() {
        let mut field = HeightField::new(9, 9);
        for _ in 0..10 {
            stamp_radial(&mut field, 4, 4, 3, 1.0, None);
        }
        assert!((field.get(4, 4).unwrap() - 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_stamp_mask_respects_max_height() {
        let masks = MaskSet::new(vec![Tilemap::new_with(4, 4, 1.0f32)]);
        let mut field = HeightField::new(32, 32);
        for _ in 0..50 {
            stamp_mask(&mut field, &masks, 0, 16, 16, 8, 0.8, 3.0);
        }
        assert_eq!(field.get(16, 16), Some(3.0));
        assert_eq!(field.get(0, 0), Some(0.0));
    }
}
