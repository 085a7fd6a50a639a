//! Shared height field storage.
//!
//! The field is a dense grid of height samples addressed by signed
//! `(col, row)` coordinates. Reads and writes outside the grid are skipped
//! rather than reported, and nothing at this layer clamps heights: each
//! sculptor applies its own clamp policy.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use noise::{NoiseFn, Perlin};

use crate::tilemap::Tilemap;

/// Handle through which every sculptor reaches the one height buffer.
pub type SharedHeightField = Arc<Mutex<HeightField>>;

/// Lock the shared field. A poisoned lock is recovered rather than
/// propagated so a panic in one sculptor never halts the others.
pub fn lock_field(field: &Mutex<HeightField>) -> MutexGuard<'_, HeightField> {
    field.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A rectangular copy of part of the field, already clipped to the grid.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    /// Column of the top-left cell in field coordinates
    pub col: i32,
    /// Row of the top-left cell in field coordinates
    pub row: i32,
    pub cells: Tilemap<f32>,
}

impl Region {
    pub fn width(&self) -> usize {
        self.cells.width
    }

    pub fn height(&self) -> usize {
        self.cells.height
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Height stored for a field coordinate, if this region covers it.
    pub fn at(&self, col: i32, row: i32) -> Option<f32> {
        self.cells
            .try_get(col as i64 - self.col as i64, row as i64 - self.row as i64)
            .copied()
    }
}

/// The mutable height grid sculpted by every component.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightField {
    map: Tilemap<f32>,
}

impl HeightField {
    /// A flat field of the given resolution at height zero.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            map: Tilemap::new_with(width, height, 0.0),
        }
    }

    pub fn width(&self) -> usize {
        self.map.width
    }

    pub fn height(&self) -> usize {
        self.map.height
    }

    /// Number of cells, used as the total area for mountain budgets.
    pub fn area(&self) -> usize {
        self.map.len()
    }

    pub fn contains(&self, col: i32, row: i32) -> bool {
        self.map.contains(col as i64, row as i64)
    }

    /// Height at a cell, or `None` when out of bounds.
    pub fn get(&self, col: i32, row: i32) -> Option<f32> {
        self.map.try_get(col as i64, row as i64).copied()
    }

    /// Write a cell. Returns `false` and leaves the field untouched when the
    /// cell is out of bounds.
    pub fn set(&mut self, col: i32, row: i32, height: f32) -> bool {
        if !self.contains(col, row) {
            return false;
        }
        self.map.set(col as usize, row as usize, height);
        true
    }

    /// Copy the sub-rectangle starting at `(col, row)`, clipped to the grid.
    /// A rectangle that misses the grid entirely yields an empty region.
    pub fn get_region(&self, col: i32, row: i32, width: usize, height: usize) -> Region {
        let x0 = (col as i64).max(0);
        let y0 = (row as i64).max(0);
        let x1 = (col as i64 + width as i64).min(self.width() as i64);
        let y1 = (row as i64 + height as i64).min(self.height() as i64);

        if x1 <= x0 || y1 <= y0 {
            return Region {
                col: x0 as i32,
                row: y0 as i32,
                cells: Tilemap::new_with(0, 0, 0.0),
            };
        }

        let w = (x1 - x0) as usize;
        let h = (y1 - y0) as usize;
        let mut data = Vec::with_capacity(w * h);
        for y in y0..y1 {
            let start = y as usize * self.width() + x0 as usize;
            data.extend_from_slice(&self.map.as_slice()[start..start + w]);
        }

        Region {
            col: x0 as i32,
            row: y0 as i32,
            cells: Tilemap::from_vec(w, h, data).unwrap_or_else(|| Tilemap::new_with(0, 0, 0.0)),
        }
    }

    /// Copy the square of side `2 * radius + 1` centred on `(col, row)`.
    pub fn get_square(&self, col: i32, row: i32, radius: i32) -> Region {
        let radius = radius.max(0);
        let side = (2 * radius + 1) as usize;
        self.get_region(col - radius, row - radius, side, side)
    }

    /// Write `cells` with its top-left corner at `(col, row)`. Cells landing
    /// outside the grid are skipped. Returns the number of cells written.
    pub fn set_region(&mut self, col: i32, row: i32, cells: &Tilemap<f32>) -> usize {
        let mut written = 0;
        for (x, y, &h) in cells.iter() {
            if self.set(col + x as i32, row + y as i32, h) {
                written += 1;
            }
        }
        written
    }

    /// Write a region back at the origin it was read from.
    pub fn apply_region(&mut self, region: &Region) -> usize {
        self.set_region(region.col, region.row, &region.cells)
    }

    pub fn as_tilemap(&self) -> &Tilemap<f32> {
        &self.map
    }

    /// Lowest and highest sample.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.map.min_max()
    }

    /// Wrap the field in the shared handle passed to sculptors.
    pub fn into_shared(self) -> SharedHeightField {
        Arc::new(Mutex::new(self))
    }
}

/// A gentle rolling baseline in `[0, amplitude]` so sculpting does not start
/// from a perfectly flat plane.
pub fn generate_base_terrain(width: usize, height: usize, amplitude: f32, seed: u64) -> HeightField {
    let mut field = HeightField::new(width, height);
    if amplitude <= 0.0 {
        return field;
    }

    let noise = Perlin::new(seed as u32);
    let frequency = 4.0;
    for (x, y, h) in field.map.iter_mut() {
        let nx = x as f64 * frequency / width.max(1) as f64;
        let ny = y as f64 * frequency / height.max(1) as f64;
        // Perlin output is roughly [-1, 1]
        let n = (noise.get([nx, ny]) as f32 * 0.5 + 0.5).clamp(0.0, 1.0);
        *h = n * amplitude;
    }
    field
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_bounds_access_is_ignored() {
        let mut field = HeightField::new(8, 8);
        assert_eq!(field.get(-1, 0), None);
        assert_eq!(field.get(8, 0), None);
        assert!(!field.set(0, 8, 5.0));
        assert!(!field.set(-3, -3, 5.0));
        assert!(field.as_tilemap().iter().all(|(_, _, &h)| h == 0.0));

        assert!(field.set(7, 7, 2.5));
        assert_eq!(field.get(7, 7), Some(2.5));
    }

    #[test]
    fn test_get_region_clips_to_grid() {
        let mut field = HeightField::new(10, 10);
        field.set(0, 0, 1.0);
        field.set(2, 1, 3.0);

        let region = field.get_region(-2, -2, 5, 5);
        assert_eq!((region.col, region.row), (0, 0));
        assert_eq!((region.width(), region.height()), (3, 3));
        assert_eq!(region.at(0, 0), Some(1.0));
        assert_eq!(region.at(2, 1), Some(3.0));
        assert_eq!(region.at(3, 1), None);

        let outside = field.get_region(20, 20, 4, 4);
        assert!(outside.is_empty());
    }

    #[test]
    fn test_set_region_skips_out_of_bounds_cells() {
        let mut field = HeightField::new(4, 4);
        let patch = Tilemap::new_with(3, 3, 7.0f32);
        let written = field.set_region(2, 2, &patch);

        assert_eq!(written, 4);
        assert_eq!(field.get(3, 3), Some(7.0));
        assert_eq!(field.get(1, 1), Some(0.0));
    }

    #[test]
    fn test_region_roundtrip_preserves_untouched_cells() {
        let mut field = generate_base_terrain(16, 16, 2.0, 9);
        let before = field.clone();
        let mut region = field.get_square(8, 8, 2);
        region.cells.fill(5.0);
        field.apply_region(&region);

        for (x, y, &h) in before.as_tilemap().iter() {
            let (col, row) = (x as i32, y as i32);
            let inside = (6..=10).contains(&col) && (6..=10).contains(&row);
            let now = field.get(col, row).unwrap();
            if inside {
                assert_eq!(now, 5.0);
            } else {
                assert_eq!(now, h);
            }
        }
    }

    #[test]
    fn test_base_terrain_within_amplitude() {
        let field = generate_base_terrain(32, 32, 3.0, 1);
        let (min_h, max_h) = field.min_max().unwrap();
        assert!(min_h >= 0.0);
        assert!(max_h <= 3.0);
    }
}
