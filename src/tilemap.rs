/// A dense row-major 2D grid. Edges do not wrap: coordinates outside
/// `[0, width) x [0, height)` are rejected by the checked accessors.
#[derive(Clone, Debug, PartialEq)]
pub struct Tilemap<T> {
    pub width: usize,
    pub height: usize,
    data: Vec<T>,
}

impl<T: Clone + Default> Tilemap<T> {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![T::default(); width * height],
        }
    }
}

impl<T: Clone> Tilemap<T> {
    pub fn new_with(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Build a map from row-major data. Returns `None` if the length does not
    /// match `width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Option<Self> {
        if data.len() != width * height {
            return None;
        }
        Some(Self { width, height, data })
    }

    fn index(&self, x: usize, y: usize) -> usize {
        debug_assert!(x < self.width && y < self.height);
        y * self.width + x
    }

    /// True if the signed coordinate lies inside the map.
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    pub fn get(&self, x: usize, y: usize) -> &T {
        &self.data[self.index(x, y)]
    }

    pub fn set(&mut self, x: usize, y: usize, value: T) {
        let idx = self.index(x, y);
        self.data[idx] = value;
    }

    /// Checked read with signed coordinates.
    pub fn try_get(&self, x: i64, y: i64) -> Option<&T> {
        if self.contains(x, y) {
            Some(self.get(x as usize, y as usize))
        } else {
            None
        }
    }

    /// Fill the entire map with a value.
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Iterate over all cells with their coordinates.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &T)> {
        let width = self.width.max(1);
        self.data.iter().enumerate().map(move |(idx, val)| {
            let x = idx % width;
            let y = idx / width;
            (x, y, val)
        })
    }

    /// Iterate mutably over all cells with their coordinates.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, usize, &mut T)> {
        let width = self.width.max(1);
        self.data.iter_mut().enumerate().map(move |(idx, val)| {
            let x = idx % width;
            let y = idx / width;
            (x, y, val)
        })
    }
}

impl<T: Clone + Send> Tilemap<T> {
    /// Parallel iterator over rows as `(y, row)` pairs.
    pub fn par_rows_mut(
        &mut self,
    ) -> impl rayon::iter::IndexedParallelIterator<Item = (usize, &mut [T])> {
        use rayon::prelude::*;

        let width = self.width.max(1);
        self.data.par_chunks_mut(width).enumerate()
    }
}

impl Tilemap<f32> {
    /// Sample at fractional coordinates with bilinear interpolation.
    /// Coordinates are clamped to the map edges.
    pub fn sample_bilinear(&self, x: f32, y: f32) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }

        let max_x = (self.width - 1) as f32;
        let max_y = (self.height - 1) as f32;
        let x = x.clamp(0.0, max_x);
        let y = y.clamp(0.0, max_y);

        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);

        let fx = x - x0 as f32;
        let fy = y - y0 as f32;

        let v00 = *self.get(x0, y0);
        let v10 = *self.get(x1, y0);
        let v01 = *self.get(x0, y1);
        let v11 = *self.get(x1, y1);

        let v0 = v00 * (1.0 - fx) + v10 * fx;
        let v1 = v01 * (1.0 - fx) + v11 * fx;
        v0 * (1.0 - fy) + v1 * fy
    }

    /// Sample with normalized texture coordinates in `[0, 1]`.
    pub fn sample_uv(&self, u: f32, v: f32) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let x = u.clamp(0.0, 1.0) * (self.width - 1) as f32;
        let y = v.clamp(0.0, 1.0) * (self.height - 1) as f32;
        self.sample_bilinear(x, y)
    }

    /// Minimum and maximum value, or `None` for an empty map.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        if self.data.is_empty() {
            return None;
        }
        let mut min_h = f32::MAX;
        let mut max_h = f32::MIN;
        for &h in &self.data {
            if h < min_h { min_h = h; }
            if h > max_h { max_h = h; }
        }
        Some((min_h, max_h))
    }
}
