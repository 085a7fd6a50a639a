//! Grayscale brush masks.
//!
//! A mask is a small grayscale image in `[0, 1]` sampled with normalized
//! texture coordinates. Masks come either from image files or are built
//! procedurally from a soft disc and fBm noise blotches.

use std::path::Path;

use noise::{NoiseFn, Perlin};

use crate::error::SculptError;
use crate::tilemap::Tilemap;

/// An indexable collection of grayscale images.
pub trait MaskProvider {
    fn mask_count(&self) -> usize;

    /// Bilinear grayscale sample in `[0, 1]`. Out-of-range indices sample as 0.
    fn sample_bilinear(&self, index: usize, u: f32, v: f32) -> f32;
}

#[derive(Clone, Debug, Default)]
pub struct MaskSet {
    masks: Vec<Tilemap<f32>>,
}

impl MaskSet {
    pub fn new(masks: Vec<Tilemap<f32>>) -> Self {
        Self { masks }
    }

    /// Decode each image, convert to 8-bit luma and normalize to `[0, 1]`.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Self, SculptError> {
        let mut masks = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let img = image::open(path)
                .map_err(|source| SculptError::Mask {
                    path: path.display().to_string(),
                    source,
                })?
                .to_luma8();
            let (w, h) = img.dimensions();
            let data = img.pixels().map(|p| p.0[0] as f32 / 255.0).collect();
            if let Some(mask) = Tilemap::from_vec(w as usize, h as usize, data) {
                tracing::debug!(path = %path.display(), width = w, height = h, "loaded brush mask");
                masks.push(mask);
            }
        }
        Ok(Self { masks })
    }

    /// A soft disc followed by `count - 1` noise blotches faded to zero at the rim.
    pub fn procedural(count: usize, resolution: usize, seed: u64) -> Self {
        let resolution = resolution.max(2);
        let mut masks = Vec::with_capacity(count);
        if count == 0 {
            return Self { masks };
        }

        masks.push(soft_disc(resolution));
        for i in 1..count {
            masks.push(noise_blotch(resolution, seed.wrapping_add(i as u64)));
        }
        Self { masks }
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }
}

impl MaskProvider for MaskSet {
    fn mask_count(&self) -> usize {
        self.masks.len()
    }

    fn sample_bilinear(&self, index: usize, u: f32, v: f32) -> f32 {
        match self.masks.get(index) {
            Some(mask) => mask.sample_uv(u, v).clamp(0.0, 1.0),
            None => 0.0,
        }
    }
}

/// Radial distance from the mask center in `[0, ~1.41]`, 1 at the inscribed rim.
fn rim_distance(x: usize, y: usize, resolution: usize) -> f32 {
    let half = (resolution - 1) as f32 * 0.5;
    let dx = (x as f32 - half) / half;
    let dy = (y as f32 - half) / half;
    (dx * dx + dy * dy).sqrt()
}

fn soft_disc(resolution: usize) -> Tilemap<f32> {
    let mut mask = Tilemap::new_with(resolution, resolution, 0.0f32);
    for (x, y, v) in mask.iter_mut() {
        let d = rim_distance(x, y, resolution);
        // Smoothstep falloff toward the rim
        let t = (1.0 - d).clamp(0.0, 1.0);
        *v = t * t * (3.0 - 2.0 * t);
    }
    mask
}

fn noise_blotch(resolution: usize, seed: u64) -> Tilemap<f32> {
    let noise = Perlin::new(seed as u32);
    let mut mask = Tilemap::new_with(resolution, resolution, 0.0f32);
    for (x, y, v) in mask.iter_mut() {
        let nx = x as f64 * 3.0 / resolution as f64;
        let ny = y as f64 * 3.0 / resolution as f64;
        let n = fbm_noise(&noise, nx, ny, 4, 0.5, 2.0) as f32 * 0.5 + 0.5;
        let fade = (1.0 - rim_distance(x, y, resolution)).clamp(0.0, 1.0);
        *v = (n * fade).clamp(0.0, 1.0);
    }
    mask
}

/// Fractional Brownian Motion noise
fn fbm_noise(
    noise: &impl NoiseFn<f64, 2>,
    x: f64,
    y: f64,
    octaves: u32,
    persistence: f64,
    lacunarity: f64,
) -> f64 {
    let mut total = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0;
    let mut max_value = 0.0;

    for _ in 0..octaves {
        total += amplitude * noise.get([x * frequency, y * frequency]);
        max_value += amplitude;
        amplitude *= persistence;
        frequency *= lacunarity;
    }

    total / max_value
}
