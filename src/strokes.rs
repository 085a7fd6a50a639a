//! Mask-stroke mountain builder.
//!
//! After an idle interval the builder picks a random spot and "holds the
//! brush down" there: over the following ticks it dabs a handful of strokes,
//! each with a random mask, opacity and offset around the spot. Heights are
//! clamped to `[0, max_mountain_height]`.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::brush::stamp_mask;
use crate::heightfield::{lock_field, HeightField, SharedHeightField};
use crate::masks::{MaskProvider, MaskSet};
use crate::scheduler::{Cadence, Countdown, Sculptor};

/// Strokes per mountain are drawn from `[MIN_STROKES, detail_layers)`.
pub const MIN_STROKES: u32 = 3;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrokeParams {
    /// Seconds idle between mountains
    pub interval: f32,
    pub max_mountain_height: f32,
    pub min_brush_size: i32,
    pub max_brush_size: i32,
    /// Opacity is drawn from `[min, max)` and divided by 10
    pub min_brush_opacity: f32,
    pub max_brush_opacity: f32,
    /// Exclusive upper bound on strokes per mountain
    pub detail_layers: u32,
}

impl Default for StrokeParams {
    fn default() -> Self {
        Self {
            interval: 1.0,
            max_mountain_height: 25.0,
            min_brush_size: 30,
            max_brush_size: 100,
            min_brush_opacity: 1.0,
            max_brush_opacity: 8.0,
            detail_layers: 20,
        }
    }
}

enum Phase {
    Idle(Countdown),
    Building {
        center: (i32, i32),
        size: i32,
        strokes_left: u32,
    },
}

pub struct StrokeSculptor {
    params: StrokeParams,
    masks: MaskSet,
    grid: (usize, usize),
    phase: Phase,
    rng: ChaCha8Rng,
    mountains_built: u64,
    strokes_applied: u64,
}

impl StrokeSculptor {
    pub fn new(params: StrokeParams, masks: MaskSet, width: usize, height: usize, seed: u64) -> Self {
        Self {
            phase: Phase::Idle(Countdown::new(params.interval)),
            params,
            masks,
            grid: (width, height),
            rng: ChaCha8Rng::seed_from_u64(seed),
            mountains_built: 0,
            strokes_applied: 0,
        }
    }

    pub fn is_building(&self) -> bool {
        matches!(self.phase, Phase::Building { .. })
    }

    pub fn mountains_built(&self) -> u64 {
        self.mountains_built
    }

    pub fn strokes_applied(&self) -> u64 {
        self.strokes_applied
    }

    fn begin_mountain(&mut self) {
        let center = (
            self.rng.gen_range(0..self.grid.0.max(1)) as i32,
            self.rng.gen_range(0..self.grid.1.max(1)) as i32,
        );
        let size = if self.params.max_brush_size > self.params.min_brush_size {
            self.rng.gen_range(self.params.min_brush_size..self.params.max_brush_size)
        } else {
            self.params.min_brush_size
        };
        let strokes_left = if self.params.detail_layers > MIN_STROKES {
            self.rng.gen_range(MIN_STROKES..self.params.detail_layers)
        } else {
            MIN_STROKES
        };
        tracing::debug!(?center, size, strokes_left, "building stroke mountain");
        self.phase = Phase::Building { center, size, strokes_left };
    }

    fn apply_stroke(&mut self, field: &mut HeightField, center: (i32, i32), size: i32) {
        let (lo, hi) = (self.params.min_brush_opacity, self.params.max_brush_opacity);
        let opacity = (if hi > lo { self.rng.gen_range(lo..hi) } else { lo }) / 10.0;

        let half = size / 2;
        let (offset_x, offset_y) = if half > 0 {
            (self.rng.gen_range(-half..half), self.rng.gen_range(-half..half))
        } else {
            (0, 0)
        };

        let count = self.masks.mask_count();
        if count == 0 {
            return;
        }
        let mask_index = self.rng.gen_range(0..count);

        stamp_mask(
            field,
            &self.masks,
            mask_index,
            center.0 + offset_x,
            center.1 + offset_y,
            size,
            opacity,
            self.params.max_mountain_height,
        );
        self.strokes_applied += 1;
    }

    /// Advance by `dt` seconds against an already locked field.
    pub fn advance(&mut self, field: &mut HeightField, dt: f32) {
        match &mut self.phase {
            Phase::Idle(countdown) => {
                if countdown.advance(dt) {
                    self.begin_mountain();
                }
            }
            Phase::Building { center, size, strokes_left } => {
                let (center, size) = (*center, *size);
                *strokes_left = strokes_left.saturating_sub(1);
                let finished = *strokes_left == 0;
                self.apply_stroke(field, center, size);
                if finished {
                    self.mountains_built += 1;
                    self.phase = Phase::Idle(Countdown::new(self.params.interval));
                }
            }
        }
    }
}

impl Sculptor for StrokeSculptor {
    fn name(&self) -> &'static str {
        "mask strokes"
    }

    fn cadence(&self) -> Cadence {
        Cadence::Timed
    }

    fn tick(&mut self, field: &SharedHeightField, dt: f32) {
        let mut field = lock_field(field);
        self.advance(&mut field, dt);
    }

    fn summary(&self) -> String {
        format!(
            "{} mountains built, {} strokes applied",
            self.mountains_built, self.strokes_applied
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tilemap::Tilemap;

    fn small_params() -> StrokeParams {
        StrokeParams {
            interval: 0.1,
            max_mountain_height: 2.0,
            min_brush_size: 4,
            max_brush_size: 10,
            detail_layers: 6,
            ..StrokeParams::default()
        }
    }

    #[test]
    fn test_strokes_stay_within_max_height() {
        let mut field = HeightField::new(64, 64);
        let masks = MaskSet::procedural(3, 16, 1);
        let mut sculptor = StrokeSculptor::new(small_params(), masks, 64, 64, 21);

        for _ in 0..2000 {
            sculptor.advance(&mut field, 0.05);
        }

        let (min_h, max_h) = field.min_max().unwrap();
        assert!(min_h >= 0.0);
        assert!(max_h <= 2.0);
        assert!(max_h > 0.0);
        assert!(sculptor.mountains_built() > 10);
    }

    #[test]
    fn test_one_stroke_per_tick_then_idle() {
        let mut field = HeightField::new(32, 32);
        let masks = MaskSet::new(vec![Tilemap::new_with(4, 4, 1.0f32)]);
        let mut sculptor = StrokeSculptor::new(small_params(), masks, 32, 32, 3);

        sculptor.advance(&mut field, 0.1);
        assert!(sculptor.is_building());

        let mut ticks = 0;
        while sculptor.is_building() {
            sculptor.advance(&mut field, 0.01);
            ticks += 1;
        }
        assert!((MIN_STROKES as u64..6).contains(&ticks));
        assert_eq!(sculptor.strokes_applied(), ticks);
        assert_eq!(sculptor.mountains_built(), 1);
    }
}
