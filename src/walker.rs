//! Autonomous roaming brush.
//!
//! A walker drifts across the field, stamping a radial brush at its current
//! cell every tick and reflecting off the grid edges. On a fixed interval it
//! picks a new heading and re-rolls its brush size. Two policies share the
//! same state machine:
//!
//! - `Unclamped`: fixed sculpt speed and step factor, heights accumulate
//!   without bound.
//! - `Clamped`: sculpt speed is re-rolled with the heading, doubles as the
//!   step factor, and results are clamped to `[0, max_height]`.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::brush::stamp_radial;
use crate::heightfield::{lock_field, HeightField, SharedHeightField};
use crate::scheduler::{Cadence, Countdown, Sculptor};

/// Distance moved per tick is `direction * speed * STEP_SCALE` cells.
pub const STEP_SCALE: f32 = 100.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WalkerPolicy {
    Unclamped {
        /// Peak height added at the brush center each tick
        sculpt_speed: f32,
        /// Step multiplier, so the walker moves `speed_factor * 100` cells per tick
        speed_factor: f32,
    },
    Clamped {
        /// Upper bound for the re-rolled sculpt speed (also the step factor)
        max_sculpt_speed: f32,
        /// Heights never leave `[0, max_height]`
        max_height: f32,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkerParams {
    pub policy: WalkerPolicy,
    /// Upper bound for the re-rolled brush size, in world units
    pub max_brush_size: f32,
    /// Seconds between heading and brush re-rolls
    pub direction_change_interval: f32,
    /// World extent of the terrain; brush radius in cells is
    /// `round(brush_size * grid_width / world_size)`. Defaults to the grid width.
    pub world_size: Option<f32>,
}

impl Default for WalkerParams {
    fn default() -> Self {
        Self::unclamped()
    }
}

impl WalkerParams {
    pub fn unclamped() -> Self {
        Self {
            policy: WalkerPolicy::Unclamped {
                sculpt_speed: 0.003,
                speed_factor: 0.05,
            },
            max_brush_size: 20.0,
            direction_change_interval: 2.0,
            world_size: None,
        }
    }

    pub fn clamped() -> Self {
        Self {
            policy: WalkerPolicy::Clamped {
                max_sculpt_speed: 0.005,
                max_height: 0.5,
            },
            max_brush_size: 10.0,
            direction_change_interval: 1.0,
            world_size: None,
        }
    }
}

/// A roaming brush agent. Created once and never destroyed.
pub struct Walker {
    params: WalkerParams,
    position: (f32, f32),
    direction: (f32, f32),
    brush_size: f32,
    sculpt_speed: f32,
    reroll: Countdown,
    grid: (usize, usize),
    rng: ChaCha8Rng,
    ticks: u64,
    cells_sculpted: u64,
}

impl Walker {
    /// Start at the grid center with a random heading and brush.
    pub fn new(params: WalkerParams, width: usize, height: usize, seed: u64) -> Self {
        let mut walker = Self {
            reroll: Countdown::new(params.direction_change_interval),
            position: ((width / 2) as f32, (height / 2) as f32),
            direction: (1.0, 0.0),
            brush_size: 0.0,
            sculpt_speed: 0.0,
            grid: (width, height),
            rng: ChaCha8Rng::seed_from_u64(seed),
            ticks: 0,
            cells_sculpted: 0,
            params,
        };
        walker.randomize_direction();
        walker.randomize_brush();
        walker
    }

    /// Override the starting position and heading. The heading is normalized;
    /// a zero vector is ignored.
    pub fn with_heading(mut self, position: (f32, f32), direction: (f32, f32)) -> Self {
        self.position = position;
        let len = (direction.0 * direction.0 + direction.1 * direction.1).sqrt();
        if len > 0.0001 {
            self.direction = (direction.0 / len, direction.1 / len);
        }
        self
    }

    pub fn position(&self) -> (f32, f32) {
        self.position
    }

    pub fn direction(&self) -> (f32, f32) {
        self.direction
    }

    pub fn brush_size(&self) -> f32 {
        self.brush_size
    }

    pub fn sculpt_speed(&self) -> f32 {
        self.sculpt_speed
    }

    pub fn params(&self) -> &WalkerParams {
        &self.params
    }

    /// Step factor applied to the heading this tick.
    fn speed(&self) -> f32 {
        match self.params.policy {
            WalkerPolicy::Unclamped { speed_factor, .. } => speed_factor,
            WalkerPolicy::Clamped { .. } => self.sculpt_speed,
        }
    }

    fn max_height(&self) -> Option<f32> {
        match self.params.policy {
            WalkerPolicy::Unclamped { .. } => None,
            WalkerPolicy::Clamped { max_height, .. } => Some(max_height),
        }
    }

    fn brush_radius(&self) -> i32 {
        let width = self.grid.0 as f32;
        let world_size = self.params.world_size.filter(|s| *s > 0.0).unwrap_or(width);
        (self.brush_size * width / world_size).round() as i32
    }

    fn randomize_direction(&mut self) {
        let angle = self.rng.gen_range(0.0..std::f32::consts::TAU);
        self.direction = (angle.cos(), angle.sin());
    }

    fn randomize_brush(&mut self) {
        self.brush_size = if self.params.max_brush_size > 0.0 {
            self.rng.gen_range(0.0..self.params.max_brush_size)
        } else {
            0.0
        };
        self.sculpt_speed = match self.params.policy {
            WalkerPolicy::Unclamped { sculpt_speed, .. } => sculpt_speed,
            WalkerPolicy::Clamped { max_sculpt_speed, .. } if max_sculpt_speed > 0.0 => {
                self.rng.gen_range(0.0..max_sculpt_speed)
            }
            WalkerPolicy::Clamped { .. } => 0.0,
        };
    }

    /// Advance the position and reflect off any crossed edge. The walker may
    /// sit past the edge by up to one step before heading back.
    fn advance(&mut self) {
        let step = self.speed() * STEP_SCALE;
        self.position.0 += self.direction.0 * step;
        self.position.1 += self.direction.1 * step;

        let (width, height) = (self.grid.0 as f32, self.grid.1 as f32);
        if self.position.0 < 0.0 || self.position.0 >= width {
            self.direction.0 = -self.direction.0;
        }
        if self.position.1 < 0.0 || self.position.1 >= height {
            self.direction.1 = -self.direction.1;
        }
    }

    fn sculpt(&mut self, field: &mut HeightField) {
        let col = self.position.0.round() as i32;
        let row = self.position.1.round() as i32;
        let touched = stamp_radial(
            field,
            col,
            row,
            self.brush_radius(),
            self.sculpt_speed,
            self.max_height(),
        );
        self.cells_sculpted += touched as u64;
    }

    fn update_timer(&mut self, dt: f32) {
        if self.reroll.advance(dt) {
            self.randomize_direction();
            self.randomize_brush();
            self.reroll.reset();
        }
    }

    /// One frame: move, stamp under the lock, then count down to the next re-roll.
    pub fn step(&mut self, field: &SharedHeightField, dt: f32) {
        self.advance();
        {
            let mut field = lock_field(field);
            self.sculpt(&mut field);
        }
        self.update_timer(dt);
        self.ticks += 1;
    }
}

impl Sculptor for Walker {
    fn name(&self) -> &'static str {
        match self.params.policy {
            WalkerPolicy::Unclamped { .. } => "walker (unclamped)",
            WalkerPolicy::Clamped { .. } => "walker (clamped)",
        }
    }

    fn cadence(&self) -> Cadence {
        Cadence::Frame
    }

    fn tick(&mut self, field: &SharedHeightField, dt: f32) {
        self.step(field, dt);
    }

    fn summary(&self) -> String {
        format!(
            "{} ticks, {} cells sculpted, at ({:.1}, {:.1})",
            self.ticks, self.cells_sculpted, self.position.0, self.position.1
        )
    }
}
