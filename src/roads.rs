//! Road carving with a self-avoiding random walk.
//!
//! The carver advances a road centerline one cell per tick, occasionally
//! curving, and flattens a square swath around the centerline to height zero.
//! A path lives for `timer_value` seconds, then the carver idles for
//! `restart_wait` seconds and starts a fresh path somewhere else.

use std::collections::HashSet;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::heightfield::{lock_field, HeightField, SharedHeightField};
use crate::scheduler::{Cadence, Countdown, Sculptor};

/// Integer grid position or direction, `(col, row)`.
pub type GridPos = (i32, i32);

/// Cardinal directions a fresh heading is drawn from. "Up" is `+row`.
pub const CARDINALS: [GridPos; 4] = [(0, 1), (0, -1), (-1, 0), (1, 0)];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathParams {
    /// Seconds a path keeps growing before the carver pauses
    pub timer_value: f32,
    /// Seconds to idle before starting the next path
    pub restart_wait: f32,
    pub min_width_of_road: i32,
    /// Exclusive upper bound for road width; also the inset from every edge
    pub max_width_of_road: i32,
    /// Chance per tick of curving
    pub curve_chance: f32,
    /// Curve angle range in degrees; the sign is a coin flip
    pub min_curve_angle: f32,
    pub max_curve_angle: f32,
}

impl Default for PathParams {
    fn default() -> Self {
        Self {
            timer_value: 10.0,
            restart_wait: 10.0,
            min_width_of_road: 3,
            max_width_of_road: 8,
            curve_chance: 0.2,
            min_curve_angle: 20.0,
            max_curve_angle: 60.0,
        }
    }
}

/// What one tick did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CarveStep {
    /// Moved to a new cell
    Advanced(GridPos),
    /// Next cell was visited or outside the inset; heading re-rolled in place
    Blocked,
    /// The path timer ran out and the carver went idle
    Paused,
    /// Idle between paths
    Waiting,
    /// A fresh path was started at this position
    Restarted(GridPos),
}

enum Phase {
    Carving { timer: Countdown },
    Waiting { wait: Countdown },
}

pub struct PathCarver {
    params: PathParams,
    grid: (i32, i32),
    position: GridPos,
    direction: GridPos,
    road_width: i32,
    visited: HashSet<GridPos>,
    phase: Phase,
    rng: ChaCha8Rng,
    paths_started: u64,
    cells_flattened: u64,
}

/// Rotate an integer direction by `angle_degrees` and round each component.
/// Shallow angles can leave the direction unchanged and some inputs round
/// to `(0, 0)`; both outcomes are kept as-is.
pub fn rotate_direction(direction: GridPos, angle_degrees: f32) -> GridPos {
    let radians = angle_degrees.to_radians();
    let (sin, cos) = radians.sin_cos();
    let (x, y) = (direction.0 as f32, direction.1 as f32);
    ((x * cos - y * sin).round() as i32, (x * sin + y * cos).round() as i32)
}

impl PathCarver {
    /// Start a path at a random position.
    pub fn new(params: PathParams, width: usize, height: usize, seed: u64) -> Self {
        let mut carver = Self {
            phase: Phase::Carving { timer: Countdown::new(params.timer_value) },
            grid: (width as i32, height as i32),
            position: (0, 0),
            direction: CARDINALS[0],
            road_width: params.min_width_of_road,
            visited: HashSet::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            paths_started: 0,
            cells_flattened: 0,
            params,
        };
        carver.start_new_path();
        carver
    }

    /// Override the current path's start and heading.
    pub fn with_start(mut self, position: GridPos, direction: GridPos) -> Self {
        self.position = position;
        self.direction = direction;
        self.visited.clear();
        self
    }

    pub fn position(&self) -> GridPos {
        self.position
    }

    pub fn direction(&self) -> GridPos {
        self.direction
    }

    pub fn road_width(&self) -> i32 {
        self.road_width
    }

    pub fn visited(&self) -> &HashSet<GridPos> {
        &self.visited
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self.phase, Phase::Waiting { .. })
    }

    pub fn paths_started(&self) -> u64 {
        self.paths_started
    }

    fn inset(&self) -> i32 {
        self.params.max_width_of_road.max(0)
    }

    /// Inside the grid with `max_width_of_road` margin on every side.
    pub fn is_within_bounds(&self, pos: GridPos) -> bool {
        let inset = self.inset();
        pos.0 >= inset && pos.0 < self.grid.0 - inset && pos.1 >= inset && pos.1 < self.grid.1 - inset
    }

    fn random_in_inset(&mut self, extent: i32) -> i32 {
        let inset = self.inset();
        if extent - inset > inset {
            self.rng.gen_range(inset..extent - inset)
        } else {
            extent / 2
        }
    }

    fn randomize_direction(&mut self) {
        self.direction = CARDINALS[self.rng.gen_range(0..CARDINALS.len())];
    }

    fn start_new_path(&mut self) {
        self.position = (self.random_in_inset(self.grid.0), self.random_in_inset(self.grid.1));
        self.randomize_direction();
        self.visited.clear();
        self.road_width = if self.params.max_width_of_road > self.params.min_width_of_road {
            self.rng.gen_range(self.params.min_width_of_road..self.params.max_width_of_road)
        } else {
            self.params.min_width_of_road
        };
        self.paths_started += 1;
        tracing::debug!(
            position = ?self.position,
            direction = ?self.direction,
            width = self.road_width,
            "started road path"
        );
    }

    /// Extend the centerline by one cell, curving or re-rolling as needed.
    fn generate_segment(&mut self) -> CarveStep {
        self.visited.insert(self.position);

        if self.rng.gen::<f32>() < self.params.curve_chance {
            let (lo, hi) = (self.params.min_curve_angle, self.params.max_curve_angle);
            let magnitude = if hi > lo { self.rng.gen_range(lo..hi) } else { lo };
            let sign = if self.rng.gen_bool(0.5) { 1.0 } else { -1.0 };
            self.direction = rotate_direction(self.direction, magnitude * sign);
        }

        let next = (self.position.0 + self.direction.0, self.position.1 + self.direction.1);
        if self.visited.contains(&next) || !self.is_within_bounds(next) {
            self.randomize_direction();
            CarveStep::Blocked
        } else {
            self.position = next;
            CarveStep::Advanced(next)
        }
    }

    /// Flatten the square swath `[pos - w/2, pos + w/2)` to zero.
    fn flatten_segment(&mut self, field: &mut HeightField) {
        let half = self.road_width / 2;
        let side = (2 * half).max(0) as usize;
        let mut region = field.get_region(self.position.0 - half, self.position.1 - half, side, side);
        if region.is_empty() {
            return;
        }
        region.cells.fill(0.0);
        self.cells_flattened += field.apply_region(&region) as u64;
    }

    /// One frame of the carver.
    pub fn step(&mut self, field: &SharedHeightField, dt: f32) -> CarveStep {
        match &mut self.phase {
            Phase::Waiting { wait } => {
                if !wait.advance(dt) {
                    return CarveStep::Waiting;
                }
                self.start_new_path();
                self.phase = Phase::Carving { timer: Countdown::new(self.params.timer_value) };
                CarveStep::Restarted(self.position)
            }
            Phase::Carving { timer } => {
                if timer.advance(dt) {
                    tracing::debug!(visited = self.visited.len(), "road path finished");
                    self.phase = Phase::Waiting { wait: Countdown::new(self.params.restart_wait) };
                    return CarveStep::Paused;
                }
                let step = self.generate_segment();
                let mut field = lock_field(field);
                self.flatten_segment(&mut field);
                step
            }
        }
    }
}

impl Sculptor for PathCarver {
    fn name(&self) -> &'static str {
        "path carver"
    }

    fn cadence(&self) -> Cadence {
        Cadence::Frame
    }

    fn tick(&mut self, field: &SharedHeightField, dt: f32) {
        self.step(field, dt);
    }

    fn summary(&self) -> String {
        format!(
            "{} paths started, {} cells flattened, current width {}",
            self.paths_started, self.cells_flattened, self.road_width
        )
    }
}
