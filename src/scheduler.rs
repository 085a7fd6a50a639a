//! Pacing and concurrency for the sculptors.
//!
//! Two cadences drive the engine. Frame sculptors (walkers, the path carver)
//! act on every tick. Timed sculptors (mountain cycle, mask strokes) run
//! long sequences paced by `Countdown`s instead of suspending mid-routine.
//! All of them share one `HeightField` behind a mutex, and each sculptor
//! holds the lock for its whole read, compute, write-back sequence.

use crate::config::SculptConfig;
use crate::error::SculptError;
use crate::heightfield::{generate_base_terrain, lock_field, HeightField, SharedHeightField};
use crate::masks::MaskSet;
use crate::mountains::MountainCycle;
use crate::roads::PathCarver;
use crate::strokes::StrokeSculptor;
use crate::walker::Walker;

/// "Wait N seconds, then resume", advanced by the tick's elapsed time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Countdown {
    duration: f32,
    remaining: f32,
}

impl Countdown {
    pub fn new(seconds: f32) -> Self {
        Self {
            duration: seconds,
            remaining: seconds,
        }
    }

    /// Subtract `dt`; true once the delay has fully elapsed.
    pub fn advance(&mut self, dt: f32) -> bool {
        self.remaining -= dt;
        self.remaining <= 0.0
    }

    pub fn is_done(&self) -> bool {
        self.remaining <= 0.0
    }

    pub fn remaining(&self) -> f32 {
        self.remaining.max(0.0)
    }

    /// Start the same delay again.
    pub fn reset(&mut self) {
        self.remaining = self.duration;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cadence {
    /// Acts every tick without suspending
    Frame,
    /// Runs a paced sequence of delays and animations
    Timed,
}

/// Anything that mutates the shared field on a tick.
pub trait Sculptor: Send {
    fn name(&self) -> &'static str;

    fn cadence(&self) -> Cadence;

    /// Advance by `dt` seconds. Must take the field lock for each
    /// read-compute-write sequence and never fail.
    fn tick(&mut self, field: &SharedHeightField, dt: f32);

    /// One-line progress report.
    fn summary(&self) -> String {
        String::new()
    }
}

// Per-sculptor seed offsets so one engine seed reproduces a whole run
const WALKER_SALT: u64 = 0x1000;
const PATH_SALT: u64 = 0x2000;
const MOUNTAIN_SALT: u64 = 0x3000;
const STROKE_SALT: u64 = 0x4000;
const TERRAIN_SALT: u64 = 0x5000;

pub struct SculptEngine {
    field: SharedHeightField,
    sculptors: Vec<Box<dyn Sculptor>>,
    ticks: u64,
    elapsed: f64,
}

impl SculptEngine {
    /// An engine with no sculptors over the given field.
    pub fn new(field: HeightField) -> Self {
        Self {
            field: field.into_shared(),
            sculptors: Vec::new(),
            ticks: 0,
            elapsed: 0.0,
        }
    }

    /// Validate the configuration and build every configured sculptor.
    pub fn from_config(config: &SculptConfig, masks: MaskSet) -> Result<Self, SculptError> {
        config.validate(&masks)?;

        let size = config.grid_size;
        let seed = config.seed;
        let field = generate_base_terrain(size, size, config.base_amplitude, seed.wrapping_add(TERRAIN_SALT));
        let mut engine = Self::new(field);

        for (i, params) in config.walkers.iter().enumerate() {
            let walker = Walker::new(params.clone(), size, size, seed.wrapping_add(WALKER_SALT + i as u64));
            engine.add_sculptor(Box::new(walker));
        }
        if let Some(params) = &config.path {
            engine.add_sculptor(Box::new(PathCarver::new(
                params.clone(),
                size,
                size,
                seed.wrapping_add(PATH_SALT),
            )));
        }
        if let Some(params) = &config.mountains {
            engine.add_sculptor(Box::new(MountainCycle::new(
                params.clone(),
                size,
                size,
                seed.wrapping_add(MOUNTAIN_SALT),
            )));
        }
        if let Some(params) = &config.strokes {
            engine.add_sculptor(Box::new(StrokeSculptor::new(
                params.clone(),
                masks,
                size,
                size,
                seed.wrapping_add(STROKE_SALT),
            )));
        }

        tracing::info!(size, seed, sculptors = engine.sculptors.len(), "sculpt engine ready");
        Ok(engine)
    }

    pub fn add_sculptor(&mut self, sculptor: Box<dyn Sculptor>) {
        self.sculptors.push(sculptor);
    }

    /// Shared handle to the field, for hosts reading it between ticks.
    pub fn field(&self) -> SharedHeightField {
        self.field.clone()
    }

    /// Copy of the current field.
    pub fn snapshot(&self) -> HeightField {
        lock_field(&self.field).clone()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Advance every sculptor once, in registration order.
    pub fn tick(&mut self, dt: f32) {
        for sculptor in &mut self.sculptors {
            sculptor.tick(&self.field, dt);
        }
        self.ticks += 1;
        self.elapsed += dt as f64;
    }

    fn steps_for(seconds: f32, dt: f32) -> u64 {
        if dt <= 0.0 || seconds <= 0.0 {
            return 0;
        }
        (seconds / dt).round() as u64
    }

    /// Fixed-step sequential run. Returns the number of ticks taken.
    pub fn run(&mut self, seconds: f32, dt: f32) -> u64 {
        let steps = Self::steps_for(seconds, dt);
        for _ in 0..steps {
            self.tick(dt);
        }
        steps
    }

    /// Run the frame and timed cadences side by side on rayon workers. Both
    /// use the same fixed step; they only meet at the field's mutex.
    pub fn run_concurrent(&mut self, seconds: f32, dt: f32) -> u64 {
        let steps = Self::steps_for(seconds, dt);
        let field = &self.field;
        let (mut frame, mut timed): (Vec<_>, Vec<_>) = self
            .sculptors
            .iter_mut()
            .partition(|s| s.cadence() == Cadence::Frame);

        let drive = |group: &mut Vec<&mut Box<dyn Sculptor>>| {
            for _ in 0..steps {
                for sculptor in group.iter_mut() {
                    sculptor.tick(field, dt);
                }
            }
        };
        rayon::join(|| drive(&mut frame), || drive(&mut timed));

        self.ticks += steps;
        self.elapsed += steps as f64 * dt as f64;
        steps
    }

    /// `(name, summary)` for each sculptor.
    pub fn stats(&self) -> Vec<(&'static str, String)> {
        self.sculptors.iter().map(|s| (s.name(), s.summary())).collect()
    }
}
