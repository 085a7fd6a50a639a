//! Mountain lifecycle under a global area budget.
//!
//! Mountains are raised one at a time. Each candidate reserves its footprint
//! area (`pi * r^2`) the moment it is accepted; a candidate that would push
//! the running total past the budget is dropped. A mountain grows from the
//! terrain beneath it toward a full cone over `grow_duration`, then holds.
//! Once no further mountain can fit, every mountain switches to flattening
//! together and they are lerped back to their pre-mountain baseline one after
//! another in creation order. When the last one is gone the registry and the
//! area counter reset and the cycle starts over.

use std::f32::consts::PI;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::brush::{cone_multiplier, lerp};
use crate::heightfield::{lock_field, HeightField, Region, SharedHeightField};
use crate::scheduler::{Cadence, Countdown, Sculptor};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountainParams {
    /// Share of the grid area, in percent, mountains may cover at once
    pub max_mountain_percentage: f32,
    pub min_radius: i32,
    pub max_radius: i32,
    pub min_height: f32,
    pub max_height: f32,
    /// Seconds to grow one mountain to full height
    pub grow_duration: f32,
    /// Seconds to flatten one mountain back to its baseline
    pub flatten_duration: f32,
    /// Seconds between mountain creation attempts
    pub pause_between_mountains: f32,
    /// Seconds between the budget filling up and the flatten starting
    pub flatten_pause_duration: f32,
}

impl Default for MountainParams {
    fn default() -> Self {
        Self {
            max_mountain_percentage: 30.0,
            min_radius: 20,
            max_radius: 60,
            min_height: 10.0,
            max_height: 30.0,
            grow_duration: 5.0,
            flatten_duration: 5.0,
            pause_between_mountains: 2.0,
            flatten_pause_duration: 3.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MountainState {
    Growing,
    Holding,
    Flattening,
    Removed,
}

/// Which step of the cycle is running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleStage {
    Pausing,
    Growing,
    PreFlatten,
    Flattening,
}

#[derive(Clone, Debug)]
pub struct Mountain {
    pub id: u32,
    pub center: (i32, i32),
    pub radius: i32,
    pub target_height: f32,
    pub state: MountainState,
    /// Heights under the bounding square before the mountain existed
    baseline: Region,
    /// Heights under the bounding square when this mountain's flatten began
    flatten_from: Option<Region>,
}

impl Mountain {
    pub fn area(&self) -> f32 {
        footprint_area(self.radius)
    }

    /// True if the cell lies strictly inside the mountain's radius.
    pub fn covers(&self, col: i32, row: i32) -> bool {
        let dx = (col - self.center.0) as f32;
        let dy = (row - self.center.1) as f32;
        (dx * dx + dy * dy).sqrt() < self.radius as f32
    }

    pub fn baseline(&self) -> &Region {
        &self.baseline
    }

    /// Write `lerp(from, to, t)` into every footprint cell, leaving the rest
    /// of the bounding square as it currently is in the field.
    fn lerp_footprint<F>(&self, field: &mut HeightField, from: &Region, target: F, t: f32)
    where
        F: Fn(usize, usize, i32, i32) -> f32 + Sync,
    {
        let mut current = field.get_region(
            self.baseline.col,
            self.baseline.row,
            self.baseline.width(),
            self.baseline.height(),
        );
        let (origin_col, origin_row) = (current.col, current.row);
        let (center, radius) = (self.center, self.radius as f32);

        current.cells.par_rows_mut().for_each(|(y, row)| {
            for (x, h) in row.iter_mut().enumerate() {
                let dx = origin_col + x as i32 - center.0;
                let dy = origin_row + y as i32 - center.1;
                if ((dx * dx + dy * dy) as f32).sqrt() >= radius {
                    continue;
                }
                *h = lerp(*from.cells.get(x, y), target(x, y, dx, dy), t);
            }
        });

        field.apply_region(&current);
    }

    fn grow(&self, field: &mut HeightField, t: f32) {
        let (target_height, radius) = (self.target_height, self.radius as f32);
        self.lerp_footprint(
            field,
            &self.baseline,
            |_, _, dx, dy| target_height * cone_multiplier(dx, dy, radius),
            t,
        );
    }

    fn flatten(&self, field: &mut HeightField, t: f32) {
        let Some(from) = &self.flatten_from else {
            return;
        };
        let baseline = &self.baseline;
        self.lerp_footprint(field, from, |x, y, _, _| *baseline.cells.get(x, y), t);
    }
}

pub fn footprint_area(radius: i32) -> f32 {
    PI * (radius as f32) * (radius as f32)
}

fn progress(elapsed: f32, duration: f32) -> f32 {
    if duration <= 0.0 {
        1.0
    } else {
        (elapsed / duration).min(1.0)
    }
}

enum Phase {
    Pausing(Countdown),
    Growing { index: usize, elapsed: f32 },
    PreFlatten(Countdown),
    Flattening { index: usize, elapsed: f32 },
}

pub struct MountainCycle {
    params: MountainParams,
    grid: (usize, usize),
    mountains: Vec<Mountain>,
    total_area: f32,
    phase: Phase,
    rng: ChaCha8Rng,
    next_id: u32,
    accepted: u64,
    dropped: u64,
    cycles_completed: u64,
}

impl MountainCycle {
    pub fn new(params: MountainParams, width: usize, height: usize, seed: u64) -> Self {
        Self {
            phase: Phase::Pausing(Countdown::new(params.pause_between_mountains)),
            params,
            grid: (width, height),
            mountains: Vec::new(),
            total_area: 0.0,
            rng: ChaCha8Rng::seed_from_u64(seed),
            next_id: 0,
            accepted: 0,
            dropped: 0,
            cycles_completed: 0,
        }
    }

    /// Maximum total footprint area, `max_mountain_percentage / 100 * W * H`.
    pub fn budget(&self) -> f32 {
        self.params.max_mountain_percentage / 100.0 * (self.grid.0 * self.grid.1) as f32
    }

    pub fn total_area(&self) -> f32 {
        self.total_area
    }

    pub fn mountains(&self) -> &[Mountain] {
        &self.mountains
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed
    }

    pub fn stage(&self) -> CycleStage {
        match self.phase {
            Phase::Pausing(_) => CycleStage::Pausing,
            Phase::Growing { .. } => CycleStage::Growing,
            Phase::PreFlatten(_) => CycleStage::PreFlatten,
            Phase::Flattening { .. } => CycleStage::Flattening,
        }
    }

    /// No candidate of the smallest radius could still fit.
    fn budget_exhausted(&self) -> bool {
        self.total_area + footprint_area(self.params.min_radius.max(1)) > self.budget()
    }

    /// Reserve area and snapshot the baseline for a new mountain, or drop it
    /// if it would breach the budget.
    fn try_accept(
        &mut self,
        field: &HeightField,
        center: (i32, i32),
        radius: i32,
        target_height: f32,
    ) -> Option<u32> {
        if radius <= 0 {
            return None;
        }
        let area = footprint_area(radius);
        if self.total_area + area > self.budget() {
            self.dropped += 1;
            tracing::debug!(
                ?center,
                radius,
                area,
                total = self.total_area,
                budget = self.budget(),
                "mountain candidate dropped"
            );
            return None;
        }

        let id = self.next_id;
        self.next_id += 1;
        self.total_area += area;
        self.accepted += 1;
        self.mountains.push(Mountain {
            id,
            center,
            radius,
            target_height,
            state: MountainState::Growing,
            baseline: field.get_square(center.0, center.1, radius),
            flatten_from: None,
        });
        tracing::debug!(id, ?center, radius, target_height, total = self.total_area, "mountain accepted");
        Some(id)
    }

    /// Ask for a specific mountain. Only honored while the cycle is between
    /// mountains; returns `None` if a lifecycle is already running or the
    /// mountain does not fit the budget.
    pub fn request_mountain(
        &mut self,
        field: &HeightField,
        center: (i32, i32),
        radius: i32,
        target_height: f32,
    ) -> Option<u32> {
        if !matches!(self.phase, Phase::Pausing(_)) {
            return None;
        }
        let id = self.try_accept(field, center, radius, target_height)?;
        self.phase = Phase::Growing { index: self.mountains.len() - 1, elapsed: 0.0 };
        Some(id)
    }

    fn spawn_random(&mut self, field: &HeightField) {
        let center = (
            self.rng.gen_range(0..self.grid.0.max(1)) as i32,
            self.rng.gen_range(0..self.grid.1.max(1)) as i32,
        );
        let radius = self.rng.gen_range(self.params.min_radius..=self.params.max_radius);
        let target_height = self.rng.gen_range(self.params.min_height..=self.params.max_height);

        if self.try_accept(field, center, radius, target_height).is_some() {
            self.phase = Phase::Growing { index: self.mountains.len() - 1, elapsed: 0.0 };
        } else {
            self.after_attempt();
        }
    }

    fn after_attempt(&mut self) {
        self.phase = if self.budget_exhausted() {
            tracing::info!(
                mountains = self.mountains.len(),
                total = self.total_area,
                "mountain budget reached"
            );
            Phase::PreFlatten(Countdown::new(self.params.flatten_pause_duration))
        } else {
            Phase::Pausing(Countdown::new(self.params.pause_between_mountains))
        };
    }

    fn begin_flatten(&mut self, field: &HeightField) {
        tracing::info!(mountains = self.mountains.len(), "flattening all mountains");
        for mountain in &mut self.mountains {
            mountain.state = MountainState::Flattening;
        }
        if self.mountains.is_empty() {
            self.finish_flatten();
            return;
        }
        self.start_flattening(field, 0);
    }

    fn start_flattening(&mut self, field: &HeightField, index: usize) {
        let mountain = &mut self.mountains[index];
        mountain.flatten_from = Some(field.get_region(
            mountain.baseline.col,
            mountain.baseline.row,
            mountain.baseline.width(),
            mountain.baseline.height(),
        ));
        self.phase = Phase::Flattening { index, elapsed: 0.0 };
    }

    /// Later mountains captured this one's cone in their baselines; point
    /// those cells at the terrain this mountain was raised from.
    fn rebase_later(&mut self, index: usize) {
        let (done, later) = self.mountains.split_at_mut(index + 1);
        let removed = &done[index];
        for mountain in later {
            let (col0, row0) = (mountain.baseline.col, mountain.baseline.row);
            for (x, y, h) in mountain.baseline.cells.iter_mut() {
                let (col, row) = (col0 + x as i32, row0 + y as i32);
                if !removed.covers(col, row) {
                    continue;
                }
                if let Some(original) = removed.baseline.at(col, row) {
                    *h = original;
                }
            }
        }
    }

    fn finish_flatten(&mut self) {
        tracing::info!(cycle = self.cycles_completed + 1, "all mountains flattened");
        self.mountains.clear();
        self.total_area = 0.0;
        self.cycles_completed += 1;
        self.phase = Phase::Pausing(Countdown::new(self.params.pause_between_mountains));
    }

    /// Advance the cycle by `dt` seconds against an already locked field.
    pub fn advance(&mut self, field: &mut HeightField, dt: f32) {
        match &mut self.phase {
            Phase::Pausing(countdown) => {
                if countdown.advance(dt) {
                    self.spawn_random(field);
                }
            }
            Phase::Growing { index, elapsed } => {
                *elapsed += dt;
                let index = *index;
                let t = progress(*elapsed, self.params.grow_duration);
                self.mountains[index].grow(field, t);
                if t >= 1.0 {
                    self.mountains[index].state = MountainState::Holding;
                    self.after_attempt();
                }
            }
            Phase::PreFlatten(countdown) => {
                if countdown.advance(dt) {
                    self.begin_flatten(field);
                }
            }
            Phase::Flattening { index, elapsed } => {
                *elapsed += dt;
                let index = *index;
                let t = progress(*elapsed, self.params.flatten_duration);
                self.mountains[index].flatten(field, t);
                if t >= 1.0 {
                    self.mountains[index].state = MountainState::Removed;
                    self.mountains[index].flatten_from = None;
                    self.rebase_later(index);
                    if index + 1 < self.mountains.len() {
                        self.start_flattening(field, index + 1);
                    } else {
                        self.finish_flatten();
                    }
                }
            }
        }
    }
}

impl Sculptor for MountainCycle {
    fn name(&self) -> &'static str {
        "mountain cycle"
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
            "{} accepted, {} dropped, {} flatten cycles, {} active ({:.0}/{:.0} area)",
            self.accepted,
            self.dropped,
            self.cycles_completed,
            self.mountains.len(),
            self.total_area,
            self.budget()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heightfield::generate_base_terrain;

    fn quiet_params() -> MountainParams {
        MountainParams {
            pause_between_mountains: 1.0e9,
            ..MountainParams::default()
        }
    }

    #[test]
    fn test_single_mountain_grows_to_cone() {
        let mut field = HeightField::new(513, 513);
        let mut cycle = MountainCycle::new(quiet_params(), 513, 513, 1);

        let id = cycle.request_mountain(&field, (256, 256), 50, 30.0);
        assert_eq!(id, Some(0));
        assert_eq!(cycle.mountains()[0].state, MountainState::Growing);

        for _ in 0..51 {
            cycle.advance(&mut field, 0.1);
        }

        assert_eq!(cycle.mountains()[0].state, MountainState::Holding);
        assert!((field.get(256, 256).unwrap() - 30.0).abs() < 1e-3);
        assert!(field.get(256 + 49, 256).unwrap() < 1.0);
        assert_eq!(field.get(256 + 50, 256), Some(0.0));
        assert_eq!(field.get(256 + 51, 256), Some(0.0));
    }

    #[test]
    fn test_growth_is_time_parameterized() {
        let mut field = HeightField::new(64, 64);
        let mut cycle = MountainCycle::new(quiet_params(), 64, 64, 1);
        cycle.request_mountain(&field, (32, 32), 10, 20.0);

        // Half of the 5 second grow duration
        for _ in 0..25 {
            cycle.advance(&mut field, 0.1);
        }
        let center = field.get(32, 32).unwrap();
        assert!((center - 10.0).abs() < 0.1, "center {}", center);
        assert_eq!(cycle.stage(), CycleStage::Growing);
    }

    #[test]
    fn test_second_request_rejected_while_growing() {
        let field = HeightField::new(128, 128);
        let mut cycle = MountainCycle::new(quiet_params(), 128, 128, 1);
        assert!(cycle.request_mountain(&field, (40, 40), 20, 10.0).is_some());
        assert!(cycle.request_mountain(&field, (90, 90), 20, 10.0).is_none());
        assert_eq!(cycle.mountains().len(), 1);
    }

    #[test]
    fn test_over_budget_candidate_is_dropped() {
        let params = MountainParams {
            max_mountain_percentage: 10.0,
            ..quiet_params()
        };
        let field = HeightField::new(100, 100);
        let mut cycle = MountainCycle::new(params, 100, 100, 1);

        // Area of radius 30 is ~2827, budget is 1000
        assert!(cycle.request_mountain(&field, (50, 50), 30, 10.0).is_none());
        assert!(cycle.mountains().is_empty());
        assert_eq!(cycle.total_area(), 0.0);
        assert_eq!(cycle.dropped(), 1);
    }

    #[test]
    fn test_running_area_never_exceeds_budget() {
        let params = MountainParams {
            max_mountain_percentage: 10.0,
            min_radius: 8,
            max_radius: 14,
            grow_duration: 0.2,
            flatten_duration: 0.2,
            pause_between_mountains: 0.1,
            flatten_pause_duration: 0.1,
            ..MountainParams::default()
        };
        let mut field = HeightField::new(100, 100);
        let mut cycle = MountainCycle::new(params, 100, 100, 77);

        for _ in 0..5000 {
            cycle.advance(&mut field, 0.05);
            assert!(cycle.total_area() <= cycle.budget() + 1e-3);
            let sum: f32 = cycle.mountains().iter().map(|m| m.area()).sum();
            assert!((sum - cycle.total_area()).abs() < 1e-2);
        }
        assert!(cycle.accepted() > 2);
        assert!(cycle.cycles_completed() > 0);
    }

    #[test]
    fn test_flatten_all_restores_baseline() {
        let params = MountainParams {
            max_mountain_percentage: 40.0,
            min_radius: 8,
            max_radius: 12,
            grow_duration: 0.5,
            flatten_duration: 0.5,
            pause_between_mountains: 0.2,
            flatten_pause_duration: 0.3,
            ..MountainParams::default()
        };
        let baseline = generate_base_terrain(64, 64, 2.0, 5);
        let mut field = baseline.clone();
        let mut cycle = MountainCycle::new(params, 64, 64, 13);

        let mut saw_global_flatten = false;
        for _ in 0..20_000 {
            let before = cycle.stage();
            cycle.advance(&mut field, 0.05);
            if before == CycleStage::PreFlatten && cycle.stage() == CycleStage::Flattening {
                assert!(cycle.mountains().len() > 1);
                assert!(cycle
                    .mountains()
                    .iter()
                    .all(|m| m.state == MountainState::Flattening));
                saw_global_flatten = true;
            }
            if cycle.cycles_completed() == 1 {
                break;
            }
        }

        assert!(saw_global_flatten);
        assert_eq!(cycle.cycles_completed(), 1);
        assert_eq!(cycle.total_area(), 0.0);
        assert!(cycle.mountains().is_empty());
        for (x, y, &h) in baseline.as_tilemap().iter() {
            let now = field.get(x as i32, y as i32).unwrap();
            assert!((now - h).abs() < 1e-4, "cell ({}, {}) {} vs {}", x, y, now, h);
        }
    }

    #[test]
    fn test_overlapping_mountains_flatten_to_original() {
        let params = MountainParams {
            grow_duration: 0.1,
            flatten_duration: 0.1,
            flatten_pause_duration: 0.0,
            ..quiet_params()
        };
        let mut field = HeightField::new(64, 64);
        let mut cycle = MountainCycle::new(params, 64, 64, 2);

        cycle.request_mountain(&field, (28, 32), 12, 10.0);
        cycle.advance(&mut field, 0.1);
        // Pause is effectively infinite, so force the next mountain in
        cycle.phase = Phase::Pausing(Countdown::new(1.0e9));
        cycle.request_mountain(&field, (36, 32), 12, 15.0);
        cycle.advance(&mut field, 0.1);
        assert!(field.get(32, 32).unwrap() > 0.0);

        cycle.begin_flatten(&field);
        for _ in 0..10 {
            cycle.advance(&mut field, 0.1);
        }

        assert_eq!(cycle.cycles_completed(), 1);
        assert!(field.as_tilemap().iter().all(|(_, _, &h)| h.abs() < 1e-5));
    }

    #[test]
    fn test_flatten_runs_in_creation_order() {
        let params = MountainParams {
            max_mountain_percentage: 100.0,
            grow_duration: 0.1,
            flatten_duration: 0.1,
            flatten_pause_duration: 0.1,
            ..quiet_params()
        };
        let baseline = generate_base_terrain(64, 64, 2.0, 3);
        let mut field = baseline.clone();
        let mut cycle = MountainCycle::new(params, 64, 64, 4);

        // Radius 20 leaves room for exactly three mountains in 64x64
        for center in [(0, 0), (63, 63), (20, 20)] {
            assert!(cycle.request_mountain(&field, center, 20, 12.0).is_some());
            cycle.advance(&mut field, 0.1);
        }
        assert_eq!(cycle.stage(), CycleStage::PreFlatten);

        let mut order = Vec::new();
        for _ in 0..20 {
            cycle.advance(&mut field, 0.1);
            if let Phase::Flattening { index, .. } = cycle.phase {
                if order.last() != Some(&index) {
                    order.push(index);
                }
            }
            if cycle.cycles_completed() == 1 {
                break;
            }
        }

        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(cycle.cycles_completed(), 1);
        for (x, y, &h) in baseline.as_tilemap().iter() {
            assert_eq!(field.get(x as i32, y as i32), Some(h));
        }
    }

    #[test]
    fn test_edge_clipped_mountain_grows_and_flattens() {
        let params = MountainParams {
            max_mountain_percentage: 100.0,
            grow_duration: 0.1,
            flatten_duration: 0.1,
            ..quiet_params()
        };
        let baseline = generate_base_terrain(64, 64, 1.0, 8);
        let mut field = baseline.clone();
        let mut cycle = MountainCycle::new(params, 64, 64, 6);

        // Center on the far edge so half the footprint lies outside the grid
        assert!(cycle.request_mountain(&field, (63, 32), 15, 9.0).is_some());
        let footprint = cycle.mountains()[0].baseline();
        assert_eq!((footprint.col, footprint.row), (48, 17));
        assert_eq!((footprint.width(), footprint.height()), (16, 31));

        cycle.advance(&mut field, 0.1);
        assert_eq!(cycle.mountains()[0].state, MountainState::Holding);
        assert_eq!(field.get(63, 32), Some(9.0));
        assert_eq!(field.get(47, 32), baseline.get(47, 32));
        assert_eq!(field.get(63, 16), baseline.get(63, 16));
        assert_eq!(field.get(63, 48), baseline.get(63, 48));

        cycle.begin_flatten(&field);
        cycle.advance(&mut field, 0.1);
        assert_eq!(cycle.cycles_completed(), 1);
        assert_eq!(field, baseline);
    }
}
