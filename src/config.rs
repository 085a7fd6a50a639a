//! Engine configuration.
//!
//! Every tunable lives in one serde struct; missing JSON fields fall back to
//! the defaults below. `validate` is the one place a bad configuration is
//! caught. After it passes, sculpting never fails.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SculptError;
use crate::masks::MaskProvider;
use crate::mountains::MountainParams;
use crate::roads::PathParams;
use crate::strokes::{StrokeParams, MIN_STROKES};
use crate::walker::{WalkerParams, WalkerPolicy};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SculptConfig {
    pub seed: u64,
    /// Side of the square height grid, in samples
    pub grid_size: usize,
    /// Amplitude of the rolling noise baseline; 0 starts flat
    pub base_amplitude: f32,
    pub walkers: Vec<WalkerParams>,
    pub path: Option<PathParams>,
    pub mountains: Option<MountainParams>,
    pub strokes: Option<StrokeParams>,
    /// Procedural masks generated when no mask images are given
    pub procedural_masks: usize,
    pub mask_resolution: usize,
}

impl Default for SculptConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            grid_size: 513,
            base_amplitude: 0.0,
            walkers: vec![WalkerParams::unclamped(), WalkerParams::clamped()],
            path: Some(PathParams::default()),
            mountains: Some(MountainParams::default()),
            strokes: Some(StrokeParams::default()),
            procedural_masks: 4,
            mask_resolution: 64,
        }
    }
}

fn invalid(msg: impl Into<String>) -> SculptError {
    SculptError::InvalidConfig(msg.into())
}

fn ensure(condition: bool, msg: impl Into<String>) -> Result<(), SculptError> {
    if condition { Ok(()) } else { Err(invalid(msg)) }
}

impl SculptConfig {
    pub fn from_json_str(json: &str) -> Result<Self, SculptError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SculptError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String, SculptError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Startup precondition check. Any failure here halts sculpting.
    pub fn validate<M: MaskProvider + ?Sized>(&self, masks: &M) -> Result<(), SculptError> {
        ensure(self.grid_size >= 2, format!("grid_size must be at least 2, got {}", self.grid_size))?;
        ensure(self.base_amplitude >= 0.0, "base_amplitude must not be negative")?;

        for (i, walker) in self.walkers.iter().enumerate() {
            validate_walker(walker).map_err(|e| invalid(format!("walker {}: {}", i, e)))?;
        }
        if let Some(path) = &self.path {
            validate_path(path, self.grid_size).map_err(|e| invalid(format!("path: {}", e)))?;
        }
        if let Some(mountains) = &self.mountains {
            validate_mountains(mountains).map_err(|e| invalid(format!("mountains: {}", e)))?;
        }
        if let Some(strokes) = &self.strokes {
            validate_strokes(strokes).map_err(|e| invalid(format!("strokes: {}", e)))?;
            ensure(masks.mask_count() > 0, "strokes: at least one brush mask is required")?;
        }
        Ok(())
    }
}

fn validate_walker(params: &WalkerParams) -> Result<(), String> {
    if params.max_brush_size < 0.0 {
        return Err("max_brush_size must not be negative".into());
    }
    if params.direction_change_interval <= 0.0 {
        return Err("direction_change_interval must be positive".into());
    }
    if params.world_size.is_some_and(|s| s <= 0.0) {
        return Err("world_size must be positive".into());
    }
    match params.policy {
        WalkerPolicy::Unclamped { sculpt_speed, speed_factor } => {
            if sculpt_speed < 0.0 || speed_factor < 0.0 {
                return Err("sculpt_speed and speed_factor must not be negative".into());
            }
        }
        WalkerPolicy::Clamped { max_sculpt_speed, max_height } => {
            if max_sculpt_speed < 0.0 {
                return Err("max_sculpt_speed must not be negative".into());
            }
            if max_height <= 0.0 {
                return Err("max_height must be positive".into());
            }
        }
    }
    Ok(())
}

fn validate_path(params: &PathParams, grid_size: usize) -> Result<(), String> {
    if params.min_width_of_road < 1 || params.max_width_of_road < params.min_width_of_road {
        return Err(format!(
            "road width range [{}, {}) is invalid",
            params.min_width_of_road, params.max_width_of_road
        ));
    }
    if (grid_size as i64) <= 2 * params.max_width_of_road as i64 {
        return Err(format!(
            "grid of {} leaves no room inside a {} cell inset",
            grid_size, params.max_width_of_road
        ));
    }
    if params.timer_value <= 0.0 || params.restart_wait < 0.0 {
        return Err("timer_value must be positive and restart_wait not negative".into());
    }
    if !(0.0..=1.0).contains(&params.curve_chance) {
        return Err("curve_chance must be within [0, 1]".into());
    }
    if params.min_curve_angle > params.max_curve_angle {
        return Err("min_curve_angle exceeds max_curve_angle".into());
    }
    Ok(())
}

fn validate_mountains(params: &MountainParams) -> Result<(), String> {
    if !(params.max_mountain_percentage > 0.0 && params.max_mountain_percentage <= 100.0) {
        return Err("max_mountain_percentage must be within (0, 100]".into());
    }
    if params.min_radius < 1 || params.max_radius < params.min_radius {
        return Err(format!("radius range [{}, {}] is invalid", params.min_radius, params.max_radius));
    }
    if params.min_height < 0.0 || params.max_height < params.min_height {
        return Err(format!("height range [{}, {}] is invalid", params.min_height, params.max_height));
    }
    let durations = [
        params.grow_duration,
        params.flatten_duration,
        params.pause_between_mountains,
        params.flatten_pause_duration,
    ];
    if durations.iter().any(|d| *d < 0.0) {
        return Err("durations must not be negative".into());
    }
    Ok(())
}

fn validate_strokes(params: &StrokeParams) -> Result<(), String> {
    if params.min_brush_size < 1 || params.max_brush_size < params.min_brush_size {
        return Err(format!(
            "brush size range [{}, {}) is invalid",
            params.min_brush_size, params.max_brush_size
        ));
    }
    if params.min_brush_opacity < 0.0 || params.max_brush_opacity < params.min_brush_opacity {
        return Err("brush opacity range is invalid".into());
    }
    if params.detail_layers < MIN_STROKES {
        return Err(format!("detail_layers must be at least {}", MIN_STROKES));
    }
    if params.max_mountain_height <= 0.0 || params.interval < 0.0 {
        return Err("max_mountain_height must be positive and interval not negative".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::masks::MaskSet;

    #[test]
    fn test_default_config_is_valid() {
        let config = SculptConfig::default();
        assert!(config.validate(&MaskSet::procedural(1, 8, 0)).is_ok());
    }

    #[test]
    fn test_strokes_without_masks_rejected() {
        let config = SculptConfig::default();
        let err = config.validate(&MaskSet::default()).unwrap_err();
        assert!(err.to_string().contains("mask"));

        let no_strokes = SculptConfig {
            strokes: None,
            ..SculptConfig::default()
        };
        assert!(no_strokes.validate(&MaskSet::default()).is_ok());
    }

    #[test]
    fn test_inverted_ranges_rejected() {
        let masks = MaskSet::procedural(1, 8, 0);
        let bad_path = SculptConfig {
            path: Some(PathParams {
                min_width_of_road: 9,
                max_width_of_road: 4,
                ..PathParams::default()
            }),
            ..SculptConfig::default()
        };
        assert!(matches!(bad_path.validate(&masks), Err(SculptError::InvalidConfig(_))));

        let bad_mountains = SculptConfig {
            mountains: Some(MountainParams {
                max_mountain_percentage: 0.0,
                ..MountainParams::default()
            }),
            ..SculptConfig::default()
        };
        assert!(bad_mountains.validate(&masks).is_err());

        let bad_walker = SculptConfig {
            walkers: vec![WalkerParams {
                direction_change_interval: 0.0,
                ..WalkerParams::clamped()
            }],
            ..SculptConfig::default()
        };
        let err = bad_walker.validate(&masks).unwrap_err();
        assert!(err.to_string().contains("walker 0"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "seed": 7,
            "grid_size": 129,
            "walkers": [{ "policy": { "kind": "clamped", "max_sculpt_speed": 0.01, "max_height": 0.8 } }],
            "strokes": null
        }"#;
        let config = SculptConfig::from_json_str(json).unwrap();

        assert_eq!(config.seed, 7);
        assert_eq!(config.grid_size, 129);
        assert_eq!(config.walkers.len(), 1);
        assert_eq!(config.walkers[0].max_brush_size, WalkerParams::default().max_brush_size);
        assert!(matches!(
            config.walkers[0].policy,
            WalkerPolicy::Clamped { max_height, .. } if (max_height - 0.8).abs() < 1e-6
        ));
        assert!(config.strokes.is_none());
        assert_eq!(config.path, Some(PathParams::default()));
    }

    #[test]
    fn test_json_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sculpt.json");
        let config = SculptConfig {
            seed: 99,
            base_amplitude: 1.5,
            ..SculptConfig::default()
        };
        std::fs::write(&path, config.to_json_string().unwrap()).unwrap();

        let loaded = SculptConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let result = SculptConfig::from_json_str("{ not json");
        assert!(matches!(result, Err(SculptError::ConfigParse(_))));
    }
}
