//! Motion safety configuration.
//!
//! Loaded from a TOML file at startup; every field has a conservative
//! default so a missing file still yields a usable (if cautious) setup.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use wetcell_hardware::{Coordinates, Tool};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Axis-aligned working volume the head may occupy, mill frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkingVolume {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    pub z_min: f64,
    pub z_max: f64,
}

impl Default for WorkingVolume {
    fn default() -> Self {
        Self {
            x_min: 0.0,
            x_max: 300.0,
            y_min: 0.0,
            y_max: 200.0,
            z_min: -60.0,
            z_max: 0.0,
        }
    }
}

impl WorkingVolume {
    pub fn contains(&self, point: &Coordinates) -> bool {
        point.x >= self.x_min
            && point.x <= self.x_max
            && point.y >= self.y_min
            && point.y <= self.y_max
            && point.z >= self.z_min
            && point.z <= self.z_max
    }
}

/// Safety parameters of the motion layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Horizontal travel while `z` is numerically below this floor must
    /// retract to `z = 0` first.
    pub safe_height_floor: f64,
    pub working_volume: WorkingVolume,
    /// Displacement of each tool's working tip from the reference center
    /// position, keyed by tool name. Tools not listed use a zero offset.
    pub tool_offsets: BTreeMap<String, Coordinates>,
    /// Mouth of the electrode rinse bath.
    pub rinse_bath: Coordinates,
    /// Dip depth inside the rinse bath.
    pub rinse_z: f64,
    pub rinse_cycles: u32,
    /// Storage bath where the electrode rests between experiments.
    pub rest_bath: Coordinates,
    /// Soak depth in the storage bath.
    pub rest_z: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        let mut tool_offsets = BTreeMap::new();
        tool_offsets.insert(Tool::Center.name().to_string(), Coordinates::default());
        tool_offsets.insert(Tool::Pipette.name().to_string(), Coordinates::new(-38.0, 0.0, 0.0));
        tool_offsets.insert(Tool::Electrode.name().to_string(), Coordinates::new(38.0, 0.0, 0.0));
        tool_offsets.insert(Tool::Lens.name().to_string(), Coordinates::new(0.0, 32.0, 0.0));
        Self {
            safe_height_floor: -5.0,
            working_volume: WorkingVolume::default(),
            tool_offsets,
            rinse_bath: Coordinates::new(250.0, 40.0, 0.0),
            rinse_z: -30.0,
            rinse_cycles: 3,
            rest_bath: Coordinates::new(250.0, 80.0, 0.0),
            rest_z: -25.0,
        }
    }
}

impl MotionConfig {
    /// Load from a TOML file, falling back to defaults when the file does
    /// not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!(path = %path.display(), "motion config not found, using defaults");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)?;
        info!(path = %path.display(), "motion config loaded");
        Ok(config)
    }

    /// Offset for `tool`, zero when unconfigured.
    pub fn offset_for(&self, tool: Tool) -> Coordinates {
        self.tool_offsets.get(tool.name()).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn defaults_keep_zero_inside_the_volume() {
        let config = MotionConfig::default();
        assert!(config.working_volume.contains(&Coordinates::default()));
        assert_eq!(config.offset_for(Tool::Center), Coordinates::default());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = MotionConfig::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, MotionConfig::default());
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("motion.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "safe_height_floor = -12.5").unwrap();
        writeln!(file, "rinse_cycles = 5").unwrap();

        let config = MotionConfig::load(&path).unwrap();
        assert_eq!(config.safe_height_floor, -12.5);
        assert_eq!(config.rinse_cycles, 5);
        assert_eq!(config.working_volume, WorkingVolume::default());
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = MotionConfig::default();
        let raw = toml::to_string(&config).unwrap();
        let back: MotionConfig = toml::from_str(&raw).unwrap();
        assert_eq!(back, config);
    }
}
