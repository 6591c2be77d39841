//! Mock drivers for hardware-free testing.
//!
//! Each mock records the commands it receives and can be armed to fail at a
//! chosen point, so the coordinator's failure paths are testable without a
//! workcell attached.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use crate::{
    CameraDriver, CameraError, CaParams, CharacterizationDriver, CharacterizationError,
    Coordinates, CvParams, MeasurementFile, MotionError, OcpParams, PositionerDriver,
    PumpDirection, PumpDriver, PumpError, ScaleDriver, ScaleError,
};

// ==================== Positioner ====================

/// In-memory positioner that tracks its pose and records every commanded
/// move.
#[derive(Debug, Default)]
pub struct MockPositioner {
    pub pose: Coordinates,
    pub moves: Vec<Coordinates>,
    pub homed: bool,
    /// Fail with an alarm once this many moves have been accepted.
    pub fail_after_moves: Option<usize>,
}

impl MockPositioner {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PositionerDriver for MockPositioner {
    fn move_absolute(&mut self, target: Coordinates) -> Result<(), MotionError> {
        if let Some(limit) = self.fail_after_moves {
            if self.moves.len() >= limit {
                return Err(MotionError::Alarm("injected fault".into()));
            }
        }
        self.pose = target;
        self.moves.push(target);
        Ok(())
    }

    fn home(&mut self) -> Result<(), MotionError> {
        self.pose = Coordinates::default();
        self.homed = true;
        Ok(())
    }
}

// ==================== Pump ====================

/// In-memory syringe pump with cumulative counters.
#[derive(Debug)]
pub struct MockPump {
    direction: PumpDirection,
    volume_ml: f64,
    rate_ml_min: f64,
    withdrawn_ml: f64,
    infused_ml: f64,
    pub runs: usize,
    /// Stall one run once this many runs have completed, then clear.
    pub fail_after_runs: Option<usize>,
}

impl Default for MockPump {
    fn default() -> Self {
        Self {
            direction: PumpDirection::Withdraw,
            volume_ml: 0.0,
            rate_ml_min: 0.0,
            withdrawn_ml: 0.0,
            infused_ml: 0.0,
            runs: 0,
            fail_after_runs: None,
        }
    }
}

impl MockPump {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PumpDriver for MockPump {
    fn set_direction(&mut self, direction: PumpDirection) -> Result<(), PumpError> {
        self.direction = direction;
        Ok(())
    }

    fn set_volume_ml(&mut self, volume_ml: f64) -> Result<(), PumpError> {
        if volume_ml < 0.0 {
            return Err(PumpError::Rejected(format!(
                "negative volume: {volume_ml} ml"
            )));
        }
        self.volume_ml = volume_ml;
        Ok(())
    }

    fn set_rate_ml_min(&mut self, rate_ml_min: f64) -> Result<(), PumpError> {
        if rate_ml_min <= 0.0 {
            return Err(PumpError::Rejected(format!(
                "non-positive rate: {rate_ml_min} ml/min"
            )));
        }
        self.rate_ml_min = rate_ml_min;
        Ok(())
    }

    fn run(&mut self) -> Result<(), PumpError> {
        if let Some(limit) = self.fail_after_runs {
            if self.runs >= limit {
                self.fail_after_runs = None;
                return Err(PumpError::Stalled { dispensed_ml: 0.0 });
            }
        }
        self.runs += 1;
        match self.direction {
            PumpDirection::Withdraw => self.withdrawn_ml += self.volume_ml,
            PumpDirection::Infuse => self.infused_ml += self.volume_ml,
        }
        Ok(())
    }

    fn cumulative_withdrawn_ml(&self) -> f64 {
        self.withdrawn_ml
    }

    fn cumulative_infused_ml(&self) -> f64 {
        self.infused_ml
    }

    fn clear_counters(&mut self) -> Result<(), PumpError> {
        self.withdrawn_ml = 0.0;
        self.infused_ml = 0.0;
        Ok(())
    }
}

// ==================== Scale ====================

/// Scale fed from a script of readings; repeats the last reading once the
/// script is exhausted.
#[derive(Debug, Default)]
pub struct MockScale {
    readings: VecDeque<f64>,
    last: f64,
}

impl MockScale {
    pub fn new(readings: impl IntoIterator<Item = f64>) -> Self {
        Self {
            readings: readings.into_iter().collect(),
            last: 0.0,
        }
    }
}

impl ScaleDriver for MockScale {
    fn read_mass_g(&mut self) -> Result<f64, ScaleError> {
        if let Some(next) = self.readings.pop_front() {
            self.last = next;
        }
        Ok(self.last)
    }
}

// ==================== Potentiostat ====================

/// Potentiostat that returns a synthetic measurement file, or fails when
/// armed.
#[derive(Debug, Default)]
pub struct MockPotentiostat {
    pub fail: bool,
    pub measurements: Vec<String>,
}

impl MockPotentiostat {
    pub fn new() -> Self {
        Self::default()
    }

    fn run(&mut self, technique: &str) -> Result<MeasurementFile, CharacterizationError> {
        if self.fail {
            return Err(CharacterizationError::Aborted("injected fault".into()));
        }
        self.measurements.push(technique.to_string());
        Ok(MeasurementFile {
            technique: technique.to_string(),
            path: PathBuf::from(format!("mock/{technique}.dta")),
        })
    }
}

impl CharacterizationDriver for MockPotentiostat {
    fn run_cv(&mut self, _params: &CvParams) -> Result<MeasurementFile, CharacterizationError> {
        self.run("cv")
    }

    fn run_ca(&mut self, _params: &CaParams) -> Result<MeasurementFile, CharacterizationError> {
        self.run("ca")
    }

    fn run_ocp(&mut self, _params: &OcpParams) -> Result<MeasurementFile, CharacterizationError> {
        self.run("ocp")
    }
}

// ==================== Camera ====================

/// Camera that records capture paths, or fails when armed.
#[derive(Debug, Default)]
pub struct MockCamera {
    pub fail: bool,
    pub captures: Vec<PathBuf>,
}

impl MockCamera {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CameraDriver for MockCamera {
    fn capture(&mut self, save_path: &Path) -> Result<(), CameraError> {
        if self.fail {
            return Err(CameraError::CaptureFailed("injected fault".into()));
        }
        self.captures.push(save_path.to_path_buf());
        Ok(())
    }
}
