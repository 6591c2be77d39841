//! # Wetcell Hardware Adapter Layer
//!
//! Driver traits for every physical collaborator of the workcell: the
//! 3-axis positioner (mill), the syringe pump, the analytical scale, the
//! potentiostat and the inspection camera.
//!
//! The coordinator core never talks to a serial port or a vendor SDK
//! directly; it consumes these traits. Every call blocks until the device
//! reports completion or fails. Timeouts are the concrete driver's
//! responsibility, not the core's.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(feature = "mock")]
pub mod mock;

// ==================== Frame primitives ====================

/// A point in the mill frame, millimetres.
///
/// `z = 0` is the fully retracted reference height; descending moves go
/// below it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Coordinates {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Translate by a per-tool offset.
    pub fn offset_by(&self, offset: &Coordinates) -> Self {
        Self {
            x: self.x + offset.x,
            y: self.y + offset.y,
            z: self.z + offset.z,
        }
    }
}

/// The interchangeable tools carried by the positioner head.
///
/// Every tool's working tip is physically displaced from the reference
/// `Center` position; the motion layer applies the matching offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    Center,
    Pipette,
    Electrode,
    Lens,
}

impl Tool {
    pub const ALL: [Tool; 4] = [Tool::Center, Tool::Pipette, Tool::Electrode, Tool::Lens];

    pub fn name(&self) -> &'static str {
        match self {
            Tool::Center => "center",
            Tool::Pipette => "pipette",
            Tool::Electrode => "electrode",
            Tool::Lens => "lens",
        }
    }
}

// ==================== Errors ====================

/// Positioner driver failures.
#[derive(Error, Debug)]
pub enum MotionError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    /// The firmware reported an alarm state (e.g. limit switch hit).
    #[error("Positioner alarm: {0}")]
    Alarm(String),

    /// The firmware rejected the command.
    #[error("Command rejected: {0}")]
    Rejected(String),

    #[error("Positioner response timeout")]
    Timeout,
}

/// Syringe pump driver failures.
#[derive(Error, Debug)]
pub enum PumpError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    /// The plunger stalled mid-run.
    #[error("Pump stalled after {dispensed_ml} ml")]
    Stalled { dispensed_ml: f64 },

    #[error("Command rejected: {0}")]
    Rejected(String),

    #[error("Pump response timeout")]
    Timeout,
}

/// Scale driver failures.
#[derive(Error, Debug)]
pub enum ScaleError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    /// The reading never stabilized within the driver's own window.
    #[error("Reading did not stabilize")]
    Unstable,

    #[error("Scale response timeout")]
    Timeout,
}

/// Potentiostat / measurement failures.
#[derive(Error, Debug)]
pub enum CharacterizationError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    /// The measurement started but was aborted by the instrument.
    #[error("Measurement aborted: {0}")]
    Aborted(String),

    #[error("Potentiostat error: {0}")]
    Hardware(String),
}

/// Camera failures. Imaging is diagnostic, so callers typically log and
/// continue.
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Capture failed: {0}")]
    CaptureFailed(String),
}

// ==================== Positioner ====================

/// Absolute-move interface to the mill firmware.
///
/// `move_absolute` blocks until the machine is idle at the target. The
/// driver owns feed rates, buffering and status polling; the core only ever
/// sees completed moves or errors.
pub trait PositionerDriver {
    fn move_absolute(&mut self, target: Coordinates) -> Result<(), MotionError>;

    /// Run the homing cycle. On success the machine sits at the frame
    /// origin.
    fn home(&mut self) -> Result<(), MotionError>;
}

// ==================== Pump ====================

/// Pumping direction of the syringe pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PumpDirection {
    Withdraw,
    Infuse,
}

/// Syringe pump interface. Volumes are in ml and rates in ml/min, the
/// vendor firmware's native units.
///
/// A run is programmed with direction, volume and rate, then executed with
/// [`PumpDriver::run`], which blocks until the plunger finishes.
pub trait PumpDriver {
    fn set_direction(&mut self, direction: PumpDirection) -> Result<(), PumpError>;
    fn set_volume_ml(&mut self, volume_ml: f64) -> Result<(), PumpError>;
    fn set_rate_ml_min(&mut self, rate_ml_min: f64) -> Result<(), PumpError>;

    /// Execute the programmed run; blocks until done.
    fn run(&mut self) -> Result<(), PumpError>;

    /// Cumulative volume withdrawn since the counters were last cleared.
    fn cumulative_withdrawn_ml(&self) -> f64;

    /// Cumulative volume infused since the counters were last cleared.
    fn cumulative_infused_ml(&self) -> f64;

    fn clear_counters(&mut self) -> Result<(), PumpError>;
}

// ==================== Scale ====================

/// Mass-verification scale. `read_mass_g` blocks until the vendor driver
/// reports a stable reading.
pub trait ScaleDriver {
    fn read_mass_g(&mut self) -> Result<f64, ScaleError>;
}

// ==================== Potentiostat ====================

/// Cyclic voltammetry parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvParams {
    pub v_min: f64,
    pub v_max: f64,
    pub scan_rate_mv_s: f64,
    pub cycles: u32,
}

/// Chronoamperometry parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaParams {
    pub potential_v: f64,
    pub duration: Duration,
    pub sample_period: Duration,
}

/// Open-circuit potential parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcpParams {
    pub duration: Duration,
    pub sample_period: Duration,
}

/// Handle to a completed measurement, written by the vendor SDK.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementFile {
    pub technique: String,
    pub path: PathBuf,
}

/// Electrochemical characterization engine (potentiostat vendor SDK).
/// Each call blocks for the duration of the measurement.
pub trait CharacterizationDriver {
    fn run_cv(&mut self, params: &CvParams) -> Result<MeasurementFile, CharacterizationError>;
    fn run_ca(&mut self, params: &CaParams) -> Result<MeasurementFile, CharacterizationError>;
    fn run_ocp(&mut self, params: &OcpParams) -> Result<MeasurementFile, CharacterizationError>;
}

// ==================== Camera ====================

/// Inspection camera above the deck.
pub trait CameraDriver {
    fn capture(&mut self, save_path: &Path) -> Result<(), CameraError>;
}
