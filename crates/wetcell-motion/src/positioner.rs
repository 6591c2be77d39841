//! Safe-motion wrapper over the positioner driver.
//!
//! All coordinated motion goes through [`Positioner::safe_move`], which
//! applies the active tool's offset, validates the target against the
//! working volume and decides whether to retract to `z = 0` before any
//! horizontal travel.

use thiserror::Error;
use tracing::{debug, info};
use wetcell_hardware::{Coordinates, MotionError, PositionerDriver, Tool};

use crate::MotionConfig;

#[derive(Error, Debug)]
pub enum PositionError {
    #[error(transparent)]
    Driver(#[from] MotionError),

    /// The offset-adjusted target falls outside the configured working
    /// volume. Raised before any driver command is issued.
    #[error("target ({x:.2}, {y:.2}, {z:.2}) outside the working volume")]
    OutOfBounds { x: f64, y: f64, z: f64 },
}

/// Whether a move from `current_z` to `target_z` must retract to `z = 0`
/// before travelling horizontally.
///
/// Direct moves are safe when the head is already at the reference height,
/// when the destination height matches the current one, when the move is a
/// pure vertical, or when the head sits at or above the safety floor (the
/// floor margin is assumed sufficient to clear deck obstacles).
pub fn requires_retract(current_z: f64, target_z: f64, z_only: bool, floor: f64) -> bool {
    current_z != 0.0 && current_z != target_z && !z_only && current_z < floor
}

/// Positioner with pose tracking and safe-move sequencing.
pub struct Positioner<D> {
    driver: D,
    config: MotionConfig,
    pose: Coordinates,
    active_tool: Tool,
}

impl<D: PositionerDriver> Positioner<D> {
    /// Wrap a driver. The machine is homed so pose tracking starts from a
    /// known origin.
    pub fn new(mut driver: D, config: MotionConfig) -> Result<Self, PositionError> {
        driver.home()?;
        Ok(Self {
            driver,
            config,
            pose: Coordinates::default(),
            active_tool: Tool::Center,
        })
    }

    pub fn pose(&self) -> Coordinates {
        self.pose
    }

    pub fn active_tool(&self) -> Tool {
        self.active_tool
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// Access the wrapped driver (mock inspection, vendor escape hatch).
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Change which tool's offset future moves apply. Does not move the
    /// machine.
    pub fn select_tool(&mut self, tool: Tool) {
        if tool != self.active_tool {
            debug!(tool = tool.name(), "tool selected");
            self.active_tool = tool;
        }
    }

    /// Move the active tool's tip to the logical `target`, retracting
    /// first when the safety rule demands it.
    pub fn safe_move(&mut self, target: Coordinates) -> Result<(), PositionError> {
        let offset = self.config.offset_for(self.active_tool);
        let machine = target.offset_by(&offset);

        if !self.config.working_volume.contains(&machine) {
            return Err(PositionError::OutOfBounds {
                x: machine.x,
                y: machine.y,
                z: machine.z,
            });
        }

        let z_only = machine.x == self.pose.x && machine.y == self.pose.y;
        if requires_retract(
            self.pose.z,
            machine.z,
            z_only,
            self.config.safe_height_floor,
        ) {
            debug!(
                from_z = self.pose.z,
                to_z = machine.z,
                "retracting before horizontal travel"
            );
            self.issue(Coordinates::new(self.pose.x, self.pose.y, 0.0))?;
            self.issue(Coordinates::new(machine.x, machine.y, 0.0))?;
            self.issue(machine)?;
        } else {
            self.issue(machine)?;
        }

        info!(
            tool = self.active_tool.name(),
            x = target.x,
            y = target.y,
            z = target.z,
            "move complete"
        );
        Ok(())
    }

    /// Re-home the machine and reset the tracked pose.
    pub fn home(&mut self) -> Result<(), PositionError> {
        self.driver.home()?;
        self.pose = Coordinates::default();
        Ok(())
    }

    /// Dip the electrode in the rinse bath the configured number of times.
    pub fn rinse_electrode(&mut self) -> Result<(), PositionError> {
        self.select_tool(Tool::Electrode);
        let bath = self.config.rinse_bath;
        let rinse_z = self.config.rinse_z;
        let cycles = self.config.rinse_cycles;
        info!(cycles, "rinsing electrode");

        self.safe_move(Coordinates::new(bath.x, bath.y, 0.0))?;
        for _ in 0..cycles {
            self.safe_move(Coordinates::new(bath.x, bath.y, rinse_z))?;
            self.safe_move(Coordinates::new(bath.x, bath.y, 0.0))?;
        }
        Ok(())
    }

    /// Park the electrode in its storage bath.
    pub fn rest_electrode(&mut self) -> Result<(), PositionError> {
        self.select_tool(Tool::Electrode);
        let bath = self.config.rest_bath;
        let rest_z = self.config.rest_z;
        info!("resting electrode");
        self.safe_move(Coordinates::new(bath.x, bath.y, rest_z))
    }

    fn issue(&mut self, target: Coordinates) -> Result<(), PositionError> {
        self.driver.move_absolute(target)?;
        self.pose = target;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wetcell_hardware::mock::MockPositioner;

    fn config() -> MotionConfig {
        let mut config = MotionConfig::default();
        // Symmetric volume so the truth-table scenarios (positive z) fit.
        config.working_volume.z_min = -60.0;
        config.working_volume.z_max = 60.0;
        config
    }

    #[test]
    fn retract_rule_truth_table() {
        let floor = 10.0;
        // Mid-travel below the floor with a different destination height.
        assert!(requires_retract(5.0, 7.0, false, floor));
        // Destination height matches the current height.
        assert!(!requires_retract(7.0, 7.0, false, floor));
        // Already at the reference height.
        assert!(!requires_retract(0.0, 7.0, false, floor));
        // Pure vertical move.
        assert!(!requires_retract(5.0, 7.0, true, floor));
        // At or above the floor, direct move allowed.
        assert!(!requires_retract(12.0, 7.0, false, floor));
    }

    #[test]
    fn deep_horizontal_move_retracts_first() {
        let mut positioner = Positioner::new(MockPositioner::new(), config()).unwrap();
        positioner
            .safe_move(Coordinates::new(10.0, 10.0, -30.0))
            .unwrap();
        let before = positioner.driver.moves.len();

        positioner
            .safe_move(Coordinates::new(50.0, 10.0, -20.0))
            .unwrap();
        let issued = &positioner.driver.moves[before..];
        assert_eq!(issued.len(), 3);
        assert_eq!(issued[0], Coordinates::new(10.0, 10.0, 0.0));
        assert_eq!(issued[1], Coordinates::new(50.0, 10.0, 0.0));
        assert_eq!(issued[2], Coordinates::new(50.0, 10.0, -20.0));
    }

    #[test]
    fn shallow_horizontal_move_goes_direct() {
        let mut positioner = Positioner::new(MockPositioner::new(), config()).unwrap();
        positioner
            .safe_move(Coordinates::new(10.0, 10.0, -2.0))
            .unwrap();
        let before = positioner.driver.moves.len();

        // -2 is above the -5 floor.
        positioner
            .safe_move(Coordinates::new(50.0, 10.0, -3.0))
            .unwrap();
        assert_eq!(positioner.driver.moves.len() - before, 1);
    }

    #[test]
    fn vertical_move_never_retracts() {
        let mut positioner = Positioner::new(MockPositioner::new(), config()).unwrap();
        positioner
            .safe_move(Coordinates::new(10.0, 10.0, -30.0))
            .unwrap();
        let before = positioner.driver.moves.len();

        positioner
            .safe_move(Coordinates::new(10.0, 10.0, -10.0))
            .unwrap();
        assert_eq!(positioner.driver.moves.len() - before, 1);
    }

    #[test]
    fn tool_offset_shifts_machine_target() {
        let mut positioner = Positioner::new(MockPositioner::new(), config()).unwrap();
        positioner.select_tool(Tool::Electrode);
        positioner
            .safe_move(Coordinates::new(100.0, 50.0, -10.0))
            .unwrap();
        // Electrode offset is +38 mm in x.
        assert_eq!(positioner.pose(), Coordinates::new(138.0, 50.0, -10.0));
    }

    #[test]
    fn selecting_a_tool_does_not_move() {
        let mut positioner = Positioner::new(MockPositioner::new(), config()).unwrap();
        let before = positioner.driver.moves.len();
        positioner.select_tool(Tool::Lens);
        assert_eq!(positioner.driver.moves.len(), before);
    }

    #[test]
    fn out_of_bounds_rejected_before_any_motion() {
        let mut positioner = Positioner::new(MockPositioner::new(), config()).unwrap();
        let before = positioner.driver.moves.len();
        let err = positioner
            .safe_move(Coordinates::new(1000.0, 0.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, PositionError::OutOfBounds { .. }));
        assert_eq!(positioner.driver.moves.len(), before);
        assert_eq!(positioner.pose(), Coordinates::default());
    }

    #[test]
    fn rinse_dips_the_configured_number_of_times() {
        let mut positioner = Positioner::new(MockPositioner::new(), config()).unwrap();
        positioner.rinse_electrode().unwrap();

        let rinse_z = positioner.config().rinse_z;
        let dips = positioner
            .driver
            .moves
            .iter()
            .filter(|m| m.z == rinse_z)
            .count();
        assert_eq!(dips as u32, positioner.config().rinse_cycles);
        assert_eq!(positioner.active_tool(), Tool::Electrode);
    }
}
