//! The liquid transfer engine.
//!
//! [`LiquidHandler`] owns the pipette tip, the pump and the positioner and
//! is the only code path that moves liquid. A transfer is split into two
//! kinds of work with different failure rules:
//!
//! - capacity preconditions, checked before any physical command; failures
//!   here leave every vessel and the pipette untouched,
//! - physical motion and pumping; once a physical command for a repetition
//!   has been issued, the bookkeeping for that repetition is applied even
//!   when the command errors. Liquid cannot be rolled back, so software
//!   state assumes it moved.

use std::time::SystemTime;

use tracing::{info, warn};
use wetcell_hardware::{Coordinates, PumpDirection, PumpDriver, PositionerDriver, ScaleDriver, Tool};
use wetcell_labware::{Pipette, Vessel, VesselRole};
use wetcell_motion::Positioner;

use crate::{TransferConfig, TransferError};

/// Measured-vs-expected mismatch from the scale check. Logged and carried
/// on the receipt, never fatal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeDiscrepancy {
    pub expected_ul: f64,
    pub measured_ul: f64,
    pub tolerance_ul: f64,
}

/// Record of one completed transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferReceipt {
    pub requested_ul: f64,
    pub corrected_ul: f64,
    pub repetitions: u32,
    pub measured_delta_ul: Option<f64>,
    pub discrepancy: Option<VolumeDiscrepancy>,
    pub started: SystemTime,
    pub finished: SystemTime,
}

/// Pipette, pump, scale and positioner bundled behind the transfer API.
pub struct LiquidHandler<M, P> {
    pub positioner: Positioner<M>,
    pump: P,
    scale: Option<Box<dyn ScaleDriver>>,
    pipette: Pipette,
    config: TransferConfig,
}

impl<M: PositionerDriver, P: PumpDriver> LiquidHandler<M, P> {
    pub fn new(positioner: Positioner<M>, pump: P, pipette: Pipette, config: TransferConfig) -> Self {
        Self {
            positioner,
            pump,
            scale: None,
            pipette,
            config,
        }
    }

    pub fn with_scale(mut self, scale: Box<dyn ScaleDriver>) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn pipette(&self) -> &Pipette {
        &self.pipette
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Zero the pipette between independent experiments.
    pub fn reset_pipette(&mut self) {
        self.pipette.reset();
    }

    /// Programmed volume needed to deliver `volume_ul` from this source.
    pub fn corrected_volume(&self, volume_ul: f64, from: &Vessel) -> f64 {
        self.config
            .correction
            .corrected_volume(volume_ul, from.viscosity_cp)
    }

    /// Move `volume_ul` (before viscosity correction) from `from` to `to`
    /// at `rate_ml_min`.
    pub fn transfer(
        &mut self,
        volume_ul: f64,
        from: &mut Vessel,
        to: &mut Vessel,
        rate_ml_min: f64,
    ) -> Result<TransferReceipt, TransferError> {
        let corrected = self.corrected_volume(volume_ul, from);
        self.execute(volume_ul, corrected, from, to, rate_ml_min)
    }

    /// Move the well's entire current volume to a waste vessel. No
    /// viscosity correction: the goal is an empty well, not a dose.
    pub fn clear_well(
        &mut self,
        well: &mut Vessel,
        waste: &mut Vessel,
        rate_ml_min: f64,
    ) -> Result<TransferReceipt, TransferError> {
        let volume = well.volume_ul();
        self.execute(volume, volume, well, waste, rate_ml_min)
    }

    fn execute(
        &mut self,
        requested_ul: f64,
        corrected_ul: f64,
        from: &mut Vessel,
        to: &mut Vessel,
        rate_ml_min: f64,
    ) -> Result<TransferReceipt, TransferError> {
        let started = SystemTime::now();

        if from.role == VesselRole::Waste {
            return Err(TransferError::InvalidRoute {
                from: from.name.clone(),
                to: to.name.clone(),
                reason: "waste is never a source".into(),
            });
        }
        if to.role == VesselRole::Stock {
            return Err(TransferError::InvalidRoute {
                from: from.name.clone(),
                to: to.name.clone(),
                reason: "stock never receives".into(),
            });
        }

        if corrected_ul <= 0.0 {
            return Ok(TransferReceipt {
                requested_ul,
                corrected_ul,
                repetitions: 0,
                measured_delta_ul: None,
                discrepancy: None,
                started,
                finished: SystemTime::now(),
            });
        }

        // Preconditions, strictly before any physical command: source,
        // destination, then pipette.
        from.check_volume(-corrected_ul)?;
        to.check_volume(corrected_ul)?;

        let per_rep_capacity =
            self.pipette.capacity_ul() - self.config.air_gap_ul - self.config.drip_stop_ul;
        let repetitions = (corrected_ul / per_rep_capacity).ceil().max(1.0) as u32;
        let per_rep_ul = corrected_ul / f64::from(repetitions);
        self.pipette.check_volume(per_rep_ul)?;

        info!(
            from = %from.name,
            to = %to.name,
            requested_ul,
            corrected_ul,
            repetitions,
            "transfer start"
        );

        let mass_before = self.weigh(to);

        for rep in 0..repetitions {
            let last = rep + 1 == repetitions;

            // Withdraw. Bookkeeping is applied whether or not the physical
            // commands succeeded.
            let withdrawn =
                self.physical_withdraw(from.coordinates, from.withdrawal_z(), per_rep_ul, rate_ml_min);
            let removed = from.drain(per_rep_ul)?;
            self.pipette.reserve_withdraw_mixture(&removed)?;
            if let Err(err) = withdrawn {
                warn!(%err, "withdraw failed mid-transfer, bookkeeping applied");
                return Err(err);
            }

            // Infuse, same rule.
            let infused = self.physical_infuse(to.coordinates, per_rep_ul, last, rate_ml_min);
            let mixture = self.pipette.reserve_infuse(per_rep_ul)?;
            to.apply_mixture(&mixture)?;
            if let Err(err) = infused {
                warn!(%err, "infuse failed mid-transfer, bookkeeping applied");
                return Err(err);
            }
        }

        // Residue above the bookkeeping epsilon is purged into the
        // destination rather than carried into the next transfer.
        let residue = self.pipette.volume_ul();
        if residue > wetcell_labware::DEFAULT_VOLUME_EPSILON_UL {
            warn!(residue_ul = residue, "purging pipette residue into destination");
            let mixture = self.pipette.reserve_infuse(residue)?;
            to.apply_mixture(&mixture)?;
        }

        let mass_after = self.weigh(to);
        let (measured_delta_ul, discrepancy) =
            self.verify_mass(mass_before, mass_after, corrected_ul, to);

        info!(from = %from.name, to = %to.name, corrected_ul, "transfer complete");
        Ok(TransferReceipt {
            requested_ul,
            corrected_ul,
            repetitions,
            measured_delta_ul,
            discrepancy,
            started,
            finished: SystemTime::now(),
        })
    }

    /// Air gap, dip to withdrawal depth, pull the liquid column, lift and
    /// pull the drip stop.
    fn physical_withdraw(
        &mut self,
        mouth: Coordinates,
        dip_z: f64,
        volume_ul: f64,
        rate_ml_min: f64,
    ) -> Result<(), TransferError> {
        self.positioner.select_tool(Tool::Pipette);
        self.positioner
            .safe_move(Coordinates::new(mouth.x, mouth.y, 0.0))?;
        self.pump_run(PumpDirection::Withdraw, self.config.air_gap_ul, rate_ml_min)?;

        self.positioner
            .safe_move(Coordinates::new(mouth.x, mouth.y, dip_z))?;
        self.pump_run(PumpDirection::Withdraw, volume_ul, rate_ml_min)?;

        self.positioner
            .safe_move(Coordinates::new(mouth.x, mouth.y, 0.0))?;
        self.pump_run(PumpDirection::Withdraw, self.config.drip_stop_ul, rate_ml_min)?;
        Ok(())
    }

    /// Dispense the liquid column plus both air pulls; purge residue after
    /// the final repetition.
    fn physical_infuse(
        &mut self,
        mouth: Coordinates,
        volume_ul: f64,
        purge: bool,
        rate_ml_min: f64,
    ) -> Result<(), TransferError> {
        self.positioner
            .safe_move(Coordinates::new(mouth.x, mouth.y, mouth.z))?;
        let blowout = volume_ul + self.config.air_gap_ul + self.config.drip_stop_ul;
        self.pump_run(PumpDirection::Infuse, blowout, rate_ml_min)?;
        if purge {
            self.pump_run(PumpDirection::Infuse, self.config.purge_ul, rate_ml_min)?;
        }
        Ok(())
    }

    fn pump_run(
        &mut self,
        direction: PumpDirection,
        volume_ul: f64,
        rate_ml_min: f64,
    ) -> Result<(), TransferError> {
        self.pump.set_direction(direction)?;
        self.pump.set_volume_ml(volume_ul / 1000.0)?;
        self.pump.set_rate_ml_min(rate_ml_min)?;
        self.pump.run()?;
        Ok(())
    }

    /// Stable mass of the destination, when it sits on the scale. Scale
    /// trouble downgrades to a warning: verification is diagnostic.
    fn weigh(&mut self, vessel: &Vessel) -> Option<f64> {
        if !vessel.weighable {
            return None;
        }
        let scale = self.scale.as_mut()?;
        match scale.read_mass_g() {
            Ok(grams) => Some(grams),
            Err(err) => {
                warn!(%err, vessel = %vessel.name, "scale read failed, skipping mass check");
                None
            }
        }
    }

    fn verify_mass(
        &self,
        before_g: Option<f64>,
        after_g: Option<f64>,
        expected_ul: f64,
        to: &Vessel,
    ) -> (Option<f64>, Option<VolumeDiscrepancy>) {
        let (Some(before), Some(after)) = (before_g, after_g) else {
            return (None, None);
        };
        let measured_ul = (after - before) / to.density * 1000.0;
        if (measured_ul - expected_ul).abs() > self.config.mass_tolerance_ul {
            warn!(
                vessel = %to.name,
                expected_ul,
                measured_ul,
                "volume discrepancy beyond tolerance"
            );
            let discrepancy = VolumeDiscrepancy {
                expected_ul,
                measured_ul,
                tolerance_ul: self.config.mass_tolerance_ul,
            };
            (Some(measured_ul), Some(discrepancy))
        } else {
            (Some(measured_ul), None)
        }
    }
}
