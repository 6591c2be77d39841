//! Transfer engine errors.

use thiserror::Error;
use wetcell_hardware::PumpError;
use wetcell_labware::LabwareError;
use wetcell_motion::PositionError;

#[derive(Error, Debug)]
pub enum TransferError {
    /// Capacity precondition failed. Raised before any physical motion,
    /// so all vessel and pipette state is unchanged.
    #[error(transparent)]
    Labware(#[from] LabwareError),

    #[error(transparent)]
    Motion(#[from] PositionError),

    #[error(transparent)]
    Pump(#[from] PumpError),

    /// The source/destination role combination is never legal (waste is
    /// never a source, stock never receives).
    #[error("invalid route {from} -> {to}: {reason}")]
    InvalidRoute {
        from: String,
        to: String,
        reason: String,
    },
}
