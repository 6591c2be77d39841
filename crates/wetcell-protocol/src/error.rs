//! Protocol layer errors.

use thiserror::Error;
use wetcell_hardware::{CameraError, CharacterizationError};
use wetcell_labware::LabwareError;
use wetcell_motion::PositionError;
use wetcell_transfer::TransferError;

use crate::ExperimentStatus;

#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The state machine was asked for an illegal transition. Programmer
    /// error: the runner drives statuses strictly in sequence.
    #[error("experiment {id}: illegal status transition {from} -> {to}")]
    InvalidExperimentState {
        id: String,
        from: ExperimentStatus,
        to: ExperimentStatus,
    },

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Labware(#[from] LabwareError),

    #[error(transparent)]
    Motion(#[from] PositionError),

    #[error(transparent)]
    Characterization(#[from] CharacterizationError),

    #[error(transparent)]
    Camera(#[from] CameraError),
}
