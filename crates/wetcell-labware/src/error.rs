//! Labware error types.
//!
//! Capacity violations are always detected before mutation, so every error
//! here is recoverable: the offending vessel and volumes are carried for
//! the caller (and the operator log) to act on.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LabwareError {
    /// Adding `delta` µl would push the vessel past its capacity.
    #[error("{vessel} would overfill: {current:.3} + {delta:.3} > {capacity:.3} ul")]
    Overfill {
        vessel: String,
        current: f64,
        delta: f64,
        capacity: f64,
    },

    /// Removing `|delta|` µl would drain the vessel below empty.
    #[error("{vessel} would overdraft: {current:.3} {delta:+.3} < 0 ul")]
    Overdraft {
        vessel: String,
        current: f64,
        delta: f64,
    },

    /// No stock reservoir holds enough usable volume of the solution.
    #[error("no stock vessel holds {needed_ul:.3} ul of {solution}")]
    NoStockAvailable { solution: String, needed_ul: f64 },

    /// Every waste reservoir is too full to take the incoming volume.
    #[error("no waste vessel has {needed_ul:.3} ul of headroom")]
    NoWasteCapacity { needed_ul: f64 },

    #[error("unknown well {0}")]
    UnknownWell(String),
}
