//! # Wetcell Protocol
//!
//! The experiment state machine: one queued experiment is driven through
//! imaging, deposition, characterization, electrode rinse and well
//! clearing, with cleanup guaranteed whatever the measurement outcome.

pub mod error;
pub mod experiment;
pub mod runner;
pub mod toolkit;

pub use error::ProtocolError;
pub use experiment::{Experiment, ExperimentStatus, Technique};
pub use runner::{ExperimentOutcome, StepFailure, run};
pub use toolkit::Toolkit;
