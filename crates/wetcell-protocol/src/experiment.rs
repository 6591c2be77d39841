//! Experiment record and its status state machine.
//!
//! Status transitions are validated here; the runner in [`crate::runner`]
//! is the only code that advances them during execution. The external
//! scheduler owns `NEW -> QUEUED` and persists every transition.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tracing::debug;
use wetcell_hardware::{CaParams, CvParams, OcpParams};

use crate::ProtocolError;

/// Lifecycle states of one experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    New,
    Queued,
    Imaging,
    Depositing,
    Characterizing,
    Erinsing,
    Clearing,
    Complete,
    Error,
}

impl ExperimentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    /// The single legal successor in the happy path, if any.
    fn next_in_sequence(self) -> Option<Self> {
        match self {
            Self::New => Some(Self::Queued),
            Self::Queued => Some(Self::Imaging),
            Self::Imaging => Some(Self::Depositing),
            Self::Depositing => Some(Self::Characterizing),
            Self::Characterizing => Some(Self::Erinsing),
            Self::Erinsing => Some(Self::Clearing),
            Self::Clearing => Some(Self::Complete),
            Self::Complete | Self::Error => None,
        }
    }

    /// Whether `next` is a legal transition target. `Error` is reachable
    /// from any non-terminal state.
    pub fn can_transition_to(self, next: Self) -> bool {
        if next == Self::Error {
            return !self.is_terminal();
        }
        self.next_in_sequence() == Some(next)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Queued => "queued",
            Self::Imaging => "imaging",
            Self::Depositing => "depositing",
            Self::Characterizing => "characterizing",
            Self::Erinsing => "erinsing",
            Self::Clearing => "clearing",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which electrochemical measurement the experiment runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Technique {
    Cv(CvParams),
    Ca(CaParams),
    Ocp(OcpParams),
}

/// One protocol execution, created by the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub id: String,
    pub well_id: String,
    /// Requested dose per solution, µl, deposited in map iteration order.
    pub solutions: BTreeMap<String, f64>,
    /// Viscosity-corrected doses, filled in during deposition.
    pub solutions_corrected: BTreeMap<String, f64>,
    pub pumping_rate_ml_min: f64,
    pub technique: Technique,
    /// Directory the pre-experiment image is saved under.
    pub image_dir: PathBuf,
    status: ExperimentStatus,
    status_history: Vec<(ExperimentStatus, SystemTime)>,
}

impl Experiment {
    pub fn new(
        id: impl Into<String>,
        well_id: impl Into<String>,
        solutions: BTreeMap<String, f64>,
        pumping_rate_ml_min: f64,
        technique: Technique,
    ) -> Self {
        let now = SystemTime::now();
        Self {
            id: id.into(),
            well_id: well_id.into(),
            solutions,
            solutions_corrected: BTreeMap::new(),
            pumping_rate_ml_min,
            technique,
            image_dir: PathBuf::from("images"),
            status: ExperimentStatus::New,
            status_history: vec![(ExperimentStatus::New, now)],
        }
    }

    pub fn status(&self) -> ExperimentStatus {
        self.status
    }

    /// Every status the experiment has held, with when it entered it.
    pub fn status_history(&self) -> &[(ExperimentStatus, SystemTime)] {
        &self.status_history
    }

    /// Advance to `next`, rejecting anything the state machine does not
    /// allow. Out-of-sequence calls are programmer errors, not recoverable
    /// operational failures.
    pub fn set_status(&mut self, next: ExperimentStatus) -> Result<(), ProtocolError> {
        if !self.status.can_transition_to(next) {
            return Err(ProtocolError::InvalidExperimentState {
                id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        debug!(experiment = %self.id, from = %self.status, to = %next, "status transition");
        self.status = next;
        self.status_history.push((next, SystemTime::now()));
        Ok(())
    }
}
