//! Drives one experiment through its protocol sequence.
//!
//! Operational failures (capacity, drivers) never escape as `Err`: the
//! experiment is moved to `Error` and reported in the outcome, cleanup
//! included. The only `Err` this module returns is an illegal status
//! transition, which means the caller invoked the protocol out of
//! sequence.

use tracing::{error, info, warn};
use wetcell_hardware::{Coordinates, MeasurementFile, PositionerDriver, PumpDriver, Tool};
use wetcell_labware::Deck;
use wetcell_transfer::TransferReceipt;

use crate::{Experiment, ExperimentStatus, ProtocolError, Technique, Toolkit};

/// Which step failed and the underlying driver/vessel error text, for
/// operator diagnosis.
#[derive(Debug, Clone)]
pub struct StepFailure {
    pub step: ExperimentStatus,
    pub message: String,
}

/// Result of one protocol run.
#[derive(Debug)]
pub struct ExperimentOutcome {
    pub experiment_id: String,
    pub status: ExperimentStatus,
    pub receipts: Vec<TransferReceipt>,
    pub measurement: Option<MeasurementFile>,
    pub failure: Option<StepFailure>,
}

/// Execute a queued experiment end to end: image, deposit, characterize,
/// rinse, clear, complete.
pub fn run<M: PositionerDriver, P: PumpDriver>(
    experiment: &mut Experiment,
    toolkit: &mut Toolkit<M, P>,
    deck: &mut Deck,
) -> Result<ExperimentOutcome, ProtocolError> {
    let mut receipts = Vec::new();
    info!(experiment = %experiment.id, well = %experiment.well_id, "experiment start");

    // Imaging is diagnostic; a camera or positioning fault never stops
    // the run.
    experiment.set_status(ExperimentStatus::Imaging)?;
    if let Err(err) = image_well(experiment, toolkit, deck) {
        warn!(experiment = %experiment.id, %err, "pre-experiment image failed, continuing");
    }

    // Deposits run in solution iteration order; the first failure aborts
    // the rest and leaves the well as-is for the scheduler to route.
    experiment.set_status(ExperimentStatus::Depositing)?;
    let solutions: Vec<(String, f64)> = experiment
        .solutions
        .iter()
        .map(|(name, volume)| (name.clone(), *volume))
        .collect();
    for (solution, volume) in solutions {
        if let Err(err) = deposit(experiment, toolkit, deck, &solution, volume, &mut receipts) {
            return fail(experiment, toolkit, ExperimentStatus::Depositing, err, receipts, None);
        }
    }

    // Characterization and rinse are sequenced so the rinse runs whatever
    // the measurement outcome: the electrode must never stay dirty.
    experiment.set_status(ExperimentStatus::Characterizing)?;
    let measured = characterize(experiment, toolkit, deck);

    experiment.set_status(ExperimentStatus::Erinsing)?;
    let rinsed = toolkit
        .liquid
        .positioner
        .rinse_electrode()
        .and_then(|()| toolkit.liquid.positioner.rest_electrode());

    let measurement = match measured {
        Ok(file) => file,
        Err(err) => {
            return fail(
                experiment,
                toolkit,
                ExperimentStatus::Characterizing,
                err,
                receipts,
                None,
            );
        }
    };
    if let Err(err) = rinsed {
        return fail(
            experiment,
            toolkit,
            ExperimentStatus::Erinsing,
            err.into(),
            receipts,
            Some(measurement),
        );
    }

    experiment.set_status(ExperimentStatus::Clearing)?;
    if let Err(err) = clear(experiment, toolkit, deck, &mut receipts) {
        return fail(
            experiment,
            toolkit,
            ExperimentStatus::Clearing,
            err,
            receipts,
            Some(measurement),
        );
    }

    toolkit.liquid.reset_pipette();
    experiment.set_status(ExperimentStatus::Complete)?;
    info!(experiment = %experiment.id, "experiment complete");
    Ok(ExperimentOutcome {
        experiment_id: experiment.id.clone(),
        status: ExperimentStatus::Complete,
        receipts,
        measurement: Some(measurement),
        failure: None,
    })
}

/// Park the lens over the well and capture the pre-experiment image.
fn image_well<M: PositionerDriver, P: PumpDriver>(
    experiment: &Experiment,
    toolkit: &mut Toolkit<M, P>,
    deck: &Deck,
) -> Result<(), ProtocolError> {
    let well = deck.wellplate.well(&experiment.well_id)?;
    toolkit.liquid.positioner.select_tool(Tool::Lens);
    toolkit.liquid.positioner.safe_move(Coordinates::new(
        well.coordinates.x,
        well.coordinates.y,
        0.0,
    ))?;

    let image_path = experiment.image_dir.join(format!("{}.png", experiment.id));
    toolkit.camera.capture(&image_path)?;
    Ok(())
}

fn deposit<M: PositionerDriver, P: PumpDriver>(
    experiment: &mut Experiment,
    toolkit: &mut Toolkit<M, P>,
    deck: &mut Deck,
    solution: &str,
    volume_ul: f64,
    receipts: &mut Vec<TransferReceipt>,
) -> Result<(), ProtocolError> {
    let index = deck.stock_index(solution, volume_ul)?;
    let from = &mut deck.stock[index];
    let to = deck.wellplate.well_mut(&experiment.well_id)?;

    let receipt = toolkit
        .liquid
        .transfer(volume_ul, from, to, experiment.pumping_rate_ml_min)?;
    experiment
        .solutions_corrected
        .insert(solution.to_string(), receipt.corrected_ul);
    receipts.push(receipt);
    Ok(())
}

fn characterize<M: PositionerDriver, P: PumpDriver>(
    experiment: &Experiment,
    toolkit: &mut Toolkit<M, P>,
    deck: &Deck,
) -> Result<MeasurementFile, ProtocolError> {
    let well = deck.wellplate.well(&experiment.well_id)?;
    toolkit.liquid.positioner.select_tool(Tool::Electrode);
    toolkit.liquid.positioner.safe_move(Coordinates::new(
        well.coordinates.x,
        well.coordinates.y,
        deck.wellplate.echem_z,
    ))?;

    let file = match &experiment.technique {
        Technique::Cv(params) => toolkit.potentiostat.run_cv(params)?,
        Technique::Ca(params) => toolkit.potentiostat.run_ca(params)?,
        Technique::Ocp(params) => toolkit.potentiostat.run_ocp(params)?,
    };
    Ok(file)
}

fn clear<M: PositionerDriver, P: PumpDriver>(
    experiment: &Experiment,
    toolkit: &mut Toolkit<M, P>,
    deck: &mut Deck,
    receipts: &mut Vec<TransferReceipt>,
) -> Result<(), ProtocolError> {
    let volume = deck.wellplate.well(&experiment.well_id)?.volume_ul();
    if volume <= 0.0 {
        return Ok(());
    }
    let index = deck.waste_index(volume)?;
    let well = deck.wellplate.well_mut(&experiment.well_id)?;
    let waste = &mut deck.waste[index];

    let receipt = toolkit
        .liquid
        .clear_well(well, waste, experiment.pumping_rate_ml_min)?;
    receipts.push(receipt);
    Ok(())
}

fn fail<M: PositionerDriver, P: PumpDriver>(
    experiment: &mut Experiment,
    toolkit: &mut Toolkit<M, P>,
    step: ExperimentStatus,
    err: ProtocolError,
    receipts: Vec<TransferReceipt>,
    measurement: Option<MeasurementFile>,
) -> Result<ExperimentOutcome, ProtocolError> {
    error!(experiment = %experiment.id, step = %step, %err, "experiment failed");
    // The tip is zeroed on every terminal path, so one errored run never
    // leaves booked volume that poisons the next experiment's
    // preconditions.
    toolkit.liquid.reset_pipette();
    experiment.set_status(ExperimentStatus::Error)?;
    Ok(ExperimentOutcome {
        experiment_id: experiment.id.clone(),
        status: ExperimentStatus::Error,
        receipts,
        measurement,
        failure: Some(StepFailure {
            step,
            message: err.to_string(),
        }),
    })
}
