//! End-to-end protocol runs against mock hardware.

use std::collections::BTreeMap;
use std::time::Duration;

use wetcell_hardware::mock::{MockCamera, MockPositioner, MockPotentiostat, MockPump};
use wetcell_hardware::{Coordinates, OcpParams};
use wetcell_labware::{Deck, Pipette, Vessel, VesselGeometry, VesselRole, Wellplate};
use wetcell_motion::{MotionConfig, Positioner};
use wetcell_protocol::{Experiment, ExperimentStatus, ProtocolError, Technique, Toolkit, run};
use wetcell_transfer::{LiquidHandler, TransferConfig};

fn geometry() -> VesselGeometry {
    VesselGeometry {
        radius_mm: 3.0,
        z_bottom: -40.0,
        z_top: -10.0,
        dead_volume_ul: 50.0,
    }
}

fn reservoir_geometry() -> VesselGeometry {
    VesselGeometry {
        radius_mm: 14.0,
        z_bottom: -40.0,
        z_top: 0.0,
        dead_volume_ul: 500.0,
    }
}

fn deck() -> Deck {
    let stock_water = Vessel::stock(
        "stock_water",
        "water",
        18000.0,
        20000.0,
        reservoir_geometry(),
        Coordinates::new(60.0, 50.0, 0.0),
    );
    let stock_edot = Vessel::stock(
        "stock_edot",
        "edot",
        500.0,
        20000.0,
        reservoir_geometry(),
        Coordinates::new(60.0, 70.0, 0.0),
    );
    let waste = Vessel::new(
        "waste_1",
        VesselRole::Waste,
        50000.0,
        reservoir_geometry(),
        Coordinates::new(70.0, 30.0, 0.0),
    );
    let plate = Wellplate::grid(
        "plate-1",
        2,
        3,
        Coordinates::new(100.0, 80.0, 0.0),
        9.0,
        300.0,
        geometry(),
        -35.0,
    );
    Deck::new(vec![stock_water, stock_edot], vec![waste], plate)
}

fn toolkit() -> Toolkit<MockPositioner, MockPump> {
    let positioner = Positioner::new(MockPositioner::new(), MotionConfig::default()).unwrap();
    let liquid = LiquidHandler::new(
        positioner,
        MockPump::new(),
        Pipette::new(200.0),
        TransferConfig::default(),
    );
    Toolkit::new(
        liquid,
        Box::new(MockPotentiostat::new()),
        Box::new(MockCamera::new()),
    )
}

fn experiment(solutions: BTreeMap<String, f64>) -> Experiment {
    let mut exp = Experiment::new(
        "exp-1",
        "B2",
        solutions,
        0.5,
        Technique::Ocp(OcpParams {
            duration: Duration::from_secs(30),
            sample_period: Duration::from_millis(100),
        }),
    );
    exp.set_status(ExperimentStatus::Queued).unwrap();
    exp
}

#[test]
fn full_run_completes_and_clears_the_well() {
    let mut deck = deck();
    let mut toolkit = toolkit();
    let mut exp = experiment(BTreeMap::from([("water".to_string(), 120.0)]));

    let outcome = run(&mut exp, &mut toolkit, &mut deck).unwrap();

    assert_eq!(outcome.status, ExperimentStatus::Complete);
    assert!(outcome.failure.is_none());
    assert_eq!(outcome.receipts.len(), 2); // deposit + clear
    assert_eq!(outcome.measurement.as_ref().unwrap().technique, "ocp");

    assert!((deck.stock[0].volume_ul() - 17880.0).abs() < 1e-9);
    assert_eq!(deck.wellplate.well("B2").unwrap().volume_ul(), 0.0);
    assert!((deck.waste[0].volume_ul() - 120.0).abs() < 1e-9);

    // Pipette reset between experiments; use statistics survive.
    assert_eq!(toolkit.liquid.pipette().volume_ul(), 0.0);
    assert_eq!(toolkit.liquid.pipette().uses(), 2);

    assert_eq!(exp.solutions_corrected["water"], 120.0);
    let visited: Vec<_> = exp.status_history().iter().map(|(s, _)| *s).collect();
    assert_eq!(
        visited,
        vec![
            ExperimentStatus::New,
            ExperimentStatus::Queued,
            ExperimentStatus::Imaging,
            ExperimentStatus::Depositing,
            ExperimentStatus::Characterizing,
            ExperimentStatus::Erinsing,
            ExperimentStatus::Clearing,
            ExperimentStatus::Complete,
        ]
    );
}

#[test]
fn imaging_parks_the_lens_over_the_well_before_capture() {
    let mut deck = deck();
    let mut toolkit = toolkit();
    let mut exp = experiment(BTreeMap::from([("water".to_string(), 120.0)]));

    run(&mut exp, &mut toolkit, &mut deck).unwrap();

    // First commanded move of the run: well B2 at (109, 89) shifted by
    // the lens offset (0, +32), at retract height.
    let moves = &toolkit.liquid.positioner.driver().moves;
    assert_eq!(moves[0], Coordinates::new(109.0, 121.0, 0.0));
}

#[test]
fn errored_experiment_does_not_poison_the_next_run() {
    let mut deck = deck();
    // The air-gap draw succeeds, the liquid draw stalls.
    let mut pump = MockPump::new();
    pump.fail_after_runs = Some(1);
    let positioner = Positioner::new(MockPositioner::new(), MotionConfig::default()).unwrap();
    let liquid = LiquidHandler::new(positioner, pump, Pipette::new(200.0), TransferConfig::default());
    let mut toolkit = Toolkit::new(
        liquid,
        Box::new(MockPotentiostat::new()),
        Box::new(MockCamera::new()),
    );

    let mut first = experiment(BTreeMap::from([("water".to_string(), 120.0)]));
    let outcome = run(&mut first, &mut toolkit, &mut deck).unwrap();
    assert_eq!(outcome.status, ExperimentStatus::Error);
    assert_eq!(outcome.failure.unwrap().step, ExperimentStatus::Depositing);

    // The tip was zeroed on the error path.
    assert_eq!(toolkit.liquid.pipette().volume_ul(), 0.0);

    // Same toolkit, fresh experiment: the stale booking must not trip the
    // pipette capacity check.
    let mut second = Experiment::new(
        "exp-2",
        "A1",
        BTreeMap::from([("water".to_string(), 120.0)]),
        0.5,
        Technique::Ocp(OcpParams {
            duration: Duration::from_secs(30),
            sample_period: Duration::from_millis(100),
        }),
    );
    second.set_status(ExperimentStatus::Queued).unwrap();

    let outcome = run(&mut second, &mut toolkit, &mut deck).unwrap();
    assert_eq!(outcome.status, ExperimentStatus::Complete);
    assert_eq!(deck.wellplate.well("A1").unwrap().volume_ul(), 0.0);
    assert!((deck.waste[0].volume_ul() - 120.0).abs() < 1e-9);
}

#[test]
fn camera_failure_is_not_fatal() {
    let mut deck = deck();
    let mut toolkit = toolkit();
    let mut camera = MockCamera::new();
    camera.fail = true;
    toolkit.camera = Box::new(camera);

    let mut exp = experiment(BTreeMap::from([("water".to_string(), 100.0)]));
    let outcome = run(&mut exp, &mut toolkit, &mut deck).unwrap();
    assert_eq!(outcome.status, ExperimentStatus::Complete);
}

#[test]
fn characterization_failure_still_rinses_exactly_once() {
    let mut deck = deck();
    let mut toolkit = toolkit();
    let mut potentiostat = MockPotentiostat::new();
    potentiostat.fail = true;
    toolkit.potentiostat = Box::new(potentiostat);

    let mut exp = experiment(BTreeMap::from([("water".to_string(), 120.0)]));
    let outcome = run(&mut exp, &mut toolkit, &mut deck).unwrap();

    assert_eq!(outcome.status, ExperimentStatus::Error);
    let failure = outcome.failure.unwrap();
    assert_eq!(failure.step, ExperimentStatus::Characterizing);
    assert!(failure.message.contains("aborted") || failure.message.contains("Aborted"));
    assert!(outcome.measurement.is_none());

    // The rinse ran exactly once: one dip per configured cycle, no more.
    let config = toolkit.liquid.positioner.config().clone();
    let dips = toolkit
        .liquid
        .positioner
        .driver()
        .moves
        .iter()
        .filter(|m| m.z == config.rinse_z)
        .count();
    assert_eq!(dips as u32, config.rinse_cycles);

    // Clearing never ran: the well still holds its deposit.
    assert!((deck.wellplate.well("B2").unwrap().volume_ul() - 120.0).abs() < 1e-9);
}

#[test]
fn failed_deposit_aborts_remaining_deposits() {
    let mut deck = deck();
    let mut toolkit = toolkit();
    // Stock only has 500 ul of edot (450 usable); water would be next in
    // iteration order but must never be attempted.
    let mut exp = experiment(BTreeMap::from([
        ("edot".to_string(), 800.0),
        ("water".to_string(), 100.0),
    ]));

    let outcome = run(&mut exp, &mut toolkit, &mut deck).unwrap();
    assert_eq!(outcome.status, ExperimentStatus::Error);
    assert_eq!(outcome.failure.unwrap().step, ExperimentStatus::Depositing);

    // Water stock untouched, well left as-is for the scheduler.
    assert!((deck.stock[0].volume_ul() - 18000.0).abs() < 1e-9);
    assert_eq!(deck.wellplate.well("B2").unwrap().volume_ul(), 0.0);
    assert!(exp.solutions_corrected.is_empty());
}

#[test]
fn running_an_unqueued_experiment_is_a_programmer_error() {
    let mut deck = deck();
    let mut toolkit = toolkit();
    let mut exp = Experiment::new(
        "exp-2",
        "A1",
        BTreeMap::from([("water".to_string(), 50.0)]),
        0.5,
        Technique::Ocp(OcpParams {
            duration: Duration::from_secs(5),
            sample_period: Duration::from_millis(100),
        }),
    );

    let err = run(&mut exp, &mut toolkit, &mut deck).unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidExperimentState { .. }));
}
