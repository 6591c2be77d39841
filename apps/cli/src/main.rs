//! # Wetcell CLI
//!
//! Dry-runs the coordinator against mock hardware: lays out a demo deck,
//! queues one experiment and drives it through the full protocol. Useful
//! for exercising deck layouts and dose plans before touching the real
//! workcell.
//!
//! ```bash
//! wetcell-cli run --well B2 --solution water=120 --solution edot=30
//! wetcell-cli config --motion-config wetcell.toml
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use wetcell_hardware::mock::{MockCamera, MockPositioner, MockPotentiostat, MockPump, MockScale};
use wetcell_hardware::{Coordinates, OcpParams};
use wetcell_labware::{Deck, Pipette, Vessel, VesselGeometry, VesselRole, Wellplate};
use wetcell_motion::{MotionConfig, Positioner};
use wetcell_protocol::{Experiment, ExperimentStatus, Technique, Toolkit, run};
use wetcell_transfer::{LiquidHandler, TransferConfig};

#[derive(Parser, Debug)]
#[command(name = "wetcell-cli")]
#[command(about = "Liquid-handling workcell coordinator, mock dry-run", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Dry-run one experiment on a demo deck with mock hardware
    Run {
        /// Target well, e.g. B2
        #[arg(short, long, default_value = "A1")]
        well: String,

        /// Dose as NAME=MICROLITERS; repeatable
        #[arg(short, long = "solution", value_name = "NAME=UL")]
        solutions: Vec<String>,

        /// Pump rate, ml/min
        #[arg(short, long, default_value_t = 0.5)]
        rate: f64,

        /// Motion config TOML; defaults apply when absent
        #[arg(long)]
        motion_config: Option<PathBuf>,
    },

    /// Load the motion config and print the effective values
    Config {
        #[arg(long)]
        motion_config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            well,
            solutions,
            rate,
            motion_config,
        } => {
            let doses = parse_doses(&solutions)?;
            let config = load_motion_config(motion_config.as_deref())?;
            run_demo(&well, doses, rate, config)
        }
        Commands::Config { motion_config } => {
            let config = load_motion_config(motion_config.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn load_motion_config(path: Option<&Path>) -> Result<MotionConfig> {
    match path {
        Some(path) => MotionConfig::load(path)
            .with_context(|| format!("loading motion config from {}", path.display())),
        None => Ok(MotionConfig::default()),
    }
}

/// Parse `name=microliters` dose arguments.
fn parse_doses(args: &[String]) -> Result<BTreeMap<String, f64>> {
    if args.is_empty() {
        bail!("at least one --solution NAME=UL is required");
    }
    let mut doses = BTreeMap::new();
    for arg in args {
        let Some((name, volume)) = arg.split_once('=') else {
            bail!("malformed dose {arg:?}, expected NAME=UL");
        };
        let volume: f64 = volume
            .parse()
            .with_context(|| format!("dose volume in {arg:?}"))?;
        if volume <= 0.0 {
            bail!("dose volume must be positive in {arg:?}");
        }
        doses.insert(name.to_string(), volume);
    }
    Ok(doses)
}

/// One 20 ml reservoir per requested solution, a shared waste bottle and a
/// 4x6 wellplate.
fn demo_deck(doses: &BTreeMap<String, f64>) -> Deck {
    let reservoir = VesselGeometry {
        radius_mm: 14.0,
        z_bottom: -40.0,
        z_top: 0.0,
        dead_volume_ul: 500.0,
    };
    let well = VesselGeometry {
        radius_mm: 3.0,
        z_bottom: -40.0,
        z_top: -10.0,
        dead_volume_ul: 50.0,
    };

    let stock = doses
        .keys()
        .enumerate()
        .map(|(i, name)| {
            Vessel::stock(
                format!("stock_{name}"),
                name.clone(),
                18000.0,
                20000.0,
                reservoir,
                Coordinates::new(50.0, 30.0 + 35.0 * i as f64, 0.0),
            )
        })
        .collect();
    let waste = vec![Vessel::new(
        "waste_1",
        VesselRole::Waste,
        50000.0,
        reservoir,
        Coordinates::new(50.0, 150.0, 0.0),
    )];
    let plate = Wellplate::grid(
        "demo-plate",
        4,
        6,
        Coordinates::new(110.0, 60.0, 0.0),
        9.0,
        300.0,
        well,
        -35.0,
    );
    Deck::new(stock, waste, plate)
}

fn run_demo(
    well: &str,
    doses: BTreeMap<String, f64>,
    rate: f64,
    config: MotionConfig,
) -> Result<()> {
    tracing::info!(well, rate, "starting mock dry-run");
    let mut deck = demo_deck(&doses);

    let positioner = Positioner::new(MockPositioner::new(), config)?;
    let liquid = LiquidHandler::new(
        positioner,
        MockPump::new(),
        Pipette::new(200.0),
        TransferConfig::default(),
    )
    .with_scale(Box::new(MockScale::new([0.0])));
    let mut toolkit = Toolkit::new(
        liquid,
        Box::new(MockPotentiostat::new()),
        Box::new(MockCamera::new()),
    );

    let mut experiment = Experiment::new(
        "demo",
        well,
        doses,
        rate,
        Technique::Ocp(OcpParams {
            duration: Duration::from_secs(30),
            sample_period: Duration::from_millis(100),
        }),
    );
    experiment.set_status(ExperimentStatus::Queued)?;

    let outcome = run(&mut experiment, &mut toolkit, &mut deck)?;

    println!("experiment {} finished: {}", outcome.experiment_id, outcome.status);
    for receipt in &outcome.receipts {
        println!(
            "  transfer: requested {:.1} ul, programmed {:.1} ul, {} repetition(s)",
            receipt.requested_ul, receipt.corrected_ul, receipt.repetitions
        );
    }
    if let Some(measurement) = &outcome.measurement {
        println!(
            "  measurement: {} -> {}",
            measurement.technique,
            measurement.path.display()
        );
    }
    if let Some(failure) = &outcome.failure {
        println!("  failed during {}: {}", failure.step, failure.message);
    }
    for (status, _) in experiment.status_history() {
        print!(" {status}");
    }
    println!();

    if outcome.status == ExperimentStatus::Error {
        bail!("experiment ended in error");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doses_parse_and_validate() {
        let doses =
            parse_doses(&["water=120".to_string(), "edot=30.5".to_string()]).unwrap();
        assert_eq!(doses["water"], 120.0);
        assert_eq!(doses["edot"], 30.5);

        assert!(parse_doses(&[]).is_err());
        assert!(parse_doses(&["water".to_string()]).is_err());
        assert!(parse_doses(&["water=-5".to_string()]).is_err());
    }

    #[test]
    fn demo_deck_has_a_reservoir_per_solution() {
        let doses = BTreeMap::from([("water".to_string(), 100.0), ("edot".to_string(), 20.0)]);
        let deck = demo_deck(&doses);
        assert_eq!(deck.stock.len(), 2);
        assert!(deck.stock_index("water", 100.0).is_ok());
        assert!(deck.wellplate.well("D6").is_ok());
    }
}
