//! # Wetcell Transfer
//!
//! The liquid transfer engine: viscosity-corrected pipetting between deck
//! vessels, with capacity preconditions checked before any physical motion
//! and scale-based mass verification after it.

pub mod config;
pub mod engine;
pub mod error;

pub use config::{CorrectionRow, CorrectionTable, TransferConfig};
pub use engine::{LiquidHandler, TransferReceipt, VolumeDiscrepancy};
pub use error::TransferError;
