//! # Wetcell Motion
//!
//! Safe-motion layer between the coordinator and the positioner driver:
//! pose tracking, per-tool offsets, working-volume bounds and the
//! retract-before-horizontal-travel rule.

pub mod config;
pub mod positioner;

pub use config::{ConfigError, MotionConfig, WorkingVolume};
pub use positioner::{PositionError, Positioner, requires_retract};
