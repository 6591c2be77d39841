//! # Wetcell Labware
//!
//! Volume bookkeeping for everything on the deck that can hold liquid:
//! stock reservoirs, waste reservoirs, reaction wells and the pipette tip.
//!
//! The invariants enforced here are the load-bearing part of the whole
//! coordinator:
//!
//! - a vessel's volume never leaves `[0, capacity]`,
//! - a vessel's `contents` map always sums to its volume,
//! - the pipette's held volume never exceeds its physical capacity.
//!
//! Any operation that would violate one of these is rejected *before* any
//! state is mutated; callers decide how to recover. All mutation goes
//! through the single mutators in [`vessel`] and [`pipette`]; there is no
//! direct field access from other crates.

pub mod deck;
pub mod error;
pub mod pipette;
pub mod vessel;

pub use deck::{Deck, Wellplate};
pub use error::LabwareError;
pub use pipette::Pipette;
pub use vessel::{Mixture, Vessel, VesselGeometry, VesselRole};

/// Volumes smaller than this (µl) are treated as residue and discarded
/// when draining contents entries.
pub const DEFAULT_VOLUME_EPSILON_UL: f64 = 1e-3;
