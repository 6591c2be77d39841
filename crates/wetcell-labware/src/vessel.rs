//! Vessel model: volume/capacity/contents bookkeeping and depth geometry.
//!
//! A [`Vessel`] is any liquid container on the deck. Its volume only ever
//! changes through [`Vessel::apply_volume`] (or the mixture-aware variants
//! used by the transfer engine), which check capacity bounds before
//! touching any state. Rejected operations are atomic: volume and contents
//! are left exactly as they were.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use wetcell_hardware::Coordinates;

use crate::{DEFAULT_VOLUME_EPSILON_UL, LabwareError};

/// Decomposition of a liquid volume by solution name (µl per solution).
pub type Mixture = BTreeMap<String, f64>;

/// Clearance kept between the pipette tip and the liquid surface when
/// withdrawing, in mill-frame millimetres.
const TIP_CLEARANCE_MM: f64 = 1.0;

/// What a vessel is for. Routing rules in the transfer engine depend on
/// this (stock reservoirs never receive liquid, waste is never a source
/// for a well, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VesselRole {
    Stock,
    Waste,
    Well,
}

/// Cylindrical vessel geometry in the mill frame.
///
/// `z_bottom` is the z of the inner base; since volumes are in µl (= mm³),
/// the liquid surface sits at `z_bottom + volume / (π·r²)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VesselGeometry {
    pub radius_mm: f64,
    pub z_bottom: f64,
    pub z_top: f64,
    /// Volume the pipette tip cannot reach below, µl.
    pub dead_volume_ul: f64,
}

impl VesselGeometry {
    /// Z of the liquid surface for the given volume, clamped at the base.
    pub fn surface_z(&self, volume_ul: f64) -> f64 {
        let area = PI * self.radius_mm * self.radius_mm;
        let z = self.z_bottom + volume_ul.max(0.0) / area;
        z.max(self.z_bottom)
    }

    /// Z below which the tip would be pulling dead volume.
    pub fn dead_volume_z(&self) -> f64 {
        self.surface_z(self.dead_volume_ul)
    }
}

/// A liquid container with tracked volume, capacity and contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vessel {
    pub name: String,
    pub role: VesselRole,
    volume_ul: f64,
    pub capacity_ul: f64,
    /// Solution density, g/ml. Used for mass verification.
    pub density: f64,
    /// Solution viscosity, cP. Drives the pump correction factor.
    pub viscosity_cp: f64,
    /// Reference point of the vessel mouth in the mill frame.
    pub coordinates: Coordinates,
    pub geometry: VesselGeometry,
    /// Whether the vessel sits on the scale and can be mass-verified.
    pub weighable: bool,
    contents: Mixture,
    contamination: u32,
    epsilon_ul: f64,
}

impl Vessel {
    pub fn new(
        name: impl Into<String>,
        role: VesselRole,
        capacity_ul: f64,
        geometry: VesselGeometry,
        coordinates: Coordinates,
    ) -> Self {
        Self {
            name: name.into(),
            role,
            volume_ul: 0.0,
            capacity_ul,
            density: 1.0,
            viscosity_cp: 1.0,
            coordinates,
            geometry,
            weighable: false,
            contents: Mixture::new(),
            contamination: 0,
            epsilon_ul: DEFAULT_VOLUME_EPSILON_UL,
        }
    }

    /// Stock reservoir pre-filled with a single solution.
    pub fn stock(
        name: impl Into<String>,
        solution: impl Into<String>,
        volume_ul: f64,
        capacity_ul: f64,
        geometry: VesselGeometry,
        coordinates: Coordinates,
    ) -> Self {
        let mut vessel = Self::new(name, VesselRole::Stock, capacity_ul, geometry, coordinates);
        let solution = solution.into();
        vessel.volume_ul = volume_ul.clamp(0.0, capacity_ul);
        vessel.contents.insert(solution, vessel.volume_ul);
        vessel.contamination = 1;
        vessel
    }

    pub fn with_density(mut self, density: f64) -> Self {
        self.density = density;
        self
    }

    pub fn with_viscosity(mut self, viscosity_cp: f64) -> Self {
        self.viscosity_cp = viscosity_cp;
        self
    }

    pub fn with_weighable(mut self, weighable: bool) -> Self {
        self.weighable = weighable;
        self
    }

    // ==================== Read access ====================

    pub fn volume_ul(&self) -> f64 {
        self.volume_ul
    }

    pub fn contents(&self) -> &Mixture {
        &self.contents
    }

    /// Number of distinct solutions this vessel has ever held.
    pub fn contamination_count(&self) -> u32 {
        self.contamination
    }

    /// Z of the current liquid surface.
    pub fn depth(&self) -> f64 {
        self.geometry.surface_z(self.volume_ul)
    }

    /// Z at which the pipette tip should sit to withdraw: just under the
    /// surface, but never into the dead volume.
    pub fn withdrawal_z(&self) -> f64 {
        let below_surface = self.depth() - TIP_CLEARANCE_MM;
        below_surface.max(self.geometry.dead_volume_z())
    }

    /// Volume the pipette can actually pull out (above the dead volume).
    pub fn usable_volume_ul(&self) -> f64 {
        (self.volume_ul - self.geometry.dead_volume_ul).max(0.0)
    }

    /// Free capacity left before overfilling.
    pub fn headroom_ul(&self) -> f64 {
        (self.capacity_ul - self.volume_ul).max(0.0)
    }

    // ==================== Invariant checks ====================

    /// Check that `volume + delta` stays within `[0, capacity]`.
    ///
    /// Pure: mutates nothing. The matching error carries the vessel name
    /// and the offending volumes.
    pub fn check_volume(&self, delta_ul: f64) -> Result<(), LabwareError> {
        let next = self.volume_ul + delta_ul;
        if next > self.capacity_ul + self.epsilon_ul {
            return Err(LabwareError::Overfill {
                vessel: self.name.clone(),
                current: self.volume_ul,
                delta: delta_ul,
                capacity: self.capacity_ul,
            });
        }
        if next < -self.epsilon_ul {
            return Err(LabwareError::Overdraft {
                vessel: self.name.clone(),
                current: self.volume_ul,
                delta: delta_ul,
            });
        }
        Ok(())
    }

    // ==================== Mutation ====================

    /// Apply a signed volume change for a named solution.
    ///
    /// Positive deltas add `solution` to the contents (bumping the
    /// contamination count when the name is new). Negative deltas drain the
    /// current mixture proportionally, so the contents decomposition stays
    /// truthful for mixed wells; `solution` is then audit metadata only.
    pub fn apply_volume(&mut self, delta_ul: f64, solution: &str) -> Result<(), LabwareError> {
        if delta_ul >= 0.0 {
            let mut mixture = Mixture::new();
            mixture.insert(solution.to_string(), delta_ul);
            self.apply_mixture(&mixture)
        } else {
            debug!(vessel = %self.name, solution, "draining {:.3} ul", -delta_ul);
            self.drain(-delta_ul).map(|_| ())
        }
    }

    /// Add a mixture to the vessel. Atomic: the capacity check covers the
    /// whole mixture before any entry is merged.
    pub fn apply_mixture(&mut self, mixture: &Mixture) -> Result<(), LabwareError> {
        let total: f64 = mixture.values().sum();
        self.check_volume(total)?;

        for (solution, &added) in mixture {
            if added <= 0.0 {
                continue;
            }
            let entry = self.contents.entry(solution.clone()).or_insert(0.0);
            if *entry <= self.epsilon_ul {
                self.contamination += 1;
            }
            *entry += added;
        }
        self.volume_ul = (self.volume_ul + total).min(self.capacity_ul);
        info!(
            vessel = %self.name,
            volume_ul = self.volume_ul,
            "added {:.3} ul",
            total
        );
        Ok(())
    }

    /// Remove `volume` µl, split proportionally across the solutions
    /// currently present. Returns the removed composition so the caller
    /// can carry it into the pipette or the destination vessel.
    pub fn drain(&mut self, volume_ul: f64) -> Result<Mixture, LabwareError> {
        self.check_volume(-volume_ul)?;

        let present: f64 = self.contents.values().sum();
        let mut removed = Mixture::new();
        if present > 0.0 {
            let fraction = (volume_ul / present).min(1.0);
            for (solution, held) in self.contents.iter_mut() {
                let out = *held * fraction;
                *held -= out;
                removed.insert(solution.clone(), out);
            }
        }
        self.contents.retain(|_, held| *held > self.epsilon_ul);

        self.volume_ul = (self.volume_ul - volume_ul).max(0.0);
        if self.volume_ul <= self.epsilon_ul {
            self.volume_ul = 0.0;
            self.contents.clear();
        }
        info!(
            vessel = %self.name,
            volume_ul = self.volume_ul,
            "removed {:.3} ul",
            volume_ul
        );
        Ok(removed)
    }
}
