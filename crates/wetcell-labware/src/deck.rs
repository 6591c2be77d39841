//! Deck layout: stock rack, waste rack and the loaded wellplate.
//!
//! Stock and waste live in separate fields so a transfer can hold `&mut`
//! borrows of a source and a destination at the same time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;
use wetcell_hardware::Coordinates;

use crate::{LabwareError, Vessel, VesselGeometry, VesselRole};

/// A plate of reaction wells, addressed `A1`, `A2`, ... row-major.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wellplate {
    pub id: String,
    /// Z at which the electrode sits in a well during characterization.
    pub echem_z: f64,
    wells: BTreeMap<String, Vessel>,
}

impl Wellplate {
    /// Lay out a `rows x cols` grid of identical wells. `origin` is the
    /// mouth of well `A1`; wells step by `pitch_mm` in x (columns) and y
    /// (rows).
    pub fn grid(
        id: impl Into<String>,
        rows: u8,
        cols: u8,
        origin: Coordinates,
        pitch_mm: f64,
        capacity_ul: f64,
        geometry: VesselGeometry,
        echem_z: f64,
    ) -> Self {
        let mut wells = BTreeMap::new();
        for row in 0..rows {
            for col in 0..cols {
                let label = format!("{}{}", (b'A' + row) as char, col + 1);
                let mouth = Coordinates::new(
                    origin.x + f64::from(col) * pitch_mm,
                    origin.y + f64::from(row) * pitch_mm,
                    origin.z,
                );
                wells.insert(
                    label.clone(),
                    Vessel::new(label, VesselRole::Well, capacity_ul, geometry, mouth),
                );
            }
        }
        Self {
            id: id.into(),
            echem_z,
            wells,
        }
    }

    pub fn well(&self, id: &str) -> Result<&Vessel, LabwareError> {
        self.wells
            .get(id)
            .ok_or_else(|| LabwareError::UnknownWell(id.to_string()))
    }

    pub fn well_mut(&mut self, id: &str) -> Result<&mut Vessel, LabwareError> {
        self.wells
            .get_mut(id)
            .ok_or_else(|| LabwareError::UnknownWell(id.to_string()))
    }

    pub fn wells(&self) -> impl Iterator<Item = &Vessel> {
        self.wells.values()
    }
}

/// Everything on the workcell deck that holds liquid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deck {
    pub stock: Vec<Vessel>,
    pub waste: Vec<Vessel>,
    pub wellplate: Wellplate,
}

impl Deck {
    pub fn new(stock: Vec<Vessel>, waste: Vec<Vessel>, wellplate: Wellplate) -> Self {
        Self {
            stock,
            waste,
            wellplate,
        }
    }

    /// Index of the first stock reservoir that holds at least `needed_ul`
    /// of `solution` above its dead volume. Reservoirs run down in order,
    /// so depleted ones are skipped automatically.
    pub fn stock_index(&self, solution: &str, needed_ul: f64) -> Result<usize, LabwareError> {
        self.stock
            .iter()
            .position(|vessel| {
                vessel.contents().get(solution).copied().unwrap_or(0.0) > 0.0
                    && vessel.usable_volume_ul() >= needed_ul
            })
            .ok_or_else(|| LabwareError::NoStockAvailable {
                solution: solution.to_string(),
                needed_ul,
            })
    }

    /// Index of the first waste reservoir with headroom for `incoming_ul`.
    pub fn waste_index(&self, incoming_ul: f64) -> Result<usize, LabwareError> {
        self.waste
            .iter()
            .position(|vessel| vessel.headroom_ul() >= incoming_ul)
            .ok_or(LabwareError::NoWasteCapacity {
                needed_ul: incoming_ul,
            })
    }

    /// Swap in a fresh wellplate; all prior well state is discarded.
    pub fn load_wellplate(&mut self, wellplate: Wellplate) {
        info!(plate = %wellplate.id, "wellplate loaded");
        self.wellplate = wellplate;
    }
}
