//! Transfer engine tuning.
//!
//! The correction table compensates for viscosity-dependent pump under- or
//! over-delivery. Curves are fitted empirically per solution class, so the
//! whole table is injectable configuration rather than code.

use serde::{Deserialize, Serialize};

/// One fitted correction curve: for liquids near `viscosity_cp`, the pump
/// must be programmed with `slope * v + intercept` to deliver `v` µl.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrectionRow {
    pub viscosity_cp: f64,
    pub slope: f64,
    pub intercept: f64,
}

/// Piecewise correction lookup keyed by viscosity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionTable {
    pub rows: Vec<CorrectionRow>,
    /// A row only applies when the liquid's viscosity is within this
    /// distance of the row's. Liquids with no row in range pass through
    /// uncorrected.
    pub viscosity_window_cp: f64,
}

impl CorrectionTable {
    /// Programmed volume needed to actually deliver `volume_ul` of a
    /// liquid with the given viscosity.
    pub fn corrected_volume(&self, volume_ul: f64, viscosity_cp: f64) -> f64 {
        let row = self
            .rows
            .iter()
            .map(|row| (row, (row.viscosity_cp - viscosity_cp).abs()))
            .filter(|(_, distance)| *distance <= self.viscosity_window_cp)
            .min_by(|(_, a), (_, b)| a.total_cmp(b));
        match row {
            Some((row, _)) => row.slope * volume_ul + row.intercept,
            None => volume_ul,
        }
    }
}

/// Pipetting parameters of the transfer engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Air pulled before the liquid column, µl. Keeps the column off the
    /// syringe line.
    pub air_gap_ul: f64,
    /// Air pulled after lifting out of the source, µl. Stops dripping in
    /// transit.
    pub drip_stop_ul: f64,
    /// Extra air pushed after the final dispense to purge residue, µl.
    pub purge_ul: f64,
    /// Mass-verification tolerance, µl equivalent.
    pub mass_tolerance_ul: f64,
    pub correction: CorrectionTable,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            air_gap_ul: 20.0,
            drip_stop_ul: 10.0,
            purge_ul: 15.0,
            mass_tolerance_ul: 5.0,
            correction: CorrectionTable::default(),
        }
    }
}
