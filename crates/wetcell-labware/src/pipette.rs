//! Pipette tip model.
//!
//! The pipette is a small vessel attached to the syringe pump line. The
//! transfer engine reserves liquid into it before the pump moves anything,
//! so a capacity violation is caught while the tip is still dry.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{DEFAULT_VOLUME_EPSILON_UL, LabwareError, Mixture};

/// Disposable pipette tip with a held volume and a use counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipette {
    capacity_ul: f64,
    volume_ul: f64,
    contents: Mixture,
    uses: u32,
    epsilon_ul: f64,
}

impl Pipette {
    pub fn new(capacity_ul: f64) -> Self {
        Self {
            capacity_ul,
            volume_ul: 0.0,
            contents: Mixture::new(),
            uses: 0,
            epsilon_ul: DEFAULT_VOLUME_EPSILON_UL,
        }
    }

    pub fn capacity_ul(&self) -> f64 {
        self.capacity_ul
    }

    pub fn volume_ul(&self) -> f64 {
        self.volume_ul
    }

    pub fn contents(&self) -> &Mixture {
        &self.contents
    }

    /// How many withdrawals this tip has performed since the last change.
    pub fn uses(&self) -> u32 {
        self.uses
    }

    /// Check that `delta` µl fits within `[0, capacity]` without mutating.
    pub fn check_volume(&self, delta_ul: f64) -> Result<(), LabwareError> {
        let next = self.volume_ul + delta_ul;
        if next > self.capacity_ul + self.epsilon_ul {
            return Err(LabwareError::Overfill {
                vessel: "pipette".into(),
                current: self.volume_ul,
                delta: delta_ul,
                capacity: self.capacity_ul,
            });
        }
        if next < -self.epsilon_ul {
            return Err(LabwareError::Overdraft {
                vessel: "pipette".into(),
                current: self.volume_ul,
                delta: delta_ul,
            });
        }
        Ok(())
    }

    /// Record a withdrawal of a single solution into the tip. Counts as
    /// one use.
    pub fn reserve_withdraw(&mut self, volume_ul: f64, solution: &str) -> Result<(), LabwareError> {
        let mut mixture = Mixture::new();
        mixture.insert(solution.to_string(), volume_ul);
        self.reserve_withdraw_mixture(&mixture)
    }

    /// Record a withdrawal of an arbitrary mixture (well clearing pulls
    /// whatever composition the well held). Counts as one use.
    pub fn reserve_withdraw_mixture(&mut self, mixture: &Mixture) -> Result<(), LabwareError> {
        let total: f64 = mixture.values().sum();
        self.check_volume(total)?;

        for (solution, &added) in mixture {
            if added <= 0.0 {
                continue;
            }
            *self.contents.entry(solution.clone()).or_insert(0.0) += added;
        }
        self.volume_ul = (self.volume_ul + total).min(self.capacity_ul);
        self.uses += 1;
        info!(volume_ul = self.volume_ul, uses = self.uses, "pipette withdrew {:.3} ul", total);
        Ok(())
    }

    /// Record an infusion out of the tip and return the composition that
    /// left it, split proportionally across what the tip holds.
    pub fn reserve_infuse(&mut self, volume_ul: f64) -> Result<Mixture, LabwareError> {
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
        info!(volume_ul = self.volume_ul, "pipette infused {:.3} ul", volume_ul);
        Ok(removed)
    }

    /// Zero the tip between independent experiments. Not counted as a
    /// use; the use statistics survive for tip-wear tracking.
    pub fn reset(&mut self) {
        self.volume_ul = 0.0;
        self.contents.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_withdrawal_past_capacity_is_rejected() {
        let mut pipette = Pipette::new(200.0);
        pipette.reserve_withdraw(150.0, "water").unwrap();

        let err = pipette.reserve_withdraw(100.0, "water").unwrap_err();
        assert!(matches!(err, LabwareError::Overfill { .. }));
        // First withdrawal persists untouched.
        assert_eq!(pipette.volume_ul(), 150.0);
        assert_eq!(pipette.uses(), 1);
    }

    #[test]
    fn infuse_more_than_held_is_overdraft() {
        let mut pipette = Pipette::new(200.0);
        pipette.reserve_withdraw(50.0, "edot").unwrap();
        assert!(matches!(
            pipette.reserve_infuse(60.0),
            Err(LabwareError::Overdraft { .. })
        ));
        assert_eq!(pipette.volume_ul(), 50.0);
    }

    #[test]
    fn infuse_returns_proportional_composition() {
        let mut pipette = Pipette::new(300.0);
        let mut mixture = Mixture::new();
        mixture.insert("water".into(), 90.0);
        mixture.insert("edot".into(), 30.0);
        pipette.reserve_withdraw_mixture(&mixture).unwrap();

        let out = pipette.reserve_infuse(60.0).unwrap();
        assert!((out["water"] - 45.0).abs() < 1e-9);
        assert!((out["edot"] - 15.0).abs() < 1e-9);
        assert!((pipette.volume_ul() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn full_infuse_empties_the_tip() {
        let mut pipette = Pipette::new(200.0);
        pipette.reserve_withdraw(120.0, "water").unwrap();
        pipette.reserve_infuse(120.0).unwrap();
        assert_eq!(pipette.volume_ul(), 0.0);
        assert!(pipette.contents().is_empty());
    }

    #[test]
    fn reset_zeroes_without_counting_a_use() {
        let mut pipette = Pipette::new(200.0);
        pipette.reserve_withdraw(80.0, "water").unwrap();
        assert_eq!(pipette.uses(), 1);
        pipette.reset();
        assert_eq!(pipette.volume_ul(), 0.0);
        assert!(pipette.contents().is_empty());
        // Statistics survive the reset.
        assert_eq!(pipette.uses(), 1);
    }
}
