//! The toolkit: every hardware collaborator an experiment needs, bundled.

use wetcell_hardware::{CameraDriver, CharacterizationDriver};
use wetcell_transfer::LiquidHandler;

/// Hardware handles for one protocol run. The liquid handler owns the
/// positioner, pump, scale and pipette; the potentiostat and camera are
/// consumed directly by the runner.
pub struct Toolkit<M, P> {
    pub liquid: LiquidHandler<M, P>,
    pub potentiostat: Box<dyn CharacterizationDriver>,
    pub camera: Box<dyn CameraDriver>,
}

impl<M, P> Toolkit<M, P> {
    pub fn new(
        liquid: LiquidHandler<M, P>,
        potentiostat: Box<dyn CharacterizationDriver>,
        camera: Box<dyn CameraDriver>,
    ) -> Self {
        Self {
            liquid,
            potentiostat,
            camera,
        }
    }
}
