use std::{f64::consts::PI, fmt};

use serde::{Deserialize, Serialize};

use crate::{
    error::{RestoreError, Result},
    quantity::Quantity,
};

/// Restoring beam: FWHM of the major and minor axes and the position angle (north through east).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RestoringBeam {
    pub major: Quantity,
    pub minor: Quantity,
    pub pa: Quantity,
}

impl RestoringBeam {
    pub fn new(major: Quantity, minor: Quantity, pa: Quantity) -> Self {
        Self { major, minor, pa }
    }

    /// Fails unless both axes are positive and finite and the position angle is finite.
    pub fn check(&self) -> Result<()> {
        let axes_ok = [self.major.to_deg(), self.minor.to_deg()]
            .iter()
            .all(|&a| a.is_finite() && a > 0.0);
        if axes_ok && self.pa.to_deg().is_finite() {
            Ok(())
        } else {
            Err(RestoreError::InvalidBeam(*self))
        }
    }

    /// Beam solid angle in pixels of the given cell size, i.e. the Jy/pixel to Jy/beam factor.
    pub fn area_in_pixels(&self, cell: &Quantity) -> f64 {
        let cell = cell.to_deg();
        PI / (4.0 * 2_f64.ln()) * self.major.to_deg() * self.minor.to_deg() / cell.powi(2)
    }
}

impl fmt::Display for RestoringBeam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.4}arcsec x {:.4}arcsec pa {:.2}deg",
            self.major.to_arcsec(),
            self.minor.to_arcsec(),
            self.pa.to_deg()
        )
    }
}
