//! Two-dimensional sky images and the files they live in.
//!
//! Pixels are held as `Array2<f64>` indexed `(y, x)`, rows in FITS order (row 0 is `y = 1`).
//! Degenerate frequency and Stokes axes are not represented.

pub mod fits;
pub mod store;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::{beam::RestoringBeam, quantity::Quantity};

pub use self::{
    fits::{read_fits_image, write_fits_image},
    store::{is_native_image, load_image, read_native_image, save_image, write_native_image, ImageHandle},
};

pub const JY_PER_PIXEL: &str = "Jy/pixel";
pub const JY_PER_BEAM: &str = "Jy/beam";

/// One celestial axis of the image, FITS conventions (1-based reference pixel, degrees).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub ctype: String,
    pub crpix: f64,
    pub crval: f64,
    pub cdelt: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageHeader {
    pub axes: [Axis; 2],
    #[serde(default)]
    pub bunit: String,
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub beam: Option<RestoringBeam>,
}

impl ImageHeader {
    /// A SIN-projected header centred on `(ra, dec)` with square pixels of `cell`.
    pub fn celestial(nx: usize, ny: usize, cell: Quantity, ra_deg: f64, dec_deg: f64) -> Self {
        let cell = cell.to_deg();
        Self {
            axes: [
                Axis {
                    ctype: "RA---SIN".to_string(),
                    crpix: (nx / 2 + 1) as f64,
                    crval: ra_deg,
                    cdelt: -cell,
                },
                Axis {
                    ctype: "DEC--SIN".to_string(),
                    crpix: (ny / 2 + 1) as f64,
                    crval: dec_deg,
                    cdelt: cell,
                },
            ],
            bunit: JY_PER_PIXEL.to_string(),
            object: None,
            beam: None,
        }
    }

    /// CDELT2 as a quantity; this is the value imaging cell sizes are taken from.
    pub fn cell(&self) -> Quantity {
        Quantity::deg(self.axes[1].cdelt.abs())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    pub data: Array2<f64>,
    pub header: ImageHeader,
}

impl Image {
    pub fn new(data: Array2<f64>, header: ImageHeader) -> Self {
        Self { data, header }
    }

    pub fn nx(&self) -> usize {
        self.data.ncols()
    }

    pub fn ny(&self) -> usize {
        self.data.nrows()
    }

    /// Shape in axis order (x first), as image headers report it.
    pub fn shape(&self) -> Vec<usize> {
        vec![self.nx(), self.ny()]
    }
}
