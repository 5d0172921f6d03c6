//! The imaging-toolkit seam.
//!
//! The restoration procedure only ever talks to an [`ImagingToolkit`]: FITS conversion, header
//! queries, visibility imaging and image arithmetic. [`NativeToolkit`] does the work on disk,
//! [`RecordingToolkit`] keeps everything in memory and logs each call.

pub mod mock;
pub mod native;

use std::{
    collections::HashMap,
    ffi::OsString,
    path::{Path, PathBuf},
};

use crate::{beam::RestoringBeam, error::Result, quantity::Quantity};

pub use self::{
    mock::{RecordingToolkit, ToolkitCall},
    native::NativeToolkit,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Weighting {
    Natural,
    Uniform,
    Briggs { robust: f64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stokes {
    I,
    Q,
    U,
    V,
}

impl Stokes {
    pub fn name(self) -> &'static str {
        match self {
            Stokes::I => "I",
            Stokes::Q => "Q",
            Stokes::U => "U",
            Stokes::V => "V",
        }
    }
}

/// Multi-frequency synthesis is the only mode used for continuum restoration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImagingMode {
    Mfs,
}

impl ImagingMode {
    pub fn name(self) -> &'static str {
        match self {
            ImagingMode::Mfs => "mfs",
        }
    }
}

pub const RESIDUAL_WEIGHTING: Weighting = Weighting::Briggs { robust: 0.0 };
pub const RESIDUAL_STOKES: Stokes = Stokes::I;
pub const RESIDUAL_NITER: u32 = 0;

#[derive(Clone, Debug, PartialEq)]
pub struct ImagingRequest {
    pub vis: PathBuf,
    pub imagename: PathBuf,
    pub mode: ImagingMode,
    pub niter: u32,
    pub stokes: Stokes,
    pub weighting: Weighting,
    pub imsize: [usize; 2],
    pub cell: Quantity,
}

impl ImagingRequest {
    /// Zero-iteration, briggs-weighted Stokes I image at `n` x `n` pixels of `cell`.
    pub fn residual(vis: PathBuf, imagename: PathBuf, n: usize, cell: Quantity) -> Self {
        Self {
            vis,
            imagename,
            mode: ImagingMode::Mfs,
            niter: RESIDUAL_NITER,
            stokes: RESIDUAL_STOKES,
            weighting: RESIDUAL_WEIGHTING,
            imsize: [n, n],
            cell,
        }
    }

    /// Where the imaged result is stored: `<imagename>.image`.
    pub fn image_path(&self) -> PathBuf {
        with_suffix(&self.imagename, ".image")
    }
}

/// Appends `suffix` to the final path component, e.g. `obs.ms` -> `obs.ms.img`.
pub fn with_suffix<P: AsRef<Path>>(path: P, suffix: &str) -> PathBuf {
    let mut s: OsString = path.as_ref().as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

pub trait ImagingToolkit {
    /// Converts a FITS image into a toolkit image at `image`.
    fn import_fits(&mut self, fits: &Path, image: &Path) -> Result<()>;

    fn export_fits(&mut self, image: &Path, fits: &Path, overwrite: bool) -> Result<()>;

    /// Image shape, x axis first.
    fn image_shape(&mut self, image: &Path) -> Result<Vec<usize>>;

    /// Pixel size along the second axis (CDELT2).
    fn cell_size(&mut self, image: &Path) -> Result<Quantity>;

    fn restoring_beam(&mut self, image: &Path) -> Result<RestoringBeam>;

    fn set_restoring_beam(&mut self, image: &Path, beam: &RestoringBeam) -> Result<()>;

    /// Images a visibility set, writing [`ImagingRequest::image_path`] with a restoring beam.
    fn image_visibilities(&mut self, request: &ImagingRequest) -> Result<()>;

    /// Convolves the two sky axes of `image` with the beam's Gaussian into `outfile`.
    fn convolve2d(&mut self, image: &Path, outfile: &Path, beam: &RestoringBeam) -> Result<()>;

    /// Evaluates `expr` over `images` (`IM0`, `IM1`, ...) and writes the result to `outfile`.
    fn evaluate_expression(
        &mut self,
        images: &[PathBuf],
        expr: &str,
        bindings: &HashMap<String, f64>,
        outfile: &Path,
    ) -> Result<()>;
}
