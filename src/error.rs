use std::path::PathBuf;

use thiserror::Error;

use crate::beam::RestoringBeam;

/// Errors raised while restoring a model image.
#[derive(Error, Debug)]
pub enum RestoreError {
    #[error("FITS I/O error: {0}")]
    Fits(#[from] fitsio::errors::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// An input file or image does not exist.
    #[error("input not found: {}", .0.display())]
    MissingInput(PathBuf),

    /// An export target exists and overwriting was not requested.
    #[error("output already exists: {}", .0.display())]
    OutputExists(PathBuf),

    #[error("invalid image header in {}: {reason}", .path.display())]
    InvalidHeader { path: PathBuf, reason: String },

    #[error("image has no restoring beam: {}", .0.display())]
    MissingBeam(PathBuf),

    /// Major or minor axis is zero, negative or not finite, e.g. after a failed PSF fit.
    #[error("degenerate restoring beam: {0}")]
    InvalidBeam(RestoringBeam),

    /// The imaged residual is not on the requested grid.
    #[error("cell size mismatch: expected {expected_arcsec}arcsec, found {found_arcsec}arcsec")]
    CellMismatch {
        expected_arcsec: f64,
        found_arcsec: f64,
    },

    #[error("image shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// The model grid cannot be reproduced as a square `imsize`.
    #[error("model image is not square: {nx}x{ny} pixels")]
    NonSquareModel { nx: usize, ny: usize },

    #[error("cannot parse quantity '{0}'")]
    Quantity(String),

    #[error("unknown angular unit '{0}'")]
    UnknownUnit(String),

    #[error("image expression error: {0}")]
    Expression(String),

    #[error("external imager failed: {0}")]
    Imager(String),
}

pub type Result<T> = std::result::Result<T, RestoreError>;
