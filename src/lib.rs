//! Restoration of CLEAN model images: the model is convolved with the restoring beam of the
//! imaged residual and the two are summed into the restored image.

pub mod beam;
pub mod config;
pub mod convolve;
pub mod error;
pub mod expr;
pub mod fft;
pub mod image;
pub mod imager;
pub mod parser;
pub mod quantity;
pub mod restore;
pub mod toolkit;
pub mod workspace;

pub use crate::{
    beam::RestoringBeam,
    config::RestoreCfg,
    error::{RestoreError, Result},
    image::{Image, ImageHeader},
    quantity::{AngleUnit, Quantity},
    restore::{restore, RestoreInputs, RestoreOptions, RestoreOutputs},
    toolkit::{ImagingToolkit, NativeToolkit, RecordingToolkit},
    workspace::{IntermediateNames, Workspace},
};
