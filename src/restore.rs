//! The restoration step: model convolved with the restoring beam plus the imaged residual.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use log::{debug, info};

use crate::{
    beam::RestoringBeam,
    error::{RestoreError, Result},
    quantity::{AngleUnit, Quantity},
    toolkit::{ImagingRequest, ImagingToolkit},
    workspace::{RestorePaths, Workspace},
};

pub const SUM_EXPR: &str = "(IM0 + IM1)";
pub const NORMALIZED_SUM_EXPR: &str = "(IM0 * convert_factor + IM1)";
pub const CONVERT_FACTOR: &str = "convert_factor";

#[derive(Clone, Debug, PartialEq)]
pub struct RestoreInputs {
    pub residual_vis: PathBuf,
    pub model_fits: PathBuf,
    /// Name of the restored image, its FITS export is `<restored>.fits`.
    pub restored: PathBuf,
}

impl RestoreInputs {
    pub fn new<P, Q, R>(residual_vis: P, model_fits: Q, restored: R) -> Self
    where
        P: Into<PathBuf>,
        Q: Into<PathBuf>,
        R: Into<PathBuf>,
    {
        Self {
            residual_vis: residual_vis.into(),
            model_fits: model_fits.into(),
            restored: restored.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RestoreOptions {
    pub flux_normalization: bool,
}

/// Pixel count and cell size shared by the model and residual images.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelGeometry {
    pub n: usize,
    pub cell: Quantity,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RestoreOutputs {
    pub paths: RestorePaths,
    pub geometry: PixelGeometry,
    pub beam: RestoringBeam,
    pub removed: Vec<PathBuf>,
}

impl RestoreOutputs {
    pub fn restored_fits(&self) -> &Path {
        &self.paths.restored_fits
    }
}

/// Reads the grid from the model header: pixel count from the first axis, cell size from CDELT2.
pub fn model_geometry<T>(toolkit: &mut T, model: &Path) -> Result<PixelGeometry>
where
    T: ImagingToolkit + ?Sized,
{
    let shape = toolkit.image_shape(model)?;
    let (nx, ny) = match shape.as_slice() {
        [nx, ny, ..] => (*nx, *ny),
        _ => {
            return Err(RestoreError::InvalidHeader {
                path: model.to_path_buf(),
                reason: format!("expected two sky axes, found shape {:?}", shape),
            })
        }
    };
    if nx != ny {
        return Err(RestoreError::NonSquareModel { nx, ny });
    }
    let cell = toolkit.cell_size(model)?.convert(AngleUnit::Arcsec);
    if !(cell.value.is_finite() && cell.value > 0.0) {
        return Err(RestoreError::InvalidHeader {
            path: model.to_path_buf(),
            reason: format!("unusable cell size {}", cell),
        });
    }
    Ok(PixelGeometry { n: nx, cell })
}

fn combination(
    options: &RestoreOptions,
    beam: &RestoringBeam,
    cell: &Quantity,
) -> (&'static str, HashMap<String, f64>) {
    let mut bindings = HashMap::new();
    if options.flux_normalization {
        let factor = beam.area_in_pixels(cell);
        debug!("{} = {}", CONVERT_FACTOR, factor);
        bindings.insert(CONVERT_FACTOR.to_string(), factor);
        (NORMALIZED_SUM_EXPR, bindings)
    } else {
        (SUM_EXPR, bindings)
    }
}

pub fn restore<T>(
    toolkit: &mut T,
    workspace: &Workspace,
    inputs: &RestoreInputs,
    options: &RestoreOptions,
) -> Result<RestoreOutputs>
where
    T: ImagingToolkit + ?Sized,
{
    let paths = workspace.paths(&inputs.residual_vis, &inputs.restored);
    debug!("working in {}", workspace.dir().display());
    let removed = workspace.reset(&paths)?;

    info!("importing model {}", inputs.model_fits.display());
    toolkit.import_fits(&inputs.model_fits, &paths.model_image)?;

    let geometry = model_geometry(toolkit, &paths.model_image)?;
    info!(
        "model grid {} x {} pixels of {}",
        geometry.n, geometry.n, geometry.cell
    );

    info!("imaging residual {}", inputs.residual_vis.display());
    let request = ImagingRequest::residual(
        inputs.residual_vis.clone(),
        paths.residual_prefix.clone(),
        geometry.n,
        geometry.cell,
    );
    toolkit.image_visibilities(&request)?;
    toolkit.export_fits(&paths.residual_image, &paths.residual_fits, true)?;

    let beam = toolkit.restoring_beam(&paths.residual_image)?;
    beam.check()?;
    info!("restoring beam {}", beam);

    toolkit.convolve2d(&paths.model_image, &paths.convolved_image, &beam)?;
    toolkit.export_fits(&paths.convolved_image, &paths.convolved_fits, true)?;
    toolkit.set_restoring_beam(&paths.convolved_fits, &beam)?;

    let (expr, bindings) = combination(options, &beam, &geometry.cell);
    info!("combining into {}", paths.restored_image.display());
    toolkit.evaluate_expression(
        &[paths.convolved_fits.clone(), paths.residual_fits.clone()],
        expr,
        &bindings,
        &paths.restored_image,
    )?;
    toolkit.export_fits(&paths.restored_image, &paths.restored_fits, true)?;
    info!("wrote {}", paths.restored_fits.display());

    Ok(RestoreOutputs {
        paths,
        geometry,
        beam,
        removed,
    })
}
