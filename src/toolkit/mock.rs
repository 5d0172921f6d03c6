//! In-memory toolkit that records every call, for checking the restoration procedure.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use ndarray::Array2;

use super::{ImagingRequest, ImagingToolkit};
use crate::{
    beam::RestoringBeam,
    error::{RestoreError, Result},
    expr::Expr,
    image::{Image, ImageHeader, JY_PER_BEAM},
    quantity::Quantity,
};

#[derive(Clone, Debug, PartialEq)]
pub enum ToolkitCall {
    ImportFits { fits: PathBuf, image: PathBuf },
    ExportFits { image: PathBuf, fits: PathBuf, overwrite: bool },
    ImageShape(PathBuf),
    CellSize(PathBuf),
    RestoringBeam(PathBuf),
    SetRestoringBeam { image: PathBuf, beam: RestoringBeam },
    ImageVisibilities(ImagingRequest),
    Convolve2d { image: PathBuf, outfile: PathBuf, beam: RestoringBeam },
    EvaluateExpression {
        images: Vec<PathBuf>,
        expr: String,
        bindings: HashMap<String, f64>,
        outfile: PathBuf,
    },
}

type Imaging = Box<dyn Fn(&ImagingRequest) -> Image>;

/// Images are keyed by path; FITS files and toolkit images share one namespace.
/// Imaging produces a constant-valued image with the configured beam, convolution
/// only attaches the beam so sums can be checked pixel for pixel.
pub struct RecordingToolkit {
    pub images: HashMap<PathBuf, Image>,
    pub calls: Vec<ToolkitCall>,
    imaging: Imaging,
}

impl RecordingToolkit {
    pub fn new(beam: RestoringBeam, residual_value: f64) -> Self {
        Self::with_imaging(Box::new(move |request: &ImagingRequest| {
            let [nx, ny] = request.imsize;
            let mut header = ImageHeader::celestial(nx, ny, request.cell, 0.0, 0.0);
            header.bunit = JY_PER_BEAM.to_string();
            header.beam = Some(beam);
            Image::new(Array2::from_elem((ny, nx), residual_value), header)
        }))
    }

    pub fn with_imaging(imaging: Imaging) -> Self {
        Self {
            images: HashMap::new(),
            calls: Vec::new(),
            imaging,
        }
    }

    pub fn insert<P: Into<PathBuf>>(&mut self, path: P, image: Image) {
        self.images.insert(path.into(), image);
    }

    pub fn image(&self, path: &Path) -> Option<&Image> {
        self.images.get(path)
    }

    fn get(&self, path: &Path) -> Result<&Image> {
        self.images
            .get(path)
            .ok_or_else(|| RestoreError::MissingInput(path.to_path_buf()))
    }

    fn get_mut(&mut self, path: &Path) -> Result<&mut Image> {
        self.images
            .get_mut(path)
            .ok_or_else(|| RestoreError::MissingInput(path.to_path_buf()))
    }

    pub fn imaging_requests(&self) -> Vec<&ImagingRequest> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                ToolkitCall::ImageVisibilities(request) => Some(request),
                _ => None,
            })
            .collect()
    }
}

impl ImagingToolkit for RecordingToolkit {
    fn import_fits(&mut self, fits: &Path, image: &Path) -> Result<()> {
        self.calls.push(ToolkitCall::ImportFits {
            fits: fits.to_path_buf(),
            image: image.to_path_buf(),
        });
        let img = self.get(fits)?.clone();
        self.insert(image, img);
        Ok(())
    }

    fn export_fits(&mut self, image: &Path, fits: &Path, overwrite: bool) -> Result<()> {
        self.calls.push(ToolkitCall::ExportFits {
            image: image.to_path_buf(),
            fits: fits.to_path_buf(),
            overwrite,
        });
        if !overwrite && self.images.contains_key(fits) {
            return Err(RestoreError::OutputExists(fits.to_path_buf()));
        }
        let img = self.get(image)?.clone();
        self.insert(fits, img);
        Ok(())
    }

    fn image_shape(&mut self, image: &Path) -> Result<Vec<usize>> {
        self.calls.push(ToolkitCall::ImageShape(image.to_path_buf()));
        Ok(self.get(image)?.shape())
    }

    fn cell_size(&mut self, image: &Path) -> Result<Quantity> {
        self.calls.push(ToolkitCall::CellSize(image.to_path_buf()));
        Ok(self.get(image)?.header.cell())
    }

    fn restoring_beam(&mut self, image: &Path) -> Result<RestoringBeam> {
        self.calls.push(ToolkitCall::RestoringBeam(image.to_path_buf()));
        self.get(image)?
            .header
            .beam
            .ok_or_else(|| RestoreError::MissingBeam(image.to_path_buf()))
    }

    fn set_restoring_beam(&mut self, image: &Path, beam: &RestoringBeam) -> Result<()> {
        self.calls.push(ToolkitCall::SetRestoringBeam {
            image: image.to_path_buf(),
            beam: *beam,
        });
        self.get_mut(image)?.header.beam = Some(*beam);
        Ok(())
    }

    fn image_visibilities(&mut self, request: &ImagingRequest) -> Result<()> {
        self.calls
            .push(ToolkitCall::ImageVisibilities(request.clone()));
        let image = (self.imaging)(request);
        self.insert(request.image_path(), image);
        Ok(())
    }

    fn convolve2d(&mut self, image: &Path, outfile: &Path, beam: &RestoringBeam) -> Result<()> {
        self.calls.push(ToolkitCall::Convolve2d {
            image: image.to_path_buf(),
            outfile: outfile.to_path_buf(),
            beam: *beam,
        });
        let mut img = self.get(image)?.clone();
        img.header.beam = Some(*beam);
        img.header.bunit = JY_PER_BEAM.to_string();
        self.insert(outfile, img);
        Ok(())
    }

    fn evaluate_expression(
        &mut self,
        images: &[PathBuf],
        expr: &str,
        bindings: &HashMap<String, f64>,
        outfile: &Path,
    ) -> Result<()> {
        self.calls.push(ToolkitCall::EvaluateExpression {
            images: images.to_vec(),
            expr: expr.to_string(),
            bindings: bindings.clone(),
            outfile: outfile.to_path_buf(),
        });
        let inputs = images
            .iter()
            .map(|path| self.get(path))
            .collect::<Result<Vec<_>>>()?;
        let header = inputs
            .first()
            .map(|img| img.header.clone())
            .ok_or_else(|| RestoreError::Expression("no input images".to_string()))?;
        let pixels: Vec<_> = inputs.iter().map(|img| &img.data).collect();
        let data = Expr::parse(expr)?.evaluate(&pixels, bindings)?;
        self.insert(outfile, Image::new(data, header));
        Ok(())
    }
}
