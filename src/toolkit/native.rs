use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use log::{debug, info};

use super::{ImagingRequest, ImagingToolkit};
use crate::{
    beam::RestoringBeam,
    convolve::convolve_image,
    error::{RestoreError, Result},
    expr::Expr,
    image::{read_fits_image, write_fits_image, write_native_image, Image, ImageHandle},
    imager::{ExternalImager, ImagerCfg},
    quantity::Quantity,
};

/// Relative difference allowed between the requested and the imaged cell size; FITS keys
/// only carry a limited number of digits.
const CELL_TOLERANCE: f64 = 1e-6;

/// Toolkit backed by native image directories, FITS files and an external imager.
pub struct NativeToolkit {
    imager: ExternalImager,
}

impl NativeToolkit {
    pub fn new(imager: ImagerCfg) -> Self {
        Self {
            imager: ExternalImager::new(imager),
        }
    }

    pub fn imager(&self) -> &ExternalImager {
        &self.imager
    }
}

impl Default for NativeToolkit {
    fn default() -> Self {
        Self::new(ImagerCfg::default())
    }
}

impl ImagingToolkit for NativeToolkit {
    fn import_fits(&mut self, fits: &Path, image: &Path) -> Result<()> {
        info!("importing {} as {}", fits.display(), image.display());
        let img = read_fits_image(fits)?;
        write_native_image(image, &img)
    }

    fn export_fits(&mut self, image: &Path, fits: &Path, overwrite: bool) -> Result<()> {
        if fits.exists() && !overwrite {
            return Err(RestoreError::OutputExists(fits.to_path_buf()));
        }
        info!("exporting {} to {}", image.display(), fits.display());
        let handle = ImageHandle::open(image)?;
        write_fits_image(fits, handle.image())?;
        handle.done()
    }

    fn image_shape(&mut self, image: &Path) -> Result<Vec<usize>> {
        let handle = ImageHandle::open(image)?;
        let shape = handle.image().shape();
        handle.done()?;
        Ok(shape)
    }

    fn cell_size(&mut self, image: &Path) -> Result<Quantity> {
        let handle = ImageHandle::open(image)?;
        let cell = handle.image().header.cell();
        handle.done()?;
        Ok(cell)
    }

    fn restoring_beam(&mut self, image: &Path) -> Result<RestoringBeam> {
        let handle = ImageHandle::open(image)?;
        let beam = handle
            .image()
            .header
            .beam
            .ok_or_else(|| RestoreError::MissingBeam(image.to_path_buf()));
        handle.done()?;
        beam
    }

    fn set_restoring_beam(&mut self, image: &Path, beam: &RestoringBeam) -> Result<()> {
        debug!("setting restoring beam of {} to {}", image.display(), beam);
        let mut handle = ImageHandle::open(image)?;
        handle.image_mut().header.beam = Some(*beam);
        handle.done()
    }

    fn image_visibilities(&mut self, request: &ImagingRequest) -> Result<()> {
        if !request.vis.exists() {
            return Err(RestoreError::MissingInput(request.vis.clone()));
        }
        let produced = self.imager.run(request)?;
        let dirty = read_fits_image(&produced)?;

        let expected = request.imsize.to_vec();
        if dirty.shape() != expected {
            return Err(RestoreError::ShapeMismatch {
                expected,
                found: dirty.shape(),
            });
        }
        let (expected, found) = (request.cell.to_deg(), dirty.header.cell().to_deg());
        let aligned = (found - expected).abs() <= CELL_TOLERANCE * expected.abs();
        if !aligned {
            return Err(RestoreError::CellMismatch {
                expected_arcsec: request.cell.to_arcsec(),
                found_arcsec: dirty.header.cell().to_arcsec(),
            });
        }
        match &dirty.header.beam {
            Some(beam) => beam.check()?,
            None => return Err(RestoreError::MissingBeam(produced)),
        }
        write_native_image(request.image_path(), &dirty)
    }

    fn convolve2d(&mut self, image: &Path, outfile: &Path, beam: &RestoringBeam) -> Result<()> {
        info!("convolving {} with {} into {}", image.display(), beam, outfile.display());
        let handle = ImageHandle::open(image)?;
        let convolved = convolve_image(handle.image(), beam)?;
        handle.done()?;
        write_native_image(outfile, &convolved)
    }

    fn evaluate_expression(
        &mut self,
        images: &[PathBuf],
        expr: &str,
        bindings: &HashMap<String, f64>,
        outfile: &Path,
    ) -> Result<()> {
        info!("evaluating '{}' into {}", expr.trim(), outfile.display());
        let parsed = Expr::parse(expr)?;
        let inputs = images
            .iter()
            .map(|path| {
                let handle = ImageHandle::open(path)?;
                let image = handle.image().clone();
                handle.done()?;
                Ok(image)
            })
            .collect::<Result<Vec<Image>>>()?;
        let first = inputs
            .first()
            .ok_or_else(|| RestoreError::Expression("no input images".to_string()))?;

        let pixels: Vec<_> = inputs.iter().map(|img| &img.data).collect();
        let data = parsed.evaluate(&pixels, bindings)?;
        write_native_image(outfile, &Image::new(data, first.header.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{is_native_image, load_image, ImageHeader};
    use ndarray::Array2;
    use tempfile::TempDir;

    fn model(value: f64) -> Image {
        let header = ImageHeader::celestial(6, 6, Quantity::arcsec(1.5), 30.0, -45.0);
        Image::new(Array2::from_elem((6, 6), value), header)
    }

    fn beam() -> RestoringBeam {
        RestoringBeam::new(
            Quantity::arcsec(2.0),
            Quantity::arcsec(1.5),
            Quantity::deg(30.0),
        )
    }

    /// `cp` stands in for an imager: it copies the "visibilities" to the expected output.
    #[cfg(unix)]
    fn copy_imager() -> ImagerCfg {
        ImagerCfg {
            program: "cp".to_string(),
            args: vec!["{vis}".to_string(), "{prefix}-image.fits".to_string()],
            output: "{prefix}-image.fits".to_string(),
        }
    }

    #[test]
    fn test_import_and_header_queries() {
        let dir = TempDir::new().unwrap();
        let fits = dir.path().join("modelA.fits");
        let native = dir.path().join("mod_out");
        write_fits_image(&fits, &model(1.0)).unwrap();

        let mut tk = NativeToolkit::default();
        tk.import_fits(&fits, &native).unwrap();
        assert!(is_native_image(&native));
        assert_eq!(tk.image_shape(&native).unwrap(), vec![6, 6]);
        assert!((tk.cell_size(&native).unwrap().to_arcsec() - 1.5).abs() < 1e-6);
        assert!(matches!(
            tk.restoring_beam(&native),
            Err(RestoreError::MissingBeam(_))
        ));

        tk.set_restoring_beam(&native, &beam()).unwrap();
        assert_eq!(tk.restoring_beam(&native).unwrap(), beam());
    }

    #[test]
    fn test_import_missing_fits() {
        let dir = TempDir::new().unwrap();
        let mut tk = NativeToolkit::default();
        let err = tk
            .import_fits(&dir.path().join("missing.fits"), &dir.path().join("mod_out"))
            .unwrap_err();
        assert!(matches!(err, RestoreError::MissingInput(_)));
        assert!(!dir.path().join("mod_out").exists());
    }

    #[test]
    fn test_export_respects_overwrite() {
        let dir = TempDir::new().unwrap();
        let native = dir.path().join("restored");
        let fits = dir.path().join("restored.fits");
        write_native_image(&native, &model(2.0)).unwrap();

        let mut tk = NativeToolkit::default();
        tk.export_fits(&native, &fits, false).unwrap();
        assert!(matches!(
            tk.export_fits(&native, &fits, false),
            Err(RestoreError::OutputExists(_))
        ));
        tk.export_fits(&native, &fits, true).unwrap();
        assert_eq!(load_image(&fits).unwrap().data, model(2.0).data);
    }

    #[test]
    fn test_convolve_and_sum() {
        let dir = TempDir::new().unwrap();
        let model_path = dir.path().join("mod_out");
        let residual_path = dir.path().join("residual.fits");
        let convolved = dir.path().join("convolved_mod_out");
        let restored = dir.path().join("restored");

        let mut point = model(0.0);
        point.data[(3, 3)] = 1.0;
        write_native_image(&model_path, &point).unwrap();
        let mut residual = model(0.25);
        residual.header.beam = Some(beam());
        write_fits_image(&residual_path, &residual).unwrap();

        let mut tk = NativeToolkit::default();
        tk.convolve2d(&model_path, &convolved, &beam()).unwrap();
        let conv = load_image(&convolved).unwrap();
        assert_eq!(conv.header.beam, Some(beam()));
        assert!((conv.data[(3, 3)] - 1.0).abs() < 1e-9);

        tk.evaluate_expression(
            &[convolved.clone(), residual_path.clone()],
            " (IM0   + IM1) ",
            &HashMap::new(),
            &restored,
        )
        .unwrap();
        let out = load_image(&restored).unwrap();
        for (o, c) in out.data.iter().zip(conv.data.iter()) {
            assert!((o - (c + 0.25)).abs() < 1e-12);
        }
        assert_eq!(out.header, conv.header);
    }

    #[test]
    fn test_imaging_missing_vis() {
        let dir = TempDir::new().unwrap();
        let request = ImagingRequest::residual(
            dir.path().join("obsA.ms"),
            dir.path().join("obsA.ms.img"),
            6,
            Quantity::arcsec(1.5),
        );
        let mut tk = NativeToolkit::default();
        assert!(matches!(
            tk.image_visibilities(&request),
            Err(RestoreError::MissingInput(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_imaging_checks_grid_and_beam() {
        let dir = TempDir::new().unwrap();
        let vis = dir.path().join("dirty.fits");
        let mut dirty = model(0.1);
        write_fits_image(&vis, &dirty).unwrap();

        let mut tk = NativeToolkit::new(copy_imager());
        let request = ImagingRequest::residual(
            vis.clone(),
            dir.path().join("obsA.ms.img"),
            6,
            Quantity::arcsec(1.5),
        );
        assert!(matches!(
            tk.image_visibilities(&request),
            Err(RestoreError::MissingBeam(_))
        ));

        dirty.header.beam = Some(beam());
        write_fits_image(&vis, &dirty).unwrap();
        tk.image_visibilities(&request).unwrap();
        assert!(is_native_image(request.image_path()));

        let mut wrong = request.clone();
        wrong.imsize = [8, 8];
        assert!(matches!(
            tk.image_visibilities(&wrong),
            Err(RestoreError::ShapeMismatch { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_imaging_rejects_wrong_cell() {
        let dir = TempDir::new().unwrap();
        let vis = dir.path().join("dirty.fits");
        // right pixel count, twice the requested cell
        let mut dirty = Image::new(
            Array2::from_elem((16, 16), 0.1),
            ImageHeader::celestial(16, 16, Quantity::arcsec(3.0), 30.0, -45.0),
        );
        dirty.header.beam = Some(beam());
        write_fits_image(&vis, &dirty).unwrap();

        let mut tk = NativeToolkit::new(copy_imager());
        let request = ImagingRequest::residual(
            vis,
            dir.path().join("obsA.ms.img"),
            16,
            Quantity::arcsec(1.5),
        );
        match tk.image_visibilities(&request) {
            Err(RestoreError::CellMismatch {
                expected_arcsec,
                found_arcsec,
            }) => {
                assert!((expected_arcsec - 1.5).abs() < 1e-6);
                assert!((found_arcsec - 3.0).abs() < 1e-6);
            }
            other => panic!("expected a cell mismatch, got {:?}", other),
        }
        assert!(!request.image_path().exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_imaging_rejects_failed_beam_fit() {
        let dir = TempDir::new().unwrap();
        let vis = dir.path().join("dirty.fits");
        let mut dirty = model(0.1);
        dirty.header.beam = Some(RestoringBeam::new(
            Quantity::deg(0.0),
            Quantity::deg(0.0),
            Quantity::deg(0.0),
        ));
        write_fits_image(&vis, &dirty).unwrap();

        let mut tk = NativeToolkit::new(copy_imager());
        let request = ImagingRequest::residual(
            vis,
            dir.path().join("obsA.ms.img"),
            6,
            Quantity::arcsec(1.5),
        );
        assert!(matches!(
            tk.image_visibilities(&request),
            Err(RestoreError::InvalidBeam(_))
        ));
    }

    #[test]
    fn test_convolve2d_rejects_degenerate_beam() {
        let dir = TempDir::new().unwrap();
        let model_path = dir.path().join("mod_out");
        let convolved = dir.path().join("convolved_mod_out");
        write_native_image(&model_path, &model(1.0)).unwrap();

        let flat = RestoringBeam::new(Quantity::arcsec(2.0), Quantity::arcsec(0.0), Quantity::deg(0.0));
        let mut tk = NativeToolkit::default();
        assert!(matches!(
            tk.convolve2d(&model_path, &convolved, &flat),
            Err(RestoreError::InvalidBeam(_))
        ));
        assert!(!convolved.exists());
    }
}
