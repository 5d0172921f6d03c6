use std::path::Path;

use fitsio::{
    hdu::{FitsHdu, HduInfo},
    images::{ImageDescription, ImageType},
    FitsFile,
};
use log::{debug, warn};
use ndarray::Array2;

use super::{Axis, Image, ImageHeader};
use crate::{
    beam::RestoringBeam,
    error::{RestoreError, Result},
    quantity::Quantity,
};

fn invalid_header(path: &Path, reason: impl Into<String>) -> RestoreError {
    RestoreError::InvalidHeader {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn read_optional<T: fitsio::headers::ReadsKey>(
    hdu: &FitsHdu,
    fptr: &mut FitsFile,
    key: &str,
) -> Option<T> {
    hdu.read_key::<T>(fptr, key).ok()
}

fn read_axis(hdu: &FitsHdu, fptr: &mut FitsFile, index: usize, len: usize) -> Option<Axis> {
    let cdelt = read_optional::<f64>(hdu, fptr, &format!("CDELT{index}"))?;
    Some(Axis {
        ctype: read_optional::<String>(hdu, fptr, &format!("CTYPE{index}")).unwrap_or_else(|| {
            if index == 1 {
                "RA---SIN".to_string()
            } else {
                "DEC--SIN".to_string()
            }
        }),
        crpix: read_optional::<f64>(hdu, fptr, &format!("CRPIX{index}"))
            .unwrap_or((len / 2 + 1) as f64),
        crval: read_optional::<f64>(hdu, fptr, &format!("CRVAL{index}")).unwrap_or(0.0),
        cdelt,
    })
}

/// Reads the first plane of the primary HDU.
pub fn read_fits_image<P: AsRef<Path>>(path: P) -> Result<Image> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(RestoreError::MissingInput(path.to_path_buf()));
    }
    let mut fptr = FitsFile::open(path)?;
    let hdu = fptr.primary_hdu()?;

    let shape = match &hdu.info {
        HduInfo::ImageInfo { shape, .. } => shape.clone(),
        _ => return Err(invalid_header(path, "primary HDU is not an image")),
    };
    if shape.len() < 2 {
        return Err(invalid_header(
            path,
            format!("expected at least 2 axes, found {}", shape.len()),
        ));
    }
    // row-major: the last two entries are NAXIS2 and NAXIS1
    let nx = shape[shape.len() - 1];
    let ny = shape[shape.len() - 2];
    let planes: usize = shape[..shape.len() - 2].iter().product();
    if planes > 1 {
        warn!(
            "{} holds {} planes, only the first is used",
            path.display(),
            planes
        );
    }

    let pixels: Vec<f64> = hdu.read_image(&mut fptr)?;
    let data = Array2::from_shape_vec((ny, nx), pixels.into_iter().take(nx * ny).collect())
        .map_err(|e| invalid_header(path, e.to_string()))?;

    let axis2 = read_axis(&hdu, &mut fptr, 2, ny).ok_or_else(|| invalid_header(path, "missing CDELT2"))?;
    let axis1 = match read_axis(&hdu, &mut fptr, 1, nx) {
        Some(axis) => axis,
        None => {
            warn!("{} has no CDELT1, assuming -CDELT2", path.display());
            Axis {
                ctype: "RA---SIN".to_string(),
                crpix: (nx / 2 + 1) as f64,
                crval: 0.0,
                cdelt: -axis2.cdelt,
            }
        }
    };

    let beam = match (
        read_optional::<f64>(&hdu, &mut fptr, "BMAJ"),
        read_optional::<f64>(&hdu, &mut fptr, "BMIN"),
        read_optional::<f64>(&hdu, &mut fptr, "BPA"),
    ) {
        (Some(bmaj), Some(bmin), Some(bpa)) => Some(RestoringBeam::new(
            Quantity::deg(bmaj),
            Quantity::deg(bmin),
            Quantity::deg(bpa),
        )),
        _ => None,
    };

    let header = ImageHeader {
        axes: [axis1, axis2],
        bunit: read_optional::<String>(&hdu, &mut fptr, "BUNIT").unwrap_or_default(),
        object: read_optional::<String>(&hdu, &mut fptr, "OBJECT"),
        beam,
    };
    debug!("read {} ({}x{}) from {}", header.bunit, nx, ny, path.display());
    Ok(Image::new(data, header))
}

/// Writes `image` as a 2-axis double-precision primary HDU, replacing any existing file.
pub fn write_fits_image<P: AsRef<Path>>(path: P, image: &Image) -> Result<()> {
    let path = path.as_ref();
    let description = ImageDescription {
        data_type: ImageType::Double,
        dimensions: &[image.ny(), image.nx()],
    };
    let mut fptr = FitsFile::create(path)
        .with_custom_primary(&description)
        .overwrite()
        .open()?;
    let hdu = fptr.primary_hdu()?;

    let pixels: Vec<f64> = image.data.iter().copied().collect();
    hdu.write_image(&mut fptr, &pixels)?;

    let header = &image.header;
    for (i, axis) in header.axes.iter().enumerate() {
        let n = i + 1;
        hdu.write_key(&mut fptr, &format!("CTYPE{n}"), axis.ctype.as_str())?;
        hdu.write_key(&mut fptr, &format!("CRPIX{n}"), axis.crpix)?;
        hdu.write_key(&mut fptr, &format!("CRVAL{n}"), axis.crval)?;
        hdu.write_key(&mut fptr, &format!("CDELT{n}"), axis.cdelt)?;
        hdu.write_key(&mut fptr, &format!("CUNIT{n}"), "deg")?;
    }
    hdu.write_key(&mut fptr, "BUNIT", header.bunit.as_str())?;
    if let Some(object) = &header.object {
        hdu.write_key(&mut fptr, "OBJECT", object.as_str())?;
    }
    if let Some(beam) = &header.beam {
        hdu.write_key(&mut fptr, "BMAJ", beam.major.to_deg())?;
        hdu.write_key(&mut fptr, "BMIN", beam.minor.to_deg())?;
        hdu.write_key(&mut fptr, "BPA", beam.pa.to_deg())?;
    }
    debug!("wrote {}x{} image to {}", image.nx(), image.ny(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    fn test_image() -> Image {
        let mut header = ImageHeader::celestial(5, 3, Quantity::arcsec(1.5), 150.0, -30.0);
        header.object = Some("modelA".to_string());
        let data = Array2::from_shape_fn((3, 5), |(y, x)| (y * 5 + x) as f64 * 0.5);
        Image::new(data, header)
    }

    #[test]
    fn test_fits_roundtrip_keeps_orientation_and_wcs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.fits");
        let image = test_image();
        write_fits_image(&path, &image).unwrap();

        let read = read_fits_image(&path).unwrap();
        assert_eq!(read.shape(), vec![5, 3]);
        assert_eq!(read.data, image.data);
        assert_eq!(read.header.axes[0].ctype, "RA---SIN");
        assert_relative_eq!(read.header.axes[0].cdelt, -1.5 / 3600.0, max_relative = 1e-8);
        assert_relative_eq!(read.header.cell().to_arcsec(), 1.5, max_relative = 1e-8);
        assert_eq!(read.header.bunit, "Jy/pixel");
        assert_eq!(read.header.object.as_deref(), Some("modelA"));
        assert!(read.header.beam.is_none());
    }

    #[test]
    fn test_fits_beam_keywords() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("residual.fits");
        let mut image = test_image();
        image.header.beam = Some(RestoringBeam::new(
            Quantity::arcsec(2.0),
            Quantity::arcsec(1.5),
            Quantity::deg(30.0),
        ));
        write_fits_image(&path, &image).unwrap();

        let beam = read_fits_image(&path).unwrap().header.beam.unwrap();
        assert_relative_eq!(beam.major.to_arcsec(), 2.0, max_relative = 1e-8);
        assert_relative_eq!(beam.minor.to_arcsec(), 1.5, max_relative = 1e-8);
        assert_relative_eq!(beam.pa.to_deg(), 30.0, max_relative = 1e-8);
    }

    #[test]
    fn test_write_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.fits");
        let mut image = test_image();
        write_fits_image(&path, &image).unwrap();
        image.data.fill(7.0);
        write_fits_image(&path, &image).unwrap();
        assert!(read_fits_image(&path).unwrap().data.iter().all(|&v| v == 7.0));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nope.fits");
        assert!(matches!(
            read_fits_image(&path),
            Err(RestoreError::MissingInput(p)) if p == path
        ));
    }

    #[test]
    fn test_missing_cdelt2_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bare.fits");
        let description = ImageDescription {
            data_type: ImageType::Double,
            dimensions: &[2, 2],
        };
        let mut fptr = FitsFile::create(&path)
            .with_custom_primary(&description)
            .open()
            .unwrap();
        let hdu = fptr.primary_hdu().unwrap();
        hdu.write_image(&mut fptr, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        drop(fptr);

        assert!(matches!(
            read_fits_image(&path),
            Err(RestoreError::InvalidHeader { .. })
        ));
    }
}
