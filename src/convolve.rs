use log::{debug, warn};
use ndarray::{s, Array2, ArrayView2};
use num::Complex;

use crate::{
    beam::RestoringBeam,
    error::Result,
    fft::{fft2, fftshift2, ifft2},
    image::{Image, JY_PER_BEAM, JY_PER_PIXEL},
};

/// FWHM / sigma of a Gaussian.
pub fn fwhm_to_sigma() -> f64 {
    2.0 * (2.0 * 2_f64.ln()).sqrt()
}

/// Unit-peak elliptical Gaussian of `shape`, centred on `(h/2, w/2)`.
///
/// `cdelt1`/`cdelt2` are the pixel increments in degrees; offsets towards increasing RA count
/// as east, so the usual negative `cdelt1` puts east to the left.
pub fn gaussian_kernel(
    shape: (usize, usize),
    cdelt1: f64,
    cdelt2: f64,
    beam: &RestoringBeam,
) -> Array2<f64> {
    let (h, w) = shape;
    let (cy, cx) = ((h / 2) as f64, (w / 2) as f64);
    let sigma_major = beam.major.to_deg() / fwhm_to_sigma();
    let sigma_minor = beam.minor.to_deg() / fwhm_to_sigma();
    let (sin_pa, cos_pa) = beam.pa.to_radians().sin_cos();

    Array2::from_shape_fn(shape, |(i, j)| {
        let east = (j as f64 - cx) * cdelt1;
        let north = (i as f64 - cy) * cdelt2;
        let along_major = east * sin_pa + north * cos_pa;
        let along_minor = east * cos_pa - north * sin_pa;
        (-(along_major.powi(2) / (2.0 * sigma_major.powi(2))
            + along_minor.powi(2) / (2.0 * sigma_minor.powi(2))))
        .exp()
    })
}

/// Linear convolution of `data` with the beam's unit-peak Gaussian, same size as `data`.
pub fn convolve_gaussian(
    data: ArrayView2<f64>,
    cdelt1: f64,
    cdelt2: f64,
    beam: &RestoringBeam,
) -> Array2<f64> {
    let (ny, nx) = data.dim();
    // zero padding to twice the size keeps the product of spectra free of wrap-around
    let padded_shape = (2 * ny, 2 * nx);

    let mut padded = Array2::<Complex<f64>>::zeros(padded_shape);
    padded
        .slice_mut(s![..ny, ..nx])
        .zip_mut_with(&data, |p, &d| *p = Complex::new(d, 0.0));

    let kernel = gaussian_kernel(padded_shape, cdelt1, cdelt2, beam).mapv(|k| Complex::new(k, 0.0));
    let mut kernel = fftshift2(kernel.view());

    fft2(padded.view_mut());
    fft2(kernel.view_mut());
    padded.zip_mut_with(&kernel, |p, &k| *p *= k);
    ifft2(padded.view_mut());

    padded.slice(s![..ny, ..nx]).mapv(|c| c.re)
}

/// Convolves a model image with `beam`, leaving the result in Jy/beam with the beam attached.
pub fn convolve_image(image: &Image, beam: &RestoringBeam) -> Result<Image> {
    beam.check()?;
    let header = &image.header;
    if let Some(existing) = &header.beam {
        warn!(
            "input already has a restoring beam ({}), convolving with {} regardless",
            existing, beam
        );
    }
    debug!("convolving {}x{} image with {}", image.nx(), image.ny(), beam);
    let data = convolve_gaussian(
        image.data.view(),
        header.axes[0].cdelt,
        header.axes[1].cdelt,
        beam,
    );

    let mut header = header.clone();
    header.beam = Some(*beam);
    if header.bunit.eq_ignore_ascii_case(JY_PER_PIXEL) {
        header.bunit = JY_PER_BEAM.to_string();
    } else if !header.bunit.eq_ignore_ascii_case(JY_PER_BEAM) {
        warn!("unexpected brightness unit '{}' kept as is", header.bunit);
    }
    Ok(Image::new(data, header))
}
