#![cfg(unix)]

use std::fs;

use approx::assert_relative_eq;
use ndarray::Array2;
use rand::{thread_rng, Rng};
use tempfile::TempDir;

use continuum_restore::{
    convolve::convolve_image,
    image::{is_native_image, load_image, write_fits_image, Image, ImageHeader, JY_PER_BEAM},
    imager::ImagerCfg,
    restore::{restore, RestoreInputs, RestoreOptions},
    IntermediateNames, NativeToolkit, Quantity, RestoringBeam, Workspace,
};

const N: usize = 32;

fn beam_a() -> RestoringBeam {
    RestoringBeam::new(
        Quantity::arcsec(2.0),
        Quantity::arcsec(1.5),
        Quantity::deg(30.0),
    )
}

fn assert_beam_eq(found: &RestoringBeam, expected: &RestoringBeam) {
    assert_relative_eq!(found.major.to_arcsec(), expected.major.to_arcsec(), max_relative = 1e-8);
    assert_relative_eq!(found.minor.to_arcsec(), expected.minor.to_arcsec(), max_relative = 1e-8);
    assert_relative_eq!(found.pa.to_deg(), expected.pa.to_deg(), max_relative = 1e-8);
}

/// `cp` copies a ready-made dirty image to where wsclean would have written it.
fn copying_imager() -> ImagerCfg {
    ImagerCfg {
        program: "cp".to_string(),
        args: vec!["{vis}".to_string(), "{prefix}-image.fits".to_string()],
        output: "{prefix}-image.fits".to_string(),
    }
}

struct Fixture {
    _dir: TempDir,
    workdir: std::path::PathBuf,
    inputs: RestoreInputs,
    model: Image,
    residual: Image,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let workdir = dir.path().join("work");
    fs::create_dir_all(&workdir).unwrap();
    let mut rng = thread_rng();

    let cell = Quantity::arcsec(0.5);
    let mut model = Image::new(
        Array2::zeros((N, N)),
        ImageHeader::celestial(N, N, cell, 150.0, 2.2),
    );
    for _ in 0..5 {
        let (i, j) = (rng.gen_range(4..N - 4), rng.gen_range(4..N - 4));
        model.data[(i, j)] = rng.gen_range(0.1..2.0);
    }
    let model_fits = dir.path().join("modelA.fits");
    write_fits_image(&model_fits, &model).unwrap();

    let mut residual_header = ImageHeader::celestial(N, N, cell, 150.0, 2.2);
    residual_header.bunit = JY_PER_BEAM.to_string();
    residual_header.beam = Some(beam_a());
    let residual = Image::new(
        Array2::from_shape_fn((N, N), |_| rng.gen_range(-0.01..0.01)),
        residual_header,
    );
    let vis = dir.path().join("obsA.fits");
    write_fits_image(&vis, &residual).unwrap();

    let inputs = RestoreInputs::new(vis, model_fits, workdir.join("restoredA"));
    Fixture {
        _dir: dir,
        workdir,
        inputs,
        model,
        residual,
    }
}

#[test]
fn restored_image_is_convolved_model_plus_residual() {
    let fx = fixture();
    let ws = Workspace::new(&fx.workdir, IntermediateNames::default());
    let mut tk = NativeToolkit::new(copying_imager());

    let out = restore(&mut tk, &ws, &fx.inputs, &RestoreOptions::default()).unwrap();
    assert_eq!(out.geometry.n, N);
    assert_relative_eq!(out.geometry.cell.to_arcsec(), 0.5, max_relative = 1e-8);
    assert_beam_eq(&out.beam, &beam_a());
    assert!(is_native_image(&out.paths.model_image));
    assert!(is_native_image(&out.paths.residual_image));
    assert!(is_native_image(&out.paths.restored_image));
    assert!(out.paths.residual_fits.is_file());

    // header keys go through FITS text, so compare with the model as the toolkit stored it
    let model = load_image(&out.paths.model_image).unwrap();
    assert_eq!(model.data, fx.model.data);
    let convolved = load_image(&out.paths.convolved_fits).unwrap();
    assert_beam_eq(&convolved.header.beam.unwrap(), &out.beam);
    assert_eq!(convolved.header.bunit, JY_PER_BEAM);
    let expected = convolve_image(&model, &out.beam).unwrap();
    for (c, e) in convolved.data.iter().zip(expected.data.iter()) {
        assert_relative_eq!(*c, *e, epsilon = 1e-12);
    }

    let restored = load_image(out.restored_fits()).unwrap();
    assert_eq!(restored.shape(), vec![N, N]);
    assert_beam_eq(&restored.header.beam.unwrap(), &beam_a());
    for ((r, c), res) in restored
        .data
        .iter()
        .zip(convolved.data.iter())
        .zip(fx.residual.data.iter())
    {
        assert_relative_eq!(*r, c + res, epsilon = 1e-12);
    }
}

#[test]
fn rerun_gives_identical_fits_outputs() {
    let fx = fixture();
    let ws = Workspace::new(&fx.workdir, IntermediateNames::default());
    let mut tk = NativeToolkit::new(copying_imager());

    let first = restore(&mut tk, &ws, &fx.inputs, &RestoreOptions::default()).unwrap();
    let fits_outputs = [
        first.paths.residual_fits.clone(),
        first.paths.convolved_fits.clone(),
        first.paths.restored_fits.clone(),
    ];
    let before: Vec<Vec<u8>> = fits_outputs.iter().map(|p| fs::read(p).unwrap()).collect();

    let second = restore(&mut tk, &ws, &fx.inputs, &RestoreOptions::default()).unwrap();
    assert!(!second.removed.is_empty());
    assert_eq!(first.paths, second.paths);
    let after: Vec<Vec<u8>> = fits_outputs.iter().map(|p| fs::read(p).unwrap()).collect();
    assert!(before == after, "FITS outputs differ between runs");
}

#[test]
fn missing_model_leaves_no_imaging_output() {
    let fx = fixture();
    let ws = Workspace::new(&fx.workdir, IntermediateNames::default());
    let mut tk = NativeToolkit::new(copying_imager());
    let mut inputs = fx.inputs.clone();
    inputs.model_fits = fx.workdir.join("no_such_model.fits");

    assert!(restore(&mut tk, &ws, &inputs, &RestoreOptions::default()).is_err());
    let leftovers: Vec<_> = fs::read_dir(&fx.workdir).unwrap().collect();
    assert!(leftovers.is_empty());
}
