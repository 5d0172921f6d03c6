use std::process;

use clap::{Arg, Command};
use log::error;

use continuum_restore::{image::load_image, quantity::AngleUnit, Result};

fn run() -> Result<()> {
    let matches = Command::new("imhead")
        .about("print the grid and restoring beam of a FITS or native image")
        .arg(
            Arg::new("image")
                .required(true)
                .value_name("IMAGE")
                .help("FITS file or native image"),
        )
        .get_matches();

    let path = matches.value_of("image").unwrap_or_default();
    let image = load_image(path)?;
    let header = &image.header;
    println!("shape: {:?}", image.shape());
    for (i, axis) in header.axes.iter().enumerate() {
        println!(
            "axis {}: {} crpix={} crval={} cdelt={}",
            i + 1,
            axis.ctype,
            axis.crpix,
            axis.crval,
            axis.cdelt
        );
    }
    println!("cell: {}", header.cell().convert(AngleUnit::Arcsec));
    println!("bunit: {}", header.bunit);
    if let Some(object) = &header.object {
        println!("object: {}", object);
    }
    match &header.beam {
        Some(beam) => println!("beam: {}", beam),
        None => println!("beam: none"),
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(e) = run() {
        error!("{}", e);
        process::exit(1);
    }
}
