use std::process;

use clap::{Arg, Command};
use log::{error, info};

use continuum_restore::{
    convolve::convolve_image,
    image::{load_image, save_image},
    Quantity, RestoringBeam, Result,
};

fn run() -> Result<()> {
    let matches = Command::new("convolve_model")
        .about("convolve an image with a Gaussian restoring beam")
        .arg(
            Arg::new("input")
                .short('i')
                .long("in")
                .takes_value(true)
                .value_name("input image")
                .required(true)
                .help("FITS file or native image"),
        )
        .arg(
            Arg::new("major")
                .short('a')
                .long("major")
                .takes_value(true)
                .value_name("major axis")
                .required(true)
                .help("beam major axis FWHM, e.g. 2.0arcsec"),
        )
        .arg(
            Arg::new("minor")
                .short('b')
                .long("minor")
                .takes_value(true)
                .value_name("minor axis")
                .required(true)
                .help("beam minor axis FWHM, e.g. 1.5arcsec"),
        )
        .arg(
            Arg::new("pa")
                .short('p')
                .long("pa")
                .takes_value(true)
                .value_name("position angle")
                .default_value("0deg")
                .help("beam position angle, north through east"),
        )
        .arg(
            Arg::new("outfile")
                .short('o')
                .long("out")
                .takes_value(true)
                .value_name("output file name")
                .required(true)
                .help("output image, FITS if it ends in .fits"),
        )
        .get_matches();

    let beam = RestoringBeam::new(
        Quantity::parse(matches.value_of("major").unwrap_or_default())?,
        Quantity::parse(matches.value_of("minor").unwrap_or_default())?,
        Quantity::parse(matches.value_of("pa").unwrap_or("0deg"))?,
    );
    let image = load_image(matches.value_of("input").unwrap_or_default())?;
    info!("convolving with {}", beam);
    let convolved = convolve_image(&image, &beam)?;
    save_image(matches.value_of("outfile").unwrap_or_default(), &convolved)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(e) = run() {
        error!("{}", e);
        process::exit(1);
    }
}
