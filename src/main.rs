use std::{path::PathBuf, process};

use clap::{Arg, ArgMatches, Command};
use log::{error, info};

use continuum_restore::{
    restore, NativeToolkit, RestoreCfg, RestoreInputs, RestoreOptions, Result, Workspace,
};

fn cli() -> Command<'static> {
    Command::new("continuum_restore")
        .about("restore a CLEAN model with the beam of the imaged residual")
        .arg(
            Arg::new("residual_vis")
                .required(true)
                .value_name("RESIDUAL_VIS")
                .help("residual visibility set"),
        )
        .arg(
            Arg::new("model_fits")
                .required(true)
                .value_name("MODEL_FITS")
                .help("model image in FITS"),
        )
        .arg(
            Arg::new("restored")
                .required(true)
                .value_name("RESTORED")
                .help("name of the restored image, also written as <RESTORED>.fits"),
        )
        .arg(
            Arg::new("cfg")
                .short('c')
                .long("cfg")
                .takes_value(true)
                .value_name("config file")
                .required(false)
                .help("yaml file with imager and intermediate image settings"),
        )
        .arg(
            Arg::new("workdir")
                .short('w')
                .long("workdir")
                .takes_value(true)
                .value_name("work dir")
                .required(false)
                .default_value(".")
                .help("directory for intermediate images"),
        )
        .arg(
            Arg::new("print_args")
                .long("print-args")
                .takes_value(false)
                .help("print the argument list"),
        )
}

struct CliArgs {
    inputs: RestoreInputs,
    workdir: PathBuf,
    cfg: RestoreCfg,
    print_args: bool,
}

impl CliArgs {
    fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let cfg = match matches.value_of("cfg") {
            Some(path) => RestoreCfg::from_file(path)?,
            None => RestoreCfg::default(),
        };
        Ok(Self {
            inputs: RestoreInputs::new(
                matches.value_of("residual_vis").unwrap_or_default(),
                matches.value_of("model_fits").unwrap_or_default(),
                matches.value_of("restored").unwrap_or_default(),
            ),
            workdir: PathBuf::from(matches.value_of("workdir").unwrap_or(".")),
            cfg,
            print_args: matches.is_present("print_args"),
        })
    }

    fn workspace(&self) -> Workspace {
        Workspace::new(&self.workdir, self.cfg.intermediates.clone())
    }

    fn options(&self) -> RestoreOptions {
        RestoreOptions {
            flux_normalization: self.cfg.flux_normalization,
        }
    }

    fn toolkit(&self) -> NativeToolkit {
        NativeToolkit::new(self.cfg.imager.clone())
    }
}

fn run() -> Result<()> {
    let args = CliArgs::from_matches(&cli().get_matches())?;
    if args.print_args {
        println!("{:?}", std::env::args().collect::<Vec<_>>());
    }

    let mut toolkit = args.toolkit();
    info!("imaging with {}", toolkit.imager().cfg().program);
    let outputs = restore(&mut toolkit, &args.workspace(), &args.inputs, &args.options())?;
    println!("{}", outputs.restored_fits().display());
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(e) = run() {
        error!("{}", e);
        process::exit(1);
    }
}
