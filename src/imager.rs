//! External imaging program that turns a visibility set into a dirty image.

use std::{
    path::{Path, PathBuf},
    process::Command,
};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    error::{RestoreError, Result},
    quantity::format_value,
    toolkit::{ImagingRequest, Weighting},
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImagerCfg {
    pub program: String,
    pub args: Vec<String>,
    /// Path of the image the program writes. Relative paths without `{prefix}` resolve against
    /// the prefix's directory.
    pub output: String,
}

impl Default for ImagerCfg {
    fn default() -> Self {
        let args = [
            "-name",
            "{prefix}",
            "-size",
            "{size}",
            "{size}",
            "-scale",
            "{cell_arcsec}asec",
            "-weight",
            "{weighting}",
            "-pol",
            "{stokes}",
            "-niter",
            "{niter}",
            "{vis}",
        ];
        Self {
            program: "wsclean".to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            output: "{prefix}-image.fits".to_string(),
        }
    }
}

fn weighting_args(weighting: &Weighting) -> Vec<String> {
    match weighting {
        Weighting::Natural => vec!["natural".to_string()],
        Weighting::Uniform => vec!["uniform".to_string()],
        Weighting::Briggs { robust } => vec!["briggs".to_string(), format_value(*robust)],
    }
}

fn substitute(template: &str, request: &ImagingRequest) -> String {
    template
        .replace("{vis}", &request.vis.to_string_lossy())
        .replace("{prefix}", &request.imagename.to_string_lossy())
        .replace("{size}", &request.imsize[0].to_string())
        .replace("{cell_arcsec}", &format_value(request.cell.to_arcsec()))
        .replace("{stokes}", request.stokes.name())
        .replace("{niter}", &request.niter.to_string())
        .replace("{mode}", request.mode.name())
}

pub struct ExternalImager {
    cfg: ImagerCfg,
}

impl ExternalImager {
    pub fn new(cfg: ImagerCfg) -> Self {
        Self { cfg }
    }

    pub fn cfg(&self) -> &ImagerCfg {
        &self.cfg
    }

    pub fn command_args(&self, request: &ImagingRequest) -> Vec<String> {
        self.cfg
            .args
            .iter()
            .flat_map(|arg| {
                if arg == "{weighting}" {
                    weighting_args(&request.weighting)
                } else {
                    vec![substitute(arg, request)]
                }
            })
            .collect()
    }

    pub fn output_path(&self, request: &ImagingRequest) -> PathBuf {
        let output = PathBuf::from(substitute(&self.cfg.output, request));
        // `{prefix}` already carries the directory
        if output.is_absolute() || self.cfg.output.contains("{prefix}") {
            output
        } else {
            request
                .imagename
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join(output)
        }
    }

    /// Runs the imager and returns the path of the FITS image it produced.
    pub fn run(&self, request: &ImagingRequest) -> Result<PathBuf> {
        let args = self.command_args(request);
        info!("running {} {}", self.cfg.program, args.join(" "));
        let output = Command::new(&self.cfg.program)
            .args(&args)
            .output()
            .map_err(|e| RestoreError::Imager(format!("cannot start {}: {}", self.cfg.program, e)))?;
        debug!("{} stdout: {}", self.cfg.program, String::from_utf8_lossy(&output.stdout));
        if !output.status.success() {
            return Err(RestoreError::Imager(format!(
                "{} exited with {}: {}",
                self.cfg.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let image = self.output_path(request);
        if !image.exists() {
            return Err(RestoreError::Imager(format!(
                "{} did not write {}",
                self.cfg.program,
                image.display()
            )));
        }
        Ok(image)
    }
}
