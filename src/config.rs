use std::{fs::File, path::Path};

use serde::{Deserialize, Serialize};

use crate::{error::Result, imager::ImagerCfg, workspace::IntermediateNames};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestoreCfg {
    pub imager: ImagerCfg,
    pub intermediates: IntermediateNames,
    /// Scale the convolved model by the beam area in pixels before adding the residual.
    pub flux_normalization: bool,
}

impl RestoreCfg {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        Ok(serde_yaml::from_reader(&mut file)?)
    }
}
