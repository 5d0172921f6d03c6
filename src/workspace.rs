//! Names of the files a restoration run reads and writes, and removal of stale ones.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{error::Result, toolkit::with_suffix};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntermediateNames {
    pub model: String,
    pub convolved: String,
}

impl Default for IntermediateNames {
    fn default() -> Self {
        Self {
            model: "mod_out".to_string(),
            convolved: "convolved_mod_out".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RestorePaths {
    /// Prefix handed to the imager, `<workdir>/<residual set name>.img`.
    pub residual_prefix: PathBuf,
    pub residual_image: PathBuf,
    pub residual_fits: PathBuf,
    pub model_image: PathBuf,
    pub convolved_image: PathBuf,
    pub convolved_fits: PathBuf,
    pub restored_image: PathBuf,
    pub restored_fits: PathBuf,
}

pub struct Workspace {
    dir: PathBuf,
    names: IntermediateNames,
}

impl Workspace {
    pub fn new<P: Into<PathBuf>>(dir: P, names: IntermediateNames) -> Self {
        Self {
            dir: dir.into(),
            names,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn paths(&self, residual_vis: &Path, restored: &Path) -> RestorePaths {
        let vis_name = residual_vis
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("residual"));
        let residual_prefix = with_suffix(self.dir.join(vis_name), ".img");
        let residual_image = with_suffix(&residual_prefix, ".image");
        let convolved_image = self.dir.join(&self.names.convolved);
        RestorePaths {
            residual_fits: with_suffix(&residual_image, ".fits"),
            residual_image,
            residual_prefix,
            model_image: self.dir.join(&self.names.model),
            convolved_fits: with_suffix(&convolved_image, ".fits"),
            convolved_image,
            restored_image: restored.to_path_buf(),
            restored_fits: with_suffix(restored, ".fits"),
        }
    }

    /// Removes everything a previous run may have left behind and returns what was removed.
    pub fn reset(&self, paths: &RestorePaths) -> Result<Vec<PathBuf>> {
        let mut stale = Vec::new();

        // `<prefix>.*` from earlier runs, `<prefix>-*` as written by the imager
        let prefix = paths
            .residual_prefix
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let prefixes = [format!("{}.", prefix), format!("{}-", prefix)];
        if self.dir.is_dir() {
            for entry in fs::read_dir(&self.dir)? {
                let path = entry?.path();
                let name = match path.file_name() {
                    Some(name) => name.to_string_lossy().into_owned(),
                    None => continue,
                };
                if name.ends_with(".log")
                    || name.ends_with(".last")
                    || (!prefix.is_empty() && prefixes.iter().any(|p| name.starts_with(p.as_str())))
                {
                    stale.push(path);
                }
            }
        }
        stale.extend(
            [
                &paths.model_image,
                &paths.convolved_image,
                &paths.convolved_fits,
                &paths.restored_image,
                &paths.restored_fits,
            ]
            .into_iter()
            .cloned(),
        );

        let mut removed = Vec::new();
        for path in stale {
            if remove_path(&path)? {
                debug!("removed {}", path.display());
                removed.push(path);
            }
        }
        if !removed.is_empty() {
            info!("removed {} stale files from previous runs", removed.len());
        }
        Ok(removed)
    }
}

fn remove_path(path: &Path) -> Result<bool> {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
