//! Native image store.
//!
//! A native image is a directory holding `header.yaml` and `pixels.fits`. Anything else is
//! treated as a FITS file. [`ImageHandle`] gives scoped access to either kind.

use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};

use log::{debug, error};

use super::{read_fits_image, write_fits_image, Image, ImageHeader};
use crate::error::{RestoreError, Result};

pub const HEADER_FILE: &str = "header.yaml";
pub const PIXEL_FILE: &str = "pixels.fits";

pub fn is_native_image<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().join(HEADER_FILE).is_file()
}

pub fn read_native_image<P: AsRef<Path>>(path: P) -> Result<Image> {
    let path = path.as_ref();
    if !is_native_image(path) {
        return Err(RestoreError::MissingInput(path.to_path_buf()));
    }
    let header: ImageHeader = serde_yaml::from_reader(File::open(path.join(HEADER_FILE))?)?;
    let pixels = read_fits_image(path.join(PIXEL_FILE))?;
    Ok(Image::new(pixels.data, header))
}

/// Writes `image` as a native image, replacing whatever was at `path`.
pub fn write_native_image<P: AsRef<Path>>(path: P, image: &Image) -> Result<()> {
    let path = path.as_ref();
    if path.is_file() {
        fs::remove_file(path)?;
    }
    fs::create_dir_all(path)?;
    serde_yaml::to_writer(File::create(path.join(HEADER_FILE))?, &image.header)?;
    write_fits_image(path.join(PIXEL_FILE), image)?;
    debug!("stored native image {}", path.display());
    Ok(())
}

/// Loads a native image or a FITS file, whichever `path` is.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<Image> {
    let path = path.as_ref();
    if is_native_image(path) {
        read_native_image(path)
    } else {
        read_fits_image(path)
    }
}

/// Saves `image` in the same kind of file that `path` already is; new paths ending in
/// `.fits` become FITS files, anything else a native image.
pub fn save_image<P: AsRef<Path>>(path: P, image: &Image) -> Result<()> {
    let path = path.as_ref();
    if is_native_image(path) || (!path.exists() && !has_fits_extension(path)) {
        write_native_image(path, image)
    } else {
        write_fits_image(path, image)
    }
}

fn has_fits_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_ascii_lowercase();
            ext == "fits" || ext == "fit" || ext == "fts"
        })
        .unwrap_or(false)
}

/// An open image. Changes made through [`ImageHandle::image_mut`] are written back by
/// [`ImageHandle::done`], or on drop if the handle was never closed.
pub struct ImageHandle {
    path: PathBuf,
    image: Image,
    modified: bool,
    closed: bool,
}

impl ImageHandle {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let image = load_image(path)?;
        debug!("opened {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            image,
            modified: false,
            closed: false,
        })
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut Image {
        self.modified = true;
        &mut self.image
    }

    fn flush(&mut self) -> Result<()> {
        if self.modified {
            save_image(&self.path, &self.image)?;
            self.modified = false;
        }
        Ok(())
    }

    /// Releases the image, persisting any modification.
    pub fn done(mut self) -> Result<()> {
        self.closed = true;
        self.flush()
    }
}

impl Drop for ImageHandle {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.flush() {
                error!("failed to write back {}: {}", self.path.display(), e);
            }
        }
    }
}
