//! Scoped ownership of the `temp_image_<n>.png` files handed to the OCR engine.
//!
//! Every file written through [`TempImages::save`] is removed by
//! [`TempImages::cleanup`], or on drop if the run ends early.

use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::error::{ConvertError, Result};

pub const TEMP_IMAGE_PREFIX: &str = "temp_image_";

/// File name for the image at `index` in extraction order.
pub fn temp_image_name(index: usize) -> String {
    format!("{}{}.png", TEMP_IMAGE_PREFIX, index)
}

#[derive(Debug)]
pub struct TempImages {
    dir: PathBuf,
    paths: Vec<PathBuf>,
}

impl TempImages {
    /// Track temporary images under `dir`, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            paths: Vec::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Write `image` as PNG to `temp_image_<index>.png` and return its path.
    pub fn save(&mut self, index: usize, image: &DynamicImage) -> Result<PathBuf> {
        let path = self.dir.join(temp_image_name(index));
        // Register before writing so a partial file is still removed.
        self.paths.push(path.clone());
        image
            .save_with_format(&path, image::ImageFormat::Png)
            .map_err(|e| {
                ConvertError::Image(format!("Failed to write {}: {}", path.display(), e))
            })?;
        log::debug!("Wrote temporary image {}", path.display());
        Ok(path)
    }

    /// Delete every tracked file. Files already gone are ignored.
    pub fn cleanup(&mut self) -> Result<()> {
        let mut first_error = None;
        for path in self.paths.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    log::warn!("Failed to remove {}: {}", path.display(), e);
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(ConvertError::Io(e)),
            None => Ok(()),
        }
    }
}

impl Drop for TempImages {
    fn drop(&mut self) {
        if !self.paths.is_empty() {
            log::debug!("Removing {} leftover temporary images", self.paths.len());
            let _ = self.cleanup();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_image() -> DynamicImage {
        DynamicImage::ImageRgb8(image::RgbImage::new(4, 4))
    }

    fn leftover_temp_images(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|name| name.starts_with(TEMP_IMAGE_PREFIX))
            .collect()
    }

    #[test]
    fn test_temp_image_name() {
        assert_eq!(temp_image_name(0), "temp_image_0.png");
        assert_eq!(temp_image_name(12), "temp_image_12.png");
    }

    #[test]
    fn test_save_and_cleanup() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut temps = TempImages::new(dir.path()).unwrap();

        let p0 = temps.save(0, &tiny_image()).unwrap();
        let p1 = temps.save(1, &tiny_image()).unwrap();
        assert!(p0.ends_with("temp_image_0.png"));
        assert!(p1.exists());
        assert_eq!(leftover_temp_images(dir.path()).len(), 2);

        temps.cleanup().unwrap();
        assert!(leftover_temp_images(dir.path()).is_empty());
        assert!(temps.paths().is_empty());
    }

    #[test]
    fn test_drop_removes_files() {
        let dir = tempfile::TempDir::new().unwrap();
        {
            let mut temps = TempImages::new(dir.path()).unwrap();
            temps.save(0, &tiny_image()).unwrap();
            temps.save(1, &tiny_image()).unwrap();
        }
        assert!(leftover_temp_images(dir.path()).is_empty());
    }

    #[test]
    fn test_cleanup_ignores_missing_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut temps = TempImages::new(dir.path()).unwrap();
        let path = temps.save(0, &tiny_image()).unwrap();
        std::fs::remove_file(path).unwrap();
        assert!(temps.cleanup().is_ok());
    }
}
