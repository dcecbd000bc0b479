//! Conversion options shared across the pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Points per inch; page geometry is expressed in points before conversion to twips.
pub const POINTS_PER_INCH: f64 = 72.0;

/// All options controlling a PDF → DOCX conversion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionOptions {
    // -- General --
    pub verbose: u8,
    pub log_file: Option<PathBuf>,

    // -- Page Setup --
    /// Uniform margin applied to all four sides, in inches.
    pub margin_inches: f64,
    /// Paragraph font size, in points.
    pub font_size: f64,
    /// Space inserted before every paragraph, in points.
    pub space_before: f64,

    // -- OCR --
    pub ocr_language: String,
    pub tesseract_cmd: PathBuf,
    /// Tesseract page segmentation mode. `None` uses the engine default.
    pub ocr_psm: Option<u8>,

    // -- Run --
    /// Directory for `temp_image_<n>.png` files. `None` means the working directory.
    pub temp_dir: Option<PathBuf>,
    /// Open the produced document and the source PDF once the run completes.
    pub open_outputs: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            verbose: 0,
            log_file: None,
            margin_inches: 1.0,
            font_size: 12.0,
            space_before: 12.0,
            ocr_language: "eng".to_string(),
            tesseract_cmd: PathBuf::from("tesseract"),
            ocr_psm: None,
            temp_dir: None,
            open_outputs: true,
        }
    }
}

impl ConversionOptions {
    /// Margin in points (72 per inch).
    pub fn margin_points(&self) -> f64 {
        self.margin_inches * POINTS_PER_INCH
    }

    /// Directory where temporary images are written.
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
