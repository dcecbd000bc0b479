//! OCR plugin: recognizes text with the Tesseract command-line engine.

mod tesseract;

use std::path::Path;

use convert_core::error::Result;
use convert_core::options::ConversionOptions;
use convert_core::plugin::OcrEngine;

pub use tesseract::{check_tesseract, tesseract_args, TesseractEngine};

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "Tesseract OCR"
    }

    fn check_available(&self) -> Result<()> {
        check_tesseract(self.command())
    }

    fn recognize(&self, image_path: &Path, options: &ConversionOptions) -> Result<String> {
        log::debug!("OCR ({}): {}", options.ocr_language, image_path.display());
        self.run(image_path, options)
    }
}
