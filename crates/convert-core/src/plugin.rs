//! Plugin traits for the three pipeline stages: image source, OCR engine and document writer.

use std::path::Path;

use crate::document::{OcrDocument, SourceImages};
use crate::error::Result;
use crate::options::ConversionOptions;
use crate::progress::ProgressEvent;

/// Progress reporter callback type.
pub type ProgressReporter = Box<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Input plugin: pulls every embedded raster image out of a source file.
pub trait ImageSource: Send + Sync {
    /// Human-readable name of this plugin.
    fn name(&self) -> &str;

    /// Extract all images, in page order and then in per-page order.
    fn extract(&self, input_path: &Path, options: &ConversionOptions) -> Result<SourceImages>;
}

/// Recognizes text in an image that has been written to disk.
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Fail early when the engine cannot run at all.
    fn check_available(&self) -> Result<()> {
        Ok(())
    }

    /// Return the recognized text, one line per `\n`. May be empty.
    fn recognize(&self, image_path: &Path, options: &ConversionOptions) -> Result<String>;
}

/// Output plugin: persists a finished document.
pub trait DocumentWriter: Send + Sync {
    fn name(&self) -> &str;

    /// File extension produced, without the dot.
    fn extension(&self) -> &str;

    /// Write `document` to `output_path`. Called exactly once per run.
    fn write(
        &self,
        document: &OcrDocument,
        output_path: &Path,
        options: &ConversionOptions,
    ) -> Result<()>;
}
