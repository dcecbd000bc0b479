//! DOCX output plugin.

pub mod writer;

use std::path::Path;

use convert_core::document::OcrDocument;
use convert_core::error::Result;
use convert_core::options::ConversionOptions;
use convert_core::plugin::DocumentWriter;

pub use writer::{build_docx, write_docx};

/// Writes Office Open XML word-processing documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxWriter;

impl DocumentWriter for DocxWriter {
    fn name(&self) -> &str {
        "DOCX Output"
    }

    fn extension(&self) -> &str {
        "docx"
    }

    fn write(
        &self,
        document: &OcrDocument,
        output_path: &Path,
        _options: &ConversionOptions,
    ) -> Result<()> {
        log::info!("Saving document: {}", output_path.display());
        write_docx(document, output_path)
    }
}
