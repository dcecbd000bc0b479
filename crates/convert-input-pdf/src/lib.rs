//! PDF input plugin: pulls embedded raster images out of PDF pages.

mod colorspace;
mod decode;
mod extract;
mod filters;

use std::path::Path;

use convert_core::document::SourceImages;
use convert_core::error::Result;
use convert_core::options::ConversionOptions;
use convert_core::plugin::ImageSource;

pub use extract::extract_images;

pub struct PdfImageSource;

impl ImageSource for PdfImageSource {
    fn name(&self) -> &str {
        "PDF Images"
    }

    fn extract(&self, input_path: &Path, options: &ConversionOptions) -> Result<SourceImages> {
        log::info!("Reading PDF: {}", input_path.display());
        extract::extract_images(input_path, options)
    }
}
