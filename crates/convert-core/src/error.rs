use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("Image processing error: {0}")]
    Image(String),

    #[error("OCR error: {0}")]
    Ocr(String),

    #[error("DOCX error: {0}")]
    Docx(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("The PDF contains no embedded images to recognize")]
    NoEmbeddedImages,

    #[error("Conversion cancelled")]
    Cancelled,
}

impl From<image::ImageError> for ConvertError {
    fn from(e: image::ImageError) -> Self {
        ConvertError::Image(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;
