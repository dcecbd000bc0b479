//! Pipeline orchestrator: runs one PDF to DOCX conversion.
//!
//! The run goes through three phases:
//!   Extracting: image source → ordered list of decoded images
//!   Recognizing: for each image, write temp PNG → OCR → add one page
//!   Saving: document writer persists the document once
//!
//! Opening outputs and final cleanup belong to the caller, which owns the
//! [`TempImages`] guard so it can order them after the save.

use std::path::{Path, PathBuf};

use log::info;

use crate::cancel::CancellationToken;
use crate::document::{DocumentBuilder, PageLayout};
use crate::error::{ConvertError, Result};
use crate::options::ConversionOptions;
use crate::plugin::{DocumentWriter, ImageSource, OcrEngine, ProgressReporter};
use crate::progress::{Progress, ProgressEvent, Stage};
use crate::temp::TempImages;

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub pages: usize,
    /// Paragraph count of each output page, in order.
    pub lines_per_page: Vec<usize>,
}

impl ConversionReport {
    pub fn paragraphs(&self) -> usize {
        self.lines_per_page.iter().sum()
    }
}

/// The conversion pipeline orchestrator.
pub struct Pipeline {
    source: Box<dyn ImageSource>,
    ocr: Box<dyn OcrEngine>,
    writer: Box<dyn DocumentWriter>,
    progress_reporter: Option<ProgressReporter>,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(
        source: Box<dyn ImageSource>,
        ocr: Box<dyn OcrEngine>,
        writer: Box<dyn DocumentWriter>,
    ) -> Self {
        Self {
            source,
            ocr,
            writer,
            progress_reporter: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Set a progress reporter callback.
    pub fn set_progress_reporter(&mut self, reporter: ProgressReporter) {
        self.progress_reporter = Some(reporter);
    }

    pub fn set_cancellation_token(&mut self, token: CancellationToken) {
        self.cancel = token;
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run extraction, OCR and the single save.
    ///
    /// Temporary images are written through `temps`; they are left in place
    /// on success so the caller can clean up after opening the outputs.
    pub fn run(
        &self,
        input_path: &Path,
        output_path: &Path,
        temps: &mut TempImages,
        options: &ConversionOptions,
    ) -> Result<ConversionReport> {
        self.ocr.check_available()?;

        // Phase 1: Extract
        self.report(ProgressEvent::Stage(Stage::Extracting));
        info!("Running {} on {}", self.source.name(), input_path.display());
        let source = self.source.extract(input_path, options)?;

        let total = source.len();
        if total == 0 {
            info!("No embedded images found in {}", input_path.display());
            return Err(ConvertError::NoEmbeddedImages);
        }
        info!("Extracted {} images", total);
        self.cancel.check()?;

        // Phase 2: OCR + build, one image at a time
        self.report(ProgressEvent::Stage(Stage::Recognizing));
        let mut builder = DocumentBuilder::new(PageLayout::from_options(options));
        let mut lines_per_page = Vec::with_capacity(total);

        for (i, extracted) in source.images.iter().enumerate() {
            self.cancel.check()?;

            let image_path = temps.save(i, &extracted.image)?;
            let text = self.ocr.recognize(&image_path, options).map_err(|e| match e {
                ConvertError::Ocr(msg) => ConvertError::Ocr(format!(
                    "image {} (page {}): {}",
                    i + 1,
                    extracted.page,
                    msg
                )),
                other => other,
            })?;

            let page = builder.add_page(&text);
            lines_per_page.push(page.paragraphs.len());
            log::debug!(
                "Image {}/{} (page {}): {} lines",
                i + 1,
                total,
                extracted.page,
                page.paragraphs.len()
            );

            self.report(ProgressEvent::Progress(Progress::new(i + 1, total)));
        }

        // Phase 3: Save
        self.cancel.check()?;
        self.report(ProgressEvent::Stage(Stage::Saving));
        info!("Running {} → {}", self.writer.name(), output_path.display());
        let document = builder.finish();
        self.writer.write(&document, output_path, options)?;
        info!(
            "{} pages written to {}",
            document.pages.len(),
            output_path.display()
        );

        Ok(ConversionReport {
            input: input_path.to_path_buf(),
            output: output_path.to_path_buf(),
            pages: document.pages.len(),
            lines_per_page,
        })
    }

    fn report(&self, event: ProgressEvent) {
        if let Some(ref reporter) = self.progress_reporter {
            reporter(&event);
        }
    }
}

/// Builder for constructing a pipeline from its three plugins.
pub struct PipelineBuilder {
    source: Option<Box<dyn ImageSource>>,
    ocr: Option<Box<dyn OcrEngine>>,
    writer: Option<Box<dyn DocumentWriter>>,
    progress_reporter: Option<ProgressReporter>,
    cancel: Option<CancellationToken>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            source: None,
            ocr: None,
            writer: None,
            progress_reporter: None,
            cancel: None,
        }
    }

    pub fn source(mut self, source: Box<dyn ImageSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn ocr(mut self, engine: Box<dyn OcrEngine>) -> Self {
        self.ocr = Some(engine);
        self
    }

    pub fn writer(mut self, writer: Box<dyn DocumentWriter>) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn progress_reporter(mut self, reporter: ProgressReporter) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        let source = self
            .source
            .ok_or_else(|| ConvertError::Pipeline("No image source specified".to_string()))?;
        let ocr = self
            .ocr
            .ok_or_else(|| ConvertError::Pipeline("No OCR engine specified".to_string()))?;
        let writer = self
            .writer
            .ok_or_else(|| ConvertError::Pipeline("No document writer specified".to_string()))?;

        let mut pipeline = Pipeline::new(source, ocr, writer);
        if let Some(reporter) = self.progress_reporter {
            pipeline.set_progress_reporter(reporter);
        }
        if let Some(token) = self.cancel {
            pipeline.set_cancellation_token(token);
        }
        Ok(pipeline)
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
