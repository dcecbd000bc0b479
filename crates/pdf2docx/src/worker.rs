//! Background conversion worker.
//!
//! One thread per run. The thread owns the pipeline and the temporary image
//! guard and reports back to the shell over a channel; the shell never
//! touches worker state directly.

use std::io;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;

use convert_core::cancel::CancellationToken;
use convert_core::error::{ConvertError, Result};
use convert_core::options::ConversionOptions;
use convert_core::pipeline::{ConversionReport, Pipeline, PipelineBuilder};
use convert_core::plugin::ProgressReporter;
use convert_core::progress::{Progress, ProgressEvent, Stage};
use convert_core::temp::TempImages;
use convert_input_pdf::PdfImageSource;
use convert_ocr::TesseractEngine;
use convert_output_docx::DocxWriter;

use crate::launch::{Launcher, SystemLauncher};

/// One PDF in, one DOCX out.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub options: ConversionOptions,
}

/// Messages from the worker thread to the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    Stage(Stage),
    Progress(Progress),
    Completed(ConversionReport),
    NoImages,
    Cancelled,
    Failed(String),
}

impl WorkerEvent {
    /// The last event of a run.
    pub fn is_final(&self) -> bool {
        !matches!(self, WorkerEvent::Stage(_) | WorkerEvent::Progress(_))
    }

    pub fn from_outcome(outcome: Result<ConversionReport>) -> Self {
        match outcome {
            Ok(report) => WorkerEvent::Completed(report),
            Err(ConvertError::NoEmbeddedImages) => WorkerEvent::NoImages,
            Err(ConvertError::Cancelled) => WorkerEvent::Cancelled,
            Err(e) => WorkerEvent::Failed(e.to_string()),
        }
    }
}

impl From<&ProgressEvent> for WorkerEvent {
    fn from(event: &ProgressEvent) -> Self {
        match event {
            ProgressEvent::Stage(stage) => WorkerEvent::Stage(*stage),
            ProgressEvent::Progress(progress) => WorkerEvent::Progress(*progress),
        }
    }
}

/// PDF images → Tesseract → DOCX.
pub fn pdf_pipeline(
    options: &ConversionOptions,
    reporter: ProgressReporter,
    cancel: CancellationToken,
) -> Result<Pipeline> {
    PipelineBuilder::new()
        .source(Box::new(PdfImageSource))
        .ocr(Box::new(TesseractEngine::from_options(options)))
        .writer(Box::new(DocxWriter))
        .progress_reporter(reporter)
        .cancellation_token(cancel)
        .build()
}

/// Run the pipeline, then open the outputs and remove the temporary images.
///
/// `report` receives the two post-save stages; pipeline stages go through the
/// pipeline's own reporter.
pub fn execute(
    pipeline: &Pipeline,
    job: &ConversionJob,
    launcher: &dyn Launcher,
    report: &dyn Fn(&ProgressEvent),
) -> Result<ConversionReport> {
    let mut temps = TempImages::new(job.options.temp_dir())?;
    // On error `temps` is dropped here, which removes any files it wrote.
    let conversion = pipeline.run(&job.input, &job.output, &mut temps, &job.options)?;

    if job.options.open_outputs {
        report(&ProgressEvent::Stage(Stage::OpeningOutputs));
        launcher.open(&conversion.output);
        launcher.open(&conversion.input);
    }

    report(&ProgressEvent::Stage(Stage::CleaningUp));
    if let Err(e) = temps.cleanup() {
        log::warn!("Temporary images were not fully removed: {}", e);
    }
    Ok(conversion)
}

/// A running conversion.
#[derive(Debug)]
pub struct WorkerHandle {
    cancel: CancellationToken,
    thread: JoinHandle<()>,
}

impl WorkerHandle {
    /// Ask the worker to stop before the next image.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn join(self) {
        if self.thread.join().is_err() {
            log::error!("Conversion worker panicked");
        }
    }
}

/// Start converting `job` with the PDF/Tesseract/DOCX pipeline.
pub fn spawn(job: ConversionJob, events: Sender<WorkerEvent>) -> io::Result<WorkerHandle> {
    let reporter_events = events.clone();
    let reporter: ProgressReporter = Box::new(move |event: &ProgressEvent| {
        let _ = reporter_events.send(WorkerEvent::from(event));
    });
    let pipeline =
        pdf_pipeline(&job.options, reporter, CancellationToken::new()).map_err(io::Error::other)?;
    spawn_with(pipeline, job, Box::new(SystemLauncher), events)
}

/// Start converting `job` with an already-built pipeline.
///
/// Exactly one final event (`Completed`, `NoImages`, `Cancelled` or `Failed`)
/// is sent when the run ends.
pub fn spawn_with(
    pipeline: Pipeline,
    job: ConversionJob,
    launcher: Box<dyn Launcher>,
    events: Sender<WorkerEvent>,
) -> io::Result<WorkerHandle> {
    let cancel = pipeline.cancellation_token().clone();
    let thread = thread::Builder::new()
        .name("conversion-worker".to_string())
        .spawn(move || {
            log::info!(
                "Converting {} → {}",
                job.input.display(),
                job.output.display()
            );
            let forward = |event: &ProgressEvent| {
                let _ = events.send(WorkerEvent::from(event));
            };
            let outcome = execute(&pipeline, &job, launcher.as_ref(), &forward);
            match &outcome {
                Ok(report) => log::info!(
                    "Converted {} images ({} paragraphs)",
                    report.pages,
                    report.paragraphs()
                ),
                Err(e) => log::warn!("Conversion of {} ended: {}", job.input.display(), e),
            }
            let _ = events.send(WorkerEvent::from_outcome(outcome));
        })?;

    Ok(WorkerHandle { cancel, thread })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use convert_core::document::{ExtractedImage, OcrDocument, SourceImages};
    use convert_core::plugin::{DocumentWriter, ImageSource, OcrEngine};
    use convert_core::temp::TEMP_IMAGE_PREFIX;

    struct FakeSource {
        count: usize,
    }
    impl ImageSource for FakeSource {
        fn name(&self) -> &str {
            "Fake"
        }
        fn extract(&self, _path: &Path, _opts: &ConversionOptions) -> Result<SourceImages> {
            let images = (0..self.count)
                .map(|i| {
                    let img = image::DynamicImage::ImageLuma8(image::GrayImage::new(4, 4));
                    ExtractedImage::new(i as u32 + 1, 0, img)
                })
                .collect();
            Ok(SourceImages { images })
        }
    }

    struct SlowOcr {
        cancel_on_first: Option<CancellationToken>,
    }
    impl OcrEngine for SlowOcr {
        fn name(&self) -> &str {
            "Fake OCR"
        }
        fn recognize(&self, _path: &Path, _opts: &ConversionOptions) -> Result<String> {
            if let Some(token) = &self.cancel_on_first {
                token.cancel();
            }
            Ok("line one\nline two".to_string())
        }
    }

    struct FileWriter;
    impl DocumentWriter for FileWriter {
        fn name(&self) -> &str {
            "File"
        }
        fn extension(&self) -> &str {
            "docx"
        }
        fn write(&self, doc: &OcrDocument, path: &Path, _opts: &ConversionOptions) -> Result<()> {
            std::fs::write(path, format!("{} pages", doc.pages.len()))?;
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct RecordingLauncher {
        opened: Arc<Mutex<Vec<PathBuf>>>,
    }
    impl Launcher for RecordingLauncher {
        fn open(&self, path: &Path) {
            self.opened.lock().unwrap().push(path.to_path_buf());
        }
    }

    fn fake_pipeline(
        count: usize,
        cancel: CancellationToken,
        cancel_on_first: bool,
        events: Sender<WorkerEvent>,
    ) -> Pipeline {
        PipelineBuilder::new()
            .source(Box::new(FakeSource { count }))
            .ocr(Box::new(SlowOcr {
                cancel_on_first: cancel_on_first.then(|| cancel.clone()),
            }))
            .writer(Box::new(FileWriter))
            .progress_reporter(Box::new(move |event: &ProgressEvent| {
                let _ = events.send(WorkerEvent::from(event));
            }))
            .cancellation_token(cancel)
            .build()
            .unwrap()
    }

    fn job(dir: &Path, open_outputs: bool) -> ConversionJob {
        ConversionJob {
            input: dir.join("scan.pdf"),
            output: dir.join("scan.docx"),
            options: ConversionOptions {
                temp_dir: Some(dir.to_path_buf()),
                open_outputs,
                ..Default::default()
            },
        }
    }

    fn collect_until_final(rx: &crossbeam_channel::Receiver<WorkerEvent>) -> Vec<WorkerEvent> {
        let mut events = Vec::new();
        loop {
            let event = rx
                .recv_timeout(std::time::Duration::from_secs(10))
                .expect("worker stopped without a final event");
            let done = event.is_final();
            events.push(event);
            if done {
                return events;
            }
        }
    }

    fn temp_images_left(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(TEMP_IMAGE_PREFIX))
            .count()
    }

    #[test]
    fn test_worker_event_order() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        let launcher = RecordingLauncher::default();
        let pipeline = fake_pipeline(2, CancellationToken::new(), false, tx.clone());
        let job = job(dir.path(), true);

        let handle = spawn_with(pipeline, job.clone(), Box::new(launcher.clone()), tx).unwrap();
        let events = collect_until_final(&rx);
        handle.join();

        let stages: Vec<Stage> = events
            .iter()
            .filter_map(|e| match e {
                WorkerEvent::Stage(s) => Some(*s),
                _ => None,
            })
            .collect();
        assert_eq!(
            stages,
            vec![
                Stage::Extracting,
                Stage::Recognizing,
                Stage::Saving,
                Stage::OpeningOutputs,
                Stage::CleaningUp
            ]
        );
        assert!(events.contains(&WorkerEvent::Progress(Progress::new(2, 2))));
        match events.last() {
            Some(WorkerEvent::Completed(report)) => {
                assert_eq!(report.pages, 2);
                assert_eq!(report.lines_per_page, vec![2, 2]);
            }
            other => panic!("expected Completed, got {:?}", other),
        }

        assert_eq!(
            *launcher.opened.lock().unwrap(),
            vec![job.output.clone(), job.input.clone()]
        );
        assert!(job.output.exists());
        assert_eq!(temp_images_left(dir.path()), 0);
    }

    #[test]
    fn test_open_outputs_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        let launcher = RecordingLauncher::default();
        let pipeline = fake_pipeline(1, CancellationToken::new(), false, tx.clone());

        let handle =
            spawn_with(pipeline, job(dir.path(), false), Box::new(launcher.clone()), tx).unwrap();
        let events = collect_until_final(&rx);
        handle.join();

        assert!(!events.contains(&WorkerEvent::Stage(Stage::OpeningOutputs)));
        assert!(events.contains(&WorkerEvent::Stage(Stage::CleaningUp)));
        assert!(launcher.opened.lock().unwrap().is_empty());
    }

    #[test]
    fn test_zero_images_reports_no_images() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        let launcher = RecordingLauncher::default();
        let pipeline = fake_pipeline(0, CancellationToken::new(), false, tx.clone());
        let job = job(dir.path(), true);

        let handle = spawn_with(pipeline, job.clone(), Box::new(launcher.clone()), tx).unwrap();
        let events = collect_until_final(&rx);
        handle.join();

        assert_eq!(events.last(), Some(&WorkerEvent::NoImages));
        assert!(!events
            .iter()
            .any(|e| matches!(e, WorkerEvent::Progress(_))));
        assert!(!job.output.exists());
        assert!(launcher.opened.lock().unwrap().is_empty());
    }

    #[test]
    fn test_cancel_stops_run() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        let token = CancellationToken::new();
        let pipeline = fake_pipeline(4, token, true, tx.clone());
        let job = job(dir.path(), true);

        let handle = spawn_with(
            pipeline,
            job.clone(),
            Box::new(RecordingLauncher::default()),
            tx,
        )
        .unwrap();
        let events = collect_until_final(&rx);
        handle.join();

        assert_eq!(events.last(), Some(&WorkerEvent::Cancelled));
        assert!(!job.output.exists());
        assert_eq!(temp_images_left(dir.path()), 0);
    }

    #[test]
    fn test_handle_cancel_shares_pipeline_token() {
        let (tx, _rx) = crossbeam_channel::unbounded();
        let token = CancellationToken::new();
        let pipeline = fake_pipeline(0, token.clone(), false, tx.clone());
        let dir = tempfile::tempdir().unwrap();

        let handle = spawn_with(
            pipeline,
            job(dir.path(), false),
            Box::new(RecordingLauncher::default()),
            tx,
        )
        .unwrap();
        handle.cancel();
        assert!(token.is_cancelled());
        handle.join();
    }

    #[test]
    fn test_failure_message_carries_cause() {
        let event = WorkerEvent::from_outcome(Err(ConvertError::Ocr("tesseract missing".into())));
        assert_eq!(event, WorkerEvent::Failed("OCR error: tesseract missing".to_string()));
        assert!(event.is_final());
        assert!(!WorkerEvent::Stage(Stage::Saving).is_final());
    }
}
