//! `pdf2docx convert`: one conversion without the interactive shell.

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use convert_core::cancel::CancellationToken;
use convert_core::error::ConvertError;
use convert_core::progress::{ProgressEvent, Stage};

use crate::launch::SystemLauncher;
use crate::worker::{execute, pdf_pipeline, ConversionJob};

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

fn show(pb: &ProgressBar, event: &ProgressEvent) {
    match event {
        ProgressEvent::Stage(stage) => {
            if *stage == Stage::Recognizing {
                pb.set_position(0);
            }
            pb.set_message(stage.to_string());
        }
        ProgressEvent::Progress(progress) => {
            pb.set_length(progress.total as u64);
            pb.set_position(progress.done as u64);
            pb.set_message(format!("Converting: {}%", progress.percent()));
        }
    }
}

pub fn run(job: ConversionJob) -> Result<()> {
    if job.input == job.output {
        bail!("Output path must differ from the input PDF");
    }

    let pb = progress_bar();
    let reporter_pb = pb.clone();
    let pipeline = pdf_pipeline(
        &job.options,
        Box::new(move |event: &ProgressEvent| show(&reporter_pb, event)),
        CancellationToken::new(),
    )?;

    let on_event = |event: &ProgressEvent| show(&pb, event);
    let outcome = execute(&pipeline, &job, &SystemLauncher, &on_event);

    match outcome {
        Ok(report) => {
            pb.finish_with_message("Done!");
            println!(
                "Word document created at {} ({} pages, {} paragraphs)",
                report.output.display(),
                report.pages,
                report.paragraphs()
            );
            Ok(())
        }
        Err(ConvertError::NoEmbeddedImages) => {
            pb.abandon_with_message("No images");
            bail!(
                "{} contains no embedded images; no document was written",
                job.input.display()
            )
        }
        Err(e) => {
            pb.abandon_with_message("Failed");
            Err(e).with_context(|| format!("Failed to convert {}", job.input.display()))
        }
    }
}
