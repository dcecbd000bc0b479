use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use convert_core::error::{ConvertError, Result};
use convert_core::options::ConversionOptions;

const INSTALL_HINT: &str = "Tesseract OCR is required for text recognition. \
     Install with: brew install tesseract (macOS), apt install tesseract-ocr (Linux) \
     or the UB Mannheim installer (Windows), or set tesseract_cmd in the config file";

/// Check that the configured tesseract executable can be started.
pub fn check_tesseract(command: &Path) -> Result<()> {
    let output = Command::new(command)
        .arg("--version")
        .output()
        .map_err(|e| {
            ConvertError::Ocr(format!(
                "Cannot run '{}': {}. {}",
                command.display(),
                e,
                INSTALL_HINT
            ))
        })?;

    if !output.status.success() {
        return Err(ConvertError::Ocr(format!(
            "'{} --version' exited with {}. {}",
            command.display(),
            output.status,
            INSTALL_HINT
        )));
    }

    // Older releases print the version banner on stderr.
    let banner = if output.stdout.is_empty() {
        &output.stderr
    } else {
        &output.stdout
    };
    if let Some(line) = String::from_utf8_lossy(banner).lines().next() {
        log::debug!("Using {}", line.trim());
    }
    Ok(())
}

/// Arguments for recognizing one image and printing the text on stdout.
pub fn tesseract_args(image_path: &Path, language: &str, psm: Option<u8>) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        image_path.as_os_str().to_os_string(),
        "stdout".into(),
        "-l".into(),
        language.into(),
    ];
    if let Some(psm) = psm {
        args.push("--psm".into());
        args.push(psm.to_string().into());
    }
    // No form feed after the page text.
    args.push("-c".into());
    args.push("page_separator=".into());
    args
}

/// Line endings are normalized to `\n`; nothing else is touched.
fn normalize_text(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).replace("\r\n", "\n")
}

/// OCR engine backed by the `tesseract` command-line program.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    command: PathBuf,
}

impl TesseractEngine {
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn from_options(options: &ConversionOptions) -> Self {
        Self::new(options.tesseract_cmd.clone())
    }

    pub fn command(&self) -> &Path {
        &self.command
    }

    pub(crate) fn run(&self, image_path: &Path, options: &ConversionOptions) -> Result<String> {
        let output = Command::new(&self.command)
            .args(tesseract_args(
                image_path,
                &options.ocr_language,
                options.ocr_psm,
            ))
            .output()
            .map_err(|e| {
                ConvertError::Ocr(format!(
                    "Cannot run '{}': {}. {}",
                    self.command.display(),
                    e,
                    INSTALL_HINT
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ConvertError::Ocr(format!(
                "tesseract failed on {}: {}",
                image_path.display(),
                stderr.trim()
            )));
        }

        let text = normalize_text(&output.stdout);
        log::debug!(
            "Recognized {} lines from {}",
            text.lines().count(),
            image_path.display()
        );
        Ok(text)
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new("tesseract")
    }
}
