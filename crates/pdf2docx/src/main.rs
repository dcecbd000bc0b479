//! pdf2docx: turn scanned PDFs into editable Word documents with Tesseract OCR.
//!
//! Two modes:
//! - Interactive: `pdf2docx` opens the terminal shell (browse, convert, progress).
//! - Headless: `pdf2docx convert scan.pdf [-o scan.docx]`.

mod app;
mod headless;
mod launch;
mod picker;
mod ui;
mod worker;

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::Result;
use clap::{Parser, Subcommand};

use convert_core::options::ConversionOptions;

use crate::app::{default_output_path, with_docx_extension};
use crate::worker::ConversionJob;

const APP_DIR: &str = "pdf2docx";
const LOCAL_CONFIG: &str = ".pdf2docx.toml";

#[derive(Parser)]
#[command(
    name = "pdf2docx",
    version,
    about = "Convert scanned PDFs to Word documents with Tesseract OCR"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Page margin on all sides, in inches (default: 1)
    #[arg(long, global = true)]
    margin: Option<f64>,

    /// Paragraph font size in points (default: 12)
    #[arg(long, global = true)]
    font_size: Option<f64>,

    /// Space before each paragraph in points (default: 12)
    #[arg(long, global = true)]
    space_before: Option<f64>,

    /// Tesseract language code, e.g. eng or deu+eng (default: eng)
    #[arg(short = 'l', long = "lang", global = true)]
    lang: Option<String>,

    /// Path to the tesseract executable
    #[arg(long, global = true)]
    tesseract: Option<PathBuf>,

    /// Tesseract page segmentation mode (0-13)
    #[arg(long, global = true, value_parser = clap::value_parser!(u8).range(0..=13))]
    psm: Option<u8>,

    /// Directory for temporary page images (default: current directory)
    #[arg(long, global = true)]
    temp_dir: Option<PathBuf>,

    /// Do not open the document and the PDF after converting
    #[arg(long, global = true)]
    no_open: bool,

    /// Log file for the interactive shell
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Dump effective merged config as TOML and exit
    #[arg(long, global = true)]
    dump_config: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert one PDF without the interactive shell
    Convert {
        /// Input PDF
        input: PathBuf,

        /// Output document (default: input with a .docx extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Read one config file. A missing file is not an error.
fn read_table(path: &Path, warnings: &mut Vec<String>) -> Option<toml::Table> {
    let contents = fs::read_to_string(path).ok()?;
    match contents.parse::<toml::Table>() {
        Ok(table) => Some(table),
        Err(e) => {
            warnings.push(format!("Failed to parse {}: {}", path.display(), e));
            None
        }
    }
}

/// Merge the global and project-local config files, key by key.
///
/// Keys in the local file override the same keys in the global file; keys
/// set in neither keep their defaults. Problems come back as warnings since
/// logging is configured from the result.
fn load_config_from(global: Option<&Path>, local: &Path) -> (ConversionOptions, Vec<String>) {
    let mut warnings = Vec::new();
    let mut merged = toml::Table::new();

    let files = global.into_iter().chain(std::iter::once(local));
    for path in files {
        if let Some(table) = read_table(path, &mut warnings) {
            merged.extend(table);
        }
    }

    match toml::Value::Table(merged).try_into::<ConversionOptions>() {
        Ok(opts) => (opts, warnings),
        Err(e) => {
            warnings.push(format!("Ignoring config files: {}", e));
            (ConversionOptions::default(), warnings)
        }
    }
}

/// Global `<config dir>/pdf2docx/config.toml`, then `./.pdf2docx.toml`.
fn load_config() -> (ConversionOptions, Vec<String>) {
    let global = dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"));
    load_config_from(global.as_deref(), Path::new(LOCAL_CONFIG))
}

/// Apply CLI flags on top of config-loaded options.
/// Only overrides when the CLI flag was explicitly provided.
fn apply_cli_overrides(opts: &mut ConversionOptions, cli: &Cli) {
    if cli.verbose > 0 {
        opts.verbose = cli.verbose;
    }
    if let Some(margin) = cli.margin {
        opts.margin_inches = margin.max(0.0);
    }
    if let Some(size) = cli.font_size {
        opts.font_size = size;
    }
    if let Some(space) = cli.space_before {
        opts.space_before = space.max(0.0);
    }
    if let Some(lang) = &cli.lang {
        opts.ocr_language = lang.clone();
    }
    if let Some(cmd) = &cli.tesseract {
        opts.tesseract_cmd = cmd.clone();
    }
    if cli.psm.is_some() {
        opts.ocr_psm = cli.psm;
    }
    if cli.temp_dir.is_some() {
        opts.temp_dir = cli.temp_dir.clone();
    }
    if cli.no_open {
        opts.open_outputs = false;
    }
    if cli.log_file.is_some() {
        opts.log_file = cli.log_file.clone();
    }
}

/// The shell owns the terminal, so it logs less and never to stderr.
fn default_filter(verbose: u8, interactive: bool) -> &'static str {
    match (interactive, verbose) {
        (true, 0) => "warn",
        (true, 1) | (false, 0) => "info",
        (true, 2) | (false, 1) => "debug",
        _ => "trace",
    }
}

fn log_path(opts: &ConversionOptions) -> Option<PathBuf> {
    opts.log_file
        .clone()
        .or_else(|| dirs::cache_dir().map(|dir| dir.join(APP_DIR).join("pdf2docx.log")))
}

fn open_log(path: &Path) -> io::Result<fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

fn init_logging(opts: &ConversionOptions, interactive: bool) {
    let filter = default_filter(opts.verbose, interactive);
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter));

    if interactive {
        let target: Box<dyn Write + Send> = match log_path(opts).map(|p| open_log(&p)) {
            Some(Ok(file)) => Box::new(file),
            _ => Box::new(io::sink()),
        };
        builder.target(env_logger::Target::Pipe(target));
    }
    builder.init();
}

fn main() {
    let cli = Cli::parse();

    let (mut opts, warnings) = load_config();
    apply_cli_overrides(&mut opts, &cli);

    if cli.dump_config {
        for warning in &warnings {
            eprintln!("Warning: {}", warning);
        }
        match toml::to_string_pretty(&opts) {
            Ok(s) => {
                println!("{}", s);
                process::exit(0);
            }
            Err(e) => {
                eprintln!("Error serializing config: {}", e);
                process::exit(1);
            }
        }
    }

    let interactive = cli.command.is_none();
    init_logging(&opts, interactive);
    for warning in &warnings {
        log::warn!("{}", warning);
    }

    let result = match cli.command {
        Some(Commands::Convert { input, output }) => {
            let output = match output {
                Some(path) => with_docx_extension(&path),
                None => default_output_path(&input),
            };
            headless::run(ConversionJob {
                input,
                output,
                options: opts,
            })
        }
        None => ui::run(opts),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
