//! Interactive shell state, kept free of terminal I/O.
//!
//! [`Shell::handle`] takes one [`ShellInput`] (a key action, a picker result
//! or a worker event) and returns the [`ShellCommand`]s the terminal layer
//! has to carry out.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use convert_core::progress::Stage;

use crate::worker::WorkerEvent;

pub const TITLE: &str = "PDF to DOCX Converter";
pub const BROWSE_HINT: &str = "Browse your PDF File";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Browse,
    Convert,
}

impl Button {
    pub fn label(self) -> &'static str {
        match self {
            Button::Browse => "Browse",
            Button::Convert => "Convert to Word",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogKind {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmAction {
    Quit,
    CancelRun,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dialog {
    Message {
        kind: DialogKind,
        title: String,
        message: String,
    },
    Confirm {
        action: ConfirmAction,
        title: String,
        message: String,
    },
}

impl Dialog {
    fn message(kind: DialogKind, title: &str, message: impl Into<String>) -> Self {
        Dialog::Message {
            kind,
            title: title.to_string(),
            message: message.into(),
        }
    }

    fn confirm(action: ConfirmAction) -> Self {
        let (title, message) = match action {
            ConfirmAction::Quit => ("Quit", "Do you want to quit?"),
            ConfirmAction::CancelRun => ("Cancel Conversion", "Stop the running conversion?"),
        };
        Dialog::Confirm {
            action,
            title: title.to_string(),
            message: message.to_string(),
        }
    }

    fn completed(output: &Path) -> Self {
        Self::message(
            DialogKind::Info,
            "Conversion Complete",
            format!("Word document created at {}", output.display()),
        )
    }

    pub fn title(&self) -> &str {
        match self {
            Dialog::Message { title, .. } | Dialog::Confirm { title, .. } => title,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Dialog::Message { message, .. } | Dialog::Confirm { message, .. } => message,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShellInput {
    FocusNext,
    /// Press the focused button.
    Activate,
    Browse,
    Convert,
    FileChosen(PathBuf),
    BrowseCancelled,
    OutputChosen(PathBuf),
    OutputCancelled,
    Escape,
    QuitRequested,
    /// Yes/OK (`true`) or No (`false`) on the current dialog.
    Answer(bool),
    Worker(WorkerEvent),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    OpenBrowser { start_dir: Option<PathBuf> },
    PromptOutput { suggested: PathBuf },
    StartConversion { input: PathBuf, output: PathBuf },
    CancelConversion,
    Quit,
}

/// `input` with its extension replaced by `.docx`.
pub fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("docx")
}

/// Append `.docx` unless the path already ends with it (any case).
pub fn with_docx_extension(path: &Path) -> PathBuf {
    let has_docx = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("docx"));
    if has_docx {
        path.to_path_buf()
    } else {
        let mut name = path.as_os_str().to_os_string();
        name.push(".docx");
        PathBuf::from(name)
    }
}

#[derive(Debug)]
pub struct Shell {
    focus: Button,
    selected: Option<PathBuf>,
    /// Output path of the active run.
    running: Option<PathBuf>,
    stage: Stage,
    percent: u8,
    completion_shown: bool,
    dialogs: VecDeque<Dialog>,
}

impl Default for Shell {
    fn default() -> Self {
        Self::new()
    }
}

impl Shell {
    pub fn new() -> Self {
        Self {
            focus: Button::Browse,
            selected: None,
            running: None,
            stage: Stage::Idle,
            percent: 0,
            completion_shown: false,
            dialogs: VecDeque::new(),
        }
    }

    pub fn focus(&self) -> Button {
        self.focus
    }

    pub fn selected(&self) -> Option<&Path> {
        self.selected.as_deref()
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Browse and Convert accept input only between runs.
    pub fn controls_enabled(&self) -> bool {
        self.running.is_none()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn dialog(&self) -> Option<&Dialog> {
        self.dialogs.front()
    }

    pub fn selected_label(&self) -> String {
        match self.selected.as_deref().and_then(Path::file_name) {
            Some(name) => format!("Selected File: {}", name.to_string_lossy()),
            None => BROWSE_HINT.to_string(),
        }
    }

    pub fn progress_label(&self) -> String {
        if self.is_running() {
            format!("Converting: {}%", self.percent)
        } else {
            String::new()
        }
    }

    pub fn handle(&mut self, input: ShellInput) -> Vec<ShellCommand> {
        match input {
            ShellInput::Worker(event) => self.on_worker(event),
            ShellInput::QuitRequested => {
                let already_asking = matches!(
                    self.dialogs.front(),
                    Some(Dialog::Confirm {
                        action: ConfirmAction::Quit,
                        ..
                    })
                );
                if !already_asking {
                    self.dialogs.push_front(Dialog::confirm(ConfirmAction::Quit));
                }
                Vec::new()
            }
            ShellInput::Answer(yes) => self.answer(yes),
            ShellInput::Escape if !self.dialogs.is_empty() => self.answer(false),
            ShellInput::Escape => {
                if self.is_running() {
                    self.dialogs.push_back(Dialog::confirm(ConfirmAction::CancelRun));
                }
                Vec::new()
            }
            // Everything below is modal-blocked.
            _ if !self.dialogs.is_empty() => Vec::new(),
            ShellInput::FocusNext => {
                self.focus = match self.focus {
                    Button::Browse => Button::Convert,
                    Button::Convert => Button::Browse,
                };
                Vec::new()
            }
            ShellInput::Activate => match self.focus {
                Button::Browse => self.browse(),
                Button::Convert => self.convert(),
            },
            ShellInput::Browse => self.browse(),
            ShellInput::Convert => self.convert(),
            ShellInput::FileChosen(path) => {
                if self.controls_enabled() {
                    self.selected = Some(path);
                    self.focus = Button::Convert;
                }
                Vec::new()
            }
            ShellInput::OutputChosen(path) => self.start(path),
            ShellInput::BrowseCancelled | ShellInput::OutputCancelled => Vec::new(),
        }
    }

    fn browse(&mut self) -> Vec<ShellCommand> {
        if !self.controls_enabled() {
            return Vec::new();
        }
        self.reset_progress();
        let start_dir = self
            .selected
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf);
        vec![ShellCommand::OpenBrowser { start_dir }]
    }

    fn convert(&mut self) -> Vec<ShellCommand> {
        if !self.controls_enabled() {
            return Vec::new();
        }
        match &self.selected {
            Some(input) => vec![ShellCommand::PromptOutput {
                suggested: default_output_path(input),
            }],
            None => {
                self.dialogs.push_back(Dialog::message(
                    DialogKind::Warning,
                    "File Not Selected",
                    "Please select a PDF file before converting.",
                ));
                Vec::new()
            }
        }
    }

    fn start(&mut self, output: PathBuf) -> Vec<ShellCommand> {
        if !self.controls_enabled() {
            return Vec::new();
        }
        let Some(input) = self.selected.clone() else {
            return Vec::new();
        };
        let output = with_docx_extension(&output);
        self.reset_progress();
        self.completion_shown = false;
        self.running = Some(output.clone());
        vec![ShellCommand::StartConversion { input, output }]
    }

    fn answer(&mut self, yes: bool) -> Vec<ShellCommand> {
        match self.dialogs.pop_front() {
            Some(Dialog::Confirm { action, .. }) if yes => match action {
                ConfirmAction::Quit => vec![ShellCommand::Quit],
                ConfirmAction::CancelRun if self.is_running() => {
                    vec![ShellCommand::CancelConversion]
                }
                ConfirmAction::CancelRun => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    fn on_worker(&mut self, event: WorkerEvent) -> Vec<ShellCommand> {
        let Some(output) = self.running.clone() else {
            log::debug!("Ignoring worker event outside a run: {:?}", event);
            return Vec::new();
        };

        match event {
            WorkerEvent::Stage(stage) => {
                self.stage = stage;
                if stage == Stage::OpeningOutputs && !self.completion_shown {
                    self.dialogs.push_back(Dialog::completed(&output));
                    self.completion_shown = true;
                }
            }
            WorkerEvent::Progress(progress) => self.percent = progress.percent(),
            WorkerEvent::Completed(report) => {
                if !self.completion_shown {
                    self.dialogs.push_back(Dialog::completed(&report.output));
                }
                self.finish_run();
            }
            WorkerEvent::NoImages => {
                self.dialogs.push_back(Dialog::message(
                    DialogKind::Warning,
                    "No Images Found",
                    "The selected PDF contains no embedded images to recognize. \
                     No document was written.",
                ));
                self.finish_run();
            }
            WorkerEvent::Cancelled => {
                self.dialogs.push_back(Dialog::message(
                    DialogKind::Info,
                    "Conversion Cancelled",
                    "The conversion was stopped. No document was written.",
                ));
                self.finish_run();
            }
            WorkerEvent::Failed(message) => {
                self.dialogs.push_back(Dialog::message(
                    DialogKind::Error,
                    "Conversion Failed",
                    message,
                ));
                self.finish_run();
            }
        }
        Vec::new()
    }

    fn finish_run(&mut self) {
        self.running = None;
        self.completion_shown = false;
        self.reset_progress();
        self.dialogs.retain(|d| {
            !matches!(
                d,
                Dialog::Confirm {
                    action: ConfirmAction::CancelRun,
                    ..
                }
            )
        });
    }

    fn reset_progress(&mut self) {
        self.stage = Stage::Idle;
        self.percent = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convert_core::pipeline::ConversionReport;
    use convert_core::progress::Progress;

    fn shell_with_file() -> Shell {
        let mut shell = Shell::new();
        shell.handle(ShellInput::FileChosen(PathBuf::from("/scans/report.pdf")));
        shell
    }

    fn running_shell() -> Shell {
        let mut shell = shell_with_file();
        shell.handle(ShellInput::OutputChosen(PathBuf::from("/out/report")));
        shell
    }

    fn report() -> ConversionReport {
        ConversionReport {
            input: PathBuf::from("/scans/report.pdf"),
            output: PathBuf::from("/out/report.docx"),
            pages: 2,
            lines_per_page: vec![3, 4],
        }
    }

    #[test]
    fn test_docx_extension() {
        assert_eq!(
            with_docx_extension(Path::new("/tmp/out")),
            PathBuf::from("/tmp/out.docx")
        );
        assert_eq!(
            with_docx_extension(Path::new("/tmp/out.DOCX")),
            PathBuf::from("/tmp/out.DOCX")
        );
        assert_eq!(
            with_docx_extension(Path::new("notes.v2")),
            PathBuf::from("notes.v2.docx")
        );
        assert_eq!(
            default_output_path(Path::new("/scans/report.pdf")),
            PathBuf::from("/scans/report.docx")
        );
    }

    #[test]
    fn test_convert_without_file_warns() {
        let mut shell = Shell::new();
        let commands = shell.handle(ShellInput::Convert);
        assert!(commands.is_empty());
        let dialog = shell.dialog().unwrap();
        assert_eq!(dialog.title(), "File Not Selected");
        assert_eq!(dialog.text(), "Please select a PDF file before converting.");

        // Dismissing the warning leaves the shell usable.
        shell.handle(ShellInput::Answer(true));
        assert!(shell.dialog().is_none());
        assert!(shell.controls_enabled());
    }

    #[test]
    fn test_browse_then_convert_prompts_for_output() {
        let mut shell = Shell::new();
        assert_eq!(shell.selected_label(), BROWSE_HINT);
        assert_eq!(
            shell.handle(ShellInput::Activate),
            vec![ShellCommand::OpenBrowser { start_dir: None }]
        );

        shell.handle(ShellInput::FileChosen(PathBuf::from("/scans/report.pdf")));
        assert_eq!(shell.selected_label(), "Selected File: report.pdf");
        assert_eq!(shell.focus(), Button::Convert);

        assert_eq!(
            shell.handle(ShellInput::Activate),
            vec![ShellCommand::PromptOutput {
                suggested: PathBuf::from("/scans/report.docx")
            }]
        );
    }

    #[test]
    fn test_output_chosen_starts_run_and_disables_controls() {
        let mut shell = shell_with_file();
        let commands = shell.handle(ShellInput::OutputChosen(PathBuf::from("/out/report")));
        assert_eq!(
            commands,
            vec![ShellCommand::StartConversion {
                input: PathBuf::from("/scans/report.pdf"),
                output: PathBuf::from("/out/report.docx"),
            }]
        );
        assert!(!shell.controls_enabled());
        assert_eq!(shell.progress_label(), "Converting: 0%");

        // Both buttons are inert while running.
        assert!(shell.handle(ShellInput::Browse).is_empty());
        assert!(shell.handle(ShellInput::Convert).is_empty());
        assert!(shell
            .handle(ShellInput::OutputChosen(PathBuf::from("/out/again.docx")))
            .is_empty());
    }

    #[test]
    fn test_output_cancelled_does_nothing() {
        let mut shell = shell_with_file();
        assert!(shell.handle(ShellInput::OutputCancelled).is_empty());
        assert!(shell.controls_enabled());
    }

    #[test]
    fn test_progress_label_follows_worker() {
        let mut shell = running_shell();
        shell.handle(ShellInput::Worker(WorkerEvent::Stage(Stage::Recognizing)));
        shell.handle(ShellInput::Worker(WorkerEvent::Progress(Progress::new(1, 3))));
        assert_eq!(shell.progress_label(), "Converting: 33%");
        assert_eq!(shell.percent(), 33);
        assert_eq!(shell.stage(), Stage::Recognizing);

        shell.handle(ShellInput::Worker(WorkerEvent::Progress(Progress::new(3, 3))));
        assert_eq!(shell.progress_label(), "Converting: 100%");
    }

    #[test]
    fn test_completion_dialog_before_opening_outputs() {
        let mut shell = running_shell();
        shell.handle(ShellInput::Worker(WorkerEvent::Stage(Stage::Saving)));
        assert!(shell.dialog().is_none());

        shell.handle(ShellInput::Worker(WorkerEvent::Stage(Stage::OpeningOutputs)));
        assert_eq!(
            shell.dialog().map(Dialog::text),
            Some("Word document created at /out/report.docx")
        );
        // Still running until the worker reports completion.
        assert!(!shell.controls_enabled());

        shell.handle(ShellInput::Worker(WorkerEvent::Stage(Stage::CleaningUp)));
        shell.handle(ShellInput::Worker(WorkerEvent::Completed(report())));
        assert!(shell.controls_enabled());
        assert_eq!(shell.percent(), 0);
        assert_eq!(shell.progress_label(), "");
        assert_eq!(shell.stage(), Stage::Idle);

        // Only one completion dialog.
        shell.handle(ShellInput::Answer(true));
        assert!(shell.dialog().is_none());
    }

    #[test]
    fn test_completion_without_opening_outputs() {
        let mut shell = running_shell();
        shell.handle(ShellInput::Worker(WorkerEvent::Completed(report())));
        assert_eq!(shell.dialog().unwrap().title(), "Conversion Complete");
        assert!(shell.controls_enabled());
    }

    #[test]
    fn test_no_images_warning() {
        let mut shell = running_shell();
        shell.handle(ShellInput::Worker(WorkerEvent::NoImages));
        match shell.dialog() {
            Some(Dialog::Message { kind, title, .. }) => {
                assert_eq!(*kind, DialogKind::Warning);
                assert_eq!(title, "No Images Found");
            }
            other => panic!("expected warning, got {:?}", other),
        }
        assert!(shell.controls_enabled());
    }

    #[test]
    fn test_failure_shows_error_and_reenables() {
        let mut shell = running_shell();
        shell.handle(ShellInput::Worker(WorkerEvent::Progress(Progress::new(1, 2))));
        shell.handle(ShellInput::Worker(WorkerEvent::Failed(
            "OCR error: image 2 (page 1): boom".to_string(),
        )));
        match shell.dialog() {
            Some(Dialog::Message { kind, message, .. }) => {
                assert_eq!(*kind, DialogKind::Error);
                assert!(message.contains("boom"));
            }
            other => panic!("expected error, got {:?}", other),
        }
        assert!(shell.controls_enabled());
        assert_eq!(shell.percent(), 0);
    }

    #[test]
    fn test_escape_cancels_running_conversion() {
        let mut shell = running_shell();
        assert!(shell.handle(ShellInput::Escape).is_empty());
        assert_eq!(shell.dialog().unwrap().title(), "Cancel Conversion");

        assert_eq!(
            shell.handle(ShellInput::Answer(true)),
            vec![ShellCommand::CancelConversion]
        );

        shell.handle(ShellInput::Worker(WorkerEvent::Cancelled));
        assert_eq!(shell.dialog().unwrap().title(), "Conversion Cancelled");
        assert!(shell.controls_enabled());
    }

    #[test]
    fn test_stale_cancel_prompt_dropped_when_run_ends() {
        let mut shell = running_shell();
        shell.handle(ShellInput::Escape);
        shell.handle(ShellInput::Worker(WorkerEvent::Completed(report())));

        assert_eq!(shell.dialog().unwrap().title(), "Conversion Complete");
        shell.handle(ShellInput::Answer(true));
        assert!(shell.dialog().is_none());
    }

    #[test]
    fn test_quit_requires_confirmation() {
        let mut shell = Shell::new();
        assert!(shell.handle(ShellInput::QuitRequested).is_empty());
        assert_eq!(shell.dialog().unwrap().text(), "Do you want to quit?");

        // Asking twice does not stack dialogs.
        shell.handle(ShellInput::QuitRequested);
        assert!(shell.handle(ShellInput::Answer(false)).is_empty());
        assert!(shell.dialog().is_none());

        shell.handle(ShellInput::QuitRequested);
        assert_eq!(
            shell.handle(ShellInput::Answer(true)),
            vec![ShellCommand::Quit]
        );
    }

    #[test]
    fn test_quit_during_run() {
        let mut shell = running_shell();
        shell.handle(ShellInput::QuitRequested);
        assert_eq!(
            shell.handle(ShellInput::Answer(true)),
            vec![ShellCommand::Quit]
        );
    }

    #[test]
    fn test_dialog_blocks_buttons() {
        let mut shell = shell_with_file();
        shell.handle(ShellInput::QuitRequested);
        assert!(shell.handle(ShellInput::Convert).is_empty());
        assert!(shell.handle(ShellInput::Browse).is_empty());
    }

    #[test]
    fn test_browse_resets_progress_and_starts_in_file_dir() {
        let mut shell = running_shell();
        shell.handle(ShellInput::Worker(WorkerEvent::Completed(report())));
        shell.handle(ShellInput::Answer(true));

        assert_eq!(
            shell.handle(ShellInput::Browse),
            vec![ShellCommand::OpenBrowser {
                start_dir: Some(PathBuf::from("/scans"))
            }]
        );
        assert_eq!(shell.percent(), 0);
        assert_eq!(shell.stage(), Stage::Idle);
    }

    #[test]
    fn test_worker_events_ignored_when_idle() {
        let mut shell = Shell::new();
        shell.handle(ShellInput::Worker(WorkerEvent::Completed(report())));
        assert!(shell.dialog().is_none());
    }
}
