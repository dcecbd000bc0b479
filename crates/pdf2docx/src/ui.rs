//! Terminal front end for the interactive shell.
//!
//! Owns the terminal, maps keys to [`ShellInput`]s, carries out the
//! [`ShellCommand`]s the shell returns and redraws every tick.

use std::io::{self, Stdout, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::{Receiver, Sender};
use crossterm::{
    cursor::{self, MoveTo},
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute, queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};

use convert_core::options::ConversionOptions;
use convert_core::progress::Stage;

use crate::app::{Button, Dialog, DialogKind, Shell, ShellCommand, ShellInput, TITLE};
use crate::picker::{FileBrowser, PathPrompt};
use crate::worker::{self, ConversionJob, WorkerEvent, WorkerHandle};

const TICK: Duration = Duration::from_millis(100);
const BAR_WIDTH: usize = 40;
const MAIN_HINTS: &str = "Tab: switch  Enter: press  b: browse  c: convert  Esc: cancel  q: quit";
const BROWSER_HINTS: &str = "Up/Down: move  Enter: open  Backspace: parent  Esc: back";
const PROMPT_HINTS: &str = "Enter: save  Esc: back";

/// Raw mode and the alternate screen, restored on drop.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen, cursor::Hide) {
            let _ = terminal::disable_raw_mode();
            return Err(e);
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), cursor::Show, LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

enum Screen {
    Main,
    Browser(FileBrowser),
    Prompt(PathPrompt),
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Run the interactive shell until the user confirms quitting.
pub fn run(options: ConversionOptions) -> Result<()> {
    let _guard = TerminalGuard::enter()?;
    let mut ui = Ui::new(options);
    let result = ui.event_loop();
    ui.shutdown();
    result
}

struct Ui {
    shell: Shell,
    screen: Screen,
    options: ConversionOptions,
    events_tx: Sender<WorkerEvent>,
    events_rx: Receiver<WorkerEvent>,
    worker: Option<WorkerHandle>,
    /// One-line notice for picker errors.
    status: Option<String>,
}

impl Ui {
    fn new(options: ConversionOptions) -> Self {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        Self {
            shell: Shell::new(),
            screen: Screen::Main,
            options,
            events_tx,
            events_rx,
            worker: None,
            status: None,
        }
    }

    fn event_loop(&mut self) -> Result<()> {
        let mut out = io::stdout();
        loop {
            self.drain_worker();
            self.draw(&mut out)?;

            if !event::poll(TICK)? {
                continue;
            }
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if self.on_key(key) == Flow::Quit {
                return Ok(());
            }
        }
    }

    fn drain_worker(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            let last = event.is_final();
            self.shell.handle(ShellInput::Worker(event));
            if last {
                if let Some(handle) = self.worker.take() {
                    handle.join();
                }
            }
        }
    }

    /// Stop a running conversion and wait for its thread.
    fn shutdown(&mut self) {
        if let Some(handle) = self.worker.take() {
            log::info!("Stopping conversion before exit");
            handle.cancel();
            handle.join();
        }
    }

    fn on_key(&mut self, key: KeyEvent) -> Flow {
        if is_interrupt(&key) {
            self.screen = Screen::Main;
            return self.dispatch(ShellInput::QuitRequested);
        }

        let input = match &mut self.screen {
            Screen::Main => main_key(&key, self.shell.dialog().is_some()),
            Screen::Browser(browser) => match browser_key(browser, &key) {
                Ok(BrowserOutcome::Stay) => None,
                Ok(BrowserOutcome::Chosen(path)) => Some(ShellInput::FileChosen(path)),
                Ok(BrowserOutcome::Cancelled) => Some(ShellInput::BrowseCancelled),
                Err(e) => {
                    log::warn!("Cannot list directory: {}", e);
                    self.status = Some(format!("Cannot open folder: {}", e));
                    None
                }
            },
            Screen::Prompt(prompt) => prompt_key(prompt, &key),
        };

        let Some(input) = input else {
            return Flow::Continue;
        };
        if matches!(
            input,
            ShellInput::FileChosen(_)
                | ShellInput::BrowseCancelled
                | ShellInput::OutputChosen(_)
                | ShellInput::OutputCancelled
        ) {
            self.screen = Screen::Main;
            self.status = None;
        }
        self.dispatch(input)
    }

    fn dispatch(&mut self, input: ShellInput) -> Flow {
        let mut flow = Flow::Continue;
        for command in self.shell.handle(input) {
            if self.execute(command) == Flow::Quit {
                flow = Flow::Quit;
            }
        }
        flow
    }

    fn execute(&mut self, command: ShellCommand) -> Flow {
        match command {
            ShellCommand::OpenBrowser { start_dir } => {
                let dir = start_dir
                    .or_else(|| std::env::current_dir().ok())
                    .unwrap_or_else(|| PathBuf::from("."));
                match FileBrowser::open(&dir).or_else(|_| FileBrowser::open(Path::new("."))) {
                    Ok(browser) => self.screen = Screen::Browser(browser),
                    Err(e) => {
                        log::warn!("Cannot open file browser at {}: {}", dir.display(), e);
                        self.status = Some(format!("Cannot open folder: {}", e));
                    }
                }
            }
            ShellCommand::PromptOutput { suggested } => {
                self.screen = Screen::Prompt(PathPrompt::new(&suggested));
            }
            ShellCommand::StartConversion { input, output } => {
                let job = ConversionJob {
                    input,
                    output,
                    options: self.options.clone(),
                };
                match worker::spawn(job, self.events_tx.clone()) {
                    Ok(handle) => self.worker = Some(handle),
                    Err(e) => {
                        log::error!("Failed to start conversion: {}", e);
                        self.shell.handle(ShellInput::Worker(WorkerEvent::Failed(format!(
                            "Could not start the conversion: {}",
                            e
                        ))));
                    }
                }
            }
            ShellCommand::CancelConversion => {
                if let Some(handle) = &self.worker {
                    log::info!("Cancelling conversion");
                    handle.cancel();
                }
            }
            ShellCommand::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    fn draw(&self, out: &mut Stdout) -> io::Result<()> {
        let (width, height) = terminal::size().unwrap_or((80, 24));
        queue!(out, Clear(ClearType::All))?;
        draw_title(out, width)?;

        match &self.screen {
            Screen::Main => self.draw_main(out, width)?,
            Screen::Browser(browser) => draw_browser(out, browser, width, height)?,
            Screen::Prompt(prompt) => draw_prompt(out, prompt, width)?,
        }

        if let Some(status) = &self.status {
            queue!(
                out,
                MoveTo(1, height.saturating_sub(2)),
                SetForegroundColor(Color::Red),
                Print(truncate(status, (width as usize).saturating_sub(2))),
                ResetColor
            )?;
        }

        let hints = match self.screen {
            Screen::Main => MAIN_HINTS,
            Screen::Browser(_) => BROWSER_HINTS,
            Screen::Prompt(_) => PROMPT_HINTS,
        };
        queue!(
            out,
            MoveTo(1, height.saturating_sub(1)),
            SetForegroundColor(Color::DarkGrey),
            Print(truncate(hints, (width as usize).saturating_sub(2))),
            ResetColor
        )?;

        if let (Screen::Main, Some(dialog)) = (&self.screen, self.shell.dialog()) {
            draw_dialog(out, dialog, width, height)?;
        }
        out.flush()
    }

    fn draw_main(&self, out: &mut Stdout, width: u16) -> io::Result<()> {
        let enabled = self.shell.controls_enabled();
        queue!(out, MoveTo(2, 3))?;
        for button in [Button::Browse, Button::Convert] {
            let label = format!("[ {} ]", button.label());
            if !enabled {
                queue!(out, SetForegroundColor(Color::DarkGrey), Print(label))?;
            } else if self.shell.focus() == button {
                queue!(
                    out,
                    SetAttribute(Attribute::Reverse),
                    Print(label),
                    SetAttribute(Attribute::Reset)
                )?;
            } else {
                queue!(out, Print(label))?;
            }
            queue!(out, ResetColor, Print("  "))?;
        }

        let max = width.saturating_sub(4) as usize;
        queue!(
            out,
            MoveTo(2, 5),
            Print(truncate(&self.shell.selected_label(), max))
        )?;

        if self.shell.is_running() {
            queue!(
                out,
                MoveTo(2, 7),
                Print(self.shell.progress_label()),
                MoveTo(2, 8),
                SetForegroundColor(Color::Cyan),
                Print(progress_bar(self.shell.percent(), BAR_WIDTH)),
                ResetColor
            )?;
            if self.shell.stage() != Stage::Idle {
                queue!(
                    out,
                    MoveTo(2, 9),
                    SetForegroundColor(Color::DarkGrey),
                    Print(self.shell.stage().to_string()),
                    ResetColor
                )?;
            }
        }
        Ok(())
    }
}

fn draw_title(out: &mut Stdout, width: u16) -> io::Result<()> {
    let col = (width as usize).saturating_sub(TITLE.len()) / 2;
    queue!(
        out,
        MoveTo(col as u16, 1),
        SetAttribute(Attribute::Bold),
        Print(TITLE),
        SetAttribute(Attribute::Reset)
    )
}

fn draw_browser(out: &mut Stdout, browser: &FileBrowser, width: u16, height: u16) -> io::Result<()> {
    let max = width.saturating_sub(6) as usize;
    queue!(
        out,
        MoveTo(2, 3),
        SetForegroundColor(Color::Yellow),
        Print(truncate(&format!("Open PDF: {}", browser.dir().display()), max)),
        ResetColor
    )?;

    let rows = height.saturating_sub(8).max(1) as usize;
    let offset = browser.selected().saturating_sub(rows - 1);
    for (i, entry) in browser.entries().iter().enumerate().skip(offset).take(rows) {
        let row = 5 + (i - offset) as u16;
        let name = if entry.is_dir {
            format!("{}/", entry.name)
        } else {
            entry.name.clone()
        };
        if i == browser.selected() {
            queue!(
                out,
                MoveTo(2, row),
                SetForegroundColor(Color::Green),
                Print("▶ "),
                ResetColor,
                Print(truncate(&name, max))
            )?;
        } else {
            let color = if entry.is_dir { Color::Blue } else { Color::Reset };
            queue!(
                out,
                MoveTo(4, row),
                SetForegroundColor(color),
                Print(truncate(&name, max)),
                ResetColor
            )?;
        }
    }
    Ok(())
}

fn draw_prompt(out: &mut Stdout, prompt: &PathPrompt, width: u16) -> io::Result<()> {
    queue!(
        out,
        MoveTo(2, 3),
        SetForegroundColor(Color::Yellow),
        Print("Save Word document as:"),
        ResetColor,
        MoveTo(2, 5)
    )?;

    let chars: Vec<char> = prompt.text().chars().collect();
    let visible = width.saturating_sub(6) as usize;
    let start = (prompt.cursor() + 1).saturating_sub(visible);
    for (i, c) in chars.iter().enumerate().skip(start).take(visible) {
        if i == prompt.cursor() {
            queue!(
                out,
                SetAttribute(Attribute::Reverse),
                Print(c),
                SetAttribute(Attribute::Reset)
            )?;
        } else {
            queue!(out, Print(c))?;
        }
    }
    if prompt.cursor() == chars.len() {
        queue!(
            out,
            SetAttribute(Attribute::Reverse),
            Print(' '),
            SetAttribute(Attribute::Reset)
        )?;
    }
    Ok(())
}

fn draw_dialog(out: &mut Stdout, dialog: &Dialog, width: u16, height: u16) -> io::Result<()> {
    let box_width = (width as usize).saturating_sub(4).clamp(20, 60);
    let inner = box_width - 4;
    let lines = wrap(dialog.text(), inner);
    let box_height = lines.len() + 5;
    let left = ((width as usize).saturating_sub(box_width) / 2) as u16;
    let top = ((height as usize).saturating_sub(box_height) / 2) as u16;

    let color = match dialog {
        Dialog::Message {
            kind: DialogKind::Error,
            ..
        } => Color::Red,
        Dialog::Message {
            kind: DialogKind::Warning,
            ..
        } => Color::Yellow,
        Dialog::Message { .. } => Color::Green,
        Dialog::Confirm { .. } => Color::Cyan,
    };
    let answers = match dialog {
        Dialog::Message { .. } => "[Enter] OK",
        Dialog::Confirm { .. } => "[y] Yes  [n] No",
    };

    let border = format!("+{}+", "-".repeat(box_width - 2));
    let blank = format!("|{}|", " ".repeat(box_width - 2));
    queue!(out, SetForegroundColor(color))?;
    for row in 0..box_height {
        let line = if row == 0 || row + 1 == box_height {
            &border
        } else {
            &blank
        };
        queue!(out, MoveTo(left, top + row as u16), Print(line))?;
    }
    queue!(
        out,
        MoveTo(left + 2, top + 1),
        SetAttribute(Attribute::Bold),
        Print(truncate(dialog.title(), inner)),
        SetAttribute(Attribute::Reset),
        ResetColor
    )?;
    for (i, line) in lines.iter().enumerate() {
        queue!(out, MoveTo(left + 2, top + 3 + i as u16), Print(line))?;
    }
    queue!(
        out,
        MoveTo(left + 2, top + box_height as u16 - 1),
        SetForegroundColor(color),
        Print(format!(" {} ", answers)),
        ResetColor
    )
}

fn is_interrupt(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c')
}

/// Keys on the main screen.
fn main_key(key: &KeyEvent, dialog_open: bool) -> Option<ShellInput> {
    if dialog_open {
        return match key.code {
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                Some(ShellInput::Answer(true))
            }
            KeyCode::Char('n') | KeyCode::Char('N') => Some(ShellInput::Answer(false)),
            KeyCode::Esc => Some(ShellInput::Escape),
            _ => None,
        };
    }
    match key.code {
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Left | KeyCode::Right => {
            Some(ShellInput::FocusNext)
        }
        KeyCode::Enter | KeyCode::Char(' ') => Some(ShellInput::Activate),
        KeyCode::Char('b') => Some(ShellInput::Browse),
        KeyCode::Char('c') => Some(ShellInput::Convert),
        KeyCode::Char('q') => Some(ShellInput::QuitRequested),
        KeyCode::Esc => Some(ShellInput::Escape),
        _ => None,
    }
}

#[derive(Debug, PartialEq)]
enum BrowserOutcome {
    Stay,
    Chosen(PathBuf),
    Cancelled,
}

fn browser_key(browser: &mut FileBrowser, key: &KeyEvent) -> io::Result<BrowserOutcome> {
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => browser.move_up(),
        KeyCode::Down | KeyCode::Char('j') => browser.move_down(),
        KeyCode::Backspace | KeyCode::Left => browser.go_up()?,
        KeyCode::Enter | KeyCode::Right => {
            if let Some(path) = browser.activate()? {
                return Ok(BrowserOutcome::Chosen(path));
            }
        }
        KeyCode::Esc => return Ok(BrowserOutcome::Cancelled),
        _ => {}
    }
    Ok(BrowserOutcome::Stay)
}

fn prompt_key(prompt: &mut PathPrompt, key: &KeyEvent) -> Option<ShellInput> {
    match key.code {
        KeyCode::Enter => return prompt.value().map(ShellInput::OutputChosen),
        KeyCode::Esc => return Some(ShellInput::OutputCancelled),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => prompt.insert(c),
        KeyCode::Backspace => prompt.backspace(),
        KeyCode::Delete => prompt.delete(),
        KeyCode::Left => prompt.left(),
        KeyCode::Right => prompt.right(),
        KeyCode::Home => prompt.home(),
        KeyCode::End => prompt.end(),
        _ => {}
    }
    None
}

fn progress_bar(percent: u8, width: usize) -> String {
    let filled = width * percent.min(100) as usize / 100;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

/// Greedy word wrap; words longer than `width` are split.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        let word: String = word.into_iter().collect();
        let needed = line.chars().count() + usize::from(!line.is_empty()) + word.chars().count();
        if needed > width && !line.is_empty() {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(&word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_main_keys() {
        assert_eq!(main_key(&key(KeyCode::Tab), false), Some(ShellInput::FocusNext));
        assert_eq!(main_key(&key(KeyCode::Enter), false), Some(ShellInput::Activate));
        assert_eq!(main_key(&key(KeyCode::Char('b')), false), Some(ShellInput::Browse));
        assert_eq!(main_key(&key(KeyCode::Char('c')), false), Some(ShellInput::Convert));
        assert_eq!(
            main_key(&key(KeyCode::Char('q')), false),
            Some(ShellInput::QuitRequested)
        );
        assert_eq!(main_key(&key(KeyCode::Char('x')), false), None);
    }

    #[test]
    fn test_dialog_keys_answer() {
        assert_eq!(main_key(&key(KeyCode::Enter), true), Some(ShellInput::Answer(true)));
        assert_eq!(
            main_key(&key(KeyCode::Char('n')), true),
            Some(ShellInput::Answer(false))
        );
        assert_eq!(main_key(&key(KeyCode::Esc), true), Some(ShellInput::Escape));
        // Buttons are not reachable behind a dialog.
        assert_eq!(main_key(&key(KeyCode::Char('b')), true), None);
    }

    #[test]
    fn test_ctrl_c_interrupts() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(is_interrupt(&ctrl_c));
        assert!(!is_interrupt(&key(KeyCode::Char('c'))));
    }

    #[test]
    fn test_browser_keys_pick_pdf() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("scan.pdf"), b"%PDF").unwrap();
        let mut browser = FileBrowser::open(dir.path()).unwrap();

        assert_eq!(
            browser_key(&mut browser, &key(KeyCode::Down)).unwrap(),
            BrowserOutcome::Stay
        );
        match browser_key(&mut browser, &key(KeyCode::Enter)).unwrap() {
            BrowserOutcome::Chosen(path) => assert!(path.ends_with("scan.pdf")),
            other => panic!("expected a file, got {:?}", other),
        }
        assert_eq!(
            browser_key(&mut browser, &key(KeyCode::Esc)).unwrap(),
            BrowserOutcome::Cancelled
        );
    }

    #[test]
    fn test_prompt_keys() {
        let mut prompt = PathPrompt::new(&PathBuf::from("/out/a"));
        assert_eq!(prompt_key(&mut prompt, &key(KeyCode::Char('b'))), None);
        assert_eq!(prompt.text(), "/out/ab");
        assert_eq!(
            prompt_key(&mut prompt, &key(KeyCode::Enter)),
            Some(ShellInput::OutputChosen(PathBuf::from("/out/ab")))
        );
        assert_eq!(
            prompt_key(&mut prompt, &key(KeyCode::Esc)),
            Some(ShellInput::OutputCancelled)
        );

        let mut empty = PathPrompt::new(&PathBuf::new());
        assert_eq!(prompt_key(&mut empty, &key(KeyCode::Enter)), None);
    }

    #[test]
    fn test_progress_bar_fill() {
        assert_eq!(progress_bar(0, 4), "░░░░");
        assert_eq!(progress_bar(50, 4), "██░░");
        assert_eq!(progress_bar(100, 4), "████");
        assert_eq!(progress_bar(33, 10).chars().filter(|&c| c == '█').count(), 3);
    }

    #[test]
    fn test_wrap_and_truncate() {
        assert_eq!(
            wrap("Word document created at /out/report.docx", 20),
            vec!["Word document", "created at", "/out/report.docx"]
        );
        assert_eq!(wrap("abcdefgh", 3), vec!["abc", "def", "gh"]);
        assert!(wrap("", 10).is_empty());
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a long label", 8), "a lon...");
    }
}
