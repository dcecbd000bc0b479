//! Input widgets for the terminal shell: an open-file browser filtered to
//! PDFs and a one-line path prompt for the save location.

use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Directory listing: `..` first, then directories, then `*.pdf` files.
pub fn list_dir(dir: &Path) -> io::Result<Vec<Entry>> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        let path = entry.path();
        // Follow symlinks so linked folders can be entered.
        let is_dir = path.is_dir();
        if is_dir {
            dirs.push(Entry { name, path, is_dir });
        } else if is_pdf(&path) {
            files.push(Entry { name, path, is_dir });
        }
    }

    let by_name = |a: &Entry, b: &Entry| a.name.to_lowercase().cmp(&b.name.to_lowercase());
    dirs.sort_by(by_name);
    files.sort_by(by_name);

    let mut entries = Vec::with_capacity(dirs.len() + files.len() + 1);
    if let Some(parent) = dir.parent() {
        entries.push(Entry {
            name: "..".to_string(),
            path: parent.to_path_buf(),
            is_dir: true,
        });
    }
    entries.extend(dirs);
    entries.extend(files);
    Ok(entries)
}

/// Open-file browser state.
#[derive(Debug)]
pub struct FileBrowser {
    dir: PathBuf,
    entries: Vec<Entry>,
    selected: usize,
}

impl FileBrowser {
    pub fn open(dir: &Path) -> io::Result<Self> {
        let dir = dir.canonicalize()?;
        let entries = list_dir(&dir)?;
        Ok(Self {
            dir,
            entries,
            selected: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn move_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        if self.selected + 1 < self.entries.len() {
            self.selected += 1;
        }
    }

    /// Enter the highlighted directory, or return the highlighted PDF.
    pub fn activate(&mut self) -> io::Result<Option<PathBuf>> {
        let Some(entry) = self.entries.get(self.selected).cloned() else {
            return Ok(None);
        };
        if entry.is_dir {
            self.change_dir(&entry.path)?;
            Ok(None)
        } else {
            Ok(Some(entry.path))
        }
    }

    pub fn go_up(&mut self) -> io::Result<()> {
        match self.dir.parent().map(Path::to_path_buf) {
            Some(parent) => self.change_dir(&parent),
            None => Ok(()),
        }
    }

    fn change_dir(&mut self, dir: &Path) -> io::Result<()> {
        let entries = list_dir(dir)?;
        self.dir = dir.to_path_buf();
        self.entries = entries;
        self.selected = 0;
        Ok(())
    }
}

/// Single-line editable text with a cursor, counted in chars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrompt {
    buffer: Vec<char>,
    cursor: usize,
}

impl PathPrompt {
    pub fn new(initial: &Path) -> Self {
        let buffer: Vec<char> = initial.to_string_lossy().chars().collect();
        let cursor = buffer.len();
        Self { buffer, cursor }
    }

    pub fn text(&self) -> String {
        self.buffer.iter().collect()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn insert(&mut self, c: char) {
        self.buffer.insert(self.cursor, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            self.buffer.remove(self.cursor);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.buffer.len() {
            self.buffer.remove(self.cursor);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.buffer.len());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.buffer.len();
    }

    /// The entered path with a leading `~/` expanded, or `None` when blank.
    pub fn value(&self) -> Option<PathBuf> {
        let text = self.text();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        match (trimmed.strip_prefix("~/"), dirs::home_dir()) {
            (Some(rest), Some(home)) => Some(home.join(rest)),
            _ => Some(PathBuf::from(trimmed)),
        }
    }
}
