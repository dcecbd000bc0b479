//! Opening finished files with the desktop's default application.

use std::path::Path;
use std::process::{Command, Stdio};

pub trait Launcher: Send {
    /// Open `path`. Failures are logged, never returned.
    fn open(&self, path: &Path);
}

/// The platform opener command for `path`.
pub fn open_command(path: &Path) -> Command {
    let mut cmd = if cfg!(target_os = "macos") {
        Command::new("open")
    } else if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        // The empty argument is the window title `start` expects first.
        cmd.args(["/C", "start", ""]);
        cmd
    } else {
        Command::new("xdg-open")
    };
    cmd.arg(path);
    cmd
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn open(&self, path: &Path) {
        let mut cmd = open_command(path);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        match cmd.status() {
            Ok(status) if status.success() => log::debug!("Opened {}", path.display()),
            Ok(status) => log::warn!("Opening {} exited with {}", path.display(), status),
            Err(e) => log::warn!(
                "Could not open {} with {:?}: {}",
                path.display(),
                cmd.get_program(),
                e
            ),
        }
    }
}
