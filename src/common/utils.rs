//! Shared helpers: path display and terminal management.

use anyhow::Result;
use crossterm::{cursor, execute, terminal};
use std::io::{IsTerminal, stdout};
use std::path::Path;

/// Render a path for logs with the home directory replaced by `~`.
pub fn private_path(path: &Path) -> String {
    if let Some(home) = dirs::home_dir()
        && let Ok(stripped) = path.strip_prefix(&home)
    {
        return format!("~/{}", stripped.display());
    }
    path.display().to_string()
}

/// RAII guard that puts the terminal into raw mode on the alternate screen
/// with the cursor hidden, and restores it on drop.
///
/// When stdout is not a terminal (piped, service) the guard is inert.
pub struct TerminalGuard {
    active: bool,
}

impl TerminalGuard {
    pub fn new() -> Result<Self> {
        if !stdout().is_terminal() {
            return Ok(Self { active: false });
        }

        terminal::enable_raw_mode()?;
        execute!(stdout(), terminal::EnterAlternateScreen, cursor::Hide)?;

        Ok(Self { active: true })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if self.active {
            let _ = execute!(stdout(), cursor::Show, terminal::LeaveAlternateScreen);
            let _ = terminal::disable_raw_mode();
        }
    }
}
