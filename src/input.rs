//! Terminal keyboard input
//!
//! Raw-mode crossterm implementation of [`InputSource`]: one `poll` with the
//! frame deadline, then a non-blocking `read`. Raw mode is released on drop
//! even when the application loop errors out.

use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;

use crate::session::{InputSource, Key};

/// Keyboard source over the controlling terminal.
pub struct CrosstermInput {
    _guard: RawModeGuard,
}

struct RawModeGuard;

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

impl CrosstermInput {
    /// Switch the terminal to raw mode for unbuffered single-key reads.
    pub fn new() -> std::io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self { _guard: RawModeGuard })
    }
}

impl InputSource for CrosstermInput {
    fn read_key(&mut self, timeout: Duration) -> std::io::Result<Key> {
        if !event::poll(timeout)? {
            return Ok(Key::Timeout);
        }
        let key = match event::read()? {
            Event::Key(k) if k.kind == KeyEventKind::Press => match k.code {
                // Raw mode swallows SIGINT, so Ctrl-C acts as the quit key.
                KeyCode::Char('c') if k.modifiers.contains(KeyModifiers::CONTROL) => {
                    Key::Char('q')
                }
                KeyCode::Char(c) => Key::Char(c),
                KeyCode::Tab => Key::Tab,
                _ => Key::Other,
            },
            // Resize, release events, mouse noise: redisplay and move on.
            _ => Key::Other,
        };
        Ok(key)
    }
}
