//! Keyboard input
//!
//! Every consumer reads keys through [`RawInput`]. Two engines implement it:
//! - [`TerminalInput`]: single keystrokes from a raw-mode terminal (crossterm)
//! - [`LineBufferedInput`]: whole lines from a non-terminal stdin, replayed
//!   as key events
//!
//! [`LineEditor`] builds line editing with history recall and completion on
//! top of either engine.

mod buffered;
mod editor;
mod keys;
mod terminal;

pub use buffered::{LineBufferedInput, ESCAPE_ALIASES};
pub use editor::{LineEditor, PendingLine};
pub use keys::KeyDecoder;
pub use terminal::{RawModeGuard, TerminalInput};

use std::collections::VecDeque;
use std::time::Duration;
use thiserror::Error;

/// One classified keystroke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    /// Printable character
    Char(char),
    /// Enter / Return
    Enter,
    /// A bare Escape press
    Escape,
    /// Backspace or Delete-left
    Backspace,
    /// Tab
    Tab,
    /// Arrow up
    ArrowUp,
    /// Arrow down
    ArrowDown,
    /// Ctrl+C (or the equivalent interrupt)
    CtrlC,
}

/// Input errors
#[derive(Error, Debug)]
pub enum InputError {
    /// The operator pressed Ctrl+C
    #[error("Cancelled by operator")]
    Cancelled,

    /// A watched condition failed while waiting for a key
    #[error("Input abandoned: the connection it served is gone")]
    Abandoned,

    /// Terminal I/O failed
    #[error("Input error: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of keystrokes
pub trait RawInput: Send {
    /// Wait up to `timeout` for a key; `true` means [`read_key`](Self::read_key)
    /// will not block
    fn key_available(&mut self, timeout: Duration) -> Result<bool, InputError>;

    /// Next key, blocking until one arrives
    fn read_key(&mut self) -> Result<KeyEvent, InputError>;

    /// Drop keys that belong to an input already acted on
    fn discard_pending(&mut self) {}

    /// Whether keys arrive one at a time without local echo
    ///
    /// Line-buffered sources are echoed by the terminal itself.
    fn is_raw(&self) -> bool;
}

/// Fixed key sequence; yields [`KeyEvent::CtrlC`] forever once exhausted
///
/// Behaves as a raw source unless [`buffered`](Self::buffered) is called.
#[derive(Debug, Clone)]
pub struct ScriptedInput {
    keys: VecDeque<KeyEvent>,
    raw: bool,
}

impl Default for ScriptedInput {
    fn default() -> Self {
        Self::new([])
    }
}

impl ScriptedInput {
    /// Script from a list of keys
    pub fn new(keys: impl IntoIterator<Item = KeyEvent>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
            raw: true,
        }
    }

    /// Append one key
    pub fn key(mut self, key: KeyEvent) -> Self {
        self.keys.push_back(key);
        self
    }

    /// Append the characters of `text` followed by Enter
    pub fn line(mut self, text: &str) -> Self {
        self.keys.extend(text.chars().map(KeyEvent::Char));
        self.keys.push_back(KeyEvent::Enter);
        self
    }

    /// Report itself as a line-buffered source
    pub fn buffered(mut self) -> Self {
        self.raw = false;
        self
    }

    /// Keys not consumed yet
    pub fn remaining(&self) -> usize {
        self.keys.len()
    }
}

impl RawInput for ScriptedInput {
    fn key_available(&mut self, _timeout: Duration) -> Result<bool, InputError> {
        Ok(true)
    }

    fn read_key(&mut self) -> Result<KeyEvent, InputError> {
        Ok(self.keys.pop_front().unwrap_or(KeyEvent::CtrlC))
    }

    fn is_raw(&self) -> bool {
        self.raw
    }
}
