//! Line editor
//!
//! Append/erase editing without a cursor, history recall with the arrow keys
//! and Tab completion over service commands and history entries.

use super::{InputError, KeyEvent, RawInput};
use crate::core::codec::SendMode;
use crate::core::history::HistoryStore;
use crate::core::screen::Screen;
use crate::core::service::{help_hint, ServiceCommand};
use std::time::Duration;

/// The line being edited
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingLine {
    buffer: String,
    /// `None` for a fresh entry, otherwise the recalled history position
    nav: Option<usize>,
}

impl PendingLine {
    /// Empty line
    pub fn new() -> Self {
        Self::default()
    }

    /// Current text
    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// History position being shown, if any
    pub fn nav(&self) -> Option<usize> {
        self.nav
    }

    /// Append a typed character
    pub fn push(&mut self, c: char) {
        self.buffer.push(c);
        self.nav = None;
    }

    /// Erase the last character; `false` when there was nothing to erase
    pub fn pop(&mut self) -> bool {
        self.nav = None;
        self.buffer.pop().is_some()
    }

    /// Replace the whole text, keeping or dropping the history position
    pub fn replace(&mut self, text: &str, nav: Option<usize>) {
        self.buffer = text.to_string();
        self.nav = nav;
    }

    /// Step back through `entries`; returns whether the text changed
    pub fn recall_previous(&mut self, entries: &[String]) -> bool {
        let target = match self.nav {
            None if !entries.is_empty() => entries.len() - 1,
            Some(i) if i > 0 && i <= entries.len() => i - 1,
            _ => return false,
        };
        self.replace(&entries[target], Some(target));
        true
    }

    /// Step forward through `entries`; returns whether the text changed
    pub fn recall_next(&mut self, entries: &[String]) -> bool {
        match self.nav {
            Some(i) if i + 1 < entries.len() => {
                self.replace(&entries[i + 1], Some(i + 1));
                true
            }
            _ => false,
        }
    }

    /// Candidates whose lowercase form starts with the lowercase text,
    /// without repeats, service commands first
    pub fn completions(&self, history: &[String]) -> Vec<String> {
        let needle = self.buffer.to_lowercase();
        let slashed = self.buffer.starts_with('/');

        let mut out: Vec<String> = Vec::new();
        let candidates = ServiceCommand::completion_names(slashed)
            .into_iter()
            .chain(history.iter().rev().cloned());
        for candidate in candidates {
            if candidate.to_lowercase().starts_with(&needle) && !out.contains(&candidate) {
                out.push(candidate);
            }
        }
        out
    }
}

/// Reads one line through a [`RawInput`]
pub struct LineEditor<'a> {
    input: &'a mut dyn RawInput,
    screen: &'a Screen,
    watch: Option<(Duration, &'a dyn Fn() -> bool)>,
}

impl<'a> LineEditor<'a> {
    /// Editor over `input`, echoing to `screen`
    pub fn new(input: &'a mut dyn RawInput, screen: &'a Screen) -> Self {
        Self {
            input,
            screen,
            watch: None,
        }
    }

    /// Give up with [`InputError::Abandoned`] once `healthy` returns false
    ///
    /// `healthy` is consulted before every key and every `poll` while the
    /// operator is idle.
    pub fn watch(mut self, poll: Duration, healthy: &'a dyn Fn() -> bool) -> Self {
        self.watch = Some((poll, healthy));
        self
    }

    fn next_key(&mut self) -> Result<KeyEvent, InputError> {
        if let Some((poll, healthy)) = self.watch {
            loop {
                if !healthy() {
                    self.screen.line("");
                    return Err(InputError::Abandoned);
                }
                if self.input.key_available(poll)? {
                    break;
                }
            }
        }
        self.input.read_key()
    }

    /// Read one line
    ///
    /// Returns `Ok(None)` on Escape and [`InputError::Cancelled`] on Ctrl+C.
    /// A [`watch`](Self::watch)ed editor also ends with [`InputError::Abandoned`].
    /// With `history`, the arrow keys recall that mode's entries and Tab
    /// completes from them too.
    pub fn read_line(
        &mut self,
        prompt: &str,
        history: Option<(&HistoryStore, SendMode)>,
    ) -> Result<Option<String>, InputError> {
        let raw = self.input.is_raw();
        let entries: &[String] = match history {
            Some((store, mode)) => store.entries(mode),
            None => &[],
        };

        let mut line = PendingLine::new();
        self.screen.print(prompt);

        loop {
            match self.next_key()? {
                KeyEvent::Enter => {
                    if raw {
                        self.screen.print("\n");
                    }
                    return Ok(Some(line.buffer));
                }
                KeyEvent::Escape => {
                    self.screen.line(" [Esc]");
                    self.input.discard_pending();
                    return Ok(None);
                }
                KeyEvent::CtrlC => {
                    self.screen.line(" [Ctrl+C]");
                    return Err(InputError::Cancelled);
                }
                KeyEvent::Backspace => {
                    if line.pop() && raw {
                        self.screen.print("\u{8} \u{8}");
                    }
                }
                KeyEvent::ArrowUp => {
                    let before = line.text().to_string();
                    if line.recall_previous(entries) {
                        self.redraw(prompt, &before, line.text());
                    }
                }
                KeyEvent::ArrowDown => {
                    let before = line.text().to_string();
                    if line.recall_next(entries) {
                        self.redraw(prompt, &before, line.text());
                    }
                }
                KeyEvent::Tab => self.complete(prompt, &mut line, entries),
                KeyEvent::Char(c) => {
                    line.push(c);
                    if raw {
                        self.screen.print(c.encode_utf8(&mut [0u8; 4]));
                    }
                }
            }
        }
    }

    fn complete(&mut self, prompt: &str, line: &mut PendingLine, entries: &[String]) {
        let matches = line.completions(entries);
        match matches.len() {
            0 => {}
            1 => {
                let before = line.text().to_string();
                line.replace(&matches[0], None);
                self.redraw(prompt, &before, line.text());
            }
            _ => {
                self.screen.print("\n");
                self.screen.line(&matches.join("  "));
                if matches.iter().any(|m| ServiceCommand::is_command_name(m)) {
                    self.screen.line(&help_hint());
                }
                self.screen.print(&format!("{}{}", prompt, line.text()));
            }
        }
    }

    /// Swap the displayed text `before` for `after`
    fn redraw(&self, prompt: &str, before: &str, after: &str) {
        if self.input.is_raw() {
            let erase = "\u{8} \u{8}".repeat(before.chars().count());
            self.screen.print(&format!("{}{}", erase, after));
        } else {
            self.screen.line("");
            self.screen.print(&format!("{}{}", prompt, after));
        }
    }
}
