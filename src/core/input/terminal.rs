//! Raw-mode terminal keys through crossterm

use super::{InputError, KeyEvent, RawInput};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Keeps the terminal in raw mode while alive
#[derive(Debug)]
pub struct RawModeGuard(());

impl RawModeGuard {
    /// Switch the terminal to raw mode
    pub fn enable() -> std::io::Result<Self> {
        enable_raw_mode()?;
        debug!("Raw mode enabled");
        Ok(Self(()))
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            warn!(error = %e, "Failed to restore terminal mode");
        }
    }
}

/// Single-keystroke input from an interactive terminal
///
/// Only key presses are reported. Keys without a [`KeyEvent`] counterpart
/// (Left, Right, function keys, Alt/Ctrl chords other than Ctrl+C) are read
/// and dropped. Ctrl+Alt chords are AltGr on many layouts and yield their
/// character.
#[derive(Debug)]
pub struct TerminalInput {
    _guard: RawModeGuard,
    peeked: Option<KeyEvent>,
    interrupted: Arc<AtomicBool>,
}

/// How often a blocking read re-checks the interrupt flag
const INTERRUPT_POLL: Duration = Duration::from_millis(100);

impl TerminalInput {
    /// Enter raw mode; it is left again when the input is dropped
    ///
    /// `interrupted` is the flag raised by the signal handler; once set,
    /// every read returns `CtrlC`.
    pub fn new(interrupted: Arc<AtomicBool>) -> std::io::Result<Self> {
        Ok(Self {
            _guard: RawModeGuard::enable()?,
            peeked: None,
            interrupted,
        })
    }

    fn interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}

fn classify(key: event::KeyEvent) -> Option<KeyEvent> {
    if key.kind != KeyEventKind::Press {
        return None;
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);
    match key.code {
        // AltGr
        KeyCode::Char(c) if ctrl && alt => Some(KeyEvent::Char(c)),
        KeyCode::Char('c') | KeyCode::Char('C') if ctrl => Some(KeyEvent::CtrlC),
        KeyCode::Char(_) if ctrl || alt => None,
        KeyCode::Char(c) => Some(KeyEvent::Char(c)),
        KeyCode::Enter => Some(KeyEvent::Enter),
        KeyCode::Esc => Some(KeyEvent::Escape),
        KeyCode::Backspace => Some(KeyEvent::Backspace),
        KeyCode::Tab => Some(KeyEvent::Tab),
        KeyCode::Up => Some(KeyEvent::ArrowUp),
        KeyCode::Down => Some(KeyEvent::ArrowDown),
        _ => None,
    }
}

impl RawInput for TerminalInput {
    fn key_available(&mut self, timeout: Duration) -> Result<bool, InputError> {
        if self.peeked.is_some() || self.interrupted() {
            return Ok(true);
        }

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !event::poll(remaining.min(INTERRUPT_POLL))? {
                if self.interrupted() {
                    return Ok(true);
                }
                if Instant::now() >= deadline {
                    return Ok(false);
                }
                continue;
            }
            if let Event::Key(key) = event::read()? {
                if let Some(key) = classify(key) {
                    self.peeked = Some(key);
                    return Ok(true);
                }
            }
            if remaining.is_zero() {
                return Ok(false);
            }
        }
    }

    fn read_key(&mut self) -> Result<KeyEvent, InputError> {
        if let Some(key) = self.peeked.take() {
            return Ok(key);
        }
        loop {
            if self.interrupted() {
                return Ok(KeyEvent::CtrlC);
            }
            if !event::poll(INTERRUPT_POLL)? {
                continue;
            }
            if let Event::Key(key) = event::read()? {
                if let Some(key) = classify(key) {
                    return Ok(key);
                }
            }
        }
    }

    fn is_raw(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEvent as TermKey;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> TermKey {
        TermKey::new(code, modifiers)
    }

    #[test]
    fn test_classify_press_events() {
        assert_eq!(classify(press(KeyCode::Char('a'), KeyModifiers::NONE)), Some(KeyEvent::Char('a')));
        assert_eq!(classify(press(KeyCode::Char('A'), KeyModifiers::SHIFT)), Some(KeyEvent::Char('A')));
        assert_eq!(classify(press(KeyCode::Char('c'), KeyModifiers::CONTROL)), Some(KeyEvent::CtrlC));
        assert_eq!(classify(press(KeyCode::Up, KeyModifiers::NONE)), Some(KeyEvent::ArrowUp));
        assert_eq!(classify(press(KeyCode::Esc, KeyModifiers::NONE)), Some(KeyEvent::Escape));
    }

    #[test]
    fn test_unmapped_keys_dropped() {
        assert_eq!(classify(press(KeyCode::Left, KeyModifiers::NONE)), None);
        assert_eq!(classify(press(KeyCode::F(5), KeyModifiers::NONE)), None);
        assert_eq!(classify(press(KeyCode::Char('x'), KeyModifiers::ALT)), None);
        assert_eq!(classify(press(KeyCode::Char('x'), KeyModifiers::CONTROL)), None);

        let mut release = press(KeyCode::Enter, KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert_eq!(classify(release), None);
    }

    #[test]
    fn test_altgr_chords_type_their_character() {
        let altgr = KeyModifiers::CONTROL | KeyModifiers::ALT;
        assert_eq!(classify(press(KeyCode::Char('@'), altgr)), Some(KeyEvent::Char('@')));
        assert_eq!(classify(press(KeyCode::Char('['), altgr)), Some(KeyEvent::Char('[')));
        assert_eq!(classify(press(KeyCode::Char('{'), altgr | KeyModifiers::SHIFT)), Some(KeyEvent::Char('{')));
        assert_eq!(classify(press(KeyCode::Char('c'), altgr)), Some(KeyEvent::Char('c')));
    }
}
