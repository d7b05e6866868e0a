//! Operator console
//!
//! Both execution contexts print through one [`Screen`], so a receiver
//! notification never lands in the middle of a half-written prompt. In raw
//! mode the terminal does not translate `\n`, so line breaks are written as
//! `\r\n`.

use crate::core::codec::{display_text, format_hex};
use crate::core::receiver::{ReceiverEvent, ReceiverObserver};
use chrono::{DateTime, Local};
use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};
use parking_lot::Mutex;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Serialized console writer
///
/// Write failures are logged, never raised: the first one as a warning,
/// later ones at debug level.
pub struct Screen {
    out: Mutex<Box<dyn Write + Send>>,
    raw: AtomicBool,
    failed: AtomicBool,
}

impl Screen {
    /// Console on stdout
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Console on any writer
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
            raw: AtomicBool::new(false),
            failed: AtomicBool::new(false),
        }
    }

    /// Console writing into a shared buffer, for tests
    pub fn capture() -> (Self, CaptureBuffer) {
        let buffer = CaptureBuffer::default();
        (Self::new(Box::new(buffer.clone())), buffer)
    }

    /// Select `\r\n` line breaks for a raw-mode terminal
    pub fn set_raw(&self, raw: bool) {
        self.raw.store(raw, Ordering::SeqCst);
    }

    /// Write text as-is and flush
    pub fn print(&self, text: &str) {
        let text = if self.raw.load(Ordering::SeqCst) {
            text.replace('\n', "\r\n")
        } else {
            text.to_string()
        };
        let mut out = self.out.lock();
        let result = out.write_all(text.as_bytes()).and_then(|()| out.flush());
        drop(out);
        self.check(result);
    }

    /// Write a full line
    pub fn line(&self, text: &str) {
        self.print(&format!("{}\n", text));
    }

    /// Clear the screen and home the cursor
    pub fn clear(&self) {
        let mut out = self.out.lock();
        let result = queue!(out, Clear(ClearType::All), MoveTo(0, 0)).and_then(|()| out.flush());
        drop(out);
        self.check(result);
    }

    fn check(&self, result: std::io::Result<()>) {
        if let Err(e) = result {
            if self.failed.swap(true, Ordering::SeqCst) {
                debug!(error = %e, "Console write failed");
            } else {
                warn!(error = %e, "Console write failed; output may be lost");
            }
        }
    }
}

impl std::fmt::Debug for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Screen")
            .field("raw", &self.raw.load(Ordering::SeqCst))
            .finish()
    }
}

/// In-memory sink shared between a [`Screen`] and a test
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer(Arc<Mutex<Vec<u8>>>);

impl CaptureBuffer {
    /// Everything written so far, lossily decoded
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// `HH:MM:SS.mmm` traffic timestamp
pub fn timestamp(at: &DateTime<Local>) -> String {
    at.format("%H:%M:%S%.3f").to_string()
}

/// Renders receiver notifications on the console
#[derive(Debug, Clone)]
pub struct ConsoleObserver {
    screen: Arc<Screen>,
}

impl ConsoleObserver {
    /// Observer printing to `screen`
    pub fn new(screen: Arc<Screen>) -> Self {
        Self { screen }
    }
}

impl ReceiverObserver for ConsoleObserver {
    fn notify(&self, event: ReceiverEvent) {
        let text = match event {
            ReceiverEvent::Received { port, at, data } => {
                let ts = timestamp(&at);
                format!(
                    "\n{} {} RX HEX: {}\n{} {} RX ASCII: {}",
                    ts,
                    port,
                    format_hex(&data),
                    ts,
                    port,
                    display_text(&data)
                )
            }
            ReceiverEvent::AutoResponse { port, at, data } => {
                format!("{} {} TX auto: {}", timestamp(&at), port, format_hex(&data))
            }
            ReceiverEvent::Fault { port, at, error } => {
                format!("\n{} {} receive error: {}", timestamp(&at), port, error)
            }
        };
        self.screen.line(&text);
    }
}
