//! Line-buffered input for non-terminal stdin
//!
//! Lines are read on a background thread and handed over through a channel.
//! Each line is replayed as the keys it contains followed by `Enter`; a line
//! that is exactly an escape alias becomes a single `Escape`.

use super::{InputError, KeyDecoder, KeyEvent, RawInput};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::collections::VecDeque;
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Lines treated as an Escape press
pub const ESCAPE_ALIASES: [&str; 3] = ["esc", "/esc", ":q"];

const WAIT_SLICE: Duration = Duration::from_millis(100);

/// Key source over a line reader
#[derive(Debug)]
pub struct LineBufferedInput {
    lines: Receiver<Vec<u8>>,
    queue: VecDeque<KeyEvent>,
    decoder: KeyDecoder,
    interrupted: Arc<AtomicBool>,
    eof: bool,
}

impl LineBufferedInput {
    /// Read lines from the process stdin
    ///
    /// `interrupted` is the Ctrl+C flag raised by the signal handler; once
    /// set, every read returns `CtrlC`.
    pub fn stdin(interrupted: Arc<AtomicBool>) -> std::io::Result<Self> {
        Self::spawn(interrupted, || std::io::stdin().lock())
    }

    /// Read lines from any reader
    pub fn from_reader<R>(reader: R, interrupted: Arc<AtomicBool>) -> std::io::Result<Self>
    where
        R: BufRead + Send + 'static,
    {
        Self::spawn(interrupted, move || reader)
    }

    fn spawn<R, F>(interrupted: Arc<AtomicBool>, open: F) -> std::io::Result<Self>
    where
        R: BufRead,
        F: FnOnce() -> R + Send + 'static,
    {
        let (tx, rx) = unbounded();
        thread::Builder::new()
            .name("stdin-lines".to_string())
            .spawn(move || read_lines(open(), tx))?;

        Ok(Self {
            lines: rx,
            queue: VecDeque::new(),
            decoder: KeyDecoder::new(),
            interrupted,
            eof: false,
        })
    }

    fn expand(&mut self, raw: Vec<u8>) {
        let mut line = raw.as_slice();
        while let Some((&last, rest)) = line.split_last() {
            if last == b'\n' || last == b'\r' {
                line = rest;
            } else {
                break;
            }
        }

        let alias = String::from_utf8_lossy(line).trim().to_ascii_lowercase();
        if ESCAPE_ALIASES.contains(&alias.as_str()) {
            self.queue.push_back(KeyEvent::Escape);
            return;
        }

        self.queue.extend(self.decoder.feed(line));
        self.queue.extend(self.decoder.finish());
        self.queue.push_back(KeyEvent::Enter);
    }

    fn fill(&mut self, timeout: Duration) {
        if self.eof || !self.queue.is_empty() {
            return;
        }
        match self.lines.recv_timeout(timeout) {
            Ok(line) => self.expand(line),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Input reached end of stream");
                self.eof = true;
            }
        }
    }

    fn interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}

fn read_lines(mut reader: impl BufRead, tx: Sender<Vec<u8>>) {
    loop {
        let mut line = Vec::new();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {
                if tx.send(line).is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "Reading input failed");
                break;
            }
        }
    }
}

impl RawInput for LineBufferedInput {
    fn key_available(&mut self, timeout: Duration) -> Result<bool, InputError> {
        if self.interrupted() {
            return Ok(true);
        }
        self.fill(timeout);
        Ok(self.eof || !self.queue.is_empty() || self.interrupted())
    }

    fn read_key(&mut self) -> Result<KeyEvent, InputError> {
        loop {
            if self.interrupted() {
                return Ok(KeyEvent::CtrlC);
            }
            if let Some(key) = self.queue.pop_front() {
                return Ok(key);
            }
            if self.eof {
                return Ok(KeyEvent::CtrlC);
            }
            self.fill(WAIT_SLICE);
        }
    }

    fn discard_pending(&mut self) {
        self.queue.clear();
    }

    fn is_raw(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn input(text: &str) -> LineBufferedInput {
        LineBufferedInput::from_reader(
            Cursor::new(text.as_bytes().to_vec()),
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap()
    }

    fn keys(input: &mut LineBufferedInput, n: usize) -> Vec<KeyEvent> {
        (0..n).map(|_| input.read_key().unwrap()).collect()
    }

    #[test]
    fn test_line_becomes_keys_and_enter() {
        let mut input = input("ab\r\n");
        assert_eq!(
            keys(&mut input, 3),
            vec![KeyEvent::Char('a'), KeyEvent::Char('b'), KeyEvent::Enter]
        );
    }

    #[test]
    fn test_escape_aliases() {
        let mut input = input("esc\n /ESC \n:q\n");
        assert_eq!(keys(&mut input, 3), vec![KeyEvent::Escape; 3]);
    }

    #[test]
    fn test_embedded_arrow_is_not_escape() {
        let mut input = input("\x1b[A\n");
        assert_eq!(keys(&mut input, 2), vec![KeyEvent::ArrowUp, KeyEvent::Enter]);
    }

    #[test]
    fn test_eof_reads_as_ctrl_c() {
        let mut input = input("x\n");
        keys(&mut input, 2);
        assert!(input.key_available(Duration::from_secs(1)).unwrap());
        assert_eq!(input.read_key().unwrap(), KeyEvent::CtrlC);
    }

    #[test]
    fn test_interrupt_flag_wins() {
        let flag = Arc::new(AtomicBool::new(false));
        let mut input =
            LineBufferedInput::from_reader(Cursor::new(b"abc\n".to_vec()), flag.clone()).unwrap();
        flag.store(true, Ordering::SeqCst);
        assert_eq!(input.read_key().unwrap(), KeyEvent::CtrlC);
    }

    #[test]
    fn test_discard_drops_rest_of_line() {
        let mut input = input("1\nz\n");
        assert_eq!(input.read_key().unwrap(), KeyEvent::Char('1'));
        input.discard_pending();
        assert_eq!(input.read_key().unwrap(), KeyEvent::Char('z'));
    }
}
