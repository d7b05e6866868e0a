//! Byte stream to key classification
//!
//! Terminals report arrows and function keys as multi-byte escape sequences
//! that can be split across reads. [`KeyDecoder`] keeps an incomplete tail
//! until the rest arrives, so a split `ESC [ A` is one `ArrowUp` and never a
//! bare `Escape`.

use super::KeyEvent;

const ESC: u8 = 0x1B;

enum Step {
    Key(KeyEvent, usize),
    Skip(usize),
    Incomplete,
}

/// Incremental key decoder
#[derive(Debug, Default)]
pub struct KeyDecoder {
    pending: Vec<u8>,
    after_cr: bool,
}

impl KeyDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode everything complete in `bytes` plus any earlier tail
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<KeyEvent> {
        self.pending.extend_from_slice(bytes);
        let mut keys = Vec::new();
        self.drain(&mut keys);
        keys
    }

    /// End of input: a lone trailing ESC is an Escape press, any other
    /// incomplete tail is dropped
    pub fn finish(&mut self) -> Vec<KeyEvent> {
        let mut keys = Vec::new();
        self.drain(&mut keys);
        if self.pending == [ESC] {
            keys.push(KeyEvent::Escape);
        }
        self.pending.clear();
        keys
    }

    /// Bytes held back waiting for the rest of a sequence
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    fn drain(&mut self, keys: &mut Vec<KeyEvent>) {
        let mut pos = 0;
        while pos < self.pending.len() {
            let byte = self.pending[pos];
            if byte == b'\n' && self.after_cr {
                self.after_cr = false;
                pos += 1;
                continue;
            }
            self.after_cr = byte == b'\r';

            match step(&self.pending[pos..]) {
                Step::Key(key, used) => {
                    keys.push(key);
                    pos += used;
                }
                Step::Skip(used) => pos += used,
                Step::Incomplete => break,
            }
        }
        self.pending.drain(..pos);
    }
}

fn step(buf: &[u8]) -> Step {
    match buf[0] {
        ESC => escape(buf),
        b'\r' | b'\n' => Step::Key(KeyEvent::Enter, 1),
        0x08 | 0x7F => Step::Key(KeyEvent::Backspace, 1),
        b'\t' => Step::Key(KeyEvent::Tab, 1),
        0x03 => Step::Key(KeyEvent::CtrlC, 1),
        b @ 0x20..=0x7E => Step::Key(KeyEvent::Char(b as char), 1),
        0x00..=0x1F => Step::Skip(1),
        lead => utf8(buf, lead),
    }
}

fn escape(buf: &[u8]) -> Step {
    match buf.get(1) {
        None => Step::Incomplete,
        Some(b'[') => {
            for (i, &b) in buf.iter().enumerate().skip(2) {
                match b {
                    0x20..=0x3F => continue,
                    b'A' => return Step::Key(KeyEvent::ArrowUp, i + 1),
                    b'B' => return Step::Key(KeyEvent::ArrowDown, i + 1),
                    0x40..=0x7E => return Step::Skip(i + 1),
                    _ => return Step::Skip(i),
                }
            }
            Step::Incomplete
        }
        Some(b'O') => match buf.get(2) {
            None => Step::Incomplete,
            Some(b'A') => Step::Key(KeyEvent::ArrowUp, 3),
            Some(b'B') => Step::Key(KeyEvent::ArrowDown, 3),
            Some(_) => Step::Skip(3),
        },
        // ESC followed by a control byte: Escape was pressed on its own
        Some(&b) if b < 0x20 || b == 0x7F => Step::Key(KeyEvent::Escape, 1),
        // Alt+key
        Some(_) => Step::Skip(2),
    }
}

fn utf8(buf: &[u8], lead: u8) -> Step {
    let len = match lead {
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => return Step::Skip(1),
    };

    if buf.len() < len {
        return if buf[1..].iter().all(|b| b & 0xC0 == 0x80) {
            Step::Incomplete
        } else {
            Step::Skip(1)
        };
    }

    match std::str::from_utf8(&buf[..len]) {
        Ok(s) => match s.chars().next() {
            Some(c) => Step::Key(KeyEvent::Char(c), len),
            None => Step::Skip(len),
        },
        Err(_) => Step::Skip(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use KeyEvent::*;

    fn decode(bytes: &[u8]) -> Vec<KeyEvent> {
        let mut decoder = KeyDecoder::new();
        let mut keys = decoder.feed(bytes);
        keys.extend(decoder.finish());
        keys
    }

    #[test]
    fn test_plain_keys() {
        assert_eq!(
            decode(b"a1\t\x7f\x08\x03\r"),
            vec![Char('a'), Char('1'), Tab, Backspace, Backspace, CtrlC, Enter]
        );
    }

    #[test]
    fn test_crlf_is_one_enter() {
        assert_eq!(decode(b"x\r\ny\n"), vec![Char('x'), Enter, Char('y'), Enter]);

        let mut decoder = KeyDecoder::new();
        assert_eq!(decoder.feed(b"\r"), vec![Enter]);
        assert_eq!(decoder.feed(b"\n"), vec![]);
    }

    #[test]
    fn test_arrow_sequences() {
        assert_eq!(decode(b"\x1b[A\x1b[B\x1bOA\x1bOB"), vec![ArrowUp, ArrowDown, ArrowUp, ArrowDown]);
    }

    #[test]
    fn test_split_arrow_is_not_escape() {
        let mut decoder = KeyDecoder::new();
        assert_eq!(decoder.feed(b"\x1b"), vec![]);
        assert!(decoder.has_pending());
        assert_eq!(decoder.feed(b"["), vec![]);
        assert_eq!(decoder.feed(b"A"), vec![ArrowUp]);
        assert!(!decoder.has_pending());
    }

    #[test]
    fn test_other_sequences_are_swallowed() {
        // Left, Right, F5, Delete
        assert_eq!(decode(b"\x1b[D\x1b[C\x1b[15~\x1b[3~z"), vec![Char('z')]);
        assert_eq!(decode(b"\x1bOP"), vec![]);
    }

    #[test]
    fn test_lone_escape() {
        assert_eq!(decode(b"\x1b"), vec![Escape]);
        assert_eq!(decode(b"\x1b\r"), vec![Escape, Enter]);
        assert_eq!(decode(b"\x1b\x1b"), vec![Escape, Escape]);
    }

    #[test]
    fn test_utf8_characters() {
        assert_eq!(decode("é€".as_bytes()), vec![Char('é'), Char('€')]);

        let mut decoder = KeyDecoder::new();
        let bytes = "ж".as_bytes();
        assert_eq!(decoder.feed(&bytes[..1]), vec![]);
        assert_eq!(decoder.feed(&bytes[1..]), vec![Char('ж')]);
    }

    #[test]
    fn test_invalid_bytes_dropped() {
        assert_eq!(decode(&[0xFF, b'a', 0x80, 0xC3, b'b']), vec![Char('a'), Char('b')]);
        assert_eq!(decode(&[0x01, 0x02, b'c']), vec![Char('c')]);
    }
}
