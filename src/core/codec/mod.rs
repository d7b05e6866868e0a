//! Data codec module for encoding/decoding frames
//!
//! Supports:
//! - Hexadecimal input parsing and display formatting
//! - Best-effort text rendering of received bytes
//! - Encoding an operator line according to the active send mode

mod hex;
mod text;

pub use self::hex::{format_hex, parse_hex};
pub use text::display_text;

use crate::core::protocol::append_crc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Send mode, which is also the key of a history list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendMode {
    /// UTF-8 text, sent as typed
    Text,
    /// Hex digits, decoded to raw bytes
    Hex,
    /// Hex digits with a CRC-16/MODBUS suffix
    HexCrc,
}

impl SendMode {
    /// All modes, in history file order
    pub const ALL: [SendMode; 3] = [SendMode::Text, SendMode::Hex, SendMode::HexCrc];

    /// Storage key (`text`, `hex`, `hex_crc`)
    pub fn key(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Hex => "hex",
            Self::HexCrc => "hex_crc",
        }
    }

    /// Parse a storage key
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "hex" => Some(Self::Hex),
            "hex_crc" | "hexcrc" | "crc" => Some(Self::HexCrc),
            _ => None,
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Text => "Text",
            Self::Hex => "HEX",
            Self::HexCrc => "HEX+CRC16",
        }
    }

    /// Prompt shown by the send loop
    pub fn prompt(&self) -> &'static str {
        match self {
            Self::Text => "Text: ",
            Self::Hex => "HEX: ",
            Self::HexCrc => "HEX for CRC: ",
        }
    }
}

impl fmt::Display for SendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Codec errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Input is not a valid hex byte string
    #[error("Invalid hex: {0}")]
    InvalidHex(String),
}

/// Encode one operator line into the bytes to transmit
pub fn encode_line(mode: SendMode, line: &str) -> Result<Vec<u8>, CodecError> {
    match mode {
        SendMode::Text => Ok(line.as_bytes().to_vec()),
        SendMode::Hex => parse_hex(line),
        SendMode::HexCrc => parse_hex(line).map(|payload| append_crc(&payload)),
    }
}
