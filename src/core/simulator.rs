//! Device emulation
//!
//! The receiver hands every inbound chunk to a [`Responder`]; an
//! [`EmulationTable`] answers with the response of the first matching rule.
//! Rules are fixed at startup and never mutated.

use crate::core::codec::{parse_hex, CodecError};
use serde::{Deserialize, Serialize};

/// Produces an optional automatic reply for an inbound chunk
pub trait Responder: Send + Sync {
    /// Reply to `request`, or `None` to stay silent
    fn respond(&self, request: &[u8]) -> Option<Vec<u8>>;
}

/// Rule condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchCondition {
    /// Match exact bytes
    Exact {
        /// Expected request
        bytes: Vec<u8>,
    },
    /// Match any request of a given length that starts with `prefix`
    LengthPrefix {
        /// Required request length
        len: usize,
        /// Required leading bytes
        prefix: Vec<u8>,
    },
}

impl MatchCondition {
    /// Check if data matches this condition
    pub fn matches(&self, data: &[u8]) -> bool {
        match self {
            Self::Exact { bytes } => data == bytes.as_slice(),
            Self::LengthPrefix { len, prefix } => data.len() == *len && data.starts_with(prefix),
        }
    }
}

/// Response action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseAction {
    /// Send fixed bytes
    Send {
        /// Reply bytes
        data: Vec<u8>,
    },
    /// Echo the first request byte, then the second request byte plus
    /// `offset`; no reply when the sum overflows a byte
    EchoHeadPlus {
        /// Added to the second byte
        offset: u8,
    },
}

impl ResponseAction {
    fn apply(&self, request: &[u8]) -> Option<Vec<u8>> {
        match self {
            Self::Send { data } => Some(data.clone()),
            Self::EchoHeadPlus { offset } => {
                let head = *request.first()?;
                let value = request.get(1)?.checked_add(*offset)?;
                Some(vec![head, value])
            }
        }
    }
}

/// One request pattern and its reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmulationRule {
    /// Rule name (for logs)
    pub name: String,
    /// When the rule fires
    pub condition: MatchCondition,
    /// What it sends back
    pub action: ResponseAction,
}

impl EmulationRule {
    /// Exact request → fixed reply
    pub fn exact(name: &str, request: &[u8], response: &[u8]) -> Self {
        Self {
            name: name.to_string(),
            condition: MatchCondition::Exact { bytes: request.to_vec() },
            action: ResponseAction::Send { data: response.to_vec() },
        }
    }

    /// Build an exact rule from two hex strings
    pub fn from_hex(name: &str, request: &str, response: &str) -> Result<Self, CodecError> {
        Ok(Self::exact(name, &parse_hex(request)?, &parse_hex(response)?))
    }
}

/// Ordered rule list; first match wins
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmulationTable {
    rules: Vec<EmulationRule>,
}

impl EmulationTable {
    /// Table with the given rules, evaluated in order
    pub fn new(rules: Vec<EmulationRule>) -> Self {
        Self { rules }
    }

    /// Table that never answers
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in request/response table
    pub fn builtin() -> Self {
        Self::new(vec![
            EmulationRule::exact("status", &[0x01, 0x02, 0x03], &[0x01, 0x0C]),
            EmulationRule::exact("ping", &[0x41], &[0x20, 0x00]),
            EmulationRule::exact("handshake", &[0xAA, 0xBB, 0xCC], &[0xDD, 0xEE]),
            EmulationRule {
                name: "address+10".to_string(),
                condition: MatchCondition::LengthPrefix { len: 3, prefix: vec![0x01] },
                action: ResponseAction::EchoHeadPlus { offset: 10 },
            },
        ])
    }

    /// Rules in evaluation order
    pub fn rules(&self) -> &[EmulationRule] {
        &self.rules
    }

    /// First rule whose condition matches
    pub fn find(&self, request: &[u8]) -> Option<&EmulationRule> {
        self.rules.iter().find(|r| r.condition.matches(request))
    }
}

impl Responder for EmulationTable {
    fn respond(&self, request: &[u8]) -> Option<Vec<u8>> {
        let rule = self.find(request)?;
        let reply = rule.action.apply(request);
        tracing::debug!(rule = %rule.name, replied = reply.is_some(), "Emulation rule matched");
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_vectors() {
        let table = EmulationTable::builtin();
        assert_eq!(table.respond(&[0x01, 0x02, 0x03]), Some(vec![0x01, 0x0C]));
        assert_eq!(table.respond(&[0x41]), Some(vec![0x20, 0x00]));
        assert_eq!(table.respond(&[0xAA, 0xBB, 0xCC]), Some(vec![0xDD, 0xEE]));
        assert_eq!(table.respond(&[0x01, 0x05, 0x00]), Some(vec![0x01, 0x0F]));
        assert_eq!(table.respond(&[0xFF]), None);
    }

    #[test]
    fn test_first_match_wins() {
        let table = EmulationTable::builtin();
        assert_eq!(table.find(&[0x01, 0x02, 0x03]).unwrap().name, "status");
        assert_eq!(table.find(&[0x01, 0x07, 0x09]).unwrap().name, "address+10");
    }

    #[test]
    fn test_length_prefix_requires_exact_length() {
        let table = EmulationTable::builtin();
        assert_eq!(table.respond(&[0x01, 0x05]), None);
        assert_eq!(table.respond(&[0x01, 0x05, 0x00, 0x00]), None);
        assert_eq!(table.respond(&[0x02, 0x05, 0x00]), None);
    }

    #[test]
    fn test_overflowing_offset_stays_silent() {
        let table = EmulationTable::builtin();
        assert_eq!(table.respond(&[0x01, 0xF6, 0x00]), None);
        assert_eq!(table.respond(&[0x01, 0xF5, 0x00]), Some(vec![0x01, 0xFF]));
    }

    #[test]
    fn test_custom_hex_rules() {
        let rule = EmulationRule::from_hex("custom", "10 20", "30").unwrap();
        let table = EmulationTable::new(vec![rule]);
        assert_eq!(table.respond(&[0x10, 0x20]), Some(vec![0x30]));
        assert!(EmulationRule::from_hex("bad", "1", "30").is_err());
        assert_eq!(EmulationTable::empty().respond(&[0x41]), None);
    }
}
