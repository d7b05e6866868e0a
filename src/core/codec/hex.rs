//! Hexadecimal parsing and display

use super::CodecError;

/// Format bytes as uppercase hex pairs separated by single spaces
///
/// `format_hex(&[0xAA, 0x01])` gives `"AA 01"`.
pub fn format_hex(data: &[u8]) -> String {
    let mut output = String::with_capacity(data.len() * 3);
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            output.push(' ');
        }
        output.push_str(&format!("{:02X}", byte));
    }
    output
}

/// Parse a hex byte string typed by the operator
///
/// Spaces are ignored. Any other non-hex character, or an odd number of hex
/// digits, is rejected with [`CodecError::InvalidHex`].
pub fn parse_hex(text: &str) -> Result<Vec<u8>, CodecError> {
    let cleaned: String = text.chars().filter(|c| *c != ' ').collect();

    if let Some((pos, ch)) = cleaned.char_indices().find(|(_, c)| !c.is_ascii_hexdigit()) {
        return Err(CodecError::InvalidHex(format!(
            "unexpected character {:?} at position {}",
            ch, pos
        )));
    }

    if cleaned.len() % 2 != 0 {
        return Err(CodecError::InvalidHex(format!(
            "odd number of hex digits ({})",
            cleaned.len()
        )));
    }

    hex::decode(&cleaned).map_err(|e| CodecError::InvalidHex(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_upper_spaced() {
        assert_eq!(format_hex(b"Hello"), "48 65 6C 6C 6F");
        assert_eq!(format_hex(&[]), "");
    }

    #[test]
    fn test_parse_with_spaces() {
        assert_eq!(parse_hex("AA BB  cc").unwrap(), vec![0xAA, 0xBB, 0xCC]);
        assert_eq!(parse_hex("aabbcc").unwrap(), vec![0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(parse_hex("").unwrap(), Vec::<u8>::new());
        assert_eq!(parse_hex("   ").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_parse_rejects_non_hex() {
        assert!(parse_hex("0x41").is_err());
        assert!(parse_hex("4G").is_err());
        assert!(parse_hex("41,42").is_err());
        assert!(parse_hex("41\t42").is_err());
    }

    #[test]
    fn test_parse_rejects_odd_digit_count() {
        let err = parse_hex("ABC").unwrap_err();
        assert!(err.to_string().contains("odd"));
    }

    #[test]
    fn test_round_trip() {
        let samples: [&[u8]; 4] = [&[], &[0x00], &[0xDE, 0xAD, 0xBE, 0xEF], b"\x01\x7F\x80\xFF"];
        for sample in samples {
            assert_eq!(parse_hex(&format_hex(sample)).unwrap(), sample);
        }
        let all: Vec<u8> = (0..=255).collect();
        assert_eq!(parse_hex(&format_hex(&all)).unwrap(), all);
    }
}
