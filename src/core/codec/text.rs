//! Text rendering of received bytes

/// Character shown in place of bytes that have no printable ASCII form
pub const NON_PRINTABLE: char = '.';

/// Best-effort ASCII rendering: printable bytes and space as-is, everything
/// else as [`NON_PRINTABLE`]
pub fn display_text(data: &[u8]) -> String {
    data.iter()
        .map(|&byte| {
            if byte.is_ascii_graphic() || byte == b' ' {
                byte as char
            } else {
                NON_PRINTABLE
            }
        })
        .collect()
}
