//! Checksum calculation for outgoing frames
//!
//! Only CRC-16/MODBUS is used on the wire: polynomial 0xA001 (reflected 0x8005),
//! initial value 0xFFFF, appended low byte first.

/// Reflected CRC-16/MODBUS polynomial
pub const CRC16_POLYNOMIAL: u16 = 0xA001;

/// CRC-16/MODBUS initial register value
pub const CRC16_INIT: u16 = 0xFFFF;

/// Number of bytes [`append_crc`] adds to a frame
pub const CRC16_LEN: usize = 2;

/// CRC-16/MODBUS
/// Polynomial: 0xA001 (reflected), Init: 0xFFFF, one bit at a time
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = CRC16_INIT;

    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ CRC16_POLYNOMIAL;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}

/// Return `data` followed by its CRC-16 (low byte, then high byte)
pub fn append_crc(data: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(data.len() + CRC16_LEN);
    frame.extend_from_slice(data);
    frame.extend_from_slice(&crc16(data).to_le_bytes());
    frame
}

/// Check that the last two bytes of `frame` are the CRC-16 of the rest
pub fn verify_crc(frame: &[u8]) -> bool {
    if frame.len() < CRC16_LEN {
        return false;
    }
    let (payload, tail) = frame.split_at(frame.len() - CRC16_LEN);
    crc16(payload).to_le_bytes() == [tail[0], tail[1]]
}
