//! Wire-level protocol helpers
//!
//! Provides the CRC-16/MODBUS checksum used by the hex+CRC send mode.

pub mod checksum;

pub use checksum::{append_crc, crc16, verify_crc, CRC16_INIT, CRC16_LEN, CRC16_POLYNOMIAL};
