//! Serial port transport implementation

use super::{OpenError, PortBackend, PortIo, TransportError};
use crate::utils::ports::sort_port_names;
use serde::{Deserialize, Serialize};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::fmt;
use std::io::{Read, Write};
use std::time::Duration;

/// Default baud rate (38400-8-N-1 is the factory profile)
pub const DEFAULT_BAUD_RATE: u32 = 38400;

/// Characters covered by the inter-byte timeout
const INTER_BYTE_CHARS: f64 = 20.0;
/// Lower bound of the safety margin added to the inter-byte timeout
const INTER_BYTE_MIN_MARGIN: f64 = 0.005;
/// Upper bound of the inter-byte timeout
const INTER_BYTE_CAP: f64 = 0.5;

/// Serial port parity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerialParity {
    /// No parity
    #[default]
    None,
    /// Even parity
    Even,
    /// Odd parity
    Odd,
    /// Parity bit always 1
    Mark,
    /// Parity bit always 0
    Space,
}

impl SerialParity {
    /// All parities in dialog order
    pub const ALL: [SerialParity; 5] = [
        SerialParity::None,
        SerialParity::Even,
        SerialParity::Odd,
        SerialParity::Mark,
        SerialParity::Space,
    ];

    /// Single-letter code used in `8-N-1` style summaries
    pub fn code(&self) -> char {
        match self {
            Self::None => 'N',
            Self::Even => 'E',
            Self::Odd => 'O',
            Self::Mark => 'M',
            Self::Space => 'S',
        }
    }

    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Even => "Even",
            Self::Odd => "Odd",
            Self::Mark => "Mark",
            Self::Space => "Space",
        }
    }
}

impl std::str::FromStr for SerialParity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "n" => Ok(Self::None),
            "even" | "e" => Ok(Self::Even),
            "odd" | "o" => Ok(Self::Odd),
            "mark" | "m" => Ok(Self::Mark),
            "space" | "s" => Ok(Self::Space),
            other => Err(format!("unknown parity: {}", other)),
        }
    }
}

/// Serial port stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SerialStopBits {
    /// One stop bit
    #[default]
    #[serde(rename = "1")]
    One,
    /// One and a half stop bits
    #[serde(rename = "1.5")]
    OnePointFive,
    /// Two stop bits
    #[serde(rename = "2")]
    Two,
}

impl SerialStopBits {
    /// All values in dialog order
    pub const ALL: [SerialStopBits; 3] = [
        SerialStopBits::One,
        SerialStopBits::OnePointFive,
        SerialStopBits::Two,
    ];

    /// Length in bit times
    pub fn bits(&self) -> f64 {
        match self {
            Self::One => 1.0,
            Self::OnePointFive => 1.5,
            Self::Two => 2.0,
        }
    }
}

impl fmt::Display for SerialStopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One => f.write_str("1"),
            Self::OnePointFive => f.write_str("1.5"),
            Self::Two => f.write_str("2"),
        }
    }
}

/// Line parameters of a serial port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortSettings {
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits (5, 6, 7, 8)
    pub data_bits: u8,
    /// Parity
    pub parity: SerialParity,
    /// Stop bits
    pub stop_bits: SerialStopBits,
}

impl PortSettings {
    /// Create settings with 8-N-1 framing at `baud_rate`
    pub fn new(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            data_bits: 8,
            parity: SerialParity::None,
            stop_bits: SerialStopBits::One,
        }
    }

    /// Set data bits
    #[must_use]
    pub fn data_bits(mut self, bits: u8) -> Self {
        self.data_bits = bits;
        self
    }

    /// Set parity
    #[must_use]
    pub fn parity(mut self, parity: SerialParity) -> Self {
        self.parity = parity;
        self
    }

    /// Set stop bits
    #[must_use]
    pub fn stop_bits(mut self, stop_bits: SerialStopBits) -> Self {
        self.stop_bits = stop_bits;
        self
    }

    /// Check field ranges
    pub fn validate(&self) -> Result<(), String> {
        if !(5..=8).contains(&self.data_bits) {
            return Err(format!("data bits must be 5-8, got {}", self.data_bits));
        }
        Ok(())
    }

    /// Bit times per character: start + data + parity + stop
    pub fn bits_per_char(&self) -> f64 {
        let parity = if self.parity == SerialParity::None { 0.0 } else { 1.0 };
        1.0 + f64::from(self.data_bits) + parity + self.stop_bits.bits()
    }

    /// Time to transmit 20 characters plus a 10% margin (at least 5 ms),
    /// capped at 500 ms; `None` when the baud rate is zero
    pub fn inter_byte_timeout(&self) -> Option<Duration> {
        if self.baud_rate == 0 {
            return None;
        }
        let frame = self.bits_per_char() * INTER_BYTE_CHARS / f64::from(self.baud_rate);
        let timeout = frame + (frame * 0.1).max(INTER_BYTE_MIN_MARGIN);
        Some(Duration::from_secs_f64(timeout.min(INTER_BYTE_CAP)))
    }
}

impl Default for PortSettings {
    fn default() -> Self {
        Self::new(DEFAULT_BAUD_RATE)
    }
}

impl fmt::Display for PortSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}-{}-{}",
            self.baud_rate,
            self.data_bits,
            self.parity.code(),
            self.stop_bits
        )
    }
}

/// Backend over the system's serial ports
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialBackend;

impl SerialBackend {
    /// Create the backend
    pub fn new() -> Self {
        Self
    }
}

/// Map the line settings onto what the serial driver supports
fn serial_line(settings: &PortSettings) -> Result<(DataBits, Parity, StopBits), &'static str> {
    let data_bits = match settings.data_bits {
        5 => DataBits::Five,
        6 => DataBits::Six,
        7 => DataBits::Seven,
        8 => DataBits::Eight,
        _ => return Err("data bits must be 5-8"),
    };

    let parity = match settings.parity {
        SerialParity::None => Parity::None,
        SerialParity::Even => Parity::Even,
        SerialParity::Odd => Parity::Odd,
        SerialParity::Mark | SerialParity::Space => {
            return Err("mark/space parity is not supported by the serial driver")
        }
    };

    let stop_bits = match settings.stop_bits {
        SerialStopBits::One => StopBits::One,
        SerialStopBits::Two => StopBits::Two,
        SerialStopBits::OnePointFive => {
            return Err("1.5 stop bits are not supported by the serial driver")
        }
    };

    Ok((data_bits, parity, stop_bits))
}

impl PortBackend for SerialBackend {
    fn check_settings(&self, settings: &PortSettings) -> Result<(), String> {
        settings.validate()?;
        serial_line(settings).map(|_| ()).map_err(str::to_string)
    }

    fn list_ports(&self) -> Result<Vec<String>, TransportError> {
        let ports = serialport::available_ports()
            .map_err(|e| TransportError::Enumeration(e.to_string()))?;
        let mut names: Vec<String> = ports.into_iter().map(|p| p.port_name).collect();
        sort_port_names(&mut names);
        Ok(names)
    }

    fn open(
        &self,
        name: &str,
        settings: &PortSettings,
        read_timeout: Duration,
    ) -> Result<Box<dyn PortIo>, OpenError> {
        let (data_bits, parity, stop_bits) =
            serial_line(settings).map_err(|reason| OpenError::Unsupported {
                port: name.to_string(),
                reason: reason.to_string(),
            })?;

        let port = serialport::new(name, settings.baud_rate)
            .data_bits(data_bits)
            .parity(parity)
            .stop_bits(stop_bits)
            .flow_control(FlowControl::None)
            .timeout(read_timeout)
            .open()
            .map_err(|e| classify_open_error(name, &e))?;

        Ok(Box::new(SerialDevice { port }))
    }
}

/// Opened serial port
struct SerialDevice {
    port: Box<dyn SerialPort>,
}

fn serial_error(e: serialport::Error) -> TransportError {
    match e.kind() {
        serialport::ErrorKind::NoDevice => TransportError::Disconnected(e.description),
        _ => TransportError::IoError(e.into()),
    }
}

impl PortIo for SerialDevice {
    fn bytes_to_read(&mut self) -> Result<usize, TransportError> {
        self.port
            .bytes_to_read()
            .map(|n| n as usize)
            .map_err(serial_error)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(TransportError::IoError(e)),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }

    fn clear_input(&mut self) -> Result<(), TransportError> {
        self.port.clear(ClearBuffer::Input).map_err(serial_error)
    }
}

/// Whether an OS error text identifies a removed or phantom device
///
/// Windows keeps stale COM entries around after a USB adapter is pulled; opening
/// one fails with ERROR_DEVICE_NOT_CONNECTED (433) or ERROR_BAD_COMMAND (22).
pub fn is_phantom_message(text: &str) -> bool {
    const MARKERS: [&str; 6] = [
        "A device which does not exist was specified",
        "WinError 433",
        "os error 433",
        "The system cannot find the file specified",
        "No such file or directory",
        "No such device",
    ];
    if MARKERS.iter().any(|m| text.contains(m)) {
        return true;
    }
    cfg!(windows) && (text.contains("os error 22") || text.contains("OSError(22"))
}

/// Map a `serialport` open failure onto [`OpenError`]
pub fn classify_open_error(port: &str, e: &serialport::Error) -> OpenError {
    let reason = e.to_string();
    let port = port.to_string();

    if is_phantom_message(&reason) {
        return OpenError::Phantom { port, reason };
    }

    match e.kind() {
        serialport::ErrorKind::NoDevice => OpenError::Phantom { port, reason },
        serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => OpenError::Phantom { port, reason },
        serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
            OpenError::PermissionDenied { port }
        }
        serialport::ErrorKind::InvalidInput => OpenError::Unsupported { port, reason },
        _ if reason.to_lowercase().contains("busy") => OpenError::Busy { port, reason },
        _ => OpenError::Failed { port, reason },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close_to(actual: Option<Duration>, expected_secs: f64) -> bool {
        actual.map_or(false, |d| (d.as_secs_f64() - expected_secs).abs() < 1e-6)
    }

    #[test]
    fn test_default_is_38400_8n1() {
        let settings = PortSettings::default();
        assert_eq!(settings.baud_rate, 38400);
        assert_eq!(settings.to_string(), "38400 8-N-1");
    }

    #[test]
    fn test_inter_byte_timeout_uses_minimum_margin() {
        // 10 bits * 20 / 38400 = 5.2083 ms, margin floor 5 ms
        let timeout = PortSettings::default().inter_byte_timeout();
        assert!(close_to(timeout, 200.0 / 38400.0 + 0.005));
    }

    #[test]
    fn test_inter_byte_timeout_uses_ten_percent_margin() {
        // 10 bits * 20 / 1200 = 166.67 ms, margin 16.67 ms
        let timeout = PortSettings::new(1200).inter_byte_timeout();
        assert!(close_to(timeout, 200.0 / 1200.0 * 1.1));
    }

    #[test]
    fn test_inter_byte_timeout_counts_parity_and_stop_bits() {
        let settings = PortSettings::new(9600)
            .data_bits(7)
            .parity(SerialParity::Even)
            .stop_bits(SerialStopBits::Two);
        assert_eq!(settings.bits_per_char(), 11.0);
        assert!(close_to(settings.inter_byte_timeout(), 220.0 / 9600.0 + 0.005));
    }

    #[test]
    fn test_inter_byte_timeout_capped() {
        assert!(close_to(PortSettings::new(300).inter_byte_timeout(), 0.5));
    }

    #[test]
    fn test_inter_byte_timeout_undefined_at_zero_baud() {
        assert_eq!(PortSettings::new(0).inter_byte_timeout(), None);
    }

    #[test]
    fn test_validate_data_bits() {
        assert!(PortSettings::new(9600).data_bits(5).validate().is_ok());
        assert!(PortSettings::new(9600).data_bits(4).validate().is_err());
    }

    #[test]
    fn test_phantom_messages() {
        assert!(is_phantom_message(
            "could not open port 'COM7': A device which does not exist was specified."
        ));
        assert!(is_phantom_message("No such file or directory (os error 2)"));
        assert!(!is_phantom_message("Device or resource busy"));
    }

    #[test]
    fn test_classify_open_errors() {
        let gone = serialport::Error::new(serialport::ErrorKind::NoDevice, "gone");
        assert!(classify_open_error("COM3", &gone).is_phantom());

        let denied = serialport::Error::new(
            serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied),
            "Permission denied",
        );
        assert_eq!(
            classify_open_error("COM3", &denied),
            OpenError::PermissionDenied { port: "COM3".to_string() }
        );

        let busy = serialport::Error::new(serialport::ErrorKind::Unknown, "Device or resource busy");
        assert!(matches!(classify_open_error("COM3", &busy), OpenError::Busy { .. }));
    }

    #[test]
    fn test_parity_from_str() {
        assert_eq!("Mark".parse::<SerialParity>(), Ok(SerialParity::Mark));
        assert!("x".parse::<SerialParity>().is_err());
    }

    #[test]
    fn test_serial_backend_rejects_driver_gaps() {
        let backend = SerialBackend::new();
        assert!(backend.check_settings(&PortSettings::default()).is_ok());
        assert!(backend
            .check_settings(&PortSettings::new(9600).parity(SerialParity::Odd).stop_bits(SerialStopBits::Two))
            .is_ok());
        assert!(backend
            .check_settings(&PortSettings::default().parity(SerialParity::Mark))
            .unwrap_err()
            .contains("mark/space"));
        assert!(backend
            .check_settings(&PortSettings::default().parity(SerialParity::Space))
            .is_err());
        assert!(backend
            .check_settings(&PortSettings::default().stop_bits(SerialStopBits::OnePointFive))
            .unwrap_err()
            .contains("1.5"));
        assert!(backend.check_settings(&PortSettings::default().data_bits(9)).is_err());
    }
}
