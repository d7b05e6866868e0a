//! # Comterm Core Library
//!
//! An interactive serial-line terminal engine:
//! - Text, HEX and HEX+CRC16 (MODBUS) send modes
//! - A gated background receiver that answers requests from an emulation table
//! - Per-mode persistent command history with recall and tab completion
//! - Raw single-key input with a line-buffered fallback
//! - Service commands (`help`, `init`, `doctor`, `history`) inside send modes
//!
//! ## Example
//!
//! ```rust,no_run
//! use comterm_core::{EmulationTable, ReceiverConfig, SerialBackend, Session, TransportSession};
//! use comterm_core::core::screen::{ConsoleObserver, Screen};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! fn main() -> anyhow::Result<()> {
//!     let transport = TransportSession::open(
//!         Arc::new(SerialBackend::new()),
//!         "COM3",
//!         Default::default(),
//!         Duration::from_secs(1),
//!     )?;
//!     let mut session = Session::new(transport, ReceiverConfig::default());
//!     let screen = Arc::new(Screen::stdout());
//!     session.start_receiver(
//!         Arc::new(EmulationTable::builtin()),
//!         Arc::new(ConsoleObserver::new(screen)),
//!     )?;
//!
//!     session.send(&comterm_core::append_crc(&[0x01, 0x02, 0x03]))?;
//!     std::thread::sleep(Duration::from_secs(1));
//!     session.shutdown();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;
pub mod utils;

// Re-exports for convenience
pub use crate::cli::{CliResult, ExitCodes, InputEngine, PipeMode};
pub use crate::config::AppConfig;
pub use crate::core::codec::{encode_line, format_hex, parse_hex, CodecError, SendMode};
pub use crate::core::controller::{
    Controller, ControllerError, ControllerExit, ControllerOptions, ControllerState,
};
pub use crate::core::history::{HistoryError, HistoryScope, HistoryStore};
pub use crate::core::input::{KeyEvent, LineBufferedInput, RawInput, TerminalInput};
pub use crate::core::protocol::{append_crc, crc16, verify_crc};
pub use crate::core::receiver::{ReceiverConfig, ReceiverEvent, ReceiverExit, ReceiverObserver};
pub use crate::core::session::{Session, SessionError, ShutdownReport};
pub use crate::core::simulator::{EmulationRule, EmulationTable, Responder};
pub use crate::core::transport::{
    OpenError, PortBackend, PortSettings, SerialBackend, SerialParity, SerialStopBits,
    TransportError, TransportSession,
};
pub use crate::core::virtual_port::{LoopbackBackend, LoopbackPeer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
