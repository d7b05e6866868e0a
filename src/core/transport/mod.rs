//! Transport layer
//!
//! A [`PortBackend`] enumerates and opens ports; an opened port is driven
//! through the [`PortIo`] trait. [`TransportSession`] owns one opened port for
//! the lifetime of a connection and serializes every access to it, so the
//! background receiver and the foreground send loops can share it.
//!
//! Backends:
//! - Serial ports through `serialport` ([`SerialBackend`])
//! - In-memory loopback pairs ([`crate::core::virtual_port::LoopbackBackend`])

mod serial;

pub use serial::{
    classify_open_error, is_phantom_message, PortSettings, SerialBackend, SerialParity,
    SerialStopBits, DEFAULT_BAUD_RATE,
};

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while a port is in use
#[derive(Error, Debug)]
pub enum TransportError {
    /// The session was closed locally
    #[error("Port closed")]
    Closed,

    /// The device went away underneath an open handle
    #[error("Device disconnected: {0}")]
    Disconnected(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Port enumeration failed
    #[error("Port enumeration failed: {0}")]
    Enumeration(String),
}

/// Errors raised while opening a port
///
/// The controller re-prompts for a port straight away on
/// [`OpenError::Phantom`]; every other variant offers a retry of the same port.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OpenError {
    /// The OS still lists (or listed) the name but no live device backs it
    #[error("Port {port} does not exist or was disconnected: {reason}")]
    Phantom {
        /// Port name
        port: String,
        /// OS error text
        reason: String,
    },

    /// Another process holds the port
    #[error("Port {port} is busy: {reason}")]
    Busy {
        /// Port name
        port: String,
        /// OS error text
        reason: String,
    },

    /// Insufficient rights to open the port
    #[error("Permission denied: {port}")]
    PermissionDenied {
        /// Port name
        port: String,
    },

    /// The driver cannot apply the requested settings
    #[error("Unsupported setting for {port}: {reason}")]
    Unsupported {
        /// Port name
        port: String,
        /// Which setting
        reason: String,
    },

    /// Any other failure
    #[error("Failed to open {port}: {reason}")]
    Failed {
        /// Port name
        port: String,
        /// OS error text
        reason: String,
    },
}

impl OpenError {
    /// True when the device is gone, as opposed to busy or forbidden
    pub fn is_phantom(&self) -> bool {
        matches!(self, Self::Phantom { .. })
    }

    /// Name of the port the error refers to
    pub fn port(&self) -> &str {
        match self {
            Self::Phantom { port, .. }
            | Self::Busy { port, .. }
            | Self::PermissionDenied { port }
            | Self::Unsupported { port, .. }
            | Self::Failed { port, .. } => port,
        }
    }
}

/// Transport statistics
#[derive(Debug, Clone, Default)]
pub struct TransportStats {
    /// Bytes sent
    pub bytes_sent: u64,
    /// Bytes received
    pub bytes_received: u64,
    /// Frames sent (one per write)
    pub frames_sent: u64,
    /// Frames received (one per non-empty read)
    pub frames_received: u64,
    /// Connection uptime in seconds
    pub uptime_secs: u64,
}

/// An opened port
pub trait PortIo: Send {
    /// Number of bytes waiting in the input buffer
    fn bytes_to_read(&mut self) -> Result<usize, TransportError>;

    /// Read into `buf`; a read timeout yields `Ok(0)`
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Write all of `data` and flush
    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Discard everything waiting in the input buffer
    fn clear_input(&mut self) -> Result<(), TransportError>;
}

/// Enumerates and opens ports of one kind
pub trait PortBackend: Send + Sync {
    /// Names of the ports currently present, in display order
    fn list_ports(&self) -> Result<Vec<String>, TransportError>;

    /// Open `name` with `settings`; reads wait at most `read_timeout`
    fn open(
        &self,
        name: &str,
        settings: &PortSettings,
        read_timeout: Duration,
    ) -> Result<Box<dyn PortIo>, OpenError>;

    /// Whether this kind of port can be opened with `settings`
    fn check_settings(&self, settings: &PortSettings) -> Result<(), String> {
        settings.validate()
    }

    /// Re-check the live device list for `name`
    fn is_enumerated(&self, name: &str) -> bool {
        self.list_ports()
            .map(|ports| ports.iter().any(|p| p.eq_ignore_ascii_case(name)))
            .unwrap_or(false)
    }
}

/// One open port plus its configuration
///
/// Every operation takes `&self`; the handle lives behind a mutex so writes
/// from both execution contexts are serialized.
pub struct TransportSession {
    name: String,
    settings: PortSettings,
    read_timeout: Duration,
    backend: Arc<dyn PortBackend>,
    port: Mutex<Option<Box<dyn PortIo>>>,
    closed_locally: AtomicBool,
    stats: RwLock<TransportStats>,
    opened_at: Instant,
}

impl TransportSession {
    /// Open `name` through `backend`
    ///
    /// The port's read timeout is the settings' inter-byte timeout when one is
    /// defined, `read_timeout` otherwise.
    pub fn open(
        backend: Arc<dyn PortBackend>,
        name: &str,
        settings: PortSettings,
        read_timeout: Duration,
    ) -> Result<Self, OpenError> {
        backend.check_settings(&settings).map_err(|reason| OpenError::Unsupported {
            port: name.to_string(),
            reason,
        })?;

        let effective_timeout = settings.inter_byte_timeout().unwrap_or(read_timeout);
        let port = backend.open(name, &settings, effective_timeout)?;

        info!(port = name, settings = %settings, timeout_ms = effective_timeout.as_millis() as u64, "Port opened");

        Ok(Self {
            name: name.to_string(),
            settings,
            read_timeout: effective_timeout,
            backend,
            port: Mutex::new(Some(port)),
            closed_locally: AtomicBool::new(false),
            stats: RwLock::new(TransportStats::default()),
            opened_at: Instant::now(),
        })
    }

    /// Port name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Settings the port was opened with
    pub fn settings(&self) -> &PortSettings {
        &self.settings
    }

    /// Effective read timeout of the handle
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Read everything currently pending; empty when nothing is waiting
    pub fn read_available(&self) -> Result<Vec<u8>, TransportError> {
        let mut guard = self.port.lock();
        let port = guard.as_mut().ok_or(TransportError::Closed)?;

        let pending = port.bytes_to_read()?;
        if pending == 0 {
            return Ok(Vec::new());
        }

        let mut buffer = vec![0u8; pending];
        let n = port.read(&mut buffer)?;
        buffer.truncate(n);
        drop(guard);

        if n > 0 {
            let mut stats = self.stats.write();
            stats.bytes_received += n as u64;
            stats.frames_received += 1;
        }

        Ok(buffer)
    }

    /// Write one frame
    pub fn write(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut guard = self.port.lock();
        let port = guard.as_mut().ok_or(TransportError::Closed)?;
        port.write_all(data)?;
        drop(guard);

        let mut stats = self.stats.write();
        stats.bytes_sent += data.len() as u64;
        stats.frames_sent += 1;
        Ok(())
    }

    /// Drop whatever is waiting in the input buffer
    pub fn clear_input(&self) -> Result<(), TransportError> {
        let mut guard = self.port.lock();
        let port = guard.as_mut().ok_or(TransportError::Closed)?;
        port.clear_input()
    }

    /// Close the handle; returns `false` when it was already closed
    pub fn close(&self) -> bool {
        self.closed_locally.store(true, Ordering::SeqCst);
        let handle = self.port.lock().take();
        match handle {
            Some(port) => {
                drop(port);
                info!(port = %self.name, "Port closed");
                true
            }
            None => {
                debug!(port = %self.name, "Close on an already closed port ignored");
                false
            }
        }
    }

    /// Whether the handle is still held
    pub fn is_open(&self) -> bool {
        self.port.lock().is_some()
    }

    /// Whether [`close`](Self::close) has been called
    ///
    /// Errors observed after a local close are teardown races, not faults.
    pub fn closed_locally(&self) -> bool {
        self.closed_locally.load(Ordering::SeqCst)
    }

    /// Re-check the system device list for this port
    pub fn is_still_enumerated(&self) -> bool {
        self.backend.is_enumerated(&self.name)
    }

    /// Traffic counters
    pub fn stats(&self) -> TransportStats {
        let mut stats = self.stats.read().clone();
        stats.uptime_secs = self.opened_at.elapsed().as_secs();
        stats
    }
}

impl std::fmt::Debug for TransportSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSession")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .field("open", &self.is_open())
            .finish()
    }
}
