//! Virtual ports
//!
//! In-memory loopback pairs that behave like serial ports: the local end is
//! opened through [`LoopbackBackend`] like any other port, the peer end is
//! held by the caller (a test or a demo) and plays the attached device.

use crate::core::transport::{OpenError, PortBackend, PortIo, PortSettings, TransportError};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct LoopbackLine {
    /// Bytes written by the peer, waiting for the local end
    to_local: VecDeque<u8>,
    /// Bytes written by the local end, waiting for the peer
    to_peer: VecDeque<u8>,
    connected: bool,
    in_use: bool,
}

impl LoopbackLine {
    fn new() -> Self {
        Self {
            to_local: VecDeque::new(),
            to_peer: VecDeque::new(),
            connected: true,
            in_use: false,
        }
    }
}

type SharedLine = Arc<Mutex<LoopbackLine>>;

/// Backend serving named loopback ports
#[derive(Debug, Default)]
pub struct LoopbackBackend {
    ports: Mutex<Vec<(String, SharedLine)>>,
    open_failures: Mutex<HashMap<String, OpenError>>,
}

impl LoopbackBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a port and return the peer (device) end
    pub fn add_port(&self, name: &str) -> LoopbackPeer {
        let line = Arc::new(Mutex::new(LoopbackLine::new()));
        let mut ports = self.ports.lock();
        ports.retain(|(n, _)| n != name);
        ports.push((name.to_string(), line.clone()));
        LoopbackPeer {
            name: name.to_string(),
            line,
        }
    }

    /// Simulate pulling the device: the name disappears from the listing and
    /// every further I/O on an open handle fails with `Disconnected`
    pub fn unplug(&self, name: &str) {
        let mut ports = self.ports.lock();
        if let Some(pos) = ports.iter().position(|(n, _)| n == name) {
            let (_, line) = ports.remove(pos);
            line.lock().connected = false;
        }
    }

    /// Make the next `open` of `name` fail with `error`
    pub fn fail_next_open(&self, name: &str, error: OpenError) {
        self.open_failures.lock().insert(name.to_string(), error);
    }

    fn line(&self, name: &str) -> Option<SharedLine> {
        self.ports
            .lock()
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, line)| line.clone())
    }
}

impl PortBackend for LoopbackBackend {
    fn list_ports(&self) -> Result<Vec<String>, TransportError> {
        Ok(self.ports.lock().iter().map(|(n, _)| n.clone()).collect())
    }

    fn open(
        &self,
        name: &str,
        _settings: &PortSettings,
        _read_timeout: Duration,
    ) -> Result<Box<dyn PortIo>, OpenError> {
        if let Some(error) = self.open_failures.lock().remove(name) {
            return Err(error);
        }

        let line = self.line(name).ok_or_else(|| OpenError::Phantom {
            port: name.to_string(),
            reason: "no such loopback port".to_string(),
        })?;

        {
            let mut state = line.lock();
            if state.in_use {
                return Err(OpenError::Busy {
                    port: name.to_string(),
                    reason: "loopback port already open".to_string(),
                });
            }
            state.in_use = true;
        }

        Ok(Box::new(LoopbackPort { line }))
    }
}

/// Local end of a loopback pair
struct LoopbackPort {
    line: SharedLine,
}

impl LoopbackPort {
    fn connected(&self) -> Result<parking_lot::MutexGuard<'_, LoopbackLine>, TransportError> {
        let state = self.line.lock();
        if state.connected {
            Ok(state)
        } else {
            Err(TransportError::Disconnected("loopback device unplugged".to_string()))
        }
    }
}

impl PortIo for LoopbackPort {
    fn bytes_to_read(&mut self) -> Result<usize, TransportError> {
        Ok(self.connected()?.to_local.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut state = self.connected()?;
        let n = buf.len().min(state.to_local.len());
        for (slot, byte) in buf.iter_mut().zip(state.to_local.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.connected()?.to_peer.extend(data.iter().copied());
        Ok(())
    }

    fn clear_input(&mut self) -> Result<(), TransportError> {
        self.connected()?.to_local.clear();
        Ok(())
    }
}

impl Drop for LoopbackPort {
    fn drop(&mut self) {
        self.line.lock().in_use = false;
    }
}

/// Peer (device) end of a loopback pair
#[derive(Debug, Clone)]
pub struct LoopbackPeer {
    name: String,
    line: SharedLine,
}

impl LoopbackPeer {
    /// Port name of the pair
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send bytes towards the local end
    pub fn write(&self, data: &[u8]) {
        self.line.lock().to_local.extend(data.iter().copied());
    }

    /// Drain everything the local end has written so far
    pub fn take_received(&self) -> Vec<u8> {
        self.line.lock().to_peer.drain(..).collect()
    }

    /// Wait until at least `len` bytes arrived (or `timeout` elapsed), then
    /// drain and return everything received
    pub fn wait_received(&self, len: usize, timeout: Duration) -> Vec<u8> {
        let deadline = Instant::now() + timeout;
        while self.line.lock().to_peer.len() < len && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        self.take_received()
    }

    /// Bytes written by the peer that the local end has not consumed yet
    pub fn pending_for_local(&self) -> usize {
        self.line.lock().to_local.len()
    }

    /// Whether the local end currently holds the port open
    pub fn is_in_use(&self) -> bool {
        self.line.lock().in_use
    }
}
