//! Background receiver
//!
//! One thread per open session. Each cycle waits (bounded) for the receive
//! gate, drains whatever the port holds as one chunk, reports it, and writes
//! back the responder's reply if there is one. The loop never redraws menus
//! or prompts; it only emits [`ReceiverEvent`]s.

use crate::core::codec::format_hex;
use crate::core::gate::ReceiveGate;
use crate::core::simulator::Responder;
use crate::core::transport::{TransportError, TransportSession};
use chrono::{DateTime, Local};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Receiver timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiverConfig {
    /// Longest wait on the gate per cycle
    pub poll_interval: Duration,
    /// Pause after a cycle that found the gate closed or the port empty
    pub idle_sleep: Duration,
    /// How long shutdown waits for the thread
    pub join_timeout: Duration,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            idle_sleep: Duration::from_millis(50),
            join_timeout: Duration::from_secs(1),
        }
    }
}

/// Notifications emitted by the receiver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverEvent {
    /// A chunk was read from the port
    Received {
        /// Port name
        port: String,
        /// Local arrival time
        at: DateTime<Local>,
        /// Bytes read
        data: Vec<u8>,
    },
    /// The responder's reply was written back
    AutoResponse {
        /// Port name
        port: String,
        /// Local send time
        at: DateTime<Local>,
        /// Bytes written
        data: Vec<u8>,
    },
    /// The loop stopped on a genuine device error
    Fault {
        /// Port name
        port: String,
        /// Local time of the error
        at: DateTime<Local>,
        /// Error text
        error: String,
    },
}

/// Observer of receiver notifications
pub trait ReceiverObserver: Send + Sync {
    /// Handle one event; called from the receiver thread
    fn notify(&self, event: ReceiverEvent);
}

impl ReceiverObserver for Sender<ReceiverEvent> {
    fn notify(&self, event: ReceiverEvent) {
        let _ = self.send(event);
    }
}

/// Why the loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverExit {
    /// Stop was requested (or the handle dropped)
    Stopped,
    /// The port was closed by the controller
    PortClosed,
    /// A device error ended the loop
    Fault(String),
    /// The thread panicked
    Panicked,
}

/// The receiver did not finish within the join timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("receiver did not stop within {0:?}")]
pub struct ReceiverJoinTimeout(pub Duration);

struct ReceiverLoop {
    transport: Arc<TransportSession>,
    gate: Arc<ReceiveGate>,
    responder: Arc<dyn Responder>,
    observer: Arc<dyn ReceiverObserver>,
    config: ReceiverConfig,
    stop_rx: Receiver<()>,
}

impl ReceiverLoop {
    fn run(self) -> ReceiverExit {
        let port = self.transport.name().to_string();
        info!(port = %port, "Receiver started");

        loop {
            match self.stop_rx.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => {
                    debug!(port = %port, "Receiver stop requested");
                    return ReceiverExit::Stopped;
                }
                Err(TryRecvError::Empty) => {}
            }

            if !self.gate.wait_enabled(self.config.poll_interval) {
                thread::sleep(self.config.idle_sleep);
                continue;
            }

            let chunk = match self.transport.read_available() {
                Ok(chunk) => chunk,
                Err(e) => return self.stopped_by(&port, e),
            };
            if chunk.is_empty() {
                thread::sleep(self.config.idle_sleep);
                continue;
            }

            debug!(port = %port, rx = %format_hex(&chunk), "Chunk received");
            self.observer.notify(ReceiverEvent::Received {
                port: port.clone(),
                at: Local::now(),
                data: chunk.clone(),
            });

            if let Some(reply) = self.responder.respond(&chunk) {
                if let Err(e) = self.transport.write(&reply) {
                    return self.stopped_by(&port, e);
                }
                debug!(port = %port, tx = %format_hex(&reply), "Auto-response sent");
                self.observer.notify(ReceiverEvent::AutoResponse {
                    port: port.clone(),
                    at: Local::now(),
                    data: reply,
                });
            }
        }
    }

    fn stopped_by(&self, port: &str, error: TransportError) -> ReceiverExit {
        if self.transport.closed_locally() {
            debug!(port, %error, "Receiver finished after local close");
            return ReceiverExit::PortClosed;
        }
        warn!(port, %error, "Receiver stopped on port error");
        self.observer.notify(ReceiverEvent::Fault {
            port: port.to_string(),
            at: Local::now(),
            error: error.to_string(),
        });
        ReceiverExit::Fault(error.to_string())
    }
}

/// Handle to a running receiver thread
pub struct ReceiverHandle {
    stop_tx: Sender<()>,
    done_rx: Receiver<ReceiverExit>,
    thread: Option<JoinHandle<()>>,
    exit: Option<ReceiverExit>,
}

impl ReceiverHandle {
    /// Start the receiver thread for `transport`
    pub fn spawn(
        transport: Arc<TransportSession>,
        gate: Arc<ReceiveGate>,
        responder: Arc<dyn Responder>,
        observer: Arc<dyn ReceiverObserver>,
        config: ReceiverConfig,
    ) -> std::io::Result<Self> {
        let (stop_tx, stop_rx) = bounded(1);
        let (done_tx, done_rx) = bounded(1);
        let name = format!("rx-{}", transport.name());

        let receiver = ReceiverLoop {
            transport,
            gate,
            responder,
            observer,
            config,
            stop_rx,
        };

        let thread = thread::Builder::new().name(name).spawn(move || {
            let exit = receiver.run();
            let _ = done_tx.send(exit);
        })?;

        Ok(Self {
            stop_tx,
            done_rx,
            thread: Some(thread),
            exit: None,
        })
    }

    /// Ask the loop to finish at its next cycle
    pub fn request_stop(&self) {
        let _ = self.stop_tx.try_send(());
    }

    /// Whether the thread is still running
    pub fn is_alive(&self) -> bool {
        self.thread.as_ref().map_or(false, |t| !t.is_finished())
    }

    /// Wait up to `timeout` for the loop to end
    ///
    /// On timeout the thread is left to finish on its own.
    pub fn join_timeout(&mut self, timeout: Duration) -> Result<ReceiverExit, ReceiverJoinTimeout> {
        if let Some(exit) = &self.exit {
            return Ok(exit.clone());
        }

        let exit = match self.done_rx.recv_timeout(timeout) {
            Ok(exit) => exit,
            Err(RecvTimeoutError::Timeout) => return Err(ReceiverJoinTimeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => ReceiverExit::Panicked,
        };

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Receiver thread panicked");
            }
        }
        self.exit = Some(exit.clone());
        Ok(exit)
    }
}

impl std::fmt::Debug for ReceiverHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiverHandle")
            .field("alive", &self.is_alive())
            .field("exit", &self.exit)
            .finish()
    }
}
