//! Session management for an open port
//!
//! A Session exclusively owns one [`TransportSession`], the receive gate
//! shared with its receiver, and at most one running receiver thread.

use crate::core::gate::ReceiveGate;
use crate::core::receiver::{
    ReceiverConfig, ReceiverExit, ReceiverHandle, ReceiverJoinTimeout, ReceiverObserver,
};
use crate::core::simulator::Responder;
use crate::core::transport::{TransportError, TransportSession};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Session errors
#[derive(Error, Debug)]
pub enum SessionError {
    /// A receiver is already attached to this session
    #[error("Receiver already running")]
    ReceiverRunning,

    /// The receiver thread could not be started
    #[error("Failed to start receiver: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Outcome of [`Session::shutdown`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// The port was open and has now been closed
    pub port_closed: bool,
    /// How the receiver ended, if one was running and it stopped in time
    pub receiver_exit: Option<ReceiverExit>,
    /// The receiver was still running when the join timeout expired
    pub receiver_timed_out: bool,
}

/// Active connection
pub struct Session {
    transport: Arc<TransportSession>,
    gate: Arc<ReceiveGate>,
    receiver: Option<ReceiverHandle>,
    config: ReceiverConfig,
}

impl Session {
    /// Wrap an opened transport; receiving starts disabled until
    /// [`start_receiver`](Self::start_receiver)
    pub fn new(transport: TransportSession, config: ReceiverConfig) -> Self {
        Self {
            transport: Arc::new(transport),
            gate: Arc::new(ReceiveGate::new(false)),
            receiver: None,
            config,
        }
    }

    /// Enable receiving and start the background receiver
    pub fn start_receiver(
        &mut self,
        responder: Arc<dyn Responder>,
        observer: Arc<dyn ReceiverObserver>,
    ) -> Result<(), SessionError> {
        if self.receiver.as_ref().map_or(false, ReceiverHandle::is_alive) {
            return Err(SessionError::ReceiverRunning);
        }

        self.gate.enable();
        let handle = ReceiverHandle::spawn(
            self.transport.clone(),
            self.gate.clone(),
            responder,
            observer,
            self.config,
        )?;
        self.receiver = Some(handle);
        Ok(())
    }

    /// The underlying transport
    pub fn transport(&self) -> &Arc<TransportSession> {
        &self.transport
    }

    /// Port name
    pub fn port_name(&self) -> &str {
        self.transport.name()
    }

    /// Receiver timing in use
    pub fn receiver_config(&self) -> &ReceiverConfig {
        &self.config
    }

    /// Write an operator frame
    pub fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        self.transport.write(data)
    }

    /// Stop consuming inbound bytes; they accumulate in the port
    pub fn pause_receiving(&self) {
        self.gate.disable();
        info!(port = %self.port_name(), "Receiving paused");
    }

    /// Resume consuming inbound bytes, optionally discarding what piled up
    pub fn resume_receiving(&self, clear_input: bool) -> Result<(), TransportError> {
        let cleared = if clear_input {
            self.transport.clear_input()
        } else {
            Ok(())
        };
        self.gate.enable();
        info!(port = %self.port_name(), clear_input, "Receiving resumed");
        cleared
    }

    /// Whether the gate is open
    pub fn is_receiving(&self) -> bool {
        self.gate.is_enabled()
    }

    /// Whether the receiver thread is running
    pub fn receiver_alive(&self) -> bool {
        self.receiver.as_ref().map_or(false, ReceiverHandle::is_alive)
    }

    /// Tear the connection down
    ///
    /// The gate is left enabled so the receiver never parks on a stale wait,
    /// the port is closed (a no-op if already closed), then the receiver is
    /// asked to stop and joined for at most the configured timeout.
    pub fn shutdown(&mut self) -> ShutdownReport {
        self.gate.enable();
        let port_closed = self.transport.close();

        let mut report = ShutdownReport {
            port_closed,
            receiver_exit: None,
            receiver_timed_out: false,
        };

        if let Some(mut handle) = self.receiver.take() {
            handle.request_stop();
            match handle.join_timeout(self.config.join_timeout) {
                Ok(exit) => report.receiver_exit = Some(exit),
                Err(ReceiverJoinTimeout(timeout)) => {
                    warn!(port = %self.port_name(), ?timeout, "Receiver did not stop in time");
                    report.receiver_timed_out = true;
                }
            }
        }

        report
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.receiver.is_some() || self.transport.is_open() {
            self.shutdown();
        }
    }
}
