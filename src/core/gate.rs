//! Receive gate
//!
//! The one synchronization point between the foreground menu and the
//! background receiver: a boolean the foreground sets or clears and the
//! receiver waits on with a timeout.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Shared enable/disable flag for inbound processing
#[derive(Debug)]
pub struct ReceiveGate {
    enabled: Mutex<bool>,
    changed: Condvar,
}

impl ReceiveGate {
    /// Create a gate in the given state
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Mutex::new(enabled),
            changed: Condvar::new(),
        }
    }

    /// Allow the receiver to consume bytes
    pub fn enable(&self) {
        self.set(true);
    }

    /// Stop consuming bytes; they stay buffered in the port
    pub fn disable(&self) {
        self.set(false);
    }

    /// Set the flag and wake any waiter
    pub fn set(&self, enabled: bool) {
        *self.enabled.lock() = enabled;
        self.changed.notify_all();
    }

    /// Current state
    pub fn is_enabled(&self) -> bool {
        *self.enabled.lock()
    }

    /// Block until the gate is enabled or `timeout` passes; returns the state
    /// seen on wake-up
    pub fn wait_enabled(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut enabled = self.enabled.lock();
        while !*enabled {
            if self.changed.wait_until(&mut enabled, deadline).timed_out() {
                break;
            }
        }
        *enabled
    }
}

impl Default for ReceiveGate {
    fn default() -> Self {
        Self::new(true)
    }
}
