//! Service commands: help, init, doctor, history

use super::Controller;
use crate::core::codec::SendMode;
use crate::core::history::{HistoryScope, HistoryStore};
use crate::core::service::{hex_escape_hint, ServiceCommand};
use crate::core::session::Session;
use crate::core::transport::TransportStats;
use std::fmt;
use tracing::{info, warn};

/// Outcome of one doctor check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    /// Healthy
    Pass,
    /// Usable, but worth a look
    Warn,
    /// Broken
    Fail,
    /// Informational only
    Info,
}

impl CheckStatus {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Warn => "WARN",
            Self::Fail => "FAIL",
            Self::Info => "INFO",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One doctor line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    /// Check identifier
    pub name: &'static str,
    /// Outcome
    pub status: CheckStatus,
    /// Human-readable detail
    pub detail: String,
}

impl CheckResult {
    fn new(name: &'static str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name,
            status,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  [{:>4}] {:<22} {}", self.status, self.name, self.detail)
    }
}

/// Run every doctor check against a live session
pub fn doctor_checks(session: &Session, history: &HistoryStore) -> Vec<CheckResult> {
    let transport = session.transport();
    let settings = transport.settings();

    let mut checks = vec![
        if transport.is_open() {
            CheckResult::new("port_open", CheckStatus::Pass, format!("{} is open", session.port_name()))
        } else {
            CheckResult::new("port_open", CheckStatus::Fail, "the port handle is closed")
        },
        if transport.is_still_enumerated() {
            CheckResult::new("port_enumerated", CheckStatus::Pass, "listed by the system")
        } else {
            CheckResult::new(
                "port_enumerated",
                CheckStatus::Fail,
                "no longer listed; the device may be disconnected",
            )
        },
        if session.receiver_alive() {
            CheckResult::new("receiver_alive", CheckStatus::Pass, "receiver thread running")
        } else {
            CheckResult::new("receiver_alive", CheckStatus::Fail, "receiver thread has stopped")
        },
        if session.is_receiving() {
            CheckResult::new("receive_gate", CheckStatus::Pass, "receiving enabled")
        } else {
            CheckResult::new(
                "receive_gate",
                CheckStatus::Warn,
                "receiving paused; inbound bytes stay buffered",
            )
        },
    ];

    checks.push(match history.path() {
        None => CheckResult::new("history_file", CheckStatus::Info, "in-memory history, not persisted"),
        Some(path) => match history.check_writable() {
            Ok(()) => CheckResult::new(
                "history_file",
                CheckStatus::Pass,
                format!("{} is writable", path.display()),
            ),
            Err(e) => CheckResult::new("history_file", CheckStatus::Fail, e.to_string()),
        },
    });

    checks.push(match settings.inter_byte_timeout() {
        Some(timeout) => CheckResult::new(
            "inter_byte_timeout",
            CheckStatus::Info,
            format!("{:.4} s at {}", timeout.as_secs_f64(), settings),
        ),
        None => CheckResult::new(
            "inter_byte_timeout",
            CheckStatus::Warn,
            format!("not used (baud rate 0), reads wait {} ms", transport.read_timeout().as_millis()),
        ),
    });

    checks.push(CheckResult::new(
        "traffic",
        CheckStatus::Info,
        traffic_summary(&transport.stats()),
    ));

    checks
}

fn traffic_summary(stats: &TransportStats) -> String {
    format!(
        "tx {} B / {} frames, rx {} B / {} chunks, up {} s",
        stats.bytes_sent, stats.frames_sent, stats.bytes_received, stats.frames_received, stats.uptime_secs
    )
}

impl Controller {
    pub(super) fn run_service(&mut self, command: ServiceCommand, session: &Session, mode: SendMode) {
        info!(command = %command, mode = mode.key(), "Service command");
        match command {
            ServiceCommand::Help => {
                self.screen.line("Service commands:");
                for cmd in ServiceCommand::ALL {
                    self.screen
                        .line(&format!("  {:<8} {}", cmd.name(), cmd.description()));
                }
                self.screen.line(&format!(
                    "Mode {}: Esc returns to the menu, Up/Down recall history, Tab completes.",
                    mode.label()
                ));
                if mode != SendMode::Text {
                    self.screen.line(hex_escape_hint());
                }
            }
            ServiceCommand::Init => {
                match session.resume_receiving(true) {
                    Ok(()) => self.screen.line("Input buffer cleared, receiving enabled."),
                    Err(e) => {
                        warn!(error = %e, "Clearing the input buffer failed");
                        self.screen
                            .line(&format!("Receiving enabled; clearing the input buffer failed: {}", e));
                    }
                }
                let transport = session.transport();
                self.screen.line(&format!(
                    "Link: {} @ {}, read timeout {} ms",
                    session.port_name(),
                    transport.settings(),
                    transport.read_timeout().as_millis()
                ));
                self.screen
                    .line(&format!("Traffic: {}", traffic_summary(&transport.stats())));
            }
            ServiceCommand::Doctor => {
                self.screen.line("comterm doctor");
                let checks = doctor_checks(session, &self.history);
                for check in &checks {
                    self.screen.line(&check.to_string());
                }
                if checks.iter().any(|c| c.status == CheckStatus::Fail) {
                    self.screen.line("Result: one or more checks failed");
                } else {
                    self.screen.line("Result: all checks passed");
                }
            }
            ServiceCommand::History => self.print_history(HistoryScope::Mode(mode)),
        }
    }
}
