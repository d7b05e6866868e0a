//! Top-level command menu of a connected session

use super::{ConnectedMode, Controller, ControllerError, ControllerState, SessionEnd};
use crate::core::codec::SendMode;
use crate::core::input::KeyEvent;
use crate::core::session::Session;
use tracing::warn;

/// Digit commands of the menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuCommand {
    Send(SendMode),
    StopReceiving,
    ResumeReceiving,
    ClearScreen,
    Quit,
    ManageHistory,
}

impl MenuCommand {
    fn from_key(c: char) -> Option<Self> {
        match c {
            '1' => Some(Self::Send(SendMode::Text)),
            '2' => Some(Self::Send(SendMode::Hex)),
            '3' => Some(Self::Send(SendMode::HexCrc)),
            '4' => Some(Self::StopReceiving),
            '5' => Some(Self::ResumeReceiving),
            '6' => Some(Self::ClearScreen),
            '7' => Some(Self::Quit),
            '8' => Some(Self::ManageHistory),
            _ => None,
        }
    }
}

impl Controller {
    pub(super) fn connected_loop(&mut self, session: &mut Session) -> Result<SessionEnd, ControllerError> {
        self.set_state(ControllerState::Connected(ConnectedMode::MenuIdle));
        self.show_menu(session, None);

        loop {
            if !session.receiver_alive() {
                self.screen.line("\nReceiver stopped unexpectedly.");
                return Ok(SessionEnd::Fault);
            }
            if !self.input.key_available(self.options.key_poll)? {
                continue;
            }

            let c = match self.input.read_key()? {
                KeyEvent::CtrlC => return Ok(SessionEnd::Cancelled),
                KeyEvent::Escape => {
                    session.pause_receiving();
                    self.show_menu(session, Some("Receiving stopped (Esc)"));
                    continue;
                }
                KeyEvent::Char(c) => c,
                _ => continue,
            };

            self.input.discard_pending();
            if self.input.is_raw() {
                self.screen.line(&c.to_string());
            }

            let status = match MenuCommand::from_key(c) {
                Some(MenuCommand::Send(mode)) => {
                    self.send_loop(session, mode)?;
                    None
                }
                Some(MenuCommand::StopReceiving) => {
                    session.pause_receiving();
                    Some("Receiving stopped".to_string())
                }
                Some(MenuCommand::ResumeReceiving) => match session.resume_receiving(true) {
                    Ok(()) => Some("Receiving resumed".to_string()),
                    Err(e) => {
                        warn!(error = %e, "Clearing the input buffer failed");
                        Some(format!("Receiving resumed; clearing the input buffer failed: {}", e))
                    }
                },
                Some(MenuCommand::ClearScreen) => {
                    self.screen.clear();
                    None
                }
                Some(MenuCommand::Quit) => return Ok(SessionEnd::Quit),
                Some(MenuCommand::ManageHistory) => {
                    self.manage_history()?;
                    None
                }
                None => Some(format!("Unknown command '{}'", c)),
            };

            self.set_state(ControllerState::Connected(ConnectedMode::MenuIdle));
            self.show_menu(session, status.as_deref());
        }
    }

    fn show_menu(&self, session: &Session, status: Option<&str>) {
        self.screen.line("\n=== Command menu ===");
        self.screen.line("1. Send text");
        self.screen.line("2. Send HEX");
        self.screen.line("3. Send HEX with CRC16");
        self.screen.line("4. Stop receiving");
        self.screen.line("5. Resume receiving");
        self.screen.line("6. Clear screen");
        self.screen.line("7. Quit");
        self.screen.line("8. Manage history");
        self.screen.line(&format!(
            "Port {} @ {} | receiving {}",
            session.port_name(),
            session.transport().settings(),
            if session.is_receiving() { "ON" } else { "OFF" }
        ));
        if let Some(status) = status {
            self.screen.line(&format!("\n{}", status));
        }
        self.screen
            .print("Select (1-8), Esc pauses receiving, Ctrl+C exits: ");
    }
}
