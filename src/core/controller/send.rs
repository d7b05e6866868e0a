//! Send loops (text, HEX, HEX+CRC)

use super::{ConnectedMode, Controller, ControllerError, ControllerState};
use crate::core::codec::{encode_line, format_hex, SendMode};
use crate::core::input::{InputError, LineEditor};
use crate::core::protocol::CRC16_LEN;
use crate::core::screen::timestamp;
use crate::core::service::ServiceCommand;
use crate::core::session::Session;
use tracing::{debug, warn};

impl Controller {
    pub(super) fn send_loop(&mut self, session: &mut Session, mode: SendMode) -> Result<(), ControllerError> {
        self.set_state(ControllerState::Connected(ConnectedMode::Sending(mode)));

        if !session.is_receiving() {
            session.resume_receiving(false)?;
            self.screen.line("Receiving resumed");
        }
        self.screen.line(&format!(
            "\n--- {} send mode (Esc returns to the menu) ---",
            mode.label()
        ));

        loop {
            if !session.receiver_alive() {
                return Err(ControllerError::ReceiverStopped);
            }

            let alive = || session.receiver_alive();
            let line = match LineEditor::new(self.input.as_mut(), &self.screen)
                .watch(self.options.key_poll, &alive)
                .read_line(mode.prompt(), Some((&self.history, mode)))
            {
                Ok(line) => line,
                Err(InputError::Abandoned) => return Err(ControllerError::ReceiverStopped),
                Err(e) => return Err(e.into()),
            };
            let Some(line) = line else {
                return Ok(());
            };

            if let Some(command) = ServiceCommand::resolve(&line) {
                self.run_service(command, session, mode);
                continue;
            }
            if line.trim().is_empty() {
                continue;
            }

            self.transmit(session, mode, &line)?;
        }
    }

    fn transmit(&mut self, session: &Session, mode: SendMode, line: &str) -> Result<(), ControllerError> {
        let frame = match encode_line(mode, line) {
            Ok(frame) => frame,
            Err(e) => {
                self.screen.line(&format!("Error: {}", e));
                return Ok(());
            }
        };

        session.send(&frame)?;
        debug!(port = %session.port_name(), mode = mode.key(), tx = %format_hex(&frame), "Frame sent");

        let detail = match mode {
            SendMode::Text => format!("TX text: {}", line),
            SendMode::Hex => format!("TX HEX: {}", format_hex(&frame)),
            SendMode::HexCrc => {
                let crc = &frame[frame.len().saturating_sub(CRC16_LEN)..];
                format!("TX HEX+CRC: {} | CRC: {}", format_hex(&frame), format_hex(crc))
            }
        };
        self.screen.line(&format!(
            "{} {} {}",
            timestamp(&chrono::Local::now()),
            session.port_name(),
            detail
        ));

        if let Err(e) = self.history.record(mode, line) {
            warn!(error = %e, "History not saved");
            self.screen.line(&format!("History not saved: {}", e));
        }
        Ok(())
    }
}
