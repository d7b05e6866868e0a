//! Port selection, line settings and opening

use super::{Controller, ControllerError, OpenOutcome, PortChoice};
use crate::core::input::LineEditor;
use crate::core::transport::{PortSettings, SerialParity, SerialStopBits, TransportSession};
use tracing::warn;

const BAUD_RATES: [u32; 8] = [115_200, 1200, 2400, 4800, 9600, 19200, 38400, 57600];
const DATA_BITS: [u8; 4] = [8, 5, 6, 7];

impl Controller {
    pub(super) fn select_port(&mut self) -> Result<PortChoice, ControllerError> {
        loop {
            let ports = self.backend.list_ports().unwrap_or_else(|e| {
                warn!(error = %e, "Port enumeration failed");
                self.screen.line(&format!("Port enumeration failed: {}", e));
                Vec::new()
            });

            if ports.is_empty() {
                self.screen.line("\nNo serial ports available!");
                match self.read_choice("[r]efresh, [n]ew window or [q]uit: ", &['r', 'n', 'q'])? {
                    Some('r') => continue,
                    Some('n') => {
                        self.launch_instance();
                        continue;
                    }
                    _ => return Ok(PortChoice::NoPorts),
                }
            }

            self.screen.line("\nAvailable ports (sorted):");
            for (i, port) in ports.iter().enumerate() {
                self.screen.line(&format!("  {}. {}", i + 1, port));
            }

            let prompt = format!(
                "Select port (1-{}), 'n' opens a new window, Esc quits: ",
                ports.len()
            );
            let line = LineEditor::new(self.input.as_mut(), &self.screen).read_line(&prompt, None)?;
            let Some(line) = line else {
                return Ok(PortChoice::Quit);
            };

            let line = line.trim();
            if line.eq_ignore_ascii_case("n") {
                self.launch_instance();
                continue;
            }
            match line.parse::<usize>() {
                Ok(n) if (1..=ports.len()).contains(&n) => {
                    return Ok(PortChoice::Port(ports[n - 1].clone()));
                }
                Ok(_) => self.screen.line("Enter a valid port number!"),
                Err(_) => self.screen.line("Enter a number!"),
            }
        }
    }

    fn launch_instance(&mut self) {
        match self.launcher.launch() {
            Ok(pid) => self
                .screen
                .line(&format!("Started another instance (pid {})", pid)),
            Err(e) => {
                warn!(error = %e, "Launching another instance failed");
                self.screen
                    .line(&format!("Could not start another instance: {}", e));
            }
        }
    }

    pub(super) fn configure_settings(&mut self) -> Result<Option<PortSettings>, ControllerError> {
        let defaults = self.options.default_settings;
        if self.options.use_defaults {
            self.screen.line(&format!("\nUsing default settings: {}", defaults));
            return Ok(Some(defaults));
        }

        self.screen.line("\n=== Serial port setup ===");
        self.screen.line("1. Manual setup");
        self.screen.line("2. Use defaults");
        self.screen.line(&format!(
            "   ({} baud, {} data bits, parity {}, {} stop bit(s))",
            defaults.baud_rate,
            defaults.data_bits,
            defaults.parity.name().to_lowercase(),
            defaults.stop_bits
        ));

        match self.read_choice("Select setup mode (1 or 2): ", &['1', '2'])? {
            None => Ok(None),
            Some('2') => Ok(Some(defaults)),
            Some(_) => self.manual_settings(),
        }
    }

    fn manual_settings(&mut self) -> Result<Option<PortSettings>, ControllerError> {
        let bauds: Vec<String> = BAUD_RATES.iter().map(ToString::to_string).collect();
        let Some(baud) = self.choose_option("Baud rate:", &bauds)? else {
            return Ok(None);
        };

        let bits: Vec<String> = DATA_BITS.iter().map(ToString::to_string).collect();
        let Some(data_bits) = self.choose_option("Data bits:", &bits)? else {
            return Ok(None);
        };

        // only offer what the backend can actually open
        let base = PortSettings::default();
        let parities: Vec<SerialParity> = SerialParity::ALL
            .into_iter()
            .filter(|p| self.backend.check_settings(&base.parity(*p)).is_ok())
            .collect();
        let names: Vec<String> = parities.iter().map(|p| p.name().to_string()).collect();
        let Some(parity) = self.choose_option("Parity:", &names)? else {
            return Ok(None);
        };

        let stops: Vec<SerialStopBits> = SerialStopBits::ALL
            .into_iter()
            .filter(|s| self.backend.check_settings(&base.stop_bits(*s)).is_ok())
            .collect();
        let names: Vec<String> = stops.iter().map(ToString::to_string).collect();
        let Some(stop_bits) = self.choose_option("Stop bits:", &names)? else {
            return Ok(None);
        };

        Ok(Some(
            PortSettings::new(BAUD_RATES[baud])
                .data_bits(DATA_BITS[data_bits])
                .parity(parities[parity])
                .stop_bits(stops[stop_bits]),
        ))
    }

    /// Numbered single-key choice (at most nine options)
    fn choose_option(&mut self, title: &str, options: &[String]) -> Result<Option<usize>, ControllerError> {
        self.screen.line(&format!("\n{}", title));
        for (i, option) in options.iter().enumerate() {
            self.screen.line(&format!("  {}. {}", i + 1, option));
        }

        let keys: Vec<char> = (1..=options.len())
            .filter_map(|i| char::from_digit(i as u32, 10))
            .collect();
        let choice = self.read_choice("Select number: ", &keys)?;
        Ok(choice
            .and_then(|c| c.to_digit(10))
            .map(|d| d as usize - 1))
    }

    pub(super) fn open_port(
        &mut self,
        port: &str,
        settings: PortSettings,
    ) -> Result<OpenOutcome, ControllerError> {
        loop {
            if !self.backend.is_enumerated(port) {
                self.screen.line(&format!(
                    "\nPort {} is no longer available. Refreshing the port list...",
                    port
                ));
                return Ok(OpenOutcome::Reselect);
            }

            match settings.inter_byte_timeout() {
                Some(timeout) => self.screen.line(&format!(
                    "Inter-byte timeout: {:.4} s",
                    timeout.as_secs_f64()
                )),
                None => self
                    .screen
                    .line("Inter-byte timeout not used (baud rate 0)"),
            }

            let error = match TransportSession::open(
                self.backend.clone(),
                port,
                settings,
                self.options.read_timeout,
            ) {
                Ok(transport) => {
                    self.screen.line(&format!("\nConnected: {} @ {}", port, settings));
                    return Ok(OpenOutcome::Opened(transport));
                }
                Err(e) => e,
            };

            warn!(port, error = %error, "Open failed");
            self.screen.line(&format!("\nFailed to open {}: {}", port, error));

            if error.is_phantom() {
                self.screen.line(
                    "Looks like a phantom or disconnected port. Choose the port again from the refreshed list.",
                );
                return Ok(OpenOutcome::Reselect);
            }

            self.screen.line("Possible causes:");
            self.screen.line("   - the port is used by another program");
            self.screen.line("   - insufficient access rights");
            self.screen.line("   - the device was disconnected");

            match self.read_choice("[r]etry, choose [o]ther port or [q]uit: ", &['r', 'o', 'q'])? {
                Some('r') => continue,
                Some('q') => return Ok(OpenOutcome::Quit),
                _ => return Ok(OpenOutcome::Reselect),
            }
        }
    }
}
