//! Session controller
//!
//! Top-level state machine of the terminal:
//!
//! ```text
//! SelectingPort -> ConfiguringSettings -> Opening -> Connected -> Closing
//!       ^                  |                 |                     |
//!       +------------------+-----------------+---------------------+--> Terminated
//! ```
//!
//! While connected, the controller owns the foreground: it reads keys, runs
//! the send loops and the history manager, and leaves inbound traffic to the
//! background receiver of the [`Session`].

mod diagnostics;
mod history_menu;
mod menu;
mod port_select;
mod send;

pub use diagnostics::{CheckResult, CheckStatus};

use crate::config::AppConfig;
use crate::core::codec::SendMode;
use crate::core::history::HistoryStore;
use crate::core::input::{InputError, KeyEvent, RawInput};
use crate::core::receiver::ReceiverConfig;
use crate::core::screen::{ConsoleObserver, Screen};
use crate::core::session::{Session, SessionError};
use crate::core::simulator::{EmulationTable, Responder};
use crate::core::transport::{PortBackend, PortSettings, TransportError, TransportSession};
use crate::utils::launcher::{ProcessLauncher, SelfLauncher};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Controller errors
#[derive(Error, Debug)]
pub enum ControllerError {
    /// Keyboard input failed or was cancelled
    #[error(transparent)]
    Input(#[from] InputError),

    /// The port failed during the session
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The receiver could not be started
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The receiver thread ended on its own
    #[error("Receiver stopped unexpectedly")]
    ReceiverStopped,
}

/// What the connected phase is doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectedMode {
    /// Waiting for a menu command
    MenuIdle,
    /// A send loop is active
    Sending(SendMode),
    /// The history manager is open
    ManagingHistory,
}

/// Controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Choosing a port
    SelectingPort,
    /// Choosing line settings
    ConfiguringSettings,
    /// Opening the port
    Opening,
    /// Port open, receiver running
    Connected(ConnectedMode),
    /// Tearing the session down
    Closing,
    /// Finished
    Terminated,
}

/// How [`Controller::run`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerExit {
    /// The operator quit
    Quit,
    /// Ctrl+C
    Cancelled,
    /// No port was available and the operator gave up
    NoPort,
}

/// Controller tuning
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Port to open on the first pass instead of asking
    pub preselected_port: Option<String>,
    /// Skip the settings dialog
    pub use_defaults: bool,
    /// Settings offered as the defaults
    pub default_settings: PortSettings,
    /// Read timeout when the settings define no inter-byte timeout
    pub read_timeout: Duration,
    /// Receiver timing
    pub receiver: ReceiverConfig,
    /// How long the menu waits for a key before re-checking the receiver
    pub key_poll: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            preselected_port: None,
            use_defaults: false,
            default_settings: PortSettings::default(),
            read_timeout: Duration::from_secs(1),
            receiver: ReceiverConfig::default(),
            key_poll: Duration::from_millis(100),
        }
    }
}

impl ControllerOptions {
    /// Options from the application config
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            default_settings: config.serial.port_settings(),
            read_timeout: config.serial.read_timeout(),
            receiver: config.receiver.receiver_config(),
            ..Self::default()
        }
    }
}

enum PortChoice {
    Port(String),
    Quit,
    NoPorts,
}

enum OpenOutcome {
    Opened(TransportSession),
    Reselect,
    Quit,
}

enum SessionEnd {
    Quit,
    Cancelled,
    Fault,
}

/// Interactive terminal controller
pub struct Controller {
    options: ControllerOptions,
    backend: Arc<dyn PortBackend>,
    input: Box<dyn RawInput>,
    screen: Arc<Screen>,
    history: HistoryStore,
    responder: Arc<dyn Responder>,
    launcher: Box<dyn ProcessLauncher>,
    state: ControllerState,
}

impl Controller {
    /// Controller with default options, the built-in emulation table and a
    /// launcher that relaunches this executable
    pub fn new(
        backend: Arc<dyn PortBackend>,
        input: Box<dyn RawInput>,
        screen: Arc<Screen>,
        history: HistoryStore,
    ) -> Self {
        screen.set_raw(input.is_raw());
        Self {
            options: ControllerOptions::default(),
            backend,
            input,
            screen,
            history,
            responder: Arc::new(EmulationTable::builtin()),
            launcher: Box::new(SelfLauncher::default()),
            state: ControllerState::SelectingPort,
        }
    }

    /// Replace the options
    #[must_use]
    pub fn with_options(mut self, options: ControllerOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the responder
    #[must_use]
    pub fn with_responder(mut self, responder: Arc<dyn Responder>) -> Self {
        self.responder = responder;
        self
    }

    /// Replace the launcher
    #[must_use]
    pub fn with_launcher(mut self, launcher: Box<dyn ProcessLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Current state
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Send history
    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Run until the operator quits or cancels
    pub fn run(&mut self) -> Result<ControllerExit, ControllerError> {
        let result = self.run_passes();
        self.set_state(ControllerState::Terminated);
        match result {
            Err(ControllerError::Input(InputError::Cancelled)) => {
                self.screen.line("\nStopped by Ctrl+C");
                Ok(ControllerExit::Cancelled)
            }
            other => other,
        }
    }

    fn run_passes(&mut self) -> Result<ControllerExit, ControllerError> {
        let mut preselected = self.options.preselected_port.take();

        loop {
            self.set_state(ControllerState::SelectingPort);
            let port = match preselected.take() {
                Some(port) => port,
                None => match self.select_port()? {
                    PortChoice::Port(port) => port,
                    PortChoice::Quit => {
                        self.screen.line("\nGoodbye!");
                        return Ok(ControllerExit::Quit);
                    }
                    PortChoice::NoPorts => return Ok(ControllerExit::NoPort),
                },
            };

            self.set_state(ControllerState::ConfiguringSettings);
            let Some(settings) = self.configure_settings()? else {
                continue;
            };

            self.set_state(ControllerState::Opening);
            let transport = match self.open_port(&port, settings)? {
                OpenOutcome::Opened(transport) => transport,
                OpenOutcome::Reselect => continue,
                OpenOutcome::Quit => {
                    self.screen.line("\nGoodbye!");
                    return Ok(ControllerExit::Quit);
                }
            };

            match self.run_session(transport)? {
                SessionEnd::Quit => {
                    self.screen.line("\nGoodbye!");
                    return Ok(ControllerExit::Quit);
                }
                SessionEnd::Cancelled => {
                    self.screen.line("\nStopped by Ctrl+C");
                    return Ok(ControllerExit::Cancelled);
                }
                SessionEnd::Fault => {
                    if !self.confirm("Retry port selection? (y/n): ")? {
                        self.screen.line("\nGoodbye!");
                        return Ok(ControllerExit::Quit);
                    }
                }
            }
        }
    }

    fn run_session(&mut self, transport: TransportSession) -> Result<SessionEnd, ControllerError> {
        let mut session = Session::new(transport, self.options.receiver);
        let observer = Arc::new(ConsoleObserver::new(self.screen.clone()));
        let result = match session.start_receiver(self.responder.clone(), observer) {
            Ok(()) => {
                self.screen.line("Emulator ready.");
                self.connected_loop(&mut session)
            }
            Err(e) => Err(e.into()),
        };
        Ok(self.end_session(&mut session, result))
    }

    /// Close the port whatever the connected phase returned
    fn end_session(
        &mut self,
        session: &mut Session,
        result: Result<SessionEnd, ControllerError>,
    ) -> SessionEnd {
        self.set_state(ControllerState::Closing);
        self.close_session(session);

        match result {
            Ok(end) => end,
            Err(ControllerError::Input(InputError::Cancelled)) => SessionEnd::Cancelled,
            Err(e) => {
                warn!(error = %e, "Session ended by a fault");
                self.screen.line(&format!("\nUnexpected error: {}", e));
                SessionEnd::Fault
            }
        }
    }

    fn close_session(&mut self, session: &mut Session) {
        let report = session.shutdown();
        if report.port_closed {
            self.screen.line(&format!("\nPort {} closed.", session.port_name()));
        }
        if report.receiver_timed_out {
            self.screen
                .line("Receiver did not finish after the port was closed.");
        }
        info!(port = %session.port_name(), exit = ?report.receiver_exit, "Session closed");
    }

    fn set_state(&mut self, state: ControllerState) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "Controller state");
            self.state = state;
        }
    }

    /// Wait for one of `choices` (lowercase); `None` on Escape
    fn read_choice(&mut self, prompt: &str, choices: &[char]) -> Result<Option<char>, ControllerError> {
        self.screen.print(prompt);
        loop {
            match self.input.read_key()? {
                KeyEvent::CtrlC => {
                    self.screen.line(" [Ctrl+C]");
                    return Err(InputError::Cancelled.into());
                }
                KeyEvent::Escape => {
                    self.input.discard_pending();
                    self.screen.line(" [Esc]");
                    return Ok(None);
                }
                KeyEvent::Char(c) => {
                    self.input.discard_pending();
                    let c = c.to_ascii_lowercase();
                    if choices.contains(&c) {
                        if self.input.is_raw() {
                            self.screen.line(&c.to_string());
                        }
                        return Ok(Some(c));
                    }
                    self.screen.print(&format!("\nInvalid choice.\n{}", prompt));
                }
                _ => {}
            }
        }
    }

    fn confirm(&mut self, prompt: &str) -> Result<bool, ControllerError> {
        Ok(self.read_choice(prompt, &['y', 'n'])? == Some('y'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::input::ScriptedInput;
    use crate::core::screen::CaptureBuffer;
    use crate::core::transport::OpenError;
    use crate::core::virtual_port::LoopbackBackend;
    use crate::utils::launcher::MockProcessLauncher;
    use std::time::Instant;

    fn options(port: Option<&str>) -> ControllerOptions {
        ControllerOptions {
            preselected_port: port.map(str::to_string),
            use_defaults: true,
            receiver: ReceiverConfig {
                poll_interval: Duration::from_millis(10),
                idle_sleep: Duration::from_millis(5),
                join_timeout: Duration::from_secs(1),
            },
            key_poll: Duration::from_millis(10),
            ..ControllerOptions::default()
        }
    }

    fn controller(
        backend: &Arc<LoopbackBackend>,
        input: impl RawInput + 'static,
        options: ControllerOptions,
    ) -> (Controller, CaptureBuffer) {
        let (screen, buffer) = Screen::capture();
        let controller = Controller::new(
            backend.clone(),
            Box::new(input),
            Arc::new(screen),
            HistoryStore::in_memory(),
        )
        .with_options(options)
        .with_launcher(Box::new(MockProcessLauncher::new()));
        (controller, buffer)
    }

    #[test]
    fn test_send_hex_crc_and_record_history() {
        let backend = Arc::new(LoopbackBackend::new());
        let peer = backend.add_port("LOOP1");
        let input = ScriptedInput::default()
            .key(KeyEvent::Char('3'))
            .line("01 02 03")
            .key(KeyEvent::Escape)
            .key(KeyEvent::Char('7'));

        let (mut controller, out) = controller(&backend, input, options(Some("LOOP1")));
        assert_eq!(controller.run().unwrap(), ControllerExit::Quit);
        assert_eq!(controller.state(), ControllerState::Terminated);

        assert_eq!(peer.take_received(), vec![0x01, 0x02, 0x03, 0x61, 0x61]);
        assert_eq!(controller.history().entries(SendMode::HexCrc), ["01 02 03"]);
        assert!(!peer.is_in_use());
        let out = out.contents();
        assert!(out.contains("TX HEX+CRC: 01 02 03 61 61 | CRC: 61 61"));
        assert!(out.contains("Port LOOP1 closed."));
    }

    #[test]
    fn test_invalid_hex_is_reported_not_sent() {
        let backend = Arc::new(LoopbackBackend::new());
        let peer = backend.add_port("LOOP1");
        let input = ScriptedInput::default()
            .key(KeyEvent::Char('2'))
            .line("zz")
            .key(KeyEvent::Escape)
            .key(KeyEvent::Char('7'));

        let (mut controller, out) = controller(&backend, input, options(Some("LOOP1")));
        controller.run().unwrap();
        assert!(peer.take_received().is_empty());
        assert!(controller.history().is_empty());
        assert!(out.contents().contains("Invalid hex"));
    }

    #[test]
    fn test_service_command_is_not_transmitted() {
        let backend = Arc::new(LoopbackBackend::new());
        let peer = backend.add_port("LOOP1");
        let input = ScriptedInput::default()
            .key(KeyEvent::Char('1'))
            .line("/doctor")
            .line("he")
            .key(KeyEvent::Escape)
            .key(KeyEvent::Char('7'));

        let (mut controller, out) = controller(&backend, input, options(Some("LOOP1")));
        controller.run().unwrap();
        assert!(peer.take_received().is_empty());
        assert!(controller.history().is_empty());
        let out = out.contents();
        assert!(out.contains("[PASS] port_open"));
        assert!(out.contains("doctor"));
    }

    #[test]
    fn test_hex_byte_de_needs_a_space() {
        let backend = Arc::new(LoopbackBackend::new());
        let peer = backend.add_port("LOOP1");
        let input = ScriptedInput::default()
            .key(KeyEvent::Char('2'))
            .line("help")
            .line("DE")
            .line("D E")
            .key(KeyEvent::Escape)
            .key(KeyEvent::Char('7'));

        let (mut controller, out) = controller(&backend, input, options(Some("LOOP1")));
        controller.run().unwrap();
        assert_eq!(peer.take_received(), vec![0xDE]);
        assert_eq!(controller.history().entries(SendMode::Hex), ["D E"]);
        let out = out.contents();
        assert!(out.contains("type D E to send the byte 0xDE"));
        assert!(out.contains("comterm doctor"));
        assert!(out.contains("TX HEX: DE"));
    }

    #[test]
    fn test_ctrl_c_closes_port() {
        let backend = Arc::new(LoopbackBackend::new());
        let peer = backend.add_port("LOOP1");
        let input = ScriptedInput::default().key(KeyEvent::Char('1'));

        let (mut controller, out) = controller(&backend, input, options(Some("LOOP1")));
        assert_eq!(controller.run().unwrap(), ControllerExit::Cancelled);
        assert!(!peer.is_in_use());
        assert!(out.contents().contains("Stopped by Ctrl+C"));
    }

    #[test]
    fn test_escape_pauses_and_resume_clears() {
        let backend = Arc::new(LoopbackBackend::new());
        let peer = backend.add_port("LOOP1");
        let input = ScriptedInput::default()
            .key(KeyEvent::Escape)
            .key(KeyEvent::Char('5'))
            .key(KeyEvent::Char('7'));

        let (mut controller, out) = controller(&backend, input, options(Some("LOOP1")));
        controller.run().unwrap();
        let out = out.contents();
        assert!(out.contains("Receiving stopped (Esc)"));
        assert!(out.contains("Receiving resumed"));
        assert_eq!(peer.pending_for_local(), 0);
    }

    #[test]
    fn test_pick_port_by_index_and_launch_instance() {
        let backend = Arc::new(LoopbackBackend::new());
        let _first = backend.add_port("LOOP1");
        let second = backend.add_port("LOOP2");
        let input = ScriptedInput::default()
            .line("n")
            .line("9")
            .line("2")
            .key(KeyEvent::Char('2'))
            .key(KeyEvent::Char('7'));

        let mut launcher = MockProcessLauncher::new();
        launcher.expect_launch().times(1).returning(|| Ok(42));

        let mut opts = options(None);
        opts.use_defaults = false;
        let (controller, out) = controller(&backend, input, opts);
        let mut controller = controller.with_launcher(Box::new(launcher));

        assert_eq!(controller.run().unwrap(), ControllerExit::Quit);
        assert!(!second.is_in_use());
        let out = out.contents();
        assert!(out.contains("Started another instance (pid 42)"));
        assert!(out.contains("Enter a valid port number"));
        assert!(out.contains("Connected: LOOP2 @ 38400 8-N-1"));
    }

    #[test]
    fn test_manual_settings_dialog() {
        let backend = Arc::new(LoopbackBackend::new());
        let _peer = backend.add_port("LOOP1");
        // 115200, 7 data bits, even parity, 2 stop bits
        let input = ScriptedInput::new(
            ['1', '1', '4', '2', '3', '7'].into_iter().map(KeyEvent::Char),
        );

        let mut opts = options(Some("LOOP1"));
        opts.use_defaults = false;
        let (mut controller, out) = controller(&backend, input, opts);
        controller.run().unwrap();
        assert!(out.contents().contains("Connected: LOOP1 @ 115200 7-E-2"));
    }

    #[test]
    fn test_stale_port_goes_back_to_selection() {
        let backend = Arc::new(LoopbackBackend::new());
        let _peer = backend.add_port("LOOP1");
        let input = ScriptedInput::default().key(KeyEvent::Escape);

        let (mut controller, out) = controller(&backend, input, options(Some("GHOST")));
        assert_eq!(controller.run().unwrap(), ControllerExit::Quit);
        let out = out.contents();
        assert!(out.contains("Port GHOST is no longer available"));
        assert!(out.contains("1. LOOP1"));
    }

    #[test]
    fn test_phantom_open_error_reselects() {
        let backend = Arc::new(LoopbackBackend::new());
        let _peer = backend.add_port("LOOP1");
        backend.fail_next_open(
            "LOOP1",
            OpenError::Phantom {
                port: "LOOP1".to_string(),
                reason: "device vanished".to_string(),
            },
        );
        let input = ScriptedInput::default().key(KeyEvent::Escape);

        let (mut controller, out) = controller(&backend, input, options(Some("LOOP1")));
        assert_eq!(controller.run().unwrap(), ControllerExit::Quit);
        assert!(out.contents().contains("phantom or disconnected"));
    }

    #[test]
    fn test_busy_port_retry_same() {
        let backend = Arc::new(LoopbackBackend::new());
        let peer = backend.add_port("LOOP1");
        backend.fail_next_open(
            "LOOP1",
            OpenError::Busy {
                port: "LOOP1".to_string(),
                reason: "in use".to_string(),
            },
        );
        let input = ScriptedInput::default()
            .key(KeyEvent::Char('r'))
            .key(KeyEvent::Char('7'));

        let (mut controller, out) = controller(&backend, input, options(Some("LOOP1")));
        assert_eq!(controller.run().unwrap(), ControllerExit::Quit);
        assert!(!peer.is_in_use());
        let out = out.contents();
        assert!(out.contains("Failed to open LOOP1"));
        assert!(out.contains("Connected: LOOP1"));
    }

    #[test]
    fn test_no_ports_then_quit() {
        let backend = Arc::new(LoopbackBackend::new());
        let input = ScriptedInput::default().key(KeyEvent::Char('q'));
        let (mut controller, out) = controller(&backend, input, options(None));
        assert_eq!(controller.run().unwrap(), ControllerExit::NoPort);
        assert!(out.contents().contains("No serial ports available"));
    }

    #[test]
    fn test_history_manager_clear_all() {
        let backend = Arc::new(LoopbackBackend::new());
        let _peer = backend.add_port("LOOP1");
        let input = ScriptedInput::default()
            .key(KeyEvent::Char('1'))
            .line("abc")
            .key(KeyEvent::Escape)
            .key(KeyEvent::Char('8'))
            .key(KeyEvent::Char('4'))
            .key(KeyEvent::Char('y'))
            .key(KeyEvent::Char('7'));

        let (mut controller, out) = controller(&backend, input, options(Some("LOOP1")));
        controller.run().unwrap();
        assert!(controller.history().is_empty());
        assert!(out.contents().contains("History cleared (1 entries)"));
    }

    /// Unplugs LOOP1 on the first key, then stays idle until `idle` has passed
    struct UnplugThenIdle {
        inner: ScriptedInput,
        backend: Arc<LoopbackBackend>,
        idle: Duration,
        unplugged_at: Option<Instant>,
    }

    impl RawInput for UnplugThenIdle {
        fn key_available(&mut self, timeout: Duration) -> Result<bool, InputError> {
            match self.unplugged_at {
                Some(at) if at.elapsed() < self.idle => {
                    std::thread::sleep(timeout);
                    Ok(false)
                }
                _ => self.inner.key_available(timeout),
            }
        }

        fn read_key(&mut self) -> Result<KeyEvent, InputError> {
            if self.unplugged_at.is_none() {
                self.unplugged_at = Some(Instant::now());
                self.backend.unplug("LOOP1");
            }
            self.inner.read_key()
        }

        fn is_raw(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_device_loss_at_idle_send_prompt_offers_retry() {
        let backend = Arc::new(LoopbackBackend::new());
        let peer = backend.add_port("LOOP1");
        // nothing is typed at the send prompt; the only other key answers the retry question
        let input = UnplugThenIdle {
            inner: ScriptedInput::default()
                .key(KeyEvent::Char('1'))
                .key(KeyEvent::Char('n')),
            backend: backend.clone(),
            idle: Duration::from_secs(5),
            unplugged_at: None,
        };

        let started = Instant::now();
        let (mut controller, out) = controller(&backend, input, options(Some("LOOP1")));
        assert_eq!(controller.run().unwrap(), ControllerExit::Quit);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!peer.is_in_use());
        assert!(peer.take_received().is_empty());
        let out = out.contents();
        assert!(out.contains("Text send mode"));
        assert!(out.contains("Receiver stopped unexpectedly"));
        assert!(out.contains("Port LOOP1 closed."));
        assert!(out.contains("Retry port selection?"));
    }

    #[test]
    fn test_receiver_start_failure_closes_port() {
        let backend = Arc::new(LoopbackBackend::new());
        let peer = backend.add_port("LOOP1");
        let (mut controller, out) = controller(&backend, ScriptedInput::default(), options(None));

        let transport = TransportSession::open(
            backend.clone(),
            "LOOP1",
            PortSettings::default(),
            Duration::from_millis(20),
        )
        .unwrap();
        let mut session = Session::new(transport, controller.options.receiver);
        assert!(peer.is_in_use());

        let end = controller.end_session(&mut session, Err(SessionError::ReceiverRunning.into()));
        assert!(matches!(end, SessionEnd::Fault));
        assert_eq!(controller.state(), ControllerState::Closing);
        assert!(!peer.is_in_use());
        let out = out.contents();
        assert!(out.contains("Port LOOP1 closed."));
        assert!(out.contains("Unexpected error"));
    }

    /// Loopback ports limited to what the serial driver can open
    struct DriverLimitedBackend(Arc<LoopbackBackend>);

    impl PortBackend for DriverLimitedBackend {
        fn list_ports(&self) -> Result<Vec<String>, TransportError> {
            self.0.list_ports()
        }

        fn open(
            &self,
            name: &str,
            settings: &PortSettings,
            read_timeout: Duration,
        ) -> Result<Box<dyn crate::core::transport::PortIo>, OpenError> {
            self.0.open(name, settings, read_timeout)
        }

        fn check_settings(&self, settings: &PortSettings) -> Result<(), String> {
            crate::core::transport::SerialBackend::new().check_settings(settings)
        }
    }

    #[test]
    fn test_manual_settings_offers_only_openable_choices() {
        let loopback = Arc::new(LoopbackBackend::new());
        let _peer = loopback.add_port("LOOP1");
        // manual, 115200, 7 data bits, even parity, '3' is out of range, then 2 stop bits
        let input = ScriptedInput::new(
            ['1', '1', '4', '2', '3', '2', '7'].into_iter().map(KeyEvent::Char),
        );

        let (screen, buffer) = Screen::capture();
        let mut opts = options(Some("LOOP1"));
        opts.use_defaults = false;
        let mut controller = Controller::new(
            Arc::new(DriverLimitedBackend(loopback)),
            Box::new(input),
            Arc::new(screen),
            HistoryStore::in_memory(),
        )
        .with_options(opts)
        .with_launcher(Box::new(MockProcessLauncher::new()));

        assert_eq!(controller.run().unwrap(), ControllerExit::Quit);
        let out = buffer.contents();
        assert!(!out.contains("Mark"));
        assert!(!out.contains("Space"));
        assert!(!out.contains("1.5"));
        assert!(out.contains("Invalid choice"));
        assert!(out.contains("Connected: LOOP1 @ 115200 7-E-2"));
    }
}
