//! Comterm - interactive serial terminal
//!
//! Opens a serial port, answers requests from the emulation table in the
//! background and lets the operator send text, HEX and HEX+CRC16 frames.

use anyhow::Context;
use clap::Parser;
use comterm_core::cli::{exit_code_description, Cli, CliResult, ExitCodes, InputEngine, PipeMode};
use comterm_core::config::{init_directories, AppConfig};
use comterm_core::core::screen::Screen;
use comterm_core::{
    Controller, ControllerExit, ControllerOptions, EmulationTable, HistoryStore,
    LineBufferedInput, PortBackend, RawInput, SerialBackend, TerminalInput,
};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            let result = CliResult::error(ExitCodes::CONFIG_ERROR, e.to_string());
            if let Some(line) = result.error_line() {
                eprintln!("{}", line);
            }
            return result.to_exit_code();
        }
    };

    let _log_guard = init_logging(&cli, &config);
    tracing::info!("Starting comterm v{}", comterm_core::VERSION);

    let result = match run(&cli, &config) {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            CliResult::error(ExitCodes::ERROR, format!("{:#}", e))
        }
    };

    tracing::info!(code = result.code(), outcome = exit_code_description(result.code()), "Exiting");

    // the controller already reported the cancellation
    if result.code() != ExitCodes::CANCELLED {
        if let Some(line) = result.error_line() {
            eprintln!("{}", line);
        } else if let Some(message) = result.message() {
            println!("{}", message);
        }
    }
    result.to_exit_code()
}

/// Install the tracing subscriber; the guard flushes the log file on drop
fn init_logging(cli: &Cli, config: &AppConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if cli.verbose { "debug" } else { config.logging.level.as_str() };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    if cli.log_stderr {
        let _ = builder.with_writer(std::io::stderr).try_init();
        return None;
    }

    let dir = config.logging.log_dir()?;
    if let Err(e) = std::fs::create_dir_all(&dir) {
        eprintln!("Logging disabled: cannot create {}: {}", dir.display(), e);
        return None;
    }

    let appender = tracing_appender::rolling::daily(dir, "comterm.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = builder.with_writer(writer).with_ansi(false).try_init();
    Some(guard)
}

fn run(cli: &Cli, config: &AppConfig) -> anyhow::Result<CliResult> {
    if cli.write_config {
        let path = config
            .save(cli.config.as_deref())
            .context("Failed to write the configuration")?;
        return Ok(CliResult::success_with_message(format!(
            "Configuration written to {}",
            path.display()
        )));
    }

    let backend: Arc<dyn PortBackend> = Arc::new(SerialBackend::new());

    if cli.list_ports {
        let ports = backend.list_ports().context("Port enumeration failed")?;
        if ports.is_empty() {
            return Ok(CliResult::success_with_message("No serial ports available"));
        }
        for port in ports {
            println!("{}", port);
        }
        return Ok(CliResult::success());
    }

    if let Err(e) = init_directories() {
        tracing::warn!(error = %e, "Could not create application directories");
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("Failed to install the Ctrl+C handler")?;

    let engine = InputEngine::select(PipeMode::detect(), cli.line_mode);
    tracing::info!(?engine, "Keyboard engine selected");
    let input: Box<dyn RawInput> = match engine {
        InputEngine::Terminal => {
            Box::new(
                TerminalInput::new(interrupted)
                    .context("Failed to switch the terminal to raw mode")?,
            )
        }
        InputEngine::LineBuffered => Box::new(
            LineBufferedInput::stdin(interrupted).context("Failed to start the stdin reader")?,
        ),
    };

    let history = match cli.history_file.clone().or_else(|| config.history_path()) {
        Some(path) => HistoryStore::load(path),
        None => HistoryStore::in_memory(),
    };

    let responder = if cli.no_emulation {
        EmulationTable::empty()
    } else {
        config.emulation.table()?
    };

    let options = ControllerOptions {
        preselected_port: cli.port.clone(),
        use_defaults: cli.defaults,
        ..ControllerOptions::from_config(config)
    };

    let mut controller = Controller::new(backend, input, Arc::new(Screen::stdout()), history)
        .with_options(options)
        .with_responder(Arc::new(responder));

    let exit = controller.run()?;
    tracing::info!(?exit, "Controller finished");

    Ok(match exit {
        ControllerExit::Quit => CliResult::success(),
        ControllerExit::Cancelled => CliResult::cancelled(),
        ControllerExit::NoPort => match &cli.port {
            Some(port) => CliResult::port_not_found(port),
            None => CliResult::error(ExitCodes::PORT_NOT_FOUND, "No serial ports available"),
        },
    })
}
