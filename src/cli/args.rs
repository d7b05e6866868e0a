//! Command-line arguments

use clap::Parser;
use std::path::PathBuf;

/// Interactive serial terminal with request/response emulation
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "comterm", version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: platform config directory)
    #[arg(long, value_name = "PATH", env = "COMTERM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Open this port first instead of asking
    #[arg(short, long, value_name = "NAME")]
    pub port: Option<String>,

    /// Use the default line settings without asking
    #[arg(short, long)]
    pub defaults: bool,

    /// History file (overrides the config)
    #[arg(long, value_name = "PATH")]
    pub history_file: Option<PathBuf>,

    /// Read whole lines instead of single keystrokes
    #[arg(long)]
    pub line_mode: bool,

    /// Never answer requests automatically
    #[arg(long)]
    pub no_emulation: bool,

    /// Print the available ports and exit
    #[arg(short, long)]
    pub list_ports: bool,

    /// Write the effective configuration to the config file and exit
    #[arg(long)]
    pub write_config: bool,

    /// Debug-level logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Log to stderr instead of the log file
    #[arg(long)]
    pub log_stderr: bool,
}
