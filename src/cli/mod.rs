//! CLI Module
//!
//! Provides command-line interface functionality including:
//! - Argument parsing
//! - Exit codes
//! - Terminal/pipe detection for choosing the keyboard engine

pub mod args;
pub mod exit_codes;
pub mod pipe;

pub use args::Cli;
pub use exit_codes::{exit_code_description, CliResult, ExitCodes};
pub use pipe::{InputEngine, PipeMode};
