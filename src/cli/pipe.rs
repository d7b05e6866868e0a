//! Terminal detection
//!
//! Decides which keyboard engine drives the session: raw single keystrokes
//! when stdin is an interactive terminal, whole lines otherwise.

/// Pipe mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeMode {
    /// No piping, interactive mode
    Interactive,
    /// stdin is redirected
    StdinOnly,
    /// stdout is redirected
    StdoutOnly,
    /// Both redirected
    Full,
}

impl PipeMode {
    /// Detect pipe mode from environment
    pub fn detect() -> Self {
        Self::from_ttys(atty::is(atty::Stream::Stdin), atty::is(atty::Stream::Stdout))
    }

    fn from_ttys(stdin_is_tty: bool, stdout_is_tty: bool) -> Self {
        match (stdin_is_tty, stdout_is_tty) {
            (true, true) => Self::Interactive,
            (false, true) => Self::StdinOnly,
            (true, false) => Self::StdoutOnly,
            (false, false) => Self::Full,
        }
    }

    /// Is stdin redirected?
    pub fn has_stdin(&self) -> bool {
        matches!(self, Self::StdinOnly | Self::Full)
    }

    /// Is interactive?
    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::Interactive)
    }
}

/// Keyboard engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEngine {
    /// Raw-mode terminal
    Terminal,
    /// Line-buffered stdin
    LineBuffered,
}

impl InputEngine {
    /// Raw mode needs a terminal on stdin; `force_line_mode` overrides
    pub fn select(mode: PipeMode, force_line_mode: bool) -> Self {
        if force_line_mode || mode.has_stdin() {
            Self::LineBuffered
        } else {
            Self::Terminal
        }
    }
}
