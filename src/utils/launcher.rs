//! Launching a second instance
//!
//! Lets the operator work on another port side by side. On Windows the copy
//! gets its own console; elsewhere it runs inside the terminal emulator named
//! by `$TERMINAL`.

use std::io;
use std::process::Command;
use std::thread;
use tracing::{debug, info, warn};

/// Starts another copy of the program
#[cfg_attr(test, mockall::automock)]
pub trait ProcessLauncher: Send {
    /// Start the copy and return its process id
    fn launch(&self) -> io::Result<u32>;
}

/// Relaunches the current executable with fixed arguments
#[derive(Debug, Clone, Default)]
pub struct SelfLauncher {
    args: Vec<String>,
}

impl SelfLauncher {
    /// Launcher passing `args` to the new instance
    pub fn new(args: Vec<String>) -> Self {
        Self { args }
    }

    #[cfg(windows)]
    fn command(&self, exe: &std::path::Path) -> io::Result<Command> {
        use std::os::windows::process::CommandExt;
        const CREATE_NEW_CONSOLE: u32 = 0x0000_0010;

        let mut cmd = Command::new(exe);
        cmd.args(&self.args).creation_flags(CREATE_NEW_CONSOLE);
        Ok(cmd)
    }

    #[cfg(not(windows))]
    fn command(&self, exe: &std::path::Path) -> io::Result<Command> {
        let terminal = std::env::var("TERMINAL").map_err(|_| {
            io::Error::new(
                io::ErrorKind::Unsupported,
                "set TERMINAL to a terminal emulator to open another instance",
            )
        })?;

        let mut cmd = Command::new(terminal);
        cmd.arg("-e").arg(exe).args(&self.args);
        Ok(cmd)
    }
}

impl ProcessLauncher for SelfLauncher {
    fn launch(&self) -> io::Result<u32> {
        let exe = std::env::current_exe()?;
        let pid = spawn_detached(self.command(&exe)?)?;
        info!(pid, exe = %exe.display(), "Launched another instance");
        Ok(pid)
    }
}

/// Spawn `cmd` and collect its exit status on a background thread
fn spawn_detached(mut cmd: Command) -> io::Result<u32> {
    let mut child = cmd.spawn()?;
    let pid = child.id();
    let reaper = thread::Builder::new()
        .name(format!("reap-{}", pid))
        .spawn(move || match child.wait() {
            Ok(status) => debug!(pid, %status, "Launched instance exited"),
            Err(e) => warn!(pid, error = %e, "Waiting for the launched instance failed"),
        });
    if let Err(e) = reaper {
        warn!(pid, error = %e, "Launched instance will not be reaped");
    }
    Ok(pid)
}
