//! Privileged command channel.
//!
//! Every elevated action in the system funnels through one session
//! abstraction with two primitives: `execute` for run-to-completion commands
//! and `open_stream` for commands whose stdout is consumed live (binary
//! screenshot data, the input-event feed). Spawning an elevated interpreter
//! is expensive and behaves differently across devices, so centralizing it
//! gives every caller the same failure-handling contract.

pub mod commands;
mod session;


pub use session::{CommandResult, ShellStream, SuShell};
pub(crate) use session::terminate_pid;

use anyhow::Result;

/// Seam between the channel and everything built on top of it. The capture
/// engine, the input monitor, and the device helpers all take this trait so
/// tests can script the elevated shell.
pub trait ShellRunner: Send + Sync {
    /// Run one command through an elevated session to completion.
    ///
    /// Fails closed: spawn, write, and read faults all come back as a
    /// `CommandResult` with `success == false`, never as an error or panic.
    fn execute(&self, command: &str) -> CommandResult;

    /// Run a command and hand back the live stdout stream unconsumed, so the
    /// caller can decode binary data directly without a filesystem bounce.
    fn open_stream(&self, command: &str) -> Result<ShellStream>;
}

/// Probe for a working root shell: `id` must run and report uid 0.
pub fn check_root_access(shell: &dyn ShellRunner) -> bool {
    let result = shell.execute(commands::identity_probe());
    result.success && result.stdout.contains("uid=0")
}
