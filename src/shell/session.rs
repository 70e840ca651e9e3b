//! Elevated interpreter session management.
//!
//! Spawns the configured elevated interpreter (`su` by default), feeds it one
//! command line followed by an explicit `exit` directive, and either drains
//! the session to completion or hands the live stdout stream to the caller.
//! The exit directive is what guarantees every session terminates; without it
//! the interpreter would sit on a read of its own stdin forever.

use crate::log_debug;
use crate::shell::ShellRunner;
use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Receiver};
use std::io::{self, Read, Write};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Max buffered stderr lines per streaming session before lines are dropped
/// to the debug log only.
const STDERR_CHANNEL_CAPACITY: usize = 100;

/// Outcome of one elevated command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub(crate) fn failure(diagnostic: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: diagnostic.into(),
        }
    }

    /// Whether stderr points at an access violation rather than a transient
    /// fault. Capture strategies use this to fall through instead of
    /// retrying a path the policy will never allow.
    pub fn denied(&self) -> bool {
        let err = self.stderr.to_ascii_lowercase();
        err.contains("permission denied")
            || err.contains("operation not permitted")
            || err.contains("access denied")
    }
}

/// Production channel: spawns the configured interpreter per invocation.
pub struct SuShell {
    interpreter: Vec<String>,
}

impl SuShell {
    /// Build a channel from the interpreter command line (e.g. `su`,
    /// `adb shell su`). The command is split shell-style so arguments with
    /// quoting survive.
    pub fn new(su_cmd: &str) -> Result<Self> {
        let interpreter = shell_words::split(su_cmd)
            .with_context(|| format!("interpreter command is not parseable: {su_cmd}"))?;
        if interpreter.is_empty() {
            return Err(anyhow!("interpreter command is empty"));
        }
        Ok(Self { interpreter })
    }

    fn spawn_session(&self, command: &str) -> Result<Child> {
        let (program, args) = self
            .interpreter
            .split_first()
            .expect("interpreter verified non-empty in new()");
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn elevated interpreter {program:?}"))?;

        let mut stdin = child
            .stdin
            .take()
            .context("elevated interpreter exposed no stdin")?;
        let write_result = stdin
            .write_all(command.as_bytes())
            .and_then(|()| stdin.write_all(b"\nexit\n"))
            .and_then(|()| stdin.flush());
        if let Err(err) = write_result {
            terminate(&mut child);
            return Err(anyhow!("failed to write to elevated interpreter: {err}"));
        }
        // Closing stdin covers interpreters that wait for EOF instead of `exit`.
        drop(stdin);
        Ok(child)
    }
}

impl ShellRunner for SuShell {
    fn execute(&self, command: &str) -> CommandResult {
        let mut child = match self.spawn_session(command) {
            Ok(child) => child,
            Err(err) => {
                log_debug(&format!("elevated execute failed to start: {err:#}"));
                return CommandResult::failure(format!("{err:#}"));
            }
        };

        // stderr drains on its own thread; reading both pipes from one
        // thread deadlocks once either fills.
        let stderr_handle = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf);
                buf
            })
        });

        let mut stdout = String::new();
        if let Some(mut pipe) = child.stdout.take() {
            if let Err(err) = pipe.read_to_string(&mut stdout) {
                log_debug(&format!("elevated stdout read failed: {err}"));
                terminate(&mut child);
                return CommandResult::failure(format!("stdout read failed: {err}"));
            }
        }
        let stderr = stderr_handle
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        match child.wait() {
            Ok(status) => CommandResult {
                success: status.success(),
                stdout,
                stderr,
            },
            Err(err) => {
                log_debug(&format!("elevated session wait failed: {err}"));
                CommandResult::failure(format!("wait failed: {err}"))
            }
        }
    }

    fn open_stream(&self, command: &str) -> Result<ShellStream> {
        let child = self.spawn_session(command)?;
        ShellStream::from_child(child)
    }
}

/// A live elevated session whose stdout is read directly by the caller.
///
/// stderr is relayed by a background thread so the subprocess never blocks on
/// a full pipe while the caller is mid-decode. Dropping the stream releases
/// the OS handles on every exit path, escalating to SIGKILL if the child
/// ignores termination.
pub struct ShellStream {
    reader: Box<dyn Read + Send>,
    process: Option<StreamProcess>,
}

struct StreamProcess {
    child: Child,
    stderr_rx: Option<Receiver<String>>,
    stderr_seen: String,
}

impl ShellStream {
    fn from_child(mut child: Child) -> Result<Self> {
        let stdout = child
            .stdout
            .take()
            .context("elevated interpreter exposed no stdout")?;
        let stderr_rx = child.stderr.take().map(spawn_stderr_relay);
        Ok(Self {
            reader: Box::new(stdout),
            process: Some(StreamProcess {
                child,
                stderr_rx,
                stderr_seen: String::new(),
            }),
        })
    }

    /// Build a stream over an in-memory reader. Test doubles only; there is
    /// no subprocess behind it.
    #[cfg(any(test, feature = "mutants"))]
    pub fn from_reader(reader: Box<dyn Read + Send>) -> Self {
        Self {
            reader,
            process: None,
        }
    }

    /// Pid of the underlying interpreter, if a real process backs the stream.
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(|p| p.child.id())
    }

    /// Everything stderr produced so far.
    pub fn stderr_output(&mut self) -> String {
        if let Some(process) = self.process.as_mut() {
            if let Some(rx) = process.stderr_rx.as_ref() {
                while let Ok(line) = rx.try_recv() {
                    process.stderr_seen.push_str(&line);
                    process.stderr_seen.push('\n');
                }
            }
            process.stderr_seen.clone()
        } else {
            String::new()
        }
    }

    /// Block until the session exits; true when it exited cleanly. The exit
    /// directive written at spawn makes this terminate for every one-shot
    /// command.
    pub fn wait(&mut self) -> Result<bool> {
        match self.process.as_mut() {
            Some(process) => {
                let status = process
                    .child
                    .wait()
                    .context("waiting on elevated session failed")?;
                Ok(status.success())
            }
            None => Ok(true),
        }
    }

    /// Forcibly destroy the underlying session. Used for teardown of streams
    /// that never end on their own (the input-event feed).
    pub fn kill(&mut self) {
        if let Some(process) = self.process.as_mut() {
            terminate(&mut process.child);
        }
    }
}

impl Read for ShellStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Drop for ShellStream {
    fn drop(&mut self) {
        if let Some(process) = self.process.as_mut() {
            match process.child.try_wait() {
                Ok(Some(_)) => {}
                Ok(None) => terminate(&mut process.child),
                Err(err) => {
                    log_debug(&format!("stream session status check failed: {err}"));
                    terminate(&mut process.child);
                }
            }
        }
    }
}

/// Relay stderr lines to the debug log and a bounded channel the stream
/// owner can inspect. Never blocks the subprocess: when the channel is full
/// the line only reaches the log.
fn spawn_stderr_relay(stderr: impl Read + Send + 'static) -> Receiver<String> {
    let (tx, rx) = bounded(STDERR_CHANNEL_CAPACITY);
    thread::spawn(move || {
        let reader = io::BufReader::new(stderr);
        for line in io::BufRead::lines(reader) {
            let line = match line {
                Ok(line) => line,
                Err(_) => break,
            };
            log_debug(&format!("elevated stderr: {line}"));
            let _ = tx.try_send(line);
        }
    });
    rx
}

/// Best-effort termination: SIGTERM, a short grace poll, then SIGKILL, then
/// reap so the child cannot linger as a zombie.
fn terminate(child: &mut Child) {
    let pid = child.id() as i32;
    // SAFETY: pid comes from a child owned by this process; SIGTERM only
    // requests termination.
    if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
        log_debug(&format!(
            "SIGTERM to elevated session failed: {}",
            io::Error::last_os_error()
        ));
    }
    if !wait_for_exit(child, Duration::from_millis(500)) {
        if let Err(err) = child.kill() {
            log_debug(&format!("SIGKILL to elevated session failed: {err}"));
        }
        if let Err(err) = child.wait() {
            log_debug(&format!("reaping elevated session failed: {err}"));
        }
    }
}

/// Terminate a session owned by another thread, by pid. The owner still
/// reaps it when its stream drops; this only forces the stream to end.
pub(crate) fn terminate_pid(pid: u32) {
    let pid = pid as i32;
    // SAFETY: pid belongs to a session spawned by this process.
    unsafe {
        let _ = libc::kill(pid, libc::SIGTERM);
    }
    thread::sleep(Duration::from_millis(300));
    // SAFETY: SIGKILL on an already-dead pid is a no-op error we ignore.
    unsafe {
        let _ = libc::kill(pid, libc::SIGKILL);
    }
}

/// Poll for child exit without signals, bailing after `timeout`.
fn wait_for_exit(child: &mut Child, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        match child.try_wait() {
            Ok(Some(_)) => return true,
            Ok(None) => thread::sleep(Duration::from_millis(50)),
            Err(err) => {
                log_debug(&format!("try_wait on elevated session failed: {err}"));
                return true;
            }
        }
    }
    false
}
