//! Input event monitor.
//!
//! Tails the device's raw input-event feed over the channel's streaming
//! mode, recognizes volume-key presses, debounces them, and dispatches
//! triggers. The feed is the sole trigger path for the whole system, so the
//! monitor self-restarts on stream failure with no restart budget by
//! default; the budget and backoff are configurable so tests can bound the
//! loop without real delays.


use crate::log_debug;
use crate::shell::{commands, terminate_pid, ShellRunner};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use regex::Regex;
use std::io::{BufRead, BufReader};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

/// Max pending triggers before new ones are dropped.
const TRIGGER_CHANNEL_CAPACITY: usize = 8;

/// Granularity of the interruptible backoff sleep.
const BACKOFF_POLL: Duration = Duration::from_millis(25);

/// Logical triggers derived from the key feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Volume-down: capture and analyze.
    Primary,
    /// Volume-up: toggle the overlay.
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCode {
    VolumeDown,
    VolumeUp,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEdge {
    Down,
    Up,
}

/// One key transition parsed from a feed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub edge: KeyEdge,
}

/// Parse a `getevent -l` line such as
/// `/dev/input/event1: EV_KEY KEY_VOLUMEDOWN DOWN`.
pub fn parse_key_event(line: &str) -> Option<KeyEvent> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"EV_KEY\s+(\S+)\s+(DOWN|UP)\b").expect("static event pattern is valid")
    });
    let captures = pattern.captures(line)?;
    let code = match &captures[1] {
        "KEY_VOLUMEDOWN" => KeyCode::VolumeDown,
        "KEY_VOLUMEUP" => KeyCode::VolumeUp,
        _ => KeyCode::Other,
    };
    let edge = match &captures[2] {
        "DOWN" => KeyEdge::Down,
        _ => KeyEdge::Up,
    };
    Some(KeyEvent { code, edge })
}

/// Lifecycle of the monitor loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MonitorState {
    Stopped = 0,
    Starting = 1,
    Running = 2,
    Failed = 3,
}

impl MonitorState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => MonitorState::Starting,
            2 => MonitorState::Running,
            3 => MonitorState::Failed,
            _ => MonitorState::Stopped,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Minimum elapsed time between two accepted events of the same key.
    pub debounce: Duration,
    /// Pause before reopening the feed after a stream failure.
    pub restart_backoff: Duration,
    /// Restart budget; `None` keeps restarting forever.
    pub max_restarts: Option<u32>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            restart_backoff: Duration::from_secs(3),
            max_restarts: None,
        }
    }
}

/// Per-key debounce record. Duplicate kernel event lines arrive in bursts;
/// dropping in-window repeats is a noise filter, not an error.
#[derive(Default)]
struct DebounceState {
    last_accepted: Option<Instant>,
}

impl DebounceState {
    fn accept(&mut self, now: Instant, window: Duration) -> bool {
        if let Some(last) = self.last_accepted {
            if now.duration_since(last) < window {
                return false;
            }
        }
        self.last_accepted = Some(now);
        true
    }
}

pub struct KeyMonitor;

impl KeyMonitor {
    /// Spawn the monitor loop and hand back its ownership handle plus the
    /// trigger stream.
    pub fn start(
        shell: Arc<dyn ShellRunner>,
        config: MonitorConfig,
    ) -> (MonitorHandle, Receiver<Trigger>) {
        let (tx, rx) = bounded(TRIGGER_CHANNEL_CAPACITY);
        let stop = Arc::new(AtomicBool::new(false));
        let state = Arc::new(AtomicU8::new(MonitorState::Starting as u8));
        let restarts = Arc::new(AtomicU32::new(0));
        let session_pid = Arc::new(Mutex::new(None));

        let thread = {
            let stop = stop.clone();
            let state = state.clone();
            let restarts = restarts.clone();
            let session_pid = session_pid.clone();
            thread::spawn(move || {
                run_loop(shell, config, tx, stop, state, restarts, session_pid);
            })
        };

        let handle = MonitorHandle {
            stop,
            state,
            restarts,
            session_pid,
            thread: Some(thread),
        };
        (handle, rx)
    }
}

/// Ownership handle for one monitor instance. "Is the monitor running" is a
/// query on this handle, not a global.
pub struct MonitorHandle {
    stop: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
    restarts: Arc<AtomicU32>,
    session_pid: Arc<Mutex<Option<u32>>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl MonitorHandle {
    pub fn state(&self) -> MonitorState {
        MonitorState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.state() != MonitorState::Stopped
    }

    /// How many times the loop has entered the Failed state.
    pub fn restart_count(&self) -> u32 {
        self.restarts.load(Ordering::Relaxed)
    }

    /// Request a stop and destroy the live feed session. A blocked read has
    /// no cooperative cancellation point, so the session is killed to force
    /// the stream closed.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        // The loop may be between opening a session and publishing its pid;
        // keep looking briefly so that session still gets killed.
        let deadline = Instant::now() + Duration::from_millis(500);
        loop {
            let pid = self
                .session_pid
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .take();
            if let Some(pid) = pid {
                terminate_pid(pid);
                break;
            }
            let finished = self.thread.as_ref().map_or(true, |t| t.is_finished());
            if finished || Instant::now() >= deadline {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[allow(clippy::too_many_arguments)]
fn run_loop(
    shell: Arc<dyn ShellRunner>,
    config: MonitorConfig,
    tx: Sender<Trigger>,
    stop: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
    restarts: Arc<AtomicU32>,
    session_pid: Arc<Mutex<Option<u32>>>,
) {
    // Debounce state deliberately survives restarts: the feed resumes from
    // "now", so a fresh session must not re-trigger on the same press.
    let mut primary = DebounceState::default();
    let mut secondary = DebounceState::default();

    while !stop.load(Ordering::Acquire) {
        state.store(MonitorState::Starting as u8, Ordering::Release);
        let stream = match shell.open_stream(commands::input_event_feed()) {
            Ok(stream) => stream,
            Err(err) => {
                log_debug(&format!("failed to open input feed: {err:#}"));
                if enter_failed(&stop, &state, &restarts, &config) {
                    continue;
                }
                break;
            }
        };
        set_session_pid(&session_pid, stream.pid());
        state.store(MonitorState::Running as u8, Ordering::Release);
        log_debug("key monitor running");

        let reader = BufReader::new(stream);
        let mut stop_requested = false;
        for line in reader.lines() {
            if stop.load(Ordering::Acquire) {
                stop_requested = true;
                break;
            }
            match line {
                Ok(line) => handle_line(
                    &line,
                    &mut primary,
                    &mut secondary,
                    &tx,
                    config.debounce,
                ),
                Err(err) => {
                    log_debug(&format!("input feed read error: {err}"));
                    break;
                }
            }
        }
        set_session_pid(&session_pid, None);

        if stop_requested || stop.load(Ordering::Acquire) {
            break;
        }
        if !enter_failed(&stop, &state, &restarts, &config) {
            break;
        }
    }

    state.store(MonitorState::Stopped as u8, Ordering::Release);
    log_debug("key monitor stopped");
}

fn set_session_pid(slot: &Mutex<Option<u32>>, pid: Option<u32>) {
    *slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = pid;
}

fn handle_line(
    line: &str,
    primary: &mut DebounceState,
    secondary: &mut DebounceState,
    tx: &Sender<Trigger>,
    window: Duration,
) {
    let Some(event) = parse_key_event(line) else {
        return;
    };
    if event.edge != KeyEdge::Down {
        return;
    }
    let (trigger, debounce) = match event.code {
        KeyCode::VolumeDown => (Trigger::Primary, primary),
        KeyCode::VolumeUp => (Trigger::Secondary, secondary),
        KeyCode::Other => return,
    };
    if !debounce.accept(Instant::now(), window) {
        return;
    }
    log_debug(&format!("trigger accepted: {trigger:?}"));
    if let Err(TrySendError::Full(trigger)) = tx.try_send(trigger) {
        log_debug(&format!("trigger channel full, dropped {trigger:?}"));
    }
}

/// Record the failure, then hold for the backoff. Returns false when the
/// loop should stop instead of restarting.
fn enter_failed(
    stop: &AtomicBool,
    state: &AtomicU8,
    restarts: &AtomicU32,
    config: &MonitorConfig,
) -> bool {
    state.store(MonitorState::Failed as u8, Ordering::Release);
    let attempt = restarts.fetch_add(1, Ordering::Relaxed) + 1;
    tracing::warn!(restart = attempt, "input feed ended, monitor restarting");
    log_debug(&format!("input feed ended, restart attempt {attempt}"));
    if let Some(max) = config.max_restarts {
        if attempt > max {
            log_debug("monitor restart budget exhausted");
            return false;
        }
    }
    sleep_unless_stopped(stop, config.restart_backoff)
}

fn sleep_unless_stopped(stop: &AtomicBool, total: Duration) -> bool {
    let deadline = Instant::now() + total;
    loop {
        if stop.load(Ordering::Acquire) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(BACKOFF_POLL.min(deadline - now));
    }
}
