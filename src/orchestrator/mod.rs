//! Capture orchestrator.
//!
//! Binds the monitor's primary trigger to a capture-and-analyze cycle and
//! enforces single-flight semantics: while one cycle is in flight, further
//! primary triggers are dropped, never queued.


use crate::capture::CaptureEngine;
use crate::inference::Analyzer;
use crate::monitor::{KeyMonitor, MonitorConfig, MonitorHandle, Trigger};
use crate::overlay::Overlay;
use crate::shell::ShellRunner;
use crate::{log_debug, log_debug_content};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Status strings pushed to the overlay collaborator.
pub const STATUS_PROCESSING: &str = "Processing...";
pub const STATUS_ANALYZING: &str = "Analyzing...";
pub const STATUS_CAPTURE_FAILED: &str = "Screenshot failed";

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub monitor: MonitorConfig,
    /// Pause between trigger and capture so key-press visual feedback is not
    /// in the screenshot.
    pub capture_delay: Duration,
}

/// Clears the processing flag on every exit path, including unwinds, so the
/// system can never wedge in a permanently-busy state.
struct FlightGuard {
    flag: Arc<AtomicBool>,
}

impl FlightGuard {
    fn acquire(flag: Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(Self { flag })
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct Orchestrator;

impl Orchestrator {
    /// Start the monitor and the trigger dispatcher; the returned handle
    /// owns the whole subsystem.
    pub fn start(
        shell: Arc<dyn ShellRunner>,
        engine: Arc<CaptureEngine>,
        overlay: Arc<dyn Overlay>,
        analyzer: Arc<dyn Analyzer>,
        config: OrchestratorConfig,
    ) -> OrchestratorHandle {
        let (monitor, triggers) = KeyMonitor::start(shell, config.monitor);
        let processing = Arc::new(AtomicBool::new(false));

        let dispatcher = {
            let processing = processing.clone();
            let capture_delay = config.capture_delay;
            thread::spawn(move || {
                // Ends when the monitor stops and drops its sender.
                while let Ok(trigger) = triggers.recv() {
                    match trigger {
                        Trigger::Primary => {
                            match FlightGuard::acquire(processing.clone()) {
                                Some(guard) => {
                                    let engine = engine.clone();
                                    let overlay = overlay.clone();
                                    let analyzer = analyzer.clone();
                                    thread::spawn(move || {
                                        run_cycle(&engine, &*overlay, &*analyzer, capture_delay, guard);
                                    });
                                }
                                None => {
                                    log_debug("capture already in flight, trigger skipped");
                                    tracing::debug!("primary trigger dropped while busy");
                                }
                            }
                        }
                        Trigger::Secondary => overlay.toggle_visibility(),
                    }
                }
            })
        };

        OrchestratorHandle {
            monitor,
            dispatcher: Some(dispatcher),
            processing,
        }
    }
}

/// One capture-and-analyze cycle. Owns the flight guard for its duration.
fn run_cycle(
    engine: &CaptureEngine,
    overlay: &dyn Overlay,
    analyzer: &dyn Analyzer,
    capture_delay: Duration,
    _guard: FlightGuard,
) {
    overlay.show(STATUS_PROCESSING);
    thread::sleep(capture_delay);

    match engine.capture() {
        Ok(mut frame) => {
            overlay.show(STATUS_ANALYZING);
            match analyzer.analyze(&frame) {
                Ok(answer) => {
                    log_debug_content(&format!("answer: {}", snippet(&answer)));
                    overlay.show(&answer);
                }
                Err(err) => {
                    log_debug(&format!("inference failed: {err:#}"));
                    overlay.show(&format!("Error: {err:#}"));
                }
            }
            // The frame is ours alone; hand the buffer back before the
            // guard clears.
            frame.release();
        }
        Err(err) => {
            log_debug(&format!("capture failed: {err:#}"));
            overlay.show(STATUS_CAPTURE_FAILED);
        }
    }
}

fn snippet(text: &str) -> String {
    const MAX: usize = 100;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let cut: String = text.chars().take(MAX).collect();
        format!("{cut}…")
    }
}

/// Ownership handle for the running subsystem.
pub struct OrchestratorHandle {
    monitor: MonitorHandle,
    dispatcher: Option<thread::JoinHandle<()>>,
    processing: Arc<AtomicBool>,
}

impl OrchestratorHandle {
    pub fn is_running(&self) -> bool {
        self.monitor.is_running()
    }

    /// Whether a capture-and-analyze cycle is currently in flight.
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    /// Observed monitor restarts, for diagnostics.
    pub fn monitor_restarts(&self) -> u32 {
        self.monitor.restart_count()
    }

    /// Stop the monitor (killing its live session) and drain the
    /// dispatcher. An in-flight cycle finishes on its own thread; only the
    /// trigger path is torn down here.
    pub fn stop(&mut self) {
        self.monitor.stop();
        if let Some(dispatcher) = self.dispatcher.take() {
            let _ = dispatcher.join();
        }
    }
}

impl Drop for OrchestratorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
