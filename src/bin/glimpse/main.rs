//! Glimpse daemon entrypoint: wires the elevated channel, capture engine,
//! inference client, and overlay into one orchestrated runtime.
//!
//! # Architecture
//!
//! - Monitor thread: tails the elevated input-event feed, dispatches triggers
//! - Dispatcher thread: enforces single-flight, spawns cycle workers
//! - Cycle worker: capture, inference call, overlay updates
//! - Main thread: signal-driven shutdown

use anyhow::{bail, Result};
use clap::Parser;
use glimpse::capture::{CaptureEngine, CapturePaths};
use glimpse::config::AppConfig;
use glimpse::inference::VisionClient;
use glimpse::monitor::MonitorConfig;
use glimpse::orchestrator::{Orchestrator, OrchestratorConfig};
use glimpse::overlay::ConsoleOverlay;
use glimpse::shell::{check_root_access, ShellRunner, SuShell};
use glimpse::{init_logging, init_tracing, log_debug, log_file_path, log_panic};
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_shutdown_signal(_sig: libc::c_int) {
    SHUTDOWN.store(true, Ordering::SeqCst);
}

fn install_signal_handlers() {
    // SAFETY: the handler only stores to an atomic, which is
    // async-signal-safe.
    unsafe {
        libc::signal(libc::SIGINT, handle_shutdown_signal as libc::sighandler_t);
        libc::signal(libc::SIGTERM, handle_shutdown_signal as libc::sighandler_t);
    }
}

fn print_doctor_report(config: &AppConfig, shell: &dyn ShellRunner) {
    println!("glimpse doctor");
    println!("  version:       {}", env!("CARGO_PKG_VERSION"));
    println!("  su command:    {}", config.su_cmd);
    println!(
        "  root access:   {}",
        if check_root_access(shell) { "yes" } else { "no" }
    );
    println!("  api url:       {}", config.api_url);
    println!(
        "  api key:       {}",
        if config.api_key.trim().is_empty() {
            "missing"
        } else {
            "configured"
        }
    );
    println!("  model:         {}", config.model);
    for path in &config.shared_paths {
        println!("  shared path:   {}", path.display());
    }
    println!("  scratch path:  {}", config.scratch_path.display());
    match &config.private_dir {
        Some(dir) => println!("  private dir:   {}", dir.display()),
        None => println!("  private dir:   disabled"),
    }
}

fn main() -> Result<()> {
    let mut config = AppConfig::parse();
    config.validate()?;

    if config.doctor {
        let shell = SuShell::new(&config.su_cmd)?;
        print_doctor_report(&config, &shell);
        return Ok(());
    }

    init_logging(&config);
    init_tracing(&config);
    panic::set_hook(Box::new(|info| {
        log_panic(info);
    }));
    log_debug("=== Glimpse daemon started ===");
    log_debug(&format!("Log file: {:?}", log_file_path()));

    let shell: Arc<dyn ShellRunner> = Arc::new(SuShell::new(&config.su_cmd)?);
    if !check_root_access(shell.as_ref()) {
        bail!(
            "no working root shell via {:?}; run on a rooted device or adjust --su-cmd",
            config.su_cmd
        );
    }

    let engine = Arc::new(CaptureEngine::new(
        shell.clone(),
        CapturePaths {
            shared: config.shared_paths.clone(),
            scratch: config.scratch_path.clone(),
            private_dir: config.private_dir.clone(),
        },
    ));
    let overlay = Arc::new(ConsoleOverlay::new());
    let analyzer = Arc::new(VisionClient::new(Arc::new(config.clone())));
    let orchestrator_config = OrchestratorConfig {
        monitor: MonitorConfig {
            debounce: Duration::from_millis(config.debounce_ms),
            restart_backoff: Duration::from_millis(config.monitor_backoff_ms),
            max_restarts: config.max_monitor_restarts,
        },
        capture_delay: Duration::from_millis(config.capture_delay_ms),
    };

    install_signal_handlers();
    let mut handle = Orchestrator::start(shell, engine, overlay, analyzer, orchestrator_config);
    println!("glimpse: volume-down captures, volume-up toggles the overlay (ctrl-c quits)");

    while !SHUTDOWN.load(Ordering::SeqCst) && handle.is_running() {
        thread::sleep(Duration::from_millis(200));
    }

    log_debug("shutdown requested");
    handle.stop();
    log_debug(&format!(
        "monitor restarts this run: {}",
        handle.monitor_restarts()
    ));
    Ok(())
}
