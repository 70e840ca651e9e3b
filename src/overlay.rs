//! Overlay collaborator contract.
//!
//! The graphical surface itself lives outside the core; all the core needs
//! is the four fire-and-forget operations below.

use crate::log_debug_content;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub trait Overlay: Send + Sync {
    /// Replace the overlay text and make it visible.
    fn show(&self, text: &str);
    /// Flip visibility without discarding the text.
    fn toggle_visibility(&self);
    /// Blank the overlay.
    fn clear(&self);
    /// Bring back the last shown text.
    fn restore(&self);
}

/// Console-backed overlay for running the daemon headless; statuses go to
/// stdout and the content-gated debug log.
pub struct ConsoleOverlay {
    visible: AtomicBool,
    last_text: Mutex<String>,
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleOverlay {
    pub fn new() -> Self {
        Self::with_writer(Box::new(io::stdout()))
    }

    fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            visible: AtomicBool::new(false),
            last_text: Mutex::new(String::new()),
            out: Mutex::new(out),
        }
    }

    fn emit(&self, line: &str) {
        let mut out = self
            .out
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let _ = writeln!(out, "[overlay] {line}");
        let _ = out.flush();
    }
}

impl Default for ConsoleOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl Overlay for ConsoleOverlay {
    fn show(&self, text: &str) {
        *self
            .last_text
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = text.to_string();
        self.visible.store(true, Ordering::Release);
        log_debug_content(&format!("overlay show: {text}"));
        self.emit(text);
    }

    fn toggle_visibility(&self) {
        let was_visible = self.visible.fetch_xor(true, Ordering::AcqRel);
        if was_visible {
            self.emit("(hidden)");
        } else {
            let last = self
                .last_text
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone();
            self.emit(&last);
        }
    }

    fn clear(&self) {
        self.last_text
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
        self.emit("");
    }

    fn restore(&self) {
        let last = self
            .last_text
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        if !last.is_empty() {
            self.visible.store(true, Ordering::Release);
            self.emit(&last);
        }
    }
}
