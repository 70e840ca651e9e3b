//! Command-line parsing and validation helpers.

mod defaults;
#[cfg(test)]
mod tests;
mod validation;

use clap::{ArgAction, Parser};
use std::path::PathBuf;

pub use defaults::{
    default_shared_paths, DEFAULT_API_URL, DEFAULT_CAPTURE_DELAY_MS, DEFAULT_DEBOUNCE_MS,
    DEFAULT_JPEG_QUALITY, DEFAULT_MODEL, DEFAULT_MONITOR_BACKOFF_MS, DEFAULT_PROMPT,
    DEFAULT_SCRATCH_PATH,
};

/// CLI options for the glimpse daemon. Validated values keep the elevated
/// shell commands built downstream safe.
#[derive(Debug, Parser, Clone)]
#[command(about = "Glimpse screen assistant", author, version)]
pub struct AppConfig {
    /// Chat-completions endpoint URL for the vision model
    #[arg(long = "api-url", env = "GLIMPSE_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// API credential sent as a Bearer token
    #[arg(
        long = "api-key",
        env = "GLIMPSE_API_KEY",
        default_value = "",
        hide_env_values = true
    )]
    pub api_key: String,

    /// Vision-capable model identifier
    #[arg(long, env = "GLIMPSE_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Prompt sent alongside each screenshot
    #[arg(long, env = "GLIMPSE_PROMPT", default_value = DEFAULT_PROMPT)]
    pub prompt: String,

    /// Elevated interpreter command (may include arguments)
    #[arg(long = "su-cmd", env = "GLIMPSE_SU_CMD", default_value = "su")]
    pub su_cmd: String,

    /// Debounce window for repeated key events (milliseconds)
    #[arg(long = "debounce-ms", default_value_t = DEFAULT_DEBOUNCE_MS)]
    pub debounce_ms: u64,

    /// Backoff before the key monitor restarts after a stream failure (milliseconds)
    #[arg(long = "monitor-backoff-ms", default_value_t = DEFAULT_MONITOR_BACKOFF_MS)]
    pub monitor_backoff_ms: u64,

    /// Cap on monitor restart attempts (unbounded when omitted)
    #[arg(long = "max-monitor-restarts", value_name = "N")]
    pub max_monitor_restarts: Option<u32>,

    /// Delay between trigger and capture so key-press visuals settle (milliseconds)
    #[arg(long = "capture-delay-ms", default_value_t = DEFAULT_CAPTURE_DELAY_MS)]
    pub capture_delay_ms: u64,

    /// Shared-storage bounce path (repeatable; first is preferred)
    #[arg(long = "shared-path", value_name = "PATH", action = ArgAction::Append)]
    pub shared_paths: Vec<PathBuf>,

    /// Elevated-writable scratch path for the private-cache strategy
    #[arg(long = "scratch-path", default_value = DEFAULT_SCRATCH_PATH)]
    pub scratch_path: PathBuf,

    /// App-private directory enabling the private-cache strategy
    #[arg(long = "private-dir", value_name = "DIR")]
    pub private_dir: Option<PathBuf>,

    /// JPEG quality for the uploaded frame (1-100)
    #[arg(long = "jpeg-quality", default_value_t = DEFAULT_JPEG_QUALITY)]
    pub jpeg_quality: u8,

    /// Print environment diagnostics and exit
    #[arg(long = "doctor", default_value_t = false)]
    pub doctor: bool,

    /// Enable file logging (debug)
    #[arg(long = "logs", env = "GLIMPSE_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs and log env vars)
    #[arg(long = "no-logs", env = "GLIMPSE_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Allow logging screen-derived content snippets (debug log only)
    #[arg(
        long = "log-content",
        env = "GLIMPSE_LOG_CONTENT",
        default_value_t = false
    )]
    pub log_content: bool,

    /// Enable verbose timing logs
    #[arg(long)]
    pub log_timings: bool,
}
