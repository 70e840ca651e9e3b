use std::path::PathBuf;

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_PROMPT: &str = "Analyze this screenshot. If it shows a question, \
answer it directly and briefly; otherwise describe the content in one sentence.";

pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_MONITOR_BACKOFF_MS: u64 = 3_000;
pub const DEFAULT_CAPTURE_DELAY_MS: u64 = 100;
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

pub const DEFAULT_SCRATCH_PATH: &str = "/data/local/tmp/glimpse_cap.png";

pub const MIN_DEBOUNCE_MS: u64 = 50;
pub const MAX_DEBOUNCE_MS: u64 = 10_000;
pub const MAX_MONITOR_BACKOFF_MS: u64 = 60_000;
pub const MAX_CAPTURE_DELAY_MS: u64 = 5_000;

/// Canonical shared-storage bounce paths, in preference order. The second is
/// the long form of the same mount; some shells reject one or the other.
pub fn default_shared_paths() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/sdcard/glimpse_dump.png"),
        PathBuf::from("/storage/emulated/0/glimpse_dump.png"),
    ]
}
