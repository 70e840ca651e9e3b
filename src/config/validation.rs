use super::defaults::{
    default_shared_paths, MAX_CAPTURE_DELAY_MS, MAX_DEBOUNCE_MS, MAX_MONITOR_BACKOFF_MS,
    MIN_DEBOUNCE_MS,
};
use super::AppConfig;
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::Path;

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values and fill in path defaults.
    pub fn validate(&mut self) -> Result<()> {
        if !(MIN_DEBOUNCE_MS..=MAX_DEBOUNCE_MS).contains(&self.debounce_ms) {
            bail!(
                "--debounce-ms must be between {MIN_DEBOUNCE_MS} and {MAX_DEBOUNCE_MS}, got {}",
                self.debounce_ms
            );
        }
        if self.monitor_backoff_ms > MAX_MONITOR_BACKOFF_MS {
            bail!(
                "--monitor-backoff-ms must be at most {MAX_MONITOR_BACKOFF_MS}, got {}",
                self.monitor_backoff_ms
            );
        }
        if self.capture_delay_ms > MAX_CAPTURE_DELAY_MS {
            bail!(
                "--capture-delay-ms must be at most {MAX_CAPTURE_DELAY_MS}, got {}",
                self.capture_delay_ms
            );
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            bail!("--jpeg-quality must be between 1 and 100, got {}", self.jpeg_quality);
        }

        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            bail!("--api-url must be an http(s) URL, got {}", self.api_url);
        }
        if self.model.trim().is_empty() {
            bail!("--model must not be empty");
        }
        if self.prompt.trim().is_empty() {
            bail!("--prompt must not be empty");
        }

        let interpreter = shell_words::split(&self.su_cmd)
            .with_context(|| format!("--su-cmd is not parseable: {}", self.su_cmd))?;
        if interpreter.is_empty() {
            bail!("--su-cmd must name an elevated interpreter");
        }

        if self.shared_paths.is_empty() {
            self.shared_paths = default_shared_paths();
        }
        for path in &self.shared_paths {
            require_absolute("--shared-path", path)?;
        }
        require_absolute("--scratch-path", &self.scratch_path)?;
        if let Some(dir) = &self.private_dir {
            require_absolute("--private-dir", dir)?;
        }

        Ok(())
    }
}

fn require_absolute(flag: &str, path: &Path) -> Result<()> {
    if !path.is_absolute() {
        bail!("{flag} must be absolute, got {}", path.display());
    }
    Ok(())
}
