//! Multi-strategy screen capture engine.
//!
//! Capture tooling on rooted devices is wildly inconsistent: the same
//! command streams an image on one OS build, silently writes nothing on
//! another, and hits a policy wall on a third. The engine tries a fixed
//! list of strategies in priority order and falls through on any failure
//! signal, reporting failure only once every strategy is exhausted.

mod frame;

#[cfg(test)]
mod tests;

pub use frame::Frame;

use crate::log_debug;
use crate::shell::{commands, ShellRunner};
use anyhow::{anyhow, Context, Result};
use image::codecs::png::PngDecoder;
use image::DynamicImage;
use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One self-contained method of obtaining a screen image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Decode the image straight off the capture command's stdout. Fastest,
    /// and immune to filesystem permission boundaries.
    Stream,
    /// Bounce through world-accessible shared storage.
    SharedStorage,
    /// Bounce through an elevated scratch path into the caller's private
    /// directory.
    PrivateCache,
}

impl Strategy {
    pub fn label(self) -> &'static str {
        match self {
            Strategy::Stream => "stream",
            Strategy::SharedStorage => "shared-storage",
            Strategy::PrivateCache => "private-cache",
        }
    }
}

/// Where the bounce strategies put their temporary files.
#[derive(Debug, Clone)]
pub struct CapturePaths {
    /// Candidate shared-storage paths, in preference order.
    pub shared: Vec<PathBuf>,
    /// Elevated-writable scratch path for the private-cache strategy.
    pub scratch: PathBuf,
    /// Caller-private directory; enables the private-cache strategy.
    pub private_dir: Option<PathBuf>,
}

/// Record of one strategy execution, kept for logging only.
struct CaptureAttempt {
    strategy: Strategy,
    duration: Duration,
    outcome: Result<(u32, u32), String>,
}

impl CaptureAttempt {
    fn log(&self) {
        let ms = self.duration.as_millis() as u64;
        match &self.outcome {
            Ok((width, height)) => {
                log_debug(&format!(
                    "capture strategy {} succeeded in {ms}ms ({width}x{height})",
                    self.strategy.label()
                ));
                tracing::info!(
                    strategy = self.strategy.label(),
                    duration_ms = ms,
                    width,
                    height,
                    "capture strategy succeeded"
                );
            }
            Err(reason) => {
                log_debug(&format!(
                    "capture strategy {} failed after {ms}ms: {reason}",
                    self.strategy.label()
                ));
                tracing::warn!(
                    strategy = self.strategy.label(),
                    duration_ms = ms,
                    reason = reason.as_str(),
                    "capture strategy failed"
                );
            }
        }
    }
}

/// Produces a decoded raster image despite unpredictable OS and permission
/// restrictions.
pub struct CaptureEngine {
    shell: Arc<dyn ShellRunner>,
    paths: CapturePaths,
}

impl CaptureEngine {
    pub fn new(shell: Arc<dyn ShellRunner>, paths: CapturePaths) -> Self {
        Self { shell, paths }
    }

    /// The fixed strategy order for this engine instance. No reordering
    /// based on history; the preferred strategy is retried every call.
    fn strategies(&self) -> Vec<Strategy> {
        let mut order = vec![Strategy::Stream, Strategy::SharedStorage];
        if self.paths.private_dir.is_some() {
            order.push(Strategy::PrivateCache);
        }
        order
    }

    /// Capture the screen, falling through strategies until one decodes.
    pub fn capture(&self) -> Result<Frame> {
        for strategy in self.strategies() {
            let started = Instant::now();
            let outcome = self.run_strategy(strategy);
            let attempt = CaptureAttempt {
                strategy,
                duration: started.elapsed(),
                outcome: match &outcome {
                    Ok(frame) => Ok((frame.width(), frame.height())),
                    Err(err) => Err(format!("{err:#}")),
                },
            };
            attempt.log();
            if let Ok(frame) = outcome {
                return Ok(frame);
            }
        }
        Err(anyhow!("every capture strategy failed"))
    }

    fn run_strategy(&self, strategy: Strategy) -> Result<Frame> {
        match strategy {
            Strategy::Stream => self.capture_stream(),
            Strategy::SharedStorage => self.capture_shared(),
            Strategy::PrivateCache => {
                let dir = self
                    .paths
                    .private_dir
                    .as_ref()
                    .expect("private-cache strategy only listed when a dir is configured");
                self.capture_private(dir)
            }
        }
    }

    /// Strategy 1: decode the PNG straight off the stream. No intermediate
    /// file, no second in-memory copy of the encoded image.
    fn capture_stream(&self) -> Result<Frame> {
        let mut stream = self.shell.open_stream(commands::screen_capture_stream())?;
        let decoded = decode_png_stream(&mut stream);
        let stderr = stream.stderr_output();
        if !stderr.trim().is_empty() {
            log_debug(&format!("stream capture stderr: {}", stderr.trim()));
        }
        if let Err(err) = stream.wait() {
            log_debug(&format!("stream capture wait failed: {err:#}"));
        }
        decoded
    }

    /// Strategy 2: bounce through shared storage, retrying the second
    /// canonical path when the first write fails.
    fn capture_shared(&self) -> Result<Frame> {
        let mut denied = false;
        for path in &self.paths.shared {
            let result = self.shell.execute(&commands::screen_capture_to(path));
            if result.success {
                break;
            }
            denied = denied || result.denied();
            if !result.stderr.trim().is_empty() {
                log_debug(&format!(
                    "shared capture to {} failed: {}",
                    path.display(),
                    result.stderr.trim()
                ));
            }
        }

        let materialized = self.paths.shared.iter().find(|path| path.exists());
        let decoded = match materialized {
            Some(path) => {
                // Root-created files default to 600; broaden before reading.
                let _ = self
                    .shell
                    .execute(&commands::broaden_permissions(path, "777"));
                image::open(path)
                    .with_context(|| format!("decode of {} failed", path.display()))
                    .map(Frame::new)
            }
            None if denied => Err(anyhow!("shared storage write denied")),
            None => Err(anyhow!("no shared-storage file materialized")),
        };

        // Best-effort cleanup of every candidate, even when decode failed.
        for path in &self.paths.shared {
            if path.exists() {
                let _ = self.shell.execute(&commands::remove_file(path));
            }
        }
        decoded
    }

    /// Strategy 3: capture to the elevated scratch path, verify the file
    /// exists via a listing (capture tools exit 0 while producing nothing),
    /// copy it into the private directory, and decode from there.
    fn capture_private(&self, dir: &Path) -> Result<Frame> {
        let outcome = self.private_cache_attempt(dir);
        // The scratch original goes away regardless of outcome.
        let _ = self
            .shell
            .execute(&commands::remove_file(&self.paths.scratch));
        outcome
    }

    fn private_cache_attempt(&self, dir: &Path) -> Result<Frame> {
        let scratch = &self.paths.scratch;
        let capture = self.shell.execute(&commands::screen_capture_to(scratch));
        if capture.denied() {
            return Err(anyhow!("scratch capture denied: {}", capture.stderr.trim()));
        }

        let listing = self.shell.execute(&commands::list_path(scratch));
        if !listing.success || listing.stdout.trim().is_empty() {
            return Err(anyhow!(
                "capture produced no file at {}",
                scratch.display()
            ));
        }

        let dest = dir.join("glimpse_frame.png");
        let copy = self.shell.execute(&commands::copy_file(scratch, &dest));
        if !copy.success {
            return Err(anyhow!(
                "copy into private storage failed: {}",
                copy.stderr.trim()
            ));
        }
        let _ = self
            .shell
            .execute(&commands::broaden_permissions(&dest, "666"));

        let decoded = image::open(&dest)
            .with_context(|| format!("decode of {} failed", dest.display()))
            .map(Frame::new);
        // The private copy is ours; plain fs remove is enough.
        let _ = fs::remove_file(&dest);
        decoded
    }
}

fn decode_png_stream(reader: &mut (impl std::io::Read + Send)) -> Result<Frame> {
    let decoder =
        PngDecoder::new(BufReader::new(reader)).context("stream did not begin a PNG image")?;
    let image = DynamicImage::from_decoder(decoder).context("PNG stream decode failed")?;
    Ok(Frame::new(image))
}
