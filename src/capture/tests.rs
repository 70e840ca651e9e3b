use super::{CaptureEngine, CapturePaths, Strategy};
use crate::shell::{CommandResult, ShellRunner, ShellStream};
use anyhow::{anyhow, Result};
use image::{DynamicImage, Rgba, RgbaImage};
use std::fs;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        width,
        height,
        Rgba([10, 20, 30, 255]),
    ));
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, image::ImageOutputFormat::Png)
        .expect("encode test png");
    buf.into_inner()
}

fn ok(stdout: &str) -> CommandResult {
    CommandResult {
        success: true,
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

fn fail(stderr: &str) -> CommandResult {
    CommandResult {
        success: false,
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

/// Scripted channel: stream bytes come from memory, execute is a closure,
/// every command is recorded.
struct FakeShell {
    executed: Mutex<Vec<String>>,
    stream: Option<Vec<u8>>,
    exec: Box<dyn Fn(&str) -> CommandResult + Send + Sync>,
}

impl FakeShell {
    fn new(
        stream: Option<Vec<u8>>,
        exec: impl Fn(&str) -> CommandResult + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            executed: Mutex::new(Vec::new()),
            stream,
            exec: Box::new(exec),
        })
    }

    fn commands(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

impl ShellRunner for FakeShell {
    fn execute(&self, command: &str) -> CommandResult {
        self.executed.lock().unwrap().push(command.to_string());
        (self.exec)(command)
    }

    fn open_stream(&self, command: &str) -> Result<ShellStream> {
        self.executed
            .lock()
            .unwrap()
            .push(format!("stream:{command}"));
        match &self.stream {
            Some(bytes) => Ok(ShellStream::from_reader(Box::new(Cursor::new(
                bytes.clone(),
            )))),
            None => Err(anyhow!("no elevated interpreter")),
        }
    }
}

fn test_dir(tag: &str) -> PathBuf {
    static SEQ: AtomicU32 = AtomicU32::new(0);
    let dir = std::env::temp_dir().join(format!(
        "glimpse_capture_{tag}_{}_{}",
        std::process::id(),
        SEQ.fetch_add(1, Ordering::Relaxed)
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("create test dir");
    dir
}

fn paths_in(dir: &PathBuf) -> CapturePaths {
    CapturePaths {
        shared: vec![dir.join("dump_a.png"), dir.join("dump_b.png")],
        scratch: dir.join("scratch.png"),
        private_dir: None,
    }
}

#[test]
fn stream_success_short_circuits_bounce_strategies() {
    let dir = test_dir("stream_ok");
    let shell = FakeShell::new(Some(png_bytes(1080, 2400)), |_| {
        panic!("bounce strategy ran despite stream success")
    });
    let engine = CaptureEngine::new(shell.clone(), paths_in(&dir));

    let frame = engine.capture().expect("stream capture");
    assert_eq!((frame.width(), frame.height()), (1080, 2400));
    assert_eq!(shell.commands(), vec!["stream:screencap -p".to_string()]);
}

#[test]
fn undecodable_stream_falls_through_to_shared_storage() {
    let dir = test_dir("shared_ok");
    let paths = paths_in(&dir);
    let first = paths.shared[0].clone();
    let shell = FakeShell::new(Some(b"not a png".to_vec()), move |cmd| {
        if cmd.starts_with("screencap -p ") {
            fs::write(&first, png_bytes(8, 6)).expect("materialize shared file");
        }
        ok("")
    });
    let engine = CaptureEngine::new(shell.clone(), paths.clone());

    let frame = engine.capture().expect("shared capture");
    assert_eq!((frame.width(), frame.height()), (8, 6));

    let commands = shell.commands();
    assert!(commands.iter().any(|c| c.starts_with("chmod 777 ")));
    assert!(commands.iter().any(|c| c.starts_with("rm -f ")));
}

#[test]
fn shared_storage_retries_second_canonical_path() {
    let dir = test_dir("shared_fallback");
    let paths = paths_in(&dir);
    let first = paths.shared[0].clone();
    let second = paths.shared[1].clone();
    let shell = FakeShell::new(Some(b"garbage".to_vec()), move |cmd| {
        if cmd == format!("screencap -p {}", first.display()) {
            return fail("screencap: Permission denied");
        }
        if cmd == format!("screencap -p {}", second.display()) {
            fs::write(&second, png_bytes(4, 4)).expect("materialize fallback file");
            return ok("");
        }
        if cmd.starts_with("rm -f ") {
            let _ = fs::remove_file(&second);
        }
        ok("")
    });
    let engine = CaptureEngine::new(shell, paths.clone());

    let frame = engine.capture().expect("fallback path capture");
    assert_eq!(frame.width(), 4);
    assert!(!paths.shared[1].exists(), "temp file must be cleaned up");
}

#[test]
fn exhausted_strategies_report_failure_and_leave_no_files() {
    let dir = test_dir("all_fail");
    let paths = paths_in(&dir);
    let shell = FakeShell::new(
        Some(b"garbage".to_vec()),
        |_| fail("screencap: Permission denied"),
    );
    let engine = CaptureEngine::new(shell, paths.clone());

    let err = engine.capture().expect_err("capture must fail");
    assert!(err.to_string().contains("every capture strategy failed"));
    for path in &paths.shared {
        assert!(!path.exists());
    }
}

#[test]
fn private_cache_copies_verifies_and_cleans_scratch() {
    let dir = test_dir("private_ok");
    let mut paths = paths_in(&dir);
    paths.private_dir = Some(dir.clone());
    let scratch = paths.scratch.clone();
    let dest = dir.join("glimpse_frame.png");
    let dest_for_exec = dest.clone();
    let scratch_display = scratch.display().to_string();
    let shell = FakeShell::new(Some(b"garbage".to_vec()), move |cmd| {
        if cmd == format!("screencap -p {}", scratch_display) {
            return ok("");
        }
        if cmd.starts_with("screencap -p ") {
            // Shared-storage strategy: exit 0 but never materialize a file.
            return ok("");
        }
        if cmd.starts_with("ls ") {
            return ok(&scratch_display);
        }
        if cmd.starts_with("cp ") {
            fs::write(&dest_for_exec, png_bytes(5, 7)).expect("materialize private copy");
            return ok("");
        }
        ok("")
    });
    let engine = CaptureEngine::new(shell.clone(), paths);

    let frame = engine.capture().expect("private-cache capture");
    assert_eq!((frame.width(), frame.height()), (5, 7));
    assert!(!dest.exists(), "private copy must be removed after decode");

    let commands = shell.commands();
    let scratch_rm = format!("rm -f {}", scratch.display());
    assert!(commands.contains(&scratch_rm), "scratch must be removed");
}

#[test]
fn private_cache_trusts_listing_over_exit_code() {
    let dir = test_dir("private_missing");
    let mut paths = paths_in(&dir);
    paths.private_dir = Some(dir.clone());
    let scratch = paths.scratch.clone();
    // Capture claims success but the listing finds nothing.
    let shell = FakeShell::new(Some(b"garbage".to_vec()), |cmd| {
        if cmd.starts_with("ls ") {
            return ok("");
        }
        if cmd.starts_with("cp ") {
            panic!("copy must not run when verification fails");
        }
        ok("")
    });
    let engine = CaptureEngine::new(shell.clone(), paths);

    engine.capture().expect_err("verification must fail capture");
    let scratch_rm = format!("rm -f {}", scratch.display());
    assert!(
        shell.commands().contains(&scratch_rm),
        "scratch cleanup runs even on verification failure"
    );
}

#[test]
fn strategy_labels_are_stable() {
    assert_eq!(Strategy::Stream.label(), "stream");
    assert_eq!(Strategy::SharedStorage.label(), "shared-storage");
    assert_eq!(Strategy::PrivateCache.label(), "private-cache");
}

#[test]
fn frame_releases_buffer_but_keeps_dimensions() {
    let mut buf = Cursor::new(png_bytes(12, 34));
    let image = image::load(&mut buf, image::ImageFormat::Png).expect("decode");
    let mut frame = super::Frame::new(image);
    assert!(!frame.is_released());
    assert!(frame.to_jpeg(80).expect("encode").starts_with(&[0xFF, 0xD8]));

    frame.release();
    assert!(frame.is_released());
    assert_eq!((frame.width(), frame.height()), (12, 34));
    assert!(frame.to_jpeg(80).is_err());
}
