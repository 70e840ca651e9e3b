//! Command text for the rooted-device platform layer.
//!
//! Every string the system feeds to the elevated interpreter is built here,
//! so porting to a device with different tool names touches one module.

use std::path::Path;

fn q(path: &Path) -> String {
    shell_words::quote(&path.display().to_string()).into_owned()
}

/// Capture the screen as PNG on stdout.
pub fn screen_capture_stream() -> &'static str {
    "screencap -p"
}

/// Capture the screen as PNG into a file.
pub fn screen_capture_to(path: &Path) -> String {
    format!("screencap -p {}", q(path))
}

/// Make a root-created file readable by the unprivileged side.
/// Capture tools default to 600, which only root can read back.
pub fn broaden_permissions(path: &Path, mode: &str) -> String {
    format!("chmod {mode} {}", q(path))
}

/// List a path so existence can be verified independently of a capture
/// tool's exit code.
pub fn list_path(path: &Path) -> String {
    format!("ls {}", q(path))
}

pub fn copy_file(src: &Path, dst: &Path) -> String {
    format!("cp {} {}", q(src), q(dst))
}

pub fn remove_file(path: &Path) -> String {
    format!("rm -f {}", q(path))
}

/// Continuous raw input-event feed with symbolic key names.
pub fn input_event_feed() -> &'static str {
    "getevent -l"
}

/// Probe used for the root check.
pub fn identity_probe() -> &'static str {
    "id"
}

/// Synthesize a key press (e.g. to restore volume after a trigger).
pub fn inject_key_event(code: u32) -> String {
    format!("input keyevent {code}")
}

/// Type text through the input pipeline. The caller escapes it first.
pub fn type_text(escaped: &str) -> String {
    format!("input text \"{escaped}\"")
}

/// Push a file's contents into the system clipboard service.
pub fn clipboard_set_from(path: &Path) -> String {
    format!("cat {} | cmd clipboard set", q(path))
}

/// Older systems without `cmd clipboard`: write the settings key directly.
pub fn clipboard_settings_fallback(path: &Path) -> String {
    format!("settings put system clipboard_text \"$(cat {})\"", q(path))
}

/// Write text to an elevated path via a quoted heredoc, which sidesteps
/// shell escaping of the payload entirely.
pub fn write_text_file(path: &Path, text: &str) -> String {
    format!(
        "cat > {path} << 'GLIMPSE_EOF'\n{text}\nGLIMPSE_EOF\nchmod 644 {path}",
        path = q(path)
    )
}
