//! Supplemental root helpers: synthetic key presses, clipboard, typing.
//!
//! None of these sit on the capture path; they exist so the answer can be
//! pushed back into the device (restore volume after a trigger, hand the
//! text to another app).

use crate::log_debug;
use crate::shell::{commands, ShellRunner};
use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Keycodes for `input keyevent`.
pub const KEYCODE_VOLUME_UP: u32 = 24;
pub const KEYCODE_VOLUME_DOWN: u32 = 25;

/// Synthesize a key press through the elevated shell.
pub fn inject_key_event(shell: &dyn ShellRunner, code: u32) -> bool {
    shell.execute(&commands::inject_key_event(code)).success
}

/// Copy text into the system clipboard.
///
/// The payload goes through an elevated temp file first; escaping arbitrary
/// text for a shell argument is a lost cause. `cmd clipboard set` is tried
/// first, with a direct settings write as the fallback for older systems.
pub fn copy_to_clipboard(shell: &dyn ShellRunner, text: &str) -> Result<()> {
    let temp = clip_temp_path();
    let staged = shell.execute(&commands::write_text_file(&temp, text));
    if !staged.success {
        bail!("failed to stage clipboard text: {}", staged.stderr.trim());
    }

    let set = shell.execute(&commands::clipboard_set_from(&temp));
    let set_ok = set.success && !set.stderr.contains("Error") && !set.stderr.contains("Exception");
    if !set_ok {
        log_debug("cmd clipboard unavailable, trying settings fallback");
        let fallback = shell.execute(&commands::clipboard_settings_fallback(&temp));
        if !fallback.success {
            let _ = shell.execute(&commands::remove_file(&temp));
            bail!("clipboard set failed: {}", fallback.stderr.trim());
        }
    }

    let _ = shell.execute(&commands::remove_file(&temp));
    Ok(())
}

/// Type text into the focused field via the input pipeline. More reliable
/// than the clipboard on some devices, but visibly types instead of copying.
pub fn paste_text(shell: &dyn ShellRunner, text: &str) -> bool {
    let escaped = escape_for_input(text);
    shell.execute(&commands::type_text(&escaped)).success
}

/// `input text` treats space as an argument separator and chokes on control
/// characters.
fn escape_for_input(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace(' ', "%s")
        .replace(['\n', '\r', '\t'], "")
}

fn clip_temp_path() -> PathBuf {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    PathBuf::from(format!("/data/local/tmp/glimpse_clip_{millis}.txt"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::{CommandResult, ShellStream};
    use anyhow::anyhow;
    use std::sync::Mutex;

    struct ScriptedShell {
        executed: Mutex<Vec<String>>,
        clipboard_cmd_broken: bool,
    }

    impl ScriptedShell {
        fn new(clipboard_cmd_broken: bool) -> Self {
            Self {
                executed: Mutex::new(Vec::new()),
                clipboard_cmd_broken,
            }
        }

        fn commands(&self) -> Vec<String> {
            self.executed.lock().unwrap().clone()
        }
    }

    impl ShellRunner for ScriptedShell {
        fn execute(&self, command: &str) -> CommandResult {
            self.executed.lock().unwrap().push(command.to_string());
            if self.clipboard_cmd_broken && command.contains("cmd clipboard set") {
                return CommandResult {
                    success: true,
                    stdout: String::new(),
                    stderr: "Exception: unknown service clipboard".to_string(),
                };
            }
            CommandResult {
                success: true,
                stdout: String::new(),
                stderr: String::new(),
            }
        }

        fn open_stream(&self, _command: &str) -> anyhow::Result<ShellStream> {
            Err(anyhow!("unused"))
        }
    }

    #[test]
    fn escape_replaces_spaces_and_strips_control_chars() {
        assert_eq!(escape_for_input("two words"), "two%swords");
        assert_eq!(escape_for_input("a\\b"), "a\\\\b");
        assert_eq!(escape_for_input("line\none\ttab\r"), "lineonetab");
    }

    #[test]
    fn inject_key_builds_keyevent_command() {
        let shell = ScriptedShell::new(false);
        assert!(inject_key_event(&shell, KEYCODE_VOLUME_DOWN));
        assert_eq!(shell.commands(), vec!["input keyevent 25".to_string()]);
    }

    #[test]
    fn clipboard_happy_path_stages_sets_and_cleans_up() {
        let shell = ScriptedShell::new(false);
        copy_to_clipboard(&shell, "hello world").expect("copy");
        let commands = shell.commands();
        assert!(commands[0].contains("GLIMPSE_EOF"));
        assert!(commands[0].contains("hello world"));
        assert!(commands[1].contains("cmd clipboard set"));
        assert!(commands.last().unwrap().starts_with("rm -f "));
    }

    #[test]
    fn clipboard_falls_back_to_settings_write() {
        let shell = ScriptedShell::new(true);
        copy_to_clipboard(&shell, "hello").expect("copy");
        assert!(shell
            .commands()
            .iter()
            .any(|c| c.contains("settings put system clipboard_text")));
    }

    #[test]
    fn paste_uses_input_text() {
        let shell = ScriptedShell::new(false);
        assert!(paste_text(&shell, "hi there"));
        assert_eq!(
            shell.commands(),
            vec!["input text \"hi%sthere\"".to_string()]
        );
    }

    #[test]
    fn temp_paths_live_under_the_elevated_tmp_dir() {
        let path = clip_temp_path();
        assert!(path.starts_with("/data/local/tmp"));
    }
}
