use super::defaults::default_shared_paths;
use super::AppConfig;
use clap::Parser;

fn base_config() -> AppConfig {
    AppConfig::parse_from(["test-app"])
}

#[test]
fn defaults_validate() {
    let mut cfg = base_config();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.shared_paths, default_shared_paths());
}

#[test]
fn rejects_debounce_out_of_bounds() {
    let mut cfg = AppConfig::parse_from(["test-app", "--debounce-ms", "10"]);
    assert!(cfg.validate().is_err());

    let mut cfg = AppConfig::parse_from(["test-app", "--debounce-ms", "20000"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn accepts_debounce_bounds() {
    let mut cfg = AppConfig::parse_from(["test-app", "--debounce-ms", "50"]);
    assert!(cfg.validate().is_ok());

    let mut cfg = AppConfig::parse_from(["test-app", "--debounce-ms", "10000"]);
    assert!(cfg.validate().is_ok());
}

#[test]
fn rejects_zero_jpeg_quality() {
    let mut cfg = AppConfig::parse_from(["test-app", "--jpeg-quality", "0"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_non_http_api_url() {
    let mut cfg = AppConfig::parse_from(["test-app", "--api-url", "ftp://example.com"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_unparseable_su_cmd() {
    let mut cfg = AppConfig::parse_from(["test-app", "--su-cmd", "su 'unterminated"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn accepts_su_cmd_with_arguments() {
    let mut cfg = AppConfig::parse_from(["test-app", "--su-cmd", "adb shell su"]);
    assert!(cfg.validate().is_ok());
}

#[test]
fn rejects_relative_shared_path() {
    let mut cfg = AppConfig::parse_from(["test-app", "--shared-path", "relative/dump.png"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn explicit_shared_paths_are_kept() {
    let mut cfg = AppConfig::parse_from(["test-app", "--shared-path", "/tmp/a.png"]);
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.shared_paths.len(), 1);
}

#[test]
fn rejects_relative_private_dir() {
    let mut cfg = AppConfig::parse_from(["test-app", "--private-dir", "cache"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn monitor_restart_cap_parses() {
    let cfg = AppConfig::parse_from(["test-app", "--max-monitor-restarts", "5"]);
    assert_eq!(cfg.max_monitor_restarts, Some(5));
    assert_eq!(base_config().max_monitor_restarts, None);
}
