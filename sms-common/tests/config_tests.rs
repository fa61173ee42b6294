//! Unit tests for configuration resolution
//!
//! Root folder priority: CLI argument > SMS_ROOT_FOLDER > config.toml > default.
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.

use serial_test::serial;
use sms_common::config::{
    default_root_folder, load_config, parse_config, resolve_root_folder, ConfigFile,
    ROOT_FOLDER_ENV,
};
use std::env;
use std::path::PathBuf;

#[test]
#[serial]
fn test_cli_argument_wins() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/sms-env");
    let config = parse_config(r#"root_folder = "/tmp/sms-toml""#).unwrap();

    let root = resolve_root_folder(Some("/tmp/sms-cli"), &config);
    assert_eq!(root, PathBuf::from("/tmp/sms-cli"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_env_var_beats_config_file() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/sms-env");
    let config = parse_config(r#"root_folder = "/tmp/sms-toml""#).unwrap();

    let root = resolve_root_folder(None, &config);
    assert_eq!(root, PathBuf::from("/tmp/sms-env"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_config_file_beats_default() {
    env::remove_var(ROOT_FOLDER_ENV);
    let config = parse_config(r#"root_folder = "/tmp/sms-toml""#).unwrap();

    let root = resolve_root_folder(None, &config);
    assert_eq!(root, PathBuf::from("/tmp/sms-toml"));
}

#[test]
#[serial]
fn test_default_root_folder_used_last() {
    env::remove_var(ROOT_FOLDER_ENV);
    let root = resolve_root_folder(None, &ConfigFile::default());
    assert_eq!(root, default_root_folder());
    assert!(!root.as_os_str().is_empty());
}

#[test]
fn test_load_explicit_config_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[sync]\nremote_url = \"https://demo.supabase.co\"\ninterval_secs = 120\n",
    )
    .unwrap();

    let config = load_config(Some(&path)).unwrap();
    assert_eq!(config.sync.remote_url.as_deref(), Some("https://demo.supabase.co"));
    assert_eq!(config.sync.interval_secs, 120);
}

#[test]
fn test_load_missing_explicit_config_fails() {
    let dir = tempfile::TempDir::new().unwrap();
    let result = load_config(Some(&dir.path().join("absent.toml")));
    assert!(result.is_err());
}
