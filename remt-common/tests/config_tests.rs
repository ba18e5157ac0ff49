//! Integration tests for configuration loading
//!
//! Tests cover:
//! - Missing TOML files fall back to defaults instead of failing
//! - Priority order for config file resolution (CLI > ENV > default dir)
//! - Secret resolution (ENV > TOML, blank values ignored)
//!
//! Tests that manipulate environment variables are marked #[serial].

use remt_common::config::{
    load_config, load_config_file, resolve_config_path, resolve_secret, ConfigSource,
    CONFIG_ENV_VAR,
};
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;

#[test]
#[serial]
fn test_missing_file_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("does-not-exist.toml");

    let (config, source) = load_config(Some(missing.as_path()), "remt-api").unwrap();
    assert_eq!(config.port, 3001);
    assert_eq!(config.cache.ttl_secs, 3600);

    // The fallback is reported to the caller, not logged before tracing exists
    assert!(source.is_default());
    assert_eq!(source, ConfigSource::Missing(missing));
}

#[test]
#[serial]
fn test_file_values_are_loaded() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("remt-api.toml");
    fs::write(
        &path,
        r#"
        port = 4000
        bind_address = "0.0.0.0"

        [logging]
        level = "debug"

        [upstream]
        service_key = "from-toml"
        page_size = 500
        timeout_secs = 30

        [geocoder]
        api_key = "kakao-from-toml"
        "#,
    )
    .unwrap();

    let (config, source) = load_config(Some(path.as_path()), "remt-api").unwrap();
    assert!(!source.is_default());
    assert_eq!(source, ConfigSource::File(path.clone()));
    assert_eq!(config.port, 4000);
    assert_eq!(config.bind_address, "0.0.0.0");
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.upstream.service_key.as_deref(), Some("from-toml"));
    assert_eq!(config.upstream.page_size, 500);
    assert_eq!(config.upstream.timeout_secs, 30);
    assert_eq!(config.geocoder.api_key.as_deref(), Some("kakao-from-toml"));
}

#[test]
fn test_malformed_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    fs::write(&path, "port = \"not a number\"").unwrap();

    let err = load_config_file(&path).unwrap_err();
    assert!(err.to_string().contains("Configuration error"));
}

#[test]
#[serial]
fn test_env_var_selects_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("from-env.toml");
    fs::write(&path, "port = 5050").unwrap();

    env::set_var(CONFIG_ENV_VAR, &path);
    let resolved = resolve_config_path(None, "remt-api");
    let (config, _source) = load_config(None, "remt-api").unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(resolved, Some(path));
    assert_eq!(config.port, 5050);
}

#[test]
#[serial]
fn test_cli_path_beats_env_var() {
    let temp_dir = TempDir::new().unwrap();
    let cli_path = temp_dir.path().join("cli.toml");

    env::set_var(CONFIG_ENV_VAR, "/tmp/remt-env-should-lose.toml");
    let resolved = resolve_config_path(Some(cli_path.as_path()), "remt-api");
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(resolved, Some(cli_path));
}

#[test]
#[serial]
fn test_secret_env_beats_toml() {
    env::set_var("REMT_TEST_SECRET", "from-env");
    let secret = resolve_secret("REMT_TEST_SECRET", Some("from-toml"));
    env::remove_var("REMT_TEST_SECRET");

    assert_eq!(secret.as_deref(), Some("from-env"));
}

#[test]
#[serial]
fn test_secret_blank_env_falls_back_to_toml() {
    env::set_var("REMT_TEST_SECRET", "   ");
    let secret = resolve_secret("REMT_TEST_SECRET", Some("from-toml"));
    env::remove_var("REMT_TEST_SECRET");

    assert_eq!(secret.as_deref(), Some("from-toml"));
}

#[test]
#[serial]
fn test_secret_absent_everywhere() {
    env::remove_var("REMT_TEST_SECRET");
    assert!(resolve_secret("REMT_TEST_SECRET", None).is_none());
    assert!(resolve_secret("REMT_TEST_SECRET", Some("")).is_none());
}
