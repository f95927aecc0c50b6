//! Integration tests for configuration loading

use geoguide_tui::config::{Config, IpService, LocationMode};
use geoguide_tui::location::PermissionState;
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

#[test]
fn test_load_config_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();

    let config_content = r#"
[location]
mode = "manual"
permission = "granted"
manual_lat = 37.7749
manual_lon = -122.4194
enable_high_accuracy = false
timeout_ms = 5000
maximum_age_ms = 60000
ip_service = "ipwhois"
public_ip_url = "https://ip.example"

[api]
endpoint = "http://localhost:8080/v1beta/"
model = "gemini-2.5-pro"
api_key_env = "GEOGUIDE_TEST_KEY"
request_timeout_secs = 0

[ui]
tick_rate_ms = 250
default_view = "sources"
"#;

    temp_file.write_all(config_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = Config::load_from(temp_file.path());

    assert_eq!(config.location.mode, LocationMode::Manual);
    assert_eq!(config.location.permission, PermissionState::Granted);
    assert_eq!(config.location.manual_lat, 37.7749);
    assert!(!config.location.enable_high_accuracy);
    assert_eq!(config.location.timeout_ms, 5000);
    assert_eq!(config.location.maximum_age_ms, 60000);
    assert_eq!(config.location.ip_service, IpService::IpWhois);
    assert_eq!(config.api.model, "gemini-2.5-pro");
    assert_eq!(config.api.request_timeout_secs, 0);
    assert_eq!(config.ui.tick_rate_ms, 250);
    assert_eq!(config.ui.default_view, "sources");
}

#[test]
fn test_missing_file_writes_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let config = Config::load_from(&path);
    assert_eq!(config, Config::default());
    assert_eq!(config.location.timeout_ms, 10_000);
    assert_eq!(config.location.maximum_age_ms, 0);
    assert!(config.location.enable_high_accuracy);

    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(Config::parse(&written).unwrap(), Config::default());
}

#[test]
fn test_unparsable_file_falls_back_without_overwriting() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[location\nmode = ").unwrap();
    temp_file.flush().unwrap();

    let config = Config::load_from(temp_file.path());
    assert_eq!(config, Config::default());
    let on_disk = std::fs::read_to_string(temp_file.path()).unwrap();
    assert_eq!(on_disk, "[location\nmode = ");
}

#[test]
fn test_api_key_comes_from_named_env_var() {
    let mut config = Config::default();
    config.api.api_key_env = "GEOGUIDE_TEST_KEY_UNSET_FOR_SURE".to_string();
    assert_eq!(config.api.api_key(), None);
}
