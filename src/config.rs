use crate::location::PermissionState;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

pub const CONFIG_PATH: &str = "config.toml";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub location: LocationConfig,
    pub api: ApiConfig,
    pub ui: UiConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LocationMode {
    Ip,
    Manual,
    Disabled,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IpService {
    IpApi,
    IpApiCo,
    IpWhois,
    FreeGeoIp,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LocationConfig {
    pub mode: LocationMode,
    pub permission: PermissionState, // Initial answer; "prompt" asks on first lookup
    pub manual_lat: f64,             // Used when mode = "manual"
    pub manual_lon: f64,
    pub enable_high_accuracy: bool,
    pub timeout_ms: u64,
    pub maximum_age_ms: u64, // 0 = never reuse a previous fix
    pub ip_service: IpService,
    pub public_ip_url: String,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            mode: LocationMode::Ip,
            permission: PermissionState::Prompt,
            manual_lat: 25.0339,
            manual_lon: 121.5645,
            enable_high_accuracy: true,
            timeout_ms: 10_000,
            maximum_age_ms: 0,
            ip_service: IpService::IpApi,
            public_ip_url: "https://api.ipify.org".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key_env: String,       // Name of the env var holding the key
    pub request_timeout_secs: u64, // 0 = no timeout
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.5-flash".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            request_timeout_secs: 60,
        }
    }
}

impl ApiConfig {
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct UiConfig {
    pub tick_rate_ms: u64,
    pub default_view: String, // "dashboard", "sources" or "raw"
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            tick_rate_ms: 150,
            default_view: "dashboard".to_string(),
        }
    }
}

impl Config {
    /// Loads config.toml from the working directory.
    /// If it doesn't exist, creates a default one.
    pub fn load() -> Self {
        Self::load_from(CONFIG_PATH)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => match Self::parse(&content) {
                Ok(config) => {
                    info!("Loaded configuration from {}", path.display());
                    return config;
                }
                Err(e) => {
                    warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    return Self::default();
                }
            },
            Err(_) => info!("No config at {}, writing defaults.", path.display()),
        }

        // Save default config to disk for the user to edit later
        let default_config = Self::default();
        match toml::to_string_pretty(&default_config) {
            Ok(toml_string) => {
                if fs::write(path, toml_string).is_err() {
                    warn!("Could not write default {} to disk.", path.display());
                }
            }
            Err(e) => warn!("Could not serialize default config: {}", e),
        }

        default_config
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = Config::parse(
            r#"
[location]
mode = "manual"
manual_lat = 37.7749
manual_lon = -122.4194
"#,
        )
        .unwrap();

        assert_eq!(config.location.mode, LocationMode::Manual);
        assert_eq!(config.location.manual_lon, -122.4194);
        assert_eq!(config.location.timeout_ms, 10_000);
        assert_eq!(config.location.permission, PermissionState::Prompt);
        assert_eq!(config.api.model, "gemini-2.5-flash");
        assert_eq!(config.ui.tick_rate_ms, 150);
    }

    #[test]
    fn default_round_trips_through_toml() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        assert_eq!(Config::parse(&text).unwrap(), Config::default());
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(Config::parse("[location]\nmode = \"gps\"\n").is_err());
    }
}
